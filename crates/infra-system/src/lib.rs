// SmartHVAC Infrastructure - System Adapters
// Implements: SimulationEngine (EnergyPlus subprocess), BlobStore (local filesystem)

pub mod energyplus_engine;
pub mod local_blob_store;

pub use energyplus_engine::EnergyPlusEngine;
pub use local_blob_store::LocalBlobStore;
