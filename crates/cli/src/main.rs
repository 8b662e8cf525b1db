//! SmartHVAC CLI - submit simulation jobs and inspect the queue
//!
//! Talks to the job database directly; the worker daemon picks jobs up from there.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use std::sync::Arc;
use tabled::{Table, Tabled};

use smarthvac_core::application::{RecoveryService, SubmissionService, SubmitRequest};
use smarthvac_core::domain::{Job, JobStatus};
use smarthvac_core::port::id_provider::JobIdProvider;
use smarthvac_core::port::time_provider::SystemTimeProvider;
use smarthvac_core::port::{JobRepository, TimeProvider};
use smarthvac_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};

const DEFAULT_DB_PATH: &str = "~/.smarthvac/jobs.db";

#[derive(Parser)]
#[command(name = "smarthvac")]
#[command(about = "SmartHVAC simulation job CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Job database path
    #[arg(long, env = "SMARTHVAC_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a simulation request
    Submit {
        /// What to change in the base building model
        text: String,

        /// Weather file name (inside the worker's weather directory) or path
        #[arg(short, long)]
        weather: Option<String>,

        /// Generation backend (openai, gemini)
        #[arg(short, long)]
        backend: Option<String>,

        /// Simulation configuration as a JSON object
        #[arg(long)]
        config: Option<String>,
    },

    /// Ask a worker to probe every generation backend
    TestConnection,

    /// Show one job
    Show {
        job_id: String,

        /// Print the raw job record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recent jobs
    List {
        /// Only jobs in this status (queued, test_connection, processing, done, error)
        #[arg(short, long)]
        status: Option<String>,

        #[arg(short = 'n', long, default_value = "20")]
        limit: i64,
    },

    /// Put a stuck `processing` job back in the queue
    Requeue {
        job_id: String,

        /// Requeue even if the job was updated recently
        #[arg(long)]
        force: bool,
    },

    /// Job counts per status
    Status,
}

#[derive(Tabled)]
struct JobRow {
    id: String,
    kind: String,
    status: String,
    created: String,
    backend: String,
    outcome: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            kind: job.kind.to_string(),
            status: job.status.to_string(),
            created: format_millis(job.created_at),
            backend: job.request.backend.clone().unwrap_or_else(|| "-".to_string()),
            outcome: outcome(job),
        }
    }
}

fn outcome(job: &Job) -> String {
    match (&job.result_path, &job.error_message, &job.result_summary) {
        (Some(path), _, _) => path.clone(),
        (_, Some(message), _) => truncate(message, 60),
        (_, _, Some(_)) => "probe report".to_string(),
        _ => "-".to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max_chars {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn colored_status(status: JobStatus) -> colored::ColoredString {
    match status {
        JobStatus::Done => status.as_str().green(),
        JobStatus::Error => status.as_str().red(),
        JobStatus::Processing => status.as_str().yellow(),
        JobStatus::Queued | JobStatus::TestConnection => status.as_str().cyan(),
    }
}

fn parse_config(raw: Option<&str>) -> Result<Option<Value>> {
    raw.map(|s| serde_json::from_str(s).context("Invalid JSON in --config"))
        .transpose()
}

async fn open_repository(db: &str, time_provider: Arc<dyn TimeProvider>) -> Result<Arc<SqliteJobRepository>> {
    let path = shellexpand::tilde(db).into_owned();
    if let Some(parent) = std::path::Path::new(&path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let pool = create_pool(&format!("sqlite://{}", path))
        .await
        .map_err(|e| anyhow::anyhow!("Cannot open job database {}: {}", path, e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    Ok(Arc::new(SqliteJobRepository::new(pool, time_provider)))
}

fn print_job(job: &Job) {
    println!("  {} {}", "ID:".bold(), job.id);
    println!("  {} {}", "Kind:".bold(), job.kind);
    println!("  {} {}", "Status:".bold(), colored_status(job.status));
    println!("  {} {}", "Created:".bold(), format_millis(job.created_at));
    println!("  {} {}", "Updated:".bold(), format_millis(job.updated_at));
    if let Some(worker) = &job.claimed_by {
        println!("  {} {}", "Claimed by:".bold(), worker);
    }
    if !job.request.text.is_empty() {
        println!("  {} {}", "Request:".bold(), job.request.text);
    }
    if let Some(weather) = &job.request.weather_file {
        println!("  {} {}", "Weather:".bold(), weather);
    }
    if let Some(backend) = &job.request.backend {
        println!("  {} {}", "Backend:".bold(), backend);
    }
    if let Some(path) = &job.result_path {
        println!("  {} {}", "Result:".bold(), path.green());
    }
    if let Some(idf) = &job.idf_path {
        println!("  {} {}", "Input IDF:".bold(), idf);
    }
    if job.artifacts.len() > 1 {
        println!("  {}", "Artifacts:".bold());
        for artifact in &job.artifacts {
            println!("    - {}", artifact);
        }
    }
    if let Some(message) = &job.error_message {
        println!("  {}", "Error:".bold());
        for line in message.lines() {
            println!("    {}", line.red());
        }
    }
    if let Some(summary) = &job.result_summary {
        println!("  {}", "Backends:".bold());
        let pretty = serde_json::from_str::<Value>(summary)
            .and_then(|v| serde_json::to_string_pretty(&v))
            .unwrap_or_else(|_| summary.clone());
        for line in pretty.lines() {
            println!("    {}", line);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let repo = open_repository(&cli.db, time_provider.clone()).await?;

    match cli.command {
        Commands::Submit {
            text,
            weather,
            backend,
            config,
        } => {
            let request = SubmitRequest {
                nlp_input_text: text,
                weather_file_path: weather,
                backend,
                simulation_config: parse_config(config.as_deref())?,
            };

            let service = SubmissionService::new(
                repo,
                Arc::new(JobIdProvider::new(time_provider.clone())),
                time_provider,
            );
            let job_id = service.submit(request).await?;

            println!("{}", "✓ Job submitted".green().bold());
            println!("  {} {}", "ID:".bold(), job_id);
        }

        Commands::TestConnection => {
            let service = SubmissionService::new(
                repo,
                Arc::new(JobIdProvider::new(time_provider.clone())),
                time_provider,
            );
            let job_id = service.submit_connection_test().await?;

            println!("{}", "✓ Connection test queued".green().bold());
            println!("  {} {}", "ID:".bold(), job_id);
            println!("  Run `smarthvac show {}` once a worker has picked it up", job_id);
        }

        Commands::Show { job_id, json } => {
            let Some(job) = repo.find_by_id(&job_id).await? else {
                bail!("Job {} not found", job_id);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&job)?);
            } else {
                print_job(&job);
            }
        }

        Commands::List { status, limit } => {
            let jobs = match status {
                Some(raw) => {
                    let status: JobStatus = raw.parse()?;
                    let mut jobs = repo.find_by_status(status).await?;
                    // Newest first, like the unfiltered listing
                    jobs.reverse();
                    jobs.truncate(limit.max(0) as usize);
                    jobs
                }
                None => repo.list_recent(limit).await?,
            };

            if jobs.is_empty() {
                println!("{}", "No jobs".yellow());
            } else {
                let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Requeue { job_id, force } => {
            let recovery = RecoveryService::new(repo, time_provider, None);
            let job = recovery.requeue_job(&job_id, force).await?;

            println!(
                "{}",
                format!("✓ Job {} requeued as {}", job.id, job.status).green().bold()
            );
        }

        Commands::Status => {
            println!("{}", "Queue Status".cyan().bold());
            println!();
            for status in [
                JobStatus::Queued,
                JobStatus::TestConnection,
                JobStatus::Processing,
                JobStatus::Done,
                JobStatus::Error,
            ] {
                let count = repo.count_by_status(status).await?;
                println!("  {:<18} {}", format!("{}:", colored_status(status)), count);
            }
        }
    }

    Ok(())
}
