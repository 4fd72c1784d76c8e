use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod api;
mod classify;
mod config;
mod db;
mod error;
mod media;
mod models;
mod notify;
mod preprocess;
mod progress;
mod report;
mod risk;
mod trends;

use config::Settings;

#[derive(Parser)]
#[command(name = "caremind-companion")]
#[command(about = "Companion care backend for journal emotion scoring and weekly progress tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve,
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import task events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Compute the current weekly score for a patient
    #[command(group(
        ArgGroup::new("who")
            .args(["id", "email"])
            .required(true)
            .multiple(false)
    ))]
    Score {
        #[arg(long)]
        id: Option<Uuid>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Generate a markdown weekly report for a patient
    #[command(group(
        ArgGroup::new("who")
            .args(["id", "email"])
            .required(true)
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        id: Option<Uuid>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

async fn resolve_patient(
    pool: &sqlx::PgPool,
    id: Option<Uuid>,
    email: Option<&str>,
) -> anyhow::Result<models::Patient> {
    let patient = match (id, email) {
        (Some(id), _) => db::fetch_patient(pool, id).await?,
        (None, Some(email)) => db::fetch_patient_by_email(pool, email).await?,
        (None, None) => None,
    };
    patient.context("no matching patient")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("caremind_companion=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::Serve => {
            let media = settings.media.clone().map(media::MediaClient::new);
            let state = api::AppState { pool, media };
            api::serve(state, settings.bind_addr).await?;
        }
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} task events from {}.", csv.display());
        }
        Commands::Score { id, email } => {
            let patient = resolve_patient(&pool, id, email.as_deref()).await?;
            let score = report::weekly_score_snapshot(&pool, patient.id, Utc::now()).await?;

            println!(
                "{} ({}) scored {:.1}/100 this week ({})",
                patient.full_name,
                patient.email,
                score.score,
                score.patient_state.as_str()
            );
            for (task_type, tally) in score.breakdown.iter() {
                println!(
                    "- {}: {}/{} completed, {} missed",
                    task_type, tally.completed, tally.total, tally.missed
                );
            }
        }
        Commands::Report { id, email, out } => {
            let patient = resolve_patient(&pool, id, email.as_deref()).await?;
            let now = Utc::now();
            let weekly = report::weekly_progress_report(&pool, patient.id, now).await?;

            let week_start = now - Duration::days(7);
            let entries =
                db::fetch_journal_entries(&pool, patient.id, Some(week_start), Some(now), None)
                    .await?;
            let emotion_trends = trends::emotion_trends(patient.id, &entries, 7, week_start, now);

            let markdown = report::build_markdown_report(&patient, &weekly, &emotion_trends);
            std::fs::write(&out, markdown)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
