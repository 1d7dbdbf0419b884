use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

mod alerts;
mod db;
mod metrics;
mod models;
mod report;
mod snapshot;
#[cfg(test)]
mod testutil;

use models::SnapshotOptions;

#[derive(Parser)]
#[command(name = "appointment-oversight")]
#[command(about = "Appointment oversight analytics and fraud signals for the salon platform", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import appointment rows from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Compute the oversight snapshot and print it
    Snapshot {
        #[arg(long, default_value_t = 30)]
        window_days: i64,
        #[arg(long, default_value_t = 300)]
        appointment_limit: i64,
        #[arg(long, default_value_t = 60)]
        recent_limit: i64,
        /// Emit the full snapshot as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report from a fresh snapshot
    Report {
        #[arg(long, default_value_t = 30)]
        window_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
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
            println!("Inserted {inserted} appointments from {}.", csv.display());
        }
        Commands::Snapshot {
            window_days,
            appointment_limit,
            recent_limit,
            json,
        } => {
            let options = SnapshotOptions {
                window_in_days: window_days,
                appointment_limit,
                recent_limit,
            };
            let snapshot = snapshot::build_snapshot(&pool, options).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!(
                    "{} appointments in the last {window_days} days: {} completed, {} cancelled, {} no-shows",
                    snapshot.totals.total,
                    snapshot.totals.completed,
                    snapshot.totals.cancelled,
                    snapshot.totals.no_show
                );
                println!(
                    "Completion rate {:.0}%, revenue ${:.2}",
                    snapshot.performance.completion_rate * 100.0,
                    snapshot.performance.total_revenue
                );
                for alert in snapshot.fraud_alerts.iter().take(10) {
                    println!("- [{:.2}] {}", alert.score, alert.summary);
                }
                if snapshot.fraud_alerts.is_empty() {
                    println!("No fraud signals for this window.");
                }
            }
        }
        Commands::Report { window_days, out } => {
            let options = SnapshotOptions {
                window_in_days: window_days,
                ..SnapshotOptions::default()
            };
            let snapshot = snapshot::build_snapshot(&pool, options).await;
            let report = report::build_report(&snapshot);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
