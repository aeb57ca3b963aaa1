use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod aggregate;
mod clock;
mod codeforces;
mod config;
mod db;
mod error;
mod models;
mod notify;
mod report;
mod scheduler;
mod store;
mod students;
mod sync;
#[cfg(test)]
mod testutil;

use clock::{Clock, SystemClock};
use codeforces::CodeforcesClient;
use config::Config;
use db::PgStudentStore;
use notify::{LogNotifier, Notifier, WebhookNotifier};
use scheduler::InactivityScheduler;
use students::NewStudent;
use sync::SyncEngine;

#[derive(Parser)]
#[command(name = "cf-student-tracker")]
#[command(about = "Codeforces activity tracker with inactivity reminders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Register a student after checking the handle on Codeforces
    AddStudent {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        handle: String,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Move a student to a new handle and resync
    SetHandle {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Turn inactivity reminders on or off for one student
    #[command(group(ArgGroup::new("mode").required(true).args(["enable", "disable"])))]
    Reminders {
        #[arg(long)]
        handle: String,
        #[arg(long)]
        enable: bool,
        #[arg(long)]
        disable: bool,
    },
    /// Refresh one student's statistics
    Sync {
        #[arg(long)]
        handle: String,
    },
    /// Run one inactivity sweep over all students now
    Sweep,
    /// Run the inactivity sweep on the configured schedule until interrupted
    Run {
        #[arg(long)]
        schedule: Option<String>,
    },
    /// Export all students to CSV
    Export {
        #[arg(long, default_value = "students.csv")]
        out: PathBuf,
    },
    /// Write a markdown progress report for one student
    Report {
        #[arg(long)]
        handle: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = Arc::new(PgStudentStore::new(pool.clone()));

    let client =
        CodeforcesClient::new(&config.cf_api_base, config.cf_max_retries, config.cf_timeout)
            .context("failed to build Codeforces client")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = Arc::new(SyncEngine::new(
        Arc::new(client),
        store.clone(),
        clock.clone(),
        config.cf_submission_count,
    ));

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::AddStudent {
            name,
            email,
            handle,
            phone,
        } => {
            let student = students::register(
                &engine,
                NewStudent {
                    name: &name,
                    email: &email,
                    phone: phone.as_deref(),
                    handle: &handle,
                },
            )
            .await?;
            println!(
                "Registered {} ({}) at rating {} (max {}).",
                student.name, handle, student.current_rating, student.max_rating
            );
        }
        Commands::SetHandle { from, to } => {
            let student = students::change_handle(&engine, &from, &to).await?;
            println!(
                "{} now tracked as {}.",
                student.name,
                student.handle.as_deref().unwrap_or(&to)
            );
        }
        Commands::Reminders {
            handle,
            enable,
            disable: _,
        } => {
            let student = students::set_reminders(&engine, &handle, enable).await?;
            let state = if student.reminders_disabled { "off" } else { "on" };
            println!("Reminders for {} ({handle}) are {state}.", student.name);
        }
        Commands::Sync { handle } => {
            let student = engine.sync(&handle).await?;
            let solved = student.statistics.as_ref().map_or(0, |s| s.total_solved);
            println!(
                "{} ({}): rating {} (max {}), {} problems solved.",
                student.name, handle, student.current_rating, student.max_rating, solved
            );
        }
        Commands::Sweep => {
            let scheduler = InactivityScheduler::new(engine, notifier(&config)?);
            let summary = scheduler.sweep().await;
            println!(
                "Swept {} students: {} synced, {} failed, {} notified, {} active again.",
                summary.students, summary.synced, summary.failed, summary.notified, summary.rearmed
            );
        }
        Commands::Run { schedule } => {
            let schedule = schedule.unwrap_or_else(|| config.sweep_cron.clone());
            let scheduler = Arc::new(InactivityScheduler::new(engine, notifier(&config)?));
            scheduler
                .start(&schedule)
                .await
                .with_context(|| format!("failed to schedule sweep with {schedule:?}"))?;

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl+C")?;
            info!("received Ctrl+C, shutting down");
            scheduler.stop().await?;
        }
        Commands::Export { out } => {
            let written = db::export_csv(&store, &out).await?;
            println!("Exported {written} students to {}.", out.display());
        }
        Commands::Report { handle, out } => {
            let student = engine.sync(&handle).await?;
            let report = report::build_report(&student, clock.today());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    match &config.notify_webhook_url {
        Some(url) => {
            let notifier = WebhookNotifier::new(
                url.clone(),
                &config.notify_from,
                config.cf_max_retries,
                config.cf_timeout,
            )
            .context("failed to build notification client")?;
            Ok(Arc::new(notifier))
        }
        None => {
            info!("NOTIFY_WEBHOOK_URL not set, notifications are only logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}
