use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod assign;
mod config;
mod db;
mod models;
mod report;
mod schedule;
mod upload;

#[derive(Parser)]
#[command(name = "studyhall-export")]
#[command(about = "Nightly study hall / commons assignment export", long_about = None)]
struct Cli {
    /// Report file to write and upload
    #[arg(long, default_value = "studyhalls.txt")]
    out: PathBuf,
    /// Diagnostic log for this run
    #[arg(long, default_value = "studyhall_log.txt")]
    log_file: PathBuf,
    /// Resolve terms as of this date (evaluated at 12:00) instead of now
    #[arg(long)]
    as_of: Option<NaiveDate>,
    /// Write the report locally without uploading it
    #[arg(long)]
    skip_upload: bool,
}

fn init_tracing(log_file: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(log_file)
        .with_context(|| format!("failed to create {}", log_file.display()))?;

    let console_filter =
        EnvFilter::try_from_env("STUDYHALL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer().with_filter(console_filter);
    let log = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(EnvFilter::new("info,studyhall_export=debug"));

    tracing_subscriber::registry()
        .with(console)
        .with(log)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}

fn run_time(as_of: Option<NaiveDate>) -> NaiveDateTime {
    match as_of {
        Some(date) => date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)),
        None => chrono::Local::now().naive_local(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_file)?;

    let settings = config::Settings::from_env(!cli.skip_upload)?;
    tracing::info!(
        user = %settings.database.user,
        server = %settings.database.connection,
        "connecting to database"
    );
    if let Some(sftp) = &settings.sftp {
        tracing::info!(user = %sftp.user, host = %sftp.host, port = sftp.port, "sftp target");
    }

    let pool = db::connect(&settings.database).await?;
    let version = db::server_version(&pool).await?;
    tracing::info!(%version, "connection established");

    let now = run_time(cli.as_of);
    tracing::info!(today = %now, "resolving current terms");

    let students = db::fetch_students(&pool).await?;
    tracing::info!(count = students.len(), "students loaded");

    let source = db::PgSchoolData::new(&pool);
    let (lines, summary) = assign::build_lines(&source, &students, now).await;
    pool.close().await;

    report::write_report(&cli.out, &lines)?;
    tracing::info!(
        path = %cli.out.display(),
        processed = summary.processed,
        assigned = summary.assigned,
        blank = summary.blank,
        errors = summary.errors,
        "report written"
    );

    match settings.sftp {
        Some(sftp) => {
            let local = cli.out.clone();
            let target = tokio::task::spawn_blocking(move || upload::upload(&sftp, &local))
                .await
                .context("upload task failed")??;
            tracing::info!(
                remote = %target.display(),
                today = %now,
                "schedule file placed on remote server"
            );
        }
        None => tracing::info!("upload skipped"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_of_date_runs_at_noon() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 18).unwrap();
        assert_eq!(
            run_time(Some(date)),
            date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap())
        );
    }

    #[test]
    fn cli_defaults_match_nightly_job() {
        let cli = Cli::parse_from(["studyhall-export"]);
        assert_eq!(cli.out, PathBuf::from("studyhalls.txt"));
        assert_eq!(cli.log_file, PathBuf::from("studyhall_log.txt"));
        assert!(cli.as_of.is_none());
        assert!(!cli.skip_upload);
    }

    #[test]
    fn cli_accepts_overrides() {
        let cli = Cli::parse_from([
            "studyhall-export",
            "--out",
            "/tmp/sh.txt",
            "--as-of",
            "2026-08-18",
            "--skip-upload",
        ]);
        assert_eq!(cli.out, PathBuf::from("/tmp/sh.txt"));
        assert_eq!(cli.as_of, NaiveDate::from_ymd_opt(2026, 8, 18));
        assert!(cli.skip_upload);
    }
}
