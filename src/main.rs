#![allow(clippy::result_large_err)]

use chrono::{Days, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use finuch_recurring::{
    config::{database, settings},
    core::{
        cadence::DateWindow,
        generator::{self, GenerationRun},
        migrate::{self, MigrationReport},
        reconcile::{self, DuplicateReport, ReconciliationReport, RepairReport},
        summary,
    },
    errors::{Error, Result},
    store::{SeaOrmStore, list_companies},
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "finuch-recurring",
    about = "Generate, check and repair recurring operations."
)]
struct Cli {
    /// Settings file (default: ./finuch.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Only process this company; repeatable
    #[arg(long = "company", global = true)]
    companies: Vec<String>,
    /// Print JSON instead of the text report
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Report templates without instances, unconfirmed first occurrences and unmigrated repeating operations (default).
    Check,
    /// Confirm unconfirmed first occurrences.
    Repair,
    /// Create missing instances up to a date.
    Generate {
        /// First date to generate for: YYYY-MM-DD (default: each template's anchor)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last date to generate for: YYYY-MM-DD (default: today plus the configured lookahead)
        #[arg(long)]
        until: Option<NaiveDate>,
    },
    /// List dates that hold more than one instance of a template.
    Duplicates,
    /// Turn repeating operations that predate templates into templates.
    Migrate,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Report {
    Check(ReconciliationReport),
    Repair(RepairReport),
    Generate(GenerationRun),
    Duplicates(DuplicateReport),
    Migrate(MigrationReport),
}

impl Report {
    fn render_text(&self) -> String {
        match self {
            Self::Check(report) => summary::format_check_report(report),
            Self::Repair(report) => summary::format_repair_report(report),
            Self::Generate(run) => summary::format_generation_run(run),
            Self::Duplicates(report) => summary::format_duplicate_report(report),
            Self::Migrate(report) => summary::format_migration_report(report),
        }
    }
}

fn generation_window(
    from: Option<NaiveDate>,
    until: Option<NaiveDate>,
    lookahead_days: u32,
) -> Result<DateWindow> {
    let until = match until {
        Some(until) => until,
        None => Utc::now()
            .date_naive()
            .checked_add_days(Days::new(u64::from(lookahead_days)))
            .ok_or_else(|| Error::Config {
                message: format!("lookahead of {lookahead_days} days is out of range"),
            })?,
    };

    match from {
        Some(from) => DateWindow::new(from, until),
        None => Ok(DateWindow::through(until)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing; stdout is reserved for the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();

    let cli = Cli::parse();

    // 3. Settings and database
    let settings = settings::load_or_default(cli.config.as_deref())
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;

    let db = database::create_connection()
        .await
        .inspect(|_| info!("Database connection established."))
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    // 4. Resolve tenants: CLI, then settings, then every company with recurring rows
    let companies = if !cli.companies.is_empty() {
        cli.companies
    } else if !settings.companies.is_empty() {
        settings.companies.clone()
    } else {
        list_companies(&db).await?
    };
    if companies.is_empty() {
        info!("No companies with recurring operations found");
    }

    // 5. Run the command once per company
    let command = cli.command.unwrap_or(Commands::Check);
    let mut reports = Vec::with_capacity(companies.len());
    for company_id in &companies {
        let store = SeaOrmStore::new(db.clone(), company_id.as_str());
        let report = match command {
            Commands::Check => Report::Check(reconcile::check(&store, &settings.policy).await?),
            Commands::Repair => Report::Repair(reconcile::repair(&store, &settings.policy).await?),
            Commands::Generate { from, until } => {
                let window =
                    generation_window(from, until, settings.generation.lookahead_days)?;
                Report::Generate(generator::generate_all(&store, window, &settings.policy).await?)
            }
            Commands::Duplicates => Report::Duplicates(reconcile::find_duplicates(&store).await?),
            Commands::Migrate => Report::Migrate(migrate::migrate_legacy(&store).await?),
        };
        reports.push(report);
    }

    if cli.json {
        println!("{}", summary::to_json(&reports)?);
    } else {
        for report in &reports {
            println!("{}\n", report.render_text());
        }
    }

    Ok(())
}
