//! roast-import: batch importer and roast list for Artisan logs

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use roastlog::{BatchStatus, RoastFilter, RoastLevel};
use roastlog_importer::report::{render_summaries, write_report, ReportFormat};
use roastlog_importer::{discover_logs, run_import, Config, DuplicatePolicy, RoastStore};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "roast-import", version, about = "Import and list Artisan roast logs")]
struct Cli {
    /// Record store directory (overrides store.dir)
    #[arg(long, value_name = "DIR", global = true)]
    store_dir: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import .alog files or directories of them
    Import(ImportArgs),
    /// List stored roasts, newest first
    List(ListArgs),
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Files or directories to import
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Files parsed at the same time
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,

    /// Keep stored roasts whose id shows up again
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "update_existing")]
    skip_existing: bool,

    /// Overwrite stored roasts whose id shows up again
    #[arg(long, action = ArgAction::SetTrue)]
    update_existing: bool,

    /// Write the per-file report here (.csv or .json)
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Earliest roast date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    from: Option<NaiveDate>,

    /// Latest roast date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    to: Option<NaiveDate>,

    /// Bean description contains
    #[arg(long)]
    beans: Option<String>,

    /// light, medium-light, medium, medium-dark or dark
    #[arg(long)]
    level: Option<RoastLevel>,

    /// Title, beans or operator contains
    #[arg(long)]
    search: Option<String>,

    /// Print CSV instead of JSON
    #[arg(long, action = ArgAction::SetTrue)]
    csv: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roast_import=info,roastlog_importer=info,roastlog=info".into()),
        )
        .with(cli.log_json.then(|| fmt::layer().json()))
        .with((!cli.log_json).then(fmt::layer))
        .init();

    let mut config = Config::load()?;
    if let Some(dir) = &cli.store_dir {
        config.store.dir = dir.display().to_string();
    }
    if let Commands::Import(args) = &cli.command {
        if let Some(n) = args.concurrency {
            config.import.concurrency = n;
        }
        if args.skip_existing {
            config.import.skip_existing = true;
        } else if args.update_existing {
            config.import.skip_existing = false;
        }
    }
    config.validate()?;

    tracing::info!("Environment: {}", config.environment);
    let mut store = RoastStore::open(&config.store.dir)?;

    match cli.command {
        Commands::Import(args) => {
            let files = discover_logs(&args.paths)?;
            tracing::info!("Importing {} files into {}", files.len(), config.store.dir);

            let policy = if config.import.skip_existing {
                DuplicatePolicy::Skip
            } else {
                DuplicatePolicy::Update
            };
            let report = run_import(
                files,
                &mut store,
                Arc::new(config.engine.clone()),
                config.import.concurrency as usize,
                policy,
            )
            .await;

            if let Some(path) = &args.report {
                write_report(&report, path)?;
            }
            for outcome in &report.results {
                let detail = outcome
                    .error
                    .as_deref()
                    .or(outcome.roast_id.as_deref())
                    .unwrap_or_default();
                println!("{:<8} {} {}", outcome.status.as_str(), outcome.filename, detail);
            }
            println!(
                "{} files: {} imported, {} skipped, {} failed",
                report.summary.total, report.summary.success, report.summary.skipped, report.summary.error
            );

            Ok(match report.status() {
                BatchStatus::Created => ExitCode::SUCCESS,
                BatchStatus::PartiallyCreated => ExitCode::from(2),
                BatchStatus::Failed => ExitCode::FAILURE,
            })
        }
        Commands::List(args) => {
            let filter = RoastFilter {
                date_from: args.from,
                date_to: args.to,
                beans: args.beans,
                roast_level: args.level,
                search: args.search,
            };
            let format = if args.csv { ReportFormat::Csv } else { ReportFormat::Json };
            println!("{}", render_summaries(&store.summaries(&filter), format)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
