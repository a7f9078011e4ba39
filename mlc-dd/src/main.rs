//! mlc-dd - Main entry point
//!
//! Resolves configuration once, runs the selected mode against the media
//! library, writes the run report and appends the run to the ledger.
//!
//! Exit codes: 0 completed run, 2 setup failure, 3 coverage gate refusal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mlc_common::config::{config_file_path, load_or_default};
use mlc_common::db::init_database;
use mlc_dd::clients::{HttpLibraryClient, HttpRecordStore, MediaLibrary, RecordStore};
use mlc_dd::config::{ConfigOverrides, EngineConfig};
use mlc_dd::db::{record_run, RunRow, RunStatus};
use mlc_dd::error::{EngineError, EXIT_COVERAGE, EXIT_OK, EXIT_SETUP};
use mlc_dd::models::{ResolutionOutcome, RunMode};
use mlc_dd::services::{build_report, Report, RunContext};
use mlc_dd::workflow::{FpSyncWorkflow, MergeWorkflow, ResolutionExecutor};

const DEFAULT_LOG_FILTER: &str = "mlc_dd=info,mlc_common=info";

/// Command-line arguments for mlc-dd
#[derive(Parser, Debug)]
#[command(name = "mlc-dd")]
#[command(about = "Duplicate detection and resolution for a media library")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (default: <config dir>/mlc/config.toml)
    #[arg(long, global = true, env = "MLC_CONFIG")]
    config: Option<PathBuf>,

    /// Media library API base URL
    #[arg(long, global = true, env = "MLC_LIBRARY_API_URL")]
    library_api_url: Option<String>,

    /// Media library API token
    #[arg(long, global = true, env = "MLC_LIBRARY_API_TOKEN", hide_env_values = true)]
    library_api_token: Option<String>,

    /// Root folder of the active library
    #[arg(long, global = true, env = "MLC_LIBRARY_PATH")]
    library_path: Option<PathBuf>,

    /// Perform mutations (default is a dry-run)
    #[arg(long, global = true)]
    live: bool,

    /// Directory for run reports
    #[arg(long, global = true, env = "MLC_REPORT_DIR")]
    report_dir: Option<PathBuf>,

    /// Do not append this run to the run ledger
    #[arg(long, global = true)]
    no_ledger: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find duplicate groups and optionally trash redundant items
    Dedup(MatchArgs),

    /// Import a previous library into the active one
    Merge {
        /// Folder of the library to merge from
        #[arg(long)]
        previous_library: PathBuf,

        #[command(flatten)]
        matching: MatchArgs,
    },

    /// Compute and store content fingerprints
    FpSync {
        /// Overwrite fingerprint tags and metadata that disagree
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct MatchArgs {
    /// Fuzzy tier similarity threshold
    #[arg(long, env = "MLC_MIN_SIMILARITY")]
    threshold: Option<f64>,

    /// Minimum fingerprint coverage
    #[arg(long, env = "MLC_MIN_COVERAGE")]
    min_coverage: Option<f64>,

    /// Run even when fingerprint coverage is below the minimum
    #[arg(long)]
    no_require_coverage: bool,

    /// Move redundant items to the library trash (requires --live)
    #[arg(long)]
    cleanup: bool,
}

impl Cli {
    fn mode(&self) -> RunMode {
        match self.command {
            Command::Dedup(_) => RunMode::Dedup,
            Command::Merge { .. } => RunMode::Merge,
            Command::FpSync { .. } => RunMode::FpSync,
        }
    }

    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            library_api_url: self.library_api_url.clone(),
            library_api_token: self.library_api_token.clone(),
            library_path: self.library_path.clone(),
            live: self.live,
            report_dir: self.report_dir.clone(),
            no_ledger: self.no_ledger,
            ..Default::default()
        };

        let matching = match &self.command {
            Command::Dedup(matching) | Command::Merge { matching, .. } => Some(matching),
            Command::FpSync { force } => {
                overrides.force_tag = *force;
                None
            }
        };
        if let Some(matching) = matching {
            overrides.min_similarity = matching.threshold;
            overrides.min_coverage = matching.min_coverage;
            overrides.require_coverage = matching.no_require_coverage.then_some(false);
            overrides.cleanup = matching.cleanup;
        }
        overrides
    }
}

fn init_tracing(level: Option<&str>) {
    let default_filter = level.unwrap_or(DEFAULT_LOG_FILTER).to_string();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            EXIT_SETUP
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config.clone().or_else(config_file_path);
    let loaded = load_or_default(config_path.as_deref());
    init_tracing(
        loaded
            .as_ref()
            .ok()
            .and_then(|l| l.config.logging.level.as_deref()),
    );
    let loaded = loaded.context("Failed to load configuration file")?;
    loaded.origin.log();
    let toml = loaded.config;

    let mode = cli.mode();
    info!(mode = %mode, version = env!("CARGO_PKG_VERSION"), "Starting mlc-dd");

    let config =
        EngineConfig::resolve(cli.overrides(), &toml).context("Invalid configuration")?;
    if config.execution.cleanup && config.execution.dry_run {
        warn!("--cleanup has no effect without --live");
    }

    let library: Arc<dyn MediaLibrary> = Arc::new(
        HttpLibraryClient::new(&config.library).context("Failed to build library client")?,
    );

    let context = RunContext::new(mode, config.execution.dry_run);
    let now = context.started_at;

    let result = match &cli.command {
        Command::Dedup(_) => {
            ResolutionExecutor::new(library, &config, now)
                .run(&context)
                .await
        }
        Command::Merge {
            previous_library, ..
        } => {
            MergeWorkflow::new(library, &config, now)
                .run(&context, previous_library)
                .await
        }
        Command::FpSync { .. } => {
            let records = match &config.record_store {
                Some(settings) => Some(Arc::new(
                    HttpRecordStore::new(
                        settings.clone(),
                        config.library.timeout,
                        config.library.max_attempts,
                    )
                    .context("Failed to build record store client")?,
                ) as Arc<dyn RecordStore>),
                None => None,
            };
            FpSyncWorkflow::new(library, records, &config)
                .run(&context)
                .await
        }
    };

    let (report, status, code) = match result {
        Ok(report) => (report, RunStatus::Completed, EXIT_OK),
        Err(EngineError::Coverage(coverage)) => {
            error!(
                ratio = coverage.ratio,
                min_coverage = coverage.min_coverage,
                missing = coverage.items_missing.len(),
                "Coverage gate refused the run; nothing was changed"
            );
            let scanned = coverage.total + coverage.excluded;
            let outcome = ResolutionOutcome::planned(config.execution.dry_run);
            let report = build_report(&context, scanned, &[], &outcome).with_coverage(coverage);
            (report, RunStatus::CoverageRefused, EXIT_COVERAGE)
        }
        Err(e) => {
            error!(error = %e, "Run aborted");
            return Ok(e.exit_code());
        }
    };

    let text_path = match report.write_to(&config.report_dir) {
        Ok((text_path, _)) => Some(text_path),
        Err(e) => {
            error!(error = %e, dir = %config.report_dir.display(), "Failed to write report");
            None
        }
    };
    println!("{}", report.render_text());

    if let Some(ledger_path) = &config.ledger_path {
        append_to_ledger(ledger_path, &report, status, text_path.as_deref()).await;
    }

    Ok(code)
}

/// Ledger failures are logged and never change the exit code
async fn append_to_ledger(ledger_path: &Path, report: &Report, status: RunStatus, report_path: Option<&Path>) {
    let row = RunRow::from_report(report, status, report_path);
    let result = async {
        let pool = init_database(ledger_path).await?;
        record_run(&pool, &row).await?;
        pool.close().await;
        Ok::<(), mlc_common::Error>(())
    }
    .await;

    if let Err(e) = result {
        warn!(error = %e, ledger = %ledger_path.display(), "Failed to record run in ledger");
    }
}
