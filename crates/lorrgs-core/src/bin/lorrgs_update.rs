//! Batch updater: refresh stored leaderboards for one boss.
//!
//! ```sh
//! lorrgs-update --boss the-omega-protocol --spec ALL
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::{Timelike, Utc};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use _lorrgs_core::catalog::SpecCatalog;
use _lorrgs_core::client::http::HttpClient;
use _lorrgs_core::config::UpdaterConfig;
use _lorrgs_core::errors::LorrgsResult;
use _lorrgs_core::loader::batch::{plan_units, rotation_boss, run_batch, ALL_SPECS};
use _lorrgs_core::loader::orchestrator::{LoadOptions, RankingLoader};
use _lorrgs_core::store::database::SqliteStore;
use _lorrgs_core::store::export::JsonExporter;

#[derive(Debug, Parser)]
#[command(name = "lorrgs-update")]
struct Args {
    /// Boss slug. Without it the boss is picked by rotating through the
    /// catalog on the current UTC hour.
    #[arg(long)]
    boss: Option<String>,

    /// Spec slug, or ALL for every spec.
    #[arg(long, default_value = ALL_SPECS)]
    spec: String,

    #[arg(long)]
    difficulty: Option<String>,

    /// Reports kept per leaderboard.
    #[arg(long)]
    limit: Option<usize>,

    /// Keep previously stored reports instead of starting fresh.
    #[arg(long)]
    keep_old: bool,

    /// Skip composition and cast fetches.
    #[arg(long)]
    no_enrich: bool,

    /// Skip the JSON export.
    #[arg(long)]
    no_export: bool,

    /// Catalog overlay file.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Seconds to wait between units.
    #[arg(long)]
    pause: Option<u64>,
}

async fn run(args: Args, config: UpdaterConfig) -> LorrgsResult<()> {
    let catalog = match args.catalog.as_ref().or(config.catalog_path.as_ref()) {
        Some(path) => SpecCatalog::with_overlay(path)?,
        None => SpecCatalog::builtin(),
    };

    let started_at = Utc::now();
    let boss_slug = match args.boss {
        Some(slug) => slug,
        None => {
            let hour = started_at.hour();
            let boss = rotation_boss(&catalog, hour)?;
            info!("=== Work cycle: hour {} | boss: {} ===", hour, boss.slug);
            boss.slug.clone()
        }
    };
    let units = plan_units(&catalog, &boss_slug, &args.spec, args.difficulty.as_deref())?;

    let mut options = LoadOptions::from_config(&config);
    if let Some(limit) = args.limit {
        options.limit = Some(limit);
    }
    if args.keep_old {
        options.clear_old = false;
    }
    if args.no_enrich {
        options.enrich = false;
    }

    let client = HttpClient::new(&config)?;
    let loader = RankingLoader::new(client, catalog, options);
    let store = SqliteStore::open(&config.db_path)?;
    let exporter = JsonExporter::new(config.export_dir.clone(), config.archive_dir.clone());
    let pause = args.pause.map(Duration::from_secs).unwrap_or(config.unit_pause);

    let batch = run_batch(
        &loader,
        &store,
        (!args.no_export).then_some(&exporter),
        &units,
        pause,
        started_at,
    )
    .await;
    println!("{}", batch.summary());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match UpdaterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Failed units are reported in the summary and do not fail the process.
    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
