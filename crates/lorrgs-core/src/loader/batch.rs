//! Batch updates over many `(spec, boss)` units.
//!
//! Each unit loads its stored ranking, runs one load cycle, exports and
//! saves it. A failing unit is logged and recorded; the batch always runs
//! to the end.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::catalog::{BossDef, SpecCatalog};
use crate::client::GraphQlClient;
use crate::errors::{LorrgsError, LorrgsResult};
use crate::loader::orchestrator::{LoadReport, RankingLoader};
use crate::models::{RankingRequest, SpecRanking, DEFAULT_DIFFICULTY};
use crate::store::export::JsonExporter;
use crate::store::RankingStore;

/// Spec argument selecting every known spec.
pub const ALL_SPECS: &str = "ALL";

/// Expand a spec argument (`ALL` or one slug) into requests for `boss_slug`,
/// ordered by spec slug.
pub fn plan_units(
    catalog: &SpecCatalog,
    boss_slug: &str,
    spec_arg: &str,
    difficulty: Option<&str>,
) -> LorrgsResult<Vec<RankingRequest>> {
    catalog.require_boss(boss_slug)?;
    let difficulty = difficulty.unwrap_or(DEFAULT_DIFFICULTY);
    let specs = if spec_arg.eq_ignore_ascii_case(ALL_SPECS) {
        catalog.all_specs()
    } else {
        vec![catalog.require_spec(spec_arg)?]
    };
    Ok(specs
        .into_iter()
        .map(|spec| RankingRequest::new(spec.full_name_slug(), boss_slug, difficulty, spec.metric.clone()))
        .collect())
}

/// Boss for the given UTC hour when cycling through the catalog's bosses.
pub fn rotation_boss(catalog: &SpecCatalog, hour: u32) -> LorrgsResult<&BossDef> {
    if catalog.bosses.is_empty() {
        return Err(LorrgsError::Config("no bosses configured for rotation".to_string()));
    }
    Ok(&catalog.bosses[hour as usize % catalog.bosses.len()])
}

#[derive(Clone, Debug, PartialEq)]
pub enum UnitOutcome {
    Updated { reports: usize, contestants: usize },
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnitResult {
    pub key: String,
    pub outcome: UnitOutcome,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub units: Vec<UnitResult>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.units
            .iter()
            .filter(|u| matches!(u.outcome, UnitOutcome::Updated { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.units.len() - self.succeeded()
    }

    pub fn summary(&self) -> String {
        let mut text = format!(
            "Batch finished: {} succeeded, {} failed",
            self.succeeded(),
            self.failed()
        );
        for unit in &self.units {
            if let UnitOutcome::Failed(reason) = &unit.outcome {
                let _ = write!(text, "\n  - {}: {}", unit.key, reason);
            }
        }
        text
    }
}

// The store is only written once the export went through, so a failed
// unit leaves both untouched.
async fn run_unit<C, S>(
    loader: &RankingLoader<C>,
    store: &S,
    exporter: Option<&JsonExporter>,
    request: &RankingRequest,
    started_at: DateTime<Utc>,
) -> LorrgsResult<LoadReport>
where
    C: GraphQlClient,
    S: RankingStore + ?Sized,
{
    let mut ranking = SpecRanking::load_or_create(store, request)?;
    let report = loader.load(&mut ranking).await?;
    if let Some(exporter) = exporter {
        exporter.export_at(&ranking, started_at)?;
    }
    ranking.save(store)?;
    Ok(report)
}

/// Update every unit in order, pausing `pause` between units. Archives of
/// the whole batch share the folder named after `started_at`.
pub async fn run_batch<C, S>(
    loader: &RankingLoader<C>,
    store: &S,
    exporter: Option<&JsonExporter>,
    units: &[RankingRequest],
    pause: Duration,
    started_at: DateTime<Utc>,
) -> BatchReport
where
    C: GraphQlClient,
    S: RankingStore + ?Sized,
{
    let mut batch = BatchReport::default();
    for (idx, request) in units.iter().enumerate() {
        if idx > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        let key = request.key();
        info!("[{}/{}] Updating {}...", idx + 1, units.len(), key);
        let outcome = match run_unit(loader, store, exporter, request, started_at).await {
            Ok(report) => UnitOutcome::Updated {
                reports: report.reports,
                contestants: report.contestants,
            },
            Err(e) => {
                error!("Error updating {}: {}", key, e);
                UnitOutcome::Failed(e.to_string())
            }
        };
        batch.units.push(UnitResult { key, outcome });
    }
    info!("{}", batch.summary());
    batch
}
