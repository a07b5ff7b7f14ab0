//! Python bindings. Thin `#[pyfunction]` wrappers over the pure functions.

use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

use crate::catalog::SpecCatalog;
use crate::errors::LorrgsResult;
use crate::models::{RankingRequest, SpecRanking, DEFAULT_DIFFICULTY, DEFAULT_METRIC};
use crate::ranking::reconcile::reconcile_snapshot;

/// Parse both documents, reconcile, and serialize the updated ranking.
pub fn reconcile_rankings_impl(
    ranking_json: &str,
    query_result_json: &str,
    limit: Option<usize>,
) -> LorrgsResult<String> {
    let mut ranking: SpecRanking = serde_json::from_str(ranking_json)?;
    let result: serde_json::Value = serde_json::from_str(query_result_json)?;
    reconcile_snapshot(&mut ranking, &result, &SpecCatalog::builtin(), limit)?;
    Ok(serde_json::to_string(&ranking)?)
}

#[pyfunction]
fn normalize_name(raw: &str) -> String {
    crate::ranking::identity::normalize_name(raw)
}

#[pyfunction]
fn difficulty_id(name: &str) -> i64 {
    crate::ranking::query::difficulty_id(name)
}

#[pyfunction]
#[pyo3(signature = (spec_slug, boss_slug, difficulty = DEFAULT_DIFFICULTY, metric = DEFAULT_METRIC))]
fn ranking_key(spec_slug: &str, boss_slug: &str, difficulty: &str, metric: &str) -> String {
    RankingRequest::new(spec_slug, boss_slug, difficulty, metric).key()
}

#[pyfunction]
#[pyo3(signature = (ranking_json, query_result_json, limit = None))]
fn reconcile_rankings(
    ranking_json: &str,
    query_result_json: &str,
    limit: Option<usize>,
) -> PyResult<String> {
    Ok(reconcile_rankings_impl(ranking_json, query_result_json, limit)?)
}

#[pymodule]
fn _lorrgs_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("DEFAULT_DIFFICULTY", DEFAULT_DIFFICULTY)?;
    m.add("DEFAULT_METRIC", DEFAULT_METRIC)?;
    m.add("METRIC_TOLERANCE", crate::ranking::manifest::METRIC_TOLERANCE)?;

    m.add_function(wrap_pyfunction!(normalize_name, m)?)?;
    m.add_function(wrap_pyfunction!(difficulty_id, m)?)?;
    m.add_function(wrap_pyfunction!(ranking_key, m)?)?;
    m.add_function(wrap_pyfunction!(reconcile_rankings, m)?)?;
    Ok(())
}
