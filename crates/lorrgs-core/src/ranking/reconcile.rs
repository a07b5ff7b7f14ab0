//! The reconciliation steps shared by online loads and offline snapshots.

use chrono::Utc;
use serde_json::Value;

use crate::catalog::SpecCatalog;
use crate::errors::LorrgsResult;
use crate::models::{CharacterRanking, RankingRequest, Report, SpecRanking};
use crate::ranking::ingest::IngestStats;
use crate::ranking::manifest::{EnforcementStats, Manifest};
use crate::ranking::merge::merge_rankings;
use crate::ranking::query::parse_rankings_result;
use crate::ranking::sort::{apply_limit, sort_reports};

/// Merge fresh records, capture the manifest, rank and truncate.
///
/// The manifest is captured before sorting so it reflects the leaderboard
/// order as fetched.
pub fn stage_records(
    request: &RankingRequest,
    reports: &mut Vec<Report>,
    records: &[CharacterRanking],
    catalog: &SpecCatalog,
    limit: Option<usize>,
) -> (IngestStats, Manifest) {
    let ingest = merge_rankings(request, reports, records, catalog);
    let manifest = Manifest::capture(reports);
    sort_reports(reports);
    apply_limit(reports, limit);
    (ingest, manifest)
}

/// Enforce the manifest and re-rank.
pub fn settle(reports: &mut [Report], manifest: &Manifest, target_spec_slug: &str) -> EnforcementStats {
    let stats = manifest.enforce(reports, target_spec_slug);
    sort_reports(reports);
    stats
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotStats {
    pub ingest: IngestStats,
    pub enforcement: EnforcementStats,
}

/// Reconcile an already fetched rankings result into `ranking` without
/// enrichment. Existing reports are kept.
pub fn reconcile_snapshot(
    ranking: &mut SpecRanking,
    result: &Value,
    catalog: &SpecCatalog,
    limit: Option<usize>,
) -> LorrgsResult<SnapshotStats> {
    let request = ranking.request();
    let records = parse_rankings_result(result)?;
    let (ingest, manifest) = stage_records(&request, &mut ranking.reports, &records, catalog, limit);
    let enforcement = settle(&mut ranking.reports, &manifest, &request.spec_slug);
    ranking.dirty = false;
    ranking.updated = Utc::now();
    Ok(SnapshotStats {
        ingest,
        enforcement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_keeps_existing_and_limits() {
        let request = RankingRequest::new("sage-sage", "the-omega-protocol", "ultimate", "rdps");
        let mut ranking = SpecRanking::new(&request);
        let result = json!({"worldData": {"encounter": {
            "global": {"rankings": [
                {"name": "A-S", "amount": 10.0, "report": {"code": "R1", "fightID": 1, "startTime": 0}},
                {"name": "B-S", "amount": 30.0, "report": {"code": "R2", "fightID": 1, "startTime": 0}},
                {"name": "C-S", "amount": 20.0, "report": {"code": "R3", "fightID": 1, "startTime": 0}}
            ]}
        }}});

        let stats = reconcile_snapshot(&mut ranking, &result, &SpecCatalog::builtin(), Some(2)).unwrap();
        assert_eq!(stats.ingest.ingested, 3);
        assert_eq!(stats.enforcement.enforced, 2);
        let ids: Vec<&str> = ranking.reports.iter().map(|r| r.report_id.as_str()).collect();
        assert_eq!(ids, vec!["R2", "R3"]);

        // Re-applying the same payload adds nothing.
        let again = reconcile_snapshot(&mut ranking, &result, &SpecCatalog::builtin(), None).unwrap();
        assert_eq!(again.ingest.ingested, 1);
        assert_eq!(again.ingest.duplicates, 2);
        assert_eq!(ranking.reports.len(), 3);
    }
}
