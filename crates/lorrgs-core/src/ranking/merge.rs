//! Deduplicating merge of raw ranking records into a report collection.

use std::collections::HashSet;

use crate::catalog::SpecCatalog;
use crate::models::{CharacterRanking, RankingRequest, Report};
use crate::ranking::ingest::{ingest_ranking, IngestStats};

/// `(report_id, attempt_id, contestant name)`.
pub type DedupKey = (String, i64, String);

/// Every dedup key present in `reports`.
pub fn existing_keys(reports: &[Report]) -> HashSet<DedupKey> {
    let mut keys = HashSet::new();
    for report in reports {
        for attempt in &report.attempts {
            for contestant in &attempt.contestants {
                keys.insert((
                    report.report_id.clone(),
                    attempt.attempt_id,
                    contestant.name.clone(),
                ));
            }
        }
    }
    keys
}

/// Merge `records` into `reports`, skipping any record whose dedup key is
/// already present. Each accepted record appends its own report shell, so
/// two rankers of one attempt each keep a report of their own. Existing
/// reports are never modified, removed or reordered.
pub fn merge_rankings(
    request: &RankingRequest,
    reports: &mut Vec<Report>,
    records: &[CharacterRanking],
    catalog: &SpecCatalog,
) -> IngestStats {
    let mut stats = IngestStats::default();
    let mut seen = existing_keys(reports);

    for record in records {
        if let Some(report_ref) = record.report.as_ref() {
            let key = (report_ref.code.clone(), report_ref.fight_id, record.name.clone());
            if seen.contains(&key) {
                stats.duplicates += 1;
                continue;
            }
            if !record.hidden {
                seen.insert(key);
            }
        }
        if let Some(shell) = ingest_ranking(request, record, catalog, &mut stats) {
            reports.push(shell);
        }
    }
    stats
}
