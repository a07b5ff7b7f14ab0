//! Primary-contestant manifest for one load cycle.
//!
//! The manifest is captured right after the rankings fetch, while each
//! attempt's position 0 is still the ranked contestant with the metric the
//! leaderboard reported. Enrichment may append contestants, reorder them, or
//! overwrite metrics from a separate source; enforcement puts the captured
//! identity and metric back in charge. The manifest lives only for the
//! duration of one load call and is never persisted.
//!
//! Several ranked contestants can share one `(report_id, attempt_id)`, each
//! with a report of its own. Their entries are kept side by side and every
//! attempt is matched to the ranker that leads it.

use indexmap::IndexMap;

use crate::models::{Contestant, Report};
use crate::ranking::identity::{find_contestant, NAME_MATCH_ORDER};

/// Metric drift tolerated before the captured value is restored.
pub const METRIC_TOLERANCE: f64 = 0.1;

/// `(report_id, attempt_id)`.
pub type ManifestKey = (String, i64);

#[derive(Clone, Debug, PartialEq)]
pub struct ManifestEntry {
    pub name: String,
    pub metric: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnforcementStats {
    /// Attempts whose ranker was found and enforced.
    pub enforced: usize,
    /// Rankers whose metric drifted past the tolerance and was restored.
    pub restored: usize,
    /// Other target-spec contestants whose metric was forced to zero.
    pub suppressed: usize,
    /// Attempts with no captured entry.
    pub missing_entry: usize,
    /// Attempts whose captured name matched no contestant.
    pub unmatched: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Manifest {
    entries: IndexMap<ManifestKey, Vec<ManifestEntry>>,
}

/// The captured ranker an attempt belongs to, and its index.
///
/// A lone entry is looked up by name. When rankers share the attempt key,
/// the entry naming the attempt's lead contestant wins, then the first
/// captured entry found in the attempt.
fn select_ranker<'a>(
    contestants: &[Contestant],
    entries: &'a [ManifestEntry],
) -> Option<(usize, &'a ManifestEntry)> {
    if let [entry] = entries {
        return find_contestant(contestants, &entry.name).map(|(idx, _)| (idx, entry));
    }
    let lead = contestants.first()?;
    let leading = NAME_MATCH_ORDER
        .iter()
        .find_map(|matcher| entries.iter().find(|e| matcher.matches(&lead.name, &e.name)));
    if let Some(entry) = leading {
        return Some((0, entry));
    }
    entries
        .iter()
        .find_map(|entry| find_contestant(contestants, &entry.name).map(|(idx, _)| (idx, entry)))
}

impl Manifest {
    /// Snapshot position 0 of every non-empty attempt.
    pub fn capture(reports: &[Report]) -> Self {
        let mut entries: IndexMap<ManifestKey, Vec<ManifestEntry>> = IndexMap::new();
        for report in reports {
            for attempt in &report.attempts {
                if let Some(primary) = attempt.primary() {
                    entries
                        .entry((report.report_id.clone(), attempt.attempt_id))
                        .or_default()
                        .push(ManifestEntry {
                            name: primary.name.clone(),
                            metric: primary.metric_total,
                        });
                }
            }
        }
        Self { entries }
    }

    /// Number of captured rankers.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rankers captured for one attempt, in capture order.
    pub fn get(&self, report_id: &str, attempt_id: i64) -> &[ManifestEntry] {
        self.entries
            .get(&(report_id.to_string(), attempt_id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Re-establish the captured ranker of every attempt.
    ///
    /// For each attempt with an entry: locate the ranker (exact name, then
    /// normalized name), restore its metric when it drifted more than
    /// [`METRIC_TOLERANCE`], zero every other contestant of
    /// `target_spec_slug`, and sort the contestants by metric. Attempts
    /// without an entry or without a matching contestant are left as they are.
    pub fn enforce(&self, reports: &mut [Report], target_spec_slug: &str) -> EnforcementStats {
        let mut stats = EnforcementStats::default();
        for report in reports.iter_mut() {
            for attempt in report.attempts.iter_mut() {
                let entries = self.get(&report.report_id, attempt.attempt_id);
                if entries.is_empty() {
                    stats.missing_entry += 1;
                    continue;
                }
                let Some((ranker_idx, entry)) = select_ranker(&attempt.contestants, entries) else {
                    stats.unmatched += 1;
                    continue;
                };

                let ranker = &mut attempt.contestants[ranker_idx];
                if (ranker.metric_total - entry.metric).abs() > METRIC_TOLERANCE {
                    ranker.metric_total = entry.metric;
                    stats.restored += 1;
                }

                for (idx, contestant) in attempt.contestants.iter_mut().enumerate() {
                    if idx != ranker_idx
                        && contestant.class_spec_slug == target_spec_slug
                        && contestant.metric_total != 0.0
                    {
                        contestant.metric_total = 0.0;
                        stats.suppressed += 1;
                    }
                }

                attempt.sort_contestants();
                stats.enforced += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attempt, Contestant};

    const SPEC: &str = "samurai-samurai";

    fn reports() -> Vec<Report> {
        let mut attempt = Attempt::new(5, 0, 0);
        attempt.contestants = vec![
            Contestant::new("Foo-ServerA", SPEC, 1000.0),
            Contestant::new("Healer", "sage-sage", 0.0),
        ];
        let mut report = Report::new("R1", "", 0);
        report.attempts.push(attempt);
        vec![report]
    }

    #[test]
    fn test_capture_skips_empty_attempts() {
        let mut data = reports();
        data[0].attempts.push(Attempt::new(6, 0, 0));
        let manifest = Manifest::capture(&data);
        assert_eq!(manifest.len(), 1);
        let entries = manifest.get("R1", 5);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Foo-ServerA");
        assert_eq!(entries[0].metric, 1000.0);
        assert!(manifest.get("R1", 6).is_empty());
    }

    #[test]
    fn test_small_drift_is_left_alone() {
        let mut data = reports();
        let manifest = Manifest::capture(&data);
        data[0].attempts[0].contestants[0].metric_total = 1000.05;
        let stats = manifest.enforce(&mut data, SPEC);
        assert_eq!(stats.restored, 0);
        assert_eq!(data[0].attempts[0].contestants[0].metric_total, 1000.05);
    }

    #[test]
    fn test_large_drift_is_restored_exactly() {
        let mut data = reports();
        let manifest = Manifest::capture(&data);
        data[0].attempts[0].contestants[0].metric_total = 950.0;
        let stats = manifest.enforce(&mut data, SPEC);
        assert_eq!(stats.restored, 1);
        assert_eq!(data[0].attempts[0].contestants[0].metric_total, 1000.0);
    }

    #[test]
    fn test_impersonator_is_suppressed_and_ranker_moves_first() {
        let mut data = reports();
        let manifest = Manifest::capture(&data);
        // Enrichment prepends a same-spec contestant sharing the name fragment.
        data[0].attempts[0]
            .contestants
            .insert(0, Contestant::new("Foo-ServerZ", SPEC, 1500.0));
        data[0].attempts[0].contestants[1].metric_total = 700.0;

        let stats = manifest.enforce(&mut data, SPEC);
        let attempt = &data[0].attempts[0];
        assert_eq!(stats.suppressed, 1);
        assert_eq!(stats.restored, 1);
        assert_eq!(attempt.contestants[0].name, "Foo-ServerA");
        assert_eq!(attempt.contestants[0].metric_total, 1000.0);
        let impostor = attempt
            .contestants
            .iter()
            .find(|c| c.name == "Foo-ServerZ")
            .unwrap();
        assert_eq!(impostor.metric_total, 0.0);
    }

    #[test]
    fn test_normalized_match_when_server_suffix_changes() {
        let mut data = reports();
        let manifest = Manifest::capture(&data);
        data[0].attempts[0].contestants[0].name = "Foo".to_string();
        data[0].attempts[0].contestants[0].metric_total = 10.0;
        let stats = manifest.enforce(&mut data, SPEC);
        assert_eq!(stats.enforced, 1);
        assert_eq!(data[0].attempts[0].contestants[0].metric_total, 1000.0);
    }

    #[test]
    fn test_unmatched_and_missing_are_untouched() {
        let mut data = reports();
        let manifest = Manifest::capture(&data);
        data[0].attempts[0].contestants[0].name = "Someone".to_string();
        data[0].attempts[0].contestants[0].metric_total = 1.0;
        let mut extra = Attempt::new(9, 0, 0);
        extra.contestants.push(Contestant::new("X", SPEC, 5.0));
        data[0].attempts.push(extra);

        let before = data.clone();
        let stats = manifest.enforce(&mut data, SPEC);
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.missing_entry, 1);
        assert_eq!(data, before);
    }

    #[test]
    fn test_shared_attempt_keeps_each_rankers_score() {
        let shared = |lead: (&str, f64), other: &str| {
            let mut attempt = Attempt::new(5, 0, 0);
            attempt.contestants = vec![
                Contestant::new(lead.0, SPEC, lead.1),
                Contestant::new(other, SPEC, 0.0),
            ];
            let mut report = Report::new("R1", "", 0);
            report.attempts.push(attempt);
            report
        };
        let mut data = vec![
            shared(("Bar-ServerB", 120.0), "Foo-ServerA"),
            shared(("Foo-ServerA", 100.0), "Bar-ServerB"),
        ];
        let manifest = Manifest::capture(&data);
        assert_eq!(manifest.len(), 2);

        // Enrichment hands both rankers the same stale table value.
        for report in data.iter_mut() {
            for contestant in report.attempts[0].contestants.iter_mut() {
                contestant.metric_total = 90.0;
            }
        }
        let stats = manifest.enforce(&mut data, SPEC);

        assert_eq!(stats.enforced, 2);
        assert_eq!(stats.restored, 2);
        assert_eq!(stats.suppressed, 2);
        let leads: Vec<(&str, f64)> = data
            .iter()
            .map(|r| {
                let c = &r.attempts[0].contestants[0];
                (c.name.as_str(), c.metric_total)
            })
            .collect();
        assert_eq!(leads, vec![("Bar-ServerB", 120.0), ("Foo-ServerA", 100.0)]);
        assert_eq!(data[0].attempts[0].contestants[1].metric_total, 0.0);
        assert_eq!(data[1].attempts[0].contestants[1].metric_total, 0.0);
    }
}
