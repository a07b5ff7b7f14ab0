//! Conversion of raw ranking records into report/attempt shells.

use crate::catalog::SpecCatalog;
use crate::models::{
    Attempt, CharacterRanking, CombatantInfo, Contestant, RankingRequest, Report,
    LOOSE_ROLE_LABELS,
};

/// Counters for one ingestion pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub ingested: usize,
    pub duplicates: usize,
    pub hidden: usize,
    pub missing_report: usize,
    pub unresolved_specs: usize,
}

impl IngestStats {
    pub fn skipped(&self) -> usize {
        self.duplicates + self.hidden + self.missing_report
    }
}

/// Spec lookup key for a descriptor. Loose role labels fall back to the
/// class name.
pub fn descriptor_spec_name(info: &CombatantInfo) -> Option<&str> {
    let spec = info.spec.as_deref();
    let class = info.class_name.as_deref();
    match spec {
        Some(s) if LOOSE_ROLE_LABELS.contains(&s.to_lowercase().as_str()) => class,
        Some(s) => Some(s),
        None => class,
    }
}

/// Build a report shell holding one attempt from a raw ranking record.
///
/// Hidden records and records without a report reference yield `None`.
/// Co-contestants whose spec cannot be resolved are skipped and counted.
pub fn ingest_ranking(
    request: &RankingRequest,
    record: &CharacterRanking,
    catalog: &SpecCatalog,
    stats: &mut IngestStats,
) -> Option<Report> {
    if record.hidden {
        stats.hidden += 1;
        return None;
    }
    let Some(report_ref) = record.report.as_ref() else {
        stats.missing_report += 1;
        return None;
    };

    let mut attempt = Attempt::new(report_ref.fight_id, record.start_time, record.duration);
    attempt.contestants.push(Contestant::new(
        record.name.clone(),
        request.spec_slug.clone(),
        record.amount,
    ));

    for info in record.combatants() {
        let Some(name) = info.name.as_deref() else {
            continue;
        };
        if name == record.name {
            continue;
        }
        let resolved = descriptor_spec_name(&info)
            .and_then(|spec_name| catalog.resolve(spec_name, info.class_name.as_deref()));
        let Some(spec) = resolved else {
            stats.unresolved_specs += 1;
            continue;
        };
        attempt.contestants.push(
            Contestant::new(name, spec.full_name_slug(), 0.0).with_source_actor(info.id),
        );
    }
    attempt.refresh_composition();

    let mut report = Report::new(report_ref.code.clone(), record.region(), report_ref.start_time);
    report.attempts.push(attempt);
    stats.ingested += 1;
    Some(report)
}
