//! Best-effort enrichment: party composition and cast detail.
//!
//! Sub-fetches run through a bounded fan-out. Each one is retried on rate
//! limits and otherwise isolated: a failed fetch leaves its attempt,
//! contestant, or boss without detail and never cancels its siblings.
//! Responses are collected first and applied afterwards, so the report
//! collection is only mutated from the calling task.

use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::SpecCatalog;
use crate::client::GraphQlClient;
use crate::errors::{LorrgsError, LorrgsResult};
use crate::loader::retry::RetryPolicy;
use crate::models::{Cast, CombatantInfo, Contestant, EncounterActor, Report};
use crate::ranking::identity::NameMatcher;
use crate::ranking::ingest::descriptor_spec_name;

/// Upper bound on events requested per cast query.
pub const MAX_CAST_EVENTS: i64 = 10000;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub compositions_requested: usize,
    pub compositions_loaded: usize,
    pub contestants_added: usize,
    pub casts_requested: usize,
    pub casts_loaded: usize,
    pub failures: usize,
    pub unresolved_specs: usize,
}

// ---------------------------------------------------------------------------
// Bulk loader
// ---------------------------------------------------------------------------

/// Run every query with at most `concurrency` in flight. Results come back
/// paired with their keys, in completion order.
pub async fn load_many<C, K>(
    client: &C,
    retry: &RetryPolicy,
    concurrency: usize,
    jobs: Vec<(K, String)>,
) -> Vec<(K, LorrgsResult<Value>)>
where
    C: GraphQlClient,
{
    stream::iter(jobs)
        .map(|(key, query)| async move {
            let text = query.as_str();
            let result = retry.run("enrichment", move || client.query(text)).await;
            (key, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}

// ---------------------------------------------------------------------------
// Query text
// ---------------------------------------------------------------------------

/// Attempt window relative to the report start, as the report API expects.
fn attempt_window(report: &Report, attempt_idx: usize) -> (i64, i64) {
    let attempt = &report.attempts[attempt_idx];
    let start = if attempt.start_time > 0 && report.start_time > 0 {
        (attempt.start_time - report.start_time).max(0)
    } else {
        0
    };
    (start, start + attempt.duration.max(0))
}

pub fn composition_query(report_id: &str, attempt_id: i64, start: i64, end: i64) -> String {
    format!(
        "reportData {{\n    report(code: \"{report_id}\") {{\n        \
         playerDetails(fightIDs: [{attempt_id}], startTime: {start}, endTime: {end})\n        \
         table(fightIDs: [{attempt_id}], dataType: DamageDone, startTime: {start}, endTime: {end})\n    \
         }}\n}}"
    )
}

/// Cast events for one actor (`Some(source_id)`) or for all hostile actors.
pub fn casts_query(
    report_id: &str,
    attempt_id: i64,
    start: i64,
    end: i64,
    source_id: Option<i64>,
) -> String {
    let actor_filter = match source_id {
        Some(id) => format!("sourceID: {id}"),
        None => "hostilityType: Enemies".to_string(),
    };
    format!(
        "reportData {{\n    report(code: \"{report_id}\") {{\n        \
         events(fightIDs: [{attempt_id}], startTime: {start}, endTime: {end}, \
         {actor_filter}, dataType: Casts, limit: {MAX_CAST_EVENTS}) {{\n            data\n        }}\n    \
         }}\n}}"
    )
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct PlayerSpec {
    #[serde(default)]
    spec: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PlayerDetail {
    name: String,
    #[serde(default)]
    id: Option<i64>,
    #[serde(rename = "type", default)]
    class_name: Option<String>,
    #[serde(default)]
    specs: Vec<PlayerSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct PlayerDetailGroups {
    #[serde(default)]
    tanks: Vec<PlayerDetail>,
    #[serde(default)]
    healers: Vec<PlayerDetail>,
    #[serde(default)]
    dps: Vec<PlayerDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct TableEntry {
    name: String,
    #[serde(default)]
    total: f64,
}

/// One party member as reported by the composition fetch.
#[derive(Clone, Debug, PartialEq)]
pub struct PartyMember {
    pub info: CombatantInfo,
    /// Per-second metric derived from the damage table, when listed.
    pub metric: Option<f64>,
}

fn report_node(value: &Value) -> Option<&Value> {
    value.get("reportData").and_then(|r| r.get("report"))
}

pub fn parse_composition(value: &Value) -> LorrgsResult<Vec<PartyMember>> {
    let report = report_node(value)
        .ok_or_else(|| LorrgsError::Payload("composition: missing reportData.report".to_string()))?;

    let groups: PlayerDetailGroups = report
        .pointer("/playerDetails/data/playerDetails")
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map_err(|e| LorrgsError::Payload(format!("composition: {e}")))?
        .unwrap_or_default();

    let table = report.pointer("/table/data");
    let total_time_ms = table
        .and_then(|t| t.get("totalTime"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let entries: Vec<TableEntry> = table
        .and_then(|t| t.get("entries"))
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map_err(|e| LorrgsError::Payload(format!("composition table: {e}")))?
        .unwrap_or_default();

    let metric_for = |name: &str| -> Option<f64> {
        if total_time_ms <= 0.0 {
            return None;
        }
        entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.total / (total_time_ms / 1000.0))
    };

    let members = groups
        .tanks
        .into_iter()
        .chain(groups.healers)
        .chain(groups.dps)
        .map(|detail| PartyMember {
            metric: metric_for(&detail.name),
            info: CombatantInfo {
                id: detail.id,
                spec: detail.specs.into_iter().find_map(|s| s.spec),
                class_name: detail.class_name,
                name: Some(detail.name),
            },
        })
        .collect();
    Ok(members)
}

pub fn parse_casts(value: &Value, attempt_start: i64) -> LorrgsResult<Vec<Cast>> {
    let events = report_node(value)
        .and_then(|r| r.pointer("/events/data"))
        .and_then(Value::as_array)
        .ok_or_else(|| LorrgsError::Payload("casts: missing events.data".to_string()))?;

    let casts = events
        .iter()
        .filter(|e| e.get("type").and_then(Value::as_str).map_or(true, |t| t == "cast"))
        .filter_map(|e| {
            let timestamp = e.get("timestamp").and_then(Value::as_i64)?;
            let spell_id = e.get("abilityGameID").and_then(Value::as_i64)?;
            Some(Cast {
                timestamp: timestamp - attempt_start,
                spell_id,
            })
        })
        .collect();
    Ok(casts)
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

fn resolve_slug(catalog: &SpecCatalog, info: &CombatantInfo) -> Option<String> {
    let spec_name = descriptor_spec_name(info)?;
    catalog
        .resolve(spec_name, info.class_name.as_deref())
        .map(|spec| spec.full_name_slug())
}

/// Take actor id and, for the target spec, the table metric from `member`.
fn absorb_member(contestant: &mut Contestant, member: &PartyMember, target_spec_slug: &str) {
    if contestant.source_actor_id.is_none() {
        contestant.source_actor_id = member.info.id;
    }
    if contestant.class_spec_slug == target_spec_slug {
        if let Some(metric) = member.metric {
            contestant.metric_total = metric;
        }
    }
}

/// Fold composition data into one attempt's contestant list.
///
/// Members listed under a contestant's exact name claim that contestant
/// first. Remaining members may claim a still unclaimed contestant by
/// normalized name; everyone else is appended, with a metric only when they
/// play the target spec. A contestant is claimed at most once, so a
/// same-prefix player never takes over the ranked contestant's identity.
fn apply_composition(
    contestants: &mut Vec<Contestant>,
    members: Vec<PartyMember>,
    catalog: &SpecCatalog,
    target_spec_slug: &str,
    stats: &mut EnrichStats,
) {
    let mut claimed = vec![false; contestants.len()];
    let mut pending = Vec::new();
    for member in members {
        let Some(name) = member.info.name.as_deref() else {
            continue;
        };
        match contestants.iter().position(|c| c.name == name) {
            Some(idx) => {
                if !claimed[idx] {
                    claimed[idx] = true;
                    absorb_member(&mut contestants[idx], &member, target_spec_slug);
                }
            }
            None => pending.push(member),
        }
    }

    for member in pending {
        let Some(name) = member.info.name.clone() else {
            continue;
        };
        let fallback = (0..claimed.len())
            .find(|&idx| !claimed[idx] && NameMatcher::Normalized.matches(&contestants[idx].name, &name));
        if let Some(idx) = fallback {
            claimed[idx] = true;
            absorb_member(&mut contestants[idx], &member, target_spec_slug);
            continue;
        }

        let Some(slug) = resolve_slug(catalog, &member.info) else {
            stats.unresolved_specs += 1;
            continue;
        };
        let metric = if slug == target_spec_slug {
            member.metric.unwrap_or(0.0)
        } else {
            0.0
        };
        contestants.push(Contestant::new(name, slug, metric).with_source_actor(member.info.id));
        stats.contestants_added += 1;
    }
}

#[derive(Clone, Copy, Debug)]
enum CastTarget {
    Contestant(usize),
    Boss,
}

/// Fetch composition for sparse attempts, then cast detail for target-spec
/// contestants and each attempt's encounter actor.
pub async fn enrich_reports<C: GraphQlClient>(
    client: &C,
    catalog: &SpecCatalog,
    retry: &RetryPolicy,
    concurrency: usize,
    target_spec_slug: &str,
    reports: &mut [Report],
) -> EnrichStats {
    let mut stats = EnrichStats::default();

    // Composition
    let mut jobs = Vec::new();
    for (r_idx, report) in reports.iter().enumerate() {
        for (a_idx, attempt) in report.attempts.iter().enumerate() {
            if attempt.contestants.len() <= 1 {
                let (start, end) = attempt_window(report, a_idx);
                jobs.push((
                    (r_idx, a_idx),
                    composition_query(&report.report_id, attempt.attempt_id, start, end),
                ));
            }
        }
    }
    stats.compositions_requested = jobs.len();
    if !jobs.is_empty() {
        debug!("Fetching composition for {} attempts", jobs.len());
    }
    for ((r_idx, a_idx), result) in load_many(client, retry, concurrency, jobs).await {
        let report_id = reports[r_idx].report_id.clone();
        match result.and_then(|value| parse_composition(&value)) {
            Ok(members) => {
                let attempt = &mut reports[r_idx].attempts[a_idx];
                apply_composition(
                    &mut attempt.contestants,
                    members,
                    catalog,
                    target_spec_slug,
                    &mut stats,
                );
                attempt.refresh_composition();
                stats.compositions_loaded += 1;
            }
            Err(e) => {
                stats.failures += 1;
                warn!(
                    "Composition fetch failed for {}#{}: {}",
                    report_id, reports[r_idx].attempts[a_idx].attempt_id, e
                );
            }
        }
    }

    // Cast detail
    let mut jobs = Vec::new();
    for (r_idx, report) in reports.iter().enumerate() {
        for (a_idx, attempt) in report.attempts.iter().enumerate() {
            let (start, end) = attempt_window(report, a_idx);
            for (c_idx, contestant) in attempt.contestants.iter().enumerate() {
                if contestant.class_spec_slug != target_spec_slug || !contestant.casts.is_empty() {
                    continue;
                }
                if let Some(source_id) = contestant.source_actor_id {
                    jobs.push((
                        (r_idx, a_idx, CastTarget::Contestant(c_idx), start),
                        casts_query(&report.report_id, attempt.attempt_id, start, end, Some(source_id)),
                    ));
                }
            }
            let boss_loaded = attempt.boss.as_ref().is_some_and(|b| !b.casts.is_empty());
            if !boss_loaded {
                jobs.push((
                    (r_idx, a_idx, CastTarget::Boss, start),
                    casts_query(&report.report_id, attempt.attempt_id, start, end, None),
                ));
            }
        }
    }
    stats.casts_requested = jobs.len();
    if !jobs.is_empty() {
        debug!("Fetching casts for {} actors", jobs.len());
    }
    for ((r_idx, a_idx, target, start), result) in load_many(client, retry, concurrency, jobs).await {
        let attempt = &mut reports[r_idx].attempts[a_idx];
        match result.and_then(|value| parse_casts(&value, start)) {
            Ok(casts) => {
                match target {
                    CastTarget::Contestant(c_idx) => attempt.contestants[c_idx].casts = casts,
                    CastTarget::Boss => {
                        attempt.boss.get_or_insert_with(EncounterActor::default).casts = casts
                    }
                }
                stats.casts_loaded += 1;
            }
            Err(e) => {
                stats.failures += 1;
                warn!(
                    "Cast fetch failed for fight {} ({:?}): {}",
                    attempt.attempt_id, target, e
                );
            }
        }
    }

    stats
}
