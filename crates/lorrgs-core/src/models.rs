//! Shared typed models used across ingestion, reconciliation, and storage.
//!
//! Field names on the Rust side describe what the value is; the serde names
//! match the JSON documents the front end already consumes.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default difficulty for new rankings.
pub const DEFAULT_DIFFICULTY: &str = "mythic";

/// Default metric for new rankings.
pub const DEFAULT_METRIC: &str = "rdps";

/// Role labels some combatant descriptors use in place of a spec name.
pub const LOOSE_ROLE_LABELS: &[&str] = &["dps", "healer", "tank"];

// ---------------------------------------------------------------------------
// 1. RankingRequest
// ---------------------------------------------------------------------------

/// Identifies one leaderboard to maintain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankingRequest {
    pub spec_slug: String,
    pub boss_slug: String,
    pub difficulty: String,
    pub metric: String,
}

impl RankingRequest {
    pub fn new(
        spec_slug: impl Into<String>,
        boss_slug: impl Into<String>,
        difficulty: impl Into<String>,
        metric: impl Into<String>,
    ) -> Self {
        Self {
            spec_slug: spec_slug.into(),
            boss_slug: boss_slug.into(),
            difficulty: difficulty.into(),
            metric: metric.into(),
        }
    }

    /// Storage key: `"{spec_slug}/{boss_slug}__{difficulty}__{metric}"`.
    pub fn key(&self) -> String {
        format!(
            "{}/{}__{}__{}",
            self.spec_slug, self.boss_slug, self.difficulty, self.metric
        )
    }
}

// ---------------------------------------------------------------------------
// 2. Cast / EncounterActor
// ---------------------------------------------------------------------------

/// A single ability use, timestamped relative to the attempt start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cast {
    #[serde(rename = "ts")]
    pub timestamp: i64,
    #[serde(rename = "id")]
    pub spell_id: i64,
}

/// The hostile encounter actor of an attempt. Only its casts are tracked.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EncounterActor {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub casts: Vec<Cast>,
}

// ---------------------------------------------------------------------------
// 3. Contestant
// ---------------------------------------------------------------------------

/// One participant's record within an attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contestant {
    pub name: String,
    #[serde(rename = "spec_slug")]
    pub class_spec_slug: String,
    #[serde(rename = "total", default)]
    pub metric_total: f64,
    #[serde(rename = "source_id", default, skip_serializing_if = "Option::is_none")]
    pub source_actor_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub casts: Vec<Cast>,
}

impl Contestant {
    pub fn new(name: impl Into<String>, class_spec_slug: impl Into<String>, metric_total: f64) -> Self {
        Self {
            name: name.into(),
            class_spec_slug: class_spec_slug.into(),
            metric_total,
            source_actor_id: None,
            casts: Vec::new(),
        }
    }

    pub fn with_source_actor(mut self, source_actor_id: Option<i64>) -> Self {
        self.source_actor_id = source_actor_id;
        self
    }
}

/// Descending metric order; `sort_by` keeps ties in input order.
pub fn by_metric_desc(a: &Contestant, b: &Contestant) -> Ordering {
    b.metric_total.total_cmp(&a.metric_total)
}

// ---------------------------------------------------------------------------
// 4. Attempt
// ---------------------------------------------------------------------------

/// One scored pull within a report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    #[serde(rename = "fight_id")]
    pub attempt_id: i64,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default)]
    pub duration: i64,
    #[serde(rename = "players", default)]
    pub contestants: Vec<Contestant>,
    #[serde(default)]
    pub composition: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boss: Option<EncounterActor>,
}

impl Attempt {
    pub fn new(attempt_id: i64, start_time: i64, duration: i64) -> Self {
        Self {
            attempt_id,
            start_time,
            duration,
            contestants: Vec::new(),
            composition: Vec::new(),
            boss: None,
        }
    }

    pub fn primary(&self) -> Option<&Contestant> {
        self.contestants.first()
    }

    /// Metric of the contestant in position 0, or 0 for an empty attempt.
    pub fn primary_metric(&self) -> f64 {
        self.primary().map(|c| c.metric_total).unwrap_or(0.0)
    }

    pub fn max_metric(&self) -> f64 {
        self.contestants
            .iter()
            .map(|c| c.metric_total)
            .fold(0.0, f64::max)
    }

    /// Stable descending sort of the contestants by metric.
    pub fn sort_contestants(&mut self) {
        self.contestants.sort_by(by_metric_desc);
    }

    /// Rebuild the denormalized spec list from the current contestants.
    pub fn refresh_composition(&mut self) {
        self.composition = self
            .contestants
            .iter()
            .map(|c| c.class_spec_slug.clone())
            .collect();
    }
}

// ---------------------------------------------------------------------------
// 5. Report
// ---------------------------------------------------------------------------

/// One externally recorded play session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_id: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub start_time: i64,
    #[serde(rename = "fights", default)]
    pub attempts: Vec<Attempt>,
}

impl Report {
    pub fn new(report_id: impl Into<String>, region: impl Into<String>, start_time: i64) -> Self {
        Self {
            report_id: report_id.into(),
            region: region.into(),
            start_time,
            attempts: Vec::new(),
        }
    }

    /// Best primary-contestant metric over all attempts (0 when empty).
    pub fn best_metric(&self) -> f64 {
        self.attempts
            .iter()
            .map(Attempt::primary_metric)
            .fold(0.0, f64::max)
    }
}

// ---------------------------------------------------------------------------
// 6. SpecRanking (persisted record)
// ---------------------------------------------------------------------------

fn default_updated() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// The persisted leaderboard for one [`RankingRequest`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecRanking {
    pub spec_slug: String,
    pub boss_slug: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default)]
    pub reports: Vec<Report>,
    #[serde(default = "default_updated")]
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub dirty: bool,
}

fn default_difficulty() -> String {
    DEFAULT_DIFFICULTY.to_string()
}

fn default_metric() -> String {
    DEFAULT_METRIC.to_string()
}

impl SpecRanking {
    pub fn new(request: &RankingRequest) -> Self {
        Self {
            spec_slug: request.spec_slug.clone(),
            boss_slug: request.boss_slug.clone(),
            difficulty: request.difficulty.clone(),
            metric: request.metric.clone(),
            reports: Vec::new(),
            updated: default_updated(),
            dirty: false,
        }
    }

    pub fn request(&self) -> RankingRequest {
        RankingRequest::new(
            self.spec_slug.clone(),
            self.boss_slug.clone(),
            self.difficulty.clone(),
            self.metric.clone(),
        )
    }

    pub fn key(&self) -> String {
        self.request().key()
    }

    pub fn attempts(&self) -> impl Iterator<Item = &Attempt> {
        self.reports.iter().flat_map(|r| r.attempts.iter())
    }

    pub fn contestant_count(&self) -> usize {
        self.attempts().map(|a| a.contestants.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// 7. Raw ranking records (analytics API wire format)
// ---------------------------------------------------------------------------

/// Report reference attached to a ranking record.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingReportRef {
    pub code: String,
    #[serde(rename = "fightID")]
    pub fight_id: i64,
    #[serde(default)]
    pub start_time: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RankingServer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// A co-contestant descriptor from `includeCombatantInfo`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CombatantInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "type", default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub spec: Option<String>,
}

/// One raw leaderboard entry as returned by `characterRankings`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRanking {
    pub name: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub report: Option<RankingReportRef>,
    #[serde(default)]
    pub server: Option<RankingServer>,
    /// Kept untyped: the service sometimes returns an object here instead of
    /// a descriptor list.
    #[serde(default)]
    pub combatant_info: Option<serde_json::Value>,
}

impl CharacterRanking {
    /// Co-contestant descriptors, ignoring entries that do not parse.
    pub fn combatants(&self) -> Vec<CombatantInfo> {
        match &self.combatant_info {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn region(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.region.clone())
            .unwrap_or_default()
    }
}

/// One page of `characterRankings`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRankings {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub has_more_pages: bool,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub rankings: Vec<CharacterRanking>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_key_format() {
        let request = RankingRequest::new("paladin-paladin", "the-tyrant", "mythic", "rdps");
        assert_eq!(request.key(), "paladin-paladin/the-tyrant__mythic__rdps");
    }

    #[test]
    fn test_empty_attempt_scores_zero() {
        let attempt = Attempt::new(1, 0, 0);
        assert_eq!(attempt.primary_metric(), 0.0);
        let report = Report::new("R1", "", 0);
        assert_eq!(report.best_metric(), 0.0);
    }

    #[test]
    fn test_contestant_wire_names() {
        let contestant = Contestant::new("Foo", "sage-sage", 12.5);
        let value = serde_json::to_value(&contestant).unwrap();
        assert_eq!(value["spec_slug"], "sage-sage");
        assert_eq!(value["total"], 12.5);
        assert!(value.get("source_id").is_none());
        assert!(value.get("casts").is_none());
    }

    #[test]
    fn test_spec_ranking_defaults_on_sparse_document() {
        let ranking: SpecRanking =
            serde_json::from_str(r#"{"spec_slug": "sage-sage", "boss_slug": "lindwurm"}"#).unwrap();
        assert_eq!(ranking.difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(ranking.metric, DEFAULT_METRIC);
        assert!(ranking.reports.is_empty());
        assert_eq!(ranking.updated, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_combatants_tolerates_object_payload() {
        let record: CharacterRanking = serde_json::from_value(serde_json::json!({
            "name": "Foo",
            "amount": 1.0,
            "combatantInfo": {"stats": {}}
        }))
        .unwrap();
        assert!(record.combatants().is_empty());
        assert_eq!(record.region(), "");
    }

    #[test]
    fn test_sort_contestants_is_stable() {
        let mut attempt = Attempt::new(1, 0, 0);
        attempt.contestants = vec![
            Contestant::new("A", "x", 10.0),
            Contestant::new("B", "x", 20.0),
            Contestant::new("C", "x", 10.0),
        ];
        attempt.sort_contestants();
        let names: Vec<&str> = attempt.contestants.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }
}
