//! One load cycle for a single `(spec, boss)` leaderboard.
//!
//! Stages run in a fixed order on a working copy of the ranking:
//! fetch, merge and limit, enrich, enforce, finalize. The caller's ranking is only
//! replaced once every stage has succeeded.

use chrono::Utc;
use tracing::{debug, info};

use crate::catalog::SpecCatalog;
use crate::client::GraphQlClient;
use crate::config::{UpdaterConfig, DEFAULT_ENRICH_CONCURRENCY, DEFAULT_RANKING_LIMIT};
use crate::errors::LorrgsResult;
use crate::loader::enrich::{enrich_reports, EnrichStats};
use crate::loader::retry::RetryPolicy;
use crate::models::SpecRanking;
use crate::ranking::ingest::IngestStats;
use crate::ranking::manifest::EnforcementStats;
use crate::ranking::query::{build_rankings_query, parse_rankings_result};
use crate::ranking::reconcile::{settle, stage_records};

#[derive(Clone, Debug, PartialEq)]
pub struct LoadOptions {
    /// Reports kept after sorting; `None` keeps everything.
    pub limit: Option<usize>,
    /// Drop previously stored reports before fetching.
    pub clear_old: bool,
    pub enrich: bool,
    pub enrich_concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            limit: Some(DEFAULT_RANKING_LIMIT),
            clear_old: true,
            enrich: true,
            enrich_concurrency: DEFAULT_ENRICH_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

impl LoadOptions {
    pub fn from_config(config: &UpdaterConfig) -> Self {
        Self {
            limit: Some(config.ranking_limit),
            enrich: config.enrich,
            enrich_concurrency: config.enrich_concurrency,
            ..Self::default()
        }
    }
}

/// What one load cycle did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadReport {
    pub fetched: usize,
    pub ingest: IngestStats,
    pub enrich: Option<EnrichStats>,
    pub enforcement: EnforcementStats,
    pub reports: usize,
    pub contestants: usize,
}

/// Runs load cycles against one analytics client.
pub struct RankingLoader<C> {
    client: C,
    catalog: SpecCatalog,
    options: LoadOptions,
}

impl<C: GraphQlClient> RankingLoader<C> {
    pub fn new(client: C, catalog: SpecCatalog, options: LoadOptions) -> Self {
        Self {
            client,
            catalog,
            options,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn catalog(&self) -> &SpecCatalog {
        &self.catalog
    }

    /// Fetch, reconcile and re-rank `ranking` in place.
    ///
    /// On error `ranking` is left exactly as it was passed in.
    pub async fn load(&self, ranking: &mut SpecRanking) -> LorrgsResult<LoadReport> {
        let request = ranking.request();
        let spec = self.catalog.require_spec(&request.spec_slug)?;
        let boss = self.catalog.require_boss(&request.boss_slug)?;

        info!(
            "Load {} vs {} | limit={:?} | clear_old={}",
            boss.name,
            spec.full_name_slug(),
            self.options.limit,
            self.options.clear_old
        );

        let mut working = ranking.clone();
        if self.options.clear_old {
            working.reports.clear();
        }
        let mut report = LoadReport::default();

        // Fetch
        let query = build_rankings_query(&request, boss.encounter_id, spec).render();
        let client = &self.client;
        let text = query.as_str();
        let result = self
            .options
            .retry
            .run("rankings", move || client.query(text))
            .await?;
        let records = parse_rankings_result(&result)?;
        report.fetched = records.len();

        // Merge, capture, rank, limit
        let (ingest, manifest) = stage_records(
            &request,
            &mut working.reports,
            &records,
            &self.catalog,
            self.options.limit,
        );
        report.ingest = ingest;
        if report.ingest.skipped() > 0 || report.ingest.unresolved_specs > 0 {
            info!(
                "Skipped {} records ({} duplicate, {} hidden, {} without report), {} unresolved co-contestants",
                report.ingest.skipped(),
                report.ingest.duplicates,
                report.ingest.hidden,
                report.ingest.missing_report,
                report.ingest.unresolved_specs
            );
        }
        debug!("Captured {} manifest entries", manifest.len());

        // Enrich
        if self.options.enrich {
            let stats = enrich_reports(
                &self.client,
                &self.catalog,
                &self.options.retry,
                self.options.enrich_concurrency,
                &request.spec_slug,
                &mut working.reports,
            )
            .await;
            info!(
                "Enriched: {}/{} compositions, {}/{} cast sets, {} failures",
                stats.compositions_loaded,
                stats.compositions_requested,
                stats.casts_loaded,
                stats.casts_requested,
                stats.failures
            );
            report.enrich = Some(stats);
        }

        // Enforce
        report.enforcement = settle(&mut working.reports, &manifest, &request.spec_slug);
        if report.enforcement.restored > 0 || report.enforcement.suppressed > 0 {
            info!(
                "Manifest restored {} metrics, suppressed {} contestants",
                report.enforcement.restored, report.enforcement.suppressed
            );
        }

        // Finalize
        working.dirty = false;
        working.updated = Utc::now();
        report.reports = working.reports.len();
        report.contestants = working.contestant_count();
        *ranking = working;

        info!(
            "Done {}: {} reports, {} contestants",
            ranking.key(),
            report.reports,
            report.contestants
        );
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::testing::FakeClient;
    use crate::errors::{ClientError, LorrgsError};
    use crate::models::{Contestant, RankingRequest, Report};
    use serde_json::{json, Value};

    pub const SPEC: &str = "samurai-samurai";
    pub const BOSS: &str = "the-omega-protocol";

    pub fn request() -> RankingRequest {
        RankingRequest::new(SPEC, BOSS, "ultimate", "rdps")
    }

    pub fn record(name: &str, amount: f64, code: &str, fight_id: i64) -> Value {
        json!({
            "name": name,
            "amount": amount,
            "startTime": 1_000_500,
            "duration": 100_000,
            "report": {"code": code, "fightID": fight_id, "startTime": 1_000_000},
            "server": {"name": "ServerA", "region": "NA"}
        })
    }

    pub fn rankings_response(global: Vec<Value>, cn: Vec<Value>) -> Value {
        json!({"worldData": {"encounter": {
            "global": {"page": 1, "hasMorePages": false, "count": global.len(), "rankings": global},
            "cn": {"page": 1, "hasMorePages": false, "count": cn.len(), "rankings": cn}
        }}})
    }

    fn no_enrich() -> LoadOptions {
        LoadOptions {
            enrich: false,
            ..LoadOptions::default()
        }
    }

    fn unexpected(text: &str) -> Result<Value, ClientError> {
        Err(ClientError::Transport(format!("unexpected query: {text}")))
    }

    #[tokio::test]
    async fn test_end_to_end_shared_attempt() {
        let client = FakeClient::new(unexpected);
        client.push(Ok(rankings_response(
            vec![
                record("Foo-ServerA", 100.0, "R1", 5),
                record("Foo-ServerA", 100.0, "R1", 5),
            ],
            vec![record("Bar-ServerB", 120.0, "R1", 5)],
        )));
        let loader = RankingLoader::new(client, SpecCatalog::builtin(), no_enrich());
        let mut ranking = SpecRanking::new(&request());

        let report = loader.load(&mut ranking).await.unwrap();

        assert_eq!(report.fetched, 3);
        assert_eq!(report.ingest.duplicates, 1);
        assert_eq!(ranking.reports.len(), 2);
        let leads: Vec<(&str, i64, &str, f64)> = ranking
            .reports
            .iter()
            .map(|r| {
                let attempt = &r.attempts[0];
                (
                    r.report_id.as_str(),
                    attempt.attempt_id,
                    attempt.contestants[0].name.as_str(),
                    attempt.contestants[0].metric_total,
                )
            })
            .collect();
        assert_eq!(
            leads,
            vec![("R1", 5, "Bar-ServerB", 120.0), ("R1", 5, "Foo-ServerA", 100.0)]
        );
        assert_eq!(report.enforcement.suppressed, 0);
        assert!(!ranking.dirty);
        assert!(ranking.updated > chrono::DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn test_shared_attempt_rankers_survive_enrichment() {
        let client = FakeClient::new(|text| {
            if text.contains("playerDetails") {
                Ok(json!({"reportData": {"report": {
                    "playerDetails": {"data": {"playerDetails": {"dps": [
                        {"name": "Foo-ServerA", "id": 11, "type": "Samurai", "specs": [{"spec": "Samurai"}]},
                        {"name": "Bar-ServerB", "id": 12, "type": "Samurai", "specs": [{"spec": "Samurai"}]}
                    ]}}},
                    "table": {"data": {"totalTime": 100000, "entries": [
                        {"name": "Foo-ServerA", "total": 5000},
                        {"name": "Bar-ServerB", "total": 5000}
                    ]}}
                }}}))
            } else if text.contains("events(") {
                Ok(json!({"reportData": {"report": {"events": {"data": []}}}}))
            } else {
                unexpected(text)
            }
        });
        client.push(Ok(rankings_response(
            vec![
                record("Foo-ServerA", 100.0, "R1", 5),
                record("Bar-ServerB", 120.0, "R1", 5),
            ],
            vec![],
        )));
        let loader = RankingLoader::new(client, SpecCatalog::builtin(), LoadOptions::default());
        let mut ranking = SpecRanking::new(&request());

        let report = loader.load(&mut ranking).await.unwrap();

        let leads: Vec<(&str, f64)> = ranking
            .reports
            .iter()
            .map(|r| {
                let lead = &r.attempts[0].contestants[0];
                (lead.name.as_str(), lead.metric_total)
            })
            .collect();
        assert_eq!(leads, vec![("Bar-ServerB", 120.0), ("Foo-ServerA", 100.0)]);
        assert_eq!(report.enforcement.restored, 2);
        assert_eq!(report.enforcement.suppressed, 2);
        for attempt in ranking.attempts() {
            assert_eq!(attempt.contestants.len(), 2);
            assert_eq!(attempt.contestants[1].metric_total, 0.0);
        }
    }

    #[tokio::test]
    async fn test_post_load_invariant_and_order() {
        let client = FakeClient::new(unexpected);
        client.push(Ok(rankings_response(
            vec![
                record("A-S", 50.0, "R1", 1),
                record("B-S", 80.0, "R2", 1),
                record("C-S", 80.0, "R3", 1),
            ],
            vec![record("D-S", 30.0, "R4", 1)],
        )));
        let options = LoadOptions {
            limit: Some(3),
            ..no_enrich()
        };
        let loader = RankingLoader::new(client, SpecCatalog::builtin(), options);
        let mut ranking = SpecRanking::new(&request());
        loader.load(&mut ranking).await.unwrap();

        let ids: Vec<&str> = ranking.reports.iter().map(|r| r.report_id.as_str()).collect();
        assert_eq!(ids, vec!["R2", "R3", "R1"]);
        for attempt in ranking.attempts() {
            assert_eq!(attempt.primary_metric(), attempt.max_metric());
        }
    }

    #[tokio::test]
    async fn test_enrichment_drift_is_reconciled() {
        // Composition reports the ranker at 900 and an impersonator at 2000.
        let client = FakeClient::new(|text| {
            if text.contains("playerDetails") {
                Ok(json!({"reportData": {"report": {
                    "playerDetails": {"data": {"playerDetails": {
                        "dps": [
                            {"name": "Foo-ServerA", "id": 11, "type": "Samurai", "specs": [{"spec": "Samurai"}]},
                            {"name": "Copycat", "id": 12, "type": "Samurai", "specs": [{"spec": "Samurai"}]}
                        ],
                        "healers": [{"name": "Healer", "id": 13, "type": "Sage", "specs": [{"spec": "Sage"}]}]
                    }}},
                    "table": {"data": {"totalTime": 100000, "entries": [
                        {"name": "Foo-ServerA", "total": 90000},
                        {"name": "Copycat", "total": 200000}
                    ]}}
                }}}))
            } else if text.contains("events(") {
                Ok(json!({"reportData": {"report": {"events": {"data": []}}}}))
            } else {
                unexpected(text)
            }
        });
        client.push(Ok(rankings_response(
            vec![record("Foo-ServerA", 1000.0, "R1", 5)],
            vec![],
        )));
        let loader = RankingLoader::new(client, SpecCatalog::builtin(), LoadOptions::default());
        let mut ranking = SpecRanking::new(&request());

        let report = loader.load(&mut ranking).await.unwrap();

        let contestants = &ranking.reports[0].attempts[0].contestants;
        assert_eq!(contestants[0].name, "Foo-ServerA");
        assert_eq!(contestants[0].metric_total, 1000.0);
        let copycat = contestants.iter().find(|c| c.name == "Copycat").unwrap();
        assert_eq!(copycat.metric_total, 0.0);
        assert_eq!(report.enforcement.restored, 1);
        assert_eq!(report.enforcement.suppressed, 1);
        assert_eq!(report.enrich.unwrap().compositions_loaded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhaustion_keeps_prior_data() {
        let client = FakeClient::new(|_| Err(ClientError::RateLimited));
        let loader = RankingLoader::new(client, SpecCatalog::builtin(), no_enrich());

        let mut ranking = SpecRanking::new(&request());
        let mut old = Report::new("OLD", "EU", 0);
        let mut attempt = crate::models::Attempt::new(1, 0, 0);
        attempt.contestants.push(Contestant::new("Old-S", SPEC, 10.0));
        old.attempts.push(attempt);
        ranking.reports.push(old);
        ranking.dirty = true;
        let before = ranking.clone();

        let result = loader.load(&mut ranking).await;

        assert!(matches!(result, Err(LorrgsError::RateLimitExhausted { attempts: 3 })));
        assert_eq!(loader.client().call_count(), 3);
        assert_eq!(ranking, before);
    }

    #[tokio::test]
    async fn test_unknown_boss_fails_before_fetch() {
        let client = FakeClient::new(unexpected);
        let loader = RankingLoader::new(client, SpecCatalog::builtin(), no_enrich());
        let mut ranking = SpecRanking::new(&RankingRequest::new(SPEC, "nowhere", "mythic", "rdps"));
        let result = loader.load(&mut ranking).await;
        assert!(matches!(result, Err(LorrgsError::UnknownBoss(_))));
        assert_eq!(loader.client().call_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_old_false_keeps_existing_reports() {
        let client = FakeClient::new(unexpected);
        client.push(Ok(rankings_response(vec![record("New-S", 200.0, "R9", 1)], vec![])));
        let options = LoadOptions {
            clear_old: false,
            ..no_enrich()
        };
        let loader = RankingLoader::new(client, SpecCatalog::builtin(), options);
        let mut ranking = SpecRanking::new(&request());
        let mut old = Report::new("R1", "", 0);
        let mut attempt = crate::models::Attempt::new(1, 0, 0);
        attempt.contestants.push(Contestant::new("Old-S", SPEC, 10.0));
        old.attempts.push(attempt);
        ranking.reports.push(old);

        loader.load(&mut ranking).await.unwrap();

        let ids: Vec<&str> = ranking.reports.iter().map(|r| r.report_id.as_str()).collect();
        assert_eq!(ids, vec!["R9", "R1"]);
    }
}
