//! Persistence for leaderboards and their published JSON exports.
//!
//! A [`RankingStore`] maps a ranking key to the serialized [`SpecRanking`].
//! The SQLite implementation lives in [`database`]; [`export`] writes the
//! files the front end reads.

pub mod database;
pub mod export;
pub mod schema;

use tracing::debug;

use crate::errors::{LorrgsError, LorrgsResult};
use crate::models::{RankingRequest, SpecRanking};

/// Key-value persistence for serialized rankings.
pub trait RankingStore: Send + Sync {
    fn load(&self, key: &str) -> LorrgsResult<Option<String>>;
    fn save(&self, key: &str, value: &str) -> LorrgsResult<()>;
}

impl SpecRanking {
    /// Load the stored ranking for `request`, or start an empty one.
    pub fn load_or_create<S: RankingStore + ?Sized>(
        store: &S,
        request: &RankingRequest,
    ) -> LorrgsResult<Self> {
        match store.load(&request.key())? {
            Some(payload) => {
                let ranking: SpecRanking = serde_json::from_str(&payload)?;
                if ranking.key() != request.key() {
                    return Err(LorrgsError::Store(format!(
                        "record under {} belongs to {}",
                        request.key(),
                        ranking.key()
                    )));
                }
                debug!("Loaded {} with {} reports", request.key(), ranking.reports.len());
                Ok(ranking)
            }
            None => Ok(SpecRanking::new(request)),
        }
    }

    pub fn save<S: RankingStore + ?Sized>(&self, store: &S) -> LorrgsResult<()> {
        let payload = serde_json::to_string(self)?;
        store.save(&self.key(), &payload)
    }
}
