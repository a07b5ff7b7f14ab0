//! Pure leaderboard reconciliation: ingest, merge, manifest, sort.
//!
//! Nothing here performs I/O; the loader drives these steps around the
//! network fetches.

pub mod identity;
pub mod ingest;
pub mod manifest;
pub mod merge;
pub mod query;
pub mod reconcile;
pub mod sort;
