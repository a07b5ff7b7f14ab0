//! Load-cycle orchestration: retrying fetches, enrichment, and batch runs.

pub mod batch;
pub mod enrich;
pub mod orchestrator;
pub mod retry;
