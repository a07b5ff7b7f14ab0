//! Lorrgs core library: the ranking reconciliation engine behind the Lorrgs
//! leaderboards.
//!
//! Rankings are fetched from the analytics API, merged into the stored
//! leaderboard without duplicates, enriched with party composition and cast
//! detail, reconciled against the manifest of ranked contestants, and
//! re-ranked. The `lorrgs-update` binary drives batch updates; with the
//! `python` feature the crate also builds the `_lorrgs_core` extension
//! module.

pub mod catalog;
pub mod client;
pub mod config;
pub mod errors;
pub mod loader;
pub mod models;
pub mod ranking;
pub mod store;

#[cfg(feature = "python")]
mod python;
