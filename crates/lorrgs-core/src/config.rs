//! Environment-driven configuration for the batch updater.

use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{LorrgsError, LorrgsResult};

pub const DEFAULT_API_URL: &str = "https://www.fflogs.com/api/v2/client";
pub const DEFAULT_TOKEN_URL: &str = "https://www.fflogs.com/oauth/token";
pub const DEFAULT_DB_PATH: &str = "lorrgs.db";
pub const DEFAULT_EXPORT_DIR: &str = "front_end/data";
pub const DEFAULT_RANKING_LIMIT: usize = 80;
pub const DEFAULT_UNIT_PAUSE_SECS: u64 = 3;
pub const DEFAULT_ENRICH_CONCURRENCY: usize = 4;

/// Parse an on/off flag; unset or unrecognised values use `default`.
pub fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(val) => {
            let v = val.trim().to_lowercase();
            if matches!(v.as_str(), "1" | "true" | "yes" | "on") {
                true
            } else if matches!(v.as_str(), "0" | "false" | "no" | "off") {
                false
            } else {
                default
            }
        }
        Err(_) => default,
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> LorrgsResult<T> {
    match env_string(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| LorrgsError::Config(format!("{name} has an invalid value: {raw:?}"))),
        None => Ok(default),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdaterConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_url: String,
    pub token_url: String,
    pub db_path: PathBuf,
    pub export_dir: PathBuf,
    pub archive_dir: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub ranking_limit: usize,
    pub unit_pause: Duration,
    pub enrich: bool,
    pub enrich_concurrency: usize,
}

impl UpdaterConfig {
    /// Read configuration from the process environment, after loading a
    /// `.env` file if one is present. Missing API credentials are an error.
    pub fn from_env() -> LorrgsResult<Self> {
        let _ = dotenvy::dotenv();

        let client_id = env_string("WCL_CLIENT_ID");
        let client_secret = env_string("WCL_CLIENT_SECRET");
        let (Some(client_id), Some(client_secret)) = (client_id, client_secret) else {
            return Err(LorrgsError::Config(
                "WCL_CLIENT_ID and WCL_CLIENT_SECRET must be set in the environment or .env file"
                    .to_string(),
            ));
        };

        Ok(Self {
            client_id,
            client_secret,
            api_url: env_string("LORRGS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            token_url: env_string("LORRGS_TOKEN_URL")
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            db_path: env_string("LORRGS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            export_dir: env_string("LORRGS_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR)),
            archive_dir: env_string("LORRGS_ARCHIVE_DIR").map(PathBuf::from),
            catalog_path: env_string("LORRGS_CATALOG").map(PathBuf::from),
            ranking_limit: env_parsed("LORRGS_RANKING_LIMIT", DEFAULT_RANKING_LIMIT)?,
            unit_pause: Duration::from_secs(env_parsed(
                "LORRGS_UNIT_PAUSE_SECS",
                DEFAULT_UNIT_PAUSE_SECS,
            )?),
            enrich: env_flag("LORRGS_ENRICH", true),
            enrich_concurrency: env_parsed("LORRGS_ENRICH_CONCURRENCY", DEFAULT_ENRICH_CONCURRENCY)?
                .max(1),
        })
    }
}
