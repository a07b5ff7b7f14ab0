//! JSON files for the static front end, plus optional timestamped archives.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::LorrgsResult;
use crate::models::SpecRanking;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportPaths {
    pub current: PathBuf,
    pub archive: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct JsonExporter {
    export_dir: PathBuf,
    archive_dir: Option<PathBuf>,
}

pub fn export_file_name(ranking: &SpecRanking) -> String {
    format!("spec_ranking_{}_{}.json", ranking.spec_slug, ranking.boss_slug)
}

impl JsonExporter {
    pub fn new(export_dir: impl Into<PathBuf>, archive_dir: Option<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
            archive_dir,
        }
    }

    /// Write `ranking` to the export dir and, when archiving is on, to
    /// `{archive}/{YYYY-MM-DD}/{HHh_MMm}_{boss}/` for the batch started at
    /// `now`.
    pub fn export_at(&self, ranking: &SpecRanking, now: DateTime<Utc>) -> LorrgsResult<ExportPaths> {
        let payload = serde_json::to_string(ranking)?;
        let file_name = export_file_name(ranking);

        let current = write_into(&self.export_dir, &file_name, &payload)?;
        let archive = match &self.archive_dir {
            Some(root) => {
                let dir = root
                    .join(now.format("%Y-%m-%d").to_string())
                    .join(format!("{}_{}", now.format("%Hh_%Mm"), ranking.boss_slug));
                Some(write_into(&dir, &file_name, &payload)?)
            }
            None => None,
        };
        debug!("Exported {}", current.display());
        Ok(ExportPaths { current, archive })
    }
}

fn write_into(dir: &Path, file_name: &str, payload: &str) -> LorrgsResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, payload)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RankingRequest;
    use chrono::TimeZone;

    #[test]
    fn test_export_writes_current_and_archive() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = JsonExporter::new(dir.path().join("data"), Some(dir.path().join("archives")));
        let ranking = SpecRanking::new(&RankingRequest::new(
            "sage-sage",
            "the-omega-protocol",
            "ultimate",
            "rdps",
        ));
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 9, 5, 0).unwrap();

        let paths = exporter.export_at(&ranking, now).unwrap();

        assert_eq!(
            paths.current,
            dir.path().join("data").join("spec_ranking_sage-sage_the-omega-protocol.json")
        );
        let archive = paths.archive.unwrap();
        assert_eq!(
            archive,
            dir.path()
                .join("archives")
                .join("2026-03-04")
                .join("09h_05m_the-omega-protocol")
                .join("spec_ranking_sage-sage_the-omega-protocol.json")
        );
        let written: SpecRanking =
            serde_json::from_str(&fs::read_to_string(&paths.current).unwrap()).unwrap();
        assert_eq!(written.spec_slug, "sage-sage");
        assert!(archive.exists());
    }

    #[test]
    fn test_export_without_archive() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = JsonExporter::new(dir.path(), None);
        let ranking = SpecRanking::new(&RankingRequest::new("sage-sage", "b", "mythic", "rdps"));
        let paths = exporter.export_at(&ranking, Utc::now()).unwrap();
        assert!(paths.current.exists());
        assert!(paths.archive.is_none());
    }
}
