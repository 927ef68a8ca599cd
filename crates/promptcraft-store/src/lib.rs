use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use promptcraft_types::{ComparisonRun, EvaluationRun};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid report JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON reports written under a single results directory.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Default report name, e.g. `eval_report_20250101_093000.json`.
    pub fn default_filename() -> String {
        format!("eval_report_{}.json", Utc::now().format("%Y%m%d_%H%M%S"))
    }

    /// Write `report` as pretty JSON, creating the directory if needed.
    pub fn save<T: Serialize>(&self, report: &T, filename: Option<&str>) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = match filename {
            Some(name) => self.dir.join(name),
            None => self.dir.join(Self::default_filename()),
        };
        let body = serde_json::to_string_pretty(report).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, body).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), "report saved");
        Ok(path)
    }

    /// Load a report as raw JSON. A missing file reads as an empty object.
    pub fn load_value(&self, filename: &str) -> Result<Value, StoreError> {
        let path = self.dir.join(filename);
        let body = match fs::read_to_string(&path) {
            Ok(body) => body,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "report not found");
                return Ok(Value::Object(Default::default()));
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&body).map_err(|source| StoreError::Json { path, source })
    }

    pub fn load_evaluation(&self, filename: &str) -> Result<EvaluationRun, StoreError> {
        self.load_typed(filename)
    }

    pub fn load_comparison(&self, filename: &str) -> Result<ComparisonRun, StoreError> {
        self.load_typed(filename)
    }

    /// Report file names in the directory, newest name first.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.ends_with(".json"))
            .collect();
        names.sort_by(|a, b| b.cmp(a));
        Ok(names)
    }

    fn load_typed<T: DeserializeOwned>(&self, filename: &str) -> Result<T, StoreError> {
        let path = self.dir.join(filename);
        let body = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|source| StoreError::Json { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptcraft_types::{EvaluationRun, RunMetadata, Stats};
    use serde_json::json;

    fn empty_run() -> EvaluationRun {
        EvaluationRun {
            prompt: "Summarize:".into(),
            results: vec![],
            stats: Stats::all_failed(),
            metadata: RunMetadata {
                total_cases: 0,
                timestamp: Utc::now(),
                duration_seconds: 0.5,
            },
        }
    }

    #[test]
    fn save_creates_directory_and_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ReportStore::new(tmp.path().join("results"));

        let path = store.save(&empty_run(), Some("run.json")).unwrap();
        assert!(path.ends_with("results/run.json"));

        let loaded = store.load_evaluation("run.json").unwrap();
        assert_eq!(loaded.prompt, "Summarize:");
        assert!(loaded.stats.is_error());
    }

    #[test]
    fn default_name_is_timestamped() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ReportStore::new(tmp.path());
        let path = store.save(&json!({"k": 1}), None).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("eval_report_"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "eval_report_20250101_093000.json".len());
        assert_eq!(store.list().unwrap(), vec![name.to_string()]);
    }

    #[test]
    fn missing_report_loads_as_empty_object() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ReportStore::new(tmp.path());
        assert_eq!(store.load_value("nope.json").unwrap(), json!({}));
        assert!(store.load_evaluation("nope.json").is_err());
    }

    #[test]
    fn corrupt_report_is_a_json_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("bad.json"), "{ not json").unwrap();
        let store = ReportStore::new(tmp.path());
        assert!(matches!(store.load_value("bad.json"), Err(StoreError::Json { .. })));
    }

    #[test]
    fn listing_a_missing_directory_is_empty() {
        let store = ReportStore::new("/definitely/not/a/results/dir");
        assert!(store.list().unwrap().is_empty());
    }
}
