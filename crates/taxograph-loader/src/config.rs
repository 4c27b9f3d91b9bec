//! Loader and source configuration (JSON, every field defaulted).

use serde::{Deserialize, Serialize};
use std::path::Path;

use taxograph_ingest::{MalformedLinePolicy, SourceFormat};

use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Records (or edges, synonyms) per durable commit.
    pub commit_window: usize,
    /// Upper bound on hops when confirming a preorder match.
    pub path_hop_limit: usize,
    /// Parent name resolved by direct index lookup in path-scoring merges.
    pub universal_root_name: String,
    /// What to do with malformed hierarchy lines.
    pub malformed_lines: MalformedLinePolicy,
    /// Anomalies kept verbatim in a report; the rest are only counted.
    pub max_recorded_anomalies: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            commit_window: 100_000,
            path_hop_limit: 10_000,
            universal_root_name: "life".to_string(),
            malformed_lines: MalformedLinePolicy::Abort,
            max_recorded_anomalies: 1_000,
        }
    }
}

impl LoaderConfig {
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        serde_json::from_str(text).map_err(|e| LoadError::Config(e.to_string()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Preorder merges commit a hundred times more often than bulk loads.
    pub fn preorder_window(&self) -> usize {
        (self.commit_window / 100).max(1)
    }
}

/// Who produced a source and how to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub format: SourceFormat,
    /// sha256 of the hierarchy file, filled in when read from disk.
    #[serde(default)]
    pub digest: Option<String>,
}

fn default_author() -> String {
    "no one".to_string()
}

impl SourceDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author: default_author(),
            version: None,
            format: SourceFormat::TabPipe,
            digest: None,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        serde_json::from_str(text).map_err(|e| LoadError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = LoaderConfig::from_json("{}").unwrap();
        assert_eq!(config, LoaderConfig::default());
        assert_eq!(config.preorder_window(), 1_000);
    }

    #[test]
    fn test_partial_config_overrides() {
        let config =
            LoaderConfig::from_json(r#"{"commit_window": 50, "malformed_lines": "skip"}"#).unwrap();
        assert_eq!(config.commit_window, 50);
        assert_eq!(config.preorder_window(), 1);
        assert_eq!(config.malformed_lines, MalformedLinePolicy::Skip);
        assert_eq!(config.universal_root_name, "life");
    }

    #[test]
    fn test_descriptor_defaults() {
        let source = SourceDescriptor::from_json(r#"{"name": "ncbi", "format": "gbif"}"#).unwrap();
        assert_eq!(source.author, "no one");
        assert_eq!(source.format, SourceFormat::Gbif);
        assert!(source.version.is_none());
    }

    #[test]
    fn test_unreadable_config_keeps_io_source() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("loader.json");
        let err = LoaderConfig::from_json_file(&missing).unwrap_err();
        match &err {
            LoadError::ConfigIo { path, source } => {
                assert_eq!(path, &missing);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("loader.json"));
    }

    #[test]
    fn test_bad_json_is_config_error() {
        assert!(matches!(
            LoaderConfig::from_json("{\"commit_window\": \"many\"}"),
            Err(LoadError::Config(_))
        ));
    }
}
