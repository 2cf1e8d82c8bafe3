//! FILENAME: report-engine/src/options.rs
//! PURPOSE: Settings shared by the template parser and the report generator.

use persistence::{read_json_file, PersistenceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Row height (points) used when the template row has none.
    pub default_row_height: f64,
    /// Column width (points) used when the template column has none.
    pub default_col_width: f64,
    /// Nesting limit for `[$name$]` sub-reports.
    pub max_subreport_depth: usize,
    /// Directory for the parsed-template cache. No cache when unset.
    pub cache_dir: Option<PathBuf>,
    /// Render unrecognized system functions as their raw tag text instead of empty.
    pub keep_unknown_tags: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            default_row_height: 12.75,
            default_col_width: 48.0,
            max_subreport_depth: 8,
            cache_dir: None,
            keep_unknown_tags: false,
        }
    }
}

impl GeneratorOptions {
    pub fn from_json_str(text: &str) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, PersistenceError> {
        read_json_file(path)
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let options = GeneratorOptions::from_json_str(r#"{"max_subreport_depth": 2}"#).unwrap();
        assert_eq!(options.max_subreport_depth, 2);
        assert_eq!(options.default_row_height, 12.75);
        assert_eq!(options.default_col_width, 48.0);
        assert!(options.cache_dir.is_none());
        assert!(!options.keep_unknown_tags);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, r#"{"keep_unknown_tags": true, "cache_dir": "/tmp/iq"}"#).unwrap();
        let options = GeneratorOptions::from_json_file(&path).unwrap();
        assert!(options.keep_unknown_tags);
        assert_eq!(options.cache_dir, Some(PathBuf::from("/tmp/iq")));
    }

    #[test]
    fn rejects_bad_json() {
        assert!(matches!(
            GeneratorOptions::from_json_str("{"),
            Err(PersistenceError::Json(_))
        ));
    }
}
