//! Run configuration shared by every merge and diff command

use crate::error::{Error, Result};
use crate::merge::{ConflictPolicy, MergeOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for one run, loadable from a JSON file and overridden by flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// How matched-but-different entries are handled
    pub policy: ConflictPolicy,
    /// Output file or directory; the input is overwritten when unset
    pub output: Option<PathBuf>,
    /// Print the change log after each merge
    pub verbose: bool,
    /// History file to append persisted merges to
    pub history: Option<PathBuf>,
}

impl RunConfig {
    /// Load a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the config to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Merge options for this run
    pub fn merge_options(&self, diff_mode: bool) -> MergeOptions {
        MergeOptions {
            policy: self.policy,
            diff_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge.json");
        let config = RunConfig {
            policy: ConflictPolicy::IgnoreConflicting,
            output: Some(PathBuf::from("out")),
            verbose: true,
            history: None,
        };

        config.save(&path).unwrap();
        let loaded = RunConfig::load(&path).unwrap();

        assert_eq!(loaded, config);
        assert!(loaded.merge_options(true).diff_mode);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"verbose": true}"#).unwrap();
        assert_eq!(config.policy, ConflictPolicy::Overwrite);
        assert!(config.output.is_none());
    }
}
