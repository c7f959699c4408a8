//! Configuration types shared across crates.

use crate::sync::SyncOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Query timeout in seconds (advisory only - SQLite cannot force-cancel queries).
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(600) // 10 minutes (advisory only)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/tags.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite {
                path,
                query_timeout_secs,
            } => {
                if path.as_os_str().is_empty() {
                    return Err("sqlite config requires a non-empty 'path'".to_string());
                }
                if *query_timeout_secs == Some(0) {
                    return Err("sqlite query_timeout_secs cannot be 0".to_string());
                }
                Ok(())
            }
        }
    }
}

/// Complete tagging configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaggingConfig {
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Default settings for tag list saves.
    #[serde(default)]
    pub sync: SyncOptions,
}

impl TaggingConfig {
    /// Create a test configuration storing tags under `dir`.
    ///
    /// **For testing only.**
    pub fn for_testing(dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata: MetadataConfig::Sqlite {
                path: dir.into().join("tags.db"),
                query_timeout_secs: None,
            },
            sync: SyncOptions::default(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.metadata.validate()
    }
}
