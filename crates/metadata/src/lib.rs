//! Tag store abstraction and SQLite implementation for taglink.
//!
//! This crate provides the persisted side of tagging:
//! - Tags, synonym links and case-insensitive lookup
//! - Taggings and transactional tag list synchronization
//! - Execution of compiled tag queries and tag counts

pub mod error;
pub mod models;
pub mod repos;
pub mod sql;
pub mod store;
pub mod taggable;

pub use error::{MetadataError, MetadataResult};
pub use repos::{TagInput, TagQueryRepo, TagRef, TagRepo, TaggingRepo};
pub use store::{SqliteStore, TagStore};
pub use taggable::{edit_tag_list, save_tags, tag_list};

use std::sync::Arc;
use taglink_core::config::MetadataConfig;

/// Create a tag store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn TagStore>> {
    config.validate().map_err(MetadataError::Config)?;
    match config {
        MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn TagStore>)
        }
    }
}
