//! Core domain types and shared logic for taglink.
//!
//! This crate holds everything that does not touch storage:
//! - Tag lists and their text form
//! - Tags, canonical (synonym) resolution
//! - Taggable host entities and their cached tag list projection
//! - Query options and compilation into backend-neutral query specs
//! - Tag set synchronization planning

pub mod canonical;
pub mod cloud;
pub mod compiler;
pub mod config;
pub mod error;
pub mod options;
pub mod query;
pub mod sync;
pub mod tag;
pub mod tag_list;
pub mod taggable;

pub use canonical::{CanonicalLinks, canonical_group, flatten, is_canonical};
pub use cloud::tag_cloud;
pub use compiler::TagQueryCompiler;
pub use error::{Error, Result};
pub use options::{CountOptions, FindOptions};
pub use query::QuerySpec;
pub use sync::{SyncOptions, SyncReport, TagDiff};
pub use tag::{Tag, TagCount, TagId, normalize_name_key};
pub use tag_list::TagList;
pub use taggable::{Taggable, TaggableRef, TaggableType, TagListState};
