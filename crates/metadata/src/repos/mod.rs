//! Repository traits for tagging operations.

pub mod queries;
pub mod taggings;
pub mod tags;

pub use queries::TagQueryRepo;
pub use taggings::TaggingRepo;
pub use tags::{TagInput, TagRef, TagRepo};
