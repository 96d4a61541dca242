//! Tag resolution and classification cache engine for booru tag strings
//!
//! Classifies free-text booru tag tokens into a fixed taxonomy (general,
//! artist, copyright, character, meta, deprecated). Mappings are cached in a
//! durable append-only JSONL log, spelling variants (HTML entities, case) of
//! a tag resolve to one record, and cache misses fall back to a
//! retry-bounded bulk lookup against an upstream tag index, persisting every
//! newly learned record.
//!
//! ```rust,ignore
//! use booru_tags::{RecordStore, TagClassifier, GelbooruClient};
//! use std::sync::Arc;
//!
//! let store = RecordStore::open("gelbooru_tags.jsonl")?;
//! let mut classifier = TagClassifier::new(store)
//!     .with_source(Arc::new(GelbooruClient::new()?));
//!
//! let groups = classifier.group_by_category("1girl 1boy ninomae_ina'nis").await?;
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod metadata;
pub mod normalize;
pub mod record;
pub mod resolver;
pub mod source;
pub mod store;
pub mod taxonomy;

pub use crate::classifier::TagClassifier;
pub use crate::config::EngineConfig;
pub use crate::error::{Error, Result};
pub use crate::metadata::{PostMetadata, StructuredPost};
pub use crate::record::TagRecord;
pub use crate::resolver::BatchResolver;
pub use crate::source::{GelbooruClient, RetryPolicy, SourceError, TagSource, MAX_BULK_TOKENS};
pub use crate::store::{RecordStore, ReplayStats};
pub use crate::taxonomy::TagCategory;
