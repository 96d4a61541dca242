//! Cached tag record
//!
//! One entry of the durable tag cache, shaped exactly like the objects the
//! upstream tag-index endpoint returns (and like the JSONL lines on disk).

use crate::taxonomy::TagCategory;
use serde::{Deserialize, Serialize};

/// A tag as declared by the upstream tag index.
///
/// Immutable once cached; a correction arrives only as a later record for
/// the same name, whose index entries win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    /// Source-assigned tag id
    pub id: i64,
    /// Canonical spelling as declared by the source
    pub name: String,
    /// Usage count, when the source reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    /// Numeric taxonomy code
    #[serde(rename = "type")]
    pub type_code: i64,
    /// Ambiguity flag (0/1), when the source reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambiguous: Option<i64>,
}

impl TagRecord {
    /// Taxonomy lookup of the type code.
    ///
    /// `None` when the source declared a code outside the taxonomy.
    pub fn category(&self) -> Option<TagCategory> {
        TagCategory::from_code(self.type_code)
    }
}
