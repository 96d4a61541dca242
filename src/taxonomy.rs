//! Tag taxonomy
//!
//! The fixed category set used by booru-style tag indexes, keyed by the
//! numeric type codes the upstream service declares.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a tag as declared by the upstream tag index.
///
/// Code 2 is unused upstream; the gap is preserved, never renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    General,
    Artist,
    Copyright,
    Character,
    Meta,
    Deprecated,
}

impl TagCategory {
    /// All categories in code order.
    pub const ALL: [TagCategory; 6] = [
        TagCategory::General,
        TagCategory::Artist,
        TagCategory::Copyright,
        TagCategory::Character,
        TagCategory::Meta,
        TagCategory::Deprecated,
    ];

    /// Map an upstream type code to its category.
    ///
    /// Returns `None` for codes outside the taxonomy (including the
    /// reserved code 2).
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(TagCategory::General),
            1 => Some(TagCategory::Artist),
            3 => Some(TagCategory::Copyright),
            4 => Some(TagCategory::Character),
            5 => Some(TagCategory::Meta),
            6 => Some(TagCategory::Deprecated),
            _ => None,
        }
    }

    /// The numeric type code for this category.
    pub fn code(self) -> i64 {
        match self {
            TagCategory::General => 0,
            TagCategory::Artist => 1,
            TagCategory::Copyright => 3,
            TagCategory::Character => 4,
            TagCategory::Meta => 5,
            TagCategory::Deprecated => 6,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            TagCategory::General => "general",
            TagCategory::Artist => "artist",
            TagCategory::Copyright => "copyright",
            TagCategory::Character => "character",
            TagCategory::Meta => "meta",
            TagCategory::Deprecated => "deprecated",
        }
    }

    /// Parse a label back into a category.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.label() == label)
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for category in TagCategory::ALL {
            assert_eq!(TagCategory::from_code(category.code()), Some(category));
        }
    }

    #[test]
    fn test_reserved_code_is_unmapped() {
        assert_eq!(TagCategory::from_code(2), None);
        assert_eq!(TagCategory::from_code(7), None);
        assert_eq!(TagCategory::from_code(-1), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(TagCategory::Copyright.label(), "copyright");
        assert_eq!(TagCategory::from_label("character"), Some(TagCategory::Character));
        assert_eq!(TagCategory::from_label("unknown"), None);
    }
}
