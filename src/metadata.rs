//! Post metadata
//!
//! Upstream post objects as consumed by downstream import tooling: the raw
//! shape with a normalized timestamp, and the structured form with the
//! post's tags grouped per category by the classifier.

use crate::classifier::TagClassifier;
use crate::error::Result;
use crate::taxonomy::TagCategory;
use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};

const UPSTREAM_TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// One post as returned by the upstream post endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PostMetadata {
    pub id: i64,
    /// Normalized to `YYYY-MM-DD HH:MM:SS`
    #[serde(deserialize_with = "de_created_at")]
    pub created_at: String,
    pub score: i64,
    pub width: i64,
    pub height: i64,
    pub md5: String,
    /// Extension of the `image` filename
    #[serde(rename = "image", deserialize_with = "de_image_ext")]
    pub image_ext: String,
    pub rating: String,
    #[serde(default)]
    pub source: String,
    /// Space-separated tag string
    pub tags: String,
    #[serde(default)]
    pub title: String,
    pub file_url: String,
    #[serde(default, deserialize_with = "de_loose_bool")]
    pub has_children: bool,
    #[serde(default)]
    pub parent_id: i64,
}

/// A post with its tags classified into per-category lists.
///
/// Deprecated tags are not listed.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredPost {
    pub id: i64,
    pub created_at: String,
    pub score: i64,
    pub width: i64,
    pub height: i64,
    pub md5: String,
    pub image_ext: String,
    pub rating: String,
    pub source: String,
    pub title: String,
    pub file_url: String,
    pub has_children: bool,
    pub parent_id: i64,
    pub tag_list_general: Vec<String>,
    pub tag_list_artist: Vec<String>,
    pub tag_list_character: Vec<String>,
    pub tag_list_meta: Vec<String>,
    pub tag_list_copyright: Vec<String>,
}

impl PostMetadata {
    /// Classify this post's tag string and emit the structured form.
    pub async fn structured(&self, classifier: &mut TagClassifier) -> Result<StructuredPost> {
        let groups = classifier.group_by_category(&self.tags).await?;
        let pick = |wanted: TagCategory| {
            groups
                .iter()
                .find(|(category, _)| *category == wanted)
                .map(|(_, tokens)| tokens.clone())
                .unwrap_or_default()
        };
        Ok(StructuredPost {
            id: self.id,
            created_at: self.created_at.clone(),
            score: self.score,
            width: self.width,
            height: self.height,
            md5: self.md5.clone(),
            image_ext: self.image_ext.clone(),
            rating: self.rating.clone(),
            source: self.source.clone(),
            title: self.title.clone(),
            file_url: self.file_url.clone(),
            has_children: self.has_children,
            parent_id: self.parent_id,
            tag_list_general: pick(TagCategory::General),
            tag_list_artist: pick(TagCategory::Artist),
            tag_list_character: pick(TagCategory::Character),
            tag_list_meta: pick(TagCategory::Meta),
            tag_list_copyright: pick(TagCategory::Copyright),
        })
    }
}

fn de_created_at<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let parsed = DateTime::parse_from_str(&raw, UPSTREAM_TIMESTAMP_FORMAT)
        .map_err(serde::de::Error::custom)?;
    Ok(parsed.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn de_image_ext<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let filename = String::deserialize(deserializer)?;
    Ok(filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_string())
}

// upstream serializes booleans inconsistently (bool, "true"/"false", 0/1)
fn de_loose_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Bool(bool),
        Int(i64),
        Str(String),
    }
    Ok(match Loose::deserialize(deserializer)? {
        Loose::Bool(value) => value,
        Loose::Int(value) => value != 0,
        Loose::Str(value) => value == "true" || value == "1",
    })
}
