//! Classifier facade
//!
//! Public surface of the engine: per-token classification and
//! category-grouping over arbitrary tag strings, backed by the durable
//! record store and the batch resolver.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::resolver::BatchResolver;
use crate::source::{GelbooruClient, TagSource};
use crate::store::{RecordStore, ReplayStats};
use crate::taxonomy::TagCategory;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Tag classification engine.
///
/// One instance per process; the durable log it writes persists across
/// restarts and is replayed in full before any resolution occurs.
pub struct TagClassifier {
    store: RecordStore,
    resolver: BatchResolver,
}

impl TagClassifier {
    /// Engine over an opened store, with no source and no default category.
    /// Classification then answers from the cache alone and fails on the
    /// first unresolved token.
    pub fn new(store: RecordStore) -> Self {
        TagClassifier {
            store,
            resolver: BatchResolver::new(None, None),
        }
    }

    /// Attach a bulk lookup source for cache misses.
    pub fn with_source(mut self, source: Arc<dyn TagSource>) -> Self {
        self.resolver.set_source(source);
        self
    }

    /// Category assigned to tokens the source cannot resolve.
    pub fn with_default_category(mut self, category: TagCategory) -> Self {
        self.resolver.set_default_category(category);
        self
    }

    /// Wire an engine from configuration: store at the configured cache
    /// file, upstream client unless `offline`, default category by label.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let store = RecordStore::open(&config.cache_file)?;
        let mut classifier = TagClassifier::new(store);
        if let Some(category) = config.default_category()? {
            classifier = classifier.with_default_category(category);
        }
        if !config.offline {
            let client = GelbooruClient::with_config(
                config.base_url.clone(),
                config.retry_policy(),
                Duration::from_secs(config.request_timeout_secs),
            )?;
            classifier = classifier.with_source(Arc::new(client));
        }
        Ok(classifier)
    }

    /// Cache-only probe for a single token. No fetch is issued; a miss is
    /// `None`. Use [`classify_many`](Self::classify_many) to resolve.
    pub fn classify_one(&self, token: &str) -> Option<TagCategory> {
        self.store
            .memoized(token)
            .or_else(|| self.store.lookup(token).and_then(|record| record.category()))
    }

    /// Classify every token of a tag string, in order.
    ///
    /// The output is positionally aligned with the non-empty token list;
    /// duplicates are preserved. Misses go to the source in chunks of at
    /// most 100, and newly learned records are persisted.
    pub async fn classify_many(&mut self, tag_string: &str) -> Result<Vec<TagCategory>> {
        let tokens = BatchResolver::split_tokens(tag_string);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        self.resolver.resolve(&mut self.store, &tokens).await
    }

    /// Verbose form of [`classify_many`](Self::classify_many): labels
    /// instead of categories. Raw codes come from [`TagCategory::code`].
    pub async fn classify_labels(&mut self, tag_string: &str) -> Result<Vec<&'static str>> {
        let categories = self.classify_many(tag_string).await?;
        Ok(categories.into_iter().map(TagCategory::label).collect())
    }

    /// Group the tokens of a tag string by category.
    ///
    /// Tokens keep first-seen order within their category; categories appear
    /// in order of first occurrence across the input.
    pub async fn group_by_category(
        &mut self,
        tag_string: &str,
    ) -> Result<Vec<(TagCategory, Vec<String>)>> {
        let tokens = BatchResolver::split_tokens(tag_string);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let categories = self.resolver.resolve(&mut self.store, &tokens).await?;

        let mut order: Vec<TagCategory> = Vec::new();
        let mut members: HashMap<TagCategory, Vec<String>> = HashMap::new();
        for (token, category) in tokens.into_iter().zip(categories) {
            let group = members.entry(category).or_insert_with(|| {
                order.push(category);
                Vec::new()
            });
            group.push(token);
        }
        Ok(order
            .into_iter()
            .map(|category| {
                let group = members.remove(&category).unwrap_or_default();
                (category, group)
            })
            .collect())
    }

    /// Tokens of a tag string that the local cache cannot answer.
    pub fn missing_tags(&self, tag_string: &str) -> Vec<String> {
        BatchResolver::split_tokens(tag_string)
            .into_iter()
            .filter(|token| self.classify_one(token).is_none())
            .collect()
    }

    /// Exact-key cache membership (no normalization).
    pub fn tag_exists(&self, name: &str) -> bool {
        self.store.contains_name(name)
    }

    /// Rewrite the log to one entry per name and rebuild the index.
    pub fn compact(&mut self) -> Result<ReplayStats> {
        self.store.reload_compacted()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RecordStore {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TagRecord;

    fn warm_classifier(records: &[(i64, &str, i64)]) -> (tempfile::TempDir, TagClassifier) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path().join("tags.jsonl")).unwrap();
        for (id, name, type_code) in records {
            store.insert(TagRecord {
                id: *id,
                name: name.to_string(),
                count: None,
                type_code: *type_code,
                ambiguous: None,
            });
        }
        (dir, TagClassifier::new(store))
    }

    #[test]
    fn test_classify_one_is_cache_only() {
        let (_dir, classifier) = warm_classifier(&[(1, "1girl", 0)]);
        assert_eq!(classifier.classify_one("1girl"), Some(TagCategory::General));
        assert_eq!(classifier.classify_one("unseen"), None);
    }

    #[tokio::test]
    async fn test_classify_many_empty_input() {
        let (_dir, mut classifier) = warm_classifier(&[]);
        assert!(classifier.classify_many("").await.unwrap().is_empty());
        assert!(classifier.classify_many(" \t ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_classify_many_preserves_order_and_duplicates() {
        let (_dir, mut classifier) = warm_classifier(&[(1, "1girl", 0), (2, "miko", 4)]);
        let categories = classifier
            .classify_many("miko 1girl miko")
            .await
            .unwrap();
        assert_eq!(
            categories,
            vec![
                TagCategory::Character,
                TagCategory::General,
                TagCategory::Character
            ]
        );
    }

    #[tokio::test]
    async fn test_classify_labels() {
        let (_dir, mut classifier) = warm_classifier(&[(1, "1girl", 0), (2, "highres", 5)]);
        let labels = classifier.classify_labels("1girl highres").await.unwrap();
        assert_eq!(labels, vec!["general", "meta"]);
    }

    #[tokio::test]
    async fn test_group_by_category_orders_by_first_occurrence() {
        let (_dir, mut classifier) = warm_classifier(&[
            (1, "1girl", 0),
            (2, "miko", 4),
            (3, "1boy", 0),
            (4, "highres", 5),
        ]);
        let groups = classifier
            .group_by_category("miko 1girl highres 1boy")
            .await
            .unwrap();
        assert_eq!(
            groups,
            vec![
                (TagCategory::Character, vec!["miko".to_string()]),
                (
                    TagCategory::General,
                    vec!["1girl".to_string(), "1boy".to_string()]
                ),
                (TagCategory::Meta, vec!["highres".to_string()]),
            ]
        );
    }

    #[test]
    fn test_missing_tags() {
        let (_dir, classifier) = warm_classifier(&[(1, "1girl", 0)]);
        assert_eq!(
            classifier.missing_tags("1girl unseen other"),
            vec!["unseen".to_string(), "other".to_string()]
        );
    }

    #[test]
    fn test_tag_exists_is_exact() {
        let (_dir, classifier) = warm_classifier(&[(1, "Tag'x", 0)]);
        assert!(classifier.tag_exists("Tag'x"));
        assert!(classifier.tag_exists("tag'x"));
        assert!(!classifier.tag_exists("TAG'X"));
    }
}
