//! Batched tag resolution
//!
//! Splits a tag string into tokens, resolves each against the local store,
//! and delegates misses to the configured source in chunks of at most 100.
//! Newly learned records are indexed and appended durably; tokens the source
//! cannot name fall back to the configured default category, when one is
//! set.

use crate::error::{Error, Result};
use crate::source::{SourceError, TagSource, MAX_BULK_TOKENS};
use crate::store::RecordStore;
use crate::taxonomy::TagCategory;
use std::sync::Arc;

/// Miss-driven batch resolver over a [`RecordStore`].
pub struct BatchResolver {
    source: Option<Arc<dyn TagSource>>,
    default_category: Option<TagCategory>,
}

impl BatchResolver {
    pub fn new(
        source: Option<Arc<dyn TagSource>>,
        default_category: Option<TagCategory>,
    ) -> Self {
        BatchResolver {
            source,
            default_category,
        }
    }

    pub fn default_category(&self) -> Option<TagCategory> {
        self.default_category
    }

    pub fn set_default_category(&mut self, category: TagCategory) {
        self.default_category = Some(category);
    }

    pub fn set_source(&mut self, source: Arc<dyn TagSource>) {
        self.source = Some(source);
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Split a tag string on whitespace, dropping empty tokens.
    pub fn split_tokens(tag_string: &str) -> Vec<String> {
        tag_string.split_whitespace().map(str::to_string).collect()
    }

    /// Category of a token answerable from the store alone.
    fn cached_category(store: &RecordStore, token: &str) -> Option<TagCategory> {
        store
            .memoized(token)
            .or_else(|| store.lookup(token).and_then(|record| record.category()))
    }

    /// Resolve every token, in order, to a category.
    ///
    /// Fully cached chunks issue no fetch. Chunks with misses go to the
    /// source with exactly the missing tokens; exhausted fetches leave their
    /// tokens unresolved for the final pass, where the default category (if
    /// any) takes over and is memoized so the token never re-fetches.
    pub async fn resolve(
        &self,
        store: &mut RecordStore,
        tokens: &[String],
    ) -> Result<Vec<TagCategory>> {
        for chunk in tokens.chunks(MAX_BULK_TOKENS) {
            self.resolve_chunk(store, chunk).await?;
        }

        let mut categories = Vec::with_capacity(tokens.len());
        for token in tokens {
            let resolved = Self::cached_category(store, token);
            // the no-source-no-default case already failed during chunk
            // resolution, so a hole here means the source gave up on this
            // token and there is no fallback
            let category = match resolved.or(self.default_category) {
                Some(category) => category,
                None => return Err(Error::Unresolved(token.clone())),
            };
            if resolved.is_none() {
                tracing::warn!(token = %token, category = %category, "tag unresolved; using default category");
            }
            store.memoize(token, category);
            categories.push(category);
        }
        Ok(categories)
    }

    async fn resolve_chunk(&self, store: &mut RecordStore, chunk: &[String]) -> Result<()> {
        let missing: Vec<String> = chunk
            .iter()
            .filter(|token| Self::cached_category(store, token).is_none())
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let source = match &self.source {
            Some(source) => source,
            None if self.default_category.is_some() => return Ok(()),
            None => {
                return Err(Error::Config(format!(
                    "tag {:?} is not cached and no source or default category is configured",
                    missing[0]
                )));
            }
        };

        match source.fetch_bulk(&missing).await {
            Ok(records) => {
                for record in records {
                    store.record_fetched(record)?;
                }
            }
            Err(SourceError::Exhausted { attempts }) => {
                tracing::warn!(
                    attempts,
                    unresolved = missing.len(),
                    "bulk lookup exhausted retries; tokens stay unresolved"
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, unresolved = missing.len(), "bulk lookup failed; tokens stay unresolved");
            }
        }
        Ok(())
    }
}
