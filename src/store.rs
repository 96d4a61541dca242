//! Durable record store
//!
//! Append-only JSONL log of tag records plus the in-memory index replayed
//! from it at startup. One JSON object per line; a line is never rewritten
//! in place. Replay is last-write-wins per name and tolerates malformed
//! lines, which a log truncated by an abrupt interruption will contain.

use crate::error::Result;
use crate::normalize::{self, LookupKeys};
use crate::record::TagRecord;
use crate::taxonomy::TagCategory;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Counters from one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Well-formed lines folded into the index
    pub loaded: usize,
    /// Malformed lines skipped
    pub skipped: usize,
}

/// Append-only tag cache.
///
/// The index maps normalized keys to records; several keys may reference the
/// same record, a record is never duplicated. The category memo carries
/// per-token resolutions (including default fallbacks) for the lifetime of
/// this instance and is never persisted.
pub struct RecordStore {
    path: PathBuf,
    index: HashMap<String, TagRecord>,
    memo: HashMap<String, TagCategory>,
    /// First-seen order of canonical names, drives compaction output order
    names: Vec<String>,
    seen_names: HashSet<String>,
    append_lock: Mutex<()>,
}

impl RecordStore {
    /// Open a store backed by `path`, replaying any existing log.
    ///
    /// A missing file is an empty store, not an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = RecordStore {
            path: path.into(),
            index: HashMap::new(),
            memo: HashMap::new(),
            names: Vec::new(),
            seen_names: HashSet::new(),
            append_lock: Mutex::new(()),
        };
        let stats = store.replay()?;
        if stats.loaded > 0 || stats.skipped > 0 {
            tracing::info!(
                path = %store.path.display(),
                loaded = stats.loaded,
                skipped = stats.skipped,
                "replayed tag cache"
            );
        }
        Ok(store)
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of distinct cached names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn replay(&mut self) -> Result<ReplayStats> {
        let mut stats = ReplayStats::default();
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
            Err(err) => return Err(err.into()),
        };
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TagRecord>(&line) {
                Ok(record) => {
                    self.insert(record);
                    stats.loaded += 1;
                }
                Err(err) => {
                    stats.skipped += 1;
                    tracing::warn!(error = %err, "skipping malformed cache line");
                }
            }
        }
        Ok(stats)
    }

    /// Index a record in memory under its three keys (name, HTML-escaped
    /// name, lowercase name). A later record for the same name wins.
    pub fn insert(&mut self, record: TagRecord) {
        if self.seen_names.insert(record.name.clone()) {
            self.names.push(record.name.clone());
        }
        let [name, escaped, lower] = normalize::index_keys(&record.name);
        self.index.insert(escaped, record.clone());
        self.index.insert(lower, record.clone());
        self.index.insert(name, record);
    }

    /// Append one record line to the log.
    ///
    /// Serialized writers: the lock keeps two concurrent resolutions from
    /// interleaving partial lines. Failures propagate.
    pub fn append(&self, record: &TagRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let _guard = self
            .append_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Persist and index a freshly fetched record.
    pub fn record_fetched(&mut self, record: TagRecord) -> Result<()> {
        self.append(&record)?;
        self.insert(record);
        Ok(())
    }

    /// Probe the index for a token, trying its normalized key variants in
    /// precedence order: escaped-apostrophe, lowercase, uppercase, raw,
    /// unescaped. First hit wins.
    pub fn lookup(&self, token: &str) -> Option<&TagRecord> {
        let keys = LookupKeys::for_token(token);
        let hit = keys
            .probe_order()
            .into_iter()
            .find_map(|key| self.index.get(key));
        hit
    }

    /// Exact-key membership check (no normalization).
    pub fn contains_name(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Remember a per-token category resolution for this instance.
    pub fn memoize(&mut self, token: &str, category: TagCategory) {
        self.memo.insert(token.to_string(), category);
    }

    /// Previously memoized category for a token, if any.
    pub fn memoized(&self, token: &str) -> Option<TagCategory> {
        self.memo.get(token).copied()
    }

    /// Write one entry per distinct name (last write wins) to `target`,
    /// preserving first-seen name order. Returns the entry count.
    pub fn compact_to(&self, target: &Path) -> Result<usize> {
        let mut file = File::create(target)?;
        let mut written = 0;
        for name in &self.names {
            // the exact-name key always holds the latest record for a name
            if let Some(record) = self.index.get(name) {
                let mut line = serde_json::to_string(record)?;
                line.push('\n');
                file.write_all(line.as_bytes())?;
                written += 1;
            }
        }
        file.flush()?;
        Ok(written)
    }

    /// Replace the live log with its compacted form via temp file + rename.
    pub fn compact_in_place(&self) -> Result<usize> {
        let tmp = self.path.with_extension("compact.tmp");
        let _guard = self
            .append_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let written = self.compact_to(&tmp)?;
        fs::rename(&tmp, &self.path)?;
        tracing::info!(
            path = %self.path.display(),
            entries = written,
            "compacted tag cache"
        );
        Ok(written)
    }

    /// Compact the live log, then rebuild the index from it. Recovers a log
    /// that accumulated duplicate or broken lines. The category memo is
    /// kept; it is instance state, not log state.
    pub fn reload_compacted(&mut self) -> Result<ReplayStats> {
        self.compact_in_place()?;
        self.index.clear();
        self.names.clear();
        self.seen_names.clear();
        self.replay()
    }
}
