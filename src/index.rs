//! Refreshable in-memory index of known codes.
//!
//! The index holds one complete snapshot of the external allowlist. A reload
//! fetches the whole source, builds a fresh set off to the side, and swaps it
//! in under a short write lock; membership reads never observe a half-built
//! set and a failed fetch leaves the previous snapshot untouched.
//!
//! Freshness is TTL-based and lazy: `maybe_reload` is the hot-path hook and
//! only pays for a fetch once the snapshot has aged past the TTL.

use std::collections::HashSet;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;
use time::OffsetDateTime;

use crate::code::CodeKey;

/// The external allowlist could not be fetched.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source auth failed: {0}")]
    Auth(String),

    #[error("source transport failed: {0}")]
    Transport(String),

    #[error("source returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("sheet not found: {0}")]
    MissingSheet(String),

    #[error("malformed source payload: {0}")]
    Malformed(String),
}

/// Read-only supplier of the raw allowlist: rows of string cells.
///
/// Injectable so tests can fake the external source; the production
/// implementation is [`crate::sheets::SheetsSource`].
pub trait CodeSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<Vec<String>>, SourceError>;
}

impl<T: CodeSource + ?Sized> CodeSource for std::sync::Arc<T> {
    fn fetch(&self) -> Result<Vec<Vec<String>>, SourceError> {
        (**self).fetch()
    }
}

/// Outcome of one successful full load.
#[derive(Debug, Clone, Copy)]
pub struct LoadReport {
    /// Non-empty source cells processed (duplicates counted per cell).
    pub cells: usize,
    /// Distinct canonical codes in the new snapshot.
    pub unique: usize,
    pub loaded_at: OffsetDateTime,
}

struct Snapshot {
    codes: HashSet<CodeKey>,
    /// `None` until the first successful load; the index is stale until then.
    loaded_at: Option<Instant>,
}

pub struct CodeIndex {
    source: Box<dyn CodeSource>,
    ttl: Duration,
    snapshot: RwLock<Snapshot>,
    /// Single-flight guard: at most one reload in flight; losers keep serving
    /// the stale snapshot.
    reload_gate: Mutex<()>,
}

impl CodeIndex {
    pub fn new(source: Box<dyn CodeSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            snapshot: RwLock::new(Snapshot {
                codes: HashSet::new(),
                loaded_at: None,
            }),
            reload_gate: Mutex::new(()),
        }
    }

    /// Full fetch-and-replace. The fetch runs without any lock held; only the
    /// final swap takes the write lock. On error the previous snapshot stays
    /// in place and the error propagates to the caller.
    pub fn load(&self) -> Result<LoadReport, SourceError> {
        let rows = self.source.fetch()?;

        let mut codes = HashSet::new();
        let mut cells = 0usize;
        for row in &rows {
            for cell in row {
                if let Some(key) = CodeKey::parse(cell) {
                    cells += 1;
                    codes.insert(key);
                }
            }
        }
        let unique = codes.len();

        let mut snap = self.snapshot.write().expect("index snapshot lock poisoned");
        snap.codes = codes;
        snap.loaded_at = Some(Instant::now());
        drop(snap);

        tracing::info!(cells, unique, "code index loaded");
        Ok(LoadReport {
            cells,
            unique,
            loaded_at: OffsetDateTime::now_utc(),
        })
    }

    /// Lazy-refresh hook for the hot path: reloads only when the snapshot has
    /// aged past the TTL. Returns whether this call performed the reload.
    pub fn maybe_reload(&self) -> Result<bool, SourceError> {
        if !self.is_stale() {
            return Ok(false);
        }

        // Only one caller fetches; concurrent callers serve the stale
        // snapshot rather than piling up redundant round trips.
        let Ok(_gate) = self.reload_gate.try_lock() else {
            return Ok(false);
        };

        // Re-check: a reload may have finished between the staleness check
        // and taking the gate.
        if !self.is_stale() {
            return Ok(false);
        }

        self.load()?;
        Ok(true)
    }

    /// Pure snapshot membership. Never fetches.
    pub fn contains(&self, code: &CodeKey) -> bool {
        self.snapshot
            .read()
            .expect("index snapshot lock poisoned")
            .codes
            .contains(code)
    }

    /// Distinct codes in the current snapshot.
    pub fn unique_len(&self) -> usize {
        self.snapshot
            .read()
            .expect("index snapshot lock poisoned")
            .codes
            .len()
    }

    fn is_stale(&self) -> bool {
        let snap = self.snapshot.read().expect("index snapshot lock poisoned");
        match snap.loaded_at {
            Some(at) => at.elapsed() > self.ttl,
            None => true,
        }
    }
}
