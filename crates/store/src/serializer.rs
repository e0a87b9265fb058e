//! Single-writer discipline and crash-safe saves.
//!
//! Every mutation of the workbook runs inside [`WriteSerializer::exclusive`],
//! and every save goes through [`atomic_write`]: bytes land in a temporary
//! file next to the target which is then renamed over it, so a concurrent
//! reader sees either the old or the new workbook and never a torn one.
//!
//! Whether a failed save is retried is decided by [`RetryPolicy`], based on
//! the [`SaveError`] classification of the attempt.

use crate::error::{StoreError, StoreResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{error, warn};

/// Outcome of one failed save attempt.
#[derive(Debug)]
pub enum SaveError {
    /// Worth retrying: the file is briefly held elsewhere or the I/O
    /// hiccupped.
    Transient(io::Error),
    /// Retrying cannot help (permission denied, disk full, ...).
    Fatal(io::Error),
}

impl SaveError {
    /// Sort an I/O error into transient or fatal.
    #[must_use]
    pub fn classify(err: io::Error) -> Self {
        if is_transient(&err) {
            Self::Transient(err)
        } else {
            Self::Fatal(err)
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// The underlying I/O error.
    #[must_use]
    pub fn into_io(self) -> io::Error {
        match self {
            Self::Transient(e) | Self::Fatal(e) => e,
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    ) {
        return true;
    }
    match err.raw_os_error() {
        // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
        #[cfg(windows)]
        Some(32 | 33) => true,
        // EBUSY, ETXTBSY
        #[cfg(unix)]
        Some(16 | 26) => true,
        _ => false,
    }
}

/// Write `bytes` to `path` via a sibling temporary file and an atomic rename.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), SaveError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(SaveError::classify)?;
    tmp.write_all(bytes).map_err(SaveError::classify)?;
    tmp.as_file().sync_all().map_err(SaveError::classify)?;
    tmp.persist(path)
        .map_err(|e| SaveError::classify(e.error))?;
    Ok(())
}

/// Bounded exponential backoff with random jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay_ms: 100,
            jitter_min_ms: 10,
            jitter_max_ms: 50,
        }
    }
}

impl RetryPolicy {
    /// Try once, never retry.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (1-based): the base delay doubled
    /// per earlier retry, plus jitter.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        let backoff = self.base_delay_ms.saturating_mul(1u64 << shift);
        let jitter = if self.jitter_max_ms > self.jitter_min_ms {
            rand::thread_rng().gen_range(self.jitter_min_ms..=self.jitter_max_ms)
        } else {
            self.jitter_min_ms
        };
        Duration::from_millis(backoff.saturating_add(jitter))
    }

    /// Run `op` until it succeeds, fails fatally, or the attempt budget is
    /// spent. `op` receives the 1-based attempt number.
    pub fn run<T>(&self, mut op: impl FnMut(u32) -> Result<T, SaveError>) -> StoreResult<T> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(SaveError::Transient(e)) if attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(attempt, ?delay, error = %e, "transient save failure, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    let source = e.into_io();
                    error!(attempt, error = %source, "save failed");
                    return Err(StoreError::WriteFatal {
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }
}

/// Proof that the caller holds the workbook's write lock.
pub struct WriteGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

/// The one mutual-exclusion region for a workbook file.
///
/// Share a single instance (behind an `Arc`) between every component that
/// mutates the same file.
#[derive(Debug, Default)]
pub struct WriteSerializer {
    lock: Mutex<()>,
    policy: RetryPolicy,
}

impl WriteSerializer {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            lock: Mutex::new(()),
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `f` while holding the write lock. A panic in an earlier holder
    /// does not poison the store: the file on disk is always whole.
    pub fn exclusive<T>(&self, f: impl FnOnce(&WriteGuard<'_>) -> StoreResult<T>) -> StoreResult<T> {
        let guard = WriteGuard {
            _guard: self.lock.lock().unwrap_or_else(PoisonError::into_inner),
        };
        f(&guard)
    }

    /// Atomically replace `path` with `bytes`, retrying per the policy.
    pub fn save(&self, _guard: &WriteGuard<'_>, path: &Path, bytes: &[u8]) -> StoreResult<()> {
        self.policy.run(|_| atomic_write(path, bytes))
    }
}
