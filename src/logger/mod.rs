//! Debug logging: a single JSONL sink behind a reader-writer lock.
//!
//! The original implementation keeps one global debug-file path guarded by a
//! `pthread_rwlock` — readers (every request thread deciding whether to log)
//! take the shared side, the mount-time setter takes the exclusive side once.
//! [`DebugLog`] is the same shape: cheap, lock-free-for-readers-in-practice
//! checks on the hot path, a single writer lock acquisition only when
//! `debug_file=PATH` is configured at startup.

pub mod jsonl;

use parking_lot::RwLock;

use self::jsonl::{JsonlConfig, JsonlWriter, LogEntry};

/// Process-wide debug logger. `None` when no `debug_file` was configured —
/// the common case, and the reason this is a lock around an `Option` rather
/// than always-on.
pub struct DebugLog {
    writer: RwLock<Option<JsonlWriter>>,
}

impl DebugLog {
    /// A logger with no sink configured; every call to [`Self::log`] is a
    /// no-op shared-lock check.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            writer: RwLock::new(None),
        }
    }

    /// Enable logging to `config.path` (with its fallback chain).
    #[must_use]
    pub fn enabled(config: JsonlConfig) -> Self {
        Self {
            writer: RwLock::new(Some(JsonlWriter::open(config))),
        }
    }

    /// Enable logging straight to stderr, skipping the file fallback chain.
    /// Used for `-d`/kernel-bridge debug, where there is no `debug_file=PATH`
    /// configured and the user just wants to watch operations go by.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: RwLock::new(Some(JsonlWriter::stderr())),
        }
    }

    /// True if a sink is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.writer.read().is_some()
    }

    /// Write `entry` if logging is enabled. Cheap no-op otherwise.
    pub fn log(&self, entry: LogEntry) {
        let mut guard = self.writer.write();
        if let Some(w) = guard.as_mut() {
            w.write_entry(&entry);
        }
    }
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::disabled()
    }
}
