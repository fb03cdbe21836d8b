//! Crate-wide error type with stable, machine-parseable error codes.
//!
//! Every variant carries a `UFS-xxxx` code via [`UfsError::code`] so that JSONL
//! debug log entries and exit diagnostics can be grepped/correlated without
//! parsing the human-readable message.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, UfsError>;

/// Errors produced by path resolution, branch management, and the COW/whiteout
/// engine. Kept separate from the raw `io::Error`s returned across the FUSE
/// boundary so that internal callers can match on semantics rather than errno.
#[derive(Debug, Error)]
pub enum UfsError {
    /// No branch contains the requested logical path.
    #[error("no such file or directory: {}", path.display())]
    NotFound {
        /// Logical path that could not be resolved.
        path: PathBuf,
    },

    /// A resolved physical path would exceed [`crate::core::pathbuilder::MAX_PATH_LEN`].
    #[error("path too long: {}", path.display())]
    PathTooLong {
        /// Logical path whose physical expansion overflowed.
        path: PathBuf,
    },

    /// A mutating operation was attempted but the owning branch is read-only.
    #[error("read-only branch: {}", path.display())]
    ReadOnly {
        /// Logical path that resolved to a RO branch.
        path: PathBuf,
    },

    /// Copy-on-write promotion needed a RW branch below the RO branch holding
    /// the file, but none exists.
    #[error("no read-write branch available to promote: {}", path.display())]
    NoUpperRw {
        /// Logical path that could not be promoted.
        path: PathBuf,
    },

    /// Whiteout-tag creation or removal failed outright.
    #[error("failed to create whiteout for {}: {source}", path.display())]
    WhiteoutFailed {
        /// Logical path the whiteout was meant to cover.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure surfaced by a branch-local syscall.
    #[error("I/O error at {}: {source}", path.display())]
    Underlying {
        /// Physical path the syscall touched.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// Configuration could not be assembled from CLI/mount options.
    #[error("invalid configuration: {message}")]
    BadConfig {
        /// Human-readable explanation.
        message: String,
    },
}

impl UfsError {
    /// Stable error code, e.g. `"UFS-1001"`. Safe to log and to match on across
    /// releases — the numbering only grows, never gets reused.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "UFS-1001",
            Self::PathTooLong { .. } => "UFS-1002",
            Self::ReadOnly { .. } => "UFS-1003",
            Self::NoUpperRw { .. } => "UFS-1004",
            Self::WhiteoutFailed { .. } => "UFS-1005",
            Self::Underlying { .. } => "UFS-2001",
            Self::BadConfig { .. } => "UFS-3001",
        }
    }

    /// Negative errno to hand back to the kernel through `fuser`'s reply
    /// types. `BadConfig` has no kernel-facing meaning; callers that can reach
    /// it pre-mount should treat it as fatal instead of converting it.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound { .. } => libc::ENOENT,
            Self::PathTooLong { .. } => libc::ENAMETOOLONG,
            Self::ReadOnly { .. } => libc::EROFS,
            Self::NoUpperRw { .. } => libc::EACCES,
            Self::WhiteoutFailed { .. } => libc::EFAULT,
            Self::Underlying { source, .. } => source.raw_os_error().unwrap_or(libc::EIO),
            Self::BadConfig { .. } => libc::EINVAL,
        }
    }

    /// Build an [`UfsError::Underlying`] from a path and the `io::Error` that
    /// occurred while operating on it.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Underlying {
            path: path.into(),
            source,
        }
    }
}

impl From<UfsError> for io::Error {
    fn from(e: UfsError) -> Self {
        io::Error::from_raw_os_error(e.errno())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<UfsError> {
        vec![
            UfsError::NotFound { path: "/a".into() },
            UfsError::PathTooLong { path: "/a".into() },
            UfsError::ReadOnly { path: "/a".into() },
            UfsError::NoUpperRw { path: "/a".into() },
            UfsError::WhiteoutFailed {
                path: "/a".into(),
                source: io::Error::from_raw_os_error(libc::EIO),
            },
            UfsError::Underlying {
                path: "/a".into(),
                source: io::Error::from_raw_os_error(libc::ENOSPC),
            },
            UfsError::BadConfig {
                message: "bad".into(),
            },
        ]
    }

    #[test]
    fn codes_are_unique_and_prefixed() {
        let mut seen = std::collections::HashSet::new();
        for e in all_variants() {
            let code = e.code();
            assert!(code.starts_with("UFS-"), "{code} missing prefix");
            assert!(seen.insert(code), "duplicate code {code}");
        }
    }

    #[test]
    fn not_found_maps_to_enoent() {
        let e = UfsError::NotFound {
            path: "/missing".into(),
        };
        assert_eq!(e.errno(), libc::ENOENT);
    }

    #[test]
    fn read_only_maps_to_erofs() {
        let e = UfsError::ReadOnly { path: "/a".into() };
        assert_eq!(e.errno(), libc::EROFS);
    }

    #[test]
    fn underlying_preserves_original_errno() {
        let e = UfsError::io("/a", io::Error::from_raw_os_error(libc::ENOSPC));
        assert_eq!(e.errno(), libc::ENOSPC);
    }

    #[test]
    fn display_mentions_path() {
        let e = UfsError::NotFound {
            path: "/x/y".into(),
        };
        assert!(e.to_string().contains("/x/y"));
    }
}
