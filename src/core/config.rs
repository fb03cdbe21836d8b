//! Mount-time configuration assembled from CLI flags and mount options.
//!
//! Unlike the teacher crate this is derived from, there is no TOML file: the
//! mount-option vocabulary in the original implementation (`-o OPT[,OPT...]`)
//! is the natural configuration surface for a FUSE filesystem, so [`Config`]
//! is built once by [`crate::cli`] and then shared immutably (`Arc<Config>`)
//! with every request — mirroring how the branch table itself is immutable
//! after init (see [`crate::core::branch`]).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, UfsError};

/// Process-wide, immutable-after-init configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Raw `path[=RO|RW]` branch specs, highest priority first.
    pub branch_specs: Vec<String>,
    /// Mountpoint for the merged namespace.
    pub mountpoint: PathBuf,
    /// Enable copy-on-write + whiteout semantics.
    pub cow: bool,
    /// Hide `METANAME` and transient bridge files from readdir.
    pub hide_meta_files: bool,
    /// Change working directory to this path before resolving branch roots.
    pub chroot: Option<PathBuf>,
    /// Raise `RLIMIT_NOFILE` to this value at startup, if set.
    pub max_files: Option<u64>,
    /// Disable kernel-level permission checks. Refused outright for uid/gid 0.
    pub relaxed_permissions: bool,
    /// Exclude RO branches from aggregate `statfs`.
    pub statfs_omit_ro: bool,
    /// Enable debug logging to this file.
    pub debug_file: Option<PathBuf>,
    /// Skip supplementary group initialization.
    pub noinitgroups: bool,
}

impl Config {
    /// Validate cross-field constraints the CLI layer can't check at parse
    /// time (e.g. requires branch list to be non-empty).
    ///
    /// # Errors
    /// Returns [`UfsError::BadConfig`] if no branch was specified, or if
    /// `relaxed_permissions` was requested while running as uid/gid 0 — the
    /// same refusal the original implementation makes, since disabling kernel
    /// permission checks for root is a standing privilege-escalation trap.
    pub fn validate(&self) -> Result<()> {
        if self.branch_specs.is_empty() {
            return Err(UfsError::BadConfig {
                message: "you need to specify at least one branch".into(),
            });
        }

        if self.relaxed_permissions {
            #[cfg(unix)]
            {
                let uid = nix::unistd::getuid();
                let gid = nix::unistd::getgid();
                if uid.is_root() || gid.as_raw() == 0 {
                    return Err(UfsError::BadConfig {
                        message: "relaxed permissions disallowed for root".into(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Whether kernel-level `default_permissions` enforcement should be
    /// requested for the mount. Mirrors the original implementation: enabled
    /// unless `relaxed_permissions` was requested by a non-root user.
    #[must_use]
    pub fn wants_default_permissions(&self) -> bool {
        if !self.relaxed_permissions {
            return true;
        }
        #[cfg(unix)]
        {
            let uid = nix::unistd::getuid();
            let gid = nix::unistd::getgid();
            !(uid.as_raw() != 0 && gid.as_raw() != 0)
        }
        #[cfg(not(unix))]
        {
            true
        }
    }
}
