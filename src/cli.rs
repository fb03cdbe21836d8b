//! Mount-helper CLI: parses the flat FUSE-style option surface and drives the
//! mount/unmount lifecycle. Deliberately small — a single binary with one
//! job, unlike the subcommand-heavy CLI this crate's ambient stack (`clap`,
//! structured exit codes) is otherwise modeled on.

use std::path::PathBuf;

use clap::Parser;

use crate::core::config::Config;
use crate::core::errors::{Result, UfsError};

/// Union/overlay filesystem mount helper.
#[derive(Debug, Parser)]
#[command(name = "ulakefs", version, about = "Mount a union/overlay filesystem")]
pub struct Cli {
    /// Enable kernel-bridge debug output.
    #[arg(short = 'd')]
    pub debug: bool,

    /// Mount options, comma-separated (see mount option table).
    #[arg(short = 'o', value_name = "OPT[,OPT...]")]
    pub options: Option<String>,

    /// Colon-separated `path[=RO|RW]` branch list, highest priority first.
    pub dirs: String,

    /// Mountpoint for the merged namespace.
    pub mountpoint: PathBuf,
}

/// Process exit codes: 0 on clean unmount, 1 on argument error or fatal init
/// failure.
pub mod exit_code {
    /// Clean shutdown.
    pub const OK: i32 = 0;
    /// Argument error or fatal initialization failure.
    pub const FAILURE: i32 = 1;
}

/// Split a colon-separated `path[=RO|RW]:...` branch list into individual
/// specs, preserving order (priority, highest first).
#[must_use]
pub fn parse_branches(dirs: &str) -> Vec<String> {
    dirs.split(':').filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// Parse a comma-separated `-o` option string into a [`Config`], starting
/// from branches/mountpoint already known from positional args.
///
/// # Errors
/// Returns [`UfsError::BadConfig`] on an unrecognized option or a malformed
/// `max_files=N` value.
pub fn build_config(dirs: &str, mountpoint: PathBuf, options: Option<&str>) -> Result<Config> {
    let mut config = Config {
        branch_specs: parse_branches(dirs),
        mountpoint,
        cow: false,
        hide_meta_files: false,
        chroot: None,
        max_files: None,
        relaxed_permissions: false,
        statfs_omit_ro: false,
        debug_file: None,
        noinitgroups: false,
    };

    for opt in options.unwrap_or_default().split(',').filter(|s| !s.is_empty()) {
        let (key, value) = opt.split_once('=').map_or((opt, None), |(k, v)| (k, Some(v)));
        match key {
            "cow" => config.cow = true,
            "hide_meta_files" | "hide_meta_dir" => config.hide_meta_files = true,
            "noinitgroups" => config.noinitgroups = true,
            "relaxed_permissions" => config.relaxed_permissions = true,
            "statfs_omit_ro" => config.statfs_omit_ro = true,
            "chroot" => {
                config.chroot = Some(PathBuf::from(value.ok_or_else(|| UfsError::BadConfig {
                    message: "chroot requires a path, e.g. chroot=/path".into(),
                })?));
            }
            "debug_file" => {
                config.debug_file = Some(PathBuf::from(value.ok_or_else(|| UfsError::BadConfig {
                    message: "debug_file requires a path".into(),
                })?));
            }
            "max_files" => {
                let n: u64 = value
                    .ok_or_else(|| UfsError::BadConfig {
                        message: "max_files requires a value, e.g. max_files=4096".into(),
                    })?
                    .parse()
                    .map_err(|_| UfsError::BadConfig {
                        message: format!("max_files value is not a number: {}", value.unwrap_or("")),
                    })?;
                config.max_files = Some(n);
            }
            other => {
                return Err(UfsError::BadConfig {
                    message: format!("unrecognized mount option: {other}"),
                });
            }
        }
    }

    config.validate()?;
    Ok(config)
}

/// Raise `RLIMIT_NOFILE` to `n` (soft and hard), matching `max_files=N`.
///
/// # Errors
/// Propagates the underlying `setrlimit` failure.
#[cfg(unix)]
pub fn apply_max_files(n: u64) -> Result<()> {
    use nix::sys::resource::{setrlimit, Resource};
    setrlimit(Resource::RLIMIT_NOFILE, n, n)
        .map_err(|e| UfsError::io(PathBuf::from("RLIMIT_NOFILE"), std::io::Error::from(e)))
}

/// Change the working directory to `path` before branch roots are
/// absolutized, matching the original implementation's `chroot=PATH`
/// ordering: chdir happens first, then every relative branch path resolves
/// against the new cwd.
///
/// # Errors
/// Propagates the underlying `chdir` failure.
pub fn apply_chroot(path: &std::path::Path) -> Result<()> {
    std::env::set_current_dir(path).map_err(|e| UfsError::io(path.to_path_buf(), e))
}
