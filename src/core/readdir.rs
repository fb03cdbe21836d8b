//! Merged directory enumeration across the branch stack.

use std::collections::HashSet;
use std::fs;
use std::io;

use crate::core::branch::BranchTable;
use crate::core::errors::{Result, UfsError};
use crate::core::pathbuilder::build_path;
use crate::core::resolver::path_hidden;
use crate::core::whiteout::{is_whiteout_tag, untag, FUSE_TMP_PREFIX, METANAME};

/// Kind of directory entry, enough for the filler to build a minimal `stat`.
/// Mirrors what `d_type` gives the original implementation — no size, mode,
/// or timestamps; callers that need those issue a follow-up `getattr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
    /// Symbolic link.
    Symlink,
    /// Anything else (device node, fifo, socket, unknown).
    Other,
}

impl From<fs::FileType> for EntryKind {
    fn from(ft: fs::FileType) -> Self {
        if ft.is_dir() {
            Self::Dir
        } else if ft.is_symlink() {
            Self::Symlink
        } else if ft.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

/// Callback invoked once per merged entry. Returns `true` to request the
/// enumeration of the *current* directory stop early (the filler's buffer is
/// full); enumeration resumes with the next branch regardless.
pub trait DirFiller {
    /// Offer one entry to the filler.
    fn fill(&mut self, name: &str, kind: EntryKind) -> bool;
}

impl<F: FnMut(&str, EntryKind) -> bool> DirFiller for F {
    fn fill(&mut self, name: &str, kind: EntryKind) -> bool {
        self(name, kind)
    }
}

/// Whether meta-file hiding is requested, and the reserved transient-file
/// prefix it should also hide (passed in rather than hardcoded so the core
/// stays agnostic of which upper-edge bridge is in front of it).
#[derive(Debug, Clone, Copy)]
pub struct HideMeta {
    /// Hide `METANAME` at branch root, and entries starting with the bridge's
    /// transient-file prefix.
    pub enabled: bool,
}

fn hide_meta_files(hide: HideMeta, branch_root: &str, dir_phys_path: &str, entry_name: &str) -> bool {
    if !hide.enabled {
        return false;
    }
    if dir_phys_path == branch_root && entry_name == METANAME {
        return true;
    }
    entry_name.starts_with(FUSE_TMP_PREFIX)
}

fn read_whiteouts(table: &BranchTable, logical_path: &str, branch_i: usize, whiteouts: &mut HashSet<String>) {
    let Some(branch) = table.get(branch_i) else {
        return;
    };
    let Ok(meta_path) = build_path([
        branch.root().to_string_lossy().as_ref(),
        METANAME,
        logical_path,
    ]) else {
        return;
    };

    let Ok(entries) = fs::read_dir(&meta_path) else {
        return;
    };
    for entry in entries.flatten() {
        let fname = entry.file_name();
        let fname = fname.to_string_lossy();
        if let Some(bare) = untag(&fname) {
            whiteouts.insert(bare.to_string());
        }
    }
}

/// Enumerate the union of every branch's listing at `logical_path`, in
/// branch-priority order, deduplicated by name and filtered by whiteouts and
/// (optionally) the meta directory.
///
/// # Errors
/// Propagates [`UfsError::PathTooLong`] from the path builder and any I/O
/// failure other than a branch simply lacking the directory.
pub fn merged_readdir(
    table: &BranchTable,
    cow_enabled: bool,
    hide_meta: HideMeta,
    logical_path: &str,
    filler: &mut dyn DirFiller,
) -> Result<()> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut whiteouts: HashSet<String> = HashSet::new();

    let mut subdir_hidden = false;

    for i in 0..table.count() {
        if subdir_hidden {
            break;
        }

        let branch = table.get(i).unwrap();
        let branch_root = branch.root().to_string_lossy().into_owned();
        let phys = build_path([branch_root.as_str(), logical_path])?;

        // The original implementation sets the flag here but still finishes
        // processing the branch that triggered it — replicated intentionally,
        // not an oversight here either.
        if path_hidden(table, logical_path, i)? {
            subdir_hidden = true;
        }

        let entries = match fs::read_dir(&phys) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if cow_enabled {
                    read_whiteouts(table, logical_path, i, &mut whiteouts);
                }
                continue;
            }
            Err(e) => return Err(UfsError::io(phys, e)),
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if seen.contains(name.as_ref()) {
                continue;
            }
            if cow_enabled && whiteouts.contains(name.as_ref()) {
                continue;
            }
            if hide_meta_files(hide_meta, branch_root.as_str(), phys.as_str(), &name) {
                continue;
            }

            seen.insert(name.to_string());
            let kind = entry.file_type().map_or(EntryKind::Other, EntryKind::from);
            filler.fill(&name, kind);
        }

        if cow_enabled {
            read_whiteouts(table, logical_path, i, &mut whiteouts);
        }
    }

    Ok(())
}

/// True if `logical_path` has any surviving entry across the branch stack,
/// ignoring `.`, `..`, whiteouts, and meta-hidden entries.
///
/// # Errors
/// Same as [`merged_readdir`].
pub fn dir_not_empty(table: &BranchTable, cow_enabled: bool, hide_meta: HideMeta, logical_path: &str) -> Result<bool> {
    let mut whiteouts: HashSet<String> = HashSet::new();
    let mut subdir_hidden = false;

    for i in 0..table.count() {
        if subdir_hidden {
            break;
        }

        let branch = table.get(i).unwrap();
        let branch_root = branch.root().to_string_lossy().into_owned();
        let phys = build_path([branch_root.as_str(), logical_path])?;

        if path_hidden(table, logical_path, i)? {
            subdir_hidden = true;
        }

        let entries = match fs::read_dir(&phys) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if cow_enabled {
                    read_whiteouts(table, logical_path, i, &mut whiteouts);
                }
                continue;
            }
            Err(e) => return Err(UfsError::io(phys, e)),
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if is_whiteout_tag(&name) {
                continue;
            }
            if cow_enabled && whiteouts.contains(name.as_ref()) {
                continue;
            }
            if hide_meta_files(hide_meta, branch_root.as_str(), phys.as_str(), &name) {
                continue;
            }

            return Ok(true);
        }

        if cow_enabled {
            read_whiteouts(table, logical_path, i, &mut whiteouts);
        }
    }

    Ok(false)
}
