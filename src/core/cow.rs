//! Copy-on-write promotion and whiteout creation.
//!
//! The only component that mutates an RW branch or a meta directory: promotion
//! copies an RO original upward, and whiteout creation records a deletion or
//! masking decision. Neither operation is transactional across steps — a
//! crash mid-promotion leaves a partial RW copy; this is a documented
//! limitation, not a bug to engineer around here.

use std::fs::{self, OpenOptions};
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use crate::core::branch::BranchTable;
use crate::core::errors::{Result, UfsError};
use crate::core::pathbuilder::build_path;
use crate::core::whiteout::{whiteout_tag, METANAME};

/// Kind of whiteout being recorded. Only affects which helper creates it;
/// readers treat both identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteoutKind {
    /// Masks a file.
    File,
    /// Masks a directory.
    Dir,
}

/// Promote `logical_path`'s RO content into the lowest RW branch above
/// `branch_ro`, creating parent directories as needed (mode copied from the
/// RO source, owner preserved) and copying file content byte-for-byte. The RO
/// original is left untouched (invariant I6).
///
/// Returns the physical path of the newly-created RW copy.
///
/// # Errors
/// Returns [`UfsError::NoUpperRw`] if no RW branch exists above `branch_ro`.
/// Propagates I/O failures from directory creation or the copy itself.
pub fn promote(table: &BranchTable, logical_path: &str, branch_ro: usize) -> Result<String> {
    let branch_rw = crate::core::resolver::find_lowest_rw_branch(table, branch_ro).ok_or_else(|| {
        UfsError::NoUpperRw {
            path: logical_path.into(),
        }
    })?;

    let ro_root = table.get(branch_ro).unwrap().root().to_string_lossy().into_owned();
    let rw_root = table.get(branch_rw).unwrap().root().to_string_lossy().into_owned();

    let ro_phys = build_path([ro_root.as_str(), logical_path])?;
    let rw_phys = build_path([rw_root.as_str(), logical_path])?;

    let ro_meta = fs::metadata(&ro_phys).map_err(|e| UfsError::io(ro_phys.clone(), e))?;

    if let Some(parent) = Path::new(&rw_phys).parent() {
        mkdir_parents_like(&ro_phys, parent)?;
    }

    fs::copy(&ro_phys, &rw_phys).map_err(|e| UfsError::io(rw_phys.clone(), e))?;
    fs::set_permissions(&rw_phys, fs::Permissions::from_mode(ro_meta.mode()))
        .map_err(|e| UfsError::io(rw_phys.clone(), e))?;

    Ok(rw_phys)
}

/// Recreate `target`'s ancestor directories (up to and excluding the branch
/// root) inside the RW branch, copying mode bits from the matching RO
/// ancestor where one exists.
fn mkdir_parents_like(ro_phys_file: &str, rw_parent: &Path) -> Result<()> {
    if rw_parent.exists() {
        return Ok(());
    }
    if let Some(grandparent) = rw_parent.parent() {
        mkdir_parents_like(ro_phys_file, grandparent)?;
    }
    let mode = Path::new(ro_phys_file)
        .parent()
        .and_then(|p| fs::metadata(p).ok())
        .map_or(0o755, |m| m.mode());

    match fs::create_dir(rw_parent) {
        Ok(()) => {
            let _ = fs::set_permissions(rw_parent, fs::Permissions::from_mode(mode));
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(UfsError::io(rw_parent, e)),
    }
}

/// After a successful RW delete, record a whiteout in `branch_rw`'s meta
/// directory if any lower branch still exposes the same logical name. The
/// whiteout kind only affects naming; both are read back identically.
///
/// # Errors
/// Propagates I/O failures creating the meta directory or the marker file.
pub fn maybe_whiteout(
    table: &BranchTable,
    logical_path: &str,
    branch_rw: usize,
    kind: WhiteoutKind,
) -> Result<()> {
    let visible_below = (branch_rw + 1..table.count()).any(|j| {
        let root = table.get(j).unwrap().root().to_string_lossy().into_owned();
        build_path([root.as_str(), logical_path])
            .ok()
            .is_some_and(|p| fs::symlink_metadata(p).is_ok())
    });

    if !visible_below {
        return Ok(());
    }

    match kind {
        WhiteoutKind::File => hide_file(table, logical_path, branch_rw),
        WhiteoutKind::Dir => hide_dir(table, logical_path, branch_rw),
    }
}

/// Create the marker file that masks a directory. Identical to
/// [`hide_file`]; kept separate only so callers at the rmdir/unlink edge can
/// translate errors per-operation.
///
/// # Errors
/// Idempotent per P5: if the marker already exists as a plain (regular)
/// file, this is a no-op success, not a failure. Translates `ENOTDIR`/
/// `ENOTEMPTY` — and `EEXIST` against something that isn't the expected
/// marker file — into [`UfsError::WhiteoutFailed`]; propagates anything
/// else.
pub fn hide_dir(table: &BranchTable, logical_path: &str, branch_rw: usize) -> Result<()> {
    create_marker(table, logical_path, branch_rw)
}

/// Create the marker file that masks a file. See [`hide_dir`].
///
/// # Errors
/// Same translation rules as [`hide_dir`].
pub fn hide_file(table: &BranchTable, logical_path: &str, branch_rw: usize) -> Result<()> {
    create_marker(table, logical_path, branch_rw)
}

fn create_marker(table: &BranchTable, logical_path: &str, branch_rw: usize) -> Result<()> {
    let root = table.get(branch_rw).unwrap().root().to_string_lossy().into_owned();

    let (parent, name) = split_logical(logical_path);
    let meta_parent = build_path([root.as_str(), METANAME, parent.as_str()])?;
    fs::create_dir_all(&meta_parent).map_err(|e| UfsError::io(meta_parent.clone(), e))?;

    let marker_path = build_path([meta_parent.as_str(), &whiteout_tag(name)])?;

    match OpenOptions::new().write(true).create_new(true).open(&marker_path) {
        Ok(_file) => Ok(()),
        Err(e) => match e.raw_os_error() {
            Some(code) if code == libc::EEXIST => {
                if fs::metadata(&marker_path).is_ok_and(|m| m.is_file()) {
                    // The marker is already there — a repeat rmdir_ro/unlink_ro
                    // call, or a concurrent one. P5 requires this not to fail
                    // the operation as a whole.
                    Ok(())
                } else {
                    Err(UfsError::WhiteoutFailed {
                        path: logical_path.into(),
                        source: io::Error::from_raw_os_error(libc::EFAULT),
                    })
                }
            }
            Some(code) if code == libc::ENOTDIR || code == libc::ENOTEMPTY => {
                Err(UfsError::WhiteoutFailed {
                    path: logical_path.into(),
                    source: io::Error::from_raw_os_error(libc::EFAULT),
                })
            }
            _ => Err(UfsError::io(marker_path, e)),
        },
    }
}

fn split_logical(logical_path: &str) -> (String, &str) {
    match logical_path.rsplit_once('/') {
        Some(("", name)) => ("/".to_string(), name),
        Some((parent, name)) => (parent.to_string(), name),
        None => ("/".to_string(), logical_path),
    }
}

/// True if a handle to `path` already exists on disk, used by idempotent
/// whiteout creation callers (P5) to decide whether a retry is a no-op.
#[must_use]
pub fn marker_exists(path: &str) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;

    fn table_with(modes: &[&str]) -> (Vec<tempfile::TempDir>, BranchTable) {
        let mut tmp = Vec::new();
        let mut specs = Vec::new();
        for mode in modes {
            let d = tempfile::tempdir().unwrap();
            specs.push(format!("{}={}", d.path().display(), mode));
            tmp.push(d);
        }
        let table = BranchTable::new(&specs).unwrap();
        (tmp, table)
    }

    #[test]
    fn promote_copies_content_and_preserves_ro_original() {
        let (tmp, table) = table_with(&["RW", "RO"]);
        stdfs::write(tmp[1].path().join("foo"), b"original").unwrap();

        let rw_phys = promote(&table, "/foo", 1).unwrap();
        assert_eq!(stdfs::read(&rw_phys).unwrap(), b"original");
        assert_eq!(stdfs::read(tmp[1].path().join("foo")).unwrap(), b"original");
    }

    #[test]
    fn promote_fails_without_rw_branch_above() {
        let (tmp, table) = table_with(&["RO", "RO"]);
        stdfs::write(tmp[1].path().join("x"), b"hi").unwrap();
        assert!(matches!(
            promote(&table, "/x", 1),
            Err(UfsError::NoUpperRw { .. })
        ));
    }

    #[test]
    fn maybe_whiteout_creates_marker_when_lower_branch_still_has_name() {
        let (tmp, table) = table_with(&["RW", "RO"]);
        stdfs::write(tmp[1].path().join("bar"), b"").unwrap();

        maybe_whiteout(&table, "/bar", 0, WhiteoutKind::File).unwrap();

        let marker = tmp[0].path().join(".ulakefs").join("bar_HIDDEN~");
        assert!(marker.exists());
    }

    #[test]
    fn maybe_whiteout_is_noop_when_nothing_left_below() {
        let (tmp, table) = table_with(&["RW", "RO"]);
        // Nothing in branch 1 named "baz".
        maybe_whiteout(&table, "/baz", 0, WhiteoutKind::File).unwrap();

        let marker = tmp[0].path().join(".ulakefs").join("baz_HIDDEN~");
        assert!(!marker.exists());
    }

    #[test]
    fn hide_dir_second_call_is_idempotent_noop() {
        let (tmp, table) = table_with(&["RW"]);
        let _ = &tmp;
        hide_dir(&table, "/d", 0).unwrap();
        hide_dir(&table, "/d", 0).unwrap();
    }

    #[test]
    fn hide_dir_conflict_with_non_marker_entry_is_whiteout_failed() {
        let (tmp, table) = table_with(&["RW"]);
        let marker_dir = tmp[0].path().join(".ulakefs").join("d_HIDDEN~");
        stdfs::create_dir_all(&marker_dir).unwrap();

        let err = hide_dir(&table, "/d", 0).unwrap_err();
        assert!(matches!(err, UfsError::WhiteoutFailed { .. }));
    }
}
