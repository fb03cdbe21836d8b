//! `rmdir`/`unlink` dispatch: RO branches get whited out, RW branches get
//! physically removed.

use std::fs;

use crate::core::branch::BranchTable;
use crate::core::cow::{hide_dir, hide_file, maybe_whiteout, WhiteoutKind};
use crate::core::errors::{Result, UfsError};
use crate::core::pathbuilder::build_path;
use crate::core::readdir::{dir_not_empty, HideMeta};
use crate::core::resolver::{find_lowest_rw_branch, find_rorw_branch};

/// Remove the directory at `logical_path`.
///
/// # Errors
/// - Propagates `Err` if the directory is non-empty (matching `ENOTEMPTY`
///   semantics — callers should map this case to that errno).
/// - [`UfsError::ReadOnly`] if the effective branch is RO and COW is off.
/// - [`UfsError::NoUpperRw`] if COW is on but no RW branch exists above.
/// - [`UfsError::WhiteoutFailed`] if marker creation hit an illegal state.
pub fn rmdir(table: &BranchTable, cow_enabled: bool, logical_path: &str) -> Result<()> {
    if dir_not_empty(table, cow_enabled, HideMeta { enabled: true }, logical_path)? {
        return Err(UfsError::Underlying {
            path: logical_path.into(),
            source: std::io::Error::from_raw_os_error(libc::ENOTEMPTY),
        });
    }

    let i = find_rorw_branch(table, logical_path)?;
    let branch = table.get(i).unwrap();

    if branch.is_rw() {
        let root = branch.root().to_string_lossy().into_owned();
        let phys = build_path([root.as_str(), logical_path])?;
        fs::remove_dir(&phys).map_err(|e| UfsError::io(phys, e))?;
        maybe_whiteout(table, logical_path, i, WhiteoutKind::Dir)?;
        Ok(())
    } else if !cow_enabled {
        Err(UfsError::ReadOnly {
            path: logical_path.into(),
        })
    } else {
        rmdir_ro(table, logical_path, i)
    }
}

fn rmdir_ro(table: &BranchTable, logical_path: &str, branch_ro: usize) -> Result<()> {
    let branch_rw = find_lowest_rw_branch(table, branch_ro).ok_or_else(|| UfsError::NoUpperRw {
        path: logical_path.into(),
    })?;
    hide_dir(table, logical_path, branch_rw)
}

/// Remove the file at `logical_path`. No emptiness check (files have none).
///
/// # Errors
/// Same variants as [`rmdir`], minus the emptiness case.
pub fn unlink(table: &BranchTable, cow_enabled: bool, logical_path: &str) -> Result<()> {
    let i = find_rorw_branch(table, logical_path)?;
    let branch = table.get(i).unwrap();

    if branch.is_rw() {
        let root = branch.root().to_string_lossy().into_owned();
        let phys = build_path([root.as_str(), logical_path])?;
        fs::remove_file(&phys).map_err(|e| UfsError::io(phys, e))?;
        maybe_whiteout(table, logical_path, i, WhiteoutKind::File)?;
        Ok(())
    } else if !cow_enabled {
        Err(UfsError::ReadOnly {
            path: logical_path.into(),
        })
    } else {
        unlink_ro(table, logical_path, i)
    }
}

fn unlink_ro(table: &BranchTable, logical_path: &str, branch_ro: usize) -> Result<()> {
    let branch_rw = find_lowest_rw_branch(table, branch_ro).ok_or_else(|| UfsError::NoUpperRw {
        path: logical_path.into(),
    })?;
    hide_file(table, logical_path, branch_rw)
}
