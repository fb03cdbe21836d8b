//! Path resolution: which branch owns a logical path, and whether any
//! ancestor has been whited out above it.

use std::fs;
use std::io;

use crate::core::branch::BranchTable;
use crate::core::errors::{Result, UfsError};
use crate::core::pathbuilder::build_path;
use crate::core::whiteout::{untag, METANAME};

/// Find the effective branch for `logical_path`: the highest-priority branch
/// that both contains the path and is not masked by a whiteout at a shallower
/// index.
///
/// Branch 0 always wins for the root path, matching the tie-break called out
/// in the resolver's design: there is nothing to shadow at the root.
///
/// # Errors
/// Returns [`UfsError::NotFound`] if no branch has the path. Propagates any
/// other I/O failure encountered while `stat`-ing a candidate.
pub fn find_rorw_branch(table: &BranchTable, logical_path: &str) -> Result<usize> {
    if logical_path == "/" {
        return Ok(0);
    }

    for i in 0..table.count() {
        if path_hidden(table, logical_path, i)? {
            continue;
        }

        let physical = build_path([table.get(i).unwrap().root().to_string_lossy().as_ref(), logical_path])?;
        match fs::symlink_metadata(&physical) {
            Ok(_) => return Ok(i),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(UfsError::io(physical, e)),
        }
    }

    Err(UfsError::NotFound {
        path: logical_path.into(),
    })
}

/// True iff some ancestor of `logical_path` (including itself) is whited out
/// at a branch index strictly below `branch_i`.
///
/// # Errors
/// Propagates I/O failures while reading a candidate meta directory, other
/// than the directory simply not existing.
pub fn path_hidden(table: &BranchTable, logical_path: &str, branch_i: usize) -> Result<bool> {
    if branch_i == 0 {
        return Ok(false);
    }

    let name = match logical_path.rsplit('/').next() {
        Some(n) if !n.is_empty() => n,
        _ => return Ok(false),
    };
    let parent = parent_of(logical_path);

    for j in 0..branch_i {
        let meta_parent = build_path([
            table.get(j).unwrap().root().to_string_lossy().as_ref(),
            METANAME,
            &parent,
        ])?;

        match fs::read_dir(&meta_parent) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let fname = entry.file_name();
                    let fname = fname.to_string_lossy();
                    if untag(&fname) == Some(name) {
                        return Ok(true);
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(UfsError::io(meta_parent, e)),
        }
    }

    Ok(false)
}

/// Smallest index `j < branch_ro` whose mode is RW, or `None`.
#[must_use]
pub fn find_lowest_rw_branch(table: &BranchTable, branch_ro: usize) -> Option<usize> {
    (0..branch_ro).find(|&j| table.get(j).is_some_and(crate::core::branch::Branch::is_rw))
}

fn parent_of(logical_path: &str) -> String {
    match logical_path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((head, _)) => head.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::whiteout::whiteout_tag;
    use std::fs as stdfs;

    fn table_with(dirs: &[(&str, &str)]) -> (Vec<tempfile::TempDir>, BranchTable) {
        let mut tmp = Vec::new();
        let mut specs = Vec::new();
        for (_, mode) in dirs {
            let d = tempfile::tempdir().unwrap();
            specs.push(format!("{}={}", d.path().display(), mode));
            tmp.push(d);
        }
        let table = BranchTable::new(&specs).unwrap();
        (tmp, table)
    }

    #[test]
    fn root_always_resolves_to_branch_zero() {
        let (_tmp, table) = table_with(&[("a", "RW"), ("b", "RO")]);
        assert_eq!(find_rorw_branch(&table, "/").unwrap(), 0);
    }

    #[test]
    fn finds_first_branch_containing_path() {
        let (tmp, table) = table_with(&[("a", "RW"), ("b", "RO")]);
        stdfs::write(tmp[1].path().join("foo"), b"hi").unwrap();
        assert_eq!(find_rorw_branch(&table, "/foo").unwrap(), 1);
    }

    #[test]
    fn missing_everywhere_is_not_found() {
        let (_tmp, table) = table_with(&[("a", "RW"), ("b", "RO")]);
        assert!(matches!(
            find_rorw_branch(&table, "/nope"),
            Err(UfsError::NotFound { .. })
        ));
    }

    #[test]
    fn whiteout_in_shallower_branch_masks_deeper_entry() {
        let (tmp, table) = table_with(&[("a", "RW"), ("b", "RO")]);
        stdfs::write(tmp[1].path().join("bar"), b"hi").unwrap();
        let meta = tmp[0].path().join(".ulakefs");
        stdfs::create_dir_all(&meta).unwrap();
        stdfs::write(meta.join(whiteout_tag("bar")), b"").unwrap();

        assert!(matches!(
            find_rorw_branch(&table, "/bar"),
            Err(UfsError::NotFound { .. })
        ));
    }

    #[test]
    fn lowest_rw_branch_skips_ro_branches_above() {
        let (_tmp, table) = table_with(&[("a", "RO"), ("b", "RW"), ("c", "RO")]);
        assert_eq!(find_lowest_rw_branch(&table, 2), Some(1));
    }

    #[test]
    fn lowest_rw_branch_returns_none_when_all_ro_above() {
        let (_tmp, table) = table_with(&[("a", "RO"), ("b", "RO")]);
        assert_eq!(find_lowest_rw_branch(&table, 2), None);
    }
}
