//! The branch table: the ordered stack of directory trees union-mounted
//! together.
//!
//! Built once at mount time and never mutated afterward — every request
//! thread reads it through a plain `Arc`, no lock required (mirrors the
//! request-local vs. shared-immutable split used throughout the crate).

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::core::errors::{Result, UfsError};
use crate::core::paths::resolve_absolute_path;

/// Whether a branch accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchMode {
    /// Read-only: never written to directly; COW promotes out of it instead.
    Ro,
    /// Read-write: eligible as a COW target and for direct mutation.
    Rw,
}

impl BranchMode {
    /// Parse the `=RO`/`=RW` suffix used in a `path[=RO|RW]` branch spec.
    /// Defaults to `Ro` when no suffix is given or the suffix isn't
    /// recognized, matching `add_branch()`'s `uopt.branches[...].rw = 0`
    /// fallback in the original implementation: only a literal `rw` suffix
    /// makes a branch writable.
    #[must_use]
    pub fn parse(suffix: Option<&str>) -> Self {
        match suffix.map(str::to_ascii_uppercase).as_deref() {
            Some("RW") => Self::Rw,
            _ => Self::Ro,
        }
    }
}

/// A single branch: an absolutized root directory plus its access mode.
#[derive(Debug)]
pub struct Branch {
    root: PathBuf,
    mode: BranchMode,
    /// Held open for the branch's lifetime so the root can't be removed out
    /// from under the mount and to fail fast at startup if it's unreachable.
    _handle: File,
}

impl Branch {
    /// Root directory of this branch, absolutized and without a trailing
    /// slash (invariant I2).
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Access mode of this branch.
    #[must_use]
    pub const fn mode(&self) -> BranchMode {
        self.mode
    }

    /// True if this branch accepts writes.
    #[must_use]
    pub const fn is_rw(&self) -> bool {
        matches!(self.mode, BranchMode::Rw)
    }
}

/// The immutable, priority-ordered branch stack. Branch 0 has highest
/// priority; later branches are only consulted when earlier ones don't have
/// (or have whited-out) the requested entry.
#[derive(Debug)]
pub struct BranchTable {
    branches: Vec<Branch>,
}

impl BranchTable {
    /// Build a branch table from `path[=RO|RW]` specs, in priority order.
    /// Each root is absolutized (relative to the current working directory —
    /// callers that need `chroot=PATH` semantics must `chdir` first) and
    /// opened to confirm it exists and is reachable; failure to open any
    /// branch is fatal, matching the original implementation's startup
    /// behavior.
    ///
    /// # Errors
    /// Returns [`UfsError::BadConfig`] if no specs are given, or
    /// [`UfsError::Underlying`] if a branch root can't be opened.
    pub fn new(specs: &[String]) -> Result<Self> {
        if specs.is_empty() {
            return Err(UfsError::BadConfig {
                message: "at least one branch must be specified".into(),
            });
        }

        let mut branches = Vec::with_capacity(specs.len());
        for spec in specs {
            let (path_part, mode_part) = match spec.split_once('=') {
                Some((p, m)) => (p, Some(m)),
                None => (spec.as_str(), None),
            };
            let mode = BranchMode::parse(mode_part);
            let root = resolve_absolute_path(Path::new(path_part));
            let root = strip_trailing_slash(&root);

            let handle = File::open(&root).map_err(|source| UfsError::io(root.clone(), source))?;

            branches.push(Branch {
                root,
                mode,
                _handle: handle,
            });
        }

        Ok(Self { branches })
    }

    /// Number of branches in the stack.
    #[must_use]
    pub fn count(&self) -> usize {
        self.branches.len()
    }

    /// Branch at priority index `i`, if it exists.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&Branch> {
        self.branches.get(i)
    }

    /// Iterate branches in priority order, highest first.
    pub fn iter(&self) -> impl Iterator<Item = &Branch> {
        self.branches.iter()
    }

    /// Iterate branches with their priority index.
    pub fn iter_indexed(&self) -> impl Iterator<Item = (usize, &Branch)> {
        self.branches.iter().enumerate()
    }
}

fn strip_trailing_slash(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.len() > 1 {
        if let Some(stripped) = s.strip_suffix('/') {
            return PathBuf::from(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_defaults_to_ro_without_suffix() {
        assert_eq!(BranchMode::parse(None), BranchMode::Ro);
    }

    #[test]
    fn mode_parses_rw_case_insensitively() {
        assert_eq!(BranchMode::parse(Some("rw")), BranchMode::Rw);
        assert_eq!(BranchMode::parse(Some("RW")), BranchMode::Rw);
    }

    #[test]
    fn mode_parses_unknown_suffix_as_ro() {
        assert_eq!(BranchMode::parse(Some("bogus")), BranchMode::Ro);
    }

    #[test]
    fn rejects_empty_spec_list() {
        assert!(BranchTable::new(&[]).is_err());
    }

    #[test]
    fn builds_table_from_real_dirs() {
        let ro = tempfile::tempdir().unwrap();
        let rw = tempfile::tempdir().unwrap();
        let specs = vec![
            format!("{}=RO", ro.path().display()),
            format!("{}=RW", rw.path().display()),
        ];
        let table = BranchTable::new(&specs).unwrap();
        assert_eq!(table.count(), 2);
        assert_eq!(table.get(0).unwrap().mode(), BranchMode::Ro);
        assert_eq!(table.get(1).unwrap().mode(), BranchMode::Rw);
    }

    #[test]
    fn fails_fast_on_unreachable_branch() {
        let specs = vec!["/nonexistent_ulakefs_test_dir_xyz".to_string()];
        assert!(BranchTable::new(&specs).is_err());
    }

    #[test]
    fn strips_trailing_slash_from_root() {
        let dir = tempfile::tempdir().unwrap();
        let with_slash = format!("{}/", dir.path().display());
        let table = BranchTable::new(&[with_slash]).unwrap();
        assert!(!table.get(0).unwrap().root().to_string_lossy().ends_with('/'));
    }
}
