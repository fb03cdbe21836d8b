//! Inode bookkeeping: a path<->inode map for the process's lifetime.
//!
//! The core itself is entirely path-addressed (see [`crate::core::resolver`]);
//! the kernel, however, speaks inodes. This table is the only place that
//! bridges the two, and it never needs to survive a restart — generation is
//! pinned at 1 for the whole process lifetime, matching the original
//! implementation's single-generation-per-mount assumption.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Root inode number, reserved by FUSE.
pub const ROOT_INO: u64 = 1;

/// Inode generation used for every entry; stable for the process lifetime.
pub const GENERATION: u64 = 1;

/// Bidirectional path<->inode map.
pub struct InodeTable {
    next: u64,
    path_to_ino: HashMap<PathBuf, u64>,
    ino_to_path: HashMap<u64, PathBuf>,
}

impl InodeTable {
    /// A table with only the root inode registered.
    #[must_use]
    pub fn new() -> Self {
        let mut t = Self {
            next: ROOT_INO + 1,
            path_to_ino: HashMap::new(),
            ino_to_path: HashMap::new(),
        };
        t.path_to_ino.insert(PathBuf::from("/"), ROOT_INO);
        t.ino_to_path.insert(ROOT_INO, PathBuf::from("/"));
        t
    }

    /// Look up the logical path for `ino`.
    #[must_use]
    pub fn path(&self, ino: u64) -> Option<&Path> {
        self.ino_to_path.get(&ino).map(PathBuf::as_path)
    }

    /// Return `path`'s inode, allocating a new one if this is the first time
    /// it's been seen.
    pub fn intern(&mut self, path: &Path) -> u64 {
        if let Some(&ino) = self.path_to_ino.get(path) {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.path_to_ino.insert(path.to_path_buf(), ino);
        self.ino_to_path.insert(ino, path.to_path_buf());
        ino
    }

    /// Forget a previously interned path (kernel `FORGET`).
    pub fn forget(&mut self, ino: u64) {
        if ino == ROOT_INO {
            return;
        }
        if let Some(path) = self.ino_to_path.remove(&ino) {
            self.path_to_ino.remove(&path);
        }
    }

    /// Rebind `ino` to `new_path` (rename of a previously-interned entry).
    pub fn rebind(&mut self, old_path: &Path, new_path: &Path) {
        if let Some(ino) = self.path_to_ino.remove(old_path) {
            self.path_to_ino.insert(new_path.to_path_buf(), ino);
            self.ino_to_path.insert(ino, new_path.to_path_buf());
        }
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
