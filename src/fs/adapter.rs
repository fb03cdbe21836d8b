//! `fuser::Filesystem` dispatch table: translates kernel requests into calls
//! against the path-addressed core, converting `core::errors::UfsError`
//! (and raw `io::Error`) into negated errno on the way back out.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
};
use libc::c_int;
use parking_lot::RwLock;

use crate::core::branch::BranchTable;
use crate::core::config::Config;
use crate::core::cow;
use crate::core::errors::UfsError;
use crate::core::pathbuilder::build_path;
use crate::core::readdir::{self, EntryKind, HideMeta};
use crate::core::remove;
use crate::core::resolver::{find_lowest_rw_branch, find_rorw_branch};
use crate::fs::inode::{InodeTable, GENERATION, ROOT_INO};
use crate::logger::jsonl::{EventType, LogEntry};
use crate::logger::DebugLog;

const TTL: Duration = Duration::from_secs(1);

/// The union/overlay filesystem, implementing `fuser::Filesystem` over the
/// immutable branch table and the path-addressed `core` operations.
pub struct Overlay {
    branches: Arc<BranchTable>,
    config: Arc<Config>,
    debug: Arc<DebugLog>,
    inodes: RwLock<InodeTable>,
}

impl Overlay {
    /// Build a new adapter over an already-constructed branch table and
    /// config. The inode table starts with only the root registered.
    #[must_use]
    pub fn new(branches: Arc<BranchTable>, config: Arc<Config>, debug: Arc<DebugLog>) -> Self {
        Self {
            branches,
            config,
            debug,
            inodes: RwLock::new(InodeTable::new()),
        }
    }

    fn hide_meta(&self) -> HideMeta {
        HideMeta {
            enabled: self.config.hide_meta_files,
        }
    }

    fn logical_path(&self, ino: u64) -> Option<PathBuf> {
        self.inodes.read().path(ino).map(Path::to_path_buf)
    }

    fn child_logical_path(&self, parent: u64, name: &OsStr) -> Option<String> {
        let parent_path = self.logical_path(parent)?;
        let mut s = parent_path.to_string_lossy().into_owned();
        if !s.ends_with('/') {
            s.push('/');
        }
        s.push_str(&name.to_string_lossy());
        Some(s)
    }

    fn intern(&self, path: &str) -> u64 {
        self.inodes.write().intern(Path::new(path))
    }

    fn physical(&self, branch_i: usize, logical: &str) -> Option<String> {
        let root = self.branches.get(branch_i)?.root().to_string_lossy().into_owned();
        build_path([root.as_str(), logical]).ok()
    }

    fn attr_for(&self, ino: u64, logical: &str) -> Result<FileAttr, c_int> {
        let branch_i = find_rorw_branch(&self.branches, logical).map_err(to_errno)?;
        let phys = self.physical(branch_i, logical).ok_or(libc::ENAMETOOLONG)?;
        let meta = fs::symlink_metadata(&phys).map_err(io_to_errno)?;
        Ok(to_file_attr(ino, &meta))
    }

    fn log(&self, event: EventType, path: &str, result: &Result<(), UfsError>) {
        if !self.debug.is_enabled() {
            return;
        }
        let mut entry = LogEntry::new(event).with_path(path);
        if let Err(e) = result {
            entry = entry.with_error(e);
        } else {
            entry.ok = Some(true);
        }
        self.debug.log(entry);
    }
}

/// Build the `fuser::MountOption` list for `config`: read-write, a fixed
/// filesystem name, and `default_permissions` unless `relaxed_permissions`
/// was accepted (mirrors the original implementation always passing
/// `-odefault_permissions` except in the relaxed/non-root case).
#[must_use]
pub fn mount_options_for(config: &Config) -> Vec<fuser::MountOption> {
    let mut options = vec![
        fuser::MountOption::RW,
        fuser::MountOption::FSName("ulakefs".to_string()),
    ];
    if config.wants_default_permissions() {
        options.push(fuser::MountOption::DefaultPermissions);
    }
    options
}

fn to_errno(e: UfsError) -> c_int {
    e.errno()
}

fn io_to_errno(e: io::Error) -> c_int {
    e.raw_os_error().unwrap_or(libc::EIO)
}

fn to_file_type(meta: &fs::Metadata) -> FileType {
    let ft = meta.file_type();
    if ft.is_dir() {
        FileType::Directory
    } else if ft.is_symlink() {
        FileType::Symlink
    } else {
        FileType::RegularFile
    }
}

fn to_file_attr(ino: u64, meta: &fs::Metadata) -> FileAttr {
    let kind = to_file_type(meta);
    FileAttr {
        ino,
        size: meta.len(),
        blocks: meta.blocks(),
        atime: UNIX_EPOCH + Duration::from_secs(meta.atime().max(0) as u64),
        mtime: UNIX_EPOCH + Duration::from_secs(meta.mtime().max(0) as u64),
        ctime: UNIX_EPOCH + Duration::from_secs(meta.ctime().max(0) as u64),
        crtime: SystemTime::now(),
        kind,
        perm: (meta.mode() & 0o7777) as u16,
        nlink: meta.nlink() as u32,
        uid: meta.uid(),
        gid: meta.gid(),
        rdev: meta.rdev() as u32,
        blksize: meta.blksize() as u32,
        flags: 0,
    }
}

fn entry_kind_to_file_type(kind: EntryKind) -> FileType {
    match kind {
        EntryKind::Dir => FileType::Directory,
        EntryKind::Symlink => FileType::Symlink,
        EntryKind::File | EntryKind::Other => FileType::RegularFile,
    }
}

impl Filesystem for Overlay {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(logical) = self.child_logical_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };

        match find_rorw_branch(&self.branches, &logical) {
            Ok(branch_i) => {
                let Some(phys) = self.physical(branch_i, &logical) else {
                    reply.error(libc::ENAMETOOLONG);
                    return;
                };
                match fs::symlink_metadata(&phys) {
                    Ok(meta) => {
                        let ino = self.intern(&logical);
                        reply.entry(&TTL, &to_file_attr(ino, &meta), GENERATION);
                    }
                    Err(e) => reply.error(io_to_errno(e)),
                }
            }
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(logical) = self.logical_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.attr_for(ino, &logical.to_string_lossy()) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let Some(logical) = self.logical_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let logical = logical.to_string_lossy().into_owned();
        match find_rorw_branch(&self.branches, &logical) {
            Ok(branch_i) => {
                let Some(phys) = self.physical(branch_i, &logical) else {
                    reply.error(libc::ENAMETOOLONG);
                    return;
                };
                match fs::read_link(&phys) {
                    Ok(target) => reply.data(target.as_os_str().as_bytes()),
                    Err(e) => reply.error(io_to_errno(e)),
                }
            }
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(logical) = self.logical_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let logical = logical.to_string_lossy().into_owned();

        let mut entries: Vec<(String, EntryKind)> = vec![
            (".".to_string(), EntryKind::Dir),
            ("..".to_string(), EntryKind::Dir),
        ];

        let result = readdir::merged_readdir(
            &self.branches,
            self.config.cow,
            self.hide_meta(),
            &logical,
            &mut |name: &str, kind: EntryKind| {
                entries.push((name.to_string(), kind));
                false
            },
        );

        if let Err(e) = result {
            reply.error(to_errno(e));
            return;
        }

        for (i, (name, kind)) in entries.into_iter().enumerate().skip(offset as usize) {
            let child_path = if name == "." {
                logical.clone()
            } else if name == ".." {
                parent_of(&logical)
            } else {
                join_logical(&logical, &name)
            };
            let child_ino = self.intern(&child_path);
            let full = reply.add(child_ino, (i + 1) as i64, entry_kind_to_file_type(kind), &name);
            if full {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        reply.ok();
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        let Some(logical) = self.child_logical_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };

        let Some(branch_i) = (0..self.branches.count()).find(|&i| self.branches.get(i).unwrap().is_rw()) else {
            reply.error(libc::EROFS);
            return;
        };
        let Some(phys) = self.physical(branch_i, &logical) else {
            reply.error(libc::ENAMETOOLONG);
            return;
        };

        let kind = nix::sys::stat::SFlag::from_bits_truncate(mode & libc::S_IFMT);
        let perm = nix::sys::stat::Mode::from_bits_truncate(mode & !libc::S_IFMT);
        match nix::sys::stat::mknod(Path::new(&phys), kind, perm, u64::from(rdev)) {
            Ok(()) => match fs::symlink_metadata(&phys) {
                Ok(meta) => {
                    let ino = self.intern(&logical);
                    reply.entry(&TTL, &to_file_attr(ino, &meta), GENERATION);
                }
                Err(e) => reply.error(io_to_errno(e)),
            },
            Err(e) => reply.error(io_to_errno(std::io::Error::from(e))),
        }
    }

    fn mkdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, mode: u32, _umask: u32, reply: ReplyEntry) {
        let Some(logical) = self.child_logical_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };

        // Top-level creates always land in the highest-priority RW branch;
        // there is no RO source to promote for a brand new directory.
        let Some(branch_i) = (0..self.branches.count()).find(|&i| self.branches.get(i).unwrap().is_rw()) else {
            reply.error(libc::EROFS);
            return;
        };
        let Some(phys) = self.physical(branch_i, &logical) else {
            reply.error(libc::ENAMETOOLONG);
            return;
        };

        match fs::create_dir(&phys) {
            Ok(()) => {
                let _ = fs::set_permissions(&phys, fs::Permissions::from_mode(mode));
                match fs::symlink_metadata(&phys) {
                    Ok(meta) => {
                        let ino = self.intern(&logical);
                        reply.entry(&TTL, &to_file_attr(ino, &meta), GENERATION);
                    }
                    Err(e) => reply.error(io_to_errno(e)),
                }
            }
            Err(e) => reply.error(io_to_errno(e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(logical) = self.child_logical_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };

        let Some(branch_i) = (0..self.branches.count()).find(|&i| self.branches.get(i).unwrap().is_rw()) else {
            reply.error(libc::EROFS);
            return;
        };
        let Some(phys) = self.physical(branch_i, &logical) else {
            reply.error(libc::ENAMETOOLONG);
            return;
        };

        match fs::OpenOptions::new().write(true).create(true).truncate(true).open(&phys) {
            Ok(_file) => {
                let _ = fs::set_permissions(&phys, fs::Permissions::from_mode(mode));
                match fs::symlink_metadata(&phys) {
                    Ok(meta) => {
                        let ino = self.intern(&logical);
                        reply.created(&TTL, &to_file_attr(ino, &meta), GENERATION, 0, 0);
                    }
                    Err(e) => reply.error(io_to_errno(e)),
                }
            }
            Err(e) => reply.error(io_to_errno(e)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let Some(logical) = self.logical_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let logical_str = logical.to_string_lossy().into_owned();

        let wants_write = flags & (libc::O_WRONLY | libc::O_RDWR) != 0;

        let branch_i = match find_rorw_branch(&self.branches, &logical_str) {
            Ok(i) => i,
            Err(e) => {
                reply.error(to_errno(e));
                return;
            }
        };

        if wants_write && self.config.cow && !self.branches.get(branch_i).unwrap().is_rw() {
            let result = cow::promote(&self.branches, &logical_str, branch_i);
            self.log(EventType::CowPromote, &logical_str, &result.as_ref().map(|_| ()).map_err(Clone::clone));
            if let Err(e) = result {
                reply.error(to_errno(e));
                return;
            }
        }

        reply.opened(0, 0);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(logical) = self.logical_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let logical = logical.to_string_lossy().into_owned();

        let branch_i = match find_rorw_branch(&self.branches, &logical) {
            Ok(i) => i,
            Err(e) => {
                reply.error(to_errno(e));
                return;
            }
        };
        let Some(phys) = self.physical(branch_i, &logical) else {
            reply.error(libc::ENAMETOOLONG);
            return;
        };

        use std::io::{Read, Seek, SeekFrom};
        match fs::File::open(&phys) {
            Ok(mut f) => {
                if f.seek(SeekFrom::Start(offset.max(0) as u64)).is_err() {
                    reply.error(libc::EIO);
                    return;
                }
                let mut buf = vec![0_u8; size as usize];
                match f.read(&mut buf) {
                    Ok(n) => reply.data(&buf[..n]),
                    Err(e) => reply.error(io_to_errno(e)),
                }
            }
            Err(e) => reply.error(io_to_errno(e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(logical) = self.logical_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let logical = logical.to_string_lossy().into_owned();

        let branch_i = match find_rorw_branch(&self.branches, &logical) {
            Ok(i) => i,
            Err(e) => {
                reply.error(to_errno(e));
                return;
            }
        };

        let write_branch = if self.branches.get(branch_i).unwrap().is_rw() {
            branch_i
        } else if self.config.cow {
            match cow::promote(&self.branches, &logical, branch_i) {
                Ok(_) => match find_rorw_branch(&self.branches, &logical) {
                    Ok(i) => i,
                    Err(e) => {
                        reply.error(to_errno(e));
                        return;
                    }
                },
                Err(e) => {
                    reply.error(to_errno(e));
                    return;
                }
            }
        } else {
            reply.error(libc::EROFS);
            return;
        };

        let Some(phys) = self.physical(write_branch, &logical) else {
            reply.error(libc::ENAMETOOLONG);
            return;
        };

        use std::io::{Seek, SeekFrom, Write as _};
        match fs::OpenOptions::new().write(true).open(&phys) {
            Ok(mut f) => {
                if f.seek(SeekFrom::Start(offset.max(0) as u64)).is_err() {
                    reply.error(libc::EIO);
                    return;
                }
                match f.write(data) {
                    Ok(n) => reply.written(n as u32),
                    Err(e) => reply.error(io_to_errno(e)),
                }
            }
            Err(e) => reply.error(io_to_errno(e)),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn fsync(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        let Some(logical) = self.logical_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let logical = logical.to_string_lossy().into_owned();
        match find_rorw_branch(&self.branches, &logical).and_then(|i| {
            self.physical(i, &logical).ok_or(UfsError::PathTooLong { path: logical.clone().into() })
        }) {
            Ok(phys) => match fs::File::open(&phys).and_then(|f| f.sync_all()) {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(io_to_errno(e)),
            },
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(logical) = self.child_logical_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        let result = remove::unlink(&self.branches, self.config.cow, &logical);
        self.log(EventType::Unlink, &logical, &result);
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(logical) = self.child_logical_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        let result = remove::rmdir(&self.branches, self.config.cow, &logical);
        self.log(EventType::Rmdir, &logical, &result);
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        let Some(logical) = self.child_logical_path(parent, link_name) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(branch_i) = (0..self.branches.count()).find(|&i| self.branches.get(i).unwrap().is_rw()) else {
            reply.error(libc::EROFS);
            return;
        };
        let Some(phys) = self.physical(branch_i, &logical) else {
            reply.error(libc::ENAMETOOLONG);
            return;
        };

        match std::os::unix::fs::symlink(target, &phys) {
            Ok(()) => match fs::symlink_metadata(&phys) {
                Ok(meta) => {
                    let ino = self.intern(&logical);
                    reply.entry(&TTL, &to_file_attr(ino, &meta), GENERATION);
                }
                Err(e) => reply.error(io_to_errno(e)),
            },
            Err(e) => reply.error(io_to_errno(e)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let (Some(src), Some(dst)) = (
            self.child_logical_path(parent, name),
            self.child_logical_path(newparent, newname),
        ) else {
            reply.error(libc::ENOENT);
            return;
        };

        let branch_i = match find_rorw_branch(&self.branches, &src) {
            Ok(i) => i,
            Err(e) => {
                reply.error(to_errno(e));
                return;
            }
        };
        if !self.branches.get(branch_i).unwrap().is_rw() {
            reply.error(libc::EROFS);
            return;
        }
        let (Some(src_phys), Some(dst_phys)) = (self.physical(branch_i, &src), self.physical(branch_i, &dst)) else {
            reply.error(libc::ENAMETOOLONG);
            return;
        };

        match fs::rename(&src_phys, &dst_phys) {
            Ok(()) => {
                self.inodes.write().rebind(Path::new(&src), Path::new(&dst));
                reply.ok();
            }
            Err(e) => reply.error(io_to_errno(e)),
        }
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let (Some(src), Some(dst)) = (self.logical_path(ino), self.child_logical_path(newparent, newname)) else {
            reply.error(libc::ENOENT);
            return;
        };
        let src = src.to_string_lossy().into_owned();

        let branch_i = match find_rorw_branch(&self.branches, &src) {
            Ok(i) => i,
            Err(e) => {
                reply.error(to_errno(e));
                return;
            }
        };
        if !self.branches.get(branch_i).unwrap().is_rw() {
            reply.error(libc::EROFS);
            return;
        }
        let (Some(src_phys), Some(dst_phys)) = (self.physical(branch_i, &src), self.physical(branch_i, &dst)) else {
            reply.error(libc::ENAMETOOLONG);
            return;
        };

        match fs::hard_link(&src_phys, &dst_phys) {
            Ok(()) => match fs::symlink_metadata(&dst_phys) {
                Ok(meta) => {
                    let dst_ino = self.intern(&dst);
                    reply.entry(&TTL, &to_file_attr(dst_ino, &meta), GENERATION);
                }
                Err(e) => reply.error(io_to_errno(e)),
            },
            Err(e) => reply.error(io_to_errno(e)),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(logical) = self.logical_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let logical = logical.to_string_lossy().into_owned();

        let branch_i = match find_rorw_branch(&self.branches, &logical) {
            Ok(i) => i,
            Err(e) => {
                reply.error(to_errno(e));
                return;
            }
        };

        let write_branch = if self.branches.get(branch_i).unwrap().is_rw() {
            branch_i
        } else if self.config.cow {
            match cow::promote(&self.branches, &logical, branch_i) {
                Ok(_) => find_lowest_rw_branch(&self.branches, branch_i).unwrap_or(branch_i),
                Err(e) => {
                    reply.error(to_errno(e));
                    return;
                }
            }
        } else {
            reply.error(libc::EROFS);
            return;
        };

        let Some(phys) = self.physical(write_branch, &logical) else {
            reply.error(libc::ENAMETOOLONG);
            return;
        };

        if let Some(m) = mode {
            let _ = fs::set_permissions(&phys, fs::Permissions::from_mode(m));
        }
        if uid.is_some() || gid.is_some() {
            let u = uid.map(nix::unistd::Uid::from_raw);
            let g = gid.map(nix::unistd::Gid::from_raw);
            let _ = nix::unistd::chown(Path::new(&phys), u, g);
        }
        if let Some(s) = size {
            if let Err(e) = fs::OpenOptions::new().write(true).open(&phys).and_then(|f| f.set_len(s)) {
                reply.error(io_to_errno(e));
                return;
            }
        }

        match self.attr_for(ino, &logical) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let mut blocks: u64 = 0;
        let mut bfree: u64 = 0;
        let mut bavail: u64 = 0;
        let mut files: u64 = 0;
        let mut ffree: u64 = 0;
        let mut bsize: u32 = 4096;
        let mut namelen: u32 = 255;
        let mut any = false;

        for branch in self.branches.iter() {
            if self.config.statfs_omit_ro && !branch.is_rw() {
                continue;
            }
            let Ok(stat) = nix::sys::statvfs::statvfs(branch.root()) else {
                continue;
            };
            any = true;
            blocks += stat.blocks();
            bfree += stat.blocks_free();
            bavail += stat.blocks_available();
            files += stat.files();
            ffree += stat.files_free();
            bsize = stat.block_size() as u32;
            namelen = stat.name_max() as u32;
        }

        if !any {
            reply.error(libc::EIO);
            return;
        }

        reply.statfs(blocks, bfree, bavail, files, ffree, bsize, namelen, bsize);
    }
}

fn parent_of(logical: &str) -> String {
    match logical.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((head, _)) => head.to_string(),
    }
}

fn join_logical(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_logical_handles_root_parent() {
        assert_eq!(join_logical("/", "foo"), "/foo");
    }

    #[test]
    fn join_logical_handles_nested_parent() {
        assert_eq!(join_logical("/a", "b"), "/a/b");
    }

    #[test]
    fn parent_of_root_child_is_root() {
        assert_eq!(parent_of("/foo"), "/");
    }

    #[test]
    fn parent_of_nested_path_strips_last_segment() {
        assert_eq!(parent_of("/a/b/c"), "/a/b");
    }
}
