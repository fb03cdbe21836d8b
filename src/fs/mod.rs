//! The upper-edge FUSE bridge: inode bookkeeping plus the `fuser::Filesystem`
//! dispatch table that wires kernel requests into `core`.

pub mod adapter;
pub mod inode;
