//! Core union/overlay semantics: branch table, path resolution, merged
//! readdir, copy-on-write, and directory removal.

pub mod branch;
pub mod config;
pub mod cow;
pub mod errors;
pub mod paths;
pub mod pathbuilder;
pub mod readdir;
pub mod remove;
pub mod resolver;
pub mod whiteout;
