#![forbid(unsafe_code)]

//! ulakefs — a union/overlay filesystem.
//!
//! Merges an ordered stack of RO/RW directory branches into one FUSE-mounted
//! namespace. Higher-priority branches shadow same-named entries in lower
//! ones; optional copy-on-write promotes RO content into the lowest RW branch
//! on first mutation, and whiteout markers record deletions of entries that
//! still physically exist in a branch below.

pub mod cli;
pub mod core;
pub mod fs;
pub mod logger;
