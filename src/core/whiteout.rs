//! Whiteout markers and the meta directory that holds them.
//!
//! A whiteout is a zero-length file named `<entry>` + [`HIDETAG`] inside the
//! meta directory ([`METANAME`]) that mirrors the hidden entry's parent
//! directory. Its mere presence in a branch is enough to mask the same-named
//! entry in every branch below it.

use std::path::Path;

/// Suffix appended to an entry's name to form its whiteout-tag filename.
pub const HIDETAG: &str = "_HIDDEN~";

/// Name of the metadata directory mirrored into every branch root.
pub const METANAME: &str = ".ulakefs";

/// Prefix FUSE itself uses for short-lived rename-swap temp files; these are
/// never whiteout-worthy and are skipped by directory listings.
pub const FUSE_TMP_PREFIX: &str = ".fuse_hidden";

/// Build the whiteout-tag filename for a directory entry named `name`.
#[must_use]
pub fn whiteout_tag(name: &str) -> String {
    format!("{name}{HIDETAG}")
}

/// Return the original entry name if `tag_name` is a whiteout-tag filename,
/// i.e. it ends with exactly [`HIDETAG`] and has at least one character
/// before it.
#[must_use]
pub fn untag(tag_name: &str) -> Option<&str> {
    let stripped = tag_name.strip_suffix(HIDETAG)?;
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// True if `name` is itself a whiteout-tag filename.
#[must_use]
pub fn is_whiteout_tag(name: &str) -> bool {
    untag(name).is_some()
}

/// Path to the meta directory mirroring `branch_root`'s top level.
#[must_use]
pub fn meta_dir(branch_root: &Path) -> std::path::PathBuf {
    branch_root.join(METANAME)
}
