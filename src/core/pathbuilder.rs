//! Physical path construction.
//!
//! Every physical path handed to a branch-local syscall is assembled through
//! [`build_path`] rather than ad-hoc `format!`/`PathBuf::join` calls, so the
//! slash-normalization rules stay in exactly one place.

use std::io;

use crate::core::errors::{Result, UfsError};

/// Hard ceiling on an assembled physical path, matching the original
/// implementation's fixed-size path buffer.
pub const MAX_PATH_LEN: usize = 4096;

/// Concatenate path segments into a single physical path, inserting or
/// collapsing `/` separators so the result always has exactly one slash
/// between segments and never a trailing slash unless the caller's last
/// segment explicitly ended in one.
///
/// Mirrors the original `build_path()`: each segment may itself begin and/or
/// end with `/`; adjacent segments never produce a doubled or missing slash.
/// Empty segments are skipped entirely.
///
/// # Errors
/// Returns [`UfsError::PathTooLong`] if the assembled path would exceed
/// [`MAX_PATH_LEN`]. Returns [`UfsError::Underlying`] with `EIO` if no
/// non-empty segment was supplied, per spec.md §4.B — this is a runtime
/// path-builder failure reachable from every FUSE op, not a CLI/init-time
/// [`UfsError::BadConfig`].
pub fn build_path<I, S>(segments: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    let mut any = false;

    for segment in segments {
        let segment = segment.as_ref();
        if segment.is_empty() {
            continue;
        }
        any = true;

        let seg_trimmed = segment.trim_start_matches('/');
        if !out.is_empty() && !out.ends_with('/') && !seg_trimmed.is_empty() {
            out.push('/');
        } else if out.is_empty() && segment.starts_with('/') {
            out.push('/');
        }
        out.push_str(seg_trimmed);

        if out.len() > MAX_PATH_LEN {
            return Err(UfsError::PathTooLong { path: out.into() });
        }
    }

    if !any {
        return Err(UfsError::io(
            String::new(),
            io::Error::from_raw_os_error(libc::EIO),
        ));
    }

    if out.len() > MAX_PATH_LEN {
        return Err(UfsError::PathTooLong { path: out.into() });
    }

    Ok(out)
}
