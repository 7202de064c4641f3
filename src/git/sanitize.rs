//! Input sanitization for every value that flows into a git argument vector
//! (spec.md §4.2's security contract: no shell interpretation, but every
//! argument is still validated before it reaches `git`).

use crate::error::StorageErrorKind;
use crate::Error;

/// Validates a commit sha: 4-64 lowercase hex digits, covering abbreviated
/// shas down to git's shortest unambiguous form, full 40-hex SHA-1, and
/// full 64-hex SHA-256 (spec.md §4.2).
///
/// # Errors
///
/// Returns [`Error::Storage`] with [`StorageErrorKind::RefInvalid`] if `sha`
/// contains anything other than lowercase hex digits or is out of range.
pub fn commit_sha(sha: &str) -> Result<(), Error> {
    if sha.len() < 4
        || sha.len() > 64
        || !sha.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
    {
        return Err(Error::storage(
            StorageErrorKind::RefInvalid,
            format!("not a valid commit sha: {sha:?}"),
        ));
    }
    Ok(())
}

/// Validates a namespace ref segment: lowercase ascii letters only (the
/// closed set already enforces this, but this guards against a caller
/// passing a raw string straight from user input).
///
/// # Errors
///
/// Returns [`Error::Storage`] with [`StorageErrorKind::RefInvalid`].
pub fn ref_segment(segment: &str) -> Result<(), Error> {
    let valid = !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b == b'-' || b == b'_');
    if !valid {
        return Err(Error::storage(
            StorageErrorKind::RefInvalid,
            format!("invalid ref segment: {segment:?}"),
        ));
    }
    Ok(())
}

/// Validates a repository-relative file path: no `..` traversal, no leading
/// `/`, no embedded NUL.
///
/// # Errors
///
/// Returns [`Error::Storage`] with [`StorageErrorKind::RefInvalid`].
pub fn repo_path(path: &str) -> Result<(), Error> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\0')
        || path.split('/').any(|part| part == "..");
    if bad {
        return Err(Error::storage(
            StorageErrorKind::RefInvalid,
            format!("unsafe repository path: {path:?}"),
        ));
    }
    Ok(())
}
