//! The Path Resolver: parses an absolute path and walks directory entries to yield either the
//! target inode number or the parent-plus-final-name pair needed by a create operation.

use crate::dirstore;
use crate::error::{Error, Result};
use crate::layout::{ROOT_INODE, MAX_NAME_LEN};
use crate::volume::Volume;

/// Splits `path` on `/`, dropping empty components (so `/a//b/` yields `["a", "b"]`).
fn components(path: &str) -> Vec<&str> {
	path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Resolves an absolute path to the 1-based inode number it names.
///
/// Fails with [`Error::InvalidPath`] if `path` does not start with `/`, [`Error::NotFound`] if
/// some component does not exist, and [`Error::NotADirectory`] if a non-final component (or the
/// final component, when the path ends in `/`) is not itself a directory.
pub fn resolve(vol: &Volume, path: &str) -> Result<u32> {
	if !path.starts_with('/') {
		return Err(Error::InvalidPath);
	}

	let parts = components(path);
	let mut current = ROOT_INODE;

	for (i, part) in parts.iter().enumerate() {
		let is_last = i == parts.len() - 1;
		if !vol.inode(current).is_dir() {
			return Err(Error::NotADirectory);
		}
		let entry = dirstore::find_entry(vol, current, part)?;
		current = entry.inode;
		let _ = is_last;
	}

	if path.ends_with('/') && path != "/" && !vol.inode(current).is_dir() {
		return Err(Error::NotADirectory);
	}

	Ok(current)
}

/// Resolves the parent directory of `path` and returns `(parent_inode, final_component)`,
/// validating that the final component is non-empty and at most 255 bytes. Callers that must
/// reject a trailing `/` on the target (links do; `mkdir`/`cp` don't) check that themselves
/// before calling this.
pub fn resolve_parent<'a>(vol: &Volume, path: &'a str) -> Result<(u32, &'a str)> {
	if !path.starts_with('/') {
		return Err(Error::InvalidPath);
	}

	let name = basename(path);
	if name.is_empty() {
		return Err(Error::InvalidPath);
	}
	if name.len() > MAX_NAME_LEN {
		return Err(Error::NameTooLong);
	}

	let parent_path = parent_of(path);
	let parent = resolve(vol, &parent_path)?;
	if !vol.inode(parent).is_dir() {
		return Err(Error::NotADirectory);
	}

	Ok((parent, name))
}

/// Returns `path` with its last non-empty component removed, preserving a single trailing `/`
/// on the parent (e.g. `/a/bb/ccc` -> `/a/bb/`, `/a` -> `/`).
pub fn parent_of(path: &str) -> String {
	let trimmed = path.strip_suffix('/').unwrap_or(path);
	match trimmed.rfind('/') {
		Some(0) => "/".to_string(),
		Some(i) => format!("{}/", &trimmed[..i]),
		None => "/".to_string(),
	}
}

/// Returns the final non-empty component of `path`; `""` for `/`.
pub fn basename(path: &str) -> &str {
	let trimmed = path.strip_suffix('/').unwrap_or(path);
	match trimmed.rfind('/') {
		Some(i) => &trimmed[i + 1..],
		None => trimmed,
	}
}
