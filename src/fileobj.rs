//! The File Object Manager: the composite operations a command driver calls directly, built on
//! top of the Bitmap Allocator, Directory Store and Path Resolver. Directory *creation* is not
//! one of these — `mkdir` assembles it itself from [`alloc::alloc_inode`] and [`dirstore::add_entry`]
//! the same way the other drivers do, since there is no shared "create a directory" primitive to
//! generalize (the on-disk source this crate was grounded on does the same: `init_inode` and
//! `add_new_entry` are called directly by its `mkdir`, not through a directory-specific wrapper).

use crate::alloc;
use crate::dirstore::{self, Entry};
use crate::error::{Error, Result};
use crate::layout::{
	DIRECT_POINTERS, FILE_TYPE_DIRECTORY, FILE_TYPE_REGULAR, FILE_TYPE_SYMLINK, INDIRECT_INDEX,
	MODE_REGULAR, MODE_SYMLINK,
};
use crate::path;
use crate::volume::Volume;

use utils::util::{ceil_division, get_timestamp};

/// Returns the number of blocks [`write_body`] needs to hold `len` bytes, including the single
/// indirect block itself once the direct pointers (12 blocks) are exhausted.
fn required_blocks(len: usize) -> u32 {
	let data_blocks = ceil_division(len as u32, crate::layout::BLOCK_SIZE);
	if data_blocks > DIRECT_POINTERS as u32 {
		data_blocks + 1
	} else {
		data_blocks
	}
}

/// Allocates a fresh inode of the given `mode`, initialized the way a newly created file,
/// directory, or symlink starts out: zero size, zero blocks, no deletion time, and a link count
/// of 1 for files/symlinks or 0 for directories (a directory's own `.`/`..` insertions, and its
/// entry in its parent, bring that to 2 — see [`dirstore::add_entry`]'s link-count rule).
pub fn init_inode(vol: &mut Volume, mode: u16) -> Result<u32> {
	let ino = alloc::alloc_inode(vol)?;
	let now = get_timestamp().as_secs() as u32;

	let inode = vol.inode_mut(ino);
	inode.mode = mode;
	inode.uid = 0;
	inode.gid = 0;
	inode.size = 0;
	inode.atime = now;
	inode.ctime = now;
	inode.mtime = now;
	inode.dtime = 0;
	inode.links_count = if mode & crate::layout::MODE_DIRECTORY != 0 { 0 } else { 1 };
	inode.blocks = 0;
	inode.flags = 0;
	inode.block = [0; 15];
	inode.generation = 0;
	inode.file_acl = 0;
	inode.dir_acl = 0;
	inode.faddr = 0;

	Ok(ino)
}

/// Writes `data` into `inode_num`'s data blocks, allocating direct blocks first and then, once
/// the twelve direct slots are exhausted, the single indirect block and its pointed-to blocks.
/// The caller is responsible for having already verified enough free blocks exist and for setting
/// `i_size`; this only allocates and copies bytes. The tail of the final block, beyond the bytes
/// actually copied, is left at whatever the freshly allocated block already contained.
pub fn write_body(vol: &mut Volume, inode_num: u32, data: &[u8]) -> Result<()> {
	let mut indirect_block_num = 0u32;
	let mut k = 0usize;
	while (k as u32) * crate::layout::BLOCK_SIZE < data.len() as u32 {
		let b = if k < DIRECT_POINTERS {
			let b = alloc::alloc_block(vol)?;
			vol.inode_mut(inode_num).block[k] = b;
			b
		} else {
			if k == DIRECT_POINTERS {
				indirect_block_num = alloc::alloc_block(vol)?;
				vol.inode_mut(inode_num).block[INDIRECT_INDEX] = indirect_block_num;
				vol.inode_mut(inode_num).blocks += 2;
			}
			let b = alloc::alloc_block(vol)?;
			vol.indirect_block_mut(indirect_block_num)[k - DIRECT_POINTERS] = b;
			b
		};

		let start = k * crate::layout::BLOCK_SIZE as usize;
		let end = (start + crate::layout::BLOCK_SIZE as usize).min(data.len());
		vol.block_mut(b)[..end - start].copy_from_slice(&data[start..end]);
		vol.inode_mut(inode_num).blocks += 2;

		k += 1;
	}
	Ok(())
}

/// Reads back the first `inode.size` bytes of `inode_num`'s body, across direct and indirect
/// blocks. Used to dereference a symlink's target path.
pub fn read_body(vol: &Volume, inode_num: u32) -> Vec<u8> {
	let size = vol.inode(inode_num).size as usize;
	let mut buf = Vec::with_capacity(size);
	let mut remaining = size;

	for k in 0..DIRECT_POINTERS {
		if remaining == 0 {
			break;
		}
		let b = vol.inode(inode_num).block[k];
		if b == 0 {
			break;
		}
		let take = remaining.min(crate::layout::BLOCK_SIZE as usize);
		buf.extend_from_slice(&vol.block(b)[..take]);
		remaining -= take;
	}

	if remaining > 0 {
		let indirect = vol.inode(inode_num).block[INDIRECT_INDEX];
		if indirect != 0 {
			for &b in vol.indirect_block(indirect) {
				if remaining == 0 {
					break;
				}
				if b == 0 {
					break;
				}
				let take = remaining.min(crate::layout::BLOCK_SIZE as usize);
				buf.extend_from_slice(&vol.block(b)[..take]);
				remaining -= take;
			}
		}
	}

	buf
}

/// Copies `data` into a new regular file at `dest_path` (the `cp` driver's core operation).
/// Fails with `AlreadyExists` if `dest_path` is already taken, and `NoSpace` if the volume
/// lacks the one free inode or the `ceil(len / block_size)` (plus one, past twelve blocks) free
/// blocks the copy requires.
pub fn copy_in(vol: &mut Volume, dest_path: &str, data: &[u8]) -> Result<u32> {
	let (dir_ino, name) = path::resolve_parent(vol, dest_path)?;

	if dirstore::find_entry(vol, dir_ino, name).is_ok() {
		return Err(Error::AlreadyExists);
	}

	let need_blocks = required_blocks(data.len());
	if alloc::free_inodes_available(vol) < 1 {
		return Err(Error::NoSpace);
	}
	if alloc::free_blocks_available(vol) < need_blocks {
		return Err(Error::NoSpace);
	}

	let ino = init_inode(vol, MODE_REGULAR)?;
	vol.inode_mut(ino).size = data.len() as u32;
	write_body(vol, ino, data)?;
	dirstore::add_entry(vol, dir_ino, ino, name, FILE_TYPE_REGULAR)?;
	Ok(ino)
}

/// Checks whether `dst_path` already names something, returning the usual `ln` errors if so:
/// `IsADirectory` when the existing entry is a directory, `AlreadyExists` otherwise. Returns
/// `Ok(())` when `dst_path` is free to create.
fn check_link_destination_free(vol: &Volume, dst_path: &str) -> Result<()> {
	match path::resolve(vol, dst_path) {
		Ok(existing) => {
			if vol.inode(existing).is_dir() {
				Err(Error::IsADirectory)
			} else {
				Err(Error::AlreadyExists)
			}
		}
		Err(Error::NotFound) => Ok(()),
		Err(e) => Err(e),
	}
}

/// Creates a hard link at `dst_path` pointing at the inode named by `src_path` (the `ln` driver's
/// default mode). `src_path` must name an existing, non-directory file. If it names a symlink,
/// the symlink is dereferenced once — its stored body is read as a path and re-resolved — and the
/// link is made to the file that path names instead, exactly as a hard link to a symlink would be
/// in practice.
pub fn link_hard(vol: &mut Volume, src_path: &str, dst_path: &str) -> Result<()> {
	if dst_path.ends_with('/') {
		return Err(Error::InvalidPath);
	}

	let src_ino = path::resolve(vol, src_path)?;
	if vol.inode(src_ino).is_dir() {
		return Err(Error::IsADirectory);
	}

	check_link_destination_free(vol, dst_path)?;
	let (dir_ino, name) = path::resolve_parent(vol, dst_path)?;

	let target_ino = if vol.inode(src_ino).is_symlink() {
		let body = read_body(vol, src_ino);
		let target_path = String::from_utf8_lossy(&body).into_owned();
		path::resolve(vol, &target_path).map_err(|_| Error::NotFound)?
	} else {
		src_ino
	};

	vol.inode_mut(target_ino).links_count += 1;
	dirstore::add_entry(vol, dir_ino, target_ino, name, FILE_TYPE_REGULAR)?;
	Ok(())
}

/// Creates a symlink at `dst_path` whose body is the literal bytes of `target_path` (the `ln -s`
/// driver's mode). Unlike [`link_hard`], `target_path` is never resolved or required to exist.
pub fn link_symlink(vol: &mut Volume, target_path: &str, dst_path: &str) -> Result<()> {
	if dst_path.ends_with('/') {
		return Err(Error::InvalidPath);
	}

	check_link_destination_free(vol, dst_path)?;
	let (dir_ino, name) = path::resolve_parent(vol, dst_path)?;

	let data = target_path.as_bytes();
	let need_blocks = required_blocks(data.len());
	if alloc::free_inodes_available(vol) < 1 || alloc::free_blocks_available(vol) < need_blocks {
		return Err(Error::NoSpace);
	}

	let ino = init_inode(vol, MODE_SYMLINK)?;
	vol.inode_mut(ino).size = data.len() as u32;
	write_body(vol, ino, data)?;
	dirstore::add_entry(vol, dir_ino, ino, name, FILE_TYPE_SYMLINK)?;
	Ok(())
}

/// Releases every data block (and the indirect block, if present) owned by `inode_num`, clearing
/// each from the bitmap and bumping the free-block counters one block at a time. This is the
/// per-block accounting `remove_dir`'s single-increment bug (Open Question 4) is deliberately not
/// reproduced from.
fn free_all_blocks(vol: &mut Volume, inode_num: u32) {
	for k in 0..DIRECT_POINTERS {
		let b = vol.inode(inode_num).block[k];
		if b != 0 {
			alloc::free_block(vol, b);
			vol.inode_mut(inode_num).block[k] = 0;
		}
	}
	let indirect = vol.inode(inode_num).block[INDIRECT_INDEX];
	if indirect != 0 {
		for j in 0..crate::layout::POINTERS_PER_INDIRECT_BLOCK {
			let b = vol.indirect_block(indirect)[j];
			if b != 0 {
				alloc::free_block(vol, b);
				vol.indirect_block_mut(indirect)[j] = 0;
			}
		}
		alloc::free_block(vol, indirect);
		vol.inode_mut(inode_num).block[INDIRECT_INDEX] = 0;
	}
	vol.inode_mut(inode_num).blocks = 0;
}

/// Removes the file or symlink named by `path` (the `rm` driver's core operation, and the leaf
/// case `remove_recursive` dispatches to). If the inode's link count is above 1, only this name is
/// unlinked and the body survives under its remaining names; otherwise the body's blocks and the
/// inode itself are released and `dtime`/`size` are reset.
pub fn remove(vol: &mut Volume, path: &str) -> Result<()> {
	let ino = path::resolve(vol, path)?;
	if vol.inode(ino).is_dir() {
		return Err(Error::IsADirectory);
	}

	let (dir_ino, name) = path::resolve_parent(vol, path)?;

	if vol.inode(ino).links_count > 1 {
		vol.inode_mut(ino).links_count -= 1;
		dirstore::unlink_entry(vol, dir_ino, name)?;
	} else {
		free_all_blocks(vol, ino);
		alloc::free_inode(vol, ino);
		dirstore::unlink_entry(vol, dir_ino, name)?;
		let inode = vol.inode_mut(ino);
		inode.dtime = get_timestamp().as_secs() as u32;
		inode.size = 0;
	}
	Ok(())
}

/// Recursively removes the directory named by `path` (the `rm -r` driver's core operation),
/// refusing to remove the root. Every live entry other than `.`/`..` is removed first, files and
/// symlinks directly and sub-directories by recursing; `.` and `..` are then tombstoned in the
/// directory's own blocks, its data blocks are released, its inode is freed, the parent's link
/// count is decremented, and the group descriptor's directory count is decremented.
pub fn remove_recursive(vol: &mut Volume, path: &str) -> Result<()> {
	if path == "/" {
		return Err(Error::InvalidPath);
	}

	let ino = path::resolve(vol, path)?;
	if !vol.inode(ino).is_dir() {
		return remove(vol, path);
	}

	let children: Vec<Entry> =
		dirstore::list_entries(vol, ino).into_iter().filter(|e| e.name != "." && e.name != "..").collect();

	for child in children {
		let child_path = join_path(path, &child.name);
		if child.file_type == FILE_TYPE_DIRECTORY {
			remove_recursive(vol, &child_path)?;
		} else {
			remove(vol, &child_path)?;
		}
	}

	dirstore::unlink_entry(vol, ino, ".").ok();
	dirstore::unlink_entry(vol, ino, "..").ok();

	free_all_blocks(vol, ino);
	alloc::free_inode(vol, ino);

	let (parent_ino, name) = path::resolve_parent(vol, path)?;
	vol.inode_mut(parent_ino).links_count -= 1;
	dirstore::unlink_entry(vol, parent_ino, name)?;
	vol.group_desc_mut().used_dirs_count -= 1;

	let inode = vol.inode_mut(ino);
	inode.dtime = get_timestamp().as_secs() as u32;
	inode.size = 0;

	Ok(())
}

/// Joins a directory path and a bare child name into an absolute path, the way a recursive
/// removal walks back down into what `list_entries` already gave it by inode rather than by path.
fn join_path(dir: &str, name: &str) -> String {
	if dir.ends_with('/') {
		format!("{dir}{name}")
	} else {
		format!("{dir}/{name}")
	}
}

/// Resolves `path` and returns its live directory entries (the `ls` driver's core operation).
/// Fails with `NotADirectory` if `path` does not name a directory; filtering `.`/`..` for a
/// non-`-a` listing is left to the driver.
pub fn list(vol: &Volume, path: &str) -> Result<Vec<Entry>> {
	let ino = path::resolve(vol, path)?;
	if !vol.inode(ino).is_dir() {
		return Err(Error::NotADirectory);
	}
	Ok(dirstore::list_entries(vol, ino))
}
