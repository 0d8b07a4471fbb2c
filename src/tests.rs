//! Integration tests exercising the five core components together against a fixture image built
//! by [`crate::fixture`], the way `mkdir`/`cp`/`ln`/`ls`/`rm` would in a real command invocation.

use crate::fixture;
use crate::layout::{
	DIRECT_POINTERS, FILE_TYPE_DIRECTORY, FILE_TYPE_REGULAR, MODE_DIRECTORY, ROOT_INODE, TOTAL_BLOCKS,
};
use crate::volume::Volume;
use crate::{alloc, dirstore, fileobj, path, Error};

/// Counts zero bits among the first `count` bits of `bitmap`.
fn count_zero_bits(bitmap: &[u8], count: u32) -> u32 {
	(0..count).filter(|&i| bitmap[(i / 8) as usize] & (1 << (i % 8)) == 0).count() as u32
}

/// Asserts the bitmap-vs-counter invariant for both blocks and inodes: the number of zero bits in
/// each bitmap equals the matching free counter in both the superblock and group descriptor.
fn assert_bitmap_counters_consistent(vol: &Volume) {
	let free_blocks = count_zero_bits(vol.block_bitmap(), TOTAL_BLOCKS - 1);
	let sb_free_blocks: u32 = vol.superblock().free_blocks_count;
	let gd_free_blocks: u32 = vol.group_desc().free_blocks_count as u32;
	assert_eq!(free_blocks, sb_free_blocks, "superblock free block count");
	assert_eq!(free_blocks, gd_free_blocks, "group desc free block count");

	let free_inodes = count_zero_bits(vol.inode_bitmap(), crate::layout::TOTAL_INODES);
	let sb_free_inodes: u32 = vol.superblock().free_inodes_count;
	let gd_free_inodes: u32 = vol.group_desc().free_inodes_count as u32;
	assert_eq!(free_inodes, sb_free_inodes, "superblock free inode count");
	assert_eq!(free_inodes, gd_free_inodes, "group desc free inode count");
}

/// Asserts `i_blocks` equals twice the number of non-zero pointers the inode owns, and that every
/// one of those pointers has its bit set in the block bitmap.
fn assert_inode_blocks_consistent(vol: &Volume, ino: u32) {
	let inode = vol.inode(ino);
	let mut n = 0u32;
	for k in 0..=crate::layout::INDIRECT_INDEX {
		let b = inode.block[k];
		if b != 0 {
			n += 1;
			let bit = b - 1;
			assert!(
				vol.block_bitmap()[(bit / 8) as usize] & (1 << (bit % 8)) != 0,
				"block {b} owned by inode {ino} should be marked used"
			);
			if k == crate::layout::INDIRECT_INDEX {
				for &p in vol.indirect_block(b) {
					if p != 0 {
						n += 1;
						let pbit = p - 1;
						assert!(vol.block_bitmap()[(pbit / 8) as usize] & (1 << (pbit % 8)) != 0);
					}
				}
			}
		}
	}
	assert_eq!(inode.blocks, 2 * n, "i_blocks for inode {ino}");
}

/// Asserts that every directory block's live + tombstoned records sum their `rec_len` to exactly
/// the block size.
fn assert_dir_blocks_packed(vol: &Volume, dir_ino: u32) {
	let inode = vol.inode(dir_ino);
	for k in 0..DIRECT_POINTERS {
		let b = inode.block[k];
		if b == 0 {
			continue;
		}
		let block = vol.block(b);
		let mut pos = 0usize;
		let mut total = 0u32;
		while pos < block.len() {
			let rec_len = u16::from_le_bytes(block[pos + 4..pos + 6].try_into().unwrap());
			assert!(rec_len > 0, "zero rec_len would loop forever");
			total += rec_len as u32;
			pos += rec_len as usize;
		}
		assert_eq!(total, crate::layout::BLOCK_SIZE, "rec_len sum in block {b} of dir {dir_ino}");
	}
}

#[test]
fn fresh_image_root_listing() {
	let img = fixture::build();
	let entries = fileobj::list(&img.vol, "/").unwrap();
	let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
	assert_eq!(names, vec![".", ".."]);
	assert_bitmap_counters_consistent(&img.vol);
}

#[test]
fn mkdir_nested_updates_link_counts_and_dir_count() {
	let mut img = fixture::build();

	let before_used_dirs = img.vol.group_desc().used_dirs_count;

	let a = make_dir(&mut img.vol, "/a");
	let _b = make_dir(&mut img.vol, "/a/b");

	assert_eq!(img.vol.group_desc().used_dirs_count, before_used_dirs + 2);
	assert_eq!(img.vol.inode(ROOT_INODE).links_count, 3);
	assert_eq!(img.vol.inode(a).links_count, 3);
	assert_bitmap_counters_consistent(&img.vol);
	assert_dir_blocks_packed(&img.vol, ROOT_INODE);
	assert_dir_blocks_packed(&img.vol, a);
}

#[test]
fn cp_three_direct_blocks_no_indirect() {
	let mut img = fixture::build();
	make_dir(&mut img.vol, "/a");

	let data = vec![b'x'; 3000];
	let ino = fileobj::copy_in(&mut img.vol, "/a/f", &data).unwrap();

	let inode = img.vol.inode(ino);
	assert_eq!(inode.size, 3000);
	assert_eq!(inode.blocks, 6);
	assert!(inode.block[0] != 0 && inode.block[1] != 0 && inode.block[2] != 0);
	assert_eq!(inode.block[3], 0);
	assert_eq!(inode.block[crate::layout::INDIRECT_INDEX], 0);
	assert_inode_blocks_consistent(&img.vol, ino);
	assert_bitmap_counters_consistent(&img.vol);
}

#[test]
fn cp_then_rm_restores_counters() {
	let mut img = fixture::build();
	make_dir(&mut img.vol, "/a");

	let free_blocks_before = img.vol.superblock().free_blocks_count;
	let free_inodes_before = img.vol.superblock().free_inodes_count;

	fileobj::copy_in(&mut img.vol, "/a/f", &vec![1u8; 5000]).unwrap();
	fileobj::remove(&mut img.vol, "/a/f").unwrap();

	assert_eq!(img.vol.superblock().free_blocks_count, free_blocks_before);
	assert_eq!(img.vol.superblock().free_inodes_count, free_inodes_before);
	assert_bitmap_counters_consistent(&img.vol);
}

#[test]
fn file_spanning_indirect_block() {
	let mut img = fixture::build();
	make_dir(&mut img.vol, "/a");

	// 13 blocks: exhausts the 12 direct pointers and allocates the indirect block.
	let data = vec![b'y'; 13 * 1024];
	let ino = fileobj::copy_in(&mut img.vol, "/a/big", &data).unwrap();

	let inode = img.vol.inode(ino);
	assert!(inode.block[crate::layout::INDIRECT_INDEX] != 0);
	for k in 0..DIRECT_POINTERS {
		assert!(inode.block[k] != 0);
	}
	// 12 direct + 1 indirect-body + 1 indirect-table, all 2 units each.
	assert_eq!(inode.blocks, 2 * 14);
	assert_inode_blocks_consistent(&img.vol, ino);
}

#[test]
fn hard_link_shares_inode_and_bumps_link_count() {
	let mut img = fixture::build();
	make_dir(&mut img.vol, "/a");
	let f = fileobj::copy_in(&mut img.vol, "/a/f", b"hello").unwrap();

	let free_inodes_before = img.vol.superblock().free_inodes_count;
	fileobj::link_hard(&mut img.vol, "/a/f", "/a/g").unwrap();

	let g = path::resolve(&img.vol, "/a/g").unwrap();
	assert_eq!(f, g);
	assert_eq!(img.vol.inode(f).links_count, 2);
	assert_eq!(img.vol.superblock().free_inodes_count, free_inodes_before);
}

#[test]
fn hard_link_then_remove_original_name_preserves_data() {
	let mut img = fixture::build();
	make_dir(&mut img.vol, "/a");
	let f = fileobj::copy_in(&mut img.vol, "/a/f", b"hello").unwrap();
	fileobj::link_hard(&mut img.vol, "/a/f", "/a/g").unwrap();

	fileobj::remove(&mut img.vol, "/a/g").unwrap();

	assert_eq!(img.vol.inode(f).links_count, 1);
	assert_eq!(fileobj::read_body(&img.vol, f), b"hello");
	assert!(path::resolve(&img.vol, "/a/f").is_ok());
	assert!(path::resolve(&img.vol, "/a/g").is_err());
}

#[test]
fn symlink_body_is_target_path_and_hard_link_dereferences_through_it() {
	let mut img = fixture::build();
	make_dir(&mut img.vol, "/a");
	let f = fileobj::copy_in(&mut img.vol, "/a/f", b"hello").unwrap();

	fileobj::link_symlink(&mut img.vol, "/a/f", "/a/s").unwrap();
	let s = path::resolve(&img.vol, "/a/s").unwrap();
	assert!(img.vol.inode(s).is_symlink());
	assert_eq!(fileobj::read_body(&img.vol, s), b"/a/f");

	fileobj::link_hard(&mut img.vol, "/a/s", "/a/h").unwrap();
	let h = path::resolve(&img.vol, "/a/h").unwrap();
	assert_eq!(h, f);
	assert_eq!(img.vol.inode(f).links_count, 2);
}

#[test]
fn remove_recursive_directory_restores_parent_state() {
	let mut img = fixture::build();
	let used_dirs_before = img.vol.group_desc().used_dirs_count;
	let root_links_before = img.vol.inode(ROOT_INODE).links_count;

	make_dir(&mut img.vol, "/a");
	make_dir(&mut img.vol, "/a/b");
	fileobj::copy_in(&mut img.vol, "/a/f", b"data").unwrap();

	fileobj::remove_recursive(&mut img.vol, "/a").unwrap();

	assert_eq!(img.vol.group_desc().used_dirs_count, used_dirs_before);
	assert_eq!(img.vol.inode(ROOT_INODE).links_count, root_links_before);
	assert!(path::resolve(&img.vol, "/a").is_err());
	assert_bitmap_counters_consistent(&img.vol);
}

#[test]
fn remove_recursive_refuses_root() {
	let mut img = fixture::build();
	assert!(matches!(fileobj::remove_recursive(&mut img.vol, "/"), Err(Error::InvalidPath)));
}

#[test]
fn rm_on_directory_without_recurse_fails() {
	let mut img = fixture::build();
	make_dir(&mut img.vol, "/a");
	assert!(matches!(fileobj::remove(&mut img.vol, "/a"), Err(Error::IsADirectory)));
}

#[test]
fn directory_full_of_twelve_direct_blocks_rejects_further_entries() {
	let mut img = fixture::build();
	make_dir(&mut img.vol, "/a");
	let a = path::resolve(&img.vol, "/a").unwrap();

	// Each unique 1000-byte name forces its own block once the previous one has no slack left.
	let mut created = 0;
	loop {
		let name = format!("/a/{}", "n".repeat(1000).chars().take(200).collect::<String>());
		let unique = format!("{name}{created}");
		match dirstore::add_entry(&mut img.vol, a, ROOT_INODE, &unique, FILE_TYPE_REGULAR) {
			Ok(()) => created += 1,
			Err(Error::NoSpace) => break,
			Err(e) => panic!("unexpected error: {e:?}"),
		}
		if created > 64 {
			panic!("directory should have run out of direct blocks by now");
		}
	}
	assert!(created > 0);
	for k in 0..DIRECT_POINTERS {
		assert!(img.vol.inode(a).block[k] != 0, "all twelve direct blocks should be in use");
	}
	assert_dir_blocks_packed(&img.vol, a);
}

#[test]
fn name_length_boundary() {
	let mut img = fixture::build();
	make_dir(&mut img.vol, "/a");

	let ok_name = "n".repeat(255);
	let ok_path = format!("/a/{ok_name}");
	assert!(fileobj::copy_in(&mut img.vol, &ok_path, b"x").is_ok());

	let too_long = "n".repeat(256);
	let bad_path = format!("/a/{too_long}");
	assert!(matches!(fileobj::copy_in(&mut img.vol, &bad_path, b"x"), Err(Error::NameTooLong)));
}

#[test]
fn no_space_when_inode_table_exhausted() {
	let mut img = fixture::build();
	make_dir(&mut img.vol, "/a");

	let mut i = 0;
	loop {
		let path = format!("/a/f{i}");
		match fileobj::copy_in(&mut img.vol, &path, b"x") {
			Ok(_) => i += 1,
			Err(Error::NoSpace) => break,
			Err(e) => panic!("unexpected error: {e:?}"),
		}
		if i > 64 {
			panic!("should have run out of inodes or blocks by now");
		}
	}
	assert_eq!(alloc::free_inodes_available(&img.vol), 0);
}

/// Creates a directory at `path` via the same primitives `mkdir` would use, returning its inode.
fn make_dir(vol: &mut Volume, path: &str) -> u32 {
	let (parent, name) = path::resolve_parent(vol, path).unwrap();
	let ino = fileobj::init_inode(vol, MODE_DIRECTORY).unwrap();
	dirstore::add_entry(vol, parent, ino, name, FILE_TYPE_DIRECTORY).unwrap();
	dirstore::add_entry(vol, ino, ino, ".", FILE_TYPE_DIRECTORY).unwrap();
	dirstore::add_entry(vol, ino, parent, "..", FILE_TYPE_DIRECTORY).unwrap();
	vol.group_desc_mut().used_dirs_count += 1;
	ino
}
