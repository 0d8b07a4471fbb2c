//! Test-only fixture: builds a throwaway, minimally-populated ext2 image on disk so integration
//! tests can exercise the core against a real memory-mapped [`Volume`] instead of a mock.
//!
//! The on-disk layout mirrors what a real `mke2fs` would lay down for this volume's fixed
//! geometry (see `layout`'s constants): boot block, superblock, group descriptor, block bitmap,
//! inode bitmap, inode table, then the root directory's own data block. Everything past that is
//! free for the test to allocate.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use utils::util::get_timestamp;

use crate::layout::*;
use crate::volume::Volume;

const BLOCK_BITMAP_BLOCK: u32 = 3;
const INODE_BITMAP_BLOCK: u32 = 4;
const INODE_TABLE_BLOCK: u32 = 5;
const INODE_TABLE_BLOCKS: u32 = 4; // 32 inodes * 128 bytes / 1024-byte block
const ROOT_DIR_BLOCK: u32 = INODE_TABLE_BLOCK + INODE_TABLE_BLOCKS; // 9

/// Number of blocks consumed by fixed metadata plus the root directory's own data block: boot,
/// superblock, group descriptor, block bitmap, inode bitmap, 4 inode-table blocks, root dir block.
const RESERVED_BLOCKS: u32 = ROOT_DIR_BLOCK + 1; // 10 (blocks 0..=9)

/// A throwaway image file on disk, removed when dropped. Derefs to the mapped [`Volume`].
pub struct TestImage {
	path: PathBuf,
	pub vol: Volume,
}

impl Drop for TestImage {
	fn drop(&mut self) {
		let _ = std::fs::remove_file(&self.path);
	}
}

impl std::ops::Deref for TestImage {
	type Target = Volume;
	fn deref(&self) -> &Volume {
		&self.vol
	}
}

impl std::ops::DerefMut for TestImage {
	fn deref_mut(&mut self) -> &mut Volume {
		&mut self.vol
	}
}

fn unique_path() -> PathBuf {
	static COUNTER: AtomicU32 = AtomicU32::new(0);
	let n = COUNTER.fetch_add(1, Ordering::Relaxed);
	let pid = std::process::id();
	std::env::temp_dir().join(format!("ext2fs-test-{pid}-{n}.img"))
}

fn set_bit(bitmap_block: &mut [u8], n: u32) {
	bitmap_block[(n / 8) as usize] |= 1 << (n % 8);
}

fn write_entry(block: &mut [u8], offset: usize, inode: u32, rec_len: u16, file_type: u8, name: &str) {
	block[offset..offset + 4].copy_from_slice(&inode.to_le_bytes());
	block[offset + 4..offset + 6].copy_from_slice(&rec_len.to_le_bytes());
	block[offset + 6] = name.len() as u8;
	block[offset + 7] = file_type;
	block[offset + 8..offset + 8 + name.len()].copy_from_slice(name.as_bytes());
}

fn write_raw_image(path: &Path) {
	let mut file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path).unwrap();
	file.write_all(&vec![0u8; IMAGE_SIZE as usize]).unwrap();
}

/// Builds a fresh, minimally-populated image at a unique temp path and opens it as a [`Volume`].
pub fn build() -> TestImage {
	let path = unique_path();
	write_raw_image(&path);

	let mut vol = Volume::open(&path).expect("fixture image should open");

	// Blocks 1..=9 (boot has no bitmap bit at all) are bits 0..=8.
	{
		let bitmap = vol.block_mut(BLOCK_BITMAP_BLOCK);
		for bit in 0..(RESERVED_BLOCKS - 1) {
			set_bit(bitmap, bit);
		}
	}
	// Reserved inodes 1..=11 are bits 0..=10.
	{
		let bitmap = vol.block_mut(INODE_BITMAP_BLOCK);
		for bit in 0..EXT2_GOOD_OLD_FIRST_INO {
			set_bit(bitmap, bit);
		}
	}

	let used_block_bits = RESERVED_BLOCKS - 1; // 9 bits actually set
	let usable_block_bits = TOTAL_BLOCKS - 1; // see alloc::alloc_block's scan bound
	let free_blocks = usable_block_bits - used_block_bits;
	let used_inodes = EXT2_GOOD_OLD_FIRST_INO;
	let free_inodes = TOTAL_INODES - used_inodes;
	let now = get_timestamp().as_secs() as u32;

	{
		let sb = vol.superblock_mut();
		sb.inodes_count = TOTAL_INODES;
		sb.blocks_count = TOTAL_BLOCKS;
		sb.free_blocks_count = free_blocks;
		sb.free_inodes_count = free_inodes;
		sb.first_data_block = 1;
		sb.log_block_size = 0;
		sb.blocks_per_group = TOTAL_BLOCKS;
		sb.inodes_per_group = TOTAL_INODES;
		sb.magic = EXT2_MAGIC;
		sb.first_ino = EXT2_GOOD_OLD_FIRST_INO;
		sb.inode_size = INODE_SIZE as u16;
	}
	{
		let gd = vol.group_desc_mut();
		gd.block_bitmap = BLOCK_BITMAP_BLOCK;
		gd.inode_bitmap = INODE_BITMAP_BLOCK;
		gd.inode_table = INODE_TABLE_BLOCK;
		gd.free_blocks_count = free_blocks as u16;
		gd.free_inodes_count = free_inodes as u16;
		gd.used_dirs_count = 1;
	}

	// Root inode: a directory with "." and ".." filling its one data block.
	{
		let root = vol.inode_mut(ROOT_INODE);
		root.mode = MODE_DIRECTORY;
		root.size = BLOCK_SIZE;
		root.links_count = 2;
		root.blocks = 2;
		root.block[0] = ROOT_DIR_BLOCK;
		root.atime = now;
		root.ctime = now;
		root.mtime = now;
	}
	{
		let block = vol.block_mut(ROOT_DIR_BLOCK);
		block.fill(0);
		write_entry(block, 0, ROOT_INODE, 12, FILE_TYPE_DIRECTORY, ".");
		write_entry(block, 12, ROOT_INODE, (BLOCK_SIZE - 12) as u16, FILE_TYPE_DIRECTORY, "..");
	}

	TestImage { path, vol }
}
