//! The Image View: a memory-mapped window onto a backing ext2 image file, with typed,
//! bounds-checked accessors onto its fixed regions.

use std::fs::OpenOptions;
use std::mem::size_of;
use std::path::Path;

use memmap2::MmapMut;

use crate::error::{Error, Result};
use crate::layout::{
	GroupDescriptor, Inode, Superblock, BLOCK_SIZE, GROUP_DESC_OFFSET, IMAGE_SIZE,
	SUPERBLOCK_OFFSET, TOTAL_INODES,
};

/// Owns the memory-mapped region for the duration of one command invocation. Every other core
/// component borrows typed windows into it; nothing derived from a `Volume` may outlive it.
pub struct Volume {
	mmap: MmapMut,
}

impl Volume {
	/// Opens `path` read-write and maps the first [`IMAGE_SIZE`] bytes of it.
	pub fn open(path: &Path) -> Result<Self> {
		let file = OpenOptions::new().read(true).write(true).open(path)?;
		let len = file.metadata()?.len();
		if len < IMAGE_SIZE {
			return Err(Error::IoError(std::io::Error::new(
				std::io::ErrorKind::InvalidData,
				format!("image {} is smaller than the expected {IMAGE_SIZE} bytes", path.display()),
			)));
		}

		let mmap = unsafe { MmapMut::map_mut(&file)? };
		Ok(Self { mmap })
	}

	/// Flushes all mutations back to the backing file. Called once at the end of a command.
	pub fn flush(&self) -> Result<()> {
		self.mmap.flush()?;
		Ok(())
	}

	fn byte_slice(&self, offset: u64, len: usize) -> &[u8] {
		&self.mmap[offset as usize..offset as usize + len]
	}

	fn byte_slice_mut(&mut self, offset: u64, len: usize) -> &mut [u8] {
		&mut self.mmap[offset as usize..offset as usize + len]
	}

	/// Returns a typed reference onto the superblock at byte offset 1024.
	pub fn superblock(&self) -> &Superblock {
		let bytes = self.byte_slice(SUPERBLOCK_OFFSET, size_of::<Superblock>());
		unsafe { &*(bytes.as_ptr() as *const Superblock) }
	}

	/// Returns a typed mutable reference onto the superblock.
	pub fn superblock_mut(&mut self) -> &mut Superblock {
		let bytes = self.byte_slice_mut(SUPERBLOCK_OFFSET, size_of::<Superblock>());
		unsafe { &mut *(bytes.as_mut_ptr() as *mut Superblock) }
	}

	/// Returns a typed reference onto the (sole) group descriptor at byte offset 2048.
	pub fn group_desc(&self) -> &GroupDescriptor {
		let bytes = self.byte_slice(GROUP_DESC_OFFSET, size_of::<GroupDescriptor>());
		unsafe { &*(bytes.as_ptr() as *const GroupDescriptor) }
	}

	/// Returns a typed mutable reference onto the group descriptor.
	pub fn group_desc_mut(&mut self) -> &mut GroupDescriptor {
		let bytes = self.byte_slice_mut(GROUP_DESC_OFFSET, size_of::<GroupDescriptor>());
		unsafe { &mut *(bytes.as_mut_ptr() as *mut GroupDescriptor) }
	}

	/// Returns the byte offset of block `b` (0-based, absolute block number).
	fn block_offset(b: u32) -> u64 {
		b as u64 * BLOCK_SIZE as u64
	}

	/// Returns the block bitmap, sized to one block, as declared by the group descriptor.
	pub fn block_bitmap(&self) -> &[u8] {
		let off = Self::block_offset(self.group_desc().block_bitmap);
		self.byte_slice(off, BLOCK_SIZE as usize)
	}

	/// Returns the block bitmap mutably.
	pub fn block_bitmap_mut(&mut self) -> &mut [u8] {
		let off = Self::block_offset(self.group_desc().block_bitmap);
		self.byte_slice_mut(off, BLOCK_SIZE as usize)
	}

	/// Returns the inode bitmap, sized to one block, as declared by the group descriptor.
	pub fn inode_bitmap(&self) -> &[u8] {
		let off = Self::block_offset(self.group_desc().inode_bitmap);
		self.byte_slice(off, BLOCK_SIZE as usize)
	}

	/// Returns the inode bitmap mutably.
	pub fn inode_bitmap_mut(&mut self) -> &mut [u8] {
		let off = Self::block_offset(self.group_desc().inode_bitmap);
		self.byte_slice_mut(off, BLOCK_SIZE as usize)
	}

	/// Returns the byte offset of inode `n` (1-based) within the inode table.
	fn inode_offset(&self, n: u32) -> u64 {
		let table_off = Self::block_offset(self.group_desc().inode_table);
		table_off + (n as u64 - 1) * size_of::<Inode>() as u64
	}

	/// Returns the inode-table entry for 1-based inode number `n`.
	pub fn inode(&self, n: u32) -> &Inode {
		debug_assert!(n >= 1 && n <= TOTAL_INODES, "inode number out of range: {n}");
		let off = self.inode_offset(n);
		let bytes = self.byte_slice(off, size_of::<Inode>());
		unsafe { &*(bytes.as_ptr() as *const Inode) }
	}

	/// Returns the inode-table entry for 1-based inode number `n`, mutably.
	pub fn inode_mut(&mut self, n: u32) -> &mut Inode {
		debug_assert!(n >= 1 && n <= TOTAL_INODES, "inode number out of range: {n}");
		let off = self.inode_offset(n);
		let bytes = self.byte_slice_mut(off, size_of::<Inode>());
		unsafe { &mut *(bytes.as_mut_ptr() as *mut Inode) }
	}

	/// Returns the raw bytes of data block `b` (1-based block number, as stored in an inode's
	/// `i_block` array; block 0 is never a valid data block and denotes "unallocated").
	pub fn block(&self, b: u32) -> &[u8] {
		debug_assert!(b != 0, "block 0 is never a valid data block");
		self.byte_slice(Self::block_offset(b), BLOCK_SIZE as usize)
	}

	/// Returns the raw bytes of data block `b`, mutably.
	pub fn block_mut(&mut self, b: u32) -> &mut [u8] {
		debug_assert!(b != 0, "block 0 is never a valid data block");
		self.byte_slice_mut(Self::block_offset(b), BLOCK_SIZE as usize)
	}

	/// Interprets block `b` as an array of 256 little-endian block pointers (a single-indirect
	/// block), returning them as a plain slice.
	pub fn indirect_block(&self, b: u32) -> &[u32] {
		let bytes = self.block(b);
		unsafe {
			std::slice::from_raw_parts(bytes.as_ptr() as *const u32, bytes.len() / size_of::<u32>())
		}
	}

	/// Interprets block `b` as an indirect block, mutably.
	pub fn indirect_block_mut(&mut self, b: u32) -> &mut [u32] {
		let bytes = self.block_mut(b);
		let len = bytes.len() / size_of::<u32>();
		unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut u32, len) }
	}
}
