//! On-disk layout constants and record types for a single-group ext2 volume.
//!
//! These mirror the real ext2 format (see `mkfs`'s `Superblock`/`BlockGroupDescriptor`/`INode`
//! in the wider ecosystem this crate was split out of) but are pinned to the fixed geometry this
//! tool edits: a 128 KiB image, 1024-byte blocks, 128 blocks, 32 inodes, one block group.

use std::mem::size_of;

/// Size of a block in bytes.
pub const BLOCK_SIZE: u32 = 1024;
/// Total number of blocks in the volume (one 1024-byte bitmap block holds exactly this many
/// bits, so the block bitmap occupies a single block).
pub const TOTAL_BLOCKS: u32 = 128;
/// Total number of inodes in the volume.
pub const TOTAL_INODES: u32 = 32;
/// Total mapped size of the image.
pub const IMAGE_SIZE: u64 = (BLOCK_SIZE as u64) * (TOTAL_BLOCKS as u64);

/// Byte offset of the superblock (block 1).
pub const SUPERBLOCK_OFFSET: u64 = BLOCK_SIZE as u64;
/// Byte offset of the (sole) group descriptor (block 2).
pub const GROUP_DESC_OFFSET: u64 = (BLOCK_SIZE as u64) * 2;

/// Inode number of the root directory.
pub const ROOT_INODE: u32 = 2;
/// Size of a single inode-table entry in bytes.
pub const INODE_SIZE: u32 = 128;

/// Number of direct block pointers in an inode.
pub const DIRECT_POINTERS: usize = 12;
/// Index of the single-indirect pointer within `i_block`.
pub const INDIRECT_INDEX: usize = 12;
/// Number of pointer slots in an indirect block.
pub const POINTERS_PER_INDIRECT_BLOCK: usize = (BLOCK_SIZE as usize) / size_of::<u32>();

/// Fixed size, in bytes, of a directory entry's header (inode + rec_len + name_len + file_type).
/// The original C program computed this from `sizeof(struct ext2_dir_entry_2 *)`, i.e. a pointer
/// size that is coincidentally 8 on 64-bit hosts; this crate always uses the true fixed header
/// size instead (see Open Question 1).
pub const DIR_ENTRY_HEADER_SIZE: u32 = 8;
/// Maximum length, in bytes, of a directory entry's name.
pub const MAX_NAME_LEN: usize = 255;

/// Mode bit marking a regular file.
pub const MODE_REGULAR: u16 = 0x8000;
/// Mode bit marking a directory.
pub const MODE_DIRECTORY: u16 = 0x4000;
/// Mode bit marking a symbolic link.
pub const MODE_SYMLINK: u16 = 0xA000;
/// Mask isolating the file-type bits (S_IFMT) of a mode. `MODE_SYMLINK` (0xA000) and
/// `MODE_REGULAR` (0x8000) share the 0x8000 bit, so telling them apart requires masking with
/// this before comparing, not a bitwise-AND-is-nonzero test.
pub const MODE_TYPE_MASK: u16 = 0xF000;

/// Directory-entry file-type tag: unknown.
pub const FILE_TYPE_UNKNOWN: u8 = 0;
/// Directory-entry file-type tag: regular file.
pub const FILE_TYPE_REGULAR: u8 = 1;
/// Directory-entry file-type tag: directory.
pub const FILE_TYPE_DIRECTORY: u8 = 2;
/// Directory-entry file-type tag: symbolic link.
pub const FILE_TYPE_SYMLINK: u8 = 7;

/// The ext2 superblock. Only the fields this tool reads or mutates are meaningful; the rest is
/// kept around so the struct's size matches the real on-disk layout (1024 bytes, i.e. exactly
/// one block), which is what lets `GROUP_DESC_OFFSET` sit immediately after it.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct Superblock {
	pub inodes_count: u32,
	pub blocks_count: u32,
	pub reserved_blocks_count: u32,
	pub free_blocks_count: u32,
	pub free_inodes_count: u32,
	pub first_data_block: u32,
	pub log_block_size: u32,
	pub log_frag_size: u32,
	pub blocks_per_group: u32,
	pub frags_per_group: u32,
	pub inodes_per_group: u32,
	pub mtime: u32,
	pub wtime: u32,
	pub mnt_count: u16,
	pub max_mnt_count: u16,
	pub magic: u16,
	pub state: u16,
	pub errors: u16,
	pub minor_rev_level: u16,
	pub lastcheck: u32,
	pub checkinterval: u32,
	pub creator_os: u32,
	pub rev_level: u32,
	pub def_resuid: u16,
	pub def_resgid: u16,

	// -- extended superblock fields --
	pub first_ino: u32,
	pub inode_size: u16,
	pub block_group_nr: u16,
	pub feature_compat: u32,
	pub feature_incompat: u32,
	pub feature_ro_compat: u32,
	pub uuid: [u8; 16],
	pub volume_name: [u8; 16],
	pub last_mounted: [u8; 64],
	pub algo_bitmap: u32,
	pub prealloc_blocks: u8,
	pub prealloc_dir_blocks: u8,
	_padding0: u16,
	pub journal_uuid: [u8; 16],
	pub journal_inum: u32,
	pub journal_dev: u32,
	pub last_orphan: u32,

	_padding1: [u8; 788],
}

/// The ext2 signature expected in [`Superblock::magic`].
pub const EXT2_MAGIC: u16 = 0xef53;
/// First non-reserved inode number in the classic (rev 0) on-disk layout.
pub const EXT2_GOOD_OLD_FIRST_INO: u32 = 11;

impl Superblock {
	/// Returns the lowest inode number the allocator is allowed to hand out. The spec ties this
	/// to the superblock's own `first_ino` field rather than hardcoding it, so a volume with a
	/// different reserved range is still handled correctly.
	pub fn first_usable_inode(&self) -> u32 {
		if self.first_ino > 0 {
			self.first_ino
		} else {
			EXT2_GOOD_OLD_FIRST_INO
		}
	}
}

const _: () = assert!(size_of::<Superblock>() == 1024);

/// The (sole) block group descriptor.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct GroupDescriptor {
	pub block_bitmap: u32,
	pub inode_bitmap: u32,
	pub inode_table: u32,
	pub free_blocks_count: u16,
	pub free_inodes_count: u16,
	pub used_dirs_count: u16,
	pub pad: u16,
	pub reserved: [u8; 12],
}

const _: () = assert!(size_of::<GroupDescriptor>() == 32);

/// An ext2 inode. The file name is never stored here; it lives in the directory entry (or
/// entries, for a hard link) that reference this inode's table slot.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct Inode {
	pub mode: u16,
	pub uid: u16,
	pub size: u32,
	pub atime: u32,
	pub ctime: u32,
	pub mtime: u32,
	pub dtime: u32,
	pub gid: u16,
	pub links_count: u16,
	/// Number of 512-byte sectors used by this inode (twice the number of 1 KiB blocks it owns).
	pub blocks: u32,
	pub flags: u32,
	pub osd1: u32,
	/// 12 direct block pointers (indices 0..12), one single-indirect pointer at index 12, and
	/// the doubly-/triply-indirect pointers at indices 13/14 that this tool never allocates
	/// (doubly-/triply-indirect blocks are a non-goal) but that must stay present for the inode
	/// to occupy the real on-disk 128-byte size.
	pub block: [u32; 15],
	pub generation: u32,
	pub file_acl: u32,
	pub dir_acl: u32,
	pub faddr: u32,
	pub osd2: [u8; 12],
}

const _: () = assert!(size_of::<Inode>() == 128);

impl Inode {
	/// Whether this inode's mode marks it as a directory.
	pub fn is_dir(&self) -> bool {
		self.mode & MODE_DIRECTORY != 0
	}

	/// Whether this inode's mode marks it as a regular file.
	pub fn is_regular(&self) -> bool {
		self.mode & MODE_TYPE_MASK == MODE_REGULAR
	}

	/// Whether this inode's mode marks it as a symbolic link.
	pub fn is_symlink(&self) -> bool {
		self.mode & MODE_TYPE_MASK == MODE_SYMLINK
	}
}

/// Rounds `8 + name_len` up to a multiple of 4: the "true length" a directory entry with the
/// given name occupies once padding is applied.
pub fn entry_true_len(name_len: u8) -> u16 {
	let raw = DIR_ENTRY_HEADER_SIZE + name_len as u32;
	(raw.div_ceil(4) * 4) as u16
}
