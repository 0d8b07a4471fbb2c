//! `ext2_mkdir`: creates the final directory on an absolute path, like `mkdir`.

use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use ext2fs::layout::{FILE_TYPE_DIRECTORY, MODE_DIRECTORY};
use ext2fs::{alloc, dirstore, fileobj, path as pathmod, Error, Result, Volume};

#[derive(Parser)]
#[command(about = "Create a directory on an ext2 image.")]
struct Args {
	/// Path to the ext2-formatted disk image.
	image: PathBuf,
	/// Absolute path of the directory to create.
	path: String,
}

fn run(vol: &mut Volume, path: &str) -> Result<()> {
	if pathmod::resolve(vol, path).is_ok() {
		return Err(Error::AlreadyExists);
	}
	let (parent_ino, name) = pathmod::resolve_parent(vol, path)?;

	if alloc::free_inodes_available(vol) < 1 || alloc::free_blocks_available(vol) < 1 {
		return Err(Error::NoSpace);
	}

	let new_ino = fileobj::init_inode(vol, MODE_DIRECTORY)?;
	dirstore::add_entry(vol, parent_ino, new_ino, name, FILE_TYPE_DIRECTORY)?;
	dirstore::add_entry(vol, new_ino, new_ino, ".", FILE_TYPE_DIRECTORY)?;
	dirstore::add_entry(vol, new_ino, parent_ino, "..", FILE_TYPE_DIRECTORY)?;
	vol.group_desc_mut().used_dirs_count += 1;

	Ok(())
}

fn main() {
	let args = Args::parse();

	let mut vol = Volume::open(&args.image).unwrap_or_else(|e| {
		eprintln!("ext2_mkdir: {}: {}", args.image.display(), e);
		exit(e.exit_code());
	});

	if let Err(e) = run(&mut vol, &args.path) {
		eprintln!("ext2_mkdir: {}: {}", args.path, e);
		exit(e.exit_code());
	}

	if let Err(e) = vol.flush() {
		eprintln!("ext2_mkdir: {}: {}", args.image.display(), e);
		exit(e.exit_code());
	}
}
