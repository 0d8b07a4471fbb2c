//! `ext2_cp`: copies a file from the host file system onto an ext2 image, like `cp`.

use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use ext2fs::{fileobj, Volume};

#[derive(Parser)]
#[command(about = "Copy a host file onto an ext2 image.")]
struct Args {
	/// Path to the ext2-formatted disk image.
	image: PathBuf,
	/// Path to the file to copy, on the host file system.
	host_file: PathBuf,
	/// Absolute destination path on the image.
	path: String,
}

fn main() {
	let args = Args::parse();

	let data = std::fs::read(&args.host_file).unwrap_or_else(|e| {
		eprintln!("ext2_cp: {}: {}", args.host_file.display(), e);
		exit(1);
	});

	let mut vol = Volume::open(&args.image).unwrap_or_else(|e| {
		eprintln!("ext2_cp: {}: {}", args.image.display(), e);
		exit(e.exit_code());
	});

	if let Err(e) = fileobj::copy_in(&mut vol, &args.path, &data) {
		eprintln!("ext2_cp: {}: {}", args.path, e);
		exit(e.exit_code());
	}

	if let Err(e) = vol.flush() {
		eprintln!("ext2_cp: {}: {}", args.image.display(), e);
		exit(e.exit_code());
	}
}
