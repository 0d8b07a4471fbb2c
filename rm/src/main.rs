//! `ext2_rm`: removes a file, symlink, or (with `-r`) a directory from an ext2 image, like `rm`.

use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use ext2fs::{fileobj, Volume};

#[derive(Parser)]
#[command(about = "Remove a file, symlink, or (with -r) a directory from an ext2 image.")]
struct Args {
	/// Path to the ext2-formatted disk image.
	image: PathBuf,
	/// Absolute path to remove.
	path: String,
	/// Remove a directory and everything under it.
	#[arg(short = 'r', long = "recursive")]
	recursive: bool,
}

fn main() {
	let args = Args::parse();

	let mut vol = Volume::open(&args.image).unwrap_or_else(|e| {
		eprintln!("ext2_rm: {}: {}", args.image.display(), e);
		exit(e.exit_code());
	});

	let result =
		if args.recursive { fileobj::remove_recursive(&mut vol, &args.path) } else { fileobj::remove(&mut vol, &args.path) };

	if let Err(e) = result {
		eprintln!("ext2_rm: {}: {}", args.path, e);
		exit(e.exit_code());
	}

	if let Err(e) = vol.flush() {
		eprintln!("ext2_rm: {}: {}", args.image.display(), e);
		exit(e.exit_code());
	}
}
