//! `ext2_ln`: creates a hard or (with `-s`) symbolic link on an ext2 image, like `ln`.

use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use ext2fs::{fileobj, Volume};

#[derive(Parser)]
#[command(about = "Create a hard or symbolic link on an ext2 image.")]
struct Args {
	/// Path to the ext2-formatted disk image.
	image: PathBuf,
	/// Absolute path to the link's source (target of a symlink, or the file a hard link
	/// refers to).
	src_path: String,
	/// Absolute path at which the new link is created.
	dst_path: String,
	/// Create a symbolic link instead of a hard link.
	#[arg(short = 's', long = "symbolic")]
	symbolic: bool,
}

fn main() {
	let args = Args::parse();

	let mut vol = Volume::open(&args.image).unwrap_or_else(|e| {
		eprintln!("ext2_ln: {}: {}", args.image.display(), e);
		exit(e.exit_code());
	});

	let result = if args.symbolic {
		fileobj::link_symlink(&mut vol, &args.src_path, &args.dst_path)
	} else {
		fileobj::link_hard(&mut vol, &args.src_path, &args.dst_path)
	};

	if let Err(e) = result {
		eprintln!("ext2_ln: {}: {}", args.dst_path, e);
		exit(e.exit_code());
	}

	if let Err(e) = vol.flush() {
		eprintln!("ext2_ln: {}: {}", args.image.display(), e);
		exit(e.exit_code());
	}
}
