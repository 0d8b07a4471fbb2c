//! `ext2_ls`: lists the live entries of a directory on an ext2 image, like `ls`.

use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use ext2fs::{fileobj, Volume};

#[derive(Parser)]
#[command(about = "List the entries of a directory on an ext2 image.")]
struct Args {
	/// Path to the ext2-formatted disk image.
	image: PathBuf,
	/// Absolute path of the directory to list.
	path: String,
	/// Include the `.` and `..` entries in the listing.
	#[arg(short = 'a', long = "all")]
	all: bool,
}

fn main() {
	let args = Args::parse();

	let vol = Volume::open(&args.image).unwrap_or_else(|e| {
		eprintln!("ext2_ls: {}: {}", args.image.display(), e);
		exit(e.exit_code());
	});

	let entries = fileobj::list(&vol, &args.path).unwrap_or_else(|e| {
		eprintln!("ext2_ls: {}: {}", args.path, e);
		exit(e.exit_code());
	});

	for entry in entries {
		if !args.all && (entry.name == "." || entry.name == "..") {
			continue;
		}
		println!("{}", entry.name);
	}
}
