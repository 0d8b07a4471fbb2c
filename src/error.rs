//! The error taxonomy shared by every core operation.
//!
//! Every fallible operation in this crate returns [`Error`], never a bare `io::Error` or
//! `Option`, so that command drivers have a single place to map failures onto the POSIX exit
//! codes described in the on-disk format's external interface.

use std::fmt;
use std::io;

/// The kinds of failure a core operation can report.
#[derive(Debug)]
pub enum Error {
	/// A path component, target inode, or named directory entry does not exist.
	NotFound,
	/// A create operation would collide with an existing entry.
	AlreadyExists,
	/// An operation expected a directory but found something else.
	NotADirectory,
	/// An operation expected a non-directory but found a directory.
	IsADirectory,
	/// A path component exceeds the 255-byte on-disk name limit.
	NameTooLong,
	/// The bitmap allocator has no free inode/block, or a directory has no room left in its
	/// twelve direct blocks.
	NoSpace,
	/// Opening, mapping, or flushing the backing file failed.
	IoError(io::Error),
	/// The path given to a command is malformed (not absolute, or ends in `/` where a file is
	/// expected).
	InvalidPath,
}

impl Error {
	/// Maps this error onto the POSIX symbolic exit code a command driver should return.
	pub fn exit_code(&self) -> i32 {
		match self {
			Self::NotFound => libc::ENOENT,
			Self::AlreadyExists => libc::EEXIST,
			Self::NotADirectory => libc::ENOTDIR,
			Self::IsADirectory => libc::EISDIR,
			Self::NameTooLong => libc::ENAMETOOLONG,
			Self::NoSpace => libc::ENOSPC,
			Self::IoError(_) => libc::EIO,
			Self::InvalidPath => libc::EINVAL,
		}
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::NotFound => write!(f, "No such file or directory"),
			Self::AlreadyExists => write!(f, "File exists"),
			Self::NotADirectory => write!(f, "Not a directory"),
			Self::IsADirectory => write!(f, "Is a directory"),
			Self::NameTooLong => write!(f, "File name too long"),
			Self::NoSpace => write!(f, "No space left on device"),
			Self::IoError(e) => write!(f, "{e}"),
			Self::InvalidPath => write!(f, "Invalid path"),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::IoError(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Self {
		Self::IoError(e)
	}
}

/// Shorthand for `Result<T, Error>`, used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;
