//! Error types returned by every fallible operation in the crate.

use thiserror::Error;

/// The result type used throughout the crate.
pub type FsResult<T> = Result<T, FsError>;

/// An error returned by a file system operation.
///
/// Variants are grouped the way §7 of the design groups them: validation, not-found /
/// already-exists, resource exhaustion, and semantic rejection. Internal invariant
/// violations are not represented here; they `panic!` instead, since they indicate a
/// corrupted file system or a bug rather than a recoverable condition.
#[derive(Debug, Error)]
pub enum FsError {
	/// Propagated from the underlying [`crate::BlockDevice`].
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// The device is smaller than the minimum of 22 blocks, or does not carry a
	/// valid superblock where one was expected.
	#[error("invalid or too small file system layout")]
	InvalidLayout,
	/// A name was empty, contained a NUL byte, or exceeded `MAX_FILE_NAME`.
	#[error("invalid file name")]
	InvalidName,
	/// A negative count, offset, or otherwise out-of-range argument was given.
	#[error("invalid argument")]
	InvalidArgument,
	/// The descriptor is not open, or not open in the mode the operation requires.
	#[error("bad file descriptor")]
	BadDescriptor,

	/// No entry with the given name exists in the current directory.
	#[error("no such file or directory")]
	NotFound,
	/// An entry with the given name already exists in the current directory.
	#[error("file or directory already exists")]
	AlreadyExists,

	/// The inode table has no `FREE` entry left.
	#[error("no free inodes")]
	NoFreeInodes,
	/// The block-allocation bitmap has no free data block left.
	#[error("no free data blocks")]
	NoFreeBlocks,
	/// A directory's entry array is already at `EPB * DATA_BLOCK_NUM` capacity.
	#[error("directory is full")]
	DirectoryFull,
	/// The open-file table has no free slot left.
	#[error("too many open files")]
	TooManyOpenFiles,
	/// The file is already at `DATA_BLOCK_NUM * BLOCK_SIZE` bytes.
	#[error("file has reached its maximum size")]
	FileTooLarge,

	/// A directory was opened or linked/unlinked as if it were a regular file.
	#[error("is a directory")]
	IsADirectory,
	/// A regular file was used where a directory was required (e.g. `cd`).
	#[error("not a directory")]
	NotADirectory,
	/// `rmdir` was called on a directory other than exactly `{".", ".."}`.
	#[error("directory is not empty")]
	DirectoryNotEmpty,

	/// The on-disk state is inconsistent with what the crate's own invariants
	/// guarantee, indicating corruption rather than a programming error reachable
	/// through the public API.
	#[error("file system is corrupted")]
	Corrupted,
}
