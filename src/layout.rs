//! The layout planner: partitions a device into its four regions given only its
//! block count (§3).

use crate::block::BLOCK_SIZE;
use crate::error::{FsError, FsResult};
use crate::inode::INODE_SIZE;

/// The minimum number of blocks a device must have to carry this file system.
pub const MIN_FS_SIZE: u32 = 22;

/// Rounds `num / den` up to the nearest integer.
pub const fn ceil_division(num: u32, den: u32) -> u32 {
	(num + den - 1) / den
}

/// The number of inodes packed into one block.
pub const fn inodes_per_block() -> u32 {
	(BLOCK_SIZE / INODE_SIZE) as u32
}

/// The region layout of a device of `fs_size` blocks.
///
/// Mirrors the nine little-endian fields persisted verbatim into the superblock
/// (§6): `fs_size`, then the four `(start, count)` pairs in region order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
	pub fs_size: u32,
	pub inode_start: u32,
	pub max_num_inodes: u32,
	pub inode_count: u32,
	pub ba_map_start: u32,
	pub ba_map_count: u32,
	pub data_start: u32,
	pub data_count: u32,
}

impl Layout {
	/// Computes the layout for a device of `fs_size` blocks.
	pub fn plan(fs_size: u32) -> FsResult<Self> {
		if fs_size < MIN_FS_SIZE {
			return Err(FsError::InvalidLayout);
		}

		// 75% of the device, rounded down to a multiple of 16 so inode blocks are
		// always fully packed.
		let max_num_inodes = ((fs_size as u64 * 3 / 4) as u32 / 16) * 16;

		let inode_start = 1;
		let inode_count = ceil_division(max_num_inodes, inodes_per_block());

		let ba_map_start = inode_start + inode_count;
		let ba_map_count = ceil_division(fs_size, BLOCK_SIZE as u32);

		let data_start = ba_map_start + ba_map_count;
		if data_start >= fs_size {
			return Err(FsError::InvalidLayout);
		}
		let data_count = fs_size - data_start;

		Ok(Self {
			fs_size,
			inode_start,
			max_num_inodes,
			inode_count,
			ba_map_start,
			ba_map_count,
			data_start,
			data_count,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn rejects_undersized_device() {
		assert!(Layout::plan(21).is_err());
	}

	#[test]
	fn regions_are_contiguous_and_packed() {
		let l = Layout::plan(64).unwrap();
		assert_eq!(l.inode_start, 1);
		assert_eq!(l.ba_map_start, l.inode_start + l.inode_count);
		assert_eq!(l.data_start, l.ba_map_start + l.ba_map_count);
		assert_eq!(l.data_start + l.data_count, l.fs_size);
		// max_num_inodes is always a multiple of 16.
		assert_eq!(l.max_num_inodes % 16, 0);
		assert_eq!(l.inode_count, ceil_division(l.max_num_inodes, inodes_per_block()));
	}

	#[test]
	fn larger_device_has_more_data_blocks() {
		let small = Layout::plan(64).unwrap();
		let large = Layout::plan(4096).unwrap();
		assert!(large.data_count > small.data_count);
	}
}
