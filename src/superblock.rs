//! The superblock: the 9 little-endian fields persisted verbatim to block 0
//! (§4.1, §6). Holds the magic number and the full [`Layout`] so that `mount`
//! never has to recompute anything.

use crate::block::{zeroed_block, BlockDevice};
use crate::error::{FsError, FsResult};
use crate::layout::Layout;

/// Identifies a block 0 as belonging to this file system.
pub const MAGIC: u32 = 0xabcd;

/// The on-disk superblock, stored at block 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
	pub magic: u32,
	pub layout: Layout,
}

impl Superblock {
	pub fn new(layout: Layout) -> Self {
		Self {
			magic: MAGIC,
			layout,
		}
	}

	fn encode(&self, buf: &mut [u8]) {
		let fields = [
			self.magic,
			self.layout.fs_size,
			self.layout.inode_start,
			self.layout.max_num_inodes,
			self.layout.inode_count,
			self.layout.ba_map_start,
			self.layout.ba_map_count,
			self.layout.data_start,
			self.layout.data_count,
		];
		for (i, f) in fields.iter().enumerate() {
			let off = i * 4;
			buf[off..off + 4].copy_from_slice(&f.to_le_bytes());
		}
	}

	fn decode(buf: &[u8]) -> FsResult<Self> {
		let field = |i: usize| u32::from_le_bytes(buf[i * 4..i * 4 + 4].try_into().unwrap());
		let magic = field(0);
		if magic != MAGIC {
			return Err(FsError::InvalidLayout);
		}
		let layout = Layout {
			fs_size: field(1),
			inode_start: field(2),
			max_num_inodes: field(3),
			inode_count: field(4),
			ba_map_start: field(5),
			ba_map_count: field(6),
			data_start: field(7),
			data_count: field(8),
		};
		Ok(Self { magic, layout })
	}

	/// Persists this superblock to block 0.
	pub fn write<D: BlockDevice>(&self, dev: &mut D) -> FsResult<()> {
		let mut block = zeroed_block();
		self.encode(&mut block);
		dev.write_block(0, &block)
	}

	/// Reads block 0 and returns its superblock if the magic number matches.
	pub fn read<D: BlockDevice>(dev: &mut D) -> FsResult<Self> {
		let mut block = zeroed_block();
		dev.read_block(0, &mut block)?;
		Self::decode(&block)
	}
}
