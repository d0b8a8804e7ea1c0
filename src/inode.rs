//! The inode manager: allocates, reads, writes, and frees inodes (§4.3).
//!
//! Inodes are addressed by a flat `u32` index and packed `INODE_SIZE` bytes apart
//! inside the inode table region. [`read`] returns an owned [`Inode`] and
//! [`write`] re-serializes it, rather than handing back a pointer into a
//! caller-supplied block buffer — see the redesign note in DESIGN.md.

use crate::bitmap;
use crate::block::{zeroed_block, BlockDevice, BLOCK_SIZE};
use crate::error::{FsError, FsResult};
use crate::layout::{inodes_per_block, Layout};

/// The on-disk size of one inode, in bytes.
pub const INODE_SIZE: usize = 32;
/// The number of direct block pointers an inode carries.
pub const DATA_BLOCK_NUM: usize = 8;
/// The root directory's inode number.
pub const ROOT_DIRECTORY: u32 = 0;

/// The type of file an inode describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
	/// The inode is unused and may be allocated.
	Free,
	Directory,
	File,
}

impl FileType {
	fn to_raw(self) -> u16 {
		match self {
			FileType::Free => 0,
			FileType::Directory => 1,
			FileType::File => 2,
		}
	}

	fn from_raw(raw: u16) -> FsResult<Self> {
		match raw {
			0 => Ok(FileType::Free),
			1 => Ok(FileType::Directory),
			2 => Ok(FileType::File),
			_ => Err(FsError::Corrupted),
		}
	}
}

/// An in-memory copy of one inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
	pub size: u32,
	pub fd_count: u32,
	pub links: u32,
	pub in_use_blocks: u16,
	pub direct_blocks: [u16; DATA_BLOCK_NUM],
	pub file_type: FileType,
}

impl Inode {
	fn free() -> Self {
		Self {
			size: 0,
			fd_count: 0,
			links: 0,
			in_use_blocks: 0,
			direct_blocks: [0; DATA_BLOCK_NUM],
			file_type: FileType::Free,
		}
	}

	fn encode(&self, buf: &mut [u8]) {
		buf[0..4].copy_from_slice(&self.size.to_le_bytes());
		buf[4..8].copy_from_slice(&self.fd_count.to_le_bytes());
		buf[8..12].copy_from_slice(&self.links.to_le_bytes());
		buf[12..14].copy_from_slice(&self.in_use_blocks.to_le_bytes());
		for (i, b) in self.direct_blocks.iter().enumerate() {
			let off = 14 + i * 2;
			buf[off..off + 2].copy_from_slice(&b.to_le_bytes());
		}
		buf[30..32].copy_from_slice(&self.file_type.to_raw().to_le_bytes());
	}

	fn decode(buf: &[u8]) -> FsResult<Self> {
		let size = u32::from_le_bytes(buf[0..4].try_into().unwrap());
		let fd_count = u32::from_le_bytes(buf[4..8].try_into().unwrap());
		let links = u32::from_le_bytes(buf[8..12].try_into().unwrap());
		let in_use_blocks = u16::from_le_bytes(buf[12..14].try_into().unwrap());
		let mut direct_blocks = [0u16; DATA_BLOCK_NUM];
		for (i, b) in direct_blocks.iter_mut().enumerate() {
			let off = 14 + i * 2;
			*b = u16::from_le_bytes(buf[off..off + 2].try_into().unwrap());
		}
		let file_type = FileType::from_raw(u16::from_le_bytes(buf[30..32].try_into().unwrap()))?;
		Ok(Self {
			size,
			fd_count,
			links,
			in_use_blocks,
			direct_blocks,
			file_type,
		})
	}
}

/// The block and in-block byte offset an inode index resolves to.
fn locate(layout: &Layout, i: u32) -> (u32, usize) {
	assert!(
		i < layout.max_num_inodes,
		"inode index {i} out of range (max {})",
		layout.max_num_inodes
	);
	let block_no = layout.inode_start + i / inodes_per_block();
	let offset = (i % inodes_per_block()) as usize * INODE_SIZE;
	(block_no, offset)
}

/// Reads and decodes inode `i`.
pub fn read<D: BlockDevice>(dev: &mut D, layout: &Layout, i: u32) -> FsResult<Inode> {
	let (block_no, offset) = locate(layout, i);
	let mut block = zeroed_block();
	dev.read_block(block_no, &mut block)?;
	Inode::decode(&block[offset..offset + INODE_SIZE])
}

/// Encodes and persists `inode` at index `i`.
pub fn write<D: BlockDevice>(dev: &mut D, layout: &Layout, i: u32, inode: &Inode) -> FsResult<()> {
	let (block_no, offset) = locate(layout, i);
	let mut block = zeroed_block();
	dev.read_block(block_no, &mut block)?;
	inode.encode(&mut block[offset..offset + INODE_SIZE]);
	dev.write_block(block_no, &block)?;
	Ok(())
}

/// Scans the inode table and returns the index of the first `FREE` inode.
pub fn alloc<D: BlockDevice>(dev: &mut D, layout: &Layout) -> FsResult<u32> {
	for i in 0..layout.max_num_inodes {
		if read(dev, layout, i)?.file_type == FileType::Free {
			log::debug!("inode {i} allocated");
			return Ok(i);
		}
	}
	Err(FsError::NoFreeInodes)
}

/// Initializes inode `i` as a fresh, empty inode of the given type.
pub fn init<D: BlockDevice>(
	dev: &mut D,
	layout: &Layout,
	i: u32,
	file_type: FileType,
) -> FsResult<()> {
	let inode = Inode {
		size: 0,
		fd_count: 0,
		links: 1,
		in_use_blocks: 0,
		direct_blocks: [0; DATA_BLOCK_NUM],
		file_type,
	};
	write(dev, layout, i, &inode)
}

/// Frees inode `i` and every data block it references.
pub fn free<D: BlockDevice>(dev: &mut D, layout: &Layout, i: u32) -> FsResult<()> {
	let inode = read(dev, layout, i)?;
	for &b in &inode.direct_blocks[0..inode.in_use_blocks as usize] {
		bitmap::free(dev, layout, b as u32)?;
	}
	write(dev, layout, i, &Inode::free())?;
	log::debug!("inode {i} freed");
	Ok(())
}

/// The number of bytes a file may hold: `DATA_BLOCK_NUM * BLOCK_SIZE`.
pub const fn max_file_size() -> u32 {
	(DATA_BLOCK_NUM * BLOCK_SIZE) as u32
}
