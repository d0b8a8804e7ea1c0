//! The directory engine: a packed, compactable array of fixed-size directory
//! entries spread across a directory inode's data blocks (§4.4).

use crate::bitmap;
use crate::block::{zeroed_block, BlockDevice, BLOCK_SIZE};
use crate::error::{FsError, FsResult};
use crate::inode::{self, FileType, Inode, DATA_BLOCK_NUM};
use crate::layout::Layout;

/// The longest name a directory entry may hold, not counting the terminator.
pub const MAX_FILE_NAME: usize = 31;
/// The on-disk size of one directory entry: a `u16` inode number plus a 32-byte name.
pub const ENTRY_SIZE: usize = 34;

/// Entries packed per directory data block.
pub const fn entries_per_block() -> usize {
	BLOCK_SIZE / ENTRY_SIZE
}

/// Total entry capacity of one directory inode.
pub const fn max_entries() -> usize {
	entries_per_block() * DATA_BLOCK_NUM
}

fn encode_name(name: &str) -> FsResult<[u8; 32]> {
	if name.is_empty() || name.len() > MAX_FILE_NAME || name.as_bytes().contains(&0) {
		return Err(FsError::InvalidName);
	}
	let mut buf = [0u8; 32];
	buf[0..name.len()].copy_from_slice(name.as_bytes());
	Ok(buf)
}

fn decode_name(buf: &[u8; 32]) -> FsResult<&str> {
	let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
	std::str::from_utf8(&buf[0..end]).map_err(|_| FsError::Corrupted)
}

/// One directory entry: a name and the inode it resolves to.
#[derive(Debug, Clone, Copy)]
struct RawEntry {
	inode: u16,
	name: [u8; 32],
}

impl RawEntry {
	fn encode(&self, buf: &mut [u8]) {
		buf[0..2].copy_from_slice(&self.inode.to_le_bytes());
		buf[2..34].copy_from_slice(&self.name);
	}

	fn decode(buf: &[u8]) -> Self {
		let inode = u16::from_le_bytes(buf[0..2].try_into().unwrap());
		let mut name = [0u8; 32];
		name.copy_from_slice(&buf[2..34]);
		Self { inode, name }
	}
}

/// Computes the number of entries currently stored in a directory, given its
/// `size` and `in_use_blocks` fields. Factored into one place per the design
/// note on how easy the padding accounting is to get wrong.
pub fn entry_count(size: u32, in_use_blocks: u16) -> u32 {
	let padding = 2 * in_use_blocks.saturating_sub(1) as u32;
	(size.saturating_sub(padding)) / ENTRY_SIZE as u32
}

/// The effective number of entries stored in the last used block of a directory
/// of the given `size`.
fn last_block_entry_count(size: u32) -> usize {
	let rem = (size as usize) % BLOCK_SIZE;
	if rem != 0 {
		rem / ENTRY_SIZE
	} else {
		entries_per_block()
	}
}

/// Resolves `name` to the inode it refers to, within directory `dir`.
pub fn find<D: BlockDevice>(dev: &mut D, layout: &Layout, dir: &Inode, name: &str) -> FsResult<u32> {
	if dir.file_type != FileType::Directory {
		return Err(FsError::NotADirectory);
	}
	let target = encode_name(name)?;
	let in_use = dir.in_use_blocks as usize;
	if in_use == 0 {
		return Err(FsError::NotFound);
	}

	for bi in 0..in_use {
		let count = if bi == in_use - 1 {
			last_block_entry_count(dir.size)
		} else {
			entries_per_block()
		};
		let mut block = zeroed_block();
		dev.read_block(dir.direct_blocks[bi] as u32, &mut block)?;
		for bo in 0..count {
			let off = bo * ENTRY_SIZE;
			let entry = RawEntry::decode(&block[off..off + ENTRY_SIZE]);
			if entry.name == target {
				log::trace!("dirent {name:?} found at inode {}", entry.inode);
				return Ok(entry.inode as u32);
			}
		}
	}
	Err(FsError::NotFound)
}

/// Adds an entry named `name` pointing to inode `target` into directory `dir`,
/// persisting the updated inode.
pub fn add<D: BlockDevice>(
	dev: &mut D,
	layout: &Layout,
	dir_idx: u32,
	dir: &mut Inode,
	name: &str,
	target: u32,
) -> FsResult<()> {
	if dir.file_type != FileType::Directory {
		return Err(FsError::NotADirectory);
	}
	let encoded = encode_name(name)?;

	let entries = entry_count(dir.size, dir.in_use_blocks);
	if entries as usize >= max_entries() {
		return Err(FsError::DirectoryFull);
	}

	let epb = entries_per_block() as u32;
	let bi = (entries / epb) as usize;
	let bo = (entries % epb) as usize;

	if bo == 0 {
		let block_no = bitmap::alloc(dev, layout)?;
		dir.direct_blocks[bi] = block_no as u16;
		dir.in_use_blocks += 1;
		if bi != 0 {
			dir.size += 2;
		}
	}

	let mut block = zeroed_block();
	dev.read_block(dir.direct_blocks[bi] as u32, &mut block)?;
	let entry = RawEntry {
		inode: target as u16,
		name: encoded,
	};
	entry.encode(&mut block[bo * ENTRY_SIZE..(bo + 1) * ENTRY_SIZE]);
	dev.write_block(dir.direct_blocks[bi] as u32, &block)?;

	dir.size += ENTRY_SIZE as u32;
	inode::write(dev, layout, dir_idx, dir)?;
	log::trace!("dirent {name:?} added pointing to inode {target} in directory {dir_idx}");
	Ok(())
}

/// Removes the entry named `name` from directory `dir`, persisting the updated
/// inode.
pub fn remove<D: BlockDevice>(
	dev: &mut D,
	layout: &Layout,
	dir_idx: u32,
	dir: &mut Inode,
	name: &str,
) -> FsResult<()> {
	if dir.file_type != FileType::Directory {
		return Err(FsError::NotADirectory);
	}
	let target = encode_name(name)?;
	let in_use = dir.in_use_blocks as usize;

	// Locate the entry to remove.
	let mut found: Option<(usize, usize)> = None;
	'outer: for bi in 0..in_use {
		let count = if bi == in_use - 1 {
			last_block_entry_count(dir.size)
		} else {
			entries_per_block()
		};
		let mut block = zeroed_block();
		dev.read_block(dir.direct_blocks[bi] as u32, &mut block)?;
		for bo in 0..count {
			let off = bo * ENTRY_SIZE;
			let entry = RawEntry::decode(&block[off..off + ENTRY_SIZE]);
			if entry.name == target {
				found = Some((bi, bo));
				break 'outer;
			}
		}
	}
	let (bi, bo) = found.ok_or(FsError::NotFound)?;

	let entries = entry_count(dir.size, dir.in_use_blocks);
	if entries == 1 {
		bitmap::free(dev, layout, dir.direct_blocks[0] as u32)?;
		dir.direct_blocks[0] = 0;
		dir.in_use_blocks = 0;
		dir.size = 0;
		inode::write(dev, layout, dir_idx, dir)?;
		log::trace!("last dirent removed from directory {dir_idx}, directory now empty");
		return Ok(());
	}

	let last_bi = (dir.in_use_blocks - 1) as usize;
	let epb = entries_per_block() as u32;
	let last_bo = ((entries - 1) % epb) as usize;

	// Copy the last entry over the removed slot (a no-op if it IS the last slot).
	let mut last_block = zeroed_block();
	dev.read_block(dir.direct_blocks[last_bi] as u32, &mut last_block)?;
	let last_entry_bytes: [u8; ENTRY_SIZE] = last_block
		[last_bo * ENTRY_SIZE..(last_bo + 1) * ENTRY_SIZE]
		.try_into()
		.unwrap();

	if (bi, bo) != (last_bi, last_bo) {
		let mut block = zeroed_block();
		dev.read_block(dir.direct_blocks[bi] as u32, &mut block)?;
		block[bo * ENTRY_SIZE..(bo + 1) * ENTRY_SIZE].copy_from_slice(&last_entry_bytes);
		dev.write_block(dir.direct_blocks[bi] as u32, &block)?;
	}

	dir.size -= ENTRY_SIZE as u32;

	if last_bo == 0 {
		bitmap::free(dev, layout, dir.direct_blocks[last_bi] as u32)?;
		dir.direct_blocks[last_bi] = 0;
		dir.in_use_blocks -= 1;
		dir.size -= 2;
	}

	inode::write(dev, layout, dir_idx, dir)?;
	log::trace!("dirent removed from directory {dir_idx}");
	Ok(())
}

/// Lists the `(inode, name)` pairs stored in directory `dir`, in on-disk order.
pub fn list<D: BlockDevice>(dev: &mut D, dir: &Inode) -> FsResult<Vec<(u32, String)>> {
	if dir.file_type != FileType::Directory {
		return Err(FsError::NotADirectory);
	}
	let in_use = dir.in_use_blocks as usize;
	let mut out = Vec::new();
	for bi in 0..in_use {
		let count = if bi == in_use - 1 {
			last_block_entry_count(dir.size)
		} else {
			entries_per_block()
		};
		let mut block = zeroed_block();
		dev.read_block(dir.direct_blocks[bi] as u32, &mut block)?;
		for bo in 0..count {
			let off = bo * ENTRY_SIZE;
			let entry = RawEntry::decode(&block[off..off + ENTRY_SIZE]);
			out.push((entry.inode as u32, decode_name(&entry.name)?.to_owned()));
		}
	}
	Ok(out)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::block::MemBlockDevice;
	use crate::inode::{self as inode_mod};

	fn new_dir(dev: &mut MemBlockDevice, layout: &Layout) -> (u32, Inode) {
		let i = inode_mod::alloc(dev, layout).unwrap();
		inode_mod::init(dev, layout, i, FileType::Directory).unwrap();
		(i, inode_mod::read(dev, layout, i).unwrap())
	}

	#[test]
	fn entry_count_accounts_for_padding() {
		assert_eq!(entry_count(0, 0), 0);
		assert_eq!(entry_count(ENTRY_SIZE as u32, 1), 1);
		// Second block adds 2 bytes of padding before its first entry's size.
		let epb = entries_per_block() as u32;
		let size_at_block_boundary = epb * ENTRY_SIZE as u32;
		assert_eq!(entry_count(size_at_block_boundary, 1), epb);
		let size_one_into_second_block = size_at_block_boundary + 2 + ENTRY_SIZE as u32;
		assert_eq!(entry_count(size_one_into_second_block, 2), epb + 1);
	}

	#[test]
	fn add_find_remove_round_trip() {
		let fs_size = 128;
		let mut dev = MemBlockDevice::new(fs_size);
		let layout = Layout::plan(fs_size).unwrap();
		let (dir_idx, mut dir) = new_dir(&mut dev, &layout);

		add(&mut dev, &layout, dir_idx, &mut dir, "a", 10).unwrap();
		add(&mut dev, &layout, dir_idx, &mut dir, "b", 11).unwrap();
		assert_eq!(find(&mut dev, &layout, &dir, "a").unwrap(), 10);
		assert_eq!(find(&mut dev, &layout, &dir, "b").unwrap(), 11);
		assert!(find(&mut dev, &layout, &dir, "c").is_err());

		remove(&mut dev, &layout, dir_idx, &mut dir, "a").unwrap();
		assert!(find(&mut dev, &layout, &dir, "a").is_err());
		assert_eq!(find(&mut dev, &layout, &dir, "b").unwrap(), 11);
	}

	#[test]
	fn remove_last_entry_frees_the_block() {
		let fs_size = 128;
		let mut dev = MemBlockDevice::new(fs_size);
		let layout = Layout::plan(fs_size).unwrap();
		let (dir_idx, mut dir) = new_dir(&mut dev, &layout);
		add(&mut dev, &layout, dir_idx, &mut dir, "only", 5).unwrap();

		remove(&mut dev, &layout, dir_idx, &mut dir, "only").unwrap();
		assert_eq!(dir.size, 0);
		assert_eq!(dir.in_use_blocks, 0);
	}

	#[test]
	fn fills_exactly_to_capacity_then_rejects() {
		let fs_size = 512;
		let mut dev = MemBlockDevice::new(fs_size);
		let layout = Layout::plan(fs_size).unwrap();
		let (dir_idx, mut dir) = new_dir(&mut dev, &layout);

		for i in 0..max_entries() {
			let name = format!("f{i}");
			add(&mut dev, &layout, dir_idx, &mut dir, &name, 1).unwrap();
		}
		assert!(add(&mut dev, &layout, dir_idx, &mut dir, "overflow", 1).is_err());
	}
}
