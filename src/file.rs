//! The file I/O engine: reads and writes through an inode's direct block table,
//! including hole-filling on seeks past the end of file (§4.5).

use crate::bitmap;
use crate::block::{zeroed_block, BlockDevice, BLOCK_SIZE};
use crate::error::{FsError, FsResult};
use crate::inode::{self, Inode, DATA_BLOCK_NUM};
use crate::layout::Layout;

/// Reads up to `buf.len()` bytes from `inode` starting at `position`.
///
/// Never reads past `inode.size`. Returns the number of bytes actually copied.
pub fn read<D: BlockDevice>(dev: &mut D, inode: &Inode, position: u32, buf: &mut [u8]) -> FsResult<usize> {
	if buf.is_empty() || position >= inode.size {
		return Ok(0);
	}

	let mut written = 0usize;
	let mut pos = position;
	let b = BLOCK_SIZE as u32;

	while written < buf.len() && pos < inode.size {
		let bi = (pos / b) as usize;
		let cursor = (pos % b) as usize;
		let n = (buf.len() - written)
			.min(BLOCK_SIZE - cursor)
			.min((inode.size - pos) as usize);

		let mut block = zeroed_block();
		dev.read_block(inode.direct_blocks[bi] as u32, &mut block)?;
		buf[written..written + n].copy_from_slice(&block[cursor..cursor + n]);

		written += n;
		pos += n as u32;
	}
	Ok(written)
}

/// Writes `buf` into `inode` at `position`, extending the file (and, if
/// `position > size`, filling the gap with zeros) as needed.
///
/// `inode_idx`/`inode` are updated and persisted in place. On an allocation
/// failure while materializing the hole before the payload is written, every
/// block allocated during this call is released and `inode` is left exactly as
/// it was on entry.
pub fn write<D: BlockDevice>(
	dev: &mut D,
	layout: &Layout,
	inode_idx: u32,
	inode: &mut Inode,
	position: u32,
	buf: &[u8],
) -> FsResult<usize> {
	let b = BLOCK_SIZE as u32;
	if !buf.is_empty() && position == inode::max_file_size() {
		return Err(FsError::FileTooLarge);
	}
	if buf.is_empty() {
		return Ok(0);
	}

	if position > inode.size {
		let pre_in_use_blocks = inode.in_use_blocks;
		let pre_direct_blocks = inode.direct_blocks;

		if inode.in_use_blocks > 0 {
			let last_bi = (inode.in_use_blocks - 1) as usize;
			let mut last_block = zeroed_block();
			dev.read_block(inode.direct_blocks[last_bi] as u32, &mut last_block)?;
			let from = (inode.size % b) as usize;
			last_block[from..].fill(0);
			dev.write_block(inode.direct_blocks[last_bi] as u32, &last_block)?;
		}

		let mut allocated = Vec::new();
		let result = (|| -> FsResult<()> {
			while (position / b) as usize >= inode.in_use_blocks as usize {
				let block_no = bitmap::alloc(dev, layout)?;
				allocated.push(block_no);
				inode.direct_blocks[inode.in_use_blocks as usize] = block_no as u16;
				inode.in_use_blocks += 1;
			}
			Ok(())
		})();

		if let Err(e) = result {
			for block_no in allocated {
				bitmap::free(dev, layout, block_no)?;
			}
			inode.in_use_blocks = pre_in_use_blocks;
			inode.direct_blocks = pre_direct_blocks;
			return Err(e);
		}
	}

	let mut written = 0usize;
	let mut pos = position;

	while written < buf.len() && (pos / b) as usize < DATA_BLOCK_NUM {
		let bi = (pos / b) as usize;
		let cursor = (pos % b) as usize;

		if bi == inode.in_use_blocks as usize {
			let block_no = match bitmap::alloc(dev, layout) {
				Ok(block_no) => block_no,
				Err(_) => break,
			};
			inode.direct_blocks[bi] = block_no as u16;
			inode.in_use_blocks += 1;
		}

		let n = (buf.len() - written).min(BLOCK_SIZE - cursor);
		let mut block = zeroed_block();
		dev.read_block(inode.direct_blocks[bi] as u32, &mut block)?;
		block[cursor..cursor + n].copy_from_slice(&buf[written..written + n]);
		dev.write_block(inode.direct_blocks[bi] as u32, &block)?;

		written += n;
		pos += n as u32;
	}

	if pos > inode.size {
		inode.size = pos;
	}
	inode::write(dev, layout, inode_idx, inode)?;
	Ok(written)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::block::MemBlockDevice;
	use crate::inode::FileType;

	fn new_file(dev: &mut MemBlockDevice, layout: &Layout) -> (u32, Inode) {
		let i = inode::alloc(dev, layout).unwrap();
		inode::init(dev, layout, i, FileType::File).unwrap();
		(i, inode::read(dev, layout, i).unwrap())
	}

	#[test]
	fn write_then_read_round_trip() {
		let fs_size = 64;
		let mut dev = MemBlockDevice::new(fs_size);
		let layout = Layout::plan(fs_size).unwrap();
		let (idx, mut file) = new_file(&mut dev, &layout);

		let payload = b"hello, file system";
		let n = write(&mut dev, &layout, idx, &mut file, 0, payload).unwrap();
		assert_eq!(n, payload.len());
		assert_eq!(file.size, payload.len() as u32);

		let mut buf = [0u8; 64];
		let n = read(&mut dev, &file, 0, &mut buf).unwrap();
		assert_eq!(&buf[0..n], payload);
	}

	#[test]
	fn read_never_goes_past_size() {
		let fs_size = 64;
		let mut dev = MemBlockDevice::new(fs_size);
		let layout = Layout::plan(fs_size).unwrap();
		let (idx, mut file) = new_file(&mut dev, &layout);
		write(&mut dev, &layout, idx, &mut file, 0, b"abc").unwrap();

		let mut buf = [0xffu8; 16];
		let n = read(&mut dev, &file, 1, &mut buf).unwrap();
		assert_eq!(n, 2);
		assert_eq!(&buf[0..2], b"bc");
	}

	#[test]
	fn write_past_end_zero_fills_the_hole() {
		let fs_size = 64;
		let mut dev = MemBlockDevice::new(fs_size);
		let layout = Layout::plan(fs_size).unwrap();
		let (idx, mut file) = new_file(&mut dev, &layout);

		write(&mut dev, &layout, idx, &mut file, 0, b"ab").unwrap();
		write(&mut dev, &layout, idx, &mut file, BLOCK_SIZE as u32 + 4, b"xy").unwrap();

		let mut buf = vec![0xffu8; file.size as usize];
		let n = read(&mut dev, &file, 0, &mut buf).unwrap();
		assert_eq!(n, buf.len());
		assert_eq!(&buf[0..2], b"ab");
		assert!(buf[2..BLOCK_SIZE as usize + 4].iter().all(|&b| b == 0));
		assert_eq!(&buf[BLOCK_SIZE as usize + 4..BLOCK_SIZE as usize + 6], b"xy");
	}

	#[test]
	fn write_rejects_payload_at_max_capacity() {
		let fs_size = 512;
		let mut dev = MemBlockDevice::new(fs_size);
		let layout = Layout::plan(fs_size).unwrap();
		let (idx, mut file) = new_file(&mut dev, &layout);

		let max = inode::max_file_size();
		file.size = max;
		file.in_use_blocks = DATA_BLOCK_NUM as u16;
		for (i, b) in file.direct_blocks.iter_mut().enumerate() {
			*b = (layout.data_start as usize + i) as u16;
		}
		inode::write(&mut dev, &layout, idx, &file).unwrap();

		let result = write(&mut dev, &layout, idx, &mut file, max, b"x");
		assert!(matches!(result, Err(FsError::FileTooLarge)));
	}
}
