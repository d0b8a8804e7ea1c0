//! The block-allocation bitmap: one byte per block, nonzero meaning allocated
//! (§4.2). Block numbers below `data_start` are reserved and are never handed out
//! even when their byte happens to be zero.

use crate::block::{zeroed_block, BlockDevice, BLOCK_SIZE};
use crate::error::{FsError, FsResult};
use crate::layout::Layout;

/// Finds and marks the first free data block, returning its block number.
pub fn alloc<D: BlockDevice>(dev: &mut D, layout: &Layout) -> FsResult<u32> {
	for bitmap_block in layout.ba_map_start..(layout.ba_map_start + layout.ba_map_count) {
		let mut block = zeroed_block();
		dev.read_block(bitmap_block, &mut block)?;

		for byte_offset in 0..BLOCK_SIZE {
			let idx = (bitmap_block - layout.ba_map_start) * BLOCK_SIZE as u32 + byte_offset as u32;
			if idx >= layout.fs_size {
				// Past the end of the device: nothing left to scan.
				return Err(FsError::NoFreeBlocks);
			}
			if idx < layout.data_start {
				// Reserved for the superblock/inode table/bitmap itself.
				continue;
			}
			if block[byte_offset] == 0 {
				block[byte_offset] = 1;
				dev.write_block(bitmap_block, &block)?;
				log::debug!("block {idx} allocated");
				return Ok(idx);
			}
		}
	}
	Err(FsError::NoFreeBlocks)
}

/// Releases data block `idx`, zeroing its contents on disk.
///
/// Out-of-range and reserved indices are rejected silently, matching the
/// original's defensive `free`: a caller passing a bogus index (e.g. `0` from an
/// uninitialized `direct_blocks` slot) must not corrupt unrelated state.
pub fn free<D: BlockDevice>(dev: &mut D, layout: &Layout, idx: u32) -> FsResult<()> {
	if idx >= layout.fs_size || idx < layout.data_start {
		return Ok(());
	}

	dev.write_block(idx, &zeroed_block())?;

	let bitmap_block = layout.ba_map_start + idx / BLOCK_SIZE as u32;
	let byte_offset = (idx % BLOCK_SIZE as u32) as usize;
	let mut block = zeroed_block();
	dev.read_block(bitmap_block, &mut block)?;
	block[byte_offset] = 0;
	dev.write_block(bitmap_block, &block)?;
	log::debug!("block {idx} freed");
	Ok(())
}
