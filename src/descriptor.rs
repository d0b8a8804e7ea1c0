//! The in-memory open-file table (§4.6). Never persisted: it is fresh on every
//! [`crate::FileSystem::mount`]/[`crate::FileSystem::mkfs`].

use crate::error::{FsError, FsResult};

/// The maximum number of descriptors that may be open at once.
pub const MAX_FILE_DESCRIPTORS: usize = 256;

/// The access mode a descriptor was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	ReadOnly,
	WriteOnly,
	ReadWrite,
}

impl Mode {
	pub(crate) fn readable(self) -> bool {
		matches!(self, Mode::ReadOnly | Mode::ReadWrite)
	}

	pub(crate) fn writable(self) -> bool {
		matches!(self, Mode::WriteOnly | Mode::ReadWrite)
	}
}

#[derive(Debug, Clone, Copy)]
struct Slot {
	mode: Mode,
	inode: u32,
	position: u32,
}

/// A table of open-file descriptors, indexed by small integers.
#[derive(Default)]
pub struct OpenFileTable {
	slots: Vec<Option<Slot>>,
}

impl OpenFileTable {
	/// Creates a fresh, empty table.
	pub fn new() -> Self {
		Self {
			slots: Vec::new(),
		}
	}

	/// Opens a descriptor for `inode` in the given `mode`, returning its index.
	pub fn open(&mut self, inode: u32, mode: Mode) -> FsResult<u32> {
		let slot = Slot {
			mode,
			inode,
			position: 0,
		};
		if let Some(i) = self.slots.iter().position(|s| s.is_none()) {
			self.slots[i] = Some(slot);
			return Ok(i as u32);
		}
		if self.slots.len() >= MAX_FILE_DESCRIPTORS {
			return Err(FsError::TooManyOpenFiles);
		}
		self.slots.push(Some(slot));
		Ok((self.slots.len() - 1) as u32)
	}

	/// Closes descriptor `fd`, freeing its slot for reuse.
	pub fn close(&mut self, fd: u32) -> FsResult<()> {
		let slot = self.slot_mut(fd)?;
		*slot = None;
		Ok(())
	}

	/// Returns the inode, mode, and current position of descriptor `fd`.
	pub fn get(&self, fd: u32) -> FsResult<(u32, Mode, u32)> {
		let slot = self.slots.get(fd as usize).and_then(|s| *s).ok_or(FsError::BadDescriptor)?;
		Ok((slot.inode, slot.mode, slot.position))
	}

	/// Sets the position of descriptor `fd`.
	pub fn set_position(&mut self, fd: u32, position: u32) -> FsResult<()> {
		self.slot_mut(fd)?.as_mut().unwrap().position = position;
		Ok(())
	}

	fn slot_mut(&mut self, fd: u32) -> FsResult<&mut Option<Slot>> {
		let slot = self.slots.get_mut(fd as usize).ok_or(FsError::BadDescriptor)?;
		if slot.is_none() {
			return Err(FsError::BadDescriptor);
		}
		Ok(slot)
	}
}
