//! Top-level orchestration: `FileSystem<D>` ties the layout planner, inode
//! manager, bitmap, directory engine, file I/O engine, and open-file table into
//! the public API (§4.7).
//!
//! Unlike the original's process-wide globals, every piece of state (the
//! superblock-derived [`Layout`], the current-working-directory inode, and the
//! open-file table) lives in one owned value — see the redesign note in
//! DESIGN.md.

use std::fmt;

use crate::block::{zeroed_block, BlockDevice};
use crate::descriptor::{Mode, OpenFileTable};
use crate::dirent;
use crate::error::{FsError, FsResult};
use crate::file;
use crate::inode::{self, FileType, ROOT_DIRECTORY};
use crate::layout::Layout;
use crate::superblock::Superblock;

/// A live, mounted file system bound to one block device.
pub struct FileSystem<D: BlockDevice> {
	dev: D,
	layout: Layout,
	cwd: u32,
	table: OpenFileTable,
	label: Option<String>,
}

/// Options controlling [`FileSystem::mkfs`], in the same
/// struct-of-options-with-defaults shape as the teacher's `Ext2Factory`.
///
/// `fs_size` is the only field every caller must set; everything else defaults
/// to `None` and can be layered on with the builder methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MkfsOptions {
	/// The number of blocks the fresh file system should span.
	pub fs_size: u32,
	/// An optional volume label. Not part of the on-disk superblock (which is
	/// a fixed 9-field layout per §6); kept in memory on the resulting
	/// [`FileSystem`] and available via [`FileSystem::label`].
	pub label: Option<String>,
}

impl MkfsOptions {
	/// Creates options for a file system spanning `fs_size` blocks, with no
	/// volume label.
	pub fn new(fs_size: u32) -> Self {
		Self { fs_size, label: None }
	}

	/// Sets the volume label.
	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}
}

/// The information returned by [`FileSystem::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
	pub inode_no: u32,
	pub file_type: FileType,
	pub links: u32,
	pub size: u32,
	pub num_blocks: u16,
}

/// One row of a directory listing, as returned by [`FileSystem::ls`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
	pub name: String,
	pub inode_no: u32,
	pub file_type: FileType,
	pub size: u32,
}

impl fmt::Display for DirEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let type_char = match self.file_type {
			FileType::Directory => 'D',
			FileType::File => 'F',
			FileType::Free => '?',
		};
		write!(
			f,
			"{:<31} {} {:>6} {:>8}",
			self.name, type_char, self.inode_no, self.size
		)
	}
}

impl<D: BlockDevice> FileSystem<D> {
	/// Mounts `dev`: if block 0 carries a valid superblock, adopts its layout;
	/// otherwise falls back to [`Self::mkfs`] over the device's full block count.
	pub fn mount(mut dev: D) -> FsResult<Self> {
		let fs_size = dev.block_count();
		match Superblock::read(&mut dev) {
			Ok(sb) => Ok(Self {
				dev,
				layout: sb.layout,
				cwd: ROOT_DIRECTORY,
				table: OpenFileTable::new(),
				label: None,
			}),
			Err(_) => Self::mkfs(dev, MkfsOptions::new(fs_size)),
		}
	}

	/// Formats `dev` as a fresh file system per `options`: zero-fills the whole
	/// device, writes the superblock, and creates the root directory with `.`
	/// and `..` both pointing to itself.
	///
	/// If either directory insert fails, blocks 0 and 1 are zeroed and the error
	/// is returned, so that a subsequent `mount` takes this path again.
	pub fn mkfs(mut dev: D, options: MkfsOptions) -> FsResult<Self> {
		let fs_size = options.fs_size;
		let layout = Layout::plan(fs_size)?;
		for block_no in 0..fs_size {
			dev.write_block(block_no, &zeroed_block())?;
		}
		Superblock::new(layout).write(&mut dev)?;
		inode::init(&mut dev, &layout, ROOT_DIRECTORY, FileType::Directory)?;

		let mut root = inode::read(&mut dev, &layout, ROOT_DIRECTORY)?;
		let result = dirent::add(&mut dev, &layout, ROOT_DIRECTORY, &mut root, ".", ROOT_DIRECTORY).and_then(
			|_| dirent::add(&mut dev, &layout, ROOT_DIRECTORY, &mut root, "..", ROOT_DIRECTORY),
		);
		if let Err(e) = result {
			dev.write_block(0, &zeroed_block())?;
			dev.write_block(1, &zeroed_block())?;
			return Err(e);
		}

		log::debug!("formatted fresh file system: {fs_size} blocks, {} inodes", layout.max_num_inodes);
		Ok(Self {
			dev,
			layout,
			cwd: ROOT_DIRECTORY,
			table: OpenFileTable::new(),
			label: options.label,
		})
	}

	/// Returns the volume label this file system was formatted with, if any.
	pub fn label(&self) -> Option<&str> {
		self.label.as_deref()
	}

	/// Unmounts this file system, handing the underlying device back to the
	/// caller (e.g. to remount it later, or persist it to disk).
	pub fn into_device(self) -> D {
		self.dev
	}

	fn lookup(&mut self, name: &str) -> FsResult<u32> {
		let cwd = inode::read(&mut self.dev, &self.layout, self.cwd)?;
		dirent::find(&mut self.dev, &self.layout, &cwd, name)
	}

	/// Opens `name` in the current directory, creating it as a new file if it
	/// does not exist and `mode` is not [`Mode::ReadOnly`].
	pub fn open(&mut self, name: &str, mode: Mode) -> FsResult<u32> {
		match self.lookup(name) {
			Ok(inode_idx) => {
				let mut inode = inode::read(&mut self.dev, &self.layout, inode_idx)?;
				if inode.file_type == FileType::Directory && mode != Mode::ReadOnly {
					log::warn!("open {name:?} rejected: directory opened in a writable mode");
					return Err(FsError::IsADirectory);
				}
				let fd = self.table.open(inode_idx, mode)?;
				inode.fd_count += 1;
				inode::write(&mut self.dev, &self.layout, inode_idx, &inode)?;
				Ok(fd)
			}
			Err(FsError::NotFound) => {
				if mode == Mode::ReadOnly {
					return Err(FsError::NotFound);
				}

				let inode_idx = inode::alloc(&mut self.dev, &self.layout)?;
				inode::init(&mut self.dev, &self.layout, inode_idx, FileType::File)?;

				let fd = match self.table.open(inode_idx, mode) {
					Ok(fd) => fd,
					Err(e) => {
						inode::free(&mut self.dev, &self.layout, inode_idx)?;
						return Err(e);
					}
				};

				let mut inode = inode::read(&mut self.dev, &self.layout, inode_idx)?;
				inode.fd_count += 1;
				inode::write(&mut self.dev, &self.layout, inode_idx, &inode)?;

				let mut cwd = inode::read(&mut self.dev, &self.layout, self.cwd)?;
				if let Err(e) = dirent::add(&mut self.dev, &self.layout, self.cwd, &mut cwd, name, inode_idx) {
					self.table.close(fd).ok();
					inode::free(&mut self.dev, &self.layout, inode_idx)?;
					return Err(e);
				}
				Ok(fd)
			}
			Err(e) => Err(e),
		}
	}

	/// Closes descriptor `fd`, reclaiming its inode if it has no remaining
	/// links and no other open descriptor.
	pub fn close(&mut self, fd: u32) -> FsResult<()> {
		let (inode_idx, ..) = self.table.get(fd)?;
		let mut inode = inode::read(&mut self.dev, &self.layout, inode_idx)?;
		inode.fd_count = inode.fd_count.saturating_sub(1);
		if inode.fd_count == 0 && inode.links == 0 {
			inode::free(&mut self.dev, &self.layout, inode_idx)?;
		} else {
			inode::write(&mut self.dev, &self.layout, inode_idx, &inode)?;
		}
		self.table.close(fd)
	}

	/// Reads up to `buf.len()` bytes from `fd` at its current position,
	/// advancing the position by the number of bytes returned.
	pub fn read(&mut self, fd: u32, buf: &mut [u8]) -> FsResult<usize> {
		let (inode_idx, mode, position) = self.table.get(fd)?;
		if !mode.readable() {
			return Err(FsError::InvalidArgument);
		}
		let inode = inode::read(&mut self.dev, &self.layout, inode_idx)?;
		let n = file::read(&mut self.dev, &inode, position, buf)?;
		self.table.set_position(fd, position + n as u32)?;
		Ok(n)
	}

	/// Writes `buf` to `fd` at its current position, advancing the position by
	/// the number of bytes written.
	pub fn write(&mut self, fd: u32, buf: &[u8]) -> FsResult<usize> {
		let (inode_idx, mode, position) = self.table.get(fd)?;
		if !mode.writable() {
			return Err(FsError::InvalidArgument);
		}
		let mut inode = inode::read(&mut self.dev, &self.layout, inode_idx)?;
		let n = file::write(&mut self.dev, &self.layout, inode_idx, &mut inode, position, buf)?;
		self.table.set_position(fd, position + n as u32)?;
		Ok(n)
	}

	/// Sets `fd`'s position to `offset` unconditionally; seeks past the end of
	/// file only materialize data on a subsequent write.
	pub fn lseek(&mut self, fd: u32, offset: u32) -> FsResult<u32> {
		self.table.get(fd)?;
		self.table.set_position(fd, offset)?;
		Ok(offset)
	}

	/// Creates a new, empty subdirectory `name` in the current directory, with
	/// `.` and `..` entries. Rolls back every allocation on failure.
	pub fn mkdir(&mut self, name: &str) -> FsResult<()> {
		if self.lookup(name).is_ok() {
			return Err(FsError::AlreadyExists);
		}

		let inode_idx = inode::alloc(&mut self.dev, &self.layout)?;
		inode::init(&mut self.dev, &self.layout, inode_idx, FileType::Directory)?;

		let mut cwd = inode::read(&mut self.dev, &self.layout, self.cwd)?;
		if let Err(e) = dirent::add(&mut self.dev, &self.layout, self.cwd, &mut cwd, name, inode_idx) {
			inode::free(&mut self.dev, &self.layout, inode_idx)?;
			return Err(e);
		}

		let mut new_dir = inode::read(&mut self.dev, &self.layout, inode_idx)?;
		let result = dirent::add(&mut self.dev, &self.layout, inode_idx, &mut new_dir, ".", inode_idx)
			.and_then(|_| dirent::add(&mut self.dev, &self.layout, inode_idx, &mut new_dir, "..", self.cwd));
		if let Err(e) = result {
			dirent::remove(&mut self.dev, &self.layout, self.cwd, &mut cwd, name)?;
			inode::free(&mut self.dev, &self.layout, inode_idx)?;
			return Err(e);
		}
		Ok(())
	}

	/// Removes the empty subdirectory `name` from the current directory.
	/// Rejects `.`/`..` and any directory whose only entries are not exactly
	/// `.` and `..`.
	pub fn rmdir(&mut self, name: &str) -> FsResult<()> {
		if name == "." || name == ".." {
			return Err(FsError::InvalidArgument);
		}
		let inode_idx = self.lookup(name)?;
		let mut target = inode::read(&mut self.dev, &self.layout, inode_idx)?;
		if target.file_type != FileType::Directory {
			return Err(FsError::NotADirectory);
		}
		if dirent::entry_count(target.size, target.in_use_blocks) != 2 {
			log::warn!("rmdir {name:?} rejected: directory not empty");
			return Err(FsError::DirectoryNotEmpty);
		}

		let mut cwd = inode::read(&mut self.dev, &self.layout, self.cwd)?;
		dirent::remove(&mut self.dev, &self.layout, self.cwd, &mut cwd, name)?;

		target.links = target.links.saturating_sub(1);
		if target.links == 0 {
			inode::free(&mut self.dev, &self.layout, inode_idx)?;
		} else {
			inode::write(&mut self.dev, &self.layout, inode_idx, &target)?;
		}
		Ok(())
	}

	/// Changes the current directory to `name`, which must exist and be a
	/// directory.
	pub fn cd(&mut self, name: &str) -> FsResult<()> {
		let inode_idx = self.lookup(name)?;
		let inode = inode::read(&mut self.dev, &self.layout, inode_idx)?;
		if inode.file_type != FileType::Directory {
			return Err(FsError::NotADirectory);
		}
		self.cwd = inode_idx;
		Ok(())
	}

	/// Adds a second name `new` for the file `old`, incrementing its link count.
	pub fn link(&mut self, old: &str, new: &str) -> FsResult<()> {
		let old_idx = self.lookup(old)?;
		let mut old_inode = inode::read(&mut self.dev, &self.layout, old_idx)?;
		if old_inode.file_type == FileType::Directory {
			return Err(FsError::IsADirectory);
		}
		if self.lookup(new).is_ok() {
			return Err(FsError::AlreadyExists);
		}

		let mut cwd = inode::read(&mut self.dev, &self.layout, self.cwd)?;
		dirent::add(&mut self.dev, &self.layout, self.cwd, &mut cwd, new, old_idx)?;
		old_inode.links += 1;
		inode::write(&mut self.dev, &self.layout, old_idx, &old_inode)
	}

	/// Removes `name` from the current directory, freeing its inode once no
	/// links and no open descriptors remain.
	pub fn unlink(&mut self, name: &str) -> FsResult<()> {
		let inode_idx = self.lookup(name)?;
		let mut inode = inode::read(&mut self.dev, &self.layout, inode_idx)?;
		if inode.file_type == FileType::Directory {
			return Err(FsError::IsADirectory);
		}

		inode.links = inode.links.saturating_sub(1);
		if inode.links == 0 && inode.fd_count == 0 {
			inode::free(&mut self.dev, &self.layout, inode_idx)?;
		} else {
			inode::write(&mut self.dev, &self.layout, inode_idx, &inode)?;
		}

		let mut cwd = inode::read(&mut self.dev, &self.layout, self.cwd)?;
		dirent::remove(&mut self.dev, &self.layout, self.cwd, &mut cwd, name)
	}

	/// Returns metadata for `name` in the current directory.
	pub fn stat(&mut self, name: &str) -> FsResult<Stat> {
		let inode_idx = self.lookup(name)?;
		let inode = inode::read(&mut self.dev, &self.layout, inode_idx)?;
		Ok(Stat {
			inode_no: inode_idx,
			file_type: inode.file_type,
			links: inode.links,
			size: inode.size,
			num_blocks: inode.in_use_blocks,
		})
	}

	/// Lists the entries of the current directory in on-disk order.
	pub fn ls(&mut self) -> FsResult<Vec<DirEntry>> {
		let cwd = inode::read(&mut self.dev, &self.layout, self.cwd)?;
		let raw = dirent::list(&mut self.dev, &cwd)?;
		let mut out = Vec::with_capacity(raw.len());
		for (inode_idx, name) in raw {
			let inode = inode::read(&mut self.dev, &self.layout, inode_idx)?;
			out.push(DirEntry {
				name,
				inode_no: inode_idx,
				file_type: inode.file_type,
				size: inode.size,
			});
		}
		Ok(out)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::block::MemBlockDevice;

	fn fresh(fs_size: u32) -> FileSystem<MemBlockDevice> {
		FileSystem::mkfs(MemBlockDevice::new(fs_size), MkfsOptions::new(fs_size)).unwrap()
	}

	#[test]
	fn fresh_mkfs_root_has_dot_and_dotdot() {
		let mut fs = fresh(64);
		let entries = fs.ls().unwrap();
		assert_eq!(entries.len(), 2);
		assert!(entries.iter().all(|e| e.file_type == FileType::Directory && e.inode_no == 0));
		assert_eq!(entries[0].name, ".");
		assert_eq!(entries[1].name, "..");
	}

	#[test]
	fn write_close_reopen_read_round_trip() {
		let mut fs = fresh(64);
		let fd = fs.open("x", Mode::ReadWrite).unwrap();
		fs.write(fd, b"hello").unwrap();
		fs.close(fd).unwrap();

		let fd = fs.open("x", Mode::ReadOnly).unwrap();
		let mut buf = [0u8; 5];
		let n = fs.read(fd, &mut buf).unwrap();
		assert_eq!(n, 5);
		assert_eq!(&buf, b"hello");
	}

	#[test]
	fn lseek_past_end_then_write_zero_fills() {
		let mut fs = fresh(64);
		let fd = fs.open("x", Mode::ReadWrite).unwrap();
		fs.lseek(fd, 1000).unwrap();
		fs.write(fd, b"A").unwrap();
		fs.lseek(fd, 0).unwrap();

		let mut buf = [0u8; 1001];
		let n = fs.read(fd, &mut buf).unwrap();
		assert_eq!(n, 1001);
		assert!(buf[0..1000].iter().all(|&b| b == 0));
		assert_eq!(buf[1000], b'A');
	}

	#[test]
	fn rmdir_rejects_non_empty_then_succeeds_once_emptied() {
		let mut fs = fresh(256);
		fs.mkdir("d").unwrap();
		fs.cd("d").unwrap();
		fs.mkdir("e").unwrap();
		fs.cd("..").unwrap();
		assert!(matches!(fs.rmdir("d"), Err(FsError::DirectoryNotEmpty)));

		fs.cd("d").unwrap();
		fs.rmdir("e").unwrap();
		fs.cd("..").unwrap();
		fs.rmdir("d").unwrap();
		assert!(fs.stat("d").is_err());
	}

	#[test]
	fn write_beyond_capacity_fails_without_growing_size() {
		let mut fs = fresh(512);
		let fd = fs.open("f", Mode::ReadWrite).unwrap();
		let payload = vec![b'a'; inode::max_file_size() as usize];
		fs.write(fd, &payload).unwrap();
		assert!(matches!(fs.write(fd, b"x"), Err(FsError::FileTooLarge)));
		assert_eq!(fs.stat("f").unwrap().size, inode::max_file_size());
	}

	#[test]
	fn link_then_unlink_original_keeps_data_readable() {
		let mut fs = fresh(64);
		let fd = fs.open("f", Mode::ReadWrite).unwrap();
		fs.write(fd, b"payload").unwrap();
		fs.close(fd).unwrap();

		fs.link("f", "g").unwrap();
		fs.unlink("f").unwrap();

		let fd = fs.open("g", Mode::ReadOnly).unwrap();
		let mut buf = [0u8; 7];
		fs.read(fd, &mut buf).unwrap();
		assert_eq!(&buf, b"payload");
		assert_eq!(fs.stat("g").unwrap().links, 1);
	}

	#[test]
	fn mount_on_blank_device_falls_back_to_mkfs() {
		let dev = MemBlockDevice::new(64);
		let mut fs = FileSystem::mount(dev).unwrap();
		assert_eq!(fs.ls().unwrap().len(), 2);
	}
}
