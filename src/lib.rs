//! A small Unix-like block-based file system over a flat, fixed-size block device.
//!
//! The crate is organized the way the on-disk layout is: a [`superblock`] describing
//! the four regions of the device, a [`bitmap`] tracking free data blocks, an
//! [`inode`] table, a [`dirent`] engine packing directory entries into inode data
//! blocks, and a [`file`] engine doing partial-block reads/writes with hole filling.
//! [`fs::FileSystem`] ties all of it together behind a POSIX-flavored API; it owns
//! the only mutable state in the crate, including the in-memory open-file table from
//! [`descriptor`] and the current working directory.
//!
//! The device itself is abstracted behind [`block::BlockDevice`] so the same code runs
//! against an in-memory buffer in tests and a real file/device in production.

pub mod bitmap;
pub mod block;
pub mod descriptor;
pub mod dirent;
pub mod error;
pub mod file;
pub mod fs;
pub mod inode;
pub mod layout;
pub mod superblock;

pub use block::{BlockDevice, FileBlockDevice, MemBlockDevice, BLOCK_SIZE};
pub use descriptor::Mode;
pub use error::{FsError, FsResult};
pub use fs::{FileSystem, MkfsOptions, Stat};
pub use inode::FileType;
