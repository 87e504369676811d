// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// How a named resource is opened.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OpenMode {
    /// Existing resource, read-only.
    Read,

    /// Existing resource, read and write, no truncation.
    ReadWrite,

    /// Create (or truncate) the resource for writing and reading back.
    Create,
}

/// An open file-like resource.
///
/// Closing is dropping. Short reads are legal; short writes are surfaced
/// to the caller, which owns the retry policy.
pub trait VfsFile: Send {
    /// Reads up to `buf.len()` bytes, returning the count. 0 means EOF.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Writes up to `buf.len()` bytes, returning the count.
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>;

    /// Repositions the resource, returning the absolute offset.
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64>;

    /// Current size of the resource in bytes.
    fn size(&mut self) -> std::io::Result<u64>;

    /// Flushes buffered data down to the storage device.
    fn sync(&mut self) -> std::io::Result<()>;
}

/// The file-like capability the engine is parameterised over.
///
/// Filenames cross this boundary as UTF-8; decoding legacy narrow input
/// into UTF-8 is the adapter's concern (see [`crate::CodePage`]).
pub trait Vfs: Send + Sync {
    /// Opens `name` in the given mode.
    fn open(&self, name: &str, mode: OpenMode) -> std::io::Result<Box<dyn VfsFile>>;

    /// Whether `name` exists. Absence is not an error.
    fn exists(&self, name: &str) -> bool;

    /// Removes `name`.
    fn remove(&self, name: &str) -> std::io::Result<()>;

    /// Replaces the contents of `name` with `content`.
    ///
    /// Implementations should leave the previous contents untouched when
    /// the replacement fails partway. The default implementation is a
    /// plain create-and-write; [`OsVfs`] upgrades this to an atomic
    /// temp-file rename.
    fn rewrite_atomic(&self, name: &str, content: &[u8]) -> std::io::Result<()> {
        let mut file = self.open(name, OpenMode::Create)?;
        let mut written = 0;

        while written < content.len() {
            let n = file.write(&content[written..])?;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero));
            }
            written += n;
        }

        file.sync()
    }

    /// Flushes the directory containing `name`, where the platform
    /// supports it. Default: no-op.
    fn sync_parent_directory(&self, name: &str) -> std::io::Result<()> {
        let _ = name;
        Ok(())
    }
}

impl VfsFile for File {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Read::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Write::write(self, buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        Seek::seek(self, pos)
    }

    fn size(&mut self) -> std::io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn sync(&mut self) -> std::io::Result<()> {
        self.sync_all()
    }
}

/// The `std::fs` adapter.
#[derive(Copy, Clone, Debug, Default)]
pub struct OsVfs;

impl Vfs for OsVfs {
    fn open(&self, name: &str, mode: OpenMode) -> std::io::Result<Box<dyn VfsFile>> {
        log::trace!("Opening {name:?} ({mode:?})");

        let file = match mode {
            OpenMode::Read => OpenOptions::new().read(true).open(name)?,
            OpenMode::ReadWrite => OpenOptions::new().read(true).write(true).open(name)?,
            OpenMode::Create => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(name)?,
        };

        Ok(Box::new(file))
    }

    fn exists(&self, name: &str) -> bool {
        Path::new(name).exists()
    }

    fn remove(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_file(name)
    }

    fn rewrite_atomic(&self, name: &str, content: &[u8]) -> std::io::Result<()> {
        crate::file::rewrite_atomic(name, content)
    }

    fn sync_parent_directory(&self, name: &str) -> std::io::Result<()> {
        crate::file::sync_parent_directory(name)
    }
}
