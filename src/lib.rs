// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A storage-media RAW image engine.
//!
//! Presents a potentially segmented raw image (a disk or partition dumped
//! to one or more flat files, e.g. `image.raw`, `image.raw.001`, ...) as a
//! single logical byte-addressable medium with random-access read and
//! sequential-write semantics. A text sidecar (the *information file*)
//! records user-supplied metadata and integrity hashes, so that a raw
//! image, which by itself carries no header, can still be described.
//!
//! Segment files are literal raw bytes: no header, no footer, no
//! checksum. The concatenation of all segments in order *is* the medium.
//!
//! ```no_run
//! # fn main() -> smraw::Result<()> {
//! use smraw::{AccessMode, Handle};
//!
//! // enumerate the segment files of an existing image
//! let names = smraw::glob("image.raw")?;
//!
//! let mut handle = Handle::new();
//! handle.open(&names, AccessMode::Read)?;
//!
//! let mut buf = vec![0u8; 4096];
//! let n = handle.read_at(&mut buf, 0)?;
//! # let _ = n;
//! handle.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! Writing splits the data into capped segments automatically:
//!
//! ```no_run
//! # fn main() -> smraw::Result<()> {
//! use smraw::{AccessMode, Handle};
//!
//! let mut handle = Handle::new();
//! handle.set_maximum_segment_size(2 * 1_024 * 1_024 * 1_024)?;
//! handle.open(&["evidence"], AccessMode::Write)?;
//!
//! handle.write(b"...")?; // -> evidence.001, evidence.002, ...
//! handle.set_media_value("case_number", "CASE-42")?;
//! handle.close()?; // emits evidence.raw.info
//! # Ok(())
//! # }
//! ```
//!
//! All operations on one handle are synchronous and must be serialised by
//! the caller; the only cross-thread facility is the cooperative
//! [`AbortSignal`]. Different handles share no state.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod codepage;
mod descriptor_table;
mod error;
#[doc(hidden)]
pub mod file;
mod glob;
mod handle;
mod info_file;
mod segment;
pub mod vfs;

pub use codepage::CodePage;
pub use descriptor_table::DescriptorTable;
pub use error::{Error, ErrorKind, MalformedKind, Result};
pub use glob::{glob, glob_with};
pub use handle::{AbortSignal, AccessMode, Handle};
pub use info_file::{
    InformationFile, INFORMATION_VALUES_SECTION, INTEGRITY_HASH_VALUES_SECTION,
};
pub use segment::{Segment, SegmentTable};
