// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::codepage::CodePage;
use crate::descriptor_table::DEFAULT_CAPACITY;
use crate::glob::{self, Scheme};
use crate::info_file::{
    InformationFile, INFORMATION_VALUES_SECTION, INTEGRITY_HASH_VALUES_SECTION,
};
use crate::segment::SegmentTable;
use crate::vfs::{OpenMode, OsVfs, Vfs};
use crate::{Error, ErrorKind, Result};
use std::io::SeekFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How a handle accesses the image.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AccessMode {
    /// Existing image, read-only.
    Read,

    /// New image, sequential write with automatic segment rollover.
    Write,

    /// Existing image, random-access read and in-place overwrite.
    ReadWrite,
}

impl AccessMode {
    fn readable(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    fn writable(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }

    fn open_mode(self) -> OpenMode {
        match self {
            Self::Read => OpenMode::Read,
            Self::Write | Self::ReadWrite => OpenMode::ReadWrite,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Configured,
    Open,
    Closed,
}

/// Cooperative cancellation switch for one handle.
///
/// Cloneable and settable from any thread; I/O loops observe it at every
/// segment crossing and after every capability call. Once signalled it
/// stays signalled until the handle is closed.
#[derive(Clone, Debug)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    /// Raises the abort flag.
    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the flag has been raised.
    #[must_use]
    pub fn is_signalled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A segmented raw storage-media image, presented as one logical
/// byte-addressable medium.
///
/// Lifecycle: created, configured, opened against segment filenames, used
/// (read/write/seek), closed. Closing a write session flushes the segment
/// files and emits the sidecar information file.
///
/// ```no_run
/// # fn main() -> smraw::Result<()> {
/// let names = smraw::glob("image.raw")?;
///
/// let mut handle = smraw::Handle::new();
/// handle.open(&names, smraw::AccessMode::Read)?;
///
/// let mut buf = vec![0u8; 512];
/// let n = handle.read(&mut buf)?;
/// # let _ = n;
/// handle.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Handle {
    vfs: Arc<dyn Vfs>,
    state: State,
    mode: AccessMode,

    codepage: CodePage,
    maximum_segment_size: u64,
    declared_media_size: u64,
    pool_capacity: usize,
    lenient_information: bool,
    information_filename: Option<String>,

    offset: u64,
    table: Option<SegmentTable>,
    scheme: Option<Scheme>,
    info: InformationFile,

    abort: Arc<AtomicBool>,
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl Handle {
    /// Creates an unopened handle over the OS filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::with_vfs(Arc::new(OsVfs))
    }

    /// Creates an unopened handle over a custom file-like capability.
    #[must_use]
    pub fn with_vfs(vfs: Arc<dyn Vfs>) -> Self {
        Self {
            vfs,
            state: State::Configured,
            mode: AccessMode::Read,
            codepage: CodePage::default(),
            maximum_segment_size: 0,
            declared_media_size: 0,
            pool_capacity: DEFAULT_CAPACITY,
            lenient_information: false,
            information_filename: None,
            offset: 0,
            table: None,
            scheme: None,
            info: InformationFile::new(),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    // ===== configuration ====================================================

    fn ensure_configured(&self) -> Result<()> {
        if self.state == State::Configured {
            Ok(())
        } else {
            Err(Error::invalid_state("handle is already open"))
        }
    }

    /// Sets the code page used when decoding non-UTF filename input.
    pub fn set_codepage(&mut self, codepage: CodePage) -> Result<()> {
        self.ensure_configured()?;
        self.codepage = codepage;
        Ok(())
    }

    /// Sets the per-segment maximum size in bytes. 0 means no cap: all
    /// data goes into a single segment.
    pub fn set_maximum_segment_size(&mut self, size: u64) -> Result<()> {
        self.ensure_configured()?;
        self.maximum_segment_size = size;
        Ok(())
    }

    /// Declares the expected media size of a write session.
    ///
    /// Advisory; the medium grows with what is actually written. Fails
    /// with `InvalidState` once the handle is open (and thereby always
    /// before the first write).
    pub fn set_media_size(&mut self, size: u64) -> Result<()> {
        self.ensure_configured()?;
        self.declared_media_size = size;
        Ok(())
    }

    /// Overrides the sidecar information filename.
    pub fn set_information_filename(&mut self, name: &str) -> Result<()> {
        self.ensure_configured()?;

        if name.is_empty() {
            return Err(Error::invalid_argument("empty information filename"));
        }

        self.information_filename = Some(name.to_string());
        Ok(())
    }

    /// Sets the number of segment file handles kept open at once.
    pub fn set_maximum_open_handles(&mut self, count: usize) -> Result<()> {
        self.ensure_configured()?;

        if count == 0 {
            return Err(Error::invalid_argument("at least one open handle is required"));
        }

        self.pool_capacity = count;
        Ok(())
    }

    /// Tolerates duplicate keys when parsing an existing information file,
    /// keeping the last value.
    pub fn set_lenient_information(&mut self, lenient: bool) -> Result<()> {
        self.ensure_configured()?;
        self.lenient_information = lenient;
        Ok(())
    }

    // ===== lifecycle ========================================================

    /// Opens the handle against an ordered list of segment filenames.
    ///
    /// In read and read-write mode the list is taken literally in the
    /// order given (use [`crate::glob`] to enumerate it). In write mode
    /// exactly one name is expected: the basename segment names are
    /// synthesised from.
    pub fn open<S: AsRef<str>>(&mut self, filenames: &[S], mode: AccessMode) -> Result<()> {
        self.ensure_configured()
            .map_err(|e| e.during("open"))?;

        if filenames.is_empty() {
            return Err(Error::invalid_argument("no filenames").during("open"));
        }

        let opened = match mode {
            AccessMode::Read | AccessMode::ReadWrite => self.open_existing(filenames, mode),
            AccessMode::Write => self.open_for_write(filenames),
        };

        if let Err(e) = opened {
            // a failed open leaves only close legal
            self.state = State::Closed;
            return Err(e.during("open"));
        }

        self.mode = mode;
        self.state = State::Open;
        self.offset = 0;

        log::debug!(
            "Opened {:?} image: {} segments, {} bytes",
            mode,
            self.segment_count(),
            self.media_size(),
        );

        Ok(())
    }

    fn open_existing<S: AsRef<str>>(&mut self, filenames: &[S], mode: AccessMode) -> Result<()> {
        let names: Vec<String> = filenames
            .iter()
            .map(|n| n.as_ref().to_string())
            .collect();

        let table = SegmentTable::open(
            self.vfs.as_ref(),
            &names,
            mode.open_mode(),
            self.maximum_segment_size,
            self.pool_capacity,
        )?;

        let scheme = resolve_scheme(&names);
        let info_name = self
            .information_filename
            .clone()
            .unwrap_or_else(|| crate::file::information_filename_for(scheme.base()));

        if self.vfs.exists(&info_name) {
            self.info =
                InformationFile::read_from(self.vfs.as_ref(), &info_name, self.lenient_information)?;
        }

        self.declared_media_size = 0;
        self.information_filename = Some(info_name);
        self.scheme = Some(scheme);
        self.table = Some(table);

        Ok(())
    }

    fn open_for_write<S: AsRef<str>>(&mut self, filenames: &[S]) -> Result<()> {
        if filenames.len() != 1 {
            return Err(Error::invalid_argument(
                "write mode expects a single basename",
            ));
        }

        let basename = filenames[0].as_ref();
        if basename.is_empty() {
            return Err(Error::invalid_argument("empty basename"));
        }

        let scheme = Scheme::for_write(basename, self.maximum_segment_size > 0);

        #[allow(clippy::expect_used)]
        let first = scheme
            .segment_name(0)
            .expect("write scheme has a first segment");

        if self.vfs.exists(&first) {
            let mut existing = self
                .vfs
                .open(&first, OpenMode::Read)
                .map_err(|e| Error::from(e).during("segment open"))?;

            if existing.size().map_err(Error::from)? > 0 {
                return Err(Error::already_exists(first));
            }
        }

        let file = self
            .vfs
            .open(&first, OpenMode::Create)
            .map_err(|e| Error::from(e).during("segment open"))?;

        let mut table = SegmentTable::new(self.pool_capacity);
        table.append(first.clone(), file);

        if let Err(e) = self.vfs.sync_parent_directory(&first) {
            // do not leave a stray empty segment behind
            table.close();
            if let Err(e) = self.vfs.remove(&first) {
                log::warn!("Unable to remove segment {first:?}: {e}");
            }
            return Err(Error::from(e));
        }

        let info_name = self
            .information_filename
            .clone()
            .unwrap_or_else(|| crate::file::information_filename_for(basename));

        self.information_filename = Some(info_name);
        self.scheme = Some(scheme);
        self.table = Some(table);

        Ok(())
    }

    /// Closes the handle.
    ///
    /// In write modes this syncs the segment files and emits the sidecar
    /// information file (if any values were set) via an atomic replace.
    /// Idempotent: a second close succeeds without performing I/O.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            State::Closed => return Ok(()),
            State::Configured => {
                self.state = State::Closed;
                return Ok(());
            }
            State::Open => {}
        }

        let mut first_error: Option<Error> = None;

        if self.mode.writable() {
            if let Some(table) = &mut self.table {
                if let Err(e) = table.sync_open() {
                    first_error = Some(e.during("close"));
                }
            }

            if let (Some(scheme), None) = (&self.scheme, &first_error) {
                if let Some(first) = scheme.segment_name(0) {
                    if let Err(e) = self.vfs.sync_parent_directory(&first) {
                        first_error = Some(Error::from(e).during("close"));
                    }
                }
            }

            if !self.info.is_empty() && first_error.is_none() {
                if let Some(name) = &self.information_filename {
                    if let Err(e) = self.info.write_to(self.vfs.as_ref(), name) {
                        first_error = Some(e.during("close"));
                    }
                }
            }
        }

        if let Some(table) = &mut self.table {
            table.close();
        }

        self.state = State::Closed;
        log::debug!("Closed handle ({} bytes)", self.media_size());

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ===== accessors ========================================================

    fn ensure_open(&self) -> Result<()> {
        if self.state == State::Open {
            Ok(())
        } else {
            Err(Error::invalid_state("handle is not open"))
        }
    }

    fn ensure_readable(&self) -> Result<()> {
        if self.mode.readable() {
            Ok(())
        } else {
            Err(Error::unsupported("handle is write-only"))
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.mode.writable() {
            Ok(())
        } else {
            Err(Error::unsupported("handle is read-only"))
        }
    }

    fn check_abort(&self) -> Result<()> {
        if self.abort.load(Ordering::Acquire) {
            Err(Error::cancelled())
        } else {
            Ok(())
        }
    }

    /// The logical cursor position.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The total logical byte length of the image: the declared media
    /// size, or the materialised size, whichever is larger.
    #[must_use]
    pub fn media_size(&self) -> u64 {
        let materialised = self.table.as_ref().map_or(0, SegmentTable::total_size);
        self.declared_media_size.max(materialised)
    }

    /// Number of segments currently backing the image.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.table.as_ref().map_or(0, SegmentTable::len)
    }

    /// The filename of segment `index`.
    #[must_use]
    pub fn segment_filename(&self, index: usize) -> Option<&str> {
        self.table
            .as_ref()
            .and_then(|t| t.get(index))
            .map(|s| s.filename.as_str())
    }

    /// The image basename (the first segment name with the naming-scheme
    /// suffix stripped).
    #[must_use]
    pub fn basename(&self) -> Option<&str> {
        self.scheme.as_ref().map(Scheme::base)
    }

    /// The configured per-segment maximum size. 0 means no cap.
    #[must_use]
    pub fn maximum_segment_size(&self) -> u64 {
        self.maximum_segment_size
    }

    /// The configured code page.
    #[must_use]
    pub fn codepage(&self) -> CodePage {
        self.codepage
    }

    /// A cloneable abort switch for this handle.
    #[must_use]
    pub fn abort_signal(&self) -> AbortSignal {
        AbortSignal(self.abort.clone())
    }

    /// Raises the abort flag, causing in-flight and subsequent operations
    /// to return `Cancelled` until the handle is closed.
    pub fn signal_abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    // ===== information values ===============================================

    /// The in-memory information file.
    #[must_use]
    pub fn information(&self) -> &InformationFile {
        &self.info
    }

    /// Sets `section.key` in the sidecar. Requires an open, writable
    /// handle; the sidecar reaches disk at close.
    pub fn set_value(&mut self, section: &str, key: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        self.ensure_writable()?;
        self.info.set_value(section, key, value)
    }

    /// The sidecar value of `section.key`, if present.
    #[must_use]
    pub fn value(&self, section: &str, key: &str) -> Option<&str> {
        self.info.value(section, key)
    }

    /// Sets a media description value (e.g. `case_number`, `description`,
    /// `examiner_name`).
    pub fn set_media_value(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_value(INFORMATION_VALUES_SECTION, key, value)
    }

    /// A media description value, if present.
    #[must_use]
    pub fn media_value(&self, key: &str) -> Option<&str> {
        self.value(INFORMATION_VALUES_SECTION, key)
    }

    /// Sets an integrity hash value (e.g. `md5`, `sha1`), as computed by
    /// the caller.
    pub fn set_hash_value(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_value(INTEGRITY_HASH_VALUES_SECTION, key, value)
    }

    /// An integrity hash value, if present.
    #[must_use]
    pub fn hash_value(&self, key: &str) -> Option<&str> {
        self.value(INTEGRITY_HASH_VALUES_SECTION, key)
    }

    // ===== seek =============================================================

    /// Moves the logical cursor, returning the new absolute offset.
    ///
    /// Seeking past the end of the medium is permitted; a subsequent read
    /// returns 0 bytes and a subsequent write extends the medium,
    /// zero-filling the gap.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.ensure_open().map_err(|e| e.during("seek"))?;
        self.check_abort().map_err(|e| e.during("seek"))?;

        let total = self.table.as_ref().map_or(0, SegmentTable::total_size);

        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.offset) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(total) + i128::from(delta),
        };

        self.offset = u64::try_from(target)
            .map_err(|_| Error::invalid_argument("offset out of range").during("seek"))?;

        Ok(self.offset)
    }

    // ===== read =============================================================

    /// Reads up to `buf.len()` bytes at the cursor, crossing segment
    /// boundaries transparently, and advances the cursor by the returned
    /// count. A short return means end of medium.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open().map_err(|e| e.during("read"))?;
        self.ensure_readable().map_err(|e| e.during("read"))?;

        let at = self.offset;
        self.read_span(buf, at, true).map_err(|e| e.during("read"))
    }

    /// Positional read at `offset`; does not perturb the cursor.
    pub fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.ensure_open().map_err(|e| e.during("read"))?;
        self.ensure_readable().map_err(|e| e.during("read"))?;

        self.read_span(buf, offset, false)
            .map_err(|e| e.during("read"))
    }

    fn read_span(&mut self, buf: &mut [u8], mut pos: u64, advance: bool) -> Result<usize> {
        let mut done = 0usize;

        while done < buf.len() {
            self.check_abort()?;

            let Some(table) = self.table.as_ref() else {
                return Err(Error::invalid_state("no segment table"));
            };

            let Some((index, intra)) = table.locate(pos) else {
                // at or past end of medium
                break;
            };

            let Some(segment) = table.get(index) else {
                return Err(Error::corrupt("offset map out of sync"));
            };

            let room = segment.size - intra;
            let want = (buf.len() - done).min(usize::try_from(room).unwrap_or(usize::MAX));

            let read_result = {
                let Some(table) = self.table.as_mut() else {
                    return Err(Error::invalid_state("no segment table"));
                };

                let file = table.access(index, self.vfs.as_ref())?;
                file.seek(SeekFrom::Start(intra)).map_err(Error::from)?;
                file.read(&mut buf[done..done + want])
            };

            let n = match read_result {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from(e)),
            };

            if n == 0 {
                return Err(Error::corrupt(format!(
                    "segment {index} is shorter than its recorded size"
                )));
            }

            done += n;
            pos += n as u64;

            if advance {
                self.offset = pos;
            }
        }

        Ok(done)
    }

    // ===== write ============================================================

    /// Writes all of `buf` at the cursor and advances it.
    ///
    /// When the current segment would exceed the per-segment cap, the
    /// write is split and new segments are appended, named by the write
    /// naming scheme. Writes never return short: a stalled OS-level
    /// transfer fails with `ShortWrite` after one retry.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.ensure_open().map_err(|e| e.during("write"))?;
        self.ensure_writable().map_err(|e| e.during("write"))?;
        self.check_abort().map_err(|e| e.during("write"))?;

        if buf.is_empty() {
            return Ok(0);
        }

        let at = self.offset;
        let total = self.table.as_ref().map_or(0, SegmentTable::total_size);

        if at > total {
            self.fill_gap(total, at).map_err(|e| e.during("write"))?;
        }

        self.write_span(buf, at, true, true)
            .map_err(|e| e.during("write"))
    }

    /// Positional overwrite at `offset`, within the existing logical
    /// range only. Legal in read-write mode; does not perturb the cursor.
    pub fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        self.ensure_open().map_err(|e| e.during("write"))?;

        if self.mode != AccessMode::ReadWrite {
            return Err(Error::unsupported("write_at requires read-write mode").during("write"));
        }

        self.check_abort().map_err(|e| e.during("write"))?;

        if buf.is_empty() {
            return Ok(0);
        }

        let total = self.table.as_ref().map_or(0, SegmentTable::total_size);
        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or_else(|| Error::invalid_argument("offset out of range").during("write"))?;

        if end > total {
            return Err(Error::unsupported("write_at must not extend the medium").during("write"));
        }

        self.write_span(buf, offset, false, false)
            .map_err(|e| e.during("write"))
    }

    /// Zero-fills `[from, to)` at the end of the medium, so that a write
    /// after a seek past the end leaves no undefined bytes behind.
    fn fill_gap(&mut self, mut from: u64, to: u64) -> Result<()> {
        let zeros = [0u8; 8 << 10];

        while from < to {
            let n = (to - from).min(zeros.len() as u64) as usize;
            let written = self.write_span(&zeros[..n], from, false, true)?;
            from += written as u64;
        }

        Ok(())
    }

    /// Appends a fresh segment when the final one is exactly at the cap.
    fn roll_over(&mut self) -> Result<()> {
        let Some(table) = self.table.as_ref() else {
            return Err(Error::invalid_state("no segment table"));
        };

        let index = table.len();

        let name = self
            .scheme
            .as_ref()
            .and_then(|s| s.segment_name(index))
            .ok_or_else(|| {
                Error::unsupported("segment cap reached and the naming scheme has no successor")
            })?;

        log::debug!("Rolling over to segment {index}: {name:?}");

        let file = self
            .vfs
            .open(&name, OpenMode::Create)
            .map_err(|e| Error::from(e).during("segment open"))?;

        let Some(table) = self.table.as_mut() else {
            return Err(Error::invalid_state("no segment table"));
        };

        table.append(name.clone(), file);

        self.vfs.sync_parent_directory(&name).map_err(Error::from)
    }

    fn write_span(
        &mut self,
        buf: &[u8],
        mut pos: u64,
        advance: bool,
        allow_extend: bool,
    ) -> Result<usize> {
        let mut done = 0usize;
        let mut stalled = false;

        while done < buf.len() {
            self.check_abort()?;

            // roll over when the write extends past a full final segment
            let needs_rollover = {
                let Some(table) = self.table.as_ref() else {
                    return Err(Error::invalid_state("no segment table"));
                };

                allow_extend
                    && self.maximum_segment_size > 0
                    && pos == table.total_size()
                    && table
                        .get(table.len().saturating_sub(1))
                        .is_some_and(|last| last.size == self.maximum_segment_size)
            };

            if needs_rollover {
                self.roll_over()?;
            }

            // plan the next chunk: either an in-place overwrite or an
            // append to the final segment
            let (index, intra, want, extending) = {
                let Some(table) = self.table.as_ref() else {
                    return Err(Error::invalid_state("no segment table"));
                };

                let total = table.total_size();

                if pos < total {
                    let Some((index, intra)) = table.locate(pos) else {
                        return Err(Error::corrupt("offset map out of sync"));
                    };

                    let Some(segment) = table.get(index) else {
                        return Err(Error::corrupt("offset map out of sync"));
                    };

                    let room = segment.size - intra;
                    let want = (buf.len() - done).min(usize::try_from(room).unwrap_or(usize::MAX));

                    (index, intra, want, false)
                } else {
                    if !allow_extend {
                        return Err(Error::unsupported("write_at must not extend the medium"));
                    }

                    debug_assert_eq!(pos, total, "gap must be zero-filled before extending");

                    let index = table.len().saturating_sub(1);
                    let Some(last) = table.get(index) else {
                        return Err(Error::invalid_state("no segment table"));
                    };

                    let room = if self.maximum_segment_size > 0 {
                        self.maximum_segment_size - last.size
                    } else {
                        u64::MAX
                    };

                    let want = (buf.len() - done).min(usize::try_from(room).unwrap_or(usize::MAX));

                    (index, last.size, want, true)
                }
            };

            let write_result = {
                let Some(table) = self.table.as_mut() else {
                    return Err(Error::invalid_state("no segment table"));
                };

                let file = table.access(index, self.vfs.as_ref())?;
                file.seek(SeekFrom::Start(intra)).map_err(Error::from)?;
                file.write(&buf[done..done + want])
            };

            let n = match write_result {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from(e)),
            };

            if n == 0 {
                // one retry on a stalled transfer
                if stalled {
                    return Err(Error::new(ErrorKind::ShortWrite));
                }
                stalled = true;
                continue;
            }
            stalled = false;

            if extending {
                if let Some(table) = self.table.as_mut() {
                    table.grow_last(n as u64);
                }
            }

            done += n;
            pos += n as u64;

            if advance {
                self.offset = pos;
            }
        }

        Ok(done)
    }
}

/// The naming scheme a list of existing segment names follows, used for
/// sidecar naming and for rollover names when a read-write session
/// extends the image.
fn resolve_scheme(names: &[String]) -> Scheme {
    let Some(first) = names.first() else {
        unreachable!("open validates the list is non-empty");
    };

    let candidates = glob::candidates(first);

    if let Some(second) = names.get(1) {
        if let Some(scheme) = candidates
            .iter()
            .find(|c| c.segment_name(1).as_deref() == Some(second.as_str()))
        {
            return scheme.clone();
        }
    }

    candidates
        .into_iter()
        .next()
        .unwrap_or_else(|| Scheme::Single {
            name: first.clone(),
        })
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Handle({:?}, {:?}, {} segments, {} bytes, offset {})",
            self.state,
            self.mode,
            self.segment_count(),
            self.media_size(),
            self.offset,
        )
    }
}
