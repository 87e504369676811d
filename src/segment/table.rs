// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::Segment;
use crate::descriptor_table::DescriptorTable;
use crate::vfs::{OpenMode, Vfs, VfsFile};
use crate::{Error, Result};

/// Ordered, append-only table of the segments that constitute an image.
///
/// Answers "which segment contains logical offset X?" by binary search
/// over the cumulative start offsets and owns the pool of lazily opened
/// segment file handles.
pub struct SegmentTable {
    segments: Vec<Segment>,
    pool: DescriptorTable,

    /// Mode used when the pool reopens an evicted segment.
    reopen_mode: OpenMode,
}

impl SegmentTable {
    /// Creates an empty table for a write session.
    #[must_use]
    pub fn new(pool_capacity: usize) -> Self {
        Self {
            segments: Vec::new(),
            pool: DescriptorTable::new(pool_capacity),
            reopen_mode: OpenMode::ReadWrite,
        }
    }

    /// Builds the table over an existing list of segment files.
    ///
    /// Each file is opened once to record its size; handles are kept in
    /// the pool while it has room. The name list is taken literally in
    /// the order given.
    ///
    /// With `maximum_segment_size > 0` the chain is validated against the
    /// cap: every non-final segment must be exactly the cap, the final
    /// one must not exceed it. A zero-length non-final segment is always
    /// corrupt.
    pub fn open(
        vfs: &dyn Vfs,
        names: &[String],
        mode: OpenMode,
        maximum_segment_size: u64,
        pool_capacity: usize,
    ) -> Result<Self> {
        let mut table = Self {
            segments: Vec::with_capacity(names.len()),
            pool: DescriptorTable::new(pool_capacity),
            reopen_mode: mode,
        };

        let mut start = 0u64;

        for (index, name) in names.iter().enumerate() {
            if !vfs.exists(name) {
                return Err(Error::not_found(name.clone()).during("segment open"));
            }

            let mut file = vfs
                .open(name, mode)
                .map_err(|e| Error::from(e).during("segment open"))?;
            let size = file.size().map_err(|e| Error::from(e).during("segment open"))?;

            log::trace!("Segment {index}: {name:?}, {size} bytes at offset {start}");

            table.segments.push(Segment {
                index,
                filename: name.clone(),
                size,
                start,
            });

            if table.pool.open_count() < pool_capacity {
                table.pool.insert(index, file);
            }

            start = start.checked_add(size).ok_or_else(|| {
                Error::invalid_argument("image exceeds the addressable range")
                    .during("segment open")
            })?;
        }

        table.validate_chain(maximum_segment_size)?;

        Ok(table)
    }

    fn validate_chain(&self, maximum_segment_size: u64) -> Result<()> {
        let last = self.segments.len().saturating_sub(1);

        for segment in &self.segments {
            let is_final = segment.index == last;

            if segment.size == 0 && !is_final {
                return Err(Error::corrupt(format!(
                    "zero-length segment {:?} in the middle of the chain",
                    segment.filename
                ))
                .during("segment open"));
            }

            if maximum_segment_size > 0 {
                if !is_final && segment.size != maximum_segment_size {
                    return Err(Error::corrupt(format!(
                        "segment {:?} is {} bytes, expected the cap of {} bytes",
                        segment.filename, segment.size, maximum_segment_size
                    ))
                    .during("segment open"));
                }

                if is_final && segment.size > maximum_segment_size {
                    return Err(Error::corrupt(format!(
                        "final segment {:?} is {} bytes, larger than the cap of {} bytes",
                        segment.filename, segment.size, maximum_segment_size
                    ))
                    .during("segment open"));
                }
            }
        }

        Ok(())
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the table holds no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Sum of all segment sizes — the current logical length of the medium.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.segments.last().map_or(0, Segment::end)
    }

    /// The segment descriptor at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Maps a logical offset to `(segment index, intra-segment offset)`.
    ///
    /// Returns `None` when the offset lies at or past the end of the
    /// medium. O(log N).
    #[must_use]
    pub fn locate(&self, offset: u64) -> Option<(usize, u64)> {
        if offset >= self.total_size() {
            return None;
        }

        let index = self.segments.partition_point(|s| s.end() <= offset);
        let segment = self.segments.get(index)?;

        debug_assert!(segment.contains(offset));

        Some((index, offset - segment.start))
    }

    /// Appends a fresh zero-sized segment, taking ownership of its
    /// just-created file handle. Write path only.
    pub fn append(&mut self, filename: String, file: Box<dyn VfsFile>) {
        let index = self.segments.len();
        let start = self.total_size();

        log::debug!("Appending segment {index}: {filename:?} at offset {start}");

        self.segments.push(Segment {
            index,
            filename,
            size: 0,
            start,
        });

        self.pool.insert(index, file);
    }

    /// Records `n` bytes appended to the final segment.
    ///
    /// # Panics
    ///
    /// Panics if the table is empty.
    pub fn grow_last(&mut self, n: u64) {
        #[allow(clippy::expect_used)]
        let last = self.segments.last_mut().expect("table must not be empty");
        last.size += n;
    }

    /// The open file handle of segment `index`, reopening it through the
    /// capability when the pool evicted it.
    pub fn access(&mut self, index: usize, vfs: &dyn Vfs) -> Result<&mut (dyn VfsFile + '_)> {
        let Some(segment) = self.segments.get(index) else {
            return Err(Error::invalid_argument("segment index out of range"));
        };

        let filename = segment.filename.clone();
        let mode = self.reopen_mode;

        self.pool.access(index, || {
            log::trace!("Reopening segment {index}: {filename:?}");
            vfs.open(&filename, mode).map_err(Error::from)
        })
    }

    /// Syncs all pooled handles down to storage.
    pub fn sync_open(&mut self) -> Result<()> {
        self.pool.sync_open().map_err(Error::from)
    }

    /// Closes every pooled handle.
    pub fn close(&mut self) {
        self.pool.clear();
    }
}

impl std::fmt::Debug for SegmentTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SegmentTable({} segments, {} bytes, {:?})",
            self.segments.len(),
            self.total_size(),
            self.pool
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::vfs::OsVfs;
    use test_log::test;

    fn write_segments(dir: &std::path::Path, sizes: &[usize]) -> Vec<String> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                let path = dir.join(format!("img.{:03}", i + 1));
                std::fs::write(&path, vec![i as u8; size]).unwrap();
                path.to_str().unwrap().to_string()
            })
            .collect()
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn table_locate_boundaries() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let names = write_segments(dir.path(), &[4, 4, 2]);

        let table = SegmentTable::open(&OsVfs, &names, OpenMode::Read, 0, 4)?;

        assert_eq!(3, table.len());
        assert_eq!(10, table.total_size());

        // first and last byte of every segment
        for (index, (start, size)) in [(0u64, 4u64), (4, 4), (8, 2)].iter().enumerate() {
            assert_eq!(Some((index, 0)), table.locate(*start));
            assert_eq!(Some((index, size - 1)), table.locate(start + size - 1));
        }

        assert_eq!(None, table.locate(10));
        assert_eq!(None, table.locate(u64::MAX));

        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn table_rejects_zero_length_middle_segment() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let names = write_segments(dir.path(), &[4, 0, 2]);

        let err = SegmentTable::open(&OsVfs, &names, OpenMode::Read, 0, 4).unwrap_err();
        assert!(matches!(err.kind(), crate::ErrorKind::Corrupt(_)));

        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn table_validates_against_cap() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;

        // undersized middle segment
        let names = write_segments(dir.path(), &[4, 3, 2]);
        let err = SegmentTable::open(&OsVfs, &names, OpenMode::Read, 4, 4).unwrap_err();
        assert!(matches!(err.kind(), crate::ErrorKind::Corrupt(_)));

        // oversized final segment
        let names = write_segments(dir.path(), &[4, 4, 6]);
        let err = SegmentTable::open(&OsVfs, &names, OpenMode::Read, 4, 4).unwrap_err();
        assert!(matches!(err.kind(), crate::ErrorKind::Corrupt(_)));

        // exact fit is legal
        let names = write_segments(dir.path(), &[4, 4, 4]);
        assert!(SegmentTable::open(&OsVfs, &names, OpenMode::Read, 4, 4).is_ok());

        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn table_missing_segment_is_not_found() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut names = write_segments(dir.path(), &[4, 4]);
        names.push(dir.path().join("img.003").to_str().unwrap().to_string());

        let err = SegmentTable::open(&OsVfs, &names, OpenMode::Read, 0, 4).unwrap_err();
        assert!(matches!(err.kind(), crate::ErrorKind::NotFound(_)));
        assert_eq!(Some("segment open"), err.operation());

        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn table_append_and_grow() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let vfs = OsVfs;

        let mut table = SegmentTable::new(4);
        assert!(table.is_empty());
        assert_eq!(0, table.total_size());

        let name = dir.path().join("out.001").to_str().unwrap().to_string();
        let file = vfs.open(&name, OpenMode::Create)?;
        table.append(name, file);

        table.grow_last(4);

        let name = dir.path().join("out.002").to_str().unwrap().to_string();
        let file = vfs.open(&name, OpenMode::Create)?;
        table.append(name, file);

        table.grow_last(2);

        assert_eq!(2, table.len());
        assert_eq!(6, table.total_size());
        assert_eq!(Some((0, 3)), table.locate(3));
        assert_eq!(Some((1, 0)), table.locate(4));
        assert_eq!(None, table.locate(6));

        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn table_access_survives_eviction() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let names = write_segments(dir.path(), &[2, 2, 2, 2]);

        // pool smaller than the chain
        let mut table = SegmentTable::open(&OsVfs, &names, OpenMode::Read, 0, 2)?;

        for index in (0..4).chain(0..4) {
            let file = table.access(index, &OsVfs)?;
            file.seek(std::io::SeekFrom::Start(0))?;

            let mut buf = [0u8; 2];
            assert_eq!(2, file.read(&mut buf)?);
            assert_eq!([index as u8; 2], buf);
        }

        Ok(())
    }
}
