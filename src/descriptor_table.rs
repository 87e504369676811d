// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::vfs::VfsFile;
use crate::Result;
use std::collections::{HashMap, VecDeque};

/// Default number of segment files kept open at once.
pub const DEFAULT_CAPACITY: usize = 16;

/// LRU pool of open segment file handles.
///
/// Images can consist of hundreds of segments; keeping every segment file
/// open would exhaust OS file descriptors. The pool keeps up to `capacity`
/// handles open, evicting the stalest one when full. Eviction closes the
/// handle; the next access reopens the segment by name.
pub struct DescriptorTable {
    capacity: usize,
    open: HashMap<usize, Box<dyn VfsFile>>,

    // front = stalest
    recency: VecDeque<usize>,
}

impl DescriptorTable {
    /// Creates a pool with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "descriptor table capacity must be positive");

        Self {
            capacity,
            open: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    /// Number of currently open handles.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    fn touch(&mut self, index: usize) {
        self.recency.retain(|&i| i != index);
        self.recency.push_back(index);
    }

    fn evict_down_to(&mut self, count: usize) {
        while self.open.len() > count {
            let Some(victim) = self.recency.pop_front() else {
                break;
            };

            log::trace!("Evicting descriptor of segment {victim}");
            self.open.remove(&victim);
        }
    }

    /// The open handle for segment `index`, reopening through `reopen`
    /// when the pool evicted it (or never held it).
    pub fn access(
        &mut self,
        index: usize,
        reopen: impl FnOnce() -> Result<Box<dyn VfsFile>>,
    ) -> Result<&mut (dyn VfsFile + '_)> {
        if !self.open.contains_key(&index) {
            self.evict_down_to(self.capacity.saturating_sub(1));

            let file = reopen()?;
            self.open.insert(index, file);
        }

        self.touch(index);

        // just inserted or already present
        #[allow(clippy::expect_used)]
        Ok(self
            .open
            .get_mut(&index)
            .expect("descriptor was just inserted")
            .as_mut())
    }

    /// Inserts a freshly created handle for segment `index`.
    pub fn insert(&mut self, index: usize, file: Box<dyn VfsFile>) {
        self.evict_down_to(self.capacity.saturating_sub(1));
        self.open.insert(index, file);
        self.touch(index);
    }

    /// Closes the handle of segment `index`, if open.
    pub fn remove(&mut self, index: usize) {
        self.open.remove(&index);
        self.recency.retain(|&i| i != index);
    }

    /// Syncs every open handle.
    pub fn sync_open(&mut self) -> std::io::Result<()> {
        for file in self.open.values_mut() {
            file.sync()?;
        }
        Ok(())
    }

    /// Closes all handles.
    pub fn clear(&mut self) {
        self.open.clear();
        self.recency.clear();
    }
}

impl std::fmt::Debug for DescriptorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DescriptorTable({}/{} open)",
            self.open.len(),
            self.capacity
        )
    }
}
