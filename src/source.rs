// Sensor Align - Time-ordered alignment of wearable sensor logs
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Record sources
//!
//! A [`RecordSource`] turns one file identifier into the records stored in
//! that file, in file order. Every merge iterator calls it independently for
//! each file it reads, so implementations must tolerate repeated loads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Result, SensorAlignError};
use crate::record::Record;

/// Opaque file identifier (usually a path)
pub type FileId = String;

/// Source of decoded records
pub trait RecordSource: Send + Sync {
    /// Decode every record of `file`, in file order (not necessarily
    /// epoch order). An empty file yields an empty vector.
    fn load(&self, file: &str) -> Result<Vec<Record>>;
}

impl<S: RecordSource + ?Sized> RecordSource for Arc<S> {
    fn load(&self, file: &str) -> Result<Vec<Record>> {
        (**self).load(file)
    }
}

/// Shared handle to a source
pub type SharedSource = Arc<dyn RecordSource>;

/// In-memory source keyed by file id
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: HashMap<FileId, Vec<Record>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&mut self, file: impl Into<FileId>, records: Vec<Record>) {
        self.files.insert(file.into(), records);
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with_file(mut self, file: impl Into<FileId>, records: Vec<Record>) -> Self {
        self.insert(file, records);
        self
    }

    pub fn contains(&self, file: &str) -> bool {
        self.files.contains_key(file)
    }

    pub fn into_shared(self) -> SharedSource {
        Arc::new(self)
    }
}

impl RecordSource for MemorySource {
    fn load(&self, file: &str) -> Result<Vec<Record>> {
        self.files
            .get(file)
            .cloned()
            .ok_or_else(|| SensorAlignError::source_error(file, "file not found"))
    }
}

/// Decode cache in front of another source
///
/// Decoded records are immutable, so handing out copies of a cached decode
/// is indistinguishable from decoding again. Failed loads are not cached.
pub struct CachedSource<S> {
    inner: S,
    cache: Mutex<HashMap<FileId, Arc<[Record]>>>,
}

impl<S: RecordSource> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of files currently cached
    pub fn cached_files(&self) -> usize {
        self.lock().len()
    }

    /// Drop every cached decode
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<FileId, Arc<[Record]>>> {
        // A panic while holding the lock cannot leave the map half-written
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: RecordSource> RecordSource for CachedSource<S> {
    fn load(&self, file: &str) -> Result<Vec<Record>> {
        if let Some(records) = self.lock().get(file) {
            log::trace!("decode cache hit for {}", file);
            return Ok(records.to_vec());
        }

        let records: Arc<[Record]> = self.inner.load(file)?.into();
        self.lock().insert(file.to_string(), Arc::clone(&records));
        Ok(records.to_vec())
    }
}

impl<S> std::fmt::Debug for CachedSource<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSource").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        inner: MemorySource,
        loads: AtomicUsize,
    }

    impl RecordSource for CountingSource {
        fn load(&self, file: &str) -> Result<Vec<Record>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load(file)
        }
    }

    #[test]
    fn test_memory_source_load() {
        let source = MemorySource::new().with_file("a", vec![Record::response(1.0, "Eat")]);
        assert!(source.contains("a"));
        assert_eq!(source.load("a").unwrap().len(), 1);
    }

    #[test]
    fn test_memory_source_missing_file() {
        let source = MemorySource::new();
        assert!(matches!(
            source.load("missing"),
            Err(SensorAlignError::Source { .. })
        ));
    }

    #[test]
    fn test_cached_source_decodes_once() {
        let counting = CountingSource {
            inner: MemorySource::new().with_file("a", vec![Record::response(1.0, "Eat")]),
            loads: AtomicUsize::new(0),
        };
        let cached = CachedSource::new(counting);

        let first = cached.load("a").unwrap();
        let second = cached.load("a").unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner().loads.load(Ordering::SeqCst), 1);
        assert_eq!(cached.cached_files(), 1);

        cached.clear();
        assert_eq!(cached.cached_files(), 0);
        cached.load("a").unwrap();
        assert_eq!(cached.inner().loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cached_source_does_not_cache_errors() {
        let cached = CachedSource::new(MemorySource::new());
        assert!(cached.load("missing").is_err());
        assert_eq!(cached.cached_files(), 0);
    }
}
