//! Trace Module
//!
//! Observes page writes and explains each one as an edit script.
//!
//! ## Responsibilities
//! - Filter backend writes down to whole, page-aligned database pages
//! - Decode each traced page and diff it against the previous decode
//! - Own the decode cache for the lifetime of one session
//! - Wire a tracer into a backend as its write observer

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::page::{diff_pages, Change, DecodedPage, PageCodec};
use crate::vfs::{memory_factory, Backend, DiskFile, FileSlot, MemoryFile};

/// Changes observed on one page write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageEvent {
    /// Logical file the page belongs to
    pub file: String,
    /// Page index (offset / page size)
    pub page_index: u64,
    /// Edit script relative to the previous decode of this page
    pub changes: Vec<Change>,
}

/// Decodes traced pages and diffs them against the previous decode
///
/// The cache is unbounded: pages are few and the tracer is diagnostic.
pub struct PageTracer {
    codec: PageCodec,

    /// Last successful decode per page index
    cache: HashMap<u64, DecodedPage>,

    /// Events not yet drained by the owner
    events: Vec<PageEvent>,

    /// Pages that failed to decode
    decode_failures: u64,
}

impl PageTracer {
    pub fn new(page_size: usize) -> Self {
        Self {
            codec: PageCodec::new(page_size),
            cache: HashMap::new(),
            events: Vec::new(),
            decode_failures: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.codec.page_size()
    }

    /// Whether a write is a whole, aligned page of a non-journal file
    pub fn should_trace(&self, file: &str, offset: u64, len: usize) -> bool {
        let page_size = self.page_size() as u64;
        page_size != 0
            && len as u64 == page_size
            && offset % page_size == 0
            && FileSlot::from_file_name(file) != FileSlot::Journal
    }

    /// Decode and diff one write.
    ///
    /// Returns `Ok(None)` for writes that are filtered out. A decode error
    /// leaves the cache untouched and no diff is computed.
    pub fn observe(&mut self, file: &str, bytes: &[u8], offset: u64) -> Result<Option<PageEvent>> {
        if !self.should_trace(file, offset, bytes.len()) {
            return Ok(None);
        }

        let page_index = offset / self.page_size() as u64;
        let decoded = self.codec.decode(page_index, bytes)?;
        let changes = diff_pages(self.cache.get(&page_index), &decoded);

        for change in &changes {
            info!(file, page = page_index, %change, "page change");
        }

        self.cache.insert(page_index, decoded);

        Ok(Some(PageEvent {
            file: file.to_string(),
            page_index,
            changes,
        }))
    }

    /// Observe a write and queue its event; decode failures are logged
    pub fn record(&mut self, file: &str, bytes: &[u8], offset: u64) {
        match self.observe(file, bytes, offset) {
            Ok(Some(event)) => self.events.push(event),
            Ok(None) => {}
            Err(e) => {
                self.decode_failures += 1;
                warn!(file, offset, error = %e, "skipping undecodable page");
            }
        }
    }

    /// Feed every page of an in-memory file through the tracer
    pub fn record_file(&mut self, file: &str, memory: &MemoryFile) {
        let page_size = self.page_size();
        for (index, page) in memory.pages(page_size) {
            self.record(file, &page, index * page_size as u64);
        }
    }

    /// Take all queued events
    pub fn drain_events(&mut self) -> Vec<PageEvent> {
        std::mem::take(&mut self.events)
    }

    /// Last decode of a page, if it was ever traced
    pub fn cached(&self, page_index: u64) -> Option<&DecodedPage> {
        self.cache.get(&page_index)
    }

    /// Number of distinct pages in the cache
    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }

    /// Forget all cached decodes and queued events
    pub fn reset(&mut self) {
        self.cache.clear();
        self.events.clear();
        self.decode_failures = 0;
    }
}

/// A backend plus the tracer scoped to it
///
/// Dropping the session drops the backend, every slot's storage and the
/// decode cache together.
pub struct TraceSession {
    config: Config,
    backend: Backend,
    tracer: Option<Arc<Mutex<PageTracer>>>,
}

impl TraceSession {
    /// Open a session
    ///
    /// 1. Validate the config
    /// 2. Pick the storage factory (disk when `data_dir` is set, else memory)
    /// 3. Install the page tracer if `trace_pages` is on
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let factory = match &config.data_dir {
            Some(dir) => DiskFile::factory(dir.clone(), config.db_name.clone()),
            None => memory_factory(),
        };

        let mut backend = Backend::from_config(&config, factory)?;

        let tracer = if config.trace_pages {
            let tracer = Arc::new(Mutex::new(PageTracer::new(config.page_size)));
            let observer = Arc::clone(&tracer);
            backend.set_observer(Box::new(move |file: &str, bytes: &[u8], offset: u64| {
                observer.lock().record(file, bytes, offset);
            }));
            Some(tracer)
        } else {
            None
        };

        debug!(
            db = %config.db_name,
            page_size = config.page_size,
            trace = config.trace_pages,
            on_disk = config.data_dir.is_some(),
            "opened session"
        );

        Ok(Self {
            config,
            backend,
            tracer,
        })
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut Backend {
        &mut self.backend
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the tracer, if tracing is on
    pub fn tracer(&self) -> Option<Arc<Mutex<PageTracer>>> {
        self.tracer.clone()
    }

    /// Take all page events recorded so far
    pub fn drain_events(&self) -> Vec<PageEvent> {
        self.tracer
            .as_ref()
            .map(|tracer| tracer.lock().drain_events())
            .unwrap_or_default()
    }
}
