//! Heap-backed shared memory region.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::SharedMemoryError;
use crate::ports::SharedMemory;

/// A [`SharedMemory`] region held in process memory.
///
/// Clones share the same region, so the creator can keep a handle to observe
/// when the broker closes it.
#[derive(Clone, Debug)]
pub struct HeapSharedMemory {
    inner: Arc<Region>,
}

#[derive(Debug)]
struct Region {
    size: usize,
    /// `None` once closed
    data: RwLock<Option<Vec<u8>>>,
    close_count: AtomicUsize,
}

impl HeapSharedMemory {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(Region {
                size: data.len(),
                data: RwLock::new(Some(data)),
                close_count: AtomicUsize::new(0),
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.data.read().is_none()
    }

    /// How many times `close` has been called on any clone.
    pub fn close_count(&self) -> usize {
        self.inner.close_count.load(Ordering::SeqCst)
    }
}

impl SharedMemory for HeapSharedMemory {
    fn size(&self) -> usize {
        self.inner.size
    }

    fn read(&self) -> Result<Vec<u8>, SharedMemoryError> {
        self.inner
            .data
            .read()
            .as_ref()
            .cloned()
            .ok_or(SharedMemoryError::Closed)
    }

    fn close(&self) {
        self.inner.close_count.fetch_add(1, Ordering::SeqCst);
        self.inner.data.write().take();
    }
}
