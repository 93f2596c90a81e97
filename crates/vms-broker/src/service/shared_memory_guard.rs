//! Ownership guard for shared memory handed to the broker.

use crate::ports::SharedMemory;

/// Closes the wrapped region exactly once, when dropped.
pub(crate) struct SharedMemoryGuard {
    region: Box<dyn SharedMemory>,
}

impl SharedMemoryGuard {
    pub fn new(region: Box<dyn SharedMemory>) -> Self {
        Self { region }
    }

    pub fn size(&self) -> usize {
        self.region.size()
    }

    pub fn region(&self) -> &dyn SharedMemory {
        self.region.as_ref()
    }
}

impl Drop for SharedMemoryGuard {
    fn drop(&mut self) {
        self.region.close();
    }
}
