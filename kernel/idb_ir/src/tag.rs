//! Atomic tag storage.
//!
//! The tag field is shared with an external dependency-graph scheduler that
//! may mark IDs dirty from another thread. `set_atomic`/`clear_atomic` are the
//! only concurrency-safe mutations; the plain `insert`/`remove` helpers use
//! relaxed stores and assume the single database writer.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::IdTag;

/// Tag bits of one ID.
#[derive(Default)]
pub struct AtomicIdTag(AtomicU32);

/// Tag storage shared between the ID and an external scheduler.
pub type SharedTag = Arc<AtomicIdTag>;

impl AtomicIdTag {
    pub fn new(tag: IdTag) -> Self {
        Self(AtomicU32::new(tag.bits()))
    }

    #[inline]
    pub fn get(&self) -> IdTag {
        IdTag::from_bits_retain(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn contains(&self, tag: IdTag) -> bool {
        self.get().contains(tag)
    }

    #[inline]
    pub fn intersects(&self, tag: IdTag) -> bool {
        self.get().intersects(tag)
    }

    /// Overwrite all bits. Single-writer only.
    #[inline]
    pub fn set(&self, tag: IdTag) {
        self.0.store(tag.bits(), Ordering::Release);
    }

    /// Add bits. Single-writer only.
    #[inline]
    pub fn insert(&self, tag: IdTag) {
        self.set(self.get() | tag);
    }

    /// Remove bits. Single-writer only.
    #[inline]
    pub fn remove(&self, tag: IdTag) {
        self.set(self.get() - tag);
    }

    /// Add bits, safe against concurrent tagging.
    #[inline]
    pub fn set_atomic(&self, tag: IdTag) {
        self.0.fetch_or(tag.bits(), Ordering::AcqRel);
    }

    /// Remove bits, safe against concurrent tagging.
    #[inline]
    pub fn clear_atomic(&self, tag: IdTag) {
        self.0.fetch_and(!tag.bits(), Ordering::AcqRel);
    }
}

impl std::fmt::Debug for AtomicIdTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.get().fmt(f)
    }
}
