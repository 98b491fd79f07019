//! Session identifiers.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Value of an unset session identifier.
pub const MAIN_ID_SESSION_UID_UNSET: u32 = 0;

/// Process-lifetime identity of an ID, independent of its name and handle.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SessionUid(u32);

impl SessionUid {
    /// Runtime-only IDs keep this value.
    pub const UNSET: Self = Self(MAIN_ID_SESSION_UID_UNSET);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_set(self) -> bool {
        self.0 != MAIN_ID_SESSION_UID_UNSET
    }
}

/// Monotonic source of session identifiers. Never hands out the unset value,
/// even after wrapping around.
#[derive(Debug)]
pub struct SessionUidGenerator {
    next: AtomicU32,
}

impl SessionUidGenerator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(MAIN_ID_SESSION_UID_UNSET),
        }
    }

    pub fn generate(&self) -> SessionUid {
        loop {
            let uid = self.next.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if uid != MAIN_ID_SESSION_UID_UNSET {
                return SessionUid(uid);
            }
        }
    }

    /// Restart numbering, used when the whole database is reloaded.
    pub fn reset(&self) {
        self.next.store(MAIN_ID_SESSION_UID_UNSET, Ordering::Relaxed);
    }
}

impl Default for SessionUidGenerator {
    fn default() -> Self {
        Self::new()
    }
}
