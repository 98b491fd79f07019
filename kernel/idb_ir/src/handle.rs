//! Arena handles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A reference to an ID stored in a database arena.
///
/// The generation changes every time a slot is reused, so a handle kept past
/// the ID's deletion never resolves to a different ID.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdHandle {
    index: u32,
    generation: u32,
}

impl IdHandle {
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the arena.
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for IdHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdHandle({}v{})", self.index, self.generation)
    }
}
