//! Reference kinds and walk options shared by every reference visitor.

use bitflags::bitflags;

bitflags! {
    /// How a reference slot relates to the ID it points at.
    ///
    /// The empty set is a plain, uncounted reference kept for traversal and
    /// remapping only.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct RefKind: u16 {
        // === Counting ===

        /// Counts as one user of the target.
        const USER = 1 << 0;
        /// Ensures the target has at least one (extra) user, however many
        /// slots like this point at it.
        const USER_ONE = 1 << 1;

        // === Structure ===

        /// Owning link to an embedded ID.
        const EMBEDDED = 1 << 2;
        /// Link to an embedded ID owned by someone else.
        const EMBEDDED_NOT_OWNING = 1 << 3;
        /// Back-link from owned data to its owner.
        const LOOPBACK = 1 << 4;

        // === Constraints ===

        /// The slot must never be cleared while its owner lives.
        const NEVER_NULL = 1 << 5;
        /// The slot must never point at its own owner.
        const NEVER_SELF = 1 << 6;
        /// Usage through indirect data (e.g. proxies) rather than direct use.
        const INDIRECT_USAGE = 1 << 7;
        /// Reference from a library override to its linked reference.
        const OVERRIDE_LIBRARY_REFERENCE = 1 << 8;
    }
}

impl RefKind {
    /// No special semantics.
    pub const NOP: Self = Self::empty();

    /// Does this kind add one to the target's user count?
    #[inline]
    pub fn is_counted(self) -> bool {
        self.contains(Self::USER)
    }
}

bitflags! {
    /// Options of a reference walk.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct WalkFlags: u8 {
        /// Visitors must not modify any slot.
        const READONLY = 1 << 0;
        /// Also visit UI-only references (screens, editors).
        const INCLUDE_UI = 1 << 1;
        /// Do not descend into embedded IDs.
        const IGNORE_EMBEDDED = 1 << 2;
    }
}

/// What a visitor wants the walker to do next.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum WalkStep {
    Continue,
    /// Abort the whole walk.
    Stop,
}
