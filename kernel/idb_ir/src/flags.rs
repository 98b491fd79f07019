//! Persistent flags and runtime tags of an ID.

use bitflags::bitflags;

bitflags! {
    /// Persistent ID flags, written to memfiles.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct IdFlag: u16 {
        /// Keeps the ID alive with no structural users.
        const FAKEUSER = 1 << 0;
        /// The ID is embedded in another one and never stored in a database
        /// list on its own.
        const EMBEDDED_DATA = 1 << 1;
        /// Indirectly linked data that is only kept for a weak reference.
        const INDIRECT_WEAK_LINK = 1 << 2;
        /// Embedded data of a library override.
        const EMBEDDED_DATA_LIB_OVERRIDE = 1 << 3;
    }
}

bitflags! {
    /// Runtime ID tags. Never persisted.
    ///
    /// Most bits are scratch space for a single operation and must only be
    /// touched by the thread editing the database; the scheduler bits are set
    /// through [`crate::AtomicIdTag`].
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct IdTag: u32 {
        // === Linking state (bits 0-3) ===

        /// Linked data used directly by local data.
        const EXTERN = 1 << 0;
        /// Linked data only used by other linked data.
        const INDIRECT = 1 << 1;
        /// Linked data whose library file is missing.
        const MISSING = 1 << 2;

        // === Allocation state (bits 4-11) ===

        /// The ID is not stored in any database.
        const NO_MAIN = 1 << 4;
        /// The ID's own references are not counted as users.
        const NO_USER_REFCOUNT = 1 << 5;
        /// The ID's storage belongs to the caller.
        const NOT_ALLOCATED = 1 << 6;
        /// Evaluation copy of a database ID.
        const COPIED_ON_EVAL = 1 << 7;
        /// Localized copy used for previews and rendering.
        const LOCALIZED = 1 << 8;

        // === User counting (bits 12-15) ===

        /// The ID wants one user even without a counted reference.
        const EXTRAUSER = 1 << 12;
        /// The extra user is currently accounted for in the user count.
        const EXTRAUSER_SET = 1 << 13;

        // === Operation scratch (bits 16-23) ===

        /// Generic "process this ID" marker (deletion, make local...).
        const DOIT = 1 << 16;
        /// Freshly created by a duplicate operation.
        const NEW = 1 << 17;
        /// Existed before a bulk operation started.
        const PRE_EXISTING = 1 << 18;
        /// Set on the ID itself while its references are being walked.
        const WALKING = 1 << 19;

        // === External scheduler (bits 24-31) ===

        /// Dependency graph must re-evaluate this ID.
        const NEEDS_UPDATE = 1 << 24;
        /// Dependency graph relations must be rebuilt.
        const NEEDS_RELATIONS_UPDATE = 1 << 25;
    }
}

impl IdTag {
    /// Tags that only make sense while an ID is linked.
    pub const LINK_STATE: Self = Self::EXTERN.union(Self::INDIRECT).union(Self::MISSING);
}
