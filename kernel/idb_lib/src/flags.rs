//! Behaviour flags of the lifecycle operations.

use bitflags::bitflags;
use idb_ir::IdTag;

bitflags! {
    /// Creation and copy behaviour.
    ///
    /// The `CREATE_*` bits apply to allocation as well as copy; the `COPY_*`
    /// bits select which categories of data a copy carries over.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct CopyFlags: u32 {
        // === Creation (bits 0-7) ===

        /// Result is not stored in the database.
        const NO_MAIN = 1 << 0;
        /// References held by the result do not count as users.
        /// Implies `NO_MAIN`.
        const NO_USER_REFCOUNT = 1 << 1;
        /// Caller provides the destination. Implies `NO_MAIN`.
        const NO_ALLOCATE = 1 << 2;
        /// Do not flag dependency relations as outdated.
        const NO_DEG_TAG = 1 << 3;
        /// Result is a localized copy (preview and render snapshots).
        /// Only valid together with `NO_MAIN`.
        const CREATE_LOCAL = 1 << 4;

        // === Content selection (bits 8-15) ===

        /// Also copy runtime caches.
        const COPY_CACHES = 1 << 8;
        const COPY_NO_PREVIEW = 1 << 9;
        const COPY_NO_ANIMDATA = 1 << 10;
        const COPY_NO_LIB_OVERRIDE = 1 << 11;

        // === Deep-copy exceptions (bits 16-23) ===

        /// Copy the animation action instead of sharing it.
        const COPY_ACTIONS = 1 << 16;
        /// Copy owned shape keys instead of sharing them.
        const COPY_SHAPEKEY = 1 << 17;

        // === Placement (bits 24-31) ===

        /// The copy stays in the library of its source.
        const COPY_KEEP_LIB = 1 << 24;
        /// Tag the result as an evaluation copy.
        const COPY_SET_COPIED_ON_WRITE = 1 << 25;
    }
}

impl CopyFlags {
    /// Flags of a regular user-level copy.
    pub const DEFAULT: Self = Self::COPY_SHAPEKEY;

    /// Detached, non-refcounted snapshot with caches and no override data.
    pub const LOCALIZE: Self = Self::CREATE_LOCAL
        .union(Self::NO_MAIN)
        .union(Self::NO_USER_REFCOUNT)
        .union(Self::NO_DEG_TAG)
        .union(Self::COPY_NO_LIB_OVERRIDE)
        .union(Self::COPY_CACHES);

    /// Add the bits implied by the ones already set.
    #[must_use]
    pub fn normalized(self) -> Self {
        let mut flags = self;
        if flags.intersects(Self::NO_USER_REFCOUNT | Self::NO_ALLOCATE) {
            flags |= Self::NO_MAIN;
        }
        flags
    }

    /// Tags a newly created ID receives under these flags.
    pub fn creation_tags(self) -> IdTag {
        let mut tag = IdTag::empty();
        if self.contains(Self::NO_MAIN) {
            tag |= IdTag::NO_MAIN;
        }
        if self.contains(Self::NO_USER_REFCOUNT) {
            tag |= IdTag::NO_USER_REFCOUNT;
        }
        if self.contains(Self::NO_ALLOCATE) {
            tag |= IdTag::NOT_ALLOCATED;
        }
        if self.contains(Self::CREATE_LOCAL) {
            tag |= IdTag::LOCALIZED;
        }
        if self.contains(Self::COPY_SET_COPIED_ON_WRITE) {
            tag |= IdTag::COPIED_ON_EVAL;
        }
        tag
    }
}

bitflags! {
    /// Free behaviour.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct FreeFlags: u8 {
        /// The ID is not stored in a database.
        const NO_MAIN = 1 << 0;
        /// Do not decrement the users of referenced IDs.
        const NO_USER_REFCOUNT = 1 << 1;
        /// Keep the emptied record for the caller instead of dropping it.
        const NOT_ALLOCATED = 1 << 2;
        /// Do not flag dependency relations as outdated.
        const NO_DEG_TAG = 1 << 3;
        /// Skip UI-only references when releasing users.
        const NO_UI_USER = 1 << 4;
    }
}

impl FreeFlags {
    /// Flags matching how an ID was created, read back from its tags.
    pub fn from_tags(tag: IdTag) -> Self {
        let mut flags = Self::empty();
        if tag.contains(IdTag::NO_MAIN) {
            flags |= Self::NO_MAIN;
        }
        if tag.contains(IdTag::NO_USER_REFCOUNT) {
            flags |= Self::NO_USER_REFCOUNT;
        }
        if tag.contains(IdTag::NOT_ALLOCATED) {
            flags |= Self::NOT_ALLOCATED;
        }
        flags
    }
}

bitflags! {
    /// Make-local behaviour.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct MakeLocalFlags: u8 {
        /// Make local in place, whatever the users.
        const FORCE_LOCAL = 1 << 0;
        /// Make a local copy, whatever the users.
        const FORCE_COPY = 1 << 1;
        /// A whole library is being made local at once: users that are
        /// themselves linked count as future local users.
        const FULL_LIBRARY = 1 << 2;
        /// Also process indirectly linked IDs.
        const INDIRECT = 1 << 3;
        /// Drop library override data of the result.
        const LIBOVERRIDE_CLEAR = 1 << 4;
    }
}

bitflags! {
    /// Remapping behaviour.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct RemapFlags: u8 {
        /// Leave references from linked data and indirect usages untouched.
        const SKIP_INDIRECT_USAGE = 1 << 0;
        /// Leave never-null references untouched when remapping to null.
        const SKIP_NEVER_NULL_USAGE = 1 << 1;
        /// Tag with `DOIT` the IDs whose never-null reference is cleared.
        const FLAG_NEVER_NULL_USAGE = 1 << 2;
        /// Clear never-null references too.
        const FORCE_NEVER_NULL_USAGE = 1 << 3;
        /// Leave library override references untouched.
        const SKIP_OVERRIDE_LIBRARY = 1 << 4;
    }
}

bitflags! {
    /// Which dependencies a duplicate operation copies along.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct DuplicateFlags: u8 {
        /// Duplicate linked IDs as well (as local copies).
        const LINKED_ID = 1 << 0;
        /// Duplicate animation actions with their owner.
        const ACTION = 1 << 1;
    }
}
