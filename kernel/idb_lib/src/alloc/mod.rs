//! Allocation of new IDs, and moving IDs in and out of a database.

use idb_ir::{Id, IdCode, IdHandle, IdTag};

use crate::flags::CopyFlags;
use crate::naming::IdNewNameMode;
use crate::{IdError, Main};

/// Result of an allocation or copy: stored in the database, or detached and
/// owned by the caller.
#[derive(Debug)]
pub enum AllocatedId {
    InMain(IdHandle),
    Detached(Box<Id>),
}

impl AllocatedId {
    pub fn handle(&self) -> Option<IdHandle> {
        match self {
            Self::InMain(handle) => Some(*handle),
            Self::Detached(_) => None,
        }
    }

    pub fn into_detached(self) -> Option<Box<Id>> {
        match self {
            Self::InMain(_) => None,
            Self::Detached(id) => Some(id),
        }
    }
}

impl Main {
    /// Allocate a local ID in this database, with one user.
    ///
    /// `None` uses the type's default name; the name is made unique.
    pub fn id_new(&mut self, code: IdCode, name: Option<&str>) -> Result<IdHandle, IdError> {
        self.id_new_in_main(code, name, CopyFlags::empty(), None)
    }

    /// Allocate an ID linked from `lib`. The name is made unique within the
    /// library.
    pub fn id_new_in_lib(
        &mut self,
        code: IdCode,
        name: Option<&str>,
        lib: IdHandle,
    ) -> Result<IdHandle, IdError> {
        if self.try_id(lib)?.code() != IdCode::LI {
            return Err(IdError::StaleHandle(lib));
        }
        if !self.registry().is_linkable(code) {
            return Err(IdError::NotLinkable(code));
        }
        self.id_new_in_main(code, name, CopyFlags::empty(), Some(lib))
    }

    /// Allocate an ID under creation `flags`.
    ///
    /// With `NO_MAIN`, the ID is returned detached: its name is not made
    /// unique and nothing in the database changes.
    pub fn id_new_ex(
        &mut self,
        code: IdCode,
        name: Option<&str>,
        flags: CopyFlags,
        lib: Option<IdHandle>,
    ) -> Result<AllocatedId, IdError> {
        let flags = flags.normalized();
        if flags.contains(CopyFlags::CREATE_LOCAL) && !flags.contains(CopyFlags::NO_MAIN) {
            return Err(IdError::InvalidFlags("CREATE_LOCAL requires NO_MAIN"));
        }

        if flags.contains(CopyFlags::NO_MAIN) {
            let mut id = self.session().id_new_nomain(code, name, flags)?;
            id.lib = lib;
            return Ok(AllocatedId::Detached(id));
        }
        self.id_new_in_main(code, name, flags, lib).map(AllocatedId::InMain)
    }

    fn id_new_in_main(
        &mut self,
        code: IdCode,
        name: Option<&str>,
        flags: CopyFlags,
        lib: Option<IdHandle>,
    ) -> Result<IdHandle, IdError> {
        let mut id = self.session().id_new_nomain(code, name, flags)?;
        id.tag.set(IdTag::empty());
        id.lib = lib;
        if lib.is_some() {
            id.tag.insert(IdTag::EXTERN);
        }

        let was_dirty = self.is_relations_dirty();
        let handle = self.add_to_main(None, id, true)?;
        if flags.contains(CopyFlags::NO_DEG_TAG) && !was_dirty {
            self.clear_relations_dirty();
        }
        tracing::debug!(id = %self.id(handle).name.prefixed(), ?handle, "allocated ID");
        Ok(handle)
    }

    /// Store `id` under `slot` (a reserved handle) or a fresh handle.
    ///
    /// Gives the ID its session identity, validates its name (linked names
    /// only when `validate_linked`), and inserts it in its sorted list.
    pub(crate) fn add_to_main(
        &mut self,
        slot: Option<IdHandle>,
        mut id: Box<Id>,
        validate_linked: bool,
    ) -> Result<IdHandle, IdError> {
        let code = id.code();
        if let Err(err) = self.registry().info(code) {
            if let Some(slot) = slot {
                self.release_reserved(slot);
            }
            return Err(err);
        }

        let lock = self.lock().clone();
        let _guard = lock.acquire();

        id.tag.remove(IdTag::NO_MAIN);
        self.session().session_uid_ensure(&mut id);

        let handle = slot.unwrap_or_else(|| self.reserve());
        self.checkin(handle, id);
        self.list_mut(code).push(handle);
        self.id_new_name_validate(
            handle,
            None,
            IdNewNameMode::RenameExistingNever,
            validate_linked,
        )?;
        self.tag_relations_update();
        Ok(handle)
    }

    /// Move a detached ID into the database.
    ///
    /// If the ID was created without user counting of its references, those
    /// references are counted now.
    pub fn libblock_management_main_add(&mut self, id: Box<Id>) -> Result<IdHandle, IdError> {
        debug_assert!(!id.is_embedded(), "embedded IDs cannot be stored in a database");
        let uncounted = id.tag.contains(IdTag::NO_USER_REFCOUNT);
        id.tag.remove(IdTag::NOT_ALLOCATED | IdTag::LOCALIZED);
        let handle = self.add_to_main(None, id, false)?;
        if uncounted {
            self.libblock_management_usercounts_set(handle)?;
        }
        tracing::debug!(id = %self.id(handle).name.prefixed(), "moved ID into database");
        Ok(handle)
    }

    /// Move an ID out of the database. Its handle becomes stale.
    ///
    /// References to it held by other IDs are left dangling, and the users it
    /// gives to other IDs stay counted; use [`Main::id_delete`] for a safe
    /// removal.
    pub fn libblock_management_main_remove(&mut self, handle: IdHandle) -> Result<Box<Id>, IdError> {
        let code = self.try_id(handle)?.code();
        let lock = self.lock().clone();
        let _guard = lock.acquire();

        self.list_remove(code, handle);
        let id = self.arena_take(handle).ok_or(IdError::StaleHandle(handle))?;
        id.tag.insert(IdTag::NO_MAIN);
        self.tag_relations_update();
        Ok(id)
    }

    /// Start counting the references of `handle` as users.
    pub fn libblock_management_usercounts_set(&mut self, handle: IdHandle) -> Result<(), IdError> {
        if !self.try_id(handle)?.tag.contains(IdTag::NO_USER_REFCOUNT) {
            return Ok(());
        }
        self.id_refs_us_apply(handle, true, true)?;
        self.id(handle).tag.remove(IdTag::NO_USER_REFCOUNT);
        Ok(())
    }

    /// Stop counting the references of `handle` as users.
    pub fn libblock_management_usercounts_clear(&mut self, handle: IdHandle) -> Result<(), IdError> {
        if self.try_id(handle)?.tag.contains(IdTag::NO_USER_REFCOUNT) {
            return Ok(());
        }
        self.id_refs_us_apply(handle, false, true)?;
        self.id(handle).tag.insert(IdTag::NO_USER_REFCOUNT);
        Ok(())
    }

    pub fn id_session_uid_ensure(&mut self, handle: IdHandle) -> Result<(), IdError> {
        let session = std::sync::Arc::clone(self.session());
        session.session_uid_ensure(self.try_id_mut(handle)?);
        Ok(())
    }

    /// Force a new session identity. See [`Session::session_uid_renew`](crate::Session::session_uid_renew).
    pub fn id_session_uid_renew(&mut self, handle: IdHandle) -> Result<(), IdError> {
        let session = std::sync::Arc::clone(self.session());
        session.session_uid_renew(self.try_id_mut(handle)?);
        Ok(())
    }

    #[inline]
    pub fn id_is_in_main(&self, handle: IdHandle) -> bool {
        self.contains(handle)
    }
}
