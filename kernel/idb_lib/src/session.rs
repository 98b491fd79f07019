//! Process-scoped context.
//!
//! A [`Session`] holds what would otherwise be global state: the type
//! registry and the session-identifier counter. Create it once at startup with
//! [`Session::initialize`]; dropping the last reference is the shutdown.
//! Every database keeps an `Arc` to the session it was created in.

use std::sync::Arc;

use idb_ir::{Id, IdCode, IdFlag, SessionUid, SessionUidGenerator};

use crate::flags::CopyFlags;
use crate::idtype::{IdTypeInfo, IdTypeRegistry};
use crate::query::foreach_embedded_id;
use crate::IdError;

#[derive(Debug)]
pub struct Session {
    registry: IdTypeRegistry,
    uids: SessionUidGenerator,
}

impl Session {
    pub fn initialize(registry: IdTypeRegistry) -> Arc<Self> {
        tracing::debug!(types = registry.codes().len(), "ID session initialized");
        Arc::new(Self {
            registry,
            uids: SessionUidGenerator::new(),
        })
    }

    #[inline]
    pub fn registry(&self) -> &IdTypeRegistry {
        &self.registry
    }

    pub fn type_info(&self, code: IdCode) -> Result<&dyn IdTypeInfo, IdError> {
        self.registry.info(code)
    }

    pub fn new_session_uid(&self) -> SessionUid {
        self.uids.generate()
    }

    /// Give `id` (and its embedded IDs) a session identifier if it has none.
    pub fn session_uid_ensure(&self, id: &mut Id) {
        if !id.session_uid.is_set() {
            id.session_uid = self.uids.generate();
        }
        foreach_embedded_id(&self.registry, id, &mut |embedded| {
            if !embedded.session_uid.is_set() {
                embedded.session_uid = self.uids.generate();
            }
        });
    }

    /// Force a new session identifier.
    ///
    /// Only for UI data surviving a file reload and for linked IDs made local
    /// in place; everything else keeps its identity for the whole session.
    pub fn session_uid_renew(&self, id: &mut Id) {
        id.session_uid = SessionUid::UNSET;
        self.session_uid_ensure(id);
    }

    /// Restart numbering, for a full database reload.
    ///
    /// Called by [`reload_main`](crate::blend::reload_main) when no other
    /// database shares the session.
    pub fn reset_session_uids(&self) {
        self.uids.reset();
    }

    /// Allocate an ID outside any database.
    ///
    /// The name is taken as is (no uniqueness), `None` uses the type's default
    /// name. Without `NO_USER_REFCOUNT` the new ID starts with one user.
    pub fn id_new_nomain(
        &self,
        code: IdCode,
        name: Option<&str>,
        flags: CopyFlags,
    ) -> Result<Box<Id>, IdError> {
        let flags = (flags | CopyFlags::NO_MAIN).normalized();
        let info = self.type_info(code)?;
        let mut id = Box::new(Id::new(code, name.unwrap_or(info.name()), info.init_data()));
        id.tag.set(flags.creation_tags());
        if !flags.contains(CopyFlags::NO_USER_REFCOUNT) {
            id.us = 1;
        }
        if !flags.contains(CopyFlags::NO_ALLOCATE) {
            self.session_uid_ensure(&mut id);
        }
        tracing::trace!(code = %code, size = info.struct_size(), "allocated detached ID");
        Ok(id)
    }

    /// Allocate an embedded ID, to be stored inside its owner's payload.
    pub fn id_new_embedded(&self, code: IdCode, name: Option<&str>) -> Result<Box<Id>, IdError> {
        let mut id = self.id_new_nomain(code, name, CopyFlags::NO_USER_REFCOUNT)?;
        id.flag |= IdFlag::EMBEDDED_DATA;
        id.tag.set(idb_ir::IdTag::empty());
        Ok(id)
    }
}
