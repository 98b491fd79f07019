//! Freeing and deleting IDs.
//!
//! Freeing releases an ID's payload and, unless told otherwise, the users it
//! gives to other IDs. It does not touch references *to* the freed ID.
//! Deleting first unlinks every such reference and only then frees, so
//! nothing dangles.
//!
//! # Deletion
//!
//! Single and bulk deletion share one algorithm and differ only in when the
//! deleted IDs leave their lists:
//!
//! 1. Collect the `DOIT`-tagged IDs, the IDs linked from a tagged library,
//!    and the owned IDs (shape keys) of collected IDs.
//! 2. Unlink the collected IDs everywhere. An ID whose never-null reference
//!    gets cleared is tagged `DOIT` too, and step 1 runs again until nothing
//!    new is collected.
//! 3. Free the collected IDs.
//!
//! Bulk deletion removes collected IDs from their lists right away, so
//! references between deleted IDs are never walked; it releases each
//! deleted ID's own users once, when collected.

use std::sync::Arc;

use idb_ir::{Id, IdHandle, IdTag};
use rustc_hash::FxHashSet;

use crate::flags::{FreeFlags, RemapFlags};
use crate::idtype::IdTypeRegistry;
use crate::query::foreach_embedded_id;
use crate::remap::IdRemapper;
use crate::{IdError, Main};

/// Release a payload and those of its embedded IDs.
fn free_payload(registry: &IdTypeRegistry, id: &mut Id) {
    foreach_embedded_id(registry, id, &mut |embedded| {
        if let Some(info) = registry.get(embedded.code()) {
            info.free_data(&mut *embedded.data);
        }
    });
    if let Some(info) = registry.get(id.code()) {
        info.free_data(&mut *id.data);
    }
    id.anim_data = None;
    id.override_library = None;
    id.preview = None;
}

impl Main {
    /// Free a database ID, and the ID it owns.
    ///
    /// References to it elsewhere are left dangling. With `NOT_ALLOCATED`,
    /// the emptied record is handed back.
    pub fn id_free_ex(&mut self, handle: IdHandle, flags: FreeFlags) -> Result<Option<Box<Id>>, IdError> {
        if flags.contains(FreeFlags::NO_MAIN) {
            return Err(IdError::InvalidFlags("database IDs cannot be freed as NO_MAIN"));
        }
        self.try_id(handle)?;
        let owned = self
            .id_owned_get(handle)
            .filter(|&owned| self.id_owner_get(owned) == Some(handle));

        let id = self.free_record(handle, flags)?;
        if let Some(owned) = owned {
            self.free_record(owned, flags)?;
        }
        Ok(flags.contains(FreeFlags::NOT_ALLOCATED).then_some(id))
    }

    pub fn id_free(&mut self, handle: IdHandle) -> Result<(), IdError> {
        self.id_free_ex(handle, FreeFlags::empty()).map(drop)
    }

    /// Free a detached ID.
    ///
    /// With `use_flag_from_idtag`, `flags` is ignored and derived from the
    /// tags the ID was created with.
    pub fn id_free_detached(
        &mut self,
        mut id: Box<Id>,
        flags: FreeFlags,
        use_flag_from_idtag: bool,
    ) -> Option<Box<Id>> {
        let flags = if use_flag_from_idtag {
            FreeFlags::from_tags(id.tags())
        } else {
            flags
        } | FreeFlags::NO_MAIN;

        if !flags.contains(FreeFlags::NO_USER_REFCOUNT) {
            self.detached_refs_us_apply(&mut id, false);
        }
        let session = Arc::clone(self.session());
        free_payload(session.registry(), &mut id);
        tracing::trace!(id = %id.name.prefixed(), "freed detached ID");
        flags.contains(FreeFlags::NOT_ALLOCATED).then_some(id)
    }

    /// Remove one user and delete the ID when none is left.
    ///
    /// Returns whether the ID was deleted.
    pub fn id_free_us(&mut self, handle: IdHandle) -> Result<bool, IdError> {
        self.try_id(handle)?;
        self.id_us_min(handle);
        if self.id(handle).us == 0 {
            self.id_delete(handle, RemapFlags::empty())?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Delete one ID safely: every reference to it is cleared first.
    ///
    /// IDs that cannot live without it (never-null users, owned IDs, the
    /// content of a deleted library) are deleted as well.
    pub fn id_delete(&mut self, handle: IdHandle, extra_remap_flags: RemapFlags) -> Result<(), IdError> {
        self.try_id(handle)?;
        self.tag_all(IdTag::DOIT, false);
        self.id(handle).tag.insert(IdTag::DOIT);
        self.delete_tagged(false, extra_remap_flags);
        Ok(())
    }

    /// Delete every `DOIT`-tagged ID at once. Returns the number of deleted
    /// IDs, cascaded ones included.
    pub fn id_multi_tagged_delete(&mut self) -> usize {
        self.delete_tagged(true, RemapFlags::empty())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn delete_tagged(&mut self, bulk: bool, extra_remap_flags: RemapFlags) -> usize {
        let remap_flags =
            extra_remap_flags | RemapFlags::FLAG_NEVER_NULL_USAGE | RemapFlags::FORCE_NEVER_NULL_USAGE;
        let lock = self.lock().clone();
        let _guard = lock.acquire();

        let mut deleted: Vec<IdHandle> = Vec::new();
        let mut collected: FxHashSet<IdHandle> = FxHashSet::default();
        loop {
            let batch_start = deleted.len();
            for handle in self.all_handles() {
                if collected.contains(&handle) {
                    continue;
                }
                let Some(id) = self.get(handle) else {
                    continue;
                };
                let lib_deleted = id
                    .lib
                    .and_then(|lib| self.get(lib))
                    .is_some_and(|lib| lib.tag.contains(IdTag::DOIT));
                if !id.tag.contains(IdTag::DOIT) && !lib_deleted {
                    continue;
                }
                id.tag.insert(IdTag::DOIT);
                collected.insert(handle);
                deleted.push(handle);

                if let Some(owned) = self.id_owned_get(handle) {
                    if self.contains(owned) && collected.insert(owned) {
                        self.id(owned).tag.insert(IdTag::DOIT);
                        deleted.push(owned);
                    }
                }
            }
            if deleted.len() == batch_start {
                break;
            }

            let batch = deleted[batch_start..].to_vec();
            if bulk {
                for &handle in &batch {
                    let code = self.id(handle).code();
                    self.list_remove(code, handle);
                }
            }
            let remapper: IdRemapper = batch.iter().map(|&handle| (handle, None)).collect();
            let report = self.remap_multiple(&remapper, remap_flags);
            if !report.tagged_for_deletion.is_empty() {
                tracing::debug!(
                    count = report.tagged_for_deletion.len(),
                    "deleting users that cannot live without deleted IDs"
                );
            }
            if bulk {
                for &handle in &batch {
                    let released = self.id_refs_us_apply(handle, false, false);
                    debug_assert!(released.is_ok());
                }
            }
        }

        let free_flags = if bulk {
            FreeFlags::NO_UI_USER | FreeFlags::NO_USER_REFCOUNT
        } else {
            FreeFlags::NO_UI_USER
        };
        for &handle in deleted.iter().rev() {
            let freed = self.free_record(handle, free_flags);
            debug_assert!(freed.is_ok());
        }

        tracing::debug!(count = deleted.len(), bulk, "deleted IDs");
        deleted.len()
    }

    /// Free one database record, ignoring owned IDs.
    fn free_record(&mut self, handle: IdHandle, flags: FreeFlags) -> Result<Box<Id>, IdError> {
        let code = self.try_id(handle)?.code();
        if !flags.contains(FreeFlags::NO_USER_REFCOUNT) {
            self.id_refs_us_apply(handle, false, !flags.contains(FreeFlags::NO_UI_USER))?;
        }

        let lock = self.lock().clone();
        let _guard = lock.acquire();
        self.list_remove(code, handle);
        let mut id = self.arena_take(handle).ok_or(IdError::StaleHandle(handle))?;
        id.tag.insert(IdTag::NO_MAIN);

        let session = Arc::clone(self.session());
        free_payload(session.registry(), &mut id);
        if !flags.contains(FreeFlags::NO_DEG_TAG) {
            self.tag_relations_update();
        }
        tracing::trace!(id = %id.name.prefixed(), ?handle, "freed ID");
        Ok(id)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
