//! Making linked data local.
//!
//! A linked ID becomes local either in place (its library is cleared) or by
//! a local copy that takes over its local users. In place is only valid when
//! no linked ID keeps using it:
//!
//! | users            | action                 |
//! |------------------|------------------------|
//! | none             | in place               |
//! | linked only      | nothing                |
//! | local only       | in place               |
//! | local and linked | copy                   |
//!
//! When a whole library is made local, linked users that will become local
//! themselves count as local.

use std::sync::Arc;

use idb_ir::{IdCode, IdFlag, IdHandle, IdTag, RefKind, WalkFlags, WalkStep};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::alloc::AllocatedId;
use crate::copy::DuplicateMap;
use crate::flags::{CopyFlags, MakeLocalFlags, RemapFlags};
use crate::naming::IdNewNameMode;
use crate::query::{foreach_id_link, id_test_usages, MainIdRelations};
use crate::stack::ensure_sufficient_stack;
use crate::{IdError, Main};

/// Outcome of [`Main::make_local_generic_action_define`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct LocalAction {
    pub force_local: bool,
    pub force_copy: bool,
}

impl Main {
    /// Turn a linked ID into a local one in place.
    ///
    /// The ID gets a new session identity and a name unique among local
    /// IDs. Relative paths are rebased out of the library. The fake user is
    /// dropped; its owned ID follows.
    pub fn clear_library_data(&mut self, handle: IdHandle, flags: MakeLocalFlags) -> Result<(), IdError> {
        let Some(lib) = self.try_id(handle)?.lib else {
            return Ok(());
        };
        self.library_local_paths(handle, lib)?;
        self.id_fake_user_clear(handle);

        let id = self.id_mut(handle);
        id.lib = None;
        id.tag.remove(IdTag::INDIRECT | IdTag::EXTERN);
        id.flag -= IdFlag::INDIRECT_WEAK_LINK;
        if flags.contains(MakeLocalFlags::LIBOVERRIDE_CLEAR) {
            id.override_library = None;
            id.flag -= IdFlag::EMBEDDED_DATA_LIB_OVERRIDE;
        }

        self.id_new_name_validate(handle, None, IdNewNameMode::RenameExistingNever, false)?;
        self.id_session_uid_renew(handle)?;

        if let Some(owned) = self.id_owned_get(handle) {
            if self.get(owned).is_some_and(|owned| owned.is_linked()) {
                self.clear_library_data(owned, flags)?;
            }
        }
        tracing::debug!(id = %self.id(handle).name.prefixed(), "cleared library data");
        Ok(())
    }

    /// Mark every linkable ID used by `handle` as directly linked.
    ///
    /// Needed once an ID became local, so the indirect data it pulls in is
    /// known to be used directly.
    pub fn expand_local(&mut self, handle: IdHandle, _flags: MakeLocalFlags) -> Result<(), IdError> {
        foreach_id_link(self, handle, WalkFlags::READONLY, |main, link| {
            if link.is_embedded() || link.kind.contains(RefKind::LOOPBACK) || link.is_self_reference() {
                return WalkStep::Continue;
            }
            if let Some(target) = link.handle() {
                let linkable = main
                    .get(target)
                    .is_some_and(|id| main.registry().is_linkable(id.code()));
                if linkable {
                    main.id_lib_extern(target);
                }
            }
            WalkStep::Continue
        })
    }

    /// Rebase the library-relative paths (`//...`) of `handle` onto the
    /// directory of `lib`.
    pub fn library_local_paths(&mut self, handle: IdHandle, lib: IdHandle) -> Result<(), IdError> {
        let mut lib_path = None;
        self.id_foreach_path(lib, &mut |path| {
            lib_path.get_or_insert_with(|| path.clone());
        })?;
        let Some(lib_path) = lib_path else {
            return Ok(());
        };
        let lib_dir = lib_path.rsplit_once('/').map_or("", |(dir, _)| dir).to_owned();

        self.id_foreach_path(handle, &mut |path| {
            if let Some(relative) = path.strip_prefix("//") {
                *path = if lib_dir.is_empty() {
                    relative.to_owned()
                } else {
                    format!("{lib_dir}/{relative}")
                };
            }
        })
    }

    /// Decide how a linked ID is made local. See the module table.
    pub fn make_local_generic_action_define(&mut self, handle: IdHandle, flags: MakeLocalFlags) -> LocalAction {
        let force_local = flags.contains(MakeLocalFlags::FORCE_LOCAL);
        let force_copy = flags.contains(MakeLocalFlags::FORCE_COPY);
        debug_assert!(!(force_local && force_copy));
        if force_local || force_copy {
            return LocalAction {
                force_local,
                force_copy,
            };
        }

        let lib_local = flags.contains(MakeLocalFlags::FULL_LIBRARY);
        let usage = id_test_usages(self, handle);
        let mut action = LocalAction::default();
        if !lib_local && !usage.local && !usage.linked {
            action.force_local = true;
        } else if lib_local || usage.local {
            if usage.linked {
                action.force_copy = true;
            } else {
                action.force_local = true;
            }
        }
        action
    }

    /// The generic make-local algorithm.
    ///
    /// A copy is recorded in `duplicates`, with its owned ID. Outside of
    /// full-library mode, local users are remapped to the copy right away.
    pub fn make_local_generic(
        &mut self,
        handle: IdHandle,
        flags: MakeLocalFlags,
        duplicates: &mut DuplicateMap,
    ) -> Result<(), IdError> {
        if !self.try_id(handle)?.is_linked() {
            return Ok(());
        }

        let action = self.make_local_generic_action_define(handle, flags);
        if action.force_local {
            self.clear_library_data(handle, flags)?;
            self.expand_local(handle, flags)?;
        } else if action.force_copy {
            let mut copy_flags = CopyFlags::DEFAULT;
            if flags.contains(MakeLocalFlags::LIBOVERRIDE_CLEAR) {
                copy_flags |= CopyFlags::COPY_NO_LIB_OVERRIDE;
            }
            let AllocatedId::InMain(copied) = self.id_copy_ex(handle, copy_flags)? else {
                return Ok(());
            };
            // The copy takes its users over from the linked ID.
            self.id_mut(copied).us = 0;
            duplicates.insert(handle, copied);
            if let (Some(owned), Some(owned_copy)) = (self.id_owned_get(handle), self.id_owned_get(copied)) {
                if owned != owned_copy {
                    duplicates.insert(owned, owned_copy);
                }
            }

            if !flags.contains(MakeLocalFlags::FULL_LIBRARY) {
                self.libblock_remap(handle, Some(copied), RemapFlags::SKIP_INDIRECT_USAGE);
            }
        }
        Ok(())
    }

    /// Make a linked ID local through its type's make-local callback.
    ///
    /// Returns `false` for indirectly linked IDs, unless `FULL_LIBRARY` or
    /// `INDIRECT` is given.
    pub fn make_local(
        &mut self,
        handle: IdHandle,
        flags: MakeLocalFlags,
        duplicates: &mut DuplicateMap,
    ) -> Result<bool, IdError> {
        let id = self.try_id(handle)?;
        let code = id.code();
        let lib_local = flags.contains(MakeLocalFlags::FULL_LIBRARY);
        if !(lib_local || flags.contains(MakeLocalFlags::INDIRECT)) && id.tag.contains(IdTag::INDIRECT) {
            return Ok(false);
        }
        if !self.registry().is_linkable(code) {
            return Err(IdError::NotLinkable(code));
        }

        let session = Arc::clone(self.session());
        session.registry().info(code)?.make_local(self, handle, flags, duplicates)?;
        Ok(true)
    }

    /// Make local every ID linked from `lib` (from any library with `None`).
    ///
    /// IDs only used by data that is or becomes local are made local in
    /// place; the others are copied and their local users remapped to the
    /// copy. With `untagged_only`, IDs tagged `PRE_EXISTING` are skipped.
    /// With `set_fake`, processed IDs other than objects and collections get
    /// a fake user.
    ///
    /// Returns the linked → local copy map.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn make_library_local(
        &mut self,
        lib: Option<IdHandle>,
        untagged_only: bool,
        set_fake: bool,
    ) -> Result<FxHashMap<IdHandle, IdHandle>, IdError> {
        let relations = MainIdRelations::build(self);

        // Detect the IDs to make local.
        let mut todo: Vec<IdHandle> = Vec::new();
        let mut done: FxHashSet<IdHandle> = FxHashSet::default();
        let codes: Vec<IdCode> = self.registry().codes().to_vec();
        for &code in codes.iter().rev() {
            let linkable = self.registry().is_linkable(code);
            for &handle in self.handles(code) {
                let Some(id) = self.get(handle) else {
                    continue;
                };
                id.tag.remove(IdTag::DOIT);
                if !id.is_linked() {
                    id.tag.remove(IdTag::EXTERN | IdTag::INDIRECT | IdTag::NEW);
                } else if linkable
                    && id.tag.intersects(IdTag::EXTERN | IdTag::INDIRECT | IdTag::NEW)
                    && (lib.is_none() || id.lib == lib)
                    && !(untagged_only && id.tag.contains(IdTag::PRE_EXISTING))
                {
                    todo.push(handle);
                    id.tag.insert(IdTag::DOIT);
                } else {
                    done.insert(handle);
                }
            }
        }
        for handle in self.all_handles() {
            if !self.id(handle).is_linked() {
                self.id_mut(handle).flag -= IdFlag::INDIRECT_WEAK_LINK;
            }
        }

        // Find which of them can be made local in place.
        let mut loop_tags: FxHashSet<IdHandle> = FxHashSet::default();
        for &handle in &todo {
            self.make_local_copying_check(handle, &mut loop_tags, &relations, &mut done);
            debug_assert!(loop_tags.is_empty());
        }
        drop(relations);

        // Make them local, in place or by copy.
        let mut duplicates = DuplicateMap::new();
        let mut copied: Vec<IdHandle> = Vec::new();
        for &handle in &todo {
            let code = self.id(handle).code();
            if self.id(handle).tag.contains(IdTag::DOIT) {
                self.clear_library_data(handle, MakeLocalFlags::empty())?;
                self.expand_local(handle, MakeLocalFlags::empty())?;
                self.id(handle).tag.remove(IdTag::DOIT);
            } else {
                match self.make_local(handle, MakeLocalFlags::FULL_LIBRARY, &mut duplicates) {
                    Ok(_) => {}
                    Err(IdError::CopyUnsupported(code)) => {
                        tracing::warn!(code = %code, "linked ID cannot be copied, left linked");
                    }
                    Err(err) => return Err(err),
                }
                if duplicates.contains(handle) {
                    copied.push(handle);
                }
            }

            if set_fake && code != IdCode::OB && code != IdCode::GR {
                self.id_fake_user_set(handle);
            }
        }

        // Remap local usages of the copied linked IDs.
        let mut old_to_new = FxHashMap::default();
        for &handle in &copied {
            let Some(new) = duplicates.get(handle) else {
                continue;
            };
            self.libblock_remap(handle, Some(new), RemapFlags::SKIP_INDIRECT_USAGE);
            old_to_new.insert(handle, new);
            if self.id(handle).code() == IdCode::GR && self.id(handle).tag.contains(IdTag::INDIRECT) {
                self.id_us_ensure_real(new);
            }
        }

        self.tag_all(IdTag::NEW, false);
        tracing::debug!(
            processed = todo.len(),
            copied = old_to_new.len(),
            "made library data local"
        );
        Ok(old_to_new)
    }

    /// Clear `DOIT` on `handle` when one of its users stays linked.
    fn make_local_copying_check(
        &self,
        handle: IdHandle,
        loop_tags: &mut FxHashSet<IdHandle>,
        relations: &MainIdRelations,
        done: &mut FxHashSet<IdHandle>,
    ) {
        if done.contains(&handle) {
            return;
        }
        loop_tags.insert(handle);
        for &(from, kind) in relations.users_of(handle) {
            if kind.contains(RefKind::LOOPBACK) {
                continue;
            }
            // Owned IDs are private to their owner, which is the real user.
            let from = self.id_owner_get(from).unwrap_or(from);
            if !self.get(from).is_some_and(|id| id.is_linked()) {
                continue;
            }
            if !done.contains(&from) {
                // Dependency loops say nothing about the final state.
                if loop_tags.contains(&from) {
                    continue;
                }
                ensure_sufficient_stack(|| self.make_local_copying_check(from, loop_tags, relations, done));
            }
            if !self.get(from).is_some_and(|id| id.tag.contains(IdTag::DOIT)) {
                if let Some(id) = self.get(handle) {
                    id.tag.remove(IdTag::DOIT);
                }
                break;
            }
        }
        done.insert(handle);
        loop_tags.remove(&handle);
    }

    /// Can the user edit this ID?
    pub fn id_is_editable(&self, handle: IdHandle) -> bool {
        self.get(handle).is_some_and(|id| !id.is_linked())
    }

    /// May `from` store a reference to `to`? Linked data cannot use local
    /// data, and database IDs cannot use detached ones.
    pub fn id_can_use_id(&self, from: IdHandle, to: IdHandle) -> bool {
        match (self.get(from), self.get(to)) {
            (Some(from), Some(to)) => {
                !(from.is_linked() && !to.is_linked())
                    && !(!from.tag.contains(IdTag::NO_MAIN) && to.tag.contains(IdTag::NO_MAIN))
            }
            _ => false,
        }
    }

    /// Owner of an owned ID (the geometry of a shape key).
    pub fn id_owner_get(&self, handle: IdHandle) -> Option<IdHandle> {
        let id = self.get(handle)?;
        self.registry().get(id.code())?.owner_id(&*id.data)
    }

    /// ID owned by `handle` (the shape key of a geometry).
    pub fn id_owned_get(&self, handle: IdHandle) -> Option<IdHandle> {
        let id = self.get(handle)?;
        self.registry().get(id.code())?.owned_id(&*id.data)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
