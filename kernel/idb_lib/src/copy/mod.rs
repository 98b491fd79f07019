//! Copying IDs.
//!
//! A copy runs in three steps:
//!
//! 1. the source is checked out and its header and payload are copied, the
//!    payload through the type's `copy_data` (embedded IDs always follow,
//!    owned sub-IDs follow the deep-copy flags);
//! 2. the result is stored in the database (or returned detached);
//! 3. one reference walk over the result redirects self references to the
//!    copy and adds the users of every counted reference.
//!
//! A new database copy has exactly one user, meant to be handed to whoever
//! stores the first reference to it.

use std::sync::Arc;

use idb_ir::{Id, IdFlag, IdHandle, IdTag, RefKind, WalkFlags, WalkStep};
use rustc_hash::FxHashMap;

use crate::alloc::AllocatedId;
use crate::flags::{CopyFlags, DuplicateFlags, MakeLocalFlags};
use crate::idtype::IdTypeFlags;
use crate::query::foreach_id_link;
use crate::remap::IdRemapper;
use crate::users::us_min;
use crate::{IdError, Main};

/// State handed to [`IdTypeInfo::copy_data`](crate::IdTypeInfo::copy_data).
pub struct CopyContext<'a> {
    main: &'a mut Main,
    flags: CopyFlags,
    dst: Option<IdHandle>,
    src: Option<IdHandle>,
}

impl CopyContext<'_> {
    #[inline]
    pub fn flags(&self) -> CopyFlags {
        self.flags
    }

    /// Handle the copy will have, `None` for detached copies.
    #[inline]
    pub fn dst(&self) -> Option<IdHandle> {
        self.dst
    }

    #[inline]
    pub fn src(&self) -> Option<IdHandle> {
        self.src
    }

    /// The database, with the source checked out.
    pub fn main(&mut self) -> &mut Main {
        self.main
    }

    /// Copy an embedded ID of the source.
    pub fn copy_embedded(&mut self, src: &Id) -> Result<Box<Id>, IdError> {
        debug_assert!(src.is_embedded());
        copy_record(self, src)
    }

    /// Deep-copy a database ID owned by the source (shape key, action).
    ///
    /// The copy ends up owned by the destination only: its creation user is
    /// released here and given back by the reference walk over the
    /// destination. Detached copies cannot own database IDs and keep sharing
    /// the source's.
    pub fn copy_owned_id(&mut self, owned: IdHandle) -> Result<Option<IdHandle>, IdError> {
        if self.dst.is_none() {
            return Ok(Some(owned));
        }
        let copied = match self.main.id_copy_ex(owned, self.flags)? {
            AllocatedId::InMain(copied) => copied,
            AllocatedId::Detached(_) => return Ok(Some(owned)),
        };

        let session = Arc::clone(self.main.session());
        let id = self.main.id_mut(copied);
        if let Some(info) = session.registry().get(id.code()) {
            info.set_owner_id(&mut *id.data, self.dst);
        }
        us_min(id);
        Ok(Some(copied))
    }
}

fn copy_record(ctx: &mut CopyContext<'_>, src: &Id) -> Result<Box<Id>, IdError> {
    let session = Arc::clone(ctx.main.session());
    let info = session.registry().info(src.code())?;
    let type_flags = info.flags();
    if type_flags.contains(IdTypeFlags::NO_COPY) {
        return Err(IdError::CopyUnsupported(src.code()));
    }
    let flags = ctx.flags;

    let mut anim_data = None;
    if !flags.contains(CopyFlags::COPY_NO_ANIMDATA) && !type_flags.contains(IdTypeFlags::NO_ANIMDATA) {
        if let Some(anim) = &src.anim_data {
            let mut anim = anim.clone();
            if flags.contains(CopyFlags::COPY_ACTIONS) {
                if let Some(action) = anim.action {
                    anim.action = ctx.copy_owned_id(action)?;
                }
            }
            anim_data = Some(anim);
        }
    }

    let data = info.copy_data(ctx, &*src.data)?;

    let mut id = Box::new(Id::new(src.code(), src.name.as_str(), data));
    id.flag = src.flag & IdFlag::EMBEDDED_DATA;
    id.anim_data = anim_data;
    if !flags.contains(CopyFlags::COPY_NO_LIB_OVERRIDE) {
        id.override_library = src.override_library.clone();
        id.flag |= src.flag & IdFlag::EMBEDDED_DATA_LIB_OVERRIDE;
    }
    if !flags.contains(CopyFlags::COPY_NO_PREVIEW) {
        id.preview = src.preview.clone();
    }
    Ok(id)
}

impl Main {
    /// Regular user-level copy, stored in the database with one user.
    pub fn id_copy(&mut self, src: IdHandle) -> Result<IdHandle, IdError> {
        match self.id_copy_ex(src, CopyFlags::DEFAULT)? {
            AllocatedId::InMain(handle) => Ok(handle),
            AllocatedId::Detached(_) => Err(IdError::InvalidFlags("default copy must stay in the database")),
        }
    }

    /// Copy under `flags`. See [`CopyFlags`] for the combinations.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn id_copy_ex(&mut self, src: IdHandle, flags: CopyFlags) -> Result<AllocatedId, IdError> {
        let flags = flags.normalized();
        if flags.contains(CopyFlags::NO_ALLOCATE) {
            return Err(IdError::InvalidFlags("NO_ALLOCATE needs a destination, use id_copy_into"));
        }
        if flags.contains(CopyFlags::CREATE_LOCAL) && !flags.contains(CopyFlags::NO_MAIN) {
            return Err(IdError::InvalidFlags("CREATE_LOCAL requires NO_MAIN"));
        }

        let (mut id, dst, src_lib) = self.copy_checked_out(src, flags)?;
        let session = Arc::clone(self.session());

        id.lib = if flags.intersects(CopyFlags::NO_MAIN | CopyFlags::COPY_KEEP_LIB) {
            src_lib
        } else {
            None
        };
        id.us = i32::from(!flags.contains(CopyFlags::NO_USER_REFCOUNT));
        id.tag.set(flags.creation_tags());
        session.session_uid_ensure(&mut id);

        let Some(dst) = dst else {
            if !flags.contains(CopyFlags::NO_USER_REFCOUNT) {
                self.detached_refs_us_apply(&mut id, true);
            }
            tracing::debug!(id = %id.name.prefixed(), "copied to detached ID");
            return Ok(AllocatedId::Detached(id));
        };

        let was_dirty = self.is_relations_dirty();
        let handle = self.add_to_main(Some(dst), id, true)?;
        self.copy_libmanagement(src, handle)?;

        if self.id(handle).is_linked() {
            self.id(handle).tag.insert(IdTag::EXTERN);
        } else if let Some(lib) = src_lib {
            self.expand_local(handle, MakeLocalFlags::empty())?;
            self.library_local_paths(handle, lib)?;
        }
        if flags.contains(CopyFlags::NO_DEG_TAG) && !was_dirty {
            self.clear_relations_dirty();
        }

        tracing::debug!(id = %self.id(handle).name.prefixed(), ?handle, "copied ID");
        Ok(AllocatedId::InMain(handle))
    }

    /// Copy into caller-provided storage (`NO_ALLOCATE`).
    ///
    /// `dst` is overwritten in place and keeps its tag cell and its session
    /// identity. Like a detached copy, it has one user and counts its
    /// references unless `NO_USER_REFCOUNT` is set.
    pub fn id_copy_into(&mut self, src: IdHandle, dst: &mut Id, flags: CopyFlags) -> Result<(), IdError> {
        let flags = (flags | CopyFlags::NO_ALLOCATE).normalized();
        let (mut id, _, src_lib) = self.copy_checked_out(src, flags)?;

        id.lib = src_lib;
        id.us = i32::from(!flags.contains(CopyFlags::NO_USER_REFCOUNT));
        id.session_uid = dst.session_uid;
        id.tag = Arc::clone(&dst.tag);
        id.tag.set(flags.creation_tags());
        if !flags.contains(CopyFlags::NO_USER_REFCOUNT) {
            self.detached_refs_us_apply(&mut id, true);
        }
        *dst = *id;
        Ok(())
    }

    /// Copy an ID as part of a multi-ID duplication.
    ///
    /// Each source is copied once: later calls return the copy recorded in
    /// `duplicates`. Linked sources are returned unchanged unless
    /// `DuplicateFlags::LINKED_ID` is set. The copy has no user yet; the
    /// caller gives it its users while relinking.
    pub fn id_copy_for_duplicate(
        &mut self,
        src: IdHandle,
        duplicates: &mut DuplicateMap,
        duplicate_flags: DuplicateFlags,
        copy_flags: CopyFlags,
    ) -> Result<IdHandle, IdError> {
        if let Some(existing) = duplicates.get(src) {
            return Ok(existing);
        }
        if self.try_id(src)?.is_linked() && !duplicate_flags.contains(DuplicateFlags::LINKED_ID) {
            return Ok(src);
        }

        let copy_flags = copy_flags - (CopyFlags::NO_MAIN | CopyFlags::NO_USER_REFCOUNT);
        let copied = match self.id_copy_ex(src, copy_flags)? {
            AllocatedId::InMain(copied) => copied,
            AllocatedId::Detached(_) => return Err(IdError::InvalidFlags("duplicates must stay in the database")),
        };
        self.id_us_min(copied);
        duplicates.insert(src, copied);
        self.id(copied).tag.insert(IdTag::NEW);

        let session = Arc::clone(self.session());
        let owned_of = |main: &Main, handle: IdHandle| {
            main.get(handle).and_then(|id| {
                session
                    .registry()
                    .get(id.code())
                    .and_then(|info| info.owned_id(&*id.data))
            })
        };
        let new_owned = owned_of(self, copied);
        if let (Some(old_key), Some(new_key)) = (owned_of(self, src), new_owned) {
            if old_key != new_key {
                duplicates.insert(old_key, new_key);
                self.id(new_key).tag.insert(IdTag::NEW);
            }
        }

        if duplicate_flags.contains(DuplicateFlags::ACTION) {
            self.duplicate_action(copied, duplicates, duplicate_flags, copy_flags)?;
            if let Some(new_key) = new_owned {
                self.duplicate_action(new_key, duplicates, duplicate_flags, copy_flags)?;
            }
        }
        Ok(copied)
    }

    fn duplicate_action(
        &mut self,
        owner: IdHandle,
        duplicates: &mut DuplicateMap,
        duplicate_flags: DuplicateFlags,
        copy_flags: CopyFlags,
    ) -> Result<(), IdError> {
        let Some(action) = self.try_id(owner)?.anim_data.as_ref().and_then(|anim| anim.action) else {
            return Ok(());
        };
        let new_action = self.id_copy_for_duplicate(action, duplicates, duplicate_flags, copy_flags)?;
        if new_action != action {
            if let Some(anim) = self.id_mut(owner).anim_data.as_mut() {
                anim.action = Some(new_action);
            }
            self.id_us_min(action);
            self.id_us_plus(new_action);
        }
        Ok(())
    }

    /// Check out `src`, build its copy, check it back in.
    ///
    /// Returns the copy, its reserved handle (in-database copies) and the
    /// source's library.
    fn copy_checked_out(
        &mut self,
        src: IdHandle,
        flags: CopyFlags,
    ) -> Result<(Box<Id>, Option<IdHandle>, Option<IdHandle>), IdError> {
        let code = self.try_id(src)?.code();
        if self.registry().info(code)?.flags().contains(IdTypeFlags::NO_COPY) {
            return Err(IdError::CopyUnsupported(code));
        }

        let src_id = self.checkout(src).ok_or(IdError::StaleHandle(src))?;
        let src_lib = src_id.lib;
        let dst = (!flags.contains(CopyFlags::NO_MAIN)).then(|| self.reserve());

        let mut ctx = CopyContext {
            main: self,
            flags,
            dst,
            src: Some(src),
        };
        let built = copy_record(&mut ctx, &src_id);
        self.checkin(src, src_id);

        match built {
            Ok(id) => Ok((id, dst, src_lib)),
            Err(err) => {
                if let Some(dst) = dst {
                    self.release_reserved(dst);
                }
                Err(err)
            }
        }
    }

    /// Redirect self references of a fresh copy and count its references.
    fn copy_libmanagement(&mut self, src: IdHandle, dst: IdHandle) -> Result<(), IdError> {
        foreach_id_link(self, dst, WalkFlags::INCLUDE_UI, |main, link| {
            let Some(mut target) = link.handle() else {
                return WalkStep::Continue;
            };
            if target == src {
                link.set(Some(dst));
                target = dst;
            }
            if target == dst {
                return WalkStep::Continue;
            }
            if link.kind.contains(RefKind::USER) {
                if link.owner_is_linked {
                    main.id_us_plus_no_lib(target);
                } else {
                    main.id_us_plus(target);
                }
            } else if link.kind.contains(RefKind::USER_ONE) {
                main.id_us_ensure_real(target);
            }
            WalkStep::Continue
        })
    }
}

/// Old → new map of a multi-ID duplication.
///
/// IDs created through it are tagged `NEW` until [`DuplicateMap::finish`].
#[derive(Debug, Default)]
pub struct DuplicateMap {
    map: FxHashMap<IdHandle, IdHandle>,
}

impl DuplicateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, old: IdHandle) -> Option<IdHandle> {
        self.map.get(&old).copied()
    }

    pub fn insert(&mut self, old: IdHandle, new: IdHandle) {
        self.map.insert(old, new);
    }

    pub fn contains(&self, old: IdHandle) -> bool {
        self.map.contains_key(&old)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IdHandle, IdHandle)> + '_ {
        self.map.iter().map(|(&old, &new)| (old, new))
    }

    /// Remapper redirecting every duplicated source to its copy.
    pub fn to_remapper(&self) -> IdRemapper {
        let mut remapper = IdRemapper::new();
        for (old, new) in self.iter() {
            remapper.add(old, Some(new));
        }
        remapper
    }

    /// End the duplication: clear the `NEW` tags.
    pub fn finish(self, main: &Main) {
        for new in self.map.into_values() {
            if let Some(id) = main.get(new) {
                id.tag.remove(IdTag::NEW);
            }
        }
    }
}
