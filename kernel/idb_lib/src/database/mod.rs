//! The database of all data-blocks.
//!
//! `Main` owns every ID of a session (local and linked) in an arena, and keeps
//! one name-sorted list of handles per type code.
//!
//! # Invariants
//!
//! - A handle is listed exactly once, in the list of its ID's type.
//! - Lists are sorted by library, then case-insensitive name, except inside
//!   [`Main::with_bulk_edit`], which restores the order on exit.
//! - An ID belongs to one database at most. Detached (no-main) IDs are plain
//!   `Box<Id>` values owned by their caller.
//!
//! # Locking
//!
//! Mutation requires `&mut Main`, so a single writer is enforced by the
//! borrow checker. The [`MainLock`] is the coarse lock shared with other
//! threads (readers of evaluated copies, schedulers): list edits and bulk
//! operations hold it, and outside code can hold it to keep structural edits
//! out while it inspects shared state.

use std::sync::Arc;

use idb_ir::{Id, IdCode, IdFlag, IdHandle, IdTag, SessionUid};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::idtype::IdTypeRegistry;
use crate::{IdError, Session};

/// Coarse database lock. Re-entrant, so nested bulk operations may take it
/// again.
#[derive(Clone, Default)]
pub struct MainLock(Arc<ReentrantMutex<()>>);

pub type MainLockGuard<'a> = ReentrantMutexGuard<'a, ()>;

impl MainLock {
    pub fn acquire(&self) -> MainLockGuard<'_> {
        self.0.lock()
    }

    pub fn is_locked(&self) -> bool {
        self.0.is_locked()
    }
}

enum SlotState {
    Vacant,
    /// Handle handed out for an ID still being built.
    Reserved,
    Live(Box<Id>),
    /// Temporarily moved out, for a reference walk.
    CheckedOut,
}

struct Slot {
    generation: u32,
    state: SlotState,
}

pub struct Main {
    session: Arc<Session>,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    lists: FxHashMap<IdCode, Vec<IdHandle>>,
    lock: MainLock,
    bulk_depth: u32,
    unsorted: FxHashSet<IdCode>,
    relations_dirty: bool,
}

impl Main {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            slots: Vec::new(),
            free_slots: Vec::new(),
            lists: FxHashMap::default(),
            lock: MainLock::default(),
            bulk_depth: 0,
            unsorted: FxHashSet::default(),
            relations_dirty: false,
        }
    }

    #[inline]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    #[inline]
    pub fn registry(&self) -> &IdTypeRegistry {
        self.session.registry()
    }

    /// A handle on the coarse lock, for use from other threads.
    pub fn lock_handle(&self) -> MainLock {
        self.lock.clone()
    }

    // === ID access ===

    pub fn get(&self, handle: IdHandle) -> Option<&Id> {
        match self.slot(handle)?.state {
            SlotState::Live(ref id) => Some(&**id),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, handle: IdHandle) -> Option<&mut Id> {
        match self.slot_mut(handle)?.state {
            SlotState::Live(ref mut id) => Some(&mut **id),
            _ => None,
        }
    }

    pub fn try_id(&self, handle: IdHandle) -> Result<&Id, IdError> {
        self.get(handle).ok_or(IdError::StaleHandle(handle))
    }

    pub fn try_id_mut(&mut self, handle: IdHandle) -> Result<&mut Id, IdError> {
        self.get_mut(handle).ok_or(IdError::StaleHandle(handle))
    }

    /// Resolve a handle known to be live.
    ///
    /// # Panics
    ///
    /// If the handle is stale or the ID is checked out.
    pub fn id(&self, handle: IdHandle) -> &Id {
        match self.get(handle) {
            Some(id) => id,
            None => panic!("stale ID handle {handle:?}"),
        }
    }

    /// Mutable variant of [`Main::id`].
    pub fn id_mut(&mut self, handle: IdHandle) -> &mut Id {
        match self.get_mut(handle) {
            Some(id) => id,
            None => panic!("stale ID handle {handle:?}"),
        }
    }

    /// Typed payload of an ID.
    pub fn data<T: 'static>(&self, handle: IdHandle) -> Option<&T> {
        self.get(handle)?.data::<T>()
    }

    pub fn data_mut<T: 'static>(&mut self, handle: IdHandle) -> Option<&mut T> {
        self.get_mut(handle)?.data_mut::<T>()
    }

    /// Is the ID stored in this database (possibly checked out for a walk)?
    pub fn contains(&self, handle: IdHandle) -> bool {
        self.slot(handle)
            .is_some_and(|slot| matches!(slot.state, SlotState::Live(_) | SlotState::CheckedOut))
    }

    // === Lists ===

    /// Handles of one type, in list order.
    pub fn handles(&self, code: IdCode) -> &[IdHandle] {
        self.lists.get(&code).map_or(&[][..], Vec::as_slice)
    }

    /// Handles of every type, types in registration order.
    pub fn all_handles(&self) -> Vec<IdHandle> {
        let mut out = Vec::with_capacity(self.len());
        for code in self.listed_codes() {
            out.extend_from_slice(self.handles(code));
        }
        out
    }

    /// Live IDs with their handles, in list order.
    pub fn iter(&self) -> impl Iterator<Item = (IdHandle, &Id)> + '_ {
        self.listed_codes()
            .into_iter()
            .flat_map(|code| self.handles(code).iter())
            .filter_map(|&handle| self.get(handle).map(|id| (handle, id)))
    }

    /// Codes with a list, registered ones first in registration order.
    fn listed_codes(&self) -> Vec<IdCode> {
        let registered = self.registry().codes();
        let mut codes: Vec<IdCode> = registered
            .iter()
            .copied()
            .filter(|code| self.lists.contains_key(code))
            .collect();
        let mut extra: Vec<IdCode> = self
            .lists
            .keys()
            .copied()
            .filter(|code| !registered.contains(code))
            .collect();
        extra.sort_unstable();
        codes.extend(extra);
        codes
    }

    pub fn len(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, code: IdCode) -> usize {
        self.handles(code).len()
    }

    /// Find an ID by type, name and library (`None` for local data).
    pub fn find_name(&self, code: IdCode, name: &str, lib: Option<IdHandle>) -> Option<IdHandle> {
        self.handles(code).iter().copied().find(|&handle| {
            self.get(handle)
                .is_some_and(|id| id.lib == lib && id.name.as_str() == name)
        })
    }

    /// Find an ID by session identifier, optionally only among one type.
    pub fn find_session_uid(&self, code: Option<IdCode>, uid: SessionUid) -> Option<IdHandle> {
        if !uid.is_set() {
            return None;
        }
        let matches = |handle: &IdHandle| self.get(*handle).is_some_and(|id| id.session_uid == uid);
        match code {
            Some(code) => self.handles(code).iter().copied().find(matches),
            None => self.all_handles().into_iter().find(matches),
        }
    }

    // === Bulk tags and flags ===

    /// Set or clear `tag` on every ID.
    pub fn tag_all(&self, tag: IdTag, value: bool) {
        for (_, id) in self.iter() {
            if value {
                id.tag.insert(tag);
            } else {
                id.tag.remove(tag);
            }
        }
    }

    /// Set or clear `tag` on every ID of one type.
    pub fn tag_code(&self, code: IdCode, tag: IdTag, value: bool) {
        for &handle in self.handles(code) {
            if let Some(id) = self.get(handle) {
                if value {
                    id.tag.insert(tag);
                } else {
                    id.tag.remove(tag);
                }
            }
        }
    }

    /// Set or clear `flag` on every ID.
    pub fn flag_all(&mut self, flag: IdFlag, value: bool) {
        for handle in self.all_handles() {
            if let Some(id) = self.get_mut(handle) {
                id.flag.set(flag, value);
            }
        }
    }

    /// Handles of every ID carrying `tag`.
    pub fn tagged(&self, tag: IdTag) -> Vec<IdHandle> {
        self.iter()
            .filter(|(_, id)| id.tag.contains(tag))
            .map(|(handle, _)| handle)
            .collect()
    }

    // === Dependency relations ===

    /// Relations between IDs changed since the last dependency-graph build.
    pub fn is_relations_dirty(&self) -> bool {
        self.relations_dirty
    }

    pub fn tag_relations_update(&mut self) {
        self.relations_dirty = true;
    }

    pub fn clear_relations_dirty(&mut self) {
        self.relations_dirty = false;
    }

    // === Bulk edit ===

    /// Run `f` with list sorting suspended; lists are re-sorted on exit.
    pub fn with_bulk_edit<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.bulk_depth += 1;
        let result = f(self);
        self.bulk_depth -= 1;
        if self.bulk_depth == 0 {
            let codes: Vec<IdCode> = self.unsorted.drain().collect();
            for code in codes {
                self.sort_list(code);
            }
        }
        result
    }

    #[inline]
    pub fn is_bulk_editing(&self) -> bool {
        self.bulk_depth > 0
    }

    pub(crate) fn mark_unsorted(&mut self, code: IdCode) {
        self.unsorted.insert(code);
    }

    // === Arena (crate internal) ===

    fn slot(&self, handle: IdHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }

    fn slot_mut(&mut self, handle: IdHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }

    /// Hand out a handle for an ID that is still being built.
    pub(crate) fn reserve(&mut self) -> IdHandle {
        if let Some(index) = self.free_slots.pop() {
            let slot = &mut self.slots[index as usize];
            slot.state = SlotState::Reserved;
            return IdHandle::new(index, slot.generation);
        }
        let index = u32::try_from(self.slots.len()).unwrap_or_else(|_| {
            panic!("ID arena exhausted");
        });
        self.slots.push(Slot {
            generation: 0,
            state: SlotState::Reserved,
        });
        IdHandle::new(index, 0)
    }

    /// Give back a reserved handle that never received an ID.
    pub(crate) fn release_reserved(&mut self, handle: IdHandle) {
        if let Some(slot) = self.slot_mut(handle) {
            debug_assert!(matches!(slot.state, SlotState::Reserved));
            slot.state = SlotState::Vacant;
            slot.generation = slot.generation.wrapping_add(1);
            self.free_slots.push(handle.index());
        }
    }

    /// Move an ID out of its slot for a walk.
    pub(crate) fn checkout(&mut self, handle: IdHandle) -> Option<Box<Id>> {
        let slot = self.slot_mut(handle)?;
        match std::mem::replace(&mut slot.state, SlotState::CheckedOut) {
            SlotState::Live(id) => Some(id),
            other => {
                slot.state = other;
                None
            }
        }
    }

    /// Put a checked-out ID back, or store the ID built for a reserved handle.
    pub(crate) fn checkin(&mut self, handle: IdHandle, id: Box<Id>) {
        match self.slot_mut(handle) {
            Some(slot) => {
                debug_assert!(matches!(
                    slot.state,
                    SlotState::CheckedOut | SlotState::Reserved
                ));
                slot.state = SlotState::Live(id);
            }
            None => debug_assert!(false, "check-in of stale handle {handle:?}"),
        }
    }

    /// Remove a live ID from the arena. The handle becomes stale.
    pub(crate) fn arena_take(&mut self, handle: IdHandle) -> Option<Box<Id>> {
        let slot = self.slot_mut(handle)?;
        match std::mem::replace(&mut slot.state, SlotState::Vacant) {
            SlotState::Live(id) => {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_slots.push(handle.index());
                Some(id)
            }
            other => {
                slot.state = other;
                None
            }
        }
    }

    pub(crate) fn list_mut(&mut self, code: IdCode) -> &mut Vec<IdHandle> {
        self.lists.entry(code).or_default()
    }

    pub(crate) fn list_remove(&mut self, code: IdCode, handle: IdHandle) {
        if let Some(list) = self.lists.get_mut(&code) {
            list.retain(|&listed| listed != handle);
            if list.is_empty() {
                self.lists.remove(&code);
            }
        }
    }

    pub(crate) fn lock(&self) -> &MainLock {
        &self.lock
    }
}

impl std::fmt::Debug for Main {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Main")
            .field("ids", &self.len())
            .field("types", &self.lists.len())
            .finish_non_exhaustive()
    }
}
