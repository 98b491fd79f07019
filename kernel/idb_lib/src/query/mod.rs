//! Reference walking.
//!
//! The walker is the single place through which every consumer (reference
//! counting, remapping, freeing, library expansion, relation building) sees
//! the references of an ID. For one ID it visits:
//!
//! 1. header references (animation action, override reference),
//! 2. every slot the type's `foreach_id` reports,
//! 3. every embedded ID, first as an [`LinkTarget::Embedded`] link and then,
//!    unless [`WalkFlags::IGNORE_EMBEDDED`] is set, its own references as if
//!    they belonged to the owner.
//!
//! Empty slots are not reported.
//!
//! # Check-out
//!
//! To walk an ID stored in a [`Main`], the record is temporarily moved out of
//! its arena slot so the visitor can mutate the rest of the database. While
//! checked out, the ID does not resolve through `Main::get`; visitors must
//! therefore treat self references specially, and they never count as users.

use std::sync::Arc;

use idb_ir::{Id, IdCode, IdHandle, RefKind, WalkFlags, WalkStep};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::idtype::IdTypeRegistry;
use crate::{IdError, Main};

/// What a reported reference points at.
pub enum LinkTarget<'a> {
    /// A handle slot, which visitors may rewrite unless walking read-only.
    Slot(&'a mut Option<IdHandle>),
    /// An embedded ID owned by the walked ID.
    Embedded(&'a mut Id),
}

/// One reference reported to a visitor.
pub struct IdLink<'a> {
    target: LinkTarget<'a>,
    pub kind: RefKind,
    /// Database ID being walked, the owner when inside embedded data.
    /// `None` for detached IDs.
    pub owner: Option<IdHandle>,
    pub owner_is_linked: bool,
    /// Type of the ID holding the slot (the embedded ID's type when inside
    /// embedded data).
    pub holder: IdCode,
    pub in_embedded: bool,
}

impl IdLink<'_> {
    /// Target handle of a slot, `None` for embedded links.
    #[inline]
    pub fn handle(&self) -> Option<IdHandle> {
        match &self.target {
            LinkTarget::Slot(slot) => **slot,
            LinkTarget::Embedded(_) => None,
        }
    }

    /// Rewrite the slot.
    pub fn set(&mut self, value: Option<IdHandle>) {
        match &mut self.target {
            LinkTarget::Slot(slot) => **slot = value,
            LinkTarget::Embedded(_) => debug_assert!(false, "embedded links cannot be rewritten"),
        }
    }

    #[inline]
    pub fn is_embedded(&self) -> bool {
        matches!(self.target, LinkTarget::Embedded(_))
    }

    pub fn embedded(&mut self) -> Option<&mut Id> {
        match &mut self.target {
            LinkTarget::Embedded(id) => Some(&mut **id),
            LinkTarget::Slot(_) => None,
        }
    }

    /// Does the slot point at the walked ID itself?
    #[inline]
    pub fn is_self_reference(&self) -> bool {
        self.owner.is_some() && self.handle() == self.owner
    }
}

type Visitor<'a> = dyn FnMut(&mut IdLink<'_>) -> WalkStep + 'a;

/// Walk state handed to [`IdTypeInfo::foreach_id`](crate::IdTypeInfo::foreach_id).
pub struct ForeachIdData<'a> {
    registry: &'a IdTypeRegistry,
    flags: WalkFlags,
    owner: Option<IdHandle>,
    owner_is_linked: bool,
    holder: IdCode,
    in_embedded: bool,
    visit: &'a mut Visitor<'a>,
    stopped: bool,
}

impl ForeachIdData<'_> {
    #[inline]
    pub fn flags(&self) -> WalkFlags {
        self.flags
    }

    #[inline]
    pub fn include_ui(&self) -> bool {
        self.flags.contains(WalkFlags::INCLUDE_UI)
    }

    /// Report one reference slot.
    pub fn process(&mut self, slot: &mut Option<IdHandle>, kind: RefKind) {
        if self.stopped || slot.is_none() {
            return;
        }
        let before = *slot;
        let mut link = IdLink {
            target: LinkTarget::Slot(slot),
            kind,
            owner: self.owner,
            owner_is_linked: self.owner_is_linked,
            holder: self.holder,
            in_embedded: self.in_embedded,
        };
        let step = (self.visit)(&mut link);
        debug_assert!(
            !self.flags.contains(WalkFlags::READONLY) || link.handle() == before,
            "reference rewritten during a read-only walk"
        );
        if step == WalkStep::Stop {
            self.stopped = true;
        }
    }

    /// Report each slot of a list with the same kind.
    pub fn process_all<'s>(
        &mut self,
        slots: impl IntoIterator<Item = &'s mut Option<IdHandle>>,
        kind: RefKind,
    ) {
        for slot in slots {
            self.process(slot, kind);
        }
    }

    /// Report an embedded ID, then walk its references.
    pub fn process_embedded(&mut self, slot: &mut Option<Box<Id>>) {
        if self.stopped {
            return;
        }
        let Some(embedded) = slot.as_deref_mut() else {
            return;
        };
        debug_assert!(embedded.is_embedded(), "embedded slot holds a regular ID");

        let mut link = IdLink {
            target: LinkTarget::Embedded(&mut *embedded),
            kind: RefKind::EMBEDDED,
            owner: self.owner,
            owner_is_linked: self.owner_is_linked,
            holder: self.holder,
            in_embedded: self.in_embedded,
        };
        if (self.visit)(&mut link) == WalkStep::Stop {
            self.stopped = true;
            return;
        }
        if self.flags.contains(WalkFlags::IGNORE_EMBEDDED) {
            return;
        }

        let saved = (self.holder, self.in_embedded);
        self.holder = embedded.code();
        self.in_embedded = true;
        walk_id(self, embedded);
        (self.holder, self.in_embedded) = saved;
    }
}

fn walk_id(data: &mut ForeachIdData<'_>, id: &mut Id) {
    if let Some(anim) = id.anim_data.as_mut() {
        data.process(&mut anim.action, RefKind::USER);
    }
    if let Some(liboverride) = id.override_library.as_mut() {
        data.process(
            &mut liboverride.reference,
            RefKind::USER | RefKind::OVERRIDE_LIBRARY_REFERENCE,
        );
    }

    let registry = data.registry;
    match registry.get(id.code()) {
        Some(info) => info.foreach_id(&mut *id.data, data),
        None => debug_assert!(false, "walking ID of unregistered type {}", id.code()),
    }
}

/// Walk the references of `id`, which is not (currently) stored in a
/// database. `owner` is its handle when it was checked out of one.
pub fn foreach_id_in(
    registry: &IdTypeRegistry,
    id: &mut Id,
    owner: Option<IdHandle>,
    flags: WalkFlags,
    visit: &mut dyn FnMut(&mut IdLink<'_>) -> WalkStep,
) {
    let mut data = ForeachIdData {
        registry,
        flags,
        owner,
        owner_is_linked: id.is_linked(),
        holder: id.code(),
        in_embedded: false,
        visit,
        stopped: false,
    };
    walk_id(&mut data, id);
}

/// Call `f` on every embedded ID of `id`, nested ones included.
pub fn foreach_embedded_id(registry: &IdTypeRegistry, id: &mut Id, f: &mut dyn FnMut(&mut Id)) {
    foreach_id_in(registry, id, None, WalkFlags::empty(), &mut |link| {
        if let Some(embedded) = link.embedded() {
            f(embedded);
        }
        WalkStep::Continue
    });
}

/// Walk the references of the database ID `handle`.
///
/// The visitor gets the database back, so it may adjust other IDs while the
/// walked one is checked out.
pub fn foreach_id_link<F>(
    main: &mut Main,
    handle: IdHandle,
    flags: WalkFlags,
    mut visit: F,
) -> Result<(), IdError>
where
    F: FnMut(&mut Main, &mut IdLink<'_>) -> WalkStep,
{
    let session = Arc::clone(main.session());
    let mut id = main.checkout(handle).ok_or(IdError::StaleHandle(handle))?;
    foreach_id_in(session.registry(), &mut id, Some(handle), flags, &mut |link| {
        visit(main, link)
    });
    main.checkin(handle, id);
    Ok(())
}

/// Walk the references of a detached ID, with database access.
pub fn foreach_id_link_detached<F>(main: &mut Main, id: &mut Id, flags: WalkFlags, mut visit: F)
where
    F: FnMut(&mut Main, &mut IdLink<'_>) -> WalkStep,
{
    let session = Arc::clone(main.session());
    foreach_id_in(session.registry(), id, None, flags, &mut |link| {
        visit(main, link)
    });
}

/// Non-null references held by `handle`, self references excluded.
pub fn collect_references(
    main: &mut Main,
    handle: IdHandle,
    flags: WalkFlags,
) -> Result<SmallVec<[(IdHandle, RefKind); 8]>, IdError> {
    let mut refs = SmallVec::new();
    foreach_id_link(main, handle, flags | WalkFlags::READONLY, |_, link| {
        if let Some(target) = link.handle() {
            if !link.is_self_reference() {
                refs.push((target, link.kind));
            }
        }
        WalkStep::Continue
    })?;
    Ok(refs)
}

/// Who uses an ID.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct IdUsage {
    /// Used by at least one local ID.
    pub local: bool,
    /// Used by at least one linked ID.
    pub linked: bool,
}

/// Find whether `target` is used by local and/or linked IDs.
///
/// Back-links from owned data do not count as usage.
pub fn id_test_usages(main: &mut Main, target: IdHandle) -> IdUsage {
    let mut usage = IdUsage::default();
    for handle in main.all_handles() {
        if handle == target {
            continue;
        }
        let result = foreach_id_link(main, handle, WalkFlags::READONLY, |_, link| {
            if link.handle() == Some(target) && !link.kind.contains(RefKind::LOOPBACK) {
                if link.owner_is_linked {
                    usage.linked = true;
                } else {
                    usage.local = true;
                }
            }
            if usage.local && usage.linked {
                WalkStep::Stop
            } else {
                WalkStep::Continue
            }
        });
        debug_assert!(result.is_ok());
        if usage.local && usage.linked {
            break;
        }
    }
    usage
}

/// Number of counted references to each ID across the database, as the
/// user-count invariant defines them (UI references included).
pub fn count_user_references(main: &mut Main) -> FxHashMap<IdHandle, i32> {
    let mut counts: FxHashMap<IdHandle, i32> = FxHashMap::default();
    for handle in main.all_handles() {
        let flags = WalkFlags::READONLY | WalkFlags::INCLUDE_UI;
        let result = foreach_id_link(main, handle, flags, |_, link| {
            if let Some(target) = link.handle() {
                if link.kind.is_counted() && !link.is_self_reference() {
                    *counts.entry(target).or_default() += 1;
                }
            }
            WalkStep::Continue
        });
        debug_assert!(result.is_ok());
    }
    counts
}

/// Both directions of every reference between database IDs.
#[derive(Clone, Debug, Default)]
pub struct RelationEntry {
    /// IDs using this one.
    pub from: SmallVec<[(IdHandle, RefKind); 4]>,
    /// IDs this one uses.
    pub to: SmallVec<[(IdHandle, RefKind); 4]>,
}

/// Relations between all IDs of a database, built in one pass.
#[derive(Debug, Default)]
pub struct MainIdRelations {
    entries: FxHashMap<IdHandle, RelationEntry>,
}

impl MainIdRelations {
    #[tracing::instrument(level = "debug", skip_all, fields(ids = main.len()))]
    pub fn build(main: &mut Main) -> Self {
        let mut entries: FxHashMap<IdHandle, RelationEntry> = FxHashMap::default();
        for handle in main.all_handles() {
            entries.entry(handle).or_default();
            let Ok(refs) = collect_references(main, handle, WalkFlags::empty()) else {
                continue;
            };
            for (target, kind) in refs {
                entries.entry(handle).or_default().to.push((target, kind));
                entries.entry(target).or_default().from.push((handle, kind));
            }
        }
        Self { entries }
    }

    pub fn get(&self, handle: IdHandle) -> Option<&RelationEntry> {
        self.entries.get(&handle)
    }

    /// IDs using `handle`.
    pub fn users_of(&self, handle: IdHandle) -> &[(IdHandle, RefKind)] {
        self.entries
            .get(&handle)
            .map_or(&[][..], |entry| entry.from.as_slice())
    }

    /// IDs used by `handle`.
    pub fn used_by(&self, handle: IdHandle) -> &[(IdHandle, RefKind)] {
        self.entries
            .get(&handle)
            .map_or(&[][..], |entry| entry.to.as_slice())
    }
}

impl Main {
    /// Visit the external file paths of one ID, embedded IDs included.
    pub fn id_foreach_path(
        &mut self,
        handle: IdHandle,
        visit: &mut dyn FnMut(&mut String),
    ) -> Result<(), IdError> {
        let session = Arc::clone(self.session());
        let registry = session.registry();
        let id = self.try_id_mut(handle)?;
        if let Some(info) = registry.get(id.code()) {
            info.foreach_path(&mut *id.data, visit);
        }
        foreach_embedded_id(registry, id, &mut |embedded| {
            if let Some(info) = registry.get(embedded.code()) {
                info.foreach_path(&mut *embedded.data, &mut *visit);
            }
        });
        Ok(())
    }

    /// Visit every external file path of the database.
    pub fn foreach_path(&mut self, visit: &mut dyn FnMut(IdHandle, &mut String)) {
        for handle in self.all_handles() {
            let visited = self.id_foreach_path(handle, &mut |path| visit(handle, path));
            debug_assert!(visited.is_ok());
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
