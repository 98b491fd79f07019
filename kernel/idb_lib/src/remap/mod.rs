//! Reference remapping.
//!
//! Rewrites every stored reference to an old target so it points at a new
//! target (or nowhere), keeping user counts in step: the old target loses
//! the user of each rewritten counted slot, the new one gains it.
//!
//! Chains inside one [`IdRemapper`] (`a -> b`, `b -> c`) are followed to
//! their end, so remapping with the same remapper twice is a no-op the
//! second time.

use idb_ir::{IdHandle, IdTag, RefKind, WalkFlags, WalkStep};
use rustc_hash::FxHashMap;

use crate::flags::RemapFlags;
use crate::query::foreach_id_link;
use crate::Main;

/// Old → new target map. A `None` target unlinks.
#[derive(Clone, Debug, Default)]
pub struct IdRemapper {
    map: FxHashMap<IdHandle, Option<IdHandle>>,
}

impl IdRemapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, old: IdHandle, new: Option<IdHandle>) {
        self.map.insert(old, new);
    }

    /// Final target of `old`, following chains of mappings.
    ///
    /// `None` when `old` is not remapped, `Some(None)` when it ends unlinked.
    /// A cycle resolves to the last target before it closes.
    pub fn get(&self, old: IdHandle) -> Option<Option<IdHandle>> {
        let mut target = *self.map.get(&old)?;
        let mut steps = 0;
        while let Some(next) = target.and_then(|new| self.map.get(&new)) {
            if *next == Some(old) || steps == self.map.len() {
                break;
            }
            target = *next;
            steps += 1;
        }
        Some(target)
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

    pub fn iter(&self) -> impl Iterator<Item = (IdHandle, Option<IdHandle>)> + '_ {
        self.map.iter().map(|(&old, &new)| (old, new))
    }
}

impl FromIterator<(IdHandle, Option<IdHandle>)> for IdRemapper {
    fn from_iter<T: IntoIterator<Item = (IdHandle, Option<IdHandle>)>>(iter: T) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

/// What a remap pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemapReport {
    /// Rewritten slots.
    pub remapped: usize,
    /// Skipped slots held directly by local data.
    pub skipped_direct: usize,
    /// Skipped slots held by linked data or marked as indirect usage.
    pub skipped_indirect: usize,
    /// Skipped slots that count as users.
    pub skipped_refcounted: usize,
    /// IDs whose never-null reference was cleared, tagged `DOIT`.
    pub tagged_for_deletion: Vec<IdHandle>,
}

impl Main {
    /// Remap references across the whole database.
    #[tracing::instrument(level = "debug", skip_all, fields(mappings = remapper.len()))]
    pub fn remap_multiple(&mut self, remapper: &IdRemapper, flags: RemapFlags) -> RemapReport {
        let scope = self.all_handles();
        self.remap_in(&scope, remapper, flags)
    }

    /// Remap references held by the IDs of `scope` only.
    pub fn remap_in(&mut self, scope: &[IdHandle], remapper: &IdRemapper, flags: RemapFlags) -> RemapReport {
        let mut report = RemapReport::default();
        if remapper.is_empty() {
            return report;
        }

        for &handle in scope {
            if self.get(handle).is_none() {
                continue;
            }
            let mut tag_owner = false;
            let walked = foreach_id_link(self, handle, WalkFlags::INCLUDE_UI, |main, link| {
                if link.is_embedded() {
                    return WalkStep::Continue;
                }
                let Some(old) = link.handle() else {
                    return WalkStep::Continue;
                };
                let Some(mut new) = remapper.get(old) else {
                    return WalkStep::Continue;
                };
                if new == Some(old) {
                    return WalkStep::Continue;
                }
                if new.is_some() && new == link.owner && link.kind.contains(RefKind::NEVER_SELF) {
                    new = None;
                }

                let kind = link.kind;
                let is_indirect = kind.contains(RefKind::INDIRECT_USAGE) || link.owner_is_linked;
                let clears_never_null = kind.contains(RefKind::NEVER_NULL) && new.is_none();
                let is_never_null =
                    clears_never_null && !flags.contains(RemapFlags::FORCE_NEVER_NULL_USAGE);
                let skip_never_null = is_never_null && flags.contains(RemapFlags::SKIP_NEVER_NULL_USAGE);
                let skip_indirect = flags.contains(RemapFlags::SKIP_INDIRECT_USAGE) && is_indirect;
                let skip_reference = flags.contains(RemapFlags::SKIP_OVERRIDE_LIBRARY)
                    && kind.contains(RefKind::OVERRIDE_LIBRARY_REFERENCE);

                if clears_never_null && flags.contains(RemapFlags::FLAG_NEVER_NULL_USAGE) {
                    tag_owner = true;
                }

                if skip_indirect || skip_reference || skip_never_null {
                    if is_indirect {
                        report.skipped_indirect += 1;
                    } else {
                        report.skipped_direct += 1;
                    }
                    if kind.is_counted() {
                        report.skipped_refcounted += 1;
                    }
                    return WalkStep::Continue;
                }

                // A kept never-null slot still releases its user.
                if !is_never_null {
                    link.set(new);
                    report.remapped += 1;
                    tracing::trace!(?old, ?new, owner = ?link.owner, "remapped reference");
                }

                let was_self = Some(old) == link.owner;
                let is_self = new.is_some() && new == link.owner;
                if kind.contains(RefKind::USER) {
                    if !was_self {
                        main.id_us_min(old);
                    }
                    if let Some(new) = new.filter(|_| !is_self) {
                        if is_indirect {
                            main.id_us_plus_no_lib(new);
                        } else {
                            main.id_us_plus(new);
                        }
                    }
                } else if kind.contains(RefKind::USER_ONE) {
                    if let Some(new) = new.filter(|_| !is_self) {
                        main.id_us_ensure_real(new);
                    }
                }
                WalkStep::Continue
            });
            debug_assert!(walked.is_ok());

            if tag_owner {
                self.id(handle).tag.insert(IdTag::DOIT);
                report.tagged_for_deletion.push(handle);
            }
        }

        if report.remapped > 0 {
            self.tag_relations_update();
        }
        report
    }

    /// Remap every reference to `old` across the database.
    pub fn libblock_remap(&mut self, old: IdHandle, new: Option<IdHandle>, flags: RemapFlags) -> RemapReport {
        let mut remapper = IdRemapper::new();
        remapper.add(old, new);
        let report = self.remap_multiple(&remapper, flags);
        tracing::debug!(?old, ?new, remapped = report.remapped, "remapped ID usages");
        report
    }

    /// Remap the references held by one ID only.
    pub fn relink(&mut self, handle: IdHandle, remapper: &IdRemapper, flags: RemapFlags) -> RemapReport {
        self.remap_in(&[handle], remapper, flags)
    }
}
