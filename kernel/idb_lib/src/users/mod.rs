//! User counting.
//!
//! `us` counts the reference slots of kind [`RefKind::USER`] pointing at an
//! ID, plus one for the fake user. Two mechanisms add users without a slot:
//!
//! - the **fake user** flag, for data kept alive on purpose;
//! - the **extra user** (`EXTRAUSER` tag), which guarantees one user above
//!   the fake-user floor for data referenced only through
//!   [`RefKind::USER_ONE`] slots. While no real user exists, the extra user is
//!   counted (`EXTRAUSER_SET`); the first real user absorbs it.
//!
//! Decrementing never triggers a free. Use [`Main::id_free_us`] for that.

use idb_ir::{Id, IdFlag, IdHandle, IdTag, RefKind, WalkFlags, WalkStep};

use crate::idtype::IdTypeFlags;
use crate::query::foreach_id_link;
use crate::Main;

/// Add one user, leaving the link state alone.
pub fn us_plus_no_lib(id: &mut Id) {
    if id.tag.contains(IdTag::EXTRAUSER | IdTag::EXTRAUSER_SET) {
        debug_assert!(id.us >= 1);
        id.tag.remove(IdTag::EXTRAUSER_SET);
    } else {
        debug_assert!(id.us >= 0);
        id.us += 1;
    }
}

/// Remove one user, never going below the fake-user floor.
pub fn us_min(id: &mut Id) {
    let limit = id.fake_users();
    if id.us <= limit {
        tracing::error!(
            id = %id.name.prefixed(),
            us = id.us,
            limit,
            "ID user decrement error"
        );
        id.us = limit;
    } else {
        id.us -= 1;
    }
    if id.us == limit && id.tag.contains(IdTag::EXTRAUSER) {
        us_ensure_real(id);
    }
}

/// Guarantee one user above the fake-user floor.
pub fn us_ensure_real(id: &mut Id) {
    let limit = id.fake_users();
    id.tag.insert(IdTag::EXTRAUSER);
    if id.us <= limit {
        if id.us < limit || id.tag.contains(IdTag::EXTRAUSER_SET) {
            tracing::error!(id = %id.name.prefixed(), us = id.us, "ID user count error");
        }
        id.us = limit + 1;
        id.tag.insert(IdTag::EXTRAUSER_SET);
    }
}

/// Drop the extra user again.
pub fn us_clear_real(id: &mut Id) {
    if id.tag.contains(IdTag::EXTRAUSER) {
        if id.tag.contains(IdTag::EXTRAUSER_SET) {
            id.us -= 1;
            debug_assert!(id.us >= id.fake_users());
        }
        id.tag.remove(IdTag::EXTRAUSER | IdTag::EXTRAUSER_SET);
    }
}

impl Main {
    fn with_live(&mut self, handle: IdHandle, f: impl FnOnce(&mut Id)) {
        match self.get_mut(handle) {
            Some(id) => f(id),
            None => tracing::trace!(?handle, "user count change on absent ID ignored"),
        }
    }

    /// Add a user; indirectly linked data becomes directly linked.
    pub fn id_us_plus(&mut self, handle: IdHandle) {
        self.with_live(handle, us_plus_no_lib);
        self.id_lib_extern(handle);
    }

    pub fn id_us_plus_no_lib(&mut self, handle: IdHandle) {
        self.with_live(handle, us_plus_no_lib);
    }

    pub fn id_us_min(&mut self, handle: IdHandle) {
        self.with_live(handle, us_min);
    }

    pub fn id_us_ensure_real(&mut self, handle: IdHandle) {
        self.with_live(handle, us_ensure_real);
    }

    pub fn id_us_clear_real(&mut self, handle: IdHandle) {
        self.with_live(handle, us_clear_real);
    }

    pub fn id_fake_user_set(&mut self, handle: IdHandle) {
        let newly_set = self.get_mut(handle).is_some_and(|id| {
            let newly_set = !id.has_fake_user();
            id.flag |= IdFlag::FAKEUSER;
            newly_set
        });
        if newly_set {
            self.id_us_plus(handle);
        }
    }

    pub fn id_fake_user_clear(&mut self, handle: IdHandle) {
        self.with_live(handle, |id| {
            if id.has_fake_user() {
                id.flag -= IdFlag::FAKEUSER;
                us_min(id);
            }
        });
    }

    /// Indirectly linked data becomes directly linked.
    pub fn id_lib_extern(&mut self, handle: IdHandle) {
        let session = std::sync::Arc::clone(self.session());
        self.with_live(handle, |id| {
            if id.is_linked() {
                debug_assert!(session.registry().is_linkable(id.code()));
                if id.tag.contains(IdTag::INDIRECT) {
                    id.tag.remove(IdTag::INDIRECT);
                    id.tag.insert(IdTag::EXTERN);
                    id.flag -= IdFlag::INDIRECT_WEAK_LINK;
                }
            }
        });
    }

    /// Indirectly linked data is only weakly needed.
    pub fn id_lib_indirect_weak_link(&mut self, handle: IdHandle) {
        self.with_live(handle, |id| {
            if id.is_linked() && id.tag.contains(IdTag::INDIRECT) {
                id.flag |= IdFlag::INDIRECT_WEAK_LINK;
            }
        });
    }

    /// Add (`plus`) or release the users given by the references of `handle`.
    pub(crate) fn id_refs_us_apply(
        &mut self,
        handle: IdHandle,
        plus: bool,
        include_ui: bool,
    ) -> Result<(), crate::IdError> {
        let mut flags = WalkFlags::READONLY;
        if include_ui {
            flags |= WalkFlags::INCLUDE_UI;
        }
        foreach_id_link(self, handle, flags, |main, link| {
            let Some(target) = link.handle() else {
                return WalkStep::Continue;
            };
            if link.is_self_reference() {
                return WalkStep::Continue;
            }
            if link.kind.contains(RefKind::USER) {
                if !plus {
                    main.id_us_min(target);
                } else if link.owner_is_linked {
                    main.id_us_plus_no_lib(target);
                } else {
                    main.id_us_plus(target);
                }
            } else if plus && link.kind.contains(RefKind::USER_ONE) {
                main.id_us_ensure_real(target);
            }
            WalkStep::Continue
        })
    }

    /// Detached variant of [`Main::id_refs_us_apply`]. A detached ID never
    /// promotes what it uses to directly linked.
    pub(crate) fn detached_refs_us_apply(&mut self, id: &mut Id, plus: bool) {
        let flags = WalkFlags::READONLY | WalkFlags::INCLUDE_UI;
        crate::query::foreach_id_link_detached(self, id, flags, |main, link| {
            if let Some(target) = link.handle() {
                if link.kind.contains(RefKind::USER) {
                    if plus {
                        main.id_us_plus_no_lib(target);
                    } else {
                        main.id_us_min(target);
                    }
                } else if plus && link.kind.contains(RefKind::USER_ONE) {
                    main.id_us_ensure_real(target);
                }
            }
            WalkStep::Continue
        });
    }

    /// Recompute every user count from scratch.
    ///
    /// With `linked_only`, only linked IDs are reset and only references to
    /// linked IDs are counted.
    #[tracing::instrument(level = "debug", skip(self), fields(ids = self.len()))]
    pub fn refcount_recompute(&mut self, linked_only: bool) {
        let handles = self.all_handles();
        let session = std::sync::Arc::clone(self.session());

        for &handle in &handles {
            let Some(id) = self.get_mut(handle) else {
                continue;
            };
            if linked_only && !id.is_linked() {
                continue;
            }
            id.us = id.fake_users();
            // UI code may have asked for an extra user, keep honouring it.
            if id.tag.contains(IdTag::EXTRAUSER) {
                id.tag.remove(IdTag::EXTRAUSER | IdTag::EXTRAUSER_SET);
                us_ensure_real(id);
            }
            let never_unused = session
                .registry()
                .get(id.code())
                .is_some_and(|info| info.flags().contains(IdTypeFlags::NEVER_UNUSED));
            if never_unused {
                us_ensure_real(id);
            }
        }

        for &handle in &handles {
            let flags = WalkFlags::READONLY | WalkFlags::INCLUDE_UI;
            let walked = foreach_id_link(self, handle, flags, |main, link| {
                let Some(target) = link.handle() else {
                    return WalkStep::Continue;
                };
                if link.is_self_reference() {
                    return WalkStep::Continue;
                }
                if linked_only && !main.get(target).is_some_and(Id::is_linked) {
                    return WalkStep::Continue;
                }
                if link.kind.contains(RefKind::USER) {
                    main.id_us_plus_no_lib(target);
                }
                if link.kind.contains(RefKind::USER_ONE) {
                    main.id_us_ensure_real(target);
                }
                WalkStep::Continue
            });
            debug_assert!(walked.is_ok());
        }
    }
}
