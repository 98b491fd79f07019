//! Unique names and name-sorted lists.
//!
//! Within one type and one library, names are unique. Conflicts are solved
//! by numbering (`Name.001`) the ID being named, or, on request, by giving the
//! number to the other ID so the requested name is honoured exactly.

use std::cmp::Ordering;

use idb_ir::name::{cmp_names, join_name_number, split_name_number, truncate_name};
use idb_ir::{IdCode, IdHandle, IdTag};
use rustc_hash::FxHashSet;

use crate::{IdError, Main};

/// How a name conflict is resolved.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum IdNewNameMode {
    /// Number the renamed ID.
    #[default]
    RenameExistingNever,
    /// Number the other ID and keep the requested name.
    RenameExistingAlways,
    /// Like `RenameExistingAlways`, but only when both names share the same
    /// root (`Cube.002` → `Cube`).
    RenameExistingSameRoot,
}

/// What happened to the name.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum IdNewNameAction {
    /// The name stays as it was and did not conflict.
    Unchanged,
    /// The requested name conflicted and the resolved name is the current one.
    UnchangedCollision,
    /// The requested name was free and applied.
    RenamedNoCollision,
    /// The requested name conflicted; a numbered variant was applied.
    RenamedCollisionAdjusted,
    /// The requested name was applied; the conflicting ID was renamed.
    RenamedCollisionForced,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct IdNewNameResult {
    pub action: IdNewNameAction,
    /// The other ID involved in a conflict resolved by renaming it.
    pub other: Option<IdHandle>,
}

impl IdNewNameResult {
    const UNCHANGED: Self = Self {
        action: IdNewNameAction::Unchanged,
        other: None,
    };

    /// Did the ID's name change?
    pub fn is_renamed(&self) -> bool {
        matches!(
            self.action,
            IdNewNameAction::RenamedNoCollision
                | IdNewNameAction::RenamedCollisionAdjusted
                | IdNewNameAction::RenamedCollisionForced
        )
    }
}

impl Main {
    fn name_taken(
        &self,
        code: IdCode,
        lib: Option<IdHandle>,
        exclude: Option<IdHandle>,
        name: &str,
    ) -> bool {
        self.handles(code).iter().any(|&handle| {
            Some(handle) != exclude
                && self
                    .get(handle)
                    .is_some_and(|id| id.lib == lib && id.name.as_str() == name)
        })
    }

    /// Resolve `name` against the other IDs of the same type and library.
    ///
    /// Returns the name to use and whether `name` itself was taken.
    pub fn get_unique_name(
        &self,
        code: IdCode,
        lib: Option<IdHandle>,
        exclude: Option<IdHandle>,
        name: &str,
    ) -> (String, bool) {
        let name = truncate_name(name);
        if !self.name_taken(code, lib, exclude, name) {
            return (name.to_owned(), false);
        }

        let (root, _) = split_name_number(name);
        let mut used: FxHashSet<u32> = FxHashSet::default();
        for &handle in self.handles(code) {
            if Some(handle) == exclude {
                continue;
            }
            let Some(other) = self.get(handle) else {
                continue;
            };
            if other.lib != lib {
                continue;
            }
            let (other_root, number) = split_name_number(other.name.as_str());
            if other_root == root {
                used.insert(number.unwrap_or(0));
            }
        }

        let mut number = 1;
        loop {
            if !used.contains(&number) {
                let candidate = join_name_number(root, number);
                if !self.name_taken(code, lib, exclude, &candidate) {
                    return (candidate, true);
                }
            }
            number += 1;
        }
    }

    /// Validate and apply a new name for `handle`.
    ///
    /// `newname` of `None` re-validates the current name; an empty name falls
    /// back to the type's default name. Linked IDs keep their name unless
    /// `do_linked` is set, since it must match the library's.
    pub fn id_new_name_validate(
        &mut self,
        handle: IdHandle,
        newname: Option<&str>,
        mode: IdNewNameMode,
        do_linked: bool,
    ) -> Result<IdNewNameResult, IdError> {
        let id = self.try_id(handle)?;
        let (code, lib) = (id.code(), id.lib);

        if !do_linked && id.is_linked() {
            self.id_sort_by_name(handle, None);
            return Ok(IdNewNameResult::UNCHANGED);
        }

        let mut requested = newname.unwrap_or(id.name.as_str()).to_owned();
        if requested.is_empty() {
            requested = self.session().type_info(code)?.name().to_owned();
        }
        requested.retain(|c| !c.is_control());
        let requested = truncate_name(&requested).to_owned();

        let (unique, collided) = self.get_unique_name(code, lib, Some(handle), &requested);

        if collided && mode != IdNewNameMode::RenameExistingNever {
            let current = self.id(handle).name.as_str().to_owned();
            let same_root = split_name_number(&current).0 == split_name_number(&unique).0;
            let other = self.handles(code).iter().copied().find(|&other| {
                other != handle
                    && self
                        .get(other)
                        .is_some_and(|id| id.lib == lib && id.name.as_str() == requested)
            });
            if let Some(other) = other {
                if mode == IdNewNameMode::RenameExistingAlways || same_root {
                    tracing::debug!(from = %requested, to = %unique, "renaming conflicting ID");
                    self.id_mut(other).name.set(&unique);
                    self.id_sort_by_name(other, None);

                    let mut result = IdNewNameResult {
                        action: IdNewNameAction::UnchangedCollision,
                        other: Some(other),
                    };
                    if current != requested {
                        self.id_mut(handle).name.set(&requested);
                        result.action = IdNewNameAction::RenamedCollisionForced;
                    }
                    self.id_sort_by_name(handle, None);
                    return Ok(result);
                }
            }
        }

        let id = self.id_mut(handle);
        let action = if id.name.as_str() != unique {
            id.name.set(&unique);
            if collided {
                IdNewNameAction::RenamedCollisionAdjusted
            } else {
                IdNewNameAction::RenamedNoCollision
            }
        } else if collided {
            IdNewNameAction::UnchangedCollision
        } else {
            IdNewNameAction::Unchanged
        };
        self.id_sort_by_name(handle, None);
        Ok(IdNewNameResult {
            action,
            other: None,
        })
    }

    /// Make the name of `handle` unique, trying `desired` first.
    ///
    /// Returns whether the ID was renamed.
    pub fn ensure_unique_name(
        &mut self,
        handle: IdHandle,
        desired: Option<&str>,
        allow_rename_linked: bool,
    ) -> Result<bool, IdError> {
        let result = self.id_new_name_validate(
            handle,
            desired,
            IdNewNameMode::RenameExistingNever,
            allow_rename_linked,
        )?;
        Ok(result.is_renamed())
    }

    /// User-level rename. Linked data cannot be renamed.
    pub fn rename(
        &mut self,
        handle: IdHandle,
        name: &str,
        mode: IdNewNameMode,
    ) -> Result<IdNewNameResult, IdError> {
        let id = self.try_id(handle)?;
        if id.is_linked() {
            return Err(IdError::LinkedData(id.name.prefixed()));
        }
        if id.name.as_str() == name {
            return Ok(IdNewNameResult::UNCHANGED);
        }
        self.id_new_name_validate(handle, Some(name), mode, false)
    }

    fn cmp_ids(&self, a: IdHandle, b: IdHandle) -> Ordering {
        match (self.get(a), self.get(b)) {
            (Some(a), Some(b)) => a
                .lib
                .cmp(&b.lib)
                .then_with(|| cmp_names(a.name.as_str(), b.name.as_str())),
            _ => Ordering::Equal,
        }
    }

    /// Move `handle` to its sorted position in its type's list.
    ///
    /// `hint` is a neighbour the caller expects the ID to end up next to;
    /// when right, no search is needed.
    pub fn id_sort_by_name(&mut self, handle: IdHandle, hint: Option<IdHandle>) {
        let Some(code) = self.get(handle).map(idb_ir::Id::code) else {
            return;
        };
        if self.is_bulk_editing() {
            if !self.handles(code).contains(&handle) {
                self.list_mut(code).push(handle);
            }
            self.mark_unsorted(code);
            return;
        }

        let lock = self.lock().clone();
        let _guard = lock.acquire();

        let mut list = std::mem::take(self.list_mut(code));
        list.retain(|&listed| listed != handle);

        let hinted = hint
            .and_then(|hint| list.iter().position(|&listed| listed == hint))
            .and_then(|at| {
                let hint = list[at];
                let after_hint = self.cmp_ids(hint, handle) != Ordering::Greater
                    && list
                        .get(at + 1)
                        .map_or(true, |&next| self.cmp_ids(handle, next) != Ordering::Greater);
                if after_hint {
                    return Some(at + 1);
                }
                let before_hint = self.cmp_ids(handle, hint) != Ordering::Greater
                    && (at == 0 || self.cmp_ids(list[at - 1], handle) != Ordering::Greater);
                before_hint.then_some(at)
            });
        let at = hinted.unwrap_or_else(|| {
            list.partition_point(|&listed| self.cmp_ids(listed, handle) == Ordering::Less)
        });
        list.insert(at, handle);
        *self.list_mut(code) = list;
    }

    /// Fully re-sort one type's list.
    pub(crate) fn sort_list(&mut self, code: IdCode) {
        let lock = self.lock().clone();
        let _guard = lock.acquire();
        let mut list = std::mem::take(self.list_mut(code));
        list.sort_by(|&a, &b| self.cmp_ids(a, b));
        *self.list_mut(code) = list;
    }

    /// Is one type's list in sorted order?
    pub fn is_list_sorted(&self, code: IdCode) -> bool {
        self.handles(code)
            .windows(2)
            .all(|pair| self.cmp_ids(pair[0], pair[1]) != Ordering::Greater)
    }

    /// Rename every ID whose name duplicates an earlier one of the list.
    /// Returns the number of renamed IDs.
    pub fn repair_duplicate_names(&mut self, code: IdCode) -> usize {
        let mut seen: FxHashSet<(Option<IdHandle>, String)> = FxHashSet::default();
        let mut renamed = 0;
        for handle in self.handles(code).to_vec() {
            let Some(id) = self.get(handle) else {
                continue;
            };
            let key = (id.lib, id.name.as_str().to_owned());
            if seen.contains(&key) {
                // Only the later duplicate is excluded from the collision
                // check, so it is the one getting numbered.
                let (unique, _) = self.get_unique_name(code, key.0, Some(handle), &key.1);
                self.id_mut(handle).name.set(&unique);
                self.id_sort_by_name(handle, None);
                seen.insert((key.0, unique));
                renamed += 1;
            } else {
                seen.insert(key);
            }
        }
        if renamed > 0 {
            tracing::debug!(code = %code, renamed, "repaired duplicate ID names");
        }
        renamed
    }

    /// `"Name"` for local IDs, `"Name [LibName]"` for linked ones.
    pub fn id_full_name(&self, handle: IdHandle) -> String {
        let Some(id) = self.get(handle) else {
            return String::new();
        };
        let mut out = id.name.as_str().to_owned();
        if let Some(lib) = id.lib.and_then(|lib| self.get(lib)) {
            out.push_str(" [");
            out.push_str(lib.name.as_str());
            out.push(']');
        }
        out
    }

    /// Full name prefixed with a library hint (`L` linked, `M` missing,
    /// `O` override) and a user hint (`F` fake user, `0` no users).
    ///
    /// Returns the string and the prefix length.
    pub fn id_full_name_ui_prefix(&self, handle: IdHandle, add_lib_hint: bool) -> (String, usize) {
        let Some(id) = self.get(handle) else {
            return (String::new(), 0);
        };
        let mut out = String::with_capacity(idb_ir::MAX_ID_FULL_NAME_UI);
        if add_lib_hint {
            out.push(if id.is_linked() {
                if id.tag.contains(IdTag::MISSING) {
                    'M'
                } else {
                    'L'
                }
            } else if id.is_override_library() {
                'O'
            } else {
                ' '
            });
        }
        out.push(if id.has_fake_user() {
            'F'
        } else if id.us == 0 {
            '0'
        } else {
            ' '
        });
        out.push(' ');
        let prefix_len = out.len();
        out.push_str(&self.id_full_name(handle));
        (out, prefix_len)
    }

    /// String key unique across local and linked IDs.
    ///
    /// Linked keys start with a character encoding the library name length,
    /// so `(LIfoo, OBbarOBbaz)` and `(LIfooOBbar, OBbaz)` never collide.
    pub fn id_unique_string_key(&self, handle: IdHandle) -> String {
        let Some(id) = self.get(handle) else {
            return String::new();
        };
        match id.lib.and_then(|lib| self.get(lib)) {
            None => id.name.prefixed(),
            Some(lib) => {
                let len = u8::try_from(lib.name.as_str().len()).unwrap_or(u8::MAX);
                let marker = char::from(len.saturating_add(32).min(126));
                format!("{marker}{}{}", lib.name.prefixed(), id.name.prefixed())
            }
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
