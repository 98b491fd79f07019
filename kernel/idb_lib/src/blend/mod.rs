//! Serialization of IDs into an in-memory file.
//!
//! A [`MemFile`] is a flat list of [`IdRecord`]s. Each record keeps the
//! generic header of an ID, the handle it had when written (its *old*
//! handle), and the payload as opaque blocks produced by the type's
//! `blend_write`. References inside payloads are written as old handles.
//!
//! Reading happens in three passes, mirroring the ordering contract of the
//! type callbacks:
//!
//! 1. *read data*: every record becomes an ID stored in the database;
//! 2. *read lib*: once every ID of the batch exists, each reference is
//!    rewritten from old to new handle (unresolved ones are cleared with a
//!    warning), then `blend_read_after_liblink` runs per ID;
//! 3. user counts are recomputed.
//!
//! Linking reads only the requested records, then *expands* them: every
//! record they reference that is not loaded yet is read as indirectly linked
//! data, recursively.

use std::sync::Arc;

use idb_ir::{AnimData, Id, IdCode, IdFlag, IdHandle, IdTag, OverrideLibrary, PreviewImage, WalkFlags, WalkStep};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::idtype::IdTypeRegistry;
use crate::query::foreach_id_link;
use crate::stack::ensure_sufficient_stack;
use crate::{IdError, Main};

/// One serialized ID.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdRecord {
    pub code: IdCode,
    pub name: String,
    /// Handle at write time. `None` for embedded IDs.
    pub old: Option<IdHandle>,
    /// Old handle of the library, for linked IDs.
    pub lib: Option<IdHandle>,
    pub flag: u16,
    pub indirect: bool,
    pub anim_data: Option<AnimData>,
    pub override_library: Option<OverrideLibrary>,
    pub preview: Option<PreviewImage>,
    /// Payload blocks, in write order.
    pub blocks: Vec<Vec<u8>>,
    /// Embedded ID records, in write order.
    pub embedded: Vec<Option<IdRecord>>,
}

/// A serialized database.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemFile {
    pub records: Vec<IdRecord>,
}

impl MemFile {
    pub fn to_bytes(&self) -> Result<Vec<u8>, IdError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdError> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Local record of a given type and name.
    pub fn find(&self, code: IdCode, name: &str) -> Option<&IdRecord> {
        self.records
            .iter()
            .find(|record| record.lib.is_none() && record.code == code && record.name == name)
    }

    pub fn find_old(&self, old: IdHandle) -> Option<&IdRecord> {
        self.records.iter().find(|record| record.old == Some(old))
    }
}

/// Sink handed to [`IdTypeInfo::blend_write`](crate::IdTypeInfo::blend_write).
pub struct BlendWriter<'a> {
    registry: &'a IdTypeRegistry,
    blocks: Vec<Vec<u8>>,
    embedded: Vec<Option<IdRecord>>,
}

impl BlendWriter<'_> {
    /// Append one payload block.
    pub fn write_struct<T: Serialize>(&mut self, value: &T) -> Result<(), IdError> {
        self.blocks.push(bincode::serialize(value)?);
        Ok(())
    }

    /// Append an embedded ID slot (possibly empty).
    pub fn write_embedded(&mut self, id: Option<&Id>) -> Result<(), IdError> {
        let record = id.map(|id| write_record(self.registry, id, None)).transpose()?;
        self.embedded.push(record);
        Ok(())
    }
}

/// Source handed to [`IdTypeInfo::blend_read_data`](crate::IdTypeInfo::blend_read_data).
///
/// Blocks and embedded IDs are read back in write order.
pub struct BlendDataReader<'a> {
    registry: &'a IdTypeRegistry,
    record: &'a IdRecord,
    next_block: usize,
    next_embedded: usize,
}

impl BlendDataReader<'_> {
    pub fn read_struct<T: DeserializeOwned>(&mut self) -> Result<T, IdError> {
        let block = self.record.blocks.get(self.next_block).ok_or_else(|| {
            IdError::CorruptMemFile(format!(
                "`{}` has no data block {}",
                self.record.name, self.next_block
            ))
        })?;
        self.next_block += 1;
        Ok(bincode::deserialize(block)?)
    }

    pub fn read_embedded(&mut self) -> Result<Option<Box<Id>>, IdError> {
        let slot = self.record.embedded.get(self.next_embedded).ok_or_else(|| {
            IdError::CorruptMemFile(format!(
                "`{}` has no embedded ID {}",
                self.record.name, self.next_embedded
            ))
        })?;
        self.next_embedded += 1;
        slot.as_ref()
            .map(|record| read_record(self.registry, record))
            .transpose()
    }
}

fn write_record(registry: &IdTypeRegistry, id: &Id, old: Option<IdHandle>) -> Result<IdRecord, IdError> {
    let info = registry.info(id.code())?;
    let mut writer = BlendWriter {
        registry,
        blocks: Vec::new(),
        embedded: Vec::new(),
    };
    info.blend_write(&mut writer, &*id.data)?;
    Ok(IdRecord {
        code: id.code(),
        name: id.name.as_str().to_owned(),
        old,
        lib: id.lib,
        flag: id.flag.bits(),
        indirect: id.tag.contains(IdTag::INDIRECT),
        anim_data: id.anim_data.clone(),
        override_library: id.override_library.clone(),
        preview: id.preview.clone(),
        blocks: writer.blocks,
        embedded: writer.embedded,
    })
}

fn read_record(registry: &IdTypeRegistry, record: &IdRecord) -> Result<Box<Id>, IdError> {
    let info = registry.info(record.code)?;
    let mut reader = BlendDataReader {
        registry,
        record,
        next_block: 0,
        next_embedded: 0,
    };
    let data = info.blend_read_data(&mut reader)?;
    let mut id = Box::new(Id::new(record.code, &record.name, data));
    id.flag = IdFlag::from_bits_truncate(record.flag);
    id.anim_data = record.anim_data.clone();
    id.override_library = record.override_library.clone();
    id.preview = record.preview.clone();
    Ok(id)
}

/// Serialize every ID of the database.
///
/// The database must be consistent: not inside a bulk edit, lists sorted.
pub fn write_main(main: &Main) -> Result<MemFile, IdError> {
    debug_assert!(!main.is_bulk_editing(), "writing a database during a bulk edit");
    let registry = main.registry();
    let records = main
        .iter()
        .map(|(handle, id)| write_record(registry, id, Some(handle)))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(records = records.len(), "wrote memfile");
    Ok(MemFile { records })
}

/// Rewrite the references of freshly read IDs from old to new handles.
fn liblink(main: &mut Main, loaded: &[IdHandle], old_to_new: &FxHashMap<IdHandle, IdHandle>) -> Result<(), IdError> {
    for &handle in loaded {
        foreach_id_link(main, handle, WalkFlags::INCLUDE_UI, |_, link| {
            if let Some(old) = link.handle() {
                let new = old_to_new.get(&old).copied();
                if new.is_none() {
                    tracing::warn!(?old, holder = %link.holder, "unresolved reference cleared");
                }
                link.set(new);
            }
            WalkStep::Continue
        })?;
    }

    let session = Arc::clone(main.session());
    for &handle in loaded {
        let code = main.try_id(handle)?.code();
        session.registry().info(code)?.blend_read_after_liblink(main, handle);
    }
    Ok(())
}

/// Read a whole memfile into `main`.
///
/// Local names colliding with data already in `main` are made unique.
/// Returns the old → new handle map.
#[tracing::instrument(level = "debug", skip_all, fields(records = memfile.len()))]
pub fn read_main(main: &mut Main, memfile: &MemFile) -> Result<FxHashMap<IdHandle, IdHandle>, IdError> {
    let session = Arc::clone(main.session());
    let ids = memfile
        .records
        .iter()
        .map(|record| read_record(session.registry(), record))
        .collect::<Result<Vec<_>, _>>()?;

    main.with_bulk_edit(|main| {
        let slots: Vec<IdHandle> = ids.iter().map(|_| main.reserve()).collect();
        let mut old_to_new = FxHashMap::default();
        for (record, &slot) in memfile.records.iter().zip(&slots) {
            if let Some(old) = record.old {
                old_to_new.insert(old, slot);
            }
        }

        for ((record, mut id), &slot) in memfile.records.iter().zip(ids).zip(&slots) {
            if let Some(old_lib) = record.lib {
                id.lib = old_to_new.get(&old_lib).copied();
                if id.lib.is_none() {
                    tracing::warn!(id = %id.name.prefixed(), "library of linked ID missing, read as local");
                }
            }
            if id.is_linked() {
                id.tag.set(if record.indirect { IdTag::INDIRECT } else { IdTag::EXTERN });
            }
            main.add_to_main(Some(slot), id, false)?;
        }

        liblink(main, &slots, &old_to_new)?;
        main.refcount_recompute(false);
        tracing::debug!(ids = slots.len(), "read memfile");
        Ok(old_to_new)
    })
}

/// Replace the whole database with a memfile, as when opening a file.
///
/// Session identifiers restart from scratch unless another database still
/// shares the session. On error `main` is left empty.
pub fn reload_main(main: &mut Main, memfile: &MemFile) -> Result<FxHashMap<IdHandle, IdHandle>, IdError> {
    let session = Arc::clone(main.session());
    drop(std::mem::replace(main, Main::new(Arc::clone(&session))));
    // Held here and by the emptied database.
    if Arc::strong_count(&session) == 2 {
        session.reset_session_uids();
    } else {
        tracing::debug!("session shared, keeping session identifiers");
    }
    read_main(main, memfile)
}

/// IDs brought in by [`link_from`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkedIds {
    pub library: IdHandle,
    /// The requested IDs, directly linked.
    pub ids: Vec<IdHandle>,
}

struct LinkContext<'a> {
    memfile: &'a MemFile,
    library: IdHandle,
    old_to_new: FxHashMap<IdHandle, IdHandle>,
    loaded: Vec<IdHandle>,
}

impl LinkContext<'_> {
    /// Read one record as data linked from the library.
    fn load(&mut self, main: &mut Main, record: &IdRecord, tag: IdTag) -> Result<IdHandle, IdError> {
        let session = Arc::clone(main.session());
        let mut id = read_record(session.registry(), record)?;
        id.lib = Some(self.library);
        id.tag.set(tag);
        let handle = main.add_to_main(None, id, false)?;
        if let Some(old) = record.old {
            self.old_to_new.insert(old, handle);
        }
        self.loaded.push(handle);
        tracing::trace!(id = %record.name, ?tag, "linked ID");
        Ok(handle)
    }

    /// Load, as indirectly linked, every record `handle` references that is
    /// not loaded yet.
    fn expand(&mut self, main: &mut Main, handle: IdHandle) -> Result<(), IdError> {
        let mut olds = Vec::new();
        foreach_id_link(main, handle, WalkFlags::READONLY | WalkFlags::INCLUDE_UI, |_, link| {
            if let Some(old) = link.handle() {
                olds.push(old);
            }
            WalkStep::Continue
        })?;

        for old in olds {
            if self.old_to_new.contains_key(&old) {
                continue;
            }
            let Some(record) = self.memfile.find_old(old).filter(|record| record.lib.is_none()) else {
                continue;
            };
            let loaded = self.load(main, record, IdTag::INDIRECT)?;
            ensure_sufficient_stack(|| self.expand(main, loaded))?;
        }
        Ok(())
    }
}

/// Find the library ID for `path`, or create it.
fn ensure_library(main: &mut Main, path: &str) -> Result<IdHandle, IdError> {
    for handle in main.handles(IdCode::LI).to_vec() {
        let mut found = false;
        main.id_foreach_path(handle, &mut |lib_path| found |= lib_path.as_str() == path)?;
        if found {
            return Ok(handle);
        }
    }

    let name = path.rsplit_once('/').map_or(path, |(_, file)| file);
    let library = main.id_new(IdCode::LI, Some(name))?;
    main.id_foreach_path(library, &mut |lib_path| *lib_path = path.to_owned())?;
    tracing::debug!(path, "created library");
    Ok(library)
}

/// Link IDs of the file `library_path`, whose content is `memfile`.
///
/// IDs already linked from that library are reused. Requested IDs are
/// directly linked (`EXTERN`); what they need is linked as `INDIRECT`.
/// Unknown names are skipped with a warning.
#[tracing::instrument(level = "debug", skip(main, memfile))]
pub fn link_from(
    main: &mut Main,
    memfile: &MemFile,
    library_path: &str,
    names: &[(IdCode, &str)],
) -> Result<LinkedIds, IdError> {
    let library = ensure_library(main, library_path)?;

    let mut ctx = LinkContext {
        memfile,
        library,
        old_to_new: FxHashMap::default(),
        loaded: Vec::new(),
    };
    for record in &memfile.records {
        let (Some(old), None) = (record.old, record.lib) else {
            continue;
        };
        if let Some(existing) = main.find_name(record.code, &record.name, Some(library)) {
            ctx.old_to_new.insert(old, existing);
        }
    }

    let mut ids = Vec::with_capacity(names.len());
    for &(code, name) in names {
        if !main.registry().is_linkable(code) {
            return Err(IdError::NotLinkable(code));
        }
        let Some(record) = memfile.find(code, name) else {
            tracing::warn!(code = %code, name, "ID not found in library");
            continue;
        };
        let existing = record.old.and_then(|old| ctx.old_to_new.get(&old).copied());
        let handle = match existing {
            Some(existing) => {
                main.id_lib_extern(existing);
                existing
            }
            None => ctx.load(main, record, IdTag::EXTERN)?,
        };
        ids.push(handle);
    }

    let mut next = 0;
    while next < ctx.loaded.len() {
        let handle = ctx.loaded[next];
        ctx.expand(main, handle)?;
        next += 1;
    }

    let loaded = std::mem::take(&mut ctx.loaded);
    liblink(main, &loaded, &ctx.old_to_new)?;
    main.refcount_recompute(true);
    tracing::debug!(requested = ids.len(), loaded = loaded.len(), "linked library data");
    Ok(LinkedIds { library, ids })
}

/// Link, then make the new data local.
///
/// Data that was already linked before stays linked. Returns the local IDs
/// matching the requested names.
pub fn append_from(
    main: &mut Main,
    memfile: &MemFile,
    library_path: &str,
    names: &[(IdCode, &str)],
) -> Result<Vec<IdHandle>, IdError> {
    main.tag_all(IdTag::PRE_EXISTING, true);
    let linked = link_from(main, memfile, library_path, names);
    let result = linked.and_then(|linked| {
        let old_to_new = main.make_library_local(Some(linked.library), true, false)?;
        Ok(linked
            .ids
            .iter()
            .map(|handle| old_to_new.get(handle).copied().unwrap_or(*handle))
            .collect())
    });
    main.tag_all(IdTag::PRE_EXISTING, false);
    result
}
