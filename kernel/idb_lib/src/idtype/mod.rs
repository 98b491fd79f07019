//! Per-type descriptors.
//!
//! Every concrete data-block type plugs into the generic lifecycle machinery
//! through one [`IdTypeInfo`] implementation, registered under its
//! [`IdCode`] in an [`IdTypeRegistry`]. The registry is an explicit value
//! owned by the [`Session`](crate::Session); there is no global table.
//!
//! # Contract
//!
//! - `foreach_id` must report every reference slot of the payload with its
//!   correct [`RefKind`](idb_ir::RefKind), and every embedded ID. A missed
//!   slot is a silent user-count leak or a dangling handle after deletion.
//! - `copy_data` copies the payload only. Reference counting of the copied
//!   slots is done afterwards by the copy engine, in one walk.
//! - `free_data` releases payload resources and never touches the database.

use std::any::Any;
use std::fmt;

use bitflags::bitflags;
use idb_ir::{IdCode, IdHandle, IdPayload};
use rustc_hash::FxHashMap;

use crate::blend::{BlendDataReader, BlendWriter};
use crate::copy::{CopyContext, DuplicateMap};
use crate::flags::MakeLocalFlags;
use crate::query::ForeachIdData;
use crate::{IdError, Main};

bitflags! {
    /// Static properties of an ID type.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct IdTypeFlags: u8 {
        /// IDs of this type cannot be copied.
        const NO_COPY = 1 << 0;
        /// IDs of this type cannot be linked from a library.
        const NO_LIBLINKING = 1 << 1;
        /// IDs of this type carry no animation data.
        const NO_ANIMDATA = 1 << 2;
        /// IDs of this type always keep one virtual user.
        const NEVER_UNUSED = 1 << 3;
    }
}

/// Behaviour of one data-block type.
pub trait IdTypeInfo: Send + Sync + 'static {
    fn code(&self) -> IdCode;

    /// Default name of new IDs ("Material").
    fn name(&self) -> &'static str;

    /// Collection name ("materials").
    fn name_plural(&self) -> &'static str;

    /// In-memory size of the payload struct.
    fn struct_size(&self) -> usize;

    fn flags(&self) -> IdTypeFlags {
        IdTypeFlags::empty()
    }

    /// A valid empty payload.
    fn init_data(&self) -> IdPayload;

    /// Copy the payload of `src`. Embedded IDs are always copied, owned
    /// sub-IDs follow the deep-copy flags of `ctx`.
    fn copy_data(&self, ctx: &mut CopyContext<'_>, src: &dyn Any) -> Result<IdPayload, IdError>;

    /// Release payload resources.
    fn free_data(&self, _data: &mut dyn Any) {}

    /// Make a linked ID local. Types with special needs override this and
    /// usually still end in the generic algorithm.
    fn make_local(
        &self,
        main: &mut Main,
        id: IdHandle,
        flags: MakeLocalFlags,
        duplicates: &mut DuplicateMap,
    ) -> Result<(), IdError> {
        main.make_local_generic(id, flags, duplicates)
    }

    /// Report every reference slot and embedded ID of the payload.
    fn foreach_id(&self, data: &mut dyn Any, walk: &mut ForeachIdData<'_>);

    /// Visit external file paths held by the payload.
    fn foreach_path(&self, _data: &mut dyn Any, _visit: &mut dyn FnMut(&mut String)) {}

    /// A separate database ID whose lifetime is bound to this one
    /// (shape keys of geometry).
    fn owned_id(&self, _data: &dyn Any) -> Option<IdHandle> {
        None
    }

    /// Owner of an ID whose lifetime is bound to another one.
    fn owner_id(&self, _data: &dyn Any) -> Option<IdHandle> {
        None
    }

    /// Point an owned ID back at its (new) owner.
    fn set_owner_id(&self, _data: &mut dyn Any, _owner: Option<IdHandle>) {}

    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError>;

    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError>;

    /// Fix-up once every reference of a load batch has been resolved.
    fn blend_read_after_liblink(&self, _main: &mut Main, _id: IdHandle) {}
}

/// Map from type code to descriptor.
///
/// Registration order is the iteration order of the database's lists.
#[derive(Default)]
pub struct IdTypeRegistry {
    types: FxHashMap<IdCode, Box<dyn IdTypeInfo>>,
    order: Vec<IdCode>,
}

impl IdTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any previous one for the same code.
    pub fn register(&mut self, info: Box<dyn IdTypeInfo>) {
        let code = info.code();
        if self.types.insert(code, info).is_none() {
            self.order.push(code);
        }
    }

    pub fn get(&self, code: IdCode) -> Option<&dyn IdTypeInfo> {
        self.types.get(&code).map(|info| &**info)
    }

    pub fn info(&self, code: IdCode) -> Result<&dyn IdTypeInfo, IdError> {
        self.get(code).ok_or(IdError::UnknownType(code))
    }

    pub fn contains(&self, code: IdCode) -> bool {
        self.types.contains_key(&code)
    }

    /// Registered codes, in registration order.
    pub fn codes(&self) -> &[IdCode] {
        &self.order
    }

    /// Can IDs of this type be linked from a library?
    pub fn is_linkable(&self, code: IdCode) -> bool {
        self.get(code)
            .is_some_and(|info| !info.flags().contains(IdTypeFlags::NO_LIBLINKING))
    }

    /// Look up a type by its default name ("Material").
    pub fn code_from_name(&self, name: &str) -> Option<IdCode> {
        self.order
            .iter()
            .copied()
            .find(|code| self.get(*code).is_some_and(|info| info.name() == name))
    }
}

impl fmt::Debug for IdTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.order.iter()).finish()
    }
}

/// Downcast a payload in a descriptor callback.
pub fn payload_ref<'a, T: 'static>(data: &'a dyn Any, name: &str) -> Result<&'a T, IdError> {
    data.downcast_ref::<T>().ok_or_else(|| IdError::PayloadMismatch {
        name: name.to_owned(),
        expected: std::any::type_name::<T>(),
    })
}
