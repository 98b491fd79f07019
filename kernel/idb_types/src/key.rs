//! Shape keys.
//!
//! A [`Key`] is a database ID owned by exactly one geometry ID. It is freed,
//! deleted and made local together with its owner, and points back to it
//! through a loop-back reference that never counts as a user.

use std::any::Any;

use idb_ir::{IdCode, IdHandle, IdPayload, RefKind};
use idb_lib::blend::{BlendDataReader, BlendWriter};
use idb_lib::{payload_ref, CopyContext, ForeachIdData, IdError, IdTypeFlags, IdTypeInfo};
use serde::{Deserialize, Serialize};

use crate::{read_plain, write_plain};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyBlock {
    pub name: String,
    pub value: f32,
    pub positions: Vec<[f32; 3]>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub owner: Option<IdHandle>,
    /// The first block is the basis.
    pub blocks: Vec<KeyBlock>,
}

pub(crate) struct KeyType;

impl IdTypeInfo for KeyType {
    fn code(&self) -> IdCode {
        IdCode::KE
    }

    fn name(&self) -> &'static str {
        "Key"
    }

    fn name_plural(&self) -> &'static str {
        "shape_keys"
    }

    fn struct_size(&self) -> usize {
        std::mem::size_of::<Key>()
    }

    fn flags(&self) -> IdTypeFlags {
        IdTypeFlags::NO_LIBLINKING
    }

    fn init_data(&self) -> IdPayload {
        Box::<Key>::default()
    }

    fn copy_data(&self, _ctx: &mut CopyContext<'_>, src: &dyn Any) -> Result<IdPayload, IdError> {
        Ok(Box::new(payload_ref::<Key>(src, self.name())?.clone()))
    }

    fn foreach_id(&self, data: &mut dyn Any, walk: &mut ForeachIdData<'_>) {
        if let Some(key) = data.downcast_mut::<Key>() {
            walk.process(&mut key.owner, RefKind::LOOPBACK);
        }
    }

    fn owner_id(&self, data: &dyn Any) -> Option<IdHandle> {
        data.downcast_ref::<Key>()?.owner
    }

    fn set_owner_id(&self, data: &mut dyn Any, owner: Option<IdHandle>) {
        if let Some(key) = data.downcast_mut::<Key>() {
            key.owner = owner;
        }
    }

    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        write_plain::<Key>(writer, data, self.name())
    }

    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        read_plain::<Key>(reader)
    }
}
