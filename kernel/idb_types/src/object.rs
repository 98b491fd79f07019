//! Objects.

use std::any::Any;

use idb_ir::{IdCode, IdHandle, IdPayload, RefKind};
use idb_lib::blend::{BlendDataReader, BlendWriter};
use idb_lib::{payload_ref, CopyContext, ForeachIdData, IdError, IdTypeInfo, Main};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{assign, read_plain, write_plain};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    #[default]
    Empty,
    Mesh,
}

impl ObjectKind {
    /// Type of the object data this kind expects.
    pub fn data_code(self) -> Option<IdCode> {
        match self {
            Self::Empty => None,
            Self::Mesh => Some(IdCode::ME),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub kind: ObjectKind,
    /// Object data. An object with data cannot live without it.
    pub data: Option<IdHandle>,
    /// Object-level material slots, as many as the data has.
    pub materials: SmallVec<[Option<IdHandle>; 4]>,
    pub parent: Option<IdHandle>,
    /// Collection instanced at the object's location.
    pub instance_collection: Option<IdHandle>,
    pub location: [f32; 3],
}

pub(crate) struct ObjectType;

impl IdTypeInfo for ObjectType {
    fn code(&self) -> IdCode {
        IdCode::OB
    }

    fn name(&self) -> &'static str {
        "Object"
    }

    fn name_plural(&self) -> &'static str {
        "objects"
    }

    fn struct_size(&self) -> usize {
        std::mem::size_of::<Object>()
    }

    fn init_data(&self) -> IdPayload {
        Box::<Object>::default()
    }

    fn copy_data(&self, _ctx: &mut CopyContext<'_>, src: &dyn Any) -> Result<IdPayload, IdError> {
        Ok(Box::new(payload_ref::<Object>(src, self.name())?.clone()))
    }

    fn foreach_id(&self, data: &mut dyn Any, walk: &mut ForeachIdData<'_>) {
        let Some(object) = data.downcast_mut::<Object>() else {
            return;
        };
        walk.process(&mut object.data, RefKind::USER | RefKind::NEVER_NULL);
        walk.process_all(object.materials.iter_mut(), RefKind::USER);
        walk.process(&mut object.parent, RefKind::NEVER_SELF);
        walk.process(&mut object.instance_collection, RefKind::USER);
    }

    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        write_plain::<Object>(writer, data, self.name())
    }

    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        read_plain::<Object>(reader)
    }

    fn blend_read_after_liblink(&self, main: &mut Main, id: IdHandle) {
        if let Err(err) = assign::object_materials_sync(main, id) {
            tracing::warn!(%err, "material slots of loaded object not synced");
        }
    }
}
