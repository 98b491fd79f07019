//! Collections.
//!
//! Scenes embed a master collection of the same type.

use std::any::Any;

use idb_ir::{IdCode, IdHandle, IdPayload, RefKind};
use idb_lib::blend::{BlendDataReader, BlendWriter};
use idb_lib::{payload_ref, CopyContext, ForeachIdData, IdError, IdTypeInfo, Main};
use serde::{Deserialize, Serialize};

use crate::{read_plain, write_plain};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub objects: Vec<Option<IdHandle>>,
    pub children: Vec<Option<IdHandle>>,
    pub hide_render: bool,
}

impl Collection {
    /// Drop slots emptied by remapping. Returns how many were dropped.
    pub fn remove_nulls(&mut self) -> usize {
        let before = self.objects.len() + self.children.len();
        self.objects.retain(Option::is_some);
        self.children.retain(Option::is_some);
        before - self.objects.len() - self.children.len()
    }

    pub fn has_object(&self, object: IdHandle) -> bool {
        self.objects.contains(&Some(object))
    }
}

pub(crate) struct CollectionType;

impl IdTypeInfo for CollectionType {
    fn code(&self) -> IdCode {
        IdCode::GR
    }

    fn name(&self) -> &'static str {
        "Collection"
    }

    fn name_plural(&self) -> &'static str {
        "collections"
    }

    fn struct_size(&self) -> usize {
        std::mem::size_of::<Collection>()
    }

    fn init_data(&self) -> IdPayload {
        Box::<Collection>::default()
    }

    fn copy_data(&self, _ctx: &mut CopyContext<'_>, src: &dyn Any) -> Result<IdPayload, IdError> {
        Ok(Box::new(payload_ref::<Collection>(src, self.name())?.clone()))
    }

    fn foreach_id(&self, data: &mut dyn Any, walk: &mut ForeachIdData<'_>) {
        if let Some(collection) = data.downcast_mut::<Collection>() {
            walk.process_all(collection.objects.iter_mut(), RefKind::USER);
            walk.process_all(collection.children.iter_mut(), RefKind::USER | RefKind::NEVER_SELF);
        }
    }

    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        write_plain::<Collection>(writer, data, self.name())
    }

    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        read_plain::<Collection>(reader)
    }

    fn blend_read_after_liblink(&self, main: &mut Main, id: IdHandle) {
        if let Some(collection) = main.data_mut::<Collection>(id) {
            let dropped = collection.remove_nulls();
            if dropped > 0 {
                tracing::debug!(dropped, "dropped unresolved collection members");
            }
        }
    }
}
