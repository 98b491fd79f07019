//! Scenes.

use std::any::Any;

use idb_ir::{Id, IdCode, IdHandle, IdPayload, RefKind};
use idb_lib::blend::{BlendDataReader, BlendWriter};
use idb_lib::{payload_ref, CopyContext, ForeachIdData, IdError, IdTypeFlags, IdTypeInfo};
use serde::{Deserialize, Serialize};

use crate::Collection;

#[derive(Debug, Serialize, Deserialize)]
pub struct Scene {
    /// Active camera object. Not a user.
    pub camera: Option<IdHandle>,
    pub frame_current: i32,
    pub frame_start: i32,
    pub frame_end: i32,
    /// Root of the scene's collection hierarchy, embedded.
    #[serde(skip)]
    pub master_collection: Option<Box<Id>>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            camera: None,
            frame_current: 1,
            frame_start: 1,
            frame_end: 250,
            master_collection: None,
        }
    }
}

impl Scene {
    pub fn master_collection(&self) -> Option<&Collection> {
        self.master_collection.as_deref()?.data::<Collection>()
    }

    pub fn master_collection_mut(&mut self) -> Option<&mut Collection> {
        self.master_collection.as_deref_mut()?.data_mut::<Collection>()
    }
}

pub(crate) struct SceneType;

impl IdTypeInfo for SceneType {
    fn code(&self) -> IdCode {
        IdCode::SCE
    }

    fn name(&self) -> &'static str {
        "Scene"
    }

    fn name_plural(&self) -> &'static str {
        "scenes"
    }

    fn struct_size(&self) -> usize {
        std::mem::size_of::<Scene>()
    }

    fn flags(&self) -> IdTypeFlags {
        IdTypeFlags::NEVER_UNUSED
    }

    fn init_data(&self) -> IdPayload {
        Box::<Scene>::default()
    }

    fn copy_data(&self, ctx: &mut CopyContext<'_>, src: &dyn Any) -> Result<IdPayload, IdError> {
        let src = payload_ref::<Scene>(src, self.name())?;
        let master_collection = src
            .master_collection
            .as_deref()
            .map(|collection| ctx.copy_embedded(collection))
            .transpose()?;
        Ok(Box::new(Scene {
            camera: src.camera,
            frame_current: src.frame_current,
            frame_start: src.frame_start,
            frame_end: src.frame_end,
            master_collection,
        }))
    }

    fn foreach_id(&self, data: &mut dyn Any, walk: &mut ForeachIdData<'_>) {
        if let Some(scene) = data.downcast_mut::<Scene>() {
            walk.process(&mut scene.camera, RefKind::NOP);
            walk.process_embedded(&mut scene.master_collection);
        }
    }

    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        let scene = payload_ref::<Scene>(data, self.name())?;
        writer.write_struct(scene)?;
        writer.write_embedded(scene.master_collection.as_deref())
    }

    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        let mut scene: Scene = reader.read_struct()?;
        scene.master_collection = reader.read_embedded()?;
        Ok(Box::new(scene))
    }
}
