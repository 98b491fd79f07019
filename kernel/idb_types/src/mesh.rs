//! Mesh geometry.

use std::any::Any;

use idb_ir::{IdCode, IdHandle, IdPayload, RefKind};
use idb_lib::blend::{BlendDataReader, BlendWriter};
use idb_lib::{payload_ref, CopyContext, CopyFlags, ForeachIdData, IdError, IdTypeInfo};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{read_plain, write_plain};

/// Axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    /// Vertex indices of each face.
    pub faces: Vec<SmallVec<[u32; 4]>>,
    /// Material slots. Objects using the mesh mirror their count.
    pub materials: SmallVec<[Option<IdHandle>; 4]>,
    /// Owned shape key.
    pub key: Option<IdHandle>,
    #[serde(skip)]
    pub bounds_cache: Option<Bounds>,
}

impl Mesh {
    /// Bounding box of the positions, cached until the next
    /// [`Mesh::tag_positions_changed`].
    pub fn bounds(&mut self) -> Option<Bounds> {
        if self.bounds_cache.is_none() {
            let (first, rest) = self.positions.split_first()?;
            let mut bounds = Bounds {
                min: *first,
                max: *first,
            };
            for position in rest {
                for axis in 0..3 {
                    bounds.min[axis] = bounds.min[axis].min(position[axis]);
                    bounds.max[axis] = bounds.max[axis].max(position[axis]);
                }
            }
            self.bounds_cache = Some(bounds);
        }
        self.bounds_cache
    }

    pub fn tag_positions_changed(&mut self) {
        self.bounds_cache = None;
    }
}

pub(crate) struct MeshType;

impl IdTypeInfo for MeshType {
    fn code(&self) -> IdCode {
        IdCode::ME
    }

    fn name(&self) -> &'static str {
        "Mesh"
    }

    fn name_plural(&self) -> &'static str {
        "meshes"
    }

    fn struct_size(&self) -> usize {
        std::mem::size_of::<Mesh>()
    }

    fn init_data(&self) -> IdPayload {
        Box::<Mesh>::default()
    }

    fn copy_data(&self, ctx: &mut CopyContext<'_>, src: &dyn Any) -> Result<IdPayload, IdError> {
        let src = payload_ref::<Mesh>(src, self.name())?;
        let flags = ctx.flags();
        let key = match src.key {
            Some(key) if flags.contains(CopyFlags::COPY_SHAPEKEY) => ctx.copy_owned_id(key)?,
            key => key,
        };
        Ok(Box::new(Mesh {
            positions: src.positions.clone(),
            faces: src.faces.clone(),
            materials: src.materials.clone(),
            key,
            bounds_cache: src.bounds_cache.filter(|_| flags.contains(CopyFlags::COPY_CACHES)),
        }))
    }

    fn free_data(&self, data: &mut dyn Any) {
        if let Some(mesh) = data.downcast_mut::<Mesh>() {
            mesh.bounds_cache = None;
        }
    }

    fn foreach_id(&self, data: &mut dyn Any, walk: &mut ForeachIdData<'_>) {
        if let Some(mesh) = data.downcast_mut::<Mesh>() {
            walk.process_all(mesh.materials.iter_mut(), RefKind::USER);
            walk.process(&mut mesh.key, RefKind::USER);
        }
    }

    fn owned_id(&self, data: &dyn Any) -> Option<IdHandle> {
        data.downcast_ref::<Mesh>()?.key
    }

    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        write_plain::<Mesh>(writer, data, self.name())
    }

    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        read_plain::<Mesh>(reader)
    }
}
