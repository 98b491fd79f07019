//! Materials.
//!
//! A material may own a shader node tree. The tree is an embedded ID: it is
//! not in the database, is always copied with the material and is freed
//! with it.

use std::any::Any;

use idb_ir::{Id, IdCode, IdPayload};
use idb_lib::blend::{BlendDataReader, BlendWriter};
use idb_lib::{payload_ref, CopyContext, ForeachIdData, IdError, IdTypeInfo};
use serde::{Deserialize, Serialize};

use crate::NodeTree;

#[derive(Debug, Serialize, Deserialize)]
pub struct Material {
    pub color: [f32; 4],
    pub roughness: f32,
    pub metallic: f32,
    pub use_nodes: bool,
    #[serde(skip)]
    pub node_tree: Option<Box<Id>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: [0.8, 0.8, 0.8, 1.0],
            roughness: 0.4,
            metallic: 0.0,
            use_nodes: false,
            node_tree: None,
        }
    }
}

impl Material {
    pub fn node_tree(&self) -> Option<&NodeTree> {
        self.node_tree.as_deref()?.data::<NodeTree>()
    }

    pub fn node_tree_mut(&mut self) -> Option<&mut NodeTree> {
        self.node_tree.as_deref_mut()?.data_mut::<NodeTree>()
    }
}

pub(crate) struct MaterialType;

impl IdTypeInfo for MaterialType {
    fn code(&self) -> IdCode {
        IdCode::MA
    }

    fn name(&self) -> &'static str {
        "Material"
    }

    fn name_plural(&self) -> &'static str {
        "materials"
    }

    fn struct_size(&self) -> usize {
        std::mem::size_of::<Material>()
    }

    fn init_data(&self) -> IdPayload {
        Box::<Material>::default()
    }

    fn copy_data(&self, ctx: &mut CopyContext<'_>, src: &dyn Any) -> Result<IdPayload, IdError> {
        let src = payload_ref::<Material>(src, self.name())?;
        let node_tree = src
            .node_tree
            .as_deref()
            .map(|tree| ctx.copy_embedded(tree))
            .transpose()?;
        Ok(Box::new(Material {
            color: src.color,
            roughness: src.roughness,
            metallic: src.metallic,
            use_nodes: src.use_nodes,
            node_tree,
        }))
    }

    fn foreach_id(&self, data: &mut dyn Any, walk: &mut ForeachIdData<'_>) {
        if let Some(material) = data.downcast_mut::<Material>() {
            walk.process_embedded(&mut material.node_tree);
        }
    }

    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        let material = payload_ref::<Material>(data, self.name())?;
        writer.write_struct(material)?;
        writer.write_embedded(material.node_tree.as_deref())
    }

    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        let mut material: Material = reader.read_struct()?;
        material.node_tree = reader.read_embedded()?;
        Ok(Box::new(material))
    }
}
