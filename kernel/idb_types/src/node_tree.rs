//! Node trees: standalone node groups, and the private shader graphs
//! embedded in materials.

use std::any::Any;

use idb_ir::{IdCode, IdHandle, IdPayload, RefKind};
use idb_lib::blend::{BlendDataReader, BlendWriter};
use idb_lib::{payload_ref, CopyContext, ForeachIdData, IdError, IdTypeInfo};
use serde::{Deserialize, Serialize};

use crate::{read_plain, write_plain};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeTreeKind {
    #[default]
    Shader,
    Compositor,
    Geometry,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// Data-block the node reads: an image, a node group...
    pub id: Option<IdHandle>,
    pub location: [f32; 2],
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeTree {
    pub kind: NodeTreeKind,
    pub nodes: Vec<Node>,
}

impl NodeTree {
    pub fn new(kind: NodeTreeKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
        }
    }

    /// Data-blocks used by the nodes, in node order.
    pub fn used_ids(&self) -> impl Iterator<Item = IdHandle> + '_ {
        self.nodes.iter().filter_map(|node| node.id)
    }
}

pub(crate) struct NodeTreeType;

impl IdTypeInfo for NodeTreeType {
    fn code(&self) -> IdCode {
        IdCode::NT
    }

    fn name(&self) -> &'static str {
        "NodeTree"
    }

    fn name_plural(&self) -> &'static str {
        "node_groups"
    }

    fn struct_size(&self) -> usize {
        std::mem::size_of::<NodeTree>()
    }

    fn init_data(&self) -> IdPayload {
        Box::<NodeTree>::default()
    }

    fn copy_data(&self, _ctx: &mut CopyContext<'_>, src: &dyn Any) -> Result<IdPayload, IdError> {
        Ok(Box::new(payload_ref::<NodeTree>(src, self.name())?.clone()))
    }

    fn foreach_id(&self, data: &mut dyn Any, walk: &mut ForeachIdData<'_>) {
        if let Some(tree) = data.downcast_mut::<NodeTree>() {
            walk.process_all(tree.nodes.iter_mut().map(|node| &mut node.id), RefKind::USER);
        }
    }

    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        write_plain::<NodeTree>(writer, data, self.name())
    }

    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        read_plain::<NodeTree>(reader)
    }
}
