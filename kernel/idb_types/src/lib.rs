//! Built-in data-block types.
//!
//! Each module defines one payload struct and the [`IdTypeInfo`] descriptor
//! that plugs it into the lifecycle engine. [`builtin_registry`] registers
//! all of them. The [`assign`] module holds the editing operations that wire
//! IDs together while keeping user counts exact.
//!
//! | Code | Type | Notes |
//! |------|------|-------|
//! | `LI` | [`Library`] | not copyable, not linkable |
//! | `AC` | [`Action`] | owned through animation data |
//! | `KE` | [`Key`] | owned by a mesh, points back to it |
//! | `NT` | [`NodeTree`] | also embedded in materials |
//! | `IM` | [`Image`] | external file, runtime cache |
//! | `MA` | [`Material`] | embedded shader node tree |
//! | `ME` | [`Mesh`] | material slots, owned shape key |
//! | `OB` | [`Object`] | never-null object data |
//! | `GR` | [`Collection`] | also embedded in scenes |
//! | `SC` | [`Scene`] | never unused |
//! | `SR` | [`Screen`] | UI-only references |

use std::any::Any;
use std::sync::Arc;

use idb_ir::IdPayload;
use idb_lib::blend::{BlendDataReader, BlendWriter};
use idb_lib::{payload_ref, IdError, IdTypeRegistry, Main, Session};
use serde::de::DeserializeOwned;
use serde::Serialize;

mod action;
pub mod assign;
mod collection;
mod image;
mod key;
mod library;
mod material;
mod mesh;
mod node_tree;
mod object;
mod scene;
mod screen;

pub use action::{Action, FCurve};
pub use collection::Collection;
pub use image::{Image, ImageSource};
pub use key::{Key, KeyBlock};
pub use library::Library;
pub use material::Material;
pub use mesh::{Bounds, Mesh};
pub use node_tree::{Node, NodeTree, NodeTreeKind};
pub use object::{Object, ObjectKind};
pub use scene::Scene;
pub use screen::{Area, Screen, SpaceKind};

/// A registry holding every built-in type, in list order.
pub fn builtin_registry() -> IdTypeRegistry {
    let mut registry = IdTypeRegistry::new();
    registry.register(Box::new(library::LibraryType));
    registry.register(Box::new(action::ActionType));
    registry.register(Box::new(key::KeyType));
    registry.register(Box::new(node_tree::NodeTreeType));
    registry.register(Box::new(image::ImageType));
    registry.register(Box::new(material::MaterialType));
    registry.register(Box::new(mesh::MeshType));
    registry.register(Box::new(object::ObjectType));
    registry.register(Box::new(collection::CollectionType));
    registry.register(Box::new(scene::SceneType));
    registry.register(Box::new(screen::ScreenType));
    registry
}

pub fn builtin_session() -> Arc<Session> {
    Session::initialize(builtin_registry())
}

/// An empty database over the built-in types.
pub fn builtin_main() -> Main {
    Main::new(builtin_session())
}

/// Write a payload that is a single serializable struct.
fn write_plain<T: Serialize + 'static>(
    writer: &mut BlendWriter<'_>,
    data: &dyn Any,
    name: &str,
) -> Result<(), IdError> {
    writer.write_struct(payload_ref::<T>(data, name)?)
}

fn read_plain<T: DeserializeOwned + Send + Sync + 'static>(
    reader: &mut BlendDataReader<'_>,
) -> Result<IdPayload, IdError> {
    Ok(Box::new(reader.read_struct::<T>()?))
}
