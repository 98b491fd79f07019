//! Small ID types exercising every reference kind, for unit tests.

use std::any::Any;

use idb_ir::{Id, IdCode, IdHandle, IdPayload, RefKind};
use serde::{Deserialize, Serialize};

use crate::blend::{BlendDataReader, BlendWriter};
use crate::copy::CopyContext;
use crate::flags::CopyFlags;
use crate::idtype::{payload_ref, IdTypeFlags, IdTypeInfo, IdTypeRegistry};
use crate::query::ForeachIdData;
use crate::{IdError, Main, Session};

pub(crate) const NODE: IdCode = IdCode::from_chars(*b"TA");
pub(crate) const KEY: IdCode = IdCode::from_chars(*b"TK");
pub(crate) const EMBED: IdCode = IdCode::from_chars(*b"TE");
pub(crate) const UI: IdCode = IdCode::from_chars(*b"TU");

/// Generic node: counted users, a weak slot, a never-null slot, an owned key,
/// a cache, an external path and an embedded ID.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Node {
    pub value: i32,
    pub users: Vec<Option<IdHandle>>,
    pub weak: Option<IdHandle>,
    pub never_null: Option<IdHandle>,
    pub key: Option<IdHandle>,
    pub cache: Option<Vec<u8>>,
    pub path: String,
    #[serde(skip)]
    pub embedded: Option<Box<Id>>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Key {
    pub owner: Option<IdHandle>,
    pub values: Vec<f32>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Embed {
    pub refs: Vec<Option<IdHandle>>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Lib {
    pub filepath: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Ui {
    pub shown: Option<IdHandle>,
}

struct NodeType;

impl IdTypeInfo for NodeType {
    fn code(&self) -> IdCode {
        NODE
    }
    fn name(&self) -> &'static str {
        "Node"
    }
    fn name_plural(&self) -> &'static str {
        "nodes"
    }
    fn struct_size(&self) -> usize {
        std::mem::size_of::<Node>()
    }
    fn init_data(&self) -> IdPayload {
        Box::<Node>::default()
    }
    fn copy_data(&self, ctx: &mut CopyContext<'_>, src: &dyn Any) -> Result<IdPayload, IdError> {
        let src = payload_ref::<Node>(src, self.name())?;
        let key = match src.key {
            Some(key) if ctx.flags().contains(CopyFlags::COPY_SHAPEKEY) => {
                ctx.copy_owned_id(key)?
            }
            key => key,
        };
        let embedded = src
            .embedded
            .as_deref()
            .map(|embedded| ctx.copy_embedded(embedded))
            .transpose()?;
        Ok(Box::new(Node {
            value: src.value,
            users: src.users.clone(),
            weak: src.weak,
            never_null: src.never_null,
            key,
            cache: src
                .cache
                .clone()
                .filter(|_| ctx.flags().contains(CopyFlags::COPY_CACHES)),
            path: src.path.clone(),
            embedded,
        }))
    }
    fn foreach_id(&self, data: &mut dyn Any, walk: &mut ForeachIdData<'_>) {
        let Some(node) = data.downcast_mut::<Node>() else {
            return;
        };
        walk.process_all(node.users.iter_mut(), RefKind::USER);
        walk.process(&mut node.weak, RefKind::NOP);
        walk.process(&mut node.never_null, RefKind::USER | RefKind::NEVER_NULL);
        walk.process(&mut node.key, RefKind::USER);
        walk.process_embedded(&mut node.embedded);
    }
    fn foreach_path(&self, data: &mut dyn Any, visit: &mut dyn FnMut(&mut String)) {
        if let Some(node) = data.downcast_mut::<Node>() {
            if !node.path.is_empty() {
                visit(&mut node.path);
            }
        }
    }
    fn owned_id(&self, data: &dyn Any) -> Option<IdHandle> {
        data.downcast_ref::<Node>()?.key
    }
    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        let node = payload_ref::<Node>(data, self.name())?;
        writer.write_struct(node)?;
        writer.write_embedded(node.embedded.as_deref())
    }
    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        let mut node: Node = reader.read_struct()?;
        node.embedded = reader.read_embedded()?;
        Ok(Box::new(node))
    }
}

struct KeyType;

impl IdTypeInfo for KeyType {
    fn code(&self) -> IdCode {
        KEY
    }
    fn name(&self) -> &'static str {
        "Key"
    }
    fn name_plural(&self) -> &'static str {
        "keys"
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
        writer.write_struct(payload_ref::<Key>(data, self.name())?)
    }
    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        Ok(Box::new(reader.read_struct::<Key>()?))
    }
}

struct EmbedType;

impl IdTypeInfo for EmbedType {
    fn code(&self) -> IdCode {
        EMBED
    }
    fn name(&self) -> &'static str {
        "Embed"
    }
    fn name_plural(&self) -> &'static str {
        "embeds"
    }
    fn struct_size(&self) -> usize {
        std::mem::size_of::<Embed>()
    }
    fn init_data(&self) -> IdPayload {
        Box::<Embed>::default()
    }
    fn copy_data(&self, _ctx: &mut CopyContext<'_>, src: &dyn Any) -> Result<IdPayload, IdError> {
        Ok(Box::new(payload_ref::<Embed>(src, self.name())?.clone()))
    }
    fn foreach_id(&self, data: &mut dyn Any, walk: &mut ForeachIdData<'_>) {
        if let Some(embed) = data.downcast_mut::<Embed>() {
            walk.process_all(embed.refs.iter_mut(), RefKind::USER);
        }
    }
    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        writer.write_struct(payload_ref::<Embed>(data, self.name())?)
    }
    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        Ok(Box::new(reader.read_struct::<Embed>()?))
    }
}

struct LibType;

impl IdTypeInfo for LibType {
    fn code(&self) -> IdCode {
        IdCode::LI
    }
    fn name(&self) -> &'static str {
        "Library"
    }
    fn name_plural(&self) -> &'static str {
        "libraries"
    }
    fn struct_size(&self) -> usize {
        std::mem::size_of::<Lib>()
    }
    fn flags(&self) -> IdTypeFlags {
        IdTypeFlags::NO_COPY | IdTypeFlags::NO_LIBLINKING | IdTypeFlags::NO_ANIMDATA
    }
    fn init_data(&self) -> IdPayload {
        Box::<Lib>::default()
    }
    fn copy_data(&self, _ctx: &mut CopyContext<'_>, _src: &dyn Any) -> Result<IdPayload, IdError> {
        Err(IdError::CopyUnsupported(IdCode::LI))
    }
    fn foreach_id(&self, _data: &mut dyn Any, _walk: &mut ForeachIdData<'_>) {}
    fn foreach_path(&self, data: &mut dyn Any, visit: &mut dyn FnMut(&mut String)) {
        if let Some(lib) = data.downcast_mut::<Lib>() {
            visit(&mut lib.filepath);
        }
    }
    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        writer.write_struct(payload_ref::<Lib>(data, self.name())?)
    }
    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        Ok(Box::new(reader.read_struct::<Lib>()?))
    }
}

struct UiType;

impl IdTypeInfo for UiType {
    fn code(&self) -> IdCode {
        UI
    }
    fn name(&self) -> &'static str {
        "Ui"
    }
    fn name_plural(&self) -> &'static str {
        "uis"
    }
    fn struct_size(&self) -> usize {
        std::mem::size_of::<Ui>()
    }
    fn flags(&self) -> IdTypeFlags {
        IdTypeFlags::NO_COPY | IdTypeFlags::NO_LIBLINKING | IdTypeFlags::NEVER_UNUSED
    }
    fn init_data(&self) -> IdPayload {
        Box::<Ui>::default()
    }
    fn copy_data(&self, _ctx: &mut CopyContext<'_>, _src: &dyn Any) -> Result<IdPayload, IdError> {
        Err(IdError::CopyUnsupported(UI))
    }
    fn foreach_id(&self, data: &mut dyn Any, walk: &mut ForeachIdData<'_>) {
        if !walk.include_ui() {
            return;
        }
        if let Some(ui) = data.downcast_mut::<Ui>() {
            walk.process(&mut ui.shown, RefKind::USER_ONE);
        }
    }
    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        writer.write_struct(payload_ref::<Ui>(data, self.name())?)
    }
    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        Ok(Box::new(reader.read_struct::<Ui>()?))
    }
}

pub(crate) fn test_registry() -> IdTypeRegistry {
    let mut registry = IdTypeRegistry::new();
    registry.register(Box::new(LibType));
    registry.register(Box::new(KeyType));
    registry.register(Box::new(EmbedType));
    registry.register(Box::new(NodeType));
    registry.register(Box::new(UiType));
    registry
}

pub(crate) fn test_main() -> Main {
    Main::new(Session::initialize(test_registry()))
}

pub(crate) fn node(main: &Main, handle: IdHandle) -> &Node {
    match main.data::<Node>(handle) {
        Some(node) => node,
        None => panic!("{handle:?} is not a node"),
    }
}

pub(crate) fn node_mut(main: &mut Main, handle: IdHandle) -> &mut Node {
    match main.data_mut::<Node>(handle) {
        Some(node) => node,
        None => panic!("{handle:?} is not a node"),
    }
}

/// Store `target` in a new user slot of `owner` and count it.
pub(crate) fn add_user(main: &mut Main, owner: IdHandle, target: IdHandle) {
    node_mut(main, owner).users.push(Some(target));
    main.id_us_plus(target);
}

/// Attach a fresh embedded ID to a node.
pub(crate) fn add_embedded(main: &mut Main, owner: IdHandle, refs: Vec<Option<IdHandle>>) {
    let session = std::sync::Arc::clone(main.session());
    let mut embedded = match session.id_new_embedded(EMBED, Some("Embedded")) {
        Ok(embedded) => embedded,
        Err(err) => panic!("{err}"),
    };
    if let Some(embed) = embedded.data_mut::<Embed>() {
        embed.refs = refs.clone();
    }
    node_mut(main, owner).embedded = Some(embedded);
    for target in refs.into_iter().flatten() {
        main.id_us_plus(target);
    }
}
