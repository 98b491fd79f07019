//! Editing operations for the built-in types.
//!
//! Each function changes reference slots and the matching user counts
//! together, so the database stays consistent without a recount.

use std::sync::Arc;

use idb_ir::{IdCode, IdHandle, IdTag, RefKind};
use idb_lib::{IdError, IdTypeFlags, Main};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::{
    Action, Area, Collection, Image, Key, KeyBlock, Material, Mesh, Node, NodeTree, Object, ObjectKind, Scene, Screen,
    SpaceKind,
};

fn mismatch<T>(main: &Main, handle: IdHandle) -> IdError {
    IdError::PayloadMismatch {
        name: main.get(handle).map(|id| id.name.prefixed()).unwrap_or_default(),
        expected: std::any::type_name::<T>(),
    }
}

/// Typed payload of a database ID.
pub fn payload<T: 'static>(main: &Main, handle: IdHandle) -> Result<&T, IdError> {
    main.try_id(handle)?;
    main.data::<T>(handle).ok_or_else(|| mismatch::<T>(main, handle))
}

pub fn payload_mut<T: 'static>(main: &mut Main, handle: IdHandle) -> Result<&mut T, IdError> {
    main.try_id(handle)?;
    if main.data::<T>(handle).is_none() {
        return Err(mismatch::<T>(main, handle));
    }
    main.data_mut::<T>(handle).ok_or(IdError::StaleHandle(handle))
}

fn ensure_editable(main: &Main, handle: IdHandle) -> Result<(), IdError> {
    let id = main.try_id(handle)?;
    if id.is_linked() {
        return Err(IdError::LinkedData(id.name.prefixed()));
    }
    Ok(())
}

/// Swap a slot's target, moving the user from the old target to the new one.
fn swap_user(main: &mut Main, old: Option<IdHandle>, new: Option<IdHandle>) {
    if old == new {
        return;
    }
    if let Some(old) = old {
        main.id_us_min(old);
    }
    if let Some(new) = new {
        main.id_us_plus(new);
    }
}

// === Objects ===

/// Create an object of `kind`, optionally using `data`.
pub fn object_new(
    main: &mut Main,
    name: Option<&str>,
    kind: ObjectKind,
    data: Option<IdHandle>,
) -> Result<IdHandle, IdError> {
    let object = main.id_new(IdCode::OB, name)?;
    payload_mut::<Object>(main, object)?.kind = kind;
    if data.is_some() {
        object_data_assign(main, object, data)?;
    }
    Ok(object)
}

/// Set the data of an object. The data must match the object's kind.
pub fn object_data_assign(main: &mut Main, object: IdHandle, data: Option<IdHandle>) -> Result<(), IdError> {
    ensure_editable(main, object)?;
    let kind = payload::<Object>(main, object)?.kind;
    if let Some(data) = data {
        if kind.data_code() != Some(main.try_id(data)?.code()) {
            return Err(mismatch::<Mesh>(main, data));
        }
    }

    let old = std::mem::replace(&mut payload_mut::<Object>(main, object)?.data, data);
    swap_user(main, old, data);
    object_materials_sync(main, object)?;
    main.tag_relations_update();
    Ok(())
}

/// Resize the object's material slots to the count of its data. Dropped
/// slots release their users.
pub fn object_materials_sync(main: &mut Main, object: IdHandle) -> Result<(), IdError> {
    let Some(data) = payload::<Object>(main, object)?.data else {
        return Ok(());
    };
    let count = main.data::<Mesh>(data).map_or(0, |mesh| mesh.materials.len());

    let materials = &mut payload_mut::<Object>(main, object)?.materials;
    let released: SmallVec<[IdHandle; 4]> = if materials.len() > count {
        materials.drain(count..).flatten().collect()
    } else {
        materials.resize(count, None);
        SmallVec::new()
    };
    for material in released {
        main.id_us_min(material);
    }
    Ok(())
}

/// Put `material` in an object-level slot, growing the data's slots (and
/// those of every object sharing it) when needed.
pub fn object_material_assign(
    main: &mut Main,
    object: IdHandle,
    slot: usize,
    material: Option<IdHandle>,
) -> Result<(), IdError> {
    ensure_editable(main, object)?;
    if let Some(material) = material {
        payload::<Material>(main, material)?;
    }
    let ob = payload::<Object>(main, object)?;
    let (data, slots) = (ob.data, ob.materials.len());
    if slot >= slots {
        match data {
            Some(data) => {
                let mesh = payload_mut::<Mesh>(main, data)?;
                if mesh.materials.len() <= slot {
                    mesh.materials.resize(slot + 1, None);
                }
                data_users_materials_sync(main, data)?;
            }
            None => payload_mut::<Object>(main, object)?.materials.resize(slot + 1, None),
        }
    }

    let old = std::mem::replace(&mut payload_mut::<Object>(main, object)?.materials[slot], material);
    swap_user(main, old, material);
    Ok(())
}

// === Meshes ===

/// Put `material` in a slot of the mesh. Objects using the mesh follow its
/// slot count.
pub fn mesh_material_assign(
    main: &mut Main,
    mesh: IdHandle,
    slot: usize,
    material: Option<IdHandle>,
) -> Result<(), IdError> {
    ensure_editable(main, mesh)?;
    if let Some(material) = material {
        payload::<Material>(main, material)?;
    }
    let me = payload_mut::<Mesh>(main, mesh)?;
    if me.materials.len() <= slot {
        me.materials.resize(slot + 1, None);
    }
    let old = std::mem::replace(&mut me.materials[slot], material);
    swap_user(main, old, material);
    data_users_materials_sync(main, mesh)
}

/// Sync the material slots of every object using `data`, under the
/// database lock.
fn data_users_materials_sync(main: &mut Main, data: IdHandle) -> Result<(), IdError> {
    let lock = main.lock_handle();
    let _guard = lock.acquire();
    let users: Vec<IdHandle> = main
        .handles(IdCode::OB)
        .iter()
        .copied()
        .filter(|&object| main.data::<Object>(object).is_some_and(|ob| ob.data == Some(data)))
        .collect();
    tracing::trace!(objects = users.len(), "syncing material slots");
    for object in users {
        object_materials_sync(main, object)?;
    }
    Ok(())
}

/// The shape key of a mesh, created with a basis block if missing.
///
/// The key's creation user is the mesh's key slot.
pub fn shape_key_add(main: &mut Main, mesh: IdHandle) -> Result<IdHandle, IdError> {
    ensure_editable(main, mesh)?;
    let me = payload::<Mesh>(main, mesh)?;
    if let Some(key) = me.key {
        return Ok(key);
    }
    let positions = me.positions.clone();

    let key = main.id_new(IdCode::KE, None)?;
    let block = payload_mut::<Key>(main, key)?;
    block.owner = Some(mesh);
    block.blocks.push(KeyBlock {
        name: "Basis".to_owned(),
        value: 0.0,
        positions,
    });
    payload_mut::<Mesh>(main, mesh)?.key = Some(key);
    tracing::debug!(mesh = %main.id(mesh).name.prefixed(), "added shape key");
    Ok(key)
}

// === Materials ===

/// Give the material its embedded shader node tree, if it has none.
pub fn material_node_tree_ensure(main: &mut Main, material: IdHandle) -> Result<(), IdError> {
    ensure_editable(main, material)?;
    if payload::<Material>(main, material)?.node_tree.is_some() {
        return Ok(());
    }
    let session = Arc::clone(main.session());
    let tree = session.id_new_embedded(IdCode::NT, Some("Shader Nodetree"))?;
    let ma = payload_mut::<Material>(main, material)?;
    ma.node_tree = Some(tree);
    ma.use_nodes = true;
    Ok(())
}

/// Add an image texture node to the material's node tree.
pub fn material_image_node_add(main: &mut Main, material: IdHandle, image: IdHandle) -> Result<(), IdError> {
    payload::<Image>(main, image)?;
    material_node_tree_ensure(main, material)?;
    if payload::<Material>(main, material)?.node_tree().is_none() {
        return Err(mismatch::<NodeTree>(main, material));
    }
    let Some(tree) = payload_mut::<Material>(main, material)?.node_tree_mut() else {
        return Ok(());
    };
    let location = [-300.0, 100.0 * tree.nodes.len() as f32];
    tree.nodes.push(Node {
        name: "Image Texture".to_owned(),
        id: Some(image),
        location,
    });
    main.id_us_plus(image);
    Ok(())
}

// === Collections ===

/// Add an object to a collection. Returns `false` when already in it.
pub fn collection_object_add(main: &mut Main, collection: IdHandle, object: IdHandle) -> Result<bool, IdError> {
    ensure_editable(main, collection)?;
    payload::<Object>(main, object)?;
    let coll = payload_mut::<Collection>(main, collection)?;
    if coll.has_object(object) {
        return Ok(false);
    }
    coll.objects.push(Some(object));
    main.id_us_plus(object);
    main.tag_relations_update();
    Ok(true)
}

pub fn collection_object_remove(main: &mut Main, collection: IdHandle, object: IdHandle) -> Result<bool, IdError> {
    ensure_editable(main, collection)?;
    let coll = payload_mut::<Collection>(main, collection)?;
    let Some(index) = coll.objects.iter().position(|slot| *slot == Some(object)) else {
        return Ok(false);
    };
    coll.objects.remove(index);
    main.id_us_min(object);
    main.tag_relations_update();
    Ok(true)
}

/// Is `target` `root` or one of its descendants?
fn collection_reaches(main: &Main, root: IdHandle, target: IdHandle) -> bool {
    let mut visited = FxHashSet::default();
    let mut stack = vec![root];
    while let Some(current) = stack.pop() {
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(collection) = main.data::<Collection>(current) {
            stack.extend(collection.children.iter().flatten());
        }
    }
    false
}

/// Nest `child` under `parent`. Returns `false` when already nested or when
/// it would create a cycle.
pub fn collection_child_add(main: &mut Main, parent: IdHandle, child: IdHandle) -> Result<bool, IdError> {
    ensure_editable(main, parent)?;
    payload::<Collection>(main, child)?;
    if collection_reaches(main, child, parent) {
        tracing::debug!(?parent, ?child, "collection nesting refused, cycle");
        return Ok(false);
    }
    let coll = payload_mut::<Collection>(main, parent)?;
    if coll.children.contains(&Some(child)) {
        return Ok(false);
    }
    coll.children.push(Some(child));
    main.id_us_plus(child);
    main.tag_relations_update();
    Ok(true)
}

/// Drop the slots of a collection emptied by deletions.
pub fn collection_remove_nulls(main: &mut Main, collection: IdHandle) -> Result<usize, IdError> {
    Ok(payload_mut::<Collection>(main, collection)?.remove_nulls())
}

// === Scenes ===

/// Create a scene with its master collection.
pub fn scene_new(main: &mut Main, name: Option<&str>) -> Result<IdHandle, IdError> {
    let scene = main.id_new(IdCode::SCE, name)?;
    let session = Arc::clone(main.session());
    let master = session.id_new_embedded(IdCode::GR, Some("Scene Collection"))?;
    payload_mut::<Scene>(main, scene)?.master_collection = Some(master);
    Ok(scene)
}

/// Link an object into the scene's master collection.
pub fn scene_object_link(main: &mut Main, scene: IdHandle, object: IdHandle) -> Result<bool, IdError> {
    ensure_editable(main, scene)?;
    payload::<Object>(main, object)?;
    if payload::<Scene>(main, scene)?.master_collection().is_none() {
        return Err(mismatch::<Collection>(main, scene));
    }
    let Some(master) = payload_mut::<Scene>(main, scene)?.master_collection_mut() else {
        return Ok(false);
    };
    if master.has_object(object) {
        return Ok(false);
    }
    master.objects.push(Some(object));
    main.id_us_plus(object);
    main.tag_relations_update();
    Ok(true)
}

/// Set the active camera. The camera is not a user.
pub fn scene_camera_set(main: &mut Main, scene: IdHandle, camera: Option<IdHandle>) -> Result<(), IdError> {
    if let Some(camera) = camera {
        payload::<Object>(main, camera)?;
    }
    payload_mut::<Scene>(main, scene)?.camera = camera;
    Ok(())
}

// === Screens ===

/// Open an area showing `id`.
pub fn screen_area_add(
    main: &mut Main,
    screen: IdHandle,
    space: SpaceKind,
    id: Option<IdHandle>,
) -> Result<(), IdError> {
    payload_mut::<Screen>(main, screen)?.areas.push(Area { space, id });
    if let Some(id) = id {
        if space.ref_kind().contains(RefKind::USER_ONE) {
            main.id_us_ensure_real(id);
        }
    }
    Ok(())
}

// === Animation ===

/// Set the active action of `id`. Returns `false` for types without
/// animation data.
pub fn action_assign(main: &mut Main, id: IdHandle, action: Option<IdHandle>) -> Result<bool, IdError> {
    ensure_editable(main, id)?;
    if let Some(action) = action {
        payload::<Action>(main, action)?;
    }
    let code = main.try_id(id)?.code();
    if main.registry().info(code)?.flags().contains(IdTypeFlags::NO_ANIMDATA) {
        return Ok(false);
    }

    let anim = main.id_mut(id).anim_data.get_or_insert_with(Default::default);
    let old = std::mem::replace(&mut anim.action, action);
    swap_user(main, old, action);
    main.id(id).tag.insert(IdTag::NEEDS_UPDATE);
    Ok(true)
}
