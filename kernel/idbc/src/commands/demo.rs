//! A small scene exercising every built-in type.

use idb_ir::IdCode;
use idb_lib::{IdError, Main};
use idb_types::assign::{
    action_assign, collection_child_add, collection_object_add, material_image_node_add, mesh_material_assign,
    object_new, payload_mut, scene_camera_set, scene_new, scene_object_link, screen_area_add, shape_key_add,
};
use idb_types::{builtin_main, Action, FCurve, Image, Mesh, ObjectKind, SpaceKind};
use smallvec::smallvec;

const CUBE_POSITIONS: [[f32; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

/// Build the demo database.
///
/// User counts are recomputed at the end, as after loading a file: creation
/// users of IDs nothing uses are gone.
pub fn demo_main() -> Result<Main, IdError> {
    let mut main = builtin_main();
    let scene = scene_new(&mut main, Some("Scene"))?;

    let mesh = main.id_new(IdCode::ME, Some("Cube"))?;
    let me = payload_mut::<Mesh>(&mut main, mesh)?;
    me.positions = CUBE_POSITIONS.to_vec();
    me.faces = vec![
        smallvec![0, 1, 2, 3],
        smallvec![4, 5, 6, 7],
        smallvec![0, 1, 5, 4],
        smallvec![2, 3, 7, 6],
        smallvec![1, 2, 6, 5],
        smallvec![0, 3, 7, 4],
    ];
    shape_key_add(&mut main, mesh)?;

    let image = main.id_new(IdCode::IM, Some("grain.png"))?;
    let im = payload_mut::<Image>(&mut main, image)?;
    im.filepath = "//textures/grain.png".to_owned();
    im.size = [1024, 1024];
    let wood = main.id_new(IdCode::MA, Some("Wood"))?;
    material_image_node_add(&mut main, wood, image)?;
    let metal = main.id_new(IdCode::MA, Some("Metal"))?;
    mesh_material_assign(&mut main, mesh, 0, Some(wood))?;
    mesh_material_assign(&mut main, mesh, 1, Some(metal))?;

    let cube = object_new(&mut main, Some("Cube"), ObjectKind::Mesh, Some(mesh))?;
    let camera = object_new(&mut main, Some("Camera"), ObjectKind::Empty, None)?;
    scene_object_link(&mut main, scene, cube)?;
    scene_object_link(&mut main, scene, camera)?;
    scene_camera_set(&mut main, scene, Some(camera))?;

    let props = main.id_new(IdCode::GR, Some("Props"))?;
    let shelf = main.id_new(IdCode::GR, Some("Shelf"))?;
    collection_child_add(&mut main, props, shelf)?;
    let spare = main.id_copy(cube)?;
    collection_object_add(&mut main, shelf, spare)?;
    main.id_fake_user_set(props);

    let action = main.id_new(IdCode::AC, Some("Spin"))?;
    *payload_mut::<Action>(&mut main, action)? = Action {
        curves: vec![FCurve {
            rna_path: "rotation_euler".to_owned(),
            array_index: 2,
            keyframes: vec![[1.0, 0.0], [250.0, std::f32::consts::TAU]],
        }],
        id_root: Some(IdCode::OB),
    };
    action_assign(&mut main, cube, Some(action))?;

    let screen = main.id_new(IdCode::SCR, Some("Layout"))?;
    screen_area_add(&mut main, screen, SpaceKind::Image, Some(image))?;
    screen_area_add(&mut main, screen, SpaceKind::Properties, Some(wood))?;

    main.refcount_recompute(false);
    tracing::debug!(ids = main.len(), "built demo database");
    Ok(main)
}
