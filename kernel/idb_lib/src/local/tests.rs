use idb_ir::OverrideLibrary;
use pretty_assertions::assert_eq;

use super::*;
use crate::test_types::{add_user, node, node_mut, test_main, Key, Lib, KEY, NODE};

fn library(main: &mut Main, name: &str, path: &str) -> IdHandle {
    let lib = main.id_new(IdCode::LI, Some(name)).unwrap();
    main.data_mut::<Lib>(lib).unwrap().filepath = path.to_owned();
    lib
}

fn linked(main: &mut Main, lib: IdHandle, name: &str, tag: IdTag) -> IdHandle {
    let handle = main.id_new_in_lib(NODE, Some(name), lib).unwrap();
    main.id(handle).tag.set(tag);
    handle
}

/// Reference from a linked owner, which never promotes the target.
fn linked_use(main: &mut Main, owner: IdHandle, target: IdHandle) {
    node_mut(main, owner).users.push(Some(target));
    main.id_us_plus_no_lib(target);
}

#[test]
fn action_depends_on_users() {
    let mut main = test_main();
    let lib = library(&mut main, "lib.blend", "/libs/lib.blend");
    let target = linked(&mut main, lib, "Target", IdTag::EXTERN);
    let flags = MakeLocalFlags::empty();

    assert_eq!(
        main.make_local_generic_action_define(target, flags),
        LocalAction {
            force_local: true,
            force_copy: false
        }
    );

    let linked_user = linked(&mut main, lib, "LinkedUser", IdTag::EXTERN);
    linked_use(&mut main, linked_user, target);
    assert_eq!(main.make_local_generic_action_define(target, flags), LocalAction::default());

    let local_user = main.id_new(NODE, Some("LocalUser")).unwrap();
    add_user(&mut main, local_user, target);
    assert_eq!(
        main.make_local_generic_action_define(target, flags),
        LocalAction {
            force_local: false,
            force_copy: true
        }
    );

    assert_eq!(
        main.make_local_generic_action_define(target, MakeLocalFlags::FORCE_LOCAL),
        LocalAction {
            force_local: true,
            force_copy: false
        }
    );
}

#[test]
fn unused_data_is_localized_in_full_library_mode() {
    let mut main = test_main();
    let lib = library(&mut main, "lib.blend", "/libs/lib.blend");
    let target = linked(&mut main, lib, "Target", IdTag::EXTERN);
    assert_eq!(
        main.make_local_generic_action_define(target, MakeLocalFlags::FULL_LIBRARY),
        LocalAction {
            force_local: true,
            force_copy: false
        }
    );
}

#[test]
fn make_local_in_place() {
    let mut main = test_main();
    let lib = library(&mut main, "lib.blend", "/libs/lib.blend");
    main.id_new(NODE, Some("Chair")).unwrap();
    let chair = linked(&mut main, lib, "Chair", IdTag::EXTERN);
    let wood = linked(&mut main, lib, "Wood", IdTag::INDIRECT);
    linked_use(&mut main, chair, wood);
    node_mut(&mut main, chair).path = "//tex/chair.png".to_owned();
    main.id_fake_user_set(chair);
    let uid = main.id(chair).session_uid;

    let mut duplicates = DuplicateMap::new();
    assert!(main.make_local(chair, MakeLocalFlags::empty(), &mut duplicates).unwrap());
    assert!(duplicates.is_empty());

    let id = main.id(chair);
    assert!(!id.is_linked());
    assert_eq!(id.name.as_str(), "Chair.001");
    assert!(!id.tag.intersects(IdTag::LINK_STATE));
    assert!(!id.has_fake_user());
    assert_ne!(id.session_uid, uid);
    assert_eq!(node(&main, chair).path, "/libs/tex/chair.png");
    assert!(main.id(wood).tag.contains(IdTag::EXTERN));
    assert!(main.is_list_sorted(NODE));
}

#[test]
fn make_local_by_copy_keeps_linked_users() {
    let mut main = test_main();
    let lib = library(&mut main, "lib.blend", "/libs/lib.blend");
    let chair = linked(&mut main, lib, "Chair", IdTag::EXTERN);
    let linked_user = linked(&mut main, lib, "Room", IdTag::EXTERN);
    linked_use(&mut main, linked_user, chair);
    let local_user = main.id_new(NODE, Some("Scene")).unwrap();
    add_user(&mut main, local_user, chair);

    let mut duplicates = DuplicateMap::new();
    assert!(main.make_local(chair, MakeLocalFlags::empty(), &mut duplicates).unwrap());

    let copy = duplicates.get(chair).unwrap();
    assert!(!main.id(copy).is_linked());
    assert!(main.id(chair).is_linked());
    assert_eq!(node(&main, local_user).users, vec![Some(copy)]);
    assert_eq!(node(&main, linked_user).users, vec![Some(chair)]);
    assert_eq!(main.id(copy).us, 1);
    assert_eq!(main.id(chair).us, 2);
}

#[test]
fn indirect_data_needs_a_flag() {
    let mut main = test_main();
    let lib = library(&mut main, "lib.blend", "/libs/lib.blend");
    let wood = linked(&mut main, lib, "Wood", IdTag::INDIRECT);
    let mut duplicates = DuplicateMap::new();

    assert!(!main.make_local(wood, MakeLocalFlags::empty(), &mut duplicates).unwrap());
    assert!(main.id(wood).is_linked());
    assert!(main.make_local(wood, MakeLocalFlags::INDIRECT, &mut duplicates).unwrap());
    assert!(!main.id(wood).is_linked());
}

#[test]
fn unlinkable_types_are_rejected() {
    let mut main = test_main();
    let lib = library(&mut main, "lib.blend", "/libs/lib.blend");
    let key = main.id_new(KEY, None).unwrap();
    main.id_mut(key).lib = Some(lib);

    let result = main.make_local(key, MakeLocalFlags::empty(), &mut DuplicateMap::new());
    assert!(matches!(result, Err(IdError::NotLinkable(code)) if code == KEY));
}

#[test]
fn clearing_library_data_follows_owned_ids() {
    let mut main = test_main();
    let lib = library(&mut main, "lib.blend", "props.blend");
    let chair = linked(&mut main, lib, "Chair", IdTag::EXTERN);
    let key = main.id_new(KEY, None).unwrap();
    main.id_mut(key).lib = Some(lib);
    main.data_mut::<Key>(key).unwrap().owner = Some(chair);
    node_mut(&mut main, chair).key = Some(key);
    node_mut(&mut main, chair).path = "//tex/chair.png".to_owned();
    main.id_mut(chair).override_library = Some(OverrideLibrary::default());

    main.clear_library_data(chair, MakeLocalFlags::LIBOVERRIDE_CLEAR).unwrap();
    assert!(!main.id(chair).is_linked());
    assert!(!main.id(key).is_linked());
    assert!(main.id(chair).override_library.is_none());
    // No directory to rebase onto.
    assert_eq!(node(&main, chair).path, "tex/chair.png");

    // Local data is left alone.
    main.clear_library_data(chair, MakeLocalFlags::empty()).unwrap();
    assert_eq!(node(&main, chair).path, "tex/chair.png");
}

#[test]
fn expand_local_promotes_used_data() {
    let mut main = test_main();
    let lib = library(&mut main, "lib.blend", "/libs/lib.blend");
    let wood = linked(&mut main, lib, "Wood", IdTag::INDIRECT);
    let local = main.id_new(NODE, None).unwrap();
    node_mut(&mut main, local).users.push(Some(wood));
    node_mut(&mut main, local).weak = Some(wood);

    main.expand_local(local, MakeLocalFlags::empty()).unwrap();
    assert!(main.id(wood).tag.contains(IdTag::EXTERN));
}

struct LibraryScene {
    main: Main,
    one: IdHandle,
    user: IdHandle,
    a: IdHandle,
    b: IdHandle,
    c: IdHandle,
    d: IdHandle,
}

/// `user` (local) → `a` → {`b`, `c`} in library one; `d` in library two
/// also uses `c`.
fn library_scene() -> LibraryScene {
    let mut main = test_main();
    let one = library(&mut main, "one.blend", "/libs/one.blend");
    let two = library(&mut main, "two.blend", "/libs/two.blend");
    let a = linked(&mut main, one, "A", IdTag::EXTERN);
    let b = linked(&mut main, one, "B", IdTag::INDIRECT);
    let c = linked(&mut main, one, "C", IdTag::INDIRECT);
    let d = linked(&mut main, two, "D", IdTag::EXTERN);
    let user = main.id_new(NODE, Some("User")).unwrap();
    add_user(&mut main, user, a);
    add_user(&mut main, user, d);
    linked_use(&mut main, a, b);
    linked_use(&mut main, a, c);
    linked_use(&mut main, d, c);
    LibraryScene {
        main,
        one,
        user,
        a,
        b,
        c,
        d,
    }
}

#[test]
fn library_local_copies_what_other_libraries_still_use() {
    let LibraryScene {
        mut main,
        one,
        user,
        a,
        b,
        c,
        d,
    } = library_scene();

    let copies = main.make_library_local(Some(one), false, false).unwrap();

    assert!(!main.id(a).is_linked());
    assert!(!main.id(b).is_linked());
    assert!(main.id(c).is_linked());
    assert!(main.id(d).is_linked());
    assert_eq!(copies.len(), 1);

    let local_c = copies[&c];
    assert!(!main.id(local_c).is_linked());
    assert_eq!(node(&main, a).users, vec![Some(b), Some(local_c)]);
    assert_eq!(node(&main, d).users, vec![Some(c)]);
    assert_eq!(node(&main, user).users, vec![Some(a), Some(d)]);
    assert_eq!(main.id(local_c).us, 1);
    assert!(main.tagged(IdTag::DOIT).is_empty());
    assert!(main.tagged(IdTag::NEW).is_empty());
}

#[test]
fn whole_database_local_needs_no_copies() {
    let LibraryScene { mut main, a, b, c, d, .. } = library_scene();

    let copies = main.make_library_local(None, false, true).unwrap();
    assert!(copies.is_empty());
    for handle in [a, b, c, d] {
        assert!(!main.id(handle).is_linked());
        assert!(main.id(handle).has_fake_user());
    }
    assert_eq!(main.handles(IdCode::LI).len(), 2);
}

#[test]
fn pre_existing_data_can_be_skipped() {
    let LibraryScene { mut main, one, a, b, c, .. } = library_scene();
    main.id(b).tag.insert(IdTag::PRE_EXISTING);
    main.id(c).tag.insert(IdTag::PRE_EXISTING);

    main.make_library_local(Some(one), true, false).unwrap();
    assert!(!main.id(a).is_linked());
    assert!(main.id(b).is_linked());
    assert!(main.id(c).is_linked());
}

#[test]
fn editability_and_ownership() {
    let mut main = test_main();
    let lib = library(&mut main, "lib.blend", "/libs/lib.blend");
    let local = main.id_new(NODE, None).unwrap();
    let linked_id = linked(&mut main, lib, "Linked", IdTag::EXTERN);
    let key = main.id_new(KEY, None).unwrap();
    main.data_mut::<Key>(key).unwrap().owner = Some(local);
    node_mut(&mut main, local).key = Some(key);

    assert!(main.id_is_editable(local));
    assert!(!main.id_is_editable(linked_id));
    assert!(main.id_can_use_id(local, linked_id));
    assert!(!main.id_can_use_id(linked_id, local));
    assert!(main.id_can_use_id(linked_id, linked_id));

    assert_eq!(main.id_owner_get(key), Some(local));
    assert_eq!(main.id_owned_get(local), Some(key));
    assert_eq!(main.id_owner_get(local), None);
}
