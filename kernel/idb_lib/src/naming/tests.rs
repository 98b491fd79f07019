use idb_ir::MAX_NAME_LEN;
use pretty_assertions::assert_eq;

use super::*;
use crate::test_types::{test_main, NODE};

fn name(main: &Main, handle: IdHandle) -> &str {
    main.id(handle).name.as_str()
}

#[test]
fn new_ids_get_numbered_names() {
    let mut main = test_main();
    let a = main.id_new(NODE, Some("Cube")).unwrap();
    let b = main.id_new(NODE, Some("Cube")).unwrap();
    let c = main.id_new(NODE, Some("Cube")).unwrap();

    assert_eq!(name(&main, a), "Cube");
    assert_eq!(name(&main, b), "Cube.001");
    assert_eq!(name(&main, c), "Cube.002");
}

#[test]
fn lowest_free_number_is_reused() {
    let mut main = test_main();
    main.id_new(NODE, Some("Cube")).unwrap();
    let first = main.id_new(NODE, Some("Cube")).unwrap();
    main.id_new(NODE, Some("Cube")).unwrap();
    main.id_free(first).unwrap();

    let again = main.id_new(NODE, Some("Cube.005")).unwrap();
    assert_eq!(name(&main, again), "Cube.005");
    let reused = main.id_new(NODE, Some("Cube")).unwrap();
    assert_eq!(name(&main, reused), "Cube.001");
}

#[test]
fn default_and_empty_names_use_the_type_name() {
    let mut main = test_main();
    let a = main.id_new(NODE, None).unwrap();
    assert_eq!(name(&main, a), "Node");

    let result = main
        .id_new_name_validate(a, Some(""), IdNewNameMode::RenameExistingNever, false)
        .unwrap();
    assert_eq!(name(&main, a), "Node");
    assert_eq!(result.action, IdNewNameAction::Unchanged);
}

#[test]
fn control_characters_are_stripped_and_names_truncated() {
    let mut main = test_main();
    let a = main.id_new(NODE, Some("Bad\tName\n")).unwrap();
    assert_eq!(name(&main, a), "BadName");

    let long = "x".repeat(MAX_NAME_LEN + 10);
    let b = main.id_new(NODE, Some(&long)).unwrap();
    assert_eq!(name(&main, b).len(), MAX_NAME_LEN);

    // A numbered duplicate of a full-length name still fits.
    let c = main.id_new(NODE, Some(&long)).unwrap();
    assert_eq!(name(&main, c).len(), MAX_NAME_LEN);
    assert!(name(&main, c).ends_with(".001"));
}

#[test]
fn rename_actions() {
    let mut main = test_main();
    let a = main.id_new(NODE, Some("A")).unwrap();
    let b = main.id_new(NODE, Some("B")).unwrap();

    let result = main.rename(a, "A", IdNewNameMode::default()).unwrap();
    assert_eq!(result.action, IdNewNameAction::Unchanged);
    assert!(!result.is_renamed());

    let result = main.rename(a, "C", IdNewNameMode::default()).unwrap();
    assert_eq!(result.action, IdNewNameAction::RenamedNoCollision);

    let result = main.rename(a, "B", IdNewNameMode::default()).unwrap();
    assert_eq!(result.action, IdNewNameAction::RenamedCollisionAdjusted);
    assert_eq!(name(&main, a), "B.001");
    assert_eq!(name(&main, b), "B");
}

#[test]
fn forced_rename_moves_the_number_to_the_other_id() {
    let mut main = test_main();
    let a = main.id_new(NODE, Some("Cube")).unwrap();
    let b = main.id_new(NODE, Some("Sphere")).unwrap();

    let result = main.rename(b, "Cube", IdNewNameMode::RenameExistingAlways).unwrap();
    assert_eq!(result.action, IdNewNameAction::RenamedCollisionForced);
    assert_eq!(result.other, Some(a));
    assert_eq!(name(&main, b), "Cube");
    assert_eq!(name(&main, a), "Cube.001");
    assert!(main.is_list_sorted(NODE));
}

#[test]
fn same_root_mode_only_swaps_siblings() {
    let mut main = test_main();
    let cube = main.id_new(NODE, Some("Cube")).unwrap();
    let copy = main.id_new(NODE, Some("Cube")).unwrap();
    let other = main.id_new(NODE, Some("Sphere")).unwrap();

    let result = main.rename(other, "Cube", IdNewNameMode::RenameExistingSameRoot).unwrap();
    assert_eq!(result.action, IdNewNameAction::RenamedCollisionAdjusted);
    assert_eq!(name(&main, other), "Cube.002");

    let result = main.rename(copy, "Cube", IdNewNameMode::RenameExistingSameRoot).unwrap();
    assert_eq!(result.action, IdNewNameAction::RenamedCollisionForced);
    assert_eq!(name(&main, copy), "Cube");
    assert_eq!(name(&main, cube), "Cube.001");
}

#[test]
fn linked_names_are_left_alone() {
    let mut main = test_main();
    let lib = main.id_new(IdCode::LI, Some("lib.blend")).unwrap();
    let linked = main.id_new_in_lib(NODE, Some("Cube"), lib).unwrap();
    let local = main.id_new(NODE, Some("Cube")).unwrap();

    // Same name, different library.
    assert_eq!(name(&main, local), "Cube");
    assert!(matches!(
        main.rename(linked, "Other", IdNewNameMode::default()),
        Err(IdError::LinkedData(_))
    ));
    assert!(!main.ensure_unique_name(linked, Some("Other"), false).unwrap());
    assert_eq!(name(&main, linked), "Cube");
    assert!(main.ensure_unique_name(linked, Some("Other"), true).unwrap());
    assert_eq!(name(&main, linked), "Other");
}

#[test]
fn local_ids_sort_before_linked_ones() {
    let mut main = test_main();
    let lib = main.id_new(IdCode::LI, Some("lib.blend")).unwrap();
    let linked = main.id_new_in_lib(NODE, Some("A"), lib).unwrap();
    let local = main.id_new(NODE, Some("Z")).unwrap();
    assert_eq!(main.handles(NODE), &[local, linked]);
}

#[test]
fn sort_hint_fast_path_keeps_order() {
    let mut main = test_main();
    let a = main.id_new(NODE, Some("a")).unwrap();
    let c = main.id_new(NODE, Some("c")).unwrap();
    let e = main.id_new(NODE, Some("e")).unwrap();

    main.id_mut(e).name.set("b");
    main.id_sort_by_name(e, Some(a));
    assert_eq!(main.handles(NODE), &[a, e, c]);

    // A wrong hint falls back to a full search.
    main.id_mut(a).name.set("z");
    main.id_sort_by_name(a, Some(e));
    assert_eq!(main.handles(NODE), &[e, c, a]);
}

#[test]
fn duplicate_names_are_repaired() {
    let mut main = test_main();
    let a = main.id_new(NODE, Some("Twin")).unwrap();
    let b = main.id_new(NODE, Some("Other")).unwrap();
    main.id_mut(b).name.set("Twin");

    assert_eq!(main.repair_duplicate_names(NODE), 1);
    let names: Vec<&str> = [a, b].iter().map(|&h| name(&main, h)).collect();
    assert!(names.contains(&"Twin"));
    assert!(names.contains(&"Twin.001"));
    assert_eq!(main.repair_duplicate_names(NODE), 0);
}

#[test]
fn unique_name_reports_collisions() {
    let mut main = test_main();
    let a = main.id_new(NODE, Some("Lamp")).unwrap();

    assert_eq!(main.get_unique_name(NODE, None, None, "Lamp"), ("Lamp.001".to_owned(), true));
    assert_eq!(main.get_unique_name(NODE, None, Some(a), "Lamp"), ("Lamp".to_owned(), false));
    assert_eq!(main.get_unique_name(NODE, None, None, "Bulb"), ("Bulb".to_owned(), false));
}

#[test]
fn full_names_and_keys() {
    let mut main = test_main();
    let lib = main.id_new(IdCode::LI, Some("lib.blend")).unwrap();
    let linked = main.id_new_in_lib(NODE, Some("Cube"), lib).unwrap();
    let local = main.id_new(NODE, Some("Cube")).unwrap();

    assert_eq!(main.id_full_name(local), "Cube");
    assert_eq!(main.id_full_name(linked), "Cube [lib.blend]");

    assert_eq!(main.id_full_name_ui_prefix(local, true), ("   Cube".to_owned(), 3));
    main.id_mut(linked).us = 0;
    assert_eq!(main.id_full_name_ui_prefix(linked, true), ("L0 Cube [lib.blend]".to_owned(), 3));
    main.id_fake_user_set(local);
    assert_eq!(main.id_full_name_ui_prefix(local, false), ("F Cube".to_owned(), 2));

    assert_eq!(main.id_unique_string_key(local), "TACube");
    let key = main.id_unique_string_key(linked);
    assert_ne!(key, main.id_unique_string_key(local));
    assert!(key.ends_with("LIlib.blendTACube"));
}
