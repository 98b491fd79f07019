use idb_ir::IdCode;
use pretty_assertions::assert_eq;

use super::*;
use crate::test_types::{add_user, node, node_mut, test_main, Key, KEY, NODE};

fn with_key(main: &mut Main, owner: IdHandle) -> IdHandle {
    let key = main.id_new(KEY, None).unwrap();
    main.data_mut::<Key>(key).unwrap().owner = Some(owner);
    node_mut(main, owner).key = Some(key);
    key
}

#[test]
fn free_releases_users_but_leaves_references() {
    let mut main = test_main();
    let owner = main.id_new(NODE, Some("Owner")).unwrap();
    let a = main.id_new(NODE, Some("A")).unwrap();
    let b = main.id_new(NODE, Some("B")).unwrap();
    add_user(&mut main, owner, a);
    add_user(&mut main, a, b);

    main.id_free(a).unwrap();
    assert!(main.get(a).is_none());
    assert_eq!(main.id(b).us, 1);
    // Freeing does not unlink; the slot now dangles.
    assert_eq!(node(&main, owner).users, vec![Some(a)]);
}

#[test]
fn freed_record_can_be_kept() {
    let mut main = test_main();
    let a = main.id_new(NODE, Some("A")).unwrap();

    let id = main.id_free_ex(a, FreeFlags::NOT_ALLOCATED).unwrap().unwrap();
    assert_eq!(id.name.as_str(), "A");
    assert!(id.tag.contains(IdTag::NO_MAIN));
    assert!(main.is_empty());

    assert!(matches!(main.id_free(a), Err(IdError::StaleHandle(_))));
}

#[test]
fn database_ids_cannot_be_freed_as_detached() {
    let mut main = test_main();
    let a = main.id_new(NODE, None).unwrap();
    assert!(matches!(
        main.id_free_ex(a, FreeFlags::NO_MAIN),
        Err(IdError::InvalidFlags(_))
    ));
    assert!(main.get(a).is_some());
}

#[test]
fn owned_id_is_freed_with_its_owner() {
    let mut main = test_main();
    let owner = main.id_new(NODE, None).unwrap();
    let key = with_key(&mut main, owner);
    let other = main.id_new(NODE, None).unwrap();
    let foreign_key = main.id_new(KEY, None).unwrap();
    main.data_mut::<Key>(foreign_key).unwrap().owner = Some(owner);
    node_mut(&mut main, other).key = Some(foreign_key);

    main.id_free(owner).unwrap();
    assert!(main.get(key).is_none());

    // A key owned by someone else stays.
    main.id_free(other).unwrap();
    assert!(main.get(foreign_key).is_some());
}

#[test]
fn no_refcount_free_keeps_counts() {
    let mut main = test_main();
    let owner = main.id_new(NODE, None).unwrap();
    let a = main.id_new(NODE, None).unwrap();
    add_user(&mut main, owner, a);

    main.id_free_ex(owner, FreeFlags::NO_USER_REFCOUNT).unwrap();
    assert_eq!(main.id(a).us, 2);
}

#[test]
fn delete_unlinks_every_user() {
    let mut main = test_main();
    let owner = main.id_new(NODE, Some("Owner")).unwrap();
    let a = main.id_new(NODE, Some("A")).unwrap();
    let b = main.id_new(NODE, Some("B")).unwrap();
    add_user(&mut main, owner, a);
    add_user(&mut main, a, b);

    main.id_delete(a, RemapFlags::empty()).unwrap();
    assert!(main.get(a).is_none());
    assert_eq!(node(&main, owner).users, vec![None]);
    assert_eq!(main.id(b).us, 1);
    assert_eq!(main.id(owner).us, 1);
    assert!(main.tagged(IdTag::DOIT).is_empty());
}

#[test]
fn delete_cascades_to_never_null_users() {
    let mut main = test_main();
    let a = main.id_new(NODE, Some("A")).unwrap();
    let dependent = main.id_new(NODE, Some("Dependent")).unwrap();
    let bystander = main.id_new(NODE, Some("Bystander")).unwrap();
    node_mut(&mut main, dependent).never_null = Some(a);
    main.id_us_plus(a);
    add_user(&mut main, bystander, dependent);

    main.id_delete(a, RemapFlags::empty()).unwrap();
    assert!(main.get(a).is_none());
    assert!(main.get(dependent).is_none());
    assert_eq!(node(&main, bystander).users, vec![None]);
    assert_eq!(main.len(), 1);
}

#[test]
fn delete_takes_the_owned_id_along() {
    let mut main = test_main();
    let owner = main.id_new(NODE, None).unwrap();
    let key = with_key(&mut main, owner);

    main.id_delete(owner, RemapFlags::empty()).unwrap();
    assert!(main.get(key).is_none());
    assert!(main.is_empty());
}

#[test]
fn deleting_a_library_deletes_its_content() {
    let mut main = test_main();
    let lib = main.id_new(IdCode::LI, Some("lib.blend")).unwrap();
    let linked = main.id_new_in_lib(NODE, Some("Linked"), lib).unwrap();
    let local = main.id_new(NODE, Some("Local")).unwrap();
    add_user(&mut main, local, linked);

    main.id_delete(lib, RemapFlags::empty()).unwrap();
    assert!(main.get(linked).is_none());
    assert_eq!(node(&main, local).users, vec![None]);
    assert_eq!(main.all_handles(), vec![local]);
}

#[test]
fn multi_delete_handles_references_between_deleted_ids() {
    let mut main = test_main();
    let owner = main.id_new(NODE, Some("Owner")).unwrap();
    let a = main.id_new(NODE, Some("A")).unwrap();
    let b = main.id_new(NODE, Some("B")).unwrap();
    let c = main.id_new(NODE, Some("C")).unwrap();
    add_user(&mut main, owner, a);
    add_user(&mut main, a, b);
    add_user(&mut main, b, a);
    add_user(&mut main, b, c);

    main.id(a).tag.insert(IdTag::DOIT);
    main.id(b).tag.insert(IdTag::DOIT);
    assert_eq!(main.id_multi_tagged_delete(), 2);

    assert_eq!(main.all_handles(), vec![c, owner]);
    assert_eq!(node(&main, owner).users, vec![None]);
    assert_eq!(main.id(c).us, 1);
    assert!(main.is_list_sorted(NODE));
}

#[test]
fn multi_delete_cascades_too() {
    let mut main = test_main();
    let a = main.id_new(NODE, Some("A")).unwrap();
    let dependent = main.id_new(NODE, Some("Dependent")).unwrap();
    node_mut(&mut main, dependent).never_null = Some(a);
    main.id_us_plus(a);
    let key = with_key(&mut main, dependent);

    main.id(a).tag.insert(IdTag::DOIT);
    assert_eq!(main.id_multi_tagged_delete(), 3);
    assert!(main.get(key).is_none());
    assert!(main.is_empty());
}

#[test]
fn free_us_deletes_the_last_user() {
    let mut main = test_main();
    let a = main.id_new(NODE, None).unwrap();
    main.id_us_plus(a);

    assert!(!main.id_free_us(a).unwrap());
    assert_eq!(main.id(a).us, 1);
    assert!(main.id_free_us(a).unwrap());
    assert!(main.get(a).is_none());
}

#[test]
fn detached_free_follows_creation_tags() {
    let mut main = test_main();
    let a = main.id_new(NODE, None).unwrap();
    let session = Arc::clone(main.session());

    let mut counted = session.id_new_nomain(NODE, None, crate::CopyFlags::empty()).unwrap();
    counted.data_mut::<crate::test_types::Node>().unwrap().users.push(Some(a));
    main.id_us_plus(a);
    assert!(main.id_free_detached(counted, FreeFlags::empty(), true).is_none());
    assert_eq!(main.id(a).us, 1);

    let mut scratch = session
        .id_new_nomain(NODE, None, crate::CopyFlags::NO_ALLOCATE | crate::CopyFlags::NO_USER_REFCOUNT)
        .unwrap();
    scratch.data_mut::<crate::test_types::Node>().unwrap().users.push(Some(a));
    let kept = main.id_free_detached(scratch, FreeFlags::empty(), true);
    assert!(kept.is_some());
    assert_eq!(main.id(a).us, 1);
}
