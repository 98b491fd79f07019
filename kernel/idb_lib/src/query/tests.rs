use idb_ir::AnimData;
use pretty_assertions::assert_eq;

use super::*;
use crate::test_types::{add_embedded, add_user, node_mut, test_main, Ui, EMBED, KEY, NODE, UI};

fn walk_kinds(main: &mut Main, handle: IdHandle, flags: WalkFlags) -> Vec<(Option<IdHandle>, RefKind, IdCode)> {
    let mut seen = Vec::new();
    foreach_id_link(main, handle, flags | WalkFlags::READONLY, |_, link| {
        seen.push((link.handle(), link.kind, link.holder));
        WalkStep::Continue
    })
    .unwrap();
    seen
}

#[test]
fn walk_visits_header_then_payload_then_embedded() {
    let mut main = test_main();
    let owner = main.id_new(NODE, Some("Owner")).unwrap();
    let action = main.id_new(NODE, Some("Action")).unwrap();
    let used = main.id_new(NODE, Some("Used")).unwrap();
    let weak = main.id_new(NODE, Some("Weak")).unwrap();

    main.id_mut(owner).anim_data = Some(AnimData {
        action: Some(action),
        influence: 1.0,
    });
    add_user(&mut main, owner, used);
    node_mut(&mut main, owner).weak = Some(weak);
    add_embedded(&mut main, owner, vec![Some(used), None]);

    assert_eq!(
        walk_kinds(&mut main, owner, WalkFlags::empty()),
        vec![
            (Some(action), RefKind::USER, NODE),
            (Some(used), RefKind::USER, NODE),
            (Some(weak), RefKind::NOP, NODE),
            (None, RefKind::EMBEDDED, NODE),
            (Some(used), RefKind::USER, EMBED),
        ]
    );
}

#[test]
fn ignore_embedded_reports_the_link_only() {
    let mut main = test_main();
    let owner = main.id_new(NODE, None).unwrap();
    let used = main.id_new(NODE, None).unwrap();
    add_embedded(&mut main, owner, vec![Some(used)]);

    let seen = walk_kinds(&mut main, owner, WalkFlags::IGNORE_EMBEDDED);
    assert_eq!(seen, vec![(None, RefKind::EMBEDDED, NODE)]);
}

#[test]
fn stop_aborts_the_walk() {
    let mut main = test_main();
    let owner = main.id_new(NODE, None).unwrap();
    for _ in 0..3 {
        let used = main.id_new(NODE, None).unwrap();
        add_user(&mut main, owner, used);
    }

    let mut visited = 0;
    foreach_id_link(&mut main, owner, WalkFlags::READONLY, |_, _| {
        visited += 1;
        WalkStep::Stop
    })
    .unwrap();
    assert_eq!(visited, 1);
}

#[test]
fn walked_id_is_checked_out() {
    let mut main = test_main();
    let owner = main.id_new(NODE, None).unwrap();
    add_user(&mut main, owner, owner);

    foreach_id_link(&mut main, owner, WalkFlags::READONLY, |main, link| {
        assert!(link.is_self_reference());
        assert!(main.get(owner).is_none());
        assert!(main.contains(owner));
        WalkStep::Continue
    })
    .unwrap();
    assert!(main.get(owner).is_some());
}

#[test]
fn walking_a_stale_handle_fails() {
    let mut main = test_main();
    let owner = main.id_new(NODE, None).unwrap();
    main.id_free(owner).unwrap();
    let result = foreach_id_link(&mut main, owner, WalkFlags::READONLY, |_, _| WalkStep::Continue);
    assert!(matches!(result, Err(IdError::StaleHandle(_))));
}

#[test]
fn ui_references_need_include_ui() {
    let mut main = test_main();
    let screen = main.id_new(UI, None).unwrap();
    let shown = main.id_new(NODE, None).unwrap();
    main.data_mut::<Ui>(screen).unwrap().shown = Some(shown);

    assert!(walk_kinds(&mut main, screen, WalkFlags::empty()).is_empty());
    assert_eq!(
        walk_kinds(&mut main, screen, WalkFlags::INCLUDE_UI),
        vec![(Some(shown), RefKind::USER_ONE, UI)]
    );
}

#[test]
fn visitors_may_rewrite_slots() {
    let mut main = test_main();
    let owner = main.id_new(NODE, None).unwrap();
    let a = main.id_new(NODE, None).unwrap();
    let b = main.id_new(NODE, None).unwrap();
    add_user(&mut main, owner, a);

    foreach_id_link(&mut main, owner, WalkFlags::empty(), |_, link| {
        if link.handle() == Some(a) {
            link.set(Some(b));
        }
        WalkStep::Continue
    })
    .unwrap();
    assert_eq!(crate::test_types::node(&main, owner).users, vec![Some(b)]);
}

#[test]
fn collect_references_skips_self() {
    let mut main = test_main();
    let owner = main.id_new(NODE, None).unwrap();
    let used = main.id_new(NODE, None).unwrap();
    add_user(&mut main, owner, owner);
    add_user(&mut main, owner, used);

    let refs = collect_references(&mut main, owner, WalkFlags::empty()).unwrap();
    assert_eq!(refs.as_slice(), &[(used, RefKind::USER)]);
}

#[test]
fn usages_split_local_and_linked() {
    let mut main = test_main();
    let lib = main.id_new(IdCode::LI, Some("lib.blend")).unwrap();
    let target = main.id_new(NODE, Some("Target")).unwrap();
    let local_user = main.id_new(NODE, Some("Local")).unwrap();
    let linked_user = main.id_new_in_lib(NODE, Some("Linked"), lib).unwrap();

    assert_eq!(id_test_usages(&mut main, target), IdUsage::default());

    add_user(&mut main, local_user, target);
    assert_eq!(
        id_test_usages(&mut main, target),
        IdUsage {
            local: true,
            linked: false
        }
    );

    add_user(&mut main, linked_user, target);
    assert_eq!(
        id_test_usages(&mut main, target),
        IdUsage {
            local: true,
            linked: true
        }
    );
}

#[test]
fn owner_backlink_is_not_usage() {
    let mut main = test_main();
    let owner = main.id_new(NODE, None).unwrap();
    let key = main.id_new(KEY, None).unwrap();
    main.data_mut::<crate::test_types::Key>(key).unwrap().owner = Some(owner);

    assert_eq!(id_test_usages(&mut main, owner), IdUsage::default());
}

#[test]
fn counted_references_match_user_counts() {
    let mut main = test_main();
    let owner = main.id_new(NODE, None).unwrap();
    let used = main.id_new(NODE, None).unwrap();
    let weak = main.id_new(NODE, None).unwrap();
    add_user(&mut main, owner, used);
    add_user(&mut main, owner, used);
    node_mut(&mut main, owner).weak = Some(weak);

    let counts = count_user_references(&mut main);
    assert_eq!(counts.get(&used), Some(&2));
    assert_eq!(counts.get(&weak), None);
    assert_eq!(counts.get(&owner), None);
}

#[test]
fn relations_are_bidirectional() {
    let mut main = test_main();
    let a = main.id_new(NODE, Some("A")).unwrap();
    let b = main.id_new(NODE, Some("B")).unwrap();
    let c = main.id_new(NODE, Some("C")).unwrap();
    add_user(&mut main, a, b);
    node_mut(&mut main, c).weak = Some(b);

    let relations = MainIdRelations::build(&mut main);
    assert_eq!(relations.used_by(a), &[(b, RefKind::USER)]);
    assert_eq!(relations.users_of(b), &[(a, RefKind::USER), (c, RefKind::NOP)]);
    assert!(relations.users_of(a).is_empty());
    assert!(relations.get(c).is_some());
}

#[test]
fn paths_of_ids_and_embedded_ids() {
    let mut main = test_main();
    let a = main.id_new(NODE, Some("A")).unwrap();
    let b = main.id_new(NODE, Some("B")).unwrap();
    node_mut(&mut main, a).path = "//textures/wood.png".to_owned();

    let mut seen = Vec::new();
    main.foreach_path(&mut |handle, path| seen.push((handle, path.clone())));
    assert_eq!(seen, vec![(a, "//textures/wood.png".to_owned())]);

    main.id_foreach_path(a, &mut |path| path.replace_range(..2, "/abs/")).unwrap();
    assert_eq!(crate::test_types::node(&main, a).path, "/abs/textures/wood.png");

    let mut visited = 0;
    main.id_foreach_path(b, &mut |_| visited += 1).unwrap();
    assert_eq!(visited, 0);
}
