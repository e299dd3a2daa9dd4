use forge::form::{FormState, SUBMIT_HANDLER};
use forge::node::{FieldBinding, HandlerId, MAX_BIND_DEPTH, Node, TreeBinder, bind_tree};

fn signup_tree() -> Node {
    Node::form(vec![
        Node::column(vec![
            Node::text("Create an account"),
            Node::input("email"),
            Node::row(vec![Node::input("first_name"), Node::input("last_name")]),
            Node::keyed("address", Node::input("address.street")),
            Node::controlled_input("avatar"),
        ]),
        Node::row(vec![Node::button("Cancel"), Node::submit("Sign up")]),
    ])
}

/// Wrap `node` in `levels` nested columns.
fn nested(node: Node, levels: usize) -> Node {
    (0..levels).fold(node, |inner, _| Node::column(vec![inner]))
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_native_inputs_registered_once() {
    let form = FormState::new();
    let bound = bind_tree(signup_tree(), &form);

    assert_eq!(
        form.registered_fields(),
        vec!["email", "first_name", "last_name", "address.street"]
    );
    for name in form.registered_fields() {
        assert_eq!(form.registration_count(&name), 1);
        assert_eq!(bound.binding(&name), Some(&FieldBinding::for_field(&name)));
    }
}

#[test]
fn test_controlled_inputs_left_alone() {
    let form = FormState::new();
    let bound = bind_tree(signup_tree(), &form);

    assert_eq!(form.registration_count("avatar"), 0);
    assert!(bound.find_input("avatar").is_some());
    assert_eq!(bound.binding("avatar"), None);
}

#[test]
fn test_rebinding_is_idempotent() {
    let form = FormState::new();
    let once = bind_tree(signup_tree(), &form);
    let twice = bind_tree(once.clone(), &form);

    assert_eq!(once, twice);
    assert_eq!(form.registration_count("email"), 1);
}

#[test]
fn test_duplicate_names_share_a_binding() {
    let form = FormState::new();
    let tree = Node::column(vec![Node::input("phone"), Node::input("phone")]);
    let bound = bind_tree(tree, &form);

    assert_eq!(form.registration_count("phone"), 1);
    let bindings: Vec<_> = bound
        .children()
        .iter()
        .map(|child| match child {
            Node::Input { binding, .. } => binding.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(bindings[0], bindings[1]);
    assert!(bindings[0].is_some());
}

// ============================================================================
// Submit wiring
// ============================================================================

#[test]
fn test_submit_triggers_get_form_handler() {
    let form = FormState::new();
    let bound = bind_tree(signup_tree(), &form);

    let submit = Some(HandlerId::new(SUBMIT_HANDLER));
    assert_eq!(bound.submit_handlers(), vec![submit.clone(), submit]);

    // plain buttons keep no handler
    let cancel = bound.children()[1].children()[0].clone();
    assert!(matches!(cancel, Node::Button { on_click: None, .. }));
}

#[test]
fn test_structure_is_preserved() {
    let form = FormState::new();
    let tree = signup_tree();
    let bound = bind_tree(tree.clone(), &form);

    assert_eq!(bound.field_names(), tree.field_names());
    assert_eq!(bound.depth(), tree.depth());
    assert_eq!(
        bound.field_names(),
        vec!["email", "first_name", "last_name", "address.street", "avatar"]
    );
}

// ============================================================================
// Depth limit
// ============================================================================

#[test]
fn test_inputs_below_depth_limit_stay_unbound() {
    let form = FormState::new();
    let tree = Node::row(vec![
        nested(Node::input("shallow"), MAX_BIND_DEPTH - 1),
        nested(Node::input("deep"), MAX_BIND_DEPTH),
    ]);

    let mut binder = TreeBinder::new(&form);
    let bound = binder.bind(tree);

    assert_eq!(binder.depth_limit_hits(), 1);
    assert_eq!(form.registration_count("shallow"), 1);
    assert_eq!(form.registration_count("deep"), 0);
    assert!(bound.binding("shallow").is_some());
    assert!(bound.find_input("deep").is_some());
    assert_eq!(bound.binding("deep"), None);
}

#[test]
fn test_input_at_depth_limit_is_bound() {
    let form = FormState::new();
    let tree = nested(Node::input("edge"), MAX_BIND_DEPTH);
    assert_eq!(tree.depth(), MAX_BIND_DEPTH);

    let mut binder = TreeBinder::new(&form);
    let bound = binder.bind(tree);
    assert_eq!(binder.depth_limit_hits(), 0);
    assert!(bound.binding("edge").is_some());
}
