//! Wires a form tree to a [`FormControl`] in a single pass.

use std::collections::HashMap;

use super::{ButtonKind, FieldBinding, HandlerId, InputMode, Node};
use crate::form::FormControl;

/// Deepest level the binder descends to. Subtrees below it pass through
/// untouched.
pub const MAX_BIND_DEPTH: usize = 10;

/// Walks a [`Node`] tree and attaches form handlers.
///
/// - submit buttons and `Form` nodes get the control's submit handler
/// - native inputs are registered under their name and receive a
///   [`FieldBinding`]
/// - containers keep their shape; children are bound recursively
///
/// Binding is idempotent: an input that already carries a binding for its
/// name is not registered again, and a name that appears twice in one pass
/// is registered once.
pub struct TreeBinder<'a, C: FormControl + ?Sized> {
    control: &'a C,
    submit: HandlerId,
    bindings: HashMap<String, FieldBinding>,
    depth_limit_hits: usize,
}

impl<'a, C: FormControl + ?Sized> TreeBinder<'a, C> {
    pub fn new(control: &'a C) -> Self {
        Self {
            submit: control.submit_handler(),
            control,
            bindings: HashMap::new(),
            depth_limit_hits: 0,
        }
    }

    /// Bind a whole tree.
    pub fn bind(&mut self, node: Node) -> Node {
        self.bind_at(node, 0)
    }

    /// Subtrees passed through because they sat below [`MAX_BIND_DEPTH`].
    pub fn depth_limit_hits(&self) -> usize {
        self.depth_limit_hits
    }

    fn bind_at(&mut self, node: Node, depth: usize) -> Node {
        if depth > MAX_BIND_DEPTH {
            self.depth_limit_hits += 1;
            log::warn!(
                "[bind] Form tree deeper than {} levels; leaving subtree unbound",
                MAX_BIND_DEPTH
            );
            return node;
        }

        match node {
            Node::Input {
                name,
                placeholder,
                mode: InputMode::Native,
                binding,
                id,
            } => {
                let binding = self.bind_input(&name, binding);
                Node::Input {
                    name,
                    placeholder,
                    mode: InputMode::Native,
                    binding: Some(binding),
                    id,
                }
            }
            Node::Button {
                label,
                kind: ButtonKind::Submit,
                id,
                ..
            } => Node::Button {
                label,
                kind: ButtonKind::Submit,
                on_click: Some(self.submit.clone()),
                id,
            },
            Node::Column { children } => Node::Column {
                children: self.bind_children(children, depth),
            },
            Node::Row { children } => Node::Row {
                children: self.bind_children(children, depth),
            },
            Node::Stack { children } => Node::Stack {
                children: self.bind_children(children, depth),
            },
            Node::Form { children, .. } => Node::Form {
                children: self.bind_children(children, depth),
                on_submit: Some(self.submit.clone()),
            },
            Node::Keyed { key, child } => Node::Keyed {
                key,
                child: Box::new(self.bind_at(*child, depth + 1)),
            },
            other => other,
        }
    }

    fn bind_children(&mut self, children: Vec<Node>, depth: usize) -> Vec<Node> {
        children
            .into_iter()
            .map(|child| self.bind_at(child, depth + 1))
            .collect()
    }

    fn bind_input(&mut self, name: &str, existing: Option<FieldBinding>) -> FieldBinding {
        if let Some(binding) = self.bindings.get(name) {
            return binding.clone();
        }
        let binding = match existing {
            Some(binding) if binding.name == name => binding,
            _ => {
                log::trace!("[bind] Registering field '{}'", name);
                self.control.register(name)
            }
        };
        self.bindings.insert(name.to_string(), binding.clone());
        binding
    }
}

/// Bind a tree in one call.
pub fn bind_tree<C: FormControl + ?Sized>(node: Node, control: &C) -> Node {
    TreeBinder::new(control).bind(node)
}
