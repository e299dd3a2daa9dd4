//! Declarative form tree and the binder that wires it to a form container.

mod bind;

pub use bind::{MAX_BIND_DEPTH, TreeBinder, bind_tree};

/// Identifier of a handler the host UI dispatches to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerId(pub String);

impl HandlerId {
    /// Create a new handler ID
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HandlerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Handlers attached to a registered input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    /// Field the input is registered under.
    pub name: String,
    pub on_change: HandlerId,
    pub on_blur: HandlerId,
    pub on_focus: HandlerId,
}

impl FieldBinding {
    /// Binding with `<name>:change`, `<name>:blur` and `<name>:focus` handlers.
    pub fn for_field(name: &str) -> Self {
        Self {
            name: name.to_string(),
            on_change: HandlerId::new(format!("{name}:change")),
            on_blur: HandlerId::new(format!("{name}:blur")),
            on_focus: HandlerId::new(format!("{name}:focus")),
        }
    }
}

/// How an input gets its value wiring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    /// Registered with the form container by the binder.
    #[default]
    Native,
    /// Wired by the caller; the binder leaves it alone.
    Controlled,
}

/// What a button does when pressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ButtonKind {
    Submit,
    #[default]
    Button,
    Reset,
}

/// A node in the form tree
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Node {
    /// Empty node (renders nothing)
    #[default]
    Empty,

    /// Text content
    Text { content: String },

    /// Container with vertical layout
    Column { children: Vec<Node> },

    /// Container with horizontal layout
    Row { children: Vec<Node> },

    /// Stack (z-axis layering)
    Stack { children: Vec<Node> },

    /// Form boundary; submit handler lands on `on_submit`
    Form {
        children: Vec<Node>,
        on_submit: Option<HandlerId>,
    },

    /// Keyed wrapper that keeps identity across re-renders
    Keyed { key: String, child: Box<Node> },

    /// Named input field
    Input {
        /// Field path in the form values
        name: String,
        /// Placeholder text
        placeholder: String,
        mode: InputMode,
        /// Set once the input is registered
        binding: Option<FieldBinding>,
        /// Element ID for focus
        id: String,
    },

    /// Clickable button
    Button {
        label: String,
        kind: ButtonKind,
        /// Click handler
        on_click: Option<HandlerId>,
        /// Element ID for focus
        id: String,
    },
}

impl Node {
    /// Create an empty node
    pub const fn empty() -> Self {
        Self::Empty
    }

    /// Create a text node
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Create a column node
    pub fn column(children: Vec<Node>) -> Self {
        Self::Column { children }
    }

    /// Create a row node
    pub fn row(children: Vec<Node>) -> Self {
        Self::Row { children }
    }

    pub fn stack(children: Vec<Node>) -> Self {
        Self::Stack { children }
    }

    pub fn form(children: Vec<Node>) -> Self {
        Self::Form {
            children,
            on_submit: None,
        }
    }

    pub fn keyed(key: impl Into<String>, child: Node) -> Self {
        Self::Keyed {
            key: key.into(),
            child: Box::new(child),
        }
    }

    /// Create a native input registered under `name`
    pub fn input(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::Input {
            id: format!("input-{name}"),
            name,
            placeholder: String::new(),
            mode: InputMode::Native,
            binding: None,
        }
    }

    /// Create an input the caller wires itself
    pub fn controlled_input(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::Input {
            id: format!("input-{name}"),
            name,
            placeholder: String::new(),
            mode: InputMode::Controlled,
            binding: None,
        }
    }

    /// Create a plain button
    pub fn button(label: impl Into<String>) -> Self {
        Self::Button {
            label: label.into(),
            kind: ButtonKind::Button,
            on_click: None,
            id: String::new(),
        }
    }

    /// Create a submit button
    pub fn submit(label: impl Into<String>) -> Self {
        Self::Button {
            label: label.into(),
            kind: ButtonKind::Submit,
            on_click: None,
            id: String::new(),
        }
    }

    /// Check if node is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Child nodes of containers and structural nodes.
    pub fn children(&self) -> &[Node] {
        match self {
            Self::Column { children }
            | Self::Row { children }
            | Self::Stack { children }
            | Self::Form { children, .. } => children,
            Self::Keyed { child, .. } => std::slice::from_ref(child.as_ref()),
            _ => &[],
        }
    }

    /// Collect all input field names from this node and its children (in tree order)
    pub fn collect_field_names(&self, names: &mut Vec<String>) {
        match self {
            Self::Input { name, .. } => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            _ => {
                for child in self.children() {
                    child.collect_field_names(names);
                }
            }
        }
    }

    /// Get all input field names in tree order
    pub fn field_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_field_names(&mut names);
        names
    }

    /// Find the first input registered under `field`
    pub fn find_input(&self, field: &str) -> Option<&Node> {
        match self {
            Self::Input { name, .. } if name == field => Some(self),
            _ => self.children().iter().find_map(|c| c.find_input(field)),
        }
    }

    /// Binding of the input named `field`, if it has been bound
    pub fn binding(&self, field: &str) -> Option<&FieldBinding> {
        match self.find_input(field)? {
            Self::Input { binding, .. } => binding.as_ref(),
            _ => None,
        }
    }

    /// Handlers of every submit trigger, in tree order
    pub fn submit_handlers(&self) -> Vec<Option<HandlerId>> {
        let mut handlers = Vec::new();
        self.collect_submit_handlers(&mut handlers);
        handlers
    }

    fn collect_submit_handlers(&self, handlers: &mut Vec<Option<HandlerId>>) {
        match self {
            Self::Button {
                kind: ButtonKind::Submit,
                on_click,
                ..
            } => handlers.push(on_click.clone()),
            Self::Form { on_submit, children } => {
                handlers.push(on_submit.clone());
                for child in children {
                    child.collect_submit_handlers(handlers);
                }
            }
            _ => {
                for child in self.children() {
                    child.collect_submit_handlers(handlers);
                }
            }
        }
    }

    /// Depth of the deepest node (a leaf alone has depth 0)
    pub fn depth(&self) -> usize {
        self.children()
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }
}
