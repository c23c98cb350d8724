#![forbid(unsafe_code)]

//! Frame records for flattened render trees.
//!
//! A render tree is a `Vec<Frame>`, not a pointer tree. Each container
//! frame (Element, Component, Region) records the number of array slots
//! its subtree occupies, including itself, so siblings can be found by
//! index arithmetic alone:
//!
//! ```text
//! index:      0         1          2       3         4
//! frames:  [ Element  Attribute  Text ] [ Element  Text ]
//!            len=3                        len=2
//! ```
//!
//! The subtree-length invariant — for a container at index `i` with
//! subtree length `L`, indices `[i+1, i+L)` belong exclusively to that
//! container — is established by [`crate::builder::FrameBuilder`] and is
//! the contract the diff engine depends on.

use std::fmt;

/// Identifier for a live component instance, unique per renderer and
/// never reused while that renderer lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier for a registered component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentTypeId(pub u32);

/// Renderer-scoped identifier for an event-handler attribute.
///
/// Handler ids are a scarce namespace owned by the renderer, not by any
/// one component: ids are assigned during diffing, retained while the
/// logical attribute persists, and released when the owning frame is
/// removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Opaque render-mode marker on a component frame. The display sink
/// decides what a mode means; the kernel only carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderModeId(pub u16);

/// An author-supplied identity token on a sibling frame.
///
/// Keys preserve component identity across reorders: a keyed sibling that
/// moves is matched by key and emitted as a permutation entry rather than
/// being destroyed and recreated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Text(String),
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Text(v.to_owned())
    }
}

/// The value carried by an attribute frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Plain text value.
    Text(String),
    /// Boolean attribute. `false` means "omit": the builder drops it and
    /// the diff engine treats it as identical to a missing attribute.
    Flag(bool),
    /// Event-callback delegate. The `binding` label is routed back to the
    /// owning component's `on_event`; the handler id is assigned by the
    /// renderer during diffing.
    EventHandler {
        binding: String,
        handler_id: Option<HandlerId>,
    },
    /// Two-way-binding marker naming the attribute that the associated
    /// event updates on the host display.
    UpdatesAttribute(String),
}

impl AttributeValue {
    /// Logical value equality, ignoring the renderer-assigned handler id.
    ///
    /// Two event-handler values are the same logical value when their
    /// binding labels match; the id is bookkeeping, not identity.
    pub fn value_eq(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::EventHandler { binding: a, .. }, AttributeValue::EventHandler { binding: b, .. }) => a == b,
            (a, b) => a == b,
        }
    }

    /// Whether this value renders as "attribute absent".
    pub fn is_omitted(&self) -> bool {
        matches!(self, AttributeValue::Flag(false))
    }

    /// The handler id, if this is an event-handler value with one assigned.
    pub fn handler_id(&self) -> Option<HandlerId> {
        match self {
            AttributeValue::EventHandler { handler_id, .. } => *handler_id,
            _ => None,
        }
    }
}

/// Frame kind discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Element,
    Text,
    Attribute,
    Component,
    Region,
    Markup,
}

/// Kind-specific frame payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    /// A named display element. Attributes, if any, immediately follow the
    /// element frame, before any child content.
    Element {
        name: String,
        subtree_len: u32,
        key: Option<Key>,
    },
    /// Literal text content.
    Text { content: String },
    /// An attribute on the closest enclosing element or component.
    Attribute {
        name: String,
        value: AttributeValue,
    },
    /// A child component reference. `component_id` is `None` until the
    /// renderer instantiates the component during diffing.
    Component {
        type_id: ComponentTypeId,
        subtree_len: u32,
        key: Option<Key>,
        component_id: Option<ComponentId>,
        render_mode: Option<RenderModeId>,
    },
    /// A grouping frame with no display representation of its own.
    Region { subtree_len: u32 },
    /// Pre-rendered markup passed through to the display verbatim.
    Markup { content: String },
}

/// One node record in a flattened render tree.
///
/// The sequence number is an author-assigned position hint (not a
/// counter); the diff engine uses it to match keyless siblings between
/// two renders of the same component.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub sequence: u32,
    pub body: FrameBody,
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self.body {
            FrameBody::Element { .. } => FrameKind::Element,
            FrameBody::Text { .. } => FrameKind::Text,
            FrameBody::Attribute { .. } => FrameKind::Attribute,
            FrameBody::Component { .. } => FrameKind::Component,
            FrameBody::Region { .. } => FrameKind::Region,
            FrameBody::Markup { .. } => FrameKind::Markup,
        }
    }

    /// Number of array slots this frame's subtree occupies, including
    /// itself. Leaf frames occupy exactly one slot.
    pub fn subtree_len(&self) -> usize {
        match self.body {
            FrameBody::Element { subtree_len, .. }
            | FrameBody::Component { subtree_len, .. }
            | FrameBody::Region { subtree_len } => subtree_len as usize,
            _ => 1,
        }
    }

    /// The key on this frame, if it is a keyed element or component.
    pub fn key(&self) -> Option<&Key> {
        match &self.body {
            FrameBody::Element { key, .. } | FrameBody::Component { key, .. } => key.as_ref(),
            _ => None,
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.body, FrameBody::Attribute { .. })
    }

    /// The attribute name, if this is an attribute frame.
    pub fn attribute_name(&self) -> Option<&str> {
        match &self.body {
            FrameBody::Attribute { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The component id, if this is an instantiated component frame.
    pub fn component_id(&self) -> Option<ComponentId> {
        match &self.body {
            FrameBody::Component { component_id, .. } => *component_id,
            _ => None,
        }
    }

    pub fn text(sequence: u32, content: impl Into<String>) -> Self {
        Frame {
            sequence,
            body: FrameBody::Text {
                content: content.into(),
            },
        }
    }

    pub fn markup(sequence: u32, content: impl Into<String>) -> Self {
        Frame {
            sequence,
            body: FrameBody::Markup {
                content: content.into(),
            },
        }
    }

    pub fn attribute(sequence: u32, name: impl Into<String>, value: AttributeValue) -> Self {
        Frame {
            sequence,
            body: FrameBody::Attribute {
                name: name.into(),
                value,
            },
        }
    }

    /// Index of the first frame after this frame's subtree.
    pub fn next_sibling_index(&self, index: usize) -> usize {
        index + self.subtree_len()
    }
}
