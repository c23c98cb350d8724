#![forbid(unsafe_code)]

//! Append-only writer for frame arrays.
//!
//! A component's render logic drives a [`FrameBuilder`] for one render
//! pass: `open_*` pushes a placeholder container frame and records its
//! index on a stack, `close_*` pops the stack and patches the
//! placeholder's subtree length to the number of frames written since it
//! was opened. This is what establishes the subtree-length invariant the
//! diff engine relies on.
//!
//! Misuse — closing without a matching open, closing the wrong kind,
//! adding an attribute when no container can accept one, or finalizing
//! with scopes still open — corrupts the invariant and is therefore a
//! programmer error reported by panicking immediately, not a recoverable
//! condition.
//!
//! Builders are reusable: [`FrameBuilder::clear`] resets the length to
//! zero without releasing capacity, which is what makes pooling via
//! [`crate::pool::BuilderPool`] worthwhile.

use crate::frame::{
    AttributeValue, ComponentTypeId, Frame, FrameBody, Key, RenderModeId,
};
use smallvec::SmallVec;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenKind {
    Element,
    Component,
    Region,
}

impl OpenKind {
    fn noun(self) -> &'static str {
        match self {
            OpenKind::Element => "element",
            OpenKind::Component => "component",
            OpenKind::Region => "region",
        }
    }
}

#[derive(Debug)]
struct OpenEntry {
    kind: OpenKind,
    index: usize,
}

/// Append-only writer that produces one frame array per render pass.
#[derive(Debug, Default)]
pub struct FrameBuilder {
    frames: Vec<Frame>,
    /// Open scopes rarely nest more than a handful deep; keep the stack
    /// inline.
    open_stack: SmallVec<[OpenEntry; 8]>,
    /// Index of the container frame currently accepting attributes, if
    /// any. Cleared by the first non-attribute append after an open.
    attr_target: Option<usize>,
    /// Pool serial; 0 for builders constructed outside a pool.
    pub(crate) serial: u64,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        FrameBuilder {
            frames: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Open an element scope. Must be balanced by [`Self::close_element`].
    pub fn open_element(&mut self, sequence: u32, name: impl Into<String>) {
        let index = self.frames.len();
        self.frames.push(Frame {
            sequence,
            body: FrameBody::Element {
                name: name.into(),
                subtree_len: 0,
                key: None,
            },
        });
        self.open_stack.push(OpenEntry {
            kind: OpenKind::Element,
            index,
        });
        self.attr_target = Some(index);
    }

    /// Open a child-component scope. Must be balanced by
    /// [`Self::close_component`].
    pub fn open_component(&mut self, sequence: u32, type_id: ComponentTypeId) {
        let index = self.frames.len();
        self.frames.push(Frame {
            sequence,
            body: FrameBody::Component {
                type_id,
                subtree_len: 0,
                key: None,
                component_id: None,
                render_mode: None,
            },
        });
        self.open_stack.push(OpenEntry {
            kind: OpenKind::Component,
            index,
        });
        self.attr_target = Some(index);
    }

    /// Open a region (grouping) scope. Regions take no attributes.
    pub fn open_region(&mut self, sequence: u32) {
        let index = self.frames.len();
        self.frames.push(Frame {
            sequence,
            body: FrameBody::Region { subtree_len: 0 },
        });
        self.open_stack.push(OpenEntry {
            kind: OpenKind::Region,
            index,
        });
        self.attr_target = None;
    }

    pub fn close_element(&mut self) {
        self.close(OpenKind::Element);
    }

    pub fn close_component(&mut self) {
        self.close(OpenKind::Component);
    }

    pub fn close_region(&mut self) {
        self.close(OpenKind::Region);
    }

    fn close(&mut self, kind: OpenKind) {
        let entry = self
            .open_stack
            .pop()
            .unwrap_or_else(|| panic!("close_{} without a matching open", kind.noun()));
        assert!(
            entry.kind == kind,
            "close_{} does not match open {} at index {}",
            kind.noun(),
            entry.kind.noun(),
            entry.index
        );
        let len = (self.frames.len() - entry.index) as u32;
        match &mut self.frames[entry.index].body {
            FrameBody::Element { subtree_len, .. }
            | FrameBody::Component { subtree_len, .. }
            | FrameBody::Region { subtree_len } => *subtree_len = len,
            _ => unreachable!("open stack entry does not point at a container"),
        }
        self.attr_target = None;
    }

    /// Append an attribute to the most recently opened element or
    /// component. A boolean `false` value is dropped entirely so that the
    /// built tree is indistinguishable from one that never mentioned the
    /// attribute.
    ///
    /// # Panics
    ///
    /// Panics if no open element or component can accept attributes at
    /// this point (attributes must precede child content).
    pub fn add_attribute(
        &mut self,
        sequence: u32,
        name: impl Into<String>,
        value: AttributeValue,
    ) {
        assert!(
            self.attr_target.is_some(),
            "add_attribute outside an element or component attribute scope"
        );
        if value.is_omitted() {
            return;
        }
        self.frames.push(Frame::attribute(sequence, name, value));
    }

    /// Append an event-handler attribute whose binding label is routed to
    /// the owning component's `on_event`.
    pub fn add_event(&mut self, sequence: u32, name: impl Into<String>, binding: impl Into<String>) {
        self.add_attribute(
            sequence,
            name,
            AttributeValue::EventHandler {
                binding: binding.into(),
                handler_id: None,
            },
        );
    }

    /// Append a text frame as child content of the current scope.
    pub fn add_text(&mut self, sequence: u32, content: impl Into<String>) {
        self.attr_target = None;
        self.frames.push(Frame::text(sequence, content));
    }

    /// Append a markup frame as child content of the current scope.
    pub fn add_markup(&mut self, sequence: u32, content: impl Into<String>) {
        self.attr_target = None;
        self.frames.push(Frame::markup(sequence, content));
    }

    /// Assign a key to the innermost open element or component.
    ///
    /// # Panics
    ///
    /// Panics if nothing keyable is open or a key was already assigned.
    pub fn set_key(&mut self, key: Key) {
        let entry = self
            .open_stack
            .last()
            .expect("set_key with no open element or component");
        match &mut self.frames[entry.index].body {
            FrameBody::Element { key: slot, .. } | FrameBody::Component { key: slot, .. } => {
                assert!(slot.is_none(), "key already assigned to the open {}", entry.kind.noun());
                *slot = Some(key);
            }
            _ => panic!("set_key on a region frame"),
        }
    }

    /// Assign a render mode to the innermost open component.
    ///
    /// # Panics
    ///
    /// Panics if no component is open, or a mode was already declared
    /// (an ambiguous render-mode declaration is a usage error).
    pub fn set_render_mode(&mut self, mode: RenderModeId) {
        let entry = self
            .open_stack
            .last()
            .expect("set_render_mode with no open component");
        match &mut self.frames[entry.index].body {
            FrameBody::Component { render_mode, .. } => {
                assert!(
                    render_mode.is_none(),
                    "render mode already declared for the open component"
                );
                *render_mode = Some(mode);
            }
            _ => panic!("set_render_mode on a non-component frame"),
        }
    }

    /// Reset to empty without releasing capacity.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.open_stack.clear();
        self.attr_target = None;
    }

    /// Number of frames written so far.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Mutable access for the diff engine, which writes renderer-assigned
    /// ids (handler ids, component ids) into the new tree while diffing.
    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    /// Assert every opened scope was closed.
    ///
    /// # Panics
    ///
    /// Panics if any scope is still open; the subtree lengths of open
    /// scopes are unpatched and the array must not be used.
    pub fn assert_closed(&self) {
        assert!(
            self.open_stack.is_empty(),
            "frame builder finalized with {} unclosed scope(s)",
            self.open_stack.len()
        );
    }

    /// Copy the finished frame array out as a shared, committed tree.
    pub fn freeze(&self) -> Rc<Vec<Frame>> {
        self.assert_closed();
        Rc::new(self.frames.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameKind;

    fn subtree_invariant_holds(frames: &[Frame]) -> bool {
        // Every container's subtree must nest properly and siblings must
        // tile the array exactly.
        fn walk(frames: &[Frame], start: usize, end: usize) -> bool {
            let mut i = start;
            while i < end {
                let len = frames[i].subtree_len();
                if len == 0 || i + len > end {
                    return false;
                }
                let child_start = i + 1;
                if !walk(frames, child_start, i + len) {
                    return false;
                }
                i += len;
            }
            i == end
        }
        walk(frames, 0, frames.len())
    }

    #[test]
    fn nested_scopes_patch_subtree_lengths() {
        let mut b = FrameBuilder::new();
        b.open_element(0, "panel");
        b.add_attribute(1, "title", AttributeValue::Text("hello".into()));
        b.open_element(2, "row");
        b.add_text(3, "cell");
        b.close_element();
        b.add_text(4, "tail");
        b.close_element();

        let frames = b.frames();
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[0].subtree_len(), 5);
        assert_eq!(frames[2].subtree_len(), 2);
        assert!(subtree_invariant_holds(frames));
    }

    #[test]
    fn false_flag_attribute_is_dropped() {
        let mut b = FrameBuilder::new();
        b.open_element(0, "input");
        b.add_attribute(1, "disabled", AttributeValue::Flag(false));
        b.add_attribute(2, "checked", AttributeValue::Flag(true));
        b.close_element();
        assert_eq!(b.len(), 2);
        assert_eq!(b.frames()[1].attribute_name(), Some("checked"));
    }

    #[test]
    fn clear_retains_capacity() {
        let mut b = FrameBuilder::with_capacity(16);
        b.open_element(0, "a");
        b.close_element();
        let cap = b.frames.capacity();
        b.clear();
        assert!(b.is_empty());
        assert_eq!(b.frames.capacity(), cap);
    }

    #[test]
    fn region_groups_without_attributes() {
        let mut b = FrameBuilder::new();
        b.open_region(0);
        b.add_text(1, "x");
        b.add_text(2, "y");
        b.close_region();
        assert_eq!(b.frames()[0].kind(), FrameKind::Region);
        assert_eq!(b.frames()[0].subtree_len(), 3);
    }

    #[test]
    #[should_panic(expected = "close_element without a matching open")]
    fn close_without_open_panics() {
        let mut b = FrameBuilder::new();
        b.close_element();
    }

    #[test]
    #[should_panic(expected = "does not match open")]
    fn mismatched_close_kind_panics() {
        let mut b = FrameBuilder::new();
        b.open_element(0, "a");
        b.close_region();
    }

    #[test]
    #[should_panic(expected = "add_attribute outside")]
    fn attribute_after_child_content_panics() {
        let mut b = FrameBuilder::new();
        b.open_element(0, "a");
        b.add_text(1, "child");
        b.add_attribute(2, "late", AttributeValue::Text("x".into()));
    }

    #[test]
    #[should_panic(expected = "unclosed scope")]
    fn freeze_with_open_scope_panics() {
        let mut b = FrameBuilder::new();
        b.open_element(0, "a");
        let _ = b.freeze();
    }

    #[test]
    #[should_panic(expected = "key already assigned")]
    fn duplicate_key_panics() {
        let mut b = FrameBuilder::new();
        b.open_element(0, "a");
        b.set_key(Key::Int(1));
        b.set_key(Key::Int(2));
    }

    #[test]
    #[should_panic(expected = "render mode already declared")]
    fn duplicate_render_mode_panics() {
        let mut b = FrameBuilder::new();
        b.open_component(0, ComponentTypeId(1));
        b.set_render_mode(RenderModeId(1));
        b.set_render_mode(RenderModeId(2));
    }

    // ====== Property tests (proptest) ======

    mod property {
        use super::*;
        use proptest::prelude::*;

        /// A random well-formed build script.
        #[derive(Debug, Clone)]
        enum Op {
            Element(Vec<Op>),
            Component(Vec<Op>),
            Region(Vec<Op>),
            Attr,
            Text,
        }

        fn arb_op(depth: u32) -> impl Strategy<Value = Op> {
            let leaf = prop_oneof![Just(Op::Attr), Just(Op::Text)];
            leaf.prop_recursive(depth, 24, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Op::Element),
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Op::Component),
                    prop::collection::vec(inner, 0..4).prop_map(Op::Region),
                ]
            })
        }

        fn apply(b: &mut FrameBuilder, seq: &mut u32, op: &Op) {
            let s = *seq;
            *seq += 1;
            match op {
                Op::Element(children) => {
                    b.open_element(s, "el");
                    for c in children {
                        apply(b, seq, c);
                    }
                    b.close_element();
                }
                Op::Component(children) => {
                    b.open_component(s, ComponentTypeId(1));
                    for c in children {
                        apply(b, seq, c);
                    }
                    b.close_component();
                }
                Op::Region(children) => {
                    b.open_region(s);
                    for c in children {
                        apply(b, seq, c);
                    }
                    b.close_region();
                }
                // Attributes are only legal directly after an open, so a
                // random script emits them as text instead when the scope
                // has moved on.
                Op::Attr => {
                    if b.attr_target.is_some() {
                        b.add_attribute(s, "a", AttributeValue::Text("v".into()));
                    } else {
                        b.add_text(s, "t");
                    }
                }
                Op::Text => b.add_text(s, "t"),
            }
        }

        proptest! {
            #[test]
            fn subtree_invariant_over_random_nesting(ops in prop::collection::vec(arb_op(4), 0..8)) {
                let mut b = FrameBuilder::new();
                let mut seq = 0;
                for op in &ops {
                    apply(&mut b, &mut seq, op);
                }
                b.assert_closed();
                prop_assert!(subtree_invariant_holds(b.frames()));
            }

            #[test]
            fn clear_then_rebuild_holds_invariant(ops in prop::collection::vec(arb_op(3), 0..6)) {
                let mut b = FrameBuilder::new();
                let mut seq = 0;
                for op in &ops {
                    apply(&mut b, &mut seq, op);
                }
                b.clear();
                let mut seq = 0;
                for op in &ops {
                    apply(&mut b, &mut seq, op);
                }
                b.assert_closed();
                prop_assert!(subtree_invariant_holds(b.frames()));
            }
        }
    }
}
