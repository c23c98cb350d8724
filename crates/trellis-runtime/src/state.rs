#![forbid(unsafe_code)]

//! Per-component runtime records.
//!
//! Component relationships are cyclic (parent and child reference each
//! other), so the tree is stored as an arena of [`ComponentState`]
//! records addressed by [`ComponentId`]. Parent links are plain ids,
//! the arena owns every record, and ids are never reused while the
//! renderer lives, so a stale id can only miss, never alias.

use crate::cascading::{CascadingSlot, ResolvedCascade};
use crate::component::Component;
use crate::registry::ComponentMeta;
use bitflags::bitflags;
use std::collections::HashMap;
use std::rc::Rc;
use trellis_tree::frame::{ComponentId, ComponentTypeId, Frame};

bitflags! {
    /// Lifecycle flags of one component instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StateFlags: u8 {
        const ATTACHED           = 1 << 0;
        /// `on_init` has run (it runs exactly once).
        const INITIALIZED        = 1 << 1;
        const DISPOSED           = 1 << 2;
        /// Queued for rendering in the current or next batch.
        const RENDER_PENDING     = 1 << 3;
        const RENDER_IN_PROGRESS = 1 << 4;
        /// At least one render has been committed; drives the
        /// first-render flag of `on_after_render`.
        const HAS_RENDERED       = 1 << 5;
    }
}

/// Runtime record of one live component.
pub struct ComponentState {
    pub id: ComponentId,
    pub type_id: ComponentTypeId,
    /// Non-owning back-reference; `None` for roots.
    pub parent: Option<ComponentId>,
    pub flags: StateFlags,
    /// The component instance. Taken out for the duration of each hook
    /// call so hooks can never alias the arena, and put back after.
    pub component: Option<Box<dyn Component>>,
    pub meta: Rc<ComponentMeta>,
    /// Last committed frame array. Shared so parameter views and
    /// two-way-binding patches can hold it across passes.
    pub current_frames: Rc<Vec<Frame>>,
    /// Where this component's direct parameters live: the parent's
    /// committed frames plus the component frame's index within them.
    pub parameter_source: Option<(Rc<Vec<Frame>>, usize)>,
    /// Cascading parameters resolved at attach time.
    pub resolved_cascades: Vec<ResolvedCascade>,
    /// Suppliers this component subscribed to, for unsubscription on
    /// dispose.
    pub subscriptions: Vec<ComponentId>,
    /// Live supply slot when this component's type supplies a cascading
    /// value.
    pub slot: Option<CascadingSlot>,
}

impl ComponentState {
    pub fn is_disposed(&self) -> bool {
        self.flags.contains(StateFlags::DISPOSED)
    }
}

/// Arena of component states. Ids are monotonically assigned and never
/// reused within one arena.
#[derive(Default)]
pub struct ComponentArena {
    states: HashMap<ComponentId, ComponentState>,
    next_id: u64,
}

impl ComponentArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(
        &mut self,
        type_id: ComponentTypeId,
        meta: Rc<ComponentMeta>,
        parent: Option<ComponentId>,
        component: Option<Box<dyn Component>>,
    ) -> ComponentId {
        self.next_id += 1;
        let id = ComponentId(self.next_id);
        self.states.insert(
            id,
            ComponentState {
                id,
                type_id,
                parent,
                flags: StateFlags::ATTACHED,
                component,
                meta,
                current_frames: Rc::new(Vec::new()),
                parameter_source: None,
                resolved_cascades: Vec::new(),
                subscriptions: Vec::new(),
                slot: None,
            },
        );
        id
    }

    pub fn get(&self, id: ComponentId) -> Option<&ComponentState> {
        self.states.get(&id)
    }

    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut ComponentState> {
        self.states.get_mut(&id)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.states.contains_key(&id)
    }

    /// Drop a record entirely. The id stays burned.
    pub fn remove(&mut self, id: ComponentId) -> Option<ComponentState> {
        self.states.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.states.keys().copied()
    }
}
