#![forbid(unsafe_code)]

//! Event handler bookkeeping.
//!
//! Handler ids are a renderer-scoped namespace assigned during diffing.
//! The display sink dispatches events by handler id, and the sink's view
//! of the tree always lags the renderer's by at least one batch, so two
//! timing hazards need explicit handling:
//!
//! - A handler replaced in place gets a fresh id; a late event carrying
//!   the old id follows the old-to-new replacement chain to the current
//!   handler instead of being dropped.
//! - Ids disposed by a batch stay dispatchable until that batch is
//!   acknowledged by the sink; only then are they retired.

use std::collections::HashMap;
use trellis_tree::frame::{ComponentId, HandlerId};

/// What a live handler id points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerBinding {
    pub component: ComponentId,
    /// The event attribute's name, e.g. `onclick`.
    pub attribute: String,
    /// The component-side routing label.
    pub binding: String,
}

#[derive(Debug, Default)]
pub struct HandlerRegistry {
    next: u64,
    live: HashMap<HandlerId, HandlerBinding>,
    /// Superseded id to its replacement. Followed transitively on
    /// dispatch; entries die with their source id.
    replaced: HashMap<HandlerId, HandlerId>,
    /// Disposed by an uncommitted batch; retired on acknowledgement.
    pending_removal: Vec<HandlerId>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(
        &mut self,
        component: ComponentId,
        attribute: impl Into<String>,
        binding: impl Into<String>,
    ) -> HandlerId {
        self.next += 1;
        let id = HandlerId(self.next);
        self.live.insert(
            id,
            HandlerBinding {
                component,
                attribute: attribute.into(),
                binding: binding.into(),
            },
        );
        id
    }

    /// Follow the replacement chain from `id` to the most recent id.
    pub fn latest_in_chain(&self, mut id: HandlerId) -> HandlerId {
        while let Some(next) = self.replaced.get(&id) {
            id = *next;
        }
        id
    }

    /// The binding a (possibly superseded) id currently routes to.
    pub fn resolve(&self, id: HandlerId) -> Option<(HandlerId, &HandlerBinding)> {
        let latest = self.latest_in_chain(id);
        self.live.get(&latest).map(|b| (latest, b))
    }

    pub fn track_replaced(&mut self, old: HandlerId, new: HandlerId) {
        self.replaced.insert(old, new);
    }

    /// Queue ids disposed by the batch being built. They remain
    /// dispatchable until [`Self::commit_removals`].
    pub fn queue_removals(&mut self, ids: &[HandlerId]) {
        self.pending_removal.extend_from_slice(ids);
    }

    /// The batch that disposed the queued ids was acknowledged; retire
    /// them and their outgoing chain links.
    pub fn commit_removals(&mut self) {
        for id in self.pending_removal.drain(..) {
            self.live.remove(&id);
            self.replaced.remove(&id);
        }
    }

    /// Drop queued removals without retiring (the owning batch was
    /// aborted, so its disposals never happened).
    pub fn abandon_removals(&mut self) {
        self.pending_removal.clear();
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}
