#![forbid(unsafe_code)]

//! Render-batch accumulation.
//!
//! One reconciliation pass produces one batch: the edit scripts of every
//! component rendered in the pass, the reference frames those edits point
//! at, and the components and handler ids the pass disposed. Edits for
//! all components share one buffer; each [`ComponentEdits`] addresses a
//! range of it, so a batch costs two allocations at steady state, not one
//! per component.
//!
//! The committed [`RenderBatch`] view is what the display sink receives;
//! it reports success or failure per batch, never per edit.

use crate::edit::Edit;
use crate::frame::{ComponentId, Frame, HandlerId};
use std::ops::Range;

/// The edit script one component contributed to a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEdits {
    pub component_id: ComponentId,
    /// Range into the batch's shared edit buffer.
    pub range: Range<usize>,
}

/// Accumulates one batch across the components rendered in a pass.
#[derive(Debug, Default)]
pub struct BatchBuilder {
    edits: Vec<Edit>,
    reference_frames: Vec<Frame>,
    updated_components: Vec<ComponentEdits>,
    disposed_components: Vec<ComponentId>,
    disposed_handlers: Vec<HandlerId>,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current length of the shared edit buffer; used by the diff engine
    /// to delimit one component's range.
    pub fn edit_mark(&self) -> usize {
        self.edits.len()
    }

    pub fn push_edit(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    /// Drop the most recent edit. Used to cancel a `StepIn` that turned
    /// out to have no edits before its matching `StepOut`.
    pub fn pop_edit(&mut self) -> Option<Edit> {
        self.edits.pop()
    }

    pub fn last_edit(&self) -> Option<&Edit> {
        self.edits.last()
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Append one frame to the reference buffer, returning its index.
    pub fn push_reference_frame(&mut self, frame: Frame) -> u32 {
        self.reference_frames.push(frame);
        (self.reference_frames.len() - 1) as u32
    }

    /// Append a whole subtree to the reference buffer, returning the index
    /// of its root.
    pub fn push_reference_subtree(&mut self, frames: &[Frame]) -> u32 {
        let first = self.reference_frames.len() as u32;
        self.reference_frames.extend_from_slice(frames);
        first
    }

    pub fn reference_frames(&self) -> &[Frame] {
        &self.reference_frames
    }

    /// Record the edit range a component produced in this batch.
    pub fn record_component(&mut self, component_id: ComponentId, range: Range<usize>) {
        self.updated_components.push(ComponentEdits {
            component_id,
            range,
        });
    }

    pub fn updated_components(&self) -> &[ComponentEdits] {
        &self.updated_components
    }

    pub fn push_disposed_component(&mut self, id: ComponentId) {
        self.disposed_components.push(id);
    }

    pub fn push_disposed_handler(&mut self, id: HandlerId) {
        self.disposed_handlers.push(id);
    }

    pub fn disposed_handlers(&self) -> &[HandlerId] {
        &self.disposed_handlers
    }

    /// The committed, read-only view handed to the display sink.
    pub fn to_batch(&self) -> RenderBatch<'_> {
        RenderBatch {
            edits: &self.edits,
            reference_frames: &self.reference_frames,
            updated_components: &self.updated_components,
            disposed_components: &self.disposed_components,
            disposed_handlers: &self.disposed_handlers,
        }
    }

    /// Reset for the next batch without releasing capacity.
    pub fn clear(&mut self) {
        self.edits.clear();
        self.reference_frames.clear();
        self.updated_components.clear();
        self.disposed_components.clear();
        self.disposed_handlers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
            && self.updated_components.is_empty()
            && self.disposed_components.is_empty()
            && self.disposed_handlers.is_empty()
    }
}

/// One committed render batch.
#[derive(Debug, Clone, Copy)]
pub struct RenderBatch<'a> {
    pub edits: &'a [Edit],
    pub reference_frames: &'a [Frame],
    pub updated_components: &'a [ComponentEdits],
    pub disposed_components: &'a [ComponentId],
    pub disposed_handlers: &'a [HandlerId],
}

impl RenderBatch<'_> {
    /// The edit script for one updated component.
    pub fn edits_for(&self, entry: &ComponentEdits) -> &[Edit] {
        &self.edits[entry.range.clone()]
    }
}
