#![forbid(unsafe_code)]

//! Diff computation between two frame arrays of one component.
//!
//! Given the previously committed tree and a freshly built tree, the diff
//! engine walks both sibling lists in parallel and appends a minimal edit
//! script to the current batch.
//!
//! # Algorithm
//!
//! 1. Siblings are matched by key when either side carries one, otherwise
//!    by sequence number using a preordered merge join with loop-back
//!    detection (sequence numbers are author-assigned position hints, so
//!    a repeated drop in sequence marks a new loop block).
//! 2. Matched frames of the same kind — and, for elements and components,
//!    the same name or type and the same key — are diffed in place:
//!    attributes first (conceptually unordered, diffed by name), then
//!    children between `StepIn`/`StepOut` edits.
//! 3. Anything else is treated as structurally different: the old subtree
//!    is removed and the new subtree inserted, never deep-diffed across
//!    non-matching nodes.
//! 4. Keyed siblings present in both trees are emitted as a permutation
//!    list so the recipient moves them instead of recreating them, which
//!    is what preserves component identity across reorders.
//!
//! Child component instantiation, retained-child parameter updates,
//! handler id assignment, and disposal are delegated to the [`DiffHost`],
//! implemented by the renderer.
//!
//! A frame array that violates the subtree-length invariant makes index
//! arithmetic here panic; that is deliberate — it is a builder bug, not a
//! recoverable diff outcome.

use crate::batch::{BatchBuilder, ComponentEdits};
use crate::edit::Edit;
use crate::frame::{
    AttributeValue, ComponentId, ComponentTypeId, Frame, FrameBody, HandlerId, Key,
};
use std::collections::HashMap;

/// Renderer-side operations the diff engine needs while reconciling.
pub trait DiffHost {
    /// Create and attach a component instance for a newly inserted
    /// component frame. `frame_index` is the frame's index in the new
    /// tree; the host uses it to locate the child's initial parameters
    /// once the tree is committed.
    fn instantiate_component(&mut self, type_id: ComponentTypeId, frame_index: usize)
    -> ComponentId;

    /// A component frame matched across both trees. `parameters_changed`
    /// reports whether the direct parameter frames differ; the host skips
    /// the child's parameter update when they definitely did not.
    fn update_retained_component(
        &mut self,
        component_id: ComponentId,
        frame_index: usize,
        parameters_changed: bool,
    );

    /// Mint a handler id for a newly appearing event-handler attribute.
    fn assign_handler_id(&mut self, attribute_name: &str, binding: &str) -> HandlerId;

    /// An event handler was replaced in place; late events against the
    /// old id must be routed to the new one until the old id is retired.
    fn track_replaced_handler(&mut self, old: HandlerId, new: HandlerId);

    /// A component subtree left the tree; the host disposes it after the
    /// current render step.
    fn queue_component_disposal(&mut self, component_id: ComponentId);
}

#[derive(Debug, Clone, Copy)]
enum DiffAction {
    /// Diff in place against the new frame at the given index.
    Match(usize),
    Insert,
    Delete,
}

#[derive(Debug, Default, Clone, Copy)]
struct KeyedItemInfo {
    old_index: Option<usize>,
    new_index: Option<usize>,
    /// Post-edit sibling indices, recorded when the item is visited as a
    /// move; a key with both recorded has actually moved.
    old_sibling_index: Option<u32>,
    new_sibling_index: Option<u32>,
}

struct DiffCtx<'a, H: DiffHost> {
    host: &'a mut H,
    batch: &'a mut BatchBuilder,
    old: &'a [Frame],
    new: &'a mut [Frame],
    sibling_index: u32,
}

/// Compute the edit script turning `old` into `new` for one component.
///
/// Renderer-assigned ids (component ids on new component frames, handler
/// ids on new event attributes) are written into `new` as a side effect;
/// the caller commits the mutated array as the component's current tree.
pub fn compute_diff<H: DiffHost>(
    host: &mut H,
    batch: &mut BatchBuilder,
    component_id: ComponentId,
    old: &[Frame],
    new: &mut [Frame],
) -> ComponentEdits {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!(
        "diff_compute",
        component = component_id.0,
        old_len = old.len(),
        new_len = new.len()
    )
    .entered();

    let start = batch.edit_mark();
    let (old_len, new_len) = (old.len(), new.len());
    let mut ctx = DiffCtx {
        host,
        batch,
        old,
        new,
        sibling_index: 0,
    };
    append_diff_entries_for_range(&mut ctx, 0, old_len, 0, new_len);
    let end = ctx.batch.edit_mark();
    ComponentEdits {
        component_id,
        range: start..end,
    }
}

/// Queue disposal records for every live component and assigned handler
/// in `frames`. Used when an entire component's tree is being discarded.
pub fn dispose_frames<H: DiffHost>(host: &mut H, batch: &mut BatchBuilder, frames: &[Frame]) {
    dispose_frames_in_range(host, batch, frames, 0, frames.len());
}

fn append_diff_entries_for_range<H: DiffHost>(
    ctx: &mut DiffCtx<'_, H>,
    old_start_index: usize,
    old_end_excl: usize,
    new_start_index: usize,
    new_end_excl: usize,
) {
    let orig_old_start = old_start_index;
    let orig_new_start = new_start_index;
    let mut old_start = old_start_index;
    let mut new_start = new_start_index;
    let mut has_more_old = old_end_excl > old_start;
    let mut has_more_new = new_end_excl > new_start;
    let mut prev_old_seq: Option<u32> = None;
    let mut prev_new_seq: Option<u32> = None;
    let mut keyed: Option<HashMap<Key, KeyedItemInfo>> = None;

    while has_more_old || has_more_new {
        let (old_seq, old_key) = if has_more_old {
            let f = &ctx.old[old_start];
            (f.sequence, f.key().cloned())
        } else {
            (u32::MAX, None)
        };
        let (new_seq, new_key) = if has_more_new {
            let f = &ctx.new[new_start];
            (f.sequence, f.key().cloned())
        } else {
            (u32::MAX, None)
        };

        let action = if old_key.is_some() || new_key.is_some() {
            // Keys take precedence over sequence numbers. Build the key
            // lookup on first use; it also validates key uniqueness.
            if keyed.is_none() {
                keyed = Some(build_key_lookup(
                    ctx.old,
                    ctx.new,
                    orig_old_start,
                    old_end_excl,
                    orig_new_start,
                    new_end_excl,
                ));
            }
            let map = keyed.as_mut().expect("key lookup just built");

            if old_key.is_some() && old_key == new_key {
                DiffAction::Match(new_start)
            } else {
                let old_info = old_key
                    .as_ref()
                    .and_then(|k| map.get(k).copied())
                    .unwrap_or_default();
                let new_info = new_key
                    .as_ref()
                    .and_then(|k| map.get(k).copied())
                    .unwrap_or_default();
                let old_key_in_new_tree = old_info.new_index.is_some();
                let new_key_in_old_tree = new_info.old_index.is_some();

                if old_key_in_new_tree && new_key_in_old_tree {
                    // Both keys exist on both sides: a move. Recurse into
                    // the old key's counterpart in place and record the
                    // post-edit sibling indices for the permutation list.
                    // Sibling indices only grow, so the values recorded
                    // here stay correct.
                    let match_index = old_info.new_index.expect("checked above");
                    if let Some(k) = old_key.as_ref() {
                        map.get_mut(k).expect("old key in lookup").old_sibling_index =
                            Some(ctx.sibling_index);
                    }
                    if let Some(k) = new_key.as_ref() {
                        map.get_mut(k).expect("new key in lookup").new_sibling_index =
                            Some(ctx.sibling_index);
                    }
                    DiffAction::Match(match_index)
                } else if !has_more_new {
                    DiffAction::Delete
                } else if new_key_in_old_tree {
                    // The new key will be matched later as a move, so the
                    // old item here must be the one leaving.
                    DiffAction::Delete
                } else {
                    DiffAction::Insert
                }
            }
        } else {
            // Neither side is keyed; match by sequence number.
            if old_seq == new_seq {
                DiffAction::Match(new_start)
            } else {
                let old_looped_back = prev_old_seq.is_some_and(|p| old_seq <= p);
                let new_looped_back = prev_new_seq.is_some_and(|p| new_seq <= p);
                if old_looped_back == new_looped_back {
                    // Same loop block on both sides: preordered merge
                    // join, picking whichever side resynchronizes sooner.
                    if old_looped_back {
                        prev_old_seq = None;
                        prev_new_seq = None;
                    }
                    if new_seq < old_seq {
                        DiffAction::Insert
                    } else {
                        DiffAction::Delete
                    }
                } else if old_looped_back {
                    // Old looped back, new did not: either the new side
                    // has trailing items in the current loop block to
                    // insert, or the old side has trailing loop blocks to
                    // delete.
                    let new_loops_back_later = (new_start + 1..new_end_excl)
                        .any(|i| ctx.new[i].sequence < new_seq);
                    if new_loops_back_later {
                        DiffAction::Insert
                    } else {
                        DiffAction::Delete
                    }
                } else {
                    let old_loops_back_later = (old_start + 1..old_end_excl)
                        .any(|i| ctx.old[i].sequence < old_seq);
                    if old_loops_back_later {
                        DiffAction::Delete
                    } else {
                        DiffAction::Insert
                    }
                }
            }
        };

        match action {
            DiffAction::Match(new_index) => {
                append_diff_entries_for_frames(ctx, old_start, new_index);
                old_start = ctx.old[old_start].next_sibling_index(old_start);
                new_start = ctx.new[new_start].next_sibling_index(new_start);
                has_more_old = old_end_excl > old_start;
                has_more_new = new_end_excl > new_start;
                prev_old_seq = Some(old_seq);
                prev_new_seq = Some(new_seq);
            }
            DiffAction::Insert => {
                insert_new_frame(ctx, new_start);
                new_start = ctx.new[new_start].next_sibling_index(new_start);
                has_more_new = new_end_excl > new_start;
                prev_new_seq = Some(new_seq);
            }
            DiffAction::Delete => {
                remove_old_frame(ctx, old_start);
                old_start = ctx.old[old_start].next_sibling_index(old_start);
                has_more_old = old_end_excl > old_start;
                prev_old_seq = Some(old_seq);
            }
        }
    }

    // Emit moves for every key that was visited on both sides.
    if let Some(map) = keyed {
        let mut moves: Vec<(u32, u32)> = map
            .values()
            .filter_map(|info| Some((info.old_sibling_index?, info.new_sibling_index?)))
            .collect();
        if !moves.is_empty() {
            moves.sort_unstable();
            for (from, to) in moves {
                ctx.batch.push_edit(Edit::PermutationListEntry {
                    from_sibling_index: from,
                    to_sibling_index: to,
                });
            }
            // Being explicit about the end of the list keeps the
            // recipient's state machine trivial.
            ctx.batch.push_edit(Edit::PermutationListEnd);
        }
    }
}

fn build_key_lookup(
    old: &[Frame],
    new: &[Frame],
    mut old_start: usize,
    old_end_excl: usize,
    mut new_start: usize,
    new_end_excl: usize,
) -> HashMap<Key, KeyedItemInfo> {
    let mut result: HashMap<Key, KeyedItemInfo> = HashMap::new();

    while old_start < old_end_excl {
        let frame = &old[old_start];
        if let Some(key) = frame.key() {
            let entry = result.entry(key.clone()).or_default();
            assert!(
                entry.old_index.is_none(),
                "more than one sibling has the key {key:?}; key values must be unique"
            );
            entry.old_index = Some(old_start);
        }
        old_start = frame.next_sibling_index(old_start);
    }

    while new_start < new_end_excl {
        let frame = &new[new_start];
        if let Some(key) = frame.key() {
            let entry = result.entry(key.clone()).or_default();
            assert!(
                entry.new_index.is_none(),
                "more than one sibling has the key {key:?}; key values must be unique"
            );
            entry.new_index = Some(new_start);
        }
        new_start = frame.next_sibling_index(new_start);
    }

    result
}

/// Diff two frames that were matched by key or sequence.
fn append_diff_entries_for_frames<H: DiffHost>(
    ctx: &mut DiffCtx<'_, H>,
    old_index: usize,
    new_index: usize,
) {
    // Matched frames of different kinds are completely unrelated; replace
    // structurally. (Possible with hand-written builder logic or when two
    // dissimilar frames matched by key.)
    if ctx.old[old_index].kind() != ctx.new[new_index].kind() {
        insert_new_frame(ctx, new_index);
        remove_old_frame(ctx, old_index);
        return;
    }

    match (&ctx.old[old_index].body, &ctx.new[new_index].body) {
        (FrameBody::Text { content: old_text }, FrameBody::Text { content: new_text }) => {
            if old_text != new_text {
                let frame = ctx.new[new_index].clone();
                let frame_index = ctx.batch.push_reference_frame(frame);
                ctx.batch.push_edit(Edit::UpdateText {
                    sibling_index: ctx.sibling_index,
                    frame_index,
                });
            }
            ctx.sibling_index += 1;
        }

        (FrameBody::Markup { content: old_markup }, FrameBody::Markup { content: new_markup }) => {
            if old_markup != new_markup {
                let frame = ctx.new[new_index].clone();
                let frame_index = ctx.batch.push_reference_frame(frame);
                ctx.batch.push_edit(Edit::UpdateMarkup {
                    sibling_index: ctx.sibling_index,
                    frame_index,
                });
            }
            ctx.sibling_index += 1;
        }

        (FrameBody::Element { name: old_name, .. }, FrameBody::Element { name: new_name, .. }) => {
            if old_name == new_name {
                let old_attrs_end = attributes_end_index(ctx.old, old_index);
                let new_attrs_end = attributes_end_index(ctx.new, new_index);
                append_attribute_diff_entries_for_range(
                    ctx,
                    old_index + 1,
                    old_attrs_end,
                    new_index + 1,
                    new_attrs_end,
                );

                let old_children_end = old_index + ctx.old[old_index].subtree_len();
                let new_children_end = new_index + ctx.new[new_index].subtree_len();
                let has_children =
                    old_children_end > old_attrs_end || new_children_end > new_attrs_end;
                if has_children {
                    ctx.batch.push_edit(Edit::StepIn {
                        sibling_index: ctx.sibling_index,
                    });
                    let prev_sibling_index = ctx.sibling_index;
                    ctx.sibling_index = 0;
                    append_diff_entries_for_range(
                        ctx,
                        old_attrs_end,
                        old_children_end,
                        new_attrs_end,
                        new_children_end,
                    );
                    append_step_out(ctx);
                    ctx.sibling_index = prev_sibling_index + 1;
                } else {
                    ctx.sibling_index += 1;
                }
            } else {
                // Elements with different names are unrelated.
                remove_old_frame(ctx, old_index);
                insert_new_frame(ctx, new_index);
            }
        }

        (FrameBody::Region { .. }, FrameBody::Region { .. }) => {
            let old_end = old_index + ctx.old[old_index].subtree_len();
            let new_end = new_index + ctx.new[new_index].subtree_len();
            append_diff_entries_for_range(ctx, old_index + 1, old_end, new_index + 1, new_end);
        }

        (
            FrameBody::Component {
                type_id: old_type,
                component_id: old_component,
                ..
            },
            FrameBody::Component {
                type_id: new_type, ..
            },
        ) => {
            if old_type == new_type {
                let retained = old_component
                    .expect("matched old component frame was never instantiated");
                let changed = !direct_parameters_equal(ctx.old, old_index, ctx.new, new_index);
                // Preserve the component instance on the new frame.
                if let FrameBody::Component { component_id, .. } = &mut ctx.new[new_index].body {
                    *component_id = Some(retained);
                }
                ctx.host
                    .update_retained_component(retained, new_index, changed);
                ctx.sibling_index += 1;
            } else {
                // Components of different types are unrelated.
                remove_old_frame(ctx, old_index);
                insert_new_frame(ctx, new_index);
            }
        }

        (FrameBody::Attribute { .. }, FrameBody::Attribute { .. }) => {
            unreachable!("attribute frames are diffed by the attribute path")
        }

        _ => unreachable!("frame kinds were checked equal"),
    }
}

/// Diff for attribute frames only. Attribute lists are conceptually
/// unordered, so a merge join on (sequence, name) is tried first, falling
/// back to a name-keyed hash join when the sequences disagree.
fn append_attribute_diff_entries_for_range<H: DiffHost>(
    ctx: &mut DiffCtx<'_, H>,
    old_start_index: usize,
    old_end_excl: usize,
    new_start_index: usize,
    new_end_excl: usize,
) {
    let mut old_start = old_start_index;
    let mut new_start = new_start_index;
    let mut has_more_old = old_end_excl > old_start;
    let mut has_more_new = new_end_excl > new_start;

    while has_more_old || has_more_new {
        let old_seq = if has_more_old {
            ctx.old[old_start].sequence
        } else {
            u32::MAX
        };
        let new_seq = if has_more_new {
            ctx.new[new_start].sequence
        } else {
            u32::MAX
        };

        if old_seq == new_seq
            && ctx.old[old_start].attribute_name() == ctx.new[new_start].attribute_name()
        {
            append_diff_entries_for_attribute_frame(ctx, old_start, new_start);
            old_start += 1;
            new_start += 1;
            has_more_old = old_end_excl > old_start;
            has_more_new = new_end_excl > new_start;
        } else if old_seq < new_seq {
            // Attribute removed relative to the old sequence.
            remove_old_frame(ctx, old_start);
            old_start += 1;
            has_more_old = old_end_excl > old_start;
        } else if old_seq > new_seq {
            // Attribute added relative to the new sequence.
            insert_new_frame(ctx, new_start);
            new_start += 1;
            has_more_new = new_end_excl > new_start;
        } else {
            // Same sequence, different names: merge join cannot decide.
            append_attribute_diff_entries_slow(
                ctx, old_start, old_end_excl, new_start, new_end_excl,
            );
            return;
        }
    }
}

/// Hash-join fallback: index the new attributes by name, walk the old
/// ones diffing matches and removing misses, then insert the leftovers.
fn append_attribute_diff_entries_slow<H: DiffHost>(
    ctx: &mut DiffCtx<'_, H>,
    old_start_index: usize,
    old_end_excl: usize,
    new_start_index: usize,
    new_end_excl: usize,
) {
    let mut new_by_name: HashMap<String, usize> = HashMap::new();
    for i in new_start_index..new_end_excl {
        let name = ctx.new[i]
            .attribute_name()
            .expect("attribute range contains a non-attribute frame");
        new_by_name.insert(name.to_owned(), i);
    }

    for i in old_start_index..old_end_excl {
        let old_name = ctx.old[i]
            .attribute_name()
            .expect("attribute range contains a non-attribute frame");
        if let Some(&match_index) = new_by_name.get(old_name) {
            append_diff_entries_for_attribute_frame(ctx, i, match_index);
            new_by_name.remove(old_name);
        } else {
            remove_old_frame(ctx, i);
        }
    }

    let mut added: Vec<usize> = new_by_name.into_values().collect();
    added.sort_unstable();
    for index in added {
        insert_new_frame(ctx, index);
    }
}

/// Diff one attribute matched by name across both trees.
fn append_diff_entries_for_attribute_frame<H: DiffHost>(
    ctx: &mut DiffCtx<'_, H>,
    old_index: usize,
    new_index: usize,
) {
    let (old_omitted, old_handler) = match &ctx.old[old_index].body {
        FrameBody::Attribute { value, .. } => (value.is_omitted(), value.handler_id()),
        _ => unreachable!("attribute diff on a non-attribute frame"),
    };
    let new_omitted = match &ctx.new[new_index].body {
        FrameBody::Attribute { value, .. } => value.is_omitted(),
        _ => unreachable!("attribute diff on a non-attribute frame"),
    };

    // An omitted value diffs exactly like a missing attribute.
    match (old_omitted, new_omitted) {
        (true, true) => return,
        (false, true) => {
            remove_old_frame(ctx, old_index);
            return;
        }
        (true, false) => {
            insert_new_frame(ctx, new_index);
            return;
        }
        (false, false) => {}
    }

    let value_changed = match (&ctx.old[old_index].body, &ctx.new[new_index].body) {
        (
            FrameBody::Attribute { value: old, .. },
            FrameBody::Attribute { value: new, .. },
        ) => !old.value_eq(new),
        _ => unreachable!(),
    };

    if value_changed {
        initialize_new_attribute_frame(ctx, new_index);
        let frame = ctx.new[new_index].clone();
        let new_handler = frame_handler_id(&frame);
        let frame_index = ctx.batch.push_reference_frame(frame);
        ctx.batch.push_edit(Edit::SetAttribute {
            sibling_index: ctx.sibling_index,
            frame_index,
        });
        if let Some(old_id) = old_handler {
            // Late events against the old id must still land; chain it to
            // its replacement until the batch retires it.
            if let Some(new_id) = new_handler {
                ctx.host.track_replaced_handler(old_id, new_id);
            }
            ctx.batch.push_disposed_handler(old_id);
        }
    } else if old_handler.is_some() {
        // Unchanged handler: retain the id by copying the old frame over
        // the new one, so nothing is disposed or reassigned.
        ctx.new[new_index] = ctx.old[old_index].clone();
    }
}

fn insert_new_frame<H: DiffHost>(ctx: &mut DiffCtx<'_, H>, new_index: usize) {
    match &ctx.new[new_index].body {
        FrameBody::Attribute { value, .. } => {
            if value.is_omitted() {
                return;
            }
            initialize_new_attribute_frame(ctx, new_index);
            let frame = ctx.new[new_index].clone();
            let frame_index = ctx.batch.push_reference_frame(frame);
            ctx.batch.push_edit(Edit::SetAttribute {
                sibling_index: ctx.sibling_index,
                frame_index,
            });
        }
        FrameBody::Element { .. } | FrameBody::Component { .. } => {
            initialize_new_subtree(ctx, new_index);
            let end = new_index + ctx.new[new_index].subtree_len();
            let frame_index = ctx.batch.push_reference_subtree(&ctx.new[new_index..end]);
            ctx.batch.push_edit(Edit::PrependFrame {
                sibling_index: ctx.sibling_index,
                frame_index,
            });
            ctx.sibling_index += 1;
        }
        FrameBody::Region { .. } => {
            // Regions have no display representation; insert each child.
            let end = new_index + ctx.new[new_index].subtree_len();
            let mut child = new_index + 1;
            while child < end {
                insert_new_frame(ctx, child);
                child = ctx.new[child].next_sibling_index(child);
            }
        }
        FrameBody::Text { .. } | FrameBody::Markup { .. } => {
            let frame = ctx.new[new_index].clone();
            let frame_index = ctx.batch.push_reference_frame(frame);
            ctx.batch.push_edit(Edit::PrependFrame {
                sibling_index: ctx.sibling_index,
                frame_index,
            });
            ctx.sibling_index += 1;
        }
    }
}

fn remove_old_frame<H: DiffHost>(ctx: &mut DiffCtx<'_, H>, old_index: usize) {
    match &ctx.old[old_index].body {
        FrameBody::Attribute { name, value } => {
            if value.is_omitted() {
                return;
            }
            ctx.batch.push_edit(Edit::RemoveAttribute {
                sibling_index: ctx.sibling_index,
                name: name.clone(),
            });
            if let Some(id) = value.handler_id() {
                ctx.batch.push_disposed_handler(id);
            }
        }
        FrameBody::Element { .. } | FrameBody::Component { .. } => {
            let end = old_index + ctx.old[old_index].subtree_len();
            dispose_frames_in_range(ctx.host, ctx.batch, ctx.old, old_index, end);
            ctx.batch.push_edit(Edit::RemoveFrame {
                sibling_index: ctx.sibling_index,
            });
        }
        FrameBody::Region { .. } => {
            let end = old_index + ctx.old[old_index].subtree_len();
            let mut child = old_index + 1;
            while child < end {
                remove_old_frame(ctx, child);
                child = ctx.old[child].next_sibling_index(child);
            }
        }
        FrameBody::Text { .. } | FrameBody::Markup { .. } => {
            ctx.batch.push_edit(Edit::RemoveFrame {
                sibling_index: ctx.sibling_index,
            });
        }
    }
}

/// Index of the first frame after `root_index` that is not one of the
/// container's attribute frames.
fn attributes_end_index(frames: &[Frame], root_index: usize) -> usize {
    let subtree_end = root_index + frames[root_index].subtree_len();
    let mut index = root_index + 1;
    while index < subtree_end && frames[index].is_attribute() {
        index += 1;
    }
    index
}

/// A `StepOut` directly after a `StepIn` means the child diff was empty;
/// cancel both instead of emitting a useless pair.
fn append_step_out<H: DiffHost>(ctx: &mut DiffCtx<'_, H>) {
    if matches!(ctx.batch.last_edit(), Some(Edit::StepIn { .. })) {
        ctx.batch.pop_edit();
    } else {
        ctx.batch.push_edit(Edit::StepOut);
    }
}

/// Walk a newly inserted subtree instantiating component frames and
/// assigning handler ids, so the reference frames copied into the batch
/// carry final ids.
fn initialize_new_subtree<H: DiffHost>(ctx: &mut DiffCtx<'_, H>, frame_index: usize) {
    let end = frame_index + ctx.new[frame_index].subtree_len();
    for i in frame_index..end {
        match &ctx.new[i].body {
            FrameBody::Component {
                type_id,
                component_id,
                ..
            } => {
                assert!(
                    component_id.is_none(),
                    "component frame at index {i} already instantiated"
                );
                let id = ctx.host.instantiate_component(*type_id, i);
                if let FrameBody::Component { component_id, .. } = &mut ctx.new[i].body {
                    *component_id = Some(id);
                }
            }
            FrameBody::Attribute { .. } => initialize_new_attribute_frame(ctx, i),
            _ => {}
        }
    }
}

fn initialize_new_attribute_frame<H: DiffHost>(ctx: &mut DiffCtx<'_, H>, new_index: usize) {
    let assign = match &ctx.new[new_index].body {
        FrameBody::Attribute {
            name,
            value:
                AttributeValue::EventHandler {
                    binding,
                    handler_id: None,
                },
        } => Some(ctx.host.assign_handler_id(name, binding)),
        _ => None,
    };
    if let Some(id) = assign
        && let FrameBody::Attribute {
            value: AttributeValue::EventHandler { handler_id, .. },
            ..
        } = &mut ctx.new[new_index].body
    {
        *handler_id = Some(id);
    }
}

fn frame_handler_id(frame: &Frame) -> Option<HandlerId> {
    match &frame.body {
        FrameBody::Attribute { value, .. } => value.handler_id(),
        _ => None,
    }
}

fn dispose_frames_in_range<H: DiffHost>(
    host: &mut H,
    batch: &mut BatchBuilder,
    frames: &[Frame],
    start: usize,
    end_excl: usize,
) {
    for frame in &frames[start..end_excl] {
        match &frame.body {
            FrameBody::Component {
                component_id: Some(id),
                ..
            } => host.queue_component_disposal(*id),
            FrameBody::Attribute { value, .. } => {
                if let Some(id) = value.handler_id() {
                    batch.push_disposed_handler(id);
                }
            }
            _ => {}
        }
    }
}

/// Conservative equality for a matched component frame's direct
/// parameters: the attribute lists must have the same names and logically
/// equal values, in order.
fn direct_parameters_equal(
    old: &[Frame],
    old_component_index: usize,
    new: &[Frame],
    new_component_index: usize,
) -> bool {
    let old_end = attributes_end_index(old, old_component_index);
    let new_end = attributes_end_index(new, new_component_index);
    if old_end - old_component_index != new_end - new_component_index {
        return false;
    }
    let old_attrs = &old[old_component_index + 1..old_end];
    let new_attrs = &new[new_component_index + 1..new_end];
    old_attrs.iter().zip(new_attrs).all(|(a, b)| {
        match (&a.body, &b.body) {
            (
                FrameBody::Attribute {
                    name: an,
                    value: av,
                },
                FrameBody::Attribute {
                    name: bn,
                    value: bv,
                },
            ) => an == bn && av.value_eq(bv),
            _ => false,
        }
    })
}
