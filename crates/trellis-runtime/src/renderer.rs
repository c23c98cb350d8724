#![forbid(unsafe_code)]

//! The renderer: owner of the component tree and the render loop.
//!
//! One [`Renderer`] owns the component arena, the handler registry, and
//! the batch under construction. All mutation happens on the caller's
//! thread of execution; the type holds `Rc` internally and is therefore
//! not `Send`, which is the concurrency contract, not an accident.
//!
//! # Render loop
//!
//! External triggers (root parameters, events, resumed continuations,
//! cascading notifications) queue components; `process_render_queue`
//! drains the queue into one batch. Rendering a component runs its
//! `render` through a pooled [`FrameBuilder`], diffs the result against
//! its committed tree, and commits the new tree. Children instantiated
//! during the diff get their first parameters immediately after the
//! parent's diff completes, in the same batch. When the queue and the
//! disposal queue are empty the batch goes to the display sink; on
//! acknowledgement, parameter views from the pass expire, disposed
//! handler ids are retired, and `on_after_render` notifications run.
//!
//! # Failure
//!
//! A synchronous hook error aborts the in-flight batch (nothing reaches
//! the sink) and surfaces from the entry point that triggered it.
//! Continuation failures are routed to the [`ErrorSink`] instead, since
//! no caller is on the stack. Committed batches are never rolled back.

use crate::cascading::{CascadingSlot, find_cascading_parameters};
use crate::component::{
    ComponentError, ContinuationToken, EventArgs, HookOutcome, LifecycleCtx, Resume,
    SuspendedPhase,
};
use crate::events::HandlerRegistry;
use crate::params::{BatchLifetime, CascadingEntry, ParameterView};
use crate::registry::{ActivationError, ComponentRegistry};
use crate::state::{ComponentArena, StateFlags};
use crate::store::{PersistScenario, StateStore, StorageResult};
use smallvec::SmallVec;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use trellis_tree::frame::{AttributeValue, ComponentId, ComponentTypeId, FrameBody, HandlerId};
use trellis_tree::{BatchBuilder, BuilderPool, DiffHost, FrameBuilder, RenderBatch, compute_diff, dispose_frames};

/// Suffix naming the two-way-binding marker attribute for an event
/// attribute: the marker for `onchange` is `onchange.updates`, and its
/// value names the attribute the event keeps in sync.
pub const UPDATES_MARKER_SUFFIX: &str = ".updates";

/// Receives committed render batches and applies them to a UI surface.
/// Reports success or failure per batch, never per edit.
pub trait DisplaySink {
    fn update_display(&mut self, batch: &RenderBatch<'_>) -> Result<(), DisplayError>;
}

/// A display sink rejected a batch.
#[derive(Debug)]
pub struct DisplayError {
    pub message: String,
}

impl DisplayError {
    pub fn new(message: impl Into<String>) -> Self {
        DisplayError {
            message: message.into(),
        }
    }
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "display sink rejected batch: {}", self.message)
    }
}

impl std::error::Error for DisplayError {}

/// Sink for errors with no caller on the stack (failed continuations).
pub trait ErrorSink {
    fn component_error(&mut self, component: ComponentId, error: &ComponentError);
}

/// Default error sink: structured log, nothing else.
#[derive(Debug, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn component_error(&mut self, component: ComponentId, error: &ComponentError) {
        tracing::error!(component = component.0, error = %error, "component error");
    }
}

/// Renderer-level failure.
#[derive(Debug)]
pub enum RendererError {
    UnknownComponent(ComponentId),
    UnknownHandler(HandlerId),
    /// The handler exists but belongs to a different component than the
    /// dispatch named.
    HandlerNotOwned {
        handler: HandlerId,
        component: ComponentId,
    },
    UnknownContinuation(ContinuationToken),
    NotARoot(ComponentId),
    /// A synchronous lifecycle hook failed; the batch was aborted.
    Component(ComponentError),
    Activation(ActivationError),
    Display(DisplayError),
}

impl fmt::Display for RendererError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendererError::UnknownComponent(id) => write!(f, "unknown component {id}"),
            RendererError::UnknownHandler(id) => write!(f, "unknown event handler {id}"),
            RendererError::HandlerNotOwned { handler, component } => {
                write!(f, "event handler {handler} is not owned by component {component}")
            }
            RendererError::UnknownContinuation(token) => {
                write!(f, "unknown or already-consumed continuation {token}")
            }
            RendererError::NotARoot(id) => write!(f, "component {id} is not a root"),
            RendererError::Component(e) => write!(f, "{e}"),
            RendererError::Activation(e) => write!(f, "{e}"),
            RendererError::Display(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RendererError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RendererError::Component(e) => Some(e),
            RendererError::Activation(e) => Some(e),
            RendererError::Display(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ComponentError> for RendererError {
    fn from(e: ComponentError) -> Self {
        RendererError::Component(e)
    }
}

impl From<ActivationError> for RendererError {
    fn from(e: ActivationError) -> Self {
        RendererError::Activation(e)
    }
}

/// Outcome of an event dispatch.
#[derive(Debug)]
pub enum EventDispatch {
    /// The handler finished synchronously; any follow-up render is
    /// already committed.
    Completed,
    /// The handler suspended; the caller resumes through
    /// [`Renderer::resume_continuation`].
    Pending(ContinuationToken),
}

#[derive(Debug, Clone, Copy)]
struct PendingContinuation {
    component: ComponentId,
    phase: SuspendedPhase,
}

/// Component-tree orchestrator. See the module docs for the loop shape.
pub struct Renderer<S: DisplaySink> {
    registry: ComponentRegistry,
    arena: ComponentArena,
    handlers: HandlerRegistry,
    batch: BatchBuilder,
    builders: BuilderPool,
    sink: S,
    errors: Box<dyn ErrorSink>,
    store: Option<StateStore>,
    lifetime: BatchLifetime,
    render_queue: VecDeque<ComponentId>,
    disposal_queue: Vec<ComponentId>,
    after_render: Vec<(ComponentId, bool)>,
    continuations: HashMap<ContinuationToken, PendingContinuation>,
    next_token: u64,
    roots: Vec<ComponentId>,
    processing: bool,
}

impl<S: DisplaySink> Renderer<S> {
    pub fn new(registry: ComponentRegistry, sink: S) -> Self {
        Renderer {
            registry,
            arena: ComponentArena::new(),
            handlers: HandlerRegistry::new(),
            batch: BatchBuilder::new(),
            builders: BuilderPool::new(),
            sink,
            errors: Box::new(TracingErrorSink),
            store: None,
            lifetime: BatchLifetime::new(),
            render_queue: VecDeque::new(),
            disposal_queue: Vec::new(),
            after_render: Vec::new(),
            continuations: HashMap::new(),
            next_token: 0,
            roots: Vec::new(),
            processing: false,
        }
    }

    pub fn with_error_sink(mut self, errors: Box<dyn ErrorSink>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_state_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Read access to the component arena, mainly for assertions in
    /// hosts and tests.
    pub fn arena(&self) -> &ComponentArena {
        &self.arena
    }

    pub fn has_pending_continuations(&self) -> bool {
        !self.continuations.is_empty()
    }

    /// Persist component state for `scenario`. A no-op without a store.
    pub fn snapshot_state(&mut self, scenario: PersistScenario) -> StorageResult<()> {
        match self.store.as_mut() {
            Some(store) => store.snapshot(scenario),
            None => Ok(()),
        }
    }

    // ── Roots ───────────────────────────────────────────────────────────

    /// Create a root component instance. Nothing renders until
    /// [`Self::render_root`].
    pub fn attach_root(&mut self, type_id: ComponentTypeId) -> Result<ComponentId, RendererError> {
        let meta = self.registry.meta(type_id)?;
        let component = self.registry.instantiate(type_id)?;
        let id = self.arena.alloc(type_id, meta, None, Some(component));
        self.roots.push(id);
        tracing::debug!(root = id.0, type_id = type_id.0, "root attached");
        Ok(id)
    }

    /// Supply (or replace) a root's direct parameters. Retained so the
    /// root can re-render with the same parameters later.
    pub fn set_root_parameters(
        &mut self,
        id: ComponentId,
        params: Vec<(String, AttributeValue)>,
    ) -> Result<(), RendererError> {
        if !self.roots.contains(&id) {
            return Err(RendererError::NotARoot(id));
        }
        let state = self
            .arena
            .get_mut(id)
            .ok_or(RendererError::UnknownComponent(id))?;
        let mut builder = FrameBuilder::new();
        builder.open_component(0, state.type_id);
        for (i, (name, value)) in params.into_iter().enumerate() {
            builder.add_attribute(1 + i as u32, name, value);
        }
        builder.close_component();
        state.parameter_source = Some((builder.freeze(), 0));
        Ok(())
    }

    /// Run the root's parameter lifecycle and drain the render queue
    /// into one committed batch.
    pub fn render_root(&mut self, id: ComponentId) -> Result<(), RendererError> {
        if !self.roots.contains(&id) {
            return Err(RendererError::NotARoot(id));
        }
        let first = !self
            .arena
            .get(id)
            .ok_or(RendererError::UnknownComponent(id))?
            .flags
            .contains(StateFlags::INITIALIZED);
        if first {
            self.attach_and_set_parameters(id)
                .map_err(|e| self.abort_batch(e))?;
        } else {
            self.run_set_parameters(id).map_err(|e| self.abort_batch(e))?;
        }
        self.process_render_queue()
    }

    /// Dispose a root and its whole subtree, committing the removals.
    pub fn remove_root(&mut self, id: ComponentId) -> Result<(), RendererError> {
        if !self.roots.contains(&id) {
            return Err(RendererError::NotARoot(id));
        }
        self.disposal_queue.push(id);
        self.process_render_queue()
    }

    /// Component types changed underneath the renderer (hot reload):
    /// drop cached type metadata, refresh live states, and re-render
    /// every root.
    pub fn reset_types(&mut self) -> Result<(), RendererError> {
        self.registry.reset();
        let ids: Vec<ComponentId> = self.arena.ids().collect();
        for id in ids {
            let type_id = match self.arena.get(id) {
                Some(state) => state.type_id,
                None => continue,
            };
            if let Ok(meta) = self.registry.meta(type_id)
                && let Some(state) = self.arena.get_mut(id)
            {
                state.meta = meta;
            }
        }
        for root in self.roots.clone() {
            self.queue_render(root);
        }
        self.process_render_queue()
    }

    // ── Events ──────────────────────────────────────────────────────────

    /// Dispatch a UI event from the display sink. The handler id may be
    /// superseded; the replacement chain is followed. When the event
    /// carries a display-side value and the handler declares an
    /// updates-attribute marker, the committed tree is patched before
    /// the handler runs so the next diff does not fight the display.
    pub fn dispatch_event(
        &mut self,
        component_id: ComponentId,
        handler_id: HandlerId,
        args: EventArgs,
    ) -> Result<EventDispatch, RendererError> {
        let (latest, binding) = self
            .handlers
            .resolve(handler_id)
            .map(|(latest, binding)| (latest, binding.clone()))
            .ok_or(RendererError::UnknownHandler(handler_id))?;
        if binding.component != component_id {
            return Err(RendererError::HandlerNotOwned {
                handler: handler_id,
                component: component_id,
            });
        }
        let state = self
            .arena
            .get_mut(binding.component)
            .ok_or(RendererError::UnknownComponent(binding.component))?;
        if state.is_disposed() {
            return Err(RendererError::UnknownComponent(binding.component));
        }

        if let Some(value) = args.value.clone() {
            self.update_tree_to_match_display(latest, &value);
        }

        tracing::trace!(
            component = binding.component.0,
            handler = latest.0,
            binding = %binding.binding,
            "dispatching event"
        );
        let mut component = self
            .arena
            .get_mut(binding.component)
            .and_then(|s| s.component.take())
            .expect("component instance present outside hook calls");
        let outcome = {
            let mut ctx = LifecycleCtx::new(&mut self.next_token, self.store.as_mut());
            component.on_event(&binding.binding, &args, &mut ctx)
        };
        if let Some(state) = self.arena.get_mut(binding.component) {
            state.component = Some(component);
        }

        match outcome {
            Err(e) => Err(self.abort_batch(RendererError::Component(e))),
            Ok(HookOutcome::Done) => {
                self.queue_render(binding.component);
                self.process_render_queue()?;
                Ok(EventDispatch::Completed)
            }
            Ok(HookOutcome::Suspend(token)) => {
                self.continuations.insert(
                    token,
                    PendingContinuation {
                        component: binding.component,
                        phase: SuspendedPhase::Event,
                    },
                );
                // The synchronous phase completed; render it now, the
                // continuation renders again later.
                self.queue_render(binding.component);
                self.process_render_queue()?;
                Ok(EventDispatch::Pending(token))
            }
        }
    }

    /// Complete, cancel, or fail a suspended lifecycle phase. Tokens
    /// are single-use. A resume against a disposed component is
    /// silently dropped; cancellation suppresses the follow-up render.
    pub fn resume_continuation(
        &mut self,
        token: ContinuationToken,
        resume: Resume,
    ) -> Result<(), RendererError> {
        let pending = self
            .continuations
            .remove(&token)
            .ok_or(RendererError::UnknownContinuation(token))?;
        match resume {
            Resume::Cancel => Ok(()),
            Resume::Fail(e) => {
                self.errors.component_error(pending.component, &e);
                Ok(())
            }
            Resume::Complete(payload) => {
                let Some(state) = self.arena.get_mut(pending.component) else {
                    return Ok(());
                };
                if state.is_disposed() {
                    return Ok(());
                }
                let mut component = state
                    .component
                    .take()
                    .expect("component instance present outside hook calls");
                let outcome = {
                    let mut ctx = LifecycleCtx::new(&mut self.next_token, self.store.as_mut());
                    component.on_resume(pending.phase, payload, &mut ctx)
                };
                if let Some(state) = self.arena.get_mut(pending.component) {
                    state.component = Some(component);
                }
                match outcome {
                    Err(e) => {
                        // No caller owns this failure; route it to the
                        // sink and suppress the render.
                        self.errors.component_error(pending.component, &e);
                        Ok(())
                    }
                    Ok(HookOutcome::Done) => {
                        if let Err(e) = self.refresh_supply(pending.component) {
                            return Err(self.abort_batch(e));
                        }
                        self.queue_render(pending.component);
                        self.process_render_queue()
                    }
                    Ok(HookOutcome::Suspend(next)) => {
                        self.continuations.insert(next, pending);
                        Ok(())
                    }
                }
            }
        }
    }

    /// Patch the committed tree so the attribute a two-way-bound event
    /// updates reflects the display's own value. Returns whether a
    /// patch was applied.
    pub fn update_tree_to_match_display(&mut self, handler_id: HandlerId, value: &str) -> bool {
        let Some((latest, binding)) = self.handlers.resolve(handler_id) else {
            return false;
        };
        let component = binding.component;
        let marker_name = format!("{}{UPDATES_MARKER_SUFFIX}", binding.attribute);
        let Some(state) = self.arena.get_mut(component) else {
            return false;
        };

        let frames = Rc::make_mut(&mut state.current_frames);
        let Some(attr_index) = frames.iter().position(|f| {
            matches!(
                &f.body,
                FrameBody::Attribute {
                    value: AttributeValue::EventHandler {
                        handler_id: Some(h),
                        ..
                    },
                    ..
                } if *h == latest
            )
        }) else {
            return false;
        };

        // The marker and the bound attribute live in the same attribute
        // run as the event attribute.
        let mut run_start = attr_index;
        while run_start > 0 && frames[run_start - 1].is_attribute() {
            run_start -= 1;
        }
        let mut run_end = attr_index;
        while run_end < frames.len() && frames[run_end].is_attribute() {
            run_end += 1;
        }

        let Some(target) = frames[run_start..run_end].iter().find_map(|f| match &f.body {
            FrameBody::Attribute {
                name,
                value: AttributeValue::UpdatesAttribute(target),
            } if *name == marker_name => Some(target.clone()),
            _ => None,
        }) else {
            return false;
        };

        for frame in &mut frames[run_start..run_end] {
            if let FrameBody::Attribute { name, value: slot } = &mut frame.body
                && *name == target
            {
                tracing::trace!(component = component.0, attribute = %target, "tree patched to match display");
                *slot = AttributeValue::Text(value.to_string());
                return true;
            }
        }
        false
    }

    // ── Render loop ─────────────────────────────────────────────────────

    fn queue_render(&mut self, id: ComponentId) {
        let Some(state) = self.arena.get_mut(id) else {
            return;
        };
        if state.is_disposed() || state.flags.contains(StateFlags::RENDER_PENDING) {
            return;
        }
        state.flags.insert(StateFlags::RENDER_PENDING);
        self.render_queue.push_back(id);
    }

    /// Drain the render and disposal queues into one batch and commit
    /// it. Re-entrant calls return immediately; the outermost call
    /// drains everything.
    fn process_render_queue(&mut self) -> Result<(), RendererError> {
        if self.processing {
            return Ok(());
        }
        self.processing = true;
        let result = self.process_inner();
        self.processing = false;
        result.map_err(|e| self.abort_batch(e))
    }

    fn process_inner(&mut self) -> Result<(), RendererError> {
        let _span = tracing::debug_span!("render_pass").entered();
        loop {
            while let Some(id) = self.render_queue.pop_front() {
                self.render_component_in_batch(id)?;
            }
            if self.disposal_queue.is_empty() {
                break;
            }
            let batch = std::mem::take(&mut self.disposal_queue);
            for id in batch {
                self.dispose_component(id);
            }
        }

        if self.batch.is_empty() && self.after_render.is_empty() {
            return Ok(());
        }

        {
            let view = self.batch.to_batch();
            tracing::debug!(
                components = view.updated_components.len(),
                edits = view.edits.len(),
                disposed = view.disposed_components.len(),
                "committing batch"
            );
            self.sink.update_display(&view).map_err(RendererError::Display)?;
        }

        // Acknowledged: retire this batch's disposed handler ids, expire
        // the pass's parameter views, and notify renderers-completed.
        let disposed = self.batch.disposed_handlers().to_vec();
        self.handlers.queue_removals(&disposed);
        self.handlers.commit_removals();
        self.batch.clear();
        self.lifetime.expire();
        self.lifetime = BatchLifetime::new();

        for (id, first) in std::mem::take(&mut self.after_render) {
            if let Some(state) = self.arena.get_mut(id)
                && !state.is_disposed()
                && let Some(component) = state.component.as_mut()
            {
                component.on_after_render(first);
            }
        }
        Ok(())
    }

    fn render_component_in_batch(&mut self, id: ComponentId) -> Result<(), RendererError> {
        let Some(state) = self.arena.get_mut(id) else {
            return Ok(());
        };
        if state.is_disposed() || !state.flags.contains(StateFlags::RENDER_PENDING) {
            return Ok(());
        }
        state.flags.remove(StateFlags::RENDER_PENDING);
        state.flags.insert(StateFlags::RENDER_IN_PROGRESS);

        let component = state
            .component
            .take()
            .expect("component instance present outside hook calls");
        let mut builder = self.builders.acquire();
        component.render(&mut builder);
        builder.assert_closed();
        let old = {
            let state = self.arena.get_mut(id).expect("state checked above");
            state.component = Some(component);
            Rc::clone(&state.current_frames)
        };

        let mut host = RenderHost {
            arena: &mut self.arena,
            handlers: &mut self.handlers,
            registry: &self.registry,
            parent: id,
            new_children: Vec::new(),
            updated_children: Vec::new(),
            disposal_queue: &mut self.disposal_queue,
            activation_failure: None,
        };
        let edits = compute_diff(&mut host, &mut self.batch, id, &old, builder.frames_mut());
        let RenderHost {
            new_children,
            updated_children,
            activation_failure,
            ..
        } = host;
        self.batch.record_component(id, edits.range);

        let committed = builder.freeze();
        self.builders.release(builder);
        if let Some(e) = activation_failure {
            return Err(RendererError::Activation(e));
        }

        let state = self.arena.get_mut(id).expect("state checked above");
        state.current_frames = Rc::clone(&committed);
        let first = !state.flags.contains(StateFlags::HAS_RENDERED);
        state.flags.insert(StateFlags::HAS_RENDERED);
        state.flags.remove(StateFlags::RENDER_IN_PROGRESS);
        self.after_render.push((id, first));

        // Children created during the diff get parameters now, after the
        // parent's diff is complete, in the same batch.
        for (child, frame_index) in new_children {
            if let Some(child_state) = self.arena.get_mut(child) {
                child_state.parameter_source = Some((Rc::clone(&committed), frame_index));
            }
            self.attach_and_set_parameters(child)?;
        }
        for (child, frame_index, changed) in updated_children {
            if let Some(child_state) = self.arena.get_mut(child) {
                child_state.parameter_source = Some((Rc::clone(&committed), frame_index));
            }
            if changed {
                self.run_set_parameters(child)?;
            }
        }
        Ok(())
    }

    /// First parameters for a freshly instantiated component: resolve
    /// and subscribe its cascading parameters, then run init and the
    /// parameter lifecycle.
    fn attach_and_set_parameters(&mut self, id: ComponentId) -> Result<(), RendererError> {
        let resolved = find_cascading_parameters(&self.arena, id);
        for cascade in &resolved {
            let fixed = self
                .arena
                .get(cascade.supplier)
                .and_then(|s| s.slot.as_ref())
                .is_some_and(|slot| slot.fixed);
            if fixed {
                continue;
            }
            if let Some(supplier) = self.arena.get_mut(cascade.supplier)
                && let Some(slot) = supplier.slot.as_mut()
            {
                slot.subscribe(id);
                if let Some(state) = self.arena.get_mut(id) {
                    state.subscriptions.push(cascade.supplier);
                }
            }
        }
        if let Some(state) = self.arena.get_mut(id) {
            state.resolved_cascades = resolved;
        }
        self.run_set_parameters(id)
    }

    /// The ParametersSet phase: build a view, run `on_init` if it has
    /// not run, run `set_parameters`, refresh any supplied cascading
    /// value, and queue a render.
    fn run_set_parameters(&mut self, id: ComponentId) -> Result<(), RendererError> {
        let view = self.build_view(id)?;
        let Some(state) = self.arena.get_mut(id) else {
            return Ok(());
        };
        if state.is_disposed() {
            return Ok(());
        }
        let needs_init = !state.flags.contains(StateFlags::INITIALIZED);
        state.flags.insert(StateFlags::INITIALIZED);
        let mut component = state
            .component
            .take()
            .expect("component instance present outside hook calls");

        let (init_outcome, params_outcome) = {
            let mut ctx = LifecycleCtx::new(&mut self.next_token, self.store.as_mut());
            let init = if needs_init {
                Some(component.on_init(&mut ctx))
            } else {
                None
            };
            let params = match &init {
                Some(Err(_)) => None,
                _ => Some(component.set_parameters(&view, &mut ctx)),
            };
            (init, params)
        };
        if let Some(state) = self.arena.get_mut(id) {
            state.component = Some(component);
        }

        if let Some(Ok(HookOutcome::Suspend(token))) = init_outcome {
            self.continuations.insert(
                token,
                PendingContinuation {
                    component: id,
                    phase: SuspendedPhase::Init,
                },
            );
        }
        if let Some(Err(e)) = init_outcome {
            return Err(RendererError::Component(e));
        }
        match params_outcome {
            Some(Err(e)) => return Err(RendererError::Component(e)),
            Some(Ok(HookOutcome::Suspend(token))) => {
                self.continuations.insert(
                    token,
                    PendingContinuation {
                        component: id,
                        phase: SuspendedPhase::SetParameters,
                    },
                );
            }
            _ => {}
        }

        self.refresh_supply(id)?;
        self.queue_render(id);
        Ok(())
    }

    /// Sync a supplier's slot with the value its component currently
    /// supplies, notifying subscribers on change. Fixed slots neither
    /// notify nor tolerate identity changes.
    fn refresh_supply(&mut self, id: ComponentId) -> Result<(), RendererError> {
        let Some(state) = self.arena.get(id) else {
            return Ok(());
        };
        let Some(decl) = state.meta.supplies.clone() else {
            return Ok(());
        };
        let new_value = state
            .component
            .as_ref()
            .and_then(|c| c.cascading_value());

        let state = self.arena.get_mut(id).expect("state checked above");
        let notify: Vec<ComponentId> = match state.slot.as_mut() {
            None => {
                state.slot = Some(CascadingSlot {
                    value_type: decl.value_type,
                    name: decl.name.clone(),
                    fixed: decl.fixed,
                    value: new_value,
                    subscribers: SmallVec::new(),
                });
                Vec::new()
            }
            Some(slot) => {
                if slot.fixed {
                    assert!(
                        slot.name == decl.name && decl.fixed,
                        "fixed cascading value on component {id} cannot change its name or fixedness"
                    );
                    slot.value = new_value;
                    Vec::new()
                } else {
                    assert!(
                        !decl.fixed,
                        "cascading value on component {id} cannot become fixed after first render"
                    );
                    slot.name = decl.name.clone();
                    let changed = !same_value(&slot.value, &new_value);
                    if changed {
                        slot.value = new_value;
                        slot.subscribers.to_vec()
                    } else {
                        Vec::new()
                    }
                }
            }
        };

        for subscriber in notify {
            // Synchronous notification: the subscriber re-enters its
            // ParametersSet phase and queues its own render.
            self.run_set_parameters(subscriber)?;
        }
        Ok(())
    }

    fn build_view(&self, id: ComponentId) -> Result<ParameterView, RendererError> {
        let state = self
            .arena
            .get(id)
            .ok_or(RendererError::UnknownComponent(id))?;
        let (frames, owner_index) = match &state.parameter_source {
            Some((frames, index)) => (Rc::clone(frames), *index),
            None => (Rc::new(Vec::new()), 0),
        };
        let cascading = state
            .resolved_cascades
            .iter()
            .map(|cascade| CascadingEntry {
                name: cascade.parameter_name.clone(),
                value: self
                    .arena
                    .get(cascade.supplier)
                    .and_then(|s| s.slot.as_ref())
                    .and_then(|slot| slot.value.clone()),
            })
            .collect();
        Ok(ParameterView::new(self.lifetime.clone(), frames, owner_index)
            .with_cascading(cascading))
    }

    /// Dispose one component: unsubscribe, run `on_dispose`, queue
    /// descendant disposals through its committed tree, and drop the
    /// record. Further render requests for the id are dropped.
    fn dispose_component(&mut self, id: ComponentId) {
        let Some(state) = self.arena.get_mut(id) else {
            return;
        };
        state.flags.insert(StateFlags::DISPOSED);
        let subscriptions = std::mem::take(&mut state.subscriptions);
        let current = Rc::clone(&state.current_frames);
        let mut component = state.component.take();

        for supplier in subscriptions {
            if let Some(supplier_state) = self.arena.get_mut(supplier)
                && let Some(slot) = supplier_state.slot.as_mut()
            {
                slot.unsubscribe(id);
            }
        }
        if let Some(component) = component.as_mut() {
            component.on_dispose();
        }

        let mut host = DisposalHost {
            queue: &mut self.disposal_queue,
        };
        dispose_frames(&mut host, &mut self.batch, &current);
        self.batch.push_disposed_component(id);

        self.arena.remove(id);
        self.roots.retain(|root| *root != id);
        self.continuations.retain(|_, pending| pending.component != id);
        tracing::debug!(component = id.0, "component disposed");
    }

    /// A synchronous failure: nothing from this batch may reach the
    /// sink. Drop the batch, the queues, and the pending notifications.
    fn abort_batch(&mut self, error: RendererError) -> RendererError {
        tracing::warn!(error = %error, "render batch aborted");
        for id in self.render_queue.drain(..) {
            if let Some(state) = self.arena.get_mut(id) {
                state.flags.remove(StateFlags::RENDER_PENDING);
            }
        }
        self.disposal_queue.clear();
        self.after_render.clear();
        self.batch.clear();
        self.handlers.abandon_removals();
        error
    }
}

fn same_value(a: &Option<Rc<dyn std::any::Any>>, b: &Option<Rc<dyn std::any::Any>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// Diff-host implementation for one component's render.
struct RenderHost<'a> {
    arena: &'a mut ComponentArena,
    handlers: &'a mut HandlerRegistry,
    registry: &'a ComponentRegistry,
    parent: ComponentId,
    /// Children instantiated during this diff, with their frame index
    /// in the parent's new tree.
    new_children: Vec<(ComponentId, usize)>,
    /// Retained children, with whether their direct parameters changed.
    updated_children: Vec<(ComponentId, usize, bool)>,
    disposal_queue: &'a mut Vec<ComponentId>,
    /// First activation failure; the renderer aborts the batch with it
    /// after the diff returns.
    activation_failure: Option<ActivationError>,
}

impl DiffHost for RenderHost<'_> {
    fn instantiate_component(
        &mut self,
        type_id: ComponentTypeId,
        frame_index: usize,
    ) -> ComponentId {
        let meta = match self.registry.meta(type_id) {
            Ok(meta) => meta,
            Err(e) => {
                let placeholder = self.arena.alloc(
                    type_id,
                    Rc::new(crate::registry::ComponentMeta::new("<unknown>")),
                    Some(self.parent),
                    None,
                );
                if let Some(state) = self.arena.get_mut(placeholder) {
                    state.flags.insert(StateFlags::DISPOSED);
                }
                self.activation_failure.get_or_insert(e);
                return placeholder;
            }
        };
        match self.registry.instantiate(type_id) {
            Ok(component) => {
                let id = self
                    .arena
                    .alloc(type_id, meta, Some(self.parent), Some(component));
                self.new_children.push((id, frame_index));
                id
            }
            Err(e) => {
                let id = self.arena.alloc(type_id, meta, Some(self.parent), None);
                if let Some(state) = self.arena.get_mut(id) {
                    state.flags.insert(StateFlags::DISPOSED);
                }
                self.activation_failure.get_or_insert(e);
                id
            }
        }
    }

    fn update_retained_component(
        &mut self,
        component_id: ComponentId,
        frame_index: usize,
        parameters_changed: bool,
    ) {
        self.updated_children
            .push((component_id, frame_index, parameters_changed));
    }

    fn assign_handler_id(&mut self, attribute_name: &str, binding: &str) -> HandlerId {
        self.handlers.assign(self.parent, attribute_name, binding)
    }

    fn track_replaced_handler(&mut self, old: HandlerId, new: HandlerId) {
        self.handlers.track_replaced(old, new);
    }

    fn queue_component_disposal(&mut self, component_id: ComponentId) {
        self.disposal_queue.push(component_id);
    }
}

/// Diff-host used when cascading disposals through a dead component's
/// tree; only disposal callbacks are ever reachable.
struct DisposalHost<'a> {
    queue: &'a mut Vec<ComponentId>,
}

impl DiffHost for DisposalHost<'_> {
    fn instantiate_component(&mut self, _: ComponentTypeId, _: usize) -> ComponentId {
        unreachable!("disposal never instantiates components")
    }

    fn update_retained_component(&mut self, _: ComponentId, _: usize, _: bool) {
        unreachable!("disposal never retains components")
    }

    fn assign_handler_id(&mut self, _: &str, _: &str) -> HandlerId {
        unreachable!("disposal never assigns handler ids")
    }

    fn track_replaced_handler(&mut self, _: HandlerId, _: HandlerId) {
        unreachable!("disposal never replaces handlers")
    }

    fn queue_component_disposal(&mut self, component_id: ComponentId) {
        self.queue.push(component_id);
    }
}
