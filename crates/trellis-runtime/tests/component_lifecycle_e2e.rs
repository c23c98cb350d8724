//! Component Lifecycle E2E Tests
//!
//! End-to-end validation of the render loop: attach, parameters, diff,
//! commit, events, continuations, and disposal, observed through a
//! recording display sink.
//!
//! # Running Tests
//!
//! ```sh
//! cargo test -p trellis-runtime --test component_lifecycle_e2e
//! ```

#![cfg(test)]

use std::cell::RefCell;
use std::rc::Rc;
use trellis_runtime::{
    Component, ComponentError, DisplayError, DisplaySink, ErrorSink, EventArgs, EventDispatch,
    HookOutcome, LifecycleCtx, ParameterView, Renderer, RendererError, Resume, SuspendedPhase,
};
use trellis_runtime::{ComponentMeta, ComponentRegistry};
use trellis_tree::{
    AttributeValue, ComponentId, ComponentTypeId, Edit, Frame, FrameBody, FrameBuilder, HandlerId,
    RenderBatch,
};

// ============================================================================
// Test Utilities
// ============================================================================

type SharedLog = Rc<RefCell<Vec<String>>>;

fn log(log: &SharedLog, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
}

/// One committed batch, copied out of the borrowed view.
struct CommittedBatch {
    updated: Vec<ComponentId>,
    edits: Vec<Edit>,
    reference_frames: Vec<Frame>,
    disposed_components: Vec<ComponentId>,
    disposed_handlers: Vec<HandlerId>,
}

#[derive(Default)]
struct RecordingSink {
    batches: Vec<CommittedBatch>,
    reject_next: bool,
}

impl RecordingSink {
    fn last(&self) -> &CommittedBatch {
        self.batches.last().expect("at least one committed batch")
    }

    /// First event-handler id appearing in the last batch's reference
    /// frames.
    fn last_handler_id(&self) -> HandlerId {
        self.last()
            .reference_frames
            .iter()
            .find_map(|f| match &f.body {
                FrameBody::Attribute {
                    value:
                        AttributeValue::EventHandler {
                            handler_id: Some(id),
                            ..
                        },
                    ..
                } => Some(*id),
                _ => None,
            })
            .expect("batch contains an event-handler frame")
    }
}

impl DisplaySink for RecordingSink {
    fn update_display(&mut self, batch: &RenderBatch<'_>) -> Result<(), DisplayError> {
        if self.reject_next {
            self.reject_next = false;
            return Err(DisplayError::new("rejected by test"));
        }
        self.batches.push(CommittedBatch {
            updated: batch
                .updated_components
                .iter()
                .map(|c| c.component_id)
                .collect(),
            edits: batch.edits.to_vec(),
            reference_frames: batch.reference_frames.to_vec(),
            disposed_components: batch.disposed_components.to_vec(),
            disposed_handlers: batch.disposed_handlers.to_vec(),
        });
        Ok(())
    }
}

#[derive(Default)]
struct RecordingErrors {
    errors: Rc<RefCell<Vec<(ComponentId, String)>>>,
}

impl ErrorSink for RecordingErrors {
    fn component_error(&mut self, component: ComponentId, error: &ComponentError) {
        self.errors.borrow_mut().push((component, error.to_string()));
    }
}

const LABEL: ComponentTypeId = ComponentTypeId(1);
const PANEL: ComponentTypeId = ComponentTypeId(2);
const COUNTER: ComponentTypeId = ComponentTypeId(3);
const TOGGLE: ComponentTypeId = ComponentTypeId(4);
const LOADER: ComponentTypeId = ComponentTypeId(5);
const INPUT: ComponentTypeId = ComponentTypeId(6);
const LIST: ComponentTypeId = ComponentTypeId(7);
const ITEM: ComponentTypeId = ComponentTypeId(8);
const KEEPER: ComponentTypeId = ComponentTypeId(9);

/// Leaf that renders a `text` parameter and logs its lifecycle.
struct Label {
    events: SharedLog,
    text: String,
}

impl Component for Label {
    fn on_init(&mut self, _ctx: &mut LifecycleCtx<'_>) -> Result<HookOutcome, ComponentError> {
        log(&self.events, "label:init");
        Ok(HookOutcome::Done)
    }

    fn set_parameters(
        &mut self,
        params: &ParameterView,
        _ctx: &mut LifecycleCtx<'_>,
    ) -> Result<HookOutcome, ComponentError> {
        self.text = params.get_text("text")?.unwrap_or_default();
        log(&self.events, format!("label:params {}", self.text));
        Ok(HookOutcome::Done)
    }

    fn render(&self, builder: &mut FrameBuilder) {
        builder.open_element(0, "span");
        builder.add_text(1, &self.text);
        builder.close_element();
    }

    fn on_after_render(&mut self, first_render: bool) {
        log(&self.events, format!("label:after_render {first_render}"));
    }

    fn on_dispose(&mut self) {
        log(&self.events, "label:dispose");
    }
}

/// Parent that conditionally renders a [`Label`] child whose text is
/// controlled from outside through shared cells.
struct Panel {
    child_text: Rc<RefCell<String>>,
    show_child: Rc<RefCell<bool>>,
}

impl Component for Panel {
    fn render(&self, builder: &mut FrameBuilder) {
        builder.open_element(0, "div");
        if *self.show_child.borrow() {
            builder.open_component(1, LABEL);
            builder.add_attribute(
                2,
                "text",
                AttributeValue::Text(self.child_text.borrow().clone()),
            );
            builder.close_component();
        }
        builder.close_element();
    }
}

fn registry_with_panel(events: SharedLog) -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register(
        LABEL,
        || ComponentMeta::new("Label"),
        move || {
            Ok(Box::new(Label {
                events: events.clone(),
                text: String::new(),
            }))
        },
    );
    registry
}

// ============================================================================
// 1. Attach / Render / Commit
// ============================================================================

/// A root renders, its child is instantiated in the same batch, and the
/// child receives parameters before the batch commits.
#[test]
fn first_render_instantiates_child_in_same_batch() {
    let events: SharedLog = Rc::default();
    let child_text = Rc::new(RefCell::new("hello".to_owned()));
    let show_child = Rc::new(RefCell::new(true));
    let mut registry = registry_with_panel(events.clone());
    {
        let (child_text, show_child) = (child_text.clone(), show_child.clone());
        registry.register(
            PANEL,
            || ComponentMeta::new("Panel"),
            move || {
                Ok(Box::new(Panel {
                    child_text: child_text.clone(),
                    show_child: show_child.clone(),
                }))
            },
        );
    }

    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(PANEL).unwrap();
    renderer.render_root(root).unwrap();

    assert_eq!(renderer.sink().batches.len(), 1, "one batch per pass");
    let batch = renderer.sink().last();
    assert_eq!(batch.updated.len(), 2, "root and child both rendered");
    assert!(batch.updated.contains(&root));
    assert_eq!(
        *events.borrow(),
        vec![
            "label:init",
            "label:params hello",
            "label:after_render true"
        ]
    );
}

/// Re-rendering with changed child parameters re-runs only the child's
/// parameter lifecycle and updates its text in place.
#[test]
fn child_parameter_change_updates_text() {
    let events: SharedLog = Rc::default();
    let child_text = Rc::new(RefCell::new("hello".to_owned()));
    let show_child = Rc::new(RefCell::new(true));
    let mut registry = registry_with_panel(events.clone());
    {
        let (child_text, show_child) = (child_text.clone(), show_child.clone());
        registry.register(
            PANEL,
            || ComponentMeta::new("Panel"),
            move || {
                Ok(Box::new(Panel {
                    child_text: child_text.clone(),
                    show_child: show_child.clone(),
                }))
            },
        );
    }

    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(PANEL).unwrap();
    renderer.render_root(root).unwrap();
    events.borrow_mut().clear();

    *child_text.borrow_mut() = "updated".to_owned();
    renderer.render_root(root).unwrap();

    assert_eq!(renderer.sink().batches.len(), 2);
    let batch = renderer.sink().last();
    assert!(
        batch
            .edits
            .iter()
            .any(|e| matches!(e, Edit::UpdateText { .. })),
        "child text change reaches the display as an UpdateText"
    );
    assert!(events.borrow().contains(&"label:params updated".to_owned()));
    assert!(
        !events.borrow().contains(&"label:init".to_owned()),
        "retained child does not re-init"
    );
    assert!(
        events
            .borrow()
            .contains(&"label:after_render false".to_owned())
    );
}

/// Re-rendering with identical child parameters skips the child's
/// parameter lifecycle entirely.
#[test]
fn unchanged_child_parameters_skip_set_parameters() {
    let events: SharedLog = Rc::default();
    let child_text = Rc::new(RefCell::new("hello".to_owned()));
    let show_child = Rc::new(RefCell::new(true));
    let mut registry = registry_with_panel(events.clone());
    {
        let (child_text, show_child) = (child_text.clone(), show_child.clone());
        registry.register(
            PANEL,
            || ComponentMeta::new("Panel"),
            move || {
                Ok(Box::new(Panel {
                    child_text: child_text.clone(),
                    show_child: show_child.clone(),
                }))
            },
        );
    }

    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(PANEL).unwrap();
    renderer.render_root(root).unwrap();
    events.borrow_mut().clear();

    renderer.render_root(root).unwrap();

    assert!(
        !events.borrow().iter().any(|e| e.starts_with("label:params")),
        "identical parameters do not re-enter set_parameters"
    );
}

// ============================================================================
// 2. Disposal
// ============================================================================

/// Removing a child from the render output disposes it, reports it in
/// the batch, and runs its dispose hook after unsubscription.
#[test]
fn removed_child_is_disposed() {
    let events: SharedLog = Rc::default();
    let child_text = Rc::new(RefCell::new("hello".to_owned()));
    let show_child = Rc::new(RefCell::new(true));
    let mut registry = registry_with_panel(events.clone());
    {
        let (child_text, show_child) = (child_text.clone(), show_child.clone());
        registry.register(
            PANEL,
            || ComponentMeta::new("Panel"),
            move || {
                Ok(Box::new(Panel {
                    child_text: child_text.clone(),
                    show_child: show_child.clone(),
                }))
            },
        );
    }

    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(PANEL).unwrap();
    renderer.render_root(root).unwrap();
    assert_eq!(renderer.arena().len(), 2);

    *show_child.borrow_mut() = false;
    renderer.render_root(root).unwrap();

    let batch = renderer.sink().last();
    assert_eq!(batch.disposed_components.len(), 1);
    assert!(batch
        .edits
        .iter()
        .any(|e| matches!(e, Edit::RemoveFrame { .. })));
    assert!(events.borrow().contains(&"label:dispose".to_owned()));
    assert_eq!(renderer.arena().len(), 1, "child record dropped");
}

/// Removing a root disposes its whole subtree in one committed batch.
#[test]
fn remove_root_disposes_subtree() {
    let events: SharedLog = Rc::default();
    let child_text = Rc::new(RefCell::new("hello".to_owned()));
    let show_child = Rc::new(RefCell::new(true));
    let mut registry = registry_with_panel(events.clone());
    {
        let (child_text, show_child) = (child_text.clone(), show_child.clone());
        registry.register(
            PANEL,
            || ComponentMeta::new("Panel"),
            move || {
                Ok(Box::new(Panel {
                    child_text: child_text.clone(),
                    show_child: show_child.clone(),
                }))
            },
        );
    }

    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(PANEL).unwrap();
    renderer.render_root(root).unwrap();

    renderer.remove_root(root).unwrap();

    let batch = renderer.sink().last();
    assert_eq!(batch.disposed_components.len(), 2);
    assert!(renderer.arena().is_empty());
    assert!(matches!(
        renderer.render_root(root),
        Err(RendererError::NotARoot(_))
    ));
}

// ============================================================================
// 3. Events and Handlers
// ============================================================================

/// Counter that re-renders its count on a click binding.
#[derive(Default)]
struct Counter {
    count: u32,
}

impl Component for Counter {
    fn render(&self, builder: &mut FrameBuilder) {
        builder.open_element(0, "button");
        builder.add_event(1, "onclick", "increment");
        builder.add_text(2, self.count.to_string());
        builder.close_element();
    }

    fn on_event(
        &mut self,
        binding: &str,
        _args: &EventArgs,
        _ctx: &mut LifecycleCtx<'_>,
    ) -> Result<HookOutcome, ComponentError> {
        match binding {
            "increment" => {
                self.count += 1;
                Ok(HookOutcome::Done)
            }
            other => Err(ComponentError::Hook(format!("unknown binding {other}"))),
        }
    }
}

#[test]
fn event_dispatch_renders_and_commits() {
    let mut registry = ComponentRegistry::new();
    registry.register_default::<Counter>(COUNTER, || ComponentMeta::new("Counter"));
    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(COUNTER).unwrap();
    renderer.render_root(root).unwrap();
    let handler = renderer.sink().last_handler_id();

    let outcome = renderer
        .dispatch_event(root, handler, EventArgs::none())
        .unwrap();
    assert!(matches!(outcome, EventDispatch::Completed));

    let batch = renderer.sink().last();
    assert!(batch
        .edits
        .iter()
        .any(|e| matches!(e, Edit::UpdateText { .. })));
    // The handler binding did not change; its id survives the pass.
    assert!(batch.disposed_handlers.is_empty());
    assert!(renderer
        .dispatch_event(root, handler, EventArgs::none())
        .is_ok());
}

#[test]
fn dispatch_against_unknown_handler_fails() {
    let mut registry = ComponentRegistry::new();
    registry.register_default::<Counter>(COUNTER, || ComponentMeta::new("Counter"));
    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(COUNTER).unwrap();
    renderer.render_root(root).unwrap();

    assert!(matches!(
        renderer.dispatch_event(root, HandlerId(999), EventArgs::none()),
        Err(RendererError::UnknownHandler(HandlerId(999)))
    ));
}

#[test]
fn dispatch_against_wrong_component_fails() {
    let mut registry = ComponentRegistry::new();
    registry.register_default::<Counter>(COUNTER, || ComponentMeta::new("Counter"));
    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(COUNTER).unwrap();
    let other = renderer.attach_root(COUNTER).unwrap();
    renderer.render_root(root).unwrap();
    let handler = renderer.sink().last_handler_id();

    assert!(matches!(
        renderer.dispatch_event(other, handler, EventArgs::none()),
        Err(RendererError::HandlerNotOwned { .. })
    ));
}

/// Toggle whose event binding label changes with its state, forcing a
/// handler replacement on every click.
#[derive(Default)]
struct Toggle {
    on: bool,
}

impl Component for Toggle {
    fn render(&self, builder: &mut FrameBuilder) {
        builder.open_element(0, "button");
        builder.add_event(1, "onclick", if self.on { "turn-off" } else { "turn-on" });
        builder.close_element();
    }

    fn on_event(
        &mut self,
        _binding: &str,
        _args: &EventArgs,
        _ctx: &mut LifecycleCtx<'_>,
    ) -> Result<HookOutcome, ComponentError> {
        self.on = !self.on;
        Ok(HookOutcome::Done)
    }
}

/// A changed binding replaces the handler: the batch carries the
/// replacement attribute and retires the old id once acknowledged.
#[test]
fn changed_binding_replaces_handler_and_retires_old_id() {
    let mut registry = ComponentRegistry::new();
    registry.register_default::<Toggle>(TOGGLE, || ComponentMeta::new("Toggle"));
    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(TOGGLE).unwrap();
    renderer.render_root(root).unwrap();
    let first = renderer.sink().last_handler_id();

    renderer.dispatch_event(root, first, EventArgs::none()).unwrap();

    let batch = renderer.sink().last();
    assert!(batch
        .edits
        .iter()
        .any(|e| matches!(e, Edit::SetAttribute { .. })));
    assert_eq!(batch.disposed_handlers, vec![first]);
    let second = renderer.sink().last_handler_id();
    assert_ne!(first, second);

    // The old id is retired; only the replacement dispatches.
    assert!(matches!(
        renderer.dispatch_event(root, first, EventArgs::none()),
        Err(RendererError::UnknownHandler(_))
    ));
    renderer
        .dispatch_event(root, second, EventArgs::none())
        .unwrap();
}

// ============================================================================
// 4. Continuations
// ============================================================================

/// Loads a value through a suspended event phase.
#[derive(Default)]
struct LoaderButton {
    value: Option<u32>,
}

impl Component for LoaderButton {
    fn render(&self, builder: &mut FrameBuilder) {
        builder.open_element(0, "button");
        builder.add_event(1, "onclick", "load");
        match self.value {
            Some(v) => builder.add_text(2, format!("loaded {v}")),
            None => builder.add_text(2, "idle"),
        }
        builder.close_element();
    }

    fn on_event(
        &mut self,
        _binding: &str,
        _args: &EventArgs,
        ctx: &mut LifecycleCtx<'_>,
    ) -> Result<HookOutcome, ComponentError> {
        Ok(HookOutcome::Suspend(ctx.suspend()))
    }

    fn on_resume(
        &mut self,
        phase: SuspendedPhase,
        payload: Box<dyn std::any::Any>,
        _ctx: &mut LifecycleCtx<'_>,
    ) -> Result<HookOutcome, ComponentError> {
        assert_eq!(phase, SuspendedPhase::Event);
        self.value = payload.downcast::<u32>().ok().map(|v| *v);
        Ok(HookOutcome::Done)
    }
}

fn loader_button_renderer() -> (Renderer<RecordingSink>, ComponentId, HandlerId) {
    let mut registry = ComponentRegistry::new();
    registry.register_default::<LoaderButton>(LOADER, || ComponentMeta::new("LoaderButton"));
    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(LOADER).unwrap();
    renderer.render_root(root).unwrap();
    let handler = renderer.sink().last_handler_id();
    (renderer, root, handler)
}

#[test]
fn suspended_event_completes_through_continuation() {
    let (mut renderer, root, handler) = loader_button_renderer();

    let token = match renderer.dispatch_event(root, handler, EventArgs::none()).unwrap() {
        EventDispatch::Pending(token) => token,
        other => panic!("expected pending dispatch, got {other:?}"),
    };
    assert!(renderer.has_pending_continuations());

    renderer
        .resume_continuation(token, Resume::Complete(Box::new(7u32)))
        .unwrap();

    assert!(!renderer.has_pending_continuations());
    let batch = renderer.sink().last();
    let loaded = batch.reference_frames.iter().any(|f| {
        matches!(&f.body, FrameBody::Text { content } if content == "loaded 7")
    });
    assert!(loaded, "resumed value reaches the display");

    // Tokens are single-use.
    assert!(matches!(
        renderer.resume_continuation(token, Resume::Cancel),
        Err(RendererError::UnknownContinuation(_))
    ));
}

#[test]
fn cancelled_continuation_renders_nothing() {
    let (mut renderer, root, handler) = loader_button_renderer();
    let before = renderer.sink().batches.len();

    let token = match renderer.dispatch_event(root, handler, EventArgs::none()).unwrap() {
        EventDispatch::Pending(token) => token,
        other => panic!("expected pending dispatch, got {other:?}"),
    };
    let after_dispatch = renderer.sink().batches.len();
    renderer.resume_continuation(token, Resume::Cancel).unwrap();

    assert_eq!(
        renderer.sink().batches.len(),
        after_dispatch,
        "cancellation commits no batch"
    );
    assert!(renderer.sink().batches.len() >= before);
}

#[test]
fn failed_continuation_reaches_the_error_sink() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let mut registry = ComponentRegistry::new();
    registry.register_default::<LoaderButton>(LOADER, || ComponentMeta::new("LoaderButton"));
    let mut renderer = Renderer::new(registry, RecordingSink::default()).with_error_sink(
        Box::new(RecordingErrors {
            errors: errors.clone(),
        }),
    );
    let root = renderer.attach_root(LOADER).unwrap();
    renderer.render_root(root).unwrap();
    let handler = renderer.sink().last_handler_id();

    let token = match renderer.dispatch_event(root, handler, EventArgs::none()).unwrap() {
        EventDispatch::Pending(token) => token,
        other => panic!("expected pending dispatch, got {other:?}"),
    };
    renderer
        .resume_continuation(token, Resume::Fail(ComponentError::Hook("load failed".into())))
        .unwrap();

    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, root);
    assert!(errors[0].1.contains("load failed"));
}

// ============================================================================
// 5. Two-way Binding
// ============================================================================

/// Input whose `onchange` event carries the display's value back into
/// its `value` attribute through an updates-attribute marker.
#[derive(Default)]
struct Input {
    value: String,
}

impl Component for Input {
    fn render(&self, builder: &mut FrameBuilder) {
        builder.open_element(0, "input");
        builder.add_attribute(1, "value", AttributeValue::Text(self.value.clone()));
        builder.add_event(2, "onchange", "change");
        builder.add_attribute(
            3,
            "onchange.updates",
            AttributeValue::UpdatesAttribute("value".to_owned()),
        );
        builder.close_element();
    }

    fn on_event(
        &mut self,
        _binding: &str,
        args: &EventArgs,
        _ctx: &mut LifecycleCtx<'_>,
    ) -> Result<HookOutcome, ComponentError> {
        if let Some(value) = &args.value {
            self.value = value.clone();
        }
        Ok(HookOutcome::Done)
    }
}

/// The committed tree is patched before the handler runs, so the
/// follow-up render produces no attribute echo for the bound value.
#[test]
fn two_way_binding_suppresses_attribute_echo() {
    let mut registry = ComponentRegistry::new();
    registry.register_default::<Input>(INPUT, || ComponentMeta::new("Input"));
    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(INPUT).unwrap();
    renderer.render_root(root).unwrap();
    let handler = renderer.sink().last_handler_id();

    renderer
        .dispatch_event(root, handler, EventArgs::with_value("typed"))
        .unwrap();

    let batch = renderer.sink().last();
    assert!(
        !batch
            .edits
            .iter()
            .any(|e| matches!(e, Edit::SetAttribute { .. })),
        "display-originated value is not echoed back"
    );
}

/// Input that normalizes what the display sent. The patch makes the
/// committed tree match the display, so the normalized value comes back
/// as a real attribute correction.
#[derive(Default)]
struct UppercaseInput {
    value: String,
}

impl Component for UppercaseInput {
    fn render(&self, builder: &mut FrameBuilder) {
        builder.open_element(0, "input");
        builder.add_attribute(1, "value", AttributeValue::Text(self.value.clone()));
        builder.add_event(2, "onchange", "change");
        builder.add_attribute(
            3,
            "onchange.updates",
            AttributeValue::UpdatesAttribute("value".to_owned()),
        );
        builder.close_element();
    }

    fn on_event(
        &mut self,
        _binding: &str,
        args: &EventArgs,
        _ctx: &mut LifecycleCtx<'_>,
    ) -> Result<HookOutcome, ComponentError> {
        if let Some(value) = &args.value {
            self.value = value.to_uppercase();
        }
        Ok(HookOutcome::Done)
    }
}

#[test]
fn transformed_value_corrects_the_display() {
    let mut registry = ComponentRegistry::new();
    registry.register_default::<UppercaseInput>(INPUT, || ComponentMeta::new("UppercaseInput"));
    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(INPUT).unwrap();
    renderer.render_root(root).unwrap();
    let handler = renderer.sink().last_handler_id();

    renderer
        .dispatch_event(root, handler, EventArgs::with_value("typed"))
        .unwrap();

    let batch = renderer.sink().last();
    assert!(
        batch
            .edits
            .iter()
            .any(|e| matches!(e, Edit::SetAttribute { .. })),
        "normalized value goes back to the display"
    );
}

// ============================================================================
// 6. Keyed Children
// ============================================================================

/// Parent rendering one keyed child component per entry.
struct List {
    keys: Rc<RefCell<Vec<i64>>>,
}

impl Component for List {
    fn render(&self, builder: &mut FrameBuilder) {
        for &k in self.keys.borrow().iter() {
            builder.open_component(0, ITEM);
            builder.set_key(k.into());
            builder.add_attribute(1, "label", AttributeValue::Text(k.to_string()));
            builder.close_component();
        }
    }
}

#[derive(Default)]
struct Item {
    label: String,
}

impl Component for Item {
    fn set_parameters(
        &mut self,
        params: &ParameterView,
        _ctx: &mut LifecycleCtx<'_>,
    ) -> Result<HookOutcome, ComponentError> {
        self.label = params.get_text("label")?.unwrap_or_default();
        Ok(HookOutcome::Done)
    }

    fn render(&self, builder: &mut FrameBuilder) {
        builder.open_element(0, "li");
        builder.add_text(1, &self.label);
        builder.close_element();
    }
}

/// Reordering keyed children moves them instead of reinstantiating.
#[test]
fn keyed_reorder_preserves_component_instances() {
    let keys = Rc::new(RefCell::new(vec![1i64, 2, 3]));
    let instantiated = Rc::new(RefCell::new(0usize));
    let mut registry = ComponentRegistry::new();
    {
        let keys = keys.clone();
        registry.register(
            LIST,
            || ComponentMeta::new("List"),
            move || Ok(Box::new(List { keys: keys.clone() })),
        );
    }
    {
        let instantiated = instantiated.clone();
        registry.register(
            ITEM,
            || ComponentMeta::new("Item"),
            move || {
                *instantiated.borrow_mut() += 1;
                Ok(Box::new(Item::default()))
            },
        );
    }

    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(LIST).unwrap();
    renderer.render_root(root).unwrap();
    assert_eq!(*instantiated.borrow(), 3);

    *keys.borrow_mut() = vec![3, 1, 2];
    renderer.render_root(root).unwrap();

    assert_eq!(*instantiated.borrow(), 3, "reorder instantiates nothing");
    let batch = renderer.sink().last();
    assert!(batch
        .edits
        .iter()
        .any(|e| matches!(e, Edit::PermutationListEntry { .. })));
    assert!(batch.edits.contains(&Edit::PermutationListEnd));
    assert!(batch.disposed_components.is_empty());
}

// ============================================================================
// 7. Parameter View Lifetime
// ============================================================================

/// Stashes its parameter view so the test can read it after the batch.
struct Keeper {
    stash: Rc<RefCell<Option<ParameterView>>>,
}

impl Component for Keeper {
    fn set_parameters(
        &mut self,
        params: &ParameterView,
        _ctx: &mut LifecycleCtx<'_>,
    ) -> Result<HookOutcome, ComponentError> {
        *self.stash.borrow_mut() = Some(params.clone());
        Ok(HookOutcome::Done)
    }

    fn render(&self, builder: &mut FrameBuilder) {
        builder.open_element(0, "div");
        builder.close_element();
    }
}

/// Views are scoped to their batch; reads after commit fail loudly
/// rather than returning stale data.
#[test]
fn parameter_view_expires_after_commit() {
    let stash = Rc::new(RefCell::new(None));
    let mut registry = ComponentRegistry::new();
    {
        let stash = stash.clone();
        registry.register(
            KEEPER,
            || ComponentMeta::new("Keeper"),
            move || Ok(Box::new(Keeper { stash: stash.clone() })),
        );
    }
    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(KEEPER).unwrap();
    renderer
        .set_root_parameters(root, vec![("text".to_owned(), AttributeValue::Text("x".into()))])
        .unwrap();
    renderer.render_root(root).unwrap();

    let view = stash.borrow().clone().expect("view captured");
    assert!(view.get_text("text").is_err(), "view expired with its batch");
}

// ============================================================================
// 8. Failure Paths
// ============================================================================

/// A failing child factory aborts the whole batch; the sink never sees
/// a partial commit.
#[test]
fn failing_child_factory_aborts_batch() {
    let child_text = Rc::new(RefCell::new(String::new()));
    let show_child = Rc::new(RefCell::new(true));
    let mut registry = ComponentRegistry::new();
    registry.register(
        LABEL,
        || ComponentMeta::new("Label"),
        || {
            Err(trellis_runtime::ActivationError::Factory {
                type_id: LABEL,
                message: "construction failed".to_owned(),
            })
        },
    );
    {
        let (child_text, show_child) = (child_text.clone(), show_child.clone());
        registry.register(
            PANEL,
            || ComponentMeta::new("Panel"),
            move || {
                Ok(Box::new(Panel {
                    child_text: child_text.clone(),
                    show_child: show_child.clone(),
                }))
            },
        );
    }

    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(PANEL).unwrap();
    let result = renderer.render_root(root);

    assert!(matches!(result, Err(RendererError::Activation(_))));
    assert!(renderer.sink().batches.is_empty(), "no partial commit");
}

/// A rejected batch surfaces as a display error from the entry point.
#[test]
fn display_rejection_surfaces_as_error() {
    let mut registry = ComponentRegistry::new();
    registry.register_default::<Counter>(COUNTER, || ComponentMeta::new("Counter"));
    let mut renderer = Renderer::new(registry, RecordingSink::default());
    renderer.sink_mut().reject_next = true;
    let root = renderer.attach_root(COUNTER).unwrap();

    assert!(matches!(
        renderer.render_root(root),
        Err(RendererError::Display(_))
    ));
    assert!(renderer.sink().batches.is_empty());
}

/// A failing event hook aborts the batch it would have produced.
#[derive(Default)]
struct Faulty;

impl Component for Faulty {
    fn render(&self, builder: &mut FrameBuilder) {
        builder.open_element(0, "button");
        builder.add_event(1, "onclick", "explode");
        builder.close_element();
    }

    fn on_event(
        &mut self,
        _binding: &str,
        _args: &EventArgs,
        _ctx: &mut LifecycleCtx<'_>,
    ) -> Result<HookOutcome, ComponentError> {
        Err(ComponentError::Hook("boom".to_owned()))
    }
}

#[test]
fn failing_event_hook_aborts_batch() {
    let mut registry = ComponentRegistry::new();
    registry.register_default::<Faulty>(COUNTER, || ComponentMeta::new("Faulty"));
    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(COUNTER).unwrap();
    renderer.render_root(root).unwrap();
    let handler = renderer.sink().last_handler_id();
    let committed = renderer.sink().batches.len();

    let result = renderer.dispatch_event(root, handler, EventArgs::none());

    assert!(matches!(result, Err(RendererError::Component(_))));
    assert_eq!(renderer.sink().batches.len(), committed, "nothing committed");
}

// ============================================================================
// 9. Root Parameters and Type Reset
// ============================================================================

#[test]
fn root_parameters_flow_into_the_view() {
    let events: SharedLog = Rc::default();
    let mut registry = ComponentRegistry::new();
    {
        let events = events.clone();
        registry.register(
            LABEL,
            || ComponentMeta::new("Label"),
            move || {
                Ok(Box::new(Label {
                    events: events.clone(),
                    text: String::new(),
                }))
            },
        );
    }
    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(LABEL).unwrap();
    renderer
        .set_root_parameters(
            root,
            vec![("text".to_owned(), AttributeValue::Text("from host".into()))],
        )
        .unwrap();
    renderer.render_root(root).unwrap();

    assert!(events.borrow().contains(&"label:params from host".to_owned()));

    renderer
        .set_root_parameters(
            root,
            vec![("text".to_owned(), AttributeValue::Text("again".into()))],
        )
        .unwrap();
    renderer.render_root(root).unwrap();
    assert!(events.borrow().contains(&"label:params again".to_owned()));
}

#[test]
fn set_root_parameters_rejects_non_roots() {
    let mut registry = ComponentRegistry::new();
    registry.register_default::<Counter>(COUNTER, || ComponentMeta::new("Counter"));
    let mut renderer = Renderer::new(registry, RecordingSink::default());
    assert!(matches!(
        renderer.set_root_parameters(ComponentId(42), Vec::new()),
        Err(RendererError::NotARoot(ComponentId(42)))
    ));
}

/// A type reset bumps the registry generation and re-renders every
/// root in one pass.
#[test]
fn reset_types_rerenders_roots() {
    let mut registry = ComponentRegistry::new();
    registry.register_default::<Counter>(COUNTER, || ComponentMeta::new("Counter"));
    let mut renderer = Renderer::new(registry, RecordingSink::default());
    let root = renderer.attach_root(COUNTER).unwrap();
    renderer.render_root(root).unwrap();
    let generation = renderer.registry().generation();
    let committed = renderer.sink().batches.len();

    renderer.reset_types().unwrap();

    assert_eq!(renderer.registry().generation(), generation + 1);
    assert_eq!(renderer.sink().batches.len(), committed + 1);
    assert!(renderer.sink().last().updated.contains(&root));
}
