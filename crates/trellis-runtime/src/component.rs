#![forbid(unsafe_code)]

//! The component contract.
//!
//! A component is a boxed trait object the renderer drives through a
//! fixed lifecycle: `on_init` exactly once, then `set_parameters` /
//! `render` on every pass, `on_event` for dispatched UI events, and
//! `on_dispose` when the component leaves the tree.
//!
//! Hooks that need to wait for something external do not block: they
//! mint a [`ContinuationToken`] from the [`LifecycleCtx`] and return
//! [`HookOutcome::Suspend`]. The renderer keeps processing other work;
//! when the external operation finishes, the caller re-enters through
//! `Renderer::resume_continuation` and the component's `on_resume` runs
//! with the completion payload.

use crate::params::{ParameterView, ParameterViewError};
use crate::store::StateStore;
use std::any::Any;
use std::fmt;
use std::rc::Rc;
use trellis_tree::FrameBuilder;

/// Identifies one suspended lifecycle phase. Tokens are renderer-scoped
/// and single-use: resuming consumes the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContinuationToken(pub(crate) u64);

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// How a suspendable lifecycle hook finished its synchronous phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// The hook is done; nothing outstanding.
    Done,
    /// The hook is waiting on the continuation identified by the token,
    /// which must have been minted from the [`LifecycleCtx`] of this
    /// call.
    Suspend(ContinuationToken),
}

/// Which hook a pending continuation belongs to. Passed back to
/// [`Component::on_resume`] so the component knows what completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendedPhase {
    Init,
    SetParameters,
    Event,
}

/// Completion of a suspended phase, delivered through
/// `Renderer::resume_continuation`.
pub enum Resume {
    /// The external operation produced a value; `on_resume` runs and a
    /// render follows.
    Complete(Box<dyn Any>),
    /// The operation was canceled. No error, no further render.
    Cancel,
    /// The operation failed. Routed to the renderer's error sink; the
    /// follow-up render is suppressed.
    Fail(ComponentError),
}

impl fmt::Debug for Resume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resume::Complete(_) => f.write_str("Resume::Complete(..)"),
            Resume::Cancel => f.write_str("Resume::Cancel"),
            Resume::Fail(e) => write!(f, "Resume::Fail({e})"),
        }
    }
}

/// Payload of a dispatched UI event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventArgs {
    /// The display-side value associated with the event, when there is
    /// one (an input's current text, a checkbox state, ...). Present
    /// values drive two-way-binding tree patches before the handler
    /// runs.
    pub value: Option<String>,
}

impl EventArgs {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        EventArgs {
            value: Some(value.into()),
        }
    }
}

/// Failure raised by a component lifecycle hook.
#[derive(Debug)]
pub enum ComponentError {
    /// The hook reported an application-level failure.
    Hook(String),
    /// A typed parameter read failed.
    Parameter(ParameterViewError),
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentError::Hook(msg) => write!(f, "component hook failed: {msg}"),
            ComponentError::Parameter(e) => write!(f, "parameter error: {e}"),
        }
    }
}

impl std::error::Error for ComponentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ComponentError::Hook(_) => None,
            ComponentError::Parameter(e) => Some(e),
        }
    }
}

impl From<ParameterViewError> for ComponentError {
    fn from(e: ParameterViewError) -> Self {
        ComponentError::Parameter(e)
    }
}

/// Services the renderer lends to a hook for the duration of one call.
pub struct LifecycleCtx<'a> {
    next_token: &'a mut u64,
    store: Option<&'a mut StateStore>,
}

impl<'a> LifecycleCtx<'a> {
    pub(crate) fn new(next_token: &'a mut u64, store: Option<&'a mut StateStore>) -> Self {
        LifecycleCtx { next_token, store }
    }

    /// Mint a continuation token. The token only becomes pending if the
    /// hook returns it in [`HookOutcome::Suspend`].
    pub fn suspend(&mut self) -> ContinuationToken {
        *self.next_token += 1;
        ContinuationToken(*self.next_token)
    }

    /// The renderer's persistent state store, when one is attached.
    pub fn store(&mut self) -> Option<&mut StateStore> {
        self.store.as_deref_mut()
    }
}

/// A unit of UI. Implementations hold their own state; the renderer
/// owns the instance and calls the hooks in lifecycle order.
///
/// Only [`Component::render`] is required. Event routing is by binding
/// label: the labels a component writes into its event-handler
/// attributes come back through [`Component::on_event`], so handlers
/// are plain match arms rather than captured closures.
pub trait Component {
    /// Runs exactly once, after the component is attached and before its
    /// first `set_parameters` completes.
    fn on_init(&mut self, ctx: &mut LifecycleCtx<'_>) -> Result<HookOutcome, ComponentError> {
        let _ = ctx;
        Ok(HookOutcome::Done)
    }

    /// New direct and cascading parameters are available. Runs on every
    /// parameter change and on cascading-value notifications.
    fn set_parameters(
        &mut self,
        params: &ParameterView,
        ctx: &mut LifecycleCtx<'_>,
    ) -> Result<HookOutcome, ComponentError> {
        let _ = (params, ctx);
        Ok(HookOutcome::Done)
    }

    /// Produce this component's frame array for one render pass. Every
    /// opened scope must be closed before returning.
    fn render(&self, builder: &mut FrameBuilder);

    /// A UI event bound to this component fired. `binding` is the label
    /// the component put into the event-handler attribute.
    fn on_event(
        &mut self,
        binding: &str,
        args: &EventArgs,
        ctx: &mut LifecycleCtx<'_>,
    ) -> Result<HookOutcome, ComponentError> {
        let _ = (binding, args, ctx);
        Ok(HookOutcome::Done)
    }

    /// A suspended phase completed with a payload.
    fn on_resume(
        &mut self,
        phase: SuspendedPhase,
        payload: Box<dyn Any>,
        ctx: &mut LifecycleCtx<'_>,
    ) -> Result<HookOutcome, ComponentError> {
        let _ = (phase, payload, ctx);
        Ok(HookOutcome::Done)
    }

    /// The batch containing this component's latest render was accepted
    /// by the display sink. `first_render` is true exactly once.
    fn on_after_render(&mut self, first_render: bool) {
        let _ = first_render;
    }

    /// The value this component currently supplies to descendants, when
    /// its type metadata declares a cascading supply.
    fn cascading_value(&self) -> Option<Rc<dyn Any>> {
        None
    }

    /// The component is leaving the tree. Subscriptions are already
    /// removed by the renderer; this is for component-owned resources.
    fn on_dispose(&mut self) {}
}
