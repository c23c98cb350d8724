#![forbid(unsafe_code)]

//! Trellis Runtime
//!
//! This crate provides the component runtime that ties the frame kernel
//! (`trellis-tree`) into a complete component framework: lifecycle,
//! parameters, cascading values, event routing, and the render loop.
//!
//! # Key Components
//!
//! - [`Renderer`] - Owner of the component tree and the render loop
//! - [`Component`] - Trait for component state and behavior
//! - [`ComponentRegistry`] - Type registration, factories, and metadata
//! - [`ParameterView`] - Batch-scoped read access to a component's parameters
//! - [`StateStore`] - Persistent component state across sessions
//!
//! # Role in Trellis
//! `trellis-runtime` is the orchestrator. Components describe output
//! through `trellis-tree` frame builders; the runtime diffs each render
//! against the committed tree and ships edit batches to a
//! [`DisplaySink`]. The sink is the seam to any concrete UI surface.

pub mod cascading;
pub mod component;
pub mod events;
pub mod params;
pub mod registry;
pub mod renderer;
pub mod state;
pub mod store;

pub use cascading::{CascadingSlot, ResolvedCascade, find_cascading_parameters};
pub use component::{
    Component, ComponentError, ContinuationToken, EventArgs, HookOutcome, LifecycleCtx, Resume,
    SuspendedPhase,
};
pub use events::{HandlerBinding, HandlerRegistry};
pub use params::{BatchLifetime, CascadingEntry, ParameterValue, ParameterView, ParameterViewError};
pub use registry::{
    ActivationError, CascadingParamDecl, CascadingSupplyDecl, ComponentMeta, ComponentRegistry,
};
pub use renderer::{
    DisplayError, DisplaySink, ErrorSink, EventDispatch, Renderer, RendererError, TracingErrorSink,
    UPDATES_MARKER_SUFFIX,
};
pub use state::{ComponentArena, ComponentState, StateFlags};
pub use store::{
    MemoryStorage, PersistScenario, StateStore, StateWriter, StorageBackend, StorageError,
    StorageResult,
};

#[cfg(feature = "state-persistence")]
pub use store::FileStorage;
