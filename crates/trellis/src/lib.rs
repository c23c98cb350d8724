#![forbid(unsafe_code)]

//! Trellis public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users. It
//! re-exports common types from internal crates and offers a lightweight
//! prelude for day-to-day usage.

use std::fmt;

// --- Tree re-exports -------------------------------------------------------

pub use trellis_tree::batch::{BatchBuilder, ComponentEdits, RenderBatch};
pub use trellis_tree::builder::FrameBuilder;
pub use trellis_tree::edit::Edit;
pub use trellis_tree::frame::{
    AttributeValue, ComponentId, ComponentTypeId, Frame, FrameBody, FrameKind, HandlerId, Key,
    RenderModeId,
};
pub use trellis_tree::pool::BuilderPool;

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use trellis_runtime::{
    Component, ComponentError, ComponentMeta, ComponentRegistry, ContinuationToken, DisplaySink,
    EventArgs, EventDispatch, HookOutcome, LifecycleCtx, ParameterView, Renderer, RendererError,
    Resume, SuspendedPhase,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for trellis apps.
#[derive(Debug)]
pub enum Error {
    /// I/O failure while loading or saving persisted state.
    Io(std::io::Error),
    /// Renderer or component error with message.
    Render(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Render(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(feature = "runtime")]
impl From<trellis_runtime::RendererError> for Error {
    fn from(err: trellis_runtime::RendererError) -> Self {
        Self::Render(err.to_string())
    }
}

/// Standard result type for trellis APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        AttributeValue, ComponentId, ComponentTypeId, Edit, Error, Frame, FrameBuilder, HandlerId,
        Key, Result,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{
        Component, ComponentError, ComponentMeta, ComponentRegistry, DisplaySink, EventArgs,
        HookOutcome, LifecycleCtx, ParameterView, Renderer,
    };

    pub use crate::tree;

    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use trellis_tree as tree;

#[cfg(feature = "runtime")]
pub use trellis_runtime as runtime;
