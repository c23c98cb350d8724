#![forbid(unsafe_code)]

//! Render-tree kernel: frames, the frame builder, and the diff engine.
//!
//! Components describe their output as a flat array of [`frame::Frame`]
//! records rather than a pointer tree. Container frames carry a subtree
//! length so that siblings can be located by index arithmetic. The
//! [`diff`] module reconciles an old and a new frame array into an edit
//! script that a display sink can apply.

pub mod batch;
pub mod builder;
pub mod diff;
pub mod edit;
pub mod frame;
pub mod pool;

pub use batch::{BatchBuilder, ComponentEdits, RenderBatch};
pub use builder::FrameBuilder;
pub use diff::{DiffHost, compute_diff, dispose_frames};
pub use edit::Edit;
pub use frame::{
    AttributeValue, ComponentId, ComponentTypeId, Frame, FrameBody, FrameKind, HandlerId, Key,
    RenderModeId,
};
pub use pool::BuilderPool;
