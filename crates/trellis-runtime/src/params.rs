#![forbid(unsafe_code)]

//! Parameter views.
//!
//! A [`ParameterView`] is a read handle over the direct-attribute frames
//! following a component frame in its parent's committed tree, plus the
//! cascading values resolved for the component. It is valid for exactly
//! one render pass: the [`BatchLifetime`] token it carries is expired
//! when the owning batch commits, and every read after that fails with
//! [`ParameterViewError::Expired`]. There is no silent-stale-read path,
//! which is what makes it safe for the renderer to recycle frame arrays
//! between passes.
//!
//! Reads return owned values, so nothing borrowed from a view can
//! outlive the check that produced it.

use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use trellis_tree::frame::{AttributeValue, Frame, FrameBody};

/// Shared expiry token for everything produced by one render pass.
///
/// The renderer holds the writing end and expires the token when the
/// batch commits; views hold clones.
#[derive(Debug, Clone, Default)]
pub struct BatchLifetime {
    expired: Rc<Cell<bool>>,
}

impl BatchLifetime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expired(&self) -> bool {
        self.expired.get()
    }

    /// Expire every clone of this token. Irreversible.
    pub fn expire(&self) {
        self.expired.set(true);
    }
}

/// Errors from parameter view reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterViewError {
    /// The owning render batch has been committed; the view is stale.
    Expired,
    /// The parameter exists but does not have the requested shape.
    WrongType {
        parameter: String,
        expected: &'static str,
    },
}

impl fmt::Display for ParameterViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterViewError::Expired => {
                f.write_str("parameter view read after its render batch was committed")
            }
            ParameterViewError::WrongType {
                parameter,
                expected,
            } => write!(
                f,
                "parameter {parameter:?} does not hold a {expected} value"
            ),
        }
    }
}

impl std::error::Error for ParameterViewError {}

/// One resolved cascading value carried by a view.
#[derive(Clone)]
pub struct CascadingEntry {
    /// The consumer-side parameter name.
    pub name: String,
    /// The supplier's value at resolution time. `None` when the supplier
    /// currently has no value.
    pub value: Option<Rc<dyn Any>>,
}

impl fmt::Debug for CascadingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascadingEntry")
            .field("name", &self.name)
            .field("has_value", &self.value.is_some())
            .finish()
    }
}

/// An owned parameter value yielded by enumeration.
#[derive(Clone)]
pub enum ParameterValue {
    Text(String),
    Flag(bool),
    /// Event-handler binding label.
    EventHandler(String),
    /// Two-way-binding marker naming the updated attribute.
    UpdatesAttribute(String),
    /// A cascading value, possibly absent on the supplier.
    Cascading(Option<Rc<dyn Any>>),
}

impl fmt::Debug for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Text(s) => write!(f, "Text({s:?})"),
            ParameterValue::Flag(b) => write!(f, "Flag({b})"),
            ParameterValue::EventHandler(b) => write!(f, "EventHandler({b:?})"),
            ParameterValue::UpdatesAttribute(a) => write!(f, "UpdatesAttribute({a:?})"),
            ParameterValue::Cascading(v) => write!(f, "Cascading(present: {})", v.is_some()),
        }
    }
}

/// Read view over one component's parameters for one render pass.
#[derive(Debug, Clone)]
pub struct ParameterView {
    lifetime: BatchLifetime,
    /// The owner's committed frame array; direct attributes follow the
    /// component frame at `owner_index`.
    frames: Rc<Vec<Frame>>,
    owner_index: usize,
    cascading: Vec<CascadingEntry>,
}

impl ParameterView {
    pub(crate) fn new(lifetime: BatchLifetime, frames: Rc<Vec<Frame>>, owner_index: usize) -> Self {
        ParameterView {
            lifetime,
            frames,
            owner_index,
            cascading: Vec::new(),
        }
    }

    pub(crate) fn with_cascading(mut self, cascading: Vec<CascadingEntry>) -> Self {
        self.cascading = cascading;
        self
    }

    fn ensure_live(&self) -> Result<(), ParameterViewError> {
        if self.lifetime.is_expired() {
            Err(ParameterViewError::Expired)
        } else {
            Ok(())
        }
    }

    fn direct_frames(&self) -> &[Frame] {
        // A component with no parameter source sees an empty frame
        // array; clamp rather than slice past the end.
        let start = (self.owner_index + 1).min(self.frames.len());
        let mut end = start;
        while end < self.frames.len() && self.frames[end].is_attribute() {
            end += 1;
        }
        &self.frames[start..end]
    }

    /// Enumerate all parameters: direct attributes in frame order, then
    /// cascading entries in resolution order.
    pub fn iter(&self) -> Result<Vec<(String, ParameterValue)>, ParameterViewError> {
        self.ensure_live()?;
        let mut out = Vec::new();
        for frame in self.direct_frames() {
            if let FrameBody::Attribute { name, value } = &frame.body {
                out.push((name.clone(), owned_value(value)));
            }
        }
        for entry in &self.cascading {
            out.push((
                entry.name.clone(),
                ParameterValue::Cascading(entry.value.clone()),
            ));
        }
        Ok(out)
    }

    /// All parameters as a map. Later entries win on name collision,
    /// matching enumeration order.
    pub fn to_map(&self) -> Result<HashMap<String, ParameterValue>, ParameterViewError> {
        Ok(self.iter()?.into_iter().collect())
    }

    fn direct_value(&self, name: &str) -> Result<Option<AttributeValue>, ParameterViewError> {
        self.ensure_live()?;
        for frame in self.direct_frames() {
            if let FrameBody::Attribute { name: n, value } = &frame.body
                && n == name
            {
                return Ok(Some(value.clone()));
            }
        }
        Ok(None)
    }

    /// Text value of a direct parameter. Absent parameters are `None`;
    /// a parameter of another shape is a data error naming it.
    pub fn get_text(&self, name: &str) -> Result<Option<String>, ParameterViewError> {
        match self.direct_value(name)? {
            None => Ok(None),
            Some(AttributeValue::Text(s)) => Ok(Some(s)),
            Some(_) => Err(ParameterViewError::WrongType {
                parameter: name.to_owned(),
                expected: "text",
            }),
        }
    }

    /// Boolean value of a direct parameter. An absent flag reads as
    /// `false`, matching the omitted-flag convention.
    pub fn get_flag(&self, name: &str) -> Result<bool, ParameterViewError> {
        match self.direct_value(name)? {
            None => Ok(false),
            Some(AttributeValue::Flag(b)) => Ok(b),
            Some(_) => Err(ParameterViewError::WrongType {
                parameter: name.to_owned(),
                expected: "flag",
            }),
        }
    }

    /// Typed read of a resolved cascading parameter. `Ok(None)` means
    /// the parameter was not resolved or the supplier has no value; a
    /// value of another type is a data error naming the parameter.
    pub fn get_cascading<T: 'static>(
        &self,
        name: &str,
    ) -> Result<Option<Rc<T>>, ParameterViewError> {
        self.ensure_live()?;
        let Some(entry) = self.cascading.iter().find(|e| e.name == name) else {
            return Ok(None);
        };
        match &entry.value {
            None => Ok(None),
            Some(value) => value.clone().downcast::<T>().map(Some).map_err(|_| {
                ParameterViewError::WrongType {
                    parameter: name.to_owned(),
                    expected: std::any::type_name::<T>(),
                }
            }),
        }
    }
}

fn owned_value(value: &AttributeValue) -> ParameterValue {
    match value {
        AttributeValue::Text(s) => ParameterValue::Text(s.clone()),
        AttributeValue::Flag(b) => ParameterValue::Flag(*b),
        AttributeValue::EventHandler { binding, .. } => {
            ParameterValue::EventHandler(binding.clone())
        }
        AttributeValue::UpdatesAttribute(a) => ParameterValue::UpdatesAttribute(a.clone()),
    }
}
