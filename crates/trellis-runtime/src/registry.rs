#![forbid(unsafe_code)]

//! Typed component registry.
//!
//! Maps a [`ComponentTypeId`] to a factory plus type metadata. Metadata
//! is produced by a registered function, computed on first use and
//! cached; [`ComponentRegistry::reset`] drops the cache and bumps the
//! registry generation, which the renderer uses to re-render live roots
//! after types change underneath them (the hot-reload path).
//!
//! The activator contract is strict: a factory returns the requested
//! instance or an [`ActivationError`], never a substitute type.

use crate::component::Component;
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use trellis_tree::frame::ComponentTypeId;

/// One cascading parameter a component type consumes.
#[derive(Debug, Clone)]
pub struct CascadingParamDecl {
    /// The component-local parameter name surfaced in its views.
    pub parameter_name: String,
    /// Supplier-side name. `None` means the unnamed pool; named and
    /// unnamed pools never match each other.
    pub supplier_name: Option<String>,
    /// Exact value type required. No subtype matching.
    pub value_type: TypeId,
}

/// The cascading value a component type supplies, if any.
#[derive(Debug, Clone)]
pub struct CascadingSupplyDecl {
    pub name: Option<String>,
    pub value_type: TypeId,
    /// A fixed supply never notifies and rejects later identity changes;
    /// consumers skip subscribing to it.
    pub fixed: bool,
}

/// Per-type metadata, computed once and cached by the registry.
#[derive(Debug, Clone)]
pub struct ComponentMeta {
    pub type_name: &'static str,
    pub cascading_params: Vec<CascadingParamDecl>,
    pub supplies: Option<CascadingSupplyDecl>,
    /// Whether unmatched direct attributes are captured rather than
    /// being an authoring mistake. Carried for consumers of the
    /// metadata; the engine itself does not reject unmatched attributes.
    pub capture_unmatched: bool,
}

impl ComponentMeta {
    pub fn new(type_name: &'static str) -> Self {
        ComponentMeta {
            type_name,
            cascading_params: Vec::new(),
            supplies: None,
            capture_unmatched: false,
        }
    }

    pub fn with_cascading_param(mut self, decl: CascadingParamDecl) -> Self {
        self.cascading_params.push(decl);
        self
    }

    pub fn with_supply(mut self, decl: CascadingSupplyDecl) -> Self {
        self.supplies = Some(decl);
        self
    }

    /// # Panics
    ///
    /// Panics if two cascading parameter declarations share a local
    /// name; the resolution protocol requires names to be unique per
    /// type.
    fn validate(&self) {
        for (i, a) in self.cascading_params.iter().enumerate() {
            for b in &self.cascading_params[i + 1..] {
                assert!(
                    a.parameter_name != b.parameter_name,
                    "component type {} declares the cascading parameter name {:?} twice",
                    self.type_name,
                    a.parameter_name
                );
            }
        }
    }
}

/// Activation failure.
#[derive(Debug)]
pub enum ActivationError {
    /// No factory registered for the requested type.
    UnknownType(ComponentTypeId),
    /// The factory itself failed.
    Factory {
        type_id: ComponentTypeId,
        message: String,
    },
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationError::UnknownType(id) => {
                write!(f, "no component type registered for id {}", id.0)
            }
            ActivationError::Factory { type_id, message } => {
                write!(f, "factory for component type {} failed: {message}", type_id.0)
            }
        }
    }
}

impl std::error::Error for ActivationError {}

type Factory = Box<dyn Fn() -> Result<Box<dyn Component>, ActivationError>>;
type MetaFn = Box<dyn Fn() -> ComponentMeta>;

struct RegistryEntry {
    factory: Factory,
    meta_fn: MetaFn,
    cached_meta: RefCell<Option<Rc<ComponentMeta>>>,
}

/// Process-scoped component type registry. Passed into the renderer
/// explicitly rather than living in a static.
#[derive(Default)]
pub struct ComponentRegistry {
    entries: HashMap<ComponentTypeId, RegistryEntry>,
    generation: u64,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component type.
    ///
    /// # Panics
    ///
    /// Panics if the type id is already registered.
    pub fn register(
        &mut self,
        type_id: ComponentTypeId,
        meta_fn: impl Fn() -> ComponentMeta + 'static,
        factory: impl Fn() -> Result<Box<dyn Component>, ActivationError> + 'static,
    ) {
        let prior = self.entries.insert(
            type_id,
            RegistryEntry {
                factory: Box::new(factory),
                meta_fn: Box::new(meta_fn),
                cached_meta: RefCell::new(None),
            },
        );
        assert!(
            prior.is_none(),
            "component type id {} registered twice",
            type_id.0
        );
    }

    /// Convenience registration for types constructible with `Default`.
    pub fn register_default<C>(&mut self, type_id: ComponentTypeId, meta_fn: impl Fn() -> ComponentMeta + 'static)
    where
        C: Component + Default + 'static,
    {
        self.register(type_id, meta_fn, || Ok(Box::new(C::default())));
    }

    pub fn instantiate(
        &self,
        type_id: ComponentTypeId,
    ) -> Result<Box<dyn Component>, ActivationError> {
        let entry = self
            .entries
            .get(&type_id)
            .ok_or(ActivationError::UnknownType(type_id))?;
        (entry.factory)()
    }

    /// Metadata for a type, computed on first use and cached until
    /// [`Self::reset`].
    pub fn meta(&self, type_id: ComponentTypeId) -> Result<Rc<ComponentMeta>, ActivationError> {
        let entry = self
            .entries
            .get(&type_id)
            .ok_or(ActivationError::UnknownType(type_id))?;
        let mut cached = entry.cached_meta.borrow_mut();
        if let Some(meta) = cached.as_ref() {
            return Ok(Rc::clone(meta));
        }
        let meta = (entry.meta_fn)();
        meta.validate();
        let meta = Rc::new(meta);
        *cached = Some(Rc::clone(&meta));
        Ok(meta)
    }

    /// Drop all cached metadata and advance the generation. Factories
    /// stay registered.
    pub fn reset(&mut self) {
        for entry in self.entries.values() {
            entry.cached_meta.borrow_mut().take();
        }
        self.generation += 1;
    }

    /// Monotonic counter bumped by every [`Self::reset`].
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("types", &self.entries.len())
            .field("generation", &self.generation)
            .finish()
    }
}
