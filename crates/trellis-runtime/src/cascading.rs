#![forbid(unsafe_code)]

//! Cascading value resolution and subscription.
//!
//! A supplier is a component whose type metadata declares a cascading
//! supply; its live value sits in a [`CascadingSlot`] on its state
//! record. Consumers declare cascading parameters in their metadata and
//! are bound at attach time by [`find_cascading_parameters`]: walk the
//! ancestor chain, and for each still-unresolved declaration take the
//! nearest qualifying supplier. Once a parameter is resolved it is never
//! reconsidered against a farther ancestor.
//!
//! Matching rules:
//! - value types match exactly (`TypeId` equality, no subtyping),
//! - named and unnamed pools are disjoint,
//! - names compare case-insensitively,
//! - a supplier with no current value still matches; the consumer just
//!   sees an absent value.
//!
//! Subscriptions exist so value changes on non-fixed suppliers notify
//! exactly the components that resolved against them. Fixed suppliers
//! take the subscription-free fast path.

use crate::registry::CascadingParamDecl;
use crate::state::ComponentArena;
use smallvec::SmallVec;
use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;
use trellis_tree::frame::ComponentId;

/// Live cascading value on a supplier's state record.
pub struct CascadingSlot {
    pub value_type: TypeId,
    pub name: Option<String>,
    pub fixed: bool,
    /// Current value; a supplier may validly have none.
    pub value: Option<Rc<dyn Any>>,
    /// Components that resolved a parameter against this slot. Always
    /// empty for fixed slots.
    pub subscribers: SmallVec<[ComponentId; 4]>,
}

impl fmt::Debug for CascadingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascadingSlot")
            .field("name", &self.name)
            .field("fixed", &self.fixed)
            .field("has_value", &self.value.is_some())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl CascadingSlot {
    /// Whether this slot can satisfy the given consumer declaration.
    pub fn matches(&self, decl: &CascadingParamDecl) -> bool {
        if self.value_type != decl.value_type {
            return false;
        }
        match (&self.name, &decl.supplier_name) {
            (None, None) => true,
            (Some(supplied), Some(wanted)) => supplied.eq_ignore_ascii_case(wanted),
            _ => false,
        }
    }

    pub fn subscribe(&mut self, id: ComponentId) {
        debug_assert!(!self.fixed, "fixed slots never carry subscribers");
        if !self.subscribers.contains(&id) {
            self.subscribers.push(id);
        }
    }

    pub fn unsubscribe(&mut self, id: ComponentId) {
        self.subscribers.retain(|s| *s != id);
    }
}

/// One resolved binding: a consumer-side parameter name and the
/// supplier that satisfies it. The value is read off the supplier's
/// slot each time a view is built, so it is never stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCascade {
    pub parameter_name: String,
    pub supplier: ComponentId,
}

/// Resolve every cascading parameter declared by `id`'s type against
/// the nearest qualifying ancestor supplier. Pure lookup; subscribing
/// is the caller's side effect.
pub fn find_cascading_parameters(arena: &ComponentArena, id: ComponentId) -> Vec<ResolvedCascade> {
    let Some(state) = arena.get(id) else {
        return Vec::new();
    };
    let decls = &state.meta.cascading_params;
    if decls.is_empty() {
        return Vec::new();
    }

    let mut resolved: Vec<ResolvedCascade> = Vec::new();
    let mut unresolved: Vec<&CascadingParamDecl> = decls.iter().collect();
    let mut cursor = state.parent;

    while let Some(ancestor_id) = cursor {
        let Some(ancestor) = arena.get(ancestor_id) else {
            break;
        };
        if let Some(slot) = &ancestor.slot {
            unresolved.retain(|decl| {
                if slot.matches(decl) {
                    resolved.push(ResolvedCascade {
                        parameter_name: decl.parameter_name.clone(),
                        supplier: ancestor_id,
                    });
                    false
                } else {
                    true
                }
            });
            if unresolved.is_empty() {
                break;
            }
        }
        cursor = ancestor.parent;
    }

    // Restore declaration order; resolution order above follows the
    // ancestor walk.
    resolved.sort_by_key(|r| {
        decls
            .iter()
            .position(|d| d.parameter_name == r.parameter_name)
            .unwrap_or(usize::MAX)
    });
    resolved
}
