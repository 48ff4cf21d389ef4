//! Core types for spark-fiber.
//!
//! These types define the foundation that everything builds on: property
//! values as they flow from virtual nodes into the host renderer, event
//! callbacks, cleanup functions, and the opaque host node handle.

use std::fmt;
use std::rc::Rc;

use crate::engine::Engine;

// =============================================================================
// Cleanup Function
// =============================================================================

/// Cleanup function returned by an effect callback.
///
/// Stored on the effect cell and invoked before the effect re-runs, or when
/// the owning component unmounts.
pub type Cleanup = Box<dyn FnOnce()>;

// =============================================================================
// Event Callbacks
// =============================================================================

/// Event callback attached to a host node through an `on`-prefixed prop.
///
/// Using Rc<dyn Fn> instead of Box<dyn Fn> allows cloning callbacks into the
/// host's listener registry without ownership issues. Handlers receive the
/// engine so they can dispatch state updates.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&mut Engine)>);

impl EventHandler {
    /// Wrap a closure as an event handler.
    pub fn new(f: impl Fn(&mut Engine) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the handler.
    pub fn call(&self, engine: &mut Engine) {
        (self.0)(engine)
    }

    /// Identity comparison. Two handlers are the same prop value only when
    /// they are clones of one Rc; the prop diff relies on this.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0))
    }
}

// =============================================================================
// Prop Value
// =============================================================================

/// A property value on a virtual node.
///
/// Values compare by content, handlers compare by identity. The comparison
/// drives both the commit-time prop diff and effect dependency checks.
#[derive(Clone, Debug)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(EventHandler),
}

impl PropValue {
    /// Shortcut for wrapping a closure as a handler prop.
    pub fn handler(f: impl Fn(&mut Engine) + 'static) -> Self {
        PropValue::Handler(EventHandler::new(f))
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a == b,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => EventHandler::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value as i64)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

// =============================================================================
// Host Handle
// =============================================================================

/// Opaque handle into the host renderer's node store.
///
/// The engine never interprets the value; it only records handles on fibers
/// and passes them back to the host.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct HostHandle(u64);

impl HostHandle {
    /// Wrap a raw host-side identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw host-side identifier.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

// =============================================================================
// Tests
// =============================================================================
