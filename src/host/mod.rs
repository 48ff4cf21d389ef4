//! Host renderer interface - The narrow seam to the rendering surface.
//!
//! The engine never creates or mutates visual nodes itself; it calls into a
//! [`HostRenderer`] and records the opaque handles it gets back. Everything a
//! concrete surface needs to implement is here: node creation, attribute and
//! listener wiring, text rewriting, and tree surgery.
//!
//! Listener props are recognized by a fixed naming convention: a prop whose
//! name starts with `on` is a listener, and the remainder, lowercased, is the
//! event name (`onClick` -> `click`).

pub mod memory;

pub use memory::MemoryHost;

use thiserror::Error;

use crate::types::{EventHandler, HostHandle, PropValue};

// =============================================================================
// Errors
// =============================================================================

/// Failure reported by a host renderer.
///
/// The engine does not recover from these: a host error during commit
/// propagates out mid-walk and the instance must be treated as dead (the
/// host tree may be partially mutated).
#[derive(Debug, Error)]
pub enum HostError {
    #[error("unknown host node handle {0:?}")]
    UnknownHandle(HostHandle),
    #[error("host backend error: {0}")]
    Backend(String),
}

// =============================================================================
// Node Kinds
// =============================================================================

/// What to create: an element with a tag, or a text node with its initial
/// value.
#[derive(Clone, Copy, Debug)]
pub enum HostNodeKind<'a> {
    Element(&'a str),
    Text(&'a str),
}

// =============================================================================
// Renderer Trait
// =============================================================================

/// The rendering surface as the engine sees it.
///
/// Nodes are created detached; the engine attaches them with `append_child`
/// during the commit mutation phase. At most one listener is registered per
/// (node, event name) pair, so `remove_listener` takes no handler argument.
pub trait HostRenderer {
    /// Create a detached node.
    fn create_node(&mut self, kind: HostNodeKind<'_>) -> Result<HostHandle, HostError>;

    /// Set or overwrite an attribute.
    fn set_attribute(
        &mut self,
        node: HostHandle,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError>;

    /// Unset an attribute. Removing an absent attribute is not an error.
    fn remove_attribute(&mut self, node: HostHandle, name: &str) -> Result<(), HostError>;

    /// Rewrite the value of a text node.
    fn set_text(&mut self, node: HostHandle, value: &str) -> Result<(), HostError>;

    /// Register a listener, replacing any previous one for the same event.
    fn add_listener(
        &mut self,
        node: HostHandle,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError>;

    /// Unregister a listener. Removing an absent listener is not an error.
    fn remove_listener(&mut self, node: HostHandle, event: &str) -> Result<(), HostError>;

    /// Append a child node to a parent.
    fn append_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError>;

    /// Remove a node (and its subtree) from the host tree.
    fn remove_node(&mut self, node: HostHandle) -> Result<(), HostError>;
}

// =============================================================================
// Listener Convention
// =============================================================================

/// Event name for an `on`-prefixed prop, or `None` for a plain attribute.
pub fn listener_event_name(prop: &str) -> Option<String> {
    let rest = prop.strip_prefix("on")?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_ascii_lowercase())
}
