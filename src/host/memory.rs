//! In-memory host renderer - Backing surface for tests and headless use.
//!
//! Stores the host tree in a plain node table behind a shared handle, so a
//! test can keep one clone for inspection while the engine owns another.
//! Events are delivered by [`MemoryHost::dispatch`], which looks up the
//! registered listener and invokes it against the engine.
//!
//! # Example
//!
//! ```ignore
//! use spark_fiber::engine::Engine;
//! use spark_fiber::host::MemoryHost;
//!
//! let host = MemoryHost::new();
//! let container = host.create_root();
//! let mut engine = Engine::new(host.clone());
//!
//! engine.render(app_node, container);
//! engine.run_to_idle()?;
//!
//! assert_eq!(host.children(container).len(), 1);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::engine::Engine;
use crate::types::{EventHandler, HostHandle, PropValue};

use super::{HostError, HostNodeKind, HostRenderer};

// =============================================================================
// Node Storage
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
enum NodeKind {
    Element(String),
    Text,
}

struct Node {
    kind: NodeKind,
    text: String,
    attrs: Vec<(String, PropValue)>,
    listeners: Vec<(String, EventHandler)>,
    children: Vec<HostHandle>,
    parent: Option<HostHandle>,
}

impl Node {
    fn new(kind: NodeKind, text: String) -> Self {
        Self {
            kind,
            text,
            attrs: Vec::new(),
            listeners: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

#[derive(Default)]
struct Store {
    nodes: HashMap<u64, Node>,
    next_id: u64,
    /// Flat log of every mutation, for ordering assertions in tests.
    ops: Vec<String>,
}

impl Store {
    fn node(&self, handle: HostHandle) -> Result<&Node, HostError> {
        self.nodes
            .get(&handle.raw())
            .ok_or(HostError::UnknownHandle(handle))
    }

    fn node_mut(&mut self, handle: HostHandle) -> Result<&mut Node, HostError> {
        self.nodes
            .get_mut(&handle.raw())
            .ok_or(HostError::UnknownHandle(handle))
    }

    fn insert(&mut self, node: Node) -> HostHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, node);
        HostHandle::new(id)
    }

    fn drop_subtree(&mut self, handle: HostHandle) {
        if let Some(node) = self.nodes.remove(&handle.raw()) {
            for child in node.children {
                self.drop_subtree(child);
            }
        }
    }
}

// =============================================================================
// Memory Host
// =============================================================================

/// Shared-handle in-memory implementation of [`HostRenderer`].
///
/// Cloning is cheap and every clone views the same tree.
#[derive(Clone, Default)]
pub struct MemoryHost {
    inner: Rc<RefCell<Store>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached container element to render into.
    pub fn create_root(&self) -> HostHandle {
        self.inner
            .borrow_mut()
            .insert(Node::new(NodeKind::Element("root".to_string()), String::new()))
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Whether a handle still points at a live node.
    pub fn contains(&self, handle: HostHandle) -> bool {
        self.inner.borrow().nodes.contains_key(&handle.raw())
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    /// Tag name of an element node.
    pub fn tag(&self, handle: HostHandle) -> Option<String> {
        match &self.inner.borrow().nodes.get(&handle.raw())?.kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            NodeKind::Text => None,
        }
    }

    /// Value of a text node.
    pub fn text(&self, handle: HostHandle) -> Option<String> {
        let store = self.inner.borrow();
        let node = store.nodes.get(&handle.raw())?;
        match node.kind {
            NodeKind::Text => Some(node.text.clone()),
            NodeKind::Element(_) => None,
        }
    }

    /// Attribute value, if set.
    pub fn attr(&self, handle: HostHandle, name: &str) -> Option<PropValue> {
        self.inner
            .borrow()
            .nodes
            .get(&handle.raw())?
            .attrs
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, v)| v.clone())
    }

    /// Child handles in order.
    pub fn children(&self, handle: HostHandle) -> Vec<HostHandle> {
        self.inner
            .borrow()
            .nodes
            .get(&handle.raw())
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    /// Mutation log since creation (or the last [`MemoryHost::clear_ops`]),
    /// one entry per host call, in order.
    pub fn ops(&self) -> Vec<String> {
        self.inner.borrow().ops.clone()
    }

    /// Reset the mutation log.
    pub fn clear_ops(&self) {
        self.inner.borrow_mut().ops.clear();
    }

    /// Registered listener for an event, if any.
    pub fn listener(&self, handle: HostHandle, event: &str) -> Option<EventHandler> {
        self.inner
            .borrow()
            .nodes
            .get(&handle.raw())?
            .listeners
            .iter()
            .find(|(e, _)| e.as_str() == event)
            .map(|(_, h)| h.clone())
    }

    /// Deliver an event to a node. Returns whether a listener handled it.
    pub fn dispatch(&self, engine: &mut Engine, handle: HostHandle, event: &str) -> bool {
        let handler = self.listener(handle, event);
        match handler {
            Some(handler) => {
                handler.call(engine);
                true
            }
            None => false,
        }
    }

    /// Render a subtree as markup for assertions and debugging. Listener
    /// props are omitted.
    pub fn markup(&self, handle: HostHandle) -> String {
        let store = self.inner.borrow();
        let mut out = String::new();
        Self::write_markup(&store, handle, &mut out);
        out
    }

    fn write_markup(store: &Store, handle: HostHandle, out: &mut String) {
        let Some(node) = store.nodes.get(&handle.raw()) else {
            return;
        };
        match &node.kind {
            NodeKind::Text => out.push_str(&node.text),
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &node.attrs {
                    let printed = match value {
                        PropValue::Str(s) => s.clone(),
                        PropValue::Int(i) => i.to_string(),
                        PropValue::Float(x) => x.to_string(),
                        PropValue::Bool(b) => b.to_string(),
                        PropValue::Handler(_) => continue,
                    };
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&printed);
                    out.push('"');
                }
                out.push('>');
                for child in &node.children {
                    Self::write_markup(store, *child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

// =============================================================================
// HostRenderer Implementation
// =============================================================================

impl HostRenderer for MemoryHost {
    fn create_node(&mut self, kind: HostNodeKind<'_>) -> Result<HostHandle, HostError> {
        let node = match kind {
            HostNodeKind::Element(tag) => Node::new(NodeKind::Element(tag.to_string()), String::new()),
            HostNodeKind::Text(value) => Node::new(NodeKind::Text, value.to_string()),
        };
        let mut store = self.inner.borrow_mut();
        let handle = store.insert(node);
        let label = match kind {
            HostNodeKind::Element(tag) => format!("create <{}> #{}", tag, handle.raw()),
            HostNodeKind::Text(_) => format!("create text #{}", handle.raw()),
        };
        store.ops.push(label);
        Ok(handle)
    }

    fn set_attribute(
        &mut self,
        node: HostHandle,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError> {
        let mut store = self.inner.borrow_mut();
        let target = store.node_mut(node)?;
        match target.attrs.iter_mut().find(|(n, _)| n.as_str() == name) {
            Some((_, slot)) => *slot = value.clone(),
            None => target.attrs.push((name.to_string(), value.clone())),
        }
        store.ops.push(format!("set #{} {}", node.raw(), name));
        Ok(())
    }

    fn remove_attribute(&mut self, node: HostHandle, name: &str) -> Result<(), HostError> {
        let mut store = self.inner.borrow_mut();
        let target = store.node_mut(node)?;
        target.attrs.retain(|(n, _)| n.as_str() != name);
        store.ops.push(format!("unset #{} {}", node.raw(), name));
        Ok(())
    }

    fn set_text(&mut self, node: HostHandle, value: &str) -> Result<(), HostError> {
        let mut store = self.inner.borrow_mut();
        let target = store.node_mut(node)?;
        if target.kind != NodeKind::Text {
            return Err(HostError::Backend(format!(
                "set_text on element node {:?}",
                node
            )));
        }
        target.text = value.to_string();
        store.ops.push(format!("text #{} {:?}", node.raw(), value));
        Ok(())
    }

    fn add_listener(
        &mut self,
        node: HostHandle,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError> {
        let mut store = self.inner.borrow_mut();
        let target = store.node_mut(node)?;
        match target.listeners.iter_mut().find(|(e, _)| e.as_str() == event) {
            Some((_, slot)) => *slot = handler,
            None => target.listeners.push((event.to_string(), handler)),
        }
        store.ops.push(format!("listen #{} {}", node.raw(), event));
        Ok(())
    }

    fn remove_listener(&mut self, node: HostHandle, event: &str) -> Result<(), HostError> {
        let mut store = self.inner.borrow_mut();
        let target = store.node_mut(node)?;
        target.listeners.retain(|(e, _)| e.as_str() != event);
        store.ops.push(format!("unlisten #{} {}", node.raw(), event));
        Ok(())
    }

    fn append_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        let mut store = self.inner.borrow_mut();
        store.node(parent)?;
        store.node_mut(child)?.parent = Some(parent);
        store.node_mut(parent)?.children.push(child);
        store
            .ops
            .push(format!("append #{} -> #{}", child.raw(), parent.raw()));
        Ok(())
    }

    fn remove_node(&mut self, node: HostHandle) -> Result<(), HostError> {
        let mut store = self.inner.borrow_mut();
        let parent = store.node(node)?.parent;
        if let Some(parent) = parent {
            if let Ok(parent_node) = store.node_mut(parent) {
                parent_node.children.retain(|c| *c != node);
            }
        }
        store.drop_subtree(node);
        store.ops.push(format!("remove #{}", node.raw()));
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
