//! Virtual node model - Immutable UI descriptions.
//!
//! A render pass produces a tree of [`VNode`]s describing what the UI should
//! look like. Nodes are cheap descriptions created fresh on every pass and
//! never mutated; the engine diffs them against the persistent fiber tree to
//! find out what actually changed.
//!
//! Children that are not already nodes (strings, numbers) are coerced into
//! text leaves at construction time, and `Option::None` children become
//! explicit holes so conditional rendering keeps its position in the child
//! list.
//!
//! # Example
//!
//! ```ignore
//! use spark_fiber::element::{component, VNode};
//!
//! let app = component(|ctx, _props| {
//!     let (count, set_count) = ctx.use_state(0i64);
//!     VNode::host("div", vec![], vec![
//!         VNode::host("span", vec![], vec![count.into()]).into(),
//!     ])
//! });
//! ```

use std::fmt;
use std::rc::Rc;

use crate::hooks::RenderCtx;
use crate::types::PropValue;

// =============================================================================
// Node Type
// =============================================================================

/// Component function: props in, rendered subtree out.
///
/// The render context carries the hook-slot cursor for the fiber being
/// rendered; hook calls go through it. Identity (Rc pointer) is what makes
/// two tree positions "the same component" across renders.
pub type ComponentFn = Rc<dyn Fn(&mut RenderCtx, &Props) -> VNode>;

/// What a virtual node is: a text leaf, a host element, or a component.
#[derive(Clone)]
pub enum NodeType {
    /// Text leaf carrying its value.
    Text(String),
    /// Host element with its tag name.
    Host(String),
    /// Component function invoked during unit-of-work processing.
    Component(ComponentFn),
}

impl NodeType {
    /// Whether the old and new type at a tree position agree; the reconciler
    /// reuses a fiber only when they do.
    ///
    /// Text matches text regardless of value (the value is diffed at
    /// commit), host elements match by tag, components by function identity.
    pub fn same_kind(&self, other: &NodeType) -> bool {
        match (self, other) {
            (NodeType::Text(_), NodeType::Text(_)) => true,
            (NodeType::Host(a), NodeType::Host(b)) => a == b,
            (NodeType::Component(a), NodeType::Component(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Whether this is a component node.
    pub fn is_component(&self) -> bool {
        matches!(self, NodeType::Component(_))
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Text(value) => f.debug_tuple("Text").field(value).finish(),
            NodeType::Host(tag) => f.debug_tuple("Host").field(tag).finish(),
            NodeType::Component(func) => write!(f, "Component({:p})", Rc::as_ptr(func)),
        }
    }
}

/// Wrap a closure as a [`ComponentFn`].
///
/// Clone the returned Rc wherever the component is used; the reconciler
/// matches component positions by Rc identity, so a component created twice
/// from the same closure is two different types.
pub fn component(f: impl Fn(&mut RenderCtx, &Props) -> VNode + 'static) -> ComponentFn {
    Rc::new(f)
}

// =============================================================================
// Props
// =============================================================================

/// Ordered name/value attributes plus the declared children.
#[derive(Clone, Debug, Default)]
pub struct Props {
    /// Ordered name -> value mapping. `on`-prefixed names are listeners.
    pub attrs: Vec<(String, PropValue)>,
    /// Declared children, holes included.
    pub children: Vec<VChild>,
}

impl Props {
    /// Look up an attribute by name.
    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.attrs
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, v)| v)
    }
}

// =============================================================================
// Virtual Node
// =============================================================================

/// Immutable description of one node in the desired UI tree.
#[derive(Clone, Debug)]
pub struct VNode {
    pub ty: NodeType,
    pub props: Props,
}

impl VNode {
    /// Create a text leaf.
    pub fn text(value: impl Into<String>) -> VNode {
        VNode {
            ty: NodeType::Text(value.into()),
            props: Props::default(),
        }
    }

    /// Create a host element node.
    pub fn host(
        tag: impl Into<String>,
        attrs: Vec<(&str, PropValue)>,
        children: Vec<VChild>,
    ) -> VNode {
        VNode {
            ty: NodeType::Host(tag.into()),
            props: Props {
                attrs: attrs
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect(),
                children,
            },
        }
    }

    /// Create a component node.
    pub fn component(
        func: ComponentFn,
        attrs: Vec<(&str, PropValue)>,
        children: Vec<VChild>,
    ) -> VNode {
        VNode {
            ty: NodeType::Component(func),
            props: Props {
                attrs: attrs
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect(),
                children,
            },
        }
    }
}

// =============================================================================
// Child Coercion
// =============================================================================

/// One entry in a node's child list.
///
/// `Nothing` is the hole left by conditional rendering. It occupies a
/// position (the reconciler still consumes the old fiber at that position)
/// but materializes no fiber and no host node.
#[derive(Clone, Debug)]
pub enum VChild {
    Node(VNode),
    Nothing,
}

impl From<VNode> for VChild {
    fn from(node: VNode) -> Self {
        VChild::Node(node)
    }
}

impl From<&str> for VChild {
    fn from(value: &str) -> Self {
        VChild::Node(VNode::text(value))
    }
}

impl From<String> for VChild {
    fn from(value: String) -> Self {
        VChild::Node(VNode::text(value))
    }
}

impl From<i64> for VChild {
    fn from(value: i64) -> Self {
        VChild::Node(VNode::text(value.to_string()))
    }
}

impl From<i32> for VChild {
    fn from(value: i32) -> Self {
        VChild::Node(VNode::text(value.to_string()))
    }
}

impl From<f64> for VChild {
    fn from(value: f64) -> Self {
        VChild::Node(VNode::text(value.to_string()))
    }
}

impl<T: Into<VChild>> From<Option<T>> for VChild {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => VChild::Nothing,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text_value(child: &VChild) -> Option<&str> {
        match child {
            VChild::Node(VNode {
                ty: NodeType::Text(value),
                ..
            }) => Some(value.as_str()),
            _ => None,
        }
    }

    #[test]
    fn test_text_children_normalize() {
        let node = VNode::host(
            "div",
            vec![],
            vec!["hello".into(), 42i64.into(), VNode::host("span", vec![], vec![]).into()],
        );

        assert_eq!(text_value(&node.props.children[0]), Some("hello"));
        assert_eq!(text_value(&node.props.children[1]), Some("42"));
        assert!(matches!(
            &node.props.children[2],
            VChild::Node(VNode {
                ty: NodeType::Host(tag),
                ..
            }) if tag == "span"
        ));
    }

    #[test]
    fn test_option_children_become_holes() {
        let shown: Option<VNode> = None;
        let node = VNode::host("div", vec![], vec![shown.into(), Some("x").into()]);

        assert!(matches!(node.props.children[0], VChild::Nothing));
        assert_eq!(text_value(&node.props.children[1]), Some("x"));
    }

    #[test]
    fn test_same_kind() {
        let a = component(|_, _| VNode::text(""));
        let b = a.clone();
        let c = component(|_, _| VNode::text(""));

        assert!(NodeType::Component(a.clone()).same_kind(&NodeType::Component(b)));
        assert!(!NodeType::Component(a).same_kind(&NodeType::Component(c)));
        assert!(NodeType::Text("x".into()).same_kind(&NodeType::Text("y".into())));
        assert!(NodeType::Host("div".into()).same_kind(&NodeType::Host("div".into())));
        assert!(!NodeType::Host("div".into()).same_kind(&NodeType::Host("span".into())));
        assert!(!NodeType::Host("div".into()).same_kind(&NodeType::Text("div".into())));
    }

    #[test]
    fn test_props_get() {
        let node = VNode::host("div", vec![("id", "main".into()), ("tabIndex", 3i64.into())], vec![]);
        assert_eq!(node.props.get("id"), Some(&PropValue::Str("main".into())));
        assert_eq!(node.props.get("tabIndex"), Some(&PropValue::Int(3)));
        assert_eq!(node.props.get("class"), None);
    }

    proptest! {
        // Any mix of string and numeric children comes out as text leaves
        // carrying the printed value, in order.
        #[test]
        fn prop_scalar_children_normalize(values in prop::collection::vec(any::<i64>(), 0..8)) {
            let children: Vec<VChild> = values.iter().map(|v| VChild::from(*v)).collect();
            let node = VNode::host("ul", vec![], children);

            prop_assert_eq!(node.props.children.len(), values.len());
            for (child, value) in node.props.children.iter().zip(&values) {
                let expected = value.to_string();
                prop_assert_eq!(text_value(child), Some(expected.as_str()));
            }
        }
    }
}
