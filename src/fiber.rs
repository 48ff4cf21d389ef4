//! Fiber tree - Persistent render state, one node per virtual-node position.
//!
//! Fibers live in an arena keyed by generation-checked [`FiberKey`]s. All
//! tree links (`parent`, `child`, `sibling`, `alternate`) are keys, so old
//! generations can be freed without dangling pointers: a stale key simply
//! fails to resolve.
//!
//! Lifecycle of a fiber:
//! 1. Created by the reconciler during a work-in-progress pass.
//! 2. Becomes part of the current tree at commit.
//! 3. Survives one more generation as the `alternate` of the fiber built at
//!    the same position in the next pass.
//! 4. Freed by the post-commit sweep, the deletion phase, or the discard of
//!    an abandoned pass.

use std::any::Any;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};

use crate::element::{NodeType, Props};
use crate::types::{Cleanup, HostHandle, PropValue};

new_key_type! {
    /// Generation-checked key into the fiber arena.
    pub struct FiberKey;
}

// =============================================================================
// Effect Tag
// =============================================================================

/// Commit-time marker set by the reconciler.
///
/// Deletions are tracked in a separate list on the engine, not as a tag:
/// a fiber queued for deletion belongs to the old tree, while tags describe
/// fibers of the new one.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum EffectTag {
    /// Nothing to apply (seeded roots).
    #[default]
    None,
    /// Fresh fiber; its host node (if any) gets inserted at commit.
    Placement,
    /// Reused fiber; props are diffed against the alternate at commit.
    Update,
}

// =============================================================================
// Hook Cells
// =============================================================================

/// Type-erased queued state update: previous value in, next value out.
pub(crate) type ErasedUpdate = Rc<dyn Fn(Rc<dyn Any>) -> Rc<dyn Any>>;

/// Storage cell behind one `use_state` slot.
pub struct StateCell {
    /// Current value, type-erased. Typed access goes through the hook API.
    pub(crate) value: Rc<dyn Any>,
    /// Updates enqueued by setters since the last render, in arrival order.
    pub(crate) queue: Vec<ErasedUpdate>,
}

/// Storage cell behind one `use_effect` slot.
pub struct EffectCell {
    pub(crate) callback: Rc<dyn Fn() -> Option<Cleanup>>,
    /// Captured dependency values; `None` means the effect only ever runs on
    /// mount.
    pub(crate) deps: Option<Vec<PropValue>>,
    /// Cleanup returned by the last invocation, if any.
    pub(crate) cleanup: Option<Cleanup>,
}

// =============================================================================
// Fiber
// =============================================================================

/// One node of the persistent render tree.
///
/// Exactly one of these holds per fiber: a host-element or text fiber owns a
/// `host` handle, a component fiber owns none and is looked through when the
/// commit walk needs a host parent.
pub struct Fiber {
    pub(crate) ty: NodeType,
    pub(crate) props: Props,
    pub(crate) parent: Option<FiberKey>,
    pub(crate) child: Option<FiberKey>,
    pub(crate) sibling: Option<FiberKey>,
    /// Fiber at the same position in the previously committed tree.
    pub(crate) alternate: Option<FiberKey>,
    pub(crate) host: Option<HostHandle>,
    pub(crate) effect: EffectTag,
    pub(crate) state_hooks: Vec<StateCell>,
    pub(crate) effect_hooks: Vec<EffectCell>,
}

impl Fiber {
    /// A fresh unlinked fiber for a virtual node.
    pub(crate) fn new(ty: NodeType, props: Props) -> Self {
        Self {
            ty,
            props,
            parent: None,
            child: None,
            sibling: None,
            alternate: None,
            host: None,
            effect: EffectTag::None,
            state_hooks: Vec::new(),
            effect_hooks: Vec::new(),
        }
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Arena holding every live fiber of the current and in-progress trees.
pub struct FiberArena {
    fibers: SlotMap<FiberKey, Fiber>,
}

impl FiberArena {
    pub fn new() -> Self {
        Self {
            fibers: SlotMap::with_key(),
        }
    }

    pub(crate) fn insert(&mut self, fiber: Fiber) -> FiberKey {
        self.fibers.insert(fiber)
    }

    pub(crate) fn get(&self, key: FiberKey) -> Option<&Fiber> {
        self.fibers.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: FiberKey) -> Option<&mut Fiber> {
        self.fibers.get_mut(key)
    }

    pub(crate) fn contains(&self, key: FiberKey) -> bool {
        self.fibers.contains_key(key)
    }

    /// Remove a single fiber, leaving its subtree alone.
    pub(crate) fn remove(&mut self, key: FiberKey) -> Option<Fiber> {
        self.fibers.remove(key)
    }

    /// Number of live fibers.
    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    /// Keys of `root` and every descendant, preorder. Siblings of `root`
    /// itself are not included.
    pub(crate) fn subtree_keys(&self, root: FiberKey) -> Vec<FiberKey> {
        let mut keys = Vec::new();
        if !self.fibers.contains_key(root) {
            return keys;
        }
        keys.push(root);
        if let Some(child) = self.fibers[root].child {
            self.collect_chain(child, &mut keys);
        }
        keys
    }

    fn collect_chain(&self, first: FiberKey, out: &mut Vec<FiberKey>) {
        let mut next = Some(first);
        while let Some(key) = next {
            let Some(fiber) = self.fibers.get(key) else { break };
            out.push(key);
            if let Some(child) = fiber.child {
                self.collect_chain(child, out);
            }
            next = fiber.sibling;
        }
    }

    /// Free `root` and its whole subtree. Sibling chains of `root` itself
    /// survive; alternates are never followed.
    pub(crate) fn free_subtree(&mut self, root: FiberKey) {
        for key in self.subtree_keys(root) {
            self.fibers.remove(key);
        }
    }
}

impl Default for FiberArena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<FiberKey> for FiberArena {
    type Output = Fiber;

    fn index(&self, key: FiberKey) -> &Fiber {
        &self.fibers[key]
    }
}

impl std::ops::IndexMut<FiberKey> for FiberArena {
    fn index_mut(&mut self, key: FiberKey) -> &mut Fiber {
        &mut self.fibers[key]
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::NodeType;

    fn host_fiber(tag: &str) -> Fiber {
        Fiber::new(NodeType::Host(tag.into()), Props::default())
    }

    // root -> (a -> (a1, a2), b)
    fn small_tree(arena: &mut FiberArena) -> (FiberKey, FiberKey, FiberKey) {
        let root = arena.insert(host_fiber("root"));
        let a = arena.insert(host_fiber("a"));
        let b = arena.insert(host_fiber("b"));
        let a1 = arena.insert(host_fiber("a1"));
        let a2 = arena.insert(host_fiber("a2"));

        arena[root].child = Some(a);
        arena[a].parent = Some(root);
        arena[a].sibling = Some(b);
        arena[b].parent = Some(root);
        arena[a].child = Some(a1);
        arena[a1].parent = Some(a);
        arena[a1].sibling = Some(a2);
        arena[a2].parent = Some(a);

        (root, a, b)
    }

    #[test]
    fn test_subtree_keys_preorder() {
        let mut arena = FiberArena::new();
        let (root, a, _b) = small_tree(&mut arena);

        let keys = arena.subtree_keys(root);
        assert_eq!(keys.len(), 5);
        assert_eq!(keys[0], root);

        // Subtree of `a` excludes its sibling `b`.
        let keys = arena.subtree_keys(a);
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0], a);
    }

    #[test]
    fn test_free_subtree_spares_siblings() {
        let mut arena = FiberArena::new();
        let (_root, a, b) = small_tree(&mut arena);

        arena.free_subtree(a);
        assert!(!arena.contains(a));
        assert!(arena.contains(b));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_stale_key_resolves_to_none() {
        let mut arena = FiberArena::new();
        let key = arena.insert(host_fiber("div"));
        arena.remove(key);

        assert!(arena.get(key).is_none());
        assert!(arena.subtree_keys(key).is_empty());
    }
}
