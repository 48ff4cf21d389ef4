//! Reconciler - Positional child diff.
//!
//! Walks the new child list and the old sibling chain in lock-step by
//! position. Matching is purely positional: the type at each position is
//! compared, never identity across positions. Inserting or removing an
//! element ahead of siblings of a different type therefore replaces those
//! siblings instead of shifting them; that trade keeps the diff linear and
//! allocation-free per position.

use tracing::trace;

use crate::element::{VChild, VNode};
use crate::fiber::{EffectTag, Fiber, FiberKey};

use super::Engine;

impl Engine {
    /// Build the child fibers of `wip` from its new child list, tagging each
    /// with the effect to apply at commit and queueing obsolete old fibers
    /// for deletion.
    pub(crate) fn reconcile_children(&mut self, wip: FiberKey, children: Vec<VChild>) {
        let mut old = self.fibers[wip]
            .alternate
            .and_then(|alt| self.fibers.get(alt))
            .and_then(|alt| alt.child);
        let mut prev: Option<FiberKey> = None;

        for child in children {
            let old_key = old;
            old = old_key
                .and_then(|o| self.fibers.get(o))
                .and_then(|o| o.sibling);

            let new_key = match child {
                VChild::Node(node) => Some(self.reconcile_position(wip, old_key, node)),
                VChild::Nothing => {
                    // A hole still occupies its position; whatever used to
                    // live there is gone.
                    if let Some(o) = old_key {
                        self.deletions.push(o);
                    }
                    None
                }
            };

            if let Some(key) = new_key {
                match prev {
                    None => self.fibers[wip].child = Some(key),
                    Some(p) => self.fibers[p].sibling = Some(key),
                }
                prev = Some(key);
            }
        }

        // Old positions beyond the end of the new list.
        while let Some(o) = old {
            self.deletions.push(o);
            old = self.fibers.get(o).and_then(|f| f.sibling);
        }
    }

    /// One position: reuse the old fiber when the type agrees, otherwise
    /// replace it.
    fn reconcile_position(
        &mut self,
        wip: FiberKey,
        old_key: Option<FiberKey>,
        node: VNode,
    ) -> FiberKey {
        match old_key {
            Some(o)
                if self
                    .fibers
                    .get(o)
                    .is_some_and(|f| f.ty.same_kind(&node.ty)) =>
            {
                let host = self.fibers[o].host;
                let mut fiber = Fiber::new(node.ty, node.props);
                fiber.parent = Some(wip);
                fiber.host = host;
                fiber.alternate = Some(o);
                fiber.effect = EffectTag::Update;
                trace!(?o, "reuse fiber");
                self.fibers.insert(fiber)
            }
            _ => {
                if let Some(o) = old_key {
                    self.deletions.push(o);
                }
                let mut fiber = Fiber::new(node.ty, node.props);
                fiber.parent = Some(wip);
                fiber.effect = EffectTag::Placement;
                self.fibers.insert(fiber)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::element::{VChild, VNode};
    use crate::engine::Engine;
    use crate::host::MemoryHost;
    use crate::types::HostHandle;

    fn setup() -> (MemoryHost, Engine, HostHandle) {
        let host = MemoryHost::new();
        let container = host.create_root();
        let engine = Engine::new(host.clone());
        (host, engine, container)
    }

    fn div(children: Vec<VChild>) -> VNode {
        VNode::host("div", vec![], children)
    }

    fn leaf(tag: &str) -> VChild {
        VNode::host(tag, vec![], vec![]).into()
    }

    #[test]
    fn test_mount_builds_host_tree() {
        let (host, mut engine, container) = setup();

        engine.render(div(vec![leaf("x"), "hi".into()]), container);
        engine.run_to_idle().unwrap();

        assert_eq!(host.markup(container), "<root><div><x></x>hi</div></root>");
        assert!(engine.is_idle());
    }

    #[test]
    fn test_middle_removal_is_positional() {
        let (host, mut engine, container) = setup();

        engine.render(div(vec![leaf("x"), leaf("y"), leaf("z")]), container);
        engine.run_to_idle().unwrap();

        let outer = host.children(container)[0];
        let before = host.children(outer);
        assert_eq!(before.len(), 3);

        engine.render(div(vec![leaf("x"), leaf("z")]), container);
        engine.run_to_idle().unwrap();

        let after = host.children(outer);
        assert_eq!(host.markup(outer), "<div><x></x><z></z></div>");
        // x matched its position and kept its node; z landed in y's position,
        // where the types differ, so the old y and old z were both dropped
        // and a fresh z was created.
        assert_eq!(after[0], before[0]);
        assert_ne!(after[1], before[2]);
        assert!(!host.contains(before[1]));
        assert!(!host.contains(before[2]));
    }

    #[test]
    fn test_same_type_shift_reuses_by_position() {
        let (host, mut engine, container) = setup();

        let item = |text: &str| VNode::host("li", vec![], vec![text.into()]).into();
        engine.render(div(vec![item("a"), item("b"), item("c")]), container);
        engine.run_to_idle().unwrap();

        let outer = host.children(container)[0];
        let before = host.children(outer);

        engine.render(div(vec![item("a"), item("c")]), container);
        engine.run_to_idle().unwrap();

        let after = host.children(outer);
        assert_eq!(host.markup(outer), "<div><li>a</li><li>c</li></div>");
        // The second li is the old b node with its text rewritten.
        assert_eq!(after[1], before[1]);
        assert!(!host.contains(before[2]));
    }

    #[test]
    fn test_type_change_replaces_node() {
        let (host, mut engine, container) = setup();

        engine.render(div(vec![leaf("a")]), container);
        engine.run_to_idle().unwrap();
        let outer = host.children(container)[0];
        let old_a = host.children(outer)[0];

        engine.render(div(vec![leaf("b")]), container);
        engine.run_to_idle().unwrap();

        assert!(!host.contains(old_a));
        assert_eq!(host.markup(outer), "<div><b></b></div>");
    }

    #[test]
    fn test_nothing_hole_consumes_position() {
        let (host, mut engine, container) = setup();

        engine.render(div(vec![leaf("span"), leaf("p")]), container);
        engine.run_to_idle().unwrap();
        let outer = host.children(container)[0];
        let old_p = host.children(outer)[1];

        engine.render(div(vec![VChild::Nothing, leaf("p")]), container);
        engine.run_to_idle().unwrap();

        // The hole took the span's position; p stayed matched to its own.
        assert_eq!(host.markup(outer), "<div><p></p></div>");
        assert_eq!(host.children(outer)[0], old_p);
    }

    #[test]
    fn test_list_growth_appends_placements() {
        let (host, mut engine, container) = setup();

        engine.render(div(vec![leaf("a")]), container);
        engine.run_to_idle().unwrap();
        let outer = host.children(container)[0];
        let old_a = host.children(outer)[0];

        engine.render(div(vec![leaf("a"), leaf("b"), leaf("c")]), container);
        engine.run_to_idle().unwrap();

        assert_eq!(host.markup(outer), "<div><a></a><b></b><c></c></div>");
        assert_eq!(host.children(outer)[0], old_a);
    }

    #[test]
    fn test_arena_stays_bounded_across_renders() {
        let (_host, mut engine, container) = setup();

        engine.render(div(vec![leaf("a"), leaf("b")]), container);
        engine.run_to_idle().unwrap();
        let baseline = engine.fiber_count();

        for _ in 0..5 {
            engine.render(div(vec![leaf("a"), leaf("b")]), container);
            engine.run_to_idle().unwrap();
            assert_eq!(engine.fiber_count(), baseline);
        }
    }
}
