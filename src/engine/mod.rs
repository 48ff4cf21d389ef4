//! Engine - Scheduler state and the cooperative work loop.
//!
//! The [`Engine`] owns everything: the fiber arena, the boxed host renderer,
//! and the scheduler cursors (`next_unit`, `wip_root`, `current_root`,
//! pending deletions). The embedding application creates one and drives it;
//! there is no module-level state anywhere in the crate.
//!
//! # Work loop
//!
//! ```text
//! render()/setter ─> install wip root ─> run_slot() x N ─> commit ─> current
//! ```
//!
//! [`Engine::run_slot`] processes units of work depth-first, left-to-right,
//! and polls the injected [`Deadline`] between units, yielding once the slot
//! is nearly exhausted. The contract with the slot provider is minimal: keep
//! calling `run_slot` while it returns `true`. When the last unit of a pass
//! completes, the commit runs inside the same slot, so an outside observer
//! only ever sees the host tree fully before or fully after an update.
//!
//! A pass scoped to one component (installed by a state setter) is bounded
//! at its own root: the unit walk never ascends past `wip_root`, so sibling
//! branches of the tree are neither re-rendered nor touched.
//!
//! A new update request arriving while a pass is unfinished discards that
//! pass wholesale (last writer wins): its fibers are freed, host nodes it
//! created are released, and its queued deletions are dropped, so nothing of
//! the abandoned pass can ever reach the host tree.

pub mod deadline;

mod commit;
mod reconcile;

pub use deadline::{Deadline, FrameBudget, Unlimited, YIELD_FLOOR};

use std::any::Any;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::element::{NodeType, Props, VChild, VNode};
use crate::fiber::{EffectTag, ErasedUpdate, Fiber, FiberArena, FiberKey};
use crate::hooks::{RenderCtx, StateUpdate};
use crate::host::{HostError, HostNodeKind, HostRenderer};
use crate::types::HostHandle;

// =============================================================================
// Engine
// =============================================================================

/// The reconciliation engine: fiber arena, host renderer, scheduler cursors.
pub struct Engine {
    pub(crate) fibers: FiberArena,
    pub(crate) host: Box<dyn HostRenderer>,
    /// Fiber awaiting processing, if a pass is in flight.
    next_unit: Option<FiberKey>,
    /// Root of the tree being built, if a pass is in flight.
    wip_root: Option<FiberKey>,
    /// Root of the last committed tree.
    current_root: Option<FiberKey>,
    /// Old fibers to remove at the next commit.
    pub(crate) deletions: Vec<FiberKey>,
}

impl Engine {
    /// Create an engine rendering into `host`.
    pub fn new(host: impl HostRenderer + 'static) -> Self {
        Self {
            fibers: FiberArena::new(),
            host: Box::new(host),
            next_unit: None,
            wip_root: None,
            current_root: None,
            deletions: Vec::new(),
        }
    }

    /// The host renderer.
    pub fn host(&self) -> &dyn HostRenderer {
        &*self.host
    }

    /// The host renderer, mutably.
    pub fn host_mut(&mut self) -> &mut dyn HostRenderer {
        &mut *self.host
    }

    /// Whether no pass is pending or in flight.
    pub fn is_idle(&self) -> bool {
        self.next_unit.is_none() && self.wip_root.is_none()
    }

    /// Number of live fibers across the current and in-progress trees.
    pub fn fiber_count(&self) -> usize {
        self.fibers.len()
    }

    // -------------------------------------------------------------------------
    // Root Updates
    // -------------------------------------------------------------------------

    /// Install a work-in-progress root for `el` inside `container`.
    ///
    /// The first call mounts the tree; a later call reconciles against the
    /// committed one. Work starts on the next `run_slot`.
    pub fn render(&mut self, el: VNode, container: HostHandle) {
        self.discard_wip();

        let mut root = Fiber::new(
            NodeType::Host("root".to_string()),
            Props {
                attrs: Vec::new(),
                children: vec![VChild::Node(el)],
            },
        );
        root.host = Some(container);
        root.alternate = self.current_root;

        let key = self.fibers.insert(root);
        self.wip_root = Some(key);
        self.next_unit = Some(key);
        debug!(?key, "root render installed");
    }

    /// Install a work-in-progress root scoped to one committed fiber.
    ///
    /// Used by state setters and update handles. Inert when the fiber has
    /// been released since the handle was created.
    pub(crate) fn schedule_fiber(&mut self, key: FiberKey) {
        if !self.fibers.contains(key) {
            debug!("dropping update for a released fiber");
            return;
        }
        self.discard_wip();
        if !self.fibers.contains(key) {
            // The target belonged to the pass that was just discarded.
            debug!("dropping update for a discarded in-progress fiber");
            return;
        }

        let (ty, props, parent, host) = {
            let fiber = &self.fibers[key];
            (fiber.ty.clone(), fiber.props.clone(), fiber.parent, fiber.host)
        };
        let mut wip = Fiber::new(ty, props);
        wip.parent = parent;
        wip.host = host;
        wip.alternate = Some(key);

        let wip_key = self.fibers.insert(wip);
        self.wip_root = Some(wip_key);
        self.next_unit = Some(wip_key);
        debug!(?key, "component update installed");
    }

    /// Apply a state update to a hook slot: eager bail-out on equality,
    /// otherwise enqueue and schedule the owning component.
    pub(crate) fn apply_state<T>(&mut self, fiber: FiberKey, slot: usize, update: StateUpdate<T>)
    where
        T: Clone + PartialEq + 'static,
    {
        let Some(target) = self.fibers.get(fiber) else {
            debug!("dropping state update for a released fiber");
            return;
        };
        let Some(cell) = target.state_hooks.get(slot) else {
            return;
        };
        let Some(current) = cell.value.downcast_ref::<T>() else {
            return;
        };

        let next = match &update {
            StateUpdate::Set(value) => value.clone(),
            StateUpdate::Map(f) => f(current),
        };
        if next == *current {
            trace!("state unchanged, bailing out");
            return;
        }

        let erased: ErasedUpdate = match update {
            StateUpdate::Set(value) => {
                let next: Rc<dyn Any> = Rc::new(value);
                Rc::new(move |_prev| next.clone())
            }
            StateUpdate::Map(f) => Rc::new(move |prev: Rc<dyn Any>| {
                let mapped = prev.downcast_ref::<T>().map(|t| f(t));
                match mapped {
                    Some(next) => Rc::new(next) as Rc<dyn Any>,
                    None => prev,
                }
            }),
        };
        self.fibers[fiber].state_hooks[slot].queue.push(erased);
        self.schedule_fiber(fiber);
    }

    // -------------------------------------------------------------------------
    // Work Loop
    // -------------------------------------------------------------------------

    /// Run one scheduling slot.
    ///
    /// Processes units until the deadline is nearly exhausted or no unit
    /// remains; commits in the same slot when the pass finished. Returns
    /// whether work remains (keep granting slots while `true`).
    pub fn run_slot(&mut self, deadline: &dyn Deadline) -> Result<bool, HostError> {
        while let Some(unit) = self.next_unit {
            self.next_unit = self.perform_unit(unit)?;
            if deadline.time_remaining() < YIELD_FLOOR {
                break;
            }
        }
        if self.next_unit.is_none() && self.wip_root.is_some() {
            self.commit_root()?;
        }
        Ok(self.next_unit.is_some())
    }

    /// Drive `run_slot` with an unlimited deadline until idle.
    pub fn run_to_idle(&mut self) -> Result<(), HostError> {
        while self.run_slot(&Unlimited)? {}
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Unit Of Work
    // -------------------------------------------------------------------------

    /// Process one fiber and return the next unit, if any.
    fn perform_unit(&mut self, key: FiberKey) -> Result<Option<FiberKey>, HostError> {
        trace!(?key, "perform unit");
        if self.fibers[key].ty.is_component() {
            self.update_component(key);
        } else {
            self.update_host(key)?;
        }
        Ok(self.next_after(key))
    }

    /// Invoke a component with a fresh hook cursor and reconcile its single
    /// rendered child.
    fn update_component(&mut self, key: FiberKey) {
        let (func, props, alternate) = {
            let fiber = &self.fibers[key];
            let NodeType::Component(func) = &fiber.ty else {
                return;
            };
            (func.clone(), fiber.props.clone(), fiber.alternate)
        };

        let child = {
            let mut ctx = RenderCtx {
                fibers: &mut self.fibers,
                fiber: key,
                alternate,
                state_cursor: 0,
            };
            func(&mut ctx, &props)
        };
        self.reconcile_children(key, vec![VChild::Node(child)]);
    }

    /// Ensure a host node exists for a host/text fiber (created detached,
    /// with all props applied) and reconcile its declared children.
    fn update_host(&mut self, key: FiberKey) -> Result<(), HostError> {
        if self.fibers[key].host.is_none() {
            let handle = match &self.fibers[key].ty {
                NodeType::Host(tag) => self.host.create_node(HostNodeKind::Element(tag))?,
                NodeType::Text(value) => self.host.create_node(HostNodeKind::Text(value))?,
                NodeType::Component(_) => return Ok(()),
            };
            let attrs = self.fibers[key].props.attrs.clone();
            self.apply_prop_diff(handle, &[], &attrs)?;
            self.fibers[key].host = Some(handle);
        }

        let children = self.fibers[key].props.children.clone();
        self.reconcile_children(key, children);
        Ok(())
    }

    /// Next unit after `key`: first child, else the nearest ancestor's next
    /// sibling. The walk never ascends past the work-in-progress root, so a
    /// scoped pass ends when its branch is exhausted.
    fn next_after(&self, key: FiberKey) -> Option<FiberKey> {
        if let Some(child) = self.fibers[key].child {
            return Some(child);
        }
        let mut cursor = key;
        loop {
            if Some(cursor) == self.wip_root {
                return None;
            }
            let fiber = &self.fibers[cursor];
            if let Some(sibling) = fiber.sibling {
                return Some(sibling);
            }
            cursor = fiber.parent?;
        }
    }

    // -------------------------------------------------------------------------
    // Supersession
    // -------------------------------------------------------------------------

    /// Drop an unfinished pass: free its fibers, release host nodes it
    /// created, clear its queued deletions.
    fn discard_wip(&mut self) {
        self.next_unit = None;
        let Some(wip) = self.wip_root.take() else {
            return;
        };
        debug!(?wip, "discarding unfinished pass");
        self.deletions.clear();

        for key in self.fibers.subtree_keys(wip) {
            let fiber = &self.fibers[key];
            if fiber.effect == EffectTag::Placement {
                if let Some(handle) = fiber.host {
                    // Created detached during the abandoned pass, never attached.
                    let _ = self.host.remove_node(handle);
                }
            }
        }
        self.fibers.free_subtree(wip);
    }

    // -------------------------------------------------------------------------
    // Commit Accessors (used by the commit impl)
    // -------------------------------------------------------------------------

    pub(crate) fn take_wip_root(&mut self) -> Option<FiberKey> {
        self.wip_root.take()
    }

    pub(crate) fn set_current_root(&mut self, key: FiberKey) {
        self.current_root = Some(key);
    }

    #[cfg(test)]
    pub(crate) fn current_root(&self) -> Option<FiberKey> {
        self.current_root
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    use crate::element::{VNode, component};
    use crate::engine::{Engine, FrameBudget};
    use crate::hooks::{StateHandle, UpdateHandle};
    use crate::host::MemoryHost;
    use crate::types::HostHandle;

    fn setup() -> (MemoryHost, Engine, HostHandle) {
        let host = MemoryHost::new();
        let container = host.create_root();
        let engine = Engine::new(host.clone());
        (host, engine, container)
    }

    #[test]
    fn test_pass_is_time_sliced_and_commit_is_atomic() {
        let (host, mut engine, container) = setup();
        let tree = VNode::host(
            "div",
            vec![],
            vec![
                VNode::host("a", vec![], vec![]).into(),
                VNode::host("b", vec![], vec![]).into(),
                VNode::host("c", vec![], vec![]).into(),
            ],
        );
        engine.render(tree, container);

        let mut slots = 0;
        loop {
            let more = engine.run_slot(&FrameBudget::new(Duration::ZERO)).unwrap();
            slots += 1;
            if !more {
                break;
            }
            // Mid-pass, nothing has reached the host tree yet.
            assert!(host.children(container).is_empty());
            assert!(slots < 100);
        }

        assert!(slots > 1, "an exhausted budget must force multiple slots");
        assert_eq!(
            host.markup(container),
            "<root><div><a></a><b></b><c></c></div></root>"
        );
        assert!(engine.is_idle());
    }

    #[test]
    fn test_scoped_update_leaves_siblings_alone() {
        let (host, mut engine, container) = setup();
        let a_renders = Rc::new(Cell::new(0));
        let b_renders = Rc::new(Cell::new(0));
        let update_slot: Rc<Cell<Option<UpdateHandle>>> = Rc::new(Cell::new(None));

        let a = {
            let renders = a_renders.clone();
            let slot = update_slot.clone();
            component(move |ctx, _| {
                renders.set(renders.get() + 1);
                slot.set(Some(ctx.use_update()));
                VNode::host("a", vec![], vec![])
            })
        };
        let b = {
            let renders = b_renders.clone();
            component(move |_ctx, _| {
                renders.set(renders.get() + 1);
                VNode::host("b", vec![], vec![])
            })
        };

        engine.render(
            VNode::host(
                "div",
                vec![],
                vec![
                    VNode::component(a, vec![], vec![]).into(),
                    VNode::component(b, vec![], vec![]).into(),
                ],
            ),
            container,
        );
        engine.run_to_idle().unwrap();
        assert_eq!((a_renders.get(), b_renders.get()), (1, 1));

        let div = host.children(container)[0];
        let b_node = host.children(div)[1];

        update_slot.get().unwrap().trigger(&mut engine);
        engine.run_to_idle().unwrap();

        assert_eq!((a_renders.get(), b_renders.get()), (2, 1));
        assert_eq!(host.children(div)[1], b_node);
        assert_eq!(host.markup(div), "<div><a></a><b></b></div>");
    }

    #[test]
    fn test_setter_with_equal_value_schedules_nothing() {
        let (host, mut engine, container) = setup();
        let set_slot: Rc<RefCell<Option<StateHandle<i64>>>> = Rc::new(RefCell::new(None));

        let counter = {
            let slot = set_slot.clone();
            component(move |ctx, _| {
                let (count, set_count) = ctx.use_state(0i64);
                *slot.borrow_mut() = Some(set_count);
                VNode::host("span", vec![], vec![count.into()])
            })
        };
        engine.render(VNode::component(counter, vec![], vec![]), container);
        engine.run_to_idle().unwrap();
        host.clear_ops();

        let handle = (*set_slot.borrow()).unwrap();
        handle.set(&mut engine, 0);

        assert!(engine.is_idle());
        assert!(host.ops().is_empty());
    }

    #[test]
    fn test_stale_state_handle_is_inert() {
        let (host, mut engine, container) = setup();
        let set_slot: Rc<RefCell<Option<StateHandle<i64>>>> = Rc::new(RefCell::new(None));

        let counter = {
            let slot = set_slot.clone();
            component(move |ctx, _| {
                let (count, set_count) = ctx.use_state(0i64);
                *slot.borrow_mut() = Some(set_count);
                VNode::host("span", vec![], vec![count.into()])
            })
        };
        engine.render(VNode::component(counter, vec![], vec![]), container);
        engine.run_to_idle().unwrap();

        // Replace the counter with a different type; its fiber is released.
        engine.render(VNode::host("p", vec![], vec![]), container);
        engine.run_to_idle().unwrap();

        let handle = (*set_slot.borrow()).unwrap();
        handle.set(&mut engine, 5);

        assert!(engine.is_idle());
        assert_eq!(host.markup(container), "<root><p></p></root>");
    }

    #[test]
    fn test_superseded_pass_loses_no_updates() {
        let (host, mut engine, container) = setup();
        let set_slot: Rc<RefCell<Option<StateHandle<i64>>>> = Rc::new(RefCell::new(None));

        let counter = {
            let slot = set_slot.clone();
            component(move |ctx, _| {
                let (count, set_count) = ctx.use_state(0i64);
                *slot.borrow_mut() = Some(set_count);
                VNode::host("span", vec![], vec![count.into()])
            })
        };
        engine.render(VNode::component(counter, vec![], vec![]), container);
        engine.run_to_idle().unwrap();
        let baseline = engine.fiber_count();

        let handle = (*set_slot.borrow()).unwrap();
        handle.update(&mut engine, |c| c + 1);
        // Start the pass but leave it unfinished.
        engine.run_slot(&FrameBudget::new(Duration::ZERO)).unwrap();
        // Second update discards the unfinished pass; the first increment
        // must still land.
        handle.update(&mut engine, |c| c + 1);
        engine.run_to_idle().unwrap();

        assert_eq!(host.markup(container), "<root><span>2</span></root>");
        assert_eq!(engine.fiber_count(), baseline);
        assert!(engine.is_idle());
    }

    #[test]
    fn test_rerender_swaps_current_root() {
        let (_host, mut engine, container) = setup();

        engine.render(VNode::host("p", vec![], vec![]), container);
        engine.run_to_idle().unwrap();
        let first_root = engine.current_root();

        engine.render(VNode::host("p", vec![], vec![]), container);
        engine.run_to_idle().unwrap();
        let second_root = engine.current_root();

        assert!(first_root.is_some());
        assert!(second_root.is_some());
        assert_ne!(first_root, second_root);
    }
}
