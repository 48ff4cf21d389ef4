//! Hook store - Per-component state and effect cells.
//!
//! Hooks bind stateful storage to a component instance by call order: the
//! first `use_state` call in a render lands in slot 0, the second in slot 1,
//! and so on. The engine installs a fresh [`RenderCtx`] (the slot cursor plus
//! the fiber being rendered) for every component invocation, so hook calls
//! always know their target without ambient globals.
//!
//! Call order must be stable across renders of one component. The engine
//! does not detect a changed order; breaking this precondition silently
//! shears values across slots.
//!
//! # Example
//!
//! ```ignore
//! let counter = component(|ctx, _props| {
//!     let (count, set_count) = ctx.use_state(0i64);
//!
//!     ctx.use_effect(Some(vec![count.into()]), move || {
//!         // runs on mount and whenever `count` changed
//!         None
//!     });
//!
//!     VNode::host("button", vec![
//!         ("onClick", PropValue::handler(move |engine| {
//!             set_count.update(engine, |c| c + 1);
//!         })),
//!     ], vec![count.into()])
//! });
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::engine::Engine;
use crate::fiber::{EffectCell, FiberArena, FiberKey, StateCell};
use crate::types::{Cleanup, PropValue};

// =============================================================================
// Render Context
// =============================================================================

/// Hook cursor for the component currently being rendered.
///
/// Threaded explicitly into every component invocation; lives only for that
/// call.
pub struct RenderCtx<'a> {
    pub(crate) fibers: &'a mut FiberArena,
    /// The work-in-progress fiber being rendered.
    pub(crate) fiber: FiberKey,
    /// Same position in the previously committed tree, if any.
    pub(crate) alternate: Option<FiberKey>,
    pub(crate) state_cursor: usize,
}

impl RenderCtx<'_> {
    /// State cell for the current slot.
    ///
    /// On first render the cell is seeded with `initial`. On every render the
    /// updates enqueued since the previous one are folded, in arrival order,
    /// over the previous committed value; the queue is then cleared. Returns
    /// the folded value and a setter handle.
    pub fn use_state<T>(&mut self, initial: T) -> (T, StateHandle<T>)
    where
        T: Clone + PartialEq + 'static,
    {
        let slot = self.state_cursor;
        self.state_cursor += 1;

        // The queue stays on the committed cell until that generation is
        // swept at commit. Taking it here instead would lose updates when
        // this pass gets superseded before committing.
        let (previous, queue) = match self.alternate.and_then(|a| self.fibers.get(a)) {
            Some(alt) if slot < alt.state_hooks.len() => {
                let cell = &alt.state_hooks[slot];
                (cell.value.clone(), cell.queue.clone())
            }
            _ => (Rc::new(initial.clone()) as Rc<dyn Any>, Vec::new()),
        };

        let mut value = previous;
        for action in queue {
            value = action(value);
        }
        let current = value.downcast_ref::<T>().cloned().unwrap_or(initial);

        self.fibers[self.fiber].state_hooks.push(StateCell {
            value: Rc::new(current.clone()),
            queue: Vec::new(),
        });

        let handle = StateHandle {
            fiber: self.fiber,
            slot,
            _marker: PhantomData,
        };
        (current, handle)
    }

    /// Effect cell for the current slot.
    ///
    /// `deps` are captured by value and compared index-wise on the next
    /// render; see the commit engine for the re-run policy. `None` deps means
    /// the effect runs on mount only.
    pub fn use_effect<F>(&mut self, deps: Option<Vec<PropValue>>, callback: F)
    where
        F: Fn() -> Option<Cleanup> + 'static,
    {
        self.fibers[self.fiber].effect_hooks.push(EffectCell {
            callback: Rc::new(callback),
            deps,
            cleanup: None,
        });
    }

    /// Handle that re-renders this component on demand, without any state
    /// change.
    pub fn use_update(&mut self) -> UpdateHandle {
        UpdateHandle { fiber: self.fiber }
    }
}

// =============================================================================
// State Handle
// =============================================================================

/// Setter half of a `use_state` pair.
///
/// Copyable; captures the owning fiber and slot, not the value. A handle
/// outliving its fiber (the component unmounted or re-rendered away) becomes
/// inert: dispatching through it is a no-op.
pub struct StateHandle<T> {
    pub(crate) fiber: FiberKey,
    pub(crate) slot: usize,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for StateHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StateHandle<T> {}

impl<T> StateHandle<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Replace the state with a value.
    ///
    /// Bails out without scheduling when the value equals the current one.
    pub fn set(&self, engine: &mut Engine, value: T) {
        engine.apply_state(self.fiber, self.slot, StateUpdate::Set(value));
    }

    /// Replace the state by applying a function to the current value.
    ///
    /// The next value is computed eagerly for the bail-out check; if it goes
    /// through, the function is enqueued and folded again on the next render.
    pub fn update(&self, engine: &mut Engine, f: impl Fn(&T) -> T + 'static) {
        engine.apply_state(self.fiber, self.slot, StateUpdate::Map(Rc::new(f)));
    }
}

/// A pending state update: direct replacement or a function of the previous
/// value.
pub(crate) enum StateUpdate<T> {
    Set(T),
    Map(Rc<dyn Fn(&T) -> T>),
}

// =============================================================================
// Update Handle
// =============================================================================

/// Re-render trigger bound to a component instance.
#[derive(Clone, Copy)]
pub struct UpdateHandle {
    pub(crate) fiber: FiberKey,
}

impl UpdateHandle {
    /// Schedule a re-render of the owning component. Inert if the component
    /// is gone.
    pub fn trigger(&self, engine: &mut Engine) {
        engine.schedule_fiber(self.fiber);
    }
}
