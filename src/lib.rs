//! # spark-fiber
//!
//! Incremental fiber-based UI reconciliation engine for Rust.
//!
//! Declarative [`VNode`] trees go in, minimal host mutations come out. The
//! engine keeps a persistent fiber tree across renders, diffs new
//! descriptions against it position by position, and applies the result to a
//! pluggable [`HostRenderer`] in one atomic commit. Component-local state
//! (hooks) survives re-renders; updates scoped to one component rebuild only
//! that branch.
//!
//! ## Architecture
//!
//! ```text
//! VNode tree → work loop (unit by unit, yieldable) → fiber tree (WIP)
//!                                                        │ commit
//!                                                        ▼
//!                              HostRenderer ← deletions + placements/updates
//! ```
//!
//! The work loop is cooperative: it processes one fiber at a time and polls
//! an injected [`Deadline`] between units, so the embedder decides how much
//! time each scheduling slot gets. Commit is never sliced; once a pass
//! finishes, deletions and mutations land back-to-back in the same slot.
//!
//! ## Modules
//!
//! - [`element`] - Virtual node model (types, props, child coercion)
//! - [`fiber`] - Persistent fiber tree and its arena
//! - [`hooks`] - `use_state` / `use_effect` / `use_update` and the render context
//! - [`engine`] - The engine: scheduler, reconciler, commit
//! - [`host`] - Host renderer trait and the in-memory implementation
//! - [`types`] - Foundation types (prop values, handles, callbacks)
//!
//! ## Example
//!
//! ```ignore
//! use spark_fiber::{component, Engine, MemoryHost, PropValue, VNode};
//!
//! let counter = component(|ctx, _props| {
//!     let (count, set_count) = ctx.use_state(0i64);
//!     VNode::host("div", vec![], vec![
//!         VNode::host("span", vec![], vec![count.into()]).into(),
//!         VNode::host("button", vec![
//!             ("onClick", PropValue::handler(move |engine| {
//!                 set_count.update(engine, |c| c + 1);
//!             })),
//!         ], vec![]).into(),
//!     ])
//! });
//!
//! let host = MemoryHost::new();
//! let container = host.create_root();
//! let mut engine = Engine::new(host.clone());
//! engine.render(VNode::component(counter, vec![], vec![]), container);
//! engine.run_to_idle()?;
//! ```

pub mod element;
pub mod engine;
pub mod fiber;
pub mod hooks;
pub mod host;
pub mod types;

// Re-export commonly used items
pub use element::{ComponentFn, NodeType, Props, VChild, VNode, component};

pub use engine::{Deadline, Engine, FrameBudget, Unlimited, YIELD_FLOOR};

pub use fiber::{EffectTag, FiberKey};

pub use hooks::{RenderCtx, StateHandle, UpdateHandle};

pub use host::{HostError, HostNodeKind, HostRenderer, MemoryHost, listener_event_name};

pub use types::{Cleanup, EventHandler, HostHandle, PropValue};
