//! Commit engine - Atomic application of a finished pass.
//!
//! Two sub-phases, always back-to-back inside one scheduling slot:
//!
//! 1. **Deletion phase** - queued old fibers lose their host nodes (component
//!    fibers delegate to the nearest descendant that owns one), their stored
//!    effect cleanups run, and their subtrees are freed from the arena.
//! 2. **Mutation phase** - a depth-first walk of the finished tree applies
//!    placements (insert into the nearest ancestor host node) and updates
//!    (prop diff against the alternate, text rewrite for text fibers), then
//!    effect hooks run: first every due cleanup from the previous tree, in
//!    tree order, then the due callbacks.
//!
//! Afterwards the finished tree becomes current. A whole-tree pass replaces
//! the root; a scoped pass is grafted in place of its alternate. A final
//! sweep frees each committed fiber's alternate, so the arena never holds
//! more than the live generations.
//!
//! A host error aborts the walk mid-commit and propagates out. There is no
//! rollback; the instance must be treated as dead.

use tracing::{debug, trace};

use crate::element::NodeType;
use crate::fiber::{EffectTag, FiberKey};
use crate::host::{HostError, listener_event_name};
use crate::types::{Cleanup, HostHandle, PropValue};

use super::Engine;

impl Engine {
    /// Apply the finished work-in-progress tree to the host.
    pub(crate) fn commit_root(&mut self) -> Result<(), HostError> {
        let Some(wip) = self.take_wip_root() else {
            return Ok(());
        };
        let deletions = std::mem::take(&mut self.deletions);
        debug!(?wip, deletions = deletions.len(), "commit");

        for key in deletions {
            self.commit_deletion(key)?;
        }
        if let Some(child) = self.fibers[wip].child {
            self.commit_work(child)?;
        }
        self.commit_effects(wip);
        self.finalize_root(wip);
        self.sweep_alternates(wip);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Deletion Phase
    // -------------------------------------------------------------------------

    fn commit_deletion(&mut self, key: FiberKey) -> Result<(), HostError> {
        trace!(?key, "delete fiber");

        // The fiber itself or, through the component chain, its nearest
        // descendant owns the host node to remove.
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            let Some(fiber) = self.fibers.get(k) else { break };
            if let Some(handle) = fiber.host {
                self.host.remove_node(handle)?;
                break;
            }
            cursor = fiber.child;
        }

        let mut cleanups = Vec::new();
        self.take_subtree_cleanups(key, &mut cleanups);
        for cleanup in cleanups {
            cleanup();
        }

        self.fibers.free_subtree(key);
        Ok(())
    }

    /// Pull every stored effect cleanup out of a dying subtree, in tree
    /// order.
    fn take_subtree_cleanups(&mut self, root: FiberKey, out: &mut Vec<Cleanup>) {
        for key in self.fibers.subtree_keys(root) {
            if let Some(fiber) = self.fibers.get_mut(key) {
                for cell in &mut fiber.effect_hooks {
                    if let Some(cleanup) = cell.cleanup.take() {
                        out.push(cleanup);
                    }
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Mutation Phase
    // -------------------------------------------------------------------------

    fn commit_work(&mut self, key: FiberKey) -> Result<(), HostError> {
        match self.fibers[key].effect {
            EffectTag::Placement => {
                if let Some(handle) = self.fibers[key].host {
                    if let Some(parent) = self.host_parent(key) {
                        self.host.append_child(parent, handle)?;
                    }
                }
            }
            EffectTag::Update => self.commit_update(key)?,
            EffectTag::None => {}
        }

        if let Some(child) = self.fibers[key].child {
            self.commit_work(child)?;
        }
        if let Some(sibling) = self.fibers[key].sibling {
            self.commit_work(sibling)?;
        }
        Ok(())
    }

    /// Nearest ancestor that owns a host node, looking through component
    /// fibers.
    fn host_parent(&self, key: FiberKey) -> Option<HostHandle> {
        let mut cursor = self.fibers[key].parent;
        while let Some(k) = cursor {
            let fiber = self.fibers.get(k)?;
            if let Some(handle) = fiber.host {
                return Some(handle);
            }
            cursor = fiber.parent;
        }
        None
    }

    fn commit_update(&mut self, key: FiberKey) -> Result<(), HostError> {
        // Component fibers own no host node; their update is their subtree.
        let Some(handle) = self.fibers[key].host else {
            return Ok(());
        };

        if let NodeType::Text(value) = &self.fibers[key].ty {
            let changed = match self.fibers[key].alternate.and_then(|a| self.fibers.get(a)) {
                Some(alt) => !matches!(&alt.ty, NodeType::Text(old) if old == value),
                None => true,
            };
            if changed {
                self.host.set_text(handle, value)?;
            }
            return Ok(());
        }

        let old_attrs = self.fibers[key]
            .alternate
            .and_then(|a| self.fibers.get(a))
            .map(|a| a.props.attrs.clone())
            .unwrap_or_default();
        let new_attrs = self.fibers[key].props.attrs.clone();
        self.apply_prop_diff(handle, &old_attrs, &new_attrs)
    }

    /// Diff two attribute lists onto a host node.
    ///
    /// Keys present only in the old list are unset; keys whose value differs
    /// are set. Listener-shaped keys unregister the old handler and register
    /// the new one instead of plain assignment.
    pub(crate) fn apply_prop_diff(
        &mut self,
        handle: HostHandle,
        old: &[(String, PropValue)],
        new: &[(String, PropValue)],
    ) -> Result<(), HostError> {
        for (name, old_value) in old {
            if new.iter().any(|(n, _)| n == name) {
                continue;
            }
            match listener_event_name(name) {
                Some(event) if matches!(old_value, PropValue::Handler(_)) => {
                    self.host.remove_listener(handle, &event)?;
                }
                _ => self.host.remove_attribute(handle, name)?,
            }
        }

        for (name, value) in new {
            let old_value = old.iter().find(|(n, _)| n == name).map(|(_, v)| v);
            if old_value == Some(value) {
                continue;
            }
            match (listener_event_name(name), value) {
                (Some(event), PropValue::Handler(handler)) => {
                    if matches!(old_value, Some(PropValue::Handler(_))) {
                        self.host.remove_listener(handle, &event)?;
                    }
                    self.host.add_listener(handle, &event, handler.clone())?;
                }
                _ => self.host.set_attribute(handle, name, value)?,
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Effect Hooks
    // -------------------------------------------------------------------------

    fn commit_effects(&mut self, root: FiberKey) {
        // Every due cleanup from the previous tree runs before any new
        // callback.
        let mut cleanups = Vec::new();
        self.collect_due_cleanups(root, &mut cleanups);
        for cleanup in cleanups {
            cleanup();
        }
        self.run_effects(root);
    }

    fn collect_due_cleanups(&mut self, key: FiberKey, out: &mut Vec<Cleanup>) {
        let (alternate, hook_count, child, sibling) = {
            let fiber = &self.fibers[key];
            (fiber.alternate, fiber.effect_hooks.len(), fiber.child, fiber.sibling)
        };

        if let Some(alt) = alternate {
            for slot in 0..hook_count {
                if self.effect_due(key, alt, slot) {
                    let cleanup = self
                        .fibers
                        .get_mut(alt)
                        .and_then(|a| a.effect_hooks.get_mut(slot))
                        .and_then(|cell| cell.cleanup.take());
                    if let Some(cleanup) = cleanup {
                        out.push(cleanup);
                    }
                }
            }
        }

        if let Some(c) = child {
            self.collect_due_cleanups(c, out);
        }
        if let Some(s) = sibling {
            self.collect_due_cleanups(s, out);
        }
    }

    /// Whether the effect at `slot` re-runs on this update pass: only
    /// deps-bearing effects are eligible, and only when some dependency
    /// differs from the prior render at the same index.
    fn effect_due(&self, key: FiberKey, alt: FiberKey, slot: usize) -> bool {
        let Some(cell) = self.fibers.get(key).and_then(|f| f.effect_hooks.get(slot)) else {
            return false;
        };
        let Some(deps) = cell.deps.as_ref().filter(|d| !d.is_empty()) else {
            return false;
        };
        let old_deps = self
            .fibers
            .get(alt)
            .and_then(|a| a.effect_hooks.get(slot))
            .and_then(|cell| cell.deps.as_ref());
        match old_deps {
            None => false,
            Some(old) => old
                .iter()
                .enumerate()
                .any(|(i, old_dep)| deps.get(i) != Some(old_dep)),
        }
    }

    fn run_effects(&mut self, key: FiberKey) {
        let (alternate, hook_count, child, sibling) = {
            let fiber = &self.fibers[key];
            (fiber.alternate, fiber.effect_hooks.len(), fiber.child, fiber.sibling)
        };

        for slot in 0..hook_count {
            let run = match alternate {
                None => true,
                Some(alt) => self.effect_due(key, alt, slot),
            };
            if run {
                let callback = self.fibers[key].effect_hooks[slot].callback.clone();
                let cleanup = callback();
                self.fibers[key].effect_hooks[slot].cleanup = cleanup;
            } else if let Some(alt) = alternate {
                // Keep the stored cleanup alive across skipped runs so a
                // later deps change (or unmount) can still release it.
                let carried = self
                    .fibers
                    .get_mut(alt)
                    .and_then(|a| a.effect_hooks.get_mut(slot))
                    .and_then(|cell| cell.cleanup.take());
                if carried.is_some() {
                    self.fibers[key].effect_hooks[slot].cleanup = carried;
                }
            }
        }

        if let Some(c) = child {
            self.run_effects(c);
        }
        if let Some(s) = sibling {
            self.run_effects(s);
        }
    }

    // -------------------------------------------------------------------------
    // Tree Swap
    // -------------------------------------------------------------------------

    /// Make the finished tree current: replace the root for a whole-tree
    /// pass, graft the rebuilt subtree in place of its alternate for a
    /// scoped one.
    fn finalize_root(&mut self, wip: FiberKey) {
        if self.fibers[wip].parent.is_none() {
            self.set_current_root(wip);
            return;
        }

        let Some(old) = self.fibers[wip].alternate else {
            return;
        };
        let old_sibling = self.fibers.get(old).and_then(|o| o.sibling);
        self.fibers[wip].sibling = old_sibling;

        let Some(parent) = self.fibers[wip].parent else {
            return;
        };
        if !self.fibers.contains(parent) {
            return;
        }
        if self.fibers[parent].child == Some(old) {
            self.fibers[parent].child = Some(wip);
            return;
        }
        let mut cursor = self.fibers[parent].child;
        while let Some(k) = cursor {
            if self.fibers[k].sibling == Some(old) {
                self.fibers[k].sibling = Some(wip);
                return;
            }
            cursor = self.fibers[k].sibling;
        }
    }

    /// Free the previous generation: each committed fiber keeps its
    /// alternate only until its own commit completes.
    fn sweep_alternates(&mut self, root: FiberKey) {
        for key in self.fibers.subtree_keys(root) {
            let alternate = self.fibers.get_mut(key).and_then(|f| f.alternate.take());
            if let Some(alt) = alternate {
                self.fibers.remove(alt);
            }
        }
    }
}
