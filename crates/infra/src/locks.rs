//! Per-material mutual exclusion for in-process writers.
//!
//! A batch locks every material it touches before re-reading stock. Locks
//! are always taken in ascending `MaterialId` order with duplicates merged,
//! so two batches sharing materials can never wait on each other in a cycle.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use almox_core::MaterialId;

/// Lazily populated table of one mutex per material.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: Mutex<HashMap<MaterialId, Arc<Mutex<()>>>>,
}

/// Handles for a sorted, de-duplicated set of materials. Call
/// [`MaterialLocks::acquire`] to actually block on them.
#[derive(Debug)]
pub struct MaterialLocks {
    ids: Vec<MaterialId>,
    handles: Vec<Arc<Mutex<()>>>,
}

/// Held locks; released on drop.
pub struct HeldLocks<'a> {
    _guards: Vec<MutexGuard<'a, ()>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_materials(&self, ids: impl IntoIterator<Item = MaterialId>) -> MaterialLocks {
        let ids: Vec<MaterialId> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();

        // The guarded value is `()`, so a poisoned table is still consistent.
        let mut table = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let handles = ids
            .iter()
            .map(|id| table.entry(*id).or_default().clone())
            .collect();

        MaterialLocks { ids, handles }
    }
}

impl MaterialLocks {
    /// Materials covered, in locking order.
    pub fn ids(&self) -> &[MaterialId] {
        &self.ids
    }

    pub fn acquire(&self) -> HeldLocks<'_> {
        let guards = self
            .handles
            .iter()
            .map(|m| m.lock().unwrap_or_else(|e| e.into_inner()))
            .collect();
        HeldLocks { _guards: guards }
    }
}
