//! Low-stock view over the catalog.
//!
//! Reads the flag every commit recomputes; nothing is cached here.

use serde::Serialize;

use almox_inventory::{Material, WarehouseScope};

use crate::store::{InventoryStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockSummary {
    pub count: usize,
    pub materials: Vec<Material>,
}

#[derive(Debug, Clone)]
pub struct LowStockMonitor<S> {
    store: S,
}

impl<S> LowStockMonitor<S>
where
    S: InventoryStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Active materials of `scope` below their minimum, by material number.
    pub fn list(&self, scope: WarehouseScope) -> Result<Vec<Material>, StoreError> {
        Ok(self
            .store
            .list_materials(scope)?
            .into_iter()
            .filter(|m| m.is_active() && m.is_low_stock())
            .collect())
    }

    pub fn count(&self, scope: WarehouseScope) -> Result<usize, StoreError> {
        Ok(self.list(scope)?.len())
    }

    pub fn summary(&self, scope: WarehouseScope) -> Result<LowStockSummary, StoreError> {
        let materials = self.list(scope)?;
        Ok(LowStockSummary {
            count: materials.len(),
            materials,
        })
    }
}
