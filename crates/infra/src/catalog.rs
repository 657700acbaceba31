//! Material catalog: registration and catalog-field edits.
//!
//! Edits take the same per-material lock as stock commits and are
//! version-checked, but they can never carry a stock level: quantity only
//! moves through [`crate::engine::StockEngine`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use almox_core::{DomainResult, ExpectedVersion, MaterialId, Versioned};
use almox_events::{EventBus, EventEnvelope};
use almox_inventory::{Material, MaterialPatch, NewMaterial, StockEvent, WarehouseScope};

use crate::engine::EngineError;
use crate::locks::LockTable;
use crate::publish::StockPublisher;
use crate::store::{InventoryStore, StoreError};

#[derive(Debug)]
pub struct MaterialCatalog<S, B> {
    store: S,
    locks: Arc<LockTable>,
    publisher: Arc<StockPublisher<B>>,
}

impl<S, B> MaterialCatalog<S, B>
where
    S: InventoryStore,
    B: EventBus<EventEnvelope<StockEvent>>,
{
    pub(crate) fn new(store: S, locks: Arc<LockTable>, publisher: Arc<StockPublisher<B>>) -> Self {
        Self {
            store,
            locks,
            publisher,
        }
    }

    #[instrument(skip(self, input), fields(scope = %input.scope))]
    pub fn register(&self, input: NewMaterial) -> Result<Material, EngineError> {
        let material = Material::register(MaterialId::new(), input, Utc::now())?;
        let stored = self.store.insert_material(material)?;
        info!(
            material_id = %stored.id_typed(),
            material_number = stored.material_number(),
            "material registered"
        );
        Ok(stored)
    }

    pub fn get(&self, id: MaterialId) -> Result<Material, EngineError> {
        self.store.get_material(id)?.ok_or(EngineError::NotFound(id))
    }

    pub fn list(&self, scope: WarehouseScope) -> Result<Vec<Material>, EngineError> {
        Ok(self.store.list_materials(scope)?)
    }

    #[instrument(skip(self, patch), fields(material_id = %id))]
    pub fn update(&self, id: MaterialId, patch: &MaterialPatch) -> Result<Material, EngineError> {
        self.edit(id, |m, at| m.apply_patch(patch, at))
    }

    #[instrument(skip(self), fields(material_id = %id))]
    pub fn deactivate(&self, id: MaterialId) -> Result<Material, EngineError> {
        self.edit(id, |m, at| m.deactivate(at))
    }

    fn edit(
        &self,
        id: MaterialId,
        change: impl FnOnce(&mut Material, DateTime<Utc>) -> DomainResult<()>,
    ) -> Result<Material, EngineError> {
        let locks = self.locks.for_materials([id]);
        let _held = locks.acquire();

        let current = self.store.get_material(id)?.ok_or(EngineError::NotFound(id))?;
        let now = Utc::now();
        let mut next = current.clone();
        change(&mut next, now)?;

        let saved = self
            .store
            .replace_material(next, ExpectedVersion::exact(current.version()))
            .map_err(|e| match e {
                StoreError::Concurrency(_) => EngineError::ConcurrentModification { attempts: 1 },
                other => other.into(),
            })?;
        info!(version = saved.version(), "material updated");

        if let Some(flip) = StockEvent::low_stock_transition(&current, &saved, now) {
            self.publisher.publish_all([flip]);
        }
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use almox_core::Quantity;
    use almox_events::InMemoryEventBus;
    use almox_inventory::{MovementTypeRegistry, UnitType};

    use crate::engine::{EngineConfig, StockEngine};
    use crate::store::InMemoryInventoryStore;

    fn catalog() -> MaterialCatalog<Arc<InMemoryInventoryStore>, Arc<InMemoryEventBus<EventEnvelope<StockEvent>>>> {
        StockEngine::new(
            Arc::new(InMemoryInventoryStore::new()),
            Arc::new(InMemoryEventBus::new()),
            Arc::new(MovementTypeRegistry::standard()),
            EngineConfig::default(),
        )
        .catalog()
    }

    fn new_material(number: Option<&str>, scope: WarehouseScope) -> NewMaterial {
        NewMaterial {
            scope,
            material_number: number.map(str::to_string),
            description: "Fita isolante".to_string(),
            unit: UnitType::Roll,
            minimum_stock: Quantity::from_units(3),
            addressing: None,
        }
    }

    #[test]
    fn duplicate_number_in_same_scope_is_a_conflict() {
        let catalog = catalog();
        catalog.register(new_material(Some("F-1"), WarehouseScope::Central)).unwrap();

        let err = catalog
            .register(new_material(Some("F-1"), WarehouseScope::Central))
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        catalog
            .register(new_material(Some("F-1"), WarehouseScope::Client(4)))
            .unwrap();
    }

    #[test]
    fn update_bumps_version_and_keeps_stock() {
        let catalog = catalog();
        let m = catalog.register(new_material(None, WarehouseScope::Maintenance)).unwrap();
        let patch = MaterialPatch {
            addressing: Some("B-02".to_string()),
            ..Default::default()
        };

        let updated = catalog.update(m.id_typed(), &patch).unwrap();
        assert_eq!(updated.version(), m.version() + 1);
        assert_eq!(updated.addressing(), Some("B-02"));
        assert_eq!(updated.current_quantity(), Quantity::ZERO);
    }

    #[test]
    fn empty_patch_is_a_validation_error() {
        let catalog = catalog();
        let m = catalog.register(new_material(None, WarehouseScope::Central)).unwrap();
        let err = catalog.update(m.id_typed(), &MaterialPatch::default()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn unknown_material_is_not_found() {
        let catalog = catalog();
        let id = MaterialId::new();
        assert_eq!(catalog.deactivate(id).unwrap_err(), EngineError::NotFound(id));
    }
}
