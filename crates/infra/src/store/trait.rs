use std::sync::Arc;

use thiserror::Error;

use almox_core::{ExpectedVersion, MaterialId};
use almox_inventory::{Material, MovementRecord, WarehouseScope};

/// Inventory store operation error.
///
/// These are infrastructure failures (storage, concurrency) as opposed to
/// domain failures (validation, insufficient stock).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("material number '{material_number}' already exists in {scope}")]
    DuplicateMaterialNumber {
        scope: WarehouseScope,
        material_number: String,
    },

    #[error("material not found: {0}")]
    NotFound(MaterialId),

    #[error("invalid write: {0}")]
    InvalidWrite(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// New state for one material, guarded by the version it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialWrite {
    pub material: Material,
    pub expected: ExpectedVersion,
}

/// One all-or-nothing unit of work: material writes plus ledger records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockCommit {
    pub writes: Vec<MaterialWrite>,
    pub records: Vec<MovementRecord>,
}

/// Material catalog and movement ledger storage.
///
/// Implementations must:
/// - keep material numbers unique per scope
/// - never change `current_quantity` outside of `commit`
/// - check every `expected` version of a commit before applying any of it
/// - append ledger records in commit order, never editing or removing them
pub trait InventoryStore: Send + Sync {
    /// Insert a freshly registered material (zero stock).
    fn insert_material(&self, material: Material) -> Result<Material, StoreError>;

    /// Replace catalog fields of an existing material.
    ///
    /// Rejects writes whose `current_quantity` differs from the stored one.
    fn replace_material(
        &self,
        material: Material,
        expected: ExpectedVersion,
    ) -> Result<Material, StoreError>;

    fn get_material(&self, id: MaterialId) -> Result<Option<Material>, StoreError>;

    /// Materials of one scope, ordered by material number.
    fn list_materials(&self, scope: WarehouseScope) -> Result<Vec<Material>, StoreError>;

    /// Apply a stock commit atomically. Returns the ledger length afterwards.
    fn commit(&self, commit: StockCommit) -> Result<usize, StoreError>;

    /// Up to `limit` ledger records starting at position `offset`.
    fn movements(&self, offset: usize, limit: usize) -> Result<Vec<MovementRecord>, StoreError>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn insert_material(&self, material: Material) -> Result<Material, StoreError> {
        (**self).insert_material(material)
    }

    fn replace_material(
        &self,
        material: Material,
        expected: ExpectedVersion,
    ) -> Result<Material, StoreError> {
        (**self).replace_material(material, expected)
    }

    fn get_material(&self, id: MaterialId) -> Result<Option<Material>, StoreError> {
        (**self).get_material(id)
    }

    fn list_materials(&self, scope: WarehouseScope) -> Result<Vec<Material>, StoreError> {
        (**self).list_materials(scope)
    }

    fn commit(&self, commit: StockCommit) -> Result<usize, StoreError> {
        (**self).commit(commit)
    }

    fn movements(&self, offset: usize, limit: usize) -> Result<Vec<MovementRecord>, StoreError> {
        (**self).movements(offset, limit)
    }
}
