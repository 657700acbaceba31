use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use almox_core::{ExpectedVersion, MaterialId, Versioned};
use almox_inventory::{Material, MovementRecord, WarehouseScope};

use super::r#trait::{InventoryStore, StockCommit, StoreError};

#[derive(Debug, Default)]
struct Inner {
    materials: HashMap<MaterialId, Material>,
    numbers: HashMap<(WarehouseScope, String), MaterialId>,
    ledger: Vec<MovementRecord>,
}

impl Inner {
    fn claim_number(&self, material: &Material) -> Result<(), StoreError> {
        let key = (material.scope(), material.material_number().to_string());
        match self.numbers.get(&key) {
            Some(owner) if *owner != material.id_typed() => Err(StoreError::DuplicateMaterialNumber {
                scope: material.scope(),
                material_number: material.material_number().to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn stored(&self, id: MaterialId) -> Result<&Material, StoreError> {
        self.materials.get(&id).ok_or(StoreError::NotFound(id))
    }
}

/// In-memory inventory store.
///
/// Intended for tests/dev. One `RwLock` covers materials and ledger, so a
/// commit is trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

fn check_version(expected: ExpectedVersion, stored: &Material) -> Result<(), StoreError> {
    if expected.matches(stored.version()) {
        Ok(())
    } else {
        Err(StoreError::Concurrency(format!(
            "material {} expected version {}, found {}",
            stored.id_typed(),
            expected.value(),
            stored.version()
        )))
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn insert_material(&self, material: Material) -> Result<Material, StoreError> {
        if !material.current_quantity().is_zero() {
            return Err(StoreError::InvalidWrite(
                "materials are registered with zero stock".to_string(),
            ));
        }

        let mut inner = self.write()?;
        if inner.materials.contains_key(&material.id_typed()) {
            return Err(StoreError::InvalidWrite(format!(
                "material {} already exists",
                material.id_typed()
            )));
        }
        inner.claim_number(&material)?;

        inner.numbers.insert(
            (material.scope(), material.material_number().to_string()),
            material.id_typed(),
        );
        inner.materials.insert(material.id_typed(), material.clone());
        Ok(material)
    }

    fn replace_material(
        &self,
        material: Material,
        expected: ExpectedVersion,
    ) -> Result<Material, StoreError> {
        let mut inner = self.write()?;
        let stored = inner.stored(material.id_typed())?;
        check_version(expected, stored)?;

        if stored.current_quantity() != material.current_quantity() {
            return Err(StoreError::InvalidWrite(
                "current quantity only changes through stock commits".to_string(),
            ));
        }
        if stored.scope() != material.scope() {
            return Err(StoreError::InvalidWrite("scope cannot change".to_string()));
        }
        inner.claim_number(&material)?;

        let old_key = (stored.scope(), stored.material_number().to_string());
        inner.numbers.remove(&old_key);
        inner.numbers.insert(
            (material.scope(), material.material_number().to_string()),
            material.id_typed(),
        );
        inner.materials.insert(material.id_typed(), material.clone());
        Ok(material)
    }

    fn get_material(&self, id: MaterialId) -> Result<Option<Material>, StoreError> {
        Ok(self.read()?.materials.get(&id).cloned())
    }

    fn list_materials(&self, scope: WarehouseScope) -> Result<Vec<Material>, StoreError> {
        let inner = self.read()?;
        let mut out: Vec<Material> = inner
            .materials
            .values()
            .filter(|m| m.scope() == scope)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.material_number().cmp(b.material_number()));
        Ok(out)
    }

    fn commit(&self, commit: StockCommit) -> Result<usize, StoreError> {
        let mut inner = self.write()?;

        // Check everything before applying anything.
        let mut seen = HashSet::with_capacity(commit.writes.len());
        for write in &commit.writes {
            let id = write.material.id_typed();
            if !seen.insert(id) {
                return Err(StoreError::InvalidWrite(format!(
                    "material {id} written twice in one commit"
                )));
            }
            let stored = inner.stored(id)?;
            check_version(write.expected, stored)?;
            if stored.material_number() != write.material.material_number()
                || stored.scope() != write.material.scope()
            {
                return Err(StoreError::InvalidWrite(format!(
                    "stock commit may not edit catalog fields of {id}"
                )));
            }
        }
        for record in &commit.records {
            if !seen.contains(&record.material_id) {
                return Err(StoreError::InvalidWrite(format!(
                    "record {} references material {} outside the commit",
                    record.id, record.material_id
                )));
            }
        }

        for write in commit.writes {
            inner.materials.insert(write.material.id_typed(), write.material);
        }
        inner.ledger.extend(commit.records);
        Ok(inner.ledger.len())
    }

    fn movements(&self, offset: usize, limit: usize) -> Result<Vec<MovementRecord>, StoreError> {
        let inner = self.read()?;
        Ok(inner.ledger.iter().skip(offset).take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MaterialWrite;
    use almox_core::Quantity;
    use almox_inventory::{Direction, MaterialPatch, NewMaterial, UnitType};
    use chrono::Utc;

    fn material(number: &str) -> Material {
        Material::register(
            MaterialId::new(),
            NewMaterial {
                scope: WarehouseScope::Central,
                material_number: Some(number.to_string()),
                description: "Luva nitrílica".to_string(),
                unit: UnitType::Pack,
                minimum_stock: Quantity::from_units(2),
                addressing: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn duplicate_numbers_are_rejected_per_scope() {
        let store = InMemoryInventoryStore::new();
        store.insert_material(material("L-1")).unwrap();
        let err = store.insert_material(material("L-1")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateMaterialNumber { .. }));
    }

    #[test]
    fn replace_cannot_change_quantity() {
        let store = InMemoryInventoryStore::new();
        let m = store.insert_material(material("L-2")).unwrap();
        let mut edited = m.clone();
        edited.apply_movement(Direction::Entry, Quantity::from_units(5), Utc::now()).unwrap();

        let err = store
            .replace_material(edited, ExpectedVersion::exact(m.version()))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidWrite(_)));
    }

    #[test]
    fn replace_checks_version() {
        let store = InMemoryInventoryStore::new();
        let m = store.insert_material(material("L-3")).unwrap();
        let mut edited = m.clone();
        let patch = MaterialPatch {
            description: Some("Luva de látex".to_string()),
            ..Default::default()
        };
        edited.apply_patch(&patch, Utc::now()).unwrap();

        let err = store
            .replace_material(edited.clone(), ExpectedVersion::exact(m.version() + 1))
            .unwrap_err();
        match err {
            StoreError::Concurrency(msg) => assert!(msg.contains("expected version 2, found 1")),
            other => panic!("expected concurrency error, got {other:?}"),
        }

        store
            .replace_material(edited, ExpectedVersion::exact(m.version()))
            .unwrap();
    }

    #[test]
    fn stale_commit_applies_nothing() {
        let store = InMemoryInventoryStore::new();
        let a = store.insert_material(material("L-4")).unwrap();
        let b = store.insert_material(material("L-5")).unwrap();

        let mut a2 = a.clone();
        a2.apply_movement(Direction::Entry, Quantity::from_units(1), Utc::now()).unwrap();
        let mut b2 = b.clone();
        b2.apply_movement(Direction::Entry, Quantity::from_units(1), Utc::now()).unwrap();

        let err = store
            .commit(StockCommit {
                writes: vec![
                    MaterialWrite {
                        material: a2,
                        expected: ExpectedVersion::exact(a.version()),
                    },
                    MaterialWrite {
                        material: b2,
                        expected: ExpectedVersion::exact(b.version() + 7),
                    },
                ],
                records: vec![],
            })
            .unwrap_err();

        assert!(matches!(err, StoreError::Concurrency(_)));
        let reread = store.get_material(a.id_typed()).unwrap().unwrap();
        assert_eq!(reread.current_quantity(), Quantity::ZERO);
        assert!(store.movements(0, 10).unwrap().is_empty());
    }
}
