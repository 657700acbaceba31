//! Read side of the movement ledger.
//!
//! Queries page through the store lazily and take no engine locks. A
//! [`MovementQuery`] can be iterated any number of times; each pass starts
//! from the beginning of the ledger and sees everything committed so far.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use almox_core::MaterialId;
use almox_inventory::{Direction, MovementRecord, WarehouseScope};

use crate::store::{InventoryStore, StoreError};

const PAGE_SIZE: usize = 256;

/// Filter criteria for movement queries. Time bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFilter {
    #[serde(default)]
    pub scope: Option<WarehouseScope>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub material_id: Option<MaterialId>,
}

impl MovementFilter {
    pub fn for_material(material_id: MaterialId) -> Self {
        Self {
            material_id: Some(material_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &MovementRecord) -> bool {
        self.scope.is_none_or(|s| s == record.scope)
            && self.direction.is_none_or(|d| d == record.direction)
            && self.material_id.is_none_or(|m| m == record.material_id)
            && self.from.is_none_or(|from| record.performed_at >= from)
            && self.to.is_none_or(|to| record.performed_at <= to)
    }
}

/// Read-only access to committed movements.
#[derive(Debug, Clone)]
pub struct MovementLedger<S> {
    store: S,
}

impl<S> MovementLedger<S>
where
    S: InventoryStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn query(&self, filter: MovementFilter) -> MovementQuery<'_, S> {
        MovementQuery {
            store: &self.store,
            filter,
        }
    }

    /// Signed sum of a material's movements (entries minus exits).
    pub fn balance_of(&self, material_id: MaterialId) -> Result<Decimal, StoreError> {
        self.query(MovementFilter::for_material(material_id))
            .iter()
            .try_fold(Decimal::ZERO, |acc, record| -> Result<Decimal, StoreError> {
                Ok(acc + record?.signed_quantity())
            })
    }
}

/// A restartable, filtered view of the ledger in commit order.
#[derive(Debug, Clone)]
pub struct MovementQuery<'a, S> {
    store: &'a S,
    filter: MovementFilter,
}

impl<'a, S> MovementQuery<'a, S>
where
    S: InventoryStore,
{
    pub fn filter(&self) -> &MovementFilter {
        &self.filter
    }

    pub fn iter(&self) -> MovementIter<'_, S> {
        MovementIter {
            store: self.store,
            filter: &self.filter,
            offset: 0,
            page: Vec::new().into_iter(),
            exhausted: false,
        }
    }
}

impl<'q, 'a, S> IntoIterator for &'q MovementQuery<'a, S>
where
    S: InventoryStore,
{
    type Item = Result<MovementRecord, StoreError>;
    type IntoIter = MovementIter<'q, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over matching records; fetches one page at a time.
#[derive(Debug)]
pub struct MovementIter<'q, S> {
    store: &'q S,
    filter: &'q MovementFilter,
    offset: usize,
    page: std::vec::IntoIter<MovementRecord>,
    exhausted: bool,
}

impl<S> Iterator for MovementIter<'_, S>
where
    S: InventoryStore,
{
    type Item = Result<MovementRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.page.by_ref().find(|r| self.filter.matches(r)) {
                return Some(Ok(record));
            }
            if self.exhausted {
                return None;
            }

            match self.store.movements(self.offset, PAGE_SIZE) {
                Ok(page) => {
                    self.offset += page.len();
                    self.exhausted = page.len() < PAGE_SIZE;
                    self.page = page.into_iter();
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use almox_core::{MovementId, Quantity, UserId};
    use almox_inventory::{subtypes, ExitFields, SubtypeFields};
    use chrono::Duration;

    use crate::store::{InMemoryInventoryStore, MaterialWrite, StockCommit};
    use almox_core::ExpectedVersion;
    use almox_inventory::{Material, NewMaterial, UnitType};

    fn seeded(count: usize) -> (InMemoryInventoryStore, Material, DateTime<Utc>) {
        let store = InMemoryInventoryStore::new();
        let start = Utc::now();
        let mut material = store
            .insert_material(
                Material::register(
                    MaterialId::new(),
                    NewMaterial {
                        scope: WarehouseScope::Central,
                        material_number: Some("Q-1".to_string()),
                        description: "Cabo flexível".to_string(),
                        unit: UnitType::Meter,
                        minimum_stock: Quantity::ZERO,
                        addressing: None,
                    },
                    start,
                )
                .unwrap(),
            )
            .unwrap();

        for i in 0..count {
            let at = start + Duration::minutes(i as i64);
            let expected = ExpectedVersion::exact(almox_core::Versioned::version(&material));
            let direction = if i % 3 == 2 { Direction::Exit } else { Direction::Entry };
            material.apply_movement(direction, Quantity::from_units(1), at).unwrap();
            let record = MovementRecord {
                id: MovementId::new(),
                material_id: material.id_typed(),
                scope: WarehouseScope::Central,
                direction,
                subtype: subtypes::NORMAL.into(),
                quantity: Quantity::from_units(1),
                fields: SubtypeFields::Exit(ExitFields::withdrawn_by("Rui")),
                performed_by: UserId::new(),
                performed_at: at,
                batch_id: None,
                balance_after: material.current_quantity(),
            };
            store
                .commit(StockCommit {
                    writes: vec![MaterialWrite {
                        material: material.clone(),
                        expected,
                    }],
                    records: vec![record],
                })
                .unwrap();
        }
        (store, material, start)
    }

    #[test]
    fn query_spans_pages_in_commit_order() {
        let (store, _, _) = seeded(PAGE_SIZE + 10);
        let ledger = MovementLedger::new(store);
        let query = ledger.query(MovementFilter::default());

        let times: Vec<_> = query.iter().map(|r| r.unwrap().performed_at).collect();
        assert_eq!(times.len(), PAGE_SIZE + 10);
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn query_is_restartable() {
        let (store, _, _) = seeded(5);
        let ledger = MovementLedger::new(store);
        let query = ledger.query(MovementFilter {
            direction: Some(Direction::Exit),
            ..Default::default()
        });

        assert_eq!(query.iter().count(), 1);
        assert_eq!((&query).into_iter().count(), 1);
    }

    #[test]
    fn time_bounds_are_inclusive() {
        let (store, _, start) = seeded(6);
        let ledger = MovementLedger::new(store);
        let query = ledger.query(MovementFilter {
            from: Some(start + Duration::minutes(1)),
            to: Some(start + Duration::minutes(3)),
            ..Default::default()
        });
        assert_eq!(query.iter().count(), 3);
    }

    #[test]
    fn balance_matches_material_quantity() {
        let (store, material, _) = seeded(9);
        let ledger = MovementLedger::new(store);
        assert_eq!(
            ledger.balance_of(material.id_typed()).unwrap(),
            material.current_quantity().value()
        );
    }
}
