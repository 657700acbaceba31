//! Exit basket: staging area for a multi-item withdrawal.
//!
//! Checks made while staging are advisory only. They read a catalog snapshot
//! and never reserve stock, so a basket can go stale. The authoritative check
//! happens in [`StockEngine::commit_exit`] when the basket is committed.

use serde::Serialize;
use thiserror::Error;

use almox_core::{MaterialId, Quantity, UserId};
use almox_events::{EventBus, EventEnvelope};
use almox_inventory::{StockEvent, SubtypeFields, SubtypeKey, WarehouseScope};

use crate::engine::{EngineError, ExitItem, ExitReceipt, ExitRequest, StockEngine};
use crate::store::{InventoryStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BasketError {
    #[error("material not found: {0}")]
    UnknownMaterial(MaterialId),

    #[error("material {0} is deactivated")]
    Inactive(MaterialId),

    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,

    #[error("basket holds {basket} materials; {material} belongs to {found}")]
    ScopeMismatch {
        basket: WarehouseScope,
        material: MaterialId,
        found: WarehouseScope,
    },

    #[error("requested {requested} of {material_id} but only {available} available")]
    ExceedsAvailable {
        material_id: MaterialId,
        requested: Quantity,
        available: Quantity,
    },

    #[error("no item at index {index} (basket has {len})")]
    NoSuchItem { index: usize, len: usize },

    #[error("basket is empty")]
    Empty,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A staged exit line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasketItem {
    pub material_id: MaterialId,
    pub material_number: String,
    pub description: String,
    pub quantity: Quantity,
    /// Stock seen when the item was added. Not a reservation.
    pub available_snapshot: Quantity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExitBasket {
    scope: Option<WarehouseScope>,
    items: Vec<BasketItem>,
}

impl ExitBasket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope fixed by the first staged item.
    pub fn scope(&self) -> Option<WarehouseScope> {
        self.scope
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stage an item after an advisory check against current stock.
    ///
    /// Lines already staged for the same material count against the snapshot.
    pub fn add<S>(&mut self, store: &S, material_id: MaterialId, quantity: Quantity) -> Result<&BasketItem, BasketError>
    where
        S: InventoryStore,
    {
        if quantity.is_zero() {
            return Err(BasketError::NonPositiveQuantity);
        }
        let material = store
            .get_material(material_id)?
            .ok_or(BasketError::UnknownMaterial(material_id))?;
        if !material.is_active() {
            return Err(BasketError::Inactive(material_id));
        }
        if let Some(basket) = self.scope {
            if basket != material.scope() {
                return Err(BasketError::ScopeMismatch {
                    basket,
                    material: material_id,
                    found: material.scope(),
                });
            }
        }

        let staged = self
            .items
            .iter()
            .filter(|i| i.material_id == material_id)
            .try_fold(Quantity::ZERO, |acc, i| acc.checked_add(i.quantity))
            .and_then(|s| s.checked_add(quantity))
            .map_err(|e| BasketError::Engine(e.into()))?;
        let available = material.current_quantity();
        if staged > available {
            return Err(BasketError::ExceedsAvailable {
                material_id,
                requested: staged,
                available,
            });
        }

        self.scope = Some(material.scope());
        self.items.push(BasketItem {
            material_id,
            material_number: material.material_number().to_string(),
            description: material.description().to_string(),
            quantity,
            available_snapshot: available,
        });
        Ok(&self.items[self.items.len() - 1])
    }

    pub fn remove(&mut self, index: usize) -> Result<BasketItem, BasketError> {
        if index >= self.items.len() {
            return Err(BasketError::NoSuchItem {
                index,
                len: self.items.len(),
            });
        }
        let removed = self.items.remove(index);
        if self.items.is_empty() {
            self.scope = None;
        }
        Ok(removed)
    }

    /// Staged items in insertion order. Each call starts a fresh pass.
    pub fn items(&self) -> impl Iterator<Item = &BasketItem> + '_ {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.scope = None;
    }

    /// Commit every staged item as one exit batch. The basket is emptied
    /// only when the engine accepts the batch.
    pub fn commit<S, B>(
        &mut self,
        engine: &StockEngine<S, B>,
        actor: UserId,
        subtype: SubtypeKey,
        fields: SubtypeFields,
    ) -> Result<ExitReceipt, BasketError>
    where
        S: InventoryStore,
        B: EventBus<EventEnvelope<StockEvent>>,
    {
        if self.items.is_empty() {
            return Err(BasketError::Empty);
        }
        let request = ExitRequest {
            items: self
                .items
                .iter()
                .map(|i| ExitItem {
                    material_id: i.material_id,
                    quantity: i.quantity,
                })
                .collect(),
            subtype,
            fields,
        };

        let receipt = engine.commit_exit(request, actor)?;
        self.clear();
        Ok(receipt)
    }
}
