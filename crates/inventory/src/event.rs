use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use almox_core::{BatchId, MaterialId, Quantity};
use almox_events::Event;

use crate::material::Material;
use crate::movement::{Direction, MovementRecord};
use crate::scope::WarehouseScope;

/// Event: one commit appended these records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementsCommitted {
    pub scope: WarehouseScope,
    pub direction: Direction,
    pub batch_id: Option<BatchId>,
    pub records: Vec<MovementRecord>,
    pub occurred_at: DateTime<Utc>,
}

/// Event payload for a low-stock flag flip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockChanged {
    pub scope: WarehouseScope,
    pub material_id: MaterialId,
    pub material_number: String,
    pub current_quantity: Quantity,
    pub minimum_stock: Quantity,
    pub occurred_at: DateTime<Utc>,
}

impl LowStockChanged {
    pub fn from_material(material: &Material, occurred_at: DateTime<Utc>) -> Self {
        Self {
            scope: material.scope(),
            material_id: material.id_typed(),
            material_number: material.material_number().to_string(),
            current_quantity: material.current_quantity(),
            minimum_stock: material.minimum_stock(),
            occurred_at,
        }
    }
}

/// Facts published after a stock commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    MovementsCommitted(MovementsCommitted),
    LowStockRaised(LowStockChanged),
    LowStockCleared(LowStockChanged),
}

impl StockEvent {
    pub fn scope(&self) -> WarehouseScope {
        match self {
            StockEvent::MovementsCommitted(e) => e.scope,
            StockEvent::LowStockRaised(e) | StockEvent::LowStockCleared(e) => e.scope,
        }
    }

    /// Flag flip between two snapshots of the same material, if any.
    pub fn low_stock_transition(before: &Material, after: &Material, at: DateTime<Utc>) -> Option<Self> {
        match (before.is_low_stock(), after.is_low_stock()) {
            (false, true) => Some(StockEvent::LowStockRaised(LowStockChanged::from_material(after, at))),
            (true, false) => Some(StockEvent::LowStockCleared(LowStockChanged::from_material(after, at))),
            _ => None,
        }
    }
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::MovementsCommitted(_) => "stock.movements.committed",
            StockEvent::LowStockRaised(_) => "stock.low_stock.raised",
            StockEvent::LowStockCleared(_) => "stock.low_stock.cleared",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::MovementsCommitted(e) => e.occurred_at,
            StockEvent::LowStockRaised(e) => e.occurred_at,
            StockEvent::LowStockCleared(e) => e.occurred_at,
        }
    }
}
