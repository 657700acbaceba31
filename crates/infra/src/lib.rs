//! Infrastructure layer: inventory storage, the stock engine and the read
//! side (movement ledger, low-stock view).

pub mod basket;
pub mod catalog;
pub mod engine;
pub mod ledger;
pub mod locks;
pub mod low_stock;
pub mod publish;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use basket::{BasketError, BasketItem, ExitBasket};
pub use catalog::MaterialCatalog;
pub use engine::{
    EngineConfig, EngineError, EntryRequest, ExitItem, ExitReceipt, ExitRequest, Shortage,
    StockEngine,
};
pub use ledger::{MovementFilter, MovementLedger, MovementQuery};
pub use low_stock::{LowStockMonitor, LowStockSummary};
pub use store::{InMemoryInventoryStore, InventoryStore, StoreError};
