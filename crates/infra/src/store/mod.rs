//! Inventory persistence boundary.
//!
//! The store owns materials and the append-only movement ledger. Stock levels
//! change only through [`InventoryStore::commit`], which applies every
//! material write and appends every record of one unit of work atomically.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use r#trait::{InventoryStore, MaterialWrite, StockCommit, StoreError};
