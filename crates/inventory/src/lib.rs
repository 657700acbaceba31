//! Warehouse inventory domain.
//!
//! This crate contains the business rules for materials and stock movements,
//! implemented purely as deterministic domain logic (no IO, no locking, no
//! storage). Coordination lives in `almox-infra`.

pub mod event;
pub mod material;
pub mod movement;
pub mod registry;
pub mod scope;

pub use event::{LowStockChanged, MovementsCommitted, StockEvent};
pub use material::{Material, MaterialPatch, NewMaterial, UnitType};
pub use movement::{
    subtypes, ContractReturnFields, Direction, ExitFields, FieldKey, MovementRecord,
    NormalReturnFields, PayloadKind, ServiceReturnFields, StandardEntryFields, SubtypeFields,
    SubtypeKey,
};
pub use registry::{
    standard_definitions, FieldError, MovementTypeDefinition, MovementTypeRegistry, SubtypeOption,
    ValidationErrors,
};
pub use scope::{ScopeKind, WarehouseScope, MAX_CLIENT_WAREHOUSES};
