//! `almox-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by every warehouse
//! crate: identifiers, the domain error model, optimistic versioning and the
//! exact-decimal `Quantity` type. No infrastructure concerns live here.

pub mod error;
pub mod id;
pub mod quantity;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{BatchId, MaterialId, MovementId, UserId};
pub use quantity::Quantity;
pub use version::{ExpectedVersion, Versioned};
