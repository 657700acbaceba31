//! Warehouse scopes: the partitions materials and movements belong to.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use almox_core::{DomainError, DomainResult};

/// Highest client warehouse number.
pub const MAX_CLIENT_WAREHOUSES: u8 = 5;

/// A physically distinct warehouse.
///
/// Textual form: `central`, `maintenance`, `client:N` with N in 1..=5.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WarehouseScope {
    Central,
    Maintenance,
    Client(u8),
}

/// Scope class used to key the movement-type table. Client warehouses share
/// one taxonomy regardless of their number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Central,
    Maintenance,
    Client,
}

impl WarehouseScope {
    pub fn client(number: u8) -> DomainResult<Self> {
        if number == 0 || number > MAX_CLIENT_WAREHOUSES {
            return Err(DomainError::validation(format!(
                "client warehouse must be between 1 and {MAX_CLIENT_WAREHOUSES} (got {number})"
            )));
        }
        Ok(Self::Client(number))
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            WarehouseScope::Central => ScopeKind::Central,
            WarehouseScope::Maintenance => ScopeKind::Maintenance,
            WarehouseScope::Client(_) => ScopeKind::Client,
        }
    }

    /// Every scope the system knows about, in display order.
    pub fn all() -> Vec<WarehouseScope> {
        let mut scopes = vec![WarehouseScope::Central, WarehouseScope::Maintenance];
        scopes.extend((1..=MAX_CLIENT_WAREHOUSES).map(WarehouseScope::Client));
        scopes
    }
}

impl core::fmt::Display for WarehouseScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WarehouseScope::Central => f.write_str("central"),
            WarehouseScope::Maintenance => f.write_str("maintenance"),
            WarehouseScope::Client(n) => write!(f, "client:{n}"),
        }
    }
}

impl FromStr for WarehouseScope {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "central" => Ok(WarehouseScope::Central),
            "maintenance" => Ok(WarehouseScope::Maintenance),
            other => {
                let number = other
                    .strip_prefix("client:")
                    .and_then(|n| n.parse::<u8>().ok())
                    .ok_or_else(|| DomainError::validation(format!("unknown warehouse scope '{s}'")))?;
                WarehouseScope::client(number)
            }
        }
    }
}

impl TryFrom<String> for WarehouseScope {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WarehouseScope> for String {
    fn from(value: WarehouseScope) -> Self {
        value.to_string()
    }
}
