use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use almox_core::{DomainError, DomainResult, MaterialId, Quantity, Versioned};

use crate::movement::Direction;
use crate::scope::WarehouseScope;

/// Unit a material is counted in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Piece,
    Liter,
    Kilogram,
    Meter,
    Set,
    Box,
    Pack,
    Roll,
}

/// Catalog registration input.
///
/// There is deliberately no quantity here: stock starts at zero and only
/// committed movements change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMaterial {
    pub scope: WarehouseScope,
    /// Unique within the scope. Generated from the id when absent.
    #[serde(default)]
    pub material_number: Option<String>,
    pub description: String,
    pub unit: UnitType,
    pub minimum_stock: Quantity,
    #[serde(default)]
    pub addressing: Option<String>,
}

/// Catalog edit. Unknown keys (such as `current_quantity`) are rejected when
/// deserialising, so a patch can never carry a stock level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaterialPatch {
    #[serde(default)]
    pub material_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Option<UnitType>,
    #[serde(default)]
    pub minimum_stock: Option<Quantity>,
    /// `Some("")` clears the location code.
    #[serde(default)]
    pub addressing: Option<String>,
}

impl MaterialPatch {
    pub fn is_empty(&self) -> bool {
        self.material_number.is_none()
            && self.description.is_none()
            && self.unit.is_none()
            && self.minimum_stock.is_none()
            && self.addressing.is_none()
    }
}

/// Master record of a material in one warehouse scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Material {
    id: MaterialId,
    scope: WarehouseScope,
    material_number: String,
    description: String,
    unit: UnitType,
    current_quantity: Quantity,
    minimum_stock: Quantity,
    addressing: Option<String>,
    low_stock: bool,
    active: bool,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Material {
    /// Validate a registration and build the initial record (version 1, zero stock).
    pub fn register(id: MaterialId, input: NewMaterial, at: DateTime<Utc>) -> DomainResult<Self> {
        let description = non_blank("description", &input.description)?;
        let material_number = match input.material_number.as_deref() {
            Some(n) => non_blank("material_number", n)?,
            None => generated_number(id),
        };

        let mut material = Self {
            id,
            scope: input.scope,
            material_number,
            description,
            unit: input.unit,
            current_quantity: Quantity::ZERO,
            minimum_stock: input.minimum_stock,
            addressing: normalize_optional(input.addressing),
            low_stock: false,
            active: true,
            version: 1,
            created_at: at,
            updated_at: at,
        };
        material.recompute_low_stock();
        Ok(material)
    }

    pub fn id_typed(&self) -> MaterialId {
        self.id
    }

    pub fn scope(&self) -> WarehouseScope {
        self.scope
    }

    pub fn material_number(&self) -> &str {
        &self.material_number
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn unit(&self) -> UnitType {
        self.unit
    }

    pub fn current_quantity(&self) -> Quantity {
        self.current_quantity
    }

    pub fn minimum_stock(&self) -> Quantity {
        self.minimum_stock
    }

    pub fn addressing(&self) -> Option<&str> {
        self.addressing.as_deref()
    }

    /// Derived flag, kept equal to `current_quantity < minimum_stock`.
    pub fn is_low_stock(&self) -> bool {
        self.low_stock
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Apply one committed movement. Exits that would take stock below zero
    /// are rejected and leave the record untouched.
    pub fn apply_movement(
        &mut self,
        direction: Direction,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !self.active {
            return Err(DomainError::validation(format!(
                "material {} is deactivated",
                self.material_number
            )));
        }
        if quantity.is_zero() {
            return Err(DomainError::validation("movement quantity must be greater than zero"));
        }

        let next = match direction {
            Direction::Entry => self.current_quantity.checked_add(quantity)?,
            Direction::Exit => self.current_quantity.checked_sub(quantity)?,
        };

        self.current_quantity = next;
        self.touch(at);
        Ok(())
    }

    /// Apply a catalog edit. Never touches the stock level.
    pub fn apply_patch(&mut self, patch: &MaterialPatch, at: DateTime<Utc>) -> DomainResult<()> {
        if patch.is_empty() {
            return Err(DomainError::validation("patch is empty"));
        }
        if let Some(n) = &patch.material_number {
            self.material_number = non_blank("material_number", n)?;
        }
        if let Some(d) = &patch.description {
            self.description = non_blank("description", d)?;
        }
        if let Some(u) = patch.unit {
            self.unit = u;
        }
        if let Some(m) = patch.minimum_stock {
            self.minimum_stock = m;
        }
        if let Some(a) = &patch.addressing {
            self.addressing = normalize_optional(Some(a.clone()));
        }
        self.touch(at);
        Ok(())
    }

    pub fn deactivate(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if !self.active {
            return Err(DomainError::conflict("material already deactivated"));
        }
        self.active = false;
        self.touch(at);
        Ok(())
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.recompute_low_stock();
        self.updated_at = at;
        // +1 per persisted write; stores compare-and-set on this.
        self.version += 1;
    }

    fn recompute_low_stock(&mut self) {
        self.low_stock = self.current_quantity < self.minimum_stock;
    }
}

impl Versioned for Material {
    type Id = MaterialId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn non_blank(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn generated_number(id: MaterialId) -> String {
    // Tail of a v7 UUID is random; the head is a timestamp shared by ids
    // minted in the same millisecond.
    let simple = id.as_uuid().simple().to_string();
    format!("MAT-{}", simple[simple.len() - 10..].to_ascii_uppercase())
}
