//! Movement records and their subtype-specific evidentiary payloads.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use almox_core::{BatchId, MaterialId, MovementId, Quantity, UserId};

use crate::scope::WarehouseScope;

/// Movement direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Entry,
    Exit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entry => "entry",
            Direction::Exit => "exit",
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Direction {
    type Err = almox_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" => Ok(Direction::Entry),
            "exit" => Ok(Direction::Exit),
            other => Err(almox_core::DomainError::validation(format!(
                "unknown direction '{other}'"
            ))),
        }
    }
}

/// Key of a registered movement subtype (e.g. `entrada_comum`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubtypeKey(String);

impl SubtypeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubtypeKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl core::fmt::Display for SubtypeKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subtype keys of the standard taxonomy.
pub mod subtypes {
    pub const ENTRADA_COMUM: &str = "entrada_comum";
    pub const DEVOLUCAO_SERVICO: &str = "devolucao_servico";
    pub const DEVOLUCAO_CONTRATACAO: &str = "devolucao_contratacao";
    pub const DEVOLUCAO_NORMAL: &str = "devolucao_normal";

    pub const NORMAL: &str = "normal";
    pub const DESCARTE: &str = "descarte";
    pub const ACAUTELAMENTO_SERVICO: &str = "acautelamento_servico";
    pub const ACAUTELAMENTO_CONTRATACAO: &str = "acautelamento_contratacao";
}

/// Named evidentiary field a subtype may require.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    InvoiceNumber,
    PurchaseOrderNumber,
    Supplier,
    AuthenticationCode,
    WithdrawalDate,
    WithdrawerName,
    ReturnerName,
    VehiclePlate,
    Observations,
}

impl FieldKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::InvoiceNumber => "invoice_number",
            FieldKey::PurchaseOrderNumber => "purchase_order_number",
            FieldKey::Supplier => "supplier",
            FieldKey::AuthenticationCode => "authentication_code",
            FieldKey::WithdrawalDate => "withdrawal_date",
            FieldKey::WithdrawerName => "withdrawer_name",
            FieldKey::ReturnerName => "returner_name",
            FieldKey::VehiclePlate => "vehicle_plate",
            FieldKey::Observations => "observations",
        }
    }
}

impl core::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which payload variant a subtype carries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    StandardEntry,
    ServiceReturn,
    ContractReturn,
    NormalReturn,
    Exit,
}

impl PayloadKind {
    /// Fields a payload of this kind can carry at all.
    pub fn fields(&self) -> &'static [FieldKey] {
        match self {
            PayloadKind::StandardEntry => &[
                FieldKey::InvoiceNumber,
                FieldKey::PurchaseOrderNumber,
                FieldKey::Supplier,
            ],
            PayloadKind::ServiceReturn => &[
                FieldKey::AuthenticationCode,
                FieldKey::WithdrawalDate,
                FieldKey::WithdrawerName,
            ],
            PayloadKind::ContractReturn => &[FieldKey::ReturnerName],
            PayloadKind::NormalReturn => &[FieldKey::WithdrawerName, FieldKey::WithdrawalDate],
            PayloadKind::Exit => &[
                FieldKey::WithdrawerName,
                FieldKey::VehiclePlate,
                FieldKey::Observations,
            ],
        }
    }
}

impl core::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            PayloadKind::StandardEntry => "standard_entry",
            PayloadKind::ServiceReturn => "service_return",
            PayloadKind::ContractReturn => "contract_return",
            PayloadKind::NormalReturn => "normal_return",
            PayloadKind::Exit => "exit",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardEntryFields {
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub purchase_order_number: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceReturnFields {
    #[serde(default)]
    pub authentication_code: Option<String>,
    #[serde(default)]
    pub withdrawal_date: Option<NaiveDate>,
    #[serde(default)]
    pub withdrawer_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractReturnFields {
    #[serde(default)]
    pub returner_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalReturnFields {
    #[serde(default)]
    pub withdrawer_name: Option<String>,
    #[serde(default)]
    pub withdrawal_date: Option<NaiveDate>,
}

/// Shared by every exit subtype.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitFields {
    #[serde(default)]
    pub withdrawer_name: Option<String>,
    #[serde(default)]
    pub vehicle_plate: Option<String>,
    #[serde(default)]
    pub observations: Option<String>,
}

impl ExitFields {
    pub fn withdrawn_by(name: impl Into<String>) -> Self {
        Self {
            withdrawer_name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Subtype-specific payload of a movement.
///
/// Required-ness lives in the movement-type table, not here: every field is
/// optional at the type level so that an absent required field can be
/// reported by name instead of failing deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubtypeFields {
    StandardEntry(StandardEntryFields),
    ServiceReturn(ServiceReturnFields),
    ContractReturn(ContractReturnFields),
    NormalReturn(NormalReturnFields),
    Exit(ExitFields),
}

impl SubtypeFields {
    pub fn kind(&self) -> PayloadKind {
        match self {
            SubtypeFields::StandardEntry(_) => PayloadKind::StandardEntry,
            SubtypeFields::ServiceReturn(_) => PayloadKind::ServiceReturn,
            SubtypeFields::ContractReturn(_) => PayloadKind::ContractReturn,
            SubtypeFields::NormalReturn(_) => PayloadKind::NormalReturn,
            SubtypeFields::Exit(_) => PayloadKind::Exit,
        }
    }

    /// Whether `field` is present with a non-blank value.
    pub fn has(&self, field: FieldKey) -> bool {
        match (self, field) {
            (SubtypeFields::StandardEntry(f), FieldKey::InvoiceNumber) => filled(&f.invoice_number),
            (SubtypeFields::StandardEntry(f), FieldKey::PurchaseOrderNumber) => {
                filled(&f.purchase_order_number)
            }
            (SubtypeFields::StandardEntry(f), FieldKey::Supplier) => filled(&f.supplier),
            (SubtypeFields::ServiceReturn(f), FieldKey::AuthenticationCode) => {
                filled(&f.authentication_code)
            }
            (SubtypeFields::ServiceReturn(f), FieldKey::WithdrawalDate) => f.withdrawal_date.is_some(),
            (SubtypeFields::ServiceReturn(f), FieldKey::WithdrawerName) => filled(&f.withdrawer_name),
            (SubtypeFields::ContractReturn(f), FieldKey::ReturnerName) => filled(&f.returner_name),
            (SubtypeFields::NormalReturn(f), FieldKey::WithdrawerName) => filled(&f.withdrawer_name),
            (SubtypeFields::NormalReturn(f), FieldKey::WithdrawalDate) => f.withdrawal_date.is_some(),
            (SubtypeFields::Exit(f), FieldKey::WithdrawerName) => filled(&f.withdrawer_name),
            (SubtypeFields::Exit(f), FieldKey::VehiclePlate) => filled(&f.vehicle_plate),
            (SubtypeFields::Exit(f), FieldKey::Observations) => filled(&f.observations),
            _ => false,
        }
    }
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Immutable, append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: MovementId,
    pub material_id: MaterialId,
    pub scope: WarehouseScope,
    pub direction: Direction,
    pub subtype: SubtypeKey,
    pub quantity: Quantity,
    pub fields: SubtypeFields,
    pub performed_by: UserId,
    pub performed_at: DateTime<Utc>,
    /// Set on every record produced by one exit commit.
    pub batch_id: Option<BatchId>,
    /// Material stock right after this movement was applied.
    pub balance_after: Quantity,
}

impl MovementRecord {
    /// `+quantity` for entries, `-quantity` for exits.
    pub fn signed_quantity(&self) -> Decimal {
        match self.direction {
            Direction::Entry => self.quantity.value(),
            Direction::Exit => -self.quantity.value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_strings_count_as_absent() {
        let fields = SubtypeFields::Exit(ExitFields {
            withdrawer_name: Some("   ".to_string()),
            vehicle_plate: Some("ABC1D23".to_string()),
            observations: None,
        });
        assert!(!fields.has(FieldKey::WithdrawerName));
        assert!(fields.has(FieldKey::VehiclePlate));
        assert!(!fields.has(FieldKey::InvoiceNumber));
    }

    #[test]
    fn payload_is_tagged_by_kind() {
        let json = r#"{"kind":"service_return","authentication_code":"AUT-77","withdrawal_date":"2024-03-01"}"#;
        let fields: SubtypeFields = serde_json::from_str(json).unwrap();
        assert_eq!(fields.kind(), PayloadKind::ServiceReturn);
        assert!(fields.has(FieldKey::AuthenticationCode));
        assert!(fields.has(FieldKey::WithdrawalDate));
        assert!(!fields.has(FieldKey::WithdrawerName));
    }

    #[test]
    fn every_present_field_belongs_to_its_kind() {
        let all = [
            FieldKey::InvoiceNumber,
            FieldKey::PurchaseOrderNumber,
            FieldKey::Supplier,
            FieldKey::AuthenticationCode,
            FieldKey::WithdrawalDate,
            FieldKey::WithdrawerName,
            FieldKey::ReturnerName,
            FieldKey::VehiclePlate,
            FieldKey::Observations,
        ];
        let fields = SubtypeFields::StandardEntry(StandardEntryFields {
            invoice_number: Some("NF-1".into()),
            purchase_order_number: Some("PO-2".into()),
            supplier: Some("ACME".into()),
        });
        for key in all {
            if fields.has(key) {
                assert!(fields.kind().fields().contains(&key), "{key} outside its kind");
            }
        }
    }

    #[test]
    fn signed_quantity_follows_direction() {
        let record = MovementRecord {
            id: MovementId::new(),
            material_id: MaterialId::new(),
            scope: WarehouseScope::Central,
            direction: Direction::Exit,
            subtype: SubtypeKey::from(subtypes::NORMAL),
            quantity: Quantity::from_units(4),
            fields: SubtypeFields::Exit(ExitFields::withdrawn_by("Ana")),
            performed_by: UserId::new(),
            performed_at: Utc::now(),
            batch_id: Some(BatchId::new()),
            balance_after: Quantity::from_units(6),
        };
        assert_eq!(record.signed_quantity(), Decimal::from(-4));
    }
}
