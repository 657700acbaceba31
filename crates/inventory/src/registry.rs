//! Movement-type registry: which subtypes exist per (scope, direction) and
//! which evidentiary fields each of them requires.
//!
//! The table is built once and shared (`Arc`) by the stock engine and the
//! HTTP layer, so there is a single source of truth for the taxonomy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use almox_core::{DomainError, DomainResult, Quantity};

use crate::movement::{subtypes, Direction, FieldKey, PayloadKind, SubtypeFields, SubtypeKey};
use crate::scope::{ScopeKind, WarehouseScope};

/// One row of the movement-type table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementTypeDefinition {
    pub scope: ScopeKind,
    pub direction: Direction,
    pub key: SubtypeKey,
    pub label: String,
    pub payload: PayloadKind,
    #[serde(default)]
    pub required: Vec<FieldKey>,
    #[serde(default)]
    pub optional: Vec<FieldKey>,
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum FieldError {
    #[error("subtype '{subtype}' is not registered for {direction} movements in {scope:?} warehouses")]
    UnknownSubtype {
        scope: ScopeKind,
        direction: Direction,
        subtype: SubtypeKey,
    },

    #[error("missing required field '{field}'")]
    MissingRequiredField { field: FieldKey },

    #[error("payload '{found}' does not match subtype payload '{expected}'")]
    PayloadMismatch {
        expected: PayloadKind,
        found: PayloadKind,
    },

    #[error("invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },
}

impl FieldError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Non-empty list of field errors for one movement.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{}", join(.0))]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn single(error: FieldError) -> Self {
        Self(vec![error])
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<FieldError> {
        self.0
    }
}

fn join(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Summary of a subtype for selection lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtypeOption {
    pub key: SubtypeKey,
    pub label: String,
    pub payload: PayloadKind,
    pub required: Vec<FieldKey>,
    pub optional: Vec<FieldKey>,
}

/// Immutable movement-type table keyed by (scope kind, direction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementTypeRegistry {
    table: BTreeMap<(ScopeKind, Direction), Vec<MovementTypeDefinition>>,
}

impl MovementTypeRegistry {
    /// Build a registry from explicit rows, checking the table is coherent:
    /// no duplicate keys, no field both required and optional, every field
    /// carried by the subtype's payload, and every exit requiring a withdrawer.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = MovementTypeDefinition>,
    ) -> DomainResult<Self> {
        let mut table: BTreeMap<(ScopeKind, Direction), Vec<MovementTypeDefinition>> = BTreeMap::new();

        for def in definitions {
            let slot = table.entry((def.scope, def.direction)).or_default();
            if slot.iter().any(|d| d.key == def.key) {
                return Err(DomainError::validation(format!(
                    "duplicate subtype '{}' for {:?}/{}",
                    def.key, def.scope, def.direction
                )));
            }
            if let Some(f) = def.required.iter().find(|f| def.optional.contains(f)) {
                return Err(DomainError::validation(format!(
                    "field '{f}' is both required and optional in '{}'",
                    def.key
                )));
            }
            let allowed = def.payload.fields();
            if let Some(f) = def
                .required
                .iter()
                .chain(def.optional.iter())
                .find(|f| !allowed.contains(f))
            {
                return Err(DomainError::validation(format!(
                    "field '{f}' is not carried by payload '{}' of '{}'",
                    def.payload, def.key
                )));
            }
            if def.direction == Direction::Exit && !def.required.contains(&FieldKey::WithdrawerName) {
                return Err(DomainError::validation(format!(
                    "exit subtype '{}' must require withdrawer_name",
                    def.key
                )));
            }
            slot.push(def);
        }

        Ok(Self { table })
    }

    /// The standard warehouse taxonomy (see [`standard_definitions`]).
    pub fn standard() -> Self {
        let mut table: BTreeMap<(ScopeKind, Direction), Vec<MovementTypeDefinition>> = BTreeMap::new();
        for def in standard_definitions() {
            table.entry((def.scope, def.direction)).or_default().push(def);
        }
        Self { table }
    }

    /// Subtypes valid for a scope/direction pair, in table order.
    pub fn subtypes_for(&self, scope: WarehouseScope, direction: Direction) -> Vec<SubtypeOption> {
        self.definitions(scope, direction)
            .iter()
            .map(|d| SubtypeOption {
                key: d.key.clone(),
                label: d.label.clone(),
                payload: d.payload,
                required: d.required.clone(),
                optional: d.optional.clone(),
            })
            .collect()
    }

    pub fn definitions(&self, scope: WarehouseScope, direction: Direction) -> &[MovementTypeDefinition] {
        self.table
            .get(&(scope.kind(), direction))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn lookup(
        &self,
        scope: WarehouseScope,
        direction: Direction,
        subtype: &SubtypeKey,
    ) -> Option<&MovementTypeDefinition> {
        self.definitions(scope, direction)
            .iter()
            .find(|d| &d.key == subtype)
    }

    /// Check a subtype and its payload against the table.
    ///
    /// An unknown subtype is reported alone; otherwise a payload of the wrong
    /// kind is reported alone; otherwise every absent required field is listed.
    pub fn validate(
        &self,
        scope: WarehouseScope,
        direction: Direction,
        subtype: &SubtypeKey,
        fields: &SubtypeFields,
    ) -> Result<&MovementTypeDefinition, ValidationErrors> {
        let def = self.lookup(scope, direction, subtype).ok_or_else(|| {
            ValidationErrors::single(FieldError::UnknownSubtype {
                scope: scope.kind(),
                direction,
                subtype: subtype.clone(),
            })
        })?;

        if fields.kind() != def.payload {
            return Err(ValidationErrors::single(FieldError::PayloadMismatch {
                expected: def.payload,
                found: fields.kind(),
            }));
        }

        let missing: Vec<FieldError> = def
            .required
            .iter()
            .filter(|f| !fields.has(**f))
            .map(|f| FieldError::MissingRequiredField { field: *f })
            .collect();

        if missing.is_empty() {
            Ok(def)
        } else {
            Err(ValidationErrors(missing))
        }
    }

    /// Validate a full movement: positive quantity plus subtype contract.
    /// All problems are collected into one error list.
    pub fn validate_movement(
        &self,
        scope: WarehouseScope,
        direction: Direction,
        subtype: &SubtypeKey,
        quantity: Quantity,
        fields: &SubtypeFields,
    ) -> Result<&MovementTypeDefinition, ValidationErrors> {
        let quantity_error = quantity
            .is_zero()
            .then(|| FieldError::invalid("quantity", "must be greater than zero"));

        match (self.validate(scope, direction, subtype, fields), quantity_error) {
            (Ok(def), None) => Ok(def),
            (Ok(_), Some(q)) => Err(ValidationErrors::single(q)),
            (Err(mut errs), Some(q)) => {
                errs.0.insert(0, q);
                Err(errs)
            }
            (Err(errs), None) => Err(errs),
        }
    }
}

impl Default for MovementTypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Rows of the standard taxonomy, in display order.
///
/// Maintenance materials are never checked out, so neither the
/// `acautelamento` exits nor the returns tied to them are offered there.
pub fn standard_definitions() -> Vec<MovementTypeDefinition> {
    let mut defs = Vec::new();

    for scope in [ScopeKind::Central, ScopeKind::Client] {
        defs.push(entrada_comum(scope));
        defs.push(def(
            scope,
            Direction::Entry,
            subtypes::DEVOLUCAO_SERVICO,
            "Devolução de serviço",
            PayloadKind::ServiceReturn,
            &[FieldKey::AuthenticationCode],
            &[FieldKey::WithdrawalDate, FieldKey::WithdrawerName],
        ));
        defs.push(def(
            scope,
            Direction::Entry,
            subtypes::DEVOLUCAO_CONTRATACAO,
            "Devolução de contratação",
            PayloadKind::ContractReturn,
            &[FieldKey::ReturnerName],
            &[],
        ));
        defs.push(devolucao_normal(scope));

        defs.push(exit(scope, subtypes::NORMAL, "Saída normal"));
        defs.push(exit(scope, subtypes::DESCARTE, "Descarte"));
        defs.push(exit(scope, subtypes::ACAUTELAMENTO_SERVICO, "Acautelamento de serviço"));
        defs.push(exit(
            scope,
            subtypes::ACAUTELAMENTO_CONTRATACAO,
            "Acautelamento de contratação",
        ));
    }

    defs.push(entrada_comum(ScopeKind::Maintenance));
    defs.push(devolucao_normal(ScopeKind::Maintenance));
    defs.push(exit(ScopeKind::Maintenance, subtypes::NORMAL, "Saída normal"));
    defs.push(exit(ScopeKind::Maintenance, subtypes::DESCARTE, "Descarte"));

    defs
}

fn def(
    scope: ScopeKind,
    direction: Direction,
    key: &str,
    label: &str,
    payload: PayloadKind,
    required: &[FieldKey],
    optional: &[FieldKey],
) -> MovementTypeDefinition {
    MovementTypeDefinition {
        scope,
        direction,
        key: SubtypeKey::from(key),
        label: label.to_string(),
        payload,
        required: required.to_vec(),
        optional: optional.to_vec(),
    }
}

fn entrada_comum(scope: ScopeKind) -> MovementTypeDefinition {
    def(
        scope,
        Direction::Entry,
        subtypes::ENTRADA_COMUM,
        "Entrada comum",
        PayloadKind::StandardEntry,
        &[],
        &[
            FieldKey::InvoiceNumber,
            FieldKey::PurchaseOrderNumber,
            FieldKey::Supplier,
        ],
    )
}

fn devolucao_normal(scope: ScopeKind) -> MovementTypeDefinition {
    def(
        scope,
        Direction::Entry,
        subtypes::DEVOLUCAO_NORMAL,
        "Devolução normal",
        PayloadKind::NormalReturn,
        &[],
        &[FieldKey::WithdrawerName, FieldKey::WithdrawalDate],
    )
}

fn exit(scope: ScopeKind, key: &str, label: &str) -> MovementTypeDefinition {
    def(
        scope,
        Direction::Exit,
        key,
        label,
        PayloadKind::Exit,
        &[FieldKey::WithdrawerName],
        &[FieldKey::VehiclePlate, FieldKey::Observations],
    )
}
