use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Json, Query};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use almox_core::{MaterialId, Quantity};
use almox_infra::{ExitBasket, ExitItem, ExitRequest};
use almox_inventory::{Direction, ExitFields, SubtypeFields, SubtypeKey, WarehouseScope};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ExitItemRequest {
    pub material_id: MaterialId,
    pub quantity: Quantity,
}

/// Exit batch body: the shared exit fields sit at the top level.
#[derive(Debug, Deserialize)]
pub struct ExitBatchRequest {
    pub items: Vec<ExitItemRequest>,
    pub subtype: SubtypeKey,
    #[serde(default)]
    pub withdrawer_name: Option<String>,
    #[serde(default)]
    pub vehicle_plate: Option<String>,
    #[serde(default)]
    pub observations: Option<String>,
}

impl ExitBatchRequest {
    pub fn into_exit_request(self) -> ExitRequest {
        ExitRequest {
            items: self
                .items
                .into_iter()
                .map(|i| ExitItem {
                    material_id: i.material_id,
                    quantity: i.quantity,
                })
                .collect(),
            subtype: self.subtype,
            fields: exit_fields(self.withdrawer_name, self.vehicle_plate, self.observations),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BasketItemRequest {
    pub material_id: MaterialId,
    pub quantity: Quantity,
}

#[derive(Debug, Deserialize)]
pub struct BasketCommitRequest {
    pub subtype: SubtypeKey,
    #[serde(default)]
    pub withdrawer_name: Option<String>,
    #[serde(default)]
    pub vehicle_plate: Option<String>,
    #[serde(default)]
    pub observations: Option<String>,
}

impl BasketCommitRequest {
    pub fn into_parts(self) -> (SubtypeKey, SubtypeFields) {
        let fields = exit_fields(self.withdrawer_name, self.vehicle_plate, self.observations);
        (self.subtype, fields)
    }
}

fn exit_fields(
    withdrawer_name: Option<String>,
    vehicle_plate: Option<String>,
    observations: Option<String>,
) -> SubtypeFields {
    SubtypeFields::Exit(ExitFields {
        withdrawer_name,
        vehicle_plate,
        observations,
    })
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    #[serde(default)]
    pub scope: Option<WarehouseScope>,
}

#[derive(Debug, Deserialize)]
pub struct MovementTypesQuery {
    pub scope: WarehouseScope,
    pub direction: Direction,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct BasketView<'a> {
    pub id: Uuid,
    pub scope: Option<WarehouseScope>,
    pub items: Vec<IndexedBasketItem<'a>>,
}

#[derive(Debug, Serialize)]
pub struct IndexedBasketItem<'a> {
    pub index: usize,
    #[serde(flatten)]
    pub item: &'a almox_infra::BasketItem,
}

impl<'a> BasketView<'a> {
    pub fn new(id: Uuid, basket: &'a ExitBasket) -> Self {
        Self {
            id,
            scope: basket.scope(),
            items: basket
                .items()
                .enumerate()
                .map(|(index, item)| IndexedBasketItem { index, item })
                .collect(),
        }
    }
}

// -------------------------
// Extractor helpers
// -------------------------

/// Body deserialisation failures are validation errors (400), not axum's 422.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(v)| v)
        .map_err(|rej| errors::bad_request(rej.body_text()))
}

pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, axum::response::Response> {
    query
        .map(|Query(v)| v)
        .map_err(|rej| errors::bad_request(rej.body_text()))
}

pub fn parse_material_id(s: &str) -> Result<MaterialId, axum::response::Response> {
    s.parse::<MaterialId>()
        .map_err(|_| errors::bad_request("invalid material id"))
}

pub fn parse_basket_id(s: &str) -> Result<Uuid, axum::response::Response> {
    Uuid::parse_str(s).map_err(|_| errors::bad_request("invalid basket id"))
}
