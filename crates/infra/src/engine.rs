//! Stock engine: the only writer of material stock levels.
//!
//! Every entry or exit goes through the same pipeline:
//!
//! ```text
//! request
//!   ↓
//! 1. Load materials, reject unknown ids and cross-scope batches
//!   ↓
//! 2. Validate subtype + evidentiary fields against the registry
//!   ↓
//! 3. Lock every touched material (sorted, de-duplicated)
//!   ↓
//! 4. Re-read under the locks, check availability, apply
//!   ↓
//! 5. Commit materials + ledger records atomically (version-checked)
//!   ↓
//! 6. Release locks, publish stock events
//! ```
//!
//! A version conflict in step 5 means another writer sharing the store got
//! there first; steps 4–5 are retried a bounded number of times.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use almox_core::{
    BatchId, DomainError, ExpectedVersion, MaterialId, MovementId, Quantity, UserId, Versioned,
};
use almox_events::{EventBus, EventEnvelope};
use almox_inventory::{
    Direction, FieldError, Material, MovementRecord, MovementTypeRegistry, MovementsCommitted,
    StockEvent, SubtypeFields, SubtypeKey, ValidationErrors, WarehouseScope,
};

use crate::catalog::MaterialCatalog;
use crate::locks::LockTable;
use crate::publish::StockPublisher;
use crate::store::{InventoryStore, MaterialWrite, StockCommit, StoreError};

/// Retry policy for commits that race another writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Sleep before retry `n` is `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 5,
        }
    }
}

impl EngineConfig {
    fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

/// A material whose requested total exceeds what is on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortage {
    pub material_id: MaterialId,
    pub material_number: String,
    pub requested: Quantity,
    pub available: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("insufficient stock for {} material(s)", .shortages.len())]
    InsufficientStock { shortages: Vec<Shortage> },

    #[error("batch spans several warehouse scopes: {scopes:?}")]
    CrossScopeBatch { scopes: Vec<WarehouseScope> },

    #[error("stock changed concurrently; gave up after {attempts} attempt(s)")]
    ConcurrentModification { attempts: u32 },

    #[error("material not found: {0}")]
    NotFound(MaterialId),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl EngineError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ConcurrentModification { .. })
    }

    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation(vec![FieldError::invalid(field, message)])
    }
}

impl From<ValidationErrors> for EngineError {
    fn from(value: ValidationErrors) -> Self {
        EngineError::Validation(value.into_inner())
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            StoreError::DuplicateMaterialNumber { .. } => EngineError::Conflict(value.to_string()),
            other => EngineError::Store(other),
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => EngineError::invalid("request", msg),
            DomainError::Conflict(msg) => EngineError::Conflict(msg),
        }
    }
}

/// One incoming stock entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRequest {
    pub material_id: MaterialId,
    pub subtype: SubtypeKey,
    pub quantity: Quantity,
    pub fields: SubtypeFields,
}

/// One line of an exit batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitItem {
    pub material_id: MaterialId,
    pub quantity: Quantity,
}

/// A multi-item withdrawal sharing one subtype and one set of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRequest {
    pub items: Vec<ExitItem>,
    pub subtype: SubtypeKey,
    pub fields: SubtypeFields,
}

/// Result of a committed exit batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitReceipt {
    pub batch_id: BatchId,
    pub records: Vec<MovementRecord>,
}

struct Applied {
    records: Vec<MovementRecord>,
    flips: Vec<StockEvent>,
    at: DateTime<Utc>,
}

/// Applies validated movements to the catalog and appends them to the ledger.
#[derive(Debug)]
pub struct StockEngine<S, B> {
    store: S,
    registry: Arc<MovementTypeRegistry>,
    locks: Arc<LockTable>,
    publisher: Arc<StockPublisher<B>>,
    config: EngineConfig,
}

impl<S, B> StockEngine<S, B>
where
    S: InventoryStore,
    B: EventBus<EventEnvelope<StockEvent>>,
{
    pub fn new(store: S, bus: B, registry: Arc<MovementTypeRegistry>, config: EngineConfig) -> Self {
        Self {
            store,
            registry,
            locks: Arc::new(LockTable::new()),
            publisher: Arc::new(StockPublisher::new(bus)),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &MovementTypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Catalog handle sharing this engine's locks and event publisher.
    pub fn catalog(&self) -> MaterialCatalog<S, B>
    where
        S: Clone,
    {
        MaterialCatalog::new(self.store.clone(), self.locks.clone(), self.publisher.clone())
    }

    /// Record incoming stock for one material.
    #[instrument(skip(self, request), fields(material_id = %request.material_id, subtype = %request.subtype, actor = %actor))]
    pub fn commit_entry(&self, request: EntryRequest, actor: UserId) -> Result<MovementRecord, EngineError> {
        let material = self.load(request.material_id)?;
        let scope = material.scope();

        self.registry
            .validate_movement(scope, Direction::Entry, &request.subtype, request.quantity, &request.fields)
            .inspect_err(|e| warn!(error = %e, "entry rejected"))?;
        ensure_active(&material, "material_id")?;

        let lines = [ExitItem {
            material_id: request.material_id,
            quantity: request.quantity,
        }];
        let records = self.apply_with_retry(
            scope,
            Direction::Entry,
            &request.subtype,
            &request.fields,
            &lines,
            actor,
            None,
        )?;

        info!(scope = %scope, quantity = %request.quantity, "entry committed");
        records.into_iter().next().ok_or_else(|| {
            EngineError::Store(StoreError::InvalidWrite("entry produced no record".to_string()))
        })
    }

    /// Withdraw several materials of one scope as a single all-or-nothing batch.
    #[instrument(skip(self, request), fields(items = request.items.len(), subtype = %request.subtype, actor = %actor, batch_id = tracing::field::Empty))]
    pub fn commit_exit(&self, request: ExitRequest, actor: UserId) -> Result<ExitReceipt, EngineError> {
        if request.items.is_empty() {
            return Err(EngineError::invalid("items", "at least one item is required"));
        }

        let mut materials = Vec::with_capacity(request.items.len());
        for item in &request.items {
            materials.push(self.load(item.material_id)?);
        }

        let scopes: Vec<WarehouseScope> = materials
            .iter()
            .map(Material::scope)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if scopes.len() != 1 {
            warn!(?scopes, "exit batch spans several scopes");
            return Err(EngineError::CrossScopeBatch { scopes });
        }
        let scope = scopes[0];

        let mut errors = match self
            .registry
            .validate(scope, Direction::Exit, &request.subtype, &request.fields)
        {
            Ok(_) => Vec::new(),
            Err(e) => e.into_inner(),
        };
        for (idx, (item, material)) in request.items.iter().zip(&materials).enumerate() {
            if item.quantity.is_zero() {
                errors.push(FieldError::invalid(
                    format!("items[{idx}].quantity"),
                    "must be greater than zero",
                ));
            }
            if !material.is_active() {
                errors.push(FieldError::invalid(
                    format!("items[{idx}].material_id"),
                    format!("material {} is deactivated", material.material_number()),
                ));
            }
        }
        if !errors.is_empty() {
            warn!(errors = errors.len(), "exit batch rejected");
            return Err(EngineError::Validation(errors));
        }

        let batch_id = BatchId::new();
        tracing::Span::current().record("batch_id", tracing::field::display(batch_id));

        let records = self
            .apply_with_retry(
                scope,
                Direction::Exit,
                &request.subtype,
                &request.fields,
                &request.items,
                actor,
                Some(batch_id),
            )
            .inspect_err(|e| warn!(error = %e, "exit batch rejected"))?;

        info!(scope = %scope, records = records.len(), "exit batch committed");
        Ok(ExitReceipt { batch_id, records })
    }

    fn load(&self, id: MaterialId) -> Result<Material, EngineError> {
        self.store.get_material(id)?.ok_or(EngineError::NotFound(id))
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_with_retry(
        &self,
        scope: WarehouseScope,
        direction: Direction,
        subtype: &SubtypeKey,
        fields: &SubtypeFields,
        lines: &[ExitItem],
        actor: UserId,
        batch_id: Option<BatchId>,
    ) -> Result<Vec<MovementRecord>, EngineError> {
        let locks = self.locks.for_materials(lines.iter().map(|l| l.material_id));
        let _held = locks.acquire();

        let max_attempts = self.config.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self.try_apply(
                locks.ids(),
                scope,
                direction,
                subtype,
                fields,
                lines,
                actor,
                batch_id,
            );
            match result {
                Err(EngineError::Store(StoreError::Concurrency(reason))) if attempt < max_attempts => {
                    warn!(attempt, max_attempts, %reason, "stock commit raced another writer; retrying");
                    std::thread::sleep(self.config.backoff(attempt));
                }
                Err(EngineError::Store(StoreError::Concurrency(reason))) => {
                    warn!(attempts = attempt, %reason, "stock commit retries exhausted");
                    return Err(EngineError::ConcurrentModification { attempts: attempt });
                }
                Err(e) => return Err(e),
                Ok(applied) => {
                    // Still under the locks: flips for one material reach the
                    // bus in commit order.
                    let records = applied.records.clone();
                    self.publish(scope, direction, batch_id, applied);
                    return Ok(records);
                }
            }
        }
    }

    /// Steps 4–5: re-read, check, apply, commit. Caller holds the locks.
    #[allow(clippy::too_many_arguments)]
    fn try_apply(
        &self,
        ids: &[MaterialId],
        scope: WarehouseScope,
        direction: Direction,
        subtype: &SubtypeKey,
        fields: &SubtypeFields,
        lines: &[ExitItem],
        actor: UserId,
        batch_id: Option<BatchId>,
    ) -> Result<Applied, EngineError> {
        let now = Utc::now();

        let mut before = BTreeMap::new();
        for id in ids {
            let material = self.load(*id)?;
            ensure_active(&material, "material_id")?;
            before.insert(*id, material);
        }

        if direction == Direction::Exit {
            let mut requested: BTreeMap<MaterialId, Quantity> = BTreeMap::new();
            for line in lines {
                let total = requested.entry(line.material_id).or_insert(Quantity::ZERO);
                *total = total.checked_add(line.quantity)?;
            }
            let shortages: Vec<Shortage> = before
                .values()
                .filter_map(|m| {
                    let wanted = *requested.get(&m.id_typed())?;
                    (wanted > m.current_quantity()).then(|| Shortage {
                        material_id: m.id_typed(),
                        material_number: m.material_number().to_string(),
                        requested: wanted,
                        available: m.current_quantity(),
                    })
                })
                .collect();
            if !shortages.is_empty() {
                return Err(EngineError::InsufficientStock { shortages });
            }
        }

        let mut after = before.clone();
        let mut records = Vec::with_capacity(lines.len());
        for line in lines {
            let material = after
                .get_mut(&line.material_id)
                .ok_or(EngineError::NotFound(line.material_id))?;
            material.apply_movement(direction, line.quantity, now)?;

            records.push(MovementRecord {
                id: MovementId::new(),
                material_id: line.material_id,
                scope,
                direction,
                subtype: subtype.clone(),
                quantity: line.quantity,
                fields: fields.clone(),
                performed_by: actor,
                performed_at: now,
                batch_id,
                balance_after: material.current_quantity(),
            });
        }

        // Same key set on both sides, so the zip pairs snapshots of one material.
        let mut writes = Vec::with_capacity(after.len());
        let mut flips = Vec::new();
        for ((_, prior), (_, next)) in before.into_iter().zip(after) {
            if let Some(flip) = StockEvent::low_stock_transition(&prior, &next, now) {
                flips.push(flip);
            }
            writes.push(MaterialWrite {
                expected: ExpectedVersion::exact(prior.version()),
                material: next,
            });
        }

        self.store.commit(StockCommit {
            writes,
            records: records.clone(),
        })?;

        Ok(Applied {
            records,
            flips,
            at: now,
        })
    }

    fn publish(
        &self,
        scope: WarehouseScope,
        direction: Direction,
        batch_id: Option<BatchId>,
        applied: Applied,
    ) {
        let committed = StockEvent::MovementsCommitted(MovementsCommitted {
            scope,
            direction,
            batch_id,
            records: applied.records,
            occurred_at: applied.at,
        });
        self.publisher
            .publish_all(std::iter::once(committed).chain(applied.flips));
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn ensure_active(material: &Material, field: &str) -> Result<(), EngineError> {
    if material.is_active() {
        Ok(())
    } else {
        Err(EngineError::invalid(
            field,
            format!("material {} is deactivated", material.material_number()),
        ))
    }
}
