//! Integration tests for the full stock pipeline.
//!
//! Tests: catalog → StockEngine → InventoryStore → ledger / low-stock view
//!
//! Verifies:
//! - stock never goes negative, including under concurrent writers
//! - failing batches leave every material untouched
//! - the ledger explains every stock level

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::mpsc::{self, Sender};
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;
    use std::time::Duration;

    use proptest::prelude::*;

    use almox_core::{ExpectedVersion, MaterialId, Quantity, UserId};
    use almox_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
    use almox_inventory::{
        subtypes, Direction, ExitFields, FieldError, Material, MaterialPatch, MovementRecord,
        MovementTypeRegistry, NewMaterial, StandardEntryFields, StockEvent, SubtypeFields,
        UnitType, WarehouseScope,
    };

    use crate::basket::ExitBasket;
    use crate::engine::{EngineConfig, EngineError, EntryRequest, ExitItem, ExitRequest, StockEngine};
    use crate::ledger::{MovementFilter, MovementLedger};
    use crate::low_stock::LowStockMonitor;
    use crate::store::{InMemoryInventoryStore, InventoryStore, StockCommit, StoreError};

    type Bus = Arc<InMemoryEventBus<EventEnvelope<StockEvent>>>;

    fn q(n: u64) -> Quantity {
        Quantity::from_units(n)
    }

    fn registry() -> Arc<MovementTypeRegistry> {
        Arc::new(MovementTypeRegistry::standard())
    }

    fn setup() -> StockEngine<Arc<InMemoryInventoryStore>, Bus> {
        StockEngine::new(
            Arc::new(InMemoryInventoryStore::new()),
            Arc::new(InMemoryEventBus::new()),
            registry(),
            EngineConfig::default(),
        )
    }

    fn register<S: InventoryStore + Clone>(
        engine: &StockEngine<S, Bus>,
        scope: WarehouseScope,
        number: &str,
        minimum: u64,
    ) -> Material {
        engine
            .catalog()
            .register(NewMaterial {
                scope,
                material_number: Some(number.to_string()),
                description: format!("Material {number}"),
                unit: UnitType::Piece,
                minimum_stock: q(minimum),
                addressing: None,
            })
            .unwrap()
    }

    fn restock(id: MaterialId, units: u64) -> EntryRequest {
        EntryRequest {
            material_id: id,
            subtype: subtypes::ENTRADA_COMUM.into(),
            quantity: q(units),
            fields: SubtypeFields::StandardEntry(StandardEntryFields {
                invoice_number: Some("NF-1029".to_string()),
                ..Default::default()
            }),
        }
    }

    fn receive<S: InventoryStore>(engine: &StockEngine<S, Bus>, id: MaterialId, units: u64) -> MovementRecord {
        engine.commit_entry(restock(id, units), UserId::new()).unwrap()
    }

    fn withdrawal(items: &[(MaterialId, u64)]) -> ExitRequest {
        ExitRequest {
            items: items
                .iter()
                .map(|(material_id, n)| ExitItem {
                    material_id: *material_id,
                    quantity: q(*n),
                })
                .collect(),
            subtype: subtypes::NORMAL.into(),
            fields: SubtypeFields::Exit(ExitFields::withdrawn_by("Marcos")),
        }
    }

    fn stock<S: InventoryStore>(engine: &StockEngine<S, Bus>, id: MaterialId) -> Material {
        engine.store().get_material(id).unwrap().unwrap()
    }

    #[test]
    fn scenario_a_entry_lifts_material_above_minimum() {
        let engine = setup();
        let m = register(&engine, WarehouseScope::Central, "A-1", 20);
        receive(&engine, m.id_typed(), 45);

        let record = receive(&engine, m.id_typed(), 10);

        let after = stock(&engine, m.id_typed());
        assert_eq!(after.current_quantity(), q(55));
        assert!(!after.is_low_stock());
        assert_eq!(record.balance_after, q(55));
    }

    #[test]
    fn scenario_b_recomputation_flags_low_stock() {
        let engine = setup();
        let m = register(&engine, WarehouseScope::Central, "B-1", 0);
        receive(&engine, m.id_typed(), 8);
        assert!(!stock(&engine, m.id_typed()).is_low_stock());

        let patched = engine
            .catalog()
            .update(
                m.id_typed(),
                &MaterialPatch {
                    minimum_stock: Some(q(15)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(patched.is_low_stock());

        let monitor = LowStockMonitor::new(engine.store().clone());
        assert_eq!(monitor.count(WarehouseScope::Central).unwrap(), 1);
    }

    #[test]
    fn scenario_c_exit_beyond_stock_fails_and_leaves_stock() {
        let engine = setup();
        let m = register(&engine, WarehouseScope::Central, "C-1", 0);
        receive(&engine, m.id_typed(), 25);

        let err = engine
            .commit_exit(withdrawal(&[(m.id_typed(), 30)]), UserId::new())
            .unwrap_err();

        match err {
            EngineError::InsufficientStock { shortages } => {
                assert_eq!(shortages.len(), 1);
                assert_eq!(shortages[0].requested, q(30));
                assert_eq!(shortages[0].available, q(25));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stock(&engine, m.id_typed()).current_quantity(), q(25));
    }

    #[test]
    fn scenario_d_maintenance_has_no_acautelamento() {
        let engine = setup();
        let m = register(&engine, WarehouseScope::Maintenance, "D-1", 0);
        receive(&engine, m.id_typed(), 5);

        let mut request = withdrawal(&[(m.id_typed(), 1)]);
        request.subtype = subtypes::ACAUTELAMENTO_SERVICO.into();

        let err = engine.commit_exit(request, UserId::new()).unwrap_err();
        match err {
            EngineError::Validation(errors) => {
                assert!(matches!(errors[0], FieldError::UnknownSubtype { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn scenario_e_one_short_item_fails_the_whole_batch() {
        let engine = setup();
        let a = register(&engine, WarehouseScope::Client(2), "E-1", 0);
        let b = register(&engine, WarehouseScope::Client(2), "E-2", 0);
        receive(&engine, a.id_typed(), 10);
        receive(&engine, b.id_typed(), 25);
        let ledger = MovementLedger::new(engine.store().clone());
        let before = ledger.query(MovementFilter::default()).iter().count();

        let err = engine
            .commit_exit(withdrawal(&[(a.id_typed(), 5), (b.id_typed(), 40)]), UserId::new())
            .unwrap_err();

        assert!(matches!(err, EngineError::InsufficientStock { ref shortages } if shortages.len() == 1 && shortages[0].material_id == b.id_typed()));
        assert_eq!(stock(&engine, a.id_typed()).current_quantity(), q(10));
        assert_eq!(stock(&engine, b.id_typed()).current_quantity(), q(25));
        assert_eq!(ledger.query(MovementFilter::default()).iter().count(), before);
    }

    #[test]
    fn every_shortage_in_a_batch_is_reported() {
        let engine = setup();
        let a = register(&engine, WarehouseScope::Central, "S-1", 0);
        let b = register(&engine, WarehouseScope::Central, "S-2", 0);
        receive(&engine, a.id_typed(), 1);
        receive(&engine, b.id_typed(), 1);

        let err = engine
            .commit_exit(withdrawal(&[(a.id_typed(), 2), (b.id_typed(), 3)]), UserId::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientStock { ref shortages } if shortages.len() == 2));
    }

    #[test]
    fn batch_records_share_batch_id_and_timestamp() {
        let engine = setup();
        let a = register(&engine, WarehouseScope::Central, "T-1", 0);
        let b = register(&engine, WarehouseScope::Central, "T-2", 0);
        receive(&engine, a.id_typed(), 10);
        receive(&engine, b.id_typed(), 10);

        let receipt = engine
            .commit_exit(withdrawal(&[(b.id_typed(), 3), (a.id_typed(), 10)]), UserId::new())
            .unwrap();

        assert_eq!(receipt.records.len(), 2);
        for record in &receipt.records {
            assert_eq!(record.batch_id, Some(receipt.batch_id));
            assert_eq!(record.performed_at, receipt.records[0].performed_at);
            assert_eq!(record.direction, Direction::Exit);
        }
        assert_eq!(receipt.records[0].material_id, b.id_typed());
        assert_eq!(stock(&engine, a.id_typed()).current_quantity(), Quantity::ZERO);
    }

    #[test]
    fn concurrent_over_committing_exits_one_wins() {
        let engine = setup();
        let m = register(&engine, WarehouseScope::Central, "R-1", 0);
        receive(&engine, m.id_typed(), 25);
        let engine = Arc::new(engine);
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let engine = engine.clone();
                let barrier = barrier.clone();
                let id = m.id_typed();
                thread::spawn(move || {
                    barrier.wait();
                    engine.commit_exit(withdrawal(&[(id, 20)]), UserId::new())
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(EngineError::InsufficientStock { .. }))));
        assert_eq!(stock(&*engine, m.id_typed()).current_quantity(), q(5));
    }

    #[test]
    fn stale_basket_cannot_oversell() {
        let engine = setup();
        let m = register(&engine, WarehouseScope::Central, "K-1", 0);
        receive(&engine, m.id_typed(), 10);

        let mut first = ExitBasket::new();
        let mut second = ExitBasket::new();
        first.add(engine.store(), m.id_typed(), q(7)).unwrap();
        // Advisory check passes on the same snapshot.
        second.add(engine.store(), m.id_typed(), q(7)).unwrap();

        let fields = SubtypeFields::Exit(ExitFields::withdrawn_by("Lia"));
        first
            .commit(&engine, UserId::new(), subtypes::NORMAL.into(), fields.clone())
            .unwrap();
        let err = second
            .commit(&engine, UserId::new(), subtypes::NORMAL.into(), fields)
            .unwrap_err();

        assert!(matches!(
            err,
            crate::basket::BasketError::Engine(EngineError::InsufficientStock { .. })
        ));
        assert_eq!(second.len(), 1);
        assert_eq!(stock(&engine, m.id_typed()).current_quantity(), q(3));
    }

    /// Store wrapper that reports a version conflict for the first N commits.
    #[derive(Debug)]
    struct ConflictingStore {
        inner: InMemoryInventoryStore,
        conflicts_left: AtomicU32,
        commits_seen: AtomicU32,
    }

    impl ConflictingStore {
        fn new(conflicts: u32) -> Self {
            Self {
                inner: InMemoryInventoryStore::new(),
                conflicts_left: AtomicU32::new(conflicts),
                commits_seen: AtomicU32::new(0),
            }
        }
    }

    impl InventoryStore for ConflictingStore {
        fn insert_material(&self, material: Material) -> Result<Material, StoreError> {
            self.inner.insert_material(material)
        }

        fn replace_material(&self, material: Material, expected: ExpectedVersion) -> Result<Material, StoreError> {
            self.inner.replace_material(material, expected)
        }

        fn get_material(&self, id: MaterialId) -> Result<Option<Material>, StoreError> {
            self.inner.get_material(id)
        }

        fn list_materials(&self, scope: WarehouseScope) -> Result<Vec<Material>, StoreError> {
            self.inner.list_materials(scope)
        }

        fn commit(&self, commit: StockCommit) -> Result<usize, StoreError> {
            self.commits_seen.fetch_add(1, Ordering::SeqCst);
            let injected = self
                .conflicts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                return Err(StoreError::Concurrency("injected".to_string()));
            }
            self.inner.commit(commit)
        }

        fn movements(&self, offset: usize, limit: usize) -> Result<Vec<MovementRecord>, StoreError> {
            self.inner.movements(offset, limit)
        }
    }

    fn conflicting_engine(conflicts: u32, max_retries: u32) -> StockEngine<Arc<ConflictingStore>, Bus> {
        StockEngine::new(
            Arc::new(ConflictingStore::new(conflicts)),
            Arc::new(InMemoryEventBus::new()),
            registry(),
            EngineConfig {
                max_retries,
                retry_backoff_ms: 0,
            },
        )
    }

    #[test]
    fn version_conflicts_are_retried() {
        let engine = conflicting_engine(0, 3);
        let m = register(&engine, WarehouseScope::Central, "V-1", 0);
        receive(&engine, m.id_typed(), 10);
        engine.store().conflicts_left.store(2, Ordering::SeqCst);
        let seen = engine.store().commits_seen.load(Ordering::SeqCst);

        engine
            .commit_exit(withdrawal(&[(m.id_typed(), 4)]), UserId::new())
            .unwrap();

        assert_eq!(engine.store().commits_seen.load(Ordering::SeqCst) - seen, 3);
        assert_eq!(stock(&engine, m.id_typed()).current_quantity(), q(6));
    }

    #[test]
    fn exhausted_retries_surface_concurrent_modification() {
        let engine = conflicting_engine(0, 2);
        let m = register(&engine, WarehouseScope::Central, "V-2", 0);
        receive(&engine, m.id_typed(), 10);
        engine.store().conflicts_left.store(u32::MAX, Ordering::SeqCst);

        let err = engine
            .commit_exit(withdrawal(&[(m.id_typed(), 4)]), UserId::new())
            .unwrap_err();

        assert_eq!(err, EngineError::ConcurrentModification { attempts: 3 });
        assert!(err.is_retryable());
        assert_eq!(stock(&engine, m.id_typed()).current_quantity(), q(10));
    }

    /// Records publish order; stalls inside the first low-stock clear.
    #[derive(Default)]
    struct StallingBus {
        published: Mutex<Vec<String>>,
        stalled: Mutex<Option<Sender<()>>>,
    }

    impl EventBus<EventEnvelope<StockEvent>> for StallingBus {
        type Error = Infallible;

        fn publish(&self, message: EventEnvelope<StockEvent>) -> Result<(), Infallible> {
            if message.event_type() == "stock.low_stock.cleared" {
                if let Some(tx) = self.stalled.lock().unwrap().take() {
                    tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(200));
                }
            }
            self.published.lock().unwrap().push(message.event_type().to_string());
            Ok(())
        }

        fn subscribe(&self) -> Subscription<EventEnvelope<StockEvent>> {
            let (_tx, rx) = mpsc::channel();
            Subscription::new(rx)
        }
    }

    #[test]
    fn low_stock_flips_reach_the_bus_in_commit_order() {
        let bus = Arc::new(StallingBus::default());
        let (stalled_tx, stalled_rx) = mpsc::channel();
        *bus.stalled.lock().unwrap() = Some(stalled_tx);

        let engine = Arc::new(StockEngine::new(
            Arc::new(InMemoryInventoryStore::new()),
            bus.clone(),
            registry(),
            EngineConfig::default(),
        ));
        let id = engine
            .catalog()
            .register(NewMaterial {
                scope: WarehouseScope::Central,
                material_number: Some("ORD-1".to_string()),
                description: "Luva nitrílica".to_string(),
                unit: UnitType::Box,
                minimum_stock: q(5),
                addressing: None,
            })
            .unwrap()
            .id_typed();

        let entering = {
            let engine = engine.clone();
            thread::spawn(move || engine.commit_entry(restock(id, 8), UserId::new()))
        };
        // The entry has committed and is now publishing its clear.
        stalled_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        engine.commit_exit(withdrawal(&[(id, 6)]), UserId::new()).unwrap();
        entering.join().unwrap().unwrap();

        let flips: Vec<String> = bus
            .published
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.starts_with("stock.low_stock"))
            .cloned()
            .collect();
        assert_eq!(flips, vec!["stock.low_stock.cleared", "stock.low_stock.raised"]);

        let material = engine.store().get_material(id).unwrap().unwrap();
        assert_eq!(material.current_quantity(), q(2));
        assert!(material.is_low_stock());
    }

    #[test]
    fn engines_sharing_a_store_never_oversell() {
        let store = Arc::new(InMemoryInventoryStore::new());
        let config = EngineConfig {
            max_retries: 50,
            retry_backoff_ms: 0,
        };
        let engines: Vec<_> = (0..2)
            .map(|_| {
                let bus: Bus = Arc::new(InMemoryEventBus::new());
                Arc::new(StockEngine::new(store.clone(), bus, registry(), config))
            })
            .collect();
        let m = register(&*engines[0], WarehouseScope::Central, "W-1", 0);
        receive(&*engines[0], m.id_typed(), 30);

        let threads = 6;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let engine = engines[t % 2].clone();
                let barrier = barrier.clone();
                let id = m.id_typed();
                thread::spawn(move || {
                    barrier.wait();
                    (0..10)
                        .filter(|_| engine.commit_exit(withdrawal(&[(id, 1)]), UserId::new()).is_ok())
                        .count()
                })
            })
            .collect();
        let succeeded: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        let remaining = stock(&*engines[0], m.id_typed()).current_quantity();
        assert_eq!(remaining, q(30 - succeeded as u64));
        let ledger = MovementLedger::new(store);
        assert_eq!(ledger.balance_of(m.id_typed()).unwrap(), remaining.value());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn ledger_explains_stock(ops in prop::collection::vec((any::<bool>(), 1u64..20), 1..40)) {
            let engine = setup();
            let m = register(&engine, WarehouseScope::Client(5), "P-1", 10);

            for (is_entry, units) in ops {
                let result = if is_entry {
                    Ok(receive(&engine, m.id_typed(), units))
                } else {
                    engine
                        .commit_exit(withdrawal(&[(m.id_typed(), units)]), UserId::new())
                        .map(|r| r.records[0].clone())
                };
                if let Err(e) = &result {
                    prop_assert!(matches!(e, EngineError::InsufficientStock { .. }), "unexpected error: {:?}", e);
                }

                let current = stock(&engine, m.id_typed());
                prop_assert_eq!(current.is_low_stock(), current.current_quantity() < current.minimum_stock());
            }

            let current = stock(&engine, m.id_typed());
            let ledger = MovementLedger::new(engine.store().clone());
            prop_assert_eq!(ledger.balance_of(m.id_typed()).unwrap(), current.current_quantity().value());
        }
    }
}
