//! Service wiring: one in-memory store shared by the engine and the read side.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, Instant};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use uuid::Uuid;

use almox_core::UserId;
use almox_events::{EventBus, EventEnvelope, InMemoryEventBus};
use almox_infra::{
    ExitBasket, InMemoryInventoryStore, LowStockMonitor, MaterialCatalog, MovementLedger,
    StockEngine,
};
use almox_inventory::{LowStockChanged, MovementTypeRegistry, StockEvent, WarehouseScope};

use crate::config::AppConfig;

pub type Store = Arc<InMemoryInventoryStore>;
pub type StockBus = Arc<InMemoryEventBus<EventEnvelope<StockEvent>>>;
pub type Engine = StockEngine<Store, StockBus>;

/// Low-stock flip pushed to SSE clients.
#[derive(Debug, Clone, Serialize)]
pub struct LowStockMessage {
    pub event: String,
    pub sequence_number: u64,
    pub low_stock: bool,
    #[serde(flatten)]
    pub change: LowStockChanged,
}

impl LowStockMessage {
    fn from_envelope(env: &EventEnvelope<StockEvent>) -> Option<Self> {
        let (low_stock, change) = match env.payload() {
            StockEvent::LowStockRaised(c) => (true, c),
            StockEvent::LowStockCleared(c) => (false, c),
            StockEvent::MovementsCommitted(_) => return None,
        };
        Some(Self {
            event: env.event_type().to_string(),
            sequence_number: env.sequence_number(),
            low_stock,
            change: change.clone(),
        })
    }
}

/// A staged exit basket owned by one actor.
#[derive(Debug)]
pub struct BasketSession {
    pub owner: UserId,
    pub basket: ExitBasket,
    last_used: Instant,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("basket sessions unavailable")]
    Unavailable,
}

/// Open basket sessions, keyed by basket id.
///
/// A session ends when it is closed, when its basket commits, or when it
/// sits idle past `idle_timeout` and another session opens.
#[derive(Debug)]
pub struct BasketSessions {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<BasketSession>>>>,
    idle_timeout: Duration,
}

impl BasketSessions {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn open(&self, owner: UserId) -> Result<Uuid, SessionError> {
        let mut map = self.inner.lock().map_err(|_| SessionError::Unavailable)?;

        let now = Instant::now();
        // Sessions locked by an in-flight request are in use.
        map.retain(|_, session| match session.try_lock() {
            Ok(s) => now.duration_since(s.last_used) < self.idle_timeout,
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(_)) => false,
        });

        let id = Uuid::now_v7();
        map.insert(
            id,
            Arc::new(Mutex::new(BasketSession {
                owner,
                basket: ExitBasket::new(),
                last_used: now,
            })),
        );
        Ok(id)
    }

    /// The session, if it exists and belongs to `owner`.
    pub fn get(&self, id: Uuid, owner: UserId) -> Option<Arc<Mutex<BasketSession>>> {
        let map = self.inner.lock().ok()?;
        let session = map.get(&id)?.clone();
        drop(map);

        {
            let mut guard = session.lock().ok()?;
            if guard.owner != owner {
                return None;
            }
            guard.last_used = Instant::now();
        }
        Some(session)
    }

    /// Must not be called while holding the session's lock.
    pub fn close(&self, id: Uuid, owner: UserId) -> bool {
        if self.get(id, owner).is_none() {
            return false;
        }
        match self.inner.lock() {
            Ok(mut map) => map.remove(&id).is_some(),
            Err(_) => false,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }
}

pub struct AppServices {
    engine: Engine,
    ledger: MovementLedger<Store>,
    low_stock: LowStockMonitor<Store>,
    baskets: BasketSessions,
    realtime_tx: broadcast::Sender<LowStockMessage>,
}

pub fn build_services(config: &AppConfig) -> AppServices {
    let store: Store = Arc::new(InMemoryInventoryStore::new());
    let bus: StockBus = Arc::new(InMemoryEventBus::new());
    let registry = Arc::new(MovementTypeRegistry::standard());

    // Realtime channel (SSE): lossy broadcast, scope-filtered in handlers.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<LowStockMessage>(256);

    // Background forwarder: bus -> SSE broadcast. A plain thread, so it never
    // holds up runtime shutdown; it ends when the bus is dropped.
    {
        let sub = bus.subscribe();
        let realtime_tx = realtime_tx.clone();
        let spawned = std::thread::Builder::new()
            .name("low-stock-forwarder".to_string())
            .spawn(move || {
                for env in sub.iter() {
                    if let Some(msg) = LowStockMessage::from_envelope(&env) {
                        // No subscribers is fine.
                        let _ = realtime_tx.send(msg);
                    }
                }
            });
        if let Err(e) = spawned {
            tracing::warn!("low-stock forwarder not started: {e}");
        }
    }

    let engine = StockEngine::new(store.clone(), bus, registry, config.engine);

    AppServices {
        engine,
        ledger: MovementLedger::new(store.clone()),
        low_stock: LowStockMonitor::new(store),
        baskets: BasketSessions::new(Duration::from_secs(config.baskets.idle_timeout_secs)),
        realtime_tx,
    }
}

impl AppServices {
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn catalog(&self) -> MaterialCatalog<Store, StockBus> {
        self.engine.catalog()
    }

    pub fn registry(&self) -> &MovementTypeRegistry {
        self.engine.registry()
    }

    pub fn ledger(&self) -> &MovementLedger<Store> {
        &self.ledger
    }

    pub fn low_stock(&self) -> &LowStockMonitor<Store> {
        &self.low_stock
    }

    pub fn baskets(&self) -> &BasketSessions {
        &self.baskets
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<LowStockMessage> {
        &self.realtime_tx
    }
}

/// Build an SSE stream of low-stock flips (used by `/low-stock/stream`).
pub fn low_stock_sse_stream(
    services: Arc<AppServices>,
    scope: Option<WarehouseScope>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if scope.is_none_or(|s| s == m.change.scope) => {
            let data = serde_json::to_string(&m).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.event).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
