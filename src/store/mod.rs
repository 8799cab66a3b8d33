//! Document database with live queries.
//!
//! Documents live in named collections (`chats`, `chats/{id}/messages`, ...)
//! and are plain JSON objects. Persistence is pluggable through [`Backend`];
//! everything above it (query evaluation, server timestamps, subscriptions)
//! is shared by [`DocumentStore`].

mod memory;
mod query;
mod sqlite;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::error::{Error, Result};

pub use memory::MemoryBackend;
pub use query::{compare_values, Cursor, Direction, Filter, OrderBy, Query};
pub use sqlite::SqliteBackend;

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Look up a field; `a.b` descends into nested objects.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// Field values to write, plus fields the store fills with its own clock.
#[derive(Debug, Clone, Default)]
pub struct Write {
    fields: Fields,
    server_timestamps: Vec<String>,
}

impl Write {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from any serializable struct that encodes to a JSON object.
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(fields) => Ok(Write {
                fields,
                server_timestamps: Vec::new(),
            }),
            other => Err(Error::Codec(serde::de::Error::custom(format!(
                "expected a JSON object, got {other}"
            )))),
        }
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn server_timestamp(mut self, field: &str) -> Self {
        self.server_timestamps.push(field.to_string());
        self
    }

    fn resolve(self, now: i64) -> Fields {
        let mut fields = self.fields;
        for field in self.server_timestamps {
            fields.insert(field, Value::from(now));
        }
        fields
    }
}

/// Full result set of a live query at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub docs: Vec<Document>,
}

/// Persistence layer under a [`DocumentStore`].
pub trait Backend: Send {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;
    fn put(&mut self, collection: &str, doc: &Document) -> Result<()>;
    fn scan(&self, collection: &str) -> Result<Vec<Document>>;
}

struct Listener {
    query: Query,
    tx: mpsc::UnboundedSender<Snapshot>,
}

struct Inner {
    backend: Box<dyn Backend>,
    listeners: HashMap<u64, Listener>,
    next_listener: u64,
    last_timestamp: i64,
}

impl Inner {
    /// Microseconds since the epoch, strictly increasing per store.
    fn tick(&mut self) -> i64 {
        let now = Utc::now().timestamp_micros();
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    fn run(&self, query: &Query) -> Result<Vec<Document>> {
        Ok(query.run(self.backend.scan(&query.collection)?))
    }

    fn notify(&mut self, collection: &str) {
        let mut closed = Vec::new();
        for (id, listener) in &self.listeners {
            if listener.query.collection != collection {
                continue;
            }
            if listener.tx.is_closed() {
                closed.push(*id);
                continue;
            }
            match self.run(&listener.query) {
                Ok(docs) => {
                    if listener.tx.send(Snapshot { docs }).is_err() {
                        closed.push(*id);
                    }
                }
                Err(e) => log::warn!("Live query {} on {} failed: {}", id, collection, e),
            }
        }
        for id in closed {
            log::debug!("Pruning dropped subscription {}", id);
            self.listeners.remove(&id);
        }
    }
}

/// Cloneable handle to a shared document store.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<Mutex<Inner>>,
}

impl DocumentStore {
    pub fn new(backend: impl Backend + 'static) -> Self {
        DocumentStore {
            inner: Arc::new(Mutex::new(Inner {
                backend: Box::new(backend),
                listeners: HashMap::new(),
                next_listener: 0,
                last_timestamp: 0,
            })),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Open a SQLite-backed store; `:memory:` gives a throwaway database.
    pub fn open(database_url: &str) -> Result<Self> {
        Ok(Self::new(SqliteBackend::open(database_url)?))
    }

    /// Insert a document under a fresh random id.
    pub async fn add(&self, collection: &str, write: Write) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string();
        let mut inner = self.inner.lock().await;
        let now = inner.tick();
        let doc = Document {
            id: id.clone(),
            fields: write.resolve(now),
        };
        inner.backend.put(collection, &doc)?;
        inner.notify(collection);
        Ok(id)
    }

    /// Create or fully replace the document at `id`.
    pub async fn set(&self, collection: &str, id: &str, write: Write) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let now = inner.tick();
        let doc = Document {
            id: id.to_string(),
            fields: write.resolve(now),
        };
        inner.backend.put(collection, &doc)?;
        inner.notify(collection);
        Ok(())
    }

    /// Create the document only if `id` is free. Returns whether it was created.
    pub async fn create_if_absent(&self, collection: &str, id: &str, write: Write) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.backend.get(collection, id)?.is_some() {
            return Ok(false);
        }
        let now = inner.tick();
        let doc = Document {
            id: id.to_string(),
            fields: write.resolve(now),
        };
        inner.backend.put(collection, &doc)?;
        inner.notify(collection);
        Ok(true)
    }

    /// Merge fields into an existing document. Last write wins per field.
    pub async fn update(&self, collection: &str, id: &str, write: Write) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let mut doc = inner
            .backend
            .get(collection, id)?
            .ok_or_else(|| Error::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let now = inner.tick();
        doc.fields.extend(write.resolve(now));
        inner.backend.put(collection, &doc)?;
        inner.notify(collection);
        Ok(())
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.inner.lock().await.backend.get(collection, id)
    }

    pub async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        self.inner.lock().await.run(query)
    }

    /// Register a live query. The current result set is delivered right away,
    /// then again after every write to the query's collection.
    pub async fn subscribe(&self, query: Query) -> Result<Subscription> {
        let mut inner = self.inner.lock().await;
        let docs = inner.run(&query)?;
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive in this scope, so the first send cannot fail.
        let _ = tx.send(Snapshot { docs });

        let id = inner.next_listener;
        inner.next_listener += 1;
        log::debug!("Subscription {} on {}", id, query.collection);
        inner.listeners.insert(id, Listener { query, tx });

        Ok(Subscription {
            id,
            store: self.clone(),
            rx,
        })
    }

    pub async fn listener_count(&self) -> usize {
        self.inner.lock().await.listeners.len()
    }

    async fn unlisten(&self, id: u64) {
        if self.inner.lock().await.listeners.remove(&id).is_some() {
            log::debug!("Subscription {} cancelled", id);
        }
    }
}

/// Handle to a live query. Cancel it when the view goes away; a handle that
/// is merely dropped gets pruned on the next write to its collection.
pub struct Subscription {
    id: u64,
    store: DocumentStore,
    rx: mpsc::UnboundedReceiver<Snapshot>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next snapshot. `None` once the listener is gone.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Latest already-delivered snapshot, skipping stale ones.
    pub fn latest(&mut self) -> Option<Snapshot> {
        let mut latest = None;
        while let Ok(snapshot) = self.rx.try_recv() {
            latest = Some(snapshot);
        }
        latest
    }

    pub async fn cancel(self) {
        self.store.unlisten(self.id).await;
    }
}
