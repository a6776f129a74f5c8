use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::AppError;
use crate::store::Collection;

type Filter = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

struct SubEntry {
    collection: Collection,
    filter: Filter,
    tx: watch::Sender<Vec<Value>>,
}

/// In-process document store with the change-feed contract the rest of the
/// system is written against: documents are JSON objects, updates merge
/// top-level fields last-write-wins, every write stamps `updated_at`, and
/// subscribers receive the full current result set of their query on every
/// change (coalesced under rapid writes, so consumers must tolerate
/// re-delivery of an unchanged set).
pub struct MemoryStore {
    users: DashMap<Uuid, Value>,
    deliveries: DashMap<Uuid, Value>,
    messages: DashMap<Uuid, Value>,
    settings: DashMap<Uuid, Value>,
    subs: Arc<DashMap<Uuid, SubEntry>>,
    online: AtomicBool,
    writes_denied: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            deliveries: DashMap::new(),
            messages: DashMap::new(),
            settings: DashMap::new(),
            subs: Arc::new(DashMap::new()),
            online: AtomicBool::new(true),
            writes_denied: AtomicBool::new(false),
        }
    }

    fn shard(&self, collection: Collection) -> &DashMap<Uuid, Value> {
        match collection {
            Collection::Users => &self.users,
            Collection::Deliveries => &self.deliveries,
            Collection::Messages => &self.messages,
            Collection::Settings => &self.settings,
        }
    }

    /// Simulates losing the backing connection. Reads keep serving the cached
    /// collections; writes fail with `StoreUnavailable` until reconnected.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Simulates a security-rules rejection: all writes fail with
    /// `WriteDenied`, which callers must surface differently from an outage.
    pub fn set_writes_denied(&self, denied: bool) {
        self.writes_denied.store(denied, Ordering::SeqCst);
    }

    fn ensure_writable(&self, op: &str) -> Result<(), AppError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable(format!(
                "{op}: backing store is offline"
            )));
        }
        if self.writes_denied.load(Ordering::SeqCst) {
            return Err(AppError::WriteDenied(format!(
                "{op}: rejected by store rules"
            )));
        }
        Ok(())
    }

    /// Creates a document with a store-generated id. Any caller-supplied `id`
    /// field is replaced by the generated one.
    pub fn create(&self, collection: Collection, mut fields: Value) -> Result<Uuid, AppError> {
        self.ensure_writable("create")?;

        let id = Uuid::new_v4();
        let doc = fields
            .as_object_mut()
            .ok_or_else(|| AppError::ValidationFailed("document must be a JSON object".into()))?;
        doc.insert("id".to_string(), Value::String(id.to_string()));
        doc.insert("updated_at".to_string(), json!(Utc::now()));

        self.shard(collection).insert(id, fields);
        self.notify(collection);
        Ok(id)
    }

    /// Merges `partial` into the document, last-write-wins per top-level
    /// field. An explicit `null` overwrites the field to null.
    pub fn update(&self, collection: Collection, id: Uuid, partial: Value) -> Result<(), AppError> {
        self.ensure_writable("update")?;

        let patch = partial
            .as_object()
            .ok_or_else(|| AppError::ValidationFailed("partial update must be a JSON object".into()))?;

        {
            let mut entry = self.shard(collection).get_mut(&id).ok_or_else(|| {
                AppError::NotFound(format!("{} {id} not found", collection.name()))
            })?;
            let doc = entry.value_mut();
            if let Some(target) = doc.as_object_mut() {
                for (key, value) in patch {
                    target.insert(key.clone(), value.clone());
                }
                target.insert("updated_at".to_string(), json!(Utc::now()));
            }
        }

        self.notify(collection);
        Ok(())
    }

    /// One-shot full overwrite by key; used for the settings singleton.
    pub fn set(&self, collection: Collection, id: Uuid, mut fields: Value) -> Result<(), AppError> {
        self.ensure_writable("set")?;

        let doc = fields
            .as_object_mut()
            .ok_or_else(|| AppError::ValidationFailed("document must be a JSON object".into()))?;
        doc.insert("id".to_string(), Value::String(id.to_string()));
        doc.insert("updated_at".to_string(), json!(Utc::now()));

        self.shard(collection).insert(id, fields);
        self.notify(collection);
        Ok(())
    }

    /// Conditional merge: applies `partial` only while `doc[field]` still
    /// equals `expected`, otherwise fails with `Conflict`. This is the guard
    /// for read-modify-write flows such as settlement.
    pub fn update_if(
        &self,
        collection: Collection,
        id: Uuid,
        field: &str,
        expected: &Value,
        partial: Value,
    ) -> Result<(), AppError> {
        self.ensure_writable("update_if")?;

        let patch = partial
            .as_object()
            .ok_or_else(|| AppError::ValidationFailed("partial update must be a JSON object".into()))?;

        {
            let mut entry = self.shard(collection).get_mut(&id).ok_or_else(|| {
                AppError::NotFound(format!("{} {id} not found", collection.name()))
            })?;
            let doc = entry.value_mut();

            if doc.get(field) != Some(expected) {
                return Err(AppError::Conflict(format!(
                    "precondition on `{field}` no longer holds"
                )));
            }

            if let Some(target) = doc.as_object_mut() {
                for (key, value) in patch {
                    target.insert(key.clone(), value.clone());
                }
                target.insert("updated_at".to_string(), json!(Utc::now()));
            }
        }

        self.notify(collection);
        Ok(())
    }

    /// Atomic numeric adjustment under the document's entry lock. A missing
    /// field counts as zero. Returns the new value.
    pub fn increment(
        &self,
        collection: Collection,
        id: Uuid,
        field: &str,
        delta: f64,
    ) -> Result<f64, AppError> {
        self.ensure_writable("increment")?;

        let new_value;
        {
            let mut entry = self.shard(collection).get_mut(&id).ok_or_else(|| {
                AppError::NotFound(format!("{} {id} not found", collection.name()))
            })?;
            let doc = entry.value_mut();
            let current = doc.get(field).and_then(Value::as_f64).unwrap_or(0.0);
            new_value = current + delta;

            if let Some(target) = doc.as_object_mut() {
                target.insert(field.to_string(), json!(new_value));
                target.insert("updated_at".to_string(), json!(Utc::now()));
            }
        }

        self.notify(collection);
        Ok(new_value)
    }

    pub fn get(&self, collection: Collection, id: Uuid) -> Option<Value> {
        self.shard(collection).get(&id).map(|e| e.value().clone())
    }

    pub fn get_as<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<T, AppError> {
        let value = self
            .get(collection, id)
            .ok_or_else(|| AppError::NotFound(format!("{} {id} not found", collection.name())))?;
        serde_json::from_value(value).map_err(|err| {
            AppError::Internal(format!("malformed {} document: {err}", collection.name()))
        })
    }

    /// Full collection contents, ordered by id for deterministic consumers.
    pub fn all(&self, collection: Collection) -> Vec<Value> {
        let mut docs: Vec<(Uuid, Value)> = self
            .shard(collection)
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        docs.sort_by_key(|(id, _)| *id);
        docs.into_iter().map(|(_, doc)| doc).collect()
    }

    pub fn all_as<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, AppError> {
        self.all(collection)
            .into_iter()
            .map(|doc| {
                serde_json::from_value(doc).map_err(|err| {
                    AppError::Internal(format!("malformed {} document: {err}", collection.name()))
                })
            })
            .collect()
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.shard(collection).len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subs.len()
    }

    /// Registers a push subscription for the documents matching `filter`.
    /// The returned handle carries the current result set immediately and a
    /// new full set on every subsequent change.
    pub fn subscribe(
        &self,
        collection: Collection,
        filter: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Subscription {
        let filter: Filter = Arc::new(filter);
        let initial = self.filtered_set(collection, &filter);
        let (tx, rx) = watch::channel(initial);

        let id = Uuid::new_v4();
        self.subs.insert(id, SubEntry { collection, filter, tx });

        Subscription {
            guard: SubscriptionGuard {
                id,
                subs: self.subs.clone(),
            },
            rx,
        }
    }

    pub fn subscribe_all(&self, collection: Collection) -> Subscription {
        self.subscribe(collection, |_| true)
    }

    fn filtered_set(&self, collection: Collection, filter: &Filter) -> Vec<Value> {
        let mut docs: Vec<(Uuid, Value)> = self
            .shard(collection)
            .iter()
            .filter(|e| filter(e.value()))
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        docs.sort_by_key(|(id, _)| *id);
        docs.into_iter().map(|(_, doc)| doc).collect()
    }

    fn notify(&self, collection: Collection) {
        for entry in self.subs.iter() {
            let sub = entry.value();
            if sub.collection != collection {
                continue;
            }
            let set = self.filtered_set(collection, &sub.filter);
            let _ = sub.tx.send_replace(set);
        }
    }
}

/// Removes the subscription entry when dropped, so teardown releases the
/// store listener before any further change can reach a dead consumer.
pub struct SubscriptionGuard {
    id: Uuid,
    subs: Arc<DashMap<Uuid, SubEntry>>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.subs.remove(&self.id);
    }
}

pub struct Subscription {
    guard: SubscriptionGuard,
    rx: watch::Receiver<Vec<Value>>,
}

impl Subscription {
    /// The most recently delivered result set, without consuming the change
    /// notification.
    pub fn current(&self) -> Vec<Value> {
        self.rx.borrow().clone()
    }

    /// The latest result set, marking it seen so `changed` waits for the
    /// next write.
    pub fn latest(&mut self) -> Vec<Value> {
        self.rx.borrow_and_update().clone()
    }

    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }

    /// Splits the handle for stream-style consumption; the guard keeps the
    /// registration alive and releases it on drop.
    pub fn into_parts(self) -> (SubscriptionGuard, watch::Receiver<Vec<Value>>) {
        (self.guard, self.rx)
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}
