//! In-memory transaction store
//!
//! Readers see committed data live and never block. Write transactions
//! hold an exclusive lock until they are committed or dropped.

use crate::error::{MirrorError, MirrorResult};
use crate::store::{StoreKey, Transaction, TransactionStore, WriteOutcome};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Default)]
struct State {
    serial: u64,
    values: HashMap<StoreKey, Value>,
}

struct Inner {
    state: RwLock<State>,
    writer: Arc<Mutex<()>>,
    serial_tx: watch::Sender<u64>,
}

impl Inner {
    fn read_value(&self, key: &StoreKey) -> Option<Value> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values
            .get(key)
            .cloned()
    }

    fn serial(&self) -> u64 {
        self.state.read().unwrap_or_else(|e| e.into_inner()).serial
    }
}

/// Transaction store keeping everything in process memory
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store at serial 0
    pub fn new() -> Self {
        let (serial_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::default()),
                writer: Arc::new(Mutex::new(())),
                serial_tx,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn begin(&self, write: bool) -> MirrorResult<Box<dyn Transaction>> {
        let writer = if write {
            Some(Arc::clone(&self.inner.writer).lock_owned().await)
        } else {
            None
        };
        let at_serial = self.inner.serial();
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            writer,
            at_serial,
            pending: HashMap::new(),
        }))
    }

    fn current_serial(&self) -> u64 {
        self.inner.serial()
    }

    async fn wait_for_serial(&self, serial: u64) -> MirrorResult<()> {
        let mut rx = self.inner.serial_tx.subscribe();
        rx.wait_for(|current| *current >= serial)
            .await
            .map_err(|_| MirrorError::Store("serial notifier closed".to_string()))?;
        Ok(())
    }
}

struct MemoryTransaction {
    inner: Arc<Inner>,
    writer: Option<OwnedMutexGuard<()>>,
    at_serial: u64,
    pending: HashMap<StoreKey, Value>,
}

impl Transaction for MemoryTransaction {
    fn is_write(&self) -> bool {
        self.writer.is_some()
    }

    fn at_serial(&self) -> u64 {
        self.at_serial
    }

    fn get(&self, key: &StoreKey) -> Option<Value> {
        match self.pending.get(key) {
            Some(value) => Some(value.clone()),
            None => self.inner.read_value(key),
        }
    }

    fn set(&mut self, key: &StoreKey, value: Value) -> WriteOutcome {
        if self.get(key).as_ref() == Some(&value) {
            return WriteOutcome::Unchanged;
        }
        if !self.is_write() {
            return WriteOutcome::ReadOnlyViolation;
        }
        self.pending.insert(key.clone(), value);
        WriteOutcome::Applied
    }

    fn commit(self: Box<Self>) -> MirrorResult<u64> {
        let this = *self;
        if this.pending.is_empty() {
            return Ok(this.inner.serial());
        }
        let serial = {
            let mut state = this.inner.state.write().unwrap_or_else(|e| e.into_inner());
            state.serial += 1;
            state.values.extend(this.pending);
            state.serial
        };
        debug!("committed transaction serial {}", serial);
        this.inner.serial_tx.send_replace(serial);
        drop(this.writer);
        Ok(serial)
    }
}
