//! Single-key storage primitive the entry store is written against.
//!
//! Implementations must make each `read`/`write` atomic for its key. Nothing
//! here coordinates a read with a later write.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{anyhow, bail, Result};

use crate::db::Database;

pub trait KeyValueStorage: Send + Sync {
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    fn write(&self, key: &str, value: String) -> impl Future<Output = Result<()>> + Send;
}

impl KeyValueStorage for Database {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        self.get_item(key).await
    }

    async fn write(&self, key: &str, value: String) -> Result<()> {
        self.set_item(key, value).await
    }
}

/// Process-local storage. Backs `--ephemeral` runs and the test suite.
///
/// Reads and writes can be made to fail on demand to exercise error paths.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw value as stored, bypassing the failure switches.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .ok()
            .and_then(|items| items.get(key).cloned())
    }

    /// Places a raw value, bypassing the failure switches. Used to seed
    /// legacy or corrupt documents.
    pub fn put_raw(&self, key: &str, value: impl Into<String>) {
        if let Ok(mut items) = self.items.lock() {
            items.insert(key.to_string(), value.into());
        }
    }
}

impl KeyValueStorage for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("simulated read failure for key {key}");
        }
        let items = self
            .items
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        Ok(items.get(key).cloned())
    }

    async fn write(&self, key: &str, value: String) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("simulated write failure for key {key}");
        }
        let mut items = self
            .items
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        items.insert(key.to_string(), value);
        Ok(())
    }
}
