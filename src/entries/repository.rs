use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, PoisonError, RwLock,
};

use anyhow::Result;
use uuid::Uuid;

use crate::{
    entries::store::EntryStore,
    models::{CoffeeEntry, NewCoffeeEntry},
    storage::KeyValueStorage,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Fresh entry id. UUIDv7 keeps ids time-ordered like the millisecond
/// timestamps older records carry, without colliding inside one millisecond.
pub fn new_entry_id() -> String {
    Uuid::now_v7().to_string()
}

/// In-memory mirror of the stored collection for the active session.
///
/// The mirror is an `Arc` snapshot swapped wholesale on every load, so a
/// caller holding an older snapshot keeps a consistent view.
pub struct EntryRepository<S> {
    store: EntryStore<S>,
    entries: RwLock<Arc<Vec<CoffeeEntry>>>,
    loading: AtomicBool,
}

impl<S: KeyValueStorage> EntryRepository<S> {
    pub fn new(store: EntryStore<S>) -> Self {
        Self {
            store,
            entries: RwLock::new(Arc::new(Vec::new())),
            loading: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &EntryStore<S> {
        &self.store
    }

    /// Current snapshot, newest first.
    pub fn entries(&self) -> Arc<Vec<CoffeeEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Reloads the mirror from storage, sorted by date descending.
    ///
    /// A failed storage read is logged and keeps the previous snapshot. An
    /// unparseable document loads as empty.
    pub async fn load(&self) {
        self.loading.store(true, Ordering::SeqCst);
        match self.store.try_get_entries().await {
            Ok(mut loaded) => {
                loaded.sort_by(|a, b| b.date.cmp(&a.date));
                log_info!("Loaded {} entries", loaded.len());
                *self.entries.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(loaded);
            }
            Err(err) => {
                log_error!("Error loading entries: {err:#}");
            }
        }
        self.loading.store(false, Ordering::SeqCst);
    }

    pub async fn create(&self, entry: NewCoffeeEntry) -> Result<CoffeeEntry> {
        let created = entry.with_id(new_entry_id());
        self.store.save_entry(created.clone()).await?;
        self.load().await;
        Ok(created)
    }

    pub async fn update(&self, entry: CoffeeEntry) -> Result<()> {
        self.store.update_entry(entry).await?;
        self.load().await;
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        self.store.delete_entry(id).await?;
        self.load().await;
        Ok(())
    }

    /// Reads straight from storage, ignoring the mirror.
    pub async fn get_one(&self, id: &str) -> Option<CoffeeEntry> {
        self.store.get_entry(id).await
    }
}
