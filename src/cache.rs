use std::sync::{Arc, Mutex};

use crate::firestore::{RemoteStore, PARKING_LOTS_COLLECTION};
use crate::local_storage::LocalStorage;
use crate::types::ParkingLot;

/// Key of the single fast-tier entry.
pub const LISTING_KEY: &str = "parkingLots";

/// In-memory tier. Holds at most one listing and never expires it.
pub struct MemoryCache {
    data: Mutex<Option<CacheEntry>>,
}

struct CacheEntry {
    key: &'static str,
    parking_lots: Vec<ParkingLot>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(None),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<ParkingLot>> {
        let guard = self.data.lock().ok()?;
        let entry = guard.as_ref()?;
        (entry.key == key).then(|| entry.parking_lots.clone())
    }

    pub fn set(&self, key: &'static str, parking_lots: Vec<ParkingLot>) {
        if let Ok(mut guard) = self.data.lock() {
            *guard = Some(CacheEntry { key, parking_lots });
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves the current parking lot listing through the memory tier, the
/// durable tier and finally the remote store, warming the faster tiers on
/// the way back.
pub struct ParkingLotCache {
    memory: MemoryCache,
    storage: LocalStorage,
    remote: Arc<dyn RemoteStore>,
}

impl ParkingLotCache {
    pub fn new(storage: LocalStorage, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            memory: MemoryCache::new(),
            storage,
            remote,
        }
    }

    /// The freshest listing available without repeating work.
    ///
    /// Never fails: a remote error yields an empty listing, which callers
    /// cannot tell apart from a collection that is really empty.
    pub async fn fetch_listing(&self) -> Vec<ParkingLot> {
        if let Some(cached) = self.memory.get(LISTING_KEY) {
            tracing::debug!(count = cached.len(), "Parking lots served from memory");
            return cached;
        }

        match self.storage.cached_parking_lots().await {
            Ok(stored) if !stored.is_empty() => {
                tracing::debug!(count = stored.len(), "Parking lots served from local storage");
                self.memory.set(LISTING_KEY, stored.clone());
                return stored;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to read cached parking lots: {e}"),
        }

        let fetched = self.fetch_remote().await;
        if fetched.is_empty() {
            return fetched;
        }

        self.memory.set(LISTING_KEY, fetched.clone());
        if let Err(e) = self.storage.save_parking_lots(&fetched).await {
            tracing::warn!("Failed to persist parking lots: {e}");
        }
        tracing::info!(count = fetched.len(), "Parking lots fetched from remote");
        fetched
    }

    /// Peek at the memory tier.
    pub fn cached(&self) -> Option<Vec<ParkingLot>> {
        self.memory.get(LISTING_KEY)
    }

    async fn fetch_remote(&self) -> Vec<ParkingLot> {
        match self.remote.list_documents(PARKING_LOTS_COLLECTION).await {
            Ok(documents) => documents.iter().filter_map(ParkingLot::from_document).collect(),
            Err(e) => {
                tracing::warn!("Failed to fetch parking lots: {e}");
                Vec::new()
            }
        }
    }
}
