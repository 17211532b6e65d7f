use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::cache::ParkingLotCache;
use crate::config::Config;
use crate::connectivity::{Banner, ConnectionState, ConnectivityMonitor};
use crate::database;
use crate::error::Result;
use crate::firestore::{FirestoreClient, RemoteStore};
use crate::local_storage::{credentials_string, LocalStorage, SqliteLocalStore};
use crate::location::{LocationProvider, LocationViewState, PermissionEvent, PermissionStatus, ViewState};
use crate::map::{self, MapMarker};
use crate::types::ParkingLot;

/// State behind the map screen: the listing cache, the location state
/// machine, connectivity and the user's stored preferences. One per screen.
pub struct MapSession {
    listing: ParkingLotCache,
    location: LocationViewState,
    connectivity: ConnectivityMonitor,
    storage: LocalStorage,
    favorite: Mutex<Option<String>>,
}

impl MapSession {
    pub async fn new(
        storage: LocalStorage,
        remote: Arc<dyn RemoteStore>,
        provider: Arc<dyn LocationProvider>,
    ) -> Self {
        let favorite = storage.favorite_parking_lot().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to load favorite parking lot: {e}");
            None
        });
        Self {
            listing: ParkingLotCache::new(storage.clone(), remote),
            location: LocationViewState::new(provider),
            connectivity: ConnectivityMonitor::default(),
            storage,
            favorite: Mutex::new(favorite),
        }
    }

    /// Wire the on-device database and the document store from `config`.
    pub async fn open(config: &Config, provider: Arc<dyn LocationProvider>) -> Result<Self> {
        let pool = database::init_database(&config.storage).await?;
        let storage = LocalStorage::new(Arc::new(SqliteLocalStore::new(pool)));
        let remote = Arc::new(FirestoreClient::new(&config.firestore)?);
        Ok(Self::new(storage, remote, provider).await)
    }

    pub async fn fetch_listing(&self) -> Vec<ParkingLot> {
        self.listing.fetch_listing().await
    }

    /// Feed the platform's permission report into the state machine. Safe
    /// to call from the platform UI thread.
    ///
    /// Returns true when the screen should offer a shortcut to the system
    /// settings, i.e. the permission was denied for good.
    pub fn handle_permission(&self, status: PermissionStatus) -> bool {
        if let Some(event) = status.to_event() {
            self.location.handle(event);
        }
        status.needs_settings_shortcut()
    }

    pub fn handle(&self, event: PermissionEvent) {
        self.location.handle(event);
    }

    pub fn view_state(&self) -> ViewState {
        self.location.current()
    }

    pub fn subscribe_view_state(&self) -> watch::Receiver<ViewState> {
        self.location.subscribe()
    }

    /// Feed a platform connectivity report. Returns the banner to show, if
    /// the state changed.
    pub fn report_connectivity(&self, state: ConnectionState) -> Option<Banner> {
        self.connectivity.report(state)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connectivity.current()
    }

    pub fn subscribe_connectivity(&self) -> watch::Receiver<ConnectionState> {
        self.connectivity.subscribe()
    }

    pub async fn save_favorite_parking_lot(&self, parking_lot_id: &str) -> Result<()> {
        self.storage.save_favorite_parking_lot(parking_lot_id).await?;
        if let Ok(mut favorite) = self.favorite.lock() {
            *favorite = Some(parking_lot_id.to_string());
        }
        Ok(())
    }

    pub fn favorite_parking_lot(&self) -> Option<String> {
        self.favorite.lock().ok().and_then(|favorite| favorite.clone())
    }

    pub async fn save_user_credentials(&self, username: &str, token: &str) -> Result<()> {
        self.storage
            .save_user_credentials(&credentials_string(username, token))
            .await
    }

    pub async fn user_credentials(&self) -> Result<Option<String>> {
        self.storage.user_credentials().await
    }

    /// Markers for the listing currently held in memory.
    pub fn markers(&self) -> Vec<MapMarker> {
        let lots = self.listing.cached().unwrap_or_default();
        map::markers(&lots, self.favorite_parking_lot().as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_memory_database;
    use crate::error::Error;
    use crate::firestore::{Document, Value};
    use crate::types::Coordinate;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use tokio::sync::mpsc;

    struct StaticRemote(Vec<Document>);

    #[async_trait]
    impl RemoteStore for StaticRemote {
        async fn list_documents(&self, _collection: &str) -> Result<Vec<Document>> {
            Ok(self.0.clone())
        }

        async fn create_document(
            &self,
            _collection: &str,
            _fields: BTreeMap<String, Value>,
        ) -> Result<Document> {
            Err(Error::Remote {
                status: 405,
                body: "read only".to_string(),
            })
        }
    }

    struct NoFix;

    impl LocationProvider for NoFix {
        fn subscribe(&self) -> mpsc::Receiver<Coordinate> {
            let (_tx, rx) = mpsc::channel(1);
            rx
        }
    }

    fn doc(id: &str, name: &str) -> Document {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), Value::StringValue(name.to_string()));
        Document {
            name: format!("projects/p/databases/(default)/documents/parkingLots/{id}"),
            fields,
        }
    }

    async fn session_with(storage: LocalStorage) -> MapSession {
        let remote = Arc::new(StaticRemote(vec![doc("a", "Lot A"), doc("b", "Lot B")]));
        MapSession::new(storage, remote, Arc::new(NoFix)).await
    }

    async fn sqlite_storage() -> LocalStorage {
        let pool = init_memory_database().await.unwrap();
        LocalStorage::new(Arc::new(SqliteLocalStore::new(pool)))
    }

    #[tokio::test]
    async fn test_favorite_loaded_on_open() {
        let storage = sqlite_storage().await;
        storage.save_favorite_parking_lot("b").await.unwrap();

        let session = session_with(storage).await;
        assert_eq!(session.favorite_parking_lot().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_markers_follow_listing_and_favorite() {
        let session = session_with(sqlite_storage().await).await;
        assert!(session.markers().is_empty());

        session.fetch_listing().await;
        session.save_favorite_parking_lot("a").await.unwrap();

        let markers = session.markers();
        assert_eq!(markers.len(), 2);
        assert!(markers[0].favorite);
        assert!(!markers[1].favorite);
    }

    #[tokio::test]
    async fn test_listing_persisted_for_next_session() {
        let storage = sqlite_storage().await;
        let first = session_with(storage.clone()).await;
        let listing = first.fetch_listing().await;
        drop(first);

        let offline = MapSession::new(storage, Arc::new(StaticRemote(Vec::new())), Arc::new(NoFix)).await;
        assert_eq!(offline.fetch_listing().await, listing);
    }

    #[tokio::test]
    async fn test_credentials_joined_with_colon() {
        let session = session_with(sqlite_storage().await).await;
        session.save_user_credentials("ana", "tok").await.unwrap();
        assert_eq!(session.user_credentials().await.unwrap().as_deref(), Some("ana:tok"));
    }

    #[tokio::test]
    async fn test_permission_report_drives_view_state() {
        let session = session_with(sqlite_storage().await).await;
        assert_eq!(session.view_state(), ViewState::Loading);

        let rationale = PermissionStatus {
            all_granted: false,
            should_show_rationale: true,
        };
        assert!(!session.handle_permission(rationale));
        assert_eq!(session.view_state(), ViewState::Loading);

        let denied = PermissionStatus {
            all_granted: false,
            should_show_rationale: false,
        };
        assert!(session.handle_permission(denied));
        assert_eq!(session.view_state(), ViewState::RevokedPermissions);

        let granted = PermissionStatus {
            all_granted: true,
            should_show_rationale: false,
        };
        assert!(!session.handle_permission(granted));
        assert_eq!(session.view_state(), ViewState::Success(None));
        assert_eq!(session.view_state().map_center(), Some(Coordinate::default()));
    }

    #[tokio::test]
    async fn test_connectivity_banners() {
        let session = session_with(sqlite_storage().await).await;
        assert_eq!(session.connection_state(), ConnectionState::Available);

        assert_eq!(
            session.report_connectivity(ConnectionState::Unavailable),
            Some(Banner::NoInternet)
        );
        assert_eq!(session.connection_state(), ConnectionState::Unavailable);
        assert_eq!(
            session.report_connectivity(ConnectionState::Available),
            Some(Banner::Restored)
        );
    }

    #[test]
    fn test_permission_from_ui_thread() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let session = runtime.block_on(async { session_with(sqlite_storage().await).await });

        let granted = PermissionStatus {
            all_granted: true,
            should_show_rationale: false,
        };
        let shortcut = std::thread::scope(|scope| {
            scope
                .spawn(|| session.handle_permission(granted))
                .join()
                .unwrap()
        });
        assert!(!shortcut);
        assert_eq!(session.view_state(), ViewState::Success(None));
        runtime.block_on(async move { drop(session) });
    }
}
