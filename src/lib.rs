pub mod cache;
pub mod config;
pub mod connectivity;
pub mod database;
pub mod error;
pub mod firestore;
pub mod local_storage;
pub mod location;
pub mod logging;
pub mod map;
pub mod registration;
pub mod session;
pub mod types;

use std::path::Path;
use std::sync::Arc;

pub use cache::ParkingLotCache;
pub use config::Config;
pub use connectivity::{Banner, ConnectionState, ConnectivityMonitor};
pub use error::{Error, Result};
pub use location::{LocationProvider, LocationViewState, PermissionEvent, PermissionStatus, ViewState};
pub use session::MapSession;
pub use types::{Coordinate, ParkingLot};

/// Entry point for the mobile shell: load configuration, install logging and
/// open the map session.
///
/// Without a config file the defaults apply, with `SENEPARKING_*` environment
/// overrides.
pub async fn start(
    config_path: Option<&Path>,
    provider: Arc<dyn LocationProvider>,
) -> Result<MapSession> {
    let config = match config_path {
        Some(path) => Config::from_path(path)?,
        None => Config::from_env()?,
    };
    logging::init_logging(&config.logging);

    match MapSession::open(&config, provider).await {
        Ok(session) => {
            tracing::info!(project = %config.firestore.project_id, "Session opened");
            Ok(session)
        }
        Err(e) => {
            tracing::error!("Session initialization failed: {e}");
            Err(e)
        }
    }
}
