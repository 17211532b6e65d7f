use serde::Serialize;

use crate::types::{Coordinate, ParkingLot};

/// A pin for one parking lot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub position: Coordinate,
    pub title: String,
    /// Drawn in the highlight colour.
    pub favorite: bool,
}

/// One marker per lot, in listing order. Lots without coordinates land on
/// (0, 0) rather than being skipped.
pub fn markers(parking_lots: &[ParkingLot], favorite_id: Option<&str>) -> Vec<MapMarker> {
    parking_lots
        .iter()
        .map(|lot| MapMarker {
            position: lot.position(),
            title: lot.display_name().to_string(),
            favorite: matches!((lot.id.as_deref(), favorite_id), (Some(id), Some(fav)) if id == fav),
        })
        .collect()
}
