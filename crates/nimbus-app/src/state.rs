//! Observable application state.

use nimbus_storage::FavoritePlace;
use nimbus_weather::{Forecast, PlaceSearchResult, PlaceWeather};
use serde::Serialize;

/// Everything the presentation layer renders.
///
/// Only the orchestrator writes this; every emitted value is a complete
/// snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplicationState {
    pub is_loading: bool,
    pub current_place: Option<PlaceWeather>,
    pub forecast: Option<Forecast>,
    pub error_message: Option<String>,

    pub is_location_permission_granted: bool,
    pub is_location_enabled: bool,
    /// Whether `current_place` came from a location-based fetch.
    pub is_current_from_gps: bool,
    /// Most recent weather at the device position. Independent of `current_place`.
    pub gps_place: Option<PlaceWeather>,

    pub favorites: Vec<FavoritePlace>,
    pub is_current_place_favorite: bool,

    pub search_query: String,
    pub search_results: Vec<PlaceSearchResult>,
    pub is_searching: bool,
}

/// Coarse screen state derived from [`ApplicationState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    Loading,
    Error,
    Content,
    Empty,
}

impl ApplicationState {
    /// True when `current_place` is the place called `name`.
    pub fn is_showing(&self, name: &str) -> bool {
        self.current_place
            .as_ref()
            .is_some_and(|place| place.name == name)
    }

    pub fn location_available(&self) -> bool {
        self.is_location_permission_granted && self.is_location_enabled
    }

    /// Loading wins over an error, and an error wins over stale content.
    pub fn view(&self) -> ViewStatus {
        if self.is_loading {
            ViewStatus::Loading
        } else if self.error_message.is_some() {
            ViewStatus::Error
        } else if self.current_place.is_some() {
            ViewStatus::Content
        } else {
            ViewStatus::Empty
        }
    }
}
