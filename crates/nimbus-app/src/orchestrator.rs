//! Weather orchestrator: owns [`ApplicationState`] and runs every intent.
//!
//! Intents return immediately. Network and storage work runs on spawned
//! tasks, and each completion re-checks relevance against the live state
//! before it writes:
//!
//! - current-weather results apply only for the newest fetch
//! - forecast results apply only while their place is still on screen
//! - favorite membership checks apply only if no toggle or place change
//!   happened since they were issued
//! - search results apply only for the newest query

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nimbus_core::WeatherConfig;
use nimbus_storage::{FavoritePlace, FavoritesStore, LastPlaceStore};
use nimbus_weather::{
    Coordinates, LocationProvider, PlaceSearchResult, PlaceWeather, WeatherSource,
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::favorites::{self, FavoriteCommand};
use crate::search::SearchPipeline;
use crate::state::ApplicationState;

/// Error shown when a location-based fetch cannot get a position.
pub const LOCATION_UNAVAILABLE: &str = "could not obtain current location";

/// Collaborators injected at construction.
#[derive(Clone)]
pub struct Dependencies {
    pub weather: Arc<dyn WeatherSource>,
    pub location: Arc<dyn LocationProvider>,
    pub favorites: Arc<dyn FavoritesStore>,
    pub last_place: Arc<dyn LastPlaceStore>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Days requested from the forecast endpoint.
    pub forecast_days: u8,
    /// Quiet period before a search query hits the network.
    pub search_debounce: Duration,
    /// Period of the background GPS refresh. `None` refreshes once at startup.
    pub gps_refresh_interval: Option<Duration>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            forecast_days: 7,
            search_debounce: Duration::from_millis(500),
            gps_refresh_interval: None,
        }
    }
}

impl From<&WeatherConfig> for OrchestratorSettings {
    fn from(config: &WeatherConfig) -> Self {
        Self {
            forecast_days: config.forecast_days,
            search_debounce: Duration::from_millis(config.search_debounce_ms),
            gps_refresh_interval: (config.gps_refresh_minutes > 0)
                .then(|| Duration::from_secs(u64::from(config.gps_refresh_minutes) * 60)),
        }
    }
}

/// Handle to a running orchestrator. Clones share the same state.
#[derive(Clone)]
pub struct WeatherOrchestrator {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    pub(crate) state: watch::Sender<ApplicationState>,
    pub(crate) deps: Dependencies,
    pub(crate) settings: OrchestratorSettings,
    /// Bumped by every current-weather fetch; the newest one owns `is_loading`.
    fetch_generation: AtomicU64,
    /// Bumped by every toggle and place change.
    pub(crate) favorite_epoch: AtomicU64,
    pub(crate) search: SearchPipeline,
    favorite_tx: mpsc::UnboundedSender<FavoriteCommand>,
    pub(crate) shutdown: CancellationToken,
}

impl WeatherOrchestrator {
    /// Create the orchestrator and run the startup sequence.
    ///
    /// Location status is known and the favorites listing is attached by
    /// the time this returns. The initial fetch and the background GPS
    /// refresh keep running on the current runtime.
    pub async fn start(deps: Dependencies, settings: OrchestratorSettings) -> Self {
        let (state, _) = watch::channel(ApplicationState::default());
        let (favorite_tx, favorite_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            state,
            deps,
            settings,
            fetch_generation: AtomicU64::new(0),
            favorite_epoch: AtomicU64::new(0),
            search: SearchPipeline::new(),
            favorite_tx,
            shutdown: CancellationToken::new(),
        });
        tokio::spawn(favorites::run_worker(shared.clone(), favorite_rx));

        let orchestrator = Self { shared };
        orchestrator.bootstrap().await;
        orchestrator
    }

    async fn bootstrap(&self) {
        let shared = &self.shared;

        let gps_available = shared.refresh_location_status().await;
        tracing::info!("Starting orchestrator (location available: {})", gps_available);

        // A periodic refresh also picks up location granted after startup.
        if gps_available || shared.settings.gps_refresh_interval.is_some() {
            tokio::spawn(shared.clone().run_gps_refresh());
        }

        match shared.deps.last_place.get().await {
            Ok(Some(name)) => {
                tracing::info!("Restoring last viewed place: {}", name);
                self.fetch_by_name(name);
            }
            Ok(None) if gps_available => self.fetch_by_current_location(),
            Ok(None) => tracing::debug!("No last place and no location; starting empty"),
            Err(e) => {
                tracing::warn!("Failed to read last place: {}", e);
                if gps_available {
                    self.fetch_by_current_location();
                }
            }
        }

        let mut listing = shared.deps.favorites.observe_all();
        let initial = listing.borrow_and_update().clone();
        shared.state.send_modify(|s| s.favorites = initial);
        tokio::spawn(shared.clone().forward_favorites(listing));
    }

    /// Receiver for state snapshots; starts at the current value.
    ///
    /// Rapid successive writes may be observed as one update. Every change
    /// marks the receiver, so the latest snapshot is never missed.
    pub fn observe_state(&self) -> watch::Receiver<ApplicationState> {
        self.shared.state.subscribe()
    }

    pub fn snapshot(&self) -> ApplicationState {
        self.shared.state.borrow().clone()
    }

    /// Load a place by name and make it current.
    pub fn fetch_by_name(&self, name: impl Into<String>) {
        let name = name.into();
        let generation = self.shared.begin_fetch();
        tokio::spawn(self.shared.clone().load_by_name(name, generation));
    }

    /// Load the place at the device position and make it current.
    pub fn fetch_by_current_location(&self) {
        let generation = self.shared.begin_fetch();
        tokio::spawn(self.shared.clone().load_by_location(generation));
    }

    /// One-off refresh of `gps_place`, leaving `current_place` untouched.
    pub fn refresh_gps(&self) {
        let shared = self.shared.clone();
        tokio::spawn(async move { shared.refresh_gps_place().await });
    }

    /// Flip favorite membership of the current place.
    ///
    /// The flag flips immediately and the store write is queued behind any
    /// earlier ones. No-op without a current place.
    pub fn toggle_favorite(&self) {
        let shared = &self.shared;
        shared.state.send_if_modified(|s| {
            let Some(place) = s.current_place.as_ref() else {
                tracing::debug!("Toggle ignored: no current place");
                return false;
            };

            let epoch = shared.favorite_epoch.fetch_add(1, Ordering::SeqCst) + 1;
            let command = if s.is_current_place_favorite {
                FavoriteCommand::Remove {
                    name: place.name.clone(),
                    epoch,
                }
            } else {
                FavoriteCommand::Add {
                    favorite: favorite_from(place),
                    epoch,
                }
            };

            if shared.favorite_tx.send(command).is_err() {
                tracing::warn!("Favorites worker is gone; toggle dropped");
                return false;
            }
            s.is_current_place_favorite = !s.is_current_place_favorite;
            true
        });
    }

    /// Debounced place search. A blank query clears results without a request.
    pub fn search_locations(&self, query: impl Into<String>) {
        self.shared.search_locations(query.into());
    }

    /// Load the picked result and reset the search.
    pub fn select_search_result(&self, result: &PlaceSearchResult) {
        self.fetch_by_name(result.name.clone());
        self.clear_search();
    }

    /// Reset query and results. A search already running still delivers.
    pub fn clear_search(&self) {
        self.shared.state.send_modify(|s| {
            s.search_query.clear();
            s.search_results.clear();
        });
    }

    /// Stop background work. Queued favorite writes are flushed; toggles
    /// issued afterwards are ignored.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down orchestrator");
        self.shared.shutdown.cancel();
        self.shared.search.cancel_active();
    }
}

fn favorite_from(place: &PlaceWeather) -> FavoritePlace {
    FavoritePlace::new(
        place.name.clone(),
        place.region.clone(),
        place.country.clone(),
        place.coordinates.latitude,
        place.coordinates.longitude,
    )
}

impl Shared {
    /// Query the location service and record its flags. Returns whether a
    /// location-based fetch can run.
    async fn refresh_location_status(&self) -> bool {
        let granted = self.deps.location.has_permission().await;
        let enabled = self.deps.location.is_enabled().await;

        self.state.send_if_modified(|s| {
            let changed =
                s.is_location_permission_granted != granted || s.is_location_enabled != enabled;
            s.is_location_permission_granted = granted;
            s.is_location_enabled = enabled;
            changed
        });
        granted && enabled
    }

    async fn locate(&self) -> Option<Coordinates> {
        if !self.refresh_location_status().await {
            return None;
        }
        match self.deps.location.current_position().await {
            Ok(position) => position,
            Err(e) => {
                tracing::debug!("Location lookup failed: {}", e);
                None
            }
        }
    }

    fn begin_fetch(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|s| {
            generation = self.fetch_generation.fetch_add(1, Ordering::SeqCst) + 1;
            s.is_loading = true;
            s.error_message = None;
        });
        generation
    }

    fn is_latest_fetch(&self, generation: u64) -> bool {
        self.fetch_generation.load(Ordering::SeqCst) == generation
    }

    fn fail_fetch(&self, generation: u64, message: String) {
        let applied = self.state.send_if_modified(|s| {
            if !self.is_latest_fetch(generation) {
                return false;
            }
            s.is_loading = false;
            s.error_message = Some(message);
            true
        });
        if !applied {
            tracing::debug!("Dropping failure of superseded fetch {}", generation);
        }
    }

    async fn load_by_name(self: Arc<Self>, name: String, generation: u64) {
        match self.deps.weather.current_weather(&name).await {
            Ok(place) => self.present(place, generation, false, name).await,
            Err(e) => {
                tracing::warn!("Weather lookup for {} failed: {}", name, e);
                self.fail_fetch(generation, format!("Failed to load weather: {}", e));
            }
        }
    }

    async fn load_by_location(self: Arc<Self>, generation: u64) {
        let Some(position) = self.locate().await else {
            self.fail_fetch(generation, LOCATION_UNAVAILABLE.to_string());
            return;
        };

        match self.deps.weather.current_weather(&position.to_query()).await {
            Ok(place) => {
                let name = place.name.clone();
                self.present(place, generation, true, name).await;
            }
            Err(e) => {
                tracing::warn!("Weather lookup at {} failed: {}", position.to_query(), e);
                self.fail_fetch(generation, format!("Failed to load weather: {}", e));
            }
        }
    }

    /// Make `place` current, then persist it, check its favorite status and
    /// load its forecast.
    async fn present(
        &self,
        place: PlaceWeather,
        generation: u64,
        from_gps: bool,
        persist_as: String,
    ) {
        let mut favorite_epoch = None;
        self.state.send_if_modified(|s| {
            if !self.is_latest_fetch(generation) {
                return false;
            }
            if !s.is_showing(&place.name) {
                s.forecast = None;
                s.is_current_place_favorite = false;
            }
            if from_gps {
                s.gps_place = Some(place.clone());
            }
            s.current_place = Some(place.clone());
            s.is_current_from_gps = from_gps;
            s.error_message = None;
            favorite_epoch = Some(self.favorite_epoch.fetch_add(1, Ordering::SeqCst) + 1);
            true
        });

        let Some(epoch) = favorite_epoch else {
            tracing::debug!("Dropping superseded weather for {}", place.name);
            if from_gps {
                self.state.send_modify(|s| s.gps_place = Some(place));
            }
            return;
        };
        tracing::info!("Showing weather for {}", place.name);

        if let Err(e) = self.deps.last_place.set(&persist_as).await {
            tracing::warn!("Failed to save last place: {}", e);
        }

        let check = FavoriteCommand::Check {
            name: place.name.clone(),
            epoch,
        };
        if self.favorite_tx.send(check).is_err() {
            tracing::warn!("Favorites worker is gone; skipping membership check");
        }

        self.load_forecast(place.name, generation).await;
    }

    async fn load_forecast(&self, name: String, generation: u64) {
        let result = self
            .deps
            .weather
            .forecast(&name, self.settings.forecast_days)
            .await;

        let applied = self.state.send_if_modified(|s| {
            if !s.is_showing(&name) {
                return false;
            }
            match result {
                Ok(report) => s.forecast = Some(report.forecast),
                Err(e) => {
                    tracing::warn!("Forecast for {} failed: {}", name, e);
                    s.error_message = Some(format!("Failed to load forecast: {}", e));
                }
            }
            if self.is_latest_fetch(generation) {
                s.is_loading = false;
            }
            true
        });
        if !applied {
            tracing::debug!("Dropping forecast for {}: no longer current", name);
        }
    }

    /// Fetch weather at the device position into `gps_place`. Failures are
    /// logged and otherwise ignored.
    async fn refresh_gps_place(&self) {
        let Some(position) = self.locate().await else {
            tracing::debug!("GPS refresh skipped: no position");
            return;
        };

        match self.deps.weather.current_weather(&position.to_query()).await {
            Ok(place) => {
                tracing::debug!("GPS place is now {}", place.name);
                self.state.send_modify(|s| s.gps_place = Some(place));
            }
            Err(e) => tracing::debug!("GPS refresh failed: {}", e),
        }
    }

    async fn run_gps_refresh(self: Arc<Self>) {
        loop {
            self.refresh_gps_place().await;

            let Some(interval) = self.settings.gps_refresh_interval else {
                return;
            };
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    async fn forward_favorites(self: Arc<Self>, mut listing: watch::Receiver<Vec<FavoritePlace>>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                changed = listing.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Favorites listing closed");
                        return;
                    }
                }
            }
            let favorites = listing.borrow_and_update().clone();
            self.state.send_modify(|s| s.favorites = favorites);
        }
    }

    /// Write a favorite flag if nothing has touched favorites or the
    /// current place since `epoch`.
    pub(crate) fn apply_favorite_flag(&self, name: &str, epoch: u64, is_favorite: bool) {
        self.state.send_if_modified(|s| {
            if self.favorite_epoch.load(Ordering::SeqCst) != epoch || !s.is_showing(name) {
                return false;
            }
            let changed = s.is_current_place_favorite != is_favorite;
            s.is_current_place_favorite = is_favorite;
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = WeatherConfig {
            forecast_days: 3,
            hourly_limit: 12,
            search_debounce_ms: 250,
            gps_refresh_minutes: 15,
        };
        let settings = OrchestratorSettings::from(&config);

        assert_eq!(settings.forecast_days, 3);
        assert_eq!(settings.search_debounce, Duration::from_millis(250));
        assert_eq!(settings.gps_refresh_interval, Some(Duration::from_secs(900)));
    }

    #[test]
    fn test_zero_refresh_minutes_disables_periodic_refresh() {
        let config = WeatherConfig {
            gps_refresh_minutes: 0,
            ..Default::default()
        };
        assert_eq!(OrchestratorSettings::from(&config).gps_refresh_interval, None);
    }
}
