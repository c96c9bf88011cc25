//! In-memory collaborators for orchestrator tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use nimbus_app::{ApplicationState, Dependencies, OrchestratorSettings, WeatherOrchestrator};
use nimbus_storage::{FavoritePlace, FavoritesStore, LastPlaceStore, StorageError, StorageResult};
use nimbus_weather::{
    Condition, Coordinates, DailyPoint, Forecast, ForecastReport, LocationError,
    LocationProvider, PlaceSearchResult, PlaceWeather, WeatherError, WeatherSource,
};
use parking_lot::Mutex;
use tokio::sync::watch;

/// Name the stub gives to any coordinate query.
pub const DEVICE_PLACE: &str = "Here";
pub const DEVICE_POSITION: Coordinates = Coordinates {
    latitude: 51.5,
    longitude: -0.12,
};

pub fn place(name: &str) -> PlaceWeather {
    PlaceWeather {
        name: name.to_string(),
        region: format!("{} Region", name),
        country: "Testland".to_string(),
        coordinates: Coordinates::new(10.0 + name.len() as f64, 20.0),
        local_time: "2024-06-01 12:00".to_string(),
        local_time_epoch: 1_717_243_200,
        timezone_id: "UTC".to_string(),
        temperature: 18.0,
        min_temperature: 12.0,
        max_temperature: 22.0,
        feels_like: 17.5,
        condition: Condition::new("Sunny", "//cdn.example.com/113.png", 1000),
        humidity: 40,
        wind_speed: 9.0,
        wind_direction: "NW".to_string(),
        uv_index: 5.0,
        air_quality: None,
        is_day: true,
    }
}

/// A forecast whose single day carries the place name as its condition text.
pub fn forecast_for(name: &str) -> Forecast {
    Forecast {
        hourly: Vec::new(),
        daily: vec![DailyPoint {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            min_temperature: 12.0,
            max_temperature: 22.0,
            condition: Condition::new(name, "", 1000),
            chance_of_rain: 10,
            sunrise: None,
            sunset: None,
            uv_index: 5.0,
        }],
    }
}

/// Name the forecast was built for.
pub fn forecast_name(forecast: &Forecast) -> Option<&str> {
    forecast.daily.first().map(|d| d.condition.text.as_str())
}

#[derive(Default)]
pub struct StubWeather {
    pub current_calls: AtomicUsize,
    pub forecast_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub searched: Mutex<Vec<String>>,
    current_delays: Mutex<HashMap<String, Duration>>,
    forecast_delays: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashSet<String>>,
    failing_forecasts: Mutex<HashSet<String>>,
    search_delay: Mutex<Duration>,
    search_fails: AtomicBool,
}

impl StubWeather {
    pub fn delay_current(&self, query: &str, delay: Duration) {
        self.current_delays.lock().insert(query.to_string(), delay);
    }

    pub fn delay_forecast(&self, name: &str, delay: Duration) {
        self.forecast_delays.lock().insert(name.to_string(), delay);
    }

    pub fn fail_current(&self, query: &str) {
        self.failing.lock().insert(query.to_string());
    }

    pub fn fail_forecast(&self, name: &str) {
        self.failing_forecasts.lock().insert(name.to_string());
    }

    pub fn delay_search(&self, delay: Duration) {
        *self.search_delay.lock() = delay;
    }

    pub fn fail_search(&self) {
        self.search_fails.store(true, Ordering::SeqCst);
    }

    fn is_coordinate_query(query: &str) -> bool {
        query
            .split_once(',')
            .is_some_and(|(lat, lon)| lat.parse::<f64>().is_ok() && lon.parse::<f64>().is_ok())
    }

    async fn pause(delay: Option<Duration>) {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl WeatherSource for StubWeather {
    async fn current_weather(&self, query: &str) -> Result<PlaceWeather, WeatherError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        let key = if Self::is_coordinate_query(query) {
            DEVICE_PLACE
        } else {
            query
        };
        let delay = self.current_delays.lock().get(key).copied();
        Self::pause(delay).await;

        if self.failing.lock().contains(key) {
            return Err(WeatherError::NotFound(key.to_string()));
        }
        Ok(place(key))
    }

    async fn forecast(&self, query: &str, _days: u8) -> Result<ForecastReport, WeatherError> {
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.forecast_delays.lock().get(query).copied();
        Self::pause(delay).await;

        if self.failing_forecasts.lock().contains(query) {
            return Err(WeatherError::Api {
                code: 9999,
                message: "Internal application error.".to_string(),
            });
        }
        Ok(ForecastReport {
            place: place(query),
            forecast: forecast_for(query),
        })
    }

    async fn search_places(&self, query: &str) -> Result<Vec<PlaceSearchResult>, WeatherError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.searched.lock().push(query.to_string());
        let delay = *self.search_delay.lock();
        tokio::time::sleep(delay).await;

        if self.search_fails.load(Ordering::SeqCst) {
            return Err(WeatherError::Api {
                code: 9999,
                message: "Internal application error.".to_string(),
            });
        }
        Ok(vec![PlaceSearchResult {
            name: format!("{} City", query),
            region: "Region".to_string(),
            country: "Testland".to_string(),
            latitude: 1.0,
            longitude: 2.0,
        }])
    }
}

pub struct StubLocation {
    permission: AtomicBool,
    pub enabled: bool,
    pub position: Option<Coordinates>,
}

impl StubLocation {
    pub fn available() -> Self {
        Self {
            permission: AtomicBool::new(true),
            enabled: true,
            position: Some(DEVICE_POSITION),
        }
    }

    /// No permission yet, but a fix is ready once it is granted.
    pub fn denied() -> Self {
        Self {
            permission: AtomicBool::new(false),
            enabled: true,
            position: Some(DEVICE_POSITION),
        }
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocationProvider for StubLocation {
    async fn has_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    async fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn current_position(&self) -> Result<Option<Coordinates>, LocationError> {
        if !self.permission.load(Ordering::SeqCst) {
            return Err(LocationError::PermissionDenied);
        }
        Ok(self.position)
    }
}

pub struct MemoryFavorites {
    items: Mutex<Vec<FavoritePlace>>,
    listing: watch::Sender<Vec<FavoritePlace>>,
    pub fail_writes: AtomicBool,
}

impl Default for MemoryFavorites {
    fn default() -> Self {
        let (listing, _) = watch::channel(Vec::new());
        Self {
            items: Mutex::new(Vec::new()),
            listing,
            fail_writes: AtomicBool::new(false),
        }
    }
}

impl MemoryFavorites {
    pub fn names(&self) -> Vec<String> {
        self.items.lock().iter().map(|f| f.name.clone()).collect()
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

#[async_trait]
impl FavoritesStore for MemoryFavorites {
    async fn upsert(&self, favorite: &FavoritePlace) -> StorageResult<()> {
        self.check_writable()?;
        let mut items = self.items.lock();
        items.retain(|f| f.name != favorite.name);
        items.insert(0, favorite.clone());
        self.listing.send_replace(items.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        self.check_writable()?;
        let mut items = self.items.lock();
        items.retain(|f| f.name != name);
        self.listing.send_replace(items.clone());
        Ok(())
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.items.lock().iter().any(|f| f.name == name))
    }

    fn observe_all(&self) -> watch::Receiver<Vec<FavoritePlace>> {
        self.listing.subscribe()
    }
}

#[derive(Default)]
pub struct MemoryLastPlace {
    value: Mutex<Option<String>>,
}

impl MemoryLastPlace {
    pub fn with(name: &str) -> Self {
        Self {
            value: Mutex::new(Some(name.to_string())),
        }
    }

    pub fn value(&self) -> Option<String> {
        self.value.lock().clone()
    }
}

#[async_trait]
impl LastPlaceStore for MemoryLastPlace {
    async fn get(&self) -> StorageResult<Option<String>> {
        Ok(self.value())
    }

    async fn set(&self, name: &str) -> StorageResult<()> {
        *self.value.lock() = Some(name.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub orchestrator: WeatherOrchestrator,
    pub weather: Arc<StubWeather>,
    pub location: Arc<StubLocation>,
    pub favorites: Arc<MemoryFavorites>,
    pub last_place: Arc<MemoryLastPlace>,
    pub rx: watch::Receiver<ApplicationState>,
}

pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        forecast_days: 3,
        search_debounce: Duration::from_millis(50),
        gps_refresh_interval: None,
    }
}

pub async fn start(
    weather: StubWeather,
    location: StubLocation,
    last_place: MemoryLastPlace,
) -> Harness {
    start_with(Arc::new(weather), location, last_place, settings()).await
}

pub async fn start_with(
    weather: Arc<StubWeather>,
    location: StubLocation,
    last_place: MemoryLastPlace,
    settings: OrchestratorSettings,
) -> Harness {
    let favorites = Arc::new(MemoryFavorites::default());
    let last_place = Arc::new(last_place);
    let location = Arc::new(location);

    let deps = Dependencies {
        weather: weather.clone(),
        location: location.clone(),
        favorites: favorites.clone(),
        last_place: last_place.clone(),
    };
    let orchestrator = WeatherOrchestrator::start(deps, settings).await;
    let rx = orchestrator.observe_state();

    Harness {
        orchestrator,
        weather,
        location,
        favorites,
        last_place,
        rx,
    }
}

/// Wait until the state satisfies `pred`, failing the test after two seconds.
pub async fn wait_for(
    rx: &mut watch::Receiver<ApplicationState>,
    pred: impl FnMut(&ApplicationState) -> bool,
) -> ApplicationState {
    let outcome = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .map(|waited| waited.map(|state| state.clone()));
    match outcome {
        Ok(Ok(state)) => state,
        Ok(Err(_)) => panic!("state channel closed"),
        Err(_) => panic!("timed out; last state: {:#?}", *rx.borrow()),
    }
}

/// True once `name` is current with its forecast and nothing is loading.
pub fn settled_on(state: &ApplicationState, name: &str) -> bool {
    state.is_showing(name)
        && !state.is_loading
        && state.forecast.as_ref().and_then(forecast_name) == Some(name)
}
