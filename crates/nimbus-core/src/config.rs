use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable consulted when `weather_api.api_key` is empty.
pub const API_KEY_ENV: &str = "NIMBUS_WEATHER_API_KEY";

const MAX_FORECAST_DAYS: u8 = 14;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding config.toml and the local stores
    pub config_dir: PathBuf,

    /// Remote weather API
    #[serde(default)]
    pub weather_api: WeatherApiConfig,

    /// Forecast, search and refresh behavior
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Device location
    #[serde(default)]
    pub location: LocationConfig,

    /// Local persistence
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Unit system used for temperatures and wind speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// Celsius, km/h
    #[default]
    Metric,
    /// Fahrenheit, mph
    Imperial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherApiConfig {
    pub base_url: String,

    /// API key; when empty, `NIMBUS_WEATHER_API_KEY` is used instead
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub units: UnitSystem,

    /// Request air-quality data alongside weather
    #[serde(default = "default_true")]
    pub include_air_quality: bool,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for WeatherApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.weatherapi.com/v1".to_string(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            units: UnitSystem::Metric,
            include_air_quality: true,
        }
    }
}

impl WeatherApiConfig {
    /// The configured key, or the environment fallback.
    pub fn resolved_api_key(&self) -> String {
        if self.api_key.is_empty() {
            std::env::var(API_KEY_ENV).unwrap_or_default()
        } else {
            self.api_key.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Days requested for the forecast (1-14)
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,

    /// Maximum number of upcoming hourly points kept
    #[serde(default = "default_hourly_limit")]
    pub hourly_limit: usize,

    /// Quiet period before a search request is sent
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,

    /// Background GPS refresh interval in minutes (0 = once at startup)
    #[serde(default = "default_gps_refresh_minutes")]
    pub gps_refresh_minutes: u32,
}

fn default_forecast_days() -> u8 {
    7
}

fn default_hourly_limit() -> usize {
    24
}

fn default_search_debounce_ms() -> u64 {
    500
}

fn default_gps_refresh_minutes() -> u32 {
    15
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_days: default_forecast_days(),
            hourly_limit: default_hourly_limit(),
            search_debounce_ms: default_search_debounce_ms(),
            gps_refresh_minutes: default_gps_refresh_minutes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Location service switch
    #[serde(default)]
    pub enabled: bool,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,
}

impl LocationConfig {
    /// Configured position, when both coordinates are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file for favorites, relative to `config_dir`
    #[serde(default = "default_favorites_db")]
    pub favorites_db: String,

    /// JSON file holding the last viewed place, relative to `config_dir`
    #[serde(default = "default_last_place_file")]
    pub last_place_file: String,
}

fn default_favorites_db() -> String {
    "favorites.db".to_string()
}

fn default_last_place_file() -> String {
    "last_place.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            favorites_db: default_favorites_db(),
            last_place_file: default_last_place_file(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nimbus");

        Self {
            config_dir,
            weather_api: WeatherApiConfig::default(),
            weather: WeatherConfig::default(),
            location: LocationConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, creating defaults if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let mut config = Self::default();
            if let Some(parent) = config_path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; errors fail the load.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather_api.base_url, "weather_api.base_url", &mut result);

        if self.weather_api.resolved_api_key().is_empty() {
            result.add_warning(
                "weather_api.api_key",
                format!("No API key configured (set it here or in {API_KEY_ENV})"),
            );
        }

        if self.weather.forecast_days == 0 || self.weather.forecast_days > MAX_FORECAST_DAYS {
            result.add_error(
                "weather.forecast_days",
                format!("Forecast days must be between 1 and {MAX_FORECAST_DAYS}"),
            );
        }

        if self.weather.hourly_limit == 0 {
            result.add_warning("weather.hourly_limit", "Hourly forecast disabled (0 points)");
        }

        if self.weather.search_debounce_ms > 5000 {
            result.add_warning(
                "weather.search_debounce_ms",
                "Search debounce is unusually long (>5000 ms)",
            );
        }

        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    result.add_error("location.latitude", "Latitude must be within [-90, 90]");
                }
                if !(-180.0..=180.0).contains(&lon) {
                    result.add_error("location.longitude", "Longitude must be within [-180, 180]");
                }
            }
            (None, None) => {
                if self.location.enabled {
                    result.add_warning(
                        "location",
                        "Location enabled but no coordinates configured",
                    );
                }
            }
            _ => {
                result.add_error(
                    "location",
                    "Latitude and longitude must be set together",
                );
            }
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the favorites database
    pub fn favorites_db_path(&self) -> PathBuf {
        self.config_dir.join(&self.storage.favorites_db)
    }

    /// Path of the last-viewed-place file
    pub fn last_place_path(&self) -> PathBuf {
        self.config_dir.join(&self.storage.last_place_file)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("nimbus");

        Ok(config_dir.join("config.toml"))
    }
}
