//! WeatherAPI.com client.

use std::time::Duration;

use async_trait::async_trait;
use nimbus_core::{ReqwestErrorExt, UnitSystem, WeatherApiConfig};
use reqwest::Client;
use tracing::instrument;

use crate::api::{ApiErrorBody, ApiSearchEntry, ForecastResponse};
use crate::error::WeatherError;
use crate::types::{ForecastReport, PlaceSearchResult, PlaceWeather};

/// Source of weather data consumed by the orchestrator.
///
/// `query` is a free-form place name or a `"{lat},{lon}"` string.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current_weather(&self, query: &str) -> Result<PlaceWeather, WeatherError>;

    async fn forecast(&self, query: &str, days: u8) -> Result<ForecastReport, WeatherError>;

    async fn search_places(&self, query: &str) -> Result<Vec<PlaceSearchResult>, WeatherError>;
}

/// Connection settings for [`WeatherApiClient`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub units: UnitSystem,
    pub include_air_quality: bool,
    pub hourly_limit: usize,
}

impl ClientSettings {
    pub fn from_config(api: &WeatherApiConfig, hourly_limit: usize) -> Self {
        Self {
            base_url: api.base_url.trim_end_matches('/').to_string(),
            api_key: api.resolved_api_key(),
            timeout: Duration::from_secs(api.timeout_secs),
            units: api.units,
            include_air_quality: api.include_air_quality,
            hourly_limit,
        }
    }
}

pub struct WeatherApiClient {
    client: Client,
    settings: ClientSettings,
}

impl WeatherApiClient {
    pub fn new(settings: ClientSettings) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn aqi_flag(&self) -> &'static str {
        if self.settings.include_air_quality {
            "yes"
        } else {
            "no"
        }
    }

    fn forecast_url(&self, query: &str, days: u8) -> String {
        format!(
            "{}/forecast.json?key={}&q={}&days={}&aqi={}&alerts=no",
            self.settings.base_url,
            urlencoding::encode(&self.settings.api_key),
            urlencoding::encode(query),
            days,
            self.aqi_flag(),
        )
    }

    async fn fetch_forecast(&self, query: &str, days: u8) -> Result<ForecastResponse, WeatherError> {
        let response = self
            .client
            .get(self.forecast_url(query, days))
            .send()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        self.handle_response(response).await
    }

    /// Decode a success body, or map the API error envelope.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, WeatherError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        if status.is_success() {
            return serde_json::from_str(&text)
                .map_err(|e| WeatherError::Parse(format!("JSON parse error: {}", e)));
        }

        let (code, message) = match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => (body.error.code, body.error.message),
            Err(_) => (0, format!("{}: {}", status, text)),
        };
        tracing::debug!(status = status.as_u16(), code, "Weather API returned an error");
        Err(WeatherError::from_api(status.as_u16(), code, message))
    }
}

#[async_trait]
impl WeatherSource for WeatherApiClient {
    #[instrument(skip(self), level = "info")]
    async fn current_weather(&self, query: &str) -> Result<PlaceWeather, WeatherError> {
        let response = self.fetch_forecast(query, 1).await?;
        Ok(response.to_place(self.settings.units))
    }

    #[instrument(skip(self), level = "info")]
    async fn forecast(&self, query: &str, days: u8) -> Result<ForecastReport, WeatherError> {
        let response = self.fetch_forecast(query, days).await?;
        response.into_report(self.settings.units, self.settings.hourly_limit)
    }

    #[instrument(skip(self), level = "info")]
    async fn search_places(&self, query: &str) -> Result<Vec<PlaceSearchResult>, WeatherError> {
        let url = format!(
            "{}/search.json?key={}&q={}",
            self.settings.base_url,
            urlencoding::encode(&self.settings.api_key),
            urlencoding::encode(query),
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        let entries: Vec<ApiSearchEntry> = self.handle_response(response).await?;
        Ok(entries.into_iter().map(PlaceSearchResult::from).collect())
    }
}
