//! Wire format of the WeatherAPI.com endpoints and conversion into domain types.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use nimbus_core::UnitSystem;
use serde::Deserialize;

use crate::error::WeatherError;
use crate::types::{
    AirQualityIndex, Condition, Coordinates, DailyPoint, Forecast, ForecastReport, HourlyPoint,
    PlaceSearchResult, PlaceWeather,
};

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub location: ApiLocation,
    pub current: ApiCurrent,
    #[serde(default)]
    pub forecast: ApiForecast,
}

#[derive(Debug, Deserialize)]
pub struct ApiLocation {
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub tz_id: String,
    pub localtime_epoch: i64,
    #[serde(default)]
    pub localtime: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiCondition {
    pub text: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub code: i32,
}

impl From<ApiCondition> for Condition {
    fn from(c: ApiCondition) -> Self {
        Condition::new(c.text, &c.icon, c.code)
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiAirQuality {
    #[serde(rename = "us-epa-index")]
    pub us_epa_index: Option<u8>,
}

fn epa_index(aq: Option<&ApiAirQuality>) -> Option<AirQualityIndex> {
    aq.and_then(|a| a.us_epa_index).and_then(AirQualityIndex::new)
}

#[derive(Debug, Deserialize)]
pub struct ApiCurrent {
    pub temp_c: f64,
    pub temp_f: f64,
    pub is_day: u8,
    pub condition: ApiCondition,
    pub wind_kph: f64,
    pub wind_mph: f64,
    #[serde(default)]
    pub wind_dir: String,
    pub humidity: u8,
    pub feelslike_c: f64,
    pub feelslike_f: f64,
    #[serde(default)]
    pub uv: f64,
    pub air_quality: Option<ApiAirQuality>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiForecast {
    #[serde(default)]
    pub forecastday: Vec<ApiForecastDay>,
}

#[derive(Debug, Deserialize)]
pub struct ApiForecastDay {
    pub date: String,
    pub day: ApiDay,
    pub astro: ApiAstro,
    #[serde(default)]
    pub hour: Vec<ApiHour>,
}

#[derive(Debug, Deserialize)]
pub struct ApiDay {
    pub maxtemp_c: f64,
    pub maxtemp_f: f64,
    pub mintemp_c: f64,
    pub mintemp_f: f64,
    #[serde(default)]
    pub daily_chance_of_rain: u8,
    pub condition: ApiCondition,
    #[serde(default)]
    pub uv: f64,
}

#[derive(Debug, Deserialize)]
pub struct ApiAstro {
    #[serde(default)]
    pub sunrise: String,
    #[serde(default)]
    pub sunset: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiHour {
    pub time_epoch: i64,
    pub time: String,
    pub temp_c: f64,
    pub temp_f: f64,
    pub condition: ApiCondition,
    #[serde(default)]
    pub chance_of_rain: u8,
    #[serde(default)]
    pub humidity: u8,
    pub wind_kph: f64,
    pub wind_mph: f64,
    pub air_quality: Option<ApiAirQuality>,
}

#[derive(Debug, Deserialize)]
pub struct ApiSearchEntry {
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

impl From<ApiSearchEntry> for PlaceSearchResult {
    fn from(e: ApiSearchEntry) -> Self {
        Self {
            name: e.name,
            region: e.region,
            country: e.country,
            latitude: e.lat,
            longitude: e.lon,
        }
    }
}

/// Error body: `{"error": {"code": 1006, "message": "..."}}`
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u32,
    pub message: String,
}

fn pick(units: UnitSystem, metric: f64, imperial: f64) -> f64 {
    match units {
        UnitSystem::Metric => metric,
        UnitSystem::Imperial => imperial,
    }
}

/// "07:12 AM"; the API sends text such as "No sunrise" near the poles.
fn parse_clock(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%I:%M %p").ok()
}

impl ForecastResponse {
    /// Current-conditions snapshot; daily range comes from the first forecast day.
    pub fn to_place(&self, units: UnitSystem) -> PlaceWeather {
        let loc = &self.location;
        let cur = &self.current;
        let temperature = pick(units, cur.temp_c, cur.temp_f);
        let (min_temperature, max_temperature) = self
            .forecast
            .forecastday
            .first()
            .map(|d| {
                (
                    pick(units, d.day.mintemp_c, d.day.mintemp_f),
                    pick(units, d.day.maxtemp_c, d.day.maxtemp_f),
                )
            })
            .unwrap_or((temperature, temperature));

        PlaceWeather {
            name: loc.name.clone(),
            region: loc.region.clone(),
            country: loc.country.clone(),
            coordinates: Coordinates::new(loc.lat, loc.lon),
            local_time: loc.localtime.clone(),
            local_time_epoch: loc.localtime_epoch,
            timezone_id: loc.tz_id.clone(),
            temperature,
            min_temperature,
            max_temperature,
            feels_like: pick(units, cur.feelslike_c, cur.feelslike_f),
            condition: Condition::new(
                cur.condition.text.clone(),
                &cur.condition.icon,
                cur.condition.code,
            ),
            humidity: cur.humidity,
            wind_speed: pick(units, cur.wind_kph, cur.wind_mph),
            wind_direction: cur.wind_dir.clone(),
            uv_index: cur.uv,
            air_quality: epa_index(cur.air_quality.as_ref()),
            is_day: cur.is_day != 0,
        }
    }

    /// Place snapshot plus series; hours at or before the place's local time are dropped.
    pub fn into_report(
        self,
        units: UnitSystem,
        hourly_limit: usize,
    ) -> Result<ForecastReport, WeatherError> {
        let place = self.to_place(units);
        let mut hourly = Vec::new();
        let mut daily = Vec::with_capacity(self.forecast.forecastday.len());

        for day in self.forecast.forecastday {
            let date = NaiveDate::parse_from_str(&day.date, "%Y-%m-%d")
                .map_err(|e| WeatherError::Parse(format!("forecast date {:?}: {}", day.date, e)))?;
            let min_temperature = pick(units, day.day.mintemp_c, day.day.mintemp_f);
            let max_temperature = pick(units, day.day.maxtemp_c, day.day.maxtemp_f);

            for h in day.hour {
                let time = NaiveDateTime::parse_from_str(&h.time, "%Y-%m-%d %H:%M")
                    .map_err(|e| WeatherError::Parse(format!("hour {:?}: {}", h.time, e)))?;
                hourly.push(HourlyPoint {
                    time,
                    epoch: h.time_epoch,
                    temperature: pick(units, h.temp_c, h.temp_f),
                    min_temperature,
                    max_temperature,
                    air_quality: epa_index(h.air_quality.as_ref()),
                    condition: h.condition.into(),
                    chance_of_rain: h.chance_of_rain,
                    humidity: h.humidity,
                    wind_speed: pick(units, h.wind_kph, h.wind_mph),
                });
            }

            daily.push(DailyPoint {
                date,
                min_temperature,
                max_temperature,
                condition: day.day.condition.into(),
                chance_of_rain: day.day.daily_chance_of_rain,
                sunrise: parse_clock(&day.astro.sunrise),
                sunset: parse_clock(&day.astro.sunset),
                uv_index: day.day.uv,
            });
        }

        let forecast = Forecast::upcoming(hourly, daily, place.local_time_epoch, hourly_limit);
        Ok(ForecastReport { place, forecast })
    }
}
