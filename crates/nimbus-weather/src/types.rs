use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Geographic position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Place query accepted by the weather API ("{lat},{lon}")
    pub fn to_query(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

/// Weather condition as reported by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Condition {
    pub text: String,
    /// Absolute icon URL
    pub icon: String,
    pub code: i32,
}

impl Condition {
    pub fn new(text: impl Into<String>, icon: &str, code: i32) -> Self {
        Self {
            text: text.into(),
            icon: normalize_icon_url(icon),
            code,
        }
    }
}

/// The API hands out protocol-relative icon URLs ("//cdn...").
pub fn normalize_icon_url(icon: &str) -> String {
    if icon.starts_with("//") {
        format!("https:{icon}")
    } else {
        icon.to_string()
    }
}

/// US EPA air-quality index, 1 (good) to 6 (hazardous)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AirQualityIndex(u8);

/// Human-readable band of an [`AirQualityIndex`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AirQualityCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AirQualityIndex {
    /// Returns `None` for values outside 1..=6.
    pub fn new(value: u8) -> Option<Self> {
        (1..=6).contains(&value).then_some(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn category(&self) -> AirQualityCategory {
        match self.0 {
            1 => AirQualityCategory::Good,
            2 => AirQualityCategory::Moderate,
            3 => AirQualityCategory::UnhealthyForSensitiveGroups,
            4 => AirQualityCategory::Unhealthy,
            5 => AirQualityCategory::VeryUnhealthy,
            _ => AirQualityCategory::Hazardous,
        }
    }
}

impl AirQualityCategory {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitiveGroups => "Unhealthy for sensitive groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }
}

/// Snapshot of the weather at one place, built from a single API response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceWeather {
    pub name: String,
    pub region: String,
    pub country: String,
    pub coordinates: Coordinates,
    /// Local time at the place, as reported ("2024-05-01 14:30")
    pub local_time: String,
    pub local_time_epoch: i64,
    pub timezone_id: String,
    pub temperature: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub feels_like: f64,
    pub condition: Condition,
    pub humidity: u8,
    pub wind_speed: f64,
    pub wind_direction: String,
    pub uv_index: f64,
    pub air_quality: Option<AirQualityIndex>,
    pub is_day: bool,
}

/// One upcoming hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub time: NaiveDateTime,
    pub epoch: i64,
    pub temperature: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub condition: Condition,
    pub chance_of_rain: u8,
    pub humidity: u8,
    pub wind_speed: f64,
    pub air_quality: Option<AirQualityIndex>,
}

/// One forecast day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub condition: Condition,
    pub chance_of_rain: u8,
    /// Absent when the sun does not rise (polar night)
    pub sunrise: Option<NaiveTime>,
    pub sunset: Option<NaiveTime>,
    pub uv_index: f64,
}

/// Hourly and daily series for one place
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Forecast {
    pub hourly: Vec<HourlyPoint>,
    pub daily: Vec<DailyPoint>,
}

impl Forecast {
    /// Keeps only hours strictly after `now_epoch`, ascending, at most `limit`.
    pub fn upcoming(
        mut hourly: Vec<HourlyPoint>,
        daily: Vec<DailyPoint>,
        now_epoch: i64,
        limit: usize,
    ) -> Self {
        hourly.retain(|h| h.epoch > now_epoch);
        hourly.sort_by_key(|h| h.epoch);
        hourly.truncate(limit);
        Self { hourly, daily }
    }
}

/// Forecast response: the place snapshot plus its series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub place: PlaceWeather,
    pub forecast: Forecast,
}

/// One entry of a place search; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSearchResult {
    pub name: String,
    pub region: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl PlaceSearchResult {
    /// "Name, Region, Country" with empty parts skipped
    pub fn label(&self) -> String {
        [&self.name, &self.region, &self.country]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hour(epoch: i64) -> HourlyPoint {
        HourlyPoint {
            time: chrono::DateTime::from_timestamp(epoch, 0)
                .unwrap()
                .naive_utc(),
            epoch,
            temperature: 20.0,
            min_temperature: 18.0,
            max_temperature: 22.0,
            condition: Condition::default(),
            chance_of_rain: 0,
            humidity: 50,
            wind_speed: 5.0,
            air_quality: None,
        }
    }

    #[test]
    fn test_coordinates_query() {
        assert_eq!(Coordinates::new(51.52, -0.11).to_query(), "51.52,-0.11");
    }

    #[test]
    fn test_icon_url_gets_scheme() {
        let c = Condition::new("Sunny", "//cdn.weatherapi.com/weather/64x64/day/113.png", 1000);
        assert_eq!(c.icon, "https://cdn.weatherapi.com/weather/64x64/day/113.png");
        assert_eq!(normalize_icon_url("https://x/y.png"), "https://x/y.png");
    }

    #[test]
    fn test_air_quality_bounds() {
        assert!(AirQualityIndex::new(0).is_none());
        assert!(AirQualityIndex::new(7).is_none());
        assert_eq!(
            AirQualityIndex::new(1).map(|a| a.category()),
            Some(AirQualityCategory::Good)
        );
        assert_eq!(
            AirQualityIndex::new(6).map(|a| a.category()),
            Some(AirQualityCategory::Hazardous)
        );
    }

    #[test]
    fn test_air_quality_higher_is_worse() {
        let moderate = AirQualityIndex::new(2).unwrap();
        let unhealthy = AirQualityIndex::new(4).unwrap();
        assert!(unhealthy > moderate);
        assert_eq!(unhealthy.category().description(), "Unhealthy");
    }

    #[test]
    fn test_upcoming_drops_past_and_current_hour() {
        let now = 1_700_000_000;
        let hourly = vec![hour(now + 7200), hour(now - 3600), hour(now), hour(now + 3600)];

        let forecast = Forecast::upcoming(hourly, vec![], now, 24);

        let epochs: Vec<i64> = forecast.hourly.iter().map(|h| h.epoch).collect();
        assert_eq!(epochs, vec![now + 3600, now + 7200]);
    }

    #[test]
    fn test_upcoming_truncates() {
        let now = 1_700_000_000;
        let hourly = (1..=48).map(|i| hour(now + i * 3600)).collect();

        let forecast = Forecast::upcoming(hourly, vec![], now, 24);

        assert_eq!(forecast.hourly.len(), 24);
        assert_eq!(forecast.hourly[0].epoch, now + 3600);
    }

    #[test]
    fn test_search_result_label_skips_empty_region() {
        let result = PlaceSearchResult {
            name: "Monaco".into(),
            region: String::new(),
            country: "Monaco".into(),
            latitude: 43.73,
            longitude: 7.42,
        };
        assert_eq!(result.label(), "Monaco, Monaco");
    }
}
