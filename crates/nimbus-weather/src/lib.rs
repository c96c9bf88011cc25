//! Weather data for Nimbus
//!
//! Fetches current conditions, forecasts and place search results from a
//! WeatherAPI.com-compatible service, and abstracts the device position.

pub mod api;
pub mod client;
pub mod error;
pub mod location;
pub mod types;

pub use client::{ClientSettings, WeatherApiClient, WeatherSource};
pub use error::{LocationError, WeatherError};
pub use location::{FixedLocationProvider, LocationProvider};
pub use types::*;
