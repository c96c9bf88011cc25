//! Shared configuration, error types and logging setup for Nimbus.

pub mod config;
pub mod error;

pub use config::{
    Config, LocationConfig, StorageConfig, UnitSystem, ValidationResult, WeatherApiConfig,
    WeatherConfig,
};
pub use error::{DatabaseError, NetworkError, ReqwestErrorExt, RusqliteErrorExt};

/// Initialize logging.
///
/// Reads the filter from `RUST_LOG`, defaulting to `info`. Safe to call more
/// than once; later calls leave the first subscriber in place.
pub fn init() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    match installed {
        Ok(()) => tracing::info!("Nimbus core initialized"),
        Err(e) => tracing::debug!("Logging already initialized: {}", e),
    }
}
