//! Device position.

use async_trait::async_trait;
use nimbus_core::LocationConfig;

use crate::error::LocationError;
use crate::types::Coordinates;

/// Platform location service.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn has_permission(&self) -> bool;

    async fn is_enabled(&self) -> bool;

    /// One-shot position; `Ok(None)` when the platform has no fix.
    async fn current_position(&self) -> Result<Option<Coordinates>, LocationError>;
}

/// Position taken from configuration, for hosts without a location service.
#[derive(Debug, Clone, Default)]
pub struct FixedLocationProvider {
    position: Option<Coordinates>,
    enabled: bool,
}

impl FixedLocationProvider {
    pub fn new(position: Option<Coordinates>, enabled: bool) -> Self {
        Self { position, enabled }
    }

    pub fn from_config(config: &LocationConfig) -> Self {
        let position = config
            .coordinates()
            .map(|(lat, lon)| Coordinates::new(lat, lon));
        Self::new(position, config.enabled)
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn has_permission(&self) -> bool {
        self.position.is_some()
    }

    async fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn current_position(&self) -> Result<Option<Coordinates>, LocationError> {
        if !self.enabled {
            return Err(LocationError::ServiceDisabled);
        }
        match self.position {
            Some(position) => Ok(Some(position)),
            None => Err(LocationError::PermissionDenied),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configured_position() {
        let config = LocationConfig {
            enabled: true,
            latitude: Some(40.71),
            longitude: Some(-74.0),
        };
        let provider = FixedLocationProvider::from_config(&config);

        assert!(provider.has_permission().await);
        assert!(provider.is_enabled().await);
        let position = provider.current_position().await.unwrap();
        assert_eq!(position, Some(Coordinates::new(40.71, -74.0)));
    }

    #[tokio::test]
    async fn test_disabled_service() {
        let provider = FixedLocationProvider::new(Some(Coordinates::new(1.0, 2.0)), false);

        assert!(provider.has_permission().await);
        assert!(!provider.is_enabled().await);
        assert!(matches!(
            provider.current_position().await,
            Err(LocationError::ServiceDisabled)
        ));
    }

    #[tokio::test]
    async fn test_no_coordinates_means_no_permission() {
        let provider = FixedLocationProvider::from_config(&LocationConfig {
            enabled: true,
            ..Default::default()
        });

        assert!(!provider.has_permission().await);
        assert!(matches!(
            provider.current_position().await,
            Err(LocationError::PermissionDenied)
        ));
    }
}
