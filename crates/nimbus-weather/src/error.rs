//! Weather and location error types.

use nimbus_core::NetworkError;
use thiserror::Error;

/// Location service errors
#[derive(Debug, Clone, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service disabled")]
    ServiceDisabled,
}

/// Weather API errors
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("No matching location found: {0}")]
    NotFound(String),

    #[error("Invalid or missing API key")]
    InvalidApiKey,

    #[error("Weather API error {code}: {message}")]
    Api { code: u32, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl WeatherError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(e) => e.user_message(),
            Self::NotFound(_) => "Location not found. Check the name and try again.",
            Self::InvalidApiKey => "Weather API key is invalid. Check settings.",
            Self::Api { .. } => "Weather service error. Please try again.",
            Self::Parse(_) => "Received unexpected weather data. Please try again.",
        }
    }

    /// Build an error from the API's `{"error": {"code", "message"}}` body.
    pub fn from_api(status: u16, code: u32, message: String) -> Self {
        match code {
            1006 => Self::NotFound(message),
            1002 | 2006 | 2007 | 2008 => Self::InvalidApiKey,
            _ if status == 401 || status == 403 => Self::InvalidApiKey,
            _ => Self::Api { code, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_codes() {
        assert!(matches!(
            WeatherError::from_api(400, 1006, "No location found".into()),
            WeatherError::NotFound(_)
        ));
        assert!(matches!(
            WeatherError::from_api(401, 2006, "bad key".into()),
            WeatherError::InvalidApiKey
        ));
        assert!(matches!(
            WeatherError::from_api(403, 0, String::new()),
            WeatherError::InvalidApiKey
        ));
        assert!(matches!(
            WeatherError::from_api(400, 9999, "Internal".into()),
            WeatherError::Api { code: 9999, .. }
        ));
    }

    #[test]
    fn test_display_includes_detail() {
        let err = WeatherError::NotFound("Atlantis".into());
        assert!(err.to_string().contains("Atlantis"));
        assert!(err.user_message().contains("not found"));
    }
}
