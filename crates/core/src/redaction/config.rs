//! Redaction service configuration.

use std::time::Duration;

use docgate_shared::RedactionSettings;

use super::error::RedactionError;
use super::geometry::Rgb;
use super::store::SessionStore;

/// Redaction service configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedactionConfig {
    /// Idle time after which a session expires.
    pub session_ttl: Duration,
    /// Fill color when neither the rectangle nor the call names one.
    pub default_color: Rgb,
}

impl RedactionConfig {
    /// Set the session idle window.
    #[must_use]
    pub const fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Set the default fill color.
    #[must_use]
    pub const fn with_default_color(mut self, color: Rgb) -> Self {
        self.default_color = color;
        self
    }
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            session_ttl: SessionStore::DEFAULT_TTL,
            default_color: Rgb::BLACK,
        }
    }
}

impl TryFrom<&RedactionSettings> for RedactionConfig {
    type Error = RedactionError;

    fn try_from(settings: &RedactionSettings) -> Result<Self, Self::Error> {
        if settings.session_ttl_secs == 0 {
            return Err(RedactionError::Configuration(
                "session_ttl_secs must be positive".to_string(),
            ));
        }
        let default_color = Rgb::parse(&settings.default_color).ok_or_else(|| {
            RedactionError::Configuration(format!(
                "default_color '{}' is not a hex color",
                settings.default_color
            ))
        })?;
        Ok(Self {
            session_ttl: Duration::from_secs(settings.session_ttl_secs),
            default_color,
        })
    }
}
