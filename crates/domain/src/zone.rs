//! Zone — one independently switchable irrigation output line.

use serde::{Deserialize, Serialize};

use crate::MAX_NAME_LEN;
use crate::error::{SprinklerError, ValidationError};
use crate::id::{OutputPin, ZoneId};
use crate::time::Timestamp;

/// A configured irrigation zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub output: OutputPin,
    pub enabled: bool,
    pub last_run: Option<Timestamp>,
}

impl Zone {
    /// Create a builder for constructing a [`Zone`].
    #[must_use]
    pub fn builder(id: ZoneId) -> ZoneBuilder {
        ZoneBuilder {
            id,
            name: None,
            output: OutputPin(0),
            enabled: true,
            last_run: None,
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::InvalidArgument`] when `name` is empty.
    pub fn validate(&self) -> Result<(), SprinklerError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Zone`].
#[derive(Debug)]
pub struct ZoneBuilder {
    id: ZoneId,
    name: Option<String>,
    output: OutputPin,
    enabled: bool,
    last_run: Option<Timestamp>,
}

impl ZoneBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn output(mut self, output: OutputPin) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn last_run(mut self, last_run: Timestamp) -> Self {
        self.last_run = Some(last_run);
        self
    }

    /// Consume the builder, normalize the name, validate, and return a [`Zone`].
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::InvalidArgument`] if `name` is missing or blank.
    pub fn build(self) -> Result<Zone, SprinklerError> {
        let zone = Zone {
            id: self.id,
            name: normalize_name(self.name.as_deref().unwrap_or_default()),
            output: self.output,
            enabled: self.enabled,
            last_run: self.last_run,
        };
        zone.validate()?;
        Ok(zone)
    }
}

/// Trim surrounding whitespace and cap a display name at [`MAX_NAME_LEN`]
/// characters.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().chars().take(MAX_NAME_LEN).collect()
}
