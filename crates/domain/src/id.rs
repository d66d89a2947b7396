//! Typed slot identifiers.
//!
//! Zones and programs live in small fixed-capacity slot tables, so their
//! identifiers are 1-based slot numbers. A value can only be constructed
//! inside its declared range; "no id" is expressed with `Option`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::{MAX_PROGRAMS, MAX_ZONES};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident, $kind:literal, $max:expr) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        pub struct $name(u8);

        impl $name {
            /// Highest valid identifier.
            pub const MAX: u8 = $max;

            /// Validate and wrap a slot number.
            ///
            /// # Errors
            ///
            /// Returns [`ValidationError::IdOutOfRange`] when `value` is zero
            /// or above [`Self::MAX`].
            pub fn new(value: u8) -> Result<Self, ValidationError> {
                if value == 0 || value > Self::MAX {
                    return Err(ValidationError::IdOutOfRange {
                        kind: $kind,
                        id: value,
                        max: Self::MAX,
                    });
                }
                Ok(Self(value))
            }

            /// Every identifier in slot order.
            pub fn all() -> impl Iterator<Item = Self> {
                (1..=Self::MAX).map(Self)
            }

            /// The raw slot number.
            #[must_use]
            pub fn get(self) -> u8 {
                self.0
            }
        }

        impl TryFrom<u8> for $name {
            type Error = ValidationError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for u8 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s.parse::<u8>().map_err(|_| ValidationError::IdOutOfRange {
                    kind: $kind,
                    id: 0,
                    max: Self::MAX,
                })?;
                Self::new(value)
            }
        }
    };
}

define_id!(
    /// Identifier of a [`Zone`](crate::zone::Zone) slot.
    ZoneId,
    "zone",
    MAX_ZONES
);

define_id!(
    /// Identifier of a [`Program`](crate::program::Program) slot.
    ProgramId,
    "program",
    MAX_PROGRAMS
);

/// Hardware output line driven by a zone (a GPIO number on the device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputPin(pub u8);

impl fmt::Display for OutputPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpio{}", self.0)
    }
}
