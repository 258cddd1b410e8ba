//! Shared types and OpenAPI schemas.
//!
//! This module contains types that are shared across the application.
//! Most domain types are defined in their respective modules (medicine,
//! dose, reconcile, analytics, accounts).

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use crate::error::{CoreError, Result};

/// 24-hour `HH:MM` with an optional single-digit hour, minutes 00-59.
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]?\d|2[0-3]):([0-5]\d)$").expect("time regex is valid"));

/// Returns `true` if `value` is a valid 24-hour `HH:MM` time-of-day string.
#[must_use]
pub fn is_valid_time_string(value: &str) -> bool {
    TIME_RE.is_match(value)
}

/// A time of day in 24-hour clock, serialized as `"HH:MM"`.
///
/// Medicines carry an ordered list of these; the schedule generator turns
/// each one into a concrete timestamp per calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Create a time of day, validating both components.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTimeFormat`] when hour > 23 or minute > 59.
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(CoreError::InvalidTimeFormat(format!("{hour}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    /// Hour component (0-23).
    #[must_use]
    pub const fn hour(&self) -> u8 {
        self.hour
    }

    /// Minute component (0-59).
    #[must_use]
    pub const fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = TIME_RE
            .captures(s)
            .ok_or_else(|| CoreError::InvalidTimeFormat(s.to_string()))?;
        // The regex constrains both fields to two digits max, so parsing
        // cannot fail.
        let hour = caps[1].parse::<u8>().unwrap_or(0);
        let minute = caps[2].parse::<u8>().unwrap_or(0);
        Self::new(hour, minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    #[schema(example = "ok")]
    pub status: String,

    /// Service version.
    #[schema(example = "0.1.0")]
    pub version: String,
}
