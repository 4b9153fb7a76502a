//! Weather data types
//!
//! Field names follow the upstream API, which uses PascalCase JSON keys.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Sensor {
    /// Unit of measure (e.g. "C", "hPa")
    pub unit: String,
    /// Measured value
    pub value: f64,
}

/// Current conditions of one station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Conditions {
    /// Station name
    pub station: String,
    /// Server the station reports to
    pub server: String,
    /// Observation time
    pub time: DateTime<Utc>,
    /// Readings grouped by sensor name
    #[serde(default)]
    pub sensors: HashMap<String, Vec<Sensor>>,
}

/// Station metadata
///
/// Only the station identity and position are required; descriptive fields
/// the upstream leaves out are empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StationInfo {
    pub server: String,
    pub station: String,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub software: String,
    #[serde(default)]
    pub version: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation: f64,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    /// Whether the station publishes the rapid update feed
    #[serde(default)]
    pub rapid_weather: bool,
    /// Last report time (Unix epoch when absent)
    #[serde(default)]
    pub updated: DateTime<Utc>,
}

/// A named region, as returned by region search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Region {
    pub country: String,
    pub region: String,
    pub city: String,
    #[serde(default)]
    pub district: String,
}

/// Aggregated readings for a region or location, keyed by sensor name
pub type RegionUpdate = HashMap<String, Sensor>;
