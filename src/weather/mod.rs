//! Weather dashboard resources
//!
//! Typed views of the upstream weather API: station conditions, region and
//! location aggregates, plus their live update feeds. Rendering of these
//! values is left to the caller.

pub mod api;
pub mod model;

pub use api::{RegionPath, WeatherApi, MAX_SEARCH_PARTS};
pub use model::{Conditions, Region, RegionUpdate, Sensor, StationInfo};
