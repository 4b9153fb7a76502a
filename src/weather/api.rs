//! Weather API client
//!
//! One-shot fetches for initial page data, and live subscriptions that share
//! a single upstream event stream per URL across every caller.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};
use crate::registry::{RegistryConfig, ResourceConnection, ResourceKey, ResourceRegistry, Subscription};
use crate::upstream::{Source, UpstreamClient};

use super::model::{Conditions, Region, RegionUpdate, StationInfo};

/// Most name parts a region search accepts (query keys `a`..`z`)
pub const MAX_SEARCH_PARTS: usize = 26;

/// Path of a region, from country down to an optional district
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionPath {
    pub country: String,
    pub region: String,
    pub city: String,
    pub district: Option<String>,
}

impl RegionPath {
    /// Create a city-level path
    pub fn new(country: impl Into<String>, region: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            region: region.into(),
            city: city.into(),
            district: None,
        }
    }

    /// Narrow the path to a district
    pub fn district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    fn segments(&self) -> Vec<&str> {
        [&self.country, &self.region, &self.city]
            .into_iter()
            .map(String::as_str)
            .chain(self.district.as_deref())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Client for the weather data API
///
/// Registries are injected so that every component subscribing to the same
/// resources shares them.
pub struct WeatherApi {
    base: Url,
    client: Arc<UpstreamClient>,
    conditions: Arc<ResourceRegistry<Conditions>>,
    regions: Arc<ResourceRegistry<RegionUpdate>>,
}

impl WeatherApi {
    /// Create an API client from explicit parts
    pub fn new(
        base: Url,
        client: Arc<UpstreamClient>,
        conditions: Arc<ResourceRegistry<Conditions>>,
        regions: Arc<ResourceRegistry<RegionUpdate>>,
    ) -> Self {
        Self {
            base,
            client,
            conditions,
            regions,
        }
    }

    /// Create an API client with its own upstream client and registries
    pub fn connect(base: &str, config: RegistryConfig) -> Result<Self> {
        Ok(Self::new(
            Url::parse(base)?,
            Arc::new(UpstreamClient::new()?),
            Arc::new(ResourceRegistry::with_config(config.clone())),
            Arc::new(ResourceRegistry::with_config(config)),
        ))
    }

    /// Registry of station condition feeds
    pub fn conditions_registry(&self) -> &Arc<ResourceRegistry<Conditions>> {
        &self.conditions
    }

    /// Registry of region and location feeds
    pub fn regions_registry(&self) -> &Arc<ResourceRegistry<RegionUpdate>> {
        &self.regions
    }

    /// Current conditions of a station
    pub async fn station_conditions(&self, server: &str, station: &str) -> Result<Conditions> {
        let url = self.url(&["station", server, station, "conditions"])?;
        self.client.fetch_json(&ResourceKey::get(url)).await
    }

    /// Metadata of a station
    pub async fn station_info(&self, server: &str, station: &str) -> Result<StationInfo> {
        let url = self.url(&["station", server, station, "info"])?;
        self.client.fetch_json(&ResourceKey::get(url)).await
    }

    /// Live condition updates of a station
    pub async fn station_condition_updates(
        &self,
        server: &str,
        station: &str,
    ) -> Result<Subscription<Conditions>> {
        let url = self.url(&["station", server, station, "conditions", "updates"])?;
        Ok(self.live(&self.conditions, url).await)
    }

    /// Live rapid-weather condition updates of a station
    pub async fn station_rapid_condition_updates(
        &self,
        server: &str,
        station: &str,
    ) -> Result<Subscription<Conditions>> {
        let url = self.url(&["station", server, station, "conditions", "rapid"])?;
        Ok(self.live(&self.conditions, url).await)
    }

    /// Aggregated conditions of a region
    pub async fn region_conditions(&self, region: &RegionPath) -> Result<RegionUpdate> {
        let url = self.url(&self.region_segments(&["region", "conditions"], region))?;
        self.client.fetch_json(&ResourceKey::get(url)).await
    }

    /// Live aggregated conditions of a region
    pub async fn region_updates(&self, region: &RegionPath) -> Result<Subscription<RegionUpdate>> {
        let url = self.url(&self.region_segments(&["region", "conditions", "updates"], region))?;
        Ok(self.live(&self.regions, url).await)
    }

    /// Search regions by name parts, most general first
    ///
    /// Parts are sent as query keys `a` through `z`, so at most
    /// [`MAX_SEARCH_PARTS`] are accepted.
    pub async fn search_regions(&self, parts: &[&str]) -> Result<Vec<Region>> {
        let url = self.search_url(parts)?;
        self.client.fetch_json(&ResourceKey::get(url)).await
    }

    /// Aggregated conditions around a coordinate
    pub async fn location_conditions(&self, lat: f64, lon: f64) -> Result<RegionUpdate> {
        let url = self.location_url(&["location", "conditions"], lat, lon)?;
        self.client.fetch_json(&ResourceKey::get(url)).await
    }

    /// Live aggregated conditions around a coordinate
    pub async fn location_updates(&self, lat: f64, lon: f64) -> Result<Subscription<RegionUpdate>> {
        let url = self.location_url(&["location", "conditions", "updates"], lat, lon)?;
        Ok(self.live(&self.regions, url).await)
    }

    /// Station closest to a coordinate
    pub async fn nearest_station(&self, lat: f64, lon: f64) -> Result<StationInfo> {
        let url = self.location_url(&["location", "nearest"], lat, lon)?;
        self.client.fetch_json(&ResourceKey::get(url)).await
    }

    async fn live<T>(&self, registry: &ResourceRegistry<T>, url: Url) -> Subscription<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let key = ResourceKey::get(url);
        let source: Arc<dyn Source> = self.client.clone();
        let max_event_size = self.client.config().max_event_size;

        registry
            .subscribe(&key, || {
                ResourceConnection::json(key.clone(), source).with_max_event_size(max_event_size)
            })
            .await
    }

    fn region_segments<'a>(&self, prefix: &[&'a str], region: &'a RegionPath) -> Vec<&'a str> {
        let mut segments = prefix.to_vec();
        segments.extend(region.segments());
        segments
    }

    fn search_url(&self, parts: &[&str]) -> Result<Url> {
        if parts.len() > MAX_SEARCH_PARTS {
            return Err(Error::InvalidRequest(format!(
                "region search takes at most {} parts, got {}",
                MAX_SEARCH_PARTS,
                parts.len()
            )));
        }

        let mut url = self.url(&["region", "search"])?;
        {
            let mut query = url.query_pairs_mut();
            for (letter, part) in ('a'..='z').zip(parts) {
                query.append_pair(&letter.to_string(), part);
            }
        }
        Ok(url)
    }

    fn location_url(&self, segments: &[&str], lat: f64, lon: f64) -> Result<Url> {
        let mut url = self.url(segments)?;
        url.query_pairs_mut()
            .append_pair("lat", &format!("{:.14}", lat))
            .append_pair("lon", &format!("{:.14}", lon));
        Ok(url)
    }

    /// Join path segments onto the base URL, with a trailing slash
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }
}
