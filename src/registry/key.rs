//! Resource keys
//!
//! A key identifies one upstream subscription target. Every subscriber whose
//! key compares equal shares a single upstream connection.

use reqwest::Method;
use url::Url;

use crate::error::Result;

/// Unique identifier for an upstream resource (method + normalized URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    method: Method,
    url: Url,
}

impl ResourceKey {
    /// Create a key for a GET request
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a key for an arbitrary method
    ///
    /// Query pairs are sorted and the fragment dropped, so `?lat=1&lon=2`
    /// and `?lon=2&lat=1` name the same resource.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url: normalize(url),
        }
    }

    /// Parse a GET key from a URL string
    pub fn parse(url: &str) -> Result<Self> {
        Ok(Self::get(Url::parse(url)?))
    }

    /// Request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Normalized request URL
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

fn normalize(mut url: Url) -> Url {
    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    url
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_query_order_does_not_matter() {
        let a = ResourceKey::parse("http://api.local/location/conditions/updates/?lat=1.5&lon=2").unwrap();
        let b = ResourceKey::parse("http://api.local/location/conditions/updates/?lon=2&lat=1.5").unwrap();

        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_host_case_and_default_port_normalized() {
        let a = ResourceKey::parse("HTTP://API.local:80/station/x/y/").unwrap();
        let b = ResourceKey::parse("http://api.local/station/x/y/").unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_fragment_and_empty_query_dropped() {
        let key = ResourceKey::parse("http://api.local/region/?#top").unwrap();

        assert_eq!(key.url().as_str(), "http://api.local/region/");
    }

    #[test]
    fn test_different_paths_differ() {
        let a = ResourceKey::parse("http://api.local/station/a/b/conditions/updates/").unwrap();
        let b = ResourceKey::parse("http://api.local/station/a/b/conditions/rapid/").unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_method_is_part_of_key() {
        let url = Url::parse("http://api.local/x/").unwrap();

        assert_ne!(ResourceKey::get(url.clone()), ResourceKey::new(Method::POST, url));
    }

    #[test]
    fn test_display() {
        let key = ResourceKey::parse("http://api.local/x/?b=2&a=1").unwrap();

        assert_eq!(key.to_string(), "GET http://api.local/x/?a=1&b=2");
    }

    #[test]
    fn test_invalid_url() {
        assert!(ResourceKey::parse("not a url").is_err());
    }
}
