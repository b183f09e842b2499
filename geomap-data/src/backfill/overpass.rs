//! Overpass API client for the reference lookup.
//!
//! Queries are the interpreter's JSON form: `[out:json];node(<id>);out;` for
//! nodes and `[out:json];way(<id>);out geom;` for ways — `out geom` inlines
//! the member coordinates so a single round trip repairs a way.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;

use geomap_core::{Node, Tags, Way};

use super::{FetchedWay, LookupError, ReferenceLookup};

/// Public Overpass interpreter endpoint.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Bounded connect timeout for lookup requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounded read timeout for lookup requests.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures constructing the lookup client.
#[derive(Debug, Error)]
pub enum LookupBuildError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

/// Blocking Overpass-backed [`ReferenceLookup`].
#[derive(Debug)]
pub struct OverpassLookup {
    client: Client,
    base_url: String,
}

impl OverpassLookup {
    /// Create a lookup against the public Overpass endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`LookupBuildError`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, LookupBuildError> {
        Self::with_base_url(DEFAULT_OVERPASS_URL)
    }

    /// Create a lookup against a specific interpreter endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`LookupBuildError`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, LookupBuildError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .map_err(LookupBuildError::HttpClient)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn run_query(&self, query: &str) -> Result<OverpassResponse, LookupError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("data", query)])
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|source| LookupError::Request {
                query: query.to_owned(),
                source,
            })?;
        response.json().map_err(|source| LookupError::Decode {
            query: query.to_owned(),
            source,
        })
    }
}

impl ReferenceLookup for OverpassLookup {
    fn fetch_node(&self, id: i64) -> Result<Option<Node>, LookupError> {
        let query = format!("[out:json];node({id});out;");
        let response = self.run_query(&query)?;
        Ok(response.elements.into_iter().find_map(|element| {
            match (element.kind.as_str(), element.lat, element.lon) {
                ("node", Some(lat), Some(lon)) => Some(Node::new(
                    element.id,
                    lat,
                    lon,
                    element.tags.unwrap_or_default(),
                )),
                _ => None,
            }
        }))
    }

    fn fetch_way(&self, id: i64) -> Result<Option<FetchedWay>, LookupError> {
        let query = format!("[out:json];way({id});out geom;");
        let response = self.run_query(&query)?;
        let Some(element) = response
            .elements
            .into_iter()
            .find(|element| element.kind == "way")
        else {
            return Ok(None);
        };

        let node_refs = element.nodes.unwrap_or_default();
        let coords = element.geometry.unwrap_or_default();
        if node_refs.is_empty() || node_refs.len() != coords.len() {
            return Err(LookupError::Incomplete { id });
        }
        let nodes = node_refs
            .iter()
            .zip(&coords)
            .map(|(node_id, coord)| Node::new(*node_id, coord.lat, coord.lon, Tags::new()))
            .collect();
        Ok(Some(FetchedWay {
            way: Way::new(element.id, element.tags.unwrap_or_default(), node_refs),
            nodes,
        }))
    }
}

/// Top-level Overpass interpreter response.
#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

/// One element of an Overpass response.
#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    tags: Option<HashMap<String, String>>,
    nodes: Option<Vec<i64>>,
    geometry: Option<Vec<OverpassCoord>>,
}

/// Inline member coordinate produced by `out geom`.
#[derive(Debug, Deserialize)]
struct OverpassCoord {
    lat: f64,
    lon: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialise_node_response() {
        let json = r#"{
            "version": 0.6,
            "elements": [
                {"type": "node", "id": 42, "lat": 47.05, "lon": 15.42,
                 "tags": {"amenity": "fountain"}}
            ]
        }"#;
        let response: OverpassResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.elements.len(), 1);
        let element = &response.elements[0];
        assert_eq!(element.kind, "node");
        assert_eq!(element.id, 42);
        assert_eq!(element.lat, Some(47.05));
        assert_eq!(
            element.tags.as_ref().and_then(|t| t.get("amenity")),
            Some(&"fountain".to_owned())
        );
    }

    #[test]
    fn deserialise_way_response_with_geometry() {
        let json = r#"{
            "elements": [
                {"type": "way", "id": 7, "nodes": [1, 2],
                 "geometry": [{"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 1.0}],
                 "tags": {"highway": "residential"}}
            ]
        }"#;
        let response: OverpassResponse = serde_json::from_str(json).unwrap();
        let element = &response.elements[0];
        assert_eq!(element.nodes.as_deref(), Some(&[1, 2][..]));
        assert_eq!(element.geometry.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn empty_response_deserialises() {
        let response: OverpassResponse = serde_json::from_str("{}").unwrap();
        assert!(response.elements.is_empty());
    }
}
