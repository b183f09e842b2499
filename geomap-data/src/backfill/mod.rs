//! Best-effort backfill of missing references from an external lookup
//! service.
//!
//! Quarantined ways and relations name the ids they could not resolve; the
//! loader asks a [`ReferenceLookup`] for those ids and re-attempts promotion.
//! The trait keeps the loader testable; [`OverpassLookup`] is the production
//! implementation. Calls are synchronous with bounded timeouts, and the
//! loader retries each fetch a small fixed number of times, never
//! indefinitely.

use thiserror::Error;

use geomap_core::{Node, Way};

mod overpass;

pub use overpass::{DEFAULT_OVERPASS_URL, LookupBuildError, OverpassLookup};

/// A way fetched from the lookup service together with the node records it
/// references.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedWay {
    /// The way record.
    pub way: Way,
    /// Coordinate records for the way's node references.
    pub nodes: Vec<Node>,
}

/// Transport and decoding failures of a reference lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The request could not be completed.
    #[error("lookup request {query} failed")]
    Request {
        /// Query that was attempted.
        query: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },
    /// The response body could not be decoded.
    #[error("lookup response for {query} could not be decoded")]
    Decode {
        /// Query that was attempted.
        query: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },
    /// The service answered but the element payload is unusable.
    #[error("lookup result for way {id} lacks member geometry")]
    Incomplete {
        /// Way id whose payload is unusable.
        id: i64,
    },
}

/// External node/way lookup used to repair quarantined entities.
///
/// `Ok(None)` means the service answered authoritatively that the id does
/// not exist; errors are transient and worth retrying within the loader's
/// retry budget.
pub trait ReferenceLookup {
    /// Fetch a node record by id.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] on transport or decoding failures.
    fn fetch_node(&self, id: i64) -> Result<Option<Node>, LookupError>;

    /// Fetch a way record, with its node coordinates, by id.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] on transport or decoding failures.
    fn fetch_way(&self, id: i64) -> Result<Option<FetchedWay>, LookupError>;
}
