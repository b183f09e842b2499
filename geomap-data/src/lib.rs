//! Extract ingestion and reference backfill for the geomap engine.
//!
//! This crate turns an OSM XML extract into a sealed
//! [`geomap_core::SpatialStore`]: parsing, the three ordered ingestion
//! passes with staging promotion and quarantine, and the best-effort
//! Overpass backfill for entities whose dependencies are missing.

#![forbid(unsafe_code)]

pub mod backfill;
pub mod ingest;

pub use backfill::{
    DEFAULT_OVERPASS_URL, FetchedWay, LookupBuildError, LookupError, OverpassLookup,
    ReferenceLookup,
};
pub use ingest::{
    InvalidGeometryRecord, LoadError, LoadOutcome, LoadReport, Loader, ParseError,
    QuarantinedRelation, QuarantinedWay, RawExtract, parse_extract, parse_str,
};
