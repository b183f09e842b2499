//! Core domain types for the geomap engine.
//!
//! This crate holds everything that is pure computation over the loaded
//! extract: the raw entity records, geometry construction (including
//! multipolygon ring assembly), the local metric projection, and the
//! immutable spatial store with its query operations. Ingestion and
//! rendering live in sibling crates; nothing here performs I/O.

#![forbid(unsafe_code)]

pub mod entity;
pub mod geometry;
pub mod projection;
pub mod store;

pub use entity::{Entity, EntityKind, Member, MemberKind, MemberRole, Node, Relation, Tags, Way};
pub use geometry::{GeometryError, MIN_RING_POINTS, merge_lines, relation_geometry, way_geometry};
pub use projection::{EARTH_RADIUS_M, LocalProjection, METERS_PER_DEGREE};
pub use store::{
    Amenity, RelationFeature, Road, SpatialStore, StoreContents, UsageEntry, UsageReport,
    WayFeature,
};
