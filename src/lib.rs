//! Facade crate for the geomap engine.
//!
//! Re-exports the domain types of the member crates and exposes the
//! operation surface the request gateway calls: spatial queries over
//! amenities and roads, land-use aggregation, and raster tile rendering.
//! [`MapEngine`] owns the sealed store and the renderer; it is constructed
//! once at startup and shared by reference afterwards.

#![forbid(unsafe_code)]

use std::path::Path;

use geo::{Coord, Rect};
use log::debug;

pub use geomap_core::{
    Amenity, Entity, EntityKind, GeometryError, LocalProjection, Member, MemberKind, MemberRole,
    Node, Relation, Road, SpatialStore, StoreContents, Tags, UsageEntry, UsageReport, Way,
};
pub use geomap_data::{
    FetchedWay, LoadError, LoadOutcome, LoadReport, Loader, LookupError, OverpassLookup,
    ParseError, ReferenceLookup,
};
pub use geomap_render::{Layer, RenderError, TILE_SIZE, TileRenderer};

/// Spatial selector of an amenity query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArea {
    /// Everything intersecting an axis-aligned lon/lat rectangle.
    BoundingBox(Rect<f64>),
    /// Everything within a radius of a point.
    PointRadius {
        /// Query point, WGS84 degrees (`x = longitude`).
        center: Coord<f64>,
        /// Inclusive search radius in metres.
        radius_m: f64,
    },
}

/// Weighting requested for a route computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteWeighting {
    /// Fastest route.
    Time,
    /// Shortest route.
    Distance,
}

/// The loaded engine: sealed store plus tile renderer.
#[derive(Debug)]
pub struct MapEngine {
    store: SpatialStore,
    renderer: TileRenderer,
    report: LoadReport,
}

impl MapEngine {
    /// Load an extract from disk and seal the engine.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when the extract cannot be parsed.
    pub fn from_extract(path: &Path) -> Result<Self, LoadError> {
        Ok(Self::from_outcome(Loader::new().load_path(path)?))
    }

    /// Load an extract from disk with reference backfill.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when the extract cannot be parsed.
    pub fn from_extract_with_lookup(
        path: &Path,
        lookup: &dyn ReferenceLookup,
    ) -> Result<Self, LoadError> {
        Ok(Self::from_outcome(
            Loader::new().with_lookup(lookup).load_path(path)?,
        ))
    }

    /// Load an extract held in memory.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when the extract cannot be parsed.
    pub fn from_source(source: &str) -> Result<Self, LoadError> {
        Ok(Self::from_outcome(Loader::new().load_str(source)?))
    }

    /// Wrap an already-loaded outcome.
    #[must_use]
    pub fn from_outcome(outcome: LoadOutcome) -> Self {
        Self {
            store: outcome.store,
            renderer: TileRenderer::new(),
            report: outcome.report,
        }
    }

    /// The sealed spatial store.
    #[must_use]
    pub const fn store(&self) -> &SpatialStore {
        &self.store
    }

    /// Diagnostics of the load that built this engine.
    #[must_use]
    pub const fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Amenities in an area, optionally restricted to an amenity type.
    ///
    /// Returns `None` when nothing matches, mirroring the gateway's
    /// not-found outcome.
    #[must_use]
    pub fn amenities(&self, area: &QueryArea, type_filter: Option<&str>) -> Option<Vec<Amenity>> {
        let found: Vec<Amenity> = match area {
            QueryArea::BoundingBox(bbox) => self
                .store
                .amenities_in(bbox, type_filter)
                .into_iter()
                .cloned()
                .collect(),
            QueryArea::PointRadius { center, radius_m } => self
                .store
                .amenities_near(*center, *radius_m, type_filter)
                .into_iter()
                .map(|(amenity, _)| amenity.clone())
                .collect(),
        };
        (!found.is_empty()).then_some(found)
    }

    /// Exact amenity lookup.
    #[must_use]
    pub fn amenity_by_id(&self, id: i64) -> Option<Amenity> {
        self.store.amenity(id).cloned()
    }

    /// Roads intersecting a bounding box, optionally restricted to a highway
    /// type. Returns `None` when nothing matches.
    #[must_use]
    pub fn roads(&self, bbox: &Rect<f64>, type_filter: Option<&str>) -> Option<Vec<Road>> {
        let found: Vec<Road> = self
            .store
            .roads_in(bbox, type_filter)
            .into_iter()
            .cloned()
            .collect();
        (!found.is_empty()).then_some(found)
    }

    /// Exact road lookup.
    #[must_use]
    pub fn road_by_id(&self, id: i64) -> Option<Road> {
        self.store.road(id).cloned()
    }

    /// Render a tile as PNG bytes. `layers` is the gateway's comma-separated
    /// layer list; unknown names are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when the tile address is invalid or encoding
    /// fails.
    pub fn tile(&self, zoom: u8, x: u32, y: u32, layers: &str) -> Result<Vec<u8>, RenderError> {
        let layers = Layer::parse_list(layers);
        self.renderer.render_png(&self.store, zoom, x, y, &layers)
    }

    /// Aggregate land use inside a bounding box.
    #[must_use]
    pub fn usage(&self, bbox: &Rect<f64>) -> UsageReport {
        self.store.usage_in(bbox)
    }

    /// Route between two entities.
    ///
    /// Routing is not implemented in this engine; the operation exists for
    /// surface compatibility and always yields an empty route.
    #[must_use]
    pub fn route(&self, from: i64, to: i64, weighting: RouteWeighting) -> Vec<Road> {
        debug!("route request {from} -> {to} ({weighting:?}) answered with the empty stub");
        Vec::new()
    }
}
