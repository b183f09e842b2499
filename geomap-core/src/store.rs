//! Immutable post-load collections and the spatial queries over them.
//!
//! The store is built exactly once per load from the collections the loader
//! hands over, and is read-only afterwards: queries and rendering may run
//! concurrently without locking. Bounding-box queries pre-filter through an
//! R-tree over geometry envelopes and confirm every candidate with an exact
//! intersection test, so envelope-only false positives never escape.

use std::collections::HashMap;

use geo::{
    Area, BooleanOps, BoundingRect, Contains, Coord, Geometry, Intersects, Line, MapCoords,
    MultiPolygon, Point, Polygon, Rect,
};
use rayon::prelude::*;
use rstar::{AABB, RTree, RTreeObject};

use crate::entity::{Entity, EntityKind, Node, Relation, Tags, Way};
use crate::projection::LocalProjection;

/// A point of interest derived from an `amenity`-tagged entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Amenity {
    /// Identifier of the source entity.
    pub id: i64,
    /// Geometry built at load time.
    pub geometry: Geometry<f64>,
    /// Tags of the source entity.
    pub tags: Tags,
}

/// A road derived from a `highway`-tagged entity.
///
/// `node_refs` is the ordered constituent node list for way roads; node and
/// relation roads carry an empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct Road {
    /// Identifier of the source entity.
    pub id: i64,
    /// Geometry built at load time.
    pub geometry: Geometry<f64>,
    /// Tags of the source entity.
    pub tags: Tags,
    /// Ordered constituent node ids.
    pub node_refs: Vec<i64>,
}

/// A resolved way with its built geometry, ready for rendering and usage
/// aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct WayFeature {
    /// Identifier of the source way.
    pub id: i64,
    /// Tags of the source way.
    pub tags: Tags,
    /// Geometry built at load time.
    pub geometry: Geometry<f64>,
}

/// A relation with its assembled multipolygon geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationFeature {
    /// Identifier of the source relation.
    pub id: i64,
    /// Tags of the source relation.
    pub tags: Tags,
    /// Shells-with-holes assembled at load time.
    pub geometry: MultiPolygon<f64>,
}

/// One land-use aggregation entry of a [`UsageReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct UsageEntry {
    /// Land-use tag value.
    pub kind: String,
    /// Intersected area inside the query envelope, square metres.
    pub area_m2: f64,
    /// Fraction of the query envelope's area.
    pub share: f64,
}

/// Result of a land-use aggregation query.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageReport {
    /// Area of the query envelope in square metres.
    pub bbox_area_m2: f64,
    /// Per-land-use entries, ascending by share.
    pub entries: Vec<UsageEntry>,
}

/// The collections the loader hands over when a load completes.
///
/// The split node and way maps reflect the staging promotion during loading:
/// a node claimed by a way lives in `way_nodes`, a way claimed by a relation
/// lives in `relation_ways`; nothing is referenced from two maps at once.
#[derive(Debug, Clone, Default)]
pub struct StoreContents {
    /// Nodes not referenced by any way.
    pub nodes: HashMap<i64, Node>,
    /// Nodes claimed by ways.
    pub way_nodes: HashMap<i64, Node>,
    /// Ways not referenced by any relation.
    pub ways: HashMap<i64, Way>,
    /// Ways claimed by relations.
    pub relation_ways: HashMap<i64, Way>,
    /// All resolved relations.
    pub relations: HashMap<i64, Relation>,
    /// Amenity views, one per `amenity`-tagged entity.
    pub amenities: HashMap<i64, Amenity>,
    /// Road views, one per `highway`-tagged entity.
    pub roads: HashMap<i64, Road>,
    /// Renderable views over resolved free ways.
    pub way_features: Vec<WayFeature>,
    /// Renderable views over relations with valid multipolygon geometry.
    pub relation_features: Vec<RelationFeature>,
}

#[derive(Debug, Clone)]
struct EnvelopeEntry {
    id: i64,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for EnvelopeEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn envelope_entries<'a, I>(items: I) -> Vec<EnvelopeEntry>
where
    I: Iterator<Item = (i64, &'a Geometry<f64>)>,
{
    items
        .filter_map(|(id, geometry)| {
            geometry.bounding_rect().map(|rect| EnvelopeEntry {
                id,
                envelope: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            })
        })
        .collect()
}

/// Read-only spatial access to the loaded extract.
#[derive(Debug)]
pub struct SpatialStore {
    contents: StoreContents,
    amenity_index: RTree<EnvelopeEntry>,
    road_index: RTree<EnvelopeEntry>,
}

impl SpatialStore {
    /// Build the store and its envelope indices from the loader's output.
    #[must_use]
    pub fn from_contents(contents: StoreContents) -> Self {
        let amenity_index = RTree::bulk_load(envelope_entries(
            contents.amenities.iter().map(|(id, a)| (*id, &a.geometry)),
        ));
        let road_index = RTree::bulk_load(envelope_entries(
            contents.roads.iter().map(|(id, r)| (*id, &r.geometry)),
        ));
        Self {
            contents,
            amenity_index,
            road_index,
        }
    }

    /// The underlying collections, for diagnostics and rendering.
    #[must_use]
    pub const fn contents(&self) -> &StoreContents {
        &self.contents
    }

    /// Exact amenity lookup.
    #[must_use]
    pub fn amenity(&self, id: i64) -> Option<&Amenity> {
        self.contents.amenities.get(&id)
    }

    /// Exact road lookup.
    #[must_use]
    pub fn road(&self, id: i64) -> Option<&Road> {
        self.contents.roads.get(&id)
    }

    /// Raw node lookup across both staging tables.
    #[must_use]
    pub fn node(&self, id: i64) -> Option<&Node> {
        self.contents
            .nodes
            .get(&id)
            .or_else(|| self.contents.way_nodes.get(&id))
    }

    /// Raw way lookup across both staging tables.
    #[must_use]
    pub fn way(&self, id: i64) -> Option<&Way> {
        self.contents
            .ways
            .get(&id)
            .or_else(|| self.contents.relation_ways.get(&id))
    }

    /// Raw relation lookup.
    #[must_use]
    pub fn relation(&self, id: i64) -> Option<&Relation> {
        self.contents.relations.get(&id)
    }

    /// Raw entity lookup by kind and id; `None` when absent or invalid.
    #[must_use]
    pub fn entity(&self, kind: EntityKind, id: i64) -> Option<Entity> {
        match kind {
            EntityKind::Node => self.node(id).cloned().map(Entity::Node),
            EntityKind::Way => self.way(id).cloned().map(Entity::Way),
            EntityKind::Relation => self.relation(id).cloned().map(Entity::Relation),
        }
    }

    /// Renderable way views.
    #[must_use]
    pub fn way_features(&self) -> &[WayFeature] {
        &self.contents.way_features
    }

    /// Renderable relation views.
    #[must_use]
    pub fn relation_features(&self) -> &[RelationFeature] {
        &self.contents.relation_features
    }

    /// Number of amenity views held.
    #[must_use]
    pub fn amenity_count(&self) -> usize {
        self.contents.amenities.len()
    }

    /// Number of road views held.
    #[must_use]
    pub fn road_count(&self) -> usize {
        self.contents.roads.len()
    }

    /// Amenities whose geometry intersects `bbox` exactly, optionally
    /// restricted to an `amenity` tag value. Unordered.
    #[must_use]
    pub fn amenities_in(&self, bbox: &Rect<f64>, type_filter: Option<&str>) -> Vec<&Amenity> {
        let query = bbox.to_polygon();
        candidate_ids(&self.amenity_index, bbox)
            .into_iter()
            .filter_map(|id| self.contents.amenities.get(&id))
            .filter(|amenity| query.intersects(&amenity.geometry))
            .filter(|amenity| tag_matches(&amenity.tags, "amenity", type_filter))
            .collect()
    }

    /// Roads whose geometry intersects `bbox` exactly, optionally restricted
    /// to a `highway` tag value. Unordered.
    #[must_use]
    pub fn roads_in(&self, bbox: &Rect<f64>, type_filter: Option<&str>) -> Vec<&Road> {
        let query = bbox.to_polygon();
        candidate_ids(&self.road_index, bbox)
            .into_iter()
            .filter_map(|id| self.contents.roads.get(&id))
            .filter(|road| query.intersects(&road.geometry))
            .filter(|road| tag_matches(&road.tags, "highway", type_filter))
            .collect()
    }

    /// Amenities within `radius_m` metres of `point`, with their distances.
    ///
    /// Both the query point and each candidate geometry are reprojected into
    /// a local metric frame centred on the query point before the Euclidean
    /// distance is taken; the radius is inclusive. Sorted nearest-first.
    #[must_use]
    pub fn amenities_near(
        &self,
        point: Coord<f64>,
        radius_m: f64,
        type_filter: Option<&str>,
    ) -> Vec<(&Amenity, f64)> {
        let projection = LocalProjection::centered_on(point);
        let origin = projection.coord(point);
        let mut hits: Vec<(&Amenity, f64)> = self
            .contents
            .amenities
            .values()
            .filter(|amenity| tag_matches(&amenity.tags, "amenity", type_filter))
            .filter_map(|amenity| {
                let projected = projection.geometry(&amenity.geometry);
                let distance = point_geometry_distance(origin, &projected);
                (distance <= radius_m).then_some((amenity, distance))
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits
    }

    /// Aggregate land-use area inside `bbox`.
    ///
    /// Every `landuse`-tagged way and relation feature is reprojected and
    /// clipped against the reprojected envelope; per-type areas accumulate in
    /// parallel. Entries come back ascending by share of the envelope area.
    #[must_use]
    pub fn usage_in(&self, bbox: &Rect<f64>) -> UsageReport {
        let projection = LocalProjection::centered_on(bbox.center());
        let clip = MultiPolygon::new(vec![projection.rect(bbox).to_polygon()]);
        let bbox_area_m2 = clip.unsigned_area();

        let features: Vec<(&str, MultiPolygon<f64>)> = self
            .contents
            .way_features
            .iter()
            .filter_map(|feature| {
                feature
                    .tags
                    .get("landuse")
                    .and_then(|kind| polygonal(&feature.geometry).map(|mp| (kind.as_str(), mp)))
            })
            .chain(self.contents.relation_features.iter().filter_map(|feature| {
                feature
                    .tags
                    .get("landuse")
                    .map(|kind| (kind.as_str(), feature.geometry.clone()))
            }))
            .collect();

        let totals: HashMap<String, f64> = features
            .par_iter()
            .map(|(kind, polygons)| {
                let projected = polygons.map_coords(|coord| projection.coord(coord));
                (*kind, projected.intersection(&clip).unsigned_area())
            })
            .filter(|(_, area)| *area > 0.0)
            .fold(HashMap::new, |mut acc: HashMap<String, f64>, (kind, area)| {
                *acc.entry(kind.to_owned()).or_insert(0.0) += area;
                acc
            })
            .reduce(HashMap::new, |mut left, right| {
                for (kind, area) in right {
                    *left.entry(kind).or_insert(0.0) += area;
                }
                left
            });

        let mut entries: Vec<UsageEntry> = totals
            .into_iter()
            .map(|(kind, area_m2)| UsageEntry {
                kind,
                area_m2,
                share: area_m2 / bbox_area_m2,
            })
            .collect();
        entries.sort_by(|a, b| a.share.total_cmp(&b.share));

        UsageReport {
            bbox_area_m2,
            entries,
        }
    }
}

fn candidate_ids(index: &RTree<EnvelopeEntry>, bbox: &Rect<f64>) -> Vec<i64> {
    let envelope = AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y]);
    index
        .locate_in_envelope_intersecting(&envelope)
        .map(|entry| entry.id)
        .collect()
}

fn tag_matches(tags: &Tags, key: &str, wanted: Option<&str>) -> bool {
    wanted.is_none_or(|value| tags.get(key).is_some_and(|actual| actual == value))
}

/// The polygonal part of a geometry, if it has one.
fn polygonal(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Some(MultiPolygon::new(vec![polygon.clone()])),
        Geometry::MultiPolygon(polygons) => Some(polygons.clone()),
        _ => None,
    }
}

fn coord_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

fn point_segment_distance(point: Coord<f64>, segment: Line<f64>) -> f64 {
    let delta = segment.delta();
    let length_sq = delta.x * delta.x + delta.y * delta.y;
    if length_sq == 0.0 {
        return coord_distance(point, segment.start);
    }
    let t = ((point.x - segment.start.x) * delta.x + (point.y - segment.start.y) * delta.y)
        / length_sq;
    let t = t.clamp(0.0, 1.0);
    coord_distance(
        point,
        Coord {
            x: segment.start.x + t * delta.x,
            y: segment.start.y + t * delta.y,
        },
    )
}

fn point_polygon_distance(point: Coord<f64>, polygon: &Polygon<f64>) -> f64 {
    if polygon.contains(&Point::from(point)) {
        return 0.0;
    }
    polygon
        .exterior()
        .lines()
        .chain(polygon.interiors().iter().flat_map(|ring| ring.lines()))
        .map(|segment| point_segment_distance(point, segment))
        .fold(f64::INFINITY, f64::min)
}

/// Euclidean distance from a point to a geometry, in the coordinates both
/// are expressed in.
fn point_geometry_distance(point: Coord<f64>, geometry: &Geometry<f64>) -> f64 {
    match geometry {
        Geometry::Point(other) => coord_distance(point, other.0),
        Geometry::LineString(line) => line
            .lines()
            .map(|segment| point_segment_distance(point, segment))
            .fold(f64::INFINITY, f64::min),
        Geometry::Polygon(polygon) => point_polygon_distance(point, polygon),
        Geometry::MultiPolygon(polygons) => polygons
            .0
            .iter()
            .map(|polygon| point_polygon_distance(point, polygon))
            .fold(f64::INFINITY, f64::min),
        other => other
            .bounding_rect()
            .map_or(f64::INFINITY, |rect| {
                point_polygon_distance(point, &rect.to_polygon())
            }),
    }
}
