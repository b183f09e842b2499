//! Extract ingestion: three ordered passes, staging promotion, quarantine
//! and backfill.
//!
//! Nodes load first, then ways, then relations — each pass consumes lookup
//! tables the earlier passes populated. Ownership moves between staging maps
//! as dependents claim entities: a node referenced by a way leaves the free
//! table for the claimed table, a way referenced by a relation likewise. An
//! entity whose dependencies are missing is quarantined rather than dropped,
//! and a [`ReferenceLookup`] may repair it before the store is sealed.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info, warn};
use thiserror::Error;

use geo::Geometry;
use geomap_core::{
    Amenity, EntityKind, GeometryError, MemberKind, Node, Relation, RelationFeature, Road,
    SpatialStore, StoreContents, Tags, Way, WayFeature, relation_geometry, way_geometry,
};

use crate::backfill::{FetchedWay, ReferenceLookup};

mod xml;

pub use xml::{ParseError, RawExtract, parse_extract, parse_str};

/// Fetch attempts per missing reference before giving up.
const BACKFILL_ATTEMPTS: usize = 2;

/// Fatal loading failures. Everything recoverable lands in the
/// [`LoadReport`] instead.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The extract could not be parsed at all.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A way kept out of the store because node references are missing.
#[derive(Debug, Clone, PartialEq)]
pub struct QuarantinedWay {
    /// The raw way record.
    pub way: Way,
    /// Node ids that could not be resolved.
    pub missing_nodes: Vec<i64>,
}

/// A relation kept out of the store because member ways are missing.
#[derive(Debug, Clone, PartialEq)]
pub struct QuarantinedRelation {
    /// The raw relation record.
    pub relation: Relation,
    /// Way ids that could not be resolved.
    pub missing_ways: Vec<i64>,
}

/// An entity excluded from the store because its geometry failed to build.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidGeometryRecord {
    /// Kind of the offending entity.
    pub kind: EntityKind,
    /// Identifier of the offending entity.
    pub id: i64,
    /// Human-readable failure reason.
    pub reason: String,
}

/// Diagnostics of one load run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Node elements parsed.
    pub nodes: u64,
    /// Way elements parsed.
    pub ways: u64,
    /// Relation elements parsed.
    pub relations: u64,
    /// Amenity views built.
    pub amenities: usize,
    /// Road views built.
    pub roads: usize,
    /// Elements skipped over unparsable numeric attributes.
    pub skipped_elements: u64,
    /// Nodes merged in through backfill.
    pub backfilled_nodes: u64,
    /// Ways merged in through backfill.
    pub backfilled_ways: u64,
    /// Ways still quarantined when the store was sealed.
    pub invalid_ways: Vec<QuarantinedWay>,
    /// Relations still quarantined when the store was sealed.
    pub invalid_relations: Vec<QuarantinedRelation>,
    /// Entities excluded over geometry failures.
    pub invalid_geometries: Vec<InvalidGeometryRecord>,
}

/// A sealed store together with the diagnostics of its load.
#[derive(Debug)]
pub struct LoadOutcome {
    /// The immutable spatial store.
    pub store: SpatialStore,
    /// Diagnostics of the load run.
    pub report: LoadReport,
}

/// Extract loader with optional reference backfill.
///
/// # Examples
/// ```no_run
/// use std::path::Path;
/// use geomap_data::Loader;
///
/// # fn main() -> Result<(), geomap_data::LoadError> {
/// let outcome = Loader::new().load_path(Path::new("extract.osm"))?;
/// println!("{} amenities", outcome.report.amenities);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Loader<'a> {
    lookup: Option<&'a dyn ReferenceLookup>,
}

impl<'a> Loader<'a> {
    /// Create a loader without backfill.
    #[must_use]
    pub fn new() -> Self {
        Self { lookup: None }
    }

    /// Attach a reference lookup for quarantine backfill.
    #[must_use]
    pub fn with_lookup(mut self, lookup: &'a dyn ReferenceLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Load an extract from disk.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when the document cannot be parsed; per-entity
    /// problems are reported, not raised.
    pub fn load_path(&self, path: &Path) -> Result<LoadOutcome, LoadError> {
        Ok(self.run(parse_extract(path)?))
    }

    /// Load an extract held in memory.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when the document cannot be parsed.
    pub fn load_str(&self, source: &str) -> Result<LoadOutcome, LoadError> {
        Ok(self.run(parse_str(source)?))
    }

    fn run(&self, extract: RawExtract) -> LoadOutcome {
        let mut staging = Staging::default();
        let mut report = LoadReport {
            nodes: extract.nodes.len() as u64,
            ways: extract.ways.len() as u64,
            relations: extract.relations.len() as u64,
            skipped_elements: extract.skipped,
            ..LoadReport::default()
        };

        for node in extract.nodes {
            staging.admit_node(node);
        }
        for way in extract.ways {
            staging.admit_way(way);
        }
        for relation in extract.relations {
            staging.admit_relation(relation);
        }

        if let Some(lookup) = self.lookup {
            staging.backfill_ways(lookup, &mut report);
            staging.backfill_relations(lookup, &mut report);
        }

        staging.seal(report)
    }
}

/// Mutable load-time state; sealed into a [`SpatialStore`] at the end.
#[derive(Default)]
struct Staging {
    nodes: HashMap<i64, Node>,
    way_nodes: HashMap<i64, Node>,
    ways: HashMap<i64, Way>,
    relation_ways: HashMap<i64, Way>,
    relations: HashMap<i64, Relation>,
    amenities: HashMap<i64, Amenity>,
    roads: HashMap<i64, Road>,
    way_geometries: HashMap<i64, Geometry<f64>>,
    relation_features: Vec<RelationFeature>,
    quarantined_ways: Vec<QuarantinedWay>,
    quarantined_relations: Vec<QuarantinedRelation>,
    invalid_geometries: Vec<InvalidGeometryRecord>,
}

impl Staging {
    fn admit_node(&mut self, node: Node) {
        if node.tags.contains_key("amenity") {
            self.amenities.insert(
                node.id,
                Amenity {
                    id: node.id,
                    geometry: Geometry::Point(node.coord().into()),
                    tags: node.tags.clone(),
                },
            );
        }
        if node.tags.contains_key("highway") {
            self.roads.insert(
                node.id,
                Road {
                    id: node.id,
                    geometry: Geometry::Point(node.coord().into()),
                    tags: node.tags.clone(),
                    node_refs: Vec::new(),
                },
            );
        }
        self.nodes.insert(node.id, node);
    }

    fn node_known(&self, id: i64) -> bool {
        self.nodes.contains_key(&id) || self.way_nodes.contains_key(&id)
    }

    fn way_known(&self, id: i64) -> bool {
        self.ways.contains_key(&id) || self.relation_ways.contains_key(&id)
    }

    fn admit_way(&mut self, way: Way) {
        let missing: Vec<i64> = way
            .node_refs
            .iter()
            .copied()
            .filter(|id| !self.node_known(*id))
            .collect();
        if !missing.is_empty() {
            debug!("way {} quarantined: {} missing node(s)", way.id, missing.len());
            self.quarantined_ways.push(QuarantinedWay {
                way,
                missing_nodes: missing,
            });
            return;
        }

        // Claim the nodes: they move from the free table to the claimed one.
        for node_id in &way.node_refs {
            if let Some(node) = self.nodes.remove(node_id) {
                self.way_nodes.insert(*node_id, node);
            }
        }

        let geometry = match way_geometry(&way, &self.way_nodes) {
            Ok(geometry) => geometry,
            Err(error) => {
                self.record_invalid(EntityKind::Way, way.id, &error);
                return;
            }
        };

        if way.tags.contains_key("amenity") {
            self.amenities.insert(
                way.id,
                Amenity {
                    id: way.id,
                    geometry: geometry.clone(),
                    tags: way.tags.clone(),
                },
            );
        }
        if way.tags.contains_key("highway") {
            self.roads.insert(
                way.id,
                Road {
                    id: way.id,
                    geometry: geometry.clone(),
                    tags: way.tags.clone(),
                    node_refs: way.node_refs.clone(),
                },
            );
        }
        self.way_geometries.insert(way.id, geometry);
        self.ways.insert(way.id, way);
    }

    fn admit_relation(&mut self, relation: Relation) {
        let missing: Vec<i64> = relation
            .members
            .iter()
            .filter(|member| member.kind == MemberKind::Way)
            .map(|member| member.ref_id)
            .filter(|id| !self.way_known(*id))
            .collect();
        if !missing.is_empty() {
            debug!(
                "relation {} quarantined: {} missing way(s)",
                relation.id,
                missing.len()
            );
            self.quarantined_relations.push(QuarantinedRelation {
                relation,
                missing_ways: missing,
            });
            return;
        }

        // Claim the member ways.
        for member in &relation.members {
            if member.kind != MemberKind::Way {
                continue;
            }
            if let Some(way) = self.ways.remove(&member.ref_id) {
                self.relation_ways.insert(member.ref_id, way);
            }
        }

        if wants_geometry(&relation.tags) {
            match relation_geometry(&relation, &self.relation_ways, &self.way_nodes) {
                Ok(geometry) => {
                    if relation.tags.contains_key("amenity") {
                        self.amenities.insert(
                            relation.id,
                            Amenity {
                                id: relation.id,
                                geometry: Geometry::MultiPolygon(geometry.clone()),
                                tags: relation.tags.clone(),
                            },
                        );
                    }
                    if relation.tags.contains_key("highway") {
                        self.roads.insert(
                            relation.id,
                            Road {
                                id: relation.id,
                                geometry: Geometry::MultiPolygon(geometry.clone()),
                                tags: relation.tags.clone(),
                                node_refs: Vec::new(),
                            },
                        );
                    }
                    self.relation_features.push(RelationFeature {
                        id: relation.id,
                        tags: relation.tags.clone(),
                        geometry,
                    });
                }
                Err(error) => self.record_invalid(EntityKind::Relation, relation.id, &error),
            }
        }
        self.relations.insert(relation.id, relation);
    }

    fn record_invalid(&mut self, kind: EntityKind, id: i64, error: &GeometryError) {
        warn!("invalid geometry: {error}");
        self.invalid_geometries.push(InvalidGeometryRecord {
            kind,
            id,
            reason: error.to_string(),
        });
    }

    fn backfill_ways(&mut self, lookup: &dyn ReferenceLookup, report: &mut LoadReport) {
        let quarantined = std::mem::take(&mut self.quarantined_ways);
        for entry in quarantined {
            // Promotion already happened through another route: nothing to do.
            if self.way_known(entry.way.id) {
                continue;
            }
            let mut unresolved = Vec::new();
            for node_id in &entry.missing_nodes {
                if self.node_known(*node_id) {
                    continue;
                }
                match fetch_node_with_retry(lookup, *node_id) {
                    Some(node) => {
                        self.way_nodes.insert(node.id, node);
                        report.backfilled_nodes += 1;
                    }
                    None => unresolved.push(*node_id),
                }
            }
            if unresolved.is_empty() {
                info!("backfill recovered way {}", entry.way.id);
                self.admit_way(entry.way);
            } else {
                self.quarantined_ways.push(QuarantinedWay {
                    way: entry.way,
                    missing_nodes: unresolved,
                });
            }
        }
    }

    fn backfill_relations(&mut self, lookup: &dyn ReferenceLookup, report: &mut LoadReport) {
        let quarantined = std::mem::take(&mut self.quarantined_relations);
        for entry in quarantined {
            if self.relations.contains_key(&entry.relation.id) {
                continue;
            }
            let mut unresolved = Vec::new();
            for way_id in &entry.missing_ways {
                if self.way_known(*way_id) {
                    continue;
                }
                match fetch_way_with_retry(lookup, *way_id) {
                    Some(fetched) => {
                        self.merge_fetched_way(fetched);
                        report.backfilled_ways += 1;
                    }
                    None => unresolved.push(*way_id),
                }
            }
            if unresolved.is_empty() {
                info!("backfill recovered relation {}", entry.relation.id);
                self.admit_relation(entry.relation);
            } else {
                self.quarantined_relations.push(QuarantinedRelation {
                    relation: entry.relation,
                    missing_ways: unresolved,
                });
            }
        }
    }

    /// Merge a fetched way straight into the claimed tables: it only exists
    /// because a relation references it.
    fn merge_fetched_way(&mut self, fetched: FetchedWay) {
        for node in fetched.nodes {
            if !self.node_known(node.id) {
                self.way_nodes.insert(node.id, node);
            }
        }
        self.relation_ways.insert(fetched.way.id, fetched.way);
    }

    fn seal(self, mut report: LoadReport) -> LoadOutcome {
        let way_geometries = self.way_geometries;
        let way_features: Vec<WayFeature> = self
            .ways
            .values()
            .filter_map(|way| {
                way_geometries.get(&way.id).map(|geometry| WayFeature {
                    id: way.id,
                    tags: way.tags.clone(),
                    geometry: geometry.clone(),
                })
            })
            .collect();

        report.amenities = self.amenities.len();
        report.roads = self.roads.len();
        report.invalid_ways = self.quarantined_ways;
        report.invalid_relations = self.quarantined_relations;
        report.invalid_geometries = self.invalid_geometries;

        info!(
            "extract loaded: {} nodes, {} ways, {} relations ({} amenities, {} roads)",
            report.nodes, report.ways, report.relations, report.amenities, report.roads
        );
        if !report.invalid_ways.is_empty() || !report.invalid_relations.is_empty() {
            warn!(
                "{} way(s) and {} relation(s) remain quarantined",
                report.invalid_ways.len(),
                report.invalid_relations.len()
            );
        }

        let contents = StoreContents {
            nodes: self.nodes,
            way_nodes: self.way_nodes,
            ways: self.ways,
            relation_ways: self.relation_ways,
            relations: self.relations,
            amenities: self.amenities,
            roads: self.roads,
            way_features,
            relation_features: self.relation_features,
        };
        LoadOutcome {
            store: SpatialStore::from_contents(contents),
            report,
        }
    }
}

/// Whether a relation's tagging calls for geometry assembly.
fn wants_geometry(tags: &Tags) -> bool {
    tags.values().any(|value| value == "multipolygon")
        || tags.contains_key("building")
        || tags.contains_key("amenity")
        || tags.contains_key("highway")
        || tags.contains_key("landuse")
}

fn fetch_node_with_retry(lookup: &dyn ReferenceLookup, id: i64) -> Option<Node> {
    for attempt in 1..=BACKFILL_ATTEMPTS {
        match lookup.fetch_node(id) {
            Ok(found) => return found,
            Err(error) => warn!("backfill fetch of node {id} failed (attempt {attempt}): {error}"),
        }
    }
    None
}

fn fetch_way_with_retry(lookup: &dyn ReferenceLookup, id: i64) -> Option<FetchedWay> {
    for attempt in 1..=BACKFILL_ATTEMPTS {
        match lookup.fetch_way(id) {
            Ok(found) => return found,
            Err(error) => warn!("backfill fetch of way {id} failed (attempt {attempt}): {error}"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backfill::LookupError;
    use geo::Area;
    use rstest::rstest;
    use std::cell::Cell;

    /// 3x3 degree square (nodes 1-4) with a 1x1 inner square (nodes 5-8).
    const SQUARES: &str = r#"<osm>
  <node id="1" lat="0.0" lon="0.0"/>
  <node id="2" lat="0.0" lon="3.0"/>
  <node id="3" lat="3.0" lon="3.0"/>
  <node id="4" lat="3.0" lon="0.0"/>
  <node id="5" lat="1.0" lon="1.0"/>
  <node id="6" lat="1.0" lon="2.0"/>
  <node id="7" lat="2.0" lon="2.0"/>
  <node id="8" lat="2.0" lon="1.0"/>
  <way id="10">
    <nd ref="1"/><nd ref="2"/><nd ref="3"/><nd ref="4"/><nd ref="1"/>
  </way>
  <way id="11">
    <nd ref="5"/><nd ref="6"/><nd ref="7"/><nd ref="8"/><nd ref="5"/>
  </way>
  <relation id="20">
    <member type="way" ref="10" role="outline"/>
    <member type="way" ref="11" role="part"/>
    <tag k="building" v="yes"/>
    <tag k="amenity" v="townhall"/>
  </relation>
</osm>"#;

    #[derive(Default)]
    struct StubLookup {
        nodes: HashMap<i64, Node>,
        ways: HashMap<i64, FetchedWay>,
        node_calls: Cell<u64>,
        way_calls: Cell<u64>,
    }

    impl ReferenceLookup for StubLookup {
        fn fetch_node(&self, id: i64) -> Result<Option<Node>, LookupError> {
            self.node_calls.set(self.node_calls.get() + 1);
            Ok(self.nodes.get(&id).cloned())
        }

        fn fetch_way(&self, id: i64) -> Result<Option<FetchedWay>, LookupError> {
            self.way_calls.set(self.way_calls.get() + 1);
            Ok(self.ways.get(&id).cloned())
        }
    }

    #[rstest]
    fn load_builds_views_and_counts() {
        let source = r#"<osm>
  <node id="1" lat="0.5" lon="0.5">
    <tag k="amenity" v="cafe"/>
  </node>
  <node id="2" lat="0.6" lon="0.6">
    <tag k="highway" v="crossing"/>
  </node>
</osm>"#;
        let outcome = Loader::new().load_str(source).unwrap();
        assert_eq!(outcome.report.nodes, 2);
        assert_eq!(outcome.report.amenities, 1);
        assert_eq!(outcome.report.roads, 1);
        assert!(outcome.store.amenity(1).is_some());
        assert!(outcome.store.road(2).is_some());
        assert!(outcome.store.amenity(2).is_none());
    }

    #[rstest]
    fn way_claims_its_nodes_from_the_free_table() {
        let source = r#"<osm>
  <node id="1" lat="0.0" lon="0.0"/>
  <node id="2" lat="1.0" lon="1.0"/>
  <node id="3" lat="2.0" lon="2.0"/>
  <way id="10">
    <nd ref="1"/><nd ref="2"/>
  </way>
</osm>"#;
        let outcome = Loader::new().load_str(source).unwrap();
        let contents = outcome.store.contents();
        assert!(!contents.nodes.contains_key(&1));
        assert!(contents.way_nodes.contains_key(&1));
        assert!(contents.way_nodes.contains_key(&2));
        // Node 3 was never claimed.
        assert!(contents.nodes.contains_key(&3));
        // Lookups still resolve across both tables.
        assert!(outcome.store.node(1).is_some());
    }

    #[rstest]
    fn way_with_missing_node_is_quarantined() {
        let source = r#"<osm>
  <node id="1" lat="0.0" lon="0.0"/>
  <way id="10">
    <nd ref="1"/><nd ref="99"/>
    <tag k="highway" v="primary"/>
  </way>
</osm>"#;
        let outcome = Loader::new().load_str(source).unwrap();
        assert!(outcome.store.way(10).is_none());
        assert!(outcome.store.road(10).is_none());
        assert_eq!(outcome.report.invalid_ways.len(), 1);
        assert_eq!(outcome.report.invalid_ways[0].missing_nodes, vec![99]);
        // The present node was not claimed by the quarantined way.
        assert!(outcome.store.contents().nodes.contains_key(&1));
    }

    #[rstest]
    fn backfill_promotes_a_quarantined_way() {
        let source = r#"<osm>
  <node id="1" lat="0.0" lon="0.0"/>
  <way id="10">
    <nd ref="1"/><nd ref="99"/>
    <tag k="highway" v="primary"/>
  </way>
</osm>"#;
        let lookup = StubLookup {
            nodes: HashMap::from([(99, Node::new(99, 1.0, 1.0, Tags::new()))]),
            ..StubLookup::default()
        };
        let outcome = Loader::new().with_lookup(&lookup).load_str(source).unwrap();
        assert!(outcome.store.way(10).is_some());
        assert!(outcome.store.road(10).is_some());
        assert!(outcome.report.invalid_ways.is_empty());
        assert_eq!(outcome.report.backfilled_nodes, 1);
    }

    #[rstest]
    fn backfill_fetches_a_shared_missing_node_once() {
        let source = r#"<osm>
  <node id="1" lat="0.0" lon="0.0"/>
  <node id="2" lat="2.0" lon="2.0"/>
  <way id="10">
    <nd ref="1"/><nd ref="99"/>
  </way>
  <way id="11">
    <nd ref="2"/><nd ref="99"/>
  </way>
</osm>"#;
        let lookup = StubLookup {
            nodes: HashMap::from([(99, Node::new(99, 1.0, 1.0, Tags::new()))]),
            ..StubLookup::default()
        };
        let outcome = Loader::new().with_lookup(&lookup).load_str(source).unwrap();
        assert!(outcome.store.way(10).is_some());
        assert!(outcome.store.way(11).is_some());
        // The second promotion found the node already merged: no refetch.
        assert_eq!(lookup.node_calls.get(), 1);
        assert_eq!(outcome.report.backfilled_nodes, 1);
    }

    #[rstest]
    fn unresolvable_way_stays_quarantined() {
        let source = r#"<osm>
  <way id="10">
    <nd ref="98"/><nd ref="99"/>
  </way>
</osm>"#;
        let lookup = StubLookup::default();
        let outcome = Loader::new().with_lookup(&lookup).load_str(source).unwrap();
        assert!(outcome.store.way(10).is_none());
        assert_eq!(outcome.report.invalid_ways.len(), 1);
        assert_eq!(
            outcome.report.invalid_ways[0].missing_nodes,
            vec![98, 99]
        );
    }

    #[rstest]
    fn relation_claims_ways_and_backfills_missing_members() {
        let source = r#"<osm>
  <node id="1" lat="0.0" lon="0.0"/>
  <node id="2" lat="0.0" lon="3.0"/>
  <node id="3" lat="3.0" lon="3.0"/>
  <node id="4" lat="3.0" lon="0.0"/>
  <way id="10">
    <nd ref="1"/><nd ref="2"/><nd ref="3"/><nd ref="4"/><nd ref="1"/>
  </way>
  <relation id="20">
    <member type="way" ref="10" role="outer"/>
    <member type="way" ref="11" role="outer"/>
    <tag k="type" v="multipolygon"/>
    <tag k="landuse" v="forest"/>
  </relation>
</osm>"#;
        let fetched = FetchedWay {
            way: Way::new(11, Tags::new(), vec![5, 6, 7, 8, 5]),
            nodes: vec![
                Node::new(5, 10.0, 10.0, Tags::new()),
                Node::new(6, 10.0, 13.0, Tags::new()),
                Node::new(7, 13.0, 13.0, Tags::new()),
                Node::new(8, 13.0, 10.0, Tags::new()),
                Node::new(5, 10.0, 10.0, Tags::new()),
            ],
        };
        let lookup = StubLookup {
            ways: HashMap::from([(11, fetched)]),
            ..StubLookup::default()
        };
        let outcome = Loader::new().with_lookup(&lookup).load_str(source).unwrap();
        assert!(outcome.report.invalid_relations.is_empty());
        assert_eq!(outcome.report.backfilled_ways, 1);
        assert_eq!(outcome.store.relation_features().len(), 1);
        // Both member ways ended up claimed by the relation.
        let contents = outcome.store.contents();
        assert!(contents.relation_ways.contains_key(&10));
        assert!(contents.relation_ways.contains_key(&11));
        assert!(!contents.ways.contains_key(&10));
    }

    #[rstest]
    fn building_relation_area_subtracts_its_part() {
        let outcome = Loader::new().load_str(SQUARES).unwrap();
        let amenity = outcome.store.amenity(20).expect("relation amenity");
        let Geometry::MultiPolygon(polygons) = &amenity.geometry else {
            panic!("expected a multipolygon");
        };
        // 3x3 outline minus 1x1 part.
        assert!((polygons.unsigned_area() - 8.0).abs() < 1e-9);
    }

    #[rstest]
    fn geometry_failure_excludes_the_relation_from_views() {
        // Member 10 is an open chain: the outer run can never close.
        let source = r#"<osm>
  <node id="1" lat="0.0" lon="0.0"/>
  <node id="2" lat="0.0" lon="3.0"/>
  <node id="3" lat="3.0" lon="3.0"/>
  <way id="10">
    <nd ref="1"/><nd ref="2"/><nd ref="3"/>
  </way>
  <relation id="20">
    <member type="way" ref="10" role="outer"/>
    <tag k="type" v="multipolygon"/>
    <tag k="amenity" v="park"/>
  </relation>
</osm>"#;
        let outcome = Loader::new().load_str(source).unwrap();
        assert!(outcome.store.amenity(20).is_none());
        assert!(outcome.store.relation_features().is_empty());
        assert_eq!(outcome.report.invalid_geometries.len(), 1);
        assert_eq!(outcome.report.invalid_geometries[0].id, 20);
        // The raw record is retained for diagnostics.
        assert!(outcome.store.relation(20).is_some());
    }

    #[rstest]
    fn claimed_way_is_absent_from_renderable_features() {
        let outcome = Loader::new().load_str(SQUARES).unwrap();
        // Both ways were claimed by the relation, so no free way features.
        assert!(outcome.store.way_features().is_empty());
        assert!(outcome.store.way(10).is_some());
    }

    #[rstest]
    fn entity_lookup_spans_all_kinds() {
        use geomap_core::{Entity, EntityKind};

        let outcome = Loader::new().load_str(SQUARES).unwrap();
        let node = outcome.store.entity(EntityKind::Node, 5);
        assert!(matches!(node, Some(Entity::Node(n)) if n.id == 5));
        let way = outcome.store.entity(EntityKind::Way, 11);
        assert!(matches!(way, Some(Entity::Way(w)) if w.is_closed()));
        assert!(outcome.store.entity(EntityKind::Relation, 999).is_none());
    }
}
