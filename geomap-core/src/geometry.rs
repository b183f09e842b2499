//! Geometry construction for ways and relations.
//!
//! Ways classify by point count and closure: a closed chain with at least
//! [`MIN_RING_POINTS`] coordinates is a polygon, a single point collapses to
//! a point, anything else is a line. Relations assemble multipolygons from
//! their ordered member list; the run-based ring merge below is the load-time
//! heart of the engine.
//!
//! Every constructor returns a [`Result`]: an entity that cannot form a
//! geometry is reported, never silently dropped.

use std::collections::HashMap;

use geo::{Contains, Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use log::warn;
use thiserror::Error;

use crate::entity::{MemberRole, Node, Relation, Way};

/// Minimum coordinate count (first == last included) for a closed ring.
pub const MIN_RING_POINTS: usize = 4;

/// Reasons a way or relation fails to produce a geometry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// The way references no nodes at all.
    #[error("way {way} references no nodes")]
    EmptyWay {
        /// Offending way id.
        way: i64,
    },
    /// A node reference could not be resolved.
    #[error("way {way} references missing node {node}")]
    MissingNode {
        /// Way holding the dangling reference.
        way: i64,
        /// Unresolved node id.
        node: i64,
    },
    /// A relation member's way could not be resolved.
    #[error("relation {relation} references missing way {member}")]
    MissingMember {
        /// Relation holding the dangling reference.
        relation: i64,
        /// Unresolved way id.
        member: i64,
    },
    /// A closed-ring member arrived while open segments were still pending;
    /// the pending segments can never close.
    #[error("relation {relation}: {role} run left unmerged segments behind a closed ring")]
    DanglingSegments {
        /// Offending relation id.
        relation: i64,
        /// Role of the failed run.
        role: MemberRole,
    },
    /// A same-role run ended without its merged segments forming a ring.
    #[error("relation {relation}: {role} members do not close into a ring")]
    OpenRun {
        /// Offending relation id.
        relation: i64,
        /// Role of the failed run.
        role: MemberRole,
    },
    /// A same-role run merged into several disjoint chains.
    #[error("relation {relation}: {role} members merge into {pieces} disjoint chains")]
    DisjointRun {
        /// Offending relation id.
        relation: i64,
        /// Role of the failed run.
        role: MemberRole,
        /// Number of disjoint merged chains.
        pieces: usize,
    },
    /// A building member that must be a ring is not closed.
    #[error("relation {relation}: member way {member} is not a closed ring")]
    NotARing {
        /// Offending relation id.
        relation: i64,
        /// Member way id.
        member: i64,
    },
    /// A building relation without an `outline` member.
    #[error("relation {relation} has no outline member")]
    MissingOutline {
        /// Offending relation id.
        relation: i64,
    },
    /// The relation carries neither a multipolygon nor a building tagging.
    #[error("relation {relation} is neither a multipolygon nor a building")]
    Unsupported {
        /// Offending relation id.
        relation: i64,
    },
    /// Assembly finished without a single shell ring.
    #[error("relation {relation} produced no shell ring")]
    NoShell {
        /// Offending relation id.
        relation: i64,
    },
}

/// Resolve a way's node references into coordinates, in reference order.
fn way_coords(way: &Way, nodes: &HashMap<i64, Node>) -> Result<Vec<Coord<f64>>, GeometryError> {
    way.node_refs
        .iter()
        .map(|node_id| {
            nodes
                .get(node_id)
                .map(Node::coord)
                .ok_or(GeometryError::MissingNode {
                    way: way.id,
                    node: *node_id,
                })
        })
        .collect()
}

/// Build a way's geometry.
///
/// Classification: a chain whose first and last node references coincide and
/// which spans at least [`MIN_RING_POINTS`] coordinates is a polygon; a single
/// referenced node collapses to a point; everything else is a line.
///
/// # Errors
///
/// Returns [`GeometryError`] when the way is empty or references a node that
/// is absent from `nodes`.
pub fn way_geometry(
    way: &Way,
    nodes: &HashMap<i64, Node>,
) -> Result<Geometry<f64>, GeometryError> {
    let coords = way_coords(way, nodes)?;
    match coords.len() {
        0 => Err(GeometryError::EmptyWay { way: way.id }),
        1 => Ok(Geometry::Point(Point::from(coords[0]))),
        len if len >= MIN_RING_POINTS && way.is_closed() => Ok(Geometry::Polygon(Polygon::new(
            LineString::new(coords),
            Vec::new(),
        ))),
        _ => Ok(Geometry::LineString(LineString::new(coords))),
    }
}

/// Build a relation's multipolygon geometry.
///
/// Relations whose tag values contain `multipolygon` run the ordered-member
/// ring assembly; relations tagged `building` use the simplified
/// outline/part pairing. Anything else is unsupported.
///
/// # Errors
///
/// Returns [`GeometryError`] identifying the relation when any member run
/// fails to resolve to exactly one closed ring, when a member reference
/// dangles, or when the tagging is unsupported.
pub fn relation_geometry(
    relation: &Relation,
    ways: &HashMap<i64, Way>,
    nodes: &HashMap<i64, Node>,
) -> Result<MultiPolygon<f64>, GeometryError> {
    if relation.tags.values().any(|value| value == "multipolygon") {
        assemble_multipolygon(relation, ways, nodes)
    } else if relation.tags.contains_key("building") {
        building_footprint(relation, ways, nodes)
    } else {
        Err(GeometryError::Unsupported {
            relation: relation.id,
        })
    }
}

/// Walk the member list left to right, cutting it into same-role runs and
/// pairing each finished shell with the holes accumulated since the last one.
fn assemble_multipolygon(
    relation: &Relation,
    ways: &HashMap<i64, Way>,
    nodes: &HashMap<i64, Node>,
) -> Result<MultiPolygon<f64>, GeometryError> {
    let members = &relation.members;
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    let mut shell: Option<LineString<f64>> = None;
    let mut holes: Vec<LineString<f64>> = Vec::new();

    let mut index = 0;
    while index < members.len() {
        let role = members[index].role.clone();
        if !matches!(role, MemberRole::Outer | MemberRole::Inner) {
            index += 1;
            continue;
        }
        let (ring, last) = assemble_run(relation, index, &role, ways, nodes)?;
        match role {
            MemberRole::Outer => {
                if let Some(previous) = shell.take() {
                    polygons.push(finish_polygon(relation.id, previous, &mut holes));
                }
                shell = Some(ring);
            }
            MemberRole::Inner => holes.push(ring),
            _ => {}
        }
        index = last + 1;
    }

    if let Some(previous) = shell.take() {
        polygons.push(finish_polygon(relation.id, previous, &mut holes));
    }
    if polygons.is_empty() {
        return Err(GeometryError::NoShell {
            relation: relation.id,
        });
    }
    Ok(MultiPolygon::new(polygons))
}

/// Consume consecutive members sharing `role` until they yield one closed
/// ring. Returns the ring and the index of the last member consumed.
fn assemble_run(
    relation: &Relation,
    start: usize,
    role: &MemberRole,
    ways: &HashMap<i64, Way>,
    nodes: &HashMap<i64, Node>,
) -> Result<(LineString<f64>, usize), GeometryError> {
    let relation_id = relation.id;
    let members = &relation.members;
    let mut segments: Vec<LineString<f64>> = Vec::new();

    let mut index = start;
    while index < members.len() && members[index].role == *role {
        let member = &members[index];
        let way = ways
            .get(&member.ref_id)
            .ok_or(GeometryError::MissingMember {
                relation: relation_id,
                member: member.ref_id,
            })?;
        let line = LineString::new(way_coords(way, nodes)?);

        if is_ring(&line) {
            if segments.is_empty() {
                return Ok((line, index));
            }
            // An already-closed member cannot join the pending open chain.
            return Err(GeometryError::DanglingSegments {
                relation: relation_id,
                role: role.clone(),
            });
        }

        segments.push(line);
        let merged = merge_lines(&segments);
        if merged.len() == 1 && is_ring(&merged[0]) {
            let ring = merged.into_iter().next().ok_or(GeometryError::OpenRun {
                relation: relation_id,
                role: role.clone(),
            })?;
            return Ok((ring, index));
        }
        index += 1;
    }

    // The run ended (role change or end of members) without closing.
    let merged = merge_lines(&segments);
    if merged.len() > 1 {
        Err(GeometryError::DisjointRun {
            relation: relation_id,
            role: role.clone(),
            pieces: merged.len(),
        })
    } else {
        Err(GeometryError::OpenRun {
            relation: relation_id,
            role: role.clone(),
        })
    }
}

/// Attach the accumulated holes that the shell geometrically contains and
/// emit the finished polygon. Holes outside the shell are dropped.
fn finish_polygon(
    relation_id: i64,
    shell: LineString<f64>,
    holes: &mut Vec<LineString<f64>>,
) -> Polygon<f64> {
    let shell_polygon = Polygon::new(shell, Vec::new());
    let mut contained = Vec::new();
    let mut rejected = 0_usize;
    for hole in holes.drain(..) {
        if shell_polygon.contains(&Polygon::new(hole.clone(), Vec::new())) {
            contained.push(hole);
        } else {
            rejected += 1;
        }
    }
    if rejected > 0 {
        warn!("relation {relation_id}: dropped {rejected} hole ring(s) outside their shell");
    }
    let (exterior, _) = shell_polygon.into_inner();
    Polygon::new(exterior, contained)
}

/// Simplified pairing for building footprints: the `outline` member is the
/// shell, every `part` member is a hole. No ring merging applies.
fn building_footprint(
    relation: &Relation,
    ways: &HashMap<i64, Way>,
    nodes: &HashMap<i64, Node>,
) -> Result<MultiPolygon<f64>, GeometryError> {
    let mut shell: Option<LineString<f64>> = None;
    let mut parts: Vec<LineString<f64>> = Vec::new();

    for member in &relation.members {
        let ring = match member.role {
            MemberRole::Outline | MemberRole::Part => {
                member_ring(relation.id, member.ref_id, ways, nodes)?
            }
            _ => continue,
        };
        match member.role {
            MemberRole::Outline => shell = Some(ring),
            MemberRole::Part => parts.push(ring),
            _ => {}
        }
    }

    let shell = shell.ok_or(GeometryError::MissingOutline {
        relation: relation.id,
    })?;
    Ok(MultiPolygon::new(vec![Polygon::new(shell, parts)]))
}

/// Resolve a member way that must already be a closed ring.
fn member_ring(
    relation_id: i64,
    member_id: i64,
    ways: &HashMap<i64, Way>,
    nodes: &HashMap<i64, Node>,
) -> Result<LineString<f64>, GeometryError> {
    let way = ways.get(&member_id).ok_or(GeometryError::MissingMember {
        relation: relation_id,
        member: member_id,
    })?;
    let line = LineString::new(way_coords(way, nodes)?);
    if is_ring(&line) {
        Ok(line)
    } else {
        Err(GeometryError::NotARing {
            relation: relation_id,
            member: member_id,
        })
    }
}

/// Whether the chain closes on itself with enough coordinates to bound area.
fn is_ring(line: &LineString<f64>) -> bool {
    line.0.len() >= MIN_RING_POINTS && line.is_closed()
}

/// Merge polylines end-to-end on exactly matching endpoints.
///
/// Chains are joined in either orientation; coordinates shared between two
/// chains appear once in the joined result. The output is one chain per
/// connected component of the endpoint graph.
#[must_use]
pub fn merge_lines(lines: &[LineString<f64>]) -> Vec<LineString<f64>> {
    let mut pool: Vec<Vec<Coord<f64>>> = lines
        .iter()
        .filter(|line| line.0.len() >= 2)
        .map(|line| line.0.clone())
        .collect();
    let mut merged = Vec::new();

    while let Some(mut chain) = pool.pop() {
        loop {
            let mut extended = false;
            let mut index = 0;
            while index < pool.len() {
                if let Some(joined) = join_chains(&chain, &pool[index]) {
                    chain = joined;
                    pool.swap_remove(index);
                    extended = true;
                } else {
                    index += 1;
                }
            }
            if !extended {
                break;
            }
        }
        merged.push(LineString::new(chain));
    }
    merged
}

/// Join two chains if they share an endpoint, reversing as needed.
fn join_chains(chain: &[Coord<f64>], other: &[Coord<f64>]) -> Option<Vec<Coord<f64>>> {
    let (chain_first, chain_last) = (*chain.first()?, *chain.last()?);
    let (other_first, other_last) = (*other.first()?, *other.last()?);

    if chain_last == other_first {
        let mut joined = chain.to_vec();
        joined.extend_from_slice(&other[1..]);
        Some(joined)
    } else if chain_last == other_last {
        let mut joined = chain.to_vec();
        joined.extend(other.iter().rev().skip(1).copied());
        Some(joined)
    } else if chain_first == other_last {
        let mut joined = other.to_vec();
        joined.extend_from_slice(&chain[1..]);
        Some(joined)
    } else if chain_first == other_first {
        let mut joined: Vec<Coord<f64>> = other.iter().rev().copied().collect();
        joined.extend_from_slice(&chain[1..]);
        Some(joined)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Member, MemberKind, Tags};
    use geo::Area;
    use rstest::rstest;

    fn node(id: i64, lat: f64, lon: f64) -> Node {
        Node::new(id, lat, lon, Tags::new())
    }

    fn grid_nodes() -> HashMap<i64, Node> {
        // A 3x3 degree neighbourhood around the origin plus an inner square.
        let mut nodes = HashMap::new();
        for (id, lat, lon) in [
            (1, 0.0, 0.0),
            (2, 0.0, 3.0),
            (3, 3.0, 3.0),
            (4, 3.0, 0.0),
            (5, 1.0, 1.0),
            (6, 1.0, 2.0),
            (7, 2.0, 2.0),
            (8, 2.0, 1.0),
            (9, 10.0, 10.0),
            (10, 10.0, 13.0),
            (11, 13.0, 13.0),
            (12, 13.0, 10.0),
        ] {
            nodes.insert(id, node(id, lat, lon));
        }
        nodes
    }

    fn way(id: i64, refs: &[i64]) -> Way {
        Way::new(id, Tags::new(), refs.to_vec())
    }

    fn member(ref_id: i64, role: MemberRole) -> Member {
        Member::new(ref_id, role, MemberKind::Way)
    }

    #[rstest]
    fn closed_way_with_enough_points_is_a_polygon() {
        let nodes = grid_nodes();
        let geometry = way_geometry(&way(100, &[1, 2, 3, 4, 1]), &nodes).unwrap();
        assert!(matches!(geometry, Geometry::Polygon(_)));
    }

    #[rstest]
    fn open_way_is_a_line() {
        let nodes = grid_nodes();
        let geometry = way_geometry(&way(100, &[1, 2, 3]), &nodes).unwrap();
        assert!(matches!(geometry, Geometry::LineString(_)));
    }

    #[rstest]
    fn single_node_way_collapses_to_a_point() {
        let nodes = grid_nodes();
        let geometry = way_geometry(&way(100, &[5]), &nodes).unwrap();
        assert!(matches!(geometry, Geometry::Point(_)));
    }

    #[rstest]
    fn closed_triangle_is_still_a_line() {
        // First == last but only three distinct coordinates: below the ring
        // minimum, so it stays a line.
        let nodes = grid_nodes();
        let geometry = way_geometry(&way(100, &[1, 2, 1]), &nodes).unwrap();
        assert!(matches!(geometry, Geometry::LineString(_)));
    }

    #[rstest]
    fn empty_way_is_an_error() {
        let nodes = grid_nodes();
        let error = way_geometry(&way(100, &[]), &nodes).unwrap_err();
        assert_eq!(error, GeometryError::EmptyWay { way: 100 });
    }

    #[rstest]
    fn missing_node_reference_is_reported() {
        let nodes = grid_nodes();
        let error = way_geometry(&way(100, &[1, 99]), &nodes).unwrap_err();
        assert_eq!(error, GeometryError::MissingNode { way: 100, node: 99 });
    }

    #[rstest]
    fn outer_with_contained_inner_yields_one_polygon_with_one_hole() {
        let nodes = grid_nodes();
        let mut ways = HashMap::new();
        ways.insert(200, way(200, &[1, 2, 3, 4, 1]));
        ways.insert(201, way(201, &[5, 6, 7, 8, 5]));
        let relation = Relation::new(
            300,
            Tags::from([("type".to_owned(), "multipolygon".to_owned())]),
            vec![
                member(200, MemberRole::Outer),
                member(201, MemberRole::Inner),
            ],
        );

        let geometry = relation_geometry(&relation, &ways, &nodes).unwrap();
        assert_eq!(geometry.0.len(), 1);
        assert_eq!(geometry.0[0].interiors().len(), 1);
        // 3x3 shell minus 1x1 hole.
        assert!((geometry.unsigned_area() - 8.0).abs() < 1e-9);
    }

    #[rstest]
    fn two_disjoint_outers_yield_two_polygons() {
        let nodes = grid_nodes();
        let mut ways = HashMap::new();
        ways.insert(200, way(200, &[1, 2, 3, 4, 1]));
        ways.insert(201, way(201, &[9, 10, 11, 12, 9]));
        let relation = Relation::new(
            300,
            Tags::from([("type".to_owned(), "multipolygon".to_owned())]),
            vec![
                member(200, MemberRole::Outer),
                member(201, MemberRole::Outer),
            ],
        );

        let geometry = relation_geometry(&relation, &ways, &nodes).unwrap();
        assert_eq!(geometry.0.len(), 2);
        assert!(geometry.0.iter().all(|p| p.interiors().is_empty()));
    }

    #[rstest]
    fn split_outer_run_merges_into_one_shell() {
        let nodes = grid_nodes();
        let mut ways = HashMap::new();
        // Two open halves of the 3x3 square sharing endpoints 1 and 3.
        ways.insert(200, way(200, &[1, 2, 3]));
        ways.insert(201, way(201, &[3, 4, 1]));
        let relation = Relation::new(
            300,
            Tags::from([("type".to_owned(), "multipolygon".to_owned())]),
            vec![
                member(200, MemberRole::Outer),
                member(201, MemberRole::Outer),
            ],
        );

        let geometry = relation_geometry(&relation, &ways, &nodes).unwrap();
        assert_eq!(geometry.0.len(), 1);
        assert!((geometry.unsigned_area() - 9.0).abs() < 1e-9);
    }

    #[rstest]
    fn unmergeable_run_fails_the_relation() {
        let nodes = grid_nodes();
        let mut ways = HashMap::new();
        // Two open fragments with no shared endpoint.
        ways.insert(200, way(200, &[1, 2]));
        ways.insert(201, way(201, &[3, 4]));
        let relation = Relation::new(
            300,
            Tags::from([("type".to_owned(), "multipolygon".to_owned())]),
            vec![
                member(200, MemberRole::Outer),
                member(201, MemberRole::Outer),
            ],
        );

        let error = relation_geometry(&relation, &ways, &nodes).unwrap_err();
        assert_eq!(
            error,
            GeometryError::DisjointRun {
                relation: 300,
                role: MemberRole::Outer,
                pieces: 2,
            }
        );
    }

    #[rstest]
    fn hole_outside_its_shell_is_dropped() {
        let nodes = grid_nodes();
        let mut ways = HashMap::new();
        ways.insert(200, way(200, &[1, 2, 3, 4, 1]));
        // A far-away ring claiming to be this shell's hole.
        ways.insert(201, way(201, &[9, 10, 11, 12, 9]));
        let relation = Relation::new(
            300,
            Tags::from([("type".to_owned(), "multipolygon".to_owned())]),
            vec![
                member(200, MemberRole::Outer),
                member(201, MemberRole::Inner),
            ],
        );

        let geometry = relation_geometry(&relation, &ways, &nodes).unwrap();
        assert_eq!(geometry.0.len(), 1);
        assert!(geometry.0[0].interiors().is_empty());
    }

    #[rstest]
    fn building_outline_and_part_subtract() {
        let nodes = grid_nodes();
        let mut ways = HashMap::new();
        ways.insert(200, way(200, &[1, 2, 3, 4, 1]));
        ways.insert(201, way(201, &[5, 6, 7, 8, 5]));
        let relation = Relation::new(
            300,
            Tags::from([("building".to_owned(), "yes".to_owned())]),
            vec![
                member(200, MemberRole::Outline),
                member(201, MemberRole::Part),
            ],
        );

        let geometry = relation_geometry(&relation, &ways, &nodes).unwrap();
        assert!((geometry.unsigned_area() - 8.0).abs() < 1e-9);
    }

    #[rstest]
    fn untagged_relation_is_unsupported() {
        let nodes = grid_nodes();
        let ways = HashMap::new();
        let relation = Relation::new(300, Tags::new(), Vec::new());
        let error = relation_geometry(&relation, &ways, &nodes).unwrap_err();
        assert_eq!(error, GeometryError::Unsupported { relation: 300 });
    }

    #[rstest]
    fn merge_joins_reversed_chains() {
        let a = LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]);
        let b = LineString::from(vec![(1.0, 1.0), (1.0, 0.0)]);
        let merged = merge_lines(&[a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].0.len(), 3);
    }

    #[rstest]
    fn merge_keeps_disjoint_chains_apart() {
        let a = LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]);
        let b = LineString::from(vec![(5.0, 5.0), (6.0, 5.0)]);
        let merged = merge_lines(&[a, b]);
        assert_eq!(merged.len(), 2);
    }
}
