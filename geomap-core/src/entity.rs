//! Raw entity records reconstructed from a geographic extract.
//!
//! The three entity kinds mirror the source format: nodes carry coordinates,
//! ways carry an ordered node-reference list, relations carry an ordered
//! member list. Tags are free-form key/value pairs; duplicate keys are
//! last-write-wins, matching the parser's insertion behaviour.

use std::collections::HashMap;
use std::fmt;

use geo::Coord;

/// Free-form OpenStreetMap-style tags.
pub type Tags = HashMap<String, String>;

/// A single coordinate-bearing entity.
///
/// Coordinates are WGS84 degrees with `x = longitude`, `y = latitude`.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique identifier within the node kind.
    pub id: i64,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Tags attached to the node.
    pub tags: Tags,
}

impl Node {
    /// Construct a node record.
    #[must_use]
    pub fn new(id: i64, lat: f64, lon: f64, tags: Tags) -> Self {
        Self { id, lat, lon, tags }
    }

    /// The node's position with `x = longitude`, `y = latitude`.
    #[must_use]
    pub const fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// An ordered chain of node references.
///
/// The reference order defines the polyline; a way whose first and last
/// references coincide describes a ring.
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    /// Unique identifier within the way kind.
    pub id: i64,
    /// Tags attached to the way.
    pub tags: Tags,
    /// Ordered node references; insertion order is significant.
    pub node_refs: Vec<i64>,
}

impl Way {
    /// Construct a way record.
    #[must_use]
    pub fn new(id: i64, tags: Tags, node_refs: Vec<i64>) -> Self {
        Self {
            id,
            tags,
            node_refs,
        }
    }

    /// Whether the first and last node references coincide.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.node_refs.len() > 1 && self.node_refs.first() == self.node_refs.last()
    }
}

/// Entity kind referenced by a relation member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// References a node.
    Node,
    /// References a way.
    Way,
    /// References another relation.
    Relation,
}

impl MemberKind {
    /// Parse the source format's `type` attribute.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "node" => Some(Self::Node),
            "way" => Some(Self::Way),
            "relation" => Some(Self::Relation),
            _ => None,
        }
    }
}

/// Semantic role of a relation member.
///
/// `Outer`/`Inner` drive multipolygon ring assembly; `Outline`/`Part` drive
/// building-footprint pairing. Anything else is carried verbatim and skipped
/// by the geometry builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRole {
    /// Shell ring of a multipolygon.
    Outer,
    /// Hole ring of a multipolygon.
    Inner,
    /// Shell of a building footprint.
    Outline,
    /// Hole of a building footprint.
    Part,
    /// Any other role string.
    Other(String),
}

impl MemberRole {
    /// Parse the source format's `role` attribute.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "outer" => Self::Outer,
            "inner" => Self::Inner,
            "outline" => Self::Outline,
            "part" => Self::Part,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The role as it appears in the source format.
    #[must_use]
    pub fn as_name(&self) -> &str {
        match self {
            Self::Outer => "outer",
            Self::Inner => "inner",
            Self::Outline => "outline",
            Self::Part => "part",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_name())
    }
}

/// One entry of a relation's ordered member list.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Identifier of the referenced entity.
    pub ref_id: i64,
    /// Semantic role of the member.
    pub role: MemberRole,
    /// Kind of the referenced entity.
    pub kind: MemberKind,
}

impl Member {
    /// Construct a member entry.
    #[must_use]
    pub fn new(ref_id: i64, role: MemberRole, kind: MemberKind) -> Self {
        Self { ref_id, role, kind }
    }
}

/// A grouping of ways into a composite entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    /// Unique identifier within the relation kind.
    pub id: i64,
    /// Tags attached to the relation.
    pub tags: Tags,
    /// Ordered member list; order drives ring assembly.
    pub members: Vec<Member>,
}

impl Relation {
    /// Construct a relation record.
    #[must_use]
    pub fn new(id: i64, tags: Tags, members: Vec<Member>) -> Self {
        Self { id, tags, members }
    }
}

/// The closed set of raw entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Coordinate-bearing entity.
    Node,
    /// Node chain.
    Way,
    /// Way grouping.
    Relation,
}

/// A raw entity of any kind.
///
/// The variant set is fixed; exhaustive matching replaces the capability
/// interface the entities shared in earlier designs.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// A node record.
    Node(Node),
    /// A way record.
    Way(Way),
    /// A relation record.
    Relation(Relation),
}

impl Entity {
    /// The entity's identifier.
    #[must_use]
    pub const fn id(&self) -> i64 {
        match self {
            Self::Node(node) => node.id,
            Self::Way(way) => way.id,
            Self::Relation(relation) => relation.id,
        }
    }

    /// The entity's tags.
    #[must_use]
    pub const fn tags(&self) -> &Tags {
        match self {
            Self::Node(node) => &node.tags,
            Self::Way(way) => &way.tags,
            Self::Relation(relation) => &relation.tags,
        }
    }

    /// The entity's kind.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Node(_) => EntityKind::Node,
            Self::Way(_) => EntityKind::Way,
            Self::Relation(_) => EntityKind::Relation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("outer", MemberRole::Outer)]
    #[case("inner", MemberRole::Inner)]
    #[case("outline", MemberRole::Outline)]
    #[case("part", MemberRole::Part)]
    fn role_round_trips_known_names(#[case] name: &str, #[case] expected: MemberRole) {
        let role = MemberRole::from_name(name);
        assert_eq!(role, expected);
        assert_eq!(role.as_name(), name);
    }

    #[rstest]
    fn role_preserves_unknown_names() {
        let role = MemberRole::from_name("main_stream");
        assert_eq!(role, MemberRole::Other("main_stream".to_owned()));
        assert_eq!(role.as_name(), "main_stream");
    }

    #[rstest]
    #[case(vec![1, 2, 3, 1], true)]
    #[case(vec![1, 2, 3], false)]
    #[case(vec![1], false)]
    #[case(vec![], false)]
    fn way_closure_compares_first_and_last_refs(#[case] refs: Vec<i64>, #[case] closed: bool) {
        let way = Way::new(7, Tags::new(), refs);
        assert_eq!(way.is_closed(), closed);
    }

    #[rstest]
    fn entity_accessors_cover_all_kinds() {
        let node = Entity::Node(Node::new(1, 0.0, 0.0, Tags::new()));
        let way = Entity::Way(Way::new(2, Tags::new(), vec![1]));
        let relation = Entity::Relation(Relation::new(3, Tags::new(), Vec::new()));

        assert_eq!(node.id(), 1);
        assert_eq!(way.id(), 2);
        assert_eq!(relation.id(), 3);
        assert_eq!(node.kind(), EntityKind::Node);
        assert_eq!(way.kind(), EntityKind::Way);
        assert_eq!(relation.kind(), EntityKind::Relation);
        assert!(node.tags().is_empty());
    }
}
