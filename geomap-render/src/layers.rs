//! The fixed layer table: names, filters, colours and draw priority.
//!
//! Each recognised layer name selects entities by exact tag-value equality,
//! plus a handful of aggregate layers (`road`, `water`, `building`,
//! `railway`). Requested layers are reordered by a fixed priority before
//! drawing so background land-use never paints over buildings or roads,
//! whatever order the request names them in.

use image::Rgb;
use log::warn;

use geomap_core::Tags;

/// Highway values that have their own dedicated layer.
const NAMED_ROADS: [&str; 4] = ["motorway", "trunk", "primary", "secondary"];

/// A recognised render layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// `highway=motorway` ways.
    Motorway,
    /// `highway=trunk` ways.
    Trunk,
    /// `highway=primary` ways.
    Primary,
    /// `highway=secondary` ways.
    Secondary,
    /// Aggregate: every other highway value.
    Road,
    /// Aggregate: water-tagged entities.
    Water,
    /// Aggregate: building-tagged entities.
    Building,
    /// Aggregate: railway-tagged entities.
    Railway,
    /// `forest` land cover.
    Forest,
    /// `residential` land use.
    Residential,
    /// `vineyard` land use.
    Vineyard,
    /// `grass` land cover.
    Grass,
    /// `meadow` land cover.
    Meadow,
}

impl Layer {
    /// Parse one layer name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "motorway" => Some(Self::Motorway),
            "trunk" => Some(Self::Trunk),
            "primary" => Some(Self::Primary),
            "secondary" => Some(Self::Secondary),
            "road" => Some(Self::Road),
            "water" => Some(Self::Water),
            "building" => Some(Self::Building),
            "railway" => Some(Self::Railway),
            "forest" => Some(Self::Forest),
            "residential" => Some(Self::Residential),
            "vineyard" => Some(Self::Vineyard),
            "grass" => Some(Self::Grass),
            "meadow" => Some(Self::Meadow),
            _ => None,
        }
    }

    /// Parse a comma-separated layer list, dropping unknown names with a
    /// warning, and order the result for drawing.
    #[must_use]
    pub fn parse_list(names: &str) -> Vec<Self> {
        let mut layers: Vec<Self> = names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter_map(|name| {
                let layer = Self::parse(name);
                if layer.is_none() {
                    warn!("ignoring unrecognised layer {name:?}");
                }
                layer
            })
            .collect();
        order_for_drawing(&mut layers);
        layers
    }

    /// Draw priority: lower paints first.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Forest | Self::Residential | Self::Vineyard | Self::Grass | Self::Meadow => 0,
            Self::Water => 1,
            Self::Building => 2,
            Self::Railway => 3,
            Self::Road => 4,
            Self::Motorway | Self::Trunk | Self::Primary | Self::Secondary => 5,
        }
    }

    /// Fill/stroke colour of the layer.
    #[must_use]
    pub const fn color(self) -> Rgb<u8> {
        match self {
            Self::Motorway => Rgb([255, 0, 0]),
            Self::Trunk => Rgb([255, 140, 0]),
            Self::Primary => Rgb([255, 165, 0]),
            Self::Secondary => Rgb([255, 255, 0]),
            Self::Road => Rgb([128, 128, 128]),
            Self::Water => Rgb([0, 128, 255]),
            Self::Building => Rgb([217, 208, 201]),
            Self::Railway => Rgb([235, 219, 233]),
            Self::Forest => Rgb([173, 209, 158]),
            Self::Residential => Rgb([223, 233, 233]),
            Self::Vineyard => Rgb([172, 224, 161]),
            Self::Grass | Self::Meadow => Rgb([205, 235, 176]),
        }
    }

    /// Whether an entity with `tags` belongs to this layer.
    #[must_use]
    pub fn matches(self, tags: &Tags) -> bool {
        match self {
            Self::Motorway => highway_is(tags, "motorway"),
            Self::Trunk => highway_is(tags, "trunk"),
            Self::Primary => highway_is(tags, "primary"),
            Self::Secondary => highway_is(tags, "secondary"),
            Self::Road => tags
                .get("highway")
                .is_some_and(|value| !NAMED_ROADS.contains(&value.as_str())),
            Self::Water => {
                tags.contains_key("water")
                    || tags.get("natural").is_some_and(|value| value == "water")
            }
            Self::Building => tags.contains_key("building"),
            Self::Railway => {
                tags.contains_key("railway")
                    || tags.get("landuse").is_some_and(|value| value == "railway")
            }
            Self::Forest => cover_is(tags, "forest") || cover_is(tags, "wood"),
            Self::Residential => cover_is(tags, "residential"),
            Self::Vineyard => cover_is(tags, "vineyard"),
            Self::Grass => cover_is(tags, "grass"),
            Self::Meadow => cover_is(tags, "meadow"),
        }
    }
}

fn highway_is(tags: &Tags, value: &str) -> bool {
    tags.get("highway").is_some_and(|actual| actual == value)
}

/// Exact value match across the land-cover keys.
fn cover_is(tags: &Tags, value: &str) -> bool {
    ["landuse", "natural", "leisure"]
        .iter()
        .any(|key| tags.get(*key).is_some_and(|actual| actual == value))
}

/// Stable-sort layers into draw order: background first.
pub fn order_for_drawing(layers: &mut [Layer]) {
    layers.sort_by_key(|layer| layer.priority());
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[rstest]
    fn request_order_does_not_matter() {
        let layers = Layer::parse_list("motorway,water,forest");
        assert_eq!(layers, vec![Layer::Forest, Layer::Water, Layer::Motorway]);
    }

    #[rstest]
    fn unknown_names_are_dropped() {
        let layers = Layer::parse_list("forest,unicorns,road");
        assert_eq!(layers, vec![Layer::Forest, Layer::Road]);
    }

    #[rstest]
    fn aggregate_road_excludes_named_types() {
        assert!(Layer::Road.matches(&tags(&[("highway", "residential")])));
        assert!(!Layer::Road.matches(&tags(&[("highway", "motorway")])));
        assert!(Layer::Motorway.matches(&tags(&[("highway", "motorway")])));
    }

    #[rstest]
    fn water_layer_spans_key_and_natural_value() {
        assert!(Layer::Water.matches(&tags(&[("water", "river")])));
        assert!(Layer::Water.matches(&tags(&[("natural", "water")])));
        assert!(!Layer::Water.matches(&tags(&[("natural", "wood")])));
    }

    #[rstest]
    #[case(Layer::Forest, &[("landuse", "forest")])]
    #[case(Layer::Forest, &[("natural", "wood")])]
    #[case(Layer::Grass, &[("landuse", "grass")])]
    #[case(Layer::Meadow, &[("leisure", "meadow")])]
    fn cover_layers_match_across_keys(#[case] layer: Layer, #[case] pairs: &[(&str, &str)]) {
        assert!(layer.matches(&tags(pairs)));
    }
}
