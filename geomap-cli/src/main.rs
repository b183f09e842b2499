//! Command-line harness for the geomap engine.
//!
//! Loads an extract, prints load diagnostics, answers ad-hoc amenity
//! queries, and renders single tiles to disk. Configuration stops here:
//! the engine crates only ever see validated values.

#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use geo::{Coord, Rect};

use geomap_engine::{MapEngine, QueryArea};

#[derive(Parser)]
#[command(
    name = "geomap",
    about = "Load a geographic extract and query or render it"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load an extract and print the load report.
    Inspect {
        /// Path to the OSM XML extract.
        extract: PathBuf,
    },
    /// Render one slippy tile to a PNG file.
    Tile {
        /// Path to the OSM XML extract.
        extract: PathBuf,
        /// Zoom level.
        #[arg(short, long)]
        zoom: u8,
        /// Tile column.
        #[arg(short)]
        x: u32,
        /// Tile row.
        #[arg(short)]
        y: u32,
        /// Comma-separated layer list.
        #[arg(long, default_value = "forest,residential,water,building,road")]
        layers: String,
        /// Output file.
        #[arg(long, default_value = "tile.png")]
        out: PathBuf,
    },
    /// Query amenities in a bounding box and print them as JSON lines.
    Amenities {
        /// Path to the OSM XML extract.
        extract: PathBuf,
        /// Bounding box as west,south,east,north in degrees.
        #[arg(long, value_name = "W,S,E,N")]
        bbox: String,
        /// Restrict to one amenity type.
        #[arg(long)]
        kind: Option<String>,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("geomap: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Inspect { extract } => {
            let engine = MapEngine::from_extract(&extract)?;
            print_report(&engine);
        }
        Command::Tile {
            extract,
            zoom,
            x,
            y,
            layers,
            out,
        } => {
            let engine = MapEngine::from_extract(&extract)?;
            let bytes = engine.tile(zoom, x, y, &layers)?;
            std::fs::write(&out, bytes)?;
            println!("wrote {}", out.display());
        }
        Command::Amenities {
            extract,
            bbox,
            kind,
        } => {
            let bbox = parse_bbox(&bbox)?;
            let engine = MapEngine::from_extract(&extract)?;
            match engine.amenities(&QueryArea::BoundingBox(bbox), kind.as_deref()) {
                Some(found) => {
                    for amenity in found {
                        println!(
                            "{}",
                            serde_json::json!({
                                "id": amenity.id,
                                "type": amenity.tags.get("amenity").cloned().unwrap_or_default(),
                                "name": amenity.tags.get("name").cloned().unwrap_or_default(),
                                "tags": amenity.tags,
                            })
                        );
                    }
                }
                None => println!("no amenities found"),
            }
        }
    }
    Ok(())
}

fn print_report(engine: &MapEngine) {
    let report = engine.report();
    println!("nodes:     {}", report.nodes);
    println!("ways:      {}", report.ways);
    println!("relations: {}", report.relations);
    println!("amenities: {}", report.amenities);
    println!("roads:     {}", report.roads);
    if report.skipped_elements > 0 {
        println!("skipped elements: {}", report.skipped_elements);
    }
    if !report.invalid_ways.is_empty() {
        println!("quarantined ways: {}", report.invalid_ways.len());
    }
    if !report.invalid_relations.is_empty() {
        println!("quarantined relations: {}", report.invalid_relations.len());
    }
    for invalid in &report.invalid_geometries {
        println!("invalid geometry: {}", invalid.reason);
    }
}

/// Parse a `west,south,east,north` degree quadruple.
fn parse_bbox(raw: &str) -> Result<Rect<f64>, String> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("invalid bounding box {raw:?}: expected W,S,E,N degrees"))?;
    let [west, south, east, north] = parts[..] else {
        return Err(format!(
            "invalid bounding box {raw:?}: expected four comma-separated values"
        ));
    };
    Ok(Rect::new(
        Coord { x: west, y: south },
        Coord { x: east, y: north },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn bbox_parses_four_values() {
        let rect = parse_bbox("15.41, 47.04, 15.43, 47.06").unwrap();
        assert!((rect.min().x - 15.41).abs() < 1e-12);
        assert!((rect.max().y - 47.06).abs() < 1e-12);
    }

    #[rstest]
    #[case("15.41,47.04,15.43")]
    #[case("a,b,c,d")]
    #[case("")]
    fn bad_bbox_is_rejected(#[case] raw: &str) {
        assert!(parse_bbox(raw).is_err());
    }

    #[rstest]
    fn cli_parses_tile_command() {
        let cli = Cli::try_parse_from([
            "geomap", "tile", "extract.osm", "--zoom", "14", "-x", "8853", "-y", "5785",
            "--layers", "road,water",
        ])
        .unwrap();
        match cli.command {
            Command::Tile { zoom, x, y, layers, .. } => {
                assert_eq!(zoom, 14);
                assert_eq!(x, 8853);
                assert_eq!(y, 5785);
                assert_eq!(layers, "road,water");
            }
            _ => panic!("expected the tile subcommand"),
        }
    }
}
