//! Raster tile rendering over the spatial store.
//!
//! Given a slippy-tile address and a layer list, the renderer projects the
//! store's way and relation features into pixel space and rasterises them in
//! a fixed draw order: background land cover first, then water, buildings,
//! railways and roads. The output is a fixed-size square RGB image, also
//! available PNG-encoded.

#![forbid(unsafe_code)]

use std::io::Cursor;

use geo::{Geometry, Intersects, LineString, MultiPolygon, Polygon};
use image::{ImageFormat, Rgb, RgbImage};
use thiserror::Error;

use geomap_core::SpatialStore;

pub mod layers;
pub mod raster;
pub mod tile;

pub use layers::{Layer, order_for_drawing};
pub use tile::{PixelMapper, TILE_SIZE, tile_bounds, tile_latitude, tile_longitude};

use raster::Canvas;

/// Tile background colour.
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Renderer failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The tile address does not exist at the requested zoom.
    #[error("tile {x}/{y} does not exist at zoom {zoom}")]
    TileOutOfRange {
        /// Requested zoom level.
        zoom: u8,
        /// Requested tile column.
        x: u32,
        /// Requested tile row.
        y: u32,
    },
    /// PNG encoding failed.
    #[error("failed to encode tile as PNG")]
    Encode {
        /// Underlying encoder error.
        #[source]
        source: image::ImageError,
    },
}

/// Renders raster tiles from a [`SpatialStore`].
///
/// The renderer holds no store reference itself; the store is passed to each
/// call, so one renderer serves concurrent requests over the same immutable
/// data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRenderer {
    tile_size: u32,
}

impl Default for TileRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TileRenderer {
    /// Create a renderer producing [`TILE_SIZE`] pixel tiles.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tile_size: TILE_SIZE,
        }
    }

    /// Create a renderer with a custom tile edge length.
    #[must_use]
    pub const fn with_tile_size(tile_size: u32) -> Self {
        Self { tile_size }
    }

    /// Render one tile as an RGB image.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::TileOutOfRange`] when `x` or `y` exceed the
    /// tile grid at `zoom`.
    pub fn render(
        &self,
        store: &SpatialStore,
        zoom: u8,
        x: u32,
        y: u32,
        layers: &[Layer],
    ) -> Result<RgbImage, RenderError> {
        let grid = if zoom >= 32 { u64::MAX } else { 1_u64 << zoom };
        if u64::from(x) >= grid || u64::from(y) >= grid {
            return Err(RenderError::TileOutOfRange { zoom, x, y });
        }

        let bounds = tile_bounds(zoom, x, y);
        let bounds_polygon = bounds.to_polygon();
        let mapper = PixelMapper::new(bounds, self.tile_size);
        let mut canvas = Canvas::new(self.tile_size, BACKGROUND);

        let mut ordered = layers.to_vec();
        order_for_drawing(&mut ordered);

        for layer in &ordered {
            let color = layer.color();
            for feature in store
                .way_features()
                .iter()
                .filter(|feature| layer.matches(&feature.tags))
                .filter(|feature| bounds_polygon.intersects(&feature.geometry))
            {
                draw_geometry(&mut canvas, &mapper, &feature.geometry, color);
            }
            for feature in store
                .relation_features()
                .iter()
                .filter(|feature| layer.matches(&feature.tags))
                .filter(|feature| bounds_polygon.intersects(&feature.geometry))
            {
                fill_multipolygon(&mut canvas, &mapper, &feature.geometry, color);
            }
        }

        Ok(canvas.into_rotated_image())
    }

    /// Render one tile and encode it as PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when the tile address is out of range or
    /// encoding fails.
    pub fn render_png(
        &self,
        store: &SpatialStore,
        zoom: u8,
        x: u32,
        y: u32,
        layers: &[Layer],
    ) -> Result<Vec<u8>, RenderError> {
        let image = self.render(store, zoom, x, y, layers)?;
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|source| RenderError::Encode { source })?;
        Ok(bytes)
    }
}

fn draw_geometry(canvas: &mut Canvas, mapper: &PixelMapper, geometry: &Geometry<f64>, color: Rgb<u8>) {
    match geometry {
        Geometry::Point(point) => canvas.dot(mapper.map(point.0), color),
        Geometry::LineString(line) => canvas.stroke_path(&map_line(mapper, line), color),
        Geometry::Polygon(polygon) => fill_polygon(canvas, mapper, polygon, color),
        Geometry::MultiPolygon(polygons) => fill_multipolygon(canvas, mapper, polygons, color),
        _ => {}
    }
}

fn fill_polygon(canvas: &mut Canvas, mapper: &PixelMapper, polygon: &Polygon<f64>, color: Rgb<u8>) {
    let rings: Vec<Vec<(f64, f64)>> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors().iter())
        .map(|ring| map_line(mapper, ring))
        .collect();
    canvas.fill_rings(&rings, color);
    // Keep the outline crisp at small fill sizes.
    if let Some(exterior) = rings.first() {
        canvas.stroke_path(exterior, color);
    }
}

fn fill_multipolygon(
    canvas: &mut Canvas,
    mapper: &PixelMapper,
    polygons: &MultiPolygon<f64>,
    color: Rgb<u8>,
) {
    for polygon in &polygons.0 {
        fill_polygon(canvas, mapper, polygon, color);
    }
}

fn map_line(mapper: &PixelMapper, line: &LineString<f64>) -> Vec<(f64, f64)> {
    line.coords().map(|coord| mapper.map(*coord)).collect()
}
