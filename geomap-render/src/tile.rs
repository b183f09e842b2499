//! Slippy-tile math and the tile-to-pixel transform.
//!
//! Standard web-map tiling: tile `(zoom, x, y)` covers the geographic
//! rectangle between `lon(x)`/`lon(x+1)` and `lat(y)`/`lat(y+1)` of the
//! spherical Mercator grid.

use geo::{Coord, Rect};

/// Edge length of a rendered tile in pixels.
pub const TILE_SIZE: u32 = 512;

/// Western longitude of tile column `x` at `zoom`.
#[must_use]
pub fn tile_longitude(x: u32, zoom: u8) -> f64 {
    f64::from(x) / 2_f64.powi(i32::from(zoom)) * 360.0 - 180.0
}

/// Northern latitude of tile row `y` at `zoom`.
#[must_use]
pub fn tile_latitude(y: u32, zoom: u8) -> f64 {
    let n = std::f64::consts::PI
        - 2.0 * std::f64::consts::PI * f64::from(y) / 2_f64.powi(i32::from(zoom));
    n.sinh().atan().to_degrees()
}

/// Geographic bounds of a tile, as a lon/lat rectangle.
#[must_use]
pub fn tile_bounds(zoom: u8, x: u32, y: u32) -> Rect<f64> {
    let west = tile_longitude(x, zoom);
    let east = tile_longitude(x + 1, zoom);
    let north = tile_latitude(y, zoom);
    let south = tile_latitude(y + 1, zoom);
    Rect::new(Coord { x: west, y: south }, Coord { x: east, y: north })
}

/// Linear map from a tile's geographic bounds onto `[0, size)` pixels.
///
/// The frame is the conventional raster one: the tile's north-west corner
/// maps to pixel `(0, 0)`, x grows east, y grows south.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelMapper {
    bounds: Rect<f64>,
    size: f64,
}

impl PixelMapper {
    /// Create a mapper for a tile of `size` pixels covering `bounds`.
    #[must_use]
    pub fn new(bounds: Rect<f64>, size: u32) -> Self {
        Self {
            bounds,
            size: f64::from(size),
        }
    }

    /// Map a geographic coordinate to fractional pixel coordinates.
    #[must_use]
    pub fn map(&self, coord: Coord<f64>) -> (f64, f64) {
        let px = (coord.x - self.bounds.min().x) / self.bounds.width() * self.size;
        let py = (self.bounds.max().y - coord.y) / self.bounds.height() * self.size;
        (px, py)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn zoom_zero_tile_covers_the_mercator_world() {
        let bounds = tile_bounds(0, 0, 0);
        assert!((bounds.min().x - -180.0).abs() < 1e-9);
        assert!((bounds.max().x - 180.0).abs() < 1e-9);
        assert!((bounds.max().y - 85.0511).abs() < 1e-3);
        assert!((bounds.min().y - -85.0511).abs() < 1e-3);
    }

    #[rstest]
    fn zoom_one_splits_the_world_at_the_meridian() {
        let bounds = tile_bounds(1, 1, 0);
        assert!((bounds.min().x - 0.0).abs() < 1e-9);
        assert!((bounds.max().x - 180.0).abs() < 1e-9);
        assert!((bounds.min().y - 0.0).abs() < 1e-9);
    }

    #[rstest]
    fn top_left_corner_maps_to_pixel_origin() {
        let bounds = tile_bounds(0, 0, 0);
        let mapper = PixelMapper::new(bounds, TILE_SIZE);
        let (px, py) = mapper.map(Coord {
            x: bounds.min().x,
            y: bounds.max().y,
        });
        assert!(px.abs() < 1e-9);
        assert!(py.abs() < 1e-9);
    }

    #[rstest]
    fn bottom_right_corner_maps_to_the_far_edge(
        #[values(0, 3)] zoom: u8,
    ) {
        let bounds = tile_bounds(zoom, 0, 0);
        let mapper = PixelMapper::new(bounds, TILE_SIZE);
        let (px, py) = mapper.map(Coord {
            x: bounds.max().x,
            y: bounds.min().y,
        });
        assert!((px - f64::from(TILE_SIZE)).abs() < 1e-9);
        assert!((py - f64::from(TILE_SIZE)).abs() < 1e-9);
    }
}
