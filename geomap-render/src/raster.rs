//! Minimal software rasteriser over an RGB pixel buffer.
//!
//! Polygons fill with an even-odd scanline sweep across all their rings at
//! once, which both fills shells and subtracts holes. Polylines stroke at a
//! fixed two-pixel weight. Coordinates arrive as fractional pixels from the
//! tile transform; pixel centres sit at `+0.5`.

use image::{Rgb, RgbImage, imageops};

/// A fixed-size square drawing surface.
#[derive(Debug)]
pub struct Canvas {
    image: RgbImage,
    size: u32,
}

impl Canvas {
    /// Create a canvas filled with `background`.
    #[must_use]
    pub fn new(size: u32, background: Rgb<u8>) -> Self {
        Self {
            image: RgbImage::from_pixel(size, size, background),
            size,
        }
    }

    /// Fill the area enclosed by `rings` using the even-odd rule.
    ///
    /// Passing a polygon's exterior and interior rings together fills the
    /// shell and leaves the holes untouched.
    pub fn fill_rings(&mut self, rings: &[Vec<(f64, f64)>], color: Rgb<u8>) {
        for row in 0..self.size {
            let scan_y = f64::from(row) + 0.5;
            let mut crossings: Vec<f64> = Vec::new();
            for ring in rings {
                for (start, end) in ring_edges(ring) {
                    let (x0, y0) = start;
                    let (x1, y1) = end;
                    if (y0 <= scan_y) == (y1 <= scan_y) {
                        continue;
                    }
                    let t = (scan_y - y0) / (y1 - y0);
                    crossings.push(t.mul_add(x1 - x0, x0));
                }
            }
            crossings.sort_by(f64::total_cmp);
            for pair in crossings.chunks_exact(2) {
                self.fill_span(pair[0], pair[1], row, color);
            }
        }
    }

    /// Stroke an open or closed path at two pixels width.
    pub fn stroke_path(&mut self, points: &[(f64, f64)], color: Rgb<u8>) {
        for segment in points.windows(2) {
            self.stroke_segment(segment[0], segment[1], color);
        }
    }

    /// Plot a small square dot for point features.
    pub fn dot(&mut self, point: (f64, f64), color: Rgb<u8>) {
        self.plot_block(point.0 as i64, point.1 as i64, color);
    }

    /// Hand the finished raster over in the orientation the gateway expects.
    ///
    /// The drawing pass uses a conventional top-left raster frame; served
    /// tiles historically come out rotated a quarter turn anticlockwise, so
    /// keep emitting that orientation.
    // TODO: settle the tile axis convention with the gateway and fold this
    // rotation into PixelMapper::map.
    #[must_use]
    pub fn into_rotated_image(self) -> RgbImage {
        imageops::rotate270(&self.image)
    }

    fn fill_span(&mut self, from: f64, to: f64, row: u32, color: Rgb<u8>) {
        let start = (from - 0.5).ceil().max(0.0) as i64;
        let end = (to - 0.5).floor().min(f64::from(self.size) - 1.0) as i64;
        for column in start..=end {
            self.plot(column, i64::from(row), color);
        }
    }

    fn stroke_segment(&mut self, from: (f64, f64), to: (f64, f64), color: Rgb<u8>) {
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0);
        let mut i = 0.0;
        while i <= steps {
            let t = i / steps;
            let x = t.mul_add(dx, from.0) as i64;
            let y = t.mul_add(dy, from.1) as i64;
            self.plot_block(x, y, color);
            i += 1.0;
        }
    }

    /// 2x2 block, the stroke weight.
    fn plot_block(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        for (ox, oy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            self.plot(x + ox, y + oy, color);
        }
    }

    fn plot(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x < 0 || y < 0 || x >= i64::from(self.size) || y >= i64::from(self.size) {
            return;
        }
        self.image.put_pixel(x as u32, y as u32, color);
    }

    #[cfg(test)]
    fn pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        *self.image.get_pixel(x, y)
    }
}

/// Edges of a ring, closing it implicitly if the input is open.
fn ring_edges(ring: &[(f64, f64)]) -> impl Iterator<Item = ((f64, f64), (f64, f64))> + '_ {
    let wrap = if ring.len() > 1 && ring.first() != ring.last() {
        ring.last().copied().zip(ring.first().copied())
    } else {
        None
    };
    ring.windows(2)
        .map(|pair| (pair[0], pair[1]))
        .chain(wrap)
}
