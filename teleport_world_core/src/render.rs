//! Procedural tile rasterization.
//!
//! Shapes are predicates over normalized tile coordinates: `(0.0, 0.0)` is the
//! top-left corner of the bitmap and `(1.0, 1.0)` the bottom-right. Filling a
//! shape overwrites only the pixels whose centre satisfies the predicate, so
//! drawing order decides what sits on top.

use std::f32::consts::FRAC_PI_2;

use crate::{
    Direction,
    object::WorldObject,
    palette::{BLACK, Rgb},
};

/// Color of the grid lines drawn along the top and left edge of each tile.
pub const GRID_LINE: Rgb = [100, 100, 100];

/// Color of the agent triangle.
pub const AGENT_COLOR: Rgb = [255, 0, 0];

/// A row-major RGB8 pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl Bitmap {
    /// Creates a black bitmap of the given dimensions.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn new(width: usize, height: usize) -> Self {
        let size = width.checked_mul(height).expect("Bitmap size overflow");
        Bitmap {
            width,
            height,
            pixels: vec![BLACK; size],
        }
    }

    /// Creates a black square tile bitmap.
    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Rgb) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }

    /// Returns the pixel covering the normalized coordinate `(fx, fy)`.
    pub fn pixel_at(&self, fx: f32, fy: f32) -> Option<Rgb> {
        if !(0.0..1.0).contains(&fx) || !(0.0..1.0).contains(&fy) {
            return None;
        }
        let x = (fx * self.width as f32) as usize;
        let y = (fy * self.height as f32) as usize;
        self.pixel(x, y)
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Copies `tile` into this bitmap with its top-left corner at `(x0, y0)`.
    /// Pixels falling outside the bitmap are dropped.
    pub fn blit(&mut self, tile: &Bitmap, x0: usize, y0: usize) {
        for y in 0..tile.height {
            for x in 0..tile.width {
                self.set_pixel(x0 + x, y0 + y, tile.pixels[y * tile.width + x]);
            }
        }
    }

    /// Averages `factor`×`factor` blocks into single pixels.
    ///
    /// Dimensions must be multiples of `factor`; trailing rows and columns are dropped otherwise.
    pub fn downsample(&self, factor: usize) -> Bitmap {
        if factor <= 1 {
            return self.clone();
        }
        let mut out = Bitmap::new(self.width / factor, self.height / factor);
        let count = (factor * factor) as u32;
        for oy in 0..out.height {
            for ox in 0..out.width {
                let mut sum = [0u32; 3];
                for dy in 0..factor {
                    for dx in 0..factor {
                        let p = self.pixels[(oy * factor + dy) * self.width + ox * factor + dx];
                        for (acc, channel) in sum.iter_mut().zip(p) {
                            *acc += u32::from(channel);
                        }
                    }
                }
                out.pixels[oy * out.width + ox] = sum.map(|acc| (acc / count) as u8);
            }
        }
        out
    }
}

/// Paints `color` onto every pixel whose centre satisfies `shape`.
pub fn fill_coords(img: &mut Bitmap, shape: impl Fn(f32, f32) -> bool, color: Rgb) {
    let (w, h) = (img.width as f32, img.height as f32);
    for y in 0..img.height {
        let yf = (y as f32 + 0.5) / h;
        for x in 0..img.width {
            let xf = (x as f32 + 0.5) / w;
            if shape(xf, yf) {
                img.pixels[y * img.width + x] = color;
            }
        }
    }
}

pub fn point_in_circle(cx: f32, cy: f32, r: f32) -> impl Fn(f32, f32) -> bool {
    move |x, y| (x - cx) * (x - cx) + (y - cy) * (y - cy) <= r * r
}

pub fn point_in_rect(xmin: f32, xmax: f32, ymin: f32, ymax: f32) -> impl Fn(f32, f32) -> bool {
    move |x, y| x >= xmin && x <= xmax && y >= ymin && y <= ymax
}

/// Points within distance `r` of the segment from `(x0, y0)` to `(x1, y1)`.
pub fn point_in_line(x0: f32, y0: f32, x1: f32, y1: f32, r: f32) -> impl Fn(f32, f32) -> bool {
    let (dx, dy) = (x1 - x0, y1 - y0);
    let len = (dx * dx + dy * dy).sqrt();
    let (ux, uy) = if len > 0.0 { (dx / len, dy / len) } else { (0.0, 0.0) };
    let (xmin, xmax) = (x0.min(x1) - r, x0.max(x1) + r);
    let (ymin, ymax) = (y0.min(y1) - r, y0.max(y1) + r);

    move |x, y| {
        if x < xmin || x > xmax || y < ymin || y > ymax {
            return false;
        }
        let (px, py) = (x - x0, y - y0);
        let a = (px * ux + py * uy).clamp(0.0, len);
        let (nx, ny) = (x0 + a * ux, y0 + a * uy);
        ((x - nx) * (x - nx) + (y - ny) * (y - ny)).sqrt() <= r
    }
}

/// Points inside the triangle `a`, `b`, `c` (barycentric test).
pub fn point_in_triangle(
    a: (f32, f32),
    b: (f32, f32),
    c: (f32, f32),
) -> impl Fn(f32, f32) -> bool {
    move |x, y| {
        let v0 = (c.0 - a.0, c.1 - a.1);
        let v1 = (b.0 - a.0, b.1 - a.1);
        let v2 = (x - a.0, y - a.1);

        let dot00 = v0.0 * v0.0 + v0.1 * v0.1;
        let dot01 = v0.0 * v1.0 + v0.1 * v1.1;
        let dot02 = v0.0 * v2.0 + v0.1 * v2.1;
        let dot11 = v1.0 * v1.0 + v1.1 * v1.1;
        let dot12 = v1.0 * v2.0 + v1.1 * v2.1;

        let denom = dot00 * dot11 - dot01 * dot01;
        if denom == 0.0 {
            return false;
        }
        let u = (dot11 * dot02 - dot01 * dot12) / denom;
        let v = (dot00 * dot12 - dot01 * dot02) / denom;
        u >= 0.0 && v >= 0.0 && u + v < 1.0
    }
}

/// Rotates `shape` by `theta` radians (clockwise on screen) around `(cx, cy)`.
pub fn rotate_fn(
    shape: impl Fn(f32, f32) -> bool,
    cx: f32,
    cy: f32,
    theta: f32,
) -> impl Fn(f32, f32) -> bool {
    let (sin, cos) = (-theta).sin_cos();
    move |x, y| {
        let (x, y) = (x - cx, y - cy);
        shape(cx + x * cos - y * sin, cy + y * cos + x * sin)
    }
}

/// Blends every pixel toward white by 30%.
pub fn highlight(img: &mut Bitmap) {
    const ALPHA: f32 = 0.30;
    for p in img.pixels.iter_mut() {
        *p = p.map(|c| {
            let c = f32::from(c);
            (c + ALPHA * (255.0 - c)).clamp(0.0, 255.0) as u8
        });
    }
}

/// Renders one grid cell: grid lines, the object, the agent and an optional highlight.
///
/// Drawing happens at `tile_size * subdivs` resolution and is averaged back down,
/// which smooths the edges of circles and diagonals.
pub fn render_tile(
    obj: Option<&WorldObject>,
    agent_dir: Option<Direction>,
    highlighted: bool,
    tile_size: usize,
    subdivs: usize,
) -> Bitmap {
    let subdivs = subdivs.max(1);
    let mut img = Bitmap::square(tile_size * subdivs);

    fill_coords(&mut img, point_in_rect(0.0, 0.031, 0.0, 1.0), GRID_LINE);
    fill_coords(&mut img, point_in_rect(0.0, 1.0, 0.0, 0.031), GRID_LINE);

    if let Some(obj) = obj {
        obj.render(&mut img);
    }

    if let Some(dir) = agent_dir {
        let triangle = point_in_triangle((0.12, 0.19), (0.87, 0.50), (0.12, 0.81));
        let theta = FRAC_PI_2 * f32::from(dir.index());
        fill_coords(&mut img, rotate_fn(triangle, 0.5, 0.5, theta), AGENT_COLOR);
    }

    if highlighted {
        highlight(&mut img);
    }

    img.downsample(subdivs)
}
