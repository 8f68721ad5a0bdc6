use serde::{Deserialize, Serialize};

use crate::{
    palette::{BLACK, Color, Rgb, scale},
    render::{Bitmap, fill_coords, point_in_circle},
};

/// Radii of the concentric disks, outermost first. Even entries are painted in
/// the teleporter's color, odd entries in black.
const RING_RADII: [f32; 5] = [0.48, 0.40, 0.20, 0.16, 0.12];

/// A pad that the host environment may use to move the agent elsewhere.
///
/// The displayed color is derived from the activity flag and is never stored,
/// so it cannot drift from `is_active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teleporter {
    is_active: bool,
    active_color: Color,
    inactive_color: Color,
}

impl Default for Teleporter {
    fn default() -> Self {
        Teleporter::new(true, Color::Blue, Color::Grey)
    }
}

impl Teleporter {
    pub fn new(active: bool, active_color: Color, inactive_color: Color) -> Self {
        Teleporter {
            is_active: active,
            active_color,
            inactive_color,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Flips the teleporter on or off; the visible color follows.
    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub fn active_color(&self) -> Color {
        self.active_color
    }

    pub fn inactive_color(&self) -> Color {
        self.inactive_color
    }

    /// The color reported to the grid encoding.
    pub fn color(&self) -> Color {
        if self.is_active {
            self.active_color
        } else {
            self.inactive_color
        }
    }

    /// Paints concentric rings centred on the tile.
    ///
    /// Active pads use the full active color; inactive pads use the inactive color
    /// at half brightness. Each disk overwrites only the pixels inside its radius.
    pub fn render(&self, img: &mut Bitmap) {
        let ring: Rgb = if self.is_active {
            self.active_color.rgb()
        } else {
            scale(self.inactive_color.rgb(), 0.5)
        };

        for (i, r) in RING_RADII.into_iter().enumerate() {
            let fill = if i % 2 == 0 { ring } else { BLACK };
            fill_coords(img, point_in_circle(0.5, 0.5, r), fill);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE: usize = 96;

    fn rendered(t: &Teleporter) -> Bitmap {
        let mut img = Bitmap::square(TILE);
        t.render(&mut img);
        img
    }

    /// Pixel whose centre lies roughly `offset` to the right of the tile centre.
    fn right_of_centre(img: &Bitmap, offset: f32) -> Rgb {
        img.pixel_at(0.5 + offset, 0.5).unwrap()
    }

    #[test]
    fn color_follows_activity() {
        let on = Teleporter::new(true, Color::Blue, Color::Grey);
        assert_eq!(on.color(), Color::Blue);

        let mut off = Teleporter::new(false, Color::Blue, Color::Grey);
        assert_eq!(off.color(), Color::Grey);

        off.set_active(true);
        assert_eq!(off.color(), Color::Blue);
    }

    #[test]
    fn default_is_active_blue() {
        let t = Teleporter::default();
        assert!(t.is_active());
        assert_eq!(t.active_color(), Color::Blue);
        assert_eq!(t.inactive_color(), Color::Grey);
        assert_eq!(t.color(), Color::Blue);
    }

    #[test]
    fn active_render_has_concentric_rings() {
        let blue = Color::Blue.rgb();
        let img = rendered(&Teleporter::new(true, Color::Blue, Color::Grey));

        assert_eq!(img.pixel_at(0.5, 0.5), Some(blue));
        assert_eq!(right_of_centre(&img, 0.14), BLACK);
        assert_eq!(right_of_centre(&img, 0.30), BLACK);
        assert_eq!(right_of_centre(&img, 0.44), blue);
        // Outside the outer ring nothing is painted.
        assert_eq!(img.pixel(0, 0), Some(BLACK));
    }

    #[test]
    fn inactive_render_is_dimmed() {
        let dim = [50, 50, 50];
        let img = rendered(&Teleporter::new(false, Color::Blue, Color::Grey));

        assert_eq!(img.pixel_at(0.5, 0.5), Some(dim));
        assert_eq!(right_of_centre(&img, 0.14), BLACK);
        assert_eq!(right_of_centre(&img, 0.18), dim);
        assert_eq!(right_of_centre(&img, 0.30), BLACK);
        assert_eq!(right_of_centre(&img, 0.44), dim);
    }

    #[test]
    fn render_is_deterministic() {
        let t = Teleporter::new(true, Color::Purple, Color::Yellow);
        assert_eq!(rendered(&t), rendered(&t));

        let off = Teleporter::new(false, Color::Purple, Color::Yellow);
        assert_ne!(rendered(&t), rendered(&off));
    }

    #[test]
    fn render_leaves_pixels_outside_the_pad() {
        let mut img = Bitmap::square(TILE);
        fill_coords(&mut img, |_, _| true, [9, 9, 9]);
        Teleporter::default().render(&mut img);
        assert_eq!(img.pixel(0, 0), Some([9, 9, 9]));
        assert_eq!(img.pixel(TILE - 1, TILE - 1), Some([9, 9, 9]));
    }
}
