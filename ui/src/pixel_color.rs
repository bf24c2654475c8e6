use egui::Color32;

use engine::Pixel;

/// Device pixel in `RRRGGGBB` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb332(pub Pixel);

impl Rgb332 {
    #[must_use]
    pub const fn to_rgb(self) -> [u8; 3] {
        let p = self.0;
        [
            expand(p >> 5, 7),
            expand((p >> 2) & 0x07, 7),
            expand(p & 0x03, 3),
        ]
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
const fn expand(value: u8, max: u16) -> u8 {
    (value as u16 * 255 / max) as u8
}

impl From<Rgb332> for Color32 {
    fn from(pixel: Rgb332) -> Self {
        let [r, g, b] = pixel.to_rgb();
        Self::from_rgb(r, g, b)
    }
}

/// Expands a row-major frame of device pixels to packed RGB.
#[must_use]
pub fn to_rgb(pixels: &[Pixel]) -> Vec<u8> {
    pixels.iter().flat_map(|&p| Rgb332(p).to_rgb()).collect()
}
