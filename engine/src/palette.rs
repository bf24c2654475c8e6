//! Color collaborator.
//!
//! The engine never looks inside a device pixel. The only place it needs
//! the color space is when a caller names a sprite key by palette index.

use crate::Pixel;

pub trait ColorSpace {
    fn index_to_device_pixel(&self, index: u8) -> Pixel;
}

/// Palette indices are device pixels.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityPalette;

impl ColorSpace for IdentityPalette {
    fn index_to_device_pixel(&self, index: u8) -> Pixel {
        index
    }
}

/// Maps the 16 standard palette entries onto RGB332 device pixels
/// (`RRRGGGBB`). Indices from 16 up are taken as RGB332 already.
#[derive(Debug, Clone)]
pub struct Rgb332Palette {
    table: [Pixel; 256],
}

/// The 16 standard colors as 8-bit RGB.
const STANDARD_COLORS: [[u8; 3]; 16] = [
    [0x00, 0x00, 0x00],
    [0x00, 0x00, 0xaa],
    [0x00, 0xaa, 0x00],
    [0x00, 0xaa, 0xaa],
    [0xaa, 0x00, 0x00],
    [0xaa, 0x00, 0xaa],
    [0xaa, 0x55, 0x00],
    [0xaa, 0xaa, 0xaa],
    [0x55, 0x55, 0x55],
    [0x55, 0x55, 0xff],
    [0x55, 0xff, 0x55],
    [0x55, 0xff, 0xff],
    [0xff, 0x55, 0x55],
    [0xff, 0x55, 0xff],
    [0xff, 0xff, 0x55],
    [0xff, 0xff, 0xff],
];

impl Rgb332Palette {
    #[must_use]
    pub const fn pack(r: u8, g: u8, b: u8) -> Pixel {
        (r & 0xe0) | ((g & 0xe0) >> 3) | (b >> 6)
    }
}

impl Default for Rgb332Palette {
    fn default() -> Self {
        let mut table = [0; 256];
        for (i, p) in table.iter_mut().enumerate() {
            *p = match STANDARD_COLORS.get(i) {
                Some(&[r, g, b]) => Self::pack(r, g, b),
                #[allow(clippy::cast_possible_truncation)]
                None => i as u8,
            };
        }
        Self { table }
    }
}

impl ColorSpace for Rgb332Palette {
    fn index_to_device_pixel(&self, index: u8) -> Pixel {
        self.table[usize::from(index)]
    }
}
