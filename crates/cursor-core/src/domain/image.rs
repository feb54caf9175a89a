//! Framebuffer formats, colours, and the cursor test pattern.

use std::fmt;

use super::display::CursorSize;

/// Pixel formats used by the test.  Both are 32 bits per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Opaque 8:8:8 RGB with an unused top byte (primary plane).
    Xrgb8888,
    /// 8:8:8:8 RGB with alpha (cursor plane).
    Argb8888,
}

impl PixelFormat {
    /// The DRM fourcc code for this format.
    pub fn fourcc(self) -> u32 {
        let code: &[u8; 4] = match self {
            PixelFormat::Xrgb8888 => b"XR24",
            PixelFormat::Argb8888 => b"AR24",
        };
        u32::from_le_bytes(*code)
    }

    /// Returns `true` if the alpha byte is meaningful.
    pub fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Argb8888)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Xrgb8888 => f.write_str("XRGB8888"),
            PixelFormat::Argb8888 => f.write_str("ARGB8888"),
        }
    }
}

/// A colour with normalised `0.0..=1.0` components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);

    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Packs the colour into a `0xAARRGGBB` word.
    ///
    /// Components are clamped and rounded to the nearest 8-bit step; the
    /// mapping is exact with no blending, matching unantialiased fills.
    pub fn to_argb8888(self) -> u32 {
        fn channel(v: f64) -> u32 {
            (v.clamp(0.0, 1.0) * 255.0).round() as u32
        }
        (channel(self.a) << 24) | (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }
}

/// An axis-aligned solid fill inside a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub color: Color,
}

/// The cursor image: four opaque quadrants, red / green over blue / gray.
///
/// Distinct, fully opaque colours in every quadrant mean that any single
/// visible cursor pixel changes the frame checksum, whichever edge it is
/// clipped against.
pub fn cursor_quadrants(cursor: CursorSize) -> [FillRect; 4] {
    let (w, h) = (cursor.width / 2, cursor.height / 2);
    let quadrant = |x, y, color| FillRect {
        x,
        y,
        width: w,
        height: h,
        color,
    };
    [
        quadrant(0, 0, Color::rgba(1.0, 0.0, 0.0, 1.0)),
        quadrant(w, 0, Color::rgba(0.0, 1.0, 0.0, 1.0)),
        quadrant(0, h, Color::rgba(0.0, 0.0, 1.0, 1.0)),
        quadrant(w, h, Color::rgba(0.5, 0.5, 0.5, 1.0)),
    ]
}
