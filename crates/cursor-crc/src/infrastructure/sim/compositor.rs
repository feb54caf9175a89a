//! Software scanout: framebuffers, plane composition, and frame CRCs.
//!
//! A frame is composed row by row into a scratch buffer (primary plane, then
//! the cursor alpha-blended on top), each row is reduced to runs of equal
//! colour, and the runs feed one CRC-32 per colour channel.

use std::sync::Arc;

use cursor_core::{Checksum, FillRect, Mode, PixelFormat};
use serde::{Deserialize, Serialize};

/// Misbehaviour injected into cursor clipping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClipFault {
    /// Clip correctly.
    #[default]
    None,
    /// A cursor that is not entirely on screen is not drawn at all.
    HidePartial,
    /// Every clipped edge loses one more pixel than it should.
    ShortByOne,
    /// Positions are truncated to 16 bits before clipping.
    #[serde(rename = "wrap-16bit")]
    Wrap16Bit,
}

/// Pixel storage for one framebuffer, as `0xAARRGGBB` words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u32>,
}

impl Framebuffer {
    /// A framebuffer where every pixel is `argb`.
    pub fn filled(width: u32, height: u32, format: PixelFormat, argb: u32) -> Self {
        Self {
            width,
            height,
            format,
            pixels: vec![normalize(format, argb); width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Overwrites `rect` with its colour; parts outside the buffer are dropped.
    pub fn fill(&mut self, rect: &FillRect) {
        let argb = normalize(self.format, rect.color.to_argb8888());
        let x0 = rect.x.min(self.width) as usize;
        let x1 = rect.x.saturating_add(rect.width).min(self.width) as usize;
        let y0 = rect.y.min(self.height) as usize;
        let y1 = rect.y.saturating_add(rect.height).min(self.height) as usize;
        let stride = self.width as usize;

        for row in self.pixels.chunks_mut(stride).take(y1).skip(y0) {
            row[x0..x1].fill(argb);
        }
    }

    fn row(&self, y: usize) -> &[u32] {
        let stride = self.width as usize;
        &self.pixels[y * stride..(y + 1) * stride]
    }
}

/// XRGB has no alpha; store it as opaque.
fn normalize(format: PixelFormat, argb: u32) -> u32 {
    if format.has_alpha() {
        argb
    } else {
        argb | 0xff00_0000
    }
}

/// A cursor plane latched for scanout.
#[derive(Debug, Clone)]
pub struct CursorScanout {
    pub fb: Arc<Framebuffer>,
    pub x: i32,
    pub y: i32,
}

/// What a pipe scans out between two vblanks.
#[derive(Debug, Clone)]
pub struct Scanout {
    pub mode: Mode,
    pub primary: Option<Arc<Framebuffer>>,
    pub cursor: Option<CursorScanout>,
}

/// Visible part of the cursor, in screen and cursor coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CursorClip {
    screen_x: usize,
    screen_y: usize,
    src_x: usize,
    src_y: usize,
    width: usize,
    height: usize,
}

/// Intersects a `size`-long span starting at `pos` with `0..limit`.
///
/// Returns `(start, end)` in screen coordinates, possibly empty.
fn clip_span(pos: i64, size: i64, limit: i64, fault: ClipFault) -> (i64, i64) {
    let mut start = pos.max(0);
    let mut end = (pos + size).min(limit);
    if fault == ClipFault::ShortByOne {
        if pos < 0 {
            start += 1;
        }
        if pos + size > limit {
            end -= 1;
        }
    }
    (start, end)
}

fn clip_cursor(mode: Mode, cursor: &CursorScanout, fault: ClipFault) -> Option<CursorClip> {
    let (x, y) = match fault {
        ClipFault::Wrap16Bit => (i64::from(cursor.x as i16), i64::from(cursor.y as i16)),
        _ => (i64::from(cursor.x), i64::from(cursor.y)),
    };
    let (cw, ch) = (i64::from(cursor.fb.width), i64::from(cursor.fb.height));

    let (x0, x1) = clip_span(x, cw, i64::from(mode.width), fault);
    let (y0, y1) = clip_span(y, ch, i64::from(mode.height), fault);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    let fully_visible = x0 == x && x1 == x + cw && y0 == y && y1 == y + ch;
    if fault == ClipFault::HidePartial && !fully_visible {
        return None;
    }

    // All four values lie in 0..=mode dimension here.
    Some(CursorClip {
        screen_x: x0 as usize,
        screen_y: y0 as usize,
        src_x: (x0 - x) as usize,
        src_y: (y0 - y) as usize,
        width: (x1 - x0) as usize,
        height: (y1 - y0) as usize,
    })
}

/// Source-over blend of one ARGB pixel onto an opaque one.
fn blend(src: u32, dst: u32) -> u32 {
    let alpha = src >> 24;
    match alpha {
        0xff => src,
        0 => dst,
        _ => {
            let channel = |shift: u32| {
                let s = (src >> shift) & 0xff;
                let d = (dst >> shift) & 0xff;
                ((s * alpha + d * (255 - alpha) + 127) / 255) << shift
            };
            0xff00_0000 | channel(16) | channel(8) | channel(0)
        }
    }
}

/// Per-channel CRC-32 of run-length encoded scanlines.
struct FrameHasher {
    channels: [crc32fast::Hasher; 3],
}

impl FrameHasher {
    fn new() -> Self {
        Self {
            channels: [
                crc32fast::Hasher::new(),
                crc32fast::Hasher::new(),
                crc32fast::Hasher::new(),
            ],
        }
    }

    fn run(&mut self, argb: u32, len: u32) {
        let len = len.to_le_bytes();
        for (hasher, shift) in self.channels.iter_mut().zip([16u32, 8, 0]) {
            hasher.update(&[((argb >> shift) & 0xff) as u8]);
            hasher.update(&len);
        }
    }

    fn row(&mut self, pixels: &[u32]) {
        let mut iter = pixels.iter().copied();
        let Some(mut current) = iter.next() else {
            return;
        };
        let mut len = 1u32;
        for px in iter {
            // The alpha byte is not part of the displayed colour.
            if px & 0x00ff_ffff == current & 0x00ff_ffff {
                len += 1;
            } else {
                self.run(current, len);
                current = px;
                len = 1;
            }
        }
        self.run(current, len);
    }

    fn finish(self) -> Vec<u32> {
        self.channels.into_iter().map(|h| h.finalize()).collect()
    }
}

/// Composes `scanout` and returns its checksum stamped with `frame`.
pub fn frame_crc(scanout: &Scanout, frame: u32, fault: ClipFault) -> Checksum {
    let Mode { width, height } = scanout.mode;
    let (width, height) = (width as usize, height as usize);
    let cursor = scanout
        .cursor
        .as_ref()
        .and_then(|c| clip_cursor(scanout.mode, c, fault).map(|clip| (c, clip)));

    let mut hasher = FrameHasher::new();
    let mut line = vec![0xff00_0000u32; width];

    for y in 0..height {
        match &scanout.primary {
            Some(fb) if y < fb.height as usize => {
                let src = fb.row(y);
                let n = width.min(src.len());
                line[..n].copy_from_slice(&src[..n]);
                line[n..].fill(0xff00_0000);
            }
            _ => line.fill(0xff00_0000),
        }

        if let Some((plane, clip)) = &cursor {
            if (clip.screen_y..clip.screen_y + clip.height).contains(&y) {
                let src = plane.fb.row(clip.src_y + (y - clip.screen_y));
                let src = &src[clip.src_x..clip.src_x + clip.width];
                let dst = &mut line[clip.screen_x..clip.screen_x + clip.width];
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = blend(*s, *d);
                }
            }
        }

        hasher.row(&line);
    }

    Checksum::new(frame, hasher.finish())
}
