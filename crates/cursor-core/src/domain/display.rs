//! Display topology value types: pipes, outputs, modes, and cursor limits.
//!
//! These are the nouns shared between the probe geometry and the device port.
//! None of them own hardware resources; they are cheap `Copy`/`Clone` values
//! describing *which* pipe or output an operation targets.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A display pipe (CRTC) index.
///
/// Pipes are printed as letters, the way display drivers name them in their
/// logs: pipe 0 is `A`, pipe 1 is `B`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pipe(pub u32);

impl Pipe {
    /// Returns the zero-based pipe index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 26 {
            write!(f, "{}", char::from(b'A' + self.0 as u8))
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Identifies a connector/output on the display device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputId(pub u32);

/// A display mode's visible resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    /// Horizontal active pixels (`hdisplay`).
    pub width: u32,
    /// Vertical active lines (`vdisplay`).
    pub height: u32,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A connected output as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    /// Device-level identifier used in plane/pipe calls.
    pub id: OutputId,
    /// Connector name, e.g. `HDMI-A-1` or `eDP-1`.
    pub name: String,
    /// The mode the output is driven at.
    pub mode: Mode,
}

/// The two planes the test touches on every pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneKind {
    Primary,
    Cursor,
}

impl fmt::Display for PlaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaneKind::Primary => f.write_str("primary"),
            PlaneKind::Cursor => f.write_str("cursor"),
        }
    }
}

/// Width and height of a cursor image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorSize {
    pub width: u32,
    pub height: u32,
}

impl CursorSize {
    /// A square cursor of `size`×`size` pixels.
    pub fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }
}

impl fmt::Display for CursorSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// The largest cursor the hardware can scan out, as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorCaps {
    pub max_width: u32,
    pub max_height: u32,
}

/// Returned when the device reports a non-square cursor limit.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("cursor limits must be square: max width {width} != max height {height}")]
pub struct AsymmetricCursorCaps {
    pub width: u32,
    pub height: u32,
}

impl CursorCaps {
    /// Returns the maximum square cursor edge.
    ///
    /// # Errors
    ///
    /// Returns [`AsymmetricCursorCaps`] when width and height differ; every
    /// cursor size tested is square, so a mismatched limit is unusable.
    pub fn max_square(&self) -> Result<u32, AsymmetricCursorCaps> {
        if self.max_width == self.max_height {
            Ok(self.max_width)
        } else {
            Err(AsymmetricCursorCaps {
                width: self.max_width,
                height: self.max_height,
            })
        }
    }
}
