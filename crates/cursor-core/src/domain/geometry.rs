//! Boundary probe geometry.
//!
//! A cursor plane is positioned by its top-left corner.  For a given mode and
//! cursor size there is a rectangle of positions, the [`Envelope`], where the
//! whole cursor is on screen.  Clipping bugs live at the edges of that
//! rectangle, so the probes are generated by pushing the envelope edges
//! outward by carefully chosen amounts and visiting the four corners of the
//! pushed rectangle:
//!
//! ```text
//!   push            cursor pixels still visible on the pushed edge
//!   0               all of them (fully inside)
//!   extent - 2      2
//!   extent - 1      1
//!   extent          0 (fully outside)
//!   extent + 1/2    0, one and two pixels of slack
//!   extent + 512    0, far outside
//! ```
//!
//! Each push is applied to the horizontal edges only, the vertical edges only,
//! and both at once, so single-axis clipping and corner clipping are checked
//! separately.  The enumeration is a plain cartesian product over
//! [`Push`] × [`Axes`] × corner, which keeps the probe list auditable and
//! makes it trivial to add another magnitude.

use std::fmt;

use serde::Serialize;

use super::display::{CursorSize, Mode};

/// Expected relation between a probe's checksum and the cursor-less reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Expectation {
    /// The cursor is entirely clipped; the frame must equal the reference.
    MatchReference,
    /// At least one cursor pixel is visible; the frame must differ.
    DifferFromReference,
}

impl Expectation {
    /// Returns `true` if a capture whose equality with the reference is
    /// `checksums_equal` meets this expectation.
    pub fn is_met(self, checksums_equal: bool) -> bool {
        match self {
            Expectation::MatchReference => checksums_equal,
            Expectation::DifferFromReference => !checksums_equal,
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::MatchReference => f.write_str("equal to the reference"),
            Expectation::DifferFromReference => f.write_str("different from the reference"),
        }
    }
}

/// A single cursor position to test, plus what the checksum must do there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Probe {
    /// Cursor plane X position (may be negative or past the mode width).
    pub x: i32,
    /// Cursor plane Y position (may be negative or past the mode height).
    pub y: i32,
    pub expect: Expectation,
}

impl Probe {
    /// Returns `true` if the capture must equal the reference checksum.
    pub fn must_match(&self) -> bool {
        self.expect == Expectation::MatchReference
    }
}

/// The rectangle of cursor top-left positions that keep the whole cursor on
/// screen.
///
/// `right` and `bottom` are inclusive: a cursor at `(right, bottom)` touches
/// the bottom-right pixel of the mode exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl Envelope {
    /// Derives the envelope for `cursor` on a pipe driven at `mode`.
    ///
    /// The result is not validated: a cursor larger than the mode yields
    /// `right < left`, which callers are expected to have ruled out through
    /// the capability query.
    pub fn new(mode: Mode, cursor: CursorSize) -> Self {
        Self {
            left: 0,
            right: to_i32(mode.width).saturating_sub(to_i32(cursor.width)),
            top: 0,
            bottom: to_i32(mode.height).saturating_sub(to_i32(cursor.height)),
        }
    }

    /// Returns `true` if `(x, y)` lies inside the envelope (edges included).
    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.left..=self.right).contains(&x) && (self.top..=self.bottom).contains(&y)
    }

    /// Moves the left/right edges outward by `dx` and the top/bottom edges
    /// outward by `dy`.  Negative values move them inward.
    pub fn pushed(&self, dx: i32, dy: i32) -> Self {
        Self {
            left: self.left.saturating_sub(dx),
            right: self.right.saturating_add(dx),
            top: self.top.saturating_sub(dy),
            bottom: self.bottom.saturating_add(dy),
        }
    }

    /// The four corners in top-left, top-right, bottom-right, bottom-left order.
    pub fn corners(&self) -> [(i32, i32); 4] {
        [
            (self.left, self.top),
            (self.right, self.top),
            (self.right, self.bottom),
            (self.left, self.bottom),
        ]
    }
}

/// Which pair of envelope edges a [`Push`] moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axes {
    Horizontal,
    Vertical,
    Both,
}

impl Axes {
    /// Every combination, in generation order.
    pub const ALL: [Axes; 3] = [Axes::Horizontal, Axes::Vertical, Axes::Both];

    fn moves_x(self) -> bool {
        matches!(self, Axes::Horizontal | Axes::Both)
    }

    fn moves_y(self) -> bool {
        matches!(self, Axes::Vertical | Axes::Both)
    }
}

/// How far an envelope edge is pushed outward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    /// A fixed number of pixels regardless of cursor size.
    Fixed(i32),
    /// The cursor extent on the pushed axis plus an adjustment.
    Extent(i32),
}

impl Push {
    /// Resolves the push to pixels for a cursor `extent` wide on this axis.
    pub fn pixels(self, extent: i32) -> i32 {
        match self {
            Push::Fixed(px) => px,
            Push::Extent(adjust) => extent.saturating_add(adjust),
        }
    }
}

/// Pushes that leave part of the cursor visible: fully inside, 2 px inside,
/// 1 px inside.
pub const ONSCREEN_PUSHES: [Push; 3] = [Push::Fixed(0), Push::Extent(-2), Push::Extent(-1)];

/// Pushes that clip the cursor entirely: just outside, 1, 2 and 512 px of slack.
pub const OFFSCREEN_PUSHES: [Push; 4] = [
    Push::Extent(0),
    Push::Extent(1),
    Push::Extent(2),
    Push::Extent(512),
];

/// Folds `pushes` × [`Axes::ALL`] × corners into probes sharing `expect`.
///
/// Coinciding positions (for example `extent - 2 == 0` with a 2 px cursor)
/// are kept; re-running a probe is harmless.
pub fn boundary_probes(
    envelope: &Envelope,
    cursor: CursorSize,
    pushes: &[Push],
    expect: Expectation,
) -> Vec<Probe> {
    let (cw, ch) = (to_i32(cursor.width), to_i32(cursor.height));

    pushes
        .iter()
        .flat_map(|push| Axes::ALL.into_iter().map(move |axes| (*push, axes)))
        .flat_map(|(push, axes)| {
            let dx = if axes.moves_x() { push.pixels(cw) } else { 0 };
            let dy = if axes.moves_y() { push.pixels(ch) } else { 0 };
            envelope
                .pushed(dx, dy)
                .corners()
                .map(|(x, y)| Probe { x, y, expect })
        })
        .collect()
}

/// Probes where the cursor is at least partly visible (36 positions).
pub fn onscreen_probes(envelope: &Envelope, cursor: CursorSize) -> Vec<Probe> {
    boundary_probes(
        envelope,
        cursor,
        &ONSCREEN_PUSHES,
        Expectation::DifferFromReference,
    )
}

/// Probes where the cursor is fully clipped (48 positions plus the four
/// extremal corners).
pub fn offscreen_probes(envelope: &Envelope, cursor: CursorSize) -> Vec<Probe> {
    let mut probes = boundary_probes(
        envelope,
        cursor,
        &OFFSCREEN_PUSHES,
        Expectation::MatchReference,
    );
    probes.extend(extremal_probes());
    probes
}

/// The corners of the full `i32` plane.  A driver that computes `x + width`
/// without widening overflows here and wraps the cursor back on screen.
pub fn extremal_probes() -> [Probe; 4] {
    let extremes = Envelope {
        left: i32::MIN,
        right: i32::MAX,
        top: i32::MIN,
        bottom: i32::MAX,
    };
    extremes.corners().map(|(x, y)| Probe {
        x,
        y,
        expect: Expectation::MatchReference,
    })
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
