//! # cursor-core
//!
//! Shared domain logic for validating hardware cursor clipping with per-frame
//! checksums.
//!
//! The test places a cursor at positions straddling the visible edge of the
//! screen and compares the frame CRC with a reference captured while the
//! cursor is disabled.  Where any cursor pixel is visible the CRC must differ;
//! where the cursor is fully clipped it must match.  This crate decides *which*
//! positions to try and *what* each one must produce:
//!
//! - **`geometry`** – The [`Envelope`] of fully-visible positions and the
//!   on-screen / off-screen probe tables derived from it.
//! - **`subtest`** – The `cursor-<size>-<variant>` subtests and the cursor
//!   size sequence bounded by the hardware limit.
//! - **`checksum`** – The opaque per-frame [`Checksum`].
//! - **`image`** – The four-quadrant cursor pattern.
//! - **`display`** – Pipe, output, and mode value types.
//!
//! It has no dependency on any display API; the `cursor-crc` crate supplies
//! the device.

pub mod domain;

pub use domain::checksum::Checksum;
pub use domain::display::{
    AsymmetricCursorCaps, CursorCaps, CursorSize, Mode, OutputId, OutputInfo, Pipe, PlaneKind,
};
pub use domain::geometry::{
    extremal_probes, offscreen_probes, onscreen_probes, Envelope, Expectation, Probe,
};
pub use domain::image::{cursor_quadrants, Color, FillRect, PixelFormat};
pub use domain::subtest::{
    cursor_sizes, registered_subtests, SubtestFilter, SubtestName, SubtestNameError, TestVariant,
    MIN_CURSOR_SIZE,
};
