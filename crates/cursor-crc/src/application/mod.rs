//! Application layer use cases for the cursor CRC test.
//!
//! Everything here talks to the display stack through the
//! [`display_device::DisplayDevice`] port and nothing else, so the same code
//! runs against the simulated device and against `MockDisplayDevice` in unit
//! tests.
//!
//! # Sub-modules
//!
//! - **`display_device`** – The port trait, framebuffer/CRC handles, and the
//!   device error type.
//!
//! - **`cursor_image`** – Creates the four-quadrant cursor framebuffer.
//!
//! - **`execute_probe`** – One cursor position, one frame, one CRC verdict.
//!   This runs for every probe of every subtest, so it stays small.
//!
//! - **`pipe_session`** – Brings one output up on one pipe, captures the
//!   reference CRC, runs probes, and tears everything down again.
//!
//! - **`run_subtests`** – The driver: cursor sizes, subtest registration and
//!   filtering, outcomes, and exit status.

pub mod cursor_image;
pub mod display_device;
pub mod execute_probe;
pub mod pipe_session;
pub mod run_subtests;
