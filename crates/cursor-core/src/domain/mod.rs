//! Domain entities for cursor plane CRC testing.
//!
//! Everything here is pure computation: no device handles, no file system, no
//! logging.  The application layer in `cursor-crc` drives a display device
//! with the probes produced here and judges the captured checksums with the
//! rules defined here.

/// Checksum values and their equality rule.
pub mod checksum;

/// Pipes, outputs, modes, and cursor limits.
pub mod display;

/// Envelope and boundary probe generation.
pub mod geometry;

/// Pixel formats, colours, and the cursor test pattern.
pub mod image;

/// Subtest names, cursor size sequence, and selection.
pub mod subtest;
