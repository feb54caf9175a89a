//! Infrastructure layer for the cursor CRC test.
//!
//! Contains the concrete adapters: the TOML configuration loader, the
//! simulated display device, and the JSON results writer.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `cursor_core`, but MUST NOT be imported by the `application` layer.

pub mod config;
pub mod results;
pub mod sim;
