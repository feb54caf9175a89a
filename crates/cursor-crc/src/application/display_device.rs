//! The display device port.
//!
//! Everything the test needs from the display stack goes through
//! [`DisplayDevice`]: output/pipe enumeration, plane setup and commit,
//! framebuffer allocation and painting, vblank waits, and CRC capture.  The
//! application layer depends only on this trait; the simulated device in
//! `infrastructure::sim` implements it, and unit tests use the generated
//! `MockDisplayDevice`.
//!
//! # Staged state and commit
//!
//! `set_output_pipe`, `set_plane_fb` and `set_plane_position` only *stage*
//! changes.  Nothing reaches the screen until [`DisplayDevice::commit`], and
//! a committed change is only guaranteed to be in a captured frame after the
//! next [`DisplayDevice::wait_for_vblank`] on that pipe.

use cursor_core::{
    Checksum, Color, CursorCaps, FillRect, OutputId, OutputInfo, Pipe, PixelFormat, PlaneKind,
};
use thiserror::Error;

/// Opaque handle to a framebuffer allocated on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FbHandle(pub u32);

/// An open per-pipe CRC source.
///
/// Not `Clone`: whoever holds the value owns the source and must hand it back
/// through [`DisplayDevice::close_crc_source`].
#[derive(Debug, PartialEq, Eq)]
pub struct CrcSource {
    pipe: Pipe,
    id: u32,
}

impl CrcSource {
    pub fn new(pipe: Pipe, id: u32) -> Self {
        Self { pipe, id }
    }

    /// The pipe whose output this source checksums.
    pub fn pipe(&self) -> Pipe {
        self.pipe
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

/// Errors reported by a [`DisplayDevice`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("capability query failed: {0}")]
    CapabilityQuery(String),

    #[error("unknown output {0:?}")]
    UnknownOutput(OutputId),

    #[error("pipe {0} does not exist")]
    UnknownPipe(Pipe),

    #[error("framebuffer {0:?} does not exist")]
    UnknownFramebuffer(FbHandle),

    #[error("invalid framebuffer request: {0}")]
    InvalidFramebuffer(String),

    /// The staged configuration cannot be applied.
    #[error("commit rejected: {0}")]
    CommitRejected(String),

    #[error("pipe {0} is not driving any output")]
    PipeInactive(Pipe),

    #[error("CRC source already open on pipe {0}")]
    CrcBusy(Pipe),

    #[error("CRC source {id} on pipe {pipe} is not open")]
    StaleCrcSource { pipe: Pipe, id: u32 },

    #[error("no frame has been scanned out on pipe {0} yet")]
    NoFrame(Pipe),
}

/// The display stack as seen by the cursor CRC test.
#[cfg_attr(test, mockall::automock)]
pub trait DisplayDevice {
    /// Largest cursor the hardware can scan out.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::CapabilityQuery`] if the device cannot report it.
    fn cursor_caps(&self) -> Result<CursorCaps, DeviceError>;

    /// Outputs with a display attached, in connector order.
    fn connected_outputs(&self) -> Vec<OutputInfo>;

    /// Number of pipes; valid pipes are `Pipe(0)..Pipe(pipe_count)`.
    fn pipe_count(&self) -> u32;

    /// Stages routing `output` through `pipe`, or detaches it with `None`.
    fn set_output_pipe(&mut self, output: OutputId, pipe: Option<Pipe>) -> Result<(), DeviceError>;

    /// Stages attaching `fb` to a plane of `output`, or disabling the plane with `None`.
    fn set_plane_fb(
        &mut self,
        output: OutputId,
        plane: PlaneKind,
        fb: Option<FbHandle>,
    ) -> Result<(), DeviceError>;

    /// Stages a plane position.  Any `i32` is accepted; clipping is the
    /// device's job.
    fn set_plane_position(
        &mut self,
        output: OutputId,
        plane: PlaneKind,
        x: i32,
        y: i32,
    ) -> Result<(), DeviceError>;

    /// Applies all staged changes atomically.
    fn commit(&mut self) -> Result<(), DeviceError>;

    /// Allocates a framebuffer filled with a single colour.
    fn create_color_fb(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        color: Color,
    ) -> Result<FbHandle, DeviceError>;

    /// Allocates a zero-filled (transparent) framebuffer for drawing.
    fn create_fb(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<FbHandle, DeviceError>;

    /// Paints solid rectangles into `fb` without antialiasing or blending.
    fn fill_rects(&mut self, fb: FbHandle, rects: &[FillRect]) -> Result<(), DeviceError>;

    /// Frees `fb`.  Planes still using it are disabled.
    fn remove_fb(&mut self, fb: FbHandle) -> Result<(), DeviceError>;

    /// Blocks until the next vertical blank on `pipe`.
    fn wait_for_vblank(&mut self, pipe: Pipe) -> Result<(), DeviceError>;

    /// Opens the CRC source for `pipe`.
    ///
    /// Returns `Ok(None)` when the pipe/connector combination cannot produce
    /// CRCs; that is a configuration to skip, not an error.
    fn open_crc_source(&mut self, pipe: Pipe) -> Result<Option<CrcSource>, DeviceError>;

    /// Returns the checksum of the most recently scanned-out frame.
    fn collect_crc(&mut self, source: &CrcSource) -> Result<Checksum, DeviceError>;

    /// Releases a CRC source.
    fn close_crc_source(&mut self, source: CrcSource) -> Result<(), DeviceError>;
}
