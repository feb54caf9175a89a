//! PipeSession: one output driven by one pipe, ready to run probes.
//!
//! # Lifecycle
//!
//! ```text
//! prepare() ──► Prepared ──► run() ... run() ──► teardown()
//!    │
//!    └─ CRC unsupported ──► output restored, Ok(None)
//! ```
//!
//! `prepare` selects the pipe, scans out a black primary framebuffer the size
//! of the mode, opens the pipe's CRC source, and captures the reference CRC
//! with the cursor disabled.  The session borrows the device mutably for its
//! whole life, so only one session can exist at a time.
//!
//! `teardown` consumes the session.  Callers run it even when probes failed,
//! so the next pipe/output combination starts from a clean device.

use cursor_core::{
    Checksum, Color, CursorSize, Envelope, OutputId, OutputInfo, Pipe, PixelFormat, PlaneKind,
    Probe, TestVariant,
};
use thiserror::Error;
use tracing::{debug, warn};

use super::display_device::{CrcSource, DeviceError, DisplayDevice, FbHandle};
use super::execute_probe::{disable_cursor, execute_probe, ProbeError, ProbeTarget};

/// Error type for session setup and teardown.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to prepare pipe {pipe} on connector {connector}: {source}")]
    Prepare {
        pipe: Pipe,
        connector: String,
        #[source]
        source: DeviceError,
    },

    #[error("failed to tear down pipe {pipe} on connector {connector}: {source}")]
    Teardown {
        pipe: Pipe,
        connector: String,
        #[source]
        source: DeviceError,
    },
}

/// A prepared pipe/output combination.
pub struct PipeSession<'d, D: DisplayDevice + ?Sized> {
    device: &'d mut D,
    output: OutputInfo,
    pipe: Pipe,
    cursor: CursorSize,
    cursor_fb: FbHandle,
    primary_fb: FbHandle,
    crc: CrcSource,
    reference: Checksum,
    envelope: Envelope,
}

impl<'d, D: DisplayDevice + ?Sized> PipeSession<'d, D> {
    /// Brings `output` up on `pipe` and captures the cursor-less reference CRC.
    ///
    /// Returns `Ok(None)` when the pipe cannot produce CRCs for this output;
    /// the output is detached again before returning.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Prepare`] if any device call fails.  Resources
    /// acquired up to that point are released on a best-effort basis.
    pub fn prepare(
        device: &'d mut D,
        output: &OutputInfo,
        pipe: Pipe,
        cursor: CursorSize,
        cursor_fb: FbHandle,
    ) -> Result<Option<Self>, SessionError> {
        let prepare_err = |source: DeviceError| SessionError::Prepare {
            pipe,
            connector: output.name.clone(),
            source,
        };
        let mode = output.mode;

        device
            .set_output_pipe(output.id, Some(pipe))
            .map_err(prepare_err)?;
        let primary_fb = device
            .create_color_fb(mode.width, mode.height, PixelFormat::Xrgb8888, Color::BLACK)
            .map_err(prepare_err)?;

        let crc = match open_crc(device, output.id, pipe, primary_fb) {
            Ok(Some(crc)) => crc,
            Ok(None) => {
                warn!(
                    "CRC not supported on connector {} with pipe {pipe}, skipping",
                    output.name
                );
                release(device, output.id, primary_fb, None).map_err(prepare_err)?;
                return Ok(None);
            }
            Err(e) => {
                abandon(device, output.id, primary_fb, None);
                return Err(prepare_err(e));
            }
        };

        let reference = match capture_reference(device, output.id, pipe, &crc) {
            Ok(reference) => reference,
            Err(e) => {
                abandon(device, output.id, primary_fb, Some(crc));
                return Err(prepare_err(e));
            }
        };

        let envelope = Envelope::new(mode, cursor);
        debug!(
            pipe = %pipe,
            connector = %output.name,
            mode = %mode,
            reference = %reference,
            ?envelope,
            "session prepared"
        );

        Ok(Some(Self {
            device,
            output: output.clone(),
            pipe,
            cursor,
            cursor_fb,
            primary_fb,
            crc,
            reference,
            envelope,
        }))
    }

    pub fn output(&self) -> &OutputInfo {
        &self.output
    }

    pub fn pipe(&self) -> Pipe {
        self.pipe
    }

    /// Positions that keep the whole cursor on this output.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The CRC captured with the cursor disabled.
    pub fn reference(&self) -> &Checksum {
        &self.reference
    }

    /// Captures a fresh cursor-less CRC without replacing the stored reference.
    pub fn capture_reference(&mut self) -> Result<Checksum, DeviceError> {
        capture_reference(&mut *self.device, self.output.id, self.pipe, &self.crc)
    }

    /// Runs every probe of `variant` and returns how many were executed.
    ///
    /// # Errors
    ///
    /// Stops at the first failing probe and returns its error.
    pub fn run(&mut self, variant: TestVariant) -> Result<usize, ProbeError> {
        let probes = variant.probes(&self.envelope, self.cursor);
        self.run_probes(&probes)?;
        Ok(probes.len())
    }

    /// Runs `probes` in order, stopping at the first failure.
    pub fn run_probes(&mut self, probes: &[Probe]) -> Result<(), ProbeError> {
        let target = ProbeTarget {
            output: &self.output,
            pipe: self.pipe,
            cursor_fb: self.cursor_fb,
            crc: &self.crc,
            reference: &self.reference,
        };
        for probe in probes {
            execute_probe(&mut *self.device, &target, probe)?;
        }
        Ok(())
    }

    /// Releases the CRC source, the primary framebuffer, and the pipe.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Teardown`] if the device refuses a step.
    pub fn teardown(self) -> Result<(), SessionError> {
        let PipeSession {
            device,
            output,
            pipe,
            primary_fb,
            crc,
            ..
        } = self;

        release(device, output.id, primary_fb, Some(crc)).map_err(|source| {
            SessionError::Teardown {
                pipe,
                connector: output.name.clone(),
                source,
            }
        })?;
        debug!(pipe = %pipe, connector = %output.name, "session torn down");
        Ok(())
    }
}

/// Scans out the primary framebuffer and opens the pipe's CRC source.
fn open_crc<D: DisplayDevice + ?Sized>(
    device: &mut D,
    output: OutputId,
    pipe: Pipe,
    primary_fb: FbHandle,
) -> Result<Option<CrcSource>, DeviceError> {
    device.set_plane_fb(output, PlaneKind::Primary, Some(primary_fb))?;
    device.commit()?;
    device.open_crc_source(pipe)
}

/// Disables the cursor, lets one frame scan out, and captures its CRC.
fn capture_reference<D: DisplayDevice + ?Sized>(
    device: &mut D,
    output: OutputId,
    pipe: Pipe,
    crc: &CrcSource,
) -> Result<Checksum, DeviceError> {
    disable_cursor(device, output)?;
    device.wait_for_vblank(pipe)?;
    device.collect_crc(crc)
}

/// Undoes [`PipeSession::prepare`]: CRC source, primary fb, primary plane, pipe.
fn release<D: DisplayDevice + ?Sized>(
    device: &mut D,
    output: OutputId,
    primary_fb: FbHandle,
    crc: Option<CrcSource>,
) -> Result<(), DeviceError> {
    if let Some(crc) = crc {
        device.close_crc_source(crc)?;
    }
    device.remove_fb(primary_fb)?;
    device.set_plane_fb(output, PlaneKind::Primary, None)?;
    device.set_output_pipe(output, None)?;
    device.commit()
}

/// [`release`] on an error path, where the first error is the one to report.
fn abandon<D: DisplayDevice + ?Sized>(
    device: &mut D,
    output: OutputId,
    primary_fb: FbHandle,
    crc: Option<CrcSource>,
) {
    if let Err(e) = release(device, output, primary_fb, crc) {
        warn!("cleanup after failed prepare also failed: {e}");
    }
}
