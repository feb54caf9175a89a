//! In-process display controller implementing [`DisplayDevice`].
//!
//! The simulation keeps two copies of the output configuration: *staged*
//! (edited by the `set_*` calls) and *committed* (published by `commit`).  A
//! pipe only scans out committed state, and only from the moment of its next
//! vblank, so a CRC collected after `commit` + `wait_for_vblank` reflects
//! exactly that commit and nothing staged afterwards.
//!
//! Faults from the `[faults]` config section let the test suite prove that
//! the probe tables really catch clipping bugs.

mod compositor;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cursor_core::{
    Checksum, Color, CursorCaps, FillRect, Mode, OutputId, OutputInfo, Pipe, PixelFormat,
    PlaneKind,
};
use tracing::{debug, trace};

use crate::application::display_device::{CrcSource, DeviceError, DisplayDevice, FbHandle};
use crate::infrastructure::config::AppConfig;

pub use compositor::ClipFault;
use compositor::{frame_crc, CursorScanout, Framebuffer, Scanout};

/// Largest framebuffer edge the simulated device will allocate.
pub const MAX_FB_DIMENSION: u32 = 16384;

#[derive(Debug, Clone, Copy, Default)]
struct PlaneState {
    fb: Option<FbHandle>,
    x: i32,
    y: i32,
}

#[derive(Debug, Clone, Copy, Default)]
struct OutputState {
    pipe: Option<Pipe>,
    primary: PlaneState,
    cursor: PlaneState,
}

impl OutputState {
    fn is_disabled(&self) -> bool {
        self.pipe.is_none() && self.primary.fb.is_none() && self.cursor.fb.is_none()
    }

    fn plane_mut(&mut self, plane: PlaneKind) -> &mut PlaneState {
        match plane {
            PlaneKind::Primary => &mut self.primary,
            PlaneKind::Cursor => &mut self.cursor,
        }
    }
}

#[derive(Debug)]
struct SimOutput {
    info: OutputInfo,
    staged: OutputState,
    committed: OutputState,
}

#[derive(Debug, Default)]
struct PipeState {
    frame: u32,
    scanout: Option<Scanout>,
    crc_source: Option<u32>,
}

/// A display controller with fixed outputs, backed by software composition.
#[derive(Debug)]
pub struct SimulatedDisplay {
    caps: CursorCaps,
    outputs: Vec<SimOutput>,
    pipes: Vec<PipeState>,
    framebuffers: HashMap<FbHandle, Arc<Framebuffer>>,
    next_fb: u32,
    next_crc_source: u32,
    crc_unsupported: HashSet<Pipe>,
    clip_fault: ClipFault,
    commits: u64,
}

impl SimulatedDisplay {
    /// A device with `pipes` pipes and no outputs.
    pub fn new(caps: CursorCaps, pipes: u32) -> Self {
        Self {
            caps,
            outputs: Vec::new(),
            pipes: (0..pipes).map(|_| PipeState::default()).collect(),
            framebuffers: HashMap::new(),
            next_fb: 1,
            next_crc_source: 1,
            crc_unsupported: HashSet::new(),
            clip_fault: ClipFault::None,
            commits: 0,
        }
    }

    /// Builds the device described by `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let caps = CursorCaps {
            max_width: config.device.max_cursor_width,
            max_height: config.device.max_cursor_height,
        };
        let mut device = config.outputs.iter().fold(
            Self::new(caps, config.device.pipes),
            |device, output| {
                device.with_output(
                    &output.name,
                    Mode {
                        width: output.width,
                        height: output.height,
                    },
                )
            },
        );
        for &pipe in &config.faults.crc_unsupported_pipes {
            device = device.with_crc_unsupported(Pipe(pipe));
        }
        device.with_clip_fault(config.faults.cursor_clip)
    }

    /// Connects an output with a fixed `mode`.
    pub fn with_output(mut self, name: &str, mode: Mode) -> Self {
        let id = OutputId(self.outputs.len() as u32 + 1);
        self.outputs.push(SimOutput {
            info: OutputInfo {
                id,
                name: name.to_string(),
                mode,
            },
            staged: OutputState::default(),
            committed: OutputState::default(),
        });
        self
    }

    /// Makes `pipe` report that it cannot produce CRCs.
    pub fn with_crc_unsupported(mut self, pipe: Pipe) -> Self {
        self.crc_unsupported.insert(pipe);
        self
    }

    pub fn with_clip_fault(mut self, fault: ClipFault) -> Self {
        self.clip_fault = fault;
        self
    }

    /// Number of successful commits so far.
    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Number of framebuffers currently allocated.
    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    /// Number of CRC sources currently open.
    pub fn open_crc_sources(&self) -> usize {
        self.pipes.iter().filter(|p| p.crc_source.is_some()).count()
    }

    /// Returns `true` if no output has a pipe or an enabled plane, staged or
    /// committed.
    pub fn is_idle(&self) -> bool {
        self.outputs
            .iter()
            .all(|o| o.staged.is_disabled() && o.committed.is_disabled())
    }

    fn output_mut(&mut self, id: OutputId) -> Result<&mut SimOutput, DeviceError> {
        self.outputs
            .iter_mut()
            .find(|o| o.info.id == id)
            .ok_or(DeviceError::UnknownOutput(id))
    }

    fn pipe_mut(&mut self, pipe: Pipe) -> Result<&mut PipeState, DeviceError> {
        self.pipes
            .get_mut(pipe.index())
            .ok_or(DeviceError::UnknownPipe(pipe))
    }

    fn fb(&self, handle: FbHandle) -> Result<&Arc<Framebuffer>, DeviceError> {
        self.framebuffers
            .get(&handle)
            .ok_or(DeviceError::UnknownFramebuffer(handle))
    }

    fn add_fb(&mut self, fb: Framebuffer) -> FbHandle {
        let handle = FbHandle(self.next_fb);
        self.next_fb += 1;
        self.framebuffers.insert(handle, Arc::new(fb));
        handle
    }

    /// The committed output driven by `pipe`, if any.
    fn output_on_pipe(&self, pipe: Pipe) -> Option<&SimOutput> {
        self.outputs.iter().find(|o| o.committed.pipe == Some(pipe))
    }

    /// Checks a staged configuration before it is published.
    fn validate_staged(&self) -> Result<(), DeviceError> {
        let mut used = HashSet::new();
        for output in &self.outputs {
            let state = &output.staged;
            let name = &output.info.name;

            if let Some(pipe) = state.pipe {
                if !used.insert(pipe) {
                    return Err(DeviceError::CommitRejected(format!(
                        "pipe {pipe} drives more than one output"
                    )));
                }
            } else if state.primary.fb.is_some() || state.cursor.fb.is_some() {
                return Err(DeviceError::CommitRejected(format!(
                    "{name} has an enabled plane but no pipe"
                )));
            }

            if let Some(handle) = state.primary.fb {
                self.fb(handle)?;
            }
            if let Some(handle) = state.cursor.fb {
                let fb = self.fb(handle)?;
                if fb.width() > self.caps.max_width || fb.height() > self.caps.max_height {
                    return Err(DeviceError::CommitRejected(format!(
                        "{name}: cursor {}x{} exceeds the {}x{} limit",
                        fb.width(),
                        fb.height(),
                        self.caps.max_width,
                        self.caps.max_height
                    )));
                }
            }
        }
        Ok(())
    }

    fn checked_dimensions(width: u32, height: u32) -> Result<(), DeviceError> {
        if width == 0 || height == 0 || width > MAX_FB_DIMENSION || height > MAX_FB_DIMENSION {
            return Err(DeviceError::InvalidFramebuffer(format!(
                "{width}x{height} is outside 1..={MAX_FB_DIMENSION}"
            )));
        }
        Ok(())
    }
}

impl DisplayDevice for SimulatedDisplay {
    fn cursor_caps(&self) -> Result<CursorCaps, DeviceError> {
        Ok(self.caps)
    }

    fn connected_outputs(&self) -> Vec<OutputInfo> {
        self.outputs.iter().map(|o| o.info.clone()).collect()
    }

    fn pipe_count(&self) -> u32 {
        self.pipes.len() as u32
    }

    fn set_output_pipe(&mut self, output: OutputId, pipe: Option<Pipe>) -> Result<(), DeviceError> {
        if let Some(pipe) = pipe {
            self.pipe_mut(pipe)?;
        }
        self.output_mut(output)?.staged.pipe = pipe;
        Ok(())
    }

    fn set_plane_fb(
        &mut self,
        output: OutputId,
        plane: PlaneKind,
        fb: Option<FbHandle>,
    ) -> Result<(), DeviceError> {
        if let Some(handle) = fb {
            self.fb(handle)?;
        }
        self.output_mut(output)?.staged.plane_mut(plane).fb = fb;
        Ok(())
    }

    fn set_plane_position(
        &mut self,
        output: OutputId,
        plane: PlaneKind,
        x: i32,
        y: i32,
    ) -> Result<(), DeviceError> {
        let state = self.output_mut(output)?.staged.plane_mut(plane);
        state.x = x;
        state.y = y;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DeviceError> {
        self.validate_staged()?;
        for output in &mut self.outputs {
            output.committed = output.staged;
        }
        self.commits += 1;
        trace!(commit = self.commits, "committed");
        Ok(())
    }

    fn create_color_fb(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        color: Color,
    ) -> Result<FbHandle, DeviceError> {
        Self::checked_dimensions(width, height)?;
        let handle = self.add_fb(Framebuffer::filled(width, height, format, color.to_argb8888()));
        debug!(fb = handle.0, width, height, %format, "created colour framebuffer");
        Ok(handle)
    }

    fn create_fb(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<FbHandle, DeviceError> {
        Self::checked_dimensions(width, height)?;
        let handle = self.add_fb(Framebuffer::filled(width, height, format, 0));
        debug!(fb = handle.0, width, height, %format, "created framebuffer");
        Ok(handle)
    }

    fn fill_rects(&mut self, fb: FbHandle, rects: &[FillRect]) -> Result<(), DeviceError> {
        let fb = self
            .framebuffers
            .get_mut(&fb)
            .ok_or(DeviceError::UnknownFramebuffer(fb))?;
        let pixels = Arc::make_mut(fb);
        for rect in rects {
            pixels.fill(rect);
        }
        Ok(())
    }

    fn remove_fb(&mut self, fb: FbHandle) -> Result<(), DeviceError> {
        self.framebuffers
            .remove(&fb)
            .ok_or(DeviceError::UnknownFramebuffer(fb))?;

        for output in &mut self.outputs {
            for state in [&mut output.staged, &mut output.committed] {
                for plane in [&mut state.primary, &mut state.cursor] {
                    if plane.fb == Some(fb) {
                        plane.fb = None;
                    }
                }
            }
        }
        debug!(fb = fb.0, "removed framebuffer");
        Ok(())
    }

    fn wait_for_vblank(&mut self, pipe: Pipe) -> Result<(), DeviceError> {
        self.pipe_mut(pipe)?;
        let output = self
            .output_on_pipe(pipe)
            .ok_or(DeviceError::PipeInactive(pipe))?;

        let state = output.committed;
        let primary = state.primary.fb.map(|h| self.fb(h).cloned()).transpose()?;
        let cursor = state
            .cursor
            .fb
            .map(|h| {
                self.fb(h).map(|fb| CursorScanout {
                    fb: Arc::clone(fb),
                    x: state.cursor.x,
                    y: state.cursor.y,
                })
            })
            .transpose()?;
        let scanout = Scanout {
            mode: output.info.mode,
            primary,
            cursor,
        };

        let pipe_state = self.pipe_mut(pipe)?;
        pipe_state.frame = pipe_state.frame.wrapping_add(1);
        pipe_state.scanout = Some(scanout);
        Ok(())
    }

    fn open_crc_source(&mut self, pipe: Pipe) -> Result<Option<CrcSource>, DeviceError> {
        self.pipe_mut(pipe)?;
        if self.crc_unsupported.contains(&pipe) {
            debug!(%pipe, "CRC source unsupported");
            return Ok(None);
        }
        if self.output_on_pipe(pipe).is_none() {
            return Err(DeviceError::PipeInactive(pipe));
        }

        let id = self.next_crc_source;
        let state = self.pipe_mut(pipe)?;
        if state.crc_source.is_some() {
            return Err(DeviceError::CrcBusy(pipe));
        }
        state.crc_source = Some(id);
        self.next_crc_source += 1;
        debug!(%pipe, id, "opened CRC source");
        Ok(Some(CrcSource::new(pipe, id)))
    }

    fn collect_crc(&mut self, source: &CrcSource) -> Result<Checksum, DeviceError> {
        let fault = self.clip_fault;
        let pipe = source.pipe();
        let state = self.pipe_mut(pipe)?;
        if state.crc_source != Some(source.id()) {
            return Err(DeviceError::StaleCrcSource {
                pipe,
                id: source.id(),
            });
        }
        let scanout = state.scanout.as_ref().ok_or(DeviceError::NoFrame(pipe))?;
        Ok(frame_crc(scanout, state.frame, fault))
    }

    fn close_crc_source(&mut self, source: CrcSource) -> Result<(), DeviceError> {
        let pipe = source.pipe();
        let state = self.pipe_mut(pipe)?;
        if state.crc_source != Some(source.id()) {
            return Err(DeviceError::StaleCrcSource {
                pipe,
                id: source.id(),
            });
        }
        state.crc_source = None;
        debug!(%pipe, id = source.id(), "closed CRC source");
        Ok(())
    }
}
