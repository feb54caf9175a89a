//! RunSubtests: the cursor CRC test driver.
//!
//! For each square cursor size up to the hardware limit the driver paints one
//! cursor framebuffer, then runs the `onscreen` and `offscreen` variants over
//! every connected output on every pipe.  Each variant is an independent
//! subtest with its own outcome:
//!
//! | Outcome | When                                                       |
//! |---------|------------------------------------------------------------|
//! | `Pass`  | at least one pipe/output combination ran all its probes    |
//! | `Skip`  | no combination could open a CRC source                     |
//! | `Fail`  | a probe mismatched or the device reported an error         |
//!
//! A failure stops the subtest at once; the driver moves on to the next one.

use cursor_core::{
    cursor_sizes, registered_subtests, AsymmetricCursorCaps, CursorSize, OutputInfo, Pipe,
    SubtestFilter, SubtestName,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::cursor_image::create_cursor_fb;
use super::display_device::{DeviceError, DisplayDevice, FbHandle};
use super::pipe_session::PipeSession;

/// Skip reason when no pipe/output combination can produce CRCs.
pub const NO_VALID_COMBINATIONS: &str = "no valid crtc/connector combinations found";

/// Errors that abort the whole run before any subtest executes.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("cannot query cursor capabilities: {0}")]
    Capability(#[source] DeviceError),

    #[error(transparent)]
    Asymmetric(#[from] AsymmetricCursorCaps),
}

/// How one subtest ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum SubtestOutcome {
    Pass { combinations: usize, probes: usize },
    Skip { reason: String },
    Fail { message: String },
}

impl SubtestOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, SubtestOutcome::Pass { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, SubtestOutcome::Skip { .. })
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, SubtestOutcome::Fail { .. })
    }
}

/// A subtest name paired with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtestReport {
    pub name: SubtestName,
    #[serde(flatten)]
    pub outcome: SubtestOutcome,
}

/// Outcome counts over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[SubtestReport]) -> Self {
        reports.iter().fold(Self::default(), |mut acc, r| {
            match r.outcome {
                SubtestOutcome::Pass { .. } => acc.passed += 1,
                SubtestOutcome::Skip { .. } => acc.skipped += 1,
                SubtestOutcome::Fail { .. } => acc.failed += 1,
            }
            acc
        })
    }

    /// Process exit status: 1 on any failure, 77 when nothing passed, else 0.
    pub fn exit_code(&self) -> u8 {
        if self.failed > 0 {
            1
        } else if self.passed == 0 {
            77
        } else {
            0
        }
    }
}

/// Drives every selected subtest against one display device.
///
/// Owns the device; sessions borrow it one at a time.
pub struct CursorCrcRunner<D> {
    device: D,
    max_cursor: u32,
}

impl<D: DisplayDevice> CursorCrcRunner<D> {
    /// Queries the cursor limits and fixes the registered subtest list.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError`] if the limits cannot be read or the
    /// maximum cursor is not square.
    pub fn new(device: D) -> Result<Self, PreconditionError> {
        let caps = device
            .cursor_caps()
            .map_err(PreconditionError::Capability)?;
        let max_cursor = caps.max_square()?;
        info!(
            max_cursor,
            pipes = device.pipe_count(),
            outputs = device.connected_outputs().len(),
            "cursor CRC runner ready"
        );
        Ok(Self { device, max_cursor })
    }

    /// Largest square cursor the device supports.
    pub fn max_cursor(&self) -> u32 {
        self.max_cursor
    }

    /// Every registered subtest, in execution order.
    pub fn subtests(&self) -> Vec<SubtestName> {
        registered_subtests(self.max_cursor)
    }

    /// Registered subtests selected by `filter`, in execution order.
    pub fn selected(&self, filter: &SubtestFilter) -> Vec<SubtestName> {
        self.subtests()
            .into_iter()
            .filter(|name| filter.matches(name))
            .collect()
    }

    /// Runs every subtest selected by `filter` and reports each outcome.
    ///
    /// The cursor framebuffer for a size is created only if one of that
    /// size's subtests is selected, and removed once both have run.
    pub fn run(&mut self, filter: &SubtestFilter) -> Vec<SubtestReport> {
        let selected = self.selected(filter);
        let mut reports = Vec::with_capacity(selected.len());

        for size in cursor_sizes(self.max_cursor) {
            let group: Vec<SubtestName> = selected
                .iter()
                .copied()
                .filter(|name| name.size == size)
                .collect();
            if group.is_empty() {
                continue;
            }

            let cursor = CursorSize::square(size);
            let cursor_fb = match create_cursor_fb(&mut self.device, cursor) {
                Ok(fb) => fb,
                Err(e) => {
                    let message = format!("cannot create {cursor} cursor framebuffer: {e}");
                    reports.extend(group.iter().map(|&name| {
                        report(
                            name,
                            SubtestOutcome::Fail {
                                message: message.clone(),
                            },
                        )
                    }));
                    continue;
                }
            };

            for &name in &group {
                let outcome = self.run_subtest(name, cursor_fb);
                reports.push(report(name, outcome));
            }

            if let Err(e) = self.device.remove_fb(cursor_fb) {
                warn!("failed to remove {cursor} cursor framebuffer: {e}");
            }
        }

        reports
    }

    /// Runs one subtest using an already painted cursor framebuffer.
    pub fn run_subtest(&mut self, name: SubtestName, cursor_fb: FbHandle) -> SubtestOutcome {
        let cursor = name.cursor();
        let outputs = self.device.connected_outputs();
        let pipes = self.device.pipe_count();
        let mut combinations = 0;
        let mut probes = 0;

        info!("Starting subtest: {name}");
        for output in &outputs {
            for pipe in (0..pipes).map(Pipe) {
                match self.run_combination(name, output, pipe, cursor, cursor_fb) {
                    Ok(Some(count)) => {
                        combinations += 1;
                        probes += count;
                    }
                    Ok(None) => {}
                    Err(message) => {
                        info!("Subtest {name}: FAIL");
                        return SubtestOutcome::Fail { message };
                    }
                }
            }
        }

        if combinations == 0 {
            info!("Subtest {name}: SKIP ({NO_VALID_COMBINATIONS})");
            return SubtestOutcome::Skip {
                reason: NO_VALID_COMBINATIONS.to_string(),
            };
        }
        info!("Subtest {name}: SUCCESS ({combinations} combinations, {probes} probes)");
        SubtestOutcome::Pass {
            combinations,
            probes,
        }
    }

    /// Runs `name` on one pipe/output pair.
    ///
    /// `Ok(None)` means the pair cannot produce CRCs.  The session is torn
    /// down whether or not the probes passed.
    fn run_combination(
        &mut self,
        name: SubtestName,
        output: &OutputInfo,
        pipe: Pipe,
        cursor: CursorSize,
        cursor_fb: FbHandle,
    ) -> Result<Option<usize>, String> {
        let mut session =
            match PipeSession::prepare(&mut self.device, output, pipe, cursor, cursor_fb) {
                Ok(Some(session)) => session,
                Ok(None) => return Ok(None),
                Err(e) => return Err(e.to_string()),
            };

        info!(
            "Beginning {name} on pipe {pipe}, connector {}",
            output.name
        );
        let ran = session.run(name.variant);
        let torn_down = session.teardown();

        match (ran, torn_down) {
            (Ok(count), Ok(())) => {
                info!(
                    "{name} on pipe {pipe}, connector {}: PASSED",
                    output.name
                );
                Ok(Some(count))
            }
            (Ok(_), Err(e)) => Err(e.to_string()),
            (Err(e), Ok(())) => Err(e.to_string()),
            (Err(e), Err(teardown)) => {
                warn!("{teardown}");
                Err(e.to_string())
            }
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

fn report(name: SubtestName, outcome: SubtestOutcome) -> SubtestReport {
    SubtestReport { name, outcome }
}
