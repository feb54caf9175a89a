//! ExecuteProbe: place the cursor at one position and judge the frame CRC.
//!
//! Each probe brackets exactly one cursor state change:
//!
//! ```text
//! cursor on @ (x, y) ─ commit ─ vblank ─ capture CRC ─ cursor off ─ commit
//! ```
//!
//! The vblank wait is what ties the capture to the committed frame; without
//! it the CRC could belong to the frame before the cursor moved.  Turning the
//! cursor off again afterwards means no probe inherits state from the
//! previous one.

use cursor_core::{Checksum, Expectation, OutputId, OutputInfo, Pipe, PlaneKind, Probe};
use thiserror::Error;
use tracing::trace;

use super::display_device::{CrcSource, DeviceError, DisplayDevice, FbHandle};

/// Error type for a single probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The frame CRC did not relate to the reference as expected.
    #[error(
        "pipe {pipe}, connector {connector}: cursor at ({x}, {y}) produced CRC {actual}, \
         expected {expected} {reference}"
    )]
    Mismatch {
        pipe: Pipe,
        connector: String,
        x: i32,
        y: i32,
        expected: Expectation,
        actual: Checksum,
        reference: Checksum,
    },

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Everything a probe needs from its session.
pub struct ProbeTarget<'a> {
    pub output: &'a OutputInfo,
    pub pipe: Pipe,
    pub cursor_fb: FbHandle,
    pub crc: &'a CrcSource,
    pub reference: &'a Checksum,
}

/// Runs `probe` against `target`.
///
/// Once the cursor framebuffer is attached, the cursor is turned off again
/// whatever happens next, so a device error never leaves the cursor plane
/// enabled.
///
/// # Errors
///
/// Returns [`ProbeError::Mismatch`] when the captured CRC violates
/// `probe.expect`, or [`ProbeError::Device`] with the first device call that
/// failed.
pub fn execute_probe<D: DisplayDevice + ?Sized>(
    device: &mut D,
    target: &ProbeTarget<'_>,
    probe: &Probe,
) -> Result<(), ProbeError> {
    let output = target.output.id;

    device.set_plane_fb(output, PlaneKind::Cursor, Some(target.cursor_fb))?;
    let captured = place_and_capture(device, target, probe);
    let disabled = disable_cursor(device, output);
    let actual = captured?;
    disabled?;

    let equal = actual.matches(target.reference);
    trace!(x = probe.x, y = probe.y, crc = %actual, equal, "probe");

    if probe.expect.is_met(equal) {
        Ok(())
    } else {
        Err(ProbeError::Mismatch {
            pipe: target.pipe,
            connector: target.output.name.clone(),
            x: probe.x,
            y: probe.y,
            expected: probe.expect,
            actual,
            reference: target.reference.clone(),
        })
    }
}

/// Moves the attached cursor to the probe position and captures the frame
/// that shows it.
fn place_and_capture<D: DisplayDevice + ?Sized>(
    device: &mut D,
    target: &ProbeTarget<'_>,
    probe: &Probe,
) -> Result<Checksum, DeviceError> {
    device.set_plane_position(target.output.id, PlaneKind::Cursor, probe.x, probe.y)?;
    device.commit()?;
    device.wait_for_vblank(target.pipe)?;
    device.collect_crc(target.crc)
}

/// Detaches the cursor framebuffer and commits.
pub(crate) fn disable_cursor<D: DisplayDevice + ?Sized>(
    device: &mut D,
    output: OutputId,
) -> Result<(), DeviceError> {
    device.set_plane_fb(output, PlaneKind::Cursor, None)?;
    device.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::display_device::MockDisplayDevice;
    use cursor_core::Mode;
    use mockall::predicate::eq;
    use mockall::Sequence;

    const OUTPUT: OutputId = OutputId(4);
    const PIPE: Pipe = Pipe(1);
    const CURSOR_FB: FbHandle = FbHandle(7);

    fn output() -> OutputInfo {
        OutputInfo {
            id: OUTPUT,
            name: "DP-1".to_string(),
            mode: Mode {
                width: 1920,
                height: 1080,
            },
        }
    }

    fn reference() -> Checksum {
        Checksum::new(1, vec![0xaaaa, 0xbbbb, 0xcccc])
    }

    /// A mock that accepts every call and captures `words` as the frame CRC.
    fn device_capturing(words: Vec<u32>) -> MockDisplayDevice {
        let mut device = MockDisplayDevice::new();
        device.expect_set_plane_fb().returning(|_, _, _| Ok(()));
        device
            .expect_set_plane_position()
            .returning(|_, _, _, _| Ok(()));
        device.expect_commit().returning(|| Ok(()));
        device.expect_wait_for_vblank().returning(|_| Ok(()));
        device
            .expect_collect_crc()
            .returning(move |_| Ok(Checksum::new(2, words.clone())));
        device
    }

    fn probe(expect: Expectation) -> Probe {
        Probe {
            x: 1919,
            y: 1079,
            expect,
        }
    }

    #[test]
    fn test_execute_probe_follows_enable_commit_vblank_capture_disable_order() {
        // Arrange
        let mut device = MockDisplayDevice::new();
        let mut seq = Sequence::new();
        device
            .expect_set_plane_fb()
            .with(eq(OUTPUT), eq(PlaneKind::Cursor), eq(Some(CURSOR_FB)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        device
            .expect_set_plane_position()
            .with(eq(OUTPUT), eq(PlaneKind::Cursor), eq(-5), eq(1080))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(()));
        device
            .expect_commit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        device
            .expect_wait_for_vblank()
            .with(eq(PIPE))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        device
            .expect_collect_crc()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Checksum::new(2, vec![0xaaaa, 0xbbbb, 0xcccc])));
        device
            .expect_set_plane_fb()
            .with(eq(OUTPUT), eq(PlaneKind::Cursor), eq(None))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        device
            .expect_commit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let out = output();
        let crc = CrcSource::new(PIPE, 1);
        let reference = reference();
        let target = ProbeTarget {
            output: &out,
            pipe: PIPE,
            cursor_fb: CURSOR_FB,
            crc: &crc,
            reference: &reference,
        };
        let probe = Probe {
            x: -5,
            y: 1080,
            expect: Expectation::MatchReference,
        };

        // Act
        let result = execute_probe(&mut device, &target, &probe);

        // Assert
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn test_execute_probe_passes_when_must_match_and_crc_equal() {
        let mut device = device_capturing(vec![0xaaaa, 0xbbbb, 0xcccc]);
        let (out, crc, reference) = (output(), CrcSource::new(PIPE, 1), reference());
        let target = ProbeTarget {
            output: &out,
            pipe: PIPE,
            cursor_fb: CURSOR_FB,
            crc: &crc,
            reference: &reference,
        };

        let result = execute_probe(&mut device, &target, &probe(Expectation::MatchReference));

        assert!(result.is_ok());
    }

    #[test]
    fn test_execute_probe_fails_when_must_match_and_crc_differs() {
        let mut device = device_capturing(vec![0xaaaa, 0xbbbb, 0xdddd]);
        let (out, crc, reference) = (output(), CrcSource::new(PIPE, 1), reference());
        let target = ProbeTarget {
            output: &out,
            pipe: PIPE,
            cursor_fb: CURSOR_FB,
            crc: &crc,
            reference: &reference,
        };

        let result = execute_probe(&mut device, &target, &probe(Expectation::MatchReference));

        match result {
            Err(ProbeError::Mismatch {
                pipe,
                connector,
                x,
                y,
                expected,
                ..
            }) => {
                assert_eq!(pipe, PIPE);
                assert_eq!(connector, "DP-1");
                assert_eq!((x, y), (1919, 1079));
                assert_eq!(expected, Expectation::MatchReference);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_execute_probe_fails_when_must_differ_and_crc_equal() {
        let mut device = device_capturing(vec![0xaaaa, 0xbbbb, 0xcccc]);
        let (out, crc, reference) = (output(), CrcSource::new(PIPE, 1), reference());
        let target = ProbeTarget {
            output: &out,
            pipe: PIPE,
            cursor_fb: CURSOR_FB,
            crc: &crc,
            reference: &reference,
        };

        let result = execute_probe(
            &mut device,
            &target,
            &probe(Expectation::DifferFromReference),
        );

        assert!(matches!(result, Err(ProbeError::Mismatch { .. })));
    }

    #[test]
    fn test_execute_probe_passes_when_must_differ_and_crc_differs() {
        let mut device = device_capturing(vec![1, 2, 3]);
        let (out, crc, reference) = (output(), CrcSource::new(PIPE, 1), reference());
        let target = ProbeTarget {
            output: &out,
            pipe: PIPE,
            cursor_fb: CURSOR_FB,
            crc: &crc,
            reference: &reference,
        };

        let result = execute_probe(
            &mut device,
            &target,
            &probe(Expectation::DifferFromReference),
        );

        assert!(result.is_ok());
    }

    #[test]
    fn test_execute_probe_disables_cursor_when_capture_fails() {
        // Arrange
        let mut device = MockDisplayDevice::new();
        device
            .expect_set_plane_fb()
            .with(eq(OUTPUT), eq(PlaneKind::Cursor), eq(Some(CURSOR_FB)))
            .times(1)
            .returning(|_, _, _| Ok(()));
        device
            .expect_set_plane_position()
            .returning(|_, _, _, _| Ok(()));
        device.expect_commit().times(2).returning(|| Ok(()));
        device.expect_wait_for_vblank().returning(|_| Ok(()));
        device
            .expect_collect_crc()
            .returning(|source| Err(DeviceError::NoFrame(source.pipe())));
        device
            .expect_set_plane_fb()
            .with(eq(OUTPUT), eq(PlaneKind::Cursor), eq(None))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let (out, crc, reference) = (output(), CrcSource::new(PIPE, 1), reference());
        let target = ProbeTarget {
            output: &out,
            pipe: PIPE,
            cursor_fb: CURSOR_FB,
            crc: &crc,
            reference: &reference,
        };

        // Act
        let result = execute_probe(&mut device, &target, &probe(Expectation::MatchReference));

        // Assert
        assert!(matches!(
            result,
            Err(ProbeError::Device(DeviceError::NoFrame(PIPE)))
        ));
    }

    #[test]
    fn test_execute_probe_disables_cursor_when_vblank_wait_fails() {
        // Arrange
        let mut device = MockDisplayDevice::new();
        device
            .expect_set_plane_fb()
            .with(eq(OUTPUT), eq(PlaneKind::Cursor), eq(Some(CURSOR_FB)))
            .times(1)
            .returning(|_, _, _| Ok(()));
        device
            .expect_set_plane_position()
            .returning(|_, _, _, _| Ok(()));
        device.expect_commit().times(2).returning(|| Ok(()));
        device
            .expect_wait_for_vblank()
            .returning(|pipe| Err(DeviceError::PipeInactive(pipe)));
        device.expect_collect_crc().never();
        device
            .expect_set_plane_fb()
            .with(eq(OUTPUT), eq(PlaneKind::Cursor), eq(None))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let (out, crc, reference) = (output(), CrcSource::new(PIPE, 1), reference());
        let target = ProbeTarget {
            output: &out,
            pipe: PIPE,
            cursor_fb: CURSOR_FB,
            crc: &crc,
            reference: &reference,
        };

        // Act
        let result = execute_probe(&mut device, &target, &probe(Expectation::MatchReference));

        // Assert
        assert!(matches!(
            result,
            Err(ProbeError::Device(DeviceError::PipeInactive(PIPE)))
        ));
    }

    #[test]
    fn test_execute_probe_reports_first_error_when_disable_also_fails() {
        // Arrange
        let mut device = MockDisplayDevice::new();
        device.expect_set_plane_fb().returning(|_, _, _| Ok(()));
        device
            .expect_set_plane_position()
            .returning(|_, _, _, _| Ok(()));
        device.expect_commit().times(1).returning(|| {
            Err(DeviceError::CommitRejected("cursor too large".to_string()))
        });
        device
            .expect_commit()
            .times(1)
            .returning(|| Err(DeviceError::CommitRejected("second".to_string())));

        let (out, crc, reference) = (output(), CrcSource::new(PIPE, 1), reference());
        let target = ProbeTarget {
            output: &out,
            pipe: PIPE,
            cursor_fb: CURSOR_FB,
            crc: &crc,
            reference: &reference,
        };

        // Act
        let result = execute_probe(&mut device, &target, &probe(Expectation::MatchReference));

        // Assert
        match result {
            Err(ProbeError::Device(DeviceError::CommitRejected(msg))) => {
                assert_eq!(msg, "cursor too large");
            }
            other => panic!("expected the first commit error, got {other:?}"),
        }
    }

    #[test]
    fn test_mismatch_message_names_pipe_connector_and_position() {
        let err = ProbeError::Mismatch {
            pipe: Pipe(0),
            connector: "HDMI-A-1".to_string(),
            x: 1920,
            y: 1080,
            expected: Expectation::MatchReference,
            actual: Checksum::new(3, vec![1]),
            reference: Checksum::new(1, vec![2]),
        };
        let msg = err.to_string();
        assert!(msg.contains("pipe A"));
        assert!(msg.contains("HDMI-A-1"));
        assert!(msg.contains("(1920, 1080)"));
        assert!(msg.contains("equal to the reference"));
    }
}
