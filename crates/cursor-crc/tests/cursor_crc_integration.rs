//! Integration tests for the cursor CRC runner against the simulated display.
//!
//! # Purpose
//!
//! These tests drive `CursorCrcRunner` and `PipeSession` through their public
//! API exactly as the binary does, with `SimulatedDisplay` standing in for the
//! hardware.  They verify:
//!
//! - A correctly clipping display passes every registered subtest, and the
//!   device is left with no pipes, planes, framebuffers, or CRC sources.
//! - Pipes without CRC support are skipped, and a subtest with no usable
//!   combination is reported as a skip.
//! - Each injected clipping fault is caught by the subtest variant whose
//!   probes straddle that fault.
//! - The boundary properties: the 1920x1080 scenario, a monotonic edge
//!   sweep, reference idempotence, and extremal coordinates.
//!
//! Modes are kept small (mostly 320x240) because every probe composes and
//! checksums a whole frame in software.

use cursor_core::{
    extremal_probes, CursorCaps, CursorSize, Envelope, Expectation, Mode, OutputInfo, Pipe,
    Probe, SubtestFilter, SubtestName, TestVariant,
};
use cursor_crc::application::cursor_image::create_cursor_fb;
use cursor_crc::application::display_device::DisplayDevice;
use cursor_crc::application::execute_probe::ProbeError;
use cursor_crc::application::pipe_session::PipeSession;
use cursor_crc::application::run_subtests::{
    CursorCrcRunner, PreconditionError, RunSummary, SubtestOutcome, NO_VALID_COMBINATIONS,
};
use cursor_crc::infrastructure::config::parse_config;
use cursor_crc::infrastructure::sim::{ClipFault, SimulatedDisplay};

const SMALL: Mode = Mode {
    width: 320,
    height: 240,
};

fn caps(max: u32) -> CursorCaps {
    CursorCaps {
        max_width: max,
        max_height: max,
    }
}

/// One 320x240 output on `pipes` pipes with a `max` cursor limit.
fn small_display(max: u32, pipes: u32) -> SimulatedDisplay {
    SimulatedDisplay::new(caps(max), pipes).with_output("HDMI-A-1", SMALL)
}

fn outcome_of(
    reports: &[cursor_crc::application::run_subtests::SubtestReport],
    name: &str,
) -> SubtestOutcome {
    reports
        .iter()
        .find(|r| r.name.to_string() == name)
        .map(|r| r.outcome.clone())
        .unwrap_or_else(|| panic!("no report for {name}"))
}

// ── Full runs ─────────────────────────────────────────────────────────────────

/// A correctly clipping display passes all four subtests on both pipes.
#[test]
fn test_full_run_on_correct_display_passes_every_subtest() {
    // Arrange
    let mut runner = CursorCrcRunner::new(small_display(128, 2)).expect("square caps");

    // Act
    let reports = runner.run(&SubtestFilter::default());

    // Assert
    let names: Vec<String> = reports.iter().map(|r| r.name.to_string()).collect();
    assert_eq!(
        names,
        [
            "cursor-64-onscreen",
            "cursor-64-offscreen",
            "cursor-128-onscreen",
            "cursor-128-offscreen",
        ]
    );
    for report in &reports {
        let expected_probes = match report.name.variant {
            TestVariant::Onscreen => 2 * 36,
            TestVariant::Offscreen => 2 * 52,
        };
        assert_eq!(
            report.outcome,
            SubtestOutcome::Pass {
                combinations: 2,
                probes: expected_probes,
            },
            "{}",
            report.name
        );
    }
    assert_eq!(RunSummary::from_reports(&reports).exit_code(), 0);
}

/// The device is back to idle after a run: nothing enabled or allocated.
#[test]
fn test_full_run_releases_every_device_resource() {
    let mut runner = CursorCrcRunner::new(small_display(64, 2)).expect("square caps");

    runner.run(&SubtestFilter::default());
    let device = runner.into_device();

    assert!(device.is_idle());
    assert_eq!(device.live_framebuffers(), 0);
    assert_eq!(device.open_crc_sources(), 0);
}

/// A failing probe still tears its session down.
#[test]
fn test_failed_subtest_releases_every_device_resource() {
    let device = small_display(64, 1).with_clip_fault(ClipFault::HidePartial);
    let mut runner = CursorCrcRunner::new(device).expect("square caps");

    let reports = runner.run(&SubtestFilter::default());
    let device = runner.into_device();

    assert!(reports.iter().any(|r| r.outcome.is_fail()));
    assert!(device.is_idle());
    assert_eq!(device.live_framebuffers(), 0);
    assert_eq!(device.open_crc_sources(), 0);
}

#[test]
fn test_every_output_is_tested_on_every_pipe() {
    let device = small_display(64, 3).with_output("DP-1", Mode {
        width: 200,
        height: 150,
    });
    let mut runner = CursorCrcRunner::new(device).expect("square caps");

    let reports = runner.run(&SubtestFilter::new(["cursor-64-onscreen"]));

    assert_eq!(
        reports[0].outcome,
        SubtestOutcome::Pass {
            combinations: 6,
            probes: 6 * 36,
        }
    );
}

#[test]
fn test_filter_runs_only_matching_subtests() {
    let mut runner = CursorCrcRunner::new(small_display(128, 1)).expect("square caps");

    let reports = runner.run(&SubtestFilter::new(["*-offscreen"]));

    let names: Vec<SubtestName> = reports.iter().map(|r| r.name).collect();
    assert_eq!(
        names,
        [
            SubtestName::new(64, TestVariant::Offscreen),
            SubtestName::new(128, TestVariant::Offscreen),
        ]
    );
}

// ── Preconditions and registration ────────────────────────────────────────────

#[test]
fn test_asymmetric_cursor_caps_abort_before_any_subtest() {
    let device = SimulatedDisplay::new(
        CursorCaps {
            max_width: 256,
            max_height: 64,
        },
        1,
    )
    .with_output("eDP-1", SMALL);

    let result = CursorCrcRunner::new(device);

    assert!(matches!(result, Err(PreconditionError::Asymmetric(_))));
}

#[test]
fn test_cursor_sizes_above_the_limit_are_not_registered() {
    let runner = CursorCrcRunner::new(small_display(128, 1)).expect("square caps");

    let names: Vec<String> = runner.subtests().iter().map(|n| n.to_string()).collect();

    assert!(names.contains(&"cursor-128-offscreen".to_string()));
    assert!(!names.iter().any(|n| n.starts_with("cursor-256-")));
}

#[test]
fn test_limit_below_smallest_cursor_registers_nothing() {
    let runner = CursorCrcRunner::new(small_display(32, 1)).expect("square caps");
    assert!(runner.subtests().is_empty());
}

// ── Unsupported CRC ───────────────────────────────────────────────────────────

#[test]
fn test_subtest_skips_when_no_pipe_supports_crc() {
    // Arrange
    let device = small_display(64, 2)
        .with_crc_unsupported(Pipe(0))
        .with_crc_unsupported(Pipe(1));
    let mut runner = CursorCrcRunner::new(device).expect("square caps");

    // Act
    let reports = runner.run(&SubtestFilter::default());

    // Assert
    for report in &reports {
        assert_eq!(
            report.outcome,
            SubtestOutcome::Skip {
                reason: NO_VALID_COMBINATIONS.to_string(),
            }
        );
    }
    assert_eq!(RunSummary::from_reports(&reports).exit_code(), 77);
    assert!(runner.device().is_idle());
    assert_eq!(runner.device().live_framebuffers(), 0);
}

#[test]
fn test_unsupported_pipe_is_skipped_and_others_still_run() {
    let device = small_display(64, 3).with_crc_unsupported(Pipe(1));
    let mut runner = CursorCrcRunner::new(device).expect("square caps");

    let reports = runner.run(&SubtestFilter::new(["cursor-64-offscreen"]));

    assert_eq!(
        reports[0].outcome,
        SubtestOutcome::Pass {
            combinations: 2,
            probes: 2 * 52,
        }
    );
}

// ── Injected clipping faults ──────────────────────────────────────────────────

fn run_with_fault(fault: &str) -> Vec<cursor_crc::application::run_subtests::SubtestReport> {
    let config = parse_config(&format!(
        r#"
        [device]
        max_cursor_width = 64
        max_cursor_height = 64
        pipes = 1

        [[outputs]]
        name = "eDP-1"
        width = 320
        height = 240

        [faults]
        cursor_clip = "{fault}"
        "#
    ))
    .expect("valid config");
    let mut runner =
        CursorCrcRunner::new(SimulatedDisplay::from_config(&config)).expect("square caps");
    runner.run(&SubtestFilter::default())
}

/// Hiding partially visible cursors breaks every onscreen inset probe.
#[test]
fn test_hide_partial_fault_fails_onscreen_only() {
    let reports = run_with_fault("hide-partial");

    assert!(outcome_of(&reports, "cursor-64-onscreen").is_fail());
    assert!(outcome_of(&reports, "cursor-64-offscreen").is_pass());
}

/// Losing one pixel per clipped edge hides the last visible column.
#[test]
fn test_short_by_one_fault_fails_onscreen_only() {
    let reports = run_with_fault("short-by-one");

    assert!(outcome_of(&reports, "cursor-64-onscreen").is_fail());
    assert!(outcome_of(&reports, "cursor-64-offscreen").is_pass());
}

/// A 16-bit position register wraps the extremal probes back on screen.
#[test]
fn test_wrap_16bit_fault_fails_offscreen_only() {
    let reports = run_with_fault("wrap-16bit");

    assert!(outcome_of(&reports, "cursor-64-onscreen").is_pass());
    assert!(outcome_of(&reports, "cursor-64-offscreen").is_fail());
}

#[test]
fn test_failure_message_names_pipe_connector_and_position() {
    let reports = run_with_fault("short-by-one");

    match outcome_of(&reports, "cursor-64-onscreen") {
        SubtestOutcome::Fail { message } => {
            assert!(message.contains("pipe A"), "{message}");
            assert!(message.contains("eDP-1"), "{message}");
            assert!(message.contains("different from the reference"), "{message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

// ── Boundary properties on a single session ───────────────────────────────────

/// Prepares a session on a fresh device and hands it to `f`.
fn with_session<T>(
    mode: Mode,
    size: u32,
    f: impl FnOnce(&mut PipeSession<'_, SimulatedDisplay>) -> T,
) -> T {
    let mut device = SimulatedDisplay::new(caps(size), 1).with_output("HDMI-A-1", mode);
    let output: OutputInfo = device.connected_outputs().remove(0);
    let cursor = CursorSize::square(size);
    let cursor_fb = create_cursor_fb(&mut device, cursor).expect("cursor fb");

    let mut session = PipeSession::prepare(&mut device, &output, Pipe(0), cursor, cursor_fb)
        .expect("prepare")
        .expect("CRC supported");
    let result = f(&mut session);
    session.teardown().expect("teardown");
    result
}

fn probe(x: i32, y: i32, expect: Expectation) -> Probe {
    Probe { x, y, expect }
}

/// Mode 1920x1080 with a 64x64 cursor.
#[test]
fn test_full_hd_scenario_envelope_and_corner_probes() {
    let mode = Mode {
        width: 1920,
        height: 1080,
    };
    with_session(mode, 64, |session| {
        assert_eq!(
            *session.envelope(),
            Envelope {
                left: 0,
                right: 1856,
                top: 0,
                bottom: 1016,
            }
        );

        let probes = [
            probe(1856, 1016, Expectation::DifferFromReference),
            probe(1920, 1080, Expectation::MatchReference),
            probe(1919, 1079, Expectation::DifferFromReference),
        ];
        session.run_probes(&probes).expect("boundary probes hold");

        let wrong = [probe(1919, 1079, Expectation::MatchReference)];
        assert!(matches!(
            session.run_probes(&wrong),
            Err(ProbeError::Mismatch { x: 1919, y: 1079, .. })
        ));
    });
}

/// Sliding the cursor off the left edge: equal to the reference exactly
/// when no column remains, and once equal it stays equal.
#[test]
fn test_left_edge_sweep_is_monotonic() {
    let size = 64;
    with_session(SMALL, size, |session| {
        let sweep: Vec<Probe> = (0..=size as i32 + 2)
            .map(|inset| {
                let expect = if inset >= size as i32 {
                    Expectation::MatchReference
                } else {
                    Expectation::DifferFromReference
                };
                probe(-inset, 40, expect)
            })
            .collect();

        session.run_probes(&sweep).expect("monotonic boundary");
    });
}

#[test]
fn test_bottom_right_sweep_is_monotonic() {
    let size = 64;
    with_session(SMALL, size, |session| {
        let env = *session.envelope();
        let sweep: Vec<Probe> = [0, size - 2, size - 1, size, size + 1]
            .into_iter()
            .map(|push| {
                let push = push as i32;
                let expect = if push >= size as i32 {
                    Expectation::MatchReference
                } else {
                    Expectation::DifferFromReference
                };
                probe(env.right + push, env.bottom + push, expect)
            })
            .collect();

        session.run_probes(&sweep).expect("monotonic boundary");
    });
}

#[test]
fn test_reference_capture_is_idempotent() {
    with_session(SMALL, 64, |session| {
        let first = session.capture_reference().expect("capture");
        let second = session.capture_reference().expect("capture");

        assert!(first.matches(&second));
        assert!(first.matches(session.reference()));
        assert_ne!(first.frame(), second.frame());
    });
}

#[test]
fn test_extremal_positions_equal_the_reference() {
    with_session(SMALL, 64, |session| {
        session
            .run_probes(&extremal_probes())
            .expect("extremal positions are invisible");
    });
}

#[test]
fn test_each_variant_runs_its_full_probe_table() {
    with_session(SMALL, 64, |session| {
        assert_eq!(session.run(TestVariant::Onscreen).expect("onscreen"), 36);
        assert_eq!(session.run(TestVariant::Offscreen).expect("offscreen"), 52);
    });
}
