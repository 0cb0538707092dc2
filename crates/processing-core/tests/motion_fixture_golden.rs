use std::path::PathBuf;

use steadystack_common::config::InterpolationKind;
use steadystack_processing_core::OrientationWindow;
use steadystack_sample_model::{parse_header, parse_samples, RotationMatrix, TimedSample};

fn load_fixture() -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("motion")
        .join("sample-motion.jsonl");
    std::fs::read_to_string(path).expect("motion fixture should be readable")
}

fn fixture_window() -> OrientationWindow {
    let samples: Vec<TimedSample<RotationMatrix>> =
        parse_samples(&load_fixture()).expect("motion fixture should parse");
    OrientationWindow::from_samples(samples).expect("fixture samples are ordered")
}

#[test]
fn fixture_header_and_sample_count() {
    let content = load_fixture();
    let header = parse_header(&content).unwrap().expect("fixture has a header");
    assert_eq!(header.sample_interval_ms, 50);

    let window = fixture_window();
    assert_eq!(window.len(), 13);
    assert_eq!(window.domain(), Some((0.8, 1.4)));
}

#[test]
fn fixture_cubic_estimate_tracks_yaw_sweep() {
    // The fixture sweeps yaw at 0.5 rad/s.
    let window = fixture_window();
    for t in [0.93, 1.0125, 1.27] {
        let estimate = window.estimate(InterpolationKind::Cubic, t).unwrap();
        assert_eq!(estimate.kind, InterpolationKind::Cubic);
        let truth = RotationMatrix::about_z(0.5 * t);
        assert!(
            estimate.value.max_abs_diff(&truth) < 1e-4,
            "t={t}: off by {}",
            estimate.value.max_abs_diff(&truth)
        );
    }
}

#[test]
fn fixture_tail_falls_back_to_linear() {
    let window = fixture_window();
    let estimate = window.estimate(InterpolationKind::Cubic, 1.38).unwrap();
    assert_eq!(estimate.kind, InterpolationKind::Linear);
    let truth = RotationMatrix::about_z(0.5 * 1.38);
    assert!(estimate.value.max_abs_diff(&truth) < 1e-3);
}
