//! Estimate orientation from a motion log.

use std::path::PathBuf;

use anyhow::Context;
use steadystack_common::config::InterpolationKind;
use steadystack_processing_core::OrientationWindow;
use steadystack_sample_model::{parse_header, parse_samples, RotationMatrix};

pub fn run(log: PathBuf, time: f64, kind: InterpolationKind, strict: bool) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&log)
        .with_context(|| format!("Failed to read motion log {}", log.display()))?;
    let header = parse_header(&content).context("Invalid motion log header")?;
    let samples = parse_samples::<RotationMatrix>(&content).context("Invalid motion sample")?;
    let window = OrientationWindow::from_samples(samples)?;

    tracing::debug!(
        samples = window.len(),
        domain = ?window.domain(),
        "Loaded motion log"
    );

    let estimate = if strict {
        window.interpolate(kind, time)?
    } else {
        window.estimate(kind, time)?
    };

    let report = serde_json::json!({
        "time": estimate.time,
        "kind": estimate.kind,
        "bracket": [estimate.bracket.0, estimate.bracket.1],
        "rotation": estimate.value,
        "orthogonality_error": estimate.value.orthogonality_error(),
        "epoch_wall": header.map(|h| h.epoch_wall),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
