//! Median-blend image files.

use std::path::PathBuf;

use anyhow::Context;
use steadystack_blend_engine::MultiImageBlend;
use steadystack_sample_model::CaptureFrame;

pub async fn run(inputs: Vec<PathBuf>, output: PathBuf) -> anyhow::Result<()> {
    let mut blend = MultiImageBlend::new(inputs.len())?;
    for (index, path) in inputs.iter().enumerate() {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        blend
            .push_frame(index, &CaptureFrame::new(index as f64, bytes))
            .with_context(|| format!("Failed to decode {}", path.display()))?;
    }

    let blended = tokio::task::spawn_blocking(move || blend.blend()).await??;
    blended
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Blended {} images ({}x{}) -> {}",
        inputs.len(),
        blended.width(),
        blended.height(),
        output.display()
    );
    Ok(())
}
