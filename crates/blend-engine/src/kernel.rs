//! Per-pixel blend kernels.

use std::sync::{Arc, OnceLock};

use image::RgbaImage;
use steadystack_common::error::{StackError, StackResult};

/// An N-ary pixel merge over co-registered images.
///
/// Implementations are pure: the same inputs always give the same output.
pub trait BlendKernel: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Merge `images`, which must all share one size.
    fn apply(&self, images: &[RgbaImage]) -> StackResult<RgbaImage>;
}

/// Per-channel median across the input images.
///
/// For an even count the lower of the two middle values is taken, so every
/// output channel is a value that appeared in some input.
#[derive(Debug, Default)]
pub struct MedianKernel {
    _private: (),
}

static MEDIAN_KERNEL: OnceLock<Arc<MedianKernel>> = OnceLock::new();

impl MedianKernel {
    /// Process-wide kernel, created on first use.
    pub fn shared() -> Arc<MedianKernel> {
        MEDIAN_KERNEL
            .get_or_init(|| {
                tracing::info!("Initializing median blend kernel");
                Arc::new(MedianKernel::default())
            })
            .clone()
    }
}

/// Fail unless every image matches the first one's dimensions.
pub(crate) fn check_dimensions(images: &[RgbaImage]) -> StackResult<(u32, u32)> {
    let first = images.first().ok_or(StackError::BlendNotReady {
        expected: 1,
        received: 0,
    })?;
    let expected = first.dimensions();
    for image in &images[1..] {
        let found = image.dimensions();
        if found != expected {
            return Err(StackError::DimensionMismatch { expected, found });
        }
    }
    Ok(expected)
}

impl BlendKernel for MedianKernel {
    fn name(&self) -> &'static str {
        "median"
    }

    fn apply(&self, images: &[RgbaImage]) -> StackResult<RgbaImage> {
        let (width, height) = check_dimensions(images)?;
        let planes: Vec<&[u8]> = images.iter().map(|image| image.as_raw().as_slice()).collect();
        let mid = (planes.len() - 1) / 2;

        let len = planes[0].len();
        let mut out = Vec::with_capacity(len);
        let mut values = Vec::with_capacity(planes.len());
        for idx in 0..len {
            values.clear();
            values.extend(planes.iter().map(|plane| plane[idx]));
            values.sort_unstable();
            out.push(values[mid]);
        }

        RgbaImage::from_raw(width, height, out).ok_or_else(|| {
            StackError::Other(anyhow::anyhow!(
                "median output buffer does not fit {width}x{height}"
            ))
        })
    }
}
