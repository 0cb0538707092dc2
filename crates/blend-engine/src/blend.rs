//! Collects the decoded exposures of one bracket and merges them.

use std::sync::Arc;

use image::RgbaImage;
use steadystack_common::error::{StackError, StackResult};
use steadystack_sample_model::CaptureFrame;

use crate::codec::decode_frame;
use crate::kernel::{BlendKernel, MedianKernel};

/// Buffers exactly `expected` images and blends them in one pass.
///
/// Blending never produces a partial result: with fewer than `expected`
/// images it reports `BlendNotReady`. Every blend attempt, successful or not,
/// releases the buffered images.
pub struct MultiImageBlend {
    expected: usize,
    images: Vec<RgbaImage>,
    kernel: Arc<dyn BlendKernel>,
}

impl MultiImageBlend {
    /// Collector for `expected` images using the shared median kernel.
    pub fn new(expected: usize) -> StackResult<Self> {
        Self::with_kernel(expected, MedianKernel::shared())
    }

    pub fn with_kernel(expected: usize, kernel: Arc<dyn BlendKernel>) -> StackResult<Self> {
        if expected < 2 {
            return Err(StackError::configuration(format!(
                "a blend needs at least 2 images, got {expected}"
            )));
        }
        Ok(Self {
            expected,
            images: Vec::with_capacity(expected),
            kernel,
        })
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.images.len()
    }

    pub fn is_ready(&self) -> bool {
        self.images.len() == self.expected
    }

    /// Buffer a decoded image. Returns the number now held.
    pub fn push(&mut self, image: RgbaImage) -> StackResult<usize> {
        if self.is_ready() {
            return Err(StackError::capture(format!(
                "blend already holds all {} images",
                self.expected
            )));
        }
        self.images.push(image);
        Ok(self.images.len())
    }

    /// Decode frame `index` and buffer it.
    pub fn push_frame(&mut self, index: usize, frame: &CaptureFrame) -> StackResult<usize> {
        let image = decode_frame(index, frame)?;
        self.push(image)
    }

    /// Merge the buffered images, then release them.
    pub fn blend(&mut self) -> StackResult<RgbaImage> {
        let images = std::mem::replace(&mut self.images, Vec::with_capacity(self.expected));
        if images.len() < self.expected {
            tracing::warn!(
                expected = self.expected,
                received = images.len(),
                "Blend requested before all images arrived"
            );
            return Err(StackError::BlendNotReady {
                expected: self.expected,
                received: images.len(),
            });
        }

        tracing::debug!(
            kernel = self.kernel.name(),
            images = images.len(),
            "Blending bracket"
        );
        self.kernel.apply(&images)
    }
}

impl std::fmt::Debug for MultiImageBlend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiImageBlend")
            .field("expected", &self.expected)
            .field("received", &self.images.len())
            .field("kernel", &self.kernel.name())
            .finish()
    }
}
