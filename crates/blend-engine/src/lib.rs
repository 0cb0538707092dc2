//! SteadyStack Blend Engine
//!
//! Merges the exposures of one bracket into a single image.
//!
//! ```text
//! CaptureFrame bytes ──decode──► RgbaImage ─┐
//! CaptureFrame bytes ──decode──► RgbaImage ─┼── MultiImageBlend ──► BlendKernel ──► RgbaImage
//! CaptureFrame bytes ──decode──► RgbaImage ─┘   (waits for N)      (median-of-N)
//! ```
//!
//! The kernel is a process-wide resource initialized once and handed to each
//! collector, so sessions never rebuild it.

pub mod blend;
pub mod codec;
pub mod kernel;

pub use blend::MultiImageBlend;
pub use codec::{decode_frame, encode_png};
pub use kernel::{BlendKernel, MedianKernel};
