//! SteadyStack Processing Core
//!
//! Reconstructs device orientation at arbitrary capture instants:
//! - **Scalar interpolation:** two-point linear and natural cubic spline fits
//! - **Component interpolation:** one scalar fit per matrix cell over a shared
//!   normalized time domain
//! - **Sample window:** append-only orientation buffer with bracket selection
//!
//! This crate is pure computation with no I/O and no async.

pub mod components;
pub mod spline;
pub mod window;

pub use components::{
    AttitudeInterpolator, ComponentInterpolator, Components, MatrixInterpolator, Normalization,
};
pub use spline::{CubicSpline, LinearInterpolator, Point2, ScalarInterpolator};
pub use window::{Estimate, OrientationWindow, SampleWindow};
