//! SteadyStack Sample Model
//!
//! Defines the core data contracts shared by the pipeline:
//! - **Samples:** Timestamped orientation readings (rotation matrix or attitude)
//! - **Frames:** Encoded capture buffers and the exposure biases that produced them
//! - **State:** The bracket session lifecycle
//!
//! All times are seconds on the monotonic capture clock.

pub mod frame;
pub mod sample;
pub mod state;

pub use frame::*;
pub use sample::*;
pub use state::*;
