//! SteadyStack Capture Engine
//!
//! Runs bracketed-capture sessions: requests an exposure bracket from the
//! camera, records device orientation alongside it, and once every frame is
//! in, estimates orientation at the bracket's first and last frame and
//! median-blends the exposures.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    CaptureWorker                     │
//! │  ┌──────────────┐   ┌──────────────────────────────┐ │
//! │  │ CaptureSource│──►│ BracketSession               │ │
//! │  └──────────────┘   │ Idle→Preparing→Capturing→    │ │
//! │  ┌──────────────┐   │ Collecting→Finalizing→Complete│ │
//! │  │ MotionSource │   └──────────────┬───────────────┘ │
//! │  └──────┬───────┘                  │                 │
//! │         ▼                          ▼                 │
//! │  ┌──────────────┐   ┌──────────────────────────────┐ │
//! │  │OrientationFeed│─►│ orientation lookup + blend   │ │
//! │  └──────────────┘   └──────────────┬───────────────┘ │
//! └────────────────────────────────────┼─────────────────┘
//!                                      ▼
//!                                  ResultSink
//! ```

pub mod feed;
pub mod session;
pub mod source;
pub mod synthetic;
pub mod worker;

pub use feed::{FeedStatus, OrientationFeed};
pub use session::*;
pub use source::*;
pub use worker::{CaptureHandle, CaptureWorker};
