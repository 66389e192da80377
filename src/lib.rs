//! Grabber
//!
//! Finds a colored marker in a window by multi-scale template matching and
//! answers each sighting with a synthetic click or drag posted straight into
//! the window's message queue.

pub mod automation;
pub mod capture;
pub mod config;
pub mod coords;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod paths;

pub use config::GrabberConfig;
pub use error::{CaptureError, ConfigError, InjectionError, MatchError};
pub use geometry::Point;
