//! The detection loop and what drives it.
//!
//! This module provides:
//! - Synthetic click and drag injection through a `MessageSink`
//! - Fixed-rate pacing with a cooperative stop signal
//! - The per-window controller state machine
//! - The session runner that starts one controller per window

pub mod input;
pub mod runner;
pub mod scheduler;
pub mod state;

pub use input::{pack_lparam, InjectionOutcome, Injector, MessageSink, WindowMessage};
#[cfg(windows)]
pub use input::PostMessageSink;
#[cfg(windows)]
pub use runner::start_window_session;
pub use runner::Session;
pub use scheduler::{Cadence, StopSignal};
pub use state::{Controller, ControllerState, CycleReport, ExitReason, InjectionTarget};
