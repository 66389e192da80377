//! Sampling the target window.
//!
//! This module provides:
//! - Window handles and per-window roles (`WindowHandle`, `WindowRole`)
//! - The per-cycle capture types (`CaptureRegion`, `Frame`)
//! - The `FrameSource` seam the controller captures through
//! - On Windows: window discovery and a Graphics Capture backed source

pub mod region;
pub mod roles;
#[cfg(windows)]
pub mod screenshot;
#[cfg(windows)]
pub mod window;

pub use region::{CaptureRegion, Frame};
pub use roles::{assign_roles, ClientRect, WindowInfo, WindowRole};
#[cfg(windows)]
pub use screenshot::WindowCapturer;
#[cfg(windows)]
pub use window::{apply_role, enable_dpi_awareness, find_windows};

use crate::error::CaptureError;

/// Platform-neutral window handle.
///
/// Stores the raw HWND value so it can cross thread boundaries; the Win32
/// wrapper is rebuilt where it is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowHandle(pub isize);

impl std::fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(windows)]
impl WindowHandle {
    pub fn hwnd(self) -> windows::Win32::Foundation::HWND {
        windows::Win32::Foundation::HWND(self.0 as *mut std::ffi::c_void)
    }

    pub fn from_hwnd(hwnd: windows::Win32::Foundation::HWND) -> Self {
        Self(hwnd.0 as isize)
    }
}

/// One cycle's snapshot: where it was taken and what it saw.
#[derive(Clone, Debug)]
pub struct Capture {
    pub region: CaptureRegion,
    pub frame: Frame,
}

/// Produces one capture per call.
///
/// Any error is treated as "target gone" by the controller.
pub trait FrameSource {
    fn capture(&mut self) -> Result<Capture, CaptureError>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn capture(&mut self) -> Result<Capture, CaptureError> {
        (**self).capture()
    }
}
