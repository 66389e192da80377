//! Window roles and the window descriptions handed to the controllers.

use serde::{Deserialize, Serialize};

use super::WindowHandle;
use crate::geometry::Point;

/// What a discovered window is used for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowRole {
    /// Operated by the user; never automated
    Master,
    /// Driven by a detection loop
    Slave,
    /// Ignored (minimized when arranging)
    #[default]
    None,
}

impl std::fmt::Display for WindowRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowRole::Master => write!(f, "master"),
            WindowRole::Slave => write!(f, "slave"),
            WindowRole::None => write!(f, "none"),
        }
    }
}

/// Client rectangle in physical screen pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientRect {
    pub origin: Point,
    pub width: u32,
    pub height: u32,
}

/// A top-level window found for the target process.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub title: String,
    pub process_name: String,
    pub client: ClientRect,
}

/// Pairs windows with roles by enumeration order. Extra windows get `None`.
pub fn assign_roles(windows: &[WindowInfo], roles: &[WindowRole]) -> Vec<(WindowInfo, WindowRole)> {
    windows
        .iter()
        .enumerate()
        .map(|(i, w)| (w.clone(), roles.get(i).copied().unwrap_or_default()))
        .collect()
}
