//! Configuration for the grabber.
//!
//! Loaded once from config.json at startup and passed explicitly to each
//! component. Every field has a default so a partial file is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::WindowRole;
use crate::error::ConfigError;
use crate::geometry::Point;

/// What the controller does with each detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Click on the detection.
    Click,
    /// Drag from the reference point to the detection.
    #[default]
    Drag,
}

/// Coordinate space of positions posted to the target window.
///
/// Capture always works in physical pixels. `Logical` divides by the monitor
/// DPI scale before posting, for targets that are not DPI aware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSpace {
    #[default]
    Physical,
    Logical,
}

/// Which windows to drive and how to lay them out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Executable name of the target process (case-insensitive)
    pub process_name: String,
    /// Roles by enumeration order; windows past the end get `None`
    pub roles: Vec<WindowRole>,
    /// Where a Master window is moved when arranging
    pub master_origin: Point,
    /// Where a Slave window is moved when arranging
    pub slave_origin: Point,
    /// Move/minimize windows according to their role before starting
    pub arrange: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            process_name: "D2R.exe".to_string(),
            roles: vec![WindowRole::Master, WindowRole::Slave],
            master_origin: Point::new(0, 0),
            slave_origin: Point::new(1920, 0),
            arrange: false,
        }
    }
}

/// Complete grabber configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabberConfig {
    /// Reference bitmap; relative paths resolve next to the executable
    pub template_path: PathBuf,
    /// Minimum correlation score for a match, in (0, 1]
    pub threshold: f32,
    /// Template scale factors, strictly ascending
    pub scales: Vec<f32>,
    /// Inclusive HSV lower bound (H 0-179, S 0-255, V 0-255)
    pub color_lower: [u8; 3],
    /// Inclusive HSV upper bound
    pub color_upper: [u8; 3],
    /// Detections this close (Manhattan) to the reference point are ignored.
    /// Measured in capture pixels, before any coordinate-space conversion.
    pub exclusion_radius: u32,
    /// Drags shorter than this (Manhattan) are not sent. Measured between
    /// the posted points, so in logical pixels under `CoordinateSpace::Logical`.
    pub min_drag_distance: u32,
    pub drag_duration_ms: u64,
    pub drag_steps: u32,
    /// Time between cycle starts
    pub cadence_ms: u64,
    pub action: ActionKind,
    /// Capture-local reference point; `None` means the capture centre
    pub reference_point: Option<Point>,
    pub coordinate_space: CoordinateSpace,
    /// Delay between button-down and button-up of a click
    pub click_hold_ms: u64,
    /// Upper bound on waiting for a captured frame
    pub capture_timeout_ms: u64,
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
    pub window: WindowConfig,
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("resources/template/target.png"),
            threshold: 0.8,
            scales: vec![0.5, 0.7, 1.0, 1.3, 1.5],
            // Green family
            color_lower: [35, 100, 50],
            color_upper: [85, 255, 255],
            exclusion_radius: 5,
            min_drag_distance: 10,
            drag_duration_ms: 500,
            drag_steps: 100,
            cadence_ms: 1000,
            action: ActionKind::Drag,
            reference_point: None,
            coordinate_space: CoordinateSpace::Physical,
            click_hold_ms: 50,
            capture_timeout_ms: 5000,
            log_level: "info".to_string(),
            window: WindowConfig::default(),
        }
    }
}

impl GrabberConfig {
    /// Reads a config file. Returns `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(config))
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Checks every option. Nothing runs unless this passes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::Threshold(self.threshold));
        }
        validate_scales(&self.scales)?;
        validate_bounds(self.color_lower, self.color_upper)?;

        let positive = [
            ("drag_duration_ms", self.drag_duration_ms),
            ("drag_steps", self.drag_steps as u64),
            ("cadence_ms", self.cadence_ms),
            ("click_hold_ms", self.click_hold_ms),
            ("capture_timeout_ms", self.capture_timeout_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::NonPositive(name));
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_scales(scales: &[f32]) -> Result<(), ConfigError> {
    if scales.is_empty() {
        return Err(ConfigError::NoScales);
    }
    for &scale in scales {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigError::InvalidScale(scale));
        }
    }
    for pair in scales.windows(2) {
        if pair[1] <= pair[0] {
            return Err(ConfigError::UnsortedScales {
                previous: pair[0],
                next: pair[1],
            });
        }
    }
    Ok(())
}

pub(crate) fn validate_bounds(lower: [u8; 3], upper: [u8; 3]) -> Result<(), ConfigError> {
    match (0..3).find(|&c| lower[c] > upper[c]) {
        Some(channel) => Err(ConfigError::InvertedColorBound {
            lower,
            upper,
            channel,
        }),
        None => Ok(()),
    }
}
