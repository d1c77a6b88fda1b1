//! Race tuning configuration.
//!
//! Every constant the race loop, camera and pacing logic depend on lives here so
//! hosts can override them from a JSON file. Missing keys fall back to
//! [`RaceConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RaceError;
use crate::render::Theme;

/// Nominal fixed simulation step in seconds (100Hz).
pub const FIXED_INTERVAL: f32 = 0.01;

/// Distance from `zoomY` under which finish-line pacing kicks in.
pub const ZOOM_THRESHOLD: f32 = 5.0;

/// Tuning knobs for a race controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RaceConfig {
    /// Fixed simulation step in seconds.
    pub fixed_interval: f32,
    /// Upper bound on simulated time carried between frames, in seconds.
    pub max_frame_backlog: f32,
    /// Distance from `zoomY` under which slow motion and zoom are considered.
    pub zoom_threshold: f32,
    /// Multiplier on `zoom_threshold` the target marble must be within.
    pub suspense_factor: f32,
    /// Lower bound on the time scale.
    pub min_time_scale: f32,
    /// Multiplier applied while fast-forward is held.
    pub fast_forward_speed: f32,
    /// Delay before a finished marble is removed from the backend, in seconds.
    pub removal_delay: f32,
    /// Delay between resolution and stopping the recorder, in seconds.
    pub recorder_stop_delay: f32,
    /// How long a marble may sit still before it is shaken, in seconds.
    pub stuck_delay: f32,
    /// Whether marbles roll for skills while racing.
    pub use_skills: bool,
    /// Start the attached recorder automatically when the race starts.
    pub auto_recording: bool,
    /// Pixels per world unit at zoom 1.
    pub initial_zoom: f32,
    /// Marble collider radius in world units.
    pub marble_radius: f32,
    /// World gravity (positive y points toward the goal).
    pub gravity: [f32; 2],
    /// Colors handed to the renderer.
    pub theme: Theme,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            fixed_interval: FIXED_INTERVAL,
            max_frame_backlog: 0.1,
            zoom_threshold: ZOOM_THRESHOLD,
            suspense_factor: 1.2,
            min_time_scale: 0.2,
            fast_forward_speed: 4.0,
            removal_delay: 0.5,
            recorder_stop_delay: 1.0,
            stuck_delay: 5.0,
            use_skills: true,
            auto_recording: false,
            initial_zoom: 30.0,
            marble_radius: 0.25,
            gravity: [0.0, 10.0],
            theme: Theme::dark(),
        }
    }
}

impl RaceConfig {
    /// Parses a configuration from JSON. Unknown keys are rejected by serde only
    /// when malformed; missing keys take their default.
    pub fn from_json(json: &str) -> Result<Self, RaceError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RaceError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, RaceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RaceConfig::from_json(r#"{ "zoomThreshold": 8.0, "useSkills": false }"#)
            .expect("valid config");

        assert_eq!(config.zoom_threshold, 8.0);
        assert!(!config.use_skills);
        assert_eq!(config.fixed_interval, FIXED_INTERVAL);
        assert_eq!(config.fast_forward_speed, 4.0);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = RaceConfig {
            removal_delay: 0.25,
            theme: Theme::light(),
            ..RaceConfig::default()
        };
        let json = config.to_json().expect("serialize");
        let loaded = RaceConfig::from_json(&json).expect("deserialize");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = RaceConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, RaceError::Config(_)));
    }
}
