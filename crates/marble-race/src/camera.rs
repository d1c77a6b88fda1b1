//! Viewport follow logic.
//!
//! The camera shows a static overview of the start area until
//! [`Camera::start_following_marbles`] is called, then tracks the marble that
//! currently matters for the outcome and zooms in as it nears the pacing line.

use serde::{Deserialize, Serialize};

use crate::marble::{Marble, MarbleId};
use crate::stage::Stage;

/// Fraction of the remaining distance covered per update.
const SMOOTHING: f32 = 0.1;

/// Zoom reached when the target sits exactly on the pacing line.
const MAX_ZOOM: f32 = 4.0;

/// Camera viewing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraMode {
    /// Static view of the start area (waiting and ready phases).
    #[default]
    Overview,
    /// Follows the target marble (race phase).
    FollowMarbles,
}

/// Camera state read by the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    /// Current center in world coordinates.
    pub position: [f32; 2],
    /// Zoom multiplier on top of the initial pixels-per-unit scale.
    pub zoom: f32,
    /// Marble being tracked, if any.
    pub follow_target: Option<MarbleId>,
    /// When set, auto-follow is suspended and the viewport is driven externally.
    pub locked: bool,
    pub mode: CameraMode,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0],
            zoom: 1.0,
            follow_target: None,
            locked: false,
            mode: CameraMode::Overview,
        }
    }
}

/// Per-tick inputs for [`Camera::update`].
#[derive(Debug, Clone, Copy)]
pub struct CameraUpdate<'a> {
    /// In-play marbles sorted by descending y.
    pub marbles: &'a [Marble],
    pub stage: &'a Stage,
    pub need_to_zoom: bool,
    pub target_index: usize,
}

#[derive(Debug, Clone)]
pub struct Camera {
    state: CameraState,
    target_position: [f32; 2],
    target_zoom: f32,
    initial_zoom: f32,
    zoom_threshold: f32,
}

impl Camera {
    pub fn new(initial_zoom: f32, zoom_threshold: f32) -> Self {
        Self {
            state: CameraState::default(),
            target_position: [0.0, 0.0],
            target_zoom: 1.0,
            initial_zoom,
            zoom_threshold,
        }
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn position(&self) -> [f32; 2] {
        self.state.position
    }

    pub fn zoom(&self) -> f32 {
        self.state.zoom
    }

    pub fn is_locked(&self) -> bool {
        self.state.locked
    }

    /// Suspends (or resumes) auto-follow.
    pub fn lock(&mut self, locked: bool) {
        self.state.locked = locked;
    }

    /// Sets the camera target directly. Meant for hosts that locked the viewport.
    pub fn look_at(&mut self, position: [f32; 2], zoom: f32) {
        self.target_position = position;
        self.target_zoom = zoom;
    }

    /// Snaps to the overview of `stage` and stops following marbles.
    pub fn init_position(&mut self, stage: &Stage) {
        let overview = Self::overview_target(stage);
        self.state.mode = CameraMode::Overview;
        self.state.follow_target = None;
        self.state.position = overview;
        self.state.zoom = 1.0;
        self.target_position = overview;
        self.target_zoom = 1.0;
    }

    pub fn start_following_marbles(&mut self) {
        self.state.mode = CameraMode::FollowMarbles;
    }

    fn overview_target(stage: &Stage) -> [f32; 2] {
        [stage.width / 2.0, stage.start_y]
    }

    pub fn update(&mut self, input: CameraUpdate<'_>) {
        if !self.state.locked {
            match self.state.mode {
                CameraMode::Overview => {
                    self.state.follow_target = None;
                    self.target_position = Self::overview_target(input.stage);
                    self.target_zoom = 1.0;
                }
                CameraMode::FollowMarbles => self.follow(input),
            }
        }
        self.interpolate();
    }

    fn follow(&mut self, input: CameraUpdate<'_>) {
        let Some(target) = input
            .marbles
            .get(input.target_index)
            .or_else(|| input.marbles.first())
        else {
            return;
        };

        self.state.follow_target = Some(target.id);
        self.target_position = target.position();
        self.target_zoom = if input.need_to_zoom {
            let dist = (input.stage.zoom_line() - target.y).abs();
            ((1.0 - dist / self.zoom_threshold) * MAX_ZOOM).max(1.0)
        } else {
            1.0
        };
    }

    fn interpolate(&mut self) {
        let snap = 1.0 / self.initial_zoom;
        for axis in 0..2 {
            let diff = self.target_position[axis] - self.state.position[axis];
            if diff.abs() < snap {
                self.state.position[axis] = self.target_position[axis];
            } else {
                self.state.position[axis] += diff * SMOOTHING;
            }
        }

        let zoom_diff = self.target_zoom - self.state.zoom;
        if zoom_diff.abs() < snap {
            self.state.zoom = self.target_zoom;
        } else {
            self.state.zoom += zoom_diff * SMOOTHING;
        }
    }
}
