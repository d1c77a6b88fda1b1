//! Physics backend contract.
//!
//! The race controller never touches rigid-body internals; it talks to the
//! engine only through [`PhysicsBackend`]. Any engine satisfying this trait is
//! interchangeable. [`RapierBackend`](crate::physics::RapierBackend) is the
//! bundled implementation.

use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::marble::{Color, MarbleId};
use crate::stage::{EntityShape, Stage};

/// Absolute transform of a marble body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct MarblePose {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

/// Everything a backend needs to create a marble body.
#[derive(Debug, Clone, PartialEq)]
pub struct MarbleSpawn {
    pub id: MarbleId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Normalized weight in `[0.1, 1.1]`.
    pub weight: f32,
    pub name: String,
    pub color: Color,
}

/// Current state of a stage obstacle, as reported for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub shape: EntityShape,
    /// Remaining hits for breakable obstacles.
    pub life: Option<u32>,
}

/// Rigid-body engine reached by the race controller.
///
/// Marble bodies are created asleep and only begin simulating after
/// [`start`](PhysicsBackend::start).
pub trait PhysicsBackend {
    /// Brings up the world. A failure here is fatal to the controller.
    fn init(&mut self) -> Result<(), BackendError>;

    /// Drops every body, stage and marbles alike.
    fn clear(&mut self);

    /// Drops marble bodies only; the stage stays loaded.
    fn clear_marbles(&mut self);

    /// Builds the stage's obstacles. Replaces any previously loaded stage.
    fn create_stage(&mut self, stage: &Stage);

    fn create_marble(&mut self, spawn: &MarbleSpawn);

    /// Applies a random nudge to free a stuck marble.
    fn shake_marble(&mut self, id: MarbleId);

    fn remove_marble(&mut self, id: MarbleId);

    fn marble_position(&self, id: MarbleId) -> Option<MarblePose>;

    /// Teleports a marble. Only spectator mode needs this, so backends may
    /// leave it unsupported.
    fn set_marble_position(&mut self, id: MarbleId, pose: MarblePose) -> Result<(), BackendError> {
        let _ = (id, pose);
        Err(BackendError::Unsupported("set_marble_position"))
    }

    fn entities(&self) -> Vec<EntityState>;

    /// Fires the impact skill centred on marble `id`.
    fn impact(&mut self, id: MarbleId);

    /// Wakes every marble body.
    fn start(&mut self);

    /// Advances the world by `delta_seconds`.
    fn step(&mut self, delta_seconds: f32);
}
