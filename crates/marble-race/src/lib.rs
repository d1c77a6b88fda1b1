//! Marble Race Core Library
//!
//! Turns a weighted list of named participants into exactly one resolved winner
//! by racing marbles down a `Rapier2D` stage, with deterministic seeding,
//! finish-line slow motion and a follow camera.
//!
//! The physics engine sits behind [`PhysicsBackend`]; [`RapierBackend`] is the
//! bundled implementation. [`RaceController`] owns the fixed-timestep loop and
//! is driven by host frames through a [`FrameScheduler`].

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod assign;
pub mod backend;
pub mod camera;
pub mod config;
pub mod effects;
pub mod error;
pub mod events;
pub mod fast_forward;
pub mod marble;
pub mod physics;
pub mod race;
pub mod recorder;
pub mod render;
pub mod rng;
pub mod schedule;
pub mod snapshot;
pub mod stage;
pub mod time_scale;

#[cfg(test)]
pub(crate) mod test_utils;

pub use assign::{Assignment, Participant, WeightedAssigner};
pub use backend::{EntityState, MarblePose, MarbleSpawn, PhysicsBackend};
pub use camera::{Camera, CameraMode, CameraState};
pub use config::{FIXED_INTERVAL, RaceConfig, ZOOM_THRESHOLD};
pub use effects::{ParticleManager, SkillEffect, UiObject};
pub use error::{BackendError, RaceError};
pub use events::{EventBus, RaceEvent, RaceEventKind, SubscriptionId};
pub use fast_forward::FastForwardModifier;
pub use marble::{Color, Marble, MarbleId, Skill};
pub use physics::{PhysicsWorld, RapierBackend};
pub use race::{RaceController, RacePhase};
pub use recorder::{Recorder, RecordingWindow};
pub use render::{RenderFrame, Theme};
pub use rng::RaceRng;
pub use schedule::{DeferredAction, DeferredTimers, FrameHandle, FrameScheduler, ManualScheduler};
pub use snapshot::{MarbleSnapshot, RaceSnapshot};
pub use stage::{EntityShape, EntityType, Stage, builtin_stages};
pub use time_scale::TimeScaleController;
