//! Test utilities for driving races without rapier.
//!
//! Provides `ScriptedBackend`, a physics backend whose marbles simply move
//! toward the goal at a fixed per-marble speed, and `FrameClock`, which feeds
//! host frames to a controller on a manual 60Hz clock.

use std::collections::BTreeMap;

use crate::assign::Assignment;
use crate::backend::{EntityState, MarblePose, MarbleSpawn, PhysicsBackend};
use crate::config::RaceConfig;
use crate::error::BackendError;
use crate::marble::{Marble, MarbleId};
use crate::race::RaceController;
use crate::rng::RaceRng;
use crate::schedule::ManualScheduler;
use crate::stage::{EntityProps, EntityShape, EntityType, Position, Stage, StageEntity};

/// Host frame length used by [`FrameClock`].
pub(crate) const FRAME_SECONDS: f64 = 1.0 / 60.0;

/// Open 26x30 stage: two side walls, goal at y = 20, pacing line at 18.
pub(crate) fn test_stage() -> Stage {
    let wall = |x: f32| StageEntity {
        position: Position { x, y: 0.0 },
        kind: EntityType::Static,
        shape: EntityShape::Polyline {
            rotation: 0.0,
            points: vec![[0.0, -10.0], [0.0, 40.0]],
        },
        props: EntityProps::default(),
    };

    Stage {
        title: "Test".to_string(),
        entities: vec![wall(1.0), wall(25.0)],
        goal_y: 20.0,
        zoom_y: Some(18.0),
        start_y: 0.0,
        width: 26.0,
        height: 30.0,
    }
}

/// Marble `id` placed at height `y` on the test stage.
pub(crate) fn marble_at(id: MarbleId, y: f32) -> Marble {
    let assignment = Assignment {
        name: format!("M{id}"),
        weight: 1.0,
        order: id as usize,
    };
    let mut marble = Marble::new(&assignment, 10, &test_stage(), &mut RaceRng::from_seed(1));
    marble.y = y;
    marble
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ScriptedBody {
    pub pose: MarblePose,
    pub enabled: bool,
}

/// Backend whose enabled marbles move straight down at `5 + id` units per
/// second unless overridden in `speeds`.
#[derive(Debug, Default)]
pub(crate) struct ScriptedBackend {
    pub fail_init: bool,
    pub bodies: BTreeMap<MarbleId, ScriptedBody>,
    pub speeds: BTreeMap<MarbleId, f32>,
    pub stage_title: Option<String>,
    pub steps: usize,
    pub last_delta: f32,
    pub shaken: Vec<MarbleId>,
    pub impacts: Vec<MarbleId>,
}

impl ScriptedBackend {
    #[allow(clippy::cast_precision_loss)]
    fn speed(&self, id: MarbleId) -> f32 {
        self.speeds.get(&id).copied().unwrap_or(5.0 + id as f32)
    }
}

impl PhysicsBackend for ScriptedBackend {
    fn init(&mut self) -> Result<(), BackendError> {
        if self.fail_init {
            return Err(BackendError::InitFailed("scripted failure".to_string()));
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.bodies.clear();
        self.stage_title = None;
    }

    fn clear_marbles(&mut self) {
        self.bodies.clear();
    }

    fn create_stage(&mut self, stage: &Stage) {
        self.stage_title = Some(stage.title.clone());
    }

    fn create_marble(&mut self, spawn: &MarbleSpawn) {
        self.bodies.insert(
            spawn.id,
            ScriptedBody {
                pose: MarblePose {
                    x: spawn.x,
                    y: spawn.y,
                    angle: 0.0,
                },
                enabled: false,
            },
        );
    }

    fn shake_marble(&mut self, id: MarbleId) {
        self.shaken.push(id);
    }

    fn remove_marble(&mut self, id: MarbleId) {
        self.bodies.remove(&id);
    }

    fn marble_position(&self, id: MarbleId) -> Option<MarblePose> {
        self.bodies.get(&id).map(|body| body.pose)
    }

    fn set_marble_position(&mut self, id: MarbleId, pose: MarblePose) -> Result<(), BackendError> {
        let body = self.bodies.get_mut(&id).ok_or(BackendError::UnknownMarble(id))?;
        body.pose = pose;
        Ok(())
    }

    fn entities(&self) -> Vec<EntityState> {
        Vec::new()
    }

    fn impact(&mut self, id: MarbleId) {
        self.impacts.push(id);
    }

    fn start(&mut self) {
        for body in self.bodies.values_mut() {
            body.enabled = true;
        }
    }

    fn step(&mut self, delta_seconds: f32) {
        self.steps += 1;
        self.last_delta = delta_seconds;
        let ids: Vec<MarbleId> = self.bodies.keys().copied().collect();
        for id in ids {
            let speed = self.speed(id);
            if let Some(body) = self.bodies.get_mut(&id) {
                if body.enabled {
                    body.pose.y += speed * delta_seconds;
                }
            }
        }
    }
}

/// Controller over a [`ScriptedBackend`] with the test stage loaded.
pub(crate) fn scripted_controller() -> RaceController<ScriptedBackend> {
    scripted_controller_with(vec![test_stage()], RaceConfig::default())
}

pub(crate) fn scripted_controller_with(
    stages: Vec<Stage>,
    config: RaceConfig,
) -> RaceController<ScriptedBackend> {
    RaceController::new(ScriptedBackend::default(), ManualScheduler::new(), stages, config)
        .expect("scripted backend initializes")
}

/// Manual host clock delivering frames at 60Hz.
#[derive(Debug, Default)]
pub(crate) struct FrameClock {
    pub now: f64,
}

impl FrameClock {
    /// Delivers up to `frames` pending frames. Returns how many were delivered.
    pub fn run<B: PhysicsBackend>(
        &mut self,
        controller: &mut RaceController<B>,
        frames: usize,
    ) -> usize {
        for delivered in 0..frames {
            let Some(handle) = controller.scheduler_mut().take_pending() else {
                return delivered;
            };
            self.now += FRAME_SECONDS;
            controller.on_frame(handle, self.now);
        }
        frames
    }

    /// Delivers frames until `done` holds or `max_frames` have run.
    pub fn run_until<B: PhysicsBackend>(
        &mut self,
        controller: &mut RaceController<B>,
        max_frames: usize,
        done: impl Fn(&RaceController<B>) -> bool,
    ) -> bool {
        for _ in 0..max_frames {
            if done(controller) {
                return true;
            }
            if self.run(controller, 1) == 0 {
                return false;
            }
        }
        done(controller)
    }
}
