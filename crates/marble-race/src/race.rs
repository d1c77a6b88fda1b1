//! Race controller: fixed-timestep loop, goal detection and winner resolution.
//!
//! The controller is driven entirely by host frames. Each
//! [`on_frame`](RaceController::on_frame) converts wall-clock time into fixed
//! simulation steps, runs them in a fixed order
//! (physics, marbles, particles, effects, UI objects), then updates pacing and
//! the camera and requests the next frame. Nothing runs between frames; delayed
//! side effects live in [`DeferredTimers`] and are cancelled on reset.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assign::WeightedAssigner;
use crate::backend::PhysicsBackend;
use crate::camera::{Camera, CameraUpdate};
use crate::config::RaceConfig;
use crate::effects::{ParticleManager, SkillEffect, UiObject};
use crate::error::{BackendError, RaceError};
use crate::events::{EventBus, RaceEvent, RaceEventKind, SubscriptionId};
use crate::fast_forward::FastForwardModifier;
use crate::marble::{Marble, Skill};
use crate::recorder::Recorder;
use crate::render::RenderFrame;
use crate::rng::RaceRng;
use crate::schedule::{DeferredAction, DeferredTimers, FrameHandle, FrameScheduler, ManualScheduler};
use crate::snapshot::{MarbleSnapshot, RaceSnapshot};
use crate::stage::Stage;
use crate::time_scale::TimeScaleController;

/// Lifecycle of a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacePhase {
    /// No stage is loaded.
    Idle,
    /// A stage is loaded; marbles may be placed.
    Loaded,
    /// Marbles are racing.
    Running,
    /// The winner has been declared.
    Resolved,
}

/// Owns one race: its backend, marbles, camera and pacing.
pub struct RaceController<B: PhysicsBackend, S: FrameScheduler = ManualScheduler> {
    config: RaceConfig,
    backend: B,
    scheduler: S,
    stages: Vec<Stage>,
    stage_index: Option<usize>,

    rng: RaceRng,
    tokens: Vec<String>,
    seed: Option<u64>,

    /// In-play marbles, sorted by descending y after every frame.
    marbles: Vec<Marble>,
    /// Finished marbles in finish order.
    winners: Vec<Marble>,
    total_marbles: usize,
    requested_rank: usize,
    winner_rank: Option<usize>,
    winner: Option<Marble>,
    phase: RacePhase,
    is_running: bool,
    spectator: bool,

    speed: f32,
    fast_forward: FastForwardModifier,
    time_scale: TimeScaleController,
    camera: Camera,

    elapsed: f32,
    last_time: Option<f64>,
    clock: f64,
    pending_frame: Option<FrameHandle>,
    timers: DeferredTimers,

    events: EventBus,
    particles: ParticleManager,
    effects: Vec<SkillEffect>,
    ui_objects: Vec<Box<dyn UiObject>>,
    recorder: Option<Box<dyn Recorder>>,
}

impl<B: PhysicsBackend, S: FrameScheduler> RaceController<B, S> {
    /// Initializes the backend and loads the first stage.
    ///
    /// A backend that fails to initialize makes construction fail; there is no
    /// partially initialized controller.
    pub fn new(
        mut backend: B,
        scheduler: S,
        stages: Vec<Stage>,
        config: RaceConfig,
    ) -> Result<Self, RaceError> {
        backend.init()?;

        let stage_index = if stages.is_empty() { None } else { Some(0) };
        let mut controller = Self {
            fast_forward: FastForwardModifier::new(config.fast_forward_speed),
            time_scale: TimeScaleController::new(&config),
            camera: Camera::new(config.initial_zoom, config.zoom_threshold),
            config,
            backend,
            scheduler,
            stages,
            stage_index,
            rng: RaceRng::from_entropy(),
            tokens: Vec::new(),
            seed: None,
            marbles: Vec::new(),
            winners: Vec::new(),
            total_marbles: 0,
            requested_rank: 0,
            winner_rank: None,
            winner: None,
            phase: RacePhase::Idle,
            is_running: false,
            spectator: false,
            speed: 1.0,
            elapsed: 0.0,
            last_time: None,
            clock: 0.0,
            pending_frame: None,
            timers: DeferredTimers::new(),
            events: EventBus::new(),
            particles: ParticleManager::new(),
            effects: Vec::new(),
            ui_objects: Vec::new(),
            recorder: None,
        };
        controller.reset_state();
        Ok(controller)
    }

    // ----- lifecycle -------------------------------------------------------

    /// Clears marbles and winners, reloads the stage and restarts the frame loop.
    /// Participants and seed are forgotten too; call
    /// [`set_marbles`](Self::set_marbles) before the next race.
    pub fn reset(&mut self) {
        self.tokens.clear();
        self.seed = None;
        self.reset_state();
        info!("[race] reset");
        self.events.emit(&RaceEvent::Reset);
    }

    fn reset_state(&mut self) {
        self.cancel_frame();
        self.timers.clear();

        self.backend.clear();
        self.marbles.clear();
        self.winners.clear();
        self.total_marbles = 0;
        self.winner_rank = None;
        self.winner = None;
        self.is_running = false;
        self.time_scale.reset();
        self.elapsed = 0.0;
        self.last_time = None;
        self.particles.clear();
        self.effects.clear();

        self.load_stage();
        self.request_frame();
    }

    fn load_stage(&mut self) {
        match self.stage_index.and_then(|index| self.stages.get(index)) {
            Some(stage) => {
                self.backend.create_stage(stage);
                self.camera.init_position(stage);
                self.phase = RacePhase::Loaded;
                info!("[race] map '{}' loaded", stage.title);
            }
            None => self.phase = RacePhase::Idle,
        }
    }

    /// Tears the race down: cancels the frame loop and every pending timer and
    /// drops all listeners. The controller stays inert until [`reset`](Self::reset).
    pub fn destroy(&mut self) {
        self.cancel_frame();
        self.timers.clear();
        self.backend.clear();
        self.marbles.clear();
        self.winners.clear();
        self.tokens.clear();
        self.seed = None;
        self.total_marbles = 0;
        self.winner = None;
        self.winner_rank = None;
        self.is_running = false;
        self.events.clear();
        self.ui_objects.clear();
        self.particles.clear();
        self.effects.clear();
        self.phase = RacePhase::Idle;
        info!("[race] destroyed");
    }

    /// Replaces the marble set. Any previous race state is discarded.
    ///
    /// Returns the number of marbles created. Tokens that do not parse are
    /// dropped silently.
    pub fn set_marbles<T: AsRef<str>>(
        &mut self,
        tokens: &[T],
        seed: Option<u64>,
    ) -> Result<usize, RaceError> {
        let Some(stage_index) = self.stage_index else {
            return Err(RaceError::NoStageSelected);
        };

        self.reset_state();

        self.tokens = tokens.iter().map(|t| t.as_ref().to_string()).collect();
        self.rng = RaceRng::seeded_or_random(seed);
        self.seed = Some(self.rng.seed());

        let stage = &self.stages[stage_index];
        let assignments = WeightedAssigner::assign(&self.tokens, &mut self.rng);
        let total = assignments.len();
        for assignment in &assignments {
            let marble = Marble::new(assignment, total, stage, &mut self.rng);
            self.backend
                .create_marble(&marble.spawn_request(self.config.marble_radius));
            self.marbles.push(marble);
        }
        self.total_marbles = total;

        info!(
            "[race] {} marbles placed on '{}' (seed {})",
            total,
            stage.title,
            self.rng.seed()
        );
        Ok(total)
    }

    /// Starts the race. The requested rank is clamped to the last place.
    pub fn start(&mut self) -> Result<(), RaceError> {
        if self.phase != RacePhase::Loaded {
            warn!("[race] start ignored while {:?}", self.phase);
            return Err(RaceError::InvalidPhase {
                operation: "start",
                phase: self.phase,
            });
        }
        if self.marbles.is_empty() {
            return Err(RaceError::NoMarbles);
        }

        let rank = self.requested_rank.min(self.total_marbles - 1);
        self.winner_rank = Some(rank);
        self.is_running = true;
        self.phase = RacePhase::Running;

        for marble in &mut self.marbles {
            marble.is_active = true;
        }
        self.backend.start();
        self.camera.start_following_marbles();

        if self.config.auto_recording {
            if let Some(recorder) = self.recorder.as_mut() {
                recorder.start();
            }
        }

        info!(
            "[race] started with {} marbles, winning rank {}",
            self.total_marbles, rank
        );
        self.events.emit(&RaceEvent::Started {
            count: self.total_marbles,
        });
        Ok(())
    }

    /// Sets the zero-based finish position whose occupant wins. Clamped when
    /// the race starts; a change during a running race applies to the next one.
    pub fn set_winning_rank(&mut self, rank: usize) {
        if self.phase == RacePhase::Running {
            warn!("[race] winning rank {rank} applies to the next race");
        }
        self.requested_rank = rank;
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<(), RaceError> {
        if speed.is_nan() || speed <= 0.0 {
            return Err(RaceError::InvalidSpeed(speed));
        }
        self.speed = speed;
        Ok(())
    }

    pub fn get_speed(&self) -> f32 {
        self.speed
    }

    /// Switches stage. Current participants and seed are placed again on the
    /// new stage so the layout stays reproducible.
    pub fn set_map(&mut self, index: i64) -> Result<(), RaceError> {
        let count = self.stages.len();
        let selected = usize::try_from(index)
            .ok()
            .filter(|i| *i < count)
            .ok_or(RaceError::MapOutOfRange { index, count })?;

        self.stage_index = Some(selected);
        if self.tokens.is_empty() {
            self.reset_state();
        } else {
            let tokens = std::mem::take(&mut self.tokens);
            self.set_marbles(&tokens, self.seed)?;
        }
        Ok(())
    }

    // ----- spectator mode --------------------------------------------------

    /// In spectator mode physics is never stepped; positions come from
    /// [`set_marble_positions`](Self::set_marble_positions) and the winner from
    /// [`set_winner`](Self::set_winner).
    pub fn set_spectator_mode(&mut self, spectator: bool) {
        self.spectator = spectator;
        info!("[race] spectator mode {}", if spectator { "on" } else { "off" });
    }

    pub fn is_spectator(&self) -> bool {
        self.spectator
    }

    /// Applies absolute transforms from the authoritative side.
    pub fn set_marble_positions(&mut self, snapshots: &[MarbleSnapshot]) -> Result<(), RaceError> {
        for snapshot in snapshots {
            let Some(marble) = self.marbles.iter_mut().find(|m| m.id == snapshot.id) else {
                warn!("[race] snapshot for unknown marble {}", snapshot.id);
                continue;
            };
            marble.sync_pose(snapshot.pose());
            match self.backend.set_marble_position(snapshot.id, snapshot.pose()) {
                Ok(()) | Err(BackendError::Unsupported(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Declares `name` the winner without waiting for the crossing pipeline.
    /// Ignored once the race is resolved.
    pub fn set_winner(&mut self, name: &str) -> Result<(), RaceError> {
        if self.phase == RacePhase::Resolved {
            debug!("[race] winner already resolved, ignoring {name}");
            return Ok(());
        }
        let marble = self
            .marbles
            .iter()
            .chain(self.winners.iter())
            .find(|m| m.name == name)
            .cloned()
            .ok_or_else(|| RaceError::UnknownParticipant(name.to_string()))?;
        self.resolve(marble);
        Ok(())
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            marbles: self.get_marble_positions(),
            winner: self.winner.as_ref().map(|w| w.name.clone()),
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &RaceSnapshot) -> Result<(), RaceError> {
        self.set_marble_positions(&snapshot.marbles)?;
        if let Some(winner) = &snapshot.winner {
            self.set_winner(winner)?;
        }
        Ok(())
    }

    // ----- frame loop ------------------------------------------------------

    /// Host frame callback. `now` is host time in seconds.
    ///
    /// Handles other than the pending one are ignored, so a callback that was
    /// cancelled by `reset` or `destroy` never touches state.
    pub fn on_frame(&mut self, handle: FrameHandle, now: f64) {
        if self.pending_frame != Some(handle) {
            debug!("[race] ignoring stale frame {handle:?}");
            return;
        }
        self.pending_frame = None;
        self.clock = now;

        self.run_timers(now);

        #[allow(clippy::cast_possible_truncation)]
        let delta = self.last_time.map_or(0.0, |last| (now - last).max(0.0) as f32);
        self.last_time = Some(now);
        self.advance(delta);

        self.request_frame();
    }

    fn request_frame(&mut self) {
        self.cancel_frame();
        self.pending_frame = Some(self.scheduler.request_frame());
    }

    fn cancel_frame(&mut self) {
        if let Some(handle) = self.pending_frame.take() {
            self.scheduler.cancel_frame(handle);
        }
    }

    fn run_timers(&mut self, now: f64) {
        for action in self.timers.drain_due(now) {
            match action {
                DeferredAction::RemoveMarble(id) => {
                    debug!("[race] removing finished marble {id}");
                    self.backend.remove_marble(id);
                }
                DeferredAction::StopRecorder => {
                    if let Some(recorder) = self.recorder.as_mut() {
                        debug!("[race] stopping recorder");
                        recorder.stop();
                    }
                }
            }
        }
    }

    fn advance(&mut self, delta: f32) {
        if self.stage_index.is_none() {
            return;
        }

        self.elapsed += delta * self.speed * self.fast_forward.speed();
        if self.elapsed > self.config.max_frame_backlog {
            self.elapsed %= self.config.max_frame_backlog;
        }

        let interval = self.config.fixed_interval;
        while self.elapsed >= interval {
            self.fixed_step(interval);
            self.elapsed -= interval;
        }

        self.marbles.sort_by(|a, b| b.y.total_cmp(&a.y));
        self.update_pacing();
    }

    fn fixed_step(&mut self, interval: f32) {
        if !self.spectator {
            self.backend.step(interval * self.time_scale.time_scale());
        }
        self.update_marbles(interval);

        self.particles.update(interval);
        for effect in &mut self.effects {
            effect.update(interval);
        }
        self.effects.retain(|effect| !effect.is_expired());
        for object in &mut self.ui_objects {
            object.update(interval);
        }
    }

    fn update_marbles(&mut self, dt: f32) {
        let Some(goal_y) = self.stage().map(|stage| stage.goal_y) else {
            return;
        };

        if !self.spectator {
            for marble in &mut self.marbles {
                if let Some(pose) = self.backend.marble_position(marble.id) {
                    marble.sync_pose(pose);
                }

                let update = marble.update(
                    dt,
                    self.config.use_skills,
                    self.config.stuck_delay,
                    &mut self.rng,
                );
                if update.shake {
                    debug!("[race] shaking stuck marble {}", marble.name);
                    self.backend.shake_marble(marble.id);
                }
                if marble.skill == Skill::Impact {
                    debug!("[race] {} used impact", marble.name);
                    self.effects.push(SkillEffect::new(marble.x, marble.y));
                    self.backend.impact(marble.id);
                    marble.mark_impact();
                }
            }
        }

        if self.marbles.iter().all(|m| m.y <= goal_y) {
            return;
        }
        let (crossed, still): (Vec<Marble>, Vec<Marble>) =
            std::mem::take(&mut self.marbles).into_iter().partition(|m| m.y > goal_y);
        self.marbles = still;

        for (index, marble) in crossed.iter().enumerate() {
            self.winners.push(marble.clone());
            let rank = self.winners.len() - 1;
            debug!("[race] {} finished at rank {}", marble.name, rank);
            self.events.emit(&RaceEvent::MarbleFinished {
                name: marble.name.clone(),
                rank,
            });
            self.timers.schedule(
                self.clock,
                f64::from(self.config.removal_delay),
                DeferredAction::RemoveMarble(marble.id),
            );

            let Some(winner_rank) = self.winner_rank else {
                continue;
            };
            if !self.is_running || self.spectator {
                continue;
            }

            if self.winners.len() == winner_rank + 1 {
                self.resolve(marble.clone());
            } else if winner_rank == self.total_marbles - 1 && self.winners.len() == winner_rank {
                // Only one marble is left; it takes last place without crossing.
                let last = crossed[index + 1..].first().or_else(|| self.marbles.first()).cloned();
                if let Some(last) = last {
                    self.resolve(last);
                }
            }
        }
    }

    fn resolve(&mut self, winner: Marble) {
        info!("[race] winner is {}", winner.name);
        self.is_running = false;
        self.phase = RacePhase::Resolved;

        let name = winner.name.clone();
        self.winner = Some(winner);
        self.events.emit(&RaceEvent::Goal { winner: name });

        if let Some(stage) = self.stage_index.and_then(|index| self.stages.get(index)) {
            self.particles.shot(stage.width, stage.goal_y, &mut self.rng);
        }
        self.timers.schedule(
            self.clock,
            f64::from(self.config.recorder_stop_delay),
            DeferredAction::StopRecorder,
        );
    }

    fn update_pacing(&mut self) {
        let Some(stage) = self.stage_index.and_then(|index| self.stages.get(index)) else {
            return;
        };

        self.time_scale.update(
            &self.marbles,
            self.winners.len(),
            self.winner_rank,
            stage.zoom_line(),
        );

        let target_index = if self.winners.is_empty() {
            0
        } else {
            self.winner_rank
                .map_or(0, |rank| rank.saturating_sub(self.winners.len()))
        };
        self.camera.update(CameraUpdate {
            marbles: &self.marbles,
            stage,
            need_to_zoom: self.is_running && self.time_scale.need_to_zoom(),
            target_index,
        });
    }

    // ----- host hooks ------------------------------------------------------

    pub fn subscribe(
        &mut self,
        kind: RaceEventKind,
        listener: impl FnMut(&RaceEvent) + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(kind, listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn add_ui_object(&mut self, object: Box<dyn UiObject>) {
        self.ui_objects.push(object);
    }

    pub fn set_recorder(&mut self, recorder: Box<dyn Recorder>) {
        self.recorder = Some(recorder);
    }

    // ----- queries ---------------------------------------------------------

    /// Marbles still in play.
    pub fn get_count(&self) -> usize {
        self.marbles.len()
    }

    /// Marbles created by the last `set_marbles`.
    pub fn total_count(&self) -> usize {
        self.total_marbles
    }

    pub fn get_marble_positions(&self) -> Vec<MarbleSnapshot> {
        self.marbles.iter().map(MarbleSnapshot::from).collect()
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn marbles(&self) -> &[Marble] {
        &self.marbles
    }

    pub fn winners(&self) -> &[Marble] {
        &self.winners
    }

    pub fn winner(&self) -> Option<&Marble> {
        self.winner.as_ref()
    }

    /// Effective winning rank; `None` until the race starts.
    pub fn winner_rank(&self) -> Option<usize> {
        self.winner_rank
    }

    pub fn requested_rank(&self) -> usize {
        self.requested_rank
    }

    /// Finish order followed by the in-play marbles in current order.
    pub fn rankings(&self) -> Vec<&Marble> {
        self.winners.iter().chain(self.marbles.iter()).collect()
    }

    /// Seed behind the current layout, once marbles have been placed.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn goal_dist(&self) -> f32 {
        self.time_scale.goal_dist()
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale.time_scale()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn fast_forward(&self) -> &FastForwardModifier {
        &self.fast_forward
    }

    pub fn fast_forward_mut(&mut self) -> &mut FastForwardModifier {
        &mut self.fast_forward
    }

    pub fn stage(&self) -> Option<&Stage> {
        self.stage_index.and_then(|index| self.stages.get(index))
    }

    pub fn stage_index(&self) -> Option<usize> {
        self.stage_index
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn render_frame(&self) -> RenderFrame<'_> {
        RenderFrame {
            stage: self.stage(),
            marbles: &self.marbles,
            winners: &self.winners,
            entities: self.backend.entities(),
            camera: self.camera.state(),
            winner_rank: self.winner_rank,
            winner: self.winner.as_ref(),
            theme: &self.config.theme,
            particles: self.particles.particles(),
            effects: &self.effects,
            time_scale: self.time_scale.time_scale(),
        }
    }
}
