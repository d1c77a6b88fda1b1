//! Rapier2D implementation of the physics backend contract.

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use rapier2d::prelude::*;
use tracing::debug;

use crate::backend::{EntityState, MarblePose, MarbleSpawn, PhysicsBackend};
use crate::error::BackendError;
use crate::marble::MarbleId;
use crate::rng::RaceRng;
use crate::stage::{EntityShape, EntityType, Stage};

/// Marbles within this distance of an impact are pushed.
const IMPACT_RADIUS: f32 = 10.0;

/// Peak impulse applied by an impact at zero distance.
const IMPACT_POWER: f32 = 5.0;

/// Half-range of the random impulse used to free stuck marbles.
const SHAKE_POWER: f32 = 5.0;

const MARBLE_RESTITUTION: f32 = 0.2;

/// Default gravity vector (positive y runs toward the goal line).
pub fn default_gravity() -> Vector {
    Vector::new(0.0, 10.0)
}

/// Physics world containing all `Rapier2D` components for deterministic simulation.
pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub gravity: Vector,
    pub frame: u64,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("frame", &self.frame)
            .field("rigid_body_count", &self.rigid_body_set.len())
            .field("collider_count", &self.collider_set.len())
            .field("gravity", &self.gravity)
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::with_gravity(default_gravity())
    }

    pub fn with_gravity(gravity: Vector) -> Self {
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity,
            frame: 0,
        }
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// The step length varies with the race's time scale, so it is written into
    /// the integration parameters on every call.
    pub fn step_by(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            &(),
        );
        self.frame += 1;
    }

    pub fn add_rigid_body(&mut self, rigid_body: RigidBody) -> RigidBodyHandle {
        self.rigid_body_set.insert(rigid_body)
    }

    pub fn add_collider(&mut self, collider: Collider, parent: RigidBodyHandle) -> ColliderHandle {
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    /// Removes a rigid body and its attached colliders.
    pub fn remove_rigid_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    pub fn get_rigid_body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    pub fn get_rigid_body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.rigid_body_set.get_mut(handle)
    }

    /// Computes a deterministic hash of body positions and velocities.
    /// Two viewers running the same seed must agree on it frame by frame.
    pub fn compute_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.frame.hash(&mut hasher);

        for (handle, body) in self.rigid_body_set.iter() {
            let (index, generation) = handle.into_raw_parts();
            index.hash(&mut hasher);
            generation.hash(&mut hasher);

            let pos = body.translation();
            hash_f32(pos.x, &mut hasher);
            hash_f32(pos.y, &mut hasher);
            hash_f32(body.rotation().angle(), &mut hasher);

            let linvel = body.linvel();
            hash_f32(linvel.x, &mut hasher);
            hash_f32(linvel.y, &mut hasher);
            hash_f32(body.angvel(), &mut hasher);
        }

        hasher.finish()
    }

    /// Drops every body and collider.
    pub fn reset(&mut self) {
        *self = Self::with_gravity(self.gravity);
    }
}

fn hash_f32(value: f32, hasher: &mut impl Hasher) {
    value.to_bits().hash(hasher);
}

#[derive(Debug, Clone, Copy)]
struct MarbleBody {
    body: RigidBodyHandle,
    collider: ColliderHandle,
}

#[derive(Debug, Clone)]
struct StageBody {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    shape: EntityShape,
    life: Option<u32>,
    /// Marble colliders in contact during the previous step.
    touching: Vec<ColliderHandle>,
}

/// [`PhysicsBackend`] over a [`PhysicsWorld`].
///
/// Marble bookkeeping uses ordered maps so impacts iterate in id order and the
/// simulation stays reproducible for a given seed.
pub struct RapierBackend {
    world: PhysicsWorld,
    marbles: BTreeMap<MarbleId, MarbleBody>,
    entities: Vec<StageBody>,
    rng: RaceRng,
    initialized: bool,
}

impl fmt::Debug for RapierBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RapierBackend")
            .field("world", &self.world)
            .field("marbles", &self.marbles.len())
            .field("entities", &self.entities.len())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl RapierBackend {
    /// Creates a backend whose random nudges are driven by `seed`.
    pub fn new(seed: u64) -> Self {
        Self::with_gravity(seed, [0.0, 10.0])
    }

    pub fn with_gravity(seed: u64, gravity: [f32; 2]) -> Self {
        Self {
            world: PhysicsWorld::with_gravity(Vector::new(gravity[0], gravity[1])),
            marbles: BTreeMap::new(),
            entities: Vec::new(),
            rng: RaceRng::from_seed(seed),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn marble_count(&self) -> usize {
        self.marbles.len()
    }

    pub fn compute_hash(&self) -> u64 {
        self.world.compute_hash()
    }

    fn entity_collider(shape: &EntityShape) -> ColliderBuilder {
        match shape {
            EntityShape::Box {
                width,
                height,
                rotation,
            } => ColliderBuilder::cuboid(*width, *height).rotation(*rotation),
            EntityShape::Circle { radius } => ColliderBuilder::ball(*radius),
            EntityShape::Polyline { rotation, points } => {
                let vertices: Vec<Vector> =
                    points.iter().map(|p| Vector::new(p[0], p[1])).collect();
                #[allow(clippy::cast_possible_truncation)]
                let indices: Vec<[u32; 2]> =
                    (1..vertices.len() as u32).map(|i| [i - 1, i]).collect();
                ColliderBuilder::new(SharedShape::polyline(vertices, Some(indices)))
                    .rotation(*rotation)
            }
        }
    }

    fn remove_stage(&mut self) {
        for entity in self.entities.drain(..) {
            self.world.remove_rigid_body(entity.body);
        }
    }

    /// Counts new marble contacts on breakable obstacles and removes the ones
    /// that ran out of life.
    fn update_entity_life(&mut self) {
        let marble_colliders: Vec<ColliderHandle> =
            self.marbles.values().map(|m| m.collider).collect();
        let mut broken = Vec::new();

        for (index, entity) in self.entities.iter_mut().enumerate() {
            let Some(life) = entity.life else {
                continue;
            };

            let own = entity.collider;
            let touching: Vec<ColliderHandle> = self
                .world
                .narrow_phase
                .contact_pairs_with(own)
                .filter(|pair| pair.has_any_active_contact())
                .map(|pair| {
                    if pair.collider1 == own {
                        pair.collider2
                    } else {
                        pair.collider1
                    }
                })
                .filter(|other| marble_colliders.contains(other))
                .collect();

            let hits = touching
                .iter()
                .filter(|handle| !entity.touching.contains(handle))
                .count();
            entity.touching = touching;

            if hits > 0 {
                let hits = u32::try_from(hits).unwrap_or(u32::MAX);
                let remaining = life.saturating_sub(hits);
                entity.life = Some(remaining);
                if remaining == 0 {
                    broken.push(index);
                }
            }
        }

        for index in broken.into_iter().rev() {
            let entity = self.entities.remove(index);
            self.world.remove_rigid_body(entity.body);
            debug!("[physics] obstacle {index} broke");
        }
    }
}

impl PhysicsBackend for RapierBackend {
    fn init(&mut self) -> Result<(), BackendError> {
        let gravity = self.world.gravity;
        if !gravity.x.is_finite() || !gravity.y.is_finite() {
            return Err(BackendError::InitFailed(format!(
                "gravity must be finite, got ({}, {})",
                gravity.x, gravity.y
            )));
        }
        self.initialized = true;
        Ok(())
    }

    fn clear(&mut self) {
        self.world.reset();
        self.marbles.clear();
        self.entities.clear();
    }

    fn clear_marbles(&mut self) {
        let marbles = std::mem::take(&mut self.marbles);
        for marble in marbles.values() {
            self.world.remove_rigid_body(marble.body);
        }
    }

    fn create_stage(&mut self, stage: &Stage) {
        self.remove_stage();

        for entity in &stage.entities {
            let builder = match entity.kind {
                EntityType::Static => RigidBodyBuilder::fixed(),
                EntityType::Kinematic => {
                    RigidBodyBuilder::kinematic_velocity_based()
                        .angvel(entity.props.angular_velocity)
                }
            };
            let body = builder
                .translation(Vector::new(entity.position.x, entity.position.y))
                .build();
            let body_handle = self.world.add_rigid_body(body);

            let collider = Self::entity_collider(&entity.shape)
                .density(entity.props.density)
                .restitution(entity.props.restitution)
                .build();
            let collider_handle = self.world.add_collider(collider, body_handle);

            self.entities.push(StageBody {
                body: body_handle,
                collider: collider_handle,
                shape: entity.shape.clone(),
                life: entity.props.life,
                touching: Vec::new(),
            });
        }

        debug!(
            "[physics] stage '{}' created with {} entities",
            stage.title,
            self.entities.len()
        );
    }

    fn create_marble(&mut self, spawn: &MarbleSpawn) {
        self.remove_marble(spawn.id);

        let body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(spawn.x, spawn.y))
            .ccd_enabled(true)
            .enabled(false)
            .build();
        let body_handle = self.world.add_rigid_body(body);

        let collider = ColliderBuilder::ball(spawn.radius)
            .restitution(MARBLE_RESTITUTION)
            .density(1.0 + spawn.weight)
            .build();
        let collider_handle = self.world.add_collider(collider, body_handle);

        self.marbles.insert(
            spawn.id,
            MarbleBody {
                body: body_handle,
                collider: collider_handle,
            },
        );
    }

    fn shake_marble(&mut self, id: MarbleId) {
        let Some(marble) = self.marbles.get(&id).copied() else {
            return;
        };
        let impulse = Vector::new(
            self.rng.range_f32(-SHAKE_POWER, SHAKE_POWER),
            self.rng.range_f32(-SHAKE_POWER, SHAKE_POWER),
        );
        if let Some(body) = self.world.get_rigid_body_mut(marble.body) {
            body.apply_impulse(impulse, true);
        }
    }

    fn remove_marble(&mut self, id: MarbleId) {
        if let Some(marble) = self.marbles.remove(&id) {
            self.world.remove_rigid_body(marble.body);
        }
    }

    fn marble_position(&self, id: MarbleId) -> Option<MarblePose> {
        let marble = self.marbles.get(&id)?;
        let body = self.world.get_rigid_body(marble.body)?;
        let pos = body.translation();
        Some(MarblePose {
            x: pos.x,
            y: pos.y,
            angle: body.rotation().angle(),
        })
    }

    fn set_marble_position(&mut self, id: MarbleId, pose: MarblePose) -> Result<(), BackendError> {
        let marble = self
            .marbles
            .get(&id)
            .copied()
            .ok_or(BackendError::UnknownMarble(id))?;
        let body = self
            .world
            .get_rigid_body_mut(marble.body)
            .ok_or(BackendError::UnknownMarble(id))?;
        body.set_translation(Vector::new(pose.x, pose.y), true);
        body.set_rotation(Rotation::from_angle(pose.angle), true);
        body.set_linvel(Vector::new(0.0, 0.0), true);
        body.set_angvel(0.0, true);
        Ok(())
    }

    fn entities(&self) -> Vec<EntityState> {
        self.entities
            .iter()
            .filter_map(|entity| {
                let body = self.world.get_rigid_body(entity.body)?;
                let pos = body.translation();
                Some(EntityState {
                    x: pos.x,
                    y: pos.y,
                    angle: body.rotation().angle(),
                    shape: entity.shape.clone(),
                    life: entity.life,
                })
            })
            .collect()
    }

    fn impact(&mut self, id: MarbleId) {
        let Some(source) = self.marble_position(id) else {
            return;
        };

        let targets: Vec<(MarbleId, RigidBodyHandle)> = self
            .marbles
            .iter()
            .filter(|(other, _)| **other != id)
            .map(|(other, marble)| (*other, marble.body))
            .collect();

        for (_, handle) in targets {
            let Some(body) = self.world.get_rigid_body_mut(handle) else {
                continue;
            };
            let pos = body.translation();
            let dx = pos.x - source.x;
            let dy = pos.y - source.y;
            let dist_sq = dx * dx + dy * dy;
            if dist_sq >= IMPACT_RADIUS * IMPACT_RADIUS {
                continue;
            }

            let dist = dist_sq.sqrt();
            let (nx, ny) = if dist > f32::EPSILON {
                (dx / dist, dy / dist)
            } else {
                (0.0, -1.0)
            };
            let power = 1.0 - dist / IMPACT_RADIUS;
            let magnitude = power * power * IMPACT_POWER;
            body.apply_impulse(Vector::new(nx * magnitude, ny * magnitude), true);
        }
    }

    fn start(&mut self) {
        for marble in self.marbles.values() {
            if let Some(body) = self.world.get_rigid_body_mut(marble.body) {
                body.set_enabled(true);
                body.wake_up(true);
            }
        }
        debug!("[physics] woke {} marbles", self.marbles.len());
    }

    fn step(&mut self, delta_seconds: f32) {
        self.world.step_by(delta_seconds);
        self.update_entity_life();
    }
}
