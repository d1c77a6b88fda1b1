//! Short-lived visual effects updated alongside the simulation.
//!
//! None of this feeds back into physics; it is advanced once per fixed step so
//! it stays in lockstep with the race and keeps updating in spectator mode.

use serde::{Deserialize, Serialize};

use crate::rng::RaceRng;

/// How long a skill ring stays on screen, in seconds.
const SKILL_EFFECT_DURATION: f32 = 0.5;

/// Particles emitted per celebration burst.
const BURST_SIZE: usize = 200;

/// Downward acceleration applied to particles, in world units per second squared.
const PARTICLE_GRAVITY: f32 = 10.0;

/// Ring drawn where a marble fired its impact skill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillEffect {
    pub x: f32,
    pub y: f32,
    pub elapsed: f32,
}

impl SkillEffect {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, elapsed: 0.0 }
    }

    pub fn update(&mut self, dt: f32) {
        self.elapsed += dt;
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed >= SKILL_EFFECT_DURATION
    }

    /// Animation progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        (self.elapsed / SKILL_EFFECT_DURATION).min(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub hue: f32,
    pub elapsed: f32,
    pub lifetime: f32,
}

impl Particle {
    pub fn is_expired(&self) -> bool {
        self.elapsed >= self.lifetime
    }

    /// Remaining opacity in `[0, 1]`.
    pub fn alpha(&self) -> f32 {
        (1.0 - self.elapsed / self.lifetime).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParticleManager {
    particles: Vec<Particle>,
}

impl ParticleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits a celebratory burst rising from the bottom edge of a
    /// `width` x `height` area.
    pub fn shot(&mut self, width: f32, height: f32, rng: &mut RaceRng) {
        self.particles.reserve(BURST_SIZE);
        for _ in 0..BURST_SIZE {
            self.particles.push(Particle {
                x: rng.range_f32(0.0, width),
                y: height,
                vx: rng.range_f32(-3.0, 3.0),
                vy: -rng.range_f32(height * 0.5, height * 1.2),
                hue: rng.range_f32(0.0, 360.0),
                elapsed: 0.0,
                lifetime: rng.range_f32(1.0, 3.0),
            });
        }
    }

    pub fn update(&mut self, dt: f32) {
        for particle in &mut self.particles {
            particle.vy += PARTICLE_GRAVITY * dt;
            particle.x += particle.vx * dt;
            particle.y += particle.vy * dt;
            particle.elapsed += dt;
        }
        self.particles.retain(|p| !p.is_expired());
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}

/// Host overlay advanced once per fixed step, after particles and effects.
pub trait UiObject {
    fn update(&mut self, dt: f32);
}
