//! Marble entity: one race participant backed by a physics body.

use serde::{Deserialize, Serialize};

use crate::assign::Assignment;
use crate::backend::{MarblePose, MarbleSpawn};
use crate::rng::RaceRng;
use crate::stage::Stage;

/// Unique identifier for a marble. Equal to its starting order.
pub type MarbleId = u32;

/// Marbles per starting row.
const ROW_SIZE: usize = 10;

/// Horizontal gap between starting slots, in world units.
const SLOT_SPACING: f32 = 0.6;

/// Maximum number of rows stacked above the start line.
const MAX_VISIBLE_ROWS: usize = 5;

/// Squared distance under which a marble is considered not moving.
const STUCK_DISTANCE_SQ: f32 = 0.000_01;

/// How long the impact highlight stays on a marble, in seconds.
const IMPACT_HIGHLIGHT: f32 = 0.5;

/// RGBA color representation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    /// Converts HSL (hue in degrees, saturation and lightness in `[0, 1]`).
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let hue = hue.rem_euclid(360.0);
        let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let x = chroma * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
        let m = lightness - chroma / 2.0;
        let (r, g, b) = match hue {
            h if h < 60.0 => (chroma, x, 0.0),
            h if h < 120.0 => (x, chroma, 0.0),
            h if h < 180.0 => (0.0, chroma, x),
            h if h < 240.0 => (0.0, x, chroma),
            h if h < 300.0 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let to_u8 = |v: f32| ((v + m).clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::rgb(to_u8(r), to_u8(g), to_u8(b))
    }
}

/// Skill a marble fires during the current step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Skill {
    #[default]
    None,
    /// Pushes nearby marbles away.
    Impact,
}

/// Side effects a marble asks the controller to perform after an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarbleUpdate {
    /// The marble has not moved for too long and should be shaken loose.
    pub shake: bool,
}

/// Race-visible marble state. The physics body lives in the backend under `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marble {
    pub id: MarbleId,
    pub name: String,
    pub order: usize,
    /// Normalized weight in `[0.1, 1.1]`.
    pub weight: f32,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub hue: f32,
    pub is_active: bool,
    pub skill: Skill,
    pub is_destroyed: bool,
    /// Remaining impact highlight time in seconds.
    pub impact: f32,
    cool_time: f32,
    max_cool_time: f32,
    skill_rate: f32,
    stuck_time: f32,
    last_position: [f32; 2],
}

impl Marble {
    /// Creates a marble for an assigned slot, placed on the stage's start grid.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(assignment: &Assignment, total: usize, stage: &Stage, rng: &mut RaceRng) -> Self {
        let (x, y) = Self::spawn_position(assignment.order, total, stage);
        let max_cool_time = 1.0 + (1.0 - assignment.weight) * 4.0;
        let hue = if total == 0 {
            0.0
        } else {
            360.0 / total as f32 * assignment.order as f32
        };

        #[allow(clippy::cast_possible_truncation)]
        let id = assignment.order as MarbleId;

        Self {
            id,
            name: assignment.name.clone(),
            order: assignment.order,
            weight: assignment.weight,
            x,
            y,
            angle: 0.0,
            hue,
            is_active: false,
            skill: Skill::None,
            is_destroyed: false,
            impact: 0.0,
            cool_time: max_cool_time * rng.next_f32(),
            max_cool_time,
            skill_rate: 0.2 * assignment.weight,
            stuck_time: 0.0,
            last_position: [x, y],
        }
    }

    /// Starting grid position for slot `order` out of `total`.
    ///
    /// Ten slots per row centred on the stage; at most five rows are stacked
    /// above the start line, extra rows continue upward past it.
    #[allow(clippy::cast_precision_loss)]
    pub fn spawn_position(order: usize, total: usize, stage: &Stage) -> (f32, f32) {
        let max_line = total.div_ceil(ROW_SIZE);
        let line = order / ROW_SIZE;
        let line_delta = max_line.saturating_sub(MAX_VISIBLE_ROWS);

        let x = stage.width / 2.0 - 2.75 + (order % ROW_SIZE) as f32 * SLOT_SPACING;
        let y = stage.start_y + max_line as f32 - line as f32 - line_delta as f32;
        (x, y)
    }

    /// Request handed to the backend to create this marble's body.
    pub fn spawn_request(&self, radius: f32) -> MarbleSpawn {
        MarbleSpawn {
            id: self.id,
            x: self.x,
            y: self.y,
            radius,
            weight: self.weight,
            name: self.name.clone(),
            color: self.color(),
        }
    }

    pub fn position(&self) -> [f32; 2] {
        [self.x, self.y]
    }

    pub fn pose(&self) -> MarblePose {
        MarblePose {
            x: self.x,
            y: self.y,
            angle: self.angle,
        }
    }

    /// Copies a pose read from the backend or a spectator snapshot.
    pub fn sync_pose(&mut self, pose: MarblePose) {
        self.x = pose.x;
        self.y = pose.y;
        self.angle = pose.angle;
    }

    pub fn color(&self) -> Color {
        Color::from_hsl(self.hue, 1.0, 0.7)
    }

    /// Seconds left before the next skill roll.
    pub fn cool_time(&self) -> f32 {
        self.cool_time
    }

    /// Advances stuck detection and skill cooldown by `dt` seconds.
    pub fn update(
        &mut self,
        dt: f32,
        use_skills: bool,
        stuck_delay: f32,
        rng: &mut RaceRng,
    ) -> MarbleUpdate {
        let mut result = MarbleUpdate::default();

        let dx = self.last_position[0] - self.x;
        let dy = self.last_position[1] - self.y;
        if self.is_active && dx * dx + dy * dy < STUCK_DISTANCE_SQ {
            self.stuck_time += dt;
            if self.stuck_time > stuck_delay {
                result.shake = true;
                self.stuck_time = 0.0;
            }
        } else {
            self.stuck_time = 0.0;
        }
        self.last_position = [self.x, self.y];

        self.skill = Skill::None;
        if self.impact > 0.0 {
            self.impact = (self.impact - dt).max(0.0);
        }

        if self.is_active && use_skills {
            self.update_skill(dt, rng);
        }
        result
    }

    fn update_skill(&mut self, dt: f32, rng: &mut RaceRng) {
        if self.cool_time > 0.0 {
            self.cool_time -= dt;
        }
        if self.cool_time <= 0.0 {
            self.skill = if rng.next_f32() < self.skill_rate {
                Skill::Impact
            } else {
                Skill::None
            };
            self.cool_time = self.max_cool_time;
        }
    }

    /// Starts the impact highlight after the skill fired.
    pub fn mark_impact(&mut self) {
        self.impact = IMPACT_HIGHLIGHT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_stage;

    fn assignment(order: usize, weight: f32) -> Assignment {
        Assignment {
            name: format!("M{order}"),
            weight,
            order,
        }
    }

    #[test]
    fn test_spawn_grid() {
        let stage = test_stage();
        let (x0, y0) = Marble::spawn_position(0, 3, &stage);
        let (x1, y1) = Marble::spawn_position(1, 3, &stage);
        assert!((x0 - (stage.width / 2.0 - 2.75)).abs() < 1e-6);
        assert!((x1 - x0 - SLOT_SPACING).abs() < 1e-6);
        assert_eq!(y0, y1);
        assert_eq!(y0, stage.start_y + 1.0);
    }

    #[test]
    fn test_spawn_rows_stay_above_start_line() {
        let stage = test_stage();
        // 80 marbles -> 8 rows, only 5 fit above the line.
        let (_, first_row) = Marble::spawn_position(0, 80, &stage);
        let (_, last_row) = Marble::spawn_position(79, 80, &stage);
        assert_eq!(first_row, stage.start_y + 5.0);
        assert_eq!(last_row, stage.start_y - 2.0);
    }

    #[test]
    fn test_hue_spreads_over_wheel() {
        let stage = test_stage();
        let mut rng = RaceRng::from_seed(1);
        let a = Marble::new(&assignment(0, 1.0), 4, &stage, &mut rng);
        let b = Marble::new(&assignment(2, 1.0), 4, &stage, &mut rng);
        assert_eq!(a.hue, 0.0);
        assert_eq!(b.hue, 180.0);
        assert_eq!(b.id, 2);
    }

    #[test]
    fn test_stuck_marble_requests_shake() {
        let stage = test_stage();
        let mut rng = RaceRng::from_seed(1);
        let mut marble = Marble::new(&assignment(0, 1.0), 1, &stage, &mut rng);
        marble.is_active = true;

        let mut shaken = false;
        for _ in 0..600 {
            shaken |= marble.update(0.01, false, 5.0, &mut rng).shake;
        }
        assert!(shaken);
    }

    #[test]
    fn test_moving_marble_is_not_shaken() {
        let stage = test_stage();
        let mut rng = RaceRng::from_seed(1);
        let mut marble = Marble::new(&assignment(0, 1.0), 1, &stage, &mut rng);
        marble.is_active = true;

        for _ in 0..600 {
            marble.y += 0.1;
            assert!(!marble.update(0.01, false, 5.0, &mut rng).shake);
        }
    }

    #[test]
    fn test_inactive_marble_never_uses_skill() {
        let stage = test_stage();
        let mut rng = RaceRng::from_seed(3);
        let mut marble = Marble::new(&assignment(0, 1.1), 1, &stage, &mut rng);
        for _ in 0..2000 {
            marble.update(0.01, true, 5.0, &mut rng);
            assert_eq!(marble.skill, Skill::None);
        }
    }

    #[test]
    fn test_heavy_marble_eventually_uses_impact() {
        let stage = test_stage();
        let mut rng = RaceRng::from_seed(3);
        let mut marble = Marble::new(&assignment(0, 1.1), 1, &stage, &mut rng);
        marble.is_active = true;

        let mut fired = false;
        for _ in 0..20_000 {
            marble.y += 0.01;
            marble.update(0.01, true, 5.0, &mut rng);
            fired |= marble.skill == Skill::Impact;
        }
        assert!(fired);
    }

    #[test]
    fn test_hsl_primary_colors() {
        assert_eq!(Color::from_hsl(0.0, 1.0, 0.5), Color::rgb(255, 0, 0));
        assert_eq!(Color::from_hsl(120.0, 1.0, 0.5), Color::rgb(0, 255, 0));
        assert_eq!(Color::from_hsl(240.0, 1.0, 0.5), Color::rgb(0, 0, 255));
        assert_eq!(Color::from_hsl(0.0, 0.0, 1.0), Color::WHITE);
    }
}
