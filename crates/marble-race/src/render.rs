//! Read-only per-frame bundle for renderers.
//!
//! The core never draws and never depends on a renderer existing; hosts call
//! [`RaceController::render_frame`](crate::race::RaceController::render_frame)
//! after `on_frame` and paint whatever they like from it.

use serde::{Deserialize, Serialize};

use crate::backend::EntityState;
use crate::camera::CameraState;
use crate::effects::{Particle, SkillEffect};
use crate::marble::{Color, Marble};
use crate::stage::Stage;

/// Colors a renderer should use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub background: Color,
    pub entity: Color,
    pub breakable_entity: Color,
    pub goal_line: Color,
    pub marble_name: Color,
    pub winner_border: Color,
    pub skill_effect: Color,
    pub ranking_text: Color,
    pub winner_text: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            background: Color::BLACK,
            entity: Color::rgb(255, 255, 255),
            breakable_entity: Color::rgb(255, 170, 80),
            goal_line: Color::rgb(255, 80, 80),
            marble_name: Color::WHITE,
            winner_border: Color::rgb(255, 215, 0),
            skill_effect: Color::rgb(255, 255, 255),
            ranking_text: Color::rgb(220, 220, 220),
            winner_text: Color::WHITE,
        }
    }

    pub fn light() -> Self {
        Self {
            background: Color::rgb(250, 250, 250),
            entity: Color::rgb(40, 40, 40),
            breakable_entity: Color::rgb(200, 110, 20),
            goal_line: Color::rgb(210, 40, 40),
            marble_name: Color::BLACK,
            winner_border: Color::rgb(200, 150, 0),
            skill_effect: Color::rgb(60, 60, 60),
            ranking_text: Color::rgb(50, 50, 50),
            winner_text: Color::BLACK,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

/// Snapshot of everything drawable for one frame.
#[derive(Debug, Clone)]
pub struct RenderFrame<'a> {
    pub stage: Option<&'a Stage>,
    /// In-play marbles sorted by descending y.
    pub marbles: &'a [Marble],
    /// Finished marbles in finish order.
    pub winners: &'a [Marble],
    pub entities: Vec<EntityState>,
    pub camera: &'a CameraState,
    pub winner_rank: Option<usize>,
    pub winner: Option<&'a Marble>,
    pub theme: &'a Theme,
    pub particles: &'a [Particle],
    pub effects: &'a [SkillEffect],
    pub time_scale: f32,
}

impl RenderFrame<'_> {
    /// Whether `marble` is the one the race is waiting on.
    pub fn is_target(&self, marble: &Marble) -> bool {
        let Some(rank) = self.winner_rank else {
            return false;
        };
        rank.checked_sub(self.winners.len())
            .and_then(|index| self.marbles.get(index))
            .is_some_and(|target| target.id == marble.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::marble_at;

    #[test]
    fn test_presets_differ() {
        assert_ne!(Theme::dark(), Theme::light());
        assert_eq!(Theme::default(), Theme::dark());
    }

    #[test]
    fn test_theme_json_uses_camel_case() {
        let json = serde_json::to_string(&Theme::light()).unwrap();
        assert!(json.contains("\"breakableEntity\""));
        let back: Theme = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Theme::light());
    }

    #[test]
    fn test_target_marker() {
        let marbles = vec![marble_at(0, 10.0), marble_at(1, 5.0)];
        let winners = vec![marble_at(2, 50.0)];
        let camera = CameraState::default();
        let theme = Theme::dark();
        let frame = RenderFrame {
            stage: None,
            marbles: &marbles,
            winners: &winners,
            entities: Vec::new(),
            camera: &camera,
            winner_rank: Some(2),
            winner: None,
            theme: &theme,
            particles: &[],
            effects: &[],
            time_scale: 1.0,
        };
        assert!(frame.is_target(&marbles[1]));
        assert!(!frame.is_target(&marbles[0]));
    }
}
