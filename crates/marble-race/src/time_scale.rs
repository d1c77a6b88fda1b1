//! Finish-line pacing.
//!
//! When the marble whose finish decides the race nears the pacing line and a
//! rival is still close, the simulation slows down in proportion to the
//! remaining distance.

use crate::config::RaceConfig;
use crate::marble::Marble;

/// Computes `goal_dist` and the time scale applied to each physics step.
#[derive(Debug, Clone)]
pub struct TimeScaleController {
    threshold: f32,
    suspense_factor: f32,
    min_scale: f32,
    goal_dist: f32,
    time_scale: f32,
}

impl TimeScaleController {
    pub fn new(config: &RaceConfig) -> Self {
        Self {
            threshold: config.zoom_threshold,
            suspense_factor: config.suspense_factor,
            min_scale: config.min_time_scale,
            goal_dist: f32::INFINITY,
            time_scale: 1.0,
        }
    }

    pub fn reset(&mut self) {
        self.goal_dist = f32::INFINITY;
        self.time_scale = 1.0;
    }

    /// Distance between the target marble and the pacing line.
    pub fn goal_dist(&self) -> f32 {
        self.goal_dist
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Whether the target marble is close enough for the camera to zoom in.
    pub fn need_to_zoom(&self) -> bool {
        self.goal_dist < self.threshold
    }

    /// Recomputes pacing from `marbles` (in play, sorted by descending y).
    ///
    /// The target is the marble at `winner_rank - finished`: the next one whose
    /// crossing changes the outcome.
    pub fn update(
        &mut self,
        marbles: &[Marble],
        finished: usize,
        winner_rank: Option<usize>,
        zoom_y: f32,
    ) -> f32 {
        self.time_scale = 1.0;

        let target = winner_rank
            .and_then(|rank| rank.checked_sub(finished))
            .and_then(|index| marbles.get(index).map(|target| (index, target)));
        let Some((index, target)) = target else {
            self.goal_dist = f32::INFINITY;
            return self.time_scale;
        };

        self.goal_dist = (zoom_y - target.y).abs();

        let has_rival =
            (index > 0 && marbles.get(index - 1).is_some()) || marbles.get(index + 1).is_some();
        let in_suspense = target.y > zoom_y - self.threshold * self.suspense_factor;

        if self.goal_dist < self.threshold && in_suspense && has_rival {
            self.time_scale = (self.goal_dist / self.threshold).max(self.min_scale);
        }
        self.time_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::marble_at;

    fn controller() -> TimeScaleController {
        TimeScaleController::new(&RaceConfig::default())
    }

    #[test]
    fn test_far_from_line_runs_at_full_speed() {
        let mut ts = controller();
        let marbles = vec![marble_at(0, 10.0), marble_at(1, 9.0)];
        assert_eq!(ts.update(&marbles, 0, Some(0), 100.0), 1.0);
        assert_eq!(ts.goal_dist(), 90.0);
        assert!(!ts.need_to_zoom());
    }

    #[test]
    fn test_slows_near_line_with_rival() {
        let mut ts = controller();
        let marbles = vec![marble_at(0, 97.5), marble_at(1, 96.0)];
        let scale = ts.update(&marbles, 0, Some(0), 100.0);
        assert!((scale - 0.5).abs() < 1e-6);
        assert!(ts.need_to_zoom());
    }

    #[test]
    fn test_scale_is_floored() {
        let mut ts = controller();
        let marbles = vec![marble_at(0, 99.9), marble_at(1, 99.0)];
        assert!((ts.update(&marbles, 0, Some(0), 100.0) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_isolated_target_is_not_slowed() {
        let mut ts = controller();
        let marbles = vec![marble_at(0, 98.0)];
        assert_eq!(ts.update(&marbles, 0, Some(0), 100.0), 1.0);
        assert!((ts.goal_dist() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_target_shifts_with_finished_count() {
        let mut ts = controller();
        // Rank 2 with one finished: target is sorted index 1.
        let marbles = vec![marble_at(0, 60.0), marble_at(1, 98.0), marble_at(2, 50.0)];
        let scale = ts.update(&marbles, 1, Some(2), 100.0);
        assert!((ts.goal_dist() - 2.0).abs() < 1e-6);
        assert!(scale < 1.0);
    }

    #[test]
    fn test_no_rank_or_resolved_is_neutral() {
        let mut ts = controller();
        let marbles = vec![marble_at(0, 99.0), marble_at(1, 99.0)];
        assert_eq!(ts.update(&marbles, 0, None, 100.0), 1.0);
        assert_eq!(ts.goal_dist(), f32::INFINITY);
        assert_eq!(ts.update(&marbles, 2, Some(1), 100.0), 1.0);
        assert_eq!(ts.goal_dist(), f32::INFINITY);

        ts.update(&marbles, 0, Some(0), 100.0);
        ts.reset();
        assert_eq!(ts.goal_dist(), f32::INFINITY);
        assert_eq!(ts.time_scale(), 1.0);
    }

    #[test]
    fn test_goal_dist_cleared_once_target_finishes() {
        let mut ts = controller();
        let marbles = vec![marble_at(0, 98.0), marble_at(1, 97.0)];
        ts.update(&marbles, 0, Some(0), 100.0);
        assert!(ts.need_to_zoom());

        // Target crossed and left play; one rival remains.
        ts.update(&marbles[1..], 1, Some(0), 100.0);
        assert_eq!(ts.goal_dist(), f32::INFINITY);
        assert!(!ts.need_to_zoom());
    }
}
