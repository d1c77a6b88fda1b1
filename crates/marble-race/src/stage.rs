//! Stage (map) definitions.
//!
//! A stage is a static layout of obstacles plus the lines the race cares about:
//! `startY` where marbles are dropped, `zoomY` where finish-line pacing is
//! measured and `goalY` past which a marble counts as finished. Stages are
//! immutable once loaded into a controller.

use serde::{Deserialize, Serialize};

use crate::error::RaceError;

/// Obstacle shape. Dimensions are in world units; `box` uses half extents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityShape {
    Box {
        width: f32,
        height: f32,
        #[serde(default)]
        rotation: f32,
    },
    Circle {
        radius: f32,
    },
    Polyline {
        #[serde(default)]
        rotation: f32,
        points: Vec<[f32; 2]>,
    },
}

/// Whether an obstacle is fixed in place or driven by its angular velocity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    #[default]
    Static,
    Kinematic,
}

/// Physical properties of an obstacle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityProps {
    #[serde(default = "default_density")]
    pub density: f32,
    #[serde(default)]
    pub restitution: f32,
    #[serde(default)]
    pub angular_velocity: f32,
    /// Number of marble hits the obstacle survives. `None` means unbreakable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life: Option<u32>,
}

fn default_density() -> f32 {
    1.0
}

impl Default for EntityProps {
    fn default() -> Self {
        Self {
            density: default_density(),
            restitution: 0.0,
            angular_velocity: 0.0,
            life: None,
        }
    }
}

/// Position in world units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// One obstacle in a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageEntity {
    pub position: Position,
    #[serde(rename = "type", default)]
    pub kind: EntityType,
    pub shape: EntityShape,
    #[serde(default)]
    pub props: EntityProps,
}

/// Complete stage definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub title: String,
    pub entities: Vec<StageEntity>,
    pub goal_y: f32,
    /// Line used for finish pacing; falls back to `goal_y`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom_y: Option<f32>,
    #[serde(default)]
    pub start_y: f32,
    pub width: f32,
    pub height: f32,
}

impl Stage {
    /// Loads a stage from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, RaceError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a list of stages from a JSON array.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>, RaceError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, RaceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The pacing line, `zoomY` if present and `goalY` otherwise.
    pub fn zoom_line(&self) -> f32 {
        self.zoom_y.unwrap_or(self.goal_y)
    }
}

const BUILTIN_STAGE_JSON: [&str; 3] = [
    include_str!("../maps/wheel_of_fortune.json"),
    include_str!("../maps/bubble_pop.json"),
    include_str!("../maps/pot_of_greed.json"),
];

/// Stages embedded in the crate, in menu order.
pub fn builtin_stages() -> Result<Vec<Stage>, RaceError> {
    BUILTIN_STAGE_JSON
        .iter()
        .map(|json| Stage::from_json(json))
        .collect()
}
