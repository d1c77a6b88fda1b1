//! Spectator snapshots.
//!
//! The authoritative viewer runs physics and periodically ships a
//! [`RaceSnapshot`]; spectators apply it instead of stepping locally. Encoding
//! uses postcard so the payload fits any byte transport.

use serde::{Deserialize, Serialize};

use crate::backend::MarblePose;
use crate::error::RaceError;
use crate::marble::{Marble, MarbleId};

/// Absolute transform of one marble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarbleSnapshot {
    pub id: MarbleId,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

impl MarbleSnapshot {
    pub fn pose(&self) -> MarblePose {
        MarblePose {
            x: self.x,
            y: self.y,
            angle: self.angle,
        }
    }
}

impl From<&Marble> for MarbleSnapshot {
    fn from(marble: &Marble) -> Self {
        Self {
            id: marble.id,
            x: marble.x,
            y: marble.y,
            angle: marble.angle,
        }
    }
}

/// Everything a spectator needs to mirror the race.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub marbles: Vec<MarbleSnapshot>,
    /// Resolved winner, once the authoritative side has one.
    pub winner: Option<String>,
}

impl RaceSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, RaceError> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RaceError> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_roundtrip() {
        let snapshot = RaceSnapshot {
            marbles: vec![
                MarbleSnapshot {
                    id: 0,
                    x: 1.5,
                    y: 2.0,
                    angle: 0.3,
                },
                MarbleSnapshot {
                    id: 7,
                    x: -4.0,
                    y: 100.25,
                    angle: 0.0,
                },
            ],
            winner: Some("Bob".to_string()),
        };

        let bytes = snapshot.to_bytes().unwrap();
        assert_eq!(RaceSnapshot::from_bytes(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_truncated_bytes_fail() {
        let snapshot = RaceSnapshot {
            marbles: vec![MarbleSnapshot {
                id: 1,
                x: 1.0,
                y: 1.0,
                angle: 1.0,
            }],
            winner: None,
        };
        let bytes = snapshot.to_bytes().unwrap();
        let err = RaceSnapshot::from_bytes(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, RaceError::Snapshot(_)));
    }
}
