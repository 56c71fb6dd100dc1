//! Detections and the objects built from them.
//!
//! The category table is not global state: callers construct a
//! [`CategoryMapping`] once and pass it to whatever parses detection rows.

use crate::error::{IndexError, Result};
use crate::store::token_column;
use crate::token::Token;
use crate::trajectory::{PredictedTrajectory, Waypoint};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::HashMap;

/// Column list for [`DetectionRow::from_row`], selected from [`DETECTION_JOINS`]
pub(crate) const DETECTION_COLUMNS: &str = "lb.token AS token, \
    lb.track_token AS track_token, \
    c.name AS category, \
    f.timestamp AS timestamp, \
    lb.x AS x, lb.y AS y, lb.z AS z, lb.yaw AS yaw, \
    lb.width AS width, lb.length AS length, lb.height AS height, \
    lb.vx AS vx, lb.vy AS vy";

/// Lidar boxes with their track category and sweep, aliased `lb`, `t`, `c`
/// and `f`
pub(crate) const DETECTION_JOINS: &str = r#"
    FROM lidar_box AS lb
    INNER JOIN track AS t
        ON t.token = lb.track_token
    INNER JOIN category AS c
        ON c.token = t.category_token
    INNER JOIN lidar_pc AS f
        ON f.token = lb.lidar_pc_token
"#;

/// What kind of object a track is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Vehicle,
    Pedestrian,
    Bicycle,
    TrafficCone,
    Barrier,
    CzoneSign,
    GenericObject,
}

impl ObjectType {
    /// Agents move on their own and carry velocity and predictions
    pub fn is_agent(&self) -> bool {
        matches!(
            self,
            ObjectType::Vehicle | ObjectType::Pedestrian | ObjectType::Bicycle
        )
    }
}

/// Immutable category name to object type table
#[derive(Debug, Clone)]
pub struct CategoryMapping {
    types: HashMap<String, ObjectType>,
}

impl CategoryMapping {
    pub fn new(types: HashMap<String, ObjectType>) -> Self {
        Self { types }
    }

    /// Category names as they appear in recorded logs
    pub fn standard() -> Self {
        let types = [
            ("vehicle", ObjectType::Vehicle),
            ("pedestrian", ObjectType::Pedestrian),
            ("bicycle", ObjectType::Bicycle),
            ("traffic_cone", ObjectType::TrafficCone),
            ("barrier", ObjectType::Barrier),
            ("czone_sign", ObjectType::CzoneSign),
            ("generic_object", ObjectType::GenericObject),
        ]
        .into_iter()
        .map(|(name, kind)| (name.to_string(), kind))
        .collect();

        Self { types }
    }

    pub fn object_type(&self, category: &str) -> Option<ObjectType> {
        self.types.get(category).copied()
    }

    /// Turn a raw detection into a tracked object without predictions
    pub fn parse(&self, row: DetectionRow) -> Result<TrackedObject> {
        let object_type = self.object_type(&row.category).ok_or_else(|| {
            IndexError::malformed("category", format!("unmapped category {:?}", row.category))
        })?;

        let velocity = object_type.is_agent().then_some(Velocity2D {
            x: row.vx,
            y: row.vy,
        });

        Ok(TrackedObject {
            object_type,
            oriented_box: row.oriented_box(),
            velocity,
            metadata: ObjectMetadata {
                token: row.token,
                track_token: row.track_token,
                timestamp: row.timestamp,
                category_name: row.category,
            },
            predictions: Vec::new(),
        })
    }
}

impl Default for CategoryMapping {
    fn default() -> Self {
        Self::standard()
    }
}

/// Planar pose: position plus heading in radians
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateSE2 {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Velocity2D {
    pub x: f64,
    pub y: f64,
}

/// Box around an object, centred on `center`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientedBox {
    pub center: StateSE2,
    pub z: f64,
    pub width: f64,
    pub length: f64,
    pub height: f64,
}

/// One detection joined with its track category and frame time
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRow {
    pub token: Token,
    pub track_token: Token,
    pub category: String,
    pub timestamp: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub width: f64,
    pub length: f64,
    pub height: f64,
    pub vx: f64,
    pub vy: f64,
}

impl DetectionRow {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            token: token_column(row, "lidar_box", "token")?,
            track_token: token_column(row, "lidar_box", "track_token")?,
            category: row.try_get("category")?,
            timestamp: row.try_get("timestamp")?,
            x: row.try_get("x")?,
            y: row.try_get("y")?,
            z: row.try_get("z")?,
            yaw: row.try_get("yaw")?,
            width: row.try_get("width")?,
            length: row.try_get("length")?,
            height: row.try_get("height")?,
            vx: row.try_get("vx")?,
            vy: row.try_get("vy")?,
        })
    }

    pub fn oriented_box(&self) -> OrientedBox {
        OrientedBox {
            center: StateSE2 {
                x: self.x,
                y: self.y,
                heading: self.yaw,
            },
            z: self.z,
            width: self.width,
            length: self.length,
            height: self.height,
        }
    }

    pub fn waypoint(&self) -> Waypoint {
        Waypoint {
            timestamp: self.timestamp,
            oriented_box: self.oriented_box(),
            velocity: Some(Velocity2D {
                x: self.vx,
                y: self.vy,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub token: Token,
    pub track_token: Token,
    pub timestamp: i64,
    pub category_name: String,
}

/// An object observed at one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub object_type: ObjectType,
    pub oriented_box: OrientedBox,
    /// Only set for agents
    pub velocity: Option<Velocity2D>,
    pub metadata: ObjectMetadata,
    /// Future motion hypotheses, agents only, filled on request
    pub predictions: Vec<PredictedTrajectory>,
}

impl TrackedObject {
    pub fn is_agent(&self) -> bool {
        self.object_type.is_agent()
    }

    pub fn track_token(&self) -> Token {
        self.metadata.track_token
    }
}
