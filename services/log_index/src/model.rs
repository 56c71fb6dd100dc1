//! Minimal row structs read from a log file.

use crate::error::{IndexError, Result};
use crate::store::{optional_token_column, token_column};
use crate::token::Token;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Column list for [`Frame::from_row`], over `lidar_pc` (or the ranked
/// `ordered` view of it) aliased as `f`
pub(crate) const FRAME_COLUMNS: &str = "f.token AS token, \
    f.timestamp AS timestamp, \
    f.scene_token AS scene_token, \
    f.ego_pose_token AS pose_token, \
    f.lidar_token AS sensor_token, \
    f.filename AS filename";

/// Column list for [`Pose::from_row`], over `ego_pose` aliased as `p`.
/// The timestamp column must be supplied separately.
pub(crate) const POSE_COLUMNS: &str = "p.token AS pose_row_token, \
    p.x AS x, p.y AS y, p.z AS z, \
    p.qw AS qw, p.qx AS qx, p.qy AS qy, p.qz AS qz, \
    p.vx AS vx, p.vy AS vy, \
    p.acceleration_x AS acceleration_x, p.acceleration_y AS acceleration_y";

/// One lidar sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub token: Token,
    /// Microseconds
    pub timestamp: i64,
    pub scene_token: Token,
    /// Ego pose recorded with the sweep
    pub pose_token: Option<Token>,
    /// Lidar that produced the sweep
    pub sensor_token: Token,
    pub filename: Option<String>,
}

impl Frame {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            token: token_column(row, "lidar_pc", "token")?,
            timestamp: row.try_get("timestamp")?,
            scene_token: token_column(row, "lidar_pc", "scene_token")?,
            pose_token: optional_token_column(row, "lidar_pc", "pose_token")?,
            sensor_token: token_column(row, "lidar_pc", "sensor_token")?,
            filename: row.try_get("filename")?,
        })
    }

    /// Wall-clock time of the sweep
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.timestamp)
    }
}

/// Ego pose at a frame.
///
/// `timestamp` is the frame's timestamp, not the pose row's own one: the two
/// differ slightly in recorded logs and consumers key on the frame time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub token: Token,
    pub timestamp: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub qw: f64,
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,
    pub vx: f64,
    pub vy: f64,
    pub acceleration_x: f64,
    pub acceleration_y: f64,
}

impl Pose {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            token: token_column(row, "ego_pose", "pose_row_token")?,
            timestamp: row.try_get("timestamp")?,
            x: row.try_get("x")?,
            y: row.try_get("y")?,
            z: row.try_get("z")?,
            qw: row.try_get("qw")?,
            qx: row.try_get("qx")?,
            qy: row.try_get("qy")?,
            qz: row.try_get("qz")?,
            vx: row.try_get("vx")?,
            vy: row.try_get("vy")?,
            acceleration_x: row.try_get("acceleration_x")?,
            acceleration_y: row.try_get("acceleration_y")?,
        })
    }

    /// Heading around the vertical axis, in radians
    pub fn yaw(&self) -> f64 {
        yaw_from_quaternion(self.qw, self.qx, self.qy, self.qz)
    }
}

fn pickled_floats<const N: usize>(row: &SqliteRow, column: &str) -> Result<[f64; N]> {
    let bytes: Vec<u8> = row.try_get(column)?;
    let values: Vec<f64> = serde_pickle::from_slice(&bytes, serde_pickle::DeOptions::new())
        .map_err(|e| IndexError::malformed("lidar", format!("{column}: {e}")))?;
    let len = values.len();
    <[f64; N]>::try_from(values).map_err(|_| {
        IndexError::malformed("lidar", format!("{column}: expected {N} values, got {len}"))
    })
}

pub(crate) fn yaw_from_quaternion(w: f64, x: f64, y: f64, z: f64) -> f64 {
    (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z))
}

/// A scene with its rank in name order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub token: Token,
    pub name: String,
    /// 0-based position among all scenes ordered by name
    pub rank: u64,
    pub goal_pose_token: Option<Token>,
}

impl Scene {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let rank: i64 = row.try_get("scene_rank")?;
        Ok(Self {
            token: token_column(row, "scene", "token")?,
            name: row.try_get("name")?,
            rank: u64::try_from(rank)
                .map_err(|_| IndexError::malformed("scene", format!("negative rank {rank}")))?,
            goal_pose_token: optional_token_column(row, "scene", "goal_ego_pose_token")?,
        })
    }
}

/// Mounting of a lidar relative to the ego frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorExtrinsic {
    pub token: Token,
    pub channel: String,
    pub translation: [f64; 3],
    /// Quaternion as (w, x, y, z)
    pub rotation: [f64; 4],
}

impl SensorExtrinsic {
    /// `translation` and `rotation` are pickled float sequences in the store
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            token: token_column(row, "lidar", "token")?,
            channel: row.try_get("channel")?,
            translation: pickled_floats(row, "translation")?,
            rotation: pickled_floats(row, "rotation")?,
        })
    }

    /// Homogeneous 4x4 sensor-to-ego transform, row major
    pub fn transform_matrix(&self) -> [[f64; 4]; 4] {
        let [w, x, y, z] = self.rotation;
        let norm = (w * w + x * x + y * y + z * z).sqrt();
        let (w, x, y, z) = if norm > 0.0 {
            (w / norm, x / norm, y / norm, z / norm)
        } else {
            (1.0, 0.0, 0.0, 0.0)
        };
        let [tx, ty, tz] = self.translation;

        [
            [
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y - z * w),
                2.0 * (x * z + y * w),
                tx,
            ],
            [
                2.0 * (x * y + z * w),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z - x * w),
                ty,
            ],
            [
                2.0 * (x * z - y * w),
                2.0 * (y * z + x * w),
                1.0 - 2.0 * (x * x + y * y),
                tz,
            ],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}

/// Traffic light state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLightStatus {
    Green,
    Yellow,
    Red,
    Unknown,
}

impl TrafficLightStatus {
    /// Anything but the three light colours reads as `Unknown`
    pub fn from_db(value: &str) -> Self {
        match value {
            "green" => TrafficLightStatus::Green,
            "yellow" => TrafficLightStatus::Yellow,
            "red" => TrafficLightStatus::Red,
            _ => TrafficLightStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficLightStatus::Green => "green",
            TrafficLightStatus::Yellow => "yellow",
            TrafficLightStatus::Red => "red",
            TrafficLightStatus::Unknown => "unknown",
        }
    }
}

/// Traffic light state of one lane connector at one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficLightStatusData {
    pub status: TrafficLightStatus,
    pub lane_connector_id: i64,
    pub timestamp: i64,
}

impl TrafficLightStatusData {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let status: Option<String> = row.try_get("status")?;
        Ok(Self {
            status: status
                .as_deref()
                .map_or(TrafficLightStatus::Unknown, TrafficLightStatus::from_db),
            lane_connector_id: row.try_get("lane_connector_id")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}
