//! Range subsampling, relative windows around an anchor frame, and the
//! per-frame records hanging off a frame.

use crate::error::{IndexError, Result};
use crate::model::{
    Frame, Pose, SensorExtrinsic, TrafficLightStatusData, FRAME_COLUMNS, POSE_COLUMNS,
};
use crate::query::{LoweredQuery, SqlBuilder};
use crate::rank::ORDERED_FRAMES;
use crate::store::{optional_token_column, token_column, LogStore};
use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Which side of the anchor a relative window extends to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Past,
    Future,
}

impl Direction {
    /// Distance from the anchor in rank, positive on this side of it
    fn distance_expr(&self) -> &'static str {
        match self {
            Direction::Past => "(a.frame_rank - f.frame_rank)",
            Direction::Future => "(f.frame_rank - a.frame_rank)",
        }
    }
}

/// Frame selection by time window and by rank offset
#[derive(Clone, Debug)]
pub struct FrameSampler {
    store: LogStore,
}

impl FrameSampler {
    pub fn new(store: LogStore) -> Self {
        Self { store }
    }

    /// Every `stride`-th frame with `start_ts <= timestamp <= end_ts`, starting
    /// with the first one, ascending in time
    #[instrument(skip(self))]
    pub async fn sample_range(&self, start_ts: i64, end_ts: i64, stride: u64) -> Result<Vec<Token>> {
        if stride == 0 {
            return Err(IndexError::invalid_argument("stride must be at least 1"));
        }
        if start_ts > end_ts {
            return Err(IndexError::invalid_argument(format!(
                "range start {start_ts} is after end {end_ts}"
            )));
        }
        let stride = i64::try_from(stride).unwrap_or(i64::MAX);

        let query = LoweredQuery::new(
            "sample_range",
            r#"
            WITH windowed AS
            (
                SELECT  token,
                        ROW_NUMBER() OVER (ORDER BY timestamp ASC, rowid ASC) - 1 AS window_rank
                FROM lidar_pc
                WHERE timestamp >= ?
                    AND timestamp <= ?
            )
            SELECT  token
            FROM windowed
            WHERE window_rank % ? = 0
            ORDER BY window_rank ASC
            "#,
        )
        .bind(start_ts)
        .bind(end_ts)
        .bind(stride);

        self.store
            .fetch_all(&query, |row| token_column(row, "lidar_pc", "token"))
            .await
    }

    /// Frames at the given rank distances from the anchor, ascending in time.
    ///
    /// Offset 0 is the anchor itself. Repeated offsets yield one frame and
    /// offsets past either end of the log yield nothing.
    #[instrument(skip(self, offsets), fields(anchor = %anchor, offsets = offsets.len()))]
    pub async fn sample_relative(
        &self,
        anchor: &Token,
        offsets: &[u64],
        direction: Direction,
    ) -> Result<Vec<Frame>> {
        let Some(query) = relative_query("sample_relative", anchor, offsets, direction, false)
        else {
            return Ok(Vec::new());
        };
        self.store.fetch_all(&query, Frame::from_row).await
    }

    /// Same selection as [`FrameSampler::sample_relative`], each frame paired
    /// with its ego pose when the log has one
    #[instrument(skip(self, offsets), fields(anchor = %anchor, offsets = offsets.len()))]
    pub async fn sample_relative_with_poses(
        &self,
        anchor: &Token,
        offsets: &[u64],
        direction: Direction,
    ) -> Result<Vec<(Frame, Option<Pose>)>> {
        let Some(query) = relative_query(
            "sample_relative_with_poses",
            anchor,
            offsets,
            direction,
            true,
        ) else {
            return Ok(Vec::new());
        };

        self.store
            .fetch_all(&query, |row| {
                let frame = Frame::from_row(row)?;
                let pose = match optional_token_column(row, "pose", "pose_row_token")? {
                    Some(_) => Some(Pose::from_row(row)?),
                    None => None,
                };
                Ok((frame, pose))
            })
            .await
    }

    /// Ego poses at the selected frames. Frames without a pose are skipped;
    /// which frames are selected does not depend on pose availability.
    pub async fn sample_relative_poses(
        &self,
        anchor: &Token,
        offsets: &[u64],
        direction: Direction,
    ) -> Result<Vec<Pose>> {
        let pairs = self
            .sample_relative_with_poses(anchor, offsets, direction)
            .await?;
        let selected = pairs.len();
        let poses: Vec<Pose> = pairs.into_iter().filter_map(|(_, pose)| pose).collect();

        if poses.len() < selected {
            debug!(
                anchor = %anchor,
                selected,
                missing = selected - poses.len(),
                "Dropped sampled frames without a pose"
            );
        }
        Ok(poses)
    }

    /// Frames for a set of tokens, ascending in time; unknown tokens are skipped
    pub async fn frames_for_tokens(&self, tokens: &[Token]) -> Result<Vec<Frame>> {
        let tokens: BTreeSet<&Token> = tokens.iter().collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = SqlBuilder::new(
            "frames_for_tokens",
            &format!("SELECT {FRAME_COLUMNS} FROM lidar_pc AS f WHERE "),
        );
        builder
            .push_in_list("f.token", tokens)
            .push(" ORDER BY f.timestamp ASC, f.rowid ASC");

        self.store.fetch_all(&builder.finish(), Frame::from_row).await
    }

    /// Ego pose at a frame, stamped with the frame's timestamp
    pub async fn pose_for_frame(&self, token: &Token) -> Result<Option<Pose>> {
        let query = LoweredQuery::new(
            "pose_for_frame",
            format!(
                r#"
                SELECT  f.timestamp AS timestamp,
                        {POSE_COLUMNS}
                FROM lidar_pc AS f
                INNER JOIN ego_pose AS p
                    ON p.token = f.ego_pose_token
                WHERE f.token = ?
                "#
            ),
        )
        .bind(token);

        self.store.fetch_optional(&query, Pose::from_row).await
    }

    /// Traffic light states recorded at a frame, by lane connector
    pub async fn traffic_lights(&self, token: &Token) -> Result<Vec<TrafficLightStatusData>> {
        let query = LoweredQuery::new(
            "traffic_lights",
            r#"
            SELECT  tl.status AS status,
                    tl.lane_connector_id AS lane_connector_id,
                    f.timestamp AS timestamp
            FROM lidar_pc AS f
            INNER JOIN traffic_light_status AS tl
                ON tl.lidar_pc_token = f.token
            WHERE f.token = ?
            ORDER BY tl.lane_connector_id ASC
            "#,
        )
        .bind(token);

        self.store
            .fetch_all(&query, TrafficLightStatusData::from_row)
            .await
    }

    /// Mounting of the lidar that recorded a frame
    pub async fn sensor_extrinsic(&self, token: &Token) -> Result<Option<SensorExtrinsic>> {
        let query = LoweredQuery::new(
            "sensor_extrinsic",
            r#"
            SELECT  ld.token AS token,
                    ld.channel AS channel,
                    ld.translation AS translation,
                    ld.rotation AS rotation
            FROM lidar AS ld
            INNER JOIN lidar_pc AS f
                ON f.lidar_token = ld.token
            WHERE f.token = ?
            "#,
        )
        .bind(token);

        self.store
            .fetch_optional(&query, SensorExtrinsic::from_row)
            .await
    }
}

/// `None` when no offset can select anything
fn relative_query(
    operation: &'static str,
    anchor: &Token,
    offsets: &[u64],
    direction: Direction,
    with_pose: bool,
) -> Option<LoweredQuery> {
    let offsets: BTreeSet<i64> = offsets
        .iter()
        .filter_map(|&o| i64::try_from(o).ok())
        .collect();
    if offsets.is_empty() {
        return None;
    }

    let (pose_columns, pose_join) = if with_pose {
        (
            format!(", {POSE_COLUMNS}"),
            "LEFT JOIN ego_pose AS p ON p.token = f.ego_pose_token",
        )
    } else {
        (String::new(), "")
    };

    let mut builder = SqlBuilder::new(
        operation,
        &format!(
            r#"
            WITH {ORDERED_FRAMES},
            anchor AS
            (
                SELECT frame_rank FROM ordered WHERE token = "#
        ),
    );
    builder.push_bind(anchor).push(&format!(
        r#"
            )
            SELECT  {FRAME_COLUMNS}{pose_columns}
            FROM ordered AS f
            CROSS JOIN anchor AS a
            {pose_join}
            WHERE "#
    ));
    builder
        .push_in_list(direction.distance_expr(), offsets)
        .push(" ORDER BY f.frame_rank ASC");

    Some(builder.finish())
}
