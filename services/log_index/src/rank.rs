//! Chronological rank of frames.
//!
//! Frames are the `lidar_pc` rows of a log, totally ordered by
//! `(timestamp, rowid)`; rowid is the store's insertion order and only matters
//! for the rare timestamp ties. Neighbour lookups are derived from this order,
//! the `prev_token`/`next_token` columns are never consulted.

use crate::error::Result;
use crate::query::LoweredQuery;
use crate::store::{token_column, LogStore};
use crate::token::Token;
use sqlx::Row;
use tracing::instrument;

/// Every frame with its 0-based rank as `frame_rank`, usable as `ordered AS f`
pub(crate) const ORDERED_FRAMES: &str = r#"
    ordered AS
    (
        SELECT  token,
                timestamp,
                scene_token,
                ego_pose_token,
                lidar_token,
                filename,
                ROW_NUMBER() OVER (ORDER BY timestamp ASC, rowid ASC) - 1 AS frame_rank
        FROM lidar_pc
    )
"#;

/// Rank lookups over the frames of one log
#[derive(Clone, Debug)]
pub struct RankIndex {
    store: LogStore,
}

impl RankIndex {
    pub fn new(store: LogStore) -> Self {
        Self { store }
    }

    /// Total number of frames
    pub async fn count(&self) -> Result<u64> {
        let query = LoweredQuery::new("frame_count", "SELECT COUNT(*) AS n FROM lidar_pc");
        let n = self
            .store
            .fetch_optional(&query, |row| Ok(row.try_get::<i64, _>("n")?))
            .await?
            .unwrap_or(0);
        Ok(n.max(0) as u64)
    }

    /// 0-based chronological position of a frame, `None` for unknown tokens
    #[instrument(skip(self), fields(token = %token))]
    pub async fn rank_of(&self, token: &Token) -> Result<Option<u64>> {
        let query = LoweredQuery::new(
            "rank_of",
            format!("WITH {ORDERED_FRAMES} SELECT frame_rank FROM ordered WHERE token = ?"),
        )
        .bind(token);

        let rank = self
            .store
            .fetch_optional(&query, |row| Ok(row.try_get::<i64, _>("frame_rank")?))
            .await?;
        Ok(rank.map(|r| r as u64))
    }

    /// Inverse of [`RankIndex::rank_of`]; `None` past the end of the log
    #[instrument(skip(self))]
    pub async fn token_at(&self, rank: u64) -> Result<Option<Token>> {
        let Ok(rank) = i64::try_from(rank) else {
            return Ok(None);
        };

        let query = LoweredQuery::new(
            "token_at",
            format!("WITH {ORDERED_FRAMES} SELECT token FROM ordered WHERE frame_rank = ?"),
        )
        .bind(rank);

        self.store
            .fetch_optional(&query, |row| token_column(row, "lidar_pc", "token"))
            .await
    }

    pub async fn timestamp_of(&self, token: &Token) -> Result<Option<i64>> {
        let query = LoweredQuery::new(
            "timestamp_of",
            "SELECT timestamp FROM lidar_pc WHERE token = ?",
        )
        .bind(token);

        self.store
            .fetch_optional(&query, |row| Ok(row.try_get::<i64, _>("timestamp")?))
            .await
    }

    /// Map version of the log a frame was recorded in
    pub async fn map_name_of(&self, token: &Token) -> Result<Option<String>> {
        let query = LoweredQuery::new(
            "map_name_of",
            r#"
            SELECT  l.map_version AS map_name
            FROM log AS l
            INNER JOIN lidar AS ld
                ON ld.log_token = l.token
            INNER JOIN lidar_pc AS lp
                ON lp.lidar_token = ld.token
            WHERE lp.token = ?
            "#,
        )
        .bind(token);

        let name = self
            .store
            .fetch_optional(&query, |row| Ok(row.try_get::<Option<String>, _>("map_name")?))
            .await?;
        Ok(name.flatten())
    }

    /// First and last frame timestamps, `None` for an empty log
    pub async fn time_bounds(&self) -> Result<Option<(i64, i64)>> {
        let query = LoweredQuery::new(
            "time_bounds",
            "SELECT MIN(timestamp) AS first_ts, MAX(timestamp) AS last_ts FROM lidar_pc",
        );

        let bounds = self
            .store
            .fetch_optional(&query, |row| {
                let first: Option<i64> = row.try_get("first_ts")?;
                let last: Option<i64> = row.try_get("last_ts")?;
                Ok(first.zip(last))
            })
            .await?;
        Ok(bounds.flatten())
    }

    /// Frame immediately before `token` in time order
    pub async fn previous_frame(&self, token: &Token) -> Result<Option<Token>> {
        self.neighbour(token, -1).await
    }

    /// Frame immediately after `token` in time order
    pub async fn next_frame(&self, token: &Token) -> Result<Option<Token>> {
        self.neighbour(token, 1).await
    }

    async fn neighbour(&self, token: &Token, step: i64) -> Result<Option<Token>> {
        let query = LoweredQuery::new(
            "neighbour",
            format!(
                r#"
                WITH {ORDERED_FRAMES},
                anchor AS
                (
                    SELECT frame_rank FROM ordered WHERE token = ?
                )
                SELECT  o.token
                FROM ordered AS o
                CROSS JOIN anchor AS a
                WHERE o.frame_rank = a.frame_rank + ?
                "#
            ),
        )
        .bind(token)
        .bind(step);

        self.store
            .fetch_optional(&query, |row| token_column(row, "lidar_pc", "token"))
            .await
    }
}
