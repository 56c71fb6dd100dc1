//! Scene validity, scenario seed enumeration and scenario window extraction.
//!
//! Scenes are ranked by name. A scene is valid when at least two scenes come
//! before it and two after it; only frames of valid scenes seed scenarios.

use crate::config::{ExtractionSettings, ScenarioConfig};
use crate::error::{IndexError, Result};
use crate::model::{Pose, Scene, POSE_COLUMNS};
use crate::query::{lower_scenario_seeds, LoweredQuery, ScenarioFilter};
use crate::sampling::FrameSampler;
use crate::store::{token_column, LogStore};
use crate::token::Token;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, instrument};

pub const DEFAULT_SCENARIO_NAME: &str = "unknown";
pub const DEFAULT_SCENARIO_DURATION_S: f64 = 20.0;
pub const DEFAULT_EXTRACTION_OFFSET_S: f64 = 0.0;
pub const DEFAULT_SUBSAMPLE_RATIO: f64 = 1.0;

/// A frame that may start a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSeed {
    pub token: Token,
    pub timestamp: i64,
    pub map_name: Option<String>,
    /// Largest matching tag of the frame, `None` for untagged frames
    pub scenario_type: Option<String>,
}

impl ScenarioSeed {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        Ok(Self {
            token: token_column(row, "lidar_pc", "token")?,
            timestamp: row.try_get("timestamp")?,
            map_name: row.try_get("map_name")?,
            scenario_type: row.try_get("scenario_type")?,
        })
    }
}

/// Conjunction of optional seed restrictions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioFilters {
    tokens: Option<BTreeSet<Token>>,
    types: Option<BTreeSet<String>>,
    map_names: Option<BTreeSet<String>>,
    require_mission_goal: bool,
}

impl ScenarioFilters {
    /// No restriction
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tokens<I: IntoIterator<Item = Token>>(mut self, tokens: I) -> Self {
        self.tokens = Some(tokens.into_iter().collect());
        self
    }

    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn map_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.map_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Drop seeds whose scene has no resolvable mission goal
    pub fn require_mission_goal(mut self, require: bool) -> Self {
        self.require_mission_goal = require;
        self
    }

    pub fn to_filters(&self) -> Vec<ScenarioFilter> {
        let mut filters = Vec::new();
        if let Some(tokens) = &self.tokens {
            filters.push(ScenarioFilter::Tokens(tokens.clone()));
        }
        if let Some(types) = &self.types {
            filters.push(ScenarioFilter::Types(types.clone()));
        }
        if let Some(names) = &self.map_names {
            filters.push(ScenarioFilter::MapNames(names.clone()));
        }
        if self.require_mission_goal {
            filters.push(ScenarioFilter::RequireMissionGoal);
        }
        filters
    }
}

impl TryFrom<&ScenarioConfig> for ScenarioFilters {
    type Error = IndexError;

    fn try_from(config: &ScenarioConfig) -> Result<Self> {
        let mut filters =
            ScenarioFilters::new().require_mission_goal(!config.include_invalid_mission_goals);
        if let Some(tokens) = &config.tokens {
            let parsed = tokens
                .iter()
                .map(|t| Token::from_hex(t))
                .collect::<Result<Vec<_>>>()?;
            filters = filters.tokens(parsed);
        }
        if let Some(types) = &config.types {
            filters = filters.types(types.iter().cloned());
        }
        if let Some(names) = &config.map_names {
            filters = filters.map_names(names.iter().cloned());
        }
        Ok(filters)
    }
}

/// How to cut a scenario out of the log around its seed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioExtractionInfo {
    name: String,
    duration_s: f64,
    offset_s: f64,
    subsample_ratio: f64,
}

impl ScenarioExtractionInfo {
    /// `duration_s` must be positive and `subsample_ratio` in `(0, 1]`
    pub fn new(
        name: impl Into<String>,
        duration_s: f64,
        offset_s: f64,
        subsample_ratio: f64,
    ) -> Result<Self> {
        if !(duration_s.is_finite() && duration_s > 0.0) {
            return Err(IndexError::invalid_argument(format!(
                "scenario duration must be positive, got {duration_s}"
            )));
        }
        if !offset_s.is_finite() {
            return Err(IndexError::invalid_argument(format!(
                "extraction offset must be finite, got {offset_s}"
            )));
        }
        if !(subsample_ratio > 0.0 && subsample_ratio <= 1.0) {
            return Err(IndexError::invalid_argument(format!(
                "subsample ratio must be in (0, 1], got {subsample_ratio}"
            )));
        }

        Ok(Self {
            name: name.into(),
            duration_s,
            offset_s,
            subsample_ratio,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    pub fn offset_s(&self) -> f64 {
        self.offset_s
    }

    pub fn subsample_ratio(&self) -> f64 {
        self.subsample_ratio
    }

    /// `(start_ts, end_ts, stride)` of the window anchored at `anchor_ts`
    pub fn window(&self, anchor_ts: i64) -> (i64, i64, u64) {
        let start = anchor_ts.saturating_add((self.offset_s * 1e6) as i64);
        let end = start.saturating_add((self.duration_s * 1e6) as i64);
        let stride = ((1.0 / self.subsample_ratio).floor() as u64).max(1);
        (start, end, stride)
    }
}

impl Default for ScenarioExtractionInfo {
    fn default() -> Self {
        Self {
            name: DEFAULT_SCENARIO_NAME.to_string(),
            duration_s: DEFAULT_SCENARIO_DURATION_S,
            offset_s: DEFAULT_EXTRACTION_OFFSET_S,
            subsample_ratio: DEFAULT_SUBSAMPLE_RATIO,
        }
    }
}

/// Scenario type to extraction settings; unknown types get the defaults
#[derive(Debug, Clone, Default)]
pub struct ScenarioMapping {
    mapping: HashMap<String, ScenarioExtractionInfo>,
}

impl ScenarioMapping {
    pub fn new<I: IntoIterator<Item = ScenarioExtractionInfo>>(infos: I) -> Self {
        let mapping = infos
            .into_iter()
            .map(|info| (info.name.clone(), info))
            .collect();
        Self { mapping }
    }

    pub fn extraction_info(&self, scenario_type: &str) -> ScenarioExtractionInfo {
        self.mapping
            .get(scenario_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

impl TryFrom<&HashMap<String, ExtractionSettings>> for ScenarioMapping {
    type Error = IndexError;

    fn try_from(settings: &HashMap<String, ExtractionSettings>) -> Result<Self> {
        let infos = settings
            .iter()
            .map(|(name, s)| {
                ScenarioExtractionInfo::new(name.clone(), s.duration_s, s.offset_s, s.subsample_ratio)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(infos))
    }
}

/// Log name of a log file path: the file name without a `.db` extension
pub fn log_name_from_path(path: impl AsRef<Path>) -> String {
    let file_name = path
        .as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    match file_name.strip_suffix(".db") {
        Some(stem) => stem.to_string(),
        None => file_name,
    }
}

/// Scenario enumeration over one log
#[derive(Clone, Debug)]
pub struct ScenarioSegmenter {
    store: LogStore,
    sampler: FrameSampler,
}

impl ScenarioSegmenter {
    pub fn new(store: LogStore) -> Self {
        let sampler = FrameSampler::new(store.clone());
        Self { store, sampler }
    }

    /// Scenes with at least two scenes before and after them in name order
    pub async fn valid_scenes(&self) -> Result<Vec<Scene>> {
        let query = LoweredQuery::new(
            "valid_scenes",
            r#"
            WITH ordered_scenes AS
            (
                SELECT  token,
                        name,
                        goal_ego_pose_token,
                        ROW_NUMBER() OVER (ORDER BY name ASC, rowid ASC) - 1 AS scene_rank
                FROM scene
            ),
            scene_count AS
            (
                SELECT COUNT(*) AS n FROM scene
            )
            SELECT  o.scene_rank AS scene_rank,
                    o.token AS token,
                    o.name AS name,
                    o.goal_ego_pose_token AS goal_ego_pose_token
            FROM ordered_scenes AS o
            CROSS JOIN scene_count AS c
            WHERE o.scene_rank >= 2 AND o.scene_rank < c.n - 2
            ORDER BY o.scene_rank ASC
            "#,
        );

        self.store.fetch_all(&query, Scene::from_row).await
    }

    /// Frames of valid scenes matching every filter, ascending in time
    #[instrument(skip(self))]
    pub async fn valid_scenario_seeds(&self, filters: &ScenarioFilters) -> Result<Vec<ScenarioSeed>> {
        let query = lower_scenario_seeds(&filters.to_filters());
        let seeds = self.store.fetch_all(&query, ScenarioSeed::from_row).await?;
        debug!(seeds = seeds.len(), "Enumerated scenario seeds");
        Ok(seeds)
    }

    /// Frame tokens forming the scenario anchored at `anchor_ts`
    pub async fn extract_scenario_tokens(
        &self,
        anchor_ts: i64,
        info: &ScenarioExtractionInfo,
    ) -> Result<Vec<Token>> {
        let (start, end, stride) = info.window(anchor_ts);
        self.sampler.sample_range(start, end, stride).await
    }

    /// Every tag with its frame, ordered by tag then time
    pub async fn tagged_frames(&self) -> Result<Vec<(String, Token)>> {
        let query = LoweredQuery::new(
            "tagged_frames",
            r#"
            SELECT  st.type AS scenario_type,
                    f.token AS token
            FROM lidar_pc AS f
            INNER JOIN scenario_tag AS st
                ON st.lidar_pc_token = f.token
            ORDER BY st.type ASC, f.timestamp ASC, f.rowid ASC
            "#,
        );

        self.store
            .fetch_all(&query, |row| {
                Ok((row.try_get("scenario_type")?, token_column(row, "lidar_pc", "token")?))
            })
            .await
    }

    /// Goal pose of the scene owning a frame
    pub async fn mission_goal(&self, token: &Token) -> Result<Option<Pose>> {
        let query = LoweredQuery::new(
            "mission_goal",
            format!(
                r#"
                SELECT  p.timestamp AS timestamp,
                        {POSE_COLUMNS}
                FROM lidar_pc AS f
                INNER JOIN scene AS s
                    ON s.token = f.scene_token
                INNER JOIN ego_pose AS p
                    ON p.token = s.goal_ego_pose_token
                WHERE f.token = ?
                "#
            ),
        )
        .bind(token);

        self.store.fetch_optional(&query, Pose::from_row).await
    }

    /// Route roadblocks of the scene owning a frame
    pub async fn roadblock_ids(&self, token: &Token) -> Result<Option<Vec<String>>> {
        let query = LoweredQuery::new(
            "roadblock_ids",
            r#"
            SELECT  s.roadblock_ids AS roadblock_ids
            FROM lidar_pc AS f
            INNER JOIN scene AS s
                ON s.token = f.scene_token
            WHERE f.token = ?
            "#,
        )
        .bind(token);

        let ids = self
            .store
            .fetch_optional(&query, |row| {
                Ok(row.try_get::<Option<String>, _>("roadblock_ids")?)
            })
            .await?;

        Ok(ids
            .flatten()
            .map(|ids| ids.split_whitespace().map(str::to_string).collect()))
    }
}
