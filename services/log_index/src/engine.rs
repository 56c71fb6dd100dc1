//! Single entry point over one log file.
//!
//! `LogIndex` owns the reader pool and hands out the operations of every
//! component. It holds no state across calls, so clones can be moved into
//! worker tasks freely.

use crate::config::DatabaseConfig;
use crate::detection::{CategoryMapping, TrackedObject};
use crate::error::Result;
use crate::model::{Frame, Pose, Scene, SensorExtrinsic, TrafficLightStatusData};
use crate::rank::RankIndex;
use crate::sampling::{Direction, FrameSampler};
use crate::scenario::{
    log_name_from_path, ScenarioExtractionInfo, ScenarioFilters, ScenarioMapping,
    ScenarioSegmenter, ScenarioSeed,
};
use crate::store::LogStore;
use crate::token::Token;
use crate::trajectory::{PredictedTrajectory, TrajectoryAssembler, TrajectorySampling, Waypoint};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Read-only query engine over one recorded log
#[derive(Clone, Debug)]
pub struct LogIndex {
    log_name: String,
    store: LogStore,
    ranks: RankIndex,
    sampler: FrameSampler,
    scenarios: ScenarioSegmenter,
    trajectories: TrajectoryAssembler,
}

impl LogIndex {
    /// Open a log file with the standard category names
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        Self::open_with_categories(config, CategoryMapping::standard()).await
    }

    pub async fn open_with_categories(
        config: &DatabaseConfig,
        categories: CategoryMapping,
    ) -> Result<Self> {
        let store = LogStore::open(config).await?;
        let index = Self::from_store(log_name_from_path(&config.log_path), store, categories);
        info!(log_name = %index.log_name, "Log index ready");
        Ok(index)
    }

    pub async fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();
        Self::open(&DatabaseConfig::for_path(path)).await
    }

    pub fn from_store(log_name: String, store: LogStore, categories: CategoryMapping) -> Self {
        Self {
            log_name,
            ranks: RankIndex::new(store.clone()),
            sampler: FrameSampler::new(store.clone()),
            scenarios: ScenarioSegmenter::new(store.clone()),
            trajectories: TrajectoryAssembler::new(store.clone(), Arc::new(categories)),
            store,
        }
    }

    /// Log file name without directory or `.db` extension
    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    pub async fn close(&self) {
        self.store.close().await;
    }

    // Rank index

    pub async fn count(&self) -> Result<u64> {
        self.ranks.count().await
    }

    pub async fn rank_of(&self, token: &Token) -> Result<Option<u64>> {
        self.ranks.rank_of(token).await
    }

    pub async fn token_at(&self, rank: u64) -> Result<Option<Token>> {
        self.ranks.token_at(rank).await
    }

    pub async fn timestamp_of(&self, token: &Token) -> Result<Option<i64>> {
        self.ranks.timestamp_of(token).await
    }

    pub async fn map_name_of(&self, token: &Token) -> Result<Option<String>> {
        self.ranks.map_name_of(token).await
    }

    pub async fn time_bounds(&self) -> Result<Option<(i64, i64)>> {
        self.ranks.time_bounds().await
    }

    pub async fn previous_frame(&self, token: &Token) -> Result<Option<Token>> {
        self.ranks.previous_frame(token).await
    }

    pub async fn next_frame(&self, token: &Token) -> Result<Option<Token>> {
        self.ranks.next_frame(token).await
    }

    // Sampling

    pub async fn sample_range(&self, start_ts: i64, end_ts: i64, stride: u64) -> Result<Vec<Token>> {
        self.sampler.sample_range(start_ts, end_ts, stride).await
    }

    pub async fn sample_relative(
        &self,
        anchor: &Token,
        offsets: &[u64],
        direction: Direction,
    ) -> Result<Vec<Frame>> {
        self.sampler.sample_relative(anchor, offsets, direction).await
    }

    pub async fn sample_relative_with_poses(
        &self,
        anchor: &Token,
        offsets: &[u64],
        direction: Direction,
    ) -> Result<Vec<(Frame, Option<Pose>)>> {
        self.sampler
            .sample_relative_with_poses(anchor, offsets, direction)
            .await
    }

    pub async fn sample_relative_poses(
        &self,
        anchor: &Token,
        offsets: &[u64],
        direction: Direction,
    ) -> Result<Vec<Pose>> {
        self.sampler
            .sample_relative_poses(anchor, offsets, direction)
            .await
    }

    pub async fn frames_for_tokens(&self, tokens: &[Token]) -> Result<Vec<Frame>> {
        self.sampler.frames_for_tokens(tokens).await
    }

    // Per-frame records

    pub async fn pose_for_frame(&self, token: &Token) -> Result<Option<Pose>> {
        self.sampler.pose_for_frame(token).await
    }

    pub async fn traffic_lights(&self, token: &Token) -> Result<Vec<TrafficLightStatusData>> {
        self.sampler.traffic_lights(token).await
    }

    pub async fn sensor_extrinsic(&self, token: &Token) -> Result<Option<SensorExtrinsic>> {
        self.sampler.sensor_extrinsic(token).await
    }

    pub async fn mission_goal(&self, token: &Token) -> Result<Option<Pose>> {
        self.scenarios.mission_goal(token).await
    }

    pub async fn roadblock_ids(&self, token: &Token) -> Result<Option<Vec<String>>> {
        self.scenarios.roadblock_ids(token).await
    }

    // Scenarios

    pub async fn valid_scenes(&self) -> Result<Vec<Scene>> {
        self.scenarios.valid_scenes().await
    }

    pub async fn valid_scenario_seeds(&self, filters: &ScenarioFilters) -> Result<Vec<ScenarioSeed>> {
        self.scenarios.valid_scenario_seeds(filters).await
    }

    pub async fn extract_scenario_tokens(
        &self,
        anchor_ts: i64,
        info: &ScenarioExtractionInfo,
    ) -> Result<Vec<Token>> {
        self.scenarios.extract_scenario_tokens(anchor_ts, info).await
    }

    /// Frames of the scenario a seed starts, cut by the settings of its type
    pub async fn scenario_tokens(
        &self,
        seed: &ScenarioSeed,
        mapping: &ScenarioMapping,
    ) -> Result<Vec<Token>> {
        let info = seed
            .scenario_type
            .as_deref()
            .map(|t| mapping.extraction_info(t))
            .unwrap_or_default();
        self.extract_scenario_tokens(seed.timestamp, &info).await
    }

    pub async fn tagged_frames(&self) -> Result<Vec<(String, Token)>> {
        self.scenarios.tagged_frames().await
    }

    // Objects and trajectories

    pub async fn future_waypoints(
        &self,
        track_tokens: &BTreeSet<Token>,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<BTreeMap<Token, Vec<Waypoint>>> {
        self.trajectories
            .future_waypoints(track_tokens, start_ts, end_ts)
            .await
    }

    pub async fn future_trajectory(
        &self,
        track_token: &Token,
        from_ts: i64,
        horizon_s: f64,
        interval_s: f64,
    ) -> Result<Option<PredictedTrajectory>> {
        self.trajectories
            .future_trajectory(track_token, from_ts, horizon_s, interval_s)
            .await
    }

    pub async fn tracked_objects_for_frame(
        &self,
        token: &Token,
        sampling: Option<&TrajectorySampling>,
    ) -> Result<Vec<TrackedObject>> {
        self.trajectories
            .tracked_objects_for_frame(token, sampling)
            .await
    }

    pub async fn tracked_objects_in_window(
        &self,
        start_ts: i64,
        end_ts: i64,
        track_filter: Option<&HashSet<Token>>,
    ) -> Result<Vec<TrackedObject>> {
        self.trajectories
            .tracked_objects_in_window(start_ts, end_ts, track_filter)
            .await
    }
}
