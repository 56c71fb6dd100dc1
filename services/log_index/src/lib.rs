//! Log Index
//!
//! Read-only query engine over recorded driving logs. A log is a SQLite file
//! holding timestamped sensor frames grouped into scenes, ego poses, tracked
//! object detections and scenario tags. The engine answers positional and
//! temporal questions about those frames.
//!
//! ## Features
//!
//! - **Rank Index**: chronological position of a frame and its inverse, with
//!   neighbour lookups derived from time order
//! - **Range Sampling**: every n-th frame of an inclusive time window
//! - **Relative Windows**: frames at rank offsets before or after an anchor,
//!   optionally joined with ego poses
//! - **Scenario Enumeration**: seed frames of valid scenes under composable
//!   token/type/map/mission-goal filters, and scenario windows cut around them
//! - **Trajectories**: future waypoints of tracked agents resampled to a fixed
//!   cadence
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────┐
//!                    │  LogIndex    │
//!                    └──────────────┘
//!        ┌──────────┬───────┴───────┬──────────────┐
//!        ▼          ▼               ▼              ▼
//! ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐
//! │ Rank       │ │ Frame      │ │ Scenario   │ │ Trajectory │
//! │ Index      │ │ Sampler    │ │ Segmenter  │ │ Assembler  │
//! └────────────┘ └────────────┘ └────────────┘ └────────────┘
//!        │          │               │              │
//!        └──────────┴───────┬───────┴──────────────┘
//!                           ▼
//!                    ┌──────────────┐          ┌──────────────┐
//!                    │  LogStore    │─────────▶│  log.db      │
//!                    │  (read-only) │          │  (SQLite)    │
//!                    └──────────────┘          └──────────────┘
//! ```

pub mod config;
pub mod detection;
pub mod engine;
pub mod error;
pub mod model;
pub mod query;
pub mod rank;
pub mod sampling;
pub mod scenario;
pub mod store;
pub mod token;
pub mod trajectory;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use detection::{CategoryMapping, ObjectType, OrientedBox, StateSE2, TrackedObject, Velocity2D};
pub use engine::LogIndex;
pub use error::{IndexError, Result};
pub use model::{Frame, Pose, Scene, SensorExtrinsic, TrafficLightStatus, TrafficLightStatusData};
pub use query::{LoweredQuery, ScenarioFilter};
pub use rank::RankIndex;
pub use sampling::{Direction, FrameSampler};
pub use scenario::{
    log_name_from_path, ScenarioExtractionInfo, ScenarioFilters, ScenarioMapping,
    ScenarioSegmenter, ScenarioSeed,
};
pub use store::LogStore;
pub use token::Token;
pub use trajectory::{
    interpolate_future_waypoints, PredictedTrajectory, TrajectoryAssembler, TrajectorySampling,
    Waypoint,
};
