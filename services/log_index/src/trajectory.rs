//! Future motion of tracked objects.
//!
//! Raw detections of a track are irregular in time. They are collected over a
//! horizon and resampled to a fixed cadence; nothing is extrapolated past the
//! last raw detection.

use crate::config::TrajectoryConfig;
use crate::detection::{
    CategoryMapping, DetectionRow, OrientedBox, StateSE2, TrackedObject, Velocity2D,
    DETECTION_COLUMNS, DETECTION_JOINS,
};
use crate::error::{IndexError, Result};
use crate::query::{LoweredQuery, SqlBuilder};
use crate::store::{LogStore, Snapshot};
use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::f64::consts::{PI, TAU};
use std::sync::Arc;
use tracing::{debug, instrument};

const MICROS_PER_SECOND: f64 = 1e6;

/// Tolerance when checking that a horizon is a whole number of intervals
const MULTIPLE_EPSILON: f64 = 1e-6;

/// State of an object at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Microseconds
    pub timestamp: i64,
    pub oriented_box: OrientedBox,
    pub velocity: Option<Velocity2D>,
}

/// One hypothesis of future motion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedTrajectory {
    pub probability: f64,
    pub waypoints: Vec<Waypoint>,
}

impl PredictedTrajectory {
    /// The only hypothesis, weighted 1.0
    pub fn single(waypoints: Vec<Waypoint>) -> Self {
        Self {
            probability: 1.0,
            waypoints,
        }
    }
}

/// How far ahead and how densely future motion is sampled.
///
/// Any two of the three values determine the third.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectorySampling {
    num_poses: usize,
    time_horizon_s: f64,
    interval_s: f64,
}

impl TrajectorySampling {
    pub fn new(
        num_poses: Option<usize>,
        time_horizon_s: Option<f64>,
        interval_s: Option<f64>,
    ) -> Result<Self> {
        for (name, value) in [("time_horizon_s", time_horizon_s), ("interval_s", interval_s)] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(IndexError::invalid_argument(format!(
                        "{name} must be positive, got {v}"
                    )));
                }
            }
        }
        if num_poses == Some(0) {
            return Err(IndexError::invalid_argument("num_poses must be at least 1"));
        }

        match (num_poses, time_horizon_s, interval_s) {
            (Some(n), Some(horizon), None) => Ok(Self {
                num_poses: n,
                time_horizon_s: horizon,
                interval_s: horizon / n as f64,
            }),
            (Some(n), None, Some(interval)) => Ok(Self {
                num_poses: n,
                time_horizon_s: n as f64 * interval,
                interval_s: interval,
            }),
            (None, Some(horizon), Some(interval)) => {
                let n = whole_intervals(horizon, interval).ok_or_else(|| {
                    IndexError::invalid_argument(format!(
                        "time horizon {horizon}s is not a multiple of interval {interval}s"
                    ))
                })?;
                if n == 0 {
                    return Err(IndexError::invalid_argument(format!(
                        "time horizon {horizon}s is shorter than interval {interval}s"
                    )));
                }
                Ok(Self {
                    num_poses: n,
                    time_horizon_s: horizon,
                    interval_s: interval,
                })
            }
            (Some(n), Some(horizon), Some(interval)) => {
                if whole_intervals(horizon, interval) != Some(n) {
                    return Err(IndexError::invalid_argument(format!(
                        "{n} poses do not fit a {horizon}s horizon at {interval}s intervals"
                    )));
                }
                Ok(Self {
                    num_poses: n,
                    time_horizon_s: horizon,
                    interval_s: interval,
                })
            }
            _ => Err(IndexError::invalid_argument(format!(
                "need two of num_poses, time_horizon_s and interval_s, got \
                 {num_poses:?}, {time_horizon_s:?}, {interval_s:?}"
            ))),
        }
    }

    pub fn num_poses(&self) -> usize {
        self.num_poses
    }

    pub fn time_horizon_s(&self) -> f64 {
        self.time_horizon_s
    }

    pub fn interval_s(&self) -> f64 {
        self.interval_s
    }

    pub fn horizon_us(&self) -> i64 {
        seconds_to_micros(self.time_horizon_s)
    }
}

impl TryFrom<&TrajectoryConfig> for TrajectorySampling {
    type Error = IndexError;

    fn try_from(config: &TrajectoryConfig) -> Result<Self> {
        Self::new(config.num_poses, config.time_horizon_s, config.interval_s)
    }
}

fn whole_intervals(horizon_s: f64, interval_s: f64) -> Option<usize> {
    let ratio = horizon_s / interval_s;
    let rounded = ratio.round();
    ((ratio - rounded).abs() < MULTIPLE_EPSILON).then_some(rounded as usize)
}

fn seconds_to_micros(seconds: f64) -> i64 {
    (seconds * MICROS_PER_SECOND).round() as i64
}

fn check_horizon(horizon_s: f64, interval_s: f64) -> Result<()> {
    if !(horizon_s.is_finite() && horizon_s > 0.0) {
        return Err(IndexError::invalid_argument(format!(
            "horizon must be positive, got {horizon_s}"
        )));
    }
    if !(interval_s.is_finite() && interval_s > 0.0) {
        return Err(IndexError::invalid_argument(format!(
            "interval must be positive, got {interval_s}"
        )));
    }
    Ok(())
}

/// Resample raw waypoints to a fixed cadence.
///
/// Targets are `t0 + k * interval` for `k in 0..floor(horizon / interval)`,
/// where `t0` is the earliest raw sample. Targets past the last raw sample are
/// dropped. A single raw waypoint comes back unchanged.
pub fn interpolate_future_waypoints(
    raw: &[Waypoint],
    horizon_s: f64,
    interval_s: f64,
) -> Result<Vec<Waypoint>> {
    check_horizon(horizon_s, interval_s)?;

    let mut raw = raw.to_vec();
    raw.sort_by_key(|w| w.timestamp);

    if raw.len() < 2 {
        return Ok(raw);
    }
    let first = raw[0].timestamp;
    let last = raw[raw.len() - 1].timestamp;

    let targets = (horizon_s / interval_s + MULTIPLE_EPSILON).floor() as i64;
    let interval_us = seconds_to_micros(interval_s).max(1);

    let mut out = Vec::new();
    for k in 0..targets {
        let t = first + k * interval_us;
        if t > last {
            break;
        }
        out.push(sample_at(&raw, t));
    }
    Ok(out)
}

/// `raw` is sorted and `t` lies within its span
fn sample_at(raw: &[Waypoint], t: i64) -> Waypoint {
    let idx = raw.partition_point(|w| w.timestamp < t);
    let hi = &raw[idx];
    if hi.timestamp == t || idx == 0 {
        return Waypoint {
            timestamp: t,
            ..hi.clone()
        };
    }
    let lo = &raw[idx - 1];
    let fraction = (t - lo.timestamp) as f64 / (hi.timestamp - lo.timestamp) as f64;

    let a = &lo.oriented_box;
    let b = &hi.oriented_box;
    let oriented_box = OrientedBox {
        center: StateSE2 {
            x: lerp(a.center.x, b.center.x, fraction),
            y: lerp(a.center.y, b.center.y, fraction),
            heading: lerp_angle(a.center.heading, b.center.heading, fraction),
        },
        z: lerp(a.z, b.z, fraction),
        width: lerp(a.width, b.width, fraction),
        length: lerp(a.length, b.length, fraction),
        height: lerp(a.height, b.height, fraction),
    };

    let velocity = match (lo.velocity, hi.velocity) {
        (Some(va), Some(vb)) => Some(Velocity2D {
            x: lerp(va.x, vb.x, fraction),
            y: lerp(va.y, vb.y, fraction),
        }),
        _ => None,
    };

    Waypoint {
        timestamp: t,
        oriented_box,
        velocity,
    }
}

fn lerp(a: f64, b: f64, fraction: f64) -> f64 {
    a + (b - a) * fraction
}

/// Interpolate along the shorter arc, result in `(-pi, pi]`
fn lerp_angle(a: f64, b: f64, fraction: f64) -> f64 {
    normalize_angle(a + normalize_angle(b - a) * fraction)
}

fn normalize_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

/// Builds tracked objects and their future trajectories from detections
#[derive(Clone, Debug)]
pub struct TrajectoryAssembler {
    store: LogStore,
    categories: Arc<CategoryMapping>,
}

impl TrajectoryAssembler {
    pub fn new(store: LogStore, categories: Arc<CategoryMapping>) -> Self {
        Self { store, categories }
    }

    /// Raw waypoints of each track within `[start_ts, end_ts]`, ascending in time.
    /// Tracks without detections in the window are absent from the map.
    #[instrument(skip(self, track_tokens), fields(tracks = track_tokens.len()))]
    pub async fn future_waypoints(
        &self,
        track_tokens: &BTreeSet<Token>,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<BTreeMap<Token, Vec<Waypoint>>> {
        if start_ts > end_ts {
            return Err(IndexError::invalid_argument(format!(
                "window start {start_ts} is after end {end_ts}"
            )));
        }
        if track_tokens.is_empty() {
            return Ok(BTreeMap::new());
        }

        let rows = self
            .store
            .fetch_all(
                &future_waypoints_query(track_tokens, start_ts, end_ts),
                DetectionRow::from_row,
            )
            .await?;
        Ok(group_by_track(rows))
    }

    /// Resampled future of one track starting at `from_ts`, `None` when the
    /// track has no detection within the horizon
    #[instrument(skip(self), fields(track = %track_token))]
    pub async fn future_trajectory(
        &self,
        track_token: &Token,
        from_ts: i64,
        horizon_s: f64,
        interval_s: f64,
    ) -> Result<Option<PredictedTrajectory>> {
        check_horizon(horizon_s, interval_s)?;

        let end_ts = from_ts.saturating_add(seconds_to_micros(horizon_s));
        let tracks = BTreeSet::from([*track_token]);
        let mut waypoints = self.future_waypoints(&tracks, from_ts, end_ts).await?;

        let Some(raw) = waypoints.remove(track_token) else {
            return Ok(None);
        };
        let resampled = interpolate_future_waypoints(&raw, horizon_s, interval_s)?;
        Ok(Some(PredictedTrajectory::single(resampled)))
    }

    /// Every object detected in a frame, ordered by track token. With a
    /// sampling, agents also carry their predicted future.
    #[instrument(skip(self, sampling), fields(frame = %frame_token))]
    pub async fn tracked_objects_for_frame(
        &self,
        frame_token: &Token,
        sampling: Option<&TrajectorySampling>,
    ) -> Result<Vec<TrackedObject>> {
        let query = LoweredQuery::new(
            "tracked_objects_for_frame",
            format!(
                r#"
                SELECT  {DETECTION_COLUMNS}
                {DETECTION_JOINS}
                WHERE f.token = ?
                ORDER BY lb.track_token ASC
                "#
            ),
        )
        .bind(frame_token);

        let mut snapshot = self.store.snapshot().await?;
        let rows = snapshot.fetch_all(&query, DetectionRow::from_row).await?;
        let mut objects = rows
            .into_iter()
            .map(|row| self.categories.parse(row))
            .collect::<Result<Vec<_>>>()?;

        if let Some(sampling) = sampling {
            self.attach_predictions(&mut snapshot, &mut objects, sampling)
                .await?;
        }
        snapshot.finish().await?;

        Ok(objects)
    }

    async fn attach_predictions(
        &self,
        snapshot: &mut Snapshot,
        objects: &mut [TrackedObject],
        sampling: &TrajectorySampling,
    ) -> Result<()> {
        let agents: BTreeSet<Token> = objects
            .iter()
            .filter(|o| o.is_agent())
            .map(|o| o.track_token())
            .collect();
        let Some(start_ts) = objects.first().map(|o| o.metadata.timestamp) else {
            return Ok(());
        };
        if agents.is_empty() {
            return Ok(());
        }

        let end_ts = start_ts.saturating_add(sampling.horizon_us());
        let rows = snapshot
            .fetch_all(
                &future_waypoints_query(&agents, start_ts, end_ts),
                DetectionRow::from_row,
            )
            .await?;
        let mut by_track = group_by_track(rows);

        for object in objects.iter_mut().filter(|o| o.is_agent()) {
            let Some(raw) = by_track.remove(&object.track_token()) else {
                continue;
            };
            let waypoints =
                interpolate_future_waypoints(&raw, sampling.time_horizon_s(), sampling.interval_s())?;
            if !waypoints.is_empty() {
                object.predictions = vec![PredictedTrajectory::single(waypoints)];
            }
        }

        debug!(agents = agents.len(), "Attached agent predictions");
        Ok(())
    }

    /// Every object detected within `[start_ts, end_ts]`, ordered by time then
    /// track token, optionally restricted to some tracks
    #[instrument(skip(self, track_filter))]
    pub async fn tracked_objects_in_window(
        &self,
        start_ts: i64,
        end_ts: i64,
        track_filter: Option<&HashSet<Token>>,
    ) -> Result<Vec<TrackedObject>> {
        if start_ts > end_ts {
            return Err(IndexError::invalid_argument(format!(
                "window start {start_ts} is after end {end_ts}"
            )));
        }

        let mut builder = SqlBuilder::new(
            "tracked_objects_in_window",
            &format!(
                r#"
                SELECT  {DETECTION_COLUMNS}
                {DETECTION_JOINS}
                WHERE f.timestamp >= "#
            ),
        );
        builder
            .push_bind(start_ts)
            .push(" AND f.timestamp <= ")
            .push_bind(end_ts);
        if let Some(tracks) = track_filter {
            let sorted: BTreeSet<&Token> = tracks.iter().collect();
            builder.push(" AND ").push_in_list("lb.track_token", sorted);
        }
        builder.push(" ORDER BY f.timestamp ASC, f.rowid ASC, lb.track_token ASC");

        let rows = self
            .store
            .fetch_all(&builder.finish(), DetectionRow::from_row)
            .await?;
        rows.into_iter()
            .map(|row| self.categories.parse(row))
            .collect()
    }
}

fn future_waypoints_query(
    track_tokens: &BTreeSet<Token>,
    start_ts: i64,
    end_ts: i64,
) -> LoweredQuery {
    let mut builder = SqlBuilder::new(
        "future_waypoints",
        &format!(
            r#"
            SELECT  {DETECTION_COLUMNS}
            {DETECTION_JOINS}
            WHERE f.timestamp >= "#
        ),
    );
    builder
        .push_bind(start_ts)
        .push(" AND f.timestamp <= ")
        .push_bind(end_ts)
        .push(" AND ")
        .push_in_list("lb.track_token", track_tokens)
        .push(" ORDER BY lb.track_token ASC, f.timestamp ASC, f.rowid ASC");
    builder.finish()
}

fn group_by_track(rows: Vec<DetectionRow>) -> BTreeMap<Token, Vec<Waypoint>> {
    let mut grouped: BTreeMap<Token, Vec<Waypoint>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.track_token).or_default().push(row.waypoint());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{frame_token, scene_token, track_token, FixtureLog};
    use std::f64::consts::FRAC_PI_2;

    fn waypoint(timestamp: i64, x: f64, heading: f64) -> Waypoint {
        Waypoint {
            timestamp,
            oriented_box: OrientedBox {
                center: StateSE2 { x, y: 0.0, heading },
                z: 0.0,
                width: 2.0,
                length: 4.0,
                height: 1.5,
            },
            velocity: Some(Velocity2D { x: 1.0, y: 0.0 }),
        }
    }

    #[test]
    fn test_sampling_derives_missing_value() {
        let s = TrajectorySampling::new(Some(16), Some(8.0), None).unwrap();
        assert_eq!(s.interval_s(), 0.5);

        let s = TrajectorySampling::new(Some(10), None, Some(0.1)).unwrap();
        assert!((s.time_horizon_s() - 1.0).abs() < 1e-12);

        let s = TrajectorySampling::new(None, Some(6.0), Some(0.5)).unwrap();
        assert_eq!(s.num_poses(), 12);
        assert_eq!(s.horizon_us(), 6_000_000);
    }

    #[test]
    fn test_sampling_rejects_bad_input() {
        assert!(TrajectorySampling::new(None, Some(1.0), Some(0.3)).is_err());
        assert!(TrajectorySampling::new(Some(3), Some(1.0), Some(0.5)).is_err());
        assert!(TrajectorySampling::new(Some(3), None, None).is_err());
        assert!(TrajectorySampling::new(Some(0), Some(1.0), None).is_err());
        assert!(matches!(
            TrajectorySampling::new(None, Some(-1.0), Some(0.5)),
            Err(IndexError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sampling_accepts_consistent_triple() {
        let s = TrajectorySampling::new(Some(4), Some(2.0), Some(0.5)).unwrap();
        assert_eq!(s.num_poses(), 4);
    }

    #[test]
    fn test_interpolate_empty_and_single() {
        assert!(interpolate_future_waypoints(&[], 2.0, 0.5).unwrap().is_empty());

        let single = vec![waypoint(100, 1.0, 0.0)];
        assert_eq!(interpolate_future_waypoints(&single, 2.0, 0.5).unwrap(), single);
    }

    #[test]
    fn test_interpolate_full_horizon_yields_floor_count() {
        // Raw samples every second for 4 seconds, 0.5 s cadence over 3 s
        let raw: Vec<_> = (0..=4)
            .map(|i| waypoint(i * 1_000_000, i as f64 * 2.0, 0.0))
            .collect();
        let out = interpolate_future_waypoints(&raw, 3.0, 0.5).unwrap();

        assert_eq!(out.len(), 6);
        let xs: Vec<f64> = out.iter().map(|w| w.oriented_box.center.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(out[5].timestamp, 2_500_000);
    }

    #[test]
    fn test_interpolate_stops_at_last_raw_sample() {
        let raw = vec![waypoint(0, 0.0, 0.0), waypoint(1_000_000, 10.0, 0.0)];
        let out = interpolate_future_waypoints(&raw, 8.0, 0.5).unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out.last().unwrap().timestamp, 1_000_000);
        assert_eq!(out.last().unwrap().oriented_box.center.x, 10.0);
    }

    #[test]
    fn test_interpolate_heading_takes_short_arc() {
        let raw = vec![
            waypoint(0, 0.0, PI - 0.1),
            waypoint(1_000_000, 0.0, -PI + 0.1),
        ];
        let out = interpolate_future_waypoints(&raw, 1.0, 0.5).unwrap();
        let heading = out[1].oriented_box.center.heading;

        assert!((heading.abs() - PI).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_rejects_bad_interval() {
        let raw = vec![waypoint(0, 0.0, 0.0), waypoint(1, 0.0, 0.0)];
        assert!(interpolate_future_waypoints(&raw, 1.0, 0.0).is_err());
        assert!(interpolate_future_waypoints(&raw, 0.0, 0.5).is_err());
    }

    #[test]
    fn test_lerp_angle_quarter_turn() {
        assert!((lerp_angle(0.0, FRAC_PI_2, 0.5) - FRAC_PI_2 / 2.0).abs() < 1e-12);
    }

    /// Frames every 0.5 s, a vehicle seen at every frame, a pedestrian only in
    /// the first and third, and a cone in the first
    async fn traffic_fixture() -> FixtureLog {
        let fixture = FixtureLog::empty().await;
        fixture.insert_scene(scene_token(0), "scene-000", None).await;
        for i in 0..6u64 {
            fixture
                .insert_frame(frame_token(i), i as i64 * 500_000, scene_token(0), None)
                .await;
        }
        fixture.insert_track(track_token(1), "vehicle").await;
        fixture.insert_track(track_token(2), "pedestrian").await;
        fixture.insert_track(track_token(3), "traffic_cone").await;
        for i in 0..6u64 {
            fixture
                .insert_detection(frame_token(i), track_token(1), i as f64, 0.0, 0.0, 2.0)
                .await;
        }
        fixture
            .insert_detection(frame_token(0), track_token(2), 5.0, 5.0, 0.0, 1.0)
            .await;
        fixture
            .insert_detection(frame_token(2), track_token(2), 6.0, 5.0, 0.0, 1.0)
            .await;
        fixture
            .insert_detection(frame_token(0), track_token(3), 9.0, 9.0, 0.0, 0.0)
            .await;
        fixture
    }

    fn assembler(store: LogStore) -> TrajectoryAssembler {
        TrajectoryAssembler::new(store, Arc::new(CategoryMapping::standard()))
    }

    #[tokio::test]
    async fn test_future_waypoints_grouped_by_track() {
        let fixture = traffic_fixture().await;
        let assembler = assembler(fixture.open().await);

        let tracks = BTreeSet::from([track_token(1), track_token(2), track_token(9)]);
        let waypoints = assembler
            .future_waypoints(&tracks, 0, 1_000_000)
            .await
            .unwrap();

        assert_eq!(waypoints.len(), 2);
        let vehicle: Vec<i64> = waypoints[&track_token(1)].iter().map(|w| w.timestamp).collect();
        assert_eq!(vehicle, vec![0, 500_000, 1_000_000]);
        assert_eq!(waypoints[&track_token(2)].len(), 2);
    }

    #[tokio::test]
    async fn test_future_waypoints_rejects_inverted_window() {
        let fixture = traffic_fixture().await;
        let assembler = assembler(fixture.open().await);

        let tracks = BTreeSet::from([track_token(1)]);
        assert!(matches!(
            assembler.future_waypoints(&tracks, 1_000_000, 0).await,
            Err(IndexError::InvalidArgument(_))
        ));
        assert!(matches!(
            assembler.future_waypoints(&BTreeSet::new(), 1_000_000, 0).await,
            Err(IndexError::InvalidArgument(_))
        ));

        // No tracks over a valid window is simply empty
        let empty = assembler
            .future_waypoints(&BTreeSet::new(), 0, 1_000_000)
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_future_trajectory_counts() {
        let fixture = traffic_fixture().await;
        let assembler = assembler(fixture.open().await);

        let vehicle = assembler
            .future_trajectory(&track_token(1), 0, 2.0, 0.25)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vehicle.probability, 1.0);
        assert_eq!(vehicle.waypoints.len(), 8);
        assert_eq!(vehicle.waypoints[1].oriented_box.center.x, 0.5);

        // Single raw detection in range
        let pedestrian = assembler
            .future_trajectory(&track_token(2), 1_000_000, 2.0, 0.5)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pedestrian.waypoints.len(), 1);

        let unknown = assembler
            .future_trajectory(&track_token(9), 0, 2.0, 0.5)
            .await
            .unwrap();
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn test_tracked_objects_for_frame_with_predictions() {
        let fixture = traffic_fixture().await;
        let assembler = assembler(fixture.open().await);
        let sampling = TrajectorySampling::new(None, Some(1.0), Some(0.5)).unwrap();

        let objects = assembler
            .tracked_objects_for_frame(&frame_token(0), Some(&sampling))
            .await
            .unwrap();

        assert_eq!(objects.len(), 3);
        let by_track: BTreeMap<Token, &TrackedObject> =
            objects.iter().map(|o| (o.track_token(), o)).collect();
        assert_eq!(by_track[&track_token(1)].predictions[0].waypoints.len(), 2);
        assert_eq!(by_track[&track_token(2)].predictions[0].waypoints.len(), 2);
        assert!(by_track[&track_token(3)].predictions.is_empty());
        assert_eq!(by_track[&track_token(3)].velocity, None);
    }

    #[tokio::test]
    async fn test_tracked_objects_for_frame_without_sampling() {
        let fixture = traffic_fixture().await;
        let assembler = assembler(fixture.open().await);

        let objects = assembler
            .tracked_objects_for_frame(&frame_token(1), None)
            .await
            .unwrap();
        assert_eq!(objects.len(), 1);
        assert!(objects[0].predictions.is_empty());

        let none = assembler
            .tracked_objects_for_frame(&Token::from(0xdead), None)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_tracked_objects_in_window_ordering_and_filter() {
        let fixture = traffic_fixture().await;
        let assembler = assembler(fixture.open().await);

        let objects = assembler
            .tracked_objects_in_window(0, 500_000, None)
            .await
            .unwrap();
        let keys: Vec<(i64, Token)> = objects
            .iter()
            .map(|o| (o.metadata.timestamp, o.track_token()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (0, track_token(1)),
                (0, track_token(2)),
                (0, track_token(3)),
                (500_000, track_token(1)),
            ]
        );

        let filter = HashSet::from([track_token(2)]);
        let filtered = assembler
            .tracked_objects_in_window(0, 2_500_000, Some(&filter))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 2);

        let nothing = assembler
            .tracked_objects_in_window(0, 2_500_000, Some(&HashSet::new()))
            .await
            .unwrap();
        assert!(nothing.is_empty());

        assert!(assembler.tracked_objects_in_window(10, 0, None).await.is_err());
    }
}
