//! Log files built on disk for tests.

use crate::store::LogStore;
use crate::token::Token;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Executor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCHEMA: &str = r#"
CREATE TABLE log (
    token BLOB PRIMARY KEY,
    vehicle_name TEXT,
    date TEXT,
    timestamp INTEGER,
    logfile TEXT,
    location TEXT,
    map_version TEXT
);
CREATE TABLE lidar (
    token BLOB PRIMARY KEY,
    log_token BLOB NOT NULL,
    channel TEXT,
    model TEXT,
    translation BLOB,
    rotation BLOB
);
CREATE TABLE ego_pose (
    token BLOB PRIMARY KEY,
    timestamp INTEGER,
    x REAL,
    y REAL,
    z REAL,
    qw REAL,
    qx REAL,
    qy REAL,
    qz REAL,
    vx REAL,
    vy REAL,
    vz REAL,
    acceleration_x REAL,
    acceleration_y REAL,
    acceleration_z REAL,
    angular_rate_x REAL,
    angular_rate_y REAL,
    angular_rate_z REAL,
    epsg INTEGER,
    log_token BLOB
);
CREATE TABLE scene (
    token BLOB PRIMARY KEY,
    log_token BLOB,
    name TEXT,
    goal_ego_pose_token BLOB,
    roadblock_ids TEXT
);
CREATE TABLE lidar_pc (
    token BLOB PRIMARY KEY,
    next_token BLOB,
    prev_token BLOB,
    ego_pose_token BLOB,
    lidar_token BLOB,
    scene_token BLOB,
    filename TEXT,
    timestamp INTEGER
);
CREATE TABLE category (
    token BLOB PRIMARY KEY,
    name TEXT,
    description TEXT
);
CREATE TABLE track (
    token BLOB PRIMARY KEY,
    category_token BLOB,
    width REAL,
    length REAL,
    height REAL
);
CREATE TABLE lidar_box (
    token BLOB PRIMARY KEY,
    lidar_pc_token BLOB,
    track_token BLOB,
    next_token BLOB,
    prev_token BLOB,
    x REAL,
    y REAL,
    z REAL,
    width REAL,
    length REAL,
    height REAL,
    vx REAL,
    vy REAL,
    vz REAL,
    yaw REAL,
    confidence REAL
);
CREATE TABLE scenario_tag (
    token BLOB PRIMARY KEY,
    lidar_pc_token BLOB,
    type TEXT,
    agent_track_token BLOB
);
CREATE TABLE traffic_light_status (
    token BLOB PRIMARY KEY,
    lidar_pc_token BLOB,
    lane_connector_id INTEGER,
    status TEXT
);
"#;

pub(crate) const LOG_TOKEN: Token = Token::new([0xaa, 0, 0, 0, 0, 0, 0, 1]);
pub(crate) const LIDAR_TOKEN: Token = Token::new([0xbb, 0, 0, 0, 0, 0, 0, 1]);
pub(crate) const MAP_NAME: &str = "us-nv-las-vegas-strip";

pub(crate) fn frame_token(i: u64) -> Token {
    Token::from(0x1000 + i)
}

pub(crate) fn pose_token(i: u64) -> Token {
    Token::from(0x2000 + i)
}

pub(crate) fn scene_token(i: u64) -> Token {
    Token::from(0x3000 + i)
}

pub(crate) fn track_token(i: u64) -> Token {
    Token::from(0x4000 + i)
}

/// Float sequence stored the way recorded logs store lidar extrinsics
pub(crate) fn pickled(values: &[f64]) -> Vec<u8> {
    serde_pickle::to_vec(&values, serde_pickle::SerOptions::new()).expect("pickle floats")
}

/// A writable log file in a temporary directory
pub(crate) struct FixtureLog {
    _dir: TempDir,
    path: PathBuf,
    writer: SqlitePool,
    next_row: std::sync::atomic::AtomicU64,
}

impl FixtureLog {
    /// Schema plus a single log and lidar row
    pub(crate) async fn empty() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("fixture.db");

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete);
        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("fixture writer");

        writer.execute(SCHEMA).await.expect("fixture schema");

        let fixture = Self {
            _dir: dir,
            path,
            writer,
            next_row: std::sync::atomic::AtomicU64::new(0x5000),
        };

        sqlx::query("INSERT INTO log (token, vehicle_name, map_version) VALUES (?, ?, ?)")
            .bind(LOG_TOKEN.as_bytes())
            .bind("veh-35")
            .bind(MAP_NAME)
            .execute(&fixture.writer)
            .await
            .expect("fixture log");

        let translation = pickled(&[1.5, 0.0, 1.8]);
        let rotation = pickled(&[1.0, 0.0, 0.0, 0.0]);
        sqlx::query(
            "INSERT INTO lidar (token, log_token, channel, model, translation, rotation) \
             VALUES (?, ?, 'MergedPointCloud', 'merged', ?, ?)",
        )
        .bind(LIDAR_TOKEN.as_bytes())
        .bind(LOG_TOKEN.as_bytes())
        .bind(translation)
        .bind(rotation)
        .execute(&fixture.writer)
        .await
        .expect("fixture lidar");

        fixture
    }

    /// One scene holding `n` frames at timestamps `0..n`, each with a pose at
    /// `(i, 2i)` moving at 1 m/s along x
    pub(crate) async fn sequential(n: u64) -> Self {
        let fixture = Self::empty().await;
        fixture.insert_scene(scene_token(0), "scene-000", None).await;
        for i in 0..n {
            fixture.insert_pose(pose_token(i), i as i64, i as f64, 2.0 * i as f64).await;
            fixture
                .insert_frame(frame_token(i), i as i64, scene_token(0), Some(pose_token(i)))
                .await;
        }
        fixture
    }

    /// `num_scenes` scenes of `frames_per_scene` frames each, one frame per
    /// second. Scenes are inserted in reverse name order so that name order and
    /// insertion order disagree.
    pub(crate) async fn with_scenes(num_scenes: u64, frames_per_scene: u64) -> Self {
        let fixture = Self::empty().await;
        for s in (0..num_scenes).rev() {
            fixture
                .insert_scene(scene_token(s), &format!("scene-{s:03}"), None)
                .await;
        }
        for s in 0..num_scenes {
            for j in 0..frames_per_scene {
                let i = s * frames_per_scene + j;
                let timestamp = i as i64 * 1_000_000;
                fixture.insert_pose(pose_token(i), timestamp, i as f64, 0.0).await;
                fixture
                    .insert_frame(frame_token(i), timestamp, scene_token(s), Some(pose_token(i)))
                    .await;
            }
        }
        fixture
    }

    /// Fresh token for rows nothing refers to by name
    fn row_token(&self) -> Token {
        Token::from(self.next_row.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) async fn open(&self) -> LogStore {
        LogStore::open_path(&self.path).await.expect("open fixture")
    }

    pub(crate) async fn execute(&self, sql: &str) {
        self.writer.execute(sql).await.expect("fixture statement");
    }

    pub(crate) async fn insert_scene(&self, token: Token, name: &str, goal: Option<Token>) {
        sqlx::query(
            "INSERT INTO scene (token, log_token, name, goal_ego_pose_token, roadblock_ids) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(token.as_bytes())
        .bind(LOG_TOKEN.as_bytes())
        .bind(name)
        .bind(goal.map(|g| g.as_bytes().to_vec()))
        .bind("10231 10232 10240")
        .execute(&self.writer)
        .await
        .expect("fixture scene");
    }

    pub(crate) async fn insert_frame(
        &self,
        token: Token,
        timestamp: i64,
        scene: Token,
        pose: Option<Token>,
    ) {
        sqlx::query(
            "INSERT INTO lidar_pc (token, ego_pose_token, lidar_token, scene_token, filename, timestamp) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(token.as_bytes())
        .bind(pose.map(|p| p.as_bytes().to_vec()))
        .bind(LIDAR_TOKEN.as_bytes())
        .bind(scene.as_bytes())
        .bind(format!("sweeps/{}.pcd", token.to_hex()))
        .bind(timestamp)
        .execute(&self.writer)
        .await
        .expect("fixture frame");
    }

    /// Pose at `(x, y)` facing along x, moving at 1 m/s along x
    pub(crate) async fn insert_pose(&self, token: Token, timestamp: i64, x: f64, y: f64) {
        sqlx::query(
            "INSERT INTO ego_pose (token, timestamp, x, y, z, qw, qx, qy, qz, vx, vy, vz, \
             acceleration_x, acceleration_y, acceleration_z, \
             angular_rate_x, angular_rate_y, angular_rate_z, epsg, log_token) \
             VALUES (?, ?, ?, ?, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, \
             0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 32611, ?)",
        )
        .bind(token.as_bytes())
        .bind(timestamp)
        .bind(x)
        .bind(y)
        .bind(LOG_TOKEN.as_bytes())
        .execute(&self.writer)
        .await
        .expect("fixture pose");
    }

    /// Track of the named category, creating the category row on first use
    pub(crate) async fn insert_track(&self, token: Token, category: &str) {
        sqlx::query(
            "INSERT INTO category (token, name, description) \
             SELECT ?, ?, '' WHERE NOT EXISTS (SELECT 1 FROM category WHERE name = ?)",
        )
        .bind(self.row_token().as_bytes())
        .bind(category)
        .bind(category)
        .execute(&self.writer)
        .await
        .expect("fixture category");

        sqlx::query(
            "INSERT INTO track (token, category_token, width, length, height) \
             SELECT ?, token, 2.0, 4.0, 1.5 FROM category WHERE name = ?",
        )
        .bind(token.as_bytes())
        .bind(category)
        .execute(&self.writer)
        .await
        .expect("fixture track");
    }

    /// Detection of `track` at `frame`, 2 x 4 x 1.5 m box, moving along x
    pub(crate) async fn insert_detection(
        &self,
        frame: Token,
        track: Token,
        x: f64,
        y: f64,
        yaw: f64,
        vx: f64,
    ) {
        sqlx::query(
            "INSERT INTO lidar_box (token, lidar_pc_token, track_token, x, y, z, yaw, \
             width, length, height, vx, vy, vz, confidence) \
             VALUES (?, ?, ?, ?, ?, 0.0, ?, 2.0, 4.0, 1.5, ?, 0.0, 0.0, 1.0)",
        )
        .bind(self.row_token().as_bytes())
        .bind(frame.as_bytes())
        .bind(track.as_bytes())
        .bind(x)
        .bind(y)
        .bind(yaw)
        .bind(vx)
        .execute(&self.writer)
        .await
        .expect("fixture detection");
    }

    pub(crate) async fn insert_tag(&self, frame: Token, scenario_type: &str) {
        sqlx::query("INSERT INTO scenario_tag (token, lidar_pc_token, type) VALUES (?, ?, ?)")
            .bind(self.row_token().as_bytes())
            .bind(frame.as_bytes())
            .bind(scenario_type)
            .execute(&self.writer)
            .await
            .expect("fixture tag");
    }

    pub(crate) async fn insert_traffic_light(&self, frame: Token, lane_connector_id: i64, status: &str) {
        sqlx::query(
            "INSERT INTO traffic_light_status (token, lidar_pc_token, lane_connector_id, status) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(self.row_token().as_bytes())
        .bind(frame.as_bytes())
        .bind(lane_connector_id)
        .bind(status)
        .execute(&self.writer)
        .await
        .expect("fixture traffic light");
    }
}
