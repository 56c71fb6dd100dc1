use anyhow::{Context, Result};
use log_index::{Config, LogIndex, ScenarioFilters, ScenarioMapping, TrajectorySampling};
use serde::Serialize;
use std::io::Write;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// One output line per scenario
#[derive(Serialize)]
struct ScenarioLine<'a> {
    log_name: &'a str,
    token: String,
    timestamp: i64,
    map_name: Option<&'a str>,
    scenario_type: &'a str,
    frames: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        log_path = %config.database.log_path,
        "Starting log index"
    );

    // Initialize metrics
    if let Some(port) = config.service.metrics_port {
        init_metrics(port)?;
    }

    let filters = ScenarioFilters::try_from(&config.scenarios)
        .context("Invalid scenario filters")?;
    let mapping = ScenarioMapping::try_from(&config.scenarios.extraction)
        .context("Invalid scenario extraction settings")?;
    let sampling = if config.trajectory.is_set() {
        Some(
            TrajectorySampling::try_from(&config.trajectory)
                .context("Invalid trajectory sampling")?,
        )
    } else {
        None
    };

    let index = LogIndex::open(&config.database)
        .await
        .context("Failed to open log file")?;

    let count = index.count().await?;
    match index.time_bounds().await? {
        Some((first, last)) => info!(
            log_name = index.log_name(),
            frames = count,
            first_ts = first,
            last_ts = last,
            duration_s = (last - first) as f64 / 1e6,
            "Log opened"
        ),
        None => warn!(log_name = index.log_name(), "Log has no frames"),
    }

    let seeds = index
        .valid_scenario_seeds(&filters)
        .await
        .context("Failed to enumerate scenario seeds")?;
    info!(seeds = seeds.len(), "Enumerated scenario seeds");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut agents = 0usize;
    for seed in &seeds {
        let frames = index.scenario_tokens(seed, &mapping).await?;

        if let Some(sampling) = &sampling {
            let objects = index.tracked_objects_for_frame(&seed.token, Some(sampling)).await?;
            agents += objects.iter().filter(|o| !o.predictions.is_empty()).count();
        }

        let line = ScenarioLine {
            log_name: index.log_name(),
            token: seed.token.to_hex(),
            timestamp: seed.timestamp,
            map_name: seed.map_name.as_deref(),
            scenario_type: seed.scenario_type.as_deref().unwrap_or("unknown"),
            frames: frames.iter().map(|t| t.to_hex()).collect(),
        };
        serde_json::to_writer(&mut out, &line)?;
        writeln!(out)?;
    }

    if sampling.is_some() {
        info!(agents, "Predicted agent trajectories at seed frames");
    }

    index.close().await;
    info!("Log index finished");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}
