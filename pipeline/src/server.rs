//! HTTP surface for the pipeline service
//!
//! Thin plumbing over the core pipeline: launch a run, list runs, fetch a
//! run's report. Handlers hold no mutable state; each run is an isolated
//! pipeline instance and the store serializes writes per run.

use std::net::SocketAddr;
use std::process::Command;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::analyzer::{Analyzer, RunReport};
use crate::collector::run_producer_and_collect;
use crate::config::PipelineConfig;
use crate::emulator::Profile;
use crate::error::{AnalysisError, CollectError, StorageError};
use crate::storage::{RunMeta, RunSummary, Storage};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PipelineConfig>,
    pub storage: Storage,
    pub analyzer: Analyzer,
}

impl AppState {
    pub fn new(config: PipelineConfig) -> Self {
        let storage = Storage::new(&config.storage.db_path);
        let analyzer = Analyzer::new(&config);
        Self {
            config: Arc::new(config),
            storage,
            analyzer,
        }
    }
}

/// API-level errors with their HTTP mappings. "Run not found" and "run has
/// no samples" are deliberately distinct statuses.
#[derive(Debug)]
pub enum ApiError {
    InvalidRequest(String),
    RunNotFound(String),
    NoSamples(String),
    EmulatorFailed(i32),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidRequest(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::RunNotFound(run_id) => {
                (StatusCode::NOT_FOUND, format!("Run not found: {run_id}"))
            }
            ApiError::NoSamples(run_id) => {
                (StatusCode::CONFLICT, format!("Run has no samples: {run_id}"))
            }
            ApiError::EmulatorFailed(code) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Emulator failed with exit_code={code}"),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        error!(error = %e, "storage failure");
        ApiError::Internal(format!("Storage error: {e}"))
    }
}

impl From<CollectError> for ApiError {
    fn from(e: CollectError) -> Self {
        error!(error = %e, "collection failure");
        ApiError::Internal(format!("Collection error: {e}"))
    }
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(default = "default_profile")]
    pub profile: Profile,
    pub duration_sec: Option<u64>,
    pub hz: Option<u32>,
}

fn default_profile() -> Profile {
    Profile::Baseline
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub run_id: String,
    pub created_at: String,
    pub profile: Profile,
    pub samples: usize,
    pub parse_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub run_id: String,
    #[serde(flatten)]
    pub report: RunReport,
}

/// Build the versioned API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/runs", post(create_run).get(list_runs))
        .route("/v1/runs/:run_id/report", get(run_report))
        .with_state(state)
}

/// Bind and serve until shutdown
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server.bind_address, state.config.server.port
    )
    .parse()?;

    let app = router(state);
    info!("listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "db_path": state.config.storage.db_path.display().to_string(),
        "emu_default_duration_sec": state.config.emulator.duration_sec,
        "emu_default_hz": state.config.emulator.hz,
    }))
}

async fn create_run(
    State(state): State<AppState>,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let duration_sec = req.duration_sec.unwrap_or(state.config.emulator.duration_sec);
    let hz = req.hz.unwrap_or(state.config.emulator.hz);
    let seed = state.config.emulator.seed;

    if !(5..=300).contains(&duration_sec) {
        return Err(ApiError::InvalidRequest(format!(
            "duration_sec must be in [5, 300], got {duration_sec}"
        )));
    }
    if !(1..=200).contains(&hz) {
        return Err(ApiError::InvalidRequest(format!(
            "hz must be in [1, 200], got {hz}"
        )));
    }

    let run_id = Uuid::new_v4().to_string();
    let created_at = Utc::now().to_rfc3339();
    let meta = RunMeta {
        profile: req.profile,
        duration_sec,
        hz,
        seed,
    };

    info!(%run_id, profile = %req.profile, duration_sec, hz, "starting run");

    let cmd = emulator_command(req.profile, duration_sec, hz, seed)?;
    let storage = state.storage.clone();
    let run_id_for_task = run_id.clone();
    let created_at_for_task = created_at.clone();

    // The producer blocks until its duration elapses; keep it off the
    // async workers.
    let result = tokio::task::spawn_blocking(move || {
        let collected = run_producer_and_collect(cmd)?;
        if collected.exit_code != 0 {
            return Ok::<_, ApiError>(Err(collected.exit_code));
        }

        storage.insert_run(&run_id_for_task, &created_at_for_task, &meta)?;
        storage.insert_samples(&run_id_for_task, &collected.samples)?;
        Ok(Ok((collected.samples.len(), collected.parse_failures)))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Run task failed: {e}")))??;

    let (samples, parse_failures) = result.map_err(ApiError::EmulatorFailed)?;

    Ok(Json(RunResponse {
        run_id,
        created_at,
        profile: req.profile,
        samples,
        parse_failures,
    }))
}

async fn list_runs(State(state): State<AppState>) -> Result<Json<Vec<RunSummary>>, ApiError> {
    Ok(Json(state.storage.list_runs()?))
}

async fn run_report(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<ReportResponse>, ApiError> {
    if state.storage.get_run(&run_id)?.is_none() {
        return Err(ApiError::RunNotFound(run_id));
    }

    let samples = state.storage.get_samples(&run_id)?;
    let report = state.analyzer.build_report(&samples).map_err(|e| match e {
        AnalysisError::EmptyRun => ApiError::NoSamples(run_id.clone()),
    })?;

    Ok(Json(ReportResponse { run_id, report }))
}

/// Command line for the telemetry producer: this same binary, in
/// `emulate` mode.
fn emulator_command(
    profile: Profile,
    duration_sec: u64,
    hz: u32,
    seed: u64,
) -> Result<Command, ApiError> {
    let exe = std::env::current_exe()
        .map_err(|e| ApiError::Internal(format!("Cannot locate daemon binary: {e}")))?;

    let mut cmd = Command::new(exe);
    cmd.arg("emulate")
        .arg("--profile")
        .arg(profile.as_str())
        .arg("--duration-sec")
        .arg(duration_sec.to_string())
        .arg("--hz")
        .arg(hz.to_string())
        .arg("--seed")
        .arg(seed.to_string());
    Ok(cmd)
}
