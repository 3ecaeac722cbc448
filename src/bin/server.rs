use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use pipe_optimizer::history::{History, HistoryEntry, SolutionSnapshot};
use pipe_optimizer::solver::DEFAULT_TOP_N;
use pipe_optimizer::{InventoryItem, Scale, Solver, input};
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Clone, Default)]
struct AppState {
    history: Arc<Mutex<History>>,
    history_path: Option<PathBuf>,
}

#[derive(Deserialize, Serialize)]
struct SolveRequest {
    target: f64,
    pipes: Vec<InventoryItem>,
    #[serde(default = "default_top_n")]
    top_n: usize,
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

#[derive(Serialize)]
struct SolveResponse {
    desired_length: String,
    solutions: Vec<SolutionSnapshot>,
    nodes_visited: u64,
}

async fn solve(
    State(state): State<AppState>,
    Json(req): Json<SolveRequest>,
) -> Result<Json<SolveResponse>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /solve"
    );

    let scale = Scale::default();
    input::validate_target(scale, req.target)
        .and_then(|_| input::validate_inventory(scale, &req.pipes))
        .and_then(|_| input::validate_top_n(req.top_n))
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let SolveRequest {
        target,
        pipes,
        top_n,
    } = req;

    // Each request searches its own copy of the inventory
    let (pipes, result) = tokio::task::spawn_blocking(move || {
        let solver = Solver::new(target, pipes).with_top_n(top_n).with_scale(scale);
        let result = solver.solve();
        (solver.inventory().to_vec(), result)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let entry = HistoryEntry::new(scale, target, &pipes, &result);
    record_history(&state, entry).await;

    Ok(Json(SolveResponse {
        desired_length: scale.format_real(target),
        solutions: SolutionSnapshot::from_result(&result),
        nodes_visited: result.stats().nodes_visited,
    }))
}

async fn record_history(state: &AppState, entry: HistoryEntry) {
    let snapshot = {
        let Ok(mut history) = state.history.lock() else {
            tracing::error!("history lock poisoned, entry dropped");
            return;
        };
        history.record(entry);
        state.history_path.as_ref().map(|_| history.clone())
    };

    if let (Some(path), Some(snapshot)) = (state.history_path.clone(), snapshot)
        && let Err(e) = persist_history(path, snapshot).await
    {
        tracing::error!(error = %e, "failed to persist history");
    }
}

/// Writes a snapshot off the async runtime, after the lock is released.
async fn persist_history(path: PathBuf, history: History) -> Result<(), String> {
    tokio::task::spawn_blocking(move || history.save(&path))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

async fn get_history(State(state): State<AppState>) -> Result<Json<History>, StatusCode> {
    let history = state
        .history
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(history.clone()))
}

async fn clear_history(State(state): State<AppState>) -> Result<StatusCode, (StatusCode, String)> {
    {
        let mut history = state
            .history
            .lock()
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        history.clear();
    }
    if let Some(path) = state.history_path.clone() {
        persist_history(path, History::new())
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?;
    }
    Ok(StatusCode::NO_CONTENT)
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/solve", post(solve))
        .route("/history", get(get_history).delete(clear_history))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[tokio::main]
async fn main() {
    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: std::env::var("SENTRY_DSN").ok().and_then(|dsn| dsn.parse().ok()),
        release: sentry::release_name!(),
        ..Default::default()
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let history_path = std::env::var("HISTORY_PATH").ok().map(PathBuf::from);
    let history = match &history_path {
        Some(path) => History::load(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "starting with empty history");
            History::new()
        }),
        None => History::new(),
    };
    let state = AppState {
        history: Arc::new(Mutex::new(history)),
        history_path,
    };

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app(state)).await.unwrap();
}
