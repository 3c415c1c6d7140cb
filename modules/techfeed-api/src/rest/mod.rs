// REST surface: manual job trigger and the monitoring read endpoint.
//
// Trigger contract: bad secret and unknown job fail synchronously; fetch and
// persist outcomes are never reported here — they surface through the
// monitor snapshot and logs only.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::info;

use techfeed_collector::{CollectError, JobParams, COLLECT_JOB, RUN_ID_PARAM};

use crate::auth::constant_time_eq;
use crate::scheduler::trigger_collection;
use crate::AppState;

const SECRET_HEADER: &str = "x-collect-secret";

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub job: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

pub async fn trigger_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TriggerRequest>,
) -> impl IntoResponse {
    let presented = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !constant_time_eq(presented.as_bytes(), state.collect_secret.as_bytes()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "invalid collect secret"})),
        )
            .into_response();
    }

    if req.params.contains_key(RUN_ID_PARAM) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "runId is server-generated and cannot be supplied"})),
        )
            .into_response();
    }

    // The collect job always runs as a full cycle: fetch then persist under
    // one fresh RunId.
    let result = if req.job == COLLECT_JOB {
        trigger_collection(&state.runner)
    } else {
        let run_id = techfeed_common::RunId::allocate();
        let params = JobParams::from_map(req.params).with(RUN_ID_PARAM, run_id.to_string());
        state.runner.submit(&req.job, params).map(|()| run_id)
    };

    match result {
        Ok(run_id) => {
            info!(job = req.job.as_str(), run_id = %run_id, "manual trigger accepted");
            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({"status": "queued", "job": req.job, "runId": run_id})),
            )
                .into_response()
        }
        Err(CollectError::UnknownJob(name)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": format!("unknown job: {name}")})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

pub async fn monitor_latest(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.monitor.latest() {
        Some(snapshot) => Json(serde_json::json!(snapshot)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "no collection run recorded yet"})),
        )
            .into_response(),
    }
}
