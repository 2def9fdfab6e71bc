//! HTTP routes and handlers

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use promptwall_core::{Decision, QueryRequest, QueryResponse, RiskType, Severity};
use promptwall_policy::PolicyRule;
use promptwall_telemetry::{AuditQuery, ChainedRecord, ExportFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::error::AppError;
use crate::security::authorize_admin;
use crate::state::AppState;

/// Build the router. API routes are served both at the root and under `/v1`.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/query", post(query))
        .route("/policy", get(get_policy).put(put_policy))
        .route("/logs", get(logs))
        .route("/health", get(health_check));

    let mut router = Router::new()
        .merge(api.clone())
        .nest("/v1", api)
        .route("/metrics", get(metrics))
        .fallback(fallback)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_bytes))
        .layer(TraceLayer::new_for_http());

    if state.config.cors_allow_any_origin {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub rules: usize,
    pub version: u64,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.store().snapshot();
    Json(HealthResponse {
        status: "ok".to_string(),
        rules: snapshot.len(),
        version: snapshot.version(),
    })
}

async fn metrics(State(state): State<AppState>) -> Response {
    let body = state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

/// Evaluate a prompt and/or response
async fn query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(request) = payload?;
    metrics::counter!("promptwall_requests_total").increment(1);

    let start = Instant::now();
    let response = state.firewall.evaluate(&request)?;
    metrics::histogram!("promptwall_evaluation_latency_us")
        .record(start.elapsed().as_micros() as f64);

    metrics::counter!("promptwall_decisions_total", "decision" => response.decision.as_str())
        .increment(1);
    for risk in &response.risks {
        metrics::counter!("promptwall_risks_total", "type" => risk.risk_type.as_str()).increment(1);
    }

    info!(
        request_id = %response.metadata.request_id,
        decision = %response.decision,
        risks = response.risks.len(),
        "Query evaluated"
    );

    Ok(Json(response))
}

/// Rule list as served to and accepted from the admin console
#[derive(Debug, Serialize, Deserialize)]
pub struct PolicyResponse {
    pub rules: Vec<PolicyRule>,
    pub version: u64,
}

async fn get_policy(State(state): State<AppState>) -> Json<PolicyResponse> {
    let snapshot = state.store().snapshot();
    Json(PolicyResponse {
        rules: snapshot.to_document().rules,
        version: snapshot.version(),
    })
}

/// Body of a policy update. Rules are kept as raw JSON so that a malformed
/// rule can be reported by name.
#[derive(Debug, Deserialize)]
pub struct PolicyUpdate {
    pub rules: Vec<Value>,
}

/// Replace the whole rule set
async fn put_policy(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<PolicyUpdate>, JsonRejection>,
) -> Result<Json<PolicyResponse>, AppError> {
    authorize_admin(&headers, state.admin_token())?;

    let applied = payload
        .map_err(|rejection| {
            if rejection.status() == StatusCode::UNPROCESSABLE_ENTITY {
                AppError::InvalidPolicy(rejection.body_text())
            } else {
                AppError::from(rejection)
            }
        })
        .and_then(|Json(update)| parse_rules(update.rules).map_err(AppError::from))
        .and_then(|rules| state.store().replace(rules).map_err(AppError::from));

    match applied {
        Ok(snapshot) => {
            metrics::counter!("promptwall_policy_updates_total", "result" => "applied").increment(1);
            info!(version = snapshot.version(), rules = snapshot.len(), "Policy updated");
            Ok(Json(PolicyResponse {
                rules: snapshot.to_document().rules,
                version: snapshot.version(),
            }))
        }
        Err(e) => {
            metrics::counter!("promptwall_policy_updates_total", "result" => "rejected").increment(1);
            Err(e)
        }
    }
}

/// Decode each rule on its own, naming the rule (or its `rules[i]`
/// position when it has no name) in the error.
fn parse_rules(values: Vec<Value>) -> promptwall_core::Result<Vec<PolicyRule>> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let name = value
                .get("name")
                .and_then(Value::as_str)
                .filter(|name| !name.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("rules[{}]", index));

            serde_json::from_value::<PolicyRule>(value)
                .map_err(|e| promptwall_core::Error::validation(name, e.to_string()))
        })
        .collect()
}

/// Query parameters of the audit log listing
#[derive(Debug, Default, Deserialize)]
pub struct LogsParams {
    #[serde(rename = "type")]
    pub risk_type: Option<RiskType>,
    pub severity: Option<Severity>,
    pub decision: Option<Decision>,
    pub request_id: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub format: Option<LogsFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogsFormat {
    Json,
    Csv,
}

impl LogsParams {
    fn audit_query(&self) -> AuditQuery {
        AuditQuery {
            risk_type: self.risk_type,
            severity: self.severity,
            decision: self.decision,
            request_id: self.request_id.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// One page of the audit log
#[derive(Debug, Serialize, Deserialize)]
pub struct LogsResponse {
    pub logs: Vec<ChainedRecord>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

/// List persisted audit records, newest first, as JSON or CSV
async fn logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<LogsParams>, QueryRejection>,
) -> Result<Response, AppError> {
    authorize_admin(&headers, state.admin_token())?;
    let Query(params) = params?;

    let audit = state
        .audit
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Audit log is not enabled".to_string()))?;

    // Make records from requests that already completed visible
    if let Err(e) = audit.flush().await {
        warn!(error = %e, "Failed to flush audit log before query");
    }

    // Reading the log scans files on disk
    let reader = audit.reader().clone();
    let query = params.audit_query();
    match params.format.unwrap_or(LogsFormat::Json) {
        LogsFormat::Json => {
            let page = tokio::task::spawn_blocking(move || reader.query(&query)).await??;
            Ok(Json(LogsResponse {
                logs: page.records,
                total: page.total,
                limit: page.limit,
                offset: page.offset,
                has_more: page.has_more,
            })
            .into_response())
        }
        LogsFormat::Csv => {
            let body = tokio::task::spawn_blocking(move || {
                let mut body = Vec::new();
                reader.export(&query, ExportFormat::Csv, &mut body)?;
                Ok::<_, std::io::Error>(body)
            })
            .await??;
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv"),
                    (header::CONTENT_DISPOSITION, "attachment; filename=logs.csv"),
                ],
                body,
            )
                .into_response())
        }
    }
}

async fn fallback() -> AppError {
    AppError::NotFound("Not found".to_string())
}
