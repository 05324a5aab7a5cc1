//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use firefly_core::{DerivedView, HealthState, Issue, Snapshot, ViewError, ViewKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_children_handler,
        child_view_handler,
        snapshot_handler,
        statistics_handler,
        diagnostics_handler,
        auth_url_handler,
        refresh_handler,
    ),
    components(
        schemas(
            ChildSummary,
            StatisticsResponse,
            DiagnosticsResponse,
            AuthUrlResponse,
            RefreshAccepted
        )
    ),
    tags(
        (name = "Firefly Cloud Hub API", description = "Derived schoolwork views served from the latest Firefly snapshot.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A child the coordinator is configured to track.
#[derive(Serialize, ToSchema)]
pub struct ChildSummary {
    guid: String,
    name: String,
}

/// Optional query parameters for view projection.
#[derive(Deserialize)]
pub struct ViewQuery {
    /// Projection instant as RFC 3339; defaults to the server's current time.
    at: Option<String>,
}

/// Coordinator health and cycle statistics.
#[derive(Serialize, ToSchema)]
pub struct StatisticsResponse {
    last_update_success: bool,
    snapshot_produced_at: Option<DateTime<Utc>>,
    snapshot_age_seconds: Option<i64>,
    #[schema(value_type = Object)]
    health: HealthState,
    #[schema(value_type = Vec<Object>)]
    open_issues: Vec<Issue>,
    reauth_required: bool,
}

/// Redacted runtime configuration for support diagnostics.
#[derive(Serialize, ToSchema)]
pub struct DiagnosticsResponse {
    firefly_host: String,
    device_id: String,
    secret: String,
    app_id: String,
    user_guid: String,
    children: Vec<ChildSummary>,
    task_lookahead_days: u32,
    scan_interval_minutes: u64,
    show_class_times: bool,
    timezone: String,
    last_update_success: bool,
    open_issue_count: usize,
}

/// The browser URL for pairing a replacement device id with the account.
#[derive(Serialize, ToSchema)]
pub struct AuthUrlResponse {
    auth_url: String,
    device_id: String,
}

/// Acknowledgement that a refresh cycle has been scheduled.
#[derive(Serialize, ToSchema)]
pub struct RefreshAccepted {
    status: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Lists the children the coordinator tracks.
#[utoipa::path(
    get,
    path = "/children",
    responses(
        (status = 200, description = "Configured children", body = Vec<ChildSummary>)
    )
)]
pub async fn list_children_handler(State(app_state): State<Arc<AppState>>) -> Json<Vec<ChildSummary>> {
    let children = app_state
        .coordinator
        .children()
        .iter()
        .map(|c| ChildSummary {
            guid: c.guid.clone(),
            name: c.name.clone(),
        })
        .collect();
    Json(children)
}

/// Projects one derived view for one child from the latest snapshot.
///
/// The optional `at` parameter projects the same snapshot as of a different
/// instant, which is useful for inspecting day boundaries.
#[utoipa::path(
    get,
    path = "/children/{guid}/views/{kind}",
    params(
        ("guid" = String, Path, description = "Child GUID"),
        ("kind" = String, Path, description = "One of: upcoming_tasks, tasks_due_today, overdue_tasks, current_class, next_class, todo"),
        ("at" = Option<String>, Query, description = "Projection instant as RFC 3339")
    ),
    responses(
        (status = 200, description = "The projected view"),
        (status = 400, description = "Unknown view kind or malformed `at` instant"),
        (status = 404, description = "Unknown child"),
        (status = 503, description = "No snapshot has been published yet")
    )
)]
pub async fn child_view_handler(
    State(app_state): State<Arc<AppState>>,
    Path((guid, kind)): Path<(String, String)>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<DerivedView>, (StatusCode, String)> {
    let kind: ViewKind = kind.parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("unknown view kind: {kind}"),
        )
    })?;
    let now = match query.at.as_deref() {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("invalid `at` instant: {e}"),
                )
            })?,
        None => Utc::now(),
    };

    match app_state.coordinator.view(&guid, kind, now) {
        Ok(view) => Ok(Json(view)),
        Err(ViewError::NoDataYet) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "no data has been fetched yet".to_string(),
        )),
        Err(ViewError::UnknownChild(guid)) => {
            Err((StatusCode::NOT_FOUND, format!("unknown child: {guid}")))
        }
    }
}

/// Returns the latest published snapshot in full.
#[utoipa::path(
    get,
    path = "/snapshot",
    responses(
        (status = 200, description = "The latest snapshot"),
        (status = 503, description = "No snapshot has been published yet")
    )
)]
pub async fn snapshot_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Arc<Snapshot>>, (StatusCode, String)> {
    app_state.coordinator.snapshot().map(Json).ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "no data has been fetched yet".to_string(),
    ))
}

/// Returns health-tracker statistics, snapshot staleness, and open issues.
#[utoipa::path(
    get,
    path = "/statistics",
    responses(
        (status = 200, description = "Coordinator statistics", body = StatisticsResponse)
    )
)]
pub async fn statistics_handler(State(app_state): State<Arc<AppState>>) -> Json<StatisticsResponse> {
    let coordinator = &app_state.coordinator;
    let produced_at = coordinator.snapshot().map(|s| s.produced_at);
    Json(StatisticsResponse {
        last_update_success: coordinator.last_update_succeeded(),
        snapshot_produced_at: produced_at,
        snapshot_age_seconds: produced_at.map(|t| (Utc::now() - t).num_seconds()),
        health: coordinator.statistics(),
        open_issues: coordinator.open_issues(),
        reauth_required: coordinator.reauth_required(),
    })
}

/// Returns the runtime configuration with credentials redacted.
#[utoipa::path(
    get,
    path = "/diagnostics",
    responses(
        (status = 200, description = "Redacted configuration", body = DiagnosticsResponse)
    )
)]
pub async fn diagnostics_handler(State(app_state): State<Arc<AppState>>) -> Json<DiagnosticsResponse> {
    let config = &app_state.config;
    Json(DiagnosticsResponse {
        firefly_host: config.firefly_host.clone(),
        device_id: "**REDACTED**".to_string(),
        secret: "**REDACTED**".to_string(),
        app_id: config.app_id.clone(),
        user_guid: "**REDACTED**".to_string(),
        children: config
            .children
            .iter()
            .map(|c| ChildSummary {
                guid: c.guid.clone(),
                name: c.name.clone(),
            })
            .collect(),
        task_lookahead_days: config.task_lookahead_days,
        scan_interval_minutes: config.scan_interval_minutes,
        show_class_times: config.show_class_times,
        timezone: config.timezone.name().to_string(),
        last_update_success: app_state.coordinator.last_update_succeeded(),
        open_issue_count: app_state.coordinator.open_issues().len(),
    })
}

/// Returns a fresh pairing URL for re-authenticating the device.
#[utoipa::path(
    get,
    path = "/auth/url",
    responses(
        (status = 200, description = "Pairing URL and device id", body = AuthUrlResponse)
    )
)]
pub async fn auth_url_handler(State(app_state): State<Arc<AppState>>) -> Json<AuthUrlResponse> {
    let (auth_url, device_id) = app_state.firefly.auth_url();
    Json(AuthUrlResponse {
        auth_url,
        device_id,
    })
}

/// Schedules an immediate refresh cycle.
#[utoipa::path(
    post,
    path = "/refresh",
    responses(
        (status = 202, description = "Refresh scheduled", body = RefreshAccepted)
    )
)]
pub async fn refresh_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("manual refresh requested");
    app_state.coordinator.trigger_manual_refresh();
    (
        StatusCode::ACCEPTED,
        Json(RefreshAccepted {
            status: "refresh scheduled".to_string(),
        }),
    )
}
