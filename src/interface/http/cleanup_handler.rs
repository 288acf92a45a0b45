use axum::{Json, extract::State};
use tracing::info;

use crate::{
    application::dto::{
        CleanupStatsResponse, CleanupStatus, CleanupStatusResponse, Dashboard,
        DashboardResponse, SchedulerResponse, SweepTriggeredResponse,
    },
    interface::http::problem::ApiResult,
    state::AppState,
};

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<CleanupStatsResponse>> {
    let stats = state.lifecycle.stats().await?;
    Ok(Json(CleanupStatsResponse {
        success: true,
        data: stats,
    }))
}

pub async fn status(State(state): State<AppState>) -> ApiResult<Json<CleanupStatusResponse>> {
    let stats = state.lifecycle.stats().await?;
    Ok(Json(CleanupStatusResponse {
        success: true,
        data: CleanupStatus {
            is_running: stats.is_running,
            inactivity_days: stats.inactivity_days,
            sweep_interval_ms: stats.sweep_interval_ms,
            stats,
        },
    }))
}

/// Runs one sweep now; a storage failure comes back as a problem response.
pub async fn trigger(State(state): State<AppState>) -> ApiResult<Json<SweepTriggeredResponse>> {
    info!("manual sweep requested");
    let report = state.lifecycle.sweep_once().await?;
    Ok(Json(SweepTriggeredResponse {
        success: true,
        message: "Manual cleanup completed successfully",
        data: report,
    }))
}

pub async fn start(State(state): State<AppState>) -> Json<SchedulerResponse> {
    let changed = state.lifecycle.start().await;
    Json(SchedulerResponse {
        success: true,
        message: if changed {
            "Cleanup service started successfully"
        } else {
            "Cleanup service is already running"
        },
        changed,
        is_running: state.lifecycle.is_running(),
    })
}

pub async fn stop(State(state): State<AppState>) -> Json<SchedulerResponse> {
    let changed = state.lifecycle.stop();
    Json(SchedulerResponse {
        success: true,
        message: if changed {
            "Cleanup service stopped successfully"
        } else {
            "Cleanup service is not running"
        },
        changed,
        is_running: state.lifecycle.is_running(),
    })
}

pub async fn dashboard() -> Json<DashboardResponse> {
    Json(DashboardResponse {
        success: true,
        message: "Admin dashboard access granted",
        data: Dashboard {
            dashboard_url: "/admin/dashboard",
            features: [
                "Cleanup Service Management",
                "User Statistics",
                "Database Monitoring",
                "Service Controls",
            ],
        },
    })
}
