use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    config::AppConfig,
    interface::http::{
        activity::track_activity,
        admin_auth::require_admin,
        cleanup_handler, monitoring,
        problem::route_not_found,
        settings_handler::{
            add_category, add_site, catalogue_names, delete_category, delete_site, edit_category,
            edit_site, import_engine, list_categories, list_sites, reset_to_default, toggle_site,
            user_data,
        },
        users_handler::{category_names, profile, register, search},
    },
    state::AppState,
};

pub fn build_router(state: AppState, config: &AppConfig) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");
    let state = state.with_max_body_bytes(config.max_body_bytes);

    Router::new()
        .route("/", get(monitoring::banner))
        .route("/health", get(monitoring::healthcheck))
        .nest("/api/user", user_routes(&state))
        .nest("/api/setting", setting_routes(&state))
        .nest("/api/cleanup", cleanup_routes(&state))
        .nest("/api/admin", admin_routes(&state))
        .nest("/api/monitoring", monitoring_routes(&state))
        .fallback(route_not_found)
        .layer(from_fn_with_state(state.clone(), monitoring::record_metrics))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}

fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/category", get(category_names))
        .route("/search", post(search))
        .route("/profile/{userId}", get(profile))
        .route_layer(from_fn_with_state(state.clone(), track_activity))
}

fn setting_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/category", get(catalogue_names))
        .route("/users/{userId}", get(user_data))
        .route("/users/{userId}/engine", put(import_engine))
        .route("/users/{userId}/reset-to-default", post(reset_to_default))
        .route(
            "/users/{userId}/categories",
            get(list_categories).post(add_category),
        )
        .route(
            "/users/{userId}/categories/{catName}",
            patch(edit_category).delete(delete_category),
        )
        .route(
            "/users/{userId}/categories/{catName}/urls",
            get(list_sites).post(add_site),
        )
        .route(
            "/users/{userId}/categories/{catName}/urls/{siteName}",
            patch(edit_site).delete(delete_site),
        )
        .route(
            "/users/{userId}/categories/{catName}/urls/{siteName}/toggle",
            patch(toggle_site),
        )
        .route_layer(from_fn_with_state(state.clone(), track_activity))
}

fn cleanup_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/stats", get(cleanup_handler::stats))
        .route("/status", get(cleanup_handler::status))
        .route("/trigger", post(cleanup_handler::trigger))
        .route("/start", post(cleanup_handler::start))
        .route("/stop", post(cleanup_handler::stop))
        .route_layer(from_fn_with_state(state.clone(), require_admin))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(cleanup_handler::dashboard))
        .route_layer(from_fn_with_state(state.clone(), require_admin))
        .nest("/cleanup", cleanup_routes(state))
}

fn monitoring_routes(state: &AppState) -> Router<AppState> {
    let reset = Router::new()
        .route("/metrics/reset", post(monitoring::reset_metrics))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(monitoring::detailed_health))
        .route("/metrics", get(monitoring::metrics))
        .merge(reset)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_headers(Any).allow_methods([
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(origin = %origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
