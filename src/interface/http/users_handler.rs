use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    application::dto::{
        CategoryNamesResponse, ProfileResponse, RegisterRequest, RegisterResponse, SearchRequest,
        SearchResponse, UserIdQuery,
    },
    interface::http::problem::{ApiProblem, ApiResult},
    state::AppState,
};

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let Json(request) = payload.map_err(ApiProblem::from_json_rejection)?;
    let registered = state.preferences.register(request).await?;

    let status = if registered.is_new_user {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(registered)))
}

pub async fn category_names(
    State(state): State<AppState>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<Json<CategoryNamesResponse>> {
    let user_id = query.require()?;
    let names = state.preferences.category_names(&user_id).await?;
    Ok(Json(names))
}

pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Json(request) = payload.map_err(ApiProblem::from_json_rejection)?;
    let results = state.preferences.search(request).await?;
    Ok(Json(results))
}

pub async fn profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = state.preferences.profile(&user_id).await?;
    Ok(Json(profile))
}
