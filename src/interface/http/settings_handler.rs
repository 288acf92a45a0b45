use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    application::dto::{
        AddCategoryRequest, AddSiteRequest, CategoryListResponse, CategoryResponse,
        DeleteCategoryResponse, DeleteSiteResponse, EditCategoryRequest, EditSiteRequest,
        EngineReplacedResponse, ImportEngineRequest, SiteListResponse, SiteResponse,
        ToggleSiteResponse, UserDataResponse, UserIdQuery,
    },
    interface::http::problem::{ApiProblem, ApiResult},
    state::AppState,
};

pub async fn user_data(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserDataResponse>> {
    let exported = state.preferences.user_data(&user_id).await?;
    Ok(Json(exported))
}

pub async fn import_engine(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<ImportEngineRequest>, JsonRejection>,
) -> ApiResult<Json<EngineReplacedResponse>> {
    let Json(request) = payload.map_err(ApiProblem::from_json_rejection)?;
    let imported = state.preferences.import_engine(&user_id, request).await?;
    Ok(Json(imported))
}

pub async fn reset_to_default(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<EngineReplacedResponse>> {
    let reset = state.preferences.reset_to_default(&user_id).await?;
    Ok(Json(reset))
}

pub async fn list_categories(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<CategoryListResponse>> {
    let categories = state.preferences.list_categories(&user_id).await?;
    Ok(Json(categories))
}

pub async fn add_category(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<AddCategoryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CategoryResponse>)> {
    let Json(request) = payload.map_err(ApiProblem::from_json_rejection)?;
    let added = state.preferences.add_category(&user_id, request).await?;
    Ok((StatusCode::CREATED, Json(added)))
}

pub async fn edit_category(
    State(state): State<AppState>,
    Path((user_id, category_name)): Path<(String, String)>,
    payload: Result<Json<EditCategoryRequest>, JsonRejection>,
) -> ApiResult<Json<CategoryResponse>> {
    let Json(request) = payload.map_err(ApiProblem::from_json_rejection)?;
    let edited = state
        .preferences
        .edit_category(&user_id, &category_name, request)
        .await?;
    Ok(Json(edited))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path((user_id, category_name)): Path<(String, String)>,
) -> ApiResult<Json<DeleteCategoryResponse>> {
    let deleted = state
        .preferences
        .delete_category(&user_id, &category_name)
        .await?;
    Ok(Json(deleted))
}

pub async fn list_sites(
    State(state): State<AppState>,
    Path((user_id, category_name)): Path<(String, String)>,
) -> ApiResult<Json<SiteListResponse>> {
    let sites = state
        .preferences
        .list_sites(&user_id, &category_name)
        .await?;
    Ok(Json(sites))
}

pub async fn add_site(
    State(state): State<AppState>,
    Path((user_id, category_name)): Path<(String, String)>,
    payload: Result<Json<AddSiteRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SiteResponse>)> {
    let Json(request) = payload.map_err(ApiProblem::from_json_rejection)?;
    let added = state
        .preferences
        .add_site(&user_id, &category_name, request)
        .await?;
    Ok((StatusCode::CREATED, Json(added)))
}

pub async fn edit_site(
    State(state): State<AppState>,
    Path((user_id, category_name, site_name)): Path<(String, String, String)>,
    payload: Result<Json<EditSiteRequest>, JsonRejection>,
) -> ApiResult<Json<SiteResponse>> {
    let Json(request) = payload.map_err(ApiProblem::from_json_rejection)?;
    let edited = state
        .preferences
        .edit_site(&user_id, &category_name, &site_name, request)
        .await?;
    Ok(Json(edited))
}

pub async fn delete_site(
    State(state): State<AppState>,
    Path((user_id, category_name, site_name)): Path<(String, String, String)>,
) -> ApiResult<Json<DeleteSiteResponse>> {
    let deleted = state
        .preferences
        .delete_site(&user_id, &category_name, &site_name)
        .await?;
    Ok(Json(deleted))
}

pub async fn toggle_site(
    State(state): State<AppState>,
    Path((user_id, category_name, site_name)): Path<(String, String, String)>,
) -> ApiResult<Json<ToggleSiteResponse>> {
    let toggled = state
        .preferences
        .toggle_site(&user_id, &category_name, &site_name)
        .await?;
    Ok(Json(toggled))
}

/// Bare array of category names for the search bar.
pub async fn catalogue_names(
    State(state): State<AppState>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let user_id = query.require()?;
    let names = state.preferences.catalogue_names(&user_id).await?;
    Ok(Json(names))
}
