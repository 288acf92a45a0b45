//! Request-path activity tracking.
//!
//! Runs as a route layer so matched path parameters are visible. The user id
//! is looked up in the path, then the query string, then a JSON body; the
//! body is buffered and handed back to the handler untouched.

use std::{collections::HashMap, error::Error as StdError};

use axum::{
    body::{Body, to_bytes},
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde::Deserialize;
use tracing::trace;

use crate::{
    application::dto::validate_user_id, domain::errors::DomainError,
    interface::http::problem::ApiProblem, state::AppState,
};

const USER_ID_KEY: &str = "userId";

#[derive(Debug, Deserialize)]
struct UserIdBody {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

pub async fn track_activity(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let mut user_id = user_id_from_path(&mut parts, &state).await;
    if user_id.is_none() {
        user_id = user_id_from_query(&parts);
    }

    let body = if user_id.is_none() && is_json(&parts) {
        let bytes = match to_bytes(body, state.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(err) if exceeded_length_limit(&err) => {
                return ApiProblem::payload_too_large(state.max_body_bytes).into_response();
            }
            Err(err) => {
                return ApiProblem::from_domain(DomainError::validation(format!(
                    "failed to read request body: {err}"
                )))
                .into_response();
            }
        };
        user_id = serde_json::from_slice::<UserIdBody>(&bytes)
            .ok()
            .and_then(|parsed| parsed.user_id);
        Body::from(bytes)
    } else {
        body
    };

    // Ids the handlers would reject are not worth a document.
    if let Some(user_id) = user_id.and_then(|raw| validate_user_id(&raw).ok()) {
        trace!(user_id = %user_id, path = %parts.uri.path(), "tracking activity");
        state.lifecycle.touch(&user_id).await;
    }

    next.run(Request::from_parts(parts, body)).await
}

async fn user_id_from_path(parts: &mut Parts, state: &AppState) -> Option<String> {
    let Path(mut params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
        .await
        .ok()?;
    params.remove(USER_ID_KEY)
}

fn user_id_from_query(parts: &Parts) -> Option<String> {
    let Query(mut params) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri).ok()?;
    params.remove(USER_ID_KEY)
}

fn exceeded_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if current.is::<LengthLimitError>() {
            return true;
        }
        source = current.source();
    }
    false
}

fn is_json(parts: &Parts) -> bool {
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}
