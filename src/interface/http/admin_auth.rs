use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::{domain::errors::DomainError, interface::http::problem::ApiProblem, state::AppState};

#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    #[serde(default)]
    password: Option<String>,
}

/// Gates admin routes on the shared `?password=` secret.
pub async fn require_admin(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
    request: Request,
    next: Next,
) -> Response {
    let provided = query.password.unwrap_or_default();
    if !password_matches(&provided, &state.admin_password) {
        warn!(path = %request.uri().path(), "rejected admin request");
        return ApiProblem::from_domain(DomainError::unauthorized(
            "admin password is missing or incorrect",
        ))
        .into_response();
    }

    next.run(request).await
}

fn password_matches(provided: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_whole_secret() {
        assert!(password_matches("admin123", "admin123"));
        assert!(!password_matches("admin12", "admin123"));
        assert!(!password_matches("", "admin123"));
        assert!(!password_matches("", ""));
    }
}
