use axum::{
    Json,
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

use crate::repository::RepoError;
use crate::tasks::JobDispatchError;
use crate::token::TokenError;

/// AppError
///
/// The error taxonomy surfaced at the service and extractor boundary. Every variant maps
/// to exactly one HTTP status and one stable error code in the JSON body.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing, invalid or expired credentials (401 with a Bearer challenge).
    #[error("{0}")]
    Unauthenticated(String),

    /// Valid identity without the privilege or ownership required (403).
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Malformed input payload (422).
    #[error("{0}")]
    Validation(String),

    /// Duplicate unique field such as an email (409).
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    /// Storage, hashing or signing faults. The detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

/// ErrorBody
///
/// Standardized JSON error envelope returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Stable machine-readable code, e.g. `AUTHORIZATION_ERROR`.
    pub code: String,
    #[schema(value_type = Object)]
    pub details: Value,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "AUTHENTICATION_ERROR",
            AppError::Forbidden(_) => "AUTHORIZATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn not_found(entity: &str) -> Self {
        AppError::NotFound(format!("{entity} not found"))
    }

    pub fn not_enough_permissions() -> Self {
        AppError::Forbidden("Not enough permissions".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::Internal(detail) => {
                tracing::error!("internal error: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            success: false,
            message,
            error: ErrorDetail {
                code: self.code().to_string(),
                details: Value::Object(Default::default()),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(detail) => AppError::Internal(detail),
            TokenError::Expired => AppError::Unauthenticated("Token has expired".to_string()),
            TokenError::Malformed | TokenError::WrongType { .. } => {
                AppError::Unauthenticated("Could not validate credentials".to_string())
            }
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::UniqueViolation(field) => {
                AppError::Conflict(format!("A record with this {field} already exists"))
            }
            RepoError::ForeignKeyViolation(detail) => AppError::Validation(detail),
            RepoError::Database(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<JobDispatchError> for AppError {
    fn from(err: JobDispatchError) -> Self {
        AppError::Internal(err.to_string())
    }
}

// Extractor rejections become 422s with the standard envelope instead of axum's plain text.

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unauthenticated_carries_bearer_challenge() {
        let response = AppError::Unauthenticated("Not authenticated".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Not authenticated");
        assert_eq!(body["error"]["code"], "AUTHENTICATION_ERROR");
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let response = AppError::Internal("connection refused on 10.0.0.5".to_string())
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

        let body = body_json(response).await;
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    }

    #[test]
    fn token_errors_map_to_401_except_signing() {
        assert_eq!(
            AppError::from(TokenError::Expired).to_string(),
            "Token has expired"
        );
        assert_eq!(
            AppError::from(TokenError::Malformed).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(TokenError::Signing("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn repository_errors_map_to_statuses() {
        assert_eq!(
            AppError::from(RepoError::UniqueViolation("email")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(RepoError::ForeignKeyViolation("owner".into())).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(RepoError::Database(sqlx::Error::RowNotFound)).code(),
            "INTERNAL_ERROR"
        );
    }
}
