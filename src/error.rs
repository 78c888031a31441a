//! Error Handling Module
//!
//! Provides type-safe error handling with proper HTTP status code mapping.
//! Uses thiserror for domain errors and integrates with tracing for structured logging.
//!
//! completion 엔진의 쓰기 실패는 여기로 오지 않음 (`BestEffort::Dropped`)

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::services::formula::FormulaError;
use crate::services::lead_validation::FieldError;

/// Postgres unique_violation
const PG_UNIQUE_VIOLATION: &str = "23505";

/// API 에러 타입
///
/// # Design Decision
///
/// 각 에러 variant는 적절한 HTTP 상태 코드에 매핑됨
/// - 클라이언트 에러: 4xx (잘못된 요청, 중복, 잘못된 계산식)
/// - 서버 에러: 5xx (내부 오류)
///
/// 민감한 내부 정보는 클라이언트에 노출하지 않음
#[derive(Debug, Error)]
pub enum ApiError {
    // ============ 400 Bad Request ============
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {} field(s)", .0.len())]
    ValidationError(Vec<FieldError>),

    // ============ 404 Not Found ============
    #[error("Resource not found: {0}")]
    NotFound(String),

    // ============ 409 Conflict ============
    #[error("Conflict: {0}")]
    Conflict(String),

    // ============ 422 Unprocessable Entity ============
    #[error("Invalid formula: {0}")]
    InvalidFormula(#[from] FormulaError),

    // ============ 500 Internal Server Error ============
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    InternalError,

    // ============ 503 Service Unavailable ============
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// API 에러 응답 구조
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidFormula(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::DatabaseError(_) | ApiError::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound(resource.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message, details) = match &self {
            // 4xx 클라이언트 에러
            ApiError::BadRequest(msg) => ("BAD_REQUEST", msg.clone(), None),
            ApiError::ValidationError(errors) => (
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                serde_json::to_value(errors).ok(),
            ),
            ApiError::NotFound(resource) => ("NOT_FOUND", format!("{} not found", resource), None),
            ApiError::Conflict(msg) => ("CONFLICT", msg.clone(), None),
            ApiError::InvalidFormula(err) => (
                "INVALID_FORMULA",
                "Invalid formula".to_string(),
                Some(Value::String(err.to_string())),
            ),

            // 5xx 서버 에러
            ApiError::DatabaseError(_) => {
                // 내부 에러는 클라이언트에 상세 정보 노출 안 함
                tracing::error!("Database error: {:?}", self);
                ("DATABASE_ERROR", "Database error occurred".to_string(), None)
            }
            ApiError::InternalError => {
                tracing::error!("Internal error: {:?}", self);
                ("INTERNAL_ERROR", "An internal error occurred".to_string(), None)
            }
            ApiError::ServiceUnavailable(service) => (
                "SERVICE_UNAVAILABLE",
                format!("{} is currently unavailable", service),
                None,
            ),
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// SQLx 에러를 ApiError로 변환
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) {
                tracing::warn!("Unique violation: {}", db_err.message());
                return ApiError::Conflict(
                    db_err
                        .constraint()
                        .map(|c| format!("Duplicate value violates {}", c))
                        .unwrap_or_else(|| "Duplicate value".to_string()),
                );
            }
        }

        tracing::error!("SQLx error: {:?}", err);
        ApiError::DatabaseError(err.to_string())
    }
}

/// anyhow 에러를 ApiError로 변환
///
/// db 레이어는 `anyhow::Result`를 반환하므로 원인이 sqlx 에러면 그대로 매핑
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<sqlx::Error>() {
            Ok(sqlx_err) => sqlx_err.into(),
            Err(err) => {
                tracing::error!("Anyhow error: {:?}", err);
                ApiError::InternalError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_error_lists_fields() {
        let err = ApiError::ValidationError(vec![
            FieldError {
                field: "email",
                message: "Email address is not valid".to_string(),
            },
            FieldError {
                field: "consent",
                message: "Consent is required".to_string(),
            },
        ]);

        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["details"][0]["field"], "email");
        assert_eq!(body["details"][1]["field"], "consent");
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let (status, body) = body_json(ApiError::DatabaseError("password=hunter2".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "DATABASE_ERROR");
        assert!(body.get("details").is_none());
        assert!(!body.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_formula_error_is_unprocessable() {
        let (status, body) = body_json(FormulaError::DivisionByZero.into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "INVALID_FORMULA");
        assert_eq!(body["details"], "Division by zero");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::not_found("Card").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::ServiceUnavailable("db".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_anyhow_downcasts_sqlx() {
        let err: ApiError = anyhow::Error::from(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, ApiError::DatabaseError(_)));

        let err: ApiError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, ApiError::InternalError));
    }
}
