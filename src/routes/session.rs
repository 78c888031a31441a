//! Session Endpoints
//!
//! 공개 계산기 세션의 필드 기록 / 카드 완료 / 초기화
//!
//! # Interview Q&A
//!
//! Q: completion 기록이 DB 장애로 실패하면 요청도 실패하는가?
//! A: 아니오
//!    - 엔진은 실패를 로그로 남기고 `null` 을 돌려줌 (200 OK)
//!    - 계산기 흐름을 끊지 않는 것이 우선
//!    - 세션 id / 카드 id 형식 오류만 400

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::CardCompletion,
    error::ApiError,
    services::{CardCheck, FieldChange},
    types::{BestEffort, SessionId},
    AppState,
};

// ============ Request/Response Types ============

/// 새 세션 응답
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: SessionId,
}

/// 필드 값 기록 요청
#[derive(Debug, Deserialize)]
pub struct RecordFieldRequest {
    #[serde(default)]
    pub value: Value,
    /// 기본값: `field_change`
    pub trigger: Option<String>,
}

/// 카드 완료 검사 요청
#[derive(Debug, Deserialize)]
pub struct CompleteCardRequest {
    /// `submit_click`, `auto_render`, `calculation_done`, ...
    pub trigger: String,
}

/// 세션 초기화 응답
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub session_id: SessionId,
    /// 기록 삭제 성공 여부
    pub cleared: bool,
}

/// 진행 현황 응답
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub session_id: SessionId,
    pub completions: BestEffort<Vec<CardCompletion>>,
}

// ============ Handlers ============

/// POST /sessions
///
/// 새 세션 id 발급 (발급 시점에는 기록이 없으므로 그대로 clean)
pub async fn create_session() -> Json<SessionResponse> {
    let session_id = SessionId::generate();
    tracing::debug!(session = %session_id, "Session created");
    Json(SessionResponse { session_id })
}

/// POST /sessions/:session_id/reset
pub async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let session_id = parse_session(&session_id)?;
    let cleared = state.engine.initialize_clean_session(&session_id).await;

    Ok(Json(ResetResponse {
        session_id,
        cleared: cleared.is_recorded(),
    }))
}

/// GET /sessions/:session_id/progress
pub async fn get_progress(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let session_id = parse_session(&session_id)?;
    let completions = state.engine.session_progress(&session_id).await;

    Ok(Json(ProgressResponse {
        session_id,
        completions,
    }))
}

/// POST /sessions/:session_id/cards/:card_id/fields/:field_name
///
/// 필드 값 기록 → 카드 완료 검사 → (완료 시) 다음 카드 공개
pub async fn record_field(
    State(state): State<AppState>,
    Path((session_id, card_id, field_name)): Path<(String, Uuid, String)>,
    Json(req): Json<RecordFieldRequest>,
) -> Result<Json<FieldChange>, ApiError> {
    let session_id = parse_session(&session_id)?;
    if field_name.trim().is_empty() {
        return Err(ApiError::BadRequest("Field name is required".to_string()));
    }

    let change = state
        .engine
        .record_field_change(card_id, &field_name, &session_id, &req.value, req.trigger.as_deref())
        .await;

    Ok(Json(change))
}

/// POST /sessions/:session_id/cards/:card_id/complete
///
/// 필드 없이 완료되는 카드 (info/visual/calculation) 와 submit 클릭용
pub async fn complete_card(
    State(state): State<AppState>,
    Path((session_id, card_id)): Path<(String, Uuid)>,
    Json(req): Json<CompleteCardRequest>,
) -> Result<Json<BestEffort<CardCheck>>, ApiError> {
    let session_id = parse_session(&session_id)?;
    if req.trigger.trim().is_empty() {
        return Err(ApiError::BadRequest("Trigger is required".to_string()));
    }

    let check = state
        .engine
        .check_card_completion(card_id, &session_id, req.trigger.trim())
        .await;

    Ok(Json(check))
}

// ============ Helpers ============

pub(crate) fn parse_session(raw: &str) -> Result<SessionId, ApiError> {
    SessionId::new(raw).map_err(ApiError::BadRequest)
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{app, post_json, send};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_session_mints_id() {
        let (status, body) = send(app(), post_json("/sessions", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body["session_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_session_id_is_rejected() {
        let uri = format!(
            "/sessions/{}/cards/{}/fields/email",
            "bad%20id",
            uuid::Uuid::new_v4()
        );
        let (status, body) = send(app(), post_json(&uri, json!({"value": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_store_outage_returns_null_outcomes() {
        let uri = format!("/sessions/sess-1/cards/{}/fields/email", uuid::Uuid::new_v4());
        let (status, body) = send(app(), post_json(&uri, json!({"value": "a@b.no"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["field"].is_null());
        assert!(body["card"].is_null());
    }

    #[tokio::test]
    async fn test_reset_reports_not_cleared_on_outage() {
        let (status, body) = send(app(), post_json("/sessions/sess-1/reset", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], "sess-1");
        assert_eq!(body["cleared"], false);
    }
}
