//! Lead Endpoints
//!
//! 공개 계산기의 lead 제출과 관리자 lead 조회

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::parse_session;
use super::Pagination;
use crate::{
    db::Lead,
    error::ApiError,
    services::{calculate_heat_pump_savings, CardCheck, LeadSubmission, SavingsResult},
    types::BestEffort,
    AppState,
};

/// submit 카드 완료 trigger
pub const TRIGGER_SUBMIT_CLICK: &str = "submit_click";

// ============ Request/Response Types ============

/// lead 제출 응답
#[derive(Debug, Serialize)]
pub struct SubmitLeadResponse {
    pub lead_id: Uuid,
    pub calculation: SavingsResult,
    /// submit 카드 완료 검사 결과 (세션 없으면 생략)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_card: Option<BestEffort<CardCheck>>,
}

/// 목록 쿼리 파라미터
#[derive(Debug, Deserialize)]
pub struct LeadListQuery {
    /// 페이지 (0부터 시작)
    pub page: Option<u32>,
    /// 페이지 크기 (기본 20, 최대 100)
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct LeadListResponse {
    pub leads: Vec<Lead>,
    pub pagination: Pagination,
}

// ============ Handlers ============

/// POST /leads
///
/// # Flow
///
/// 1. 모든 필드 검증 (실패 시 400 + 실패 필드 목록)
/// 2. 절감액 계산
/// 3. lead + 계산 결과 저장
/// 4. 세션과 submit 카드가 있으면 `submit_click` 완료 검사
pub async fn submit_lead(
    State(state): State<AppState>,
    Json(req): Json<LeadSubmission>,
) -> Result<Json<SubmitLeadResponse>, ApiError> {
    req.validate().map_err(ApiError::ValidationError)?;

    let calculation = calculate_heat_pump_savings(&req.property);
    let submit_target = match (&req.session_id, req.submit_card_id) {
        (Some(session), Some(card_id)) => Some((parse_session(session)?, card_id)),
        _ => None,
    };

    let lead = state.db.insert_lead(&req.into_new_lead(&calculation)).await?;
    tracing::info!(lead = %lead.id, annual_savings = calculation.annual_savings, "Lead stored");

    let submit_card = match submit_target {
        Some((session_id, card_id)) => Some(
            state
                .engine
                .check_card_completion(card_id, &session_id, TRIGGER_SUBMIT_CLICK)
                .await,
        ),
        None => None,
    };

    Ok(Json(SubmitLeadResponse {
        lead_id: lead.id,
        calculation,
        submit_card,
    }))
}

/// GET /admin/leads
///
/// 최신순 페이지네이션
pub async fn list_leads(
    State(state): State<AppState>,
    Query(query): Query<LeadListQuery>,
) -> Result<Json<LeadListResponse>, ApiError> {
    let page = query.page.unwrap_or(0);
    let limit = query.limit.unwrap_or(20).clamp(1, 100); // 최대 100개

    let (leads, total) = state.db.list_leads(page, limit).await?;

    Ok(Json(LeadListResponse {
        leads,
        pagination: Pagination::new(page, limit, total),
    }))
}

/// GET /admin/leads/:id
pub async fn get_lead(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
) -> Result<Json<Lead>, ApiError> {
    state
        .db
        .get_lead(lead_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Lead"))
}
