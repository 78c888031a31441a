//! Public Flow Endpoints
//!
//! 공개 계산기가 처음 로드할 때 받는 카드 흐름과 테마

use axum::{extract::State, Json};
use serde::Serialize;

use crate::{
    db::{CardTemplate, Theme},
    error::ApiError,
    AppState,
};

/// 카드 흐름 응답
#[derive(Debug, Serialize)]
pub struct FlowResponse {
    /// 활성 카드 (display_order 순, 필드/규칙 포함)
    pub cards: Vec<CardTemplate>,
    pub theme: Option<Theme>,
}

/// GET /flow
pub async fn get_flow(State(state): State<AppState>) -> Result<Json<FlowResponse>, ApiError> {
    let cards = state.db.list_cards(true).await?;
    let theme = state.db.active_theme().await?;

    tracing::debug!(cards = cards.len(), "Flow loaded");

    Ok(Json(FlowResponse { cards, theme }))
}

/// GET /theme/active
pub async fn get_active_theme(State(state): State<AppState>) -> Result<Json<Theme>, ApiError> {
    state
        .db
        .active_theme()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Active theme"))
}
