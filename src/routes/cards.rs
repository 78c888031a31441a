//! Card Builder Endpoints
//!
//! 관리자 빌더의 카드/필드 CRUD
//!
//! 카드 규칙은 `rules: { completion, reveal }` 두 축으로만 받음
//! (legacy `reveal_next_conditions` 는 읽기 전용 fallback, 저장 시 비움)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::{CardField, CardInput, CardTemplate, FieldInput},
    error::ApiError,
    AppState,
};

// ============ Request Types ============

#[derive(Debug, Deserialize)]
pub struct CardListQuery {
    /// true면 활성 카드만 (기본 false: 빌더는 전부 봄)
    #[serde(default)]
    pub active_only: bool,
}

/// 드래그앤드롭 순서 저장 요청
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<Uuid>,
}

// ============ Cards ============

/// GET /admin/cards
pub async fn list_cards(
    State(state): State<AppState>,
    Query(query): Query<CardListQuery>,
) -> Result<Json<Vec<CardTemplate>>, ApiError> {
    Ok(Json(state.db.list_cards(query.active_only).await?))
}

/// GET /admin/cards/:id
pub async fn get_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
) -> Result<Json<CardTemplate>, ApiError> {
    state
        .db
        .get_card(card_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Card"))
}

/// POST /admin/cards
pub async fn create_card(
    State(state): State<AppState>,
    Json(input): Json<CardInput>,
) -> Result<(StatusCode, Json<CardTemplate>), ApiError> {
    validate_card(&input)?;

    let card = state.db.create_card(&input).await?;
    tracing::info!(card = %card.id, card_type = %card.card_type, "Card created");

    Ok((StatusCode::CREATED, Json(card)))
}

/// PUT /admin/cards/:id
pub async fn update_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    Json(input): Json<CardInput>,
) -> Result<Json<CardTemplate>, ApiError> {
    validate_card(&input)?;

    state
        .db
        .update_card(card_id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Card"))
}

/// DELETE /admin/cards/:id
///
/// 필드와 completion 기록은 FK cascade 로 함께 삭제
pub async fn delete_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_card(card_id).await? {
        return Err(ApiError::not_found("Card"));
    }
    tracing::info!(card = %card_id, "Card deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /admin/cards/order
pub async fn reorder_cards(
    State(state): State<AppState>,
    Json(req): Json<ReorderRequest>,
) -> Result<StatusCode, ApiError> {
    validate_order(&req.ids)?;
    state.db.reorder_cards(&req.ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ Fields ============

/// POST /admin/cards/:id/fields
pub async fn create_field(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    Json(input): Json<FieldInput>,
) -> Result<(StatusCode, Json<CardField>), ApiError> {
    validate_field(&input)?;

    if state.db.get_card(card_id).await?.is_none() {
        return Err(ApiError::not_found("Card"));
    }

    let field = state.db.create_field(card_id, &input).await?;
    Ok((StatusCode::CREATED, Json(field)))
}

/// PUT /admin/fields/:id
pub async fn update_field(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
    Json(input): Json<FieldInput>,
) -> Result<Json<CardField>, ApiError> {
    validate_field(&input)?;

    state
        .db
        .update_field(field_id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Field"))
}

/// DELETE /admin/fields/:id
pub async fn delete_field(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_field(field_id).await? {
        return Err(ApiError::not_found("Field"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /admin/cards/:id/fields/order
pub async fn reorder_fields(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> Result<StatusCode, ApiError> {
    validate_order(&req.ids)?;
    state.db.reorder_fields(card_id, &req.ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ Helpers ============

fn validate_card(input: &CardInput) -> Result<(), ApiError> {
    if input.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Card title is required".to_string()));
    }
    Ok(())
}

/// 필드 이름은 completion key + 템플릿 경로로 쓰이므로 식별자 형식만 허용
fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_field(input: &FieldInput) -> Result<(), ApiError> {
    if !is_valid_field_name(&input.name) {
        return Err(ApiError::BadRequest(format!(
            "Invalid field name '{}': use letters, digits and underscores",
            input.name
        )));
    }
    if input.field_type.trim().is_empty() {
        return Err(ApiError::BadRequest("Field type is required".to_string()));
    }
    Ok(())
}

fn validate_order(ids: &[Uuid]) -> Result<(), ApiError> {
    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
        return Err(ApiError::BadRequest(format!("Duplicate id in order: {}", dup)));
    }
    Ok(())
}
