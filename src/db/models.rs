//! Database Models
//!
//! Row types for the card builder, session completion tracking,
//! leads and admin-managed content (themes, formulas, shortcodes, email templates).
//! Card templates are normalized into [`CardTemplate`] at this boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::flow_rules::{CardType, FlowRules};

// ============ Card Builder ============

/// `card_templates` 테이블 원본 row (정규화 전)
#[derive(Debug, Clone, FromRow)]
pub struct CardTemplateRow {
    pub id: Uuid,
    pub display_order: i32,
    pub card_type: String,
    pub title: String,
    pub config: Value,
    pub completion_rule: Option<String>,
    pub reveal_timing: Option<Value>,
    /// legacy 단일 필드 규칙
    pub reveal_next_conditions: Option<Value>,
    pub styling: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CardTemplateRow {
    /// legacy/new 규칙 형태를 `FlowRules` 하나로 정규화
    pub fn into_template(self, fields: Vec<CardField>) -> CardTemplate {
        let card_type = self.card_type.parse().unwrap_or_else(|e: String| {
            tracing::warn!(card_id = %self.id, "{}; treating as form", e);
            CardType::Form
        });

        let rules = FlowRules::from_columns(
            self.completion_rule.as_deref(),
            self.reveal_timing.as_ref(),
            self.reveal_next_conditions.as_ref(),
        );

        CardTemplate {
            id: self.id,
            display_order: self.display_order,
            card_type,
            title: self.title,
            config: self.config,
            rules,
            styling: self.styling,
            is_active: self.is_active,
            fields,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// 정규화된 카드 템플릿
#[derive(Debug, Clone, Serialize)]
pub struct CardTemplate {
    pub id: Uuid,
    pub display_order: i32,
    pub card_type: CardType,
    pub title: String,
    pub config: Value,
    pub rules: FlowRules,
    pub styling: Value,
    pub is_active: bool,
    pub fields: Vec<CardField>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 카드에 속한 입력 필드
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CardField {
    pub id: Uuid,
    pub card_id: Uuid,
    pub name: String,
    /// text | email | tel | number | select | radio | checkbox | textarea | range
    pub field_type: String,
    pub label: String,
    pub placeholder: Option<String>,
    pub options: Value,
    /// min / max / min_length / max_length / pattern
    pub validation: Value,
    pub required: bool,
    /// required가 아니어도 카드 완료 판정에는 포함
    pub completion_required: bool,
    pub display_order: i32,
}

impl CardField {
    /// `required_fields` 규칙에서 검사 대상인지
    pub fn counts_for_completion(&self) -> bool {
        self.required || self.completion_required
    }
}

/// 카드 생성/수정 요청
#[derive(Debug, Clone, Deserialize)]
pub struct CardInput {
    pub card_type: CardType,
    pub title: String,
    pub display_order: Option<i32>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub rules: FlowRules,
    #[serde(default)]
    pub styling: Option<Value>,
    pub is_active: Option<bool>,
}

/// 필드 생성/수정 요청
#[derive(Debug, Clone, Deserialize)]
pub struct FieldInput {
    pub name: String,
    pub field_type: String,
    #[serde(default)]
    pub label: String,
    pub placeholder: Option<String>,
    pub options: Option<Value>,
    pub validation: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub completion_required: bool,
    pub display_order: Option<i32>,
}

// ============ Completion Tracking ============

/// (card, field, session) 단위 필드 완료 기록
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct FieldCompletion {
    pub card_id: Uuid,
    pub field_name: String,
    pub session_id: String,
    pub value: Option<Value>,
    pub is_complete: bool,
    pub updated_at: DateTime<Utc>,
}

/// (card, session) 단위 카드 완료 기록
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct CardCompletion {
    pub card_id: Uuid,
    pub session_id: String,
    pub is_complete: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// 진단용 라벨 (field_change, submit_click, ...)
    pub completion_trigger: Option<String>,
}

// ============ Leads ============

/// 저장된 리드
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    /// 계산 입력 (PropertyInput)
    pub property: Value,
    /// 계산 결과 (SavingsResult)
    pub calculation: Value,
    pub answers: Value,
    pub session_id: Option<String>,
    pub consent: bool,
    pub created_at: DateTime<Utc>,
}

/// 리드 insert용
#[derive(Debug, Clone)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub property: Value,
    pub calculation: Value,
    pub answers: Value,
    pub session_id: Option<String>,
    pub consent: bool,
}

// ============ Appearance & Content ============

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Theme {
    pub id: Uuid,
    pub name: String,
    pub colors: Value,
    pub typography: Value,
    pub layout: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThemeInput {
    pub name: String,
    pub colors: Option<Value>,
    pub typography: Option<Value>,
    pub layout: Option<Value>,
}

/// 관리자 정의 계산식 (`[calc:name]`)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Formula {
    pub id: Uuid,
    pub name: String,
    pub expression: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormulaInput {
    pub name: String,
    pub expression: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// PDF shortcode 정의 (`{{code}}`)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PdfShortcode {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    /// render context 경로 (예: `lead.email`, `calc.annual_savings`)
    pub source: String,
    pub default_value: Option<String>,
    /// text | currency | number | percent
    pub format: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortcodeInput {
    pub code: String,
    pub description: Option<String>,
    pub source: String,
    pub default_value: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EmailTemplate {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub body_html: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailTemplateInput {
    pub name: String,
    pub subject: String,
    pub body_html: String,
    pub is_active: Option<bool>,
}
