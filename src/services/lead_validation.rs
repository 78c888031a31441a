//! Lead Intake Validation
//!
//! 공개 계산기의 마지막 submit 카드에서 들어오는 요청 검증
//!
//! 첫 실패에서 멈추지 않고 모든 실패 필드를 모아서 반환

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::calculator::{PropertyInput, SavingsResult};
use crate::db::NewLead;
use crate::types::SessionId;

pub const MIN_SQUARE_METERS: f64 = 10.0;
pub const MAX_SQUARE_METERS: f64 = 2000.0;
pub const MIN_CEILING_HEIGHT: f64 = 1.8;
pub const MAX_CEILING_HEIGHT: f64 = 6.0;
pub const MIN_RESIDENTS: u32 = 1;
pub const MAX_RESIDENTS: u32 = 20;
pub const MIN_PHONE_DIGITS: usize = 8;
pub const MAX_PHONE_DIGITS: usize = 15;

fn re_email() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex")
    })
}

/// 공개 lead 제출 요청
#[derive(Debug, Clone, Deserialize)]
pub struct LeadSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub property: PropertyInput,
    #[serde(default)]
    pub answers: Option<Value>,
    /// 있으면 submit 카드에 `submit_click` 완료 검사 기록
    pub session_id: Option<String>,
    pub submit_card_id: Option<Uuid>,
    #[serde(default)]
    pub consent: bool,
}

/// 필드 단위 검증 실패
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// 공백, `+`, `-` 제거 후 숫자만 8~15자리
pub fn is_valid_phone(phone: &str) -> bool {
    let stripped: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '+' && *c != '-')
        .collect();
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&stripped.len())
        && stripped.chars().all(|c| c.is_ascii_digit())
}

pub fn is_valid_email(email: &str) -> bool {
    re_email().is_match(email.trim())
}

/// 주택 정보 범위 검사 (계산기 단독 호출에도 사용)
pub fn validate_property(p: &PropertyInput) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if !(MIN_SQUARE_METERS..=MAX_SQUARE_METERS).contains(&p.square_meters) {
        errors.push(FieldError::new(
            "property.square_meters",
            format!("Must be between {} and {}", MIN_SQUARE_METERS, MAX_SQUARE_METERS),
        ));
    }
    if !(MIN_CEILING_HEIGHT..=MAX_CEILING_HEIGHT).contains(&p.ceiling_height) {
        errors.push(FieldError::new(
            "property.ceiling_height",
            format!("Must be between {} and {}", MIN_CEILING_HEIGHT, MAX_CEILING_HEIGHT),
        ));
    }
    if !(MIN_RESIDENTS..=MAX_RESIDENTS).contains(&p.residents) {
        errors.push(FieldError::new(
            "property.residents",
            format!("Must be between {} and {}", MIN_RESIDENTS, MAX_RESIDENTS),
        ));
    }
    errors
}

impl LeadSubmission {
    /// 모든 규칙 검사, 실패 목록 반환
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "Name is required"));
        }
        if !is_valid_email(&self.email) {
            errors.push(FieldError::new("email", "Email address is not valid"));
        }
        if !is_valid_phone(&self.phone) {
            errors.push(FieldError::new(
                "phone",
                format!(
                    "Phone number must contain {}-{} digits",
                    MIN_PHONE_DIGITS, MAX_PHONE_DIGITS
                ),
            ));
        }
        if !self.consent {
            errors.push(FieldError::new("consent", "Consent is required"));
        }

        errors.extend(validate_property(&self.property));

        if let Some(raw) = &self.session_id {
            if let Err(e) = SessionId::new(raw) {
                errors.push(FieldError::new("session_id", e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// 검증을 통과한 요청 + 계산 결과 → 저장용 row
    pub fn into_new_lead(self, calculation: &SavingsResult) -> NewLead {
        NewLead {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.filter(|a| !a.trim().is_empty()),
            postal_code: self.postal_code.filter(|p| !p.trim().is_empty()),
            property: serde_json::to_value(&self.property).unwrap_or_else(|_| json!({})),
            calculation: serde_json::to_value(calculation).unwrap_or_else(|_| json!({})),
            answers: self.answers.unwrap_or_else(|| json!({})),
            session_id: self.session_id,
            consent: self.consent,
        }
    }
}
