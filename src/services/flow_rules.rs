//! Card Flow Rules
//!
//! 카드 하나가 "언제 완료되는가"(completion rule)와
//! "완료 후 다음 카드를 언제 보여주는가"(reveal timing)를 표현하는 타입.
//!
//! # Two shapes on disk
//!
//! ```text
//! new:    completion_rule = "required_fields"
//!         reveal_timing   = {"type": "after_delay", "delay_seconds": 3}
//!
//! legacy: reveal_next_conditions = {"type": "required_complete"}
//! ```
//!
//! 읽을 때 한 번 `FlowRules`로 정규화하고, 쓸 때는 항상 new 형태로 저장.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 카드 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Form,
    Calculation,
    Info,
    Visual,
    Submit,
}

impl CardType {
    /// 입력 필드가 없는 카드 → UI 이벤트(렌더, 계산 완료)로 완료 처리
    pub fn auto_completes(self) -> bool {
        matches!(self, CardType::Info | CardType::Visual | CardType::Calculation)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CardType::Form => "form",
            CardType::Calculation => "calculation",
            CardType::Info => "info",
            CardType::Visual => "visual",
            CardType::Submit => "submit",
        }
    }
}

impl FromStr for CardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "form" => Ok(CardType::Form),
            "calculation" => Ok(CardType::Calculation),
            "info" => Ok(CardType::Info),
            "visual" => Ok(CardType::Visual),
            "submit" => Ok(CardType::Submit),
            other => Err(format!("Unknown card type: {}", other)),
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 카드 완료 규칙
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionRule {
    /// 하나라도 값이 있으면 완료
    #[default]
    AnyField,
    /// required(또는 completion_required) 필드가 모두 채워지면 완료
    RequiredFields,
    /// 모든 필드가 채워지면 완료
    AllFields,
}

impl CompletionRule {
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionRule::AnyField => "any_field",
            CompletionRule::RequiredFields => "required_fields",
            CompletionRule::AllFields => "all_fields",
        }
    }
}

impl FromStr for CompletionRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any_field" => Ok(CompletionRule::AnyField),
            "required_fields" => Ok(CompletionRule::RequiredFields),
            "all_fields" => Ok(CompletionRule::AllFields),
            other => Err(format!("Unknown completion rule: {}", other)),
        }
    }
}

/// 다음 카드 공개 시점
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RevealTiming {
    #[default]
    Immediately,
    AfterDelay {
        #[serde(alias = "delaySeconds", alias = "delay")]
        delay_seconds: u32,
    },
}

impl RevealTiming {
    /// 관리자 UI 입력 범위 (초)
    pub const MIN_DELAY_SECS: u32 = 1;
    pub const MAX_DELAY_SECS: u32 = 60;
    pub const DEFAULT_DELAY_SECS: u32 = 3;

    pub fn after_delay(delay_seconds: u32) -> Self {
        RevealTiming::AfterDelay {
            delay_seconds: delay_seconds.clamp(Self::MIN_DELAY_SECS, Self::MAX_DELAY_SECS),
        }
    }

    /// 범위를 벗어난 저장값 보정
    pub fn clamped(self) -> Self {
        match self {
            RevealTiming::Immediately => RevealTiming::Immediately,
            RevealTiming::AfterDelay { delay_seconds } => Self::after_delay(delay_seconds),
        }
    }

    pub fn delay(&self) -> Option<Duration> {
        match self {
            RevealTiming::Immediately => None,
            RevealTiming::AfterDelay { delay_seconds } => {
                Some(Duration::from_secs(u64::from(*delay_seconds)))
            }
        }
    }
}

/// 정규화된 카드 흐름 규칙 (completion × reveal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowRules {
    pub completion: CompletionRule,
    pub reveal: RevealTiming,
}

impl FlowRules {
    pub fn new(completion: CompletionRule, reveal: RevealTiming) -> Self {
        Self {
            completion,
            reveal: reveal.clamped(),
        }
    }

    /// DB 컬럼 3개로부터 정규화
    ///
    /// 우선순위:
    /// 1. `completion_rule` / `reveal_timing` 중 하나라도 있으면 new 형태
    ///    (빠진 축은 기본값)
    /// 2. 없으면 legacy `reveal_next_conditions`
    /// 3. 둘 다 없으면 (any_field, immediately)
    ///
    /// 해석할 수 없는 값은 더 관대한 기본값으로 대체
    pub fn from_columns(
        completion_rule: Option<&str>,
        reveal_timing: Option<&Value>,
        legacy: Option<&Value>,
    ) -> Self {
        let reveal_timing = reveal_timing.filter(|v| !v.is_null());
        let legacy = legacy.filter(|v| !v.is_null());

        if completion_rule.is_some() || reveal_timing.is_some() {
            let completion = completion_rule
                .map(|raw| {
                    raw.parse().unwrap_or_else(|e: String| {
                        tracing::warn!("{}; falling back to any_field", e);
                        CompletionRule::AnyField
                    })
                })
                .unwrap_or_default();

            let reveal = reveal_timing
                .map(|raw| {
                    serde_json::from_value::<RevealTiming>(raw.clone()).unwrap_or_else(|e| {
                        tracing::warn!("Unreadable reveal_timing {}: {}", raw, e);
                        RevealTiming::Immediately
                    })
                })
                .unwrap_or_default();

            return Self::new(completion, reveal);
        }

        match legacy {
            Some(raw) => match serde_json::from_value::<LegacyRevealCondition>(raw.clone()) {
                Ok(condition) => condition.into_flow_rules(),
                Err(e) => {
                    tracing::warn!("Unreadable reveal_next_conditions {}: {}", raw, e);
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    /// 저장용 컬럼 값 (completion_rule, reveal_timing)
    pub fn to_columns(&self) -> (&'static str, Value) {
        let reveal = serde_json::to_value(self.reveal).unwrap_or(Value::Null);
        (self.completion.as_str(), reveal)
    }
}

/// legacy 단일 필드 형태: `{"type": "...", "delay_seconds": n}`
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyRevealCondition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, alias = "delaySeconds", alias = "delay")]
    pub delay_seconds: Option<u32>,
}

impl LegacyRevealCondition {
    pub fn into_flow_rules(self) -> FlowRules {
        match self.kind.as_str() {
            "immediately" => FlowRules::new(CompletionRule::AnyField, RevealTiming::Immediately),
            "required_complete" => {
                FlowRules::new(CompletionRule::RequiredFields, RevealTiming::Immediately)
            }
            "all_complete" => FlowRules::new(CompletionRule::AllFields, RevealTiming::Immediately),
            "after_delay" => FlowRules::new(
                CompletionRule::AnyField,
                RevealTiming::after_delay(
                    self.delay_seconds.unwrap_or(RevealTiming::DEFAULT_DELAY_SECS),
                ),
            ),
            other => {
                tracing::warn!("Unknown legacy reveal condition '{}'", other);
                FlowRules::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy(value: Value) -> FlowRules {
        FlowRules::from_columns(None, None, Some(&value))
    }

    #[test]
    fn test_legacy_mapping() {
        assert_eq!(
            legacy(json!({"type": "required_complete"})),
            FlowRules::new(CompletionRule::RequiredFields, RevealTiming::Immediately)
        );
        assert_eq!(
            legacy(json!({"type": "all_complete"})),
            FlowRules::new(CompletionRule::AllFields, RevealTiming::Immediately)
        );
        assert_eq!(
            legacy(json!({"type": "immediately"})),
            FlowRules::new(CompletionRule::AnyField, RevealTiming::Immediately)
        );
        assert_eq!(
            legacy(json!({"type": "after_delay", "delay_seconds": 7})).reveal,
            RevealTiming::AfterDelay { delay_seconds: 7 }
        );
    }

    #[test]
    fn test_legacy_after_delay_without_value_uses_default() {
        assert_eq!(
            legacy(json!({"type": "after_delay"})).reveal,
            RevealTiming::AfterDelay { delay_seconds: RevealTiming::DEFAULT_DELAY_SECS }
        );
    }

    #[test]
    fn test_two_axis_takes_precedence() {
        let rules = FlowRules::from_columns(
            Some("all_fields"),
            Some(&json!({"type": "after_delay", "delay_seconds": 5})),
            Some(&json!({"type": "required_complete"})),
        );
        assert_eq!(rules.completion, CompletionRule::AllFields);
        assert_eq!(rules.reveal, RevealTiming::AfterDelay { delay_seconds: 5 });
    }

    #[test]
    fn test_missing_axis_defaults() {
        let rules = FlowRules::from_columns(Some("required_fields"), None, None);
        assert_eq!(rules.reveal, RevealTiming::Immediately);

        let rules = FlowRules::from_columns(None, None, None);
        assert_eq!(rules, FlowRules::default());
    }

    #[test]
    fn test_delay_clamped() {
        let rules = FlowRules::from_columns(
            None,
            Some(&json!({"type": "after_delay", "delay_seconds": 600})),
            None,
        );
        assert_eq!(rules.reveal, RevealTiming::AfterDelay { delay_seconds: 60 });
        assert_eq!(RevealTiming::after_delay(0), RevealTiming::AfterDelay { delay_seconds: 1 });
    }

    #[test]
    fn test_garbage_falls_back_to_permissive() {
        let rules = FlowRules::from_columns(Some("most_fields"), Some(&json!("soon")), None);
        assert_eq!(rules, FlowRules::default());
        assert_eq!(legacy(json!({"type": "whenever"})), FlowRules::default());
        assert_eq!(legacy(json!(42)), FlowRules::default());
    }

    #[test]
    fn test_to_columns_shape() {
        let rules = FlowRules::new(CompletionRule::RequiredFields, RevealTiming::after_delay(3));
        let (rule, reveal) = rules.to_columns();
        assert_eq!(rule, "required_fields");
        assert_eq!(reveal, json!({"type": "after_delay", "delay_seconds": 3}));
    }

    #[test]
    fn test_auto_complete_types() {
        assert!(CardType::Info.auto_completes());
        assert!(CardType::Visual.auto_completes());
        assert!(CardType::Calculation.auto_completes());
        assert!(!CardType::Form.auto_completes());
        assert!(!CardType::Submit.auto_completes());
    }
}
