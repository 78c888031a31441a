//! Card Completion Engine
//!
//! # Interview Q&A
//!
//! Q: 카드 완료는 어떻게 판정하는가?
//! A: (카드 규칙, 해당 (card, session)의 필드 완료 row) → bool 순수 함수
//!
//!    ```text
//!    (카드에 정의된 필드의 row만 집계)
//!    any_field        완료된 row ≥ 1
//!    required_fields  required/completion_required 필드가 전부 완료
//!                     (대상이 0개면 any_field로 대체)
//!    all_fields       필드 ≥ 1 이고, 완료된 카드 필드 row 수 == 필드 수
//!    info/visual/calculation 카드는 항상 완료 (UI 이벤트가 트리거)
//!    ```
//!
//! Q: DB 쓰기가 실패하면?
//! A: `BestEffort::Dropped` 반환 (로그만 남김)
//!    - completion 데이터는 UX 순서 제어용이지 트랜잭션 데이터가 아님
//!    - 사용자의 계산기 진행을 절대 막지 않음
//!
//! Q: 이미 완료된 카드의 필드가 다시 바뀌면?
//! A: 완료 상태는 세션 초기화 전까지 유지 (sticky)
//!    - 처음 완료된 시각/트리거를 보존
//!    - 다음 카드 공개도 최초 완료 때 한 번만

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::anyhow;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::flow_rules::{CompletionRule, RevealTiming};
use super::reveal::RevealScheduler;
use super::websocket::RevealEvent;
use crate::db::{CardCompletion, CardTemplate, CompletionStore, FieldCompletion};
use crate::types::{BestEffort, SessionId};

/// 필드 변경으로 인한 완료 트리거 라벨
pub const TRIGGER_FIELD_CHANGE: &str = "field_change";

/// 값이 "채워졌는지" 판정
///
/// null, 공백 문자열, 빈 배열/객체, `false`(체크 안 된 체크박스)는 빈 값
pub fn is_value_complete(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(checked) => *checked,
        Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// 카드 완료 판정 (순수 함수)
pub fn evaluate_completion(card: &CardTemplate, rows: &[FieldCompletion]) -> bool {
    if card.card_type.auto_completes() {
        return true;
    }

    // 카드에 정의되지 않은 필드 이름의 row는 판정에서 제외
    let known: HashSet<&str> = card.fields.iter().map(|f| f.name.as_str()).collect();
    let completed: HashSet<&str> = rows
        .iter()
        .filter(|r| r.card_id == card.id && r.is_complete)
        .map(|r| r.field_name.as_str())
        .filter(|name| known.contains(name))
        .collect();

    match card.rules.completion {
        CompletionRule::AnyField => !completed.is_empty(),
        CompletionRule::RequiredFields => {
            let required: Vec<&str> = card
                .fields
                .iter()
                .filter(|f| f.counts_for_completion())
                .map(|f| f.name.as_str())
                .collect();

            if required.is_empty() {
                // 설정 오류 → 더 관대한 규칙
                !completed.is_empty()
            } else {
                required.iter().all(|name| completed.contains(name))
            }
        }
        CompletionRule::AllFields => {
            let total = card.fields.len();
            let done = card
                .fields
                .iter()
                .filter(|f| completed.contains(f.name.as_str()))
                .count();
            total > 0 && done == total
        }
    }
}

/// 카드 완료 검사 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardCheck {
    pub card_id: Uuid,
    pub is_complete: bool,
    /// 이번 호출로 처음 완료됨
    pub newly_completed: bool,
    pub completion: Option<CardCompletion>,
    /// 완료 시 다음 카드 공개 방식
    pub reveal: Option<RevealTiming>,
    pub next_card_id: Option<Uuid>,
}

impl CardCheck {
    fn incomplete(card_id: Uuid) -> Self {
        Self {
            card_id,
            is_complete: false,
            newly_completed: false,
            completion: None,
            reveal: None,
            next_card_id: None,
        }
    }
}

/// 필드 변경 처리 결과
#[derive(Debug, Clone, Serialize)]
pub struct FieldChange {
    pub field: BestEffort<FieldCompletion>,
    pub card: BestEffort<CardCheck>,
}

/// 카드 완료 엔진
///
/// 세션 id는 모든 호출에 명시적으로 전달 (전역 상태 없음)
pub struct CompletionEngine {
    store: Arc<dyn CompletionStore>,
    reveals: Arc<RevealScheduler>,
}

impl CompletionEngine {
    pub fn new(store: Arc<dyn CompletionStore>, reveals: Arc<RevealScheduler>) -> Self {
        Self { store, reveals }
    }

    /// 필드 값 기록 (upsert)
    pub async fn track_field_completion(
        &self,
        card_id: Uuid,
        field_name: &str,
        session_id: &SessionId,
        value: &Value,
    ) -> BestEffort<FieldCompletion> {
        let is_complete = is_value_complete(value);
        let result = self
            .store
            .upsert_field_completion(card_id, field_name, session_id, value, is_complete)
            .await;
        BestEffort::from_result("track_field_completion", result)
    }

    /// 카드 완료 검사 + 완료 시 기록 및 다음 카드 공개 처리
    pub async fn check_card_completion(
        &self,
        card_id: Uuid,
        session_id: &SessionId,
        trigger: &str,
    ) -> BestEffort<CardCheck> {
        let result = self.evaluate_and_mark(card_id, session_id, trigger).await;
        let outcome = BestEffort::from_result("check_card_completion", result);

        if let BestEffort::Recorded(check) = &outcome {
            if check.newly_completed {
                self.reveals
                    .announce_completed(session_id, check.card_id, trigger)
                    .await;
                self.dispatch_reveal(session_id, check).await;
            }
        }
        outcome
    }

    /// 필드 변경 경로: 기록 → 카드 검사
    pub async fn record_field_change(
        &self,
        card_id: Uuid,
        field_name: &str,
        session_id: &SessionId,
        value: &Value,
        trigger: Option<&str>,
    ) -> FieldChange {
        let field = self
            .track_field_completion(card_id, field_name, session_id, value)
            .await;
        let card = self
            .check_card_completion(card_id, session_id, trigger.unwrap_or(TRIGGER_FIELD_CHANGE))
            .await;
        FieldChange { field, card }
    }

    /// 세션 초기화: completion row 전부 삭제 + 대기 중인 공개 취소
    pub async fn initialize_clean_session(&self, session_id: &SessionId) -> BestEffort<()> {
        self.reveals.cancel_session(session_id).await;
        let result = self.store.clear_session(session_id).await;
        let outcome = BestEffort::from_result("initialize_clean_session", result);
        if outcome.is_recorded() {
            tracing::info!(session = %session_id, "Clean session initialized");
        }
        outcome
    }

    /// 세션 진행 현황
    pub async fn session_progress(&self, session_id: &SessionId) -> BestEffort<Vec<CardCompletion>> {
        let result = self.store.card_completions(session_id).await;
        BestEffort::from_result("session_progress", result)
    }

    /// socket teardown 등으로 세션의 대기 공개만 취소
    pub async fn abandon_pending_reveals(&self, session_id: &SessionId) -> usize {
        self.reveals.cancel_session(session_id).await
    }

    async fn evaluate_and_mark(
        &self,
        card_id: Uuid,
        session_id: &SessionId,
        trigger: &str,
    ) -> anyhow::Result<CardCheck> {
        let card = self
            .store
            .find_card(card_id)
            .await?
            .ok_or_else(|| anyhow!("card {} not found", card_id))?;

        // 이미 완료된 카드는 현재 필드 값과 무관하게 완료 유지
        let existing = self
            .store
            .card_completion(card_id, session_id)
            .await?
            .filter(|c| c.is_complete);

        let (completion, newly_completed) = match existing {
            Some(row) => (row, false),
            None => {
                let rows = if card.card_type.auto_completes() {
                    Vec::new()
                } else {
                    self.store.field_completions(card_id, session_id).await?
                };

                if !evaluate_completion(&card, &rows) {
                    return Ok(CardCheck::incomplete(card_id));
                }

                match self
                    .store
                    .mark_card_completed(card_id, session_id, trigger)
                    .await?
                {
                    Some(row) => {
                        tracing::info!(
                            session = %session_id,
                            card = %card_id,
                            trigger,
                            "Card completed"
                        );
                        (row, true)
                    }
                    // 동시 요청이 먼저 기록함
                    None => {
                        let row = self
                            .store
                            .card_completion(card_id, session_id)
                            .await?
                            .ok_or_else(|| anyhow!("card {} completion row vanished", card_id))?;
                        (row, false)
                    }
                }
            }
        };

        let next_card_id = self.store.next_card_after(card_id).await.unwrap_or_else(|e| {
            tracing::warn!(card = %card_id, error = %e, "Next card lookup failed");
            None
        });

        Ok(CardCheck {
            card_id,
            is_complete: true,
            newly_completed,
            completion: Some(completion),
            reveal: Some(card.rules.reveal),
            next_card_id,
        })
    }

    async fn dispatch_reveal(&self, session_id: &SessionId, check: &CardCheck) {
        let reveal = match check.reveal {
            Some(reveal) => reveal,
            None => return,
        };

        let event = RevealEvent {
            session_id: session_id.to_string(),
            card_id: check.card_id,
            next_card_id: check.next_card_id,
            delay_seconds: match reveal {
                RevealTiming::Immediately => 0,
                RevealTiming::AfterDelay { delay_seconds } => delay_seconds,
            },
            timestamp: 0,
        };

        match reveal.delay() {
            None => self.reveals.reveal_now(session_id, event).await,
            Some(delay) => self.reveals.schedule(session_id, event, delay).await,
        }
    }
}
