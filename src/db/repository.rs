//! Repository Pattern Implementation
//!
//! # Interview Q&A
//!
//! Q: completion 엔진만 trait 뒤로 숨긴 이유는?
//! A: 엔진은 "(규칙, row 목록) → 판정" 순수 로직 + upsert 몇 개
//!
//!    - 판정 로직 테스트에 실제 Postgres가 필요 없어야 함
//!    - 저장 실패(네트워크/권한) 시나리오를 Mock으로 재현 가능
//!    - 나머지 CRUD(카드 빌더, 테마 등)는 Database에 직접 쿼리
//!
//!    ```rust,ignore
//!    // 운영
//!    let engine = CompletionEngine::new(db.clone());
//!
//!    // 테스트
//!    let engine = CompletionEngine::new(Arc::new(MockCompletionStore::new()));
//!    ```

use async_trait::async_trait;
use anyhow::Result;
use serde_json::Value;
use uuid::Uuid;

use super::models::{CardCompletion, CardTemplate, FieldCompletion};
use super::Database;
use crate::types::SessionId;

/// completion 엔진이 사용하는 저장소 인터페이스
#[async_trait]
pub trait CompletionStore: Send + Sync {
    async fn find_card(&self, card_id: Uuid) -> Result<Option<CardTemplate>>;

    async fn next_card_after(&self, card_id: Uuid) -> Result<Option<Uuid>>;

    async fn upsert_field_completion(
        &self,
        card_id: Uuid,
        field_name: &str,
        session_id: &SessionId,
        value: &Value,
        is_complete: bool,
    ) -> Result<FieldCompletion>;

    async fn field_completions(
        &self,
        card_id: Uuid,
        session_id: &SessionId,
    ) -> Result<Vec<FieldCompletion>>;

    /// 최초 완료일 때만 `Some`
    async fn mark_card_completed(
        &self,
        card_id: Uuid,
        session_id: &SessionId,
        trigger: &str,
    ) -> Result<Option<CardCompletion>>;

    async fn card_completion(
        &self,
        card_id: Uuid,
        session_id: &SessionId,
    ) -> Result<Option<CardCompletion>>;

    async fn card_completions(&self, session_id: &SessionId) -> Result<Vec<CardCompletion>>;

    async fn clear_session(&self, session_id: &SessionId) -> Result<()>;
}

#[async_trait]
impl CompletionStore for Database {
    async fn find_card(&self, card_id: Uuid) -> Result<Option<CardTemplate>> {
        self.get_card(card_id).await
    }

    async fn next_card_after(&self, card_id: Uuid) -> Result<Option<Uuid>> {
        self.next_active_card_after(card_id).await
    }

    async fn upsert_field_completion(
        &self,
        card_id: Uuid,
        field_name: &str,
        session_id: &SessionId,
        value: &Value,
        is_complete: bool,
    ) -> Result<FieldCompletion> {
        Database::upsert_field_completion(self, card_id, field_name, session_id, value, is_complete)
            .await
    }

    async fn field_completions(
        &self,
        card_id: Uuid,
        session_id: &SessionId,
    ) -> Result<Vec<FieldCompletion>> {
        self.get_field_completions(card_id, session_id).await
    }

    async fn mark_card_completed(
        &self,
        card_id: Uuid,
        session_id: &SessionId,
        trigger: &str,
    ) -> Result<Option<CardCompletion>> {
        Database::mark_card_completed(self, card_id, session_id, trigger).await
    }

    async fn card_completion(
        &self,
        card_id: Uuid,
        session_id: &SessionId,
    ) -> Result<Option<CardCompletion>> {
        self.get_card_completion(card_id, session_id).await
    }

    async fn card_completions(&self, session_id: &SessionId) -> Result<Vec<CardCompletion>> {
        self.get_card_completions(session_id).await
    }

    async fn clear_session(&self, session_id: &SessionId) -> Result<()> {
        Database::clear_session(self, session_id).await
    }
}

// 테스트용 Mock 구현:

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::hash_map::Entry;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::RwLock;
    use anyhow::anyhow;
    use chrono::Utc;

    /// 메모리 기반 CompletionStore
    ///
    /// `set_failing(true)`이면 모든 쓰기/읽기가 에러 (DB 장애 재현)
    pub struct MockCompletionStore {
        cards: RwLock<Vec<CardTemplate>>,
        fields: RwLock<HashMap<(Uuid, String, String), FieldCompletion>>,
        completions: RwLock<HashMap<(Uuid, String), CardCompletion>>,
        failing: AtomicBool,
    }

    impl MockCompletionStore {
        pub fn new() -> Self {
            Self {
                cards: RwLock::new(Vec::new()),
                fields: RwLock::new(HashMap::new()),
                completions: RwLock::new(HashMap::new()),
                failing: AtomicBool::new(false),
            }
        }

        pub fn with_cards(cards: Vec<CardTemplate>) -> Self {
            let store = Self::new();
            *store.cards.write().unwrap() = cards;
            store
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn field_row_count(&self) -> usize {
            self.fields.read().unwrap().len()
        }

        fn check(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(anyhow!("permission denied for table field_completions"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CompletionStore for MockCompletionStore {
        async fn find_card(&self, card_id: Uuid) -> Result<Option<CardTemplate>> {
            self.check()?;
            let cards = self.cards.read().unwrap();
            Ok(cards.iter().find(|c| c.id == card_id).cloned())
        }

        async fn next_card_after(&self, card_id: Uuid) -> Result<Option<Uuid>> {
            self.check()?;
            let cards = self.cards.read().unwrap();
            let mut ordered: Vec<&CardTemplate> = cards.iter().filter(|c| c.is_active).collect();
            ordered.sort_by_key(|c| (c.display_order, c.id));
            let position = ordered.iter().position(|c| c.id == card_id);
            Ok(position.and_then(|i| ordered.get(i + 1)).map(|c| c.id))
        }

        async fn upsert_field_completion(
            &self,
            card_id: Uuid,
            field_name: &str,
            session_id: &SessionId,
            value: &Value,
            is_complete: bool,
        ) -> Result<FieldCompletion> {
            self.check()?;
            let row = FieldCompletion {
                card_id,
                field_name: field_name.to_string(),
                session_id: session_id.to_string(),
                value: Some(value.clone()),
                is_complete,
                updated_at: Utc::now(),
            };
            let key = (card_id, field_name.to_string(), session_id.to_string());
            self.fields.write().unwrap().insert(key, row.clone());
            Ok(row)
        }

        async fn field_completions(
            &self,
            card_id: Uuid,
            session_id: &SessionId,
        ) -> Result<Vec<FieldCompletion>> {
            self.check()?;
            let fields = self.fields.read().unwrap();
            Ok(fields
                .values()
                .filter(|r| r.card_id == card_id && r.session_id == session_id.as_str())
                .cloned()
                .collect())
        }

        async fn mark_card_completed(
            &self,
            card_id: Uuid,
            session_id: &SessionId,
            trigger: &str,
        ) -> Result<Option<CardCompletion>> {
            self.check()?;
            let mut completions = self.completions.write().unwrap();
            match completions.entry((card_id, session_id.to_string())) {
                Entry::Occupied(_) => Ok(None),
                Entry::Vacant(slot) => {
                    let row = CardCompletion {
                        card_id,
                        session_id: session_id.to_string(),
                        is_complete: true,
                        completed_at: Some(Utc::now()),
                        completion_trigger: Some(trigger.to_string()),
                    };
                    slot.insert(row.clone());
                    Ok(Some(row))
                }
            }
        }

        async fn card_completion(
            &self,
            card_id: Uuid,
            session_id: &SessionId,
        ) -> Result<Option<CardCompletion>> {
            self.check()?;
            let completions = self.completions.read().unwrap();
            Ok(completions.get(&(card_id, session_id.to_string())).cloned())
        }

        async fn card_completions(&self, session_id: &SessionId) -> Result<Vec<CardCompletion>> {
            self.check()?;
            let completions = self.completions.read().unwrap();
            Ok(completions
                .values()
                .filter(|r| r.session_id == session_id.as_str())
                .cloned()
                .collect())
        }

        async fn clear_session(&self, session_id: &SessionId) -> Result<()> {
            self.check()?;
            self.fields
                .write()
                .unwrap()
                .retain(|(_, _, s), _| s != session_id.as_str());
            self.completions
                .write()
                .unwrap()
                .retain(|(_, s), _| s != session_id.as_str());
            Ok(())
        }
    }
}
