//! Session completion queries
//!
//! 필드 쓰기는 UNIQUE 키 기반 upsert (last-write-wins),
//! 카드 완료는 최초 기록만 유지

use anyhow::Result;
use serde_json::Value;
use uuid::Uuid;

use super::models::{CardCompletion, FieldCompletion};
use super::Database;
use crate::types::SessionId;

impl Database {
    /// 필드 완료 upsert, 키: (card_id, field_name, session_id)
    pub async fn upsert_field_completion(
        &self,
        card_id: Uuid,
        field_name: &str,
        session_id: &SessionId,
        value: &Value,
        is_complete: bool,
    ) -> Result<FieldCompletion> {
        let row = sqlx::query_as::<_, FieldCompletion>(
            r#"
            INSERT INTO field_completions (card_id, field_name, session_id, value, is_complete, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (card_id, field_name, session_id)
            DO UPDATE SET
                value = EXCLUDED.value,
                is_complete = EXCLUDED.is_complete,
                updated_at = NOW()
            RETURNING card_id, field_name, session_id, value, is_complete, updated_at
            "#
        )
        .bind(card_id)
        .bind(field_name)
        .bind(session_id.as_str())
        .bind(value)
        .bind(is_complete)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// (card, session)의 필드 완료 기록
    pub async fn get_field_completions(
        &self,
        card_id: Uuid,
        session_id: &SessionId,
    ) -> Result<Vec<FieldCompletion>> {
        let rows = sqlx::query_as::<_, FieldCompletion>(
            r#"
            SELECT card_id, field_name, session_id, value, is_complete, updated_at
            FROM field_completions
            WHERE card_id = $1 AND session_id = $2
            ORDER BY field_name
            "#
        )
        .bind(card_id)
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// 카드 완료 기록 (최초 1회만)
    ///
    /// 이번 호출이 row를 만들었을 때만 `Some`, 이미 완료된 row가 있으면 `None`.
    /// 판정이 한 문장 안에서 끝나므로 동시 요청 중 하나만 `Some`을 받음
    pub async fn mark_card_completed(
        &self,
        card_id: Uuid,
        session_id: &SessionId,
        trigger: &str,
    ) -> Result<Option<CardCompletion>> {
        let row = sqlx::query_as::<_, CardCompletion>(
            r#"
            INSERT INTO card_completions (card_id, session_id, is_complete, completed_at, completion_trigger)
            VALUES ($1, $2, TRUE, NOW(), $3)
            ON CONFLICT (card_id, session_id)
            DO UPDATE SET
                is_complete = TRUE,
                completed_at = NOW(),
                completion_trigger = EXCLUDED.completion_trigger
            WHERE card_completions.is_complete = FALSE
            RETURNING card_id, session_id, is_complete, completed_at, completion_trigger
            "#
        )
        .bind(card_id)
        .bind(session_id.as_str())
        .bind(trigger)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// (card, session)의 카드 완료 기록
    pub async fn get_card_completion(
        &self,
        card_id: Uuid,
        session_id: &SessionId,
    ) -> Result<Option<CardCompletion>> {
        let row = sqlx::query_as::<_, CardCompletion>(
            r#"
            SELECT card_id, session_id, is_complete, completed_at, completion_trigger
            FROM card_completions
            WHERE card_id = $1 AND session_id = $2
            "#
        )
        .bind(card_id)
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// 세션의 카드 완료 기록
    pub async fn get_card_completions(&self, session_id: &SessionId) -> Result<Vec<CardCompletion>> {
        let rows = sqlx::query_as::<_, CardCompletion>(
            r#"
            SELECT card_id, session_id, is_complete, completed_at, completion_trigger
            FROM card_completions
            WHERE session_id = $1
            ORDER BY completed_at NULLS LAST
            "#
        )
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// 세션 초기화: 두 테이블의 해당 세션 row 전부 삭제 (트랜잭션)
    pub async fn clear_session(&self, session_id: &SessionId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let fields = sqlx::query("DELETE FROM field_completions WHERE session_id = $1")
            .bind(session_id.as_str())
            .execute(&mut *tx)
            .await?;
        let cards = sqlx::query("DELETE FROM card_completions WHERE session_id = $1")
            .bind(session_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            session = %session_id,
            field_rows = fields.rows_affected(),
            card_rows = cards.rows_affected(),
            "Session completion rows cleared"
        );
        Ok(())
    }
}
