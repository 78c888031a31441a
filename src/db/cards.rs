//! Card template & field queries (flow builder)

use std::collections::HashMap;

use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

use super::models::{CardField, CardInput, CardTemplate, CardTemplateRow, FieldInput};
use super::Database;
use crate::services::flow_rules::FlowRules;

const CARD_COLUMNS: &str = r#"
    id, display_order, card_type, title, config,
    completion_rule, reveal_timing, reveal_next_conditions,
    styling, is_active, created_at, updated_at
"#;

const FIELD_COLUMNS: &str = r#"
    id, card_id, name, field_type, label, placeholder, options, validation,
    required, completion_required, display_order
"#;

impl Database {
    /// 카드 목록 (display_order 순, 필드 포함)
    pub async fn list_cards(&self, active_only: bool) -> Result<Vec<CardTemplate>> {
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM card_templates
             WHERE ($1 = FALSE OR is_active)
             ORDER BY display_order, id"
        );
        let rows = sqlx::query_as::<_, CardTemplateRow>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let sql = format!(
            "SELECT {FIELD_COLUMNS} FROM card_fields
             WHERE card_id = ANY($1)
             ORDER BY display_order, name"
        );
        let fields = sqlx::query_as::<_, CardField>(&sql)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        let mut by_card: HashMap<Uuid, Vec<CardField>> = HashMap::new();
        for field in fields {
            by_card.entry(field.card_id).or_default().push(field);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let fields = by_card.remove(&row.id).unwrap_or_default();
                row.into_template(fields)
            })
            .collect())
    }

    /// 카드 단건 조회 (필드 포함)
    pub async fn get_card(&self, card_id: Uuid) -> Result<Option<CardTemplate>> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM card_templates WHERE id = $1");
        let row = sqlx::query_as::<_, CardTemplateRow>(&sql)
            .bind(card_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let fields = self.list_fields(card_id).await?;
                Ok(Some(row.into_template(fields)))
            }
            None => Ok(None),
        }
    }

    /// 카드 생성
    ///
    /// display_order가 없으면 맨 뒤에 추가. 규칙은 항상 new 형태로 저장
    pub async fn create_card(&self, input: &CardInput) -> Result<CardTemplate> {
        let rules = FlowRules::new(input.rules.completion, input.rules.reveal);
        let (completion_rule, reveal_timing) = rules.to_columns();

        let sql = format!(
            r#"
            INSERT INTO card_templates (
                id, display_order, card_type, title, config,
                completion_rule, reveal_timing, reveal_next_conditions,
                styling, is_active, created_at, updated_at
            )
            VALUES (
                $1,
                COALESCE($2, (SELECT COALESCE(MAX(display_order), -1) + 1 FROM card_templates)),
                $3, $4, $5, $6, $7, NULL, $8, $9, NOW(), NOW()
            )
            RETURNING {CARD_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CardTemplateRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.display_order)
            .bind(input.card_type.as_str())
            .bind(&input.title)
            .bind(input.config.clone().unwrap_or_else(|| json!({})))
            .bind(completion_rule)
            .bind(reveal_timing)
            .bind(input.styling.clone().unwrap_or_else(|| json!({})))
            .bind(input.is_active.unwrap_or(true))
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into_template(Vec::new()))
    }

    /// 카드 수정 (legacy 규칙 컬럼은 비움)
    pub async fn update_card(&self, card_id: Uuid, input: &CardInput) -> Result<Option<CardTemplate>> {
        let rules = FlowRules::new(input.rules.completion, input.rules.reveal);
        let (completion_rule, reveal_timing) = rules.to_columns();

        let sql = format!(
            r#"
            UPDATE card_templates SET
                card_type = $2,
                title = $3,
                display_order = COALESCE($4, display_order),
                config = $5,
                completion_rule = $6,
                reveal_timing = $7,
                reveal_next_conditions = NULL,
                styling = $8,
                is_active = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CARD_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CardTemplateRow>(&sql)
            .bind(card_id)
            .bind(input.card_type.as_str())
            .bind(&input.title)
            .bind(input.display_order)
            .bind(input.config.clone().unwrap_or_else(|| json!({})))
            .bind(completion_rule)
            .bind(reveal_timing)
            .bind(input.styling.clone().unwrap_or_else(|| json!({})))
            .bind(input.is_active.unwrap_or(true))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let fields = self.list_fields(card_id).await?;
                Ok(Some(row.into_template(fields)))
            }
            None => Ok(None),
        }
    }

    /// 카드 삭제 (필드/completion은 FK cascade)
    pub async fn delete_card(&self, card_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM card_templates WHERE id = $1")
            .bind(card_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 드래그앤드롭 순서 저장 (트랜잭션)
    ///
    /// `ordered_ids`의 인덱스가 새 display_order가 됨
    pub async fn reorder_cards(&self, ordered_ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (index, id) in ordered_ids.iter().enumerate() {
            sqlx::query(
                "UPDATE card_templates SET display_order = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(index as i32)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// 현재 카드 다음에 공개될 활성 카드
    pub async fn next_active_card_after(&self, card_id: Uuid) -> Result<Option<Uuid>> {
        let next: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT c.id
            FROM card_templates c, card_templates cur
            WHERE cur.id = $1
              AND c.is_active
              AND (c.display_order, c.id) > (cur.display_order, cur.id)
            ORDER BY c.display_order, c.id
            LIMIT 1
            "#,
        )
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(next.map(|(id,)| id))
    }

    // ============ Fields ============

    pub async fn list_fields(&self, card_id: Uuid) -> Result<Vec<CardField>> {
        let sql = format!(
            "SELECT {FIELD_COLUMNS} FROM card_fields WHERE card_id = $1 ORDER BY display_order, name"
        );
        let fields = sqlx::query_as::<_, CardField>(&sql)
            .bind(card_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(fields)
    }

    pub async fn create_field(&self, card_id: Uuid, input: &FieldInput) -> Result<CardField> {
        let sql = format!(
            r#"
            INSERT INTO card_fields (
                id, card_id, name, field_type, label, placeholder, options, validation,
                required, completion_required, display_order, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                COALESCE($11, (SELECT COALESCE(MAX(display_order), -1) + 1 FROM card_fields WHERE card_id = $2)),
                NOW(), NOW()
            )
            RETURNING {FIELD_COLUMNS}
            "#
        );
        let field = sqlx::query_as::<_, CardField>(&sql)
            .bind(Uuid::new_v4())
            .bind(card_id)
            .bind(&input.name)
            .bind(&input.field_type)
            .bind(&input.label)
            .bind(&input.placeholder)
            .bind(input.options.clone().unwrap_or_else(|| json!([])))
            .bind(input.validation.clone().unwrap_or_else(|| json!({})))
            .bind(input.required)
            .bind(input.completion_required)
            .bind(input.display_order)
            .fetch_one(&self.pool)
            .await?;
        Ok(field)
    }

    pub async fn update_field(&self, field_id: Uuid, input: &FieldInput) -> Result<Option<CardField>> {
        let sql = format!(
            r#"
            UPDATE card_fields SET
                name = $2,
                field_type = $3,
                label = $4,
                placeholder = $5,
                options = $6,
                validation = $7,
                required = $8,
                completion_required = $9,
                display_order = COALESCE($10, display_order),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {FIELD_COLUMNS}
            "#
        );
        let field = sqlx::query_as::<_, CardField>(&sql)
            .bind(field_id)
            .bind(&input.name)
            .bind(&input.field_type)
            .bind(&input.label)
            .bind(&input.placeholder)
            .bind(input.options.clone().unwrap_or_else(|| json!([])))
            .bind(input.validation.clone().unwrap_or_else(|| json!({})))
            .bind(input.required)
            .bind(input.completion_required)
            .bind(input.display_order)
            .fetch_optional(&self.pool)
            .await?;
        Ok(field)
    }

    pub async fn delete_field(&self, field_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM card_fields WHERE id = $1")
            .bind(field_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 카드 내부 필드 순서 저장 (다른 카드의 필드 id는 무시됨)
    pub async fn reorder_fields(&self, card_id: Uuid, ordered_ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (index, id) in ordered_ids.iter().enumerate() {
            sqlx::query(
                "UPDATE card_fields SET display_order = $3, updated_at = NOW()
                 WHERE id = $1 AND card_id = $2",
            )
            .bind(id)
            .bind(card_id)
            .bind(index as i32)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
