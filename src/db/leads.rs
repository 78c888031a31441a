//! Lead queries

use anyhow::Result;
use uuid::Uuid;

use super::models::{Lead, NewLead};
use super::Database;

const LEAD_COLUMNS: &str = r#"
    id, name, email, phone, address, postal_code,
    property, calculation, answers, session_id, consent, created_at
"#;

impl Database {
    /// 리드 저장
    pub async fn insert_lead(&self, lead: &NewLead) -> Result<Lead> {
        let sql = format!(
            r#"
            INSERT INTO leads (
                id, name, email, phone, address, postal_code,
                property, calculation, answers, session_id, consent, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            RETURNING {LEAD_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Lead>(&sql)
            .bind(Uuid::new_v4())
            .bind(&lead.name)
            .bind(lead.email.to_lowercase())
            .bind(&lead.phone)
            .bind(&lead.address)
            .bind(&lead.postal_code)
            .bind(&lead.property)
            .bind(&lead.calculation)
            .bind(&lead.answers)
            .bind(&lead.session_id)
            .bind(lead.consent)
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    /// 리드 목록 (최신순, 페이지네이션)
    pub async fn list_leads(&self, page: u32, limit: u32) -> Result<(Vec<Lead>, i64)> {
        let offset = page as i64 * limit as i64;

        let sql = format!(
            "SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        let leads = sqlx::query_as::<_, Lead>(&sql)
            .bind(limit as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        // 전체 개수
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leads")
            .fetch_one(&self.pool)
            .await?;

        Ok((leads, count.0))
    }

    pub async fn get_lead(&self, lead_id: Uuid) -> Result<Option<Lead>> {
        let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1");
        let lead = sqlx::query_as::<_, Lead>(&sql)
            .bind(lead_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lead)
    }
}
