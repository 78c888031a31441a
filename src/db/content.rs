//! Admin content queries: themes, formulas, PDF shortcodes, email templates

use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

use super::models::{
    EmailTemplate, EmailTemplateInput, Formula, FormulaInput, PdfShortcode, ShortcodeInput, Theme,
    ThemeInput,
};
use super::Database;

const THEME_COLUMNS: &str =
    "id, name, colors, typography, layout, is_active, created_at, updated_at";
const FORMULA_COLUMNS: &str =
    "id, name, expression, description, is_active, created_at, updated_at";
const SHORTCODE_COLUMNS: &str =
    "id, code, description, source, default_value, format, created_at, updated_at";
const EMAIL_COLUMNS: &str =
    "id, name, subject, body_html, is_active, created_at, updated_at";

impl Database {
    // ============ Themes ============

    pub async fn list_themes(&self) -> Result<Vec<Theme>> {
        let sql = format!("SELECT {THEME_COLUMNS} FROM themes ORDER BY created_at");
        Ok(sqlx::query_as::<_, Theme>(&sql).fetch_all(&self.pool).await?)
    }

    pub async fn active_theme(&self) -> Result<Option<Theme>> {
        let sql = format!("SELECT {THEME_COLUMNS} FROM themes WHERE is_active LIMIT 1");
        Ok(sqlx::query_as::<_, Theme>(&sql).fetch_optional(&self.pool).await?)
    }

    pub async fn create_theme(&self, input: &ThemeInput) -> Result<Theme> {
        let sql = format!(
            r#"
            INSERT INTO themes (id, name, colors, typography, layout, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, NOW(), NOW())
            RETURNING {THEME_COLUMNS}
            "#
        );
        let theme = sqlx::query_as::<_, Theme>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.name)
            .bind(input.colors.clone().unwrap_or_else(|| json!({})))
            .bind(input.typography.clone().unwrap_or_else(|| json!({})))
            .bind(input.layout.clone().unwrap_or_else(|| json!({})))
            .fetch_one(&self.pool)
            .await?;
        Ok(theme)
    }

    pub async fn update_theme(&self, theme_id: Uuid, input: &ThemeInput) -> Result<Option<Theme>> {
        let sql = format!(
            r#"
            UPDATE themes SET
                name = $2,
                colors = COALESCE($3, colors),
                typography = COALESCE($4, typography),
                layout = COALESCE($5, layout),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {THEME_COLUMNS}
            "#
        );
        let theme = sqlx::query_as::<_, Theme>(&sql)
            .bind(theme_id)
            .bind(&input.name)
            .bind(&input.colors)
            .bind(&input.typography)
            .bind(&input.layout)
            .fetch_optional(&self.pool)
            .await?;
        Ok(theme)
    }

    pub async fn delete_theme(&self, theme_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM themes WHERE id = $1")
            .bind(theme_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 테마 활성화 (트랜잭션: 활성 테마는 항상 최대 1개)
    pub async fn activate_theme(&self, theme_id: Uuid) -> Result<Option<Theme>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE themes SET is_active = FALSE, updated_at = NOW() WHERE is_active AND id <> $1")
            .bind(theme_id)
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "UPDATE themes SET is_active = TRUE, updated_at = NOW() WHERE id = $1 RETURNING {THEME_COLUMNS}"
        );
        let theme = sqlx::query_as::<_, Theme>(&sql)
            .bind(theme_id)
            .fetch_optional(&mut *tx)
            .await?;

        // 없는 id면 기존 활성 테마를 끄지 않음
        if theme.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(theme)
    }

    // ============ Formulas ============

    pub async fn list_formulas(&self, active_only: bool) -> Result<Vec<Formula>> {
        let sql = format!(
            "SELECT {FORMULA_COLUMNS} FROM formulas WHERE ($1 = FALSE OR is_active) ORDER BY name"
        );
        Ok(sqlx::query_as::<_, Formula>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn create_formula(&self, input: &FormulaInput) -> Result<Formula> {
        let sql = format!(
            r#"
            INSERT INTO formulas (id, name, expression, description, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING {FORMULA_COLUMNS}
            "#
        );
        let formula = sqlx::query_as::<_, Formula>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.name)
            .bind(&input.expression)
            .bind(&input.description)
            .bind(input.is_active.unwrap_or(true))
            .fetch_one(&self.pool)
            .await?;
        Ok(formula)
    }

    pub async fn update_formula(&self, formula_id: Uuid, input: &FormulaInput) -> Result<Option<Formula>> {
        let sql = format!(
            r#"
            UPDATE formulas SET
                name = $2,
                expression = $3,
                description = $4,
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {FORMULA_COLUMNS}
            "#
        );
        let formula = sqlx::query_as::<_, Formula>(&sql)
            .bind(formula_id)
            .bind(&input.name)
            .bind(&input.expression)
            .bind(&input.description)
            .bind(input.is_active)
            .fetch_optional(&self.pool)
            .await?;
        Ok(formula)
    }

    pub async fn delete_formula(&self, formula_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM formulas WHERE id = $1")
            .bind(formula_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ============ PDF Shortcodes ============

    pub async fn list_shortcodes(&self) -> Result<Vec<PdfShortcode>> {
        let sql = format!("SELECT {SHORTCODE_COLUMNS} FROM pdf_shortcodes ORDER BY code");
        Ok(sqlx::query_as::<_, PdfShortcode>(&sql).fetch_all(&self.pool).await?)
    }

    pub async fn create_shortcode(&self, input: &ShortcodeInput) -> Result<PdfShortcode> {
        let sql = format!(
            r#"
            INSERT INTO pdf_shortcodes (id, code, description, source, default_value, format, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING {SHORTCODE_COLUMNS}
            "#
        );
        let shortcode = sqlx::query_as::<_, PdfShortcode>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.code)
            .bind(&input.description)
            .bind(&input.source)
            .bind(&input.default_value)
            .bind(input.format.as_deref().unwrap_or("text"))
            .fetch_one(&self.pool)
            .await?;
        Ok(shortcode)
    }

    pub async fn update_shortcode(
        &self,
        shortcode_id: Uuid,
        input: &ShortcodeInput,
    ) -> Result<Option<PdfShortcode>> {
        let sql = format!(
            r#"
            UPDATE pdf_shortcodes SET
                code = $2,
                description = $3,
                source = $4,
                default_value = $5,
                format = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SHORTCODE_COLUMNS}
            "#
        );
        let shortcode = sqlx::query_as::<_, PdfShortcode>(&sql)
            .bind(shortcode_id)
            .bind(&input.code)
            .bind(&input.description)
            .bind(&input.source)
            .bind(&input.default_value)
            .bind(input.format.as_deref().unwrap_or("text"))
            .fetch_optional(&self.pool)
            .await?;
        Ok(shortcode)
    }

    pub async fn delete_shortcode(&self, shortcode_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pdf_shortcodes WHERE id = $1")
            .bind(shortcode_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ============ Email Templates ============

    pub async fn list_email_templates(&self) -> Result<Vec<EmailTemplate>> {
        let sql = format!("SELECT {EMAIL_COLUMNS} FROM email_templates ORDER BY name");
        Ok(sqlx::query_as::<_, EmailTemplate>(&sql).fetch_all(&self.pool).await?)
    }

    pub async fn get_email_template(&self, template_id: Uuid) -> Result<Option<EmailTemplate>> {
        let sql = format!("SELECT {EMAIL_COLUMNS} FROM email_templates WHERE id = $1");
        Ok(sqlx::query_as::<_, EmailTemplate>(&sql)
            .bind(template_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn create_email_template(&self, input: &EmailTemplateInput) -> Result<EmailTemplate> {
        let sql = format!(
            r#"
            INSERT INTO email_templates (id, name, subject, body_html, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING {EMAIL_COLUMNS}
            "#
        );
        let template = sqlx::query_as::<_, EmailTemplate>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.name)
            .bind(&input.subject)
            .bind(&input.body_html)
            .bind(input.is_active.unwrap_or(true))
            .fetch_one(&self.pool)
            .await?;
        Ok(template)
    }

    pub async fn update_email_template(
        &self,
        template_id: Uuid,
        input: &EmailTemplateInput,
    ) -> Result<Option<EmailTemplate>> {
        let sql = format!(
            r#"
            UPDATE email_templates SET
                name = $2,
                subject = $3,
                body_html = $4,
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {EMAIL_COLUMNS}
            "#
        );
        let template = sqlx::query_as::<_, EmailTemplate>(&sql)
            .bind(template_id)
            .bind(&input.name)
            .bind(&input.subject)
            .bind(&input.body_html)
            .bind(input.is_active)
            .fetch_optional(&self.pool)
            .await?;
        Ok(template)
    }

    pub async fn delete_email_template(&self, template_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM email_templates WHERE id = $1")
            .bind(template_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
