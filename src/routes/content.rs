//! Content Builder Endpoints
//!
//! 테마, 계산식, PDF shortcode, 이메일 템플릿 CRUD 와 미리보기
//!
//! # Interview Q&A
//!
//! Q: 계산식은 언제 검증하는가?
//! A: 저장 시점
//!    - 문법 오류, 알 수 없는 변수 → 422 INVALID_FORMULA
//!    - 렌더링 시점 실패 (0으로 나누기 등) 는 빈 문자열 + `missing`
//!
//! Q: 미리보기는 어떤 데이터로 렌더링하는가?
//! A: `lead_id` 가 있으면 저장된 lead, 없으면 샘플 주택 계산 결과
//!    - 요청의 `context` JSON 은 그 위에 덮어씀

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::{
        EmailTemplate, EmailTemplateInput, Formula, FormulaInput, PdfShortcode, ShortcodeInput,
        Theme, ThemeInput,
    },
    error::ApiError,
    services::{
        calculate_heat_pump_savings, formula, shortcode::ValueFormat, HeatingType, PropertyInput,
        RenderContext, Rendered, SavingsResult,
    },
    AppState,
};

// ============ Request/Response Types ============

/// 미리보기 요청
#[derive(Debug, Default, Deserialize)]
pub struct PreviewRequest {
    /// shortcode 미리보기에서만 사용
    #[serde(default)]
    pub template: String,
    pub lead_id: Option<Uuid>,
    /// 추가 값 (dotted key 로 펼쳐짐)
    pub context: Option<Value>,
}

/// 이메일 미리보기 응답
#[derive(Debug, Serialize)]
pub struct EmailPreview {
    pub subject: Rendered,
    pub body_html: Rendered,
}

// ============ Themes ============

/// GET /admin/themes
pub async fn list_themes(State(state): State<AppState>) -> Result<Json<Vec<Theme>>, ApiError> {
    Ok(Json(state.db.list_themes().await?))
}

/// POST /admin/themes
pub async fn create_theme(
    State(state): State<AppState>,
    Json(input): Json<ThemeInput>,
) -> Result<(StatusCode, Json<Theme>), ApiError> {
    require_name(&input.name, "Theme name")?;
    let theme = state.db.create_theme(&input).await?;
    Ok((StatusCode::CREATED, Json(theme)))
}

/// PUT /admin/themes/:id
pub async fn update_theme(
    State(state): State<AppState>,
    Path(theme_id): Path<Uuid>,
    Json(input): Json<ThemeInput>,
) -> Result<Json<Theme>, ApiError> {
    require_name(&input.name, "Theme name")?;
    state
        .db
        .update_theme(theme_id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Theme"))
}

/// DELETE /admin/themes/:id
pub async fn delete_theme(
    State(state): State<AppState>,
    Path(theme_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_theme(theme_id).await? {
        return Err(ApiError::not_found("Theme"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/themes/:id/activate
///
/// 트랜잭션으로 나머지 테마 비활성화 후 활성화 (항상 하나만 활성)
pub async fn activate_theme(
    State(state): State<AppState>,
    Path(theme_id): Path<Uuid>,
) -> Result<Json<Theme>, ApiError> {
    let theme = state
        .db
        .activate_theme(theme_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Theme"))?;
    tracing::info!(theme = %theme.id, name = %theme.name, "Theme activated");
    Ok(Json(theme))
}

// ============ Formulas ============

/// GET /admin/formulas
pub async fn list_formulas(State(state): State<AppState>) -> Result<Json<Vec<Formula>>, ApiError> {
    Ok(Json(state.db.list_formulas(false).await?))
}

/// POST /admin/formulas
pub async fn create_formula(
    State(state): State<AppState>,
    Json(input): Json<FormulaInput>,
) -> Result<(StatusCode, Json<Formula>), ApiError> {
    validate_formula(&input)?;
    let formula = state.db.create_formula(&input).await?;
    Ok((StatusCode::CREATED, Json(formula)))
}

/// PUT /admin/formulas/:id
pub async fn update_formula(
    State(state): State<AppState>,
    Path(formula_id): Path<Uuid>,
    Json(input): Json<FormulaInput>,
) -> Result<Json<Formula>, ApiError> {
    validate_formula(&input)?;
    state
        .db
        .update_formula(formula_id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Formula"))
}

/// DELETE /admin/formulas/:id
pub async fn delete_formula(
    State(state): State<AppState>,
    Path(formula_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_formula(formula_id).await? {
        return Err(ApiError::not_found("Formula"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============ PDF Shortcodes ============

/// GET /admin/shortcodes
pub async fn list_shortcodes(
    State(state): State<AppState>,
) -> Result<Json<Vec<PdfShortcode>>, ApiError> {
    Ok(Json(state.db.list_shortcodes().await?))
}

/// POST /admin/shortcodes
pub async fn create_shortcode(
    State(state): State<AppState>,
    Json(input): Json<ShortcodeInput>,
) -> Result<(StatusCode, Json<PdfShortcode>), ApiError> {
    validate_shortcode(&input)?;
    let shortcode = state.db.create_shortcode(&input).await?;
    Ok((StatusCode::CREATED, Json(shortcode)))
}

/// PUT /admin/shortcodes/:id
pub async fn update_shortcode(
    State(state): State<AppState>,
    Path(shortcode_id): Path<Uuid>,
    Json(input): Json<ShortcodeInput>,
) -> Result<Json<PdfShortcode>, ApiError> {
    validate_shortcode(&input)?;
    state
        .db
        .update_shortcode(shortcode_id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Shortcode"))
}

/// DELETE /admin/shortcodes/:id
pub async fn delete_shortcode(
    State(state): State<AppState>,
    Path(shortcode_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_shortcode(shortcode_id).await? {
        return Err(ApiError::not_found("Shortcode"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/shortcodes/preview
pub async fn preview_shortcodes(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<Rendered>, ApiError> {
    let ctx = build_preview_context(&state, &req).await?;
    Ok(Json(ctx.render(&req.template)))
}

// ============ Email Templates ============

/// GET /admin/email-templates
pub async fn list_email_templates(
    State(state): State<AppState>,
) -> Result<Json<Vec<EmailTemplate>>, ApiError> {
    Ok(Json(state.db.list_email_templates().await?))
}

/// POST /admin/email-templates
pub async fn create_email_template(
    State(state): State<AppState>,
    Json(input): Json<EmailTemplateInput>,
) -> Result<(StatusCode, Json<EmailTemplate>), ApiError> {
    require_name(&input.name, "Template name")?;
    let template = state.db.create_email_template(&input).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

/// PUT /admin/email-templates/:id
pub async fn update_email_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    Json(input): Json<EmailTemplateInput>,
) -> Result<Json<EmailTemplate>, ApiError> {
    require_name(&input.name, "Template name")?;
    state
        .db
        .update_email_template(template_id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Email template"))
}

/// DELETE /admin/email-templates/:id
pub async fn delete_email_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_email_template(template_id).await? {
        return Err(ApiError::not_found("Email template"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/email-templates/:id/preview
pub async fn preview_email_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    body: Option<Json<PreviewRequest>>,
) -> Result<Json<EmailPreview>, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let template = state
        .db
        .get_email_template(template_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email template"))?;

    let ctx = build_preview_context(&state, &req).await?;

    Ok(Json(EmailPreview {
        subject: ctx.render(&template.subject),
        body_html: ctx.render(&template.body_html),
    }))
}

// ============ Helpers ============

fn require_name(name: &str, what: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} is required", what)));
    }
    Ok(())
}

fn validate_formula(input: &FormulaInput) -> Result<(), ApiError> {
    let name = input.name.trim();
    let is_identifier = name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !is_identifier {
        return Err(ApiError::BadRequest(format!(
            "Formula name '{}' must be an identifier",
            input.name
        )));
    }
    if SavingsResult::VARIABLE_NAMES.contains(&name) {
        return Err(ApiError::Conflict(format!(
            "Formula name '{}' shadows a calculation field",
            name
        )));
    }

    formula::validate(&input.expression, &SavingsResult::VARIABLE_NAMES)?;
    Ok(())
}

fn validate_shortcode(input: &ShortcodeInput) -> Result<(), ApiError> {
    let code = input.code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
        return Err(ApiError::BadRequest(format!(
            "Shortcode '{}' may only contain letters, digits, '_' and '.'",
            input.code
        )));
    }
    if input.source.trim().is_empty() {
        return Err(ApiError::BadRequest("Shortcode source is required".to_string()));
    }
    if let Some(format) = &input.format {
        if ValueFormat::parse(format).is_none() {
            return Err(ApiError::BadRequest(format!(
                "Unknown format '{}': expected text, currency, number or percent",
                format
            )));
        }
    }
    Ok(())
}

/// 미리보기에 쓰는 샘플 주택
fn sample_property() -> PropertyInput {
    PropertyInput {
        square_meters: 150.0,
        ceiling_height: 2.4,
        residents: 4,
        current_heating_type: HeatingType::Oil,
        annual_heating_cost: None,
    }
}

async fn build_preview_context(
    state: &AppState,
    req: &PreviewRequest,
) -> Result<RenderContext, ApiError> {
    let shortcodes = state.db.list_shortcodes().await?;
    let formulas = state.db.list_formulas(true).await?;

    let mut ctx = match req.lead_id {
        Some(lead_id) => {
            let lead = state
                .db
                .get_lead(lead_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Lead"))?;
            RenderContext::new().with_lead(&lead)
        }
        None => {
            let property = sample_property();
            RenderContext::new()
                .with_value("lead.name", "Ola Nordmann")
                .with_value("lead.email", "ola@example.no")
                .with_value("lead.phone", "+47 912 34 567")
                .with_json("property", &serde_json::to_value(&property).unwrap_or_default())
                .with_calculation(&calculate_heat_pump_savings(&property))
        }
    };

    if let Some(extra) = &req.context {
        ctx = ctx.with_json("", extra);
    }

    Ok(ctx.with_formulas(&formulas).with_shortcodes(&shortcodes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula_input(name: &str, expression: &str) -> FormulaInput {
        FormulaInput {
            name: name.to_string(),
            expression: expression.to_string(),
            description: None,
            is_active: Some(true),
        }
    }

    #[test]
    fn test_formula_validation() {
        assert!(validate_formula(&formula_input("savings_20", "annual_savings * 20")).is_ok());

        assert!(matches!(
            validate_formula(&formula_input("bad name", "1")),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            validate_formula(&formula_input("annual_savings", "1")),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            validate_formula(&formula_input("x", "annual_savings * rate")),
            Err(ApiError::InvalidFormula(formula::FormulaError::UnknownVariable(_)))
        ));
        assert!(matches!(
            validate_formula(&formula_input("x", "(1 + ")),
            Err(ApiError::InvalidFormula(_))
        ));
    }

    #[tokio::test]
    async fn test_deeply_nested_formula_is_unprocessable() {
        use crate::routes::test_support::{app, post_json, send};
        use axum::http::StatusCode;

        let depth = formula::MAX_DEPTH + 1;
        let body = serde_json::json!({
            "name": "nested",
            "expression": format!("{}annual_savings{}", "(".repeat(depth), ")".repeat(depth)),
        });
        let (status, result) = send(app(), post_json("/admin/formulas", body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(result["code"], "INVALID_FORMULA");
    }

    #[test]
    fn test_shortcode_validation() {
        let mut input = ShortcodeInput {
            code: "savings".to_string(),
            description: None,
            source: "calc.annual_savings".to_string(),
            default_value: None,
            format: Some("currency".to_string()),
        };
        assert!(validate_shortcode(&input).is_ok());

        input.format = Some("roman".to_string());
        assert!(validate_shortcode(&input).is_err());

        input.format = None;
        input.code = "{{savings}}".to_string();
        assert!(validate_shortcode(&input).is_err());
    }

    #[test]
    fn test_sample_property_is_in_range() {
        assert!(crate::services::lead_validation::validate_property(&sample_property()).is_empty());
    }
}
