//! Shortcode Rendering
//!
//! PDF/이메일 템플릿의 placeholder 치환
//!
//! ```text
//! {{lead.name}}        → render context 값
//! {{annual_savings}}   → 관리자 정의 shortcode (source 경로 + format)
//! [calc:payback_years] → 계산 결과 필드, 없으면 같은 이름의 formula
//! ```
//!
//! 알 수 없는 토큰은 빈 문자열로 치환하고 `missing`에 기록

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;

use super::calculator::SavingsResult;
use super::formula;
use crate::db::{Formula, Lead, PdfShortcode};

fn re_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}|\[calc:([A-Za-z0-9_]+)\]")
            .expect("Invalid shortcode regex")
    })
}

/// shortcode 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    Text,
    Currency,
    Number,
    Percent,
}

impl ValueFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(ValueFormat::Text),
            "currency" => Some(ValueFormat::Currency),
            "number" => Some(ValueFormat::Number),
            "percent" => Some(ValueFormat::Percent),
            _ => None,
        }
    }

    fn apply(self, raw: &str) -> String {
        let number = match self {
            ValueFormat::Text => return raw.to_string(),
            _ => match raw.trim().parse::<f64>() {
                Ok(n) => n,
                Err(_) => return raw.to_string(),
            },
        };

        match self {
            ValueFormat::Currency => group_thousands(number.round() as i64),
            ValueFormat::Number => format_number(number),
            ValueFormat::Percent => format!("{:.1}%", number),
            ValueFormat::Text => raw.to_string(),
        }
    }
}

/// 12345 → "12 345"
fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// 소수 둘째 자리까지, 불필요한 0 제거
fn format_number(value: f64) -> String {
    let text = format!("{:.2}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// 렌더링 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rendered {
    pub output: String,
    /// 치환하지 못한 토큰 (중복 제거, 등장 순)
    pub missing: Vec<String>,
}

/// 치환에 쓰이는 값 모음
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    values: HashMap<String, String>,
    calc_vars: HashMap<String, f64>,
    formulas: HashMap<String, String>,
    shortcodes: HashMap<String, PdfShortcode>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// JSON 객체를 dotted key로 펼쳐서 추가 (`{"lead": {"name": "Kari"}}` → `lead.name`)
    pub fn with_json(mut self, prefix: &str, value: &Value) -> Self {
        flatten_json(prefix, value, &mut self.values);
        self
    }

    pub fn with_lead(self, lead: &Lead) -> Self {
        let mut ctx = self
            .with_value("lead.name", lead.name.clone())
            .with_value("lead.email", lead.email.clone())
            .with_value("lead.phone", lead.phone.clone())
            .with_value("lead.created_at", lead.created_at.format("%Y-%m-%d").to_string())
            .with_json("property", &lead.property)
            .with_json("answers", &lead.answers);

        if let Some(address) = &lead.address {
            ctx = ctx.with_value("lead.address", address.clone());
        }
        if let Some(postal_code) = &lead.postal_code {
            ctx = ctx.with_value("lead.postal_code", postal_code.clone());
        }

        // 저장된 계산 결과도 calc.* 로 노출
        match serde_json::from_value::<SavingsResult>(lead.calculation.clone()) {
            Ok(result) => ctx.with_calculation(&result),
            Err(_) => ctx.with_json("calc", &lead.calculation),
        }
    }

    pub fn with_calculation(mut self, result: &SavingsResult) -> Self {
        for (name, value) in result.variables() {
            self.values.insert(format!("calc.{}", name), format_number(value));
            self.calc_vars.insert(name.to_string(), value);
        }
        self
    }

    /// 활성 formula만 등록
    pub fn with_formulas(mut self, formulas: &[Formula]) -> Self {
        for f in formulas.iter().filter(|f| f.is_active) {
            self.formulas.insert(f.name.clone(), f.expression.clone());
        }
        self
    }

    pub fn with_shortcodes(mut self, shortcodes: &[PdfShortcode]) -> Self {
        for sc in shortcodes {
            self.shortcodes.insert(sc.code.clone(), sc.clone());
        }
        self
    }

    fn resolve_token(&self, key: &str) -> Option<String> {
        if let Some(sc) = self.shortcodes.get(key) {
            let format = ValueFormat::parse(&sc.format).unwrap_or(ValueFormat::Text);
            return self
                .values
                .get(&sc.source)
                .map(|v| format.apply(v))
                .or_else(|| sc.default_value.clone());
        }
        self.values.get(key).cloned()
    }

    fn resolve_calc(&self, name: &str) -> Option<String> {
        if let Some(value) = self.calc_vars.get(name) {
            return Some(format_number(*value));
        }

        let expression = self.formulas.get(name)?;
        match formula::evaluate(expression, &self.calc_vars) {
            Ok(value) => Some(format_number(value)),
            Err(e) => {
                tracing::warn!(formula = name, error = %e, "Formula evaluation failed");
                None
            }
        }
    }

    /// 템플릿 치환
    pub fn render(&self, template: &str) -> Rendered {
        let mut missing: Vec<String> = Vec::new();

        let output = re_token().replace_all(template, |caps: &Captures| {
            let (resolved, token) = match (caps.get(1), caps.get(2)) {
                (Some(key), _) => (self.resolve_token(key.as_str()), key.as_str()),
                (None, Some(calc)) => (self.resolve_calc(calc.as_str()), &caps[0]),
                (None, None) => (None, &caps[0]),
            };

            resolved.unwrap_or_else(|| {
                if !missing.iter().any(|m| m == token) {
                    missing.push(token.to_string());
                }
                String::new()
            })
        });

        Rendered {
            output: output.into_owned(),
            missing,
        }
    }
}

fn flatten_json(prefix: &str, value: &Value, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten_json(&key, v, out);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}
