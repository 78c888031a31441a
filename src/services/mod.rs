//! Services Module
//!
//! 비즈니스 로직을 담당하는 서비스 레이어
//!
//! # Services
//! - `CompletionEngine`: 카드 완료 판정 + 다음 카드 공개
//! - `RevealScheduler`: `after_delay` 공개 타이머
//! - `WsHub`: 세션별 WebSocket push
//! - `calculator`: 히트펌프 절감액 계산
//! - `shortcode` / `formula`: 템플릿 치환과 관리자 계산식
//! - `lead_validation`: 공개 lead 제출 검증

pub mod calculator;
pub mod completion;
pub mod flow_rules;
pub mod formula;
pub mod lead_validation;
pub mod reveal;
pub mod shortcode;
pub mod websocket;

pub use calculator::{calculate_heat_pump_savings, HeatingType, PropertyInput, SavingsResult};
pub use completion::{CardCheck, CompletionEngine, FieldChange};
pub use flow_rules::{CardType, CompletionRule, FlowRules, RevealTiming};
pub use lead_validation::{FieldError, LeadSubmission};
pub use reveal::RevealScheduler;
pub use shortcode::{RenderContext, Rendered};
pub use websocket::{WsHub, WsMessage};
