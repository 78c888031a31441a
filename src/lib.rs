//! Heat Pump Lead API Library
//!
//! # Overview
//!
//! 히트펌프 절감액 계산기 + lead 수집 콘솔의 백엔드 API
//!
//! - 관리자: 카드/필드/테마/계산식/shortcode/이메일 템플릿 편집
//! - 공개 계산기: 카드 순서대로 입력 → 완료 시 다음 카드 공개 → 절감액 계산 → lead 저장
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         API                              │
//! │                                                          │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐    │
//! │  │ Routes  │  │Services │  │   DB    │  │  Types  │    │
//! │  └────┬────┘  └────┬────┘  └────┬────┘  └────┬────┘    │
//! │       │            │            │            │          │
//! │       └────────────┴────────────┴────────────┘          │
//! │                         │                                │
//! └─────────────────────────┼────────────────────────────────┘
//!                           │
//!                           ▼
//!                  ┌────────────────┐
//!                  │ PostgreSQL     │
//!                  │ (Supabase)     │
//!                  └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 처리
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: 비즈니스 로직 (완료 엔진, 계산기, shortcode)
//! - `db`: 데이터베이스 연동
//! - `types`: 공통 타입 정의
//!
//! ## Usage
//!
//! ```rust,ignore
//! use heatpump_lead_api::{config::Config, db::Database, routes, AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Database::connect(&config.database_url, config.db_max_connections).await?;
//!     let app = routes::create_router(AppState::new(db, config));
//!
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod services;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use db::Database;
pub use error::ApiError;
pub use services::{CompletionEngine, WsHub};

use services::RevealScheduler;

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub engine: Arc<CompletionEngine>,
    pub ws_hub: Arc<WsHub>,
    pub config: Arc<Config>,
}

impl AppState {
    /// hub → reveal scheduler → completion engine 순서로 조립
    pub fn new(db: Database, config: Config) -> Self {
        let db = Arc::new(db);
        let ws_hub = Arc::new(WsHub::new());
        let reveals = Arc::new(RevealScheduler::new(ws_hub.clone()));
        let engine = Arc::new(CompletionEngine::new(db.clone(), reveals));

        Self {
            db,
            engine,
            ws_hub,
            config: Arc::new(config),
        }
    }
}
