//! Heat Pump Lead API Server
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Client (Admin builder / Public calculator)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  HTTP + WebSocket
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum Web Server                         │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                      Routes Layer                        ││
//! │  │  /flow  /sessions/*  /calculator/*  /leads  /admin/*    ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Services Layer                        ││
//! │  │  CompletionEngine  RevealScheduler  Calculator  Render  ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Data Layer                            ││
//! │  │  PostgreSQL (Supabase) via SQLx                         ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// 라이브러리에서 가져오기
use heatpump_lead_api::{routes, AppState, Config, Database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    // RUST_LOG=debug,sqlx=warn 형태로 레벨 제어 가능
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "heatpump_lead_api=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting Heat Pump Lead API Server");

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!(environment = ?config.environment, "📋 Configuration loaded");

    // 데이터베이스 연결
    let db = Database::connect(&config.database_url, config.db_max_connections).await?;
    tracing::info!("🗄️  Database connected");

    // 마이그레이션 실행
    if config.run_migrations {
        db.run_migrations().await?;
        tracing::info!("📦 Migrations completed");
    }

    // 앱 상태 구성 (WsHub → RevealScheduler → CompletionEngine)
    let port = config.port;
    let state = AppState::new(db, config);
    tracing::info!("🧩 Completion engine initialized");

    // 라우터 구성
    let app = routes::create_router(state);

    // 서버 시작
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("🌐 Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
