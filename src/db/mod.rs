//! Database Module
//!
//! # Interview Q&A
//!
//! Q: 호스팅 DB(Supabase)를 왜 SDK 대신 SQLx로 직접 붙는가?
//! A: Supabase도 결국 PostgreSQL
//!
//!    1. 연결 문자열 하나로 접속 (pooler 주소 그대로 사용)
//!    2. JSONB: 카드 config, 테마 색상, 계산 결과를 그대로 저장
//!    3. UNIQUE 제약 + ON CONFLICT: completion upsert를 DB 원자성에 위임
//!    4. 마이그레이션 내장 (`migrations/`)
//!
//! Q: completion upsert에 별도의 락이 필요한가?
//! A: 필요 없음
//!    - (card_id, field_name, session_id) / (card_id, session_id) UNIQUE
//!    - `INSERT ... ON CONFLICT DO UPDATE` 는 last-write-wins
//!    - 같은 세션을 두 탭에서 열어도 마지막 값이 남을 뿐
//!
//! Q: 커넥션 풀은 어떻게 관리하는가?
//! A: SQLx의 PgPool 사용
//!    - 최소/최대 커넥션 수 설정
//!    - acquire timeout 3초
//!    - 재시도 정책은 없음 (completion 쓰기는 best-effort)

mod cards;
mod completions;
mod content;
mod leads;
mod models;
pub mod repository;

pub use models::*;
pub use repository::CompletionStore;

use std::time::Duration;

use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// 데이터베이스 연결 및 쿼리 담당
///
/// 테이블별 쿼리는 하위 모듈(`cards`, `completions`, `leads`, `content`)의
/// `impl Database` 블록에 나뉘어 있음
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 설정값 (기본 10)
    /// - min_connections: 1 (idle 시 최소 유지)
    /// - acquire_timeout: 3초 (커넥션 획득 대기)
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 실제 연결 없이 풀만 구성 (첫 쿼리 시점에 연결)
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy(database_url)?;

        Ok(Self { pool })
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
