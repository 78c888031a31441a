//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의

use std::fmt;

use serde::{Serialize, Serializer};

/// 계산기 세션 식별자
///
/// 클라이언트가 생성하는 opaque 토큰. 서버는 형식만 검사하고
/// 의미는 부여하지 않음 (completion row의 correlation key 용도)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub const MAX_LEN: usize = 128;

    pub fn new(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("Session id must not be empty".to_string());
        }
        if raw.len() > Self::MAX_LEN {
            return Err(format!("Session id longer than {} characters", Self::MAX_LEN));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err("Session id may only contain [A-Za-z0-9_-]".to_string());
        }
        Ok(Self(raw.to_string()))
    }

    /// 서버에서 새 세션 발급 (UUID v4)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Best-effort 작업 결과
///
/// # Design Decision
///
/// completion 추적은 UX 순서 제어용 데이터라서, 저장 실패가
/// 사용자의 계산기 진행을 막으면 안 됨.
/// - 실패는 `tracing::warn!`으로 남기고 `Dropped`로 삼킴
/// - JSON으로는 `Recorded(v)` → `v`, `Dropped` → `null`
#[derive(Debug, Clone, PartialEq)]
pub enum BestEffort<T> {
    Recorded(T),
    Dropped,
}

impl<T> BestEffort<T> {
    /// `Result`를 best-effort 결과로 변환 (에러는 로그 후 버림)
    pub fn from_result<E: fmt::Display>(operation: &'static str, result: Result<T, E>) -> Self {
        match result {
            Ok(value) => BestEffort::Recorded(value),
            Err(e) => {
                tracing::warn!(operation, error = %e, "best-effort write dropped");
                BestEffort::Dropped
            }
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, BestEffort::Recorded(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            BestEffort::Recorded(v) => Some(v),
            BestEffort::Dropped => None,
        }
    }
}

impl<T: Serialize> Serialize for BestEffort<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BestEffort::Recorded(v) => serializer.serialize_some(v),
            BestEffort::Dropped => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_valid() {
        let id = SessionId::new("sess_1a2b-3c");
        assert!(id.is_ok());
        assert_eq!(id.unwrap().as_str(), "sess_1a2b-3c");
    }

    #[test]
    fn test_session_id_invalid() {
        assert!(SessionId::new("").is_err());
        assert!(SessionId::new("has space").is_err());
        assert!(SessionId::new(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_generated_session_id_roundtrips() {
        let id = SessionId::generate();
        assert!(SessionId::new(id.as_str()).is_ok());
    }

    #[test]
    fn test_best_effort_swallows_error() {
        let result: Result<u32, anyhow::Error> = Err(anyhow::anyhow!("connection refused"));
        let outcome = BestEffort::from_result("upsert", result);
        assert_eq!(outcome, BestEffort::Dropped);
        assert_eq!(serde_json::to_string(&outcome).unwrap(), "null");
    }

    #[test]
    fn test_best_effort_serializes_value() {
        let outcome = BestEffort::from_result::<String>("upsert", Ok(7u32));
        assert!(outcome.is_recorded());
        assert_eq!(serde_json::to_string(&outcome).unwrap(), "7");
    }
}
