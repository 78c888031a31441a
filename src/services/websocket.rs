//! WebSocket Service
//!
//! Session-scoped push channel for the public calculator.
//!
//! # Features
//! - Next-card reveal notifications (immediate and delayed)
//! - Card completion notifications
//! - Connection registry

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::types::SessionId;

/// WebSocket 메시지 타입
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// 다음 카드 공개 허용
    RevealNext(RevealEvent),
    /// 카드 완료
    CardCompleted(CardCompletedEvent),
    /// 에러
    Error(WsError),
    /// 구독 확인
    Subscribed(SubscriptionConfirm),
    /// Heartbeat
    Ping,
    Pong,
}

/// 다음 카드 공개 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealEvent {
    pub session_id: String,
    /// 방금 완료된 카드
    pub card_id: Uuid,
    /// 공개될 카드 (마지막 카드면 None)
    pub next_card_id: Option<Uuid>,
    /// 0이면 즉시 공개
    pub delay_seconds: u32,
    pub timestamp: u64,
}

/// 카드 완료 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardCompletedEvent {
    pub session_id: String,
    pub card_id: Uuid,
    pub trigger: String,
    pub timestamp: u64,
}

/// WebSocket 에러
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsError {
    pub code: i32,
    pub message: String,
}

/// 구독 확인
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfirm {
    pub session_id: String,
    pub subscribed: bool,
}

/// 연결 상태
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: String,
    pub session_id: SessionId,
    pub connected_at: u64,
}

/// WebSocket Hub
///
/// 세션별 broadcast 채널과 연결 정보를 관리
///
/// # Architecture
/// ```text
/// ┌──────────────────┐     ┌──────────────┐     ┌──────────────────┐
/// │ CompletionEngine │────▶│              │────▶│ session A socket │
/// ├──────────────────┤     │    WsHub     │     ├──────────────────┤
/// │ RevealScheduler  │────▶│  (Router)    │────▶│ session B socket │
/// └──────────────────┘     └──────────────┘     └──────────────────┘
/// ```
pub struct WsHub {
    /// 세션별 채널
    session_channels: Arc<RwLock<HashMap<SessionId, broadcast::Sender<WsMessage>>>>,
    /// 연결 정보
    connections: Arc<RwLock<HashMap<String, ConnectionInfo>>>,
}

impl WsHub {
    const SESSION_CHANNEL_CAPACITY: usize = 64;

    /// 새 WsHub 생성
    pub fn new() -> Self {
        Self {
            session_channels: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 세션 채널 구독 (없으면 생성)
    pub async fn subscribe_session(&self, session_id: &SessionId) -> broadcast::Receiver<WsMessage> {
        let mut channels = self.session_channels.write().await;

        let tx = channels.entry(session_id.clone()).or_insert_with(|| {
            let (tx, _) = broadcast::channel(Self::SESSION_CHANNEL_CAPACITY);
            tx
        });

        tx.subscribe()
    }

    /// 세션에 메시지 전송
    ///
    /// 구독자가 없으면 조용히 버림. 전달된 수신자 수 반환
    pub async fn send_to_session(&self, session_id: &SessionId, message: WsMessage) -> usize {
        let channels = self.session_channels.read().await;
        match channels.get(session_id) {
            Some(tx) => tx.send(message).unwrap_or(0),
            None => 0,
        }
    }

    /// 수신자가 없는 세션 채널 정리
    pub async fn release_session(&self, session_id: &SessionId) {
        let mut channels = self.session_channels.write().await;
        if channels
            .get(session_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            channels.remove(session_id);
        }
    }

    /// 세션에 살아있는 소켓이 있는지
    pub async fn has_listeners(&self, session_id: &SessionId) -> bool {
        let channels = self.session_channels.read().await;
        channels
            .get(session_id)
            .is_some_and(|tx| tx.receiver_count() > 0)
    }

    /// 연결 등록
    pub async fn register_connection(&self, info: ConnectionInfo) {
        let mut conns = self.connections.write().await;
        conns.insert(info.id.clone(), info);
    }

    /// 연결 해제, 같은 세션의 남은 연결 수 반환
    pub async fn unregister_connection(&self, id: &str) -> usize {
        let mut conns = self.connections.write().await;
        match conns.remove(id) {
            Some(info) => conns
                .values()
                .filter(|c| c.session_id == info.session_id)
                .count(),
            None => 0,
        }
    }

    /// 활성 연결 수
    pub async fn active_connections(&self) -> usize {
        let conns = self.connections.read().await;
        conns.len()
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket 클라이언트 메시지 (수신)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientMessage {
    /// Ping (keepalive)
    Ping,
}

/// 클라이언트 메시지 파싱
pub fn parse_client_message(data: &str) -> Result<ClientMessage> {
    serde_json::from_str(data).map_err(Into::into)
}

/// 서버 메시지 직렬화
pub fn serialize_message(msg: &WsMessage) -> Result<String> {
    serde_json::to_string(msg).map_err(Into::into)
}

/// 현재 unix 시각 (초)
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(raw: &str) -> SessionId {
        SessionId::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_ws_hub_creation() {
        let hub = WsHub::new();
        assert_eq!(hub.active_connections().await, 0);
    }

    #[tokio::test]
    async fn test_session_message_delivery() {
        let hub = WsHub::new();
        let s = session("sess-a");
        let mut rx = hub.subscribe_session(&s).await;

        let event = RevealEvent {
            session_id: s.to_string(),
            card_id: Uuid::new_v4(),
            next_card_id: None,
            delay_seconds: 0,
            timestamp: 1234567890,
        };
        let delivered = hub.send_to_session(&s, WsMessage::RevealNext(event.clone())).await;
        assert_eq!(delivered, 1);

        if let Ok(WsMessage::RevealNext(received)) = rx.recv().await {
            assert_eq!(received, event);
        } else {
            panic!("Expected RevealNext message");
        }
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let hub = WsHub::new();
        let mut rx_b = hub.subscribe_session(&session("sess-b")).await;

        hub.send_to_session(&session("sess-a"), WsMessage::Ping).await;
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_release_session_after_last_receiver() {
        let hub = WsHub::new();
        let s = session("sess-c");
        let rx = hub.subscribe_session(&s).await;
        assert!(hub.has_listeners(&s).await);

        drop(rx);
        hub.release_session(&s).await;
        assert!(!hub.has_listeners(&s).await);
        assert_eq!(hub.send_to_session(&s, WsMessage::Ping).await, 0);
    }

    #[tokio::test]
    async fn test_connection_registry_counts_per_session() {
        let hub = WsHub::new();
        let s = session("sess-d");
        for id in ["c1", "c2"] {
            hub.register_connection(ConnectionInfo {
                id: id.to_string(),
                session_id: s.clone(),
                connected_at: unix_now(),
            })
            .await;
        }

        assert_eq!(hub.active_connections().await, 2);
        assert_eq!(hub.unregister_connection("c1").await, 1);
        assert_eq!(hub.unregister_connection("c2").await, 0);
    }

    #[test]
    fn test_message_serialization() {
        let msg = WsMessage::Ping;
        let json = serialize_message(&msg).unwrap();
        assert!(json.contains("Ping"));
    }

    #[test]
    fn test_client_message_parsing() {
        let msg = parse_client_message(r#"{"action":"Ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }
}
