//! WebSocket Routes
//!
//! 공개 계산기 세션의 실시간 알림 엔드포인트
//!
//! # Endpoints
//! - `GET /ws/:session_id` - 세션 채널 구독 (RevealNext / CardCompleted push)
//!
//! 세션의 마지막 소켓이 닫히면 대기 중인 `after_delay` 공개도 취소

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::session::parse_session;
use crate::services::websocket::{
    parse_client_message, serialize_message, unix_now, ClientMessage, ConnectionInfo,
    SubscriptionConfirm,
};
use crate::services::WsMessage;
use crate::types::SessionId;
use crate::AppState;

/// WebSocket 업그레이드 핸들러
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let session_id = match parse_session(&session_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

/// WebSocket 연결 처리
async fn handle_socket(socket: WebSocket, state: AppState, session_id: SessionId) {
    let hub = state.ws_hub.clone();
    let (mut sender, mut receiver) = socket.split();

    // 세션 채널 구독
    let mut session_rx = hub.subscribe_session(&session_id).await;

    // 연결 등록
    let conn_id = uuid::Uuid::new_v4().to_string();
    hub.register_connection(ConnectionInfo {
        id: conn_id.clone(),
        session_id: session_id.clone(),
        connected_at: unix_now(),
    })
    .await;
    tracing::info!(session = %session_id, connection = %conn_id, "WebSocket connected");

    // 수신 태스크 → 송신 태스크로 직접 응답 (Pong)
    let (reply_tx, mut reply_rx) = mpsc::channel::<WsMessage>(8);

    let subscribed = WsMessage::Subscribed(SubscriptionConfirm {
        session_id: session_id.to_string(),
        subscribed: true,
    });
    let _ = reply_tx.try_send(subscribed);

    // 수신 태스크
    let recv_session = session_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match parse_client_message(&text) {
                    Ok(ClientMessage::Ping) => {
                        if reply_tx.send(WsMessage::Pong).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(session = %recv_session, error = %e, "Ignoring client message");
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // 송신 태스크
    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                Some(msg) = reply_rx.recv() => msg,
                result = session_rx.recv() => match result {
                    Ok(msg) => msg,
                    // 느린 소켓: 밀린 메시지는 버리고 계속
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WebSocket receiver lagged");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            };

            let json = match serialize_message(&msg) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to serialize WebSocket message");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // 연결이 종료될 때까지 대기
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    }

    // 연결 해제
    let remaining = hub.unregister_connection(&conn_id).await;
    if remaining == 0 {
        let cancelled = state.engine.abandon_pending_reveals(&session_id).await;
        hub.release_session(&session_id).await;
        tracing::info!(session = %session_id, cancelled, "Last session socket closed");
    } else {
        tracing::info!(session = %session_id, remaining, "WebSocket disconnected");
    }
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{app, get, send};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_plain_get_without_upgrade_is_rejected() {
        let (status, _) = send(app(), get("/ws/sess-1")).await;
        assert!(status.is_client_error());
        assert_ne!(status, StatusCode::NOT_FOUND);
    }
}
