//! Delayed Reveal Scheduler
//!
//! # Interview Q&A
//!
//! Q: `after_delay` 타이머는 어디에 저장되는가?
//! A: 저장하지 않음 (in-process tokio 타이머)
//!    - 세션 소켓이 끊기거나 세션이 초기화되면 abort
//!    - 서버 재시작 시에도 사라짐 → 다음 카드는 공개되지 않고 에러도 없음
//!    - 공개는 UX 연출일 뿐이라 유실돼도 사용자는 새로고침으로 복구 가능
//!
//! Q: 왜 세션별로 JoinHandle을 들고 있는가?
//! A: teardown 시 정확히 그 세션의 타이머만 취소하기 위해
//!    - 발화한 타이머는 스스로 자기 handle을 지움 (소켓 없는 세션도 map에 남지 않음)

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use uuid::Uuid;

use super::websocket::{unix_now, CardCompletedEvent, RevealEvent, WsHub, WsMessage};
use crate::types::SessionId;

type PendingReveals = Arc<Mutex<HashMap<SessionId, Vec<(u64, JoinHandle<()>)>>>>;

/// 다음 카드 공개 스케줄러
pub struct RevealScheduler {
    hub: Arc<WsHub>,
    pending: PendingReveals,
    next_id: AtomicU64,
}

impl RevealScheduler {
    pub fn new(hub: Arc<WsHub>) -> Self {
        Self {
            hub,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// 카드 완료 알림 (공개 타이밍과 무관하게 즉시)
    pub async fn announce_completed(&self, session_id: &SessionId, card_id: Uuid, trigger: &str) {
        let event = CardCompletedEvent {
            session_id: session_id.to_string(),
            card_id,
            trigger: trigger.to_string(),
            timestamp: unix_now(),
        };
        self.hub
            .send_to_session(session_id, WsMessage::CardCompleted(event))
            .await;
    }

    /// 즉시 공개
    pub async fn reveal_now(&self, session_id: &SessionId, mut event: RevealEvent) {
        event.delay_seconds = 0;
        event.timestamp = unix_now();
        let delivered = self
            .hub
            .send_to_session(session_id, WsMessage::RevealNext(event))
            .await;
        tracing::debug!(session = %session_id, delivered, "Reveal sent immediately");
    }

    /// `delay` 후 공개 예약
    ///
    /// 타이머가 끝나기 전에 `cancel_session`이 호출되면 아무것도 보내지 않음
    pub async fn schedule(&self, session_id: &SessionId, event: RevealEvent, delay: Duration) {
        let hub = self.hub.clone();
        let pending = self.pending.clone();
        let session = session_id.clone();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // spawn + 등록을 한 lock 안에서: 타이머가 등록보다 먼저 정리를 시도할 수 없음
        let mut guard = self.pending.lock().await;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut event = event;
            event.timestamp = unix_now();
            let delivered = hub.send_to_session(&session, WsMessage::RevealNext(event)).await;
            tracing::debug!(session = %session, delivered, "Delayed reveal fired");

            let mut pending = pending.lock().await;
            if let Some(handles) = pending.get_mut(&session) {
                handles.retain(|(handle_id, _)| *handle_id != id);
                if handles.is_empty() {
                    pending.remove(&session);
                }
            }
        });

        guard.entry(session_id.clone()).or_default().push((id, handle));
        drop(guard);

        tracing::debug!(
            session = %session_id,
            delay_ms = delay.as_millis() as u64,
            "Reveal scheduled"
        );
    }

    /// 세션의 대기 중인 타이머 전부 취소, 취소된 개수 반환
    pub async fn cancel_session(&self, session_id: &SessionId) -> usize {
        let handles = self.pending.lock().await.remove(session_id).unwrap_or_default();

        let mut cancelled = 0;
        for (_, handle) in handles {
            if !handle.is_finished() {
                handle.abort();
                cancelled += 1;
            }
        }

        if cancelled > 0 {
            tracing::info!(session = %session_id, cancelled, "Pending reveals cancelled");
        }
        cancelled
    }

    /// 아직 발화하지 않은 타이머 수
    pub async fn pending_count(&self, session_id: &SessionId) -> usize {
        let pending = self.pending.lock().await;
        pending
            .get(session_id)
            .map(|handles| handles.iter().filter(|(_, h)| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// 대기 중인 타이머가 있는 세션 수
    pub async fn tracked_sessions(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn setup() -> (Arc<WsHub>, RevealScheduler, SessionId) {
        let hub = Arc::new(WsHub::new());
        let scheduler = RevealScheduler::new(hub.clone());
        (hub, scheduler, SessionId::new("sess-reveal").unwrap())
    }

    fn event(session: &SessionId, delay_seconds: u32) -> RevealEvent {
        RevealEvent {
            session_id: session.to_string(),
            card_id: Uuid::new_v4(),
            next_card_id: Some(Uuid::new_v4()),
            delay_seconds,
            timestamp: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_reveal_fires_no_earlier_than_delay() {
        let (hub, scheduler, session) = setup();
        let mut rx = hub.subscribe_session(&session).await;

        let start = Instant::now();
        scheduler
            .schedule(&session, event(&session, 3), Duration::from_secs(3))
            .await;

        // 2.9초 시점: 아직 없음
        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert!(rx.try_recv().is_err());

        match rx.recv().await {
            Ok(WsMessage::RevealNext(received)) => assert_eq!(received.delay_seconds, 3),
            other => panic!("Expected RevealNext, got {:?}", other),
        }
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_reveal_never_fires() {
        let (hub, scheduler, session) = setup();
        let mut rx = hub.subscribe_session(&session).await;

        scheduler
            .schedule(&session, event(&session, 3), Duration::from_secs(3))
            .await;
        assert_eq!(scheduler.pending_count(&session).await, 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.cancel_session(&session).await, 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(scheduler.pending_count(&session).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_reveals_are_pruned() {
        let (_hub, scheduler, _) = setup();

        for i in 0..100 {
            let session = SessionId::new(&format!("sess-{}", i)).unwrap();
            scheduler
                .schedule(&session, event(&session, 1), Duration::from_secs(1))
                .await;
        }
        assert_eq!(scheduler.tracked_sessions().await, 100);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(scheduler.tracked_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_reveal_now_is_synchronous() {
        let (hub, scheduler, session) = setup();
        let mut rx = hub.subscribe_session(&session).await;

        scheduler.reveal_now(&session, event(&session, 0)).await;

        match rx.try_recv() {
            Ok(WsMessage::RevealNext(received)) => assert_eq!(received.delay_seconds, 0),
            other => panic!("Expected RevealNext, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_only_affects_own_session() {
        let (hub, scheduler, session) = setup();
        let other = SessionId::new("sess-other").unwrap();
        let mut rx_other = hub.subscribe_session(&other).await;

        scheduler
            .schedule(&session, event(&session, 2), Duration::from_secs(2))
            .await;
        scheduler
            .schedule(&other, event(&other, 2), Duration::from_secs(2))
            .await;
        scheduler.cancel_session(&session).await;

        assert!(matches!(rx_other.recv().await, Ok(WsMessage::RevealNext(_))));
    }
}
