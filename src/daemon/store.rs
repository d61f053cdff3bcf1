//! 애플리케이션 store.
//!
//! 쓰기 규칙: snapshot과 상태 테이블은 Poller의 publish 단계만 쓴다.
//! 다른 컴포넌트는 읽기 접근자만 사용한다.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::domain::models::Snapshot;
use crate::domain::state::PrState;

/// Poller가 cycle 결과를 게시하는 대상. 모든 메서드는 fire-and-forget, 멱등.
pub trait Store: Send + Sync {
    fn replace_snapshot(&self, snapshot: Arc<Snapshot>);
    fn set_state(&self, key: &str, state: PrState);
    fn set_polling(&self, polling: bool);
    fn set_last_poll_at(&self, at: DateTime<Utc>);
}

#[derive(Default)]
struct StoreInner {
    snapshot: Arc<Snapshot>,
    states: BTreeMap<String, PrState>,
    polling: bool,
    last_poll_at: Option<DateTime<Utc>>,
}

/// 인메모리 Store. 호스트(dashboard, notifier 등)는 읽기 접근자로 상태를 조회한다.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.read().snapshot)
    }

    pub fn state(&self, key: &str) -> Option<PrState> {
        self.read().states.get(key).copied()
    }

    pub fn states(&self) -> BTreeMap<String, PrState> {
        self.read().states.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.read().polling
    }

    pub fn last_poll_at(&self) -> Option<DateTime<Utc>> {
        self.read().last_poll_at
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Store for MemoryStore {
    /// snapshot 교체. 사라진 PR의 상태도 함께 정리한다.
    fn replace_snapshot(&self, snapshot: Arc<Snapshot>) {
        let mut inner = self.write();
        inner.states.retain(|key, _| snapshot.contains_key(key));
        inner.snapshot = snapshot;
    }

    fn set_state(&self, key: &str, state: PrState) {
        self.write().states.insert(key.to_string(), state);
    }

    fn set_polling(&self, polling: bool) {
        self.write().polling = polling;
    }

    fn set_last_poll_at(&self, at: DateTime<Utc>) {
        self.write().last_poll_at = Some(at);
    }
}
