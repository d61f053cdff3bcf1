use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::{MemoryStore, Store};
use crate::domain::models::Snapshot;
use crate::domain::state::PrState;

// ─── Status file models ───

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchStatus {
    pub updated_at: String,
    pub uptime_secs: u64,
    pub polling: bool,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub prs: Vec<StatusItem>,
    pub counters: StateCounters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusItem {
    pub key: String,
    pub title: String,
    pub url: String,
    pub state: PrState,
    pub is_draft: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StateCounters {
    pub hot: u64,
    pub waiting: u64,
    pub ready: u64,
    pub dormant: u64,
    pub blocked: u64,
}

impl StateCounters {
    fn bump(&mut self, state: PrState) {
        match state {
            PrState::Hot => self.hot += 1,
            PrState::Waiting => self.waiting += 1,
            PrState::Ready => self.ready += 1,
            PrState::Dormant => self.dormant += 1,
            PrState::Blocked => self.blocked += 1,
        }
    }
}

// ─── Build / Write / Read ───

/// 게시된 snapshot + 상태 테이블을 WatchStatus로 변환.
/// 상태가 아직 계산되지 않은 PR은 건너뛴다.
pub fn build_status(
    snapshot: &Snapshot,
    states: &BTreeMap<String, PrState>,
    polling: bool,
    last_poll_at: Option<DateTime<Utc>>,
    start_time: std::time::Instant,
) -> WatchStatus {
    let mut counters = StateCounters::default();
    let mut prs = Vec::with_capacity(snapshot.len());

    for (key, pr) in snapshot {
        let Some(state) = states.get(key).copied() else {
            continue;
        };
        counters.bump(state);
        prs.push(StatusItem {
            key: key.clone(),
            title: pr.title.clone(),
            url: pr.url.clone(),
            state,
            is_draft: pr.is_draft,
            updated_at: pr.updated_at,
        });
    }

    WatchStatus {
        updated_at: chrono::Local::now().to_rfc3339(),
        uptime_secs: start_time.elapsed().as_secs(),
        polling,
        last_poll_at,
        prs,
        counters,
    }
}

/// Atomic write: tmp → rename
pub fn write_status(path: &Path, status: &WatchStatus) {
    let json = match serde_json::to_string_pretty(status) {
        Ok(j) => j,
        Err(e) => {
            tracing::warn!("failed to serialize status: {e}");
            return;
        }
    };

    let tmp = path.with_extension("tmp");
    if let Err(e) = std::fs::write(&tmp, &json) {
        tracing::warn!("failed to write status tmp file: {e}");
        return;
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        tracing::warn!("failed to rename status file: {e}");
    }
}

/// status file 읽기 (없거나 파싱 실패 시 None)
pub fn read_status(path: &Path) -> Option<WatchStatus> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}

/// watch 종료 시 status file 삭제
pub fn remove_status(path: &Path) {
    let _ = std::fs::remove_file(path);
}

// ─── StatusFileStore ───

/// MemoryStore + status file.
///
/// publish 마지막 단계(`set_last_poll_at`)와 polling 플래그 변경 시 파일을 갱신하므로
/// `prwatch status`가 별도 프로세스에서 현재 상태를 읽을 수 있다.
pub struct StatusFileStore {
    memory: Arc<MemoryStore>,
    path: PathBuf,
    start_time: std::time::Instant,
}

impl StatusFileStore {
    pub fn new(memory: Arc<MemoryStore>, path: PathBuf) -> Self {
        Self {
            memory,
            path,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    fn flush(&self) {
        let status = build_status(
            &self.memory.snapshot(),
            &self.memory.states(),
            self.memory.is_polling(),
            self.memory.last_poll_at(),
            self.start_time,
        );
        write_status(&self.path, &status);
    }
}

impl Store for StatusFileStore {
    fn replace_snapshot(&self, snapshot: Arc<Snapshot>) {
        self.memory.replace_snapshot(snapshot);
    }

    fn set_state(&self, key: &str, state: PrState) {
        self.memory.set_state(key, state);
    }

    fn set_polling(&self, polling: bool) {
        self.memory.set_polling(polling);
        self.flush();
    }

    fn set_last_poll_at(&self, at: DateTime<Utc>) {
        self.memory.set_last_poll_at(at);
        self.flush();
    }
}
