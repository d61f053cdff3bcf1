//! 이벤트 소비자 / 에러 싱크.
//!
//! Poller는 cycle마다 비어 있지 않은 이벤트 목록을 `EventConsumer`에 한 번 전달하고,
//! 실패한 cycle은 `ErrorSink`에 한 번 보고한다.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::events::{EventPayload, PrEvent, PrEventKind};
use crate::infrastructure::gh::GhError;

#[async_trait]
pub trait EventConsumer: Send + Sync {
    async fn on_events(&self, events: &[PrEvent]);
}

pub trait ErrorSink: Send + Sync {
    fn on_error(&self, err: &GhError);
}

impl<F> ErrorSink for F
where
    F: Fn(&GhError) + Send + Sync,
{
    fn on_error(&self, err: &GhError) {
        self(err)
    }
}

// ─── Implementations ───

/// 이벤트를 tracing 로그로 남긴다
pub struct LogEventConsumer;

#[async_trait]
impl EventConsumer for LogEventConsumer {
    async fn on_events(&self, events: &[PrEvent]) {
        for e in events {
            tracing::info!("[event] {} {}: {}", e.kind, e.pr_key, e.pr.title);
        }
    }
}

/// 실패한 cycle을 로그로 남긴다. 인증 실패는 호스트가 중단 여부를 판단할 수 있도록 강조한다.
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn on_error(&self, err: &GhError) {
        match err {
            GhError::Auth(_) => {
                tracing::error!("poll failed: {err} (run `gh auth login` and restart)")
            }
            GhError::RateLimit(_) => tracing::warn!("poll skipped: {err}"),
            _ => tracing::error!("poll failed: {err}"),
        }
    }
}

/// JSONL 한 줄. PR 전체 대신 식별 정보와 변화량만 기록한다.
#[derive(Serialize)]
struct EventLine<'a> {
    kind: PrEventKind,
    pr_key: &'a str,
    title: &'a str,
    url: &'a str,
    at: DateTime<Utc>,
    payload: Option<&'a EventPayload>,
}

/// events.jsonl에 이벤트를 한 줄씩 추가한다 (best effort)
pub struct JsonlEventLog {
    path: PathBuf,
}

impl JsonlEventLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn append(&self, events: &[PrEvent]) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        for e in events {
            let line = EventLine {
                kind: e.kind,
                pr_key: &e.pr_key,
                title: &e.pr.title,
                url: &e.pr.url,
                at: e.at,
                payload: e.payload.as_ref(),
            };
            let json = serde_json::to_string(&line)?;
            writeln!(file, "{json}")?;
        }
        Ok(())
    }
}

#[async_trait]
impl EventConsumer for JsonlEventLog {
    async fn on_events(&self, events: &[PrEvent]) {
        if let Err(e) = self.append(events) {
            tracing::warn!("failed to append event log {}: {e}", self.path.display());
        }
    }
}

/// 여러 소비자에게 같은 이벤트 목록을 순서대로 전달
pub struct FanOut {
    consumers: Vec<Arc<dyn EventConsumer>>,
}

impl FanOut {
    pub fn new(consumers: Vec<Arc<dyn EventConsumer>>) -> Self {
        Self { consumers }
    }
}

#[async_trait]
impl EventConsumer for FanOut {
    async fn on_events(&self, events: &[PrEvent]) {
        for consumer in &self.consumers {
            consumer.on_events(events).await;
        }
    }
}
