use serde::{Deserialize, Serialize};

/// .prwatch.yaml의 전체 스키마
/// 글로벌(~/) + `--config` 오버라이드를 딥머지하여 최종 설정 생성
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WatchConfig {
    pub poller: PollerConfig,
    pub github: GithubConfig,
    pub daemon: DaemonConfig,
}

/// reconcile 루프 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub poll_interval_secs: u64,
    /// 이 시간(시간 단위)을 *초과*해 업데이트가 없으면 dormant
    pub dormant_threshold_hours: u64,
    /// 비어 있으면 계정의 모든 레포
    pub repos: Vec<String>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            dormant_threshold_hours: 72,
            repos: vec![],
        }
    }
}

/// `gh` 호출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub gh_host: Option<String>,
    pub detail_concurrency: usize,
    pub command_timeout_secs: u64,
    pub search_limit: u32,
    pub list_limit: u32,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            gh_host: None,
            detail_concurrency: 4,
            command_timeout_secs: 30,
            search_limit: 200,
            list_limit: 100,
        }
    }
}

/// 로그 / 이벤트 기록 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub log_dir: String,
    pub log_retention_days: u32,
    /// events.jsonl 기록 여부
    pub event_log: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".into(),
            log_retention_days: 14,
            event_log: true,
        }
    }
}
