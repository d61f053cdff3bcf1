pub mod consumer;
pub mod log;
pub mod poller;
pub mod status;
pub mod store;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::{error, info};

use crate::config::models::WatchConfig;
use crate::infrastructure::gh::Gh;
use crate::scanner::{FetchOptions, SnapshotFetcher};

use self::consumer::{EventConsumer, FanOut, JsonlEventLog, LogErrorSink, LogEventConsumer};
use self::poller::{CycleOutcome, Poller, PollerHandle};
use self::status::StatusFileStore;
use self::store::MemoryStore;

/// 설정 → SnapshotFetcher 옵션
pub fn fetch_options(cfg: &WatchConfig) -> FetchOptions {
    FetchOptions {
        detail_concurrency: cfg.github.detail_concurrency.max(1),
        search_limit: cfg.github.search_limit,
        list_limit: cfg.github.list_limit,
        gh_host: cfg.github.gh_host.clone(),
    }
}

fn event_consumer(home: &Path, cfg: &WatchConfig) -> FanOut {
    let mut consumers: Vec<Arc<dyn EventConsumer>> = vec![Arc::new(LogEventConsumer)];
    if cfg.daemon.event_log {
        consumers.push(Arc::new(JsonlEventLog::new(crate::config::event_log_path(
            home,
        ))));
    }
    FanOut::new(consumers)
}

/// reconcile 루프를 포그라운드로 실행한다.
///
/// `once`면 cycle 하나만 돌고 상태 요약을 출력한다. 아니면 SIGINT까지 주기적으로 poll한다.
pub async fn watch(home: &Path, cfg: &WatchConfig, gh: Arc<dyn Gh>, once: bool) -> Result<()> {
    std::fs::create_dir_all(home)?;

    let log_dir = crate::config::resolve_log_dir(&cfg.daemon.log_dir, home);
    let n = log::cleanup_old_logs(&log_dir, cfg.daemon.log_retention_days);
    if n > 0 {
        info!("startup log cleanup: deleted {n} old log files");
    }

    let source = Arc::new(SnapshotFetcher::new(gh, fetch_options(cfg)));
    let memory = Arc::new(MemoryStore::new());
    let status_path = crate::config::status_path(home);
    let store = Arc::new(StatusFileStore::new(Arc::clone(&memory), status_path.clone()));
    let poller = Arc::new(Poller::new(
        source,
        store,
        cfg.poller.dormant_threshold_hours,
    ));
    let consumer = Arc::new(event_consumer(home, cfg));
    let repos = cfg.poller.repos.clone();

    if once {
        let outcome = poller.poll_once(&repos, consumer.as_ref(), &LogErrorSink).await;
        if outcome == CycleOutcome::Failed {
            bail!("poll failed (see log for details)");
        }
        let ws = status::read_status(&status_path);
        if let Some(ws) = ws {
            print!("{}", crate::client::format_status(&ws));
        }
        return Ok(());
    }

    let interval = Duration::from_secs(cfg.poller.poll_interval_secs.max(1));
    info!(
        "watching {} (interval {}s, dormant after {}h)",
        if repos.is_empty() {
            "all repositories".to_string()
        } else {
            repos.join(", ")
        },
        interval.as_secs(),
        cfg.poller.dormant_threshold_hours
    );

    let handle = poller.start(interval, repos, consumer, Arc::new(LogErrorSink));
    run_until_shutdown(handle, tokio::signal::ctrl_c(), &status_path).await
}

/// `shutdown`이 끝나면 루프를 멈추고 status 파일을 지운다.
/// 시그널 대기가 실패해도 정리는 한 뒤에 에러를 돌려준다.
async fn run_until_shutdown<F>(handle: PollerHandle, shutdown: F, status_path: &Path) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let signal = shutdown.await;
    match &signal {
        Ok(()) => info!("received SIGINT, waiting for in-flight poll..."),
        Err(e) => error!("failed to listen for SIGINT: {e}, stopping"),
    }
    handle.stop().await;

    status::remove_status(status_path);
    info!("prwatch stopped");
    signal?;
    Ok(())
}
