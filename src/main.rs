use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use prwatch::components::actions::PrActions;
use prwatch::config::{self, models::WatchConfig};
use prwatch::domain::models::MergeStrategy;
use prwatch::infrastructure::gh::{Gh, RealGh};
use prwatch::scanner::SnapshotFetcher;
use prwatch::{client, daemon};

#[derive(Parser)]
#[command(name = "prwatch", version, about = "내 open PR 감시 + 긴급도 분류")]
struct Cli {
    /// 추가 설정 파일 (~/.prwatch.yaml 위에 딥머지)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// reconcile 루프 실행 (포그라운드)
    Watch {
        /// 감시할 레포 (owner/repo, 반복 가능). 생략 시 설정값 또는 전체
        #[arg(long = "repo")]
        repos: Vec<String>,
        /// poll 주기 (초)
        #[arg(long)]
        interval: Option<u64>,
        /// 한 번만 poll하고 종료
        #[arg(long)]
        once: bool,
    },
    /// 실행 중인 watch의 상태 요약
    Status,
    /// PR 한 건 상세 조회
    View {
        /// owner/repo#N
        key: String,
    },
    /// PR에 댓글 게시
    Comment {
        /// owner/repo#N
        key: String,
        #[arg(long)]
        body: String,
    },
    /// PR 머지
    Merge {
        /// owner/repo#N
        key: String,
        #[arg(long, default_value = "merge")]
        strategy: MergeStrategy,
    },
    /// 설정 관리
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 현재 설정 표시 (글로벌 + 오버라이드 + 기본값 머지 결과)
    Show,
}

fn init_tracing(
    cfg: &WatchConfig,
    home: &std::path::Path,
    to_file: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive("prwatch=info".parse()?);

    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    }

    let log_dir = config::resolve_log_dir(&cfg.daemon.log_dir, home);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(daemon::log::LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(&log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env = config::RealEnv;
    let home = config::prwatch_home(&env);

    let mut cfg = config::loader::load_merged(&env, cli.config.as_deref());

    let is_watch = matches!(cli.command, Commands::Watch { .. });
    // _guard must live until main() returns to flush non-blocking writer
    let _guard = init_tracing(&cfg, &home, is_watch)?;

    let gh: Arc<dyn Gh> = Arc::new(RealGh::new(Duration::from_secs(
        cfg.github.command_timeout_secs,
    )));

    match cli.command {
        Commands::Watch {
            repos,
            interval,
            once,
        } => {
            if !repos.is_empty() {
                cfg.poller.repos = repos;
            }
            if let Some(secs) = interval {
                cfg.poller.poll_interval_secs = secs;
            }
            daemon::watch(&home, &cfg, gh, once).await?;
        }
        Commands::Status => print!("{}", client::status(&home)?),
        Commands::View { key } => {
            let fetcher = SnapshotFetcher::new(gh, daemon::fetch_options(&cfg));
            let out = client::view(&fetcher, &key, cfg.poller.dormant_threshold_hours).await?;
            print!("{out}");
        }
        Commands::Comment { key, body } => {
            PrActions::new(gh, cfg.github.gh_host.clone())
                .post_comment(&key, &body)
                .await?;
            println!("commented on {key}");
        }
        Commands::Merge { key, strategy } => {
            PrActions::new(gh, cfg.github.gh_host.clone())
                .merge(&key, strategy)
                .await?;
            println!("merged {key} ({strategy})");
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => print!("{}", client::config_show(&env, cli.config.as_deref())?),
        },
    }

    Ok(())
}
