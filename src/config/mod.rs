pub mod loader;
pub mod models;

use std::path::{Path, PathBuf};

/// 환경 변수 접근을 추상화하는 트레이트 (테스트 격리를 위해 사용)
pub trait Env: Send + Sync {
    fn var(&self, key: &str) -> Result<String, std::env::VarError>;
}

/// 실제 환경 변수를 사용하는 구현체
pub struct RealEnv;

impl Env for RealEnv {
    fn var(&self, key: &str) -> Result<String, std::env::VarError> {
        std::env::var(key)
    }
}

/// ~/.prwatch 경로 반환 (PRWATCH_HOME으로 오버라이드)
pub fn prwatch_home(env: &dyn Env) -> PathBuf {
    if let Ok(home) = env.var("PRWATCH_HOME") {
        return PathBuf::from(home);
    }
    let home = env.var("HOME").unwrap_or_else(|_| ".".into());
    Path::new(&home).join(".prwatch")
}

/// status file 경로
pub fn status_path(home: &Path) -> PathBuf {
    home.join("watch.status.json")
}

/// 이벤트 로그(JSONL) 경로
pub fn event_log_path(home: &Path) -> PathBuf {
    home.join("events.jsonl")
}

/// 로그 디렉토리 경로 해석: 절대 경로면 그대로, 상대 경로면 home 기준
pub fn resolve_log_dir(log_dir: &str, home: &Path) -> PathBuf {
    let path = Path::new(log_dir);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        home.join(log_dir)
    }
}
