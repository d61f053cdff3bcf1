pub mod mock;
pub mod real;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::MergeStrategy;

pub use mock::MockGh;
pub use real::RealGh;

/// `gh` 호출 실패 분류.
///
/// 호출자는 인증 / rate limit / 그 외 실패를 구분하여 처리할 수 있다.
#[derive(Debug, Error)]
pub enum GhError {
    /// 인증 정보가 없거나 만료됨
    #[error("gh authentication failed: {0}")]
    Auth(String),

    /// GitHub API rate limit 초과 (재시도 정책은 호출자가 결정)
    #[error("GitHub rate limit exceeded: {0}")]
    RateLimit(String),

    /// 분류되지 않은 실패. timeout / spawn 실패는 exit_code = -1
    #[error("gh failed (exit={exit_code}): {stderr}")]
    Provider { exit_code: i32, stderr: String },

    #[error("failed to parse gh output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl GhError {
    /// 실패한 `gh` 프로세스의 stderr를 보고 에러 종류를 판별한다.
    pub fn classify(exit_code: i32, stderr: &str) -> Self {
        let lower = stderr.to_ascii_lowercase();
        let message = stderr.trim().to_string();

        if lower.contains("rate limit") || lower.contains("http 429") {
            return GhError::RateLimit(message);
        }

        if lower.contains("gh auth login")
            || lower.contains("authentication")
            || lower.contains("bad credentials")
            || lower.contains("http 401")
        {
            return GhError::Auth(message);
        }

        GhError::Provider {
            exit_code,
            stderr: message,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, GhError::Auth(_))
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, GhError::RateLimit(_))
    }
}

/// GitHub CLI (`gh`) 추상화
#[async_trait]
pub trait Gh: Send + Sync {
    /// `gh search prs --author @me --state open --json {fields} [--repo R]...`
    /// 현재 계정이 작성한 모든 open PR (discovery pass)
    async fn search_prs(
        &self,
        repos: &[String],
        fields: &[&str],
        limit: u32,
        host: Option<&str>,
    ) -> Result<Vec<u8>, GhError>;

    /// `gh pr list --repo {repo} --author @me --state open --json {fields}`
    /// 레포 단위 상세 조회 (detail pass)
    async fn pr_list(
        &self,
        repo_name: &str,
        fields: &[&str],
        limit: u32,
        host: Option<&str>,
    ) -> Result<Vec<u8>, GhError>;

    /// `gh pr view {number} --repo {repo} --json {fields}`
    async fn pr_view(
        &self,
        repo_name: &str,
        number: i64,
        fields: &[&str],
        host: Option<&str>,
    ) -> Result<Vec<u8>, GhError>;

    /// `gh pr comment {number} --repo {repo} --body {body}`
    async fn pr_comment(
        &self,
        repo_name: &str,
        number: i64,
        body: &str,
        host: Option<&str>,
    ) -> Result<(), GhError>;

    /// `gh pr merge {number} --repo {repo} --{strategy}`
    async fn pr_merge(
        &self,
        repo_name: &str,
        number: i64,
        strategy: MergeStrategy,
        host: Option<&str>,
    ) -> Result<(), GhError>;
}
