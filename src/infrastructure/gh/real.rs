use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{Gh, GhError};
use crate::domain::models::MergeStrategy;

/// 실제 `gh` CLI를 호출하는 구현체.
///
/// 모든 호출은 `timeout`으로 제한되며, 초과 시 자식 프로세스를 종료하고 실패로 처리한다.
pub struct RealGh {
    timeout: Duration,
}

impl RealGh {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// `gh {args}` 실행 → stdout. 실패 시 stderr로 에러 분류
    async fn run(&self, op: &str, args: &[String], host: Option<&str>) -> Result<Vec<u8>, GhError> {
        tracing::debug!("[gh:{op}] >>> gh {}", args.join(" "));
        let start = Instant::now();

        let mut cmd = tokio::process::Command::new("gh");
        cmd.args(args).kill_on_drop(true);
        if let Some(h) = host {
            cmd.env("GH_HOST", h);
        }

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(
                    "[gh:{op}] <<< ERROR ({}ms): {e}",
                    start.elapsed().as_millis()
                );
                return Err(GhError::Provider {
                    exit_code: -1,
                    stderr: format!("failed to run gh: {e}"),
                });
            }
            Err(_) => {
                tracing::warn!(
                    "[gh:{op}] <<< TIMEOUT after {}s",
                    self.timeout.as_secs()
                );
                return Err(GhError::Provider {
                    exit_code: -1,
                    stderr: format!("gh timed out after {}s", self.timeout.as_secs()),
                });
            }
        };

        let elapsed = start.elapsed();

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                "[gh:{op}] <<< FAILED (exit={}, {}ms): {}",
                exit_code,
                elapsed.as_millis(),
                stderr.trim()
            );
            return Err(GhError::classify(exit_code, &stderr));
        }

        tracing::debug!(
            "[gh:{op}] <<< OK ({}ms, {} bytes)",
            elapsed.as_millis(),
            output.stdout.len()
        );
        Ok(output.stdout)
    }
}

#[async_trait]
impl Gh for RealGh {
    async fn search_prs(
        &self,
        repos: &[String],
        fields: &[&str],
        limit: u32,
        host: Option<&str>,
    ) -> Result<Vec<u8>, GhError> {
        let mut args = vec![
            "search".to_string(),
            "prs".to_string(),
            "--author".to_string(),
            "@me".to_string(),
            "--state".to_string(),
            "open".to_string(),
            "--limit".to_string(),
            limit.to_string(),
            "--json".to_string(),
            fields.join(","),
        ];

        for repo in repos {
            args.push("--repo".to_string());
            args.push(repo.clone());
        }

        self.run("search_prs", &args, host).await
    }

    async fn pr_list(
        &self,
        repo_name: &str,
        fields: &[&str],
        limit: u32,
        host: Option<&str>,
    ) -> Result<Vec<u8>, GhError> {
        let args = vec![
            "pr".to_string(),
            "list".to_string(),
            "--repo".to_string(),
            repo_name.to_string(),
            "--author".to_string(),
            "@me".to_string(),
            "--state".to_string(),
            "open".to_string(),
            "--limit".to_string(),
            limit.to_string(),
            "--json".to_string(),
            fields.join(","),
        ];

        self.run("pr_list", &args, host).await
    }

    async fn pr_view(
        &self,
        repo_name: &str,
        number: i64,
        fields: &[&str],
        host: Option<&str>,
    ) -> Result<Vec<u8>, GhError> {
        let args = vec![
            "pr".to_string(),
            "view".to_string(),
            number.to_string(),
            "--repo".to_string(),
            repo_name.to_string(),
            "--json".to_string(),
            fields.join(","),
        ];

        self.run("pr_view", &args, host).await
    }

    async fn pr_comment(
        &self,
        repo_name: &str,
        number: i64,
        body: &str,
        host: Option<&str>,
    ) -> Result<(), GhError> {
        let args = vec![
            "pr".to_string(),
            "comment".to_string(),
            number.to_string(),
            "--repo".to_string(),
            repo_name.to_string(),
            "--body".to_string(),
            body.to_string(),
        ];

        self.run("pr_comment", &args, host).await.map(|_| ())
    }

    async fn pr_merge(
        &self,
        repo_name: &str,
        number: i64,
        strategy: MergeStrategy,
        host: Option<&str>,
    ) -> Result<(), GhError> {
        let args = vec![
            "pr".to_string(),
            "merge".to_string(),
            number.to_string(),
            "--repo".to_string(),
            repo_name.to_string(),
            format!("--{strategy}"),
        ];

        self.run("pr_merge", &args, host).await.map(|_| ())
    }
}
