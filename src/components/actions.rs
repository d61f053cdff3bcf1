use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::domain::models::{parse_pr_key, MergeStrategy};
use crate::infrastructure::gh::Gh;

/// PR 키(`owner/repo#N`) 기반의 쓰기 액션. reconcile 루프가 아니라 CLI에서 사용한다.
pub struct PrActions {
    gh: Arc<dyn Gh>,
    gh_host: Option<String>,
}

impl PrActions {
    pub fn new(gh: Arc<dyn Gh>, gh_host: Option<String>) -> Self {
        Self { gh, gh_host }
    }

    /// PR에 댓글 게시
    pub async fn post_comment(&self, key: &str, body: &str) -> Result<()> {
        if body.trim().is_empty() {
            bail!("comment body is empty");
        }
        let (repo_name, number) = split_key(key)?;
        self.gh
            .pr_comment(&repo_name, number, body, self.gh_host.as_deref())
            .await
            .with_context(|| format!("failed to comment on {key}"))?;
        tracing::info!("commented on {key}");
        Ok(())
    }

    /// 지정한 전략으로 PR 머지
    pub async fn merge(&self, key: &str, strategy: MergeStrategy) -> Result<()> {
        let (repo_name, number) = split_key(key)?;
        self.gh
            .pr_merge(&repo_name, number, strategy, self.gh_host.as_deref())
            .await
            .with_context(|| format!("failed to merge {key} ({strategy})"))?;
        tracing::info!("merged {key} with {strategy}");
        Ok(())
    }
}

fn split_key(key: &str) -> Result<(String, i64)> {
    match parse_pr_key(key) {
        Some((owner, repo, number)) => Ok((format!("{owner}/{repo}"), number)),
        None => bail!("invalid PR key: {key} (expected owner/repo#number)"),
    }
}
