//! Snapshot Fetcher: 2단계(discovery → detail) PR 조회.
//!
//! discovery는 계정 전체를 한 번에 훑는 저비용 호출이고, detail은 레포 단위의 고비용 호출이다.
//! 직전 snapshot과 `updated_at`을 비교하여 변화가 관측된 레포에만 detail 호출을 보낸다.

pub mod normalize;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::domain::models::{PullRequest, RepoRef, Snapshot};
use crate::infrastructure::gh::{Gh, GhError};

use self::normalize::{DETAIL_FIELDS, DISCOVERY_FIELDS};

/// 현재 PR 상태를 제공하는 소스. Poller는 이 trait에만 의존한다.
#[async_trait]
pub trait PrSource: Send + Sync {
    /// 현재 계정의 open PR 전체를 조회한다.
    /// `repo_scope`가 비어 있으면 모든 레포, `known`은 직전에 게시된 snapshot.
    async fn fetch(&self, repo_scope: &[String], known: &Snapshot) -> Result<Snapshot, GhError>;

    /// PR 한 건의 상세 레코드
    async fn fetch_one_detail(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<PullRequest, GhError>;
}

/// SnapshotFetcher 동작 옵션
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// detail pass 동시 실행 상한
    pub detail_concurrency: usize,
    /// discovery 결과 상한
    pub search_limit: u32,
    /// 레포당 detail 결과 상한
    pub list_limit: u32,
    pub gh_host: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            detail_concurrency: 4,
            search_limit: 200,
            list_limit: 100,
            gh_host: None,
        }
    }
}

/// `gh` CLI 기반 PrSource 구현체
pub struct SnapshotFetcher {
    gh: Arc<dyn Gh>,
    opts: FetchOptions,
}

impl SnapshotFetcher {
    pub fn new(gh: Arc<dyn Gh>, opts: FetchOptions) -> Self {
        Self { gh, opts }
    }

    /// discovery pass: 저비용 필드만으로 stub 목록 생성
    async fn discover(&self, repo_scope: &[String]) -> Result<Vec<PullRequest>, GhError> {
        let stdout = self
            .gh
            .search_prs(
                repo_scope,
                DISCOVERY_FIELDS,
                self.opts.search_limit,
                self.opts.gh_host.as_deref(),
            )
            .await?;
        let stubs = normalize::parse_search(&stdout)?;
        if limit_reached(stubs.len(), self.opts.search_limit) {
            tracing::warn!(
                "discovery returned {} PRs (search_limit), results may be truncated",
                stubs.len()
            );
        }
        Ok(stubs)
    }

    /// detail pass: stale 레포마다 `gh pr list` 한 번, semaphore로 동시 실행 수 제한.
    /// 레포별 결과를 돌려주며, 실패한 레포는 Err로 담긴다.
    async fn fetch_details(
        &self,
        repos: &BTreeSet<RepoRef>,
    ) -> HashMap<RepoRef, Result<Vec<PullRequest>, GhError>> {
        let semaphore = Arc::new(Semaphore::new(self.opts.detail_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for repo in repos {
            let gh = Arc::clone(&self.gh);
            let sem = Arc::clone(&semaphore);
            let repo = repo.clone();
            let host = self.opts.gh_host.clone();
            let limit = self.opts.list_limit;

            join_set.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                let result = match gh
                    .pr_list(&repo.full_name(), DETAIL_FIELDS, limit, host.as_deref())
                    .await
                {
                    Ok(stdout) => normalize::parse_detail_list(&repo, &stdout),
                    Err(e) => Err(e),
                };
                if let Ok(prs) = &result {
                    if limit_reached(prs.len(), limit) {
                        // 잘린 PR은 stub으로 남아 매 cycle 레포를 stale로 만든다
                        tracing::warn!(
                            "detail list for {} returned {} PRs (list_limit), results may be truncated",
                            repo.full_name(),
                            prs.len()
                        );
                    }
                }
                (repo, result)
            });
        }

        let mut results = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((repo, result)) => {
                    results.insert(repo, result);
                }
                Err(e) => tracing::error!("detail fetch task panicked: {e}"),
            }
        }
        results
    }
}

#[async_trait]
impl PrSource for SnapshotFetcher {
    async fn fetch(&self, repo_scope: &[String], known: &Snapshot) -> Result<Snapshot, GhError> {
        let stubs = self.discover(repo_scope).await?;
        let by_repo = group_by_repo(stubs);
        let stale = stale_repos(&by_repo, known);

        tracing::info!(
            "discovered {} PRs in {} repos ({} stale)",
            by_repo.values().map(Vec::len).sum::<usize>(),
            by_repo.len(),
            stale.len()
        );

        let mut snapshot = Snapshot::new();
        for (repo, prs) in by_repo {
            let is_stale = stale.contains(&repo);
            for stub in prs {
                // fresh 레포는 직전 레코드를 그대로 이어받는다
                let carried = if is_stale { None } else { known.get(&stub.key) };
                match carried {
                    Some(prev) => snapshot.insert(stub.key.clone(), prev.clone()),
                    None => snapshot.insert(stub.key.clone(), stub),
                };
            }
        }

        for (repo, result) in self.fetch_details(&stale).await {
            match result {
                Ok(detailed) => {
                    for pr in detailed {
                        // discovery에서 관측된 key만 덮어쓴다
                        if let Some(slot) = snapshot.get_mut(&pr.key) {
                            *slot = pr;
                        }
                    }
                }
                Err(e) => tracing::warn!(
                    "detail fetch failed for {}, keeping discovery stubs: {e}",
                    repo.full_name()
                ),
            }
        }

        Ok(snapshot)
    }

    async fn fetch_one_detail(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<PullRequest, GhError> {
        let repo_ref = RepoRef {
            owner: owner.to_string(),
            name: repo.to_string(),
        };
        let stdout = self
            .gh
            .pr_view(
                &repo_ref.full_name(),
                number,
                DETAIL_FIELDS,
                self.opts.gh_host.as_deref(),
            )
            .await?;
        normalize::parse_detail_one(&repo_ref, &stdout)
    }
}

/// 응답 건수가 요청 상한에 도달했으면 결과가 잘렸을 수 있다
pub fn limit_reached(count: usize, limit: u32) -> bool {
    limit > 0 && count >= limit as usize
}

/// discovery 결과를 레포 단위로 묶는다
pub fn group_by_repo(stubs: Vec<PullRequest>) -> BTreeMap<RepoRef, Vec<PullRequest>> {
    let mut by_repo: BTreeMap<RepoRef, Vec<PullRequest>> = BTreeMap::new();
    for pr in stubs {
        by_repo.entry(pr.repo.clone()).or_default().push(pr);
    }
    by_repo
}

/// stale 레포 판별.
///
/// 레포 안의 PR 중 하나라도 새로 나타났거나, `updated_at`이 바뀌었거나,
/// 직전 레코드가 detail 조회에 실패한 stub이면 레포 전체가 stale이다.
pub fn stale_repos(
    by_repo: &BTreeMap<RepoRef, Vec<PullRequest>>,
    known: &Snapshot,
) -> BTreeSet<RepoRef> {
    by_repo
        .iter()
        .filter(|(_, prs)| {
            prs.iter().any(|pr| match known.get(&pr.key) {
                None => true,
                Some(prev) => prev.updated_at != pr.updated_at || !prev.hydrated,
            })
        })
        .map(|(repo, _)| repo.clone())
        .collect()
}
