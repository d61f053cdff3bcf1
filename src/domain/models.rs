use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 한 poll cycle에서 관측한 전체 PR: key(`owner/repo#number`) → PullRequest.
///
/// BTreeMap이므로 순회 순서는 key 순서로 고정된다 (diff 결과의 결정성 보장).
pub type Snapshot = BTreeMap<String, PullRequest>;

/// PR key 생성: "owner/repo" + 42 → "owner/repo#42"
pub fn make_pr_key(repo_full_name: &str, number: i64) -> String {
    format!("{repo_full_name}#{number}")
}

/// "owner/repo#42" → ("owner", "repo", 42)
pub fn parse_pr_key(key: &str) -> Option<(&str, &str, i64)> {
    let (repo, num) = key.rsplit_once('#')?;
    let (owner, name) = repo.split_once('/')?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    let number = num.parse::<i64>().ok().filter(|n| *n > 0)?;
    Some((owner, name, number))
}

// ─── Enumerations ───

/// PR 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrLifecycle {
    Open,
    Closed,
    Merged,
}

impl PrLifecycle {
    /// search API는 소문자("open"), pr list는 대문자("OPEN")를 쓴다.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "CLOSED" => PrLifecycle::Closed,
            "MERGED" => PrLifecycle::Merged,
            _ => PrLifecycle::Open,
        }
    }
}

impl fmt::Display for PrLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrLifecycle::Open => write!(f, "OPEN"),
            PrLifecycle::Closed => write!(f, "CLOSED"),
            PrLifecycle::Merged => write!(f, "MERGED"),
        }
    }
}

/// GitHub가 계산한 merge conflict 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mergeable {
    Mergeable,
    Conflicting,
    Unknown,
}

impl Mergeable {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "MERGEABLE" => Mergeable::Mergeable,
            "CONFLICTING" => Mergeable::Conflicting,
            _ => Mergeable::Unknown,
        }
    }
}

/// 전체 리뷰에 대한 GitHub의 집계 판정. 판정이 없으면 `Option::None`으로 표현한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approved,
    ChangesRequested,
    ReviewRequired,
}

impl ReviewDecision {
    /// 빈 문자열 / 알 수 없는 값 → None
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "APPROVED" => Some(ReviewDecision::Approved),
            "CHANGES_REQUESTED" => Some(ReviewDecision::ChangesRequested),
            "REVIEW_REQUIRED" => Some(ReviewDecision::ReviewRequired),
            _ => None,
        }
    }
}

/// 개별 리뷰 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
}

impl ReviewState {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "APPROVED" => ReviewState::Approved,
            "CHANGES_REQUESTED" => ReviewState::ChangesRequested,
            "DISMISSED" => ReviewState::Dismissed,
            "PENDING" => ReviewState::Pending,
            _ => ReviewState::Commented,
        }
    }
}

/// CI check 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Requested,
    Pending,
}

impl CheckStatus {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" => CheckStatus::Queued,
            "IN_PROGRESS" => CheckStatus::InProgress,
            "COMPLETED" => CheckStatus::Completed,
            "WAITING" => CheckStatus::Waiting,
            "REQUESTED" => CheckStatus::Requested,
            _ => CheckStatus::Pending,
        }
    }
}

/// CI check의 최종 결과. 진행 중이거나 인식할 수 없으면 `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    Neutral,
    ActionRequired,
    Stale,
}

impl Conclusion {
    /// check-run conclusion 문자열 파싱.
    /// TIMED_OUT / STARTUP_FAILURE는 FAILURE로 흡수한다.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" => Some(Conclusion::Success),
            "FAILURE" | "TIMED_OUT" | "STARTUP_FAILURE" => Some(Conclusion::Failure),
            "CANCELLED" => Some(Conclusion::Cancelled),
            "SKIPPED" => Some(Conclusion::Skipped),
            "NEUTRAL" => Some(Conclusion::Neutral),
            "ACTION_REQUIRED" => Some(Conclusion::ActionRequired),
            "STALE" => Some(Conclusion::Stale),
            _ => None,
        }
    }

    /// ready 판정에서 통과로 인정되는 결과
    pub fn is_passing(self) -> bool {
        matches!(
            self,
            Conclusion::Success | Conclusion::Skipped | Conclusion::Neutral
        )
    }

    /// hot 판정에 쓰이는 실패 결과
    pub fn is_failing(self) -> bool {
        matches!(self, Conclusion::Failure | Conclusion::Cancelled)
    }
}

/// `gh pr merge` 전략
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    Merge,
    Squash,
    Rebase,
}

impl std::str::FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "merge" => Ok(MergeStrategy::Merge),
            "squash" => Ok(MergeStrategy::Squash),
            "rebase" => Ok(MergeStrategy::Rebase),
            other => Err(format!("unknown merge strategy: {other}")),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategy::Merge => write!(f, "merge"),
            MergeStrategy::Squash => write!(f, "squash"),
            MergeStrategy::Rebase => write!(f, "rebase"),
        }
    }
}

// ─── Records ───

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub login: String,
    pub is_bot: bool,
}

impl Author {
    pub fn unknown() -> Self {
        Self {
            login: "unknown".to_string(),
            is_bot: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// "owner/repo" → RepoRef
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.split_once('/')?;
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub author: Author,
    pub state: ReviewState,
    pub body: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: Author,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

/// 정규화된 CI check. provider의 check-run / status-context 구분은 여기까지 오지 않는다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    pub conclusion: Option<Conclusion>,
    pub workflow: Option<String>,
    pub details_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// 로컬 worktree 정보. 외부 협력자가 채우며 reconcile 엔진은 읽기만 한다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worktree {
    pub path: PathBuf,
    pub branch: String,
}

/// PR 한 건의 특정 시점 revision.
///
/// 같은 `key`의 레코드는 같은 PR의 다른 revision이며, 병합하지 않고 통째로 교체한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub key: String,
    pub number: i64,
    pub title: String,
    pub body: String,
    pub url: String,
    pub repo: RepoRef,
    pub author: Author,
    pub head_branch: String,
    pub base_branch: String,
    pub is_draft: bool,
    pub state: PrLifecycle,
    pub mergeable: Mergeable,
    pub review_decision: Option<ReviewDecision>,
    pub reviews: Vec<Review>,
    pub comments: Vec<Comment>,
    pub checks: Vec<Check>,
    pub labels: Vec<Label>,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub worktree: Option<Worktree>,
    /// detail 조회로 채워진 레코드인지 여부 (discovery stub이면 false)
    #[serde(default)]
    pub hydrated: bool,
}

impl PullRequest {
    pub fn is_open(&self) -> bool {
        self.state == PrLifecycle::Open
    }

    pub fn is_conflicting(&self) -> bool {
        self.mergeable == Mergeable::Conflicting
    }

    /// check가 하나 이상 있고 모두 SUCCESS/SKIPPED/NEUTRAL
    pub fn checks_all_passing(&self) -> bool {
        !self.checks.is_empty()
            && self
                .checks
                .iter()
                .all(|c| c.conclusion.is_some_and(Conclusion::is_passing))
    }

    pub fn has_failing_check(&self) -> bool {
        self.checks
            .iter()
            .any(|c| c.conclusion.is_some_and(Conclusion::is_failing))
    }

    /// 머지 준비 완료: checks 통과 + APPROVED + MERGEABLE
    pub fn is_ready_to_merge(&self) -> bool {
        self.checks_all_passing()
            && self.review_decision == Some(ReviewDecision::Approved)
            && self.mergeable == Mergeable::Mergeable
    }

    pub fn label_names(&self) -> Vec<&str> {
        self.labels.iter().map(|l| l.name.as_str()).collect()
    }
}
