//! `gh` JSON 응답 → 정규화된 domain 레코드.
//!
//! provider 고유의 형태(check-run / status-context 구분, 대소문자가 섞인 enum 문자열,
//! null author 등)는 이 모듈 밖으로 나가지 않는다.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::models::*;
use crate::infrastructure::gh::GhError;

/// discovery pass에서 요청하는 저비용 필드
pub const DISCOVERY_FIELDS: &[&str] = &[
    "number",
    "title",
    "state",
    "isDraft",
    "labels",
    "createdAt",
    "updatedAt",
    "author",
    "body",
    "url",
    "repository",
];

/// detail pass / 단건 조회에서 요청하는 필드
pub const DETAIL_FIELDS: &[&str] = &[
    "number",
    "title",
    "body",
    "url",
    "state",
    "isDraft",
    "author",
    "headRefName",
    "baseRefName",
    "mergeable",
    "reviewDecision",
    "reviews",
    "comments",
    "statusCheckRollup",
    "labels",
    "additions",
    "deletions",
    "changedFiles",
    "createdAt",
    "updatedAt",
];

// ─── Wire shapes ───

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    login: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    is_bot: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRepository {
    #[serde(default)]
    name_with_owner: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearchPr {
    number: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    is_draft: bool,
    #[serde(default)]
    labels: Vec<RawLabel>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    author: Option<RawAuthor>,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReview {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    author: Option<RawAuthor>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComment {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    author: Option<RawAuthor>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    url: Option<String>,
}

/// `statusCheckRollup` 원소. `__typename`으로 구분되는 두 가지 형태가 섞여 온다.
#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum RawCheck {
    /// GitHub Actions 등 check-run 형태
    CheckRun {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        conclusion: Option<String>,
        #[serde(default, rename = "workflowName")]
        workflow_name: Option<String>,
        #[serde(default, rename = "detailsUrl")]
        details_url: Option<String>,
    },
    /// 레거시 commit status 형태
    StatusContext {
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        state: Option<String>,
        #[serde(default, rename = "targetUrl")]
        target_url: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetailPr {
    number: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    is_draft: bool,
    #[serde(default)]
    author: Option<RawAuthor>,
    #[serde(default)]
    head_ref_name: Option<String>,
    #[serde(default)]
    base_ref_name: Option<String>,
    #[serde(default)]
    mergeable: Option<String>,
    #[serde(default)]
    review_decision: Option<String>,
    #[serde(default)]
    reviews: Vec<RawReview>,
    #[serde(default)]
    comments: Vec<RawComment>,
    #[serde(default)]
    status_check_rollup: Option<Vec<RawCheck>>,
    #[serde(default)]
    labels: Vec<RawLabel>,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    changed_files: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// ─── Parsing ───

/// `gh search prs` 응답 → discovery stub 목록.
/// 레포 정보가 없는 항목은 key를 만들 수 없으므로 건너뛴다.
pub fn parse_search(bytes: &[u8]) -> Result<Vec<PullRequest>, GhError> {
    let raw: Vec<RawSearchPr> = serde_json::from_slice(bytes)?;
    let mut stubs = Vec::with_capacity(raw.len());

    for pr in raw {
        let repo = match pr
            .repository
            .name_with_owner
            .as_deref()
            .and_then(RepoRef::parse)
        {
            Some(r) => r,
            None => {
                tracing::warn!("search result #{} has no repository, skipping", pr.number);
                continue;
            }
        };
        stubs.push(stub_from_search(repo, pr));
    }

    Ok(stubs)
}

/// `gh pr list` 응답 → 상세 레코드 목록
pub fn parse_detail_list(repo: &RepoRef, bytes: &[u8]) -> Result<Vec<PullRequest>, GhError> {
    let raw: Vec<RawDetailPr> = serde_json::from_slice(bytes)?;
    Ok(raw.into_iter().map(|pr| detail_to_pr(repo, pr)).collect())
}

/// `gh pr view` 응답 → 상세 레코드
pub fn parse_detail_one(repo: &RepoRef, bytes: &[u8]) -> Result<PullRequest, GhError> {
    let raw: RawDetailPr = serde_json::from_slice(bytes)?;
    Ok(detail_to_pr(repo, raw))
}

// ─── Normalization ───

fn stub_from_search(repo: RepoRef, pr: RawSearchPr) -> PullRequest {
    PullRequest {
        key: make_pr_key(&repo.full_name(), pr.number),
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        body: pr.body.unwrap_or_default(),
        url: pr.url.unwrap_or_default(),
        repo,
        author: normalize_author(pr.author.as_ref()),
        head_branch: String::new(),
        base_branch: String::new(),
        is_draft: pr.is_draft,
        state: PrLifecycle::parse(pr.state.as_deref().unwrap_or("")),
        mergeable: Mergeable::Unknown,
        review_decision: None,
        reviews: vec![],
        comments: vec![],
        checks: vec![],
        labels: pr.labels.into_iter().map(normalize_label).collect(),
        additions: 0,
        deletions: 0,
        changed_files: 0,
        created_at: pr.created_at,
        updated_at: pr.updated_at,
        worktree: None,
        hydrated: false,
    }
}

fn detail_to_pr(repo: &RepoRef, pr: RawDetailPr) -> PullRequest {
    PullRequest {
        key: make_pr_key(&repo.full_name(), pr.number),
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        body: pr.body.unwrap_or_default(),
        url: pr.url.unwrap_or_default(),
        repo: repo.clone(),
        author: normalize_author(pr.author.as_ref()),
        head_branch: pr.head_ref_name.unwrap_or_default(),
        base_branch: pr.base_ref_name.unwrap_or_default(),
        is_draft: pr.is_draft,
        state: PrLifecycle::parse(pr.state.as_deref().unwrap_or("")),
        mergeable: Mergeable::parse(pr.mergeable.as_deref().unwrap_or("")),
        review_decision: pr.review_decision.as_deref().and_then(ReviewDecision::parse),
        reviews: pr.reviews.into_iter().map(normalize_review).collect(),
        comments: pr.comments.into_iter().map(normalize_comment).collect(),
        checks: pr
            .status_check_rollup
            .unwrap_or_default()
            .into_iter()
            .filter_map(normalize_check)
            .collect(),
        labels: pr.labels.into_iter().map(normalize_label).collect(),
        additions: pr.additions,
        deletions: pr.deletions,
        changed_files: pr.changed_files,
        created_at: pr.created_at,
        updated_at: pr.updated_at,
        worktree: None,
        hydrated: true,
    }
}

/// author 없음 → "unknown". bot 판별: `[bot]` 접미사, type == "Bot", is_bot 플래그
fn normalize_author(raw: Option<&RawAuthor>) -> Author {
    let Some(raw) = raw else {
        return Author::unknown();
    };
    let login = match raw.login.as_deref() {
        Some(l) if !l.is_empty() => l.to_string(),
        _ => return Author::unknown(),
    };
    let is_bot = login.ends_with("[bot]")
        || raw
            .kind
            .as_deref()
            .is_some_and(|k| k.eq_ignore_ascii_case("bot"))
        || raw.is_bot.unwrap_or(false);
    Author { login, is_bot }
}

fn normalize_label(raw: RawLabel) -> Label {
    Label {
        id: raw.id.unwrap_or_default(),
        name: raw.name,
        color: raw.color.unwrap_or_default(),
    }
}

fn normalize_review(raw: RawReview) -> Review {
    Review {
        id: raw.id.unwrap_or_default(),
        author: normalize_author(raw.author.as_ref()),
        state: ReviewState::parse(raw.state.as_deref().unwrap_or("")),
        body: raw.body.unwrap_or_default(),
        submitted_at: raw.submitted_at,
    }
}

fn normalize_comment(raw: RawComment) -> Comment {
    Comment {
        id: raw.id.unwrap_or_default(),
        author: normalize_author(raw.author.as_ref()),
        body: raw.body.unwrap_or_default(),
        created_at: raw.created_at,
        url: raw.url,
    }
}

/// check-run / status-context → Check. 알 수 없는 `__typename`은 버린다.
fn normalize_check(raw: RawCheck) -> Option<Check> {
    match raw {
        RawCheck::CheckRun {
            name,
            status,
            conclusion,
            workflow_name,
            details_url,
        } => Some(Check {
            name: name.unwrap_or_default(),
            status: CheckStatus::parse(status.as_deref().unwrap_or("")),
            conclusion: conclusion.as_deref().and_then(Conclusion::parse),
            workflow: workflow_name.filter(|w| !w.is_empty()),
            details_url: details_url.filter(|u| !u.is_empty()),
        }),
        RawCheck::StatusContext {
            context,
            state,
            target_url,
        } => {
            let (status, conclusion) = legacy_state(state.as_deref().unwrap_or(""));
            Some(Check {
                name: context.unwrap_or_default(),
                status,
                conclusion,
                workflow: None,
                details_url: target_url.filter(|u| !u.is_empty()),
            })
        }
        RawCheck::Unknown => None,
    }
}

/// 레거시 status state → (status, conclusion).
/// SUCCESS → SUCCESS, FAILURE/ERROR → FAILURE, 그 외(PENDING, EXPECTED, ...)는 결론 없음
fn legacy_state(state: &str) -> (CheckStatus, Option<Conclusion>) {
    match state.to_ascii_uppercase().as_str() {
        "SUCCESS" => (CheckStatus::Completed, Some(Conclusion::Success)),
        "FAILURE" | "ERROR" => (CheckStatus::Completed, Some(Conclusion::Failure)),
        _ => (CheckStatus::Pending, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepoRef {
        RepoRef::parse("org/repo").unwrap()
    }

    #[test]
    fn search_results_become_unhydrated_stubs() {
        let json = r#"[{
            "number": 7,
            "title": "Add cache",
            "body": null,
            "url": "https://github.com/org/repo/pull/7",
            "state": "open",
            "isDraft": true,
            "labels": [{"id": "L1", "name": "perf", "color": "00ff00"}],
            "createdAt": "2026-02-01T00:00:00Z",
            "updatedAt": "2026-02-02T00:00:00Z",
            "author": {"login": "me", "type": "User"},
            "repository": {"name": "repo", "nameWithOwner": "org/repo"}
        }]"#;

        let stubs = parse_search(json.as_bytes()).unwrap();
        assert_eq!(stubs.len(), 1);
        let pr = &stubs[0];
        assert_eq!(pr.key, "org/repo#7");
        assert!(pr.is_draft);
        assert!(!pr.hydrated);
        assert_eq!(pr.state, PrLifecycle::Open);
        assert_eq!(pr.mergeable, Mergeable::Unknown);
        assert_eq!(pr.review_decision, None);
        assert!(pr.checks.is_empty() && pr.reviews.is_empty() && pr.comments.is_empty());
        assert_eq!(pr.label_names(), vec!["perf"]);
        assert_eq!(pr.body, "");
    }

    #[test]
    fn search_result_without_repository_is_skipped() {
        let json = r#"[{
            "number": 1,
            "createdAt": "2026-02-01T00:00:00Z",
            "updatedAt": "2026-02-01T00:00:00Z",
            "repository": {}
        }]"#;
        assert!(parse_search(json.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn missing_timestamp_is_a_parse_error() {
        let json = r#"[{"number": 1, "repository": {"nameWithOwner": "org/repo"}}]"#;
        assert!(matches!(
            parse_search(json.as_bytes()),
            Err(GhError::Parse(_))
        ));
    }

    #[test]
    fn both_check_shapes_normalize_to_one_shape() {
        let json = r#"{
            "number": 3,
            "state": "OPEN",
            "mergeable": "MERGEABLE",
            "reviewDecision": "APPROVED",
            "createdAt": "2026-02-01T00:00:00Z",
            "updatedAt": "2026-02-02T00:00:00Z",
            "statusCheckRollup": [
                {"__typename": "CheckRun", "name": "build", "status": "COMPLETED",
                 "conclusion": "SUCCESS", "workflowName": "CI",
                 "detailsUrl": "https://ci/1"},
                {"__typename": "CheckRun", "name": "e2e", "status": "IN_PROGRESS",
                 "conclusion": "", "workflowName": ""},
                {"__typename": "StatusContext", "context": "ci/jenkins",
                 "state": "ERROR", "targetUrl": "https://jenkins/2"},
                {"__typename": "StatusContext", "context": "deploy", "state": "PENDING"},
                {"__typename": "StatusContext", "context": "legacy-ok", "state": "SUCCESS"},
                {"__typename": "SomethingElse"}
            ]
        }"#;

        let pr = parse_detail_one(&repo(), json.as_bytes()).unwrap();
        assert!(pr.hydrated);
        assert_eq!(pr.checks.len(), 5);

        assert_eq!(pr.checks[0].conclusion, Some(Conclusion::Success));
        assert_eq!(pr.checks[0].workflow.as_deref(), Some("CI"));

        assert_eq!(pr.checks[1].status, CheckStatus::InProgress);
        assert_eq!(pr.checks[1].conclusion, None);
        assert_eq!(pr.checks[1].workflow, None);

        assert_eq!(pr.checks[2].name, "ci/jenkins");
        assert_eq!(pr.checks[2].conclusion, Some(Conclusion::Failure));
        assert_eq!(pr.checks[2].details_url.as_deref(), Some("https://jenkins/2"));

        assert_eq!(pr.checks[3].status, CheckStatus::Pending);
        assert_eq!(pr.checks[3].conclusion, None);

        assert_eq!(pr.checks[4].conclusion, Some(Conclusion::Success));
    }

    #[test]
    fn detail_fields_are_normalized() {
        let json = r#"[{
            "number": 9,
            "title": "Fix",
            "state": "OPEN",
            "isDraft": false,
            "author": null,
            "headRefName": "fix-9",
            "baseRefName": "main",
            "mergeable": "CONFLICTING",
            "reviewDecision": "",
            "reviews": [
                {"id": "R1", "author": {"login": "renovate[bot]"}, "state": "COMMENTED",
                 "body": "hi", "submittedAt": "2026-02-03T00:00:00Z"}
            ],
            "comments": [
                {"id": "C1", "author": {"login": "ci-helper", "is_bot": true},
                 "body": "done", "createdAt": "2026-02-03T01:00:00Z",
                 "url": "https://github.com/org/repo/pull/9#c1"}
            ],
            "statusCheckRollup": null,
            "labels": [],
            "additions": 10,
            "deletions": 2,
            "changedFiles": 1,
            "createdAt": "2026-02-01T00:00:00Z",
            "updatedAt": "2026-02-03T01:00:00Z"
        }]"#;

        let prs = parse_detail_list(&repo(), json.as_bytes()).unwrap();
        let pr = &prs[0];
        assert_eq!(pr.key, "org/repo#9");
        assert_eq!(pr.author, Author::unknown());
        assert_eq!(pr.mergeable, Mergeable::Conflicting);
        assert_eq!(pr.review_decision, None);
        assert!(pr.checks.is_empty());
        assert!(pr.reviews[0].author.is_bot);
        assert!(pr.comments[0].author.is_bot);
        assert_eq!(pr.head_branch, "fix-9");
        assert_eq!((pr.additions, pr.deletions, pr.changed_files), (10, 2, 1));
    }

    #[test]
    fn author_bot_detection() {
        let user = RawAuthor {
            login: Some("alice".into()),
            kind: Some("User".into()),
            is_bot: None,
        };
        assert!(!normalize_author(Some(&user)).is_bot);

        let typed_bot = RawAuthor {
            login: Some("app/dependabot".into()),
            kind: Some("Bot".into()),
            is_bot: None,
        };
        assert!(normalize_author(Some(&typed_bot)).is_bot);

        let empty = RawAuthor {
            login: Some(String::new()),
            kind: None,
            is_bot: Some(true),
        };
        assert_eq!(normalize_author(Some(&empty)), Author::unknown());
        assert_eq!(normalize_author(None), Author::unknown());
    }
}
