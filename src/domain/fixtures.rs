//! 단위 테스트용 PR 빌더

use chrono::{DateTime, Utc};

use super::models::*;

pub fn pr_at(repo: &str, number: i64, updated_at: DateTime<Utc>) -> PullRequest {
    let repo_ref = RepoRef::parse(repo).expect("repo must be owner/name");
    PullRequest {
        key: make_pr_key(repo, number),
        number,
        title: format!("PR #{number}"),
        body: String::new(),
        url: format!("https://github.com/{repo}/pull/{number}"),
        repo: repo_ref,
        author: Author {
            login: "me".to_string(),
            is_bot: false,
        },
        head_branch: format!("feat-{number}"),
        base_branch: "main".to_string(),
        is_draft: false,
        state: PrLifecycle::Open,
        mergeable: Mergeable::Unknown,
        review_decision: None,
        reviews: vec![],
        comments: vec![],
        checks: vec![],
        labels: vec![],
        additions: 0,
        deletions: 0,
        changed_files: 0,
        created_at: updated_at,
        updated_at,
        worktree: None,
        hydrated: true,
    }
}

pub fn pr(repo: &str, number: i64) -> PullRequest {
    pr_at(repo, number, "2026-03-01T00:00:00Z".parse().unwrap())
}

pub fn check(name: &str, status: CheckStatus, conclusion: Option<Conclusion>) -> Check {
    Check {
        name: name.to_string(),
        status,
        conclusion,
        workflow: None,
        details_url: None,
    }
}

pub fn label(name: &str) -> Label {
    Label {
        id: format!("L_{name}"),
        name: name.to_string(),
        color: "ededed".to_string(),
    }
}

pub fn review(id: &str, state: ReviewState) -> Review {
    Review {
        id: id.to_string(),
        author: Author {
            login: "reviewer".to_string(),
            is_bot: false,
        },
        state,
        body: String::new(),
        submitted_at: None,
    }
}

pub fn comment(id: &str, body: &str) -> Comment {
    Comment {
        id: id.to_string(),
        author: Author {
            login: "someone".to_string(),
            is_bot: false,
        },
        body: body.to_string(),
        created_at: None,
        url: None,
    }
}

pub fn snapshot_of(prs: Vec<PullRequest>) -> Snapshot {
    prs.into_iter().map(|p| (p.key.clone(), p)).collect()
}
