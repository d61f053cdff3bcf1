//! PR 긴급도 분류기.
//!
//! 상태는 저장되는 사실이 아니라 매번 PullRequest + dormant threshold로부터 다시 계산된다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::models::{PullRequest, ReviewDecision, Snapshot};

/// chrono Duration 범위를 넘지 않도록 threshold 상한 (100년)
const MAX_THRESHOLD_HOURS: u64 = 24 * 365 * 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    Hot,
    Waiting,
    Ready,
    Dormant,
    Blocked,
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrState::Hot => write!(f, "hot"),
            PrState::Waiting => write!(f, "waiting"),
            PrState::Ready => write!(f, "ready"),
            PrState::Dormant => write!(f, "dormant"),
            PrState::Blocked => write!(f, "blocked"),
        }
    }
}

/// 현재 시각 기준 분류
pub fn classify(pr: &PullRequest, dormant_threshold_hours: u64) -> PrState {
    classify_at(pr, dormant_threshold_hours, Utc::now())
}

/// 우선순위 cascade: 먼저 매칭되는 규칙이 이긴다.
///
/// 1. blocked: OPEN이 아니거나 draft
/// 2. hot: 실패/취소된 check, CHANGES_REQUESTED, CONFLICTING 중 하나
/// 3. ready: checks 통과 + APPROVED + MERGEABLE (checks가 비어 있으면 불가)
/// 4. dormant: 마지막 업데이트 후 threshold 시간을 *초과*
/// 5. waiting: 나머지
pub fn classify_at(pr: &PullRequest, dormant_threshold_hours: u64, now: DateTime<Utc>) -> PrState {
    if !pr.is_open() || pr.is_draft {
        return PrState::Blocked;
    }

    if pr.has_failing_check()
        || pr.review_decision == Some(ReviewDecision::ChangesRequested)
        || pr.is_conflicting()
    {
        return PrState::Hot;
    }

    if pr.is_ready_to_merge() {
        return PrState::Ready;
    }

    let threshold = Duration::hours(dormant_threshold_hours.min(MAX_THRESHOLD_HOURS) as i64);
    if now.signed_duration_since(pr.updated_at) > threshold {
        return PrState::Dormant;
    }

    PrState::Waiting
}

/// snapshot 전체의 상태 테이블
pub fn classify_all(
    snapshot: &Snapshot,
    dormant_threshold_hours: u64,
    now: DateTime<Utc>,
) -> BTreeMap<String, PrState> {
    snapshot
        .iter()
        .map(|(key, pr)| (key.clone(), classify_at(pr, dormant_threshold_hours, now)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::{check, pr_at};
    use crate::domain::models::{CheckStatus, Conclusion, Mergeable, PrLifecycle};

    fn now() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn fresh_pr_without_signals_is_waiting() {
        let pr = pr_at("a/b", 1, now());
        assert_eq!(classify_at(&pr, 72, now()), PrState::Waiting);
    }

    #[test]
    fn closed_or_merged_is_blocked() {
        let mut pr = pr_at("a/b", 1, now());
        pr.state = PrLifecycle::Merged;
        assert_eq!(classify_at(&pr, 72, now()), PrState::Blocked);
        pr.state = PrLifecycle::Closed;
        assert_eq!(classify_at(&pr, 72, now()), PrState::Blocked);
    }

    #[test]
    fn draft_outranks_hot_signals() {
        let mut pr = pr_at("a/b", 1, now());
        pr.is_draft = true;
        pr.review_decision = Some(ReviewDecision::ChangesRequested);
        pr.mergeable = Mergeable::Conflicting;
        assert_eq!(classify_at(&pr, 72, now()), PrState::Blocked);
    }

    #[test]
    fn failing_or_cancelled_check_is_hot() {
        let mut pr = pr_at("a/b", 1, now());
        pr.checks = vec![check("build", CheckStatus::Completed, Some(Conclusion::Failure))];
        assert_eq!(classify_at(&pr, 72, now()), PrState::Hot);

        pr.checks = vec![check("lint", CheckStatus::Completed, Some(Conclusion::Cancelled))];
        assert_eq!(classify_at(&pr, 72, now()), PrState::Hot);
    }

    #[test]
    fn conflict_and_changes_requested_are_hot() {
        let mut pr = pr_at("a/b", 1, now());
        pr.mergeable = Mergeable::Conflicting;
        assert_eq!(classify_at(&pr, 72, now()), PrState::Hot);

        let mut pr = pr_at("a/b", 2, now());
        pr.review_decision = Some(ReviewDecision::ChangesRequested);
        assert_eq!(classify_at(&pr, 72, now()), PrState::Hot);
    }

    #[test]
    fn approved_mergeable_passing_is_ready() {
        let mut pr = pr_at("a/b", 1, now());
        pr.review_decision = Some(ReviewDecision::Approved);
        pr.mergeable = Mergeable::Mergeable;
        pr.checks = vec![
            check("build", CheckStatus::Completed, Some(Conclusion::Success)),
            check("docs", CheckStatus::Completed, Some(Conclusion::Skipped)),
            check("optional", CheckStatus::Completed, Some(Conclusion::Neutral)),
        ];
        assert_eq!(classify_at(&pr, 72, now()), PrState::Ready);
    }

    #[test]
    fn empty_checks_never_ready() {
        let mut pr = pr_at("a/b", 1, now());
        pr.review_decision = Some(ReviewDecision::Approved);
        pr.mergeable = Mergeable::Mergeable;
        assert_eq!(classify_at(&pr, 72, now()), PrState::Waiting);
    }

    #[test]
    fn pending_check_blocks_ready() {
        let mut pr = pr_at("a/b", 1, now());
        pr.review_decision = Some(ReviewDecision::Approved);
        pr.mergeable = Mergeable::Mergeable;
        pr.checks = vec![
            check("build", CheckStatus::Completed, Some(Conclusion::Success)),
            check("e2e", CheckStatus::InProgress, None),
        ];
        assert_eq!(classify_at(&pr, 72, now()), PrState::Waiting);
    }

    #[test]
    fn dormant_boundary_is_exclusive() {
        let at_threshold = pr_at("a/b", 1, now() - Duration::hours(72));
        assert_eq!(classify_at(&at_threshold, 72, now()), PrState::Waiting);

        let past_threshold =
            pr_at("a/b", 1, now() - Duration::hours(72) - Duration::seconds(1));
        assert_eq!(classify_at(&past_threshold, 72, now()), PrState::Dormant);
    }

    #[test]
    fn stale_hot_pr_stays_hot() {
        let mut pr = pr_at("a/b", 1, now() - Duration::days(30));
        pr.mergeable = Mergeable::Conflicting;
        assert_eq!(classify_at(&pr, 72, now()), PrState::Hot);
    }

    #[test]
    fn classify_all_covers_every_key() {
        let mut snapshot = Snapshot::new();
        let a = pr_at("a/b", 1, now());
        let mut b = pr_at("a/b", 2, now());
        b.is_draft = true;
        snapshot.insert(a.key.clone(), a);
        snapshot.insert(b.key.clone(), b);

        let states = classify_all(&snapshot, 72, now());
        assert_eq!(states.len(), 2);
        assert_eq!(states["a/b#1"], PrState::Waiting);
        assert_eq!(states["a/b#2"], PrState::Blocked);
    }
}
