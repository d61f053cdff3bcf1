//! 두 snapshot을 비교하여 PR 변화 이벤트 목록을 만든다.
//!
//! 순수 함수: I/O 없음, 같은 입력이면 같은 출력.
//! 한 PR이 여러 차원에서 바뀌면 감지기마다 이벤트를 하나씩 낸다 (고정된 감지기 순서).

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};

use super::events::{EventPayload, PrEvent, PrEventKind};
use super::models::{Check, Conclusion, PrLifecycle, PullRequest, Snapshot};

/// 현재 시각을 이벤트 timestamp로 사용
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<PrEvent> {
    diff_at(previous, current, Utc::now())
}

/// 테스트 가능한 내부 구현: 이벤트 timestamp를 주입받는다
pub fn diff_at(previous: &Snapshot, current: &Snapshot, at: DateTime<Utc>) -> Vec<PrEvent> {
    let mut events = Vec::new();

    for (key, cur) in current {
        match previous.get(key) {
            None => events.push(PrEvent::new(PrEventKind::Opened, cur, at)),
            Some(prev) => diff_pr(prev, cur, at, &mut events),
        }
    }

    // 사라진 PR → closed (마지막으로 알려진 레코드 사용)
    for (key, prev) in previous {
        if !current.contains_key(key) {
            events.push(PrEvent::new(PrEventKind::Closed, prev, at));
        }
    }

    events
}

fn diff_pr(prev: &PullRequest, cur: &PullRequest, at: DateTime<Utc>, out: &mut Vec<PrEvent>) {
    // ── lifecycle ──
    if prev.state == PrLifecycle::Open {
        match cur.state {
            PrLifecycle::Merged => out.push(PrEvent::new(PrEventKind::Merged, cur, at)),
            PrLifecycle::Closed => out.push(PrEvent::new(PrEventKind::Closed, cur, at)),
            PrLifecycle::Open => {}
        }
    }

    // ── draft ──
    if prev.is_draft && !cur.is_draft {
        out.push(PrEvent::new(PrEventKind::Undrafted, cur, at));
    } else if !prev.is_draft && cur.is_draft {
        out.push(PrEvent::new(PrEventKind::BecameDraft, cur, at));
    }

    // ── reviews ──
    let seen_reviews: HashSet<&str> = prev.reviews.iter().map(|r| r.id.as_str()).collect();
    for review in cur
        .reviews
        .iter()
        .filter(|r| !seen_reviews.contains(r.id.as_str()))
    {
        out.push(
            PrEvent::new(PrEventKind::ReviewSubmitted, cur, at).with_payload(
                EventPayload::Review {
                    review: review.clone(),
                },
            ),
        );
    }

    // ── comments ──
    let seen_comments: HashSet<&str> = prev.comments.iter().map(|c| c.id.as_str()).collect();
    for comment in cur
        .comments
        .iter()
        .filter(|c| !seen_comments.contains(c.id.as_str()))
    {
        out.push(
            PrEvent::new(PrEventKind::CommentAdded, cur, at).with_payload(
                EventPayload::Comment {
                    comment: comment.clone(),
                },
            ),
        );
    }

    // ── checks ──
    if checks_changed(&prev.checks, &cur.checks) {
        out.push(
            PrEvent::new(PrEventKind::ChecksChanged, cur, at).with_payload(EventPayload::Checks {
                current: cur.checks.clone(),
                previous: prev.checks.clone(),
            }),
        );
    }

    // ── conflicts ──
    if !prev.is_conflicting() && cur.is_conflicting() {
        out.push(PrEvent::new(PrEventKind::ConflictDetected, cur, at));
    } else if prev.is_conflicting() && !cur.is_conflicting() {
        out.push(PrEvent::new(PrEventKind::ConflictResolved, cur, at));
    }

    // ── labels ──
    let prev_labels: BTreeSet<&str> = prev.labels.iter().map(|l| l.name.as_str()).collect();
    let cur_labels: BTreeSet<&str> = cur.labels.iter().map(|l| l.name.as_str()).collect();
    let added: Vec<String> = cur_labels
        .difference(&prev_labels)
        .map(|s| s.to_string())
        .collect();
    let removed: Vec<String> = prev_labels
        .difference(&cur_labels)
        .map(|s| s.to_string())
        .collect();
    if !added.is_empty() || !removed.is_empty() {
        out.push(
            PrEvent::new(PrEventKind::LabelsChanged, cur, at)
                .with_payload(EventPayload::Labels { added, removed }),
        );
    }

    // ── ready-to-merge (not-ready → ready 전이에서만) ──
    if !prev.is_ready_to_merge() && cur.is_ready_to_merge() {
        out.push(PrEvent::new(PrEventKind::ReadyToMerge, cur, at));
    }
}

/// check 개수 또는 (name, conclusion) 집합이 달라졌는지.
/// check 목록은 순서가 없으므로 정렬 후 비교한다.
fn checks_changed(prev: &[Check], cur: &[Check]) -> bool {
    if prev.len() != cur.len() {
        return true;
    }
    check_signature(prev) != check_signature(cur)
}

fn check_signature(checks: &[Check]) -> Vec<(&str, Option<Conclusion>)> {
    let mut sig: Vec<(&str, Option<Conclusion>)> = checks
        .iter()
        .map(|c| (c.name.as_str(), c.conclusion))
        .collect();
    sig.sort();
    sig
}
