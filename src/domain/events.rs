use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{Check, Comment, PullRequest, Review};

/// 한 cycle에서 감지된 변화의 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrEventKind {
    Opened,
    Closed,
    Merged,
    ReviewSubmitted,
    CommentAdded,
    ChecksChanged,
    ConflictDetected,
    ConflictResolved,
    LabelsChanged,
    ReadyToMerge,
    BecameDraft,
    Undrafted,
}

impl PrEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PrEventKind::Opened => "opened",
            PrEventKind::Closed => "closed",
            PrEventKind::Merged => "merged",
            PrEventKind::ReviewSubmitted => "review_submitted",
            PrEventKind::CommentAdded => "comment_added",
            PrEventKind::ChecksChanged => "checks_changed",
            PrEventKind::ConflictDetected => "conflict_detected",
            PrEventKind::ConflictResolved => "conflict_resolved",
            PrEventKind::LabelsChanged => "labels_changed",
            PrEventKind::ReadyToMerge => "ready_to_merge",
            PrEventKind::BecameDraft => "became_draft",
            PrEventKind::Undrafted => "undrafted",
        }
    }
}

impl fmt::Display for PrEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 이벤트 종류별 변화량
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Review {
        review: Review,
    },
    Comment {
        comment: Comment,
    },
    Checks {
        current: Vec<Check>,
        previous: Vec<Check>,
    },
    Labels {
        added: Vec<String>,
        removed: Vec<String>,
    },
}

/// 감지된 변화 한 건.
///
/// `pr`은 현재 snapshot의 레코드다. 사라진 PR에 대한 `closed`만 예외로
/// 마지막으로 알려진 레코드를 담는다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrEvent {
    pub kind: PrEventKind,
    pub pr_key: String,
    pub pr: PullRequest,
    pub at: DateTime<Utc>,
    pub payload: Option<EventPayload>,
}

impl PrEvent {
    pub fn new(kind: PrEventKind, pr: &PullRequest, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            pr_key: pr.key.clone(),
            pr: pr.clone(),
            at,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = Some(payload);
        self
    }
}
