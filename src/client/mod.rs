use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Result};

use crate::config::{self, Env};
use crate::daemon::status::{self, WatchStatus};
use crate::domain::models::{parse_pr_key, PullRequest};
use crate::domain::state::{classify, PrState};
use crate::scanner::PrSource;

fn state_icon(state: PrState) -> &'static str {
    match state {
        PrState::Hot => "🔥",
        PrState::Waiting => "…",
        PrState::Ready => "✓",
        PrState::Dormant => "z",
        PrState::Blocked => "■",
    }
}

/// status file 요약 (watch가 실행 중이 아니면 안내 문구)
pub fn status(home: &Path) -> Result<String> {
    match status::read_status(&config::status_path(home)) {
        Some(ws) => Ok(format_status(&ws)),
        None => Ok("prwatch: no status (is `prwatch watch` running?)\n".to_string()),
    }
}

pub fn format_status(ws: &WatchStatus) -> String {
    let mut out = String::new();
    let c = &ws.counters;
    let last = ws
        .last_poll_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".into());

    let _ = writeln!(
        out,
        "prwatch: {} (uptime {}s, last poll {last})",
        if ws.polling { "● polling" } else { "○ idle" },
        ws.uptime_secs
    );
    let _ = writeln!(
        out,
        "hot {} · waiting {} · ready {} · dormant {} · blocked {}\n",
        c.hot, c.waiting, c.ready, c.dormant, c.blocked
    );

    if ws.prs.is_empty() {
        out.push_str("  (no open pull requests)\n");
    }
    for item in &ws.prs {
        let draft = if item.is_draft { " [draft]" } else { "" };
        let _ = writeln!(
            out,
            "  {} {:<8} {}{draft}\n      {}",
            state_icon(item.state),
            item.state,
            item.key,
            item.title
        );
    }
    out
}

/// PR 한 건을 즉시 조회하여 상세 출력
pub async fn view(source: &dyn PrSource, key: &str, dormant_threshold_hours: u64) -> Result<String> {
    let Some((owner, repo, number)) = parse_pr_key(key) else {
        bail!("invalid PR key: {key} (expected owner/repo#number)");
    };
    let pr = source.fetch_one_detail(owner, repo, number).await?;
    let state = classify(&pr, dormant_threshold_hours);
    Ok(format_pr(&pr, state))
}

fn format_pr(pr: &PullRequest, state: PrState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}  {}", state_icon(state), pr.key, pr.title);
    let _ = writeln!(out, "  url:       {}", pr.url);
    let _ = writeln!(out, "  state:     {state} ({})", pr.state);
    let _ = writeln!(
        out,
        "  branch:    {} → {}{}",
        pr.head_branch,
        pr.base_branch,
        if pr.is_draft { " (draft)" } else { "" }
    );
    let _ = writeln!(out, "  mergeable: {:?}", pr.mergeable);
    if let Some(decision) = pr.review_decision {
        let _ = writeln!(out, "  review:    {decision:?}");
    }
    let _ = writeln!(
        out,
        "  diff:      +{} -{} ({} files)",
        pr.additions, pr.deletions, pr.changed_files
    );
    if !pr.labels.is_empty() {
        let _ = writeln!(out, "  labels:    {}", pr.label_names().join(", "));
    }

    if !pr.checks.is_empty() {
        out.push_str("  checks:\n");
        for check in &pr.checks {
            let result = check
                .conclusion
                .map(|c| format!("{c:?}"))
                .unwrap_or_else(|| format!("{:?}", check.status));
            let _ = writeln!(out, "    - {}: {result}", check.name);
        }
    }
    let _ = writeln!(
        out,
        "  activity:  {} reviews, {} comments, updated {}",
        pr.reviews.len(),
        pr.comments.len(),
        pr.updated_at.to_rfc3339()
    );
    out
}

/// 머지된 최종 설정을 YAML로 출력
pub fn config_show(env: &dyn Env, override_path: Option<&Path>) -> Result<String> {
    let global_path = config::loader::global_config_path(env);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Global config: {} {}",
        global_path.display(),
        if global_path.exists() {
            "(exists)"
        } else {
            "(not found, using defaults)"
        }
    );
    if let Some(path) = override_path {
        let _ = writeln!(out, "Override:      {}", path.display());
    }

    let merged = config::loader::load_merged(env, override_path);
    let yaml = serde_yaml::to_string(&merged)?;
    let _ = write!(out, "\nEffective config:\n---\n{yaml}");
    Ok(out)
}
