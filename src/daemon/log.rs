use std::path::Path;

use chrono::NaiveDate;
use tracing::info;

/// tracing-appender daily 파일 prefix (`watch.YYYY-MM-DD.log`)
pub const LOG_FILE_PREFIX: &str = "watch";

/// `retention_days`보다 오래된 watch 로그를 지우고 삭제 건수를 반환한다.
pub fn cleanup_old_logs(log_dir: &Path, retention_days: u32) -> u32 {
    prune_logs_before(log_dir, retention_days, chrono::Local::now().date_naive())
}

fn prune_logs_before(log_dir: &Path, retention_days: u32, today: NaiveDate) -> u32 {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return 0;
    };
    let cutoff = today - chrono::Duration::days(i64::from(retention_days));

    let mut deleted = 0;
    for entry in entries.filter_map(Result::ok) {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let expired = log_file_date(&name).is_some_and(|date| date < cutoff);
        if expired && std::fs::remove_file(entry.path()).is_ok() {
            info!("deleted old log: {name}");
            deleted += 1;
        }
    }
    deleted
}

/// "watch.2026-03-01.log" → 2026-03-01
fn log_file_date(filename: &str) -> Option<NaiveDate> {
    let date = filename
        .strip_prefix(LOG_FILE_PREFIX)?
        .strip_prefix('.')?
        .strip_suffix(".log")?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
