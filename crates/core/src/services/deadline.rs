//! Deadline derivation and urgency classification.
//!
//! A report's deadline is fixed at creation from its severity. Everything
//! else here is a pure view over `(status, deadline, now)` that clients use
//! to render countdowns and decide when to look again.

use chrono::{DateTime, Duration, Utc};
use janta_db::entities::{ReportStatus, Severity, report};
use serde::Serialize;

/// Time allowed to resolve a report of the given severity.
#[must_use]
pub const fn deadline_offset(severity: Severity) -> Duration {
    match severity {
        Severity::High => Duration::hours(24),
        Severity::Medium => Duration::hours(48),
        Severity::Low => Duration::hours(72),
    }
}

/// Deadline for a report created at `created_at`.
#[must_use]
pub fn deadline_for(severity: Severity, created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + deadline_offset(severity)
}

/// How close a report is to its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Resolved; deadlines no longer apply.
    Resolved,
    /// Legacy report without a deadline.
    None,
    /// Past the deadline.
    Overdue,
    /// At most one day left.
    Critical,
    /// At most three days left.
    Urgent,
    /// More than three days left.
    Normal,
}

/// Classify a report's urgency at `now`.
#[must_use]
pub fn classify(
    status: ReportStatus,
    deadline: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Urgency {
    if status == ReportStatus::Resolved {
        return Urgency::Resolved;
    }
    let Some(deadline) = deadline else {
        return Urgency::None;
    };
    if now > deadline {
        return Urgency::Overdue;
    }

    let left = deadline - now;
    if left <= Duration::days(1) {
        Urgency::Critical
    } else if left <= Duration::days(3) {
        Urgency::Urgent
    } else {
        Urgency::Normal
    }
}

/// Seconds until the deadline; negative once it has passed.
#[must_use]
pub fn time_remaining_secs(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    deadline.map(|d| (d - now).num_seconds())
}

/// The earliest future deadline among active reports.
///
/// This is the next instant at which some report's urgency changes to
/// overdue, so a client only needs to re-evaluate then.
#[must_use]
pub fn next_recheck_at(reports: &[report::Model], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    reports
        .iter()
        .filter(|r| r.status.is_active())
        .filter_map(|r| r.deadline)
        .filter(|d| *d > now)
        .min()
}

/// Order reports overdue first, then by deadline ascending. Reports
/// without a deadline go last.
pub fn sort_by_deadline(reports: &mut [report::Model], now: DateTime<Utc>) {
    reports.sort_by_key(|r| {
        let overdue = classify(r.status, r.deadline, now) == Urgency::Overdue;
        (!overdue, r.deadline.is_none(), r.deadline)
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use janta_db::test_utils::report_fixture;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_deadline_offsets_per_severity() {
        let created = t0();
        assert_eq!(
            deadline_for(Severity::High, created) - created,
            Duration::hours(24)
        );
        assert_eq!(
            deadline_for(Severity::Medium, created) - created,
            Duration::hours(48)
        );
        assert_eq!(
            deadline_for(Severity::Low, created) - created,
            Duration::hours(72)
        );
    }

    #[test]
    fn test_classify_thresholds() {
        let now = t0();
        let at = |h: i64| Some(now + Duration::hours(h));

        assert_eq!(classify(ReportStatus::Open, at(-1), now), Urgency::Overdue);
        assert_eq!(classify(ReportStatus::Open, at(24), now), Urgency::Critical);
        assert_eq!(classify(ReportStatus::InProgress, at(25), now), Urgency::Urgent);
        assert_eq!(classify(ReportStatus::Open, at(72), now), Urgency::Urgent);
        assert_eq!(classify(ReportStatus::Open, at(73), now), Urgency::Normal);
        assert_eq!(classify(ReportStatus::Open, None, now), Urgency::None);
    }

    #[test]
    fn test_resolved_is_never_overdue() {
        let now = t0();
        let long_past = Some(now - Duration::days(30));
        assert_eq!(
            classify(ReportStatus::Resolved, long_past, now),
            Urgency::Resolved
        );
    }

    #[test]
    fn test_exact_deadline_is_not_overdue() {
        let now = t0();
        assert_eq!(classify(ReportStatus::Open, Some(now), now), Urgency::Critical);
        assert_eq!(time_remaining_secs(Some(now), now), Some(0));
    }

    #[test]
    fn test_next_recheck_skips_resolved_and_past() {
        let now = t0();
        let past = report_fixture("r1", "c", Severity::High, now - Duration::hours(30));
        let mut resolved = report_fixture("r2", "c", Severity::High, now);
        resolved.status = ReportStatus::Resolved;
        let soon = report_fixture("r3", "c", Severity::Medium, now);
        let later = report_fixture("r4", "c", Severity::Low, now);

        let next = next_recheck_at(&[past, resolved, later, soon], now);
        assert_eq!(next, Some(now + Duration::hours(48)));
        assert_eq!(next_recheck_at(&[], now), None);
    }

    #[test]
    fn test_sort_puts_overdue_first() {
        let now = t0();
        let mut legacy = report_fixture("none", "c", Severity::Low, now);
        legacy.deadline = None;
        let mut reports = vec![
            report_fixture("low", "c", Severity::Low, now),
            legacy,
            report_fixture("high", "c", Severity::High, now),
            report_fixture("late", "c", Severity::High, now - Duration::hours(48)),
        ];

        sort_by_deadline(&mut reports, now);
        let ids: Vec<_> = reports.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["late", "high", "low", "none"]);
    }
}
