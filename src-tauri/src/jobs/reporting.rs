use crate::db::Database;
use crate::errors::AppResult;
use crate::models::{LeadSettings, WeeklyReport};
use crate::notifications::NotificationService;
use crate::stats::{tally_by_service, tally_by_status};
use chrono::{DateTime, Duration, Utc};

pub fn build_report(db: &Database, settings: &LeadSettings, now: DateTime<Utc>) -> AppResult<WeeklyReport> {
    let window_start = now - Duration::days(i64::from(settings.report_window_days));
    let leads: Vec<_> = db
        .list_leads_created_since(window_start)?
        .into_iter()
        .filter(|lead| lead.created_at <= now)
        .collect();

    Ok(WeeklyReport {
        window_start,
        window_end: now,
        total: leads.len() as u64,
        by_service: tally_by_service(&leads),
        by_status: tally_by_status(&leads),
    })
}

/// Builds the trailing-window digest and mails it to the admin address,
/// including when the window holds no leads.
pub async fn run_weekly_report(
    db: &Database,
    notifications: &NotificationService,
    settings: &LeadSettings,
    now: DateTime<Utc>,
) -> AppResult<WeeklyReport> {
    let report = build_report(db, settings, now)?;
    tracing::info!(
        total = report.total,
        window_start = %report.window_start,
        "weekly lead report built"
    );
    notifications.send_digest(&report, settings).await?;
    Ok(report)
}
