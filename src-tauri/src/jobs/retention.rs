use crate::db::Database;
use crate::errors::AppResult;
use crate::models::{LeadSettings, RetentionOutcome};
use chrono::{DateTime, Duration, Months, Utc};

pub fn retention_cutoff(settings: &LeadSettings, now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(settings.retention_months))
        .unwrap_or_else(|| now - Duration::days(i64::from(settings.retention_months) * 31))
}

/// Deletes terminal leads older than the retention window as one batch.
/// Leads in any other status are kept regardless of age.
pub fn run_retention(db: &Database, settings: &LeadSettings, now: DateTime<Utc>) -> AppResult<RetentionOutcome> {
    let cutoff = retention_cutoff(settings, now);
    let removed = db.purge_retention_candidates(cutoff)?;
    if removed.is_empty() {
        tracing::info!(cutoff = %cutoff, "no aged terminal leads to remove");
    } else {
        tracing::info!(cutoff = %cutoff, deleted = removed.len(), "aged terminal leads removed");
    }
    Ok(RetentionOutcome {
        cutoff,
        deleted: removed.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::{retention_cutoff, run_retention};
    use crate::db::Database;
    use crate::models::{LeadSettings, LeadStatus, LeadSubmission};
    use chrono::{Months, TimeZone, Utc};

    fn submission(name: &str) -> LeadSubmission {
        LeadSubmission {
            name: name.to_string(),
            email: format!("{}@b.com", name),
            ..LeadSubmission::default()
        }
    }

    #[test]
    fn cutoff_is_six_calendar_months_back() {
        let now = Utc.with_ymd_and_hms(2026, 8, 31, 2, 0, 0).single().expect("now");
        let cutoff = retention_cutoff(&LeadSettings::default(), now);
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2026, 2, 28, 2, 0, 0).single().expect("cutoff"));
    }

    #[test]
    fn deletes_old_lost_but_never_new() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let now = Utc::now();
        let seven_months_ago = now.checked_sub_months(Months::new(7)).expect("seven months");

        let lost = db.insert_lead_at(&submission("lost"), seven_months_ago).expect("lost");
        db.update_lead_status(&lost.id, LeadStatus::Lost).expect("mark lost");
        let converted = db.insert_lead_at(&submission("won"), seven_months_ago).expect("won");
        db.update_lead_status(&converted.id, LeadStatus::Converted).expect("mark converted");
        let untouched = db.insert_lead_at(&submission("stale"), seven_months_ago).expect("stale");
        let qualified = db.insert_lead_at(&submission("warm"), seven_months_ago).expect("warm");
        db.update_lead_status(&qualified.id, LeadStatus::Qualified).expect("mark qualified");
        let recent = db.insert_lead(&submission("recent")).expect("recent");
        db.update_lead_status(&recent.id, LeadStatus::Lost).expect("mark recent lost");

        let outcome = run_retention(&db, &LeadSettings::default(), now).expect("retention");
        assert_eq!(outcome.deleted, 2);

        let remaining: Vec<_> = db.list_leads().expect("list").into_iter().map(|lead| lead.id).collect();
        assert!(remaining.contains(&untouched.id));
        assert!(remaining.contains(&qualified.id));
        assert!(remaining.contains(&recent.id));
        assert!(!remaining.contains(&lost.id));
        assert!(!remaining.contains(&converted.id));
    }

    #[test]
    fn lead_reopened_after_selection_survives_purge() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let now = Utc::now();
        let seven_months_ago = now.checked_sub_months(Months::new(7)).expect("seven months");
        let cutoff = retention_cutoff(&LeadSettings::default(), now);

        let reopened = db.insert_lead_at(&submission("reopened"), seven_months_ago).expect("reopened");
        db.update_lead_status(&reopened.id, LeadStatus::Lost).expect("mark lost");
        let candidates = db.list_retention_candidates(cutoff).expect("candidates");
        assert_eq!(candidates.len(), 1);

        db.update_lead_status(&reopened.id, LeadStatus::Qualified).expect("reopen");
        let removed = db.purge_retention_candidates(cutoff).expect("purge");
        assert!(removed.is_empty());
        assert_eq!(
            db.get_lead(&reopened.id).expect("get").map(|lead| lead.status),
            Some(LeadStatus::Qualified)
        );

        let outcome = run_retention(&db, &LeadSettings::default(), now).expect("retention");
        assert_eq!(outcome.deleted, 0);
        assert_eq!(db.list_leads().expect("list").len(), 1);
    }

    #[test]
    fn empty_selection_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        db.insert_lead(&submission("fresh")).expect("fresh");

        let outcome = run_retention(&db, &LeadSettings::default(), Utc::now()).expect("retention");
        assert_eq!(outcome.deleted, 0);
        assert_eq!(db.list_leads().expect("list").len(), 1);
    }
}
