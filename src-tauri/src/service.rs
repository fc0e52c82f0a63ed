use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::export::write_csv_export;
use crate::jobs::{reporting, retention, RETENTION_JOB, WEEKLY_REPORT_JOB};
use crate::mailer::Mailer;
use crate::models::{
    ExportResponse, Lead, LeadFilters, LeadSettings, LeadStats, LeadStatus, LeadSubmission, MailDeliveryRecord,
    RetentionOutcome, WeeklyReport,
};
use crate::notifications::NotificationService;
use crate::redaction::Redactor;
use crate::scheduler::{Cadence, JobFuture, JobHandler, JobScheduler};
use crate::stats::compute_stats;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

const DATABASE_FILE: &str = "leads.sqlite";
const EXPORT_DIR: &str = "exports";

pub struct LeadService {
    db: Arc<Database>,
    notifications: NotificationService,
    redactor: Redactor,
    export_dir: PathBuf,
    pending_notifications: Mutex<JoinSet<()>>,
}

impl LeadService {
    pub fn new(app_data_dir: &Path, mailer: Arc<dyn Mailer>) -> AppResult<Arc<Self>> {
        let db = Arc::new(Database::new(&app_data_dir.join(DATABASE_FILE))?);
        let notifications = NotificationService::new(mailer, db.clone());
        tracing::info!(database = %db.path().display(), "lead store opened");

        Ok(Arc::new(Self {
            db,
            notifications,
            redactor: Redactor::new(),
            export_dir: app_data_dir.join(EXPORT_DIR),
            pending_notifications: Mutex::new(JoinSet::new()),
        }))
    }

    /// Persists a submission and fires both notification mails in the
    /// background. The lead is returned as soon as it is stored; nothing
    /// after the insert can turn the call into a failure.
    pub async fn create_lead(&self, submission: LeadSubmission) -> AppResult<Lead> {
        let lead = self.db.insert_lead(&submission)?;
        tracing::info!(
            lead_id = %lead.id,
            email = %self.redactor.redact(&lead.email),
            service = lead.service.map(|service| service.as_str()).unwrap_or("none"),
            "lead created"
        );

        let settings = self.db.get_settings().unwrap_or_else(|error| {
            tracing::warn!(lead_id = %lead.id, error = %error, "settings unreadable, notifying with defaults");
            LeadSettings::default()
        });
        let notifications = self.notifications.clone();
        let created = lead.clone();
        let mut pending = self.pending_notifications.lock().await;
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            notifications.notify_new_lead(&created, &settings).await;
        });
        Ok(lead)
    }

    /// Waits for every in-flight notification task.
    pub async fn flush_notifications(&self) {
        let mut pending = self.pending_notifications.lock().await;
        while let Some(result) = pending.join_next().await {
            if let Err(error) = result {
                tracing::error!(error = %error, "notification task aborted");
            }
        }
    }

    pub fn get_lead(&self, lead_id: &str) -> AppResult<Lead> {
        self.db
            .get_lead(lead_id)?
            .ok_or_else(|| AppError::NotFound(format!("Lead {} no encontrado", lead_id)))
    }

    pub fn list_leads(&self) -> AppResult<Vec<Lead>> {
        self.db.list_leads()
    }

    pub fn filter_leads(&self, filters: &LeadFilters) -> AppResult<Vec<Lead>> {
        let leads = match (filters.status, filters.service) {
            (Some(status), _) => self.db.list_leads_by_status(status)?,
            (None, Some(service)) => self.db.list_leads_by_service(service)?,
            (None, None) => self.db.list_leads()?,
        };
        Ok(leads.into_iter().filter(|lead| filters.matches(lead)).collect())
    }

    pub fn update_status(&self, lead_id: &str, status: LeadStatus) -> AppResult<Lead> {
        let lead = self.db.update_lead_status(lead_id, status)?;
        tracing::info!(lead_id = %lead.id, status = status.as_str(), "lead status updated");
        Ok(lead)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> AppResult<LeadStats> {
        Ok(compute_stats(&self.db.list_leads()?, now))
    }

    pub fn settings(&self) -> AppResult<LeadSettings> {
        self.db.get_settings()
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<LeadSettings> {
        let settings = self.db.update_settings(update)?;
        tracing::info!("lead settings updated");
        Ok(settings)
    }

    pub fn mail_deliveries(&self, limit: u32) -> AppResult<Vec<MailDeliveryRecord>> {
        self.db.list_mail_deliveries(limit)
    }

    pub async fn run_weekly_report(&self, now: DateTime<Utc>) -> AppResult<WeeklyReport> {
        let settings = self.db.get_settings()?;
        reporting::run_weekly_report(&self.db, &self.notifications, &settings, now).await
    }

    pub fn run_retention(&self, now: DateTime<Utc>) -> AppResult<RetentionOutcome> {
        let settings = self.db.get_settings()?;
        retention::run_retention(&self.db, &settings, now)
    }

    pub fn export_csv(&self, leads: &[Lead], now: DateTime<Utc>) -> AppResult<ExportResponse> {
        let settings = self.db.get_settings()?;
        write_csv_export(&self.export_dir, leads, now, settings.offset())
    }

    /// Registers the retention and weekly report jobs using the cadences
    /// from the stored settings. Later settings changes apply on restart.
    pub async fn register_jobs(self: &Arc<Self>, scheduler: &JobScheduler) -> AppResult<()> {
        let settings = self.db.get_settings()?;

        let service = self.clone();
        let retention_handler: JobHandler = Arc::new(move || -> JobFuture {
            let service = service.clone();
            Box::pin(async move { service.run_retention(Utc::now()).map(|_| ()) })
        });
        scheduler
            .register(
                RETENTION_JOB,
                Cadence::Daily {
                    hour: settings.retention_hour,
                },
                retention_handler,
            )
            .await;

        let service = self.clone();
        let report_handler: JobHandler = Arc::new(move || -> JobFuture {
            let service = service.clone();
            Box::pin(async move { service.run_weekly_report(Utc::now()).await.map(|_| ()) })
        });
        scheduler
            .register(
                WEEKLY_REPORT_JOB,
                Cadence::Weekly {
                    weekday: settings.report_weekday,
                    hour: settings.report_hour,
                },
                report_handler,
            )
            .await;

        Ok(())
    }
}
