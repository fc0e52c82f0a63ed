use crate::db::Database;
use crate::errors::AppResult;
use crate::mailer::{MailMessage, Mailer};
use crate::models::{DeliveryStatus, Lead, LeadSettings, MailDeliveryRecord, MailKind, WeeklyReport};
use crate::redaction::Redactor;
use crate::templates;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub status: DeliveryStatus,
    pub error: Option<String>,
}

impl SendResult {
    fn from_result(result: &AppResult<()>) -> Self {
        match result {
            Ok(()) => Self {
                status: DeliveryStatus::Sent,
                error: None,
            },
            Err(error) => Self {
                status: DeliveryStatus::Failed,
                error: Some(error.to_string()),
            },
        }
    }

    pub fn is_sent(&self) -> bool {
        self.status == DeliveryStatus::Sent
    }
}

/// Both sends are always attempted; either may fail alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOutcome {
    pub admin_alert: SendResult,
    pub confirmation: SendResult,
}

impl NotificationOutcome {
    pub fn all_sent(&self) -> bool {
        self.admin_alert.is_sent() && self.confirmation.is_sent()
    }
}

#[derive(Clone)]
pub struct NotificationService {
    mailer: Arc<dyn Mailer>,
    db: Arc<Database>,
    redactor: Redactor,
}

impl NotificationService {
    pub fn new(mailer: Arc<dyn Mailer>, db: Arc<Database>) -> Self {
        Self {
            mailer,
            db,
            redactor: Redactor::new(),
        }
    }

    pub async fn notify_new_lead(&self, lead: &Lead, settings: &LeadSettings) -> NotificationOutcome {
        let admin_message = MailMessage {
            from: settings.mail_from(),
            to: settings.admin_email.clone(),
            subject: templates::admin_alert_subject(lead),
            html: templates::render_admin_alert(lead, settings),
        };
        let confirmation_message = MailMessage {
            from: settings.mail_from(),
            to: lead.email.clone(),
            subject: templates::CONFIRMATION_SUBJECT.to_string(),
            html: templates::render_lead_confirmation(lead, settings),
        };

        let (admin_result, confirmation_result) = tokio::join!(
            self.mailer.send(&admin_message),
            self.mailer.send(&confirmation_message)
        );

        let outcome = NotificationOutcome {
            admin_alert: SendResult::from_result(&admin_result),
            confirmation: SendResult::from_result(&confirmation_result),
        };
        self.record(MailKind::AdminAlert, &admin_message, &outcome.admin_alert, Some(&lead.id));
        self.record(
            MailKind::LeadConfirmation,
            &confirmation_message,
            &outcome.confirmation,
            Some(&lead.id),
        );

        if outcome.all_sent() {
            tracing::info!(lead_id = %lead.id, "lead notifications sent");
        } else {
            tracing::warn!(
                lead_id = %lead.id,
                admin_alert = outcome.admin_alert.status.as_str(),
                confirmation = outcome.confirmation.status.as_str(),
                "lead notifications partially failed"
            );
        }
        outcome
    }

    pub async fn send_digest(&self, report: &WeeklyReport, settings: &LeadSettings) -> AppResult<()> {
        let message = MailMessage {
            from: settings.mail_from(),
            to: settings.admin_email.clone(),
            subject: templates::digest_subject(report),
            html: templates::render_weekly_digest(report, settings),
        };
        let result = self.mailer.send(&message).await;
        self.record(MailKind::WeeklyDigest, &message, &SendResult::from_result(&result), None);
        result
    }

    fn record(&self, kind: MailKind, message: &MailMessage, result: &SendResult, lead_id: Option<&str>) {
        if let Some(error) = result.error.as_deref() {
            tracing::warn!(
                kind = kind.as_str(),
                recipient = %self.redactor.redact(&message.to),
                error = %self.redactor.redact(error),
                "mail delivery failed"
            );
        }

        let record = MailDeliveryRecord {
            id: Uuid::new_v4().to_string(),
            kind,
            recipient: message.to.clone(),
            subject: message.subject.clone(),
            status: result.status,
            error: result.error.clone(),
            lead_id: lead_id.map(ToString::to_string),
            attempted_at: Utc::now(),
        };
        if let Err(error) = self.db.insert_mail_delivery(&record) {
            tracing::warn!(error = %error, kind = kind.as_str(), "failed to record mail delivery");
        }
    }
}
