use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Transactional mail boundary. Callers only observe success or failure.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> AppResult<()>;
}

/// Drops each message as a JSON envelope into a spool directory that an
/// external relay drains.
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    outbox_dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(outbox_dir: impl Into<PathBuf>) -> Self {
        Self {
            outbox_dir: outbox_dir.into(),
        }
    }

    pub fn outbox_dir(&self) -> &Path {
        &self.outbox_dir
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboxEnvelope<'a> {
    id: String,
    queued_at: chrono::DateTime<Utc>,
    #[serde(flatten)]
    message: &'a MailMessage,
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, message: &MailMessage) -> AppResult<()> {
        if message.to.trim().is_empty() {
            return Err(AppError::MailUnavailable("Message has no recipient".to_string()));
        }

        tokio::fs::create_dir_all(&self.outbox_dir)
            .await
            .map_err(|error| AppError::MailUnavailable(error.to_string()))?;

        let envelope = OutboxEnvelope {
            id: Uuid::new_v4().to_string(),
            queued_at: Utc::now(),
            message,
        };
        let body = serde_json::to_vec_pretty(&envelope)?;

        // The relay only reads `*.json`, so stage under `.tmp` first.
        let staging = self.outbox_dir.join(format!("{}.json.tmp", envelope.id));
        let target = self.outbox_dir.join(format!("{}.json", envelope.id));
        tokio::fs::write(&staging, body)
            .await
            .map_err(|error| AppError::MailUnavailable(error.to_string()))?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|error| AppError::MailUnavailable(error.to_string()))?;

        tracing::debug!(message_id = %envelope.id, subject = %message.subject, "mail queued in outbox");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::{MailMessage, Mailer, OutboxMailer};
    use crate::errors::AppError;

    fn message(to: &str) -> MailMessage {
        MailMessage {
            from: "Nadrika <notificaciones@nadrika.com>".to_string(),
            to: to.to_string(),
            subject: "Hola".to_string(),
            html: "<p>Hola</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn outbox_writes_one_envelope_per_message() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mailer = OutboxMailer::new(dir.path().join("outbox"));

        mailer.send(&message("a@b.com")).await.expect("send");
        mailer.send(&message("c@d.com")).await.expect("send");

        let mut entries = std::fs::read_dir(mailer.outbox_dir())
            .expect("read outbox")
            .map(|entry| entry.expect("entry").path())
            .collect::<Vec<_>>();
        entries.sort();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json")));

        let raw = std::fs::read_to_string(&entries[0]).expect("read envelope");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["subject"], "Hola");
        assert!(value["queuedAt"].is_string());
    }

    #[tokio::test]
    async fn outbox_rejects_missing_recipient() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mailer = OutboxMailer::new(dir.path());
        let result = mailer.send(&message("  ")).await;
        assert!(matches!(result, Err(AppError::MailUnavailable(_))));
    }
}
