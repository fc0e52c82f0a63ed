use crate::errors::{AppError, AppResult};
use crate::models::{
    DeliveryStatus, Lead, LeadSettings, LeadSource, LeadStatus, LeadSubmission, MailDeliveryRecord, MailKind,
    Service,
};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

const LEAD_COLUMNS: &str =
    "id, name, email, company, phone, service, message, status, source, created_at, updated_at";

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };

        db.ensure_default_settings()?;

        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::StoreUnavailable("database mutex poisoned".to_string()))
    }

    // ─── Leads ──────────────────────────────────────────────────────────────

    pub fn insert_lead(&self, submission: &LeadSubmission) -> AppResult<Lead> {
        self.insert_lead_at(submission, Utc::now())
    }

    pub(crate) fn insert_lead_at(&self, submission: &LeadSubmission, now: DateTime<Utc>) -> AppResult<Lead> {
        let submission = submission.trimmed();
        if submission.name.is_empty() || submission.email.is_empty() {
            return Err(AppError::Validation("Nombre y email son requeridos".to_string()));
        }

        let now = now.trunc_subsecs(6);
        let lead = Lead {
            id: Uuid::new_v4().to_string(),
            name: submission.name,
            email: submission.email,
            company: submission.company,
            phone: submission.phone,
            service: Service::parse(&submission.service),
            message: submission.message,
            status: LeadStatus::New,
            source: LeadSource::Website,
            created_at: now,
            updated_at: now,
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO leads (
               id, name, email, company, phone, service, message, status, source, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                lead.id,
                lead.name,
                lead.email,
                lead.company,
                lead.phone,
                lead.service.map(Service::as_str),
                lead.message,
                lead.status.as_str(),
                lead.source.as_str(),
                format_time(lead.created_at),
                format_time(lead.updated_at),
            ],
        )?;

        Ok(lead)
    }

    pub fn get_lead(&self, lead_id: &str) -> AppResult<Option<Lead>> {
        let conn = self.lock()?;
        let query = format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLUMNS);
        conn.query_row(&query, [lead_id], parse_lead_row)
            .optional()
            .map_err(AppError::from)
    }

    pub fn list_leads(&self) -> AppResult<Vec<Lead>> {
        self.query_leads("1 = 1", &[])
    }

    pub fn list_leads_by_status(&self, status: LeadStatus) -> AppResult<Vec<Lead>> {
        self.query_leads("status = ?1", &[status.as_str().to_string()])
    }

    pub fn list_leads_by_service(&self, service: Service) -> AppResult<Vec<Lead>> {
        self.query_leads("service = ?1", &[service.as_str().to_string()])
    }

    pub fn list_leads_created_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Lead>> {
        self.query_leads("created_at >= ?1", &[format_time(since)])
    }

    /// Leads in a terminal status created strictly before `cutoff`.
    pub fn list_retention_candidates(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Lead>> {
        let [converted, lost] = LeadStatus::TERMINAL;
        self.query_leads(
            "created_at < ?1 AND status IN (?2, ?3)",
            &[
                format_time(cutoff),
                converted.as_str().to_string(),
                lost.as_str().to_string(),
            ],
        )
    }

    fn query_leads(&self, predicate: &str, values: &[String]) -> AppResult<Vec<Lead>> {
        let conn = self.lock()?;
        let query = format!(
            "SELECT {} FROM leads WHERE {} ORDER BY created_at DESC, id ASC",
            LEAD_COLUMNS, predicate
        );
        let mut statement = conn.prepare(&query)?;
        let rows = statement.query_map(rusqlite::params_from_iter(values.iter()), parse_lead_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn update_lead_status(&self, lead_id: &str, status: LeadStatus) -> AppResult<Lead> {
        self.update_lead_status_at(lead_id, status, Utc::now())
    }

    pub(crate) fn update_lead_status_at(
        &self,
        lead_id: &str,
        status: LeadStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Lead> {
        let conn = self.lock()?;
        let query = format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLUMNS);
        let Some(mut lead) = conn.query_row(&query, [lead_id], parse_lead_row).optional()? else {
            return Err(AppError::NotFound(format!("Lead {} no encontrado", lead_id)));
        };

        // Two updates inside the same microsecond must still move updated_at forward.
        let mut updated_at = now.trunc_subsecs(6);
        if updated_at <= lead.updated_at {
            updated_at = lead.updated_at + chrono::Duration::microseconds(1);
        }

        conn.execute(
            "UPDATE leads SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), format_time(updated_at), lead_id],
        )?;

        lead.status = status;
        lead.updated_at = updated_at;
        Ok(lead)
    }

    /// Deletes every id or none of them.
    pub fn delete_leads(&self, lead_ids: &[String]) -> AppResult<usize> {
        if lead_ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut deleted = 0usize;
        {
            let mut statement = tx.prepare("DELETE FROM leads WHERE id = ?1")?;
            for lead_id in lead_ids {
                let changed = statement.execute([lead_id])?;
                if changed == 0 {
                    return Err(AppError::NotFound(format!("Lead {} no encontrado", lead_id)));
                }
                deleted += changed;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Removes terminal leads created before `cutoff` and returns their ids.
    /// Selection and delete share one transaction and one predicate, so a
    /// lead moved out of a terminal status is never removed.
    pub fn purge_retention_candidates(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<String>> {
        let [converted, lost] = LeadStatus::TERMINAL;
        let cutoff = format_time(cutoff);

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let ids = {
            let mut statement =
                tx.prepare("SELECT id FROM leads WHERE created_at < ?1 AND status IN (?2, ?3) ORDER BY id")?;
            let rows = statement.query_map(params![cutoff, converted.as_str(), lost.as_str()], |row| row.get::<_, String>(0))?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            ids
        };
        tx.execute(
            "DELETE FROM leads WHERE created_at < ?1 AND status IN (?2, ?3)",
            params![cutoff, converted.as_str(), lost.as_str()],
        )?;
        tx.commit()?;
        Ok(ids)
    }

    // ─── Settings ───────────────────────────────────────────────────────────

    /// Stored settings. A row that no longer parses is reported as
    /// `Internal` instead of silently falling back to defaults.
    pub fn get_settings(&self) -> AppResult<LeadSettings> {
        match self.read_settings_row()? {
            Some(raw) => serde_json::from_str::<LeadSettings>(&raw).map_err(|error| {
                tracing::error!(error = %error, "stored settings row is corrupted");
                AppError::Internal(format!("settings row is corrupted: {}", error))
            }),
            None => Ok(LeadSettings::default()),
        }
    }

    fn read_settings_row(&self) -> AppResult<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value_json FROM settings WHERE key = 'app'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Merges `update` into the stored settings. A corrupted row is
    /// replaced by defaults plus the update.
    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<LeadSettings> {
        let current = match self.get_settings() {
            Err(AppError::Internal(reason)) => {
                tracing::warn!(reason = %reason, "rebuilding settings from defaults");
                LeadSettings::default()
            }
            other => other?,
        };
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: LeadSettings =
            serde_json::from_value(merged).map_err(|error| AppError::Validation(error.to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES ('app', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(&settings)?, format_time(Utc::now())],
        )?;

        Ok(settings)
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(1) FROM settings WHERE key = 'app'", [], |row| row.get(0))?;
        if count == 0 {
            conn.execute(
                "INSERT INTO settings (key, value_json, updated_at) VALUES ('app', ?1, ?2)",
                params![
                    serde_json::to_string(&LeadSettings::default())?,
                    format_time(Utc::now())
                ],
            )?;
        }
        Ok(())
    }

    // ─── Mail deliveries ────────────────────────────────────────────────────

    pub fn insert_mail_delivery(&self, record: &MailDeliveryRecord) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO mail_deliveries (id, kind, recipient, subject, status, error, lead_id, attempted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.kind.as_str(),
                record.recipient,
                record.subject,
                record.status.as_str(),
                record.error,
                record.lead_id,
                format_time(record.attempted_at),
            ],
        )?;
        Ok(())
    }

    pub fn list_mail_deliveries(&self, limit: u32) -> AppResult<Vec<MailDeliveryRecord>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(
            "SELECT id, kind, recipient, subject, status, error, lead_id, attempted_at
             FROM mail_deliveries ORDER BY attempted_at DESC LIMIT ?1",
        )?;
        let rows = statement.query_map([limit], parse_mail_delivery_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

fn parse_lead_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        company: row.get(3)?,
        phone: row.get(4)?,
        service: row
            .get::<_, Option<String>>(5)?
            .and_then(|raw| Service::parse(&raw)),
        message: row.get(6)?,
        status: parse_status(&row.get::<_, String>(7)?)?,
        source: LeadSource::Website,
        created_at: parse_time(&row.get::<_, String>(9)?)?,
        updated_at: parse_time(&row.get::<_, String>(10)?)?,
    })
}

fn parse_mail_delivery_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MailDeliveryRecord> {
    Ok(MailDeliveryRecord {
        id: row.get(0)?,
        kind: parse_mail_kind(&row.get::<_, String>(1)?),
        recipient: row.get(2)?,
        subject: row.get(3)?,
        status: match row.get::<_, String>(4)?.as_str() {
            "sent" => DeliveryStatus::Sent,
            _ => DeliveryStatus::Failed,
        },
        error: row.get(5)?,
        lead_id: row.get(6)?,
        attempted_at: parse_time(&row.get::<_, String>(7)?)?,
    })
}

fn parse_mail_kind(raw: &str) -> MailKind {
    match raw {
        "admin-alert" => MailKind::AdminAlert,
        "lead-confirmation" => MailKind::LeadConfirmation,
        _ => MailKind::WeeklyDigest,
    }
}

fn parse_status(raw: &str) -> rusqlite::Result<LeadStatus> {
    LeadStatus::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Unknown lead status '{}'", raw),
            )),
        )
    })
}

/// Fixed-width UTC text so that string order matches time order.
pub(crate) fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}
