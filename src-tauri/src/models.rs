use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const UNSPECIFIED_LABEL: &str = "No especificado";
pub const UNSPECIFIED_COMPANY_LABEL: &str = "No especificada";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 5] = [
        Self::New,
        Self::Contacted,
        Self::Qualified,
        Self::Converted,
        Self::Lost,
    ];

    pub const TERMINAL: [LeadStatus; 2] = [Self::Converted, Self::Lost];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Converted => "converted",
            Self::Lost => "lost",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "new" => Some(Self::New),
            "contacted" => Some(Self::Contacted),
            "qualified" => Some(Self::Qualified),
            "converted" => Some(Self::Converted),
            "lost" => Some(Self::Lost),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::New => "Nuevo",
            Self::Contacted => "Contactado",
            Self::Qualified => "Calificado",
            Self::Converted => "Convertido",
            Self::Lost => "Perdido",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Converted | Self::Lost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Service {
    Automation,
    Analytics,
    Consulting,
    Custom,
}

impl Service {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Automation => "automation",
            Self::Analytics => "analytics",
            Self::Consulting => "consulting",
            Self::Custom => "custom",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "automation" => Some(Self::Automation),
            "analytics" => Some(Self::Analytics),
            "consulting" => Some(Self::Consulting),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Label used in outgoing mail.
    pub fn label(self) -> &'static str {
        match self {
            Self::Automation => "Automatización con IA",
            Self::Analytics => "Analytics Avanzado",
            Self::Consulting => "Consultoría Estratégica",
            Self::Custom => "Solución Personalizada",
        }
    }

    /// Label used in the admin table and charts.
    pub fn short_label(self) -> &'static str {
        match self {
            Self::Automation => "Automatización",
            Self::Analytics => "Analytics",
            Self::Consulting => "Consultoría",
            Self::Custom => "Personalizado",
        }
    }
}

pub fn service_label(service: Option<Service>) -> &'static str {
    match service {
        Some(service) => service.label(),
        None => UNSPECIFIED_LABEL,
    }
}

pub fn service_short_label(service: Option<Service>) -> &'static str {
    match service {
        Some(service) => service.short_label(),
        None => "-",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeadSource {
    Website,
}

impl LeadSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Website => "website",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub email: String,
    pub company: String,
    pub phone: String,
    pub service: Option<Service>,
    pub message: String,
    pub status: LeadStatus,
    pub source: LeadSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw intake payload as the public form posts it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeadSubmission {
    pub name: String,
    pub email: String,
    pub company: String,
    pub phone: String,
    pub service: String,
    pub message: String,
}

impl LeadSubmission {
    pub fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            company: self.company.trim().to_string(),
            phone: self.phone.trim().to_string(),
            service: self.service.trim().to_string(),
            message: self.message.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeadFilters {
    pub status: Option<LeadStatus>,
    pub service: Option<Service>,
    pub search: Option<String>,
}

impl LeadFilters {
    pub fn matches(&self, lead: &Lead) -> bool {
        if let Some(status) = self.status {
            if lead.status != status {
                return false;
            }
        }
        if let Some(service) = self.service {
            if lead.service != Some(service) {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref() {
            let needle = search.trim().to_lowercase();
            if !needle.is_empty()
                && !lead.name.to_lowercase().contains(&needle)
                && !lead.email.to_lowercase().contains(&needle)
                && !lead.company.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadStats {
    pub total: u64,
    pub new: u64,
    pub contacted: u64,
    pub qualified: u64,
    pub converted: u64,
    pub lost: u64,
    pub by_service: BTreeMap<Service, u64>,
    pub new_last_7_days: u64,
    pub conversion_rate: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSlice {
    pub service: Service,
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub date: NaiveDate,
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub stats: LeadStats,
    pub services_chart: Vec<ChartSlice>,
    pub trend: Vec<DailyCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRow {
    #[serde(flatten)]
    pub lead: Lead,
    pub date_label: String,
    pub service_label: String,
    pub status_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub total: u64,
    pub by_service: BTreeMap<Service, u64>,
    pub by_status: BTreeMap<LeadStatus, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionOutcome {
    pub cutoff: DateTime<Utc>,
    pub deleted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MailKind {
    AdminAlert,
    LeadConfirmation,
    WeeklyDigest,
}

impl MailKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AdminAlert => "admin-alert",
            Self::LeadConfirmation => "lead-confirmation",
            Self::WeeklyDigest => "weekly-digest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailDeliveryRecord {
    pub id: String,
    pub kind: MailKind,
    pub recipient: String,
    pub subject: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub lead_id: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub path: String,
    pub file_name: String,
    pub row_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanResponse {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeadSettings {
    pub admin_email: String,
    pub mail_from_name: String,
    pub mail_from_address: String,
    pub site_url: String,
    pub admin_path: String,
    pub utc_offset_minutes: i32,
    pub retention_months: u32,
    pub report_window_days: u32,
    pub retention_hour: u32,
    pub report_weekday: Weekday,
    pub report_hour: u32,
    pub session_ttl_hours: u32,
}

impl Default for LeadSettings {
    fn default() -> Self {
        Self {
            admin_email: "admin@nadrika.com".to_string(),
            mail_from_name: "Nadrika".to_string(),
            mail_from_address: "notificaciones@nadrika.com".to_string(),
            site_url: "https://nadrika-f1002.web.app".to_string(),
            admin_path: "/admin.html".to_string(),
            utc_offset_minutes: -360,
            retention_months: 6,
            report_window_days: 7,
            retention_hour: 2,
            report_weekday: Weekday::Mon,
            report_hour: 9,
            session_ttl_hours: 12,
        }
    }
}

impl LeadSettings {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn admin_url(&self) -> String {
        format!("{}{}", self.site_url.trim_end_matches('/'), self.admin_path)
    }

    pub fn mail_from(&self) -> String {
        format!("{} <{}>", self.mail_from_name, self.mail_from_address)
    }
}
