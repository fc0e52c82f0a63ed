use crate::errors::{AppError, AppResult, GENERIC_AUTH_MESSAGE};
use crate::models::{
    service_short_label, DashboardView, ExportResponse, Lead, LeadFilters, LeadRow, LeadStats, LeadStatus,
};
use crate::service::LeadService;
use crate::session::{AdminSession, AuthGate};
use crate::stats::{compute_stats, daily_trend, date_label, services_chart, TREND_DAYS};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

pub const LOGIN_ERROR_VISIBLE_FOR: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "screen", rename_all = "kebab-case")]
pub enum AdminScreen {
    LoggedOut,
    LoggedIn { email: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminScreenView {
    #[serde(flatten)]
    pub screen: AdminScreen,
    pub login_error: Option<String>,
    pub detail: Option<Lead>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloseTrigger {
    CloseButton,
    Overlay,
    Escape,
}

/// Admin console state: the cached lead list, active filters, the open
/// detail and a transient sign-in error.
pub struct AdminDashboard {
    service: Arc<LeadService>,
    auth: AuthGate,
    cache: Vec<Lead>,
    filters: LeadFilters,
    detail: Option<Lead>,
    login_error_at: Option<Instant>,
}

impl AdminDashboard {
    pub fn new(service: Arc<LeadService>, auth: AuthGate) -> Self {
        Self {
            service,
            auth,
            cache: Vec::new(),
            filters: LeadFilters::default(),
            detail: None,
            login_error_at: None,
        }
    }

    pub fn screen(&mut self) -> AdminScreenView {
        let screen = match self.auth.current() {
            Some(session) => AdminScreen::LoggedIn { email: session.email },
            None => {
                self.clear_console();
                AdminScreen::LoggedOut
            }
        };
        AdminScreenView {
            screen,
            login_error: self.login_error(),
            detail: self.detail.clone(),
        }
    }

    fn login_error(&mut self) -> Option<String> {
        let shown_at = self.login_error_at?;
        if shown_at.elapsed() >= LOGIN_ERROR_VISIBLE_FOR {
            self.login_error_at = None;
            return None;
        }
        Some(GENERIC_AUTH_MESSAGE.to_string())
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> AppResult<AdminSession> {
        match self.auth.sign_in(email, password).await {
            Ok(session) => {
                self.login_error_at = None;
                Ok(session)
            }
            Err(error) => {
                self.login_error_at = Some(Instant::now());
                Err(error)
            }
        }
    }

    pub fn sign_out(&mut self) {
        self.auth.sign_out();
        self.clear_console();
    }

    /// Drops everything tied to the previous session.
    pub fn clear_console(&mut self) {
        self.cache.clear();
        self.filters = LeadFilters::default();
        self.detail = None;
    }

    fn require_session(&self) -> AppResult<AdminSession> {
        self.auth
            .current()
            .ok_or_else(|| AppError::Auth("admin session required".to_string()))
    }

    fn refresh_cache(&mut self) -> AppResult<()> {
        self.cache = self.service.list_leads()?;
        Ok(())
    }

    pub fn load_dashboard(&mut self, now: DateTime<Utc>) -> AppResult<DashboardView> {
        self.require_session()?;
        self.refresh_cache()?;
        let offset = self.service.settings()?.offset();

        let stats = compute_stats(&self.cache, now);
        Ok(DashboardView {
            services_chart: services_chart(&stats.by_service),
            trend: daily_trend(&self.cache, now, offset, TREND_DAYS),
            stats,
        })
    }

    pub fn load_leads_table(&mut self) -> AppResult<Vec<LeadRow>> {
        self.require_session()?;
        self.refresh_cache()?;
        self.rows()
    }

    pub fn set_filters(&mut self, filters: LeadFilters) -> AppResult<Vec<LeadRow>> {
        self.require_session()?;
        self.filters = filters;
        self.rows()
    }

    fn rows(&self) -> AppResult<Vec<LeadRow>> {
        let offset = self.service.settings()?.offset();
        Ok(self
            .cache
            .iter()
            .filter(|lead| self.filters.matches(lead))
            .map(|lead| lead_row(lead, offset))
            .collect())
    }

    /// Applies the new status, then recomputes stats from a fresh fetch.
    pub fn change_status(&mut self, lead_id: &str, status: LeadStatus, now: DateTime<Utc>) -> AppResult<LeadStats> {
        self.require_session()?;
        let updated = self.service.update_status(lead_id, status)?;
        if let Some(detail) = self.detail.as_mut().filter(|detail| detail.id == updated.id) {
            *detail = updated;
        }
        self.refresh_cache()?;
        Ok(compute_stats(&self.cache, now))
    }

    /// Exports the whole cached set, ignoring the active filters.
    pub fn export_csv(&self, now: DateTime<Utc>) -> AppResult<ExportResponse> {
        self.require_session()?;
        self.service.export_csv(&self.cache, now)
    }

    pub fn open_detail(&mut self, lead_id: &str) -> AppResult<Lead> {
        self.require_session()?;
        let lead = match self.cache.iter().find(|lead| lead.id == lead_id) {
            Some(lead) => lead.clone(),
            None => self.service.get_lead(lead_id)?,
        };
        self.detail = Some(lead.clone());
        Ok(lead)
    }

    pub fn close_detail(&mut self, trigger: CloseTrigger) -> bool {
        let closed = self.detail.take();
        if let Some(lead) = &closed {
            tracing::debug!(lead_id = %lead.id, trigger = ?trigger, "lead detail closed");
        }
        closed.is_some()
    }
}

fn lead_row(lead: &Lead, offset: FixedOffset) -> LeadRow {
    LeadRow {
        lead: lead.clone(),
        date_label: date_label(lead.created_at, offset),
        service_label: service_short_label(lead.service).to_string(),
        status_label: lead.status.label().to_string(),
    }
}
