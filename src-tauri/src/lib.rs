pub mod admin;
pub mod db;
pub mod errors;
pub mod export;
pub mod intake;
pub mod jobs;
pub mod mailer;
pub mod models;
pub mod notifications;
pub mod redaction;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod stats;
pub mod templates;

use crate::admin::{AdminDashboard, AdminScreenView, CloseTrigger};
use crate::errors::AppError;
use crate::intake::{IntakeController, IntakeSnapshot, SubmitOutcome};
use crate::mailer::OutboxMailer;
use crate::models::{
    BooleanResponse, DashboardView, ExportResponse, Lead, LeadFilters, LeadRow, LeadSettings, LeadStats,
    LeadStatus, LeadSubmission, MailDeliveryRecord, RetentionOutcome, WeeklyReport,
};
use crate::scheduler::JobScheduler;
use crate::service::LeadService;
use crate::session::{AdminSession, AuthGate, KeyringCredentials, KEYRING_SERVICE};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tauri::{Emitter, Manager};
use tokio::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

const SESSION_EVENT: &str = "admin-session-changed";
const DEFAULT_DELIVERY_LIMIT: u32 = 50;

#[derive(Clone)]
struct AppState {
    service: Arc<LeadService>,
    intake: IntakeController,
    admin: Arc<Mutex<AdminDashboard>>,
    auth: AuthGate,
}

#[tauri::command]
async fn submit_lead(state: tauri::State<'_, AppState>, submission: LeadSubmission) -> Result<SubmitOutcome, String> {
    Ok(state.intake.submit(submission).await)
}

#[tauri::command]
async fn intake_view(state: tauri::State<'_, AppState>) -> Result<IntakeSnapshot, String> {
    Ok(state.intake.snapshot().await)
}

#[tauri::command]
async fn admin_sign_in(
    state: tauri::State<'_, AppState>,
    email: String,
    password: String,
) -> Result<AdminSession, String> {
    let mut admin = state.admin.lock().await;
    admin.sign_in(&email, &password).await.map_err(to_client_error)
}

#[tauri::command]
async fn admin_sign_out(state: tauri::State<'_, AppState>) -> Result<BooleanResponse, String> {
    state.admin.lock().await.sign_out();
    Ok(BooleanResponse { success: true })
}

#[tauri::command]
async fn admin_screen(state: tauri::State<'_, AppState>) -> Result<AdminScreenView, String> {
    Ok(state.admin.lock().await.screen())
}

#[tauri::command]
fn admin_password_set(
    state: tauri::State<'_, AppState>,
    email: String,
    password: String,
) -> Result<BooleanResponse, String> {
    state
        .auth
        .set_password(&email, &password)
        .map(|_| BooleanResponse { success: true })
        .map_err(to_client_error)
}

#[tauri::command]
async fn dashboard_load(state: tauri::State<'_, AppState>) -> Result<DashboardView, String> {
    state.admin.lock().await.load_dashboard(Utc::now()).map_err(to_client_error)
}

#[tauri::command]
async fn leads_table_load(state: tauri::State<'_, AppState>) -> Result<Vec<LeadRow>, String> {
    state.admin.lock().await.load_leads_table().map_err(to_client_error)
}

#[tauri::command]
async fn leads_filter_set(state: tauri::State<'_, AppState>, filters: LeadFilters) -> Result<Vec<LeadRow>, String> {
    state.admin.lock().await.set_filters(filters).map_err(to_client_error)
}

#[tauri::command]
async fn lead_status_update(
    state: tauri::State<'_, AppState>,
    lead_id: String,
    status: LeadStatus,
) -> Result<LeadStats, String> {
    state
        .admin
        .lock()
        .await
        .change_status(&lead_id, status, Utc::now())
        .map_err(to_client_error)
}

#[tauri::command]
async fn leads_export_csv(state: tauri::State<'_, AppState>) -> Result<ExportResponse, String> {
    state.admin.lock().await.export_csv(Utc::now()).map_err(to_client_error)
}

#[tauri::command]
async fn lead_detail_open(state: tauri::State<'_, AppState>, lead_id: String) -> Result<Lead, String> {
    state.admin.lock().await.open_detail(&lead_id).map_err(to_client_error)
}

#[tauri::command]
async fn lead_detail_close(state: tauri::State<'_, AppState>, trigger: CloseTrigger) -> Result<BooleanResponse, String> {
    let success = state.admin.lock().await.close_detail(trigger);
    Ok(BooleanResponse { success })
}

#[tauri::command]
async fn settings_get(state: tauri::State<'_, AppState>) -> Result<LeadSettings, String> {
    require_admin(&state).await?;
    state.service.settings().map_err(to_client_error)
}

#[tauri::command]
async fn settings_update(
    state: tauri::State<'_, AppState>,
    settings: serde_json::Value,
) -> Result<LeadSettings, String> {
    require_admin(&state).await?;
    state.service.update_settings(settings).map_err(to_client_error)
}

#[tauri::command]
async fn report_run_now(state: tauri::State<'_, AppState>) -> Result<WeeklyReport, String> {
    require_admin(&state).await?;
    state.service.run_weekly_report(Utc::now()).await.map_err(to_client_error)
}

#[tauri::command]
async fn retention_run_now(state: tauri::State<'_, AppState>) -> Result<RetentionOutcome, String> {
    require_admin(&state).await?;
    state.service.run_retention(Utc::now()).map_err(to_client_error)
}

#[tauri::command]
async fn mail_deliveries_list(
    state: tauri::State<'_, AppState>,
    limit: Option<u32>,
) -> Result<Vec<MailDeliveryRecord>, String> {
    require_admin(&state).await?;
    state
        .service
        .mail_deliveries(limit.unwrap_or(DEFAULT_DELIVERY_LIMIT))
        .map_err(to_client_error)
}

async fn require_admin(state: &AppState) -> Result<(), String> {
    match state.admin.lock().await.screen().screen {
        admin::AdminScreen::LoggedIn { .. } => Ok(()),
        admin::AdminScreen::LoggedOut => Err(to_client_error(AppError::Auth("admin session required".to_string()))),
    }
}

pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir().map_err(|error| error.to_string())?;
            std::fs::create_dir_all(&app_data_dir).map_err(|error| error.to_string())?;
            init_tracing(&app_data_dir).map_err(|error| error.to_string())?;

            let mailer = Arc::new(OutboxMailer::new(app_data_dir.join("outbox")));
            let service = LeadService::new(&app_data_dir, mailer).map_err(|error| error.to_string())?;
            let settings = service.settings().unwrap_or_else(|error| {
                tracing::warn!(error = %error, "settings unreadable at startup, using defaults");
                LeadSettings::default()
            });

            let auth = AuthGate::new(Arc::new(KeyringCredentials::new(KEYRING_SERVICE)), settings.session_ttl_hours);
            let admin = Arc::new(Mutex::new(AdminDashboard::new(service.clone(), auth.clone())));
            let scheduler = JobScheduler::new(settings.offset());

            tauri::async_runtime::spawn({
                let service = service.clone();
                async move {
                    match service.register_jobs(&scheduler).await {
                        Ok(()) => scheduler.start().await,
                        Err(error) => tracing::error!(error = %error, "scheduled jobs not registered"),
                    }
                }
            });

            tauri::async_runtime::spawn({
                let handle = app.handle().clone();
                let admin = admin.clone();
                let mut sessions = auth.subscribe();
                async move {
                    while sessions.changed().await.is_ok() {
                        let session = sessions.borrow_and_update().clone();
                        if session.is_none() {
                            admin.lock().await.clear_console();
                        }
                        if let Err(error) = handle.emit(SESSION_EVENT, session) {
                            tracing::warn!(error = %error, "session event not delivered");
                        }
                    }
                }
            });

            app.manage(AppState {
                intake: IntakeController::new(service.clone()),
                service,
                admin,
                auth,
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            submit_lead,
            intake_view,
            admin_sign_in,
            admin_sign_out,
            admin_screen,
            admin_password_set,
            dashboard_load,
            leads_table_load,
            leads_filter_set,
            lead_status_update,
            leads_export_csv,
            lead_detail_open,
            lead_detail_close,
            settings_get,
            settings_update,
            report_run_now,
            retention_run_now,
            mail_deliveries_list,
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}

fn init_tracing(app_data_dir: &Path) -> Result<(), String> {
    let log_dir = app_data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "leads.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

fn to_client_error(error: AppError) -> String {
    tracing::warn!(error = %error, "command failed");
    error.client_message()
}
