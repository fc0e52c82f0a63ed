use crate::errors::AppResult;
use crate::models::{Lead, LeadSubmission};
use crate::service::LeadService;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const MISSING_FIELDS_MESSAGE: &str = "Por favor completa todos los campos requeridos";
pub const INVALID_EMAIL_MESSAGE: &str = "Por favor ingresa un email válido";
pub const SUBMIT_FAILED_MESSAGE: &str = "Hubo un error al enviar tu solicitud. Por favor intenta de nuevo.";
pub const SUCCESS_REVERT_AFTER: Duration = Duration::from_secs(5);

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

#[async_trait]
pub trait LeadIntake: Send + Sync {
    async fn create_lead(&self, submission: LeadSubmission) -> AppResult<Lead>;
}

#[async_trait]
impl LeadIntake for LeadService {
    async fn create_lead(&self, submission: LeadSubmission) -> AppResult<Lead> {
        LeadService::create_lead(self, submission).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormView {
    Form,
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum SubmitOutcome {
    Submitted { id: String },
    Rejected { message: String },
    Failed { message: String },
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeSnapshot {
    pub view: FormView,
    pub draft: LeadSubmission,
}

#[derive(Debug)]
struct IntakeState {
    view: FormView,
    draft: LeadSubmission,
    generation: u64,
}

/// Holds the in-flight flag; clearing it on drop covers every exit path.
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// State machine behind the public contact form.
#[derive(Clone)]
pub struct IntakeController {
    intake: Arc<dyn LeadIntake>,
    in_flight: Arc<AtomicBool>,
    state: Arc<Mutex<IntakeState>>,
    revert_after: Duration,
}

impl IntakeController {
    pub fn new(intake: Arc<dyn LeadIntake>) -> Self {
        Self {
            intake,
            in_flight: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(IntakeState {
                view: FormView::Form,
                draft: LeadSubmission::default(),
                generation: 0,
            })),
            revert_after: SUCCESS_REVERT_AFTER,
        }
    }

    pub async fn snapshot(&self) -> IntakeSnapshot {
        let state = self.state.lock().await;
        IntakeSnapshot {
            view: state.view,
            draft: state.draft.clone(),
        }
    }

    pub async fn submit(&self, submission: LeadSubmission) -> SubmitOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("intake submission ignored while another is in flight");
            return SubmitOutcome::Busy;
        };

        self.state.lock().await.draft = submission.clone();
        let trimmed = submission.trimmed();
        if trimmed.name.is_empty() || trimmed.email.is_empty() || trimmed.company.is_empty() {
            return SubmitOutcome::Rejected {
                message: MISSING_FIELDS_MESSAGE.to_string(),
            };
        }
        if !EMAIL_RE.is_match(&trimmed.email) {
            return SubmitOutcome::Rejected {
                message: INVALID_EMAIL_MESSAGE.to_string(),
            };
        }

        match self.intake.create_lead(trimmed).await {
            Ok(lead) => {
                self.show_submitted().await;
                SubmitOutcome::Submitted { id: lead.id }
            }
            Err(error) => {
                tracing::error!(error = %error, "lead submission failed");
                SubmitOutcome::Failed {
                    message: SUBMIT_FAILED_MESSAGE.to_string(),
                }
            }
        }
    }

    async fn show_submitted(&self) {
        let generation = {
            let mut state = self.state.lock().await;
            state.view = FormView::Submitted;
            state.draft = LeadSubmission::default();
            state.generation += 1;
            state.generation
        };

        let state = self.state.clone();
        let revert_after = self.revert_after;
        tokio::spawn(async move {
            tokio::time::sleep(revert_after).await;
            let mut state = state.lock().await;
            if state.generation == generation {
                state.view = FormView::Form;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FormView, IntakeController, LeadIntake, SubmitOutcome, INVALID_EMAIL_MESSAGE, MISSING_FIELDS_MESSAGE,
        SUBMIT_FAILED_MESSAGE,
    };
    use crate::errors::{AppError, AppResult};
    use crate::models::{Lead, LeadSource, LeadStatus, LeadSubmission};
    use async_trait::async_trait;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn lead_from(submission: &LeadSubmission, id: usize) -> Lead {
        let now = Utc::now();
        Lead {
            id: format!("lead-{}", id),
            name: submission.name.clone(),
            email: submission.email.clone(),
            company: submission.company.clone(),
            phone: submission.phone.clone(),
            service: None,
            message: submission.message.clone(),
            status: LeadStatus::New,
            source: LeadSource::Website,
            created_at: now,
            updated_at: now,
        }
    }

    /// Counts calls; each call parks until `release` is notified when gated.
    #[derive(Default)]
    struct CountingIntake {
        calls: AtomicUsize,
        gated: bool,
        entered: Notify,
        release: Notify,
        fail: bool,
    }

    #[async_trait]
    impl LeadIntake for CountingIntake {
        async fn create_lead(&self, submission: LeadSubmission) -> AppResult<Lead> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.gated {
                self.entered.notify_one();
                self.release.notified().await;
            }
            if self.fail {
                return Err(AppError::StoreUnavailable("write rejected".to_string()));
            }
            Ok(lead_from(&submission, call))
        }
    }

    fn valid() -> LeadSubmission {
        LeadSubmission {
            name: "Ana".to_string(),
            email: "ana@acme.com".to_string(),
            company: "Acme".to_string(),
            ..LeadSubmission::default()
        }
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_before_email_check() {
        let intake = Arc::new(CountingIntake::default());
        let controller = IntakeController::new(intake.clone());

        let outcome = controller
            .submit(LeadSubmission {
                company: "  ".to_string(),
                email: "not-an-email".to_string(),
                ..valid()
            })
            .await;
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected {
                message: MISSING_FIELDS_MESSAGE.to_string()
            }
        );

        let outcome = controller
            .submit(LeadSubmission {
                email: "ana@acme".to_string(),
                ..valid()
            })
            .await;
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected {
                message: INVALID_EMAIL_MESSAGE.to_string()
            }
        );
        assert_eq!(intake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn double_submit_creates_one_lead() {
        let intake = Arc::new(CountingIntake {
            gated: true,
            ..CountingIntake::default()
        });
        let controller = IntakeController::new(intake.clone());

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.submit(valid()).await }
        });
        intake.entered.notified().await;

        assert_eq!(controller.submit(valid()).await, SubmitOutcome::Busy);
        intake.release.notify_one();

        let outcome = first.await.expect("first submit");
        assert_eq!(outcome, SubmitOutcome::Submitted { id: "lead-1".to_string() });
        assert_eq!(intake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_draft_and_reverts_after_five_seconds() {
        let controller = IntakeController::new(Arc::new(CountingIntake::default()));

        let outcome = controller.submit(valid()).await;
        assert!(matches!(outcome, SubmitOutcome::Submitted { .. }));
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.view, FormView::Submitted);
        assert_eq!(snapshot.draft, LeadSubmission::default());

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(controller.snapshot().await.view, FormView::Submitted);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(controller.snapshot().await.view, FormView::Form);
    }

    #[tokio::test]
    async fn store_failure_keeps_form_and_releases_guard() {
        let intake = Arc::new(CountingIntake {
            fail: true,
            ..CountingIntake::default()
        });
        let controller = IntakeController::new(intake.clone());

        let failed = SubmitOutcome::Failed {
            message: SUBMIT_FAILED_MESSAGE.to_string(),
        };
        assert_eq!(controller.submit(valid()).await, failed);
        assert_eq!(controller.submit(valid()).await, failed);
        assert_eq!(intake.calls.load(Ordering::SeqCst), 2);

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.view, FormView::Form);
        assert_eq!(snapshot.draft, valid());
    }
}
