use crate::errors::AppResult;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDateTime, NaiveTime, Utc, Weekday};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub type JobFuture = Pin<Box<dyn Future<Output = AppResult<()>> + Send>>;
pub type JobHandler = Arc<dyn Fn() -> JobFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Daily { hour: u32 },
    Weekly { weekday: Weekday, hour: u32 },
}

impl Cadence {
    /// First fire time strictly after `now`, with `hour` read in local time.
    pub fn next_after(self, now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
        let local = now.with_timezone(&offset).naive_local();
        let (hour, period_days, days_ahead) = match self {
            Self::Daily { hour } => (hour, 1, 0),
            Self::Weekly { weekday, hour } => {
                let target = i64::from(weekday.num_days_from_monday());
                let current = i64::from(local.weekday().num_days_from_monday());
                (hour, 7, (target - current).rem_euclid(7))
            }
        };

        let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
        let mut candidate = NaiveDateTime::new(local.date() + Duration::days(days_ahead), time);
        if candidate <= local {
            candidate += Duration::days(period_days);
        }
        local_to_utc(candidate, offset)
    }
}

fn local_to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, Utc)
}

#[derive(Clone)]
pub struct ScheduledJob {
    pub name: &'static str,
    pub cadence: Cadence,
    handler: JobHandler,
}

/// Fires stateless handlers on daily or weekly cadences. A failed or
/// panicking run is logged and the next run is scheduled as usual.
#[derive(Clone)]
pub struct JobScheduler {
    jobs: Arc<Mutex<Vec<ScheduledJob>>>,
    offset: FixedOffset,
    started: Arc<AtomicBool>,
}

impl JobScheduler {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(Vec::new())),
            offset,
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn register(&self, name: &'static str, cadence: Cadence, handler: JobHandler) {
        let mut jobs = self.jobs.lock().await;
        jobs.retain(|job| job.name != name);
        jobs.push(ScheduledJob { name, cadence, handler });
    }

    pub async fn jobs(&self) -> Vec<(&'static str, Cadence)> {
        let jobs = self.jobs.lock().await;
        jobs.iter().map(|job| (job.name, job.cadence)).collect()
    }

    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let jobs = self.jobs.lock().await.clone();
        for job in jobs {
            let offset = self.offset;
            tokio::spawn(async move {
                loop {
                    let now = Utc::now();
                    let next = job.cadence.next_after(now, offset);
                    tracing::info!(job = job.name, next_run_at = %next, "scheduled job armed");
                    let wait = (next - now).to_std().unwrap_or_default();
                    tokio::time::sleep(wait).await;
                    run_job(&job).await;
                }
            });
        }
    }
}

/// Runs one invocation in its own task so a panic cannot take the loop down.
pub async fn run_job(job: &ScheduledJob) -> bool {
    let handler = job.handler.clone();
    match tokio::spawn(async move { handler().await }).await {
        Ok(Ok(())) => {
            tracing::info!(job = job.name, "scheduled job finished");
            true
        }
        Ok(Err(error)) => {
            tracing::error!(job = job.name, error = %error, "scheduled job failed");
            false
        }
        Err(error) => {
            tracing::error!(job = job.name, error = %error, "scheduled job aborted");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{run_job, Cadence, JobFuture, JobHandler, JobScheduler, ScheduledJob};
    use crate::errors::AppError;
    use chrono::{FixedOffset, TimeZone, Utc, Weekday};
    use std::sync::Arc;

    fn guatemala() -> FixedOffset {
        FixedOffset::west_opt(6 * 3600).expect("offset")
    }

    #[test]
    fn daily_cadence_fires_at_local_hour() {
        // 2026-03-10 07:00 UTC is 01:00 in UTC-6, before the 02:00 slot.
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 7, 0, 0).single().expect("now");
        let next = Cadence::Daily { hour: 2 }.next_after(now, guatemala());
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).single().expect("next"));

        // Exactly on the slot rolls to the next day.
        let next = Cadence::Daily { hour: 2 }.next_after(next, guatemala());
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 11, 8, 0, 0).single().expect("next"));
    }

    #[test]
    fn weekly_cadence_targets_weekday() {
        // Tuesday 2026-03-10 -> Monday 2026-03-16 09:00 local = 15:00 UTC.
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).single().expect("now");
        let cadence = Cadence::Weekly {
            weekday: Weekday::Mon,
            hour: 9,
        };
        assert_eq!(
            cadence.next_after(now, guatemala()),
            Utc.with_ymd_and_hms(2026, 3, 16, 15, 0, 0).single().expect("next")
        );

        // Monday morning before the slot fires the same day.
        let monday = Utc.with_ymd_and_hms(2026, 3, 16, 13, 0, 0).single().expect("monday");
        assert_eq!(
            cadence.next_after(monday, guatemala()),
            Utc.with_ymd_and_hms(2026, 3, 16, 15, 0, 0).single().expect("next")
        );
    }

    #[tokio::test]
    async fn failing_and_panicking_jobs_are_contained() {
        let failing: JobHandler = Arc::new(|| -> JobFuture { Box::pin(async { Err::<(), _>(AppError::StoreUnavailable("down".to_string())) }) });
        let panicking: JobHandler = Arc::new(|| -> JobFuture {
            Box::pin(async {
                if true {
                    panic!("boom");
                }
                Ok::<(), AppError>(())
            })
        });
        let fine: JobHandler = Arc::new(|| -> JobFuture { Box::pin(async { Ok::<(), AppError>(()) }) });

        let job = |name, handler| ScheduledJob {
            name,
            cadence: Cadence::Daily { hour: 2 },
            handler,
        };
        assert!(!run_job(&job("failing", failing)).await);
        assert!(!run_job(&job("panicking", panicking)).await);
        assert!(run_job(&job("fine", fine)).await);
    }

    #[tokio::test]
    async fn registering_same_name_replaces_job() {
        let scheduler = JobScheduler::new(guatemala());
        let handler: JobHandler = Arc::new(|| -> JobFuture { Box::pin(async { Ok::<(), AppError>(()) }) });
        scheduler.register("retention", Cadence::Daily { hour: 2 }, handler.clone()).await;
        scheduler.register("retention", Cadence::Daily { hour: 3 }, handler).await;

        let jobs = scheduler.jobs().await;
        assert_eq!(jobs, vec![("retention", Cadence::Daily { hour: 3 })]);
    }
}
