//! Stateless handlers fired by the scheduler. Each invocation reads its
//! window from `now` and keeps nothing between runs.

pub mod reporting;
pub mod retention;

pub const WEEKLY_REPORT_JOB: &str = "weekly-report";
pub const RETENTION_JOB: &str = "lead-retention";
