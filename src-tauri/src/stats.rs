use crate::models::{ChartSlice, DailyCount, Lead, LeadStats, LeadStatus, Service};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use std::collections::BTreeMap;

const MONTHS_ES: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
];

pub const TREND_DAYS: u32 = 30;

/// `converted / total` as a percentage with one decimal; `"0.0"` for no leads.
pub fn conversion_rate(converted: u64, total: u64) -> String {
    if total == 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", converted as f64 / total as f64 * 100.0)
}

pub fn tally_by_service<'a>(leads: impl IntoIterator<Item = &'a Lead>) -> BTreeMap<Service, u64> {
    let mut counts = BTreeMap::new();
    for lead in leads {
        if let Some(service) = lead.service {
            *counts.entry(service).or_insert(0) += 1;
        }
    }
    counts
}

pub fn tally_by_status<'a>(leads: impl IntoIterator<Item = &'a Lead>) -> BTreeMap<LeadStatus, u64> {
    let mut counts = BTreeMap::new();
    for lead in leads {
        *counts.entry(lead.status).or_insert(0) += 1;
    }
    counts
}

pub fn compute_stats(leads: &[Lead], now: DateTime<Utc>) -> LeadStats {
    let week_ago = now - Duration::days(7);
    let by_status = tally_by_status(leads);
    let count = |status: LeadStatus| by_status.get(&status).copied().unwrap_or(0);
    let total = leads.len() as u64;
    let converted = count(LeadStatus::Converted);

    LeadStats {
        total,
        new: count(LeadStatus::New),
        contacted: count(LeadStatus::Contacted),
        qualified: count(LeadStatus::Qualified),
        converted,
        lost: count(LeadStatus::Lost),
        by_service: tally_by_service(leads),
        new_last_7_days: leads.iter().filter(|lead| lead.created_at > week_ago).count() as u64,
        conversion_rate: conversion_rate(converted, total),
    }
}

pub fn services_chart(by_service: &BTreeMap<Service, u64>) -> Vec<ChartSlice> {
    by_service
        .iter()
        .map(|(service, count)| ChartSlice {
            service: *service,
            label: service.short_label().to_string(),
            count: *count,
        })
        .collect()
}

/// One bucket per local day for the `days` days ending on `now`'s local date.
pub fn daily_trend(leads: &[Lead], now: DateTime<Utc>, offset: FixedOffset, days: u32) -> Vec<DailyCount> {
    let today = now.with_timezone(&offset).date_naive();
    let first = today - Duration::days(i64::from(days.saturating_sub(1)));

    let mut buckets: BTreeMap<NaiveDate, u64> = (0..i64::from(days))
        .map(|index| (first + Duration::days(index), 0))
        .collect();
    for lead in leads {
        let day = lead.created_at.with_timezone(&offset).date_naive();
        if let Some(count) = buckets.get_mut(&day) {
            *count += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(date, count)| DailyCount {
            date,
            label: day_label(date),
            count,
        })
        .collect()
}

pub fn day_label(date: NaiveDate) -> String {
    format!("{} {}", date.day(), MONTHS_ES[date.month0() as usize])
}

pub fn date_label(value: DateTime<Utc>, offset: FixedOffset) -> String {
    value.with_timezone(&offset).format("%d/%m/%Y").to_string()
}
