use std::collections::HashMap;

use chrono::{DateTime, Timelike, Utc};

use crate::models::{
    AppointmentRow, AppointmentStatus, CancellationPattern, DailyAnalyticsRow, PerformanceMetrics,
    StatusTotals, TrendPoint,
};

pub fn build_status_totals(rows: &[AppointmentRow], now: DateTime<Utc>) -> StatusTotals {
    let mut totals = StatusTotals::default();

    for row in rows {
        totals.total += 1;

        match row.status {
            AppointmentStatus::Completed => totals.completed += 1,
            AppointmentStatus::Cancelled => totals.cancelled += 1,
            AppointmentStatus::NoShow => totals.no_show += 1,
            AppointmentStatus::InProgress | AppointmentStatus::CheckedIn => {
                totals.in_progress += 1
            }
            _ => {}
        }

        // Upcoming overlays the status buckets rather than replacing them.
        let is_terminal = matches!(
            row.status,
            AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        );
        if let Some(start) = row.start_time {
            if start > now && !is_terminal {
                totals.upcoming += 1;
            }
        }
    }

    totals
}

pub fn calculate_performance(totals: &StatusTotals, rows: &[AppointmentRow]) -> PerformanceMetrics {
    let completed_revenue: f64 = rows
        .iter()
        .filter(|row| row.status == AppointmentStatus::Completed)
        .filter_map(|row| row.total_price)
        .sum();

    let durations: Vec<f64> = rows
        .iter()
        .filter_map(|row| row.duration_minutes)
        .map(f64::from)
        .collect();
    let average_duration = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    };

    PerformanceMetrics {
        completion_rate: ratio(totals.completed, totals.total),
        cancellation_rate: ratio(totals.cancelled, totals.total),
        no_show_rate: ratio(totals.no_show, totals.total),
        average_duration,
        total_revenue: completed_revenue,
        average_ticket: if totals.completed == 0 {
            0.0
        } else {
            completed_revenue / totals.completed as f64
        },
    }
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn day_label(value: DateTime<Utc>) -> String {
    value.format("%A").to_string()
}

fn time_bucket(value: DateTime<Utc>) -> &'static str {
    match value.hour() {
        0..=5 => "Overnight",
        6..=11 => "Morning",
        12..=16 => "Afternoon",
        17..=20 => "Evening",
        _ => "Late Night",
    }
}

/// Clusters cancelled appointments by weekday and time-of-day bucket, ranked
/// by count. Ties keep first-occurrence order (the sort is stable).
pub fn build_cancellation_patterns(rows: &[AppointmentRow]) -> Vec<CancellationPattern> {
    let cancelled: Vec<DateTime<Utc>> = rows
        .iter()
        .filter(|row| row.status == AppointmentStatus::Cancelled)
        .filter_map(|row| row.start_time)
        .collect();

    if cancelled.is_empty() {
        return Vec::new();
    }

    let total_cancelled = cancelled.len();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut patterns: Vec<CancellationPattern> = Vec::new();

    for start in &cancelled {
        let day = day_label(*start);
        let bucket = time_bucket(*start);
        let label = format!("{day} · {bucket}");

        match index.get(&label) {
            Some(&at) => patterns[at].count += 1,
            None => {
                index.insert(label.clone(), patterns.len());
                patterns.push(CancellationPattern {
                    label,
                    count: 1,
                    share: 0.0,
                    description: format!(
                        "Cancellations during {} on {day}",
                        bucket.to_lowercase()
                    ),
                });
            }
        }
    }

    for pattern in &mut patterns {
        pattern.share = pattern.count as f64 / total_cancelled as f64;
    }

    patterns.sort_by(|a, b| b.count.cmp(&a.count));
    patterns
}

/// Reshapes the date-descending analytics feed into an ascending trend.
/// Rows without a date are dropped; counters are taken as supplied.
pub fn build_trend(rows: &[DailyAnalyticsRow]) -> Vec<TrendPoint> {
    let mut points: Vec<TrendPoint> = rows
        .iter()
        .filter_map(|row| {
            row.date.map(|date| TrendPoint {
                date,
                total: row.platform_appointments.unwrap_or(0),
                cancelled: row.platform_cancelled_appointments.unwrap_or(0),
                no_show: row.platform_no_shows.unwrap_or(0),
                completed: row.platform_completed_appointments.unwrap_or(0),
            })
        })
        .collect();
    points.reverse();
    points
}
