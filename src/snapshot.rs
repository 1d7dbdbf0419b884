use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    AppointmentRow, AppointmentSnapshot, DailyAnalyticsRow, SalonPerformance, SalonStatEntry,
    SnapshotOptions, Timeframe,
};
use crate::{alerts, db, metrics};

const TOP_SALON_COUNT: usize = 5;

/// Ranks salons by appointment volume in the batch. The first non-null name
/// seen for a salon wins; ties keep first-occurrence order.
pub fn top_salons(rows: &[AppointmentRow]) -> Vec<(Uuid, Option<String>)> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut counts: HashMap<Uuid, (usize, Option<String>)> = HashMap::new();

    for row in rows {
        let Some(salon_id) = row.salon_id else {
            continue;
        };
        let entry = counts.entry(salon_id).or_insert_with(|| {
            order.push(salon_id);
            (0, None)
        });
        entry.0 += 1;
        if entry.1.is_none() {
            entry.1 = row.salon_name.clone();
        }
    }

    let mut ranked: Vec<(Uuid, usize, Option<String>)> = order
        .into_iter()
        .filter_map(|id| counts.remove(&id).map(|(count, name)| (id, count, name)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    ranked
        .into_iter()
        .take(TOP_SALON_COUNT)
        .map(|(id, _, name)| (id, name))
        .collect()
}

/// Joins per-salon stats with salon identity. A salon whose stats call came
/// back empty still appears, zero-filled, with its name preserved.
pub fn merge_salon_performance(entries: Vec<SalonStatEntry>) -> Vec<SalonPerformance> {
    entries
        .into_iter()
        .map(|entry| {
            let stats = entry.stats;
            SalonPerformance {
                salon_id: entry.salon_id,
                salon_name: entry.salon_name,
                total: stats.as_ref().map_or(0, |s| s.total_appointments),
                completed: stats.as_ref().map_or(0, |s| s.completed_appointments),
                cancelled: stats.as_ref().map_or(0, |s| s.cancelled_appointments),
                no_show: stats.as_ref().map_or(0, |s| s.no_show_appointments),
                total_revenue: stats.as_ref().map_or(0.0, |s| s.total_revenue),
                avg_duration: stats.as_ref().map_or(0.0, |s| s.avg_service_duration),
            }
        })
        .collect()
}

/// Pure assembly of one snapshot from already-fetched inputs. Every component
/// that needs a clock gets the same `now`.
pub fn assemble(
    appointment_rows: Vec<AppointmentRow>,
    overview_rows: Vec<AppointmentRow>,
    analytics_rows: Vec<DailyAnalyticsRow>,
    salon_entries: Vec<SalonStatEntry>,
    timeframe: Timeframe,
    now: DateTime<Utc>,
) -> AppointmentSnapshot {
    let totals = metrics::build_status_totals(&appointment_rows, now);
    let performance = metrics::calculate_performance(&totals, &appointment_rows);
    let cancellations = metrics::build_cancellation_patterns(&appointment_rows);
    let trend = metrics::build_trend(&analytics_rows);
    let no_shows = alerts::build_no_show_summary(&appointment_rows);
    let fraud_alerts = alerts::build_fraud_alerts(&appointment_rows);
    let disputes = alerts::build_dispute_candidates(&appointment_rows, now);

    AppointmentSnapshot {
        timeframe,
        totals,
        performance,
        trend,
        cancellations,
        no_shows,
        fraud_alerts,
        disputes,
        salon_performance: merge_salon_performance(salon_entries),
        recent_appointments: overview_rows,
    }
}

pub async fn build_snapshot(pool: &PgPool, options: SnapshotOptions) -> AppointmentSnapshot {
    build_snapshot_at(pool, options, Utc::now()).await
}

/// Fetches the three row feeds concurrently, degrades any individual failure
/// to an empty batch, fans out the top-salon stats calls, and assembles one
/// snapshot. Never fails: a dead store yields an empty snapshot.
pub async fn build_snapshot_at(
    pool: &PgPool,
    options: SnapshotOptions,
    now: DateTime<Utc>,
) -> AppointmentSnapshot {
    let start = now - Duration::days(options.window_in_days.max(1));

    let (appointments, overview, analytics) = tokio::join!(
        db::fetch_appointments(pool, start, now, options.appointment_limit),
        db::fetch_recent_overview(pool, options.recent_limit),
        db::fetch_daily_analytics(pool, start.date_naive(), options.window_in_days),
    );

    let appointment_rows = appointments.unwrap_or_else(|err| {
        warn!(error = %err, "appointment fetch failed, assembling without rows");
        Vec::new()
    });
    let overview_rows = overview.unwrap_or_else(|err| {
        warn!(error = %err, "recent overview fetch failed, assembling without rows");
        Vec::new()
    });
    let analytics_rows = analytics.unwrap_or_else(|err| {
        warn!(error = %err, "daily analytics fetch failed, assembling without rows");
        Vec::new()
    });

    let salon_entries = join_all(top_salons(&appointment_rows).into_iter().map(
        |(salon_id, salon_name)| async move {
            let stats = match db::fetch_salon_stats(pool, salon_id, start, now).await {
                Ok(stats) => Some(stats),
                Err(err) => {
                    warn!(salon_id = %salon_id, error = %err, "salon stats fetch failed");
                    None
                }
            };
            SalonStatEntry {
                salon_id,
                salon_name,
                stats,
            }
        },
    ))
    .await;

    assemble(
        appointment_rows,
        overview_rows,
        analytics_rows,
        salon_entries,
        Timeframe { start, end: now },
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, SalonStats};
    use crate::testutil::row;
    use chrono::TimeZone;

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_batches_assemble_into_zeroed_snapshot() {
        let now = test_now();
        let snapshot = assemble(
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Timeframe {
                start: now - Duration::days(30),
                end: now,
            },
            now,
        );

        assert_eq!(snapshot.totals.total, 0);
        assert_eq!(snapshot.performance.completion_rate, 0.0);
        assert!(snapshot.trend.is_empty());
        assert!(snapshot.cancellations.is_empty());
        assert!(snapshot.fraud_alerts.is_empty());
        assert!(snapshot.disputes.is_empty());
        assert!(snapshot.salon_performance.is_empty());
        assert!(snapshot.recent_appointments.is_empty());
    }

    #[test]
    fn top_salons_ranks_by_volume_and_caps_at_five() {
        let mut rows = Vec::new();
        let salons: Vec<Uuid> = (0..7).map(|_| Uuid::new_v4()).collect();
        for (i, salon_id) in salons.iter().enumerate() {
            for _ in 0..(i + 1) {
                let mut value = row(AppointmentStatus::Completed);
                value.salon_id = Some(*salon_id);
                value.salon_name = Some(format!("Salon {i}"));
                rows.push(value);
            }
        }

        let ranked = top_salons(&rows);
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[0].0, salons[6]);
        assert_eq!(ranked[0].1.as_deref(), Some("Salon 6"));
        assert_eq!(ranked[4].0, salons[2]);
    }

    #[test]
    fn top_salons_skips_rows_without_salon_and_backfills_names() {
        let salon_id = Uuid::new_v4();
        let mut unnamed = row(AppointmentStatus::Pending);
        unnamed.salon_id = Some(salon_id);
        let mut named = row(AppointmentStatus::Pending);
        named.salon_id = Some(salon_id);
        named.salon_name = Some("Shear Genius".to_string());
        let orphan = row(AppointmentStatus::Pending);

        let ranked = top_salons(&[unnamed, named, orphan]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].1.as_deref(), Some("Shear Genius"));
    }

    #[test]
    fn merge_defaults_missing_stats_to_zero() {
        let with_stats = SalonStatEntry {
            salon_id: Uuid::new_v4(),
            salon_name: Some("Polished".to_string()),
            stats: Some(SalonStats {
                total_appointments: 40,
                completed_appointments: 30,
                cancelled_appointments: 6,
                no_show_appointments: 4,
                total_revenue: 2_400.0,
                avg_service_duration: 52.5,
            }),
        };
        let without_stats = SalonStatEntry {
            salon_id: Uuid::new_v4(),
            salon_name: Some("Clipped".to_string()),
            stats: None,
        };

        let merged = merge_salon_performance(vec![with_stats, without_stats]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].total, 40);
        assert!((merged[0].avg_duration - 52.5).abs() < f64::EPSILON);
        assert_eq!(merged[1].total, 0);
        assert_eq!(merged[1].total_revenue, 0.0);
        assert_eq!(merged[1].salon_name.as_deref(), Some("Clipped"));
    }

    #[test]
    fn identical_input_assembles_identical_metrics() {
        let now = test_now();
        let mut rows = Vec::new();
        let customer = Uuid::new_v4();
        for i in 0..4 {
            let mut value = row(AppointmentStatus::Cancelled);
            value.customer_id = Some(customer);
            value.start_time = Some(now - Duration::days(i));
            value.total_price = Some(300.0);
            rows.push(value);
        }

        let timeframe = Timeframe {
            start: now - Duration::days(30),
            end: now,
        };
        let first = assemble(
            rows.clone(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            timeframe.clone(),
            now,
        );
        let second = assemble(rows, Vec::new(), Vec::new(), Vec::new(), timeframe, now);

        assert_eq!(first.totals, second.totals);
        let first_ids: Vec<&str> = first.fraud_alerts.iter().map(|a| a.id.as_str()).collect();
        let second_ids: Vec<&str> = second.fraud_alerts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }
}
