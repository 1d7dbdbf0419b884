use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{
    AppointmentRow, AppointmentStatus, DisputeCandidate, FraudAlert, FraudAlertKind, NoShowRecord,
    NoShowSummary,
};

const HIGH_VALUE_THRESHOLD: f64 = 250.0;
const HIGH_VALUE_SATURATION: f64 = 500.0;
const RAPID_CANCEL_HOURS: i64 = 2;
const REPEAT_NO_SHOW_THRESHOLD: usize = 3;
const REPEAT_CANCEL_THRESHOLD: usize = 4;
const REPEAT_SCORE_DIVISOR: f64 = 6.0;
const DOUBLE_BOOKING_MINUTES: i64 = 45;
const DISPUTE_LOOKBACK_DAYS: i64 = 7;
const DISPUTE_AMOUNT_THRESHOLD: f64 = 100.0;
const SAME_DAY_HOURS: i64 = 24;
const RECENT_NO_SHOW_CAP: usize = 10;

pub fn build_no_show_summary(rows: &[AppointmentRow]) -> NoShowSummary {
    let mut no_shows: Vec<&AppointmentRow> = rows
        .iter()
        .filter(|row| row.status == AppointmentStatus::NoShow)
        .collect();
    let count = no_shows.len();
    let rate = if rows.is_empty() {
        0.0
    } else {
        count as f64 / rows.len() as f64
    };

    // Descending by start time; rows missing one sort last.
    no_shows.sort_by(|a, b| b.start_time.cmp(&a.start_time));

    let recent = no_shows
        .into_iter()
        .take(RECENT_NO_SHOW_CAP)
        .map(|row| NoShowRecord {
            id: row.id.unwrap_or_else(Uuid::new_v4),
            salon_name: row.salon_name.clone(),
            customer_name: row.customer_name.clone(),
            staff_name: row.staff_name.clone(),
            start_time: row.start_time,
            total_price: row.total_price,
        })
        .collect();

    NoShowSummary { count, rate, recent }
}

#[derive(Default)]
struct CustomerTally {
    cancellations: usize,
    no_shows: usize,
    appointment_ids: Vec<Uuid>,
}

/// Groups rows lacking both a customer id and an email under one shared key.
/// Guest bookings therefore pool together, which can over- or under-trigger
/// the repeat detector; accepted as a known approximation.
fn customer_key(row: &AppointmentRow) -> String {
    row.customer_id
        .map(|id| id.to_string())
        .or_else(|| row.customer_email.clone())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Stable fragment for alert id strings. Rows without an id map to a fixed
/// placeholder so repeated runs over the same batch reproduce the same ids.
fn id_label(id: Option<Uuid>) -> String {
    id.map(|value| value.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn hours_before_start(row: &AppointmentRow) -> Option<i64> {
    match (row.start_time, row.updated_at) {
        (Some(start), Some(updated)) => Some((start - updated).num_hours()),
        _ => None,
    }
}

/// Runs the four independent fraud heuristics over one batch and concatenates
/// their alerts. No cross-detector suppression. Grouped detectors emit in
/// first-seen order so output is deterministic for a given input batch.
pub fn build_fraud_alerts(rows: &[AppointmentRow]) -> Vec<FraudAlert> {
    let mut alerts: Vec<FraudAlert> = Vec::new();

    let mut customer_order: Vec<String> = Vec::new();
    let mut customers: HashMap<String, CustomerTally> = HashMap::new();
    let mut staff_order: Vec<Uuid> = Vec::new();
    let mut staff_rows: HashMap<Uuid, Vec<&AppointmentRow>> = HashMap::new();

    for row in rows {
        let key = customer_key(row);
        let tally = customers.entry(key.clone()).or_insert_with(|| {
            customer_order.push(key);
            CustomerTally::default()
        });
        if row.status == AppointmentStatus::Cancelled {
            tally.cancellations += 1;
        }
        if row.status == AppointmentStatus::NoShow {
            tally.no_shows += 1;
        }
        tally.appointment_ids.push(row.id.unwrap_or_else(Uuid::new_v4));

        if let Some(staff_id) = row.staff_id {
            staff_rows
                .entry(staff_id)
                .or_insert_with(|| {
                    staff_order.push(staff_id);
                    Vec::new()
                })
                .push(row);
        }

        if row.status == AppointmentStatus::Cancelled {
            if let Some(price) = row.total_price {
                if price > HIGH_VALUE_THRESHOLD {
                    let row_ref = row.id.unwrap_or_else(Uuid::new_v4);
                    alerts.push(FraudAlert {
                        id: format!("high-value-{}", id_label(row.id)),
                        kind: FraudAlertKind::HighValueCancellation,
                        score: f64::min(1.0, price / HIGH_VALUE_SATURATION),
                        summary: format!(
                            "{} cancelled a high-value booking (${price:.0})",
                            row.customer_name.as_deref().unwrap_or("Customer")
                        ),
                        related_appointment_ids: vec![row_ref],
                        customer_id: row.customer_id.map(|id| id.to_string()),
                        salon_id: row.salon_id,
                    });
                }
            }

            if let Some(hours_before) = hours_before_start(row) {
                // Negative means the cancellation landed after the start
                // time; treated as a data anomaly, not a signal.
                if (0..RAPID_CANCEL_HOURS).contains(&hours_before) {
                    let row_ref = row.id.unwrap_or_else(Uuid::new_v4);
                    alerts.push(FraudAlert {
                        id: format!("rapid-cancel-{}", id_label(row.id)),
                        kind: FraudAlertKind::RapidCancellation,
                        score: f64::min(
                            1.0,
                            (RAPID_CANCEL_HOURS - hours_before) as f64
                                / RAPID_CANCEL_HOURS as f64,
                        ),
                        summary: format!(
                            "{} cancelled within {hours_before}h of start",
                            row.customer_name.as_deref().unwrap_or("Customer")
                        ),
                        related_appointment_ids: vec![row_ref],
                        customer_id: row.customer_id.map(|id| id.to_string()),
                        salon_id: row.salon_id,
                    });
                }
            }
        }
    }

    for key in &customer_order {
        let Some(tally) = customers.get(key) else {
            continue;
        };
        if tally.no_shows >= REPEAT_NO_SHOW_THRESHOLD
            || tally.cancellations >= REPEAT_CANCEL_THRESHOLD
        {
            alerts.push(FraudAlert {
                id: format!("repeat-{key}"),
                kind: FraudAlertKind::RepeatedNoShow,
                score: f64::min(
                    1.0,
                    (tally.no_shows + tally.cancellations) as f64 / REPEAT_SCORE_DIVISOR,
                ),
                summary: format!(
                    "Customer {key} has {} no-shows and {} cancellations",
                    tally.no_shows, tally.cancellations
                ),
                related_appointment_ids: tally.appointment_ids.clone(),
                customer_id: Some(key.clone()),
                salon_id: None,
            });
        }
    }

    for staff_id in &staff_order {
        let Some(list) = staff_rows.get(staff_id) else {
            continue;
        };
        let mut sorted: Vec<&AppointmentRow> = list
            .iter()
            .copied()
            .filter(|row| row.start_time.is_some())
            .collect();
        sorted.sort_by_key(|row| row.start_time);

        // Only adjacent pairs: a back-to-back chain of three yields two
        // alerts, not three.
        for pair in sorted.windows(2) {
            let (current, next) = (pair[0], pair[1]);
            let (Some(current_start), Some(next_start)) = (current.start_time, next.start_time)
            else {
                continue;
            };
            let diff = (next_start - current_start).num_minutes();
            if (0..DOUBLE_BOOKING_MINUTES).contains(&diff) {
                let current_ref = current.id.unwrap_or_else(Uuid::new_v4);
                alerts.push(FraudAlert {
                    id: format!("double-booking-{staff_id}-{}", id_label(current.id)),
                    kind: FraudAlertKind::DoubleBookingRisk,
                    score: f64::min(
                        1.0,
                        (DOUBLE_BOOKING_MINUTES - diff) as f64 / DOUBLE_BOOKING_MINUTES as f64,
                    ),
                    summary: format!(
                        "{} has back-to-back appointments ({diff} mins apart)",
                        current.staff_name.as_deref().unwrap_or("Staff")
                    ),
                    related_appointment_ids: vec![
                        current_ref,
                        next.id.unwrap_or_else(Uuid::new_v4),
                    ],
                    customer_id: None,
                    salon_id: current.salon_id,
                });
            }
        }
    }

    alerts
}

/// Filters high-value cancelled/no-show rows inside a fixed 7-day lookback
/// into a review queue. The lookback is deliberately not caller-configurable.
pub fn build_dispute_candidates(
    rows: &[AppointmentRow],
    now: DateTime<Utc>,
) -> Vec<DisputeCandidate> {
    let cutoff = now - Duration::days(DISPUTE_LOOKBACK_DAYS);

    rows.iter()
        .filter(|row| {
            matches!(
                row.status,
                AppointmentStatus::Cancelled | AppointmentStatus::NoShow
            ) && row.start_time.is_some_and(|start| start >= cutoff)
                && row.total_price.unwrap_or(0.0) > DISPUTE_AMOUNT_THRESHOLD
        })
        .map(|row| {
            let hours_before = hours_before_start(row);
            let same_day = hours_before.is_some_and(|hours| hours <= SAME_DAY_HOURS);

            let (reason, recommended_action) = if row.status == AppointmentStatus::NoShow {
                (
                    "No-show on high-value booking",
                    "Contact customer, review penalty policy, and re-engage salon",
                )
            } else if same_day {
                (
                    "Same-day cancellation on premium booking",
                    "Review cancellation reason, consider partial refund, notify finance",
                )
            } else {
                (
                    "High-value appointment cancellation",
                    "Review cancellation reason, consider partial refund, notify finance",
                )
            };

            DisputeCandidate {
                appointment_id: row.id.unwrap_or_else(Uuid::new_v4),
                customer_name: row.customer_name.clone(),
                salon_name: row.salon_name.clone(),
                status: "review",
                amount: row.total_price,
                reason,
                recommended_action,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{row, row_at};
    use chrono::TimeZone;

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn no_show_summary_counts_and_rates() {
        let now = test_now();
        let rows = vec![
            row_at(AppointmentStatus::NoShow, now - Duration::days(1)),
            row_at(AppointmentStatus::NoShow, now - Duration::days(3)),
            row_at(AppointmentStatus::Completed, now - Duration::days(2)),
            row_at(AppointmentStatus::Pending, now - Duration::days(4)),
        ];

        let summary = build_no_show_summary(&rows);
        assert_eq!(summary.count, 2);
        assert!((summary.rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(summary.recent.len(), 2);
        assert!(summary.recent[0].start_time > summary.recent[1].start_time);
    }

    #[test]
    fn no_show_recent_is_capped_at_ten() {
        let now = test_now();
        let rows: Vec<_> = (0..15)
            .map(|i| row_at(AppointmentStatus::NoShow, now - Duration::hours(i)))
            .collect();
        let summary = build_no_show_summary(&rows);
        assert_eq!(summary.count, 15);
        assert_eq!(summary.recent.len(), 10);
    }

    #[test]
    fn no_show_summary_empty_batch() {
        let summary = build_no_show_summary(&[]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.rate, 0.0);
        assert!(summary.recent.is_empty());
    }

    #[test]
    fn high_value_and_rapid_alerts_for_same_row() {
        // Scenario: cancelled at $400, one hour before start.
        let now = test_now();
        let mut booking = row_at(AppointmentStatus::Cancelled, now + Duration::hours(1));
        booking.total_price = Some(400.0);
        booking.updated_at = Some(now);

        let alerts = build_fraud_alerts(&[booking]);
        assert_eq!(alerts.len(), 2);

        let high_value = alerts
            .iter()
            .find(|a| a.kind == FraudAlertKind::HighValueCancellation)
            .unwrap();
        assert!((high_value.score - 0.8).abs() < 1e-9);

        let rapid = alerts
            .iter()
            .find(|a| a.kind == FraudAlertKind::RapidCancellation)
            .unwrap();
        assert!((rapid.score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn high_value_requires_price_above_threshold() {
        let mut booking = row(AppointmentStatus::Cancelled);
        booking.total_price = Some(250.0);
        assert!(build_fraud_alerts(&[booking]).is_empty());
    }

    #[test]
    fn high_value_score_saturates_at_one() {
        let mut booking = row(AppointmentStatus::Cancelled);
        booking.total_price = Some(900.0);
        let alerts = build_fraud_alerts(&[booking]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].score, 1.0);
    }

    #[test]
    fn rapid_alert_excludes_two_hour_and_late_cancellations() {
        let now = test_now();

        let mut at_boundary = row_at(AppointmentStatus::Cancelled, now + Duration::hours(2));
        at_boundary.updated_at = Some(now);
        assert!(build_fraud_alerts(&[at_boundary]).is_empty());

        // Cancelled after the appointment already started: data anomaly.
        let mut after_start = row_at(AppointmentStatus::Cancelled, now - Duration::hours(1));
        after_start.updated_at = Some(now);
        assert!(build_fraud_alerts(&[after_start]).is_empty());
    }

    #[test]
    fn repeat_alert_for_three_no_shows() {
        let customer = Uuid::new_v4();
        let rows: Vec<_> = (0..3)
            .map(|_| {
                let mut value = row(AppointmentStatus::NoShow);
                value.customer_id = Some(customer);
                value
            })
            .collect();

        let alerts = build_fraud_alerts(&rows);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, FraudAlertKind::RepeatedNoShow);
        assert!((alerts[0].score - 0.5).abs() < 1e-9);
        assert_eq!(alerts[0].related_appointment_ids.len(), 3);
        assert_eq!(alerts[0].customer_id.as_deref(), Some(customer.to_string().as_str()));
    }

    #[test]
    fn repeat_alert_for_four_cancellations() {
        let rows: Vec<_> = (0..4)
            .map(|_| {
                let mut value = row(AppointmentStatus::Cancelled);
                value.customer_email = Some("guest@example.com".to_string());
                value
            })
            .collect();

        let alerts = build_fraud_alerts(&rows);
        let repeat: Vec<_> = alerts
            .iter()
            .filter(|a| a.kind == FraudAlertKind::RepeatedNoShow)
            .collect();
        assert_eq!(repeat.len(), 1);
        assert_eq!(repeat[0].id, "repeat-guest@example.com");
    }

    #[test]
    fn anonymous_rows_pool_under_one_key() {
        // Known approximation: guests with no id or email share one tally.
        let rows: Vec<_> = (0..3).map(|_| row(AppointmentStatus::NoShow)).collect();
        let alerts = build_fraud_alerts(&rows);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "repeat-anonymous");
    }

    #[test]
    fn double_booking_alert_for_thirty_minute_gap() {
        let now = test_now();
        let staff = Uuid::new_v4();
        let mut first = row_at(AppointmentStatus::Confirmed, now);
        first.staff_id = Some(staff);
        let mut second = row_at(AppointmentStatus::Confirmed, now + Duration::minutes(30));
        second.staff_id = Some(staff);

        let alerts = build_fraud_alerts(&[first, second]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, FraudAlertKind::DoubleBookingRisk);
        assert!((alerts[0].score - (45.0 - 30.0) / 45.0).abs() < 1e-9);
        assert_eq!(alerts[0].related_appointment_ids.len(), 2);
    }

    #[test]
    fn double_booking_checks_adjacent_pairs_only() {
        let now = test_now();
        let staff = Uuid::new_v4();
        let rows: Vec<_> = (0..3)
            .map(|i| {
                let mut value =
                    row_at(AppointmentStatus::Confirmed, now + Duration::minutes(20 * i));
                value.staff_id = Some(staff);
                value
            })
            .collect();

        // Back-to-back chain of three: two alerts, never first-to-third.
        let alerts = build_fraud_alerts(&rows);
        assert_eq!(alerts.len(), 2);
        let first_id = rows[0].id.unwrap();
        let third_id = rows[2].id.unwrap();
        for alert in &alerts {
            assert!(
                !(alert.related_appointment_ids.contains(&first_id)
                    && alert.related_appointment_ids.contains(&third_id))
            );
        }
    }

    #[test]
    fn double_booking_ignores_wide_gaps_and_other_staff() {
        let now = test_now();
        let mut first = row_at(AppointmentStatus::Confirmed, now);
        first.staff_id = Some(Uuid::new_v4());
        let mut second = row_at(AppointmentStatus::Confirmed, now + Duration::minutes(30));
        second.staff_id = Some(Uuid::new_v4());
        let mut third = row_at(AppointmentStatus::Confirmed, now + Duration::hours(4));
        third.staff_id = first.staff_id;

        assert!(build_fraud_alerts(&[first, second, third]).is_empty());
    }

    #[test]
    fn alert_scores_stay_in_unit_range() {
        let now = test_now();
        let staff = Uuid::new_v4();
        let customer = Uuid::new_v4();
        let mut rows = Vec::new();
        for i in 0..6 {
            let mut value = row_at(AppointmentStatus::Cancelled, now + Duration::minutes(5 * i));
            value.staff_id = Some(staff);
            value.customer_id = Some(customer);
            value.total_price = Some(1_000.0);
            value.updated_at = Some(now + Duration::minutes(5 * i));
            rows.push(value);
        }

        let alerts = build_fraud_alerts(&rows);
        assert!(!alerts.is_empty());
        for alert in alerts {
            assert!((0.0..=1.0).contains(&alert.score), "score {}", alert.score);
        }
    }

    #[test]
    fn alert_ids_are_idempotent_across_runs() {
        let now = test_now();
        let customer = Uuid::new_v4();
        let mut rows = Vec::new();
        for i in 0..4 {
            let mut value = row_at(AppointmentStatus::Cancelled, now + Duration::hours(i));
            value.customer_id = Some(customer);
            value.total_price = Some(300.0);
            rows.push(value);
        }

        let first: Vec<String> = build_fraud_alerts(&rows).into_iter().map(|a| a.id).collect();
        let second: Vec<String> = build_fraud_alerts(&rows).into_iter().map(|a| a.id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn alert_ids_stable_for_rows_without_ids() {
        let now = test_now();
        let mut booking = row_at(AppointmentStatus::Cancelled, now + Duration::hours(1));
        booking.id = None;
        booking.total_price = Some(400.0);
        booking.updated_at = Some(now);

        let first: Vec<String> = build_fraud_alerts(std::slice::from_ref(&booking))
            .into_iter()
            .map(|a| a.id)
            .collect();
        let second: Vec<String> = build_fraud_alerts(std::slice::from_ref(&booking))
            .into_iter()
            .map(|a| a.id)
            .collect();

        assert_eq!(first, second);
        assert_eq!(first, vec!["high-value-unknown", "rapid-cancel-unknown"]);
    }

    #[test]
    fn disputes_respect_window_and_amount() {
        let now = test_now();

        let mut qualifying = row_at(AppointmentStatus::Cancelled, now - Duration::days(2));
        qualifying.total_price = Some(150.0);

        let mut too_old = row_at(AppointmentStatus::Cancelled, now - Duration::days(8));
        too_old.total_price = Some(400.0);

        let mut too_cheap = row_at(AppointmentStatus::NoShow, now - Duration::days(1));
        too_cheap.total_price = Some(100.0);

        let candidates = build_dispute_candidates(&[qualifying, too_old, too_cheap], now);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].status, "review");
        assert_eq!(candidates[0].amount, Some(150.0));
    }

    #[test]
    fn dispute_reasons_follow_status_and_timing() {
        let now = test_now();

        let mut no_show = row_at(AppointmentStatus::NoShow, now - Duration::days(1));
        no_show.total_price = Some(200.0);

        let mut same_day = row_at(AppointmentStatus::Cancelled, now - Duration::days(1));
        same_day.total_price = Some(200.0);
        same_day.updated_at = Some(now - Duration::days(1) - Duration::hours(3));

        let mut early = row_at(AppointmentStatus::Cancelled, now - Duration::days(1));
        early.total_price = Some(200.0);
        early.updated_at = Some(now - Duration::days(4));

        let candidates = build_dispute_candidates(&[no_show, same_day, early], now);
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].reason, "No-show on high-value booking");
        assert_eq!(candidates[1].reason, "Same-day cancellation on premium booking");
        assert_eq!(candidates[2].reason, "High-value appointment cancellation");
    }
}
