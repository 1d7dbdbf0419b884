use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Booking lifecycle states as stored by the platform. Anything the store
/// hands us that we do not recognise collapses to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Draft,
    Pending,
    Confirmed,
    CheckedIn,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("draft") => Self::Draft,
            Some("confirmed") => Self::Confirmed,
            Some("checked_in") => Self::CheckedIn,
            Some("in_progress") => Self::InProgress,
            Some("completed") => Self::Completed,
            Some("cancelled") => Self::Cancelled,
            Some("no_show") => Self::NoShow,
            Some("rescheduled") => Self::Rescheduled,
            _ => Self::Pending,
        }
    }
}

/// One row from the pre-joined appointment overview feed. Every field except
/// `status` is optional; defaults are applied once when the row is read from
/// the store, not at each use site.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentRow {
    pub id: Option<Uuid>,
    pub salon_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub customer_email: Option<String>,
    pub status: AppointmentStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub total_price: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub salon_name: Option<String>,
    pub customer_name: Option<String>,
    pub staff_name: Option<String>,
}

/// One day of platform-wide counters from the analytics feed. The counters
/// are pre-aggregated upstream; the engine only reshapes them.
#[derive(Debug, Clone)]
pub struct DailyAnalyticsRow {
    pub date: Option<NaiveDate>,
    pub platform_appointments: Option<i64>,
    pub platform_cancelled_appointments: Option<i64>,
    pub platform_no_shows: Option<i64>,
    pub platform_completed_appointments: Option<i64>,
}

/// Status counts over one row batch. `upcoming` overlays the other buckets:
/// a confirmed future appointment counts there as well.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusTotals {
    pub total: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub no_show: usize,
    pub in_progress: usize,
    pub upcoming: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub completion_rate: f64,
    pub cancellation_rate: f64,
    pub no_show_rate: f64,
    pub average_duration: f64,
    pub total_revenue: f64,
    pub average_ticket: f64,
}

/// One weekday × time-of-day cell of the cancellation clustering.
#[derive(Debug, Clone, Serialize)]
pub struct CancellationPattern {
    pub label: String,
    pub count: usize,
    pub share: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub total: i64,
    pub cancelled: i64,
    pub no_show: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoShowRecord {
    pub id: Uuid,
    pub salon_name: Option<String>,
    pub customer_name: Option<String>,
    pub staff_name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub total_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NoShowSummary {
    pub count: usize,
    pub rate: f64,
    pub recent: Vec<NoShowRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudAlertKind {
    RepeatedNoShow,
    HighValueCancellation,
    RapidCancellation,
    DoubleBookingRisk,
}

/// A heuristic fraud/abuse signal. `id` is derived from the detector kind and
/// the source identifiers, so identical input batches reproduce identical ids
/// across polling cycles.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudAlert {
    pub id: String,
    pub kind: FraudAlertKind,
    pub score: f64,
    pub summary: String,
    pub related_appointment_ids: Vec<Uuid>,
    pub customer_id: Option<String>,
    pub salon_id: Option<Uuid>,
}

/// An appointment queued for human review of a refund/penalty decision.
/// `status` stays the literal `review` until a real workflow exists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeCandidate {
    pub appointment_id: Uuid,
    pub customer_name: Option<String>,
    pub salon_name: Option<String>,
    pub status: &'static str,
    pub amount: Option<f64>,
    pub reason: &'static str,
    pub recommended_action: &'static str,
}

/// Aggregate stats for one salon as returned by the per-salon stats query.
#[derive(Debug, Clone)]
pub struct SalonStats {
    pub total_appointments: i64,
    pub completed_appointments: i64,
    pub cancelled_appointments: i64,
    pub no_show_appointments: i64,
    pub total_revenue: f64,
    pub avg_service_duration: f64,
}

#[derive(Debug, Clone)]
pub struct SalonStatEntry {
    pub salon_id: Uuid,
    pub salon_name: Option<String>,
    pub stats: Option<SalonStats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalonPerformance {
    pub salon_id: Uuid,
    pub salon_name: Option<String>,
    pub total: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub no_show: i64,
    pub total_revenue: f64,
    pub avg_duration: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Timeframe {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotOptions {
    pub window_in_days: i64,
    pub appointment_limit: i64,
    pub recent_limit: i64,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            window_in_days: 30,
            appointment_limit: 300,
            recent_limit: 60,
        }
    }
}

/// The complete result of one engine invocation. Immutable, has no identity
/// beyond the request, and is replaced wholesale by the next refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentSnapshot {
    pub timeframe: Timeframe,
    pub totals: StatusTotals,
    pub performance: PerformanceMetrics,
    pub trend: Vec<TrendPoint>,
    pub cancellations: Vec<CancellationPattern>,
    pub no_shows: NoShowSummary,
    pub fraud_alerts: Vec<FraudAlert>,
    pub disputes: Vec<DisputeCandidate>,
    pub salon_performance: Vec<SalonPerformance>,
    pub recent_appointments: Vec<AppointmentRow>,
}
