use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{AppointmentRow, AppointmentStatus, DailyAnalyticsRow, SalonStats};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn row_from_overview(row: &sqlx::postgres::PgRow) -> AppointmentRow {
    let status: Option<String> = row.get("status");
    AppointmentRow {
        id: row.get("id"),
        salon_id: row.get("salon_id"),
        staff_id: row.get("staff_id"),
        customer_id: row.get("customer_id"),
        customer_email: row.get("customer_email"),
        status: AppointmentStatus::parse(status.as_deref()),
        start_time: row.get("start_time"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        total_price: row.get("total_price"),
        duration_minutes: row.get("duration_minutes"),
        salon_name: row.get("salon_name"),
        customer_name: row.get("customer_name"),
        staff_name: row.get("staff_name"),
    }
}

pub async fn fetch_appointments(
    pool: &PgPool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: i64,
) -> anyhow::Result<Vec<AppointmentRow>> {
    let records = sqlx::query(
        "SELECT id, salon_id, staff_id, customer_id, customer_email, status, \
         start_time, created_at, updated_at, total_price, duration_minutes, \
         salon_name, customer_name, staff_name \
         FROM appointment_oversight.appointment_overview \
         WHERE start_time >= $1 AND start_time <= $2 \
         ORDER BY start_time DESC \
         LIMIT $3",
    )
    .bind(start)
    .bind(end)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to fetch appointment rows")?;

    Ok(records.iter().map(row_from_overview).collect())
}

pub async fn fetch_recent_overview(
    pool: &PgPool,
    limit: i64,
) -> anyhow::Result<Vec<AppointmentRow>> {
    let records = sqlx::query(
        "SELECT id, salon_id, staff_id, customer_id, customer_email, status, \
         start_time, created_at, updated_at, total_price, duration_minutes, \
         salon_name, customer_name, staff_name \
         FROM appointment_oversight.appointment_overview \
         ORDER BY start_time DESC NULLS LAST \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to fetch recent overview rows")?;

    Ok(records.iter().map(row_from_overview).collect())
}

pub async fn fetch_daily_analytics(
    pool: &PgPool,
    since: NaiveDate,
    limit: i64,
) -> anyhow::Result<Vec<DailyAnalyticsRow>> {
    let records = sqlx::query(
        "SELECT date, platform_appointments, platform_cancelled_appointments, \
         platform_no_shows, platform_completed_appointments \
         FROM appointment_oversight.daily_platform_analytics \
         WHERE date >= $1 \
         ORDER BY date DESC \
         LIMIT $2",
    )
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to fetch daily analytics rows")?;

    Ok(records
        .iter()
        .map(|row| DailyAnalyticsRow {
            date: row.get("date"),
            platform_appointments: row.get("platform_appointments"),
            platform_cancelled_appointments: row.get("platform_cancelled_appointments"),
            platform_no_shows: row.get("platform_no_shows"),
            platform_completed_appointments: row.get("platform_completed_appointments"),
        })
        .collect())
}

pub async fn fetch_salon_stats(
    pool: &PgPool,
    salon_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> anyhow::Result<SalonStats> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total_appointments, \
         COUNT(*) FILTER (WHERE status = 'completed') AS completed_appointments, \
         COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_appointments, \
         COUNT(*) FILTER (WHERE status = 'no_show') AS no_show_appointments, \
         COALESCE(SUM(total_price) FILTER (WHERE status = 'completed'), 0)::double precision AS total_revenue, \
         COALESCE(AVG(duration_minutes), 0)::double precision AS avg_service_duration \
         FROM appointment_oversight.appointments \
         WHERE salon_id = $1 AND start_time >= $2 AND start_time <= $3",
    )
    .bind(salon_id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await
    .context("failed to fetch salon stats")?;

    Ok(SalonStats {
        total_appointments: row.get("total_appointments"),
        completed_appointments: row.get("completed_appointments"),
        cancelled_appointments: row.get("cancelled_appointments"),
        no_show_appointments: row.get("no_show_appointments"),
        total_revenue: row.get("total_revenue"),
        avg_service_duration: row.get("avg_service_duration"),
    })
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let salons = vec![
        (
            Uuid::parse_str("6f1f3b52-8c7e-4f05-9b62-4df1c3a9d7a1")?,
            "Shear Genius",
        ),
        (
            Uuid::parse_str("b4b9a7e3-1d26-4c43-8e0a-5e2f9d6c1b8f")?,
            "Polished & Co",
        ),
    ];

    for (id, name) in &salons {
        sqlx::query(
            r#"
            INSERT INTO appointment_oversight.salons (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;
    }

    let staff = vec![
        (
            Uuid::parse_str("2a8e6c1d-7b4f-4d92-a3e5-9c0f1b6d8e27")?,
            salons[0].0,
            "Mara Quinn",
        ),
        (
            Uuid::parse_str("9d3b5f7a-0c2e-4861-b4d9-7e5a1f8c3b60")?,
            salons[1].0,
            "Theo Park",
        ),
    ];

    for (id, salon_id, full_name) in &staff {
        sqlx::query(
            r#"
            INSERT INTO appointment_oversight.staff (id, salon_id, full_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (salon_id, full_name) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(salon_id)
        .bind(full_name)
        .execute(pool)
        .await?;
    }

    let customers = vec![
        (
            Uuid::parse_str("c5e2d9f1-3a84-4b67-90c3-1f7e8a2d5b49")?,
            "Avery Lee",
            "avery.lee@example.com",
        ),
        (
            Uuid::parse_str("e7a4b1c8-5d20-4f39-82e6-3b9c0d7f4a15")?,
            "Jules Moreno",
            "jules.moreno@example.com",
        ),
    ];

    for (id, full_name, email) in &customers {
        sqlx::query(
            r#"
            INSERT INTO appointment_oversight.customers (id, full_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(id)
        .bind(full_name)
        .bind(email)
        .execute(pool)
        .await?;
    }

    let now = Utc::now();
    let appointments = vec![
        // A completed visit, a high-value late cancellation, and a no-show,
        // enough for a seeded snapshot to show every section.
        (
            "seed-001",
            salons[0].0,
            staff[0].0,
            customers[0].0,
            "completed",
            now - Duration::days(2),
            Some(95.0),
            Some(60),
        ),
        (
            "seed-002",
            salons[0].0,
            staff[0].0,
            customers[1].0,
            "cancelled",
            now - Duration::days(1),
            Some(320.0),
            Some(90),
        ),
        (
            "seed-003",
            salons[1].0,
            staff[1].0,
            customers[0].0,
            "no_show",
            now - Duration::days(3),
            Some(140.0),
            Some(45),
        ),
        (
            "seed-004",
            salons[1].0,
            staff[1].0,
            customers[1].0,
            "confirmed",
            now + Duration::days(1),
            Some(75.0),
            Some(30),
        ),
    ];

    for (source_key, salon_id, staff_id, customer_id, status, start_time, price, duration) in
        appointments
    {
        sqlx::query(
            r#"
            INSERT INTO appointment_oversight.appointments
            (id, salon_id, staff_id, customer_id, status, start_time, updated_at,
             total_price, duration_minutes, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(salon_id)
        .bind(staff_id)
        .bind(customer_id)
        .bind(status)
        .bind(start_time)
        .bind(now - Duration::hours(1))
        .bind(price)
        .bind(duration)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        salon_name: String,
        staff_name: Option<String>,
        customer_name: Option<String>,
        customer_email: Option<String>,
        status: String,
        start_time: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
        total_price: Option<f64>,
        duration_minutes: Option<i32>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;

        let salon_id: Uuid = sqlx::query(
            r#"
            INSERT INTO appointment_oversight.salons (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.salon_name)
        .fetch_one(pool)
        .await?
        .get("id");

        let staff_id: Option<Uuid> = match &row.staff_name {
            Some(full_name) => Some(
                sqlx::query(
                    r#"
                    INSERT INTO appointment_oversight.staff (id, salon_id, full_name)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (salon_id, full_name) DO UPDATE SET full_name = EXCLUDED.full_name
                    RETURNING id
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(salon_id)
                .bind(full_name)
                .fetch_one(pool)
                .await?
                .get("id"),
            ),
            None => None,
        };

        // Rows without an email become guest bookings with no customer link.
        let customer_id: Option<Uuid> = match &row.customer_email {
            Some(email) => Some(
                sqlx::query(
                    r#"
                    INSERT INTO appointment_oversight.customers (id, full_name, email)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (email) DO UPDATE SET full_name = COALESCE(EXCLUDED.full_name, appointment_oversight.customers.full_name)
                    RETURNING id
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&row.customer_name)
                .bind(email)
                .fetch_one(pool)
                .await?
                .get("id"),
            ),
            None => None,
        };

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO appointment_oversight.appointments
            (id, salon_id, staff_id, customer_id, status, start_time, updated_at,
             total_price, duration_minutes, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(salon_id)
        .bind(staff_id)
        .bind(customer_id)
        .bind(&row.status)
        .bind(row.start_time)
        .bind(row.updated_at)
        .bind(row.total_price)
        .bind(row.duration_minutes)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
