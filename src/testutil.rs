use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{AppointmentRow, AppointmentStatus};

pub fn row(status: AppointmentStatus) -> AppointmentRow {
    AppointmentRow {
        id: Some(Uuid::new_v4()),
        salon_id: None,
        staff_id: None,
        customer_id: None,
        customer_email: None,
        status,
        start_time: None,
        created_at: None,
        updated_at: None,
        total_price: None,
        duration_minutes: None,
        salon_name: None,
        customer_name: None,
        staff_name: None,
    }
}

pub fn row_at(status: AppointmentStatus, start_time: DateTime<Utc>) -> AppointmentRow {
    let mut value = row(status);
    value.start_time = Some(start_time);
    value
}
