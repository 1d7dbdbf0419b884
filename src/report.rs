use std::fmt::Write;

use crate::models::AppointmentSnapshot;

pub fn build_report(snapshot: &AppointmentSnapshot) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Appointment Oversight Report");
    let _ = writeln!(
        output,
        "Window: {} to {}",
        snapshot.timeframe.start.format("%Y-%m-%d %H:%M UTC"),
        snapshot.timeframe.end.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Status Mix");
    let totals = &snapshot.totals;
    let _ = writeln!(output, "- Total appointments: {}", totals.total);
    let _ = writeln!(output, "- Completed: {}", totals.completed);
    let _ = writeln!(output, "- Cancelled: {}", totals.cancelled);
    let _ = writeln!(output, "- No-shows: {}", totals.no_show);
    let _ = writeln!(output, "- In progress: {}", totals.in_progress);
    let _ = writeln!(output, "- Upcoming: {}", totals.upcoming);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Performance");
    let performance = &snapshot.performance;
    let _ = writeln!(
        output,
        "- Completion rate {:.0}%, cancellation rate {:.0}%, no-show rate {:.0}%",
        performance.completion_rate * 100.0,
        performance.cancellation_rate * 100.0,
        performance.no_show_rate * 100.0
    );
    let _ = writeln!(
        output,
        "- Revenue ${:.2} across completed visits (avg ticket ${:.2})",
        performance.total_revenue, performance.average_ticket
    );
    let _ = writeln!(
        output,
        "- Average service duration {:.0} minutes",
        performance.average_duration
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Cancellation Hotspots");
    if snapshot.cancellations.is_empty() {
        let _ = writeln!(output, "No cancellations recorded for this window.");
    } else {
        for pattern in snapshot.cancellations.iter().take(5) {
            let _ = writeln!(
                output,
                "- {}: {} cancellations ({:.0}% of all)",
                pattern.label,
                pattern.count,
                pattern.share * 100.0
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Fraud Signals");
    if snapshot.fraud_alerts.is_empty() {
        let _ = writeln!(output, "No fraud signals for this window.");
    } else {
        let mut ranked: Vec<_> = snapshot.fraud_alerts.iter().collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for alert in ranked.iter().take(10) {
            let _ = writeln!(output, "- [{:.2}] {}", alert.score, alert.summary);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Dispute Queue");
    if snapshot.disputes.is_empty() {
        let _ = writeln!(output, "No dispute candidates for this window.");
    } else {
        for dispute in snapshot.disputes.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}, ${:.0}): {}",
                dispute.customer_name.as_deref().unwrap_or("Unknown customer"),
                dispute.salon_name.as_deref().unwrap_or("unknown salon"),
                dispute.amount.unwrap_or(0.0),
                dispute.reason
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Salons");
    if snapshot.salon_performance.is_empty() {
        let _ = writeln!(output, "No salon activity for this window.");
    } else {
        for salon in &snapshot.salon_performance {
            let _ = writeln!(
                output,
                "- {}: {} appointments, {} completed, {} cancelled, {} no-shows, ${:.2} revenue",
                salon.salon_name.as_deref().unwrap_or("Unnamed salon"),
                salon.total,
                salon.completed,
                salon.cancelled,
                salon.no_show,
                salon.total_revenue
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent No-Shows");
    if snapshot.no_shows.recent.is_empty() {
        let _ = writeln!(output, "No recent no-shows.");
    } else {
        for record in &snapshot.no_shows.recent {
            let when = record
                .start_time
                .map(|start| start.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "unknown time".to_string());
            let _ = writeln!(
                output,
                "- {} at {} on {} (${:.0})",
                record.customer_name.as_deref().unwrap_or("Unknown customer"),
                record.salon_name.as_deref().unwrap_or("unknown salon"),
                when,
                record.total_price.unwrap_or(0.0)
            );
        }
    }

    output
}
