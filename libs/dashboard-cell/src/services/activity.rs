use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_utils::time::time_ago;

use crate::models::{
    Activity, ActivityKind, PatientName, RecentBilling, RecentPatient, RecentRecord, RecentVisit,
};

fn patient_name(patient: &Option<PatientName>) -> &str {
    patient.as_ref().map(|p| p.name.as_str()).unwrap_or("Unknown patient")
}

/// Rows pulled from each table for the feed.
#[derive(Debug, Default)]
pub struct RecentRows {
    pub patients: Vec<RecentPatient>,
    pub visits: Vec<RecentVisit>,
    pub records: Vec<RecentRecord>,
    pub billings: Vec<RecentBilling>,
}

/// Newest first across all sources, at most `limit` entries.
pub fn merge_feed(rows: RecentRows, limit: usize, now: DateTime<Utc>) -> Vec<Activity> {
    let mut feed: Vec<(ActivityKind, Uuid, String, String, DateTime<Utc>)> = Vec::new();

    feed.extend(rows.patients.into_iter().map(|p| {
        (
            ActivityKind::Patient,
            p.id,
            "New patient registered".to_string(),
            format!("{} ({})", p.name, p.medical_record_no),
            p.created_at,
        )
    }));
    feed.extend(rows.visits.into_iter().map(|v| {
        (
            ActivityKind::Visit,
            v.id,
            "Visit scheduled".to_string(),
            format!("{} - queue {} ({})", patient_name(&v.patient), v.queue_number, v.status),
            v.created_at,
        )
    }));
    feed.extend(rows.records.into_iter().map(|r| {
        (
            ActivityKind::MedicalRecord,
            r.id,
            "Medical record added".to_string(),
            format!("{} - {}", patient_name(&r.patient), r.diagnosis),
            r.created_at,
        )
    }));
    feed.extend(rows.billings.into_iter().map(|b| {
        (
            ActivityKind::Billing,
            b.id,
            "Billing created".to_string(),
            format!("{} - {} {:.2} ({})", patient_name(&b.patient), b.invoice_no, b.total, b.status),
            b.created_at,
        )
    }));

    feed.sort_by(|a, b| b.4.cmp(&a.4));
    feed.truncate(limit);

    feed.into_iter()
        .map(|(kind, id, title, description, created_at)| Activity {
            kind,
            id,
            title,
            description,
            created_at,
            time_ago: time_ago(created_at, now),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_feed_is_newest_first_and_limited() {
        let now = Utc::now();
        let rows = RecentRows {
            patients: vec![RecentPatient {
                id: Uuid::new_v4(),
                name: "Siti Rahma".into(),
                medical_record_no: "MRN20250615001".into(),
                created_at: now - Duration::hours(3),
            }],
            records: vec![RecentRecord {
                id: Uuid::new_v4(),
                diagnosis: "Acute pharyngitis".into(),
                created_at: now - Duration::minutes(10),
                patient: Some(PatientName { name: "Siti Rahma".into() }),
            }],
            billings: vec![RecentBilling {
                id: Uuid::new_v4(),
                invoice_no: "INV20250615001".into(),
                total: 2550.0,
                status: billing_cell::models::BillingStatus::Unpaid,
                created_at: now - Duration::days(2),
                patient: None,
            }],
            visits: Vec::new(),
        };

        let feed = merge_feed(rows, 2, now);

        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].kind, ActivityKind::MedicalRecord);
        assert_eq!(feed[0].time_ago, "10 minutes ago");
        assert_eq!(feed[1].kind, ActivityKind::Patient);
        assert_eq!(feed[1].description, "Siti Rahma (MRN20250615001)");
    }
}
