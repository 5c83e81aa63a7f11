use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use shared_config::AppConfig;
use shared_database::filters;
use shared_database::supabase::SupabaseClient;
use visit_cell::models::VisitStatus;

use crate::models::{
    Activity, ActivityQuery, DashboardError, DashboardStats, PaidRow, RecentBilling, RecentPatient,
    RecentRecord, RecentVisit, StatusRow, StockRow, VisitStatusCount, EXPIRY_WINDOW_DAYS,
    LOW_STOCK_THRESHOLD,
};
use crate::services::activity::{merge_feed, RecentRows};

/// Aggregates computed from the live tables on every request.
pub struct DashboardService {
    supabase: SupabaseClient,
    config: AppConfig,
}

impl DashboardService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            config: config.clone(),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_stats(&self) -> Result<DashboardStats, DashboardError> {
        let today = self.config.today();
        let created_today = filters::within_local_day(&self.config, "created_at", today);
        let expiring = format!(
            "stock=gt.0&expiry_date=gte.{}&expiry_date=lte.{}",
            today,
            today + Duration::days(EXPIRY_WINDOW_DAYS)
        );

        let visits_path = format!(
            "/rest/v1/visits?select=status&{}",
            filters::within_local_day(&self.config, "scheduled_at", today)
        );
        let paid_path = format!(
            "/rest/v1/billings?select=amount_paid&status=eq.PAID&{}",
            filters::within_local_day(&self.config, "paid_at", today)
        );

        let (
            total_patients,
            new_patients_today,
            visits_today,
            total_medicines,
            stock,
            expiring_batches,
            unpaid_billings,
            paid_today,
            active_users,
        ) = futures::try_join!(
            self.supabase.count("patients", ""),
            self.supabase.count("patients", &created_today),
            self.supabase.select::<StatusRow>(&visits_path),
            self.supabase.count("medicines", ""),
            self.supabase
                .select::<StockRow>("/rest/v1/medicines?select=id,medicine_batches(stock)"),
            self.supabase.count("medicine_batches", &expiring),
            self.supabase
                .count("billings", "status=in.(UNPAID,PARTIALLY_PAID)"),
            self.supabase.select::<PaidRow>(&paid_path),
            self.supabase.count("users", "is_active=eq.true"),
        )?;

        let visits_today_by_status = VisitStatus::ALL
            .iter()
            .map(|status| VisitStatusCount {
                status: *status,
                count: visits_today.iter().filter(|row| row.status == *status).count() as u64,
            })
            .collect();

        let low_stock_medicines = stock
            .iter()
            .filter(|medicine| {
                medicine.medicine_batches.iter().map(|b| b.stock).sum::<i64>() < LOW_STOCK_THRESHOLD
            })
            .count() as u64;

        let revenue_today = paid_today.iter().map(|row| row.amount_paid).sum::<f64>();

        Ok(DashboardStats {
            total_patients,
            new_patients_today,
            visits_today: visits_today.len() as u64,
            visits_today_by_status,
            total_medicines,
            low_stock_medicines,
            expiring_batches,
            unpaid_billings,
            revenue_today: (revenue_today * 100.0).round() / 100.0,
            active_users,
        })
    }

    #[instrument(skip(self))]
    pub async fn recent_activities(&self, query: ActivityQuery) -> Result<Vec<Activity>, DashboardError> {
        let limit = query.resolved_limit();

        let (patients, visits, records, billings) = futures::try_join!(
            self.recent::<RecentPatient>("patients", "id,name,medical_record_no,created_at", limit),
            self.recent::<RecentVisit>(
                "visits",
                "id,queue_number,status,created_at,patient:patients(name)",
                limit
            ),
            self.recent::<RecentRecord>(
                "medical_records",
                "id,diagnosis,created_at,patient:patients(name)",
                limit
            ),
            self.recent::<RecentBilling>(
                "billings",
                "id,invoice_no,total,status,created_at,patient:patients(name)",
                limit
            ),
        )?;

        debug!(
            "Activity sources: {} patients, {} visits, {} records, {} billings",
            patients.len(),
            visits.len(),
            records.len(),
            billings.len()
        );

        let rows = RecentRows {
            patients,
            visits,
            records,
            billings,
        };

        Ok(merge_feed(rows, limit as usize, Utc::now()))
    }

    async fn recent<T: DeserializeOwned>(
        &self,
        table: &str,
        columns: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<T>> {
        let path = format!(
            "/rest/v1/{}?select={}&order=created_at.desc&limit={}",
            table, columns, limit
        );
        self.supabase.select(&path).await
    }
}
