use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::filters;
use shared_database::sequence::{DailySequence, INVOICE_NUMBERS};
use shared_database::supabase::SupabaseClient;
use shared_models::response::{PageRequest, Pagination};
use shared_utils::export::{Sheet, MAX_EXPORT_ROWS};

use crate::models::{
    Billing, BillingAmounts, BillingError, BillingItem, BillingItemInput, BillingListQuery,
    BillingStats, BillingStatus, CreateBillingRequest, PaymentRequest, StatusCount,
    UpdateBillingRequest,
};
use crate::services::calculator::{round_money, BillingCalculator};

const BILLING_SELECT: &str = "select=*,patient:patients(id,name,medical_record_no)";

const EXPORT_HEADERS: &[&str] = &[
    "Invoice No",
    "Date",
    "Medical Record No",
    "Patient",
    "Items",
    "Subtotal",
    "Tax",
    "Discount",
    "Total",
    "Amount Paid",
    "Status",
    "Payment Method",
    "Paid At",
];

pub struct BillingService {
    supabase: SupabaseClient,
    config: AppConfig,
}

impl BillingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            config: config.clone(),
        }
    }

    fn calculator(&self) -> BillingCalculator {
        BillingCalculator::new(self.config.default_tax_rate)
    }

    pub async fn list_billings(
        &self,
        query: BillingListQuery,
    ) -> Result<(Vec<Billing>, Pagination), BillingError> {
        let page = PageRequest::new(query.page, query.limit);

        let mut fragments = vec![BILLING_SELECT.to_string()];
        if let Some(patient_id) = query.patient_id {
            fragments.push(filters::eq("patient_id", patient_id));
        }
        if let Some(status) = query.status {
            fragments.push(filters::eq("status", status));
        }
        fragments.push("order=created_at.desc".to_string());
        fragments.push(format!("limit={}", page.limit));
        fragments.push(format!("offset={}", page.offset()));

        let path = format!("/rest/v1/billings?{}", filters::join(fragments));
        let (billings, total) = self.supabase.request_with_count::<Billing>(&path).await?;

        Ok((billings, Pagination::new(page, total)))
    }

    pub async fn export_billings(&self, query: BillingListQuery) -> Result<Sheet, BillingError> {
        let mut fragments = vec![BILLING_SELECT.to_string()];
        if let Some(patient_id) = query.patient_id {
            fragments.push(filters::eq("patient_id", patient_id));
        }
        if let Some(status) = query.status {
            fragments.push(filters::eq("status", status));
        }
        fragments.push("order=invoice_no.asc".to_string());
        fragments.push(format!("limit={}", MAX_EXPORT_ROWS));

        let path = format!("/rest/v1/billings?{}", filters::join(fragments));
        let billings: Vec<Billing> = self.supabase.select(&path).await?;

        Ok(billing_sheet(billings))
    }

    pub async fn get_billing(&self, id: Uuid) -> Result<Billing, BillingError> {
        let path = format!("/rest/v1/billings?{}&id=eq.{}", BILLING_SELECT, id);

        self.supabase
            .select_one(&path)
            .await?
            .ok_or(BillingError::NotFound)
    }

    #[instrument(skip(self, request), fields(patient_id = %request.patient_id))]
    pub async fn create_billing(&self, request: CreateBillingRequest) -> Result<Billing, BillingError> {
        let totals = self
            .calculator()
            .calculate(&request.items, request.tax, request.discount)?;

        let path = format!("/rest/v1/patients?select=id&id=eq.{}", request.patient_id);
        let patient: Option<Value> = self.supabase.select_one(&path).await?;
        if patient.is_none() {
            return Err(BillingError::PatientNotFound);
        }

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "patient_id": request.patient_id,
            "visit_id": request.visit_id,
            "items": items_row(&totals.items),
            "subtotal": totals.subtotal,
            "tax": totals.tax,
            "discount": totals.discount,
            "total": totals.total,
            "amount_paid": 0.0,
            "status": BillingStatus::Unpaid,
            "payment_method": request.payment_method,
            "paid_at": null,
            "notes": request.notes,
            "created_at": now,
            "updated_at": now
        });

        let sequence = DailySequence::new(&self.supabase, INVOICE_NUMBERS);
        let supabase = &self.supabase;

        let billing: Billing = sequence
            .allocate(self.config.today(), None, |invoice_no| {
                let mut row = row.clone();
                row["invoice_no"] = json!(invoice_no);
                async move { supabase.insert("billings", row).await }
            })
            .await?;

        info!("Created billing {} ({}) total {}", billing.id, billing.invoice_no, billing.total);
        Ok(billing)
    }

    /// Partial update. Totals are recomputed when items, tax or discount
    /// change; status moves only to CANCELLED here, payments drive the rest.
    #[instrument(skip(self, request))]
    pub async fn update_billing(&self, id: Uuid, request: UpdateBillingRequest) -> Result<Billing, BillingError> {
        let current = self.get_billing(id).await?;

        if current.status == BillingStatus::Paid {
            return Err(BillingError::AlreadyPaid);
        }
        if let Some(status) = request.status {
            if status != current.status && status != BillingStatus::Cancelled {
                return Err(BillingError::ValidationError(format!(
                    "Billing status cannot be set to {} directly; record a payment instead",
                    status
                )));
            }
        }

        let mut changes = Map::new();

        if request.items.is_some() || request.tax.is_some() || request.discount.is_some() {
            let items = match &request.items {
                Some(items) => items.clone(),
                None => current.items.iter().map(as_input).collect(),
            };
            // New items without an explicit tax are taxed at the configured rate.
            let tax = request
                .tax
                .or(if request.items.is_some() { None } else { Some(current.tax) });
            let discount = request.discount.or(Some(current.discount));

            let totals = self.calculator().calculate(&items, tax, discount)?;

            changes.insert("items".to_string(), items_row(&totals.items));
            changes.insert("subtotal".to_string(), json!(totals.subtotal));
            changes.insert("tax".to_string(), json!(totals.tax));
            changes.insert("discount".to_string(), json!(totals.discount));
            changes.insert("total".to_string(), json!(totals.total));

            let cancelling = request.status == Some(BillingStatus::Cancelled);
            if current.status != BillingStatus::Cancelled && !cancelling && current.amount_paid > 0.0 {
                let status = BillingCalculator::payment_status(current.amount_paid, totals.total);
                changes.insert("status".to_string(), json!(status));
                if status == BillingStatus::Paid {
                    changes.insert("paid_at".to_string(), json!(Utc::now().to_rfc3339()));
                }
            }
        }

        if let Some(status) = request.status {
            changes.insert("status".to_string(), json!(status));
        }
        if let Some(payment_method) = request.payment_method {
            changes.insert("payment_method".to_string(), json!(payment_method));
        }
        if let Some(notes) = request.notes {
            changes.insert("notes".to_string(), json!(notes));
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.write_changes(id, changes).await
    }

    #[instrument(skip(self))]
    pub async fn delete_billing(&self, id: Uuid) -> Result<(), BillingError> {
        let current = self.get_billing(id).await?;
        if current.status == BillingStatus::Paid {
            return Err(BillingError::AlreadyPaid);
        }

        let path = format!("/rest/v1/billings?id=eq.{}", id);
        if self.supabase.delete(&path).await? == 0 {
            return Err(BillingError::NotFound);
        }

        info!("Deleted billing {} ({})", id, current.invoice_no);
        Ok(())
    }

    /// Records the cumulative amount received and derives the status.
    #[instrument(skip(self, request))]
    pub async fn record_payment(&self, id: Uuid, request: PaymentRequest) -> Result<Billing, BillingError> {
        if !request.amount_paid.is_finite() || request.amount_paid < 0.0 {
            return Err(BillingError::ValidationError(
                "amountPaid cannot be negative".to_string(),
            ));
        }

        let current = self.get_billing(id).await?;
        match current.status {
            BillingStatus::Paid => return Err(BillingError::AlreadyPaid),
            BillingStatus::Cancelled => return Err(BillingError::Cancelled),
            _ => {}
        }

        let amount_paid = round_money(request.amount_paid);
        let status = BillingCalculator::payment_status(amount_paid, current.total);
        let paid_at = (status == BillingStatus::Paid).then(|| Utc::now().to_rfc3339());

        if amount_paid > current.total {
            warn!("Billing {} overpaid: {} received for {}", id, amount_paid, current.total);
        }

        let mut changes = Map::new();
        changes.insert("amount_paid".to_string(), json!(amount_paid));
        changes.insert("status".to_string(), json!(status));
        changes.insert("paid_at".to_string(), json!(paid_at));
        if let Some(payment_method) = request.payment_method {
            changes.insert("payment_method".to_string(), json!(payment_method));
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let billing = self.write_changes(id, changes).await?;
        info!("Billing {} is now {} ({} of {})", id, billing.status, amount_paid, billing.total);
        Ok(billing)
    }

    pub async fn get_stats(&self) -> Result<BillingStats, BillingError> {
        let rows: Vec<BillingAmounts> = self
            .supabase
            .select("/rest/v1/billings?select=status,total,amount_paid")
            .await?;

        Ok(summarize(&rows))
    }

    async fn write_changes(&self, id: Uuid, changes: Map<String, Value>) -> Result<Billing, BillingError> {
        let path = format!("/rest/v1/billings?id=eq.{}", id);
        let updated: Option<Value> = self.supabase.update(&path, Value::Object(changes)).await?;
        if updated.is_none() {
            return Err(BillingError::NotFound);
        }

        self.get_billing(id).await
    }
}

fn as_input(item: &BillingItem) -> BillingItemInput {
    BillingItemInput {
        description: item.description.clone(),
        quantity: item.quantity,
        unit_price: item.unit_price,
    }
}

/// Items in their stored (snake_case) shape.
fn items_row(items: &[BillingItem]) -> Value {
    Value::Array(
        items
            .iter()
            .map(|item| {
                json!({
                    "description": item.description,
                    "quantity": item.quantity,
                    "unit_price": item.unit_price,
                    "amount": item.amount
                })
            })
            .collect(),
    )
}

fn summarize(rows: &[BillingAmounts]) -> BillingStats {
    let by_status = BillingStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: status.to_string(),
            count: rows.iter().filter(|row| row.status == *status).count() as u64,
        })
        .collect();

    let billed = rows.iter().filter(|row| row.status != BillingStatus::Cancelled);

    BillingStats {
        total_billings: rows.len() as u64,
        by_status,
        total_billed: round_money(billed.clone().map(|row| row.total).sum()),
        total_collected: round_money(billed.map(|row| row.amount_paid).sum()),
        outstanding: round_money(
            rows.iter()
                .filter(|row| row.status.is_outstanding())
                .map(|row| (row.total - row.amount_paid).max(0.0))
                .sum(),
        ),
    }
}

fn billing_sheet(billings: Vec<Billing>) -> Sheet {
    let mut sheet = Sheet::new("Billings", EXPORT_HEADERS);

    for b in billings {
        let (mrn, name) = b
            .patient
            .map(|p| (Some(p.medical_record_no), Some(p.name)))
            .unwrap_or((None, None));
        let items = b
            .items
            .iter()
            .map(|item| format!("{} x{}", item.description, item.quantity))
            .collect::<Vec<_>>()
            .join("; ");

        sheet.push_row(vec![
            b.invoice_no.into(),
            b.created_at.into(),
            mrn.into(),
            name.into(),
            items.into(),
            b.subtotal.into(),
            b.tax.into(),
            b.discount.into(),
            b.total.into(),
            b.amount_paid.into(),
            b.status.as_str().into(),
            b.payment_method.into(),
            b.paid_at.into(),
        ]);
    }

    sheet
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amounts(status: BillingStatus, total: f64, amount_paid: f64) -> BillingAmounts {
        BillingAmounts {
            status,
            total,
            amount_paid,
        }
    }

    #[test]
    fn test_summarize_billings() {
        let rows = vec![
            amounts(BillingStatus::Paid, 2550.0, 2550.0),
            amounts(BillingStatus::PartiallyPaid, 1000.0, 400.0),
            amounts(BillingStatus::Unpaid, 300.0, 0.0),
            amounts(BillingStatus::Cancelled, 800.0, 0.0),
        ];

        let stats = summarize(&rows);

        assert_eq!(stats.total_billings, 4);
        assert_eq!(stats.total_billed, 3850.0);
        assert_eq!(stats.total_collected, 2950.0);
        assert_eq!(stats.outstanding, 900.0);
        assert_eq!(
            stats.by_status,
            vec![
                StatusCount { status: "UNPAID".into(), count: 1 },
                StatusCount { status: "PARTIALLY_PAID".into(), count: 1 },
                StatusCount { status: "PAID".into(), count: 1 },
                StatusCount { status: "CANCELLED".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_summarize_empty() {
        let stats = summarize(&[]);
        assert_eq!(stats.total_billings, 0);
        assert_eq!(stats.outstanding, 0.0);
        assert!(stats.by_status.iter().all(|s| s.count == 0));
    }

    #[test]
    fn test_stored_items_are_snake_case() {
        let row = items_row(&[BillingItem {
            description: "Consultation".into(),
            quantity: 2,
            unit_price: 1000.0,
            amount: 2000.0,
        }]);

        assert_eq!(row[0]["unit_price"], 1000.0);
        assert!(row[0].get("unitPrice").is_none());
    }
}
