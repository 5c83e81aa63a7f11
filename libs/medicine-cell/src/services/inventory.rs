use std::collections::HashSet;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{error, info, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::filters;
use shared_database::supabase::{is_unique_violation, SupabaseClient};
use shared_models::response::{PageRequest, Pagination};

use crate::models::{
    CreateMedicineRequest, Medicine, MedicineBatch, MedicineError, MedicineListQuery, NewBatch,
    UpdateBatchRequest, UpdateMedicineRequest,
};

const MEDICINE_SELECT: &str = "select=*,medicine_batches(*)";
const SEARCH_COLUMNS: &[&str] = &["name", "generic_name", "category"];

pub struct MedicineService {
    supabase: SupabaseClient,
}

impl MedicineService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_medicines(
        &self,
        query: MedicineListQuery,
    ) -> Result<(Vec<Medicine>, Pagination), MedicineError> {
        let page = PageRequest::new(query.page, query.limit);

        let search = query
            .search
            .as_deref()
            .and_then(|term| filters::ilike_any(SEARCH_COLUMNS, term))
            .unwrap_or_default();

        let path = format!(
            "/rest/v1/medicines?{}",
            filters::join(vec![
                MEDICINE_SELECT.to_string(),
                search,
                "order=name.asc".to_string(),
                format!("limit={}", page.limit),
                format!("offset={}", page.offset()),
            ])
        );

        let (medicines, total) = self.supabase.request_with_count::<Medicine>(&path).await?;
        let medicines = medicines.into_iter().map(Medicine::with_stock_summary).collect();

        Ok((medicines, Pagination::new(page, total)))
    }

    pub async fn get_medicine(&self, id: Uuid) -> Result<Medicine, MedicineError> {
        let path = format!("/rest/v1/medicines?{}&id=eq.{}", MEDICINE_SELECT, id);

        self.supabase
            .select_one::<Medicine>(&path)
            .await?
            .map(Medicine::with_stock_summary)
            .ok_or(MedicineError::NotFound)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_medicine(&self, request: CreateMedicineRequest) -> Result<Medicine, MedicineError> {
        validate_medicine_fields(Some(&request.name), Some(&request.unit), Some(request.price))?;
        validate_new_batches(&request.batches)?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "name": request.name.trim(),
            "generic_name": request.generic_name,
            "category": request.category,
            "unit": request.unit.trim(),
            "price": request.price,
            "description": request.description,
            "created_at": now,
            "updated_at": now
        });

        let mut medicine: Medicine = self.supabase.insert("medicines", row).await?;

        let rows = request
            .batches
            .iter()
            .map(|batch| batch_row(medicine.id, batch))
            .collect::<Vec<_>>();

        match self.supabase.insert_many::<MedicineBatch>("medicine_batches", rows).await {
            Ok(batches) => medicine.batches = batches,
            Err(e) => {
                // Batches cascade with the medicine, so one delete undoes the insert.
                error!("Initial batches for {} failed, removing medicine: {}", medicine.id, e);
                let path = format!("/rest/v1/medicines?id=eq.{}", medicine.id);
                if let Err(cleanup) = self.supabase.delete(&path).await {
                    error!("Could not remove medicine {}: {}", medicine.id, cleanup);
                }
                return Err(MedicineError::DatabaseError(e));
            }
        }

        info!("Created medicine {} with {} batch(es)", medicine.id, medicine.batches.len());
        Ok(medicine.with_stock_summary())
    }

    pub async fn update_medicine(
        &self,
        id: Uuid,
        request: UpdateMedicineRequest,
    ) -> Result<Medicine, MedicineError> {
        validate_medicine_fields(request.name.as_deref(), request.unit.as_deref(), request.price)?;

        let mut changes = Map::new();
        if let Some(name) = request.name {
            changes.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(generic_name) = request.generic_name {
            changes.insert("generic_name".to_string(), json!(generic_name));
        }
        if let Some(category) = request.category {
            changes.insert("category".to_string(), json!(category));
        }
        if let Some(unit) = request.unit {
            changes.insert("unit".to_string(), json!(unit.trim()));
        }
        if let Some(price) = request.price {
            changes.insert("price".to_string(), json!(price));
        }
        if let Some(description) = request.description {
            changes.insert("description".to_string(), json!(description));
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/medicines?id=eq.{}", id);
        let updated: Option<Value> = self.supabase.update(&path, Value::Object(changes)).await?;
        if updated.is_none() {
            return Err(MedicineError::NotFound);
        }

        self.get_medicine(id).await
    }

    /// One statement; the foreign key cascades to the batches.
    #[instrument(skip(self))]
    pub async fn delete_medicine(&self, id: Uuid) -> Result<(), MedicineError> {
        let path = format!("/rest/v1/medicines?id=eq.{}", id);

        if self.supabase.delete(&path).await? == 0 {
            return Err(MedicineError::NotFound);
        }

        info!("Deleted medicine {} and its batches", id);
        Ok(())
    }

    #[instrument(skip(self, batch), fields(batch_no = %batch.batch_no))]
    pub async fn add_batch(&self, medicine_id: Uuid, batch: NewBatch) -> Result<MedicineBatch, MedicineError> {
        validate_new_batches(std::slice::from_ref(&batch))?;

        let path = format!("/rest/v1/medicines?select=id&id=eq.{}", medicine_id);
        let exists: Option<Value> = self.supabase.select_one(&path).await?;
        if exists.is_none() {
            return Err(MedicineError::NotFound);
        }

        let batch_no = batch.batch_no.trim().to_string();
        self.supabase
            .insert("medicine_batches", batch_row(medicine_id, &batch))
            .await
            .map_err(|e| duplicate_batch_or(e, &batch_no))
    }

    pub async fn update_batch(
        &self,
        medicine_id: Uuid,
        batch_id: Uuid,
        request: UpdateBatchRequest,
    ) -> Result<MedicineBatch, MedicineError> {
        let mut changes = Map::new();

        if let Some(batch_no) = request.batch_no.as_deref() {
            if batch_no.trim().is_empty() {
                return Err(MedicineError::ValidationError("batchNo cannot be empty".to_string()));
            }
            changes.insert("batch_no".to_string(), json!(batch_no.trim()));
        }
        if let Some(stock) = request.stock {
            validate_stock(stock)?;
            changes.insert("stock".to_string(), json!(stock));
        }
        if let Some(expiry_date) = request.expiry_date {
            changes.insert("expiry_date".to_string(), json!(expiry_date));
        }
        if changes.is_empty() {
            return Err(MedicineError::ValidationError("No batch fields to update".to_string()));
        }

        let path = format!(
            "/rest/v1/medicine_batches?id=eq.{}&medicine_id=eq.{}",
            batch_id, medicine_id
        );
        let batch_no = request.batch_no.unwrap_or_default();

        self.supabase
            .update(&path, Value::Object(changes))
            .await
            .map_err(|e| duplicate_batch_or(e, batch_no.trim()))?
            .ok_or(MedicineError::BatchNotFound)
    }

    pub async fn delete_batch(&self, medicine_id: Uuid, batch_id: Uuid) -> Result<(), MedicineError> {
        let path = format!(
            "/rest/v1/medicine_batches?id=eq.{}&medicine_id=eq.{}",
            batch_id, medicine_id
        );

        if self.supabase.delete(&path).await? == 0 {
            return Err(MedicineError::BatchNotFound);
        }

        info!("Deleted batch {} of medicine {}", batch_id, medicine_id);
        Ok(())
    }
}

fn batch_row(medicine_id: Uuid, batch: &NewBatch) -> Value {
    json!({
        "medicine_id": medicine_id,
        "batch_no": batch.batch_no.trim(),
        "stock": batch.stock,
        "expiry_date": batch.expiry_date,
        "created_at": Utc::now().to_rfc3339()
    })
}

fn duplicate_batch_or(err: anyhow::Error, batch_no: &str) -> MedicineError {
    if is_unique_violation(&err) {
        MedicineError::DuplicateBatch(batch_no.to_string())
    } else {
        MedicineError::DatabaseError(err)
    }
}

fn validate_stock(stock: i64) -> Result<(), MedicineError> {
    if stock < 0 {
        return Err(MedicineError::ValidationError("Stock cannot be negative".to_string()));
    }
    Ok(())
}

fn validate_medicine_fields(
    name: Option<&str>,
    unit: Option<&str>,
    price: Option<f64>,
) -> Result<(), MedicineError> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(MedicineError::ValidationError("name is required".to_string()));
    }
    if unit.is_some_and(|u| u.trim().is_empty()) {
        return Err(MedicineError::ValidationError("unit is required".to_string()));
    }
    if price.is_some_and(|p| !p.is_finite() || p < 0.0) {
        return Err(MedicineError::ValidationError("Price cannot be negative".to_string()));
    }
    Ok(())
}

fn validate_new_batches(batches: &[NewBatch]) -> Result<(), MedicineError> {
    let mut seen = HashSet::new();

    for batch in batches {
        let batch_no = batch.batch_no.trim();
        if batch_no.is_empty() {
            return Err(MedicineError::ValidationError("batchNo is required".to_string()));
        }
        validate_stock(batch.stock)?;
        if !seen.insert(batch_no.to_string()) {
            return Err(MedicineError::DuplicateBatch(batch_no.to_string()));
        }
    }

    Ok(())
}
