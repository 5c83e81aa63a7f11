use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::filters;
use shared_database::sequence::{DailySequence, VISIT_QUEUE_NUMBERS};
use shared_database::supabase::SupabaseClient;
use shared_models::auth::Role;
use shared_models::response::{PageRequest, Pagination};

use crate::models::{
    CreateVisitRequest, UpdateVisitRequest, Visit, VisitDependents, VisitError, VisitListQuery, VisitStatus,
};
use crate::services::lifecycle::VisitLifecycle;

const VISIT_SELECT: &str = "select=*,patient:patients(id,name,medical_record_no)";

pub struct VisitService {
    supabase: SupabaseClient,
    config: AppConfig,
}

impl VisitService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            config: config.clone(),
        }
    }

    pub async fn list_visits(&self, query: VisitListQuery) -> Result<(Vec<Visit>, Pagination), VisitError> {
        let page = PageRequest::new(query.page, query.limit);

        let mut fragments = vec![VISIT_SELECT.to_string()];
        if let Some(patient_id) = query.patient_id {
            fragments.push(filters::eq("patient_id", patient_id));
        }
        if let Some(doctor_id) = query.doctor_id {
            fragments.push(filters::eq("doctor_id", doctor_id));
        }
        if let Some(status) = query.status {
            fragments.push(filters::eq("status", status));
        }
        if let Some(date) = query.date {
            fragments.push(filters::within_local_day(&self.config, "scheduled_at", date));
        }
        fragments.push("order=scheduled_at.desc".to_string());
        fragments.push(format!("limit={}", page.limit));
        fragments.push(format!("offset={}", page.offset()));

        let path = format!("/rest/v1/visits?{}", filters::join(fragments));
        let (visits, total) = self.supabase.request_with_count::<Visit>(&path).await?;

        Ok((visits, Pagination::new(page, total)))
    }

    pub async fn get_visit(&self, id: Uuid) -> Result<Visit, VisitError> {
        let path = format!("/rest/v1/visits?{}&id=eq.{}", VISIT_SELECT, id);

        self.supabase
            .select_one(&path)
            .await?
            .ok_or(VisitError::NotFound)
    }

    async fn ensure_patient_exists(&self, patient_id: Uuid) -> Result<(), VisitError> {
        let path = format!("/rest/v1/patients?select=id&id=eq.{}", patient_id);
        let found: Option<Value> = self.supabase.select_one(&path).await?;

        found.map(|_| ()).ok_or(VisitError::PatientNotFound)
    }

    async fn ensure_active_doctor(&self, doctor_id: Uuid) -> Result<(), VisitError> {
        let path = format!(
            "/rest/v1/users?select=id&id=eq.{}&role=eq.{}&is_active=eq.true",
            doctor_id,
            Role::Doctor
        );
        let found: Option<Value> = self.supabase.select_one(&path).await?;

        found.map(|_| ()).ok_or(VisitError::DoctorNotFound)
    }

    #[instrument(skip(self, request), fields(patient_id = %request.patient_id))]
    pub async fn create_visit(&self, request: CreateVisitRequest) -> Result<Visit, VisitError> {
        futures::try_join!(
            self.ensure_patient_exists(request.patient_id),
            self.ensure_active_doctor(request.doctor_id),
        )?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "visit_type": request.visit_type,
            "scheduled_at": request.scheduled_at.to_rfc3339(),
            "status": VisitStatus::Scheduled,
            "chief_complaint": request.chief_complaint,
            "notes": request.notes,
            "created_at": now,
            "updated_at": now
        });

        let sequence = DailySequence::new(&self.supabase, VISIT_QUEUE_NUMBERS);
        let supabase = &self.supabase;
        let day = self.config.local_date(request.scheduled_at);

        let visit: Visit = sequence
            .allocate(day, None, |queue_number| {
                let mut row = row.clone();
                row["queue_number"] = json!(queue_number);
                async move { supabase.insert("visits", row).await }
            })
            .await?;

        info!("Scheduled visit {} with queue number {}", visit.id, visit.queue_number);
        Ok(visit)
    }

    /// Applies a partial update. A visit moved to another local day gets the
    /// next queue number of that day; a time change within the day keeps it.
    #[instrument(skip(self, request))]
    pub async fn update_visit(&self, id: Uuid, request: UpdateVisitRequest) -> Result<Visit, VisitError> {
        let current = self.get_visit(id).await?;

        if let Some(status) = request.status {
            VisitLifecycle::validate_transition(current.status, status)?;
        }
        if let Some(doctor_id) = request.doctor_id.filter(|d| *d != current.doctor_id) {
            self.ensure_active_doctor(doctor_id).await?;
        }

        let mut changes = Map::new();
        if let Some(doctor_id) = request.doctor_id {
            changes.insert("doctor_id".to_string(), json!(doctor_id));
        }
        if let Some(visit_type) = request.visit_type {
            changes.insert("visit_type".to_string(), json!(visit_type));
        }
        if let Some(status) = request.status {
            changes.insert("status".to_string(), json!(status));
        }
        if let Some(chief_complaint) = request.chief_complaint {
            changes.insert("chief_complaint".to_string(), json!(chief_complaint));
        }
        if let Some(notes) = request.notes {
            changes.insert("notes".to_string(), json!(notes));
        }
        if let Some(scheduled_at) = request.scheduled_at {
            changes.insert("scheduled_at".to_string(), json!(scheduled_at.to_rfc3339()));
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/visits?id=eq.{}", id);

        let updated: Option<Visit> = match request.scheduled_at {
            Some(scheduled_at) if self.moves_to_another_day(current.scheduled_at, scheduled_at) => {
                let day = self.config.local_date(scheduled_at);
                debug!("Visit {} moves to {}, renumbering", id, day);

                let sequence = DailySequence::new(&self.supabase, VISIT_QUEUE_NUMBERS);
                let supabase = &self.supabase;
                let path = path.as_str();

                sequence
                    .allocate(day, Some(id), |queue_number| {
                        let mut changes = changes.clone();
                        changes.insert("queue_number".to_string(), json!(queue_number));
                        async move { supabase.update(path, Value::Object(changes)).await }
                    })
                    .await?
            }
            _ => self.supabase.update(&path, Value::Object(changes)).await?,
        };

        updated.ok_or(VisitError::NotFound)
    }

    fn moves_to_another_day(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.config.local_date(from) != self.config.local_date(to)
    }

    pub async fn dependents(&self, id: Uuid) -> Result<VisitDependents, VisitError> {
        let filter = filters::eq("visit_id", id);

        let (medical_records, billings) = futures::try_join!(
            self.supabase.count("medical_records", &filter),
            self.supabase.count("billings", &filter),
        )?;

        Ok(VisitDependents {
            medical_records,
            billings,
        })
    }

    /// Visits referenced by records or invoices are kept; the foreign keys
    /// reject a delete that races past this check.
    #[instrument(skip(self))]
    pub async fn delete_visit(&self, id: Uuid) -> Result<(), VisitError> {
        self.get_visit(id).await?;

        let dependents = self.dependents(id).await?;
        if !dependents.is_empty() {
            return Err(VisitError::HasDependents(dependents));
        }

        let path = format!("/rest/v1/visits?id=eq.{}", id);

        if self.supabase.delete(&path).await? == 0 {
            return Err(VisitError::NotFound);
        }

        info!("Deleted visit {}", id);
        Ok(())
    }
}
