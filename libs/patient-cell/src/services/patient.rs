use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use security_cell::ValidationService;
use shared_config::AppConfig;
use shared_database::filters;
use shared_database::sequence::{DailySequence, MEDICAL_RECORD_NUMBERS};
use shared_database::supabase::SupabaseClient;
use shared_models::response::{PageRequest, Pagination};
use shared_utils::export::{Sheet, MAX_EXPORT_ROWS};

use crate::models::{
    CreatePatientRequest, Patient, PatientDependents, PatientError, PatientListQuery,
    UpdatePatientRequest,
};

/// Columns matched by free-text patient lookup.
const SEARCH_COLUMNS: &[&str] = &["name", "medical_record_no", "phone"];

const EXPORT_HEADERS: &[&str] = &[
    "Medical Record No",
    "Name",
    "Date of Birth",
    "Gender",
    "Phone",
    "Email",
    "Address",
    "Blood Type",
    "Allergies",
    "Registered At",
];
pub const QUICK_SEARCH_LIMIT: u32 = 20;

pub struct PatientService {
    supabase: SupabaseClient,
    config: AppConfig,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            config: config.clone(),
        }
    }

    pub async fn list_patients(
        &self,
        query: PatientListQuery,
    ) -> Result<(Vec<Patient>, Pagination), PatientError> {
        let page = PageRequest::new(query.page, query.limit);

        let search = query
            .search
            .as_deref()
            .and_then(|term| filters::ilike_any(SEARCH_COLUMNS, term))
            .unwrap_or_default();

        let path = format!(
            "/rest/v1/patients?{}",
            filters::join(vec![
                "select=*".to_string(),
                search,
                "order=created_at.desc".to_string(),
                format!("limit={}", page.limit),
                format!("offset={}", page.offset()),
            ])
        );

        let (patients, total) = self.supabase.request_with_count::<Patient>(&path).await?;
        debug!("Listed {} of {} patients", patients.len(), total);

        Ok((patients, Pagination::new(page, total)))
    }

    /// Every patient matching the list filters, oldest registration first.
    pub async fn export_patients(&self, query: PatientListQuery) -> Result<Sheet, PatientError> {
        let search = query
            .search
            .as_deref()
            .and_then(|term| filters::ilike_any(SEARCH_COLUMNS, term))
            .unwrap_or_default();

        let path = format!(
            "/rest/v1/patients?{}",
            filters::join(vec![
                "select=*".to_string(),
                search,
                "order=medical_record_no.asc".to_string(),
                format!("limit={}", MAX_EXPORT_ROWS),
            ])
        );

        let patients: Vec<Patient> = self.supabase.select(&path).await?;
        Ok(patient_sheet(patients))
    }

    pub async fn get_patient(&self, id: Uuid) -> Result<Patient, PatientError> {
        let path = format!("/rest/v1/patients?id=eq.{}", id);

        self.supabase
            .select_one(&path)
            .await?
            .ok_or(PatientError::NotFound)
    }

    /// Quick lookup by name, MRN or phone for pickers.
    pub async fn search_patients(&self, term: &str) -> Result<Vec<Patient>, PatientError> {
        let Some(filter) = filters::ilike_any(SEARCH_COLUMNS, term) else {
            return Ok(Vec::new());
        };

        let path = format!(
            "/rest/v1/patients?select=*&{}&order=name.asc&limit={}",
            filter, QUICK_SEARCH_LIMIT
        );

        Ok(self.supabase.select(&path).await?)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_patient(&self, request: CreatePatientRequest) -> Result<Patient, PatientError> {
        validate_create(&request, &self.config)?;

        let now = Utc::now();
        let row = json!({
            "name": request.name.trim(),
            "date_of_birth": request.date_of_birth,
            "gender": request.gender,
            "phone": request.phone.trim(),
            "address": request.address.trim(),
            "email": request.email,
            "blood_type": request.blood_type,
            "allergies": request.allergies,
            "emergency_contact": request.emergency_contact,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let sequence = DailySequence::new(&self.supabase, MEDICAL_RECORD_NUMBERS);
        let supabase = &self.supabase;

        let patient: Patient = sequence
            .allocate(self.config.local_date(now), None, |mrn| {
                let mut row = row.clone();
                row["medical_record_no"] = json!(mrn);
                async move { supabase.insert("patients", row).await }
            })
            .await?;

        info!("Registered patient {} as {}", patient.id, patient.medical_record_no);
        Ok(patient)
    }

    pub async fn update_patient(
        &self,
        id: Uuid,
        request: UpdatePatientRequest,
    ) -> Result<Patient, PatientError> {
        let mut changes = update_changes(request, &self.config)?;
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?id=eq.{}", id);
        self.supabase
            .update(&path, Value::Object(changes))
            .await?
            .ok_or(PatientError::NotFound)
    }

    pub async fn dependents(&self, id: Uuid) -> Result<PatientDependents, PatientError> {
        let filter = format!("patient_id=eq.{}", id);

        let (visits, medical_records, billings) = futures::try_join!(
            self.supabase.count("visits", &filter),
            self.supabase.count("medical_records", &filter),
            self.supabase.count("billings", &filter),
        )?;

        Ok(PatientDependents {
            visits,
            medical_records,
            billings,
        })
    }

    #[instrument(skip(self))]
    pub async fn delete_patient(&self, id: Uuid) -> Result<(), PatientError> {
        self.get_patient(id).await?;

        let dependents = self.dependents(id).await?;
        if !dependents.is_empty() {
            return Err(PatientError::HasDependents(dependents));
        }

        let path = format!("/rest/v1/patients?id=eq.{}", id);
        if self.supabase.delete(&path).await? == 0 {
            return Err(PatientError::NotFound);
        }

        info!("Deleted patient {}", id);
        Ok(())
    }
}

fn patient_sheet(patients: Vec<Patient>) -> Sheet {
    let mut sheet = Sheet::new("Patients", EXPORT_HEADERS);

    for p in patients {
        sheet.push_row(vec![
            p.medical_record_no.into(),
            p.name.into(),
            p.date_of_birth.into(),
            p.gender.as_str().into(),
            p.phone.into(),
            p.email.into(),
            p.address.into(),
            p.blood_type.into(),
            p.allergies.into(),
            p.created_at.into(),
        ]);
    }

    sheet
}

fn validate_contact(
    phone: Option<&str>,
    email: Option<&str>,
) -> Result<(), PatientError> {
    if let Some(phone) = phone {
        if !ValidationService::validate_phone(phone) {
            return Err(PatientError::ValidationError("Invalid phone number".to_string()));
        }
    }

    if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
        if !ValidationService::validate_email(email.trim()) {
            return Err(PatientError::ValidationError("Invalid email format".to_string()));
        }
    }

    Ok(())
}

fn validate_create(request: &CreatePatientRequest, config: &AppConfig) -> Result<(), PatientError> {
    ValidationService::require(&[
        ("name", request.name.as_str()),
        ("phone", request.phone.as_str()),
        ("address", request.address.as_str()),
    ])
    .map_err(PatientError::ValidationError)?;

    if request.date_of_birth > config.today() {
        return Err(PatientError::ValidationError(
            "Date of birth cannot be in the future".to_string(),
        ));
    }

    validate_contact(Some(&request.phone), request.email.as_deref())
}

fn update_changes(
    request: UpdatePatientRequest,
    config: &AppConfig,
) -> Result<Map<String, Value>, PatientError> {
    validate_contact(request.phone.as_deref(), request.email.as_deref())?;

    let mut changes = Map::new();

    if let Some(name) = request.name {
        if name.trim().is_empty() {
            return Err(PatientError::ValidationError("name cannot be empty".to_string()));
        }
        changes.insert("name".to_string(), json!(name.trim()));
    }
    if let Some(date_of_birth) = request.date_of_birth {
        if date_of_birth > config.today() {
            return Err(PatientError::ValidationError(
                "Date of birth cannot be in the future".to_string(),
            ));
        }
        changes.insert("date_of_birth".to_string(), json!(date_of_birth));
    }
    if let Some(gender) = request.gender {
        changes.insert("gender".to_string(), json!(gender));
    }
    if let Some(phone) = request.phone {
        changes.insert("phone".to_string(), json!(phone.trim()));
    }
    if let Some(address) = request.address {
        changes.insert("address".to_string(), json!(address));
    }
    if let Some(email) = request.email {
        changes.insert("email".to_string(), json!(email));
    }
    if let Some(blood_type) = request.blood_type {
        changes.insert("blood_type".to_string(), json!(blood_type));
    }
    if let Some(allergies) = request.allergies {
        changes.insert("allergies".to_string(), json!(allergies));
    }
    if let Some(emergency_contact) = request.emergency_contact {
        changes.insert("emergency_contact".to_string(), json!(emergency_contact));
    }

    Ok(changes)
}
