use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::filters;
use shared_database::supabase::SupabaseClient;
use shared_models::response::{PageRequest, Pagination};
use shared_utils::export::{Sheet, MAX_EXPORT_ROWS};

use crate::models::{
    CreateMedicalRecordRequest, MedicalRecord, MedicalRecordError, MedicalRecordListQuery,
    UpdateMedicalRecordRequest, VitalSigns,
};
use crate::services::vitals;

const EXPORT_HEADERS: &[&str] = &[
    "Date",
    "Medical Record No",
    "Patient",
    "Diagnosis",
    "ICD Code",
    "Symptoms",
    "Treatment",
    "Prescription",
    "Blood Pressure",
    "Heart Rate",
    "Temperature",
    "Weight",
    "Height",
    "Notes",
];

#[derive(Debug, Deserialize)]
struct ExportPatient {
    medical_record_no: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ExportRow {
    #[serde(flatten)]
    record: MedicalRecord,
    patient: Option<ExportPatient>,
}

pub struct MedicalRecordService {
    supabase: SupabaseClient,
}

impl MedicalRecordService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_records(
        &self,
        query: MedicalRecordListQuery,
    ) -> Result<(Vec<MedicalRecord>, Pagination), MedicalRecordError> {
        let page = PageRequest::new(query.page, query.limit);

        let mut fragments = vec!["select=*".to_string()];
        if let Some(patient_id) = query.patient_id {
            fragments.push(filters::eq("patient_id", patient_id));
        }
        if let Some(doctor_id) = query.doctor_id {
            fragments.push(filters::eq("doctor_id", doctor_id));
        }
        fragments.push("order=created_at.desc".to_string());
        fragments.push(format!("limit={}", page.limit));
        fragments.push(format!("offset={}", page.offset()));

        let path = format!("/rest/v1/medical_records?{}", filters::join(fragments));
        let (records, total) = self.supabase.request_with_count(&path).await?;

        Ok((records, Pagination::new(page, total)))
    }

    pub async fn export_records(&self, query: MedicalRecordListQuery) -> Result<Sheet, MedicalRecordError> {
        let mut fragments = vec!["select=*,patient:patients(medical_record_no,name)".to_string()];
        if let Some(patient_id) = query.patient_id {
            fragments.push(filters::eq("patient_id", patient_id));
        }
        if let Some(doctor_id) = query.doctor_id {
            fragments.push(filters::eq("doctor_id", doctor_id));
        }
        fragments.push("order=created_at.asc".to_string());
        fragments.push(format!("limit={}", MAX_EXPORT_ROWS));

        let path = format!("/rest/v1/medical_records?{}", filters::join(fragments));
        let rows: Vec<ExportRow> = self.supabase.select(&path).await?;

        let mut sheet = Sheet::new("Medical Records", EXPORT_HEADERS);
        for ExportRow { record, patient } in rows {
            let (mrn, name) = patient
                .map(|p| (Some(p.medical_record_no), Some(p.name)))
                .unwrap_or((None, None));
            let vitals = record.vitals;

            sheet.push_row(vec![
                record.created_at.into(),
                mrn.into(),
                name.into(),
                record.diagnosis.into(),
                record.icd_code.into(),
                record.symptoms.into(),
                record.treatment.into(),
                record.prescription.into(),
                vitals.blood_pressure.into(),
                vitals.heart_rate.into(),
                vitals.temperature.into(),
                vitals.weight.into(),
                vitals.height.into(),
                record.notes.into(),
            ]);
        }

        Ok(sheet)
    }

    pub async fn get_record(&self, id: Uuid) -> Result<MedicalRecord, MedicalRecordError> {
        let path = format!("/rest/v1/medical_records?id=eq.{}", id);

        self.supabase
            .select_one(&path)
            .await?
            .ok_or(MedicalRecordError::NotFound)
    }

    #[instrument(skip(self, request), fields(patient_id = %request.patient_id))]
    pub async fn create_record(
        &self,
        request: CreateMedicalRecordRequest,
        author: Uuid,
    ) -> Result<MedicalRecord, MedicalRecordError> {
        if request.diagnosis.trim().is_empty() {
            return Err(MedicalRecordError::ValidationError("diagnosis is required".to_string()));
        }

        let vitals = VitalSigns {
            blood_pressure: request.blood_pressure,
            heart_rate: request.heart_rate,
            temperature: request.temperature,
            weight: request.weight,
            height: request.height,
        };
        vitals::validate(&vitals)?;

        let path = format!("/rest/v1/patients?select=id&id=eq.{}", request.patient_id);
        let patient: Option<Value> = self.supabase.select_one(&path).await?;
        if patient.is_none() {
            return Err(MedicalRecordError::PatientNotFound);
        }

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id.unwrap_or(author),
            "visit_id": request.visit_id,
            "diagnosis": request.diagnosis.trim(),
            "icd_code": request.icd_code,
            "symptoms": request.symptoms,
            "treatment": request.treatment,
            "prescription": request.prescription,
            "notes": request.notes,
            "blood_pressure": vitals.blood_pressure,
            "heart_rate": vitals.heart_rate,
            "temperature": vitals.temperature,
            "weight": vitals.weight,
            "height": vitals.height,
            "created_at": now,
            "updated_at": now
        });

        let record: MedicalRecord = self.supabase.insert("medical_records", row).await?;
        info!("Created medical record {} for patient {}", record.id, record.patient_id);

        Ok(record)
    }

    pub async fn update_record(
        &self,
        id: Uuid,
        request: UpdateMedicalRecordRequest,
    ) -> Result<MedicalRecord, MedicalRecordError> {
        vitals::validate(&VitalSigns {
            blood_pressure: request.blood_pressure.clone(),
            heart_rate: request.heart_rate,
            temperature: request.temperature,
            weight: request.weight,
            height: request.height,
        })?;

        if request.diagnosis.as_deref().is_some_and(|d| d.trim().is_empty()) {
            return Err(MedicalRecordError::ValidationError("diagnosis cannot be empty".to_string()));
        }

        let mut changes = Map::new();
        let text_fields = [
            ("diagnosis", request.diagnosis),
            ("icd_code", request.icd_code),
            ("symptoms", request.symptoms),
            ("treatment", request.treatment),
            ("prescription", request.prescription),
            ("notes", request.notes),
            ("blood_pressure", request.blood_pressure),
        ];
        for (column, value) in text_fields {
            if let Some(value) = value {
                changes.insert(column.to_string(), json!(value));
            }
        }
        if let Some(heart_rate) = request.heart_rate {
            changes.insert("heart_rate".to_string(), json!(heart_rate));
        }
        for (column, value) in [
            ("temperature", request.temperature),
            ("weight", request.weight),
            ("height", request.height),
        ] {
            if let Some(value) = value {
                changes.insert(column.to_string(), json!(value));
            }
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/medical_records?id=eq.{}", id);
        self.supabase
            .update(&path, Value::Object(changes))
            .await?
            .ok_or(MedicalRecordError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn delete_record(&self, id: Uuid) -> Result<(), MedicalRecordError> {
        let path = format!("/rest/v1/medical_records?id=eq.{}", id);

        if self.supabase.delete(&path).await? == 0 {
            return Err(MedicalRecordError::NotFound);
        }

        info!("Deleted medical record {}", id);
        Ok(())
    }
}
