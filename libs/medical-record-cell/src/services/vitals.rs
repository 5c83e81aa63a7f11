// Plausibility bounds for vital signs entered at the bedside.

use crate::models::{MedicalRecordError, VitalSigns};

const HEART_RATE_BPM: (u32, u32) = (20, 300);
const TEMPERATURE_C: (f64, f64) = (25.0, 45.0);
const WEIGHT_KG: (f64, f64) = (0.2, 500.0);
const HEIGHT_CM: (f64, f64) = (20.0, 280.0);
const PRESSURE_MMHG: (u32, u32) = (20, 300);

fn invalid(message: &str) -> MedicalRecordError {
    MedicalRecordError::ValidationError(message.to_string())
}

/// Parses `systolic/diastolic`.
pub fn parse_blood_pressure(value: &str) -> Option<(u32, u32)> {
    let (systolic, diastolic) = value.trim().split_once('/')?;
    let systolic = systolic.trim().parse::<u32>().ok()?;
    let diastolic = diastolic.trim().parse::<u32>().ok()?;

    let in_range = |v: u32| (PRESSURE_MMHG.0..=PRESSURE_MMHG.1).contains(&v);
    (in_range(systolic) && in_range(diastolic) && systolic > diastolic).then_some((systolic, diastolic))
}

pub fn validate(vitals: &VitalSigns) -> Result<(), MedicalRecordError> {
    if let Some(bp) = vitals.blood_pressure.as_deref().filter(|bp| !bp.trim().is_empty()) {
        if parse_blood_pressure(bp).is_none() {
            return Err(invalid("Blood pressure must look like 120/80"));
        }
    }

    if let Some(rate) = vitals.heart_rate {
        if !(HEART_RATE_BPM.0..=HEART_RATE_BPM.1).contains(&rate) {
            return Err(invalid("Heart rate is out of range"));
        }
    }

    let checks = [
        (vitals.temperature, TEMPERATURE_C, "Temperature is out of range"),
        (vitals.weight, WEIGHT_KG, "Weight is out of range"),
        (vitals.height, HEIGHT_CM, "Height is out of range"),
    ];

    for (value, (min, max), message) in checks {
        if let Some(v) = value {
            if !v.is_finite() || v < min || v > max {
                return Err(invalid(message));
            }
        }
    }

    Ok(())
}
