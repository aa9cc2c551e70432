use std::collections::HashSet;
use std::ops::RangeInclusive;

use appointment_cell::DynamicField;

use crate::models::{ClinicalRecordError, CreateClinicalRecordRequest, UpdateClinicalRecordRequest};

pub const MAX_DYNAMIC_FIELDS: usize = 3;

const HEIGHT_M: RangeInclusive<f64> = 0.5..=3.0;
const WEIGHT_KG: RangeInclusive<f64> = 1.0..=500.0;
const TEMPERATURE_C: RangeInclusive<f64> = 30.0..=45.0;

fn check_range(value: f64, range: &RangeInclusive<f64>, message: &str) -> Result<(), ClinicalRecordError> {
    if value.is_finite() && range.contains(&value) {
        Ok(())
    } else {
        Err(ClinicalRecordError::ValidationError(message.to_string()))
    }
}

pub fn validate_height(altura: f64) -> Result<(), ClinicalRecordError> {
    check_range(altura, &HEIGHT_M, "La altura debe estar entre 0.5 y 3 metros")
}

pub fn validate_weight(peso: f64) -> Result<(), ClinicalRecordError> {
    check_range(peso, &WEIGHT_KG, "El peso debe estar entre 1 y 500 kg")
}

pub fn validate_temperature(temperatura: f64) -> Result<(), ClinicalRecordError> {
    check_range(temperatura, &TEMPERATURE_C, "La temperatura debe estar entre 30 y 45 °C")
}

pub fn validate_pressure(presion: &str) -> Result<String, ClinicalRecordError> {
    let presion = presion.trim();
    if presion.is_empty() {
        return Err(ClinicalRecordError::ValidationError("La presión es obligatoria".to_string()));
    }
    Ok(presion.to_string())
}

/// Trims every entry and enforces the field limit, non-empty keys and values,
/// and unique keys (case-insensitive).
pub fn validate_dynamic_fields(fields: &[DynamicField]) -> Result<Vec<DynamicField>, ClinicalRecordError> {
    if fields.len() > MAX_DYNAMIC_FIELDS {
        return Err(ClinicalRecordError::ValidationError(format!(
            "Se permiten como máximo {} datos adicionales",
            MAX_DYNAMIC_FIELDS
        )));
    }

    let mut seen = HashSet::new();
    fields
        .iter()
        .map(|field| {
            let clave = field.clave.trim();
            let valor = field.valor.trim();
            if clave.is_empty() || valor.is_empty() {
                return Err(ClinicalRecordError::ValidationError(
                    "Cada dato adicional necesita clave y valor".to_string(),
                ));
            }
            if !seen.insert(clave.to_lowercase()) {
                return Err(ClinicalRecordError::ValidationError(format!(
                    "La clave {} está repetida",
                    clave
                )));
            }
            Ok(DynamicField { clave: clave.to_string(), valor: valor.to_string() })
        })
        .collect()
}

/// Validated, normalized contents of a new record.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    pub altura: f64,
    pub peso: f64,
    pub temperatura: f64,
    pub presion: String,
    pub datos_dinamicos: Vec<DynamicField>,
}

pub fn validate_new_record(request: &CreateClinicalRecordRequest) -> Result<ValidatedRecord, ClinicalRecordError> {
    validate_height(request.altura)?;
    validate_weight(request.peso)?;
    validate_temperature(request.temperatura)?;

    Ok(ValidatedRecord {
        altura: request.altura,
        peso: request.peso,
        temperatura: request.temperatura,
        presion: validate_pressure(&request.presion)?,
        datos_dinamicos: validate_dynamic_fields(&request.datos_dinamicos)?,
    })
}

/// Validates only the provided fields and returns them normalized.
pub fn validate_update(request: &UpdateClinicalRecordRequest) -> Result<UpdateClinicalRecordRequest, ClinicalRecordError> {
    if let Some(altura) = request.altura {
        validate_height(altura)?;
    }
    if let Some(peso) = request.peso {
        validate_weight(peso)?;
    }
    if let Some(temperatura) = request.temperatura {
        validate_temperature(temperatura)?;
    }

    Ok(UpdateClinicalRecordRequest {
        altura: request.altura,
        peso: request.peso,
        temperatura: request.temperatura,
        presion: request.presion.as_deref().map(validate_pressure).transpose()?,
        datos_dinamicos: request
            .datos_dinamicos
            .as_deref()
            .map(validate_dynamic_fields)
            .transpose()?,
    })
}
