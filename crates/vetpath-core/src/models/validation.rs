//! Field-level validation for clinical payloads.

use thiserror::Error;

use super::record::ClinicalFields;

/// Longest accepted case number.
pub const MAX_CASE_NUMBER_LEN: usize = 64;

/// A malformed or out-of-range field.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Check type and range constraints on a (normalized) clinical payload.
pub fn validate_fields(fields: &ClinicalFields) -> ValidationResult<()> {
    require_text("case_number", &fields.case_number)?;
    if fields.case_number.chars().count() > MAX_CASE_NUMBER_LEN {
        return Err(ValidationError::new(
            "case_number",
            format!("must be at most {} characters", MAX_CASE_NUMBER_LEN),
        ));
    }
    require_text("patient_name", &fields.patient_name)?;
    require_text("presenting_complaint", &fields.presenting_complaint)?;

    check_range("age_years", fields.age_years, 0.0, 60.0, true)?;
    check_range("weight_kg", fields.weight_kg, 0.0, 2000.0, false)?;
    check_range("lesion_size_cm", fields.lesion_size_cm, 0.0, 500.0, true)?;

    if let Some(score) = fields.body_condition_score {
        if !(1..=9).contains(&score) {
            return Err(ValidationError::new(
                "body_condition_score",
                format!("{} is outside the 1-9 scale", score),
            ));
        }
    }

    if let Some(date) = fields.sample_collected_on.as_deref() {
        chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            ValidationError::new("sample_collected_on", format!("'{}' is not a YYYY-MM-DD date", date))
        })?;
    }

    for (analyte, value) in fields.hematology.analytes() {
        check_analyte("hematology", analyte, value)?;
    }
    for (analyte, value) in fields.biochemistry.analytes() {
        check_analyte("biochemistry", analyte, value)?;
    }

    Ok(())
}

fn require_text(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    Ok(())
}

fn check_range(
    field: &str,
    value: Option<f64>,
    min: f64,
    max: f64,
    min_inclusive: bool,
) -> ValidationResult<()> {
    let Some(v) = value else {
        return Ok(());
    };
    let above_min = if min_inclusive { v >= min } else { v > min };
    if !v.is_finite() || !above_min || v > max {
        return Err(ValidationError::new(
            field,
            format!("{} is outside the allowed range {}-{}", v, min, max),
        ));
    }
    Ok(())
}

fn check_analyte(panel: &str, analyte: &str, value: Option<&str>) -> ValidationResult<()> {
    let Some(raw) = value else {
        return Ok(());
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(()),
        _ => Err(ValidationError::new(
            format!("{}.{}", panel, analyte),
            format!("'{}' is not a numeric value", raw),
        )),
    }
}
