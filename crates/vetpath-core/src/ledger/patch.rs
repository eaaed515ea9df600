//! Merge-patch application for record updates.
//!
//! Patches follow RFC 7396: objects merge recursively, `null` removes a key
//! (clearing an optional field or resetting a panel), anything else replaces.
//! The merged document must still deserialize into [`ClinicalFields`].

use serde_json::{Map, Value};

use crate::models::{ClinicalFields, ValidationError, ValidationResult};

/// Merge `patch` into `current`, returning the new clinical fields.
///
/// Pure: nothing is persisted and `current` is not modified.
pub fn apply_merge_patch(current: &ClinicalFields, patch: &Value) -> ValidationResult<ClinicalFields> {
    if !patch.is_object() {
        return Err(ValidationError::new("patch", "must be a JSON object"));
    }

    let mut document =
        serde_json::to_value(current).map_err(|e| ValidationError::new("patch", e.to_string()))?;
    merge(&mut document, patch);

    serde_json::from_value(document).map_err(|e| ValidationError::new("patch", e.to_string()))
}

fn merge(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Prognosis, Sex, Species};
    use serde_json::json;

    fn current() -> ClinicalFields {
        let mut fields = ClinicalFields::new("A", "Max", Species::Canine, Sex::Male, "Mass");
        fields.breed = Some("Boxer".into());
        fields.hematology.wbc = Some("12.1".into());
        fields.hematology.rbc = Some("6.8".into());
        fields
    }

    #[test]
    fn test_top_level_replace() {
        let merged = apply_merge_patch(&current(), &json!({ "case_number": "B", "prognosis": "guarded" }))
            .unwrap();
        assert_eq!(merged.case_number, "B");
        assert_eq!(merged.prognosis, Some(Prognosis::Guarded));
        assert_eq!(merged.patient_name, "Max");
    }

    #[test]
    fn test_panels_merge_per_analyte() {
        let merged = apply_merge_patch(&current(), &json!({ "hematology": { "wbc": "14.0" } })).unwrap();
        assert_eq!(merged.hematology.wbc, Some("14.0".into()));
        assert_eq!(merged.hematology.rbc, Some("6.8".into()));
    }

    #[test]
    fn test_null_clears_optional() {
        let merged = apply_merge_patch(&current(), &json!({ "breed": null })).unwrap();
        assert_eq!(merged.breed, None);
    }

    #[test]
    fn test_null_on_required_field_rejected() {
        let err = apply_merge_patch(&current(), &json!({ "patient_name": null })).unwrap_err();
        assert_eq!(err.field, "patch");
    }

    #[test]
    fn test_wrong_type_rejected() {
        assert!(apply_merge_patch(&current(), &json!({ "weight_kg": "heavy" })).is_err());
        assert!(apply_merge_patch(&current(), &json!({ "species": "dragon" })).is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(apply_merge_patch(&current(), &json!({ "owner_id": "someone-else" })).is_err());
        assert!(apply_merge_patch(&current(), &json!({ "biochemistry": { "lipase": "300" } })).is_err());
    }

    #[test]
    fn test_non_object_patch_rejected() {
        assert!(apply_merge_patch(&current(), &json!(["case_number"])).is_err());
    }

    #[test]
    fn test_current_untouched() {
        let fields = current();
        let _ = apply_merge_patch(&fields, &json!({ "case_number": "B" })).unwrap();
        assert_eq!(fields.case_number, "A");
    }
}
