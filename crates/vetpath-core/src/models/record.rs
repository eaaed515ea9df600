//! Case record models.

use serde::{Deserialize, Serialize};

/// Current time as a fixed-width RFC 3339 UTC string.
///
/// Microsecond precision keeps stored timestamps lexicographically sortable.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Patient species.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Canine,
    Feline,
    Equine,
    Bovine,
    Ovine,
    Caprine,
    Porcine,
    Avian,
    Exotic,
    Other,
}

/// Patient sex and reproductive status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    MaleNeutered,
    FemaleSpayed,
    Unknown,
}

/// Histologic tumor grade.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TumorGrade {
    Low,
    Intermediate,
    High,
    NotApplicable,
}

/// Surgical margin assessment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarginStatus {
    Complete,
    Narrow,
    Incomplete,
    NotEvaluated,
}

/// Clinical prognosis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Prognosis {
    Excellent,
    Good,
    Fair,
    Guarded,
    Poor,
    Grave,
}

/// Complete blood count. Values are kept as entered (string-encoded numbers).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HematologyPanel {
    pub wbc: Option<String>,
    pub rbc: Option<String>,
    pub hemoglobin: Option<String>,
    pub hematocrit: Option<String>,
    pub platelets: Option<String>,
    pub neutrophils: Option<String>,
    pub lymphocytes: Option<String>,
    pub monocytes: Option<String>,
    pub eosinophils: Option<String>,
}

impl HematologyPanel {
    /// Analyte names paired with their values, in declaration order.
    pub fn analytes(&self) -> [(&'static str, Option<&str>); 9] {
        [
            ("wbc", self.wbc.as_deref()),
            ("rbc", self.rbc.as_deref()),
            ("hemoglobin", self.hemoglobin.as_deref()),
            ("hematocrit", self.hematocrit.as_deref()),
            ("platelets", self.platelets.as_deref()),
            ("neutrophils", self.neutrophils.as_deref()),
            ("lymphocytes", self.lymphocytes.as_deref()),
            ("monocytes", self.monocytes.as_deref()),
            ("eosinophils", self.eosinophils.as_deref()),
        ]
    }

    fn normalize(&mut self) {
        for value in [
            &mut self.wbc,
            &mut self.rbc,
            &mut self.hemoglobin,
            &mut self.hematocrit,
            &mut self.platelets,
            &mut self.neutrophils,
            &mut self.lymphocytes,
            &mut self.monocytes,
            &mut self.eosinophils,
        ] {
            normalize_optional(value);
        }
    }
}

/// Serum biochemistry panel. Values are kept as entered (string-encoded numbers).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BiochemistryPanel {
    pub alt: Option<String>,
    pub alp: Option<String>,
    pub bun: Option<String>,
    pub creatinine: Option<String>,
    pub glucose: Option<String>,
    pub total_protein: Option<String>,
    pub albumin: Option<String>,
    pub globulin: Option<String>,
    pub total_bilirubin: Option<String>,
    pub calcium: Option<String>,
    pub phosphorus: Option<String>,
}

impl BiochemistryPanel {
    /// Analyte names paired with their values, in declaration order.
    pub fn analytes(&self) -> [(&'static str, Option<&str>); 11] {
        [
            ("alt", self.alt.as_deref()),
            ("alp", self.alp.as_deref()),
            ("bun", self.bun.as_deref()),
            ("creatinine", self.creatinine.as_deref()),
            ("glucose", self.glucose.as_deref()),
            ("total_protein", self.total_protein.as_deref()),
            ("albumin", self.albumin.as_deref()),
            ("globulin", self.globulin.as_deref()),
            ("total_bilirubin", self.total_bilirubin.as_deref()),
            ("calcium", self.calcium.as_deref()),
            ("phosphorus", self.phosphorus.as_deref()),
        ]
    }

    fn normalize(&mut self) {
        for value in [
            &mut self.alt,
            &mut self.alp,
            &mut self.bun,
            &mut self.creatinine,
            &mut self.glucose,
            &mut self.total_protein,
            &mut self.albumin,
            &mut self.globulin,
            &mut self.total_bilirubin,
            &mut self.calcium,
            &mut self.phosphorus,
        ] {
            normalize_optional(value);
        }
    }
}

/// Sampling techniques used to obtain the specimen.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BiopsyMethods {
    pub fine_needle_aspirate: bool,
    pub punch: bool,
    pub incisional: bool,
    pub excisional: bool,
    pub core_needle: bool,
    pub endoscopic: bool,
}

/// Clinical payload of a case. This is the part captured in history snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClinicalFields {
    /// Business key, unique per owner
    pub case_number: String,
    pub patient_name: String,
    pub species: Species,
    #[serde(default)]
    pub breed: Option<String>,
    pub sex: Sex,
    #[serde(default)]
    pub age_years: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    /// 9-point body condition score
    #[serde(default)]
    pub body_condition_score: Option<u8>,
    pub presenting_complaint: String,
    #[serde(default)]
    pub clinical_history: Option<String>,
    #[serde(default)]
    pub physical_exam_findings: Option<String>,
    #[serde(default)]
    pub lesion_location: Option<String>,
    #[serde(default)]
    pub lesion_size_cm: Option<f64>,
    #[serde(default)]
    pub lesion_description: Option<String>,
    #[serde(default)]
    pub differential_diagnoses: Option<String>,
    #[serde(default)]
    pub cytology_findings: Option<String>,
    #[serde(default)]
    pub histopathology_findings: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub tumor_grade: Option<TumorGrade>,
    #[serde(default)]
    pub surgical_margins: Option<MarginStatus>,
    #[serde(default)]
    pub prognosis: Option<Prognosis>,
    #[serde(default)]
    pub treatment_plan: Option<String>,
    #[serde(default)]
    pub submitting_veterinarian: Option<String>,
    #[serde(default)]
    pub clinic_name: Option<String>,
    /// Sample collection date (YYYY-MM-DD)
    #[serde(default)]
    pub sample_collected_on: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub hematology: HematologyPanel,
    #[serde(default)]
    pub biochemistry: BiochemistryPanel,
    #[serde(default)]
    pub biopsy_methods: BiopsyMethods,
}

impl ClinicalFields {
    /// Create clinical fields with the required values set.
    pub fn new(
        case_number: impl Into<String>,
        patient_name: impl Into<String>,
        species: Species,
        sex: Sex,
        presenting_complaint: impl Into<String>,
    ) -> Self {
        Self {
            case_number: case_number.into(),
            patient_name: patient_name.into(),
            species,
            breed: None,
            sex,
            age_years: None,
            weight_kg: None,
            body_condition_score: None,
            presenting_complaint: presenting_complaint.into(),
            clinical_history: None,
            physical_exam_findings: None,
            lesion_location: None,
            lesion_size_cm: None,
            lesion_description: None,
            differential_diagnoses: None,
            cytology_findings: None,
            histopathology_findings: None,
            diagnosis: None,
            tumor_grade: None,
            surgical_margins: None,
            prognosis: None,
            treatment_plan: None,
            submitting_veterinarian: None,
            clinic_name: None,
            sample_collected_on: None,
            notes: None,
            hematology: HematologyPanel::default(),
            biochemistry: BiochemistryPanel::default(),
            biopsy_methods: BiopsyMethods::default(),
        }
    }

    /// Trim required text and collapse blank optional text to `None`.
    pub fn normalized(mut self) -> Self {
        self.case_number = self.case_number.trim().to_string();
        self.patient_name = self.patient_name.trim().to_string();
        self.presenting_complaint = self.presenting_complaint.trim().to_string();

        for value in [
            &mut self.breed,
            &mut self.clinical_history,
            &mut self.physical_exam_findings,
            &mut self.lesion_location,
            &mut self.lesion_description,
            &mut self.differential_diagnoses,
            &mut self.cytology_findings,
            &mut self.histopathology_findings,
            &mut self.diagnosis,
            &mut self.treatment_plan,
            &mut self.submitting_veterinarian,
            &mut self.clinic_name,
            &mut self.sample_collected_on,
            &mut self.notes,
        ] {
            normalize_optional(value);
        }

        self.hematology.normalize();
        self.biochemistry.normalize();
        self
    }

    /// Serialize to canonical JSON for snapshot hashing.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        // Struct fields serialize in declaration order
        serde_json::to_string(self)
    }
}

fn normalize_optional(value: &mut Option<String>) {
    *value = value
        .take()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
}

/// An owner-scoped pathology case under lifecycle and audit management.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseRecord {
    /// Unique record ID (UUID)
    pub id: String,
    /// Owning account, immutable after creation
    pub owner_id: String,
    /// Clinical payload
    pub fields: ClinicalFields,
    /// Soft-delete flag
    pub is_deleted: bool,
    /// When the record was soft-deleted
    pub deleted_at: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last mutation timestamp
    pub updated_at: String,
}

impl CaseRecord {
    /// Create a new active record for an owner.
    pub fn new(owner_id: impl Into<String>, fields: ClinicalFields) -> Self {
        let now = timestamp_now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            fields,
            is_deleted: false,
            deleted_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// The business key.
    pub fn case_number(&self) -> &str {
        &self.fields.case_number
    }

    /// Whether `caller_id` owns this record.
    pub fn is_owned_by(&self, caller_id: &str) -> bool {
        self.owner_id == caller_id
    }
}
