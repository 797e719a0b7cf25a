//! The aggregate diagnosis document.
//!
//! Field names are part of the wire contract consumed by report
//! rendering and clinic integrations; serialization order follows
//! declaration order and all maps are ordered, so identical runs
//! serialize byte-identically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::measurements::MeasurementSet;
use crate::model::{Condition, ModelId, ModelResult, Severity};
use crate::rules::{AlignmentZones, OrthoticRecommendations};

/// Top-level result of one diagnostic run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisAggregate {
    pub scan_id: Uuid,
    /// Clinical label of the primary finding, or `insufficient_data`
    /// when every model abstained.
    pub diagnosis: String,
    pub confidence: f64,
    pub measurements: MeasurementSummary,
    /// Human-readable overall assessment citing the key index values.
    pub assessment: String,
    pub structured_diagnosis: StructuredDiagnosis,
    pub recommendations: OrthoticRecommendations,
    pub detailed_results: DetailedResults,
    pub high_risk_flags: BTreeMap<String, bool>,
    pub patient_context_used: bool,
}

/// The four core linear measurements, echoed back in the document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSummary {
    pub length: f64,
    pub width: f64,
    #[serde(rename = "archHeight")]
    pub arch_height: f64,
    #[serde(rename = "instepHeight")]
    pub instep_height: f64,
}

impl From<&MeasurementSet> for MeasurementSummary {
    fn from(set: &MeasurementSet) -> Self {
        Self {
            length: set.length,
            width: set.width,
            arch_height: set.arch_height,
            instep_height: set.instep_height,
        }
    }
}

/// Machine-readable diagnosis: the primary finding, every retained
/// finding, and the merged zone alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StructuredDiagnosis {
    /// Arch-type label from the arch model (`Flat Arch`, `Normal Arch`,
    /// `High Arch`), or `unknown` when it abstained.
    pub arch_type: String,
    /// Arch degree on the 0-5 scale (0 = normal).
    pub arch_degree: u8,
    pub alignment: AlignmentZones,
    /// Condition names of every finding at mild severity or worse, in
    /// primary-selection order. Always a subset of the conditions in
    /// `detailed_results.models`.
    pub pathologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<Finding>,
    pub conditions: Vec<Finding>,
}

/// One finding attributed to the model that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub model: ModelId,
    pub condition: Condition,
    pub condition_name: String,
    pub severity: Severity,
    pub confidence: f64,
}

impl Finding {
    pub fn from_result(model: ModelId, result: &ModelResult) -> Self {
        Self {
            model,
            condition: result.condition,
            condition_name: result.condition_name.clone(),
            severity: result.severity,
            confidence: result.confidence,
        }
    }
}

/// Full per-model detail plus the audit copy of the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedResults {
    pub measurements: MeasurementsDetail,
    pub models: BTreeMap<String, ModelEntry>,
    /// Free-form notes recorded during aggregation (e.g. alignment
    /// disagreements resolved to neutral).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementsDetail {
    pub raw: MeasurementSet,
    pub calibrated: MeasurementSet,
}

/// One model's full output, keyed by model id in
/// [`DetailedResults::models`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub description: String,
    pub result: ModelResult,
}
