use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::calibration::CalibratedMeasurements;
use crate::error::Result;

/// Stable identifier of a diagnostic model. Doubles as the key under
/// which the model's result appears in the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    ArchType,
    Pronation,
    Pressure,
    Deformity,
    Gait,
    Footwear,
}

impl ModelId {
    pub const ALL: [ModelId; 6] = [
        ModelId::ArchType,
        ModelId::Pronation,
        ModelId::Pressure,
        ModelId::Deformity,
        ModelId::Gait,
        ModelId::Footwear,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelId::ArchType => "arch_type",
            ModelId::Pronation => "pronation",
            ModelId::Pressure => "pressure",
            ModelId::Deformity => "deformity",
            ModelId::Gait => "gait",
            ModelId::Footwear => "footwear",
        }
    }

    /// Fixed tie-break priority for primary-diagnosis selection.
    /// Lower is more authoritative.
    pub fn priority(self) -> u8 {
        match self {
            ModelId::ArchType => 0,
            ModelId::Gait => 1,
            ModelId::Pressure => 2,
            ModelId::Deformity => 3,
            ModelId::Pronation => 4,
            ModelId::Footwear => 5,
        }
    }

    pub fn parse(s: &str) -> Option<ModelId> {
        ModelId::ALL.into_iter().find(|id| id.as_str() == s)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clinical severity, ordered so that `Severe > Moderate > Mild > None`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Mild,
    Moderate,
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::None => "none",
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        };
        f.write_str(s)
    }
}

/// Closed set of conditions the engine can report. Serialized as the
/// snake_case code; [`Condition::display_name`] gives the clinical
/// label used for the top-level `diagnosis` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    // arch
    FlatFeet,
    HighArch,
    NormalArch,
    // pronation
    Overpronation,
    Underpronation,
    NeutralPronation,
    // pressure
    NormalPressure,
    ForefootPressure,
    HeelPressure,
    MedialPressure,
    LateralPressure,
    VascularConcern,
    // deformity
    NoDeformity,
    Bunion,
    HammerToe,
    ClawToe,
    MalletToe,
    // gait
    NormalGait,
    AsymmetricGait,
    ShortStride,
    OverpronationGait,
    SupinationGait,
    // footwear
    NeutralFootType,
    // fallback when every model abstained
    Unknown,
}

impl Condition {
    pub fn display_name(self) -> &'static str {
        match self {
            Condition::FlatFeet => "Flat Feet (Pes Planus)",
            Condition::HighArch => "High Arch (Pes Cavus)",
            Condition::NormalArch => "Normal Arch",
            Condition::Overpronation => "Overpronation",
            Condition::Underpronation => "Underpronation (Supination)",
            Condition::NeutralPronation => "Neutral Pronation",
            Condition::NormalPressure => "Normal Pressure Distribution",
            Condition::ForefootPressure => "Elevated Forefoot Pressure",
            Condition::HeelPressure => "Elevated Heel Pressure",
            Condition::MedialPressure => "Medial Pressure Concentration",
            Condition::LateralPressure => "Lateral Pressure Concentration",
            Condition::VascularConcern => "Reduced Peripheral Perfusion",
            Condition::NoDeformity => "No Structural Deformity",
            Condition::Bunion => "Bunion (Hallux Valgus)",
            Condition::HammerToe => "Hammer Toe",
            Condition::ClawToe => "Claw Toe",
            Condition::MalletToe => "Mallet Toe",
            Condition::NormalGait => "Normal Gait Pattern",
            Condition::AsymmetricGait => "Asymmetric Gait",
            Condition::ShortStride => "Shortened Stride",
            Condition::OverpronationGait => "Overpronated Gait",
            Condition::SupinationGait => "Supinated Gait",
            Condition::NeutralFootType => "Neutral Foot Type",
            Condition::Unknown => "insufficient_data",
        }
    }

    /// True for the "nothing abnormal found" condition of each model.
    pub fn is_normal(self) -> bool {
        matches!(
            self,
            Condition::NormalArch
                | Condition::NeutralPronation
                | Condition::NormalPressure
                | Condition::NoDeformity
                | Condition::NormalGait
                | Condition::NeutralFootType
        )
    }
}

/// Outcome of one classification sub-method (e.g. a single arch index).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMethodResult {
    pub classification: Condition,
    pub confidence: f64,
    pub value: f64,
    pub normal_range: String,
    pub method: String,
}

/// Care recommendations attached to a model result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TreatmentRecommendations {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub footwear: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orthotics: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exercises: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monitoring: Vec<String>,
    #[serde(default)]
    pub specialist_referral: bool,
    pub priority_level: Severity,
}

/// Result emitted by one diagnostic model.
///
/// The fixed fields form the shared contract every model honors; the
/// flattened `details` map carries model-specific sub-blocks (method
/// breakdowns, vascular summaries, per-activity recommendations) without
/// the shared schema having to know about them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub condition: Condition,
    pub condition_name: String,
    pub confidence: f64,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classification_methods: Vec<ClassificationMethodResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_recommendations: Option<TreatmentRecommendations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ModelResult {
    pub fn new(condition: Condition, confidence: f64, severity: Severity) -> Self {
        Self {
            condition,
            condition_name: condition.display_name().to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            severity,
            description: String::new(),
            classification_methods: Vec::new(),
            treatment_recommendations: None,
            error: None,
            details: Map::new(),
        }
    }

    /// An abstention: the model could not evaluate this scan. Carries
    /// zero confidence so it can never become the primary diagnosis.
    pub fn abstained(reason: impl Into<String>) -> Self {
        let mut result = Self::new(Condition::Unknown, 0.0, Severity::None);
        result.condition_name = "unknown".to_string();
        result.error = Some(reason.into());
        result.description = "Model abstained: insufficient input data".to_string();
        result
    }

    pub fn is_abstention(&self) -> bool {
        self.error.is_some()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

/// Contract implemented by every diagnostic model.
///
/// Models are pure with respect to their input: no shared mutable state,
/// no I/O, so the aggregator can fan them out concurrently and rerun
/// them with identical output. A model that cannot evaluate a scan
/// returns `Ok` with [`ModelResult::abstained`]; `Err` is reserved for
/// unexpected internal failures, which the aggregator also downgrades to
/// an abstention.
#[async_trait]
pub trait Classifier: Send + Sync {
    fn id(&self) -> ModelId;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn analyze(&self, input: &CalibratedMeasurements) -> Result<ModelResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_clinically() {
        assert!(Severity::Severe > Severity::Moderate);
        assert!(Severity::Moderate > Severity::Mild);
        assert!(Severity::Mild > Severity::None);
    }

    #[test]
    fn model_id_round_trips_through_str() {
        for id in ModelId::ALL {
            assert_eq!(ModelId::parse(id.as_str()), Some(id));
        }
        assert_eq!(ModelId::parse("bogus"), None);
    }

    #[test]
    fn abstention_carries_zero_confidence_and_error() {
        let result = ModelResult::abstained("no gait data");
        assert!(result.is_abstention());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.severity, Severity::None);
        assert_eq!(result.error.as_deref(), Some("no gait data"));
    }

    #[test]
    fn details_flatten_into_result_json() {
        let result = ModelResult::new(Condition::FlatFeet, 0.9, Severity::Severe)
            .with_detail("arch_degree", serde_json::json!(5));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["arch_degree"], serde_json::json!(5));
        assert_eq!(json["condition"], serde_json::json!("flat_feet"));
        assert_eq!(json["severity"], serde_json::json!("severe"));
    }

    #[test]
    fn confidence_is_clamped_on_construction() {
        let result = ModelResult::new(Condition::NormalArch, 1.7, Severity::None);
        assert_eq!(result.confidence, 1.0);
    }
}
