//! Pronation classification from hindfoot alignment, corroborated by
//! arch geometry when available.

use async_trait::async_trait;
use serde_json::json;

use crate::calibration::CalibratedMeasurements;
use crate::error::Result;
use crate::model::{
    ClassificationMethodResult, Classifier, Condition, ModelId, ModelResult, Severity,
    TreatmentRecommendations,
};
use crate::models::{WeightedMethod, excess_confidence, fuse_methods, normal_band_confidence};

const WEIGHT_HINDFOOT: f64 = 0.7;
const WEIGHT_ARCH: f64 = 0.3;
const TOTAL_WEIGHT: f64 = 1.0;

/// Standing hindfoot angle, degrees. Positive is valgus. A few degrees
/// of valgus is physiologic.
const HINDFOOT_RANGE: (f64, f64) = (0.0, 5.0);
const HINDFOOT_SCALE: f64 = 10.0;

const AHI_RANGE: (f64, f64) = (0.24, 0.31);
const AHI_SCALE: f64 = 0.24;

pub struct PronationModel;

impl PronationModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PronationModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for PronationModel {
    fn id(&self) -> ModelId {
        ModelId::Pronation
    }

    fn name(&self) -> &str {
        "Pronation Analysis"
    }

    fn description(&self) -> &str {
        "Classifies rearfoot motion as overpronation, neutral or \
         underpronation from hindfoot alignment and arch geometry"
    }

    async fn analyze(&self, input: &CalibratedMeasurements) -> Result<ModelResult> {
        let m = &input.calibrated;
        let mut methods = Vec::new();

        if let Some(angle) = m.hindfoot_angle {
            methods.push(WeightedMethod {
                result: classify_hindfoot(angle),
                weight: WEIGHT_HINDFOOT,
            });
        }
        if let Some(ahi) = m.arch.as_ref().and_then(|a| a.arch_height_index) {
            methods.push(WeightedMethod {
                result: classify_arch_correlate(ahi),
                weight: WEIGHT_ARCH,
            });
        }

        let Some(fused) = fuse_methods(&methods, TOTAL_WEIGHT) else {
            return Ok(ModelResult::abstained(
                "no hindfoot angle or arch height index",
            ));
        };

        let severity = severity_for(fused.condition, m.hindfoot_angle);
        let mut result = ModelResult::new(fused.condition, fused.confidence, severity)
            .with_description(describe(fused.condition, severity));
        if let Some(angle) = m.hindfoot_angle {
            result = result.with_detail("hindfoot_angle", json!(angle));
        }
        result.classification_methods = methods.into_iter().map(|m| m.result).collect();
        result.treatment_recommendations = Some(recommendations(fused.condition, severity));
        Ok(result)
    }
}

fn classify_hindfoot(angle: f64) -> ClassificationMethodResult {
    let (lo, hi) = HINDFOOT_RANGE;
    let (classification, confidence) = if angle > hi {
        (Condition::Overpronation, excess_confidence(angle - hi, HINDFOOT_SCALE))
    } else if angle < lo {
        (Condition::Underpronation, excess_confidence(lo - angle, HINDFOOT_SCALE))
    } else {
        (
            Condition::NeutralPronation,
            normal_band_confidence(angle, lo, hi),
        )
    };
    ClassificationMethodResult {
        classification,
        confidence,
        value: angle,
        normal_range: format!("{lo}-{hi}"),
        method: "hindfoot_angle".to_string(),
    }
}

/// A collapsed arch pronates, an elevated one supinates. Weak evidence
/// on its own, hence the low weight.
fn classify_arch_correlate(ahi: f64) -> ClassificationMethodResult {
    let (lo, hi) = AHI_RANGE;
    let (classification, confidence) = if ahi < lo {
        (Condition::Overpronation, excess_confidence(lo - ahi, AHI_SCALE))
    } else if ahi > hi {
        (Condition::Underpronation, excess_confidence(ahi - hi, AHI_SCALE))
    } else {
        (
            Condition::NeutralPronation,
            normal_band_confidence(ahi, lo, hi),
        )
    };
    ClassificationMethodResult {
        classification,
        confidence,
        value: ahi,
        normal_range: format!("{lo}-{hi}"),
        method: "arch_height_index".to_string(),
    }
}

fn severity_for(condition: Condition, hindfoot_angle: Option<f64>) -> Severity {
    if condition == Condition::NeutralPronation {
        return Severity::None;
    }
    match hindfoot_angle {
        Some(angle) if angle > 15.0 || angle < -12.0 => Severity::Severe,
        Some(angle) if angle > 10.0 || angle < -8.0 => Severity::Moderate,
        _ => Severity::Mild,
    }
}

fn describe(condition: Condition, severity: Severity) -> String {
    match condition {
        Condition::Overpronation => format!(
            "{severity} excessive medial rearfoot motion during stance"
        ),
        Condition::Underpronation => format!(
            "{severity} insufficient pronation with lateral loading bias"
        ),
        _ => "Rearfoot motion within the neutral range".to_string(),
    }
}

fn recommendations(condition: Condition, severity: Severity) -> TreatmentRecommendations {
    let mut recs = TreatmentRecommendations {
        priority_level: severity,
        ..Default::default()
    };
    match condition {
        Condition::Overpronation => {
            recs.footwear = vec!["Stability shoes with medial post".to_string()];
            recs.orthotics = vec!["Medial rearfoot wedge".to_string()];
            recs.exercises = vec![
                "Tibialis posterior strengthening".to_string(),
                "Single-leg balance work".to_string(),
            ];
            recs.specialist_referral = severity == Severity::Severe;
        }
        Condition::Underpronation => {
            recs.footwear = vec!["Cushioned neutral shoes".to_string()];
            recs.orthotics = vec!["Lateral rearfoot wedge with shock absorption".to_string()];
            recs.exercises = vec!["Peroneal strengthening".to_string(), "Ankle mobility drills".to_string()];
            recs.specialist_referral = severity == Severity::Severe;
        }
        _ => {
            recs.footwear = vec!["Neutral footwear".to_string()];
        }
    }
    recs
}
