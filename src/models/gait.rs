//! Gait pattern classification from temporal capture parameters.

use async_trait::async_trait;
use serde_json::json;

use crate::calibration::CalibratedMeasurements;
use crate::error::Result;
use crate::measurements::GaitParameters;
use crate::model::{
    Classifier, Condition, ModelId, ModelResult, Severity, TreatmentRecommendations,
};
use crate::models::excess_confidence;

const ASYMMETRY_THRESHOLD: f64 = 0.20;
const STRIDE_THRESHOLD_M: f64 = 0.50;
const STANCE_RANGE: (f64, f64) = (58.0, 62.0);

/// Hindfoot angle beyond which the gait itself is labeled
/// over/supinated, degrees.
const GAIT_VALGUS_THRESHOLD: f64 = 6.0;
const GAIT_VARUS_THRESHOLD: f64 = -4.0;

pub struct GaitModel;

impl GaitModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GaitModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for GaitModel {
    fn id(&self) -> ModelId {
        ModelId::Gait
    }

    fn name(&self) -> &str {
        "Gait Analysis"
    }

    fn description(&self) -> &str {
        "Detects asymmetric, shortened or misaligned gait patterns from \
         cadence, stride, stance and hindfoot kinematics"
    }

    async fn analyze(&self, input: &CalibratedMeasurements) -> Result<ModelResult> {
        let m = &input.calibrated;
        let Some(gait) = m.gait.as_ref() else {
            return Ok(ModelResult::abstained("no gait parameters captured"));
        };

        let (condition, confidence, severity) = classify(gait, m.hindfoot_angle);
        let stance_abnormal =
            gait.stance_percentage < STANCE_RANGE.0 || gait.stance_percentage > STANCE_RANGE.1;

        let mut result = ModelResult::new(condition, confidence, severity)
            .with_description(describe(condition, severity, gait))
            .with_detail(
                "gait_parameters",
                json!({
                    "cadence": gait.cadence,
                    "stride_length": gait.stride_length,
                    "stance_percentage": gait.stance_percentage,
                    "asymmetry_index": gait.asymmetry_index,
                    "stance_abnormal": stance_abnormal,
                }),
            );
        result.treatment_recommendations = Some(recommendations(condition, severity));
        Ok(result)
    }
}

/// Findings are checked in clinical priority order; the first match
/// names the condition.
fn classify(gait: &GaitParameters, hindfoot_angle: Option<f64>) -> (Condition, f64, Severity) {
    if gait.asymmetry_index > ASYMMETRY_THRESHOLD {
        let severity = if gait.asymmetry_index >= 0.40 {
            Severity::Severe
        } else if gait.asymmetry_index >= 0.30 {
            Severity::Moderate
        } else {
            Severity::Mild
        };
        let confidence =
            excess_confidence(gait.asymmetry_index - ASYMMETRY_THRESHOLD, ASYMMETRY_THRESHOLD);
        return (Condition::AsymmetricGait, confidence, severity);
    }

    if let Some(angle) = hindfoot_angle {
        if angle > GAIT_VALGUS_THRESHOLD {
            let severity = if angle > 12.0 {
                Severity::Moderate
            } else {
                Severity::Mild
            };
            return (
                Condition::OverpronationGait,
                excess_confidence(angle - GAIT_VALGUS_THRESHOLD, 8.0),
                severity,
            );
        }
        if angle < GAIT_VARUS_THRESHOLD {
            let severity = if angle < -10.0 {
                Severity::Moderate
            } else {
                Severity::Mild
            };
            return (
                Condition::SupinationGait,
                excess_confidence(GAIT_VARUS_THRESHOLD - angle, 8.0),
                severity,
            );
        }
    }

    if gait.stride_length > 0.0 && gait.stride_length < STRIDE_THRESHOLD_M {
        let severity = if gait.stride_length < 0.35 {
            Severity::Moderate
        } else {
            Severity::Mild
        };
        return (
            Condition::ShortStride,
            excess_confidence(STRIDE_THRESHOLD_M - gait.stride_length, STRIDE_THRESHOLD_M),
            severity,
        );
    }

    let confidence = if gait.stance_percentage >= STANCE_RANGE.0
        && gait.stance_percentage <= STANCE_RANGE.1
    {
        0.9
    } else {
        // temporal pattern normal but stance phase slightly off
        0.75
    };
    (Condition::NormalGait, confidence, Severity::None)
}

fn describe(condition: Condition, severity: Severity, gait: &GaitParameters) -> String {
    match condition {
        Condition::AsymmetricGait => format!(
            "{severity} left/right asymmetry (index {:.2}, normal below {ASYMMETRY_THRESHOLD})",
            gait.asymmetry_index
        ),
        Condition::OverpronationGait => {
            format!("{severity} medial collapse pattern during stance phase")
        }
        Condition::SupinationGait => {
            format!("{severity} lateral loading pattern during stance phase")
        }
        Condition::ShortStride => format!(
            "{severity} shortened stride ({:.2} m, expected at least {STRIDE_THRESHOLD_M} m)",
            gait.stride_length
        ),
        _ => "Temporal gait parameters within normal limits".to_string(),
    }
}

fn recommendations(condition: Condition, severity: Severity) -> TreatmentRecommendations {
    let mut recs = TreatmentRecommendations {
        priority_level: severity,
        ..Default::default()
    };
    match condition {
        Condition::AsymmetricGait => {
            recs.exercises = vec![
                "Gait retraining with symmetry feedback".to_string(),
                "Single-leg strength work on the weaker side".to_string(),
            ];
            recs.monitoring = vec!["Repeat gait capture after 6 weeks".to_string()];
            recs.specialist_referral = severity >= Severity::Moderate;
        }
        Condition::OverpronationGait => {
            recs.footwear = vec!["Stability shoes with medial post".to_string()];
            recs.exercises = vec!["Foot intrinsic and hip abductor strengthening".to_string()];
        }
        Condition::SupinationGait => {
            recs.footwear = vec!["Cushioned neutral shoes".to_string()];
            recs.exercises = vec!["Ankle eversion strengthening".to_string()];
        }
        Condition::ShortStride => {
            recs.exercises = vec![
                "Hip flexor and hamstring mobility work".to_string(),
                "Progressive stride-length drills".to_string(),
            ];
            recs.monitoring = vec!["Screen for underlying balance deficit".to_string()];
        }
        _ => {}
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::SkinToneCalibrator;
    use crate::measurements::MeasurementSet;

    fn with_gait(gait: GaitParameters, hindfoot_angle: Option<f64>) -> CalibratedMeasurements {
        SkinToneCalibrator::new().calibrate(
            MeasurementSet {
                length: 25.0,
                width: 9.5,
                arch_height: 1.8,
                instep_height: 2.5,
                hindfoot_angle,
                gait: Some(gait),
                ..Default::default()
            },
            None,
        )
    }

    fn normal_gait() -> GaitParameters {
        GaitParameters {
            cadence: 110.0,
            stride_length: 1.3,
            stance_percentage: 60.0,
            asymmetry_index: 0.05,
        }
    }

    #[tokio::test]
    async fn high_asymmetry_dominates_other_findings() {
        let gait = GaitParameters {
            asymmetry_index: 0.35,
            stride_length: 0.4,
            ..normal_gait()
        };
        let result = GaitModel::new()
            .analyze(&with_gait(gait, Some(10.0)))
            .await
            .unwrap();
        assert_eq!(result.condition, Condition::AsymmetricGait);
        assert_eq!(result.severity, Severity::Moderate);
    }

    #[tokio::test]
    async fn valgus_hindfoot_during_gait_flags_overpronated_pattern() {
        let result = GaitModel::new()
            .analyze(&with_gait(normal_gait(), Some(8.0)))
            .await
            .unwrap();
        assert_eq!(result.condition, Condition::OverpronationGait);
        assert_eq!(result.severity, Severity::Mild);
    }

    #[tokio::test]
    async fn short_stride_is_detected_without_alignment_data() {
        let gait = GaitParameters {
            stride_length: 0.42,
            ..normal_gait()
        };
        let result = GaitModel::new().analyze(&with_gait(gait, None)).await.unwrap();
        assert_eq!(result.condition, Condition::ShortStride);
        assert_eq!(result.severity, Severity::Mild);
    }

    #[tokio::test]
    async fn unremarkable_parameters_are_normal() {
        let result = GaitModel::new()
            .analyze(&with_gait(normal_gait(), Some(2.0)))
            .await
            .unwrap();
        assert_eq!(result.condition, Condition::NormalGait);
        assert_eq!(result.severity, Severity::None);
        assert!((result.confidence - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_gait_block_abstains() {
        let input = SkinToneCalibrator::new().calibrate(MeasurementSet::default(), None);
        let result = GaitModel::new().analyze(&input).await.unwrap();
        assert!(result.is_abstention());
    }
}
