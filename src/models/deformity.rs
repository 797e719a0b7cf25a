//! Structural toe deformity detection from joint angles.
//!
//! Each deformity gets a score derived from the joint angles that
//! define it; the highest-scoring deformity above the detection floor
//! names the condition.

use async_trait::async_trait;
use serde_json::json;

use crate::calibration::CalibratedMeasurements;
use crate::error::Result;
use crate::measurements::DeformityAngles;
use crate::model::{
    Classifier, Condition, ModelId, ModelResult, Severity, TreatmentRecommendations,
};

/// Minimum feature score before a deformity is reported at all.
const DETECTION_FLOOR: f64 = 5.0;

pub struct DeformityModel;

impl DeformityModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DeformityModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for DeformityModel {
    fn id(&self) -> ModelId {
        ModelId::Deformity
    }

    fn name(&self) -> &str {
        "Structural Deformity Analysis"
    }

    fn description(&self) -> &str {
        "Scores hallux valgus and lesser-toe deformities from first-ray \
         and toe joint angles"
    }

    async fn analyze(&self, input: &CalibratedMeasurements) -> Result<ModelResult> {
        let Some(angles) = input.calibrated.deformity.as_ref() else {
            return Ok(ModelResult::abstained("no joint angle measurements"));
        };

        let scores = feature_scores(angles);
        let best = scores
            .iter()
            .filter(|(_, score)| *score > DETECTION_FLOOR)
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let (condition, score) = match best {
            Some(&(condition, score)) => (condition, score),
            None => {
                let mut result =
                    ModelResult::new(Condition::NoDeformity, 0.85, Severity::None)
                        .with_description("No structural deformity above detection thresholds");
                result.treatment_recommendations = Some(TreatmentRecommendations {
                    monitoring: vec!["Routine screening at next scan".to_string()],
                    ..Default::default()
                });
                return Ok(result);
            }
        };

        let severity = if score > 15.0 {
            Severity::Severe
        } else if score > 10.0 {
            Severity::Moderate
        } else {
            Severity::Mild
        };
        let confidence = (0.5 + score / 20.0).clamp(0.6, 0.95);

        let mut result = ModelResult::new(condition, confidence, severity)
            .with_description(describe(condition, severity, angles))
            .with_detail(
                "deformity_scores",
                json!(scores
                    .iter()
                    .map(|(c, s)| (format!("{c:?}"), *s))
                    .collect::<std::collections::BTreeMap<_, _>>()),
            );
        result.treatment_recommendations = Some(recommendations(condition, severity));
        Ok(result)
    }
}

/// Feature score per deformity. Larger angles mean a more pronounced
/// deformity; the weightings reflect how specific each angle is to the
/// pattern.
fn feature_scores(angles: &DeformityAngles) -> [(Condition, f64); 4] {
    // Claw toe requires actual MTP hyperextension; without it the IP
    // flexion pattern is a hammer or mallet toe.
    let claw = if angles.mtp_extension > DETECTION_FLOOR {
        angles.mtp_extension + angles.pip_flexion + angles.dip_flexion
    } else {
        0.0
    };
    [
        (
            Condition::Bunion,
            angles.hallux_valgus_angle + angles.intermetatarsal_angle,
        ),
        (
            Condition::HammerToe,
            angles.pip_flexion + angles.dip_flexion / 2.0,
        ),
        (Condition::ClawToe, claw),
        (Condition::MalletToe, angles.dip_flexion * 2.0),
    ]
}

fn describe(condition: Condition, severity: Severity, angles: &DeformityAngles) -> String {
    match condition {
        Condition::Bunion => format!(
            "{severity} hallux valgus ({:.1} deg HVA, {:.1} deg IMA)",
            angles.hallux_valgus_angle, angles.intermetatarsal_angle
        ),
        Condition::HammerToe => format!(
            "{severity} PIP flexion deformity ({:.1} deg)",
            angles.pip_flexion
        ),
        Condition::ClawToe => format!(
            "{severity} combined MTP extension and IP flexion deformity"
        ),
        Condition::MalletToe => format!(
            "{severity} DIP flexion deformity ({:.1} deg)",
            angles.dip_flexion
        ),
        _ => "No structural deformity above detection thresholds".to_string(),
    }
}

fn recommendations(condition: Condition, severity: Severity) -> TreatmentRecommendations {
    let mut recs = TreatmentRecommendations {
        priority_level: severity,
        footwear: vec!["Wide toe box with soft, stretchable upper".to_string()],
        ..Default::default()
    };
    match condition {
        Condition::Bunion => {
            recs.orthotics = vec![
                "First-ray cutout orthosis".to_string(),
                "Bunion spacer or splint".to_string(),
            ];
            recs.monitoring = vec!["Track hallux valgus angle progression".to_string()];
        }
        Condition::HammerToe | Condition::ClawToe | Condition::MalletToe => {
            recs.orthotics = vec![
                "Metatarsal pad to offload the forefoot".to_string(),
                "Toe crest or sleeve".to_string(),
            ];
            recs.exercises = vec!["Toe extension and intrinsic stretching".to_string()];
        }
        _ => {}
    }
    recs.specialist_referral = severity == Severity::Severe;
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::SkinToneCalibrator;
    use crate::measurements::MeasurementSet;

    fn with_angles(angles: DeformityAngles) -> CalibratedMeasurements {
        SkinToneCalibrator::new().calibrate(
            MeasurementSet {
                length: 25.0,
                width: 9.5,
                arch_height: 1.8,
                instep_height: 2.5,
                deformity: Some(angles),
                ..Default::default()
            },
            None,
        )
    }

    #[tokio::test]
    async fn large_hallux_valgus_angle_scores_bunion_severe() {
        let angles = DeformityAngles {
            hallux_valgus_angle: 22.0,
            intermetatarsal_angle: 12.0,
            ..Default::default()
        };
        let result = DeformityModel::new().analyze(&with_angles(angles)).await.unwrap();
        assert_eq!(result.condition, Condition::Bunion);
        assert_eq!(result.severity, Severity::Severe);
        // score 34 clamps the confidence at the cap
        assert!((result.confidence - 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn pip_flexion_without_mtp_extension_is_hammer_toe() {
        let angles = DeformityAngles {
            pip_flexion: 11.0,
            dip_flexion: 2.0,
            ..Default::default()
        };
        let result = DeformityModel::new().analyze(&with_angles(angles)).await.unwrap();
        assert_eq!(result.condition, Condition::HammerToe);
        assert_eq!(result.severity, Severity::Moderate);
    }

    #[tokio::test]
    async fn combined_joint_angles_prefer_claw_toe() {
        let angles = DeformityAngles {
            mtp_extension: 10.0,
            pip_flexion: 8.0,
            dip_flexion: 4.0,
            ..Default::default()
        };
        let result = DeformityModel::new().analyze(&with_angles(angles)).await.unwrap();
        assert_eq!(result.condition, Condition::ClawToe);
        assert_eq!(result.severity, Severity::Severe);
    }

    #[tokio::test]
    async fn small_angles_report_no_deformity() {
        let angles = DeformityAngles {
            hallux_valgus_angle: 3.0,
            pip_flexion: 1.0,
            ..Default::default()
        };
        let result = DeformityModel::new().analyze(&with_angles(angles)).await.unwrap();
        assert_eq!(result.condition, Condition::NoDeformity);
        assert_eq!(result.severity, Severity::None);
        assert!(!result.is_abstention());
    }

    #[tokio::test]
    async fn missing_angles_abstain() {
        let input = SkinToneCalibrator::new().calibrate(MeasurementSet::default(), None);
        let result = DeformityModel::new().analyze(&input).await.unwrap();
        assert!(result.is_abstention());
    }
}
