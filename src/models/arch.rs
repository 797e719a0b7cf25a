//! Arch-type classification from footprint and profile indices.
//!
//! Up to six independent clinical methods vote on the arch type; their
//! weighted fusion produces the model confidence. The arch degree is a
//! 0-5 scale cut on the Arch Height Index (0 = normal, 5 = most
//! severe), which downstream orthotic rules key on.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::calibration::CalibratedMeasurements;
use crate::error::Result;
use crate::measurements::ArchIndices;
use crate::model::{
    ClassificationMethodResult, Classifier, Condition, ModelId, ModelResult, Severity,
    TreatmentRecommendations,
};
use crate::models::{WeightedMethod, excess_confidence, fuse_methods, normal_band_confidence};

/// Evidence weights per method. Sums to 1.0.
const WEIGHT_AHI: f64 = 0.25;
const WEIGHT_MAA: f64 = 0.20;
const WEIGHT_CSI: f64 = 0.15;
const WEIGHT_NAVICULAR: f64 = 0.15;
const WEIGHT_RIGIDITY: f64 = 0.10;
const WEIGHT_DYNAMIC: f64 = 0.15;
const TOTAL_WEIGHT: f64 = 1.0;

// Normal ranges and deviation scales per method.
const AHI_RANGE: (f64, f64) = (0.24, 0.31);
const AHI_SCALE: f64 = 0.24;
const MAA_RANGE: (f64, f64) = (130.0, 150.0);
const MAA_SCALE: f64 = 20.0;
const CSI_RANGE: (f64, f64) = (30.0, 45.0);
const CSI_SCALE: f64 = 20.0;
const STAHELI_RANGE: (f64, f64) = (0.5, 0.7);
const STAHELI_SCALE: f64 = 0.3;
const NAVICULAR_RANGE: (f64, f64) = (0.2, 0.5);
const NAVICULAR_SCALE: f64 = 0.5;
const RIGIDITY_RANGE: (f64, f64) = (0.85, 0.90);
const RIGIDITY_SCALE: f64 = 0.10;
const DYNAMIC_RANGE: (f64, f64) = (0.3, 0.7);
const DYNAMIC_SCALE: f64 = 0.3;

/// Truncated foot length (heel to first metatarsal head) as a fraction
/// of total length, used when the AHI must be estimated from raw
/// geometry.
const TRUNCATED_LENGTH_RATIO: f64 = 0.73;

pub struct ArchTypeModel;

impl ArchTypeModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ArchTypeModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for ArchTypeModel {
    fn id(&self) -> ModelId {
        ModelId::ArchType
    }

    fn name(&self) -> &str {
        "Arch Type Analysis"
    }

    fn description(&self) -> &str {
        "Classifies the medial longitudinal arch as flat, normal or high \
         by fusing footprint and profile indices"
    }

    async fn analyze(&self, input: &CalibratedMeasurements) -> Result<ModelResult> {
        let m = &input.calibrated;
        let indices = resolve_indices(m.arch.as_ref(), m.arch_height, m.length);
        let Some(indices) = indices else {
            return Ok(ModelResult::abstained("no arch indices or usable geometry"));
        };

        let methods = evaluate_methods(&indices);
        let Some(fused) = fuse_methods(&methods, TOTAL_WEIGHT) else {
            return Ok(ModelResult::abstained("no arch indices or usable geometry"));
        };

        debug!(
            condition = ?fused.condition,
            agreement = fused.agreement,
            coverage = fused.coverage,
            "arch methods fused"
        );

        let severity = severity_for(fused.condition, &indices);
        let degree = arch_degree(fused.condition, severity, indices.arch_height_index);
        let rigidity = rigidity_class(indices.arch_rigidity_index);

        let mut result = ModelResult::new(fused.condition, fused.confidence, severity)
            .with_description(describe(fused.condition, severity))
            .with_detail("arch_type", json!(arch_type_label(fused.condition)))
            .with_detail("arch_degree", json!(degree))
            .with_detail(
                "method_agreement",
                json!({
                    "agreement": fused.agreement,
                    "coverage": fused.coverage,
                    "methods_evaluated": methods.len(),
                }),
            )
            .with_detail(
                "clinical_summary",
                json!(clinical_summary(fused.condition, severity, &indices)),
            );
        if let Some(rigidity) = rigidity {
            result = result.with_detail("arch_rigidity", json!(rigidity));
        }
        result.classification_methods = methods.into_iter().map(|m| m.result).collect();
        result.treatment_recommendations =
            Some(recommendations(fused.condition, severity, rigidity));
        Ok(result)
    }
}

/// Use the supplied indices, or fall back to an AHI estimated from the
/// arch height and foot length when the footprint pipeline produced
/// nothing.
fn resolve_indices(
    indices: Option<&ArchIndices>,
    arch_height: f64,
    length: f64,
) -> Option<ArchIndices> {
    match indices {
        Some(indices) if !indices.is_empty() => Some(indices.clone()),
        _ if arch_height > 0.0 && length > 0.0 => Some(ArchIndices {
            arch_height_index: Some(arch_height / (length * TRUNCATED_LENGTH_RATIO)),
            ..Default::default()
        }),
        _ => None,
    }
}

fn evaluate_methods(indices: &ArchIndices) -> Vec<WeightedMethod> {
    let mut methods = Vec::new();
    let mut push = |value: Option<f64>,
                    weight: f64,
                    name: &str,
                    range: (f64, f64),
                    scale: f64,
                    below: Condition,
                    above: Condition| {
        if let Some(value) = value {
            methods.push(WeightedMethod {
                result: classify_value(value, name, range, scale, below, above),
                weight,
            });
        }
    };

    // Low AHI means a collapsed arch; the angle and footprint indices
    // run the other way (flat feet widen the footprint and open the
    // arch angle).
    push(
        indices.arch_height_index,
        WEIGHT_AHI,
        "arch_height_index",
        AHI_RANGE,
        AHI_SCALE,
        Condition::FlatFeet,
        Condition::HighArch,
    );
    push(
        indices.medial_arch_angle,
        WEIGHT_MAA,
        "medial_arch_angle",
        MAA_RANGE,
        MAA_SCALE,
        Condition::HighArch,
        Condition::FlatFeet,
    );
    push(
        indices.chippaux_smirak_index,
        WEIGHT_CSI,
        "chippaux_smirak_index",
        CSI_RANGE,
        CSI_SCALE,
        Condition::HighArch,
        Condition::FlatFeet,
    );
    // The Staheli index is a supplementary footprint width ratio; it
    // fills the Chippaux-Smirak evidence slot when that index is
    // missing, never in addition to it.
    if indices.chippaux_smirak_index.is_none() {
        push(
            indices.staheli_index,
            WEIGHT_CSI,
            "staheli_index",
            STAHELI_RANGE,
            STAHELI_SCALE,
            Condition::HighArch,
            Condition::FlatFeet,
        );
    }
    push(
        indices.navicular_drop,
        WEIGHT_NAVICULAR,
        "navicular_drop",
        NAVICULAR_RANGE,
        NAVICULAR_SCALE,
        Condition::HighArch,
        Condition::FlatFeet,
    );
    push(
        indices.arch_rigidity_index,
        WEIGHT_RIGIDITY,
        "arch_rigidity_index",
        RIGIDITY_RANGE,
        RIGIDITY_SCALE,
        Condition::FlatFeet,
        Condition::HighArch,
    );
    push(
        indices.dynamic_deformation_index,
        WEIGHT_DYNAMIC,
        "dynamic_arch_response",
        DYNAMIC_RANGE,
        DYNAMIC_SCALE,
        Condition::HighArch,
        Condition::FlatFeet,
    );
    methods
}

fn classify_value(
    value: f64,
    method: &str,
    (lo, hi): (f64, f64),
    scale: f64,
    below: Condition,
    above: Condition,
) -> ClassificationMethodResult {
    let (classification, confidence) = if value < lo {
        (below, excess_confidence(lo - value, scale))
    } else if value > hi {
        (above, excess_confidence(value - hi, scale))
    } else {
        (Condition::NormalArch, normal_band_confidence(value, lo, hi))
    };
    ClassificationMethodResult {
        classification,
        confidence,
        value,
        normal_range: format!("{lo}-{hi}"),
        method: method.to_string(),
    }
}

fn severity_for(condition: Condition, indices: &ArchIndices) -> Severity {
    let ahi = indices.arch_height_index;
    let maa = indices.medial_arch_angle;
    let csi = indices.chippaux_smirak_index;

    match condition {
        Condition::FlatFeet => {
            if ahi.is_some_and(|v| v < 0.15)
                || csi.is_some_and(|v| v > 65.0)
                || maa.is_some_and(|v| v > 165.0)
            {
                Severity::Severe
            } else if ahi.is_some_and(|v| v < 0.20)
                || csi.is_some_and(|v| v > 55.0)
                || maa.is_some_and(|v| v > 155.0)
            {
                Severity::Moderate
            } else {
                Severity::Mild
            }
        }
        Condition::HighArch => {
            if ahi.is_some_and(|v| v > 0.40)
                || csi.is_some_and(|v| v < 15.0)
                || maa.is_some_and(|v| v < 110.0)
            {
                Severity::Severe
            } else if ahi.is_some_and(|v| v > 0.35)
                || csi.is_some_and(|v| v < 20.0)
                || maa.is_some_and(|v| v < 120.0)
            {
                Severity::Moderate
            } else {
                Severity::Mild
            }
        }
        _ => Severity::None,
    }
}

/// Arch degree on a 0-5 scale, cut on the AHI when available, otherwise
/// mapped from severity.
fn arch_degree(condition: Condition, severity: Severity, ahi: Option<f64>) -> u8 {
    match (condition, ahi) {
        (Condition::FlatFeet, Some(ahi)) => {
            if ahi >= 0.21 {
                1
            } else if ahi >= 0.18 {
                2
            } else if ahi >= 0.15 {
                3
            } else if ahi >= 0.10 {
                4
            } else {
                5
            }
        }
        (Condition::HighArch, Some(ahi)) => {
            if ahi <= 0.34 {
                1
            } else if ahi <= 0.38 {
                2
            } else if ahi <= 0.42 {
                3
            } else if ahi <= 0.46 {
                4
            } else {
                5
            }
        }
        (Condition::FlatFeet | Condition::HighArch, None) => match severity {
            Severity::Severe => 5,
            Severity::Moderate => 3,
            _ => 1,
        },
        _ => 0,
    }
}

fn arch_type_label(condition: Condition) -> &'static str {
    match condition {
        Condition::FlatFeet => "Flat Arch",
        Condition::HighArch => "High Arch",
        _ => "Normal Arch",
    }
}

fn rigidity_class(ari: Option<f64>) -> Option<&'static str> {
    let ari = ari?;
    Some(if ari < RIGIDITY_RANGE.0 {
        "flexible"
    } else if ari > RIGIDITY_RANGE.1 {
        "rigid"
    } else {
        "semi-rigid"
    })
}

fn describe(condition: Condition, severity: Severity) -> String {
    match condition {
        Condition::FlatFeet => format!(
            "{severity} flattening of the medial longitudinal arch with \
             increased midfoot ground contact"
        ),
        Condition::HighArch => format!(
            "{severity} elevation of the medial longitudinal arch with \
             reduced midfoot ground contact"
        ),
        _ => "Medial longitudinal arch within normal limits".to_string(),
    }
}

fn clinical_summary(condition: Condition, severity: Severity, indices: &ArchIndices) -> String {
    let mut findings = Vec::new();
    if let Some(ahi) = indices.arch_height_index {
        findings.push(format!("Arch Height Index {ahi:.3} (normal 0.24-0.31)"));
    }
    if let Some(maa) = indices.medial_arch_angle {
        findings.push(format!(
            "Medial Longitudinal Arch Angle {maa:.1} deg (normal 130-150)"
        ));
    }
    if let Some(csi) = indices.chippaux_smirak_index {
        findings.push(format!("Chippaux-Smirak Index {csi:.1}% (normal 30-45)"));
    }
    let findings = if findings.is_empty() {
        "derived arch geometry".to_string()
    } else {
        findings.join("; ")
    };
    match condition {
        Condition::NormalArch => format!("Normal arch morphology: {findings}."),
        _ => format!(
            "{}, {} severity: {}.",
            condition.display_name(),
            severity,
            findings
        ),
    }
}

fn recommendations(
    condition: Condition,
    severity: Severity,
    rigidity: Option<&'static str>,
) -> TreatmentRecommendations {
    let mut recs = TreatmentRecommendations {
        priority_level: severity,
        ..Default::default()
    };
    match condition {
        Condition::FlatFeet => {
            recs.footwear = vec![
                "Motion-control shoes with firm midsole".to_string(),
                "Straight or semi-curved last".to_string(),
            ];
            recs.orthotics = if rigidity == Some("rigid") {
                vec!["Accommodative orthosis with cushioned arch fill".to_string()]
            } else {
                vec![
                    "Semi-rigid functional orthosis with medial arch support".to_string(),
                    "Medial heel wedge".to_string(),
                ]
            };
            recs.exercises = vec![
                "Short-foot (intrinsic strengthening) exercises".to_string(),
                "Tibialis posterior strengthening".to_string(),
                "Calf stretching".to_string(),
            ];
            if severity >= Severity::Moderate {
                recs.monitoring
                    .push("Reassess arch height and symptoms in 3 months".to_string());
            }
            recs.specialist_referral = severity == Severity::Severe;
        }
        Condition::HighArch => {
            recs.footwear = vec![
                "Cushioned neutral shoes with flexible midsole".to_string(),
                "Curved last with ample toe box".to_string(),
            ];
            recs.orthotics = vec![
                "Cushioned orthosis with lateral forefoot posting".to_string(),
                "Shock-absorbing heel cup".to_string(),
            ];
            recs.exercises = vec![
                "Plantar fascia and calf stretching".to_string(),
                "Peroneal strengthening".to_string(),
            ];
            if severity >= Severity::Moderate {
                recs.monitoring
                    .push("Monitor lateral column overload and ankle stability".to_string());
            }
            recs.specialist_referral = severity == Severity::Severe;
        }
        _ => {
            recs.footwear = vec!["Well-fitted neutral footwear".to_string()];
            recs.monitoring = vec!["Routine screening at next scan".to_string()];
        }
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::SkinToneCalibrator;
    use crate::measurements::MeasurementSet;

    fn calibrated(set: MeasurementSet) -> CalibratedMeasurements {
        SkinToneCalibrator::new().calibrate(set, None)
    }

    fn flat_scenario() -> MeasurementSet {
        MeasurementSet {
            length: 22.0,
            width: 7.0,
            arch_height: 0.7,
            instep_height: 1.5,
            arch: Some(ArchIndices {
                arch_height_index: Some(0.05),
                medial_arch_angle: Some(170.0),
                chippaux_smirak_index: Some(73.077),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn severely_collapsed_arch_classifies_flat_feet() {
        let result = ArchTypeModel::new()
            .analyze(&calibrated(flat_scenario()))
            .await
            .unwrap();

        assert_eq!(result.condition, Condition::FlatFeet);
        assert_eq!(result.condition_name, "Flat Feet (Pes Planus)");
        assert_eq!(result.severity, Severity::Severe);
        // Three of six methods present: fused 0.974 degraded by the
        // 0.88 coverage factor.
        assert!((result.confidence - 0.8575).abs() < 0.005);
        assert_eq!(result.details["arch_type"], json!("Flat Arch"));
        assert_eq!(result.details["arch_degree"], json!(5));

        let ahi_method = result
            .classification_methods
            .iter()
            .find(|m| m.method == "arch_height_index")
            .unwrap();
        assert_eq!(ahi_method.classification, Condition::FlatFeet);
        assert!((ahi_method.confidence - 0.94).abs() < 0.01);
    }

    #[tokio::test]
    async fn full_normal_evidence_earns_agreement_boost() {
        let set = MeasurementSet {
            length: 26.0,
            width: 9.8,
            arch_height: 1.9,
            instep_height: 2.6,
            arch: Some(ArchIndices {
                arch_height_index: Some(0.27),
                medial_arch_angle: Some(140.0),
                chippaux_smirak_index: Some(37.0),
                navicular_drop: Some(0.35),
                arch_rigidity_index: Some(0.875),
                dynamic_deformation_index: Some(0.5),
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = ArchTypeModel::new()
            .analyze(&calibrated(set))
            .await
            .unwrap();

        assert_eq!(result.condition, Condition::NormalArch);
        assert_eq!(result.severity, Severity::None);
        assert_eq!(result.details["arch_degree"], json!(0));
        assert!(result.confidence > 0.85);
        assert!(result.confidence <= 0.95);
    }

    #[tokio::test]
    async fn lone_high_ahi_classifies_high_arch_with_degraded_confidence() {
        let set = MeasurementSet {
            length: 25.0,
            width: 9.0,
            arch_height: 3.0,
            instep_height: 3.2,
            arch: Some(ArchIndices {
                arch_height_index: Some(0.45),
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = ArchTypeModel::new()
            .analyze(&calibrated(set))
            .await
            .unwrap();

        assert_eq!(result.condition, Condition::HighArch);
        assert_eq!(result.severity, Severity::Severe);
        assert_eq!(result.details["arch_degree"], json!(4));
        // single method out of six, heavily degraded
        assert!(result.confidence < 0.70);
    }

    #[tokio::test]
    async fn staheli_index_substitutes_for_a_missing_chippaux_smirak() {
        let set = MeasurementSet {
            arch: Some(ArchIndices {
                staheli_index: Some(0.85),
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = ArchTypeModel::new()
            .analyze(&calibrated(set))
            .await
            .unwrap();

        assert!(!result.is_abstention());
        assert_eq!(result.condition, Condition::FlatFeet);
        assert_eq!(result.severity, Severity::Mild);
        // lone footprint ratio, heavily degraded
        assert!(result.confidence < 0.70);
        assert!(result
            .classification_methods
            .iter()
            .any(|m| m.method == "staheli_index"));
    }

    #[tokio::test]
    async fn staheli_index_is_ignored_when_chippaux_smirak_is_present() {
        let mut set = flat_scenario();
        if let Some(arch) = set.arch.as_mut() {
            arch.staheli_index = Some(0.85);
        }
        let result = ArchTypeModel::new()
            .analyze(&calibrated(set))
            .await
            .unwrap();

        assert_eq!(result.details["method_agreement"]["methods_evaluated"], json!(3));
        assert!(result
            .classification_methods
            .iter()
            .all(|m| m.method != "staheli_index"));
        assert!((result.confidence - 0.8575).abs() < 0.005);
    }

    #[tokio::test]
    async fn missing_indices_fall_back_to_estimated_ahi() {
        let set = MeasurementSet {
            length: 25.0,
            width: 9.0,
            arch_height: 1.8,
            instep_height: 2.5,
            ..Default::default()
        };
        let result = ArchTypeModel::new()
            .analyze(&calibrated(set))
            .await
            .unwrap();

        assert!(!result.is_abstention());
        // 1.8 / (25 * 0.73) = 0.0986 -> flat
        assert_eq!(result.condition, Condition::FlatFeet);
    }

    #[tokio::test]
    async fn empty_measurements_abstain() {
        let result = ArchTypeModel::new()
            .analyze(&calibrated(MeasurementSet::default()))
            .await
            .unwrap();
        assert!(result.is_abstention());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn degree_scale_covers_both_directions() {
        assert_eq!(arch_degree(Condition::FlatFeet, Severity::Mild, Some(0.22)), 1);
        assert_eq!(arch_degree(Condition::FlatFeet, Severity::Severe, Some(0.05)), 5);
        assert_eq!(arch_degree(Condition::HighArch, Severity::Mild, Some(0.33)), 1);
        assert_eq!(arch_degree(Condition::HighArch, Severity::Severe, Some(0.50)), 5);
        assert_eq!(arch_degree(Condition::NormalArch, Severity::None, Some(0.27)), 0);
    }
}
