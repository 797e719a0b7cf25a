//! Footwear recommendation model.
//!
//! Always reports at `none` severity: it advises on fit rather than
//! diagnosing pathology, so it can never outrank a clinical finding in
//! primary-diagnosis selection.

use async_trait::async_trait;
use serde_json::json;

use crate::calibration::CalibratedMeasurements;
use crate::error::Result;
use crate::model::{Classifier, Condition, ModelId, ModelResult, Severity};

const ACTIVITIES: [&str; 6] = ["walking", "running", "hiking", "casual", "formal", "athletic"];

/// Foot-type estimate used to pick support features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FootType {
    Flat,
    Neutral,
    High,
}

impl FootType {
    fn label(self) -> &'static str {
        match self {
            FootType::Flat => "flat",
            FootType::Neutral => "neutral",
            FootType::High => "high",
        }
    }
}

pub struct FootwearModel;

impl FootwearModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FootwearModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for FootwearModel {
    fn id(&self) -> ModelId {
        ModelId::Footwear
    }

    fn name(&self) -> &str {
        "Footwear Recommendation"
    }

    fn description(&self) -> &str {
        "Derives per-activity footwear features from foot geometry and \
         arch type"
    }

    async fn analyze(&self, input: &CalibratedMeasurements) -> Result<ModelResult> {
        let m = &input.calibrated;
        if m.length <= 0.0 || m.width <= 0.0 {
            return Ok(ModelResult::abstained("no usable foot geometry"));
        }

        let foot_type = foot_type(m.arch.as_ref().and_then(|a| a.arch_height_index), m.arch_height);
        let width_category = width_category(m.width);

        let by_activity: serde_json::Map<String, serde_json::Value> = ACTIVITIES
            .iter()
            .map(|activity| {
                (
                    (*activity).to_string(),
                    json!({
                        "features": activity_features(activity, foot_type, width_category),
                        "examples": activity_examples(activity, foot_type),
                    }),
                )
            })
            .collect();

        let result = ModelResult::new(Condition::NeutralFootType, 0.85, Severity::None)
            .with_description(format!(
                "Footwear guidance for a {} arch, {} width foot",
                foot_type.label(),
                width_category
            ))
            .with_detail("foot_type", json!(foot_type.label()))
            .with_detail("width_category", json!(width_category))
            .with_detail("recommendations_by_activity", json!(by_activity));
        Ok(result)
    }
}

fn foot_type(ahi: Option<f64>, arch_height: f64) -> FootType {
    match ahi {
        Some(ahi) if ahi < 0.24 => FootType::Flat,
        Some(ahi) if ahi > 0.31 => FootType::High,
        Some(_) => FootType::Neutral,
        None if arch_height < 1.2 => FootType::Flat,
        None if arch_height > 2.4 => FootType::High,
        None => FootType::Neutral,
    }
}

fn width_category(width_cm: f64) -> &'static str {
    if width_cm < 8.5 {
        "narrow"
    } else if width_cm > 10.5 {
        "wide"
    } else {
        "standard"
    }
}

fn activity_features(activity: &str, foot_type: FootType, width_category: &str) -> Vec<String> {
    let mut features: Vec<String> = match activity {
        "walking" => vec!["Flexible forefoot".into(), "Breathable upper".into()],
        "running" => vec!["Responsive cushioning".into(), "Secure heel counter".into()],
        "hiking" => vec!["Torsional rigidity".into(), "Protective toe cap".into()],
        "casual" => vec!["Anatomic footbed".into()],
        "formal" => vec!["Removable insole for orthotics".into(), "Low heel".into()],
        _ => vec!["Lateral support for cutting movements".into()],
    };
    match foot_type {
        FootType::Flat => features.push("Structured medial arch support".into()),
        FootType::High => features.push("Extra midsole cushioning".into()),
        FootType::Neutral => features.push("Neutral support profile".into()),
    }
    match width_category {
        "narrow" => features.push("Narrow last or adjustable closure".into()),
        "wide" => features.push("Wide last with roomy toe box".into()),
        _ => {}
    }
    features
}

fn activity_examples(activity: &str, foot_type: FootType) -> Vec<&'static str> {
    match (activity, foot_type) {
        ("walking" | "casual", FootType::Flat) => {
            vec!["Motion-control walking shoe", "Supportive leather sneaker"]
        }
        ("walking" | "casual", _) => vec!["Cushioned walking shoe", "Everyday trainer"],
        ("running", FootType::Flat) => vec!["Stability road shoe"],
        ("running", FootType::High) => vec!["Max-cushion neutral road shoe"],
        ("running", FootType::Neutral) => vec!["Neutral daily trainer"],
        ("hiking", _) => vec!["Mid-cut hiking boot", "Trail shoe with rock plate"],
        ("formal", _) => vec!["Oxford with removable footbed"],
        _ => vec!["Cross-training shoe"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::SkinToneCalibrator;
    use crate::measurements::{ArchIndices, MeasurementSet};

    fn calibrated(set: MeasurementSet) -> CalibratedMeasurements {
        SkinToneCalibrator::new().calibrate(set, None)
    }

    #[tokio::test]
    async fn covers_every_activity_and_never_reports_pathology() {
        let set = MeasurementSet {
            length: 25.0,
            width: 9.5,
            arch_height: 1.8,
            instep_height: 2.5,
            ..Default::default()
        };
        let result = FootwearModel::new().analyze(&calibrated(set)).await.unwrap();

        assert_eq!(result.condition, Condition::NeutralFootType);
        assert_eq!(result.severity, Severity::None);
        let by_activity = result.details["recommendations_by_activity"]
            .as_object()
            .unwrap();
        for activity in ACTIVITIES {
            assert!(by_activity.contains_key(activity), "missing {activity}");
        }
    }

    #[tokio::test]
    async fn flat_low_arch_foot_gets_arch_support_features() {
        let set = MeasurementSet {
            length: 22.0,
            width: 7.0,
            arch_height: 0.7,
            instep_height: 1.5,
            arch: Some(ArchIndices {
                arch_height_index: Some(0.05),
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = FootwearModel::new().analyze(&calibrated(set)).await.unwrap();

        assert_eq!(result.details["foot_type"], json!("flat"));
        assert_eq!(result.details["width_category"], json!("narrow"));
        let walking = &result.details["recommendations_by_activity"]["walking"];
        let features: Vec<String> =
            serde_json::from_value(walking["features"].clone()).unwrap();
        assert!(features.iter().any(|f| f.contains("arch support")));
    }

    #[tokio::test]
    async fn identical_input_yields_identical_output() {
        let set = MeasurementSet {
            length: 27.0,
            width: 11.0,
            arch_height: 2.8,
            instep_height: 3.1,
            ..Default::default()
        };
        let a = FootwearModel::new().analyze(&calibrated(set.clone())).await.unwrap();
        let b = FootwearModel::new().analyze(&calibrated(set)).await.unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[tokio::test]
    async fn zero_geometry_abstains() {
        let result = FootwearModel::new()
            .analyze(&calibrated(MeasurementSet::default()))
            .await
            .unwrap();
        assert!(result.is_abstention());
    }
}
