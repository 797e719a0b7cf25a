//! Plantar pressure distribution and peripheral perfusion analysis.
//!
//! Works on the calibrated pressure block: perfusion readings have
//! already been skin-tone corrected, and the absolute pressure
//! thresholds used here are scaled by the profile's threshold
//! adjustment so the same physiology classifies the same way across
//! skin tones.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::calibration::{CalibratedMeasurements, SkinToneProfile};
use crate::error::Result;
use crate::measurements::{PressureSamples, RegionSample};
use crate::model::{
    Classifier, Condition, ModelId, ModelResult, Severity, TreatmentRecommendations,
};

/// Baseline peak-pressure thresholds in kPa, before skin-tone scaling.
const PEAK_ELEVATED_KPA: f64 = 250.0;
const PEAK_HIGH_KPA: f64 = 350.0;
const PEAK_CRITICAL_KPA: f64 = 450.0;

/// Perfusion index below which a region is considered poorly perfused.
const PERFUSION_POOR: f64 = 30.0;

/// Vascular risk score at which the vascular finding overrides the
/// pressure-distribution finding.
const VASCULAR_OVERRIDE_SCORE: f64 = 6.0;

/// Distal regions dominate the perfusion summary: forefoot, midfoot,
/// rearfoot weights.
const PERFUSION_WEIGHTS: [f64; 3] = [0.5, 0.2, 0.3];
const PULSE_WEIGHTS: [f64; 3] = [0.6, 0.1, 0.3];

pub struct PressureModel;

impl PressureModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PressureModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for PressureModel {
    fn id(&self) -> ModelId {
        ModelId::Pressure
    }

    fn name(&self) -> &str {
        "Pressure & Perfusion Analysis"
    }

    fn description(&self) -> &str {
        "Evaluates plantar pressure distribution across six anatomical \
         regions together with capillary perfusion and pulse amplitude"
    }

    async fn analyze(&self, input: &CalibratedMeasurements) -> Result<ModelResult> {
        let Some(pressure) = input.calibrated.pressure.as_ref() else {
            return Ok(ModelResult::abstained("no pressure samples captured"));
        };
        let profile = &input.profile;
        let threshold_adj = profile.pressure_threshold_adjustment;

        let shares = Distribution::from_samples(pressure);
        let vascular = VascularSummary::from_samples(pressure);
        let region_report = region_report(pressure, threshold_adj);

        let (condition, confidence) = classify(&shares, &vascular);
        let severity = severity_for(condition, &vascular, pressure, threshold_adj);

        debug!(
            condition = ?condition,
            vascular_risk_score = vascular.risk_score,
            "pressure distribution classified"
        );

        let mut result = ModelResult::new(condition, confidence, severity)
            .with_description(describe(condition, severity, &shares, &vascular))
            .with_detail("region_analysis", json!(region_report))
            .with_detail(
                "pressure_distribution",
                json!({
                    "forefoot_share": shares.forefoot,
                    "midfoot_share": shares.midfoot,
                    "rearfoot_share": shares.rearfoot,
                    "medial_share": shares.medial,
                    "lateral_share": shares.lateral,
                }),
            )
            .with_detail(
                "vascular",
                json!({
                    "vascular_risk_score": vascular.risk_score,
                    "overall_perfusion_index": vascular.perfusion_index,
                    "pulse_amplitude": vascular.pulse_amplitude,
                    "vascular_health": vascular.health_label(),
                }),
            )
            .with_detail("skin_calibration", json!(skin_calibration(profile)));
        result.treatment_recommendations = Some(recommendations(condition, severity));
        Ok(result)
    }
}

/// Pressure shares per axis of the six-region grid. Each triple/pair
/// sums to 1 when any pressure was recorded.
struct Distribution {
    forefoot: f64,
    midfoot: f64,
    rearfoot: f64,
    medial: f64,
    lateral: f64,
}

impl Distribution {
    fn from_samples(p: &PressureSamples) -> Self {
        let forefoot = p.forefoot_medial.average_pressure + p.forefoot_lateral.average_pressure;
        let midfoot = p.midfoot_medial.average_pressure + p.midfoot_lateral.average_pressure;
        let rearfoot = p.rearfoot_medial.average_pressure + p.rearfoot_lateral.average_pressure;
        let medial = p.forefoot_medial.average_pressure
            + p.midfoot_medial.average_pressure
            + p.rearfoot_medial.average_pressure;
        let lateral = p.forefoot_lateral.average_pressure
            + p.midfoot_lateral.average_pressure
            + p.rearfoot_lateral.average_pressure;
        let total = forefoot + midfoot + rearfoot;
        if total <= 0.0 {
            return Self {
                forefoot: 0.0,
                midfoot: 0.0,
                rearfoot: 0.0,
                medial: 0.0,
                lateral: 0.0,
            };
        }
        Self {
            forefoot: forefoot / total,
            midfoot: midfoot / total,
            rearfoot: rearfoot / total,
            medial: medial / total,
            lateral: lateral / total,
        }
    }
}

struct VascularSummary {
    risk_score: f64,
    perfusion_index: f64,
    pulse_amplitude: f64,
}

impl VascularSummary {
    fn from_samples(p: &PressureSamples) -> Self {
        let zone_perfusion = [
            (p.forefoot_medial.perfusion + p.forefoot_lateral.perfusion) / 2.0,
            (p.midfoot_medial.perfusion + p.midfoot_lateral.perfusion) / 2.0,
            (p.rearfoot_medial.perfusion + p.rearfoot_lateral.perfusion) / 2.0,
        ];
        let zone_pulse = [
            (p.forefoot_medial.pulse_amplitude + p.forefoot_lateral.pulse_amplitude) / 2.0,
            (p.midfoot_medial.pulse_amplitude + p.midfoot_lateral.pulse_amplitude) / 2.0,
            (p.rearfoot_medial.pulse_amplitude + p.rearfoot_lateral.pulse_amplitude) / 2.0,
        ];

        let perfusion_index: f64 = zone_perfusion
            .iter()
            .zip(PERFUSION_WEIGHTS)
            .map(|(v, w)| v * w)
            .sum();
        let pulse_amplitude: f64 = zone_pulse
            .iter()
            .zip(PULSE_WEIGHTS)
            .map(|(v, w)| v * w)
            .sum();

        let mut risk_score: f64 = 0.0;
        if perfusion_index < 40.0 {
            risk_score += 4.0;
        } else if perfusion_index < 55.0 {
            risk_score += 2.0;
        }
        if pulse_amplitude < 0.3 {
            risk_score += 3.0;
        } else if pulse_amplitude < 0.5 {
            risk_score += 1.5;
        }
        if p.regions().iter().any(|(_, r)| r.perfusion < PERFUSION_POOR) {
            risk_score += 2.0;
        }

        Self {
            risk_score: risk_score.min(10.0),
            perfusion_index,
            pulse_amplitude,
        }
    }

    fn health_label(&self) -> &'static str {
        if self.risk_score > 8.0 {
            "critical peripheral perfusion deficit"
        } else if self.risk_score > 6.0 {
            "significant peripheral perfusion deficit"
        } else if self.risk_score >= 4.0 {
            "reduced peripheral perfusion"
        } else {
            "adequate peripheral perfusion"
        }
    }
}

/// Vascular findings override pressure-distribution findings; otherwise
/// the most disproportionate share wins, with confidence growing with
/// its margin over the runner-up.
fn classify(shares: &Distribution, vascular: &VascularSummary) -> (Condition, f64) {
    if vascular.risk_score >= VASCULAR_OVERRIDE_SCORE {
        let confidence = 0.7 + ((vascular.risk_score - VASCULAR_OVERRIDE_SCORE) / 8.0).min(0.25);
        return (Condition::VascularConcern, confidence);
    }

    // Excess of each share over its expected proportion (thirds on the
    // longitudinal axis, halves on the medial/lateral axis, with slack).
    let candidates = [
        (Condition::ForefootPressure, shares.forefoot - 0.45),
        (Condition::HeelPressure, shares.rearfoot - 0.45),
        (Condition::MedialPressure, shares.medial - 0.60),
        (Condition::LateralPressure, shares.lateral - 0.60),
    ];

    let mut sorted = candidates;
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    let (winner, best) = sorted[0];
    let runner_up = sorted[1].1;

    if best <= 0.0 {
        return (Condition::NormalPressure, 0.85);
    }
    let margin = best - runner_up.max(0.0);
    (winner, 0.7 + (margin * 2.0).min(0.25))
}

fn severity_for(
    condition: Condition,
    vascular: &VascularSummary,
    pressure: &PressureSamples,
    threshold_adj: f64,
) -> Severity {
    match condition {
        Condition::VascularConcern => {
            if vascular.risk_score > 8.0 {
                Severity::Severe
            } else if vascular.risk_score > 6.0 {
                Severity::Moderate
            } else {
                Severity::Mild
            }
        }
        Condition::NormalPressure => Severity::None,
        _ => {
            let max_peak = pressure
                .regions()
                .iter()
                .map(|(_, r)| r.peak_pressure)
                .fold(0.0, f64::max);
            if max_peak > PEAK_CRITICAL_KPA * threshold_adj {
                Severity::Severe
            } else if max_peak > PEAK_HIGH_KPA * threshold_adj {
                Severity::Moderate
            } else {
                Severity::Mild
            }
        }
    }
}

fn region_report(
    pressure: &PressureSamples,
    threshold_adj: f64,
) -> BTreeMap<String, serde_json::Value> {
    pressure
        .regions()
        .iter()
        .map(|(name, region)| {
            let (risk, interpretation) = region_risk(region, threshold_adj);
            (
                (*name).to_string(),
                json!({
                    "average_pressure": region.average_pressure,
                    "peak_pressure": region.peak_pressure,
                    "perfusion": region.perfusion,
                    "pulse_amplitude": region.pulse_amplitude,
                    "risk_level": risk,
                    "interpretation": interpretation,
                }),
            )
        })
        .collect()
}

fn region_risk(region: &RegionSample, threshold_adj: f64) -> (&'static str, &'static str) {
    if region.perfusion < PERFUSION_POOR {
        return (
            "high",
            "Poor capillary perfusion; prioritize vascular assessment",
        );
    }
    if region.peak_pressure > PEAK_HIGH_KPA * threshold_adj {
        (
            "high",
            "Peak pressure well above tissue tolerance; offloading indicated",
        )
    } else if region.peak_pressure > PEAK_ELEVATED_KPA * threshold_adj {
        (
            "moderate",
            "Elevated peak pressure; monitor for callus formation",
        )
    } else {
        ("low", "Pressure and perfusion within expected limits")
    }
}

fn skin_calibration(profile: &SkinToneProfile) -> serde_json::Value {
    json!({
        "skin_type": profile.skin_type,
        "melanin_index": profile.melanin_index,
        "perfusion_adjustment": profile.perfusion_adjustment,
        "pressure_threshold_adjustment": profile.pressure_threshold_adjustment,
        "calibration_applied": profile.calibration_applied,
    })
}

fn describe(
    condition: Condition,
    severity: Severity,
    shares: &Distribution,
    vascular: &VascularSummary,
) -> String {
    match condition {
        Condition::ForefootPressure => format!(
            "{severity} forefoot overload ({:.0}% of plantar load)",
            shares.forefoot * 100.0
        ),
        Condition::HeelPressure => format!(
            "{severity} heel overload ({:.0}% of plantar load)",
            shares.rearfoot * 100.0
        ),
        Condition::MedialPressure => format!(
            "{severity} medial column overload ({:.0}% of plantar load)",
            shares.medial * 100.0
        ),
        Condition::LateralPressure => format!(
            "{severity} lateral column overload ({:.0}% of plantar load)",
            shares.lateral * 100.0
        ),
        Condition::VascularConcern => format!(
            "{severity} perfusion deficit (risk score {:.1}/10, perfusion index {:.0})",
            vascular.risk_score, vascular.perfusion_index
        ),
        _ => "Plantar load and perfusion within expected limits".to_string(),
    }
}

fn recommendations(condition: Condition, severity: Severity) -> TreatmentRecommendations {
    let mut recs = TreatmentRecommendations {
        priority_level: severity,
        ..Default::default()
    };
    match condition {
        Condition::ForefootPressure => {
            recs.orthotics = vec!["Metatarsal pad with forefoot cushioning".to_string()];
            recs.footwear = vec!["Rocker-sole shoes to offload the forefoot".to_string()];
        }
        Condition::HeelPressure => {
            recs.orthotics = vec!["Cushioned heel cup".to_string()];
            recs.exercises = vec!["Calf stretching to reduce heel-strike load".to_string()];
        }
        Condition::MedialPressure => {
            recs.orthotics = vec!["Medial arch support with load redistribution".to_string()];
        }
        Condition::LateralPressure => {
            recs.orthotics = vec!["Lateral wedge with cushioned shell".to_string()];
        }
        Condition::VascularConcern => {
            recs.monitoring = vec![
                "Daily skin inspection for pressure injury".to_string(),
                "Serial perfusion measurement".to_string(),
            ];
            recs.specialist_referral = true;
        }
        _ => {}
    }
    if severity == Severity::Severe {
        recs.specialist_referral = true;
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::SkinToneCalibrator;
    use crate::measurements::{ColorSample, MeasurementSet};

    fn region(avg: f64, peak: f64, perfusion: f64, pulse: f64) -> RegionSample {
        RegionSample {
            average_pressure: avg,
            peak_pressure: peak,
            perfusion,
            pulse_amplitude: pulse,
        }
    }

    fn healthy_region() -> RegionSample {
        region(100.0, 200.0, 70.0, 0.8)
    }

    fn with_pressure(pressure: PressureSamples) -> MeasurementSet {
        MeasurementSet {
            length: 25.0,
            width: 9.5,
            arch_height: 1.8,
            instep_height: 2.5,
            pressure: Some(pressure),
            ..Default::default()
        }
    }

    fn calibrated(set: MeasurementSet) -> CalibratedMeasurements {
        SkinToneCalibrator::new().calibrate(set, None)
    }

    #[tokio::test]
    async fn balanced_load_with_good_perfusion_is_normal() {
        let pressure = PressureSamples {
            forefoot_medial: healthy_region(),
            forefoot_lateral: healthy_region(),
            midfoot_medial: healthy_region(),
            midfoot_lateral: healthy_region(),
            rearfoot_medial: healthy_region(),
            rearfoot_lateral: healthy_region(),
        };
        let result = PressureModel::new()
            .analyze(&calibrated(with_pressure(pressure)))
            .await
            .unwrap();
        assert_eq!(result.condition, Condition::NormalPressure);
        assert_eq!(result.severity, Severity::None);
    }

    #[tokio::test]
    async fn forefoot_overload_is_detected_with_peak_driven_severity() {
        let pressure = PressureSamples {
            forefoot_medial: region(260.0, 480.0, 70.0, 0.8),
            forefoot_lateral: region(240.0, 460.0, 70.0, 0.8),
            midfoot_medial: region(60.0, 120.0, 70.0, 0.8),
            midfoot_lateral: region(60.0, 120.0, 70.0, 0.8),
            rearfoot_medial: region(90.0, 180.0, 70.0, 0.8),
            rearfoot_lateral: region(90.0, 180.0, 70.0, 0.8),
        };
        let result = PressureModel::new()
            .analyze(&calibrated(with_pressure(pressure)))
            .await
            .unwrap();
        assert_eq!(result.condition, Condition::ForefootPressure);
        assert_eq!(result.severity, Severity::Severe);
        assert!(result.confidence > 0.7);
    }

    #[tokio::test]
    async fn poor_perfusion_overrides_pressure_findings() {
        let weak = region(100.0, 200.0, 25.0, 0.2);
        let pressure = PressureSamples {
            forefoot_medial: weak.clone(),
            forefoot_lateral: weak.clone(),
            midfoot_medial: weak.clone(),
            midfoot_lateral: weak.clone(),
            rearfoot_medial: weak.clone(),
            rearfoot_lateral: weak,
        };
        let result = PressureModel::new()
            .analyze(&calibrated(with_pressure(pressure)))
            .await
            .unwrap();
        assert_eq!(result.condition, Condition::VascularConcern);
        assert_eq!(result.severity, Severity::Severe);
        let recs = result.treatment_recommendations.as_ref().unwrap();
        assert!(recs.specialist_referral);
    }

    #[tokio::test]
    async fn calibration_keeps_borderline_perfusion_out_of_vascular_concern() {
        // Perfusion readings that look borderline uncalibrated are
        // lifted above the risk thresholds for darker skin types.
        let borderline = region(100.0, 200.0, 52.0, 0.46);
        let pressure = PressureSamples {
            forefoot_medial: borderline.clone(),
            forefoot_lateral: borderline.clone(),
            midfoot_medial: borderline.clone(),
            midfoot_lateral: borderline.clone(),
            rearfoot_medial: borderline.clone(),
            rearfoot_lateral: borderline,
        };
        let dark_skin = ColorSample {
            mean_rgb: [80.0, 50.0, 40.0],
            std_rgb: [12.0, 10.0, 9.0],
        };
        let input =
            SkinToneCalibrator::new().calibrate(with_pressure(pressure), Some(&dark_skin));
        let result = PressureModel::new().analyze(&input).await.unwrap();
        assert_ne!(result.condition, Condition::VascularConcern);
        assert_eq!(
            result.details["skin_calibration"]["calibration_applied"],
            json!(true)
        );
    }

    #[tokio::test]
    async fn missing_pressure_block_abstains() {
        let result = PressureModel::new()
            .analyze(&calibrated(MeasurementSet::default()))
            .await
            .unwrap();
        assert!(result.is_abstention());
    }
}
