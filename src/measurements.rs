use serde::{Deserialize, Serialize};

/// Complete per-foot measurement set produced by the upstream scan
/// pipeline. Immutable input to one diagnostic run; left and right feet
/// are analyzed independently.
///
/// Linear dimensions are centimeters, angles are degrees, pressures are
/// kPa, perfusion is a 0-100 index and pulse amplitude is 0-1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MeasurementSet {
    pub length: f64,
    pub width: f64,
    pub arch_height: f64,
    pub instep_height: f64,
    #[serde(default)]
    pub side: FootSide,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<ArchIndices>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hindfoot_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deformity: Option<DeformityAngles>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<PressureSamples>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gait: Option<GaitParameters>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FootSide {
    #[default]
    Left,
    Right,
}

/// Footprint- and profile-derived arch indices. Every field is optional:
/// the upstream pipeline emits whichever indices the captured views
/// allowed it to compute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ArchIndices {
    /// Arch height at midfoot / truncated foot length. Normal 0.24-0.31.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch_height_index: Option<f64>,
    /// Medial longitudinal arch angle in degrees. Normal 130-150.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medial_arch_angle: Option<f64>,
    /// Midfoot width / forefoot width as a percentage. Normal 30-45.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chippaux_smirak_index: Option<f64>,
    /// Navicular drop (Feiss line) in cm. Normal 0-0.5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navicular_drop: Option<f64>,
    /// Seated AHI / standing AHI. Normal 0.85-0.90.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch_rigidity_index: Option<f64>,
    /// Arch deformation under simulated gait load, 0-1. Ideal 0.3-0.7.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_deformation_index: Option<f64>,
    /// Staheli index: midfoot width / heel width. Normal 0.5-0.7.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staheli_index: Option<f64>,
    /// Footprint valgus index, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valgus_index: Option<f64>,
}

impl ArchIndices {
    pub fn is_empty(&self) -> bool {
        self.arch_height_index.is_none()
            && self.medial_arch_angle.is_none()
            && self.chippaux_smirak_index.is_none()
            && self.navicular_drop.is_none()
            && self.arch_rigidity_index.is_none()
            && self.dynamic_deformation_index.is_none()
            && self.staheli_index.is_none()
            && self.valgus_index.is_none()
    }
}

/// Joint angles used by the structural deformity classifier, degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeformityAngles {
    pub hallux_valgus_angle: f64,
    pub intermetatarsal_angle: f64,
    pub pip_flexion: f64,
    pub dip_flexion: f64,
    pub mtp_extension: f64,
}

/// One pressure/perfusion sample for an anatomical zone half.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RegionSample {
    /// Average plantar pressure, kPa.
    pub average_pressure: f64,
    /// Peak plantar pressure, kPa.
    pub peak_pressure: f64,
    /// Capillary perfusion index, 0-100 (higher is better).
    pub perfusion: f64,
    /// Pulsatile blood-flow amplitude, 0-1 (higher is better).
    pub pulse_amplitude: f64,
}

/// Pressure samples for the six anatomical regions
/// (forefoot/midfoot/rearfoot x medial/lateral).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PressureSamples {
    pub forefoot_medial: RegionSample,
    pub forefoot_lateral: RegionSample,
    pub midfoot_medial: RegionSample,
    pub midfoot_lateral: RegionSample,
    pub rearfoot_medial: RegionSample,
    pub rearfoot_lateral: RegionSample,
}

impl PressureSamples {
    /// Regions in a fixed anatomical order.
    pub fn regions(&self) -> [(&'static str, &RegionSample); 6] {
        [
            ("forefoot_medial", &self.forefoot_medial),
            ("forefoot_lateral", &self.forefoot_lateral),
            ("midfoot_medial", &self.midfoot_medial),
            ("midfoot_lateral", &self.midfoot_lateral),
            ("rearfoot_medial", &self.rearfoot_medial),
            ("rearfoot_lateral", &self.rearfoot_lateral),
        ]
    }

    pub fn regions_mut(&mut self) -> [&mut RegionSample; 6] {
        [
            &mut self.forefoot_medial,
            &mut self.forefoot_lateral,
            &mut self.midfoot_medial,
            &mut self.midfoot_lateral,
            &mut self.rearfoot_medial,
            &mut self.rearfoot_lateral,
        ]
    }
}

/// Temporal gait parameters extracted from the capture sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GaitParameters {
    /// Steps per minute.
    pub cadence: f64,
    /// Meters.
    pub stride_length: f64,
    /// Percent of gait cycle in stance phase. Normal 58-62.
    pub stance_percentage: f64,
    /// Left/right asymmetry, 0-1. Normal below 0.2.
    pub asymmetry_index: f64,
}

/// RGB statistics sampled from skin areas of the scan, used for
/// skin-tone calibration. Channels are 0-255.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSample {
    pub mean_rgb: [f64; 3],
    pub std_rgb: [f64; 3],
}

/// Patient-specific context considered by the recommendation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PatientContext {
    #[serde(default)]
    pub medical_history: Vec<String>,
    #[serde(default)]
    pub previous_foot_pain: bool,
    #[serde(default)]
    pub previous_orthotics: bool,
    #[serde(default)]
    pub ulcer_history: bool,
    #[serde(default)]
    pub leg_length_discrepancy: bool,
}

impl PatientContext {
    pub fn history_contains(&self, needle: &str) -> bool {
        self.medical_history
            .iter()
            .any(|entry| entry.to_lowercase().contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_set_round_trips_through_json() {
        let set = MeasurementSet {
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
        };

        let json = serde_json::to_string(&set).unwrap();
        let back: MeasurementSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
    }

    #[test]
    fn optional_blocks_are_omitted_when_absent() {
        let json = serde_json::to_value(MeasurementSet::default()).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("pressure"));
        assert!(!obj.contains_key("gait"));
        assert!(!obj.contains_key("deformity"));
    }

    #[test]
    fn arch_indices_with_only_footprint_ratios_are_not_empty() {
        let indices = ArchIndices {
            staheli_index: Some(0.85),
            ..Default::default()
        };
        assert!(!indices.is_empty());
        let indices = ArchIndices {
            valgus_index: Some(12.0),
            ..Default::default()
        };
        assert!(!indices.is_empty());
        assert!(ArchIndices::default().is_empty());
    }

    #[test]
    fn patient_history_lookup_is_case_insensitive() {
        let ctx = PatientContext {
            medical_history: vec!["Type 2 Diabetes".to_string(), "Neuropathy".to_string()],
            ..Default::default()
        };
        assert!(ctx.history_contains("diabetes"));
        assert!(ctx.history_contains("neuropathy"));
        assert!(!ctx.history_contains("charcot"));
    }
}
