//! Skin-tone calibration for optically derived metrics.
//!
//! Perfusion and pressure readings extracted from color imagery are
//! systematically biased by melanin content: standard optical methods
//! underestimate perfusion on darker skin. The calibrator estimates a
//! Fitzpatrick-like skin type from RGB statistics and derives small
//! multiplicative corrections so that downstream absolute-threshold
//! comparisons classify identical physiology identically across skin
//! tones.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::measurements::{ColorSample, MeasurementSet};

/// Fitzpatrick-like skin type, ordinal 1 (very fair) to 6 (dark brown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkinType {
    Type1,
    Type2,
    Type3,
    Type4,
    Type5,
    Type6,
}

impl SkinType {
    pub fn ordinal(self) -> u8 {
        match self {
            SkinType::Type1 => 1,
            SkinType::Type2 => 2,
            SkinType::Type3 => 3,
            SkinType::Type4 => 4,
            SkinType::Type5 => 5,
            SkinType::Type6 => 6,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SkinType::Type1 => "Very fair skin, always burns, never tans",
            SkinType::Type2 => "Fair skin, burns easily, tans minimally",
            SkinType::Type3 => "Medium skin, sometimes burns, gradually tans",
            SkinType::Type4 => "Olive skin, minimally burns, tans well",
            SkinType::Type5 => "Brown skin, rarely burns, tans darkly",
            SkinType::Type6 => "Dark brown to black skin, never burns",
        }
    }
}

/// Melanin-index buckets for each skin type, in ascending order.
const MELANIN_BUCKETS: [(SkinType, f64, f64); 6] = [
    (SkinType::Type1, 0.0, 0.15),
    (SkinType::Type2, 0.15, 0.25),
    (SkinType::Type3, 0.25, 0.40),
    (SkinType::Type4, 0.40, 0.55),
    (SkinType::Type5, 0.55, 0.75),
    (SkinType::Type6, 0.75, 1.0),
];

/// Calibration profile derived once per scan and applied to every model
/// that consumes optical metrics. Never persisted beyond the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinToneProfile {
    pub skin_type: SkinType,
    pub melanin_index: f64,
    /// Multiplier applied to perfusion and pulse-amplitude readings.
    pub perfusion_adjustment: f64,
    /// Multiplier applied to absolute pressure thresholds.
    pub pressure_threshold_adjustment: f64,
    /// RGB channel weights tuned for vascular visibility on this type.
    pub channel_weights: [f64; 3],
    pub calibration_applied: bool,
    pub description: String,
}

impl SkinToneProfile {
    /// Pass-through profile used when no color sample is available.
    pub fn neutral() -> Self {
        Self {
            skin_type: SkinType::Type3,
            melanin_index: 0.3,
            perfusion_adjustment: 1.0,
            pressure_threshold_adjustment: 1.0,
            channel_weights: [1.0, 1.0, 1.0],
            calibration_applied: false,
            description: "No color sample available; neutral calibration applied".to_string(),
        }
    }
}

/// Measurement set after calibration. The raw values are retained
/// alongside the calibrated copy for auditability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedMeasurements {
    pub raw: MeasurementSet,
    pub calibrated: MeasurementSet,
    pub profile: SkinToneProfile,
}

/// Classifies the detected skin type from color samples and produces a
/// calibrated copy of the measurement set. Stateless; construct freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkinToneCalibrator;

impl SkinToneCalibrator {
    pub fn new() -> Self {
        Self
    }

    /// Calibrate a measurement set. Missing color samples degrade to a
    /// neutral profile; this never fails the run.
    pub fn calibrate(
        &self,
        measurements: MeasurementSet,
        sample: Option<&ColorSample>,
    ) -> CalibratedMeasurements {
        let profile = match sample {
            Some(sample) => self.profile_from_sample(sample),
            None => {
                debug!("no color sample; skin-tone calibration skipped");
                SkinToneProfile::neutral()
            }
        };

        let mut calibrated = measurements.clone();
        if profile.calibration_applied {
            if let Some(pressure) = calibrated.pressure.as_mut() {
                for region in pressure.regions_mut() {
                    region.perfusion =
                        (region.perfusion * profile.perfusion_adjustment).clamp(0.0, 100.0);
                    region.pulse_amplitude =
                        (region.pulse_amplitude * profile.perfusion_adjustment).clamp(0.0, 1.0);
                }
            }
            info!(
                skin_type = ?profile.skin_type,
                melanin_index = profile.melanin_index,
                perfusion_adjustment = profile.perfusion_adjustment,
                "applied skin-tone calibration"
            );
        }

        CalibratedMeasurements {
            raw: measurements,
            calibrated,
            profile,
        }
    }

    fn profile_from_sample(&self, sample: &ColorSample) -> SkinToneProfile {
        let melanin_index = melanin_index(sample);
        let skin_type = bucket_skin_type(melanin_index);

        let (perfusion_adjustment, pressure_threshold_adjustment) = match skin_type {
            SkinType::Type1 | SkinType::Type2 => (0.95, 0.97),
            SkinType::Type3 | SkinType::Type4 => (1.0, 1.0),
            SkinType::Type5 | SkinType::Type6 => (1.10, 1.08),
        };

        let channel_weights = match skin_type {
            SkinType::Type1 => [0.85, 1.05, 1.1],
            SkinType::Type2 => [0.9, 1.05, 1.05],
            SkinType::Type3 => [1.0, 1.05, 0.95],
            SkinType::Type4 => [1.1, 1.0, 0.9],
            SkinType::Type5 => [1.2, 1.0, 0.8],
            SkinType::Type6 => [1.3, 1.0, 0.7],
        };

        SkinToneProfile {
            skin_type,
            melanin_index,
            perfusion_adjustment,
            pressure_threshold_adjustment,
            channel_weights,
            calibration_applied: true,
            description: format!(
                "Perfusion and pressure metrics calibrated for {} (melanin index {:.2})",
                skin_type.description(),
                melanin_index
            ),
        }
    }
}

/// Estimate a melanin index in [0, 1] from skin-area RGB statistics.
///
/// Combines a log red/green reflectance ratio with a hemoglobin term and
/// a tone-uniformity term.
fn melanin_index(sample: &ColorSample) -> f64 {
    let [r, g, _b] = sample.mean_rgb;
    let [sr, sg, sb] = sample.std_rgb;

    let base = ((r + 1.0) / (g + 1.0)).log10() * 2.0;
    let hemoglobin = (r - g) / (r + g + 1.0);
    let uniformity = sr / (sg + sb + 1.0);

    (0.6 * base + 0.25 * hemoglobin + 0.15 * uniformity).clamp(0.0, 1.0)
}

fn bucket_skin_type(melanin_index: f64) -> SkinType {
    for (skin_type, lo, hi) in MELANIN_BUCKETS {
        if melanin_index >= lo && melanin_index < hi {
            return skin_type;
        }
    }
    SkinType::Type6
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurements::{PressureSamples, RegionSample};

    fn pressure_set(perfusion: f64) -> MeasurementSet {
        let sample = RegionSample {
            average_pressure: 120.0,
            peak_pressure: 220.0,
            perfusion,
            pulse_amplitude: 0.8,
        };
        MeasurementSet {
            length: 25.0,
            width: 9.5,
            arch_height: 1.8,
            instep_height: 2.5,
            pressure: Some(PressureSamples {
                forefoot_medial: sample.clone(),
                forefoot_lateral: sample.clone(),
                midfoot_medial: sample.clone(),
                midfoot_lateral: sample.clone(),
                rearfoot_medial: sample.clone(),
                rearfoot_lateral: sample,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn missing_sample_yields_neutral_profile_and_identical_measurements() {
        let set = pressure_set(70.0);
        let calibrated = SkinToneCalibrator::new().calibrate(set.clone(), None);

        assert!(!calibrated.profile.calibration_applied);
        assert_eq!(calibrated.profile.perfusion_adjustment, 1.0);
        assert_eq!(calibrated.profile.pressure_threshold_adjustment, 1.0);
        assert_eq!(calibrated.raw, calibrated.calibrated);
        assert_eq!(calibrated.raw, set);
    }

    #[test]
    fn dark_skin_sample_boosts_perfusion_readings() {
        let sample = ColorSample {
            mean_rgb: [80.0, 50.0, 40.0],
            std_rgb: [12.0, 10.0, 9.0],
        };
        let calibrated = SkinToneCalibrator::new().calibrate(pressure_set(60.0), Some(&sample));

        assert!(calibrated.profile.calibration_applied);
        assert!(calibrated.profile.melanin_index > 0.3);
        assert!(calibrated.profile.perfusion_adjustment > 1.0);

        let raw = calibrated.raw.pressure.as_ref().unwrap();
        let cal = calibrated.calibrated.pressure.as_ref().unwrap();
        assert!(cal.forefoot_medial.perfusion > raw.forefoot_medial.perfusion);
        // raw values are retained untouched
        assert_eq!(raw.forefoot_medial.perfusion, 60.0);
    }

    #[test]
    fn fair_skin_sample_maps_to_low_type_with_reduced_sensitivity() {
        let sample = ColorSample {
            mean_rgb: [235.0, 210.0, 188.0],
            std_rgb: [8.0, 8.0, 8.0],
        };
        let calibrated = SkinToneCalibrator::new().calibrate(pressure_set(70.0), Some(&sample));

        assert!(calibrated.profile.skin_type <= SkinType::Type2);
        assert!(calibrated.profile.perfusion_adjustment < 1.0);
        assert!(calibrated.profile.pressure_threshold_adjustment < 1.0);
    }

    #[test]
    fn adjustment_factors_stay_in_observed_band() {
        for rgb in [
            [235.0, 210.0, 188.0],
            [198.0, 165.0, 140.0],
            [130.0, 95.0, 70.0],
            [80.0, 50.0, 40.0],
        ] {
            let sample = ColorSample {
                mean_rgb: rgb,
                std_rgb: [10.0, 10.0, 10.0],
            };
            let calibrated =
                SkinToneCalibrator::new().calibrate(MeasurementSet::default(), Some(&sample));
            let p = &calibrated.profile;
            assert!((0.95..=1.10).contains(&p.perfusion_adjustment));
            assert!((0.95..=1.10).contains(&p.pressure_threshold_adjustment));
        }
    }

    #[test]
    fn perfusion_is_clamped_to_valid_range() {
        let sample = ColorSample {
            mean_rgb: [80.0, 50.0, 40.0],
            std_rgb: [12.0, 10.0, 9.0],
        };
        let calibrated = SkinToneCalibrator::new().calibrate(pressure_set(99.0), Some(&sample));
        let cal = calibrated.calibrated.pressure.as_ref().unwrap();
        assert!(cal.forefoot_medial.perfusion <= 100.0);
    }
}
