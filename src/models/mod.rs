//! The six diagnostic models.
//!
//! Each model implements [`crate::Classifier`] over the same calibrated
//! input and is unaware of the others; the aggregator owns fan-out and
//! cross-model reconciliation.

mod arch;
mod deformity;
mod footwear;
mod gait;
mod pressure;
mod pronation;

pub use arch::ArchTypeModel;
pub use deformity::DeformityModel;
pub use footwear::FootwearModel;
pub use gait::GaitModel;
pub use pressure::PressureModel;
pub use pronation::PronationModel;

use crate::model::{ClassificationMethodResult, Condition};

/// One sub-method outcome together with its evidence weight.
pub(crate) struct WeightedMethod {
    pub result: ClassificationMethodResult,
    pub weight: f64,
}

/// Result of fusing several weighted sub-methods into one label.
pub(crate) struct FusedClassification {
    pub condition: Condition,
    pub confidence: f64,
    /// Fraction of present evidence weight that voted for the winner.
    pub agreement: f64,
    /// Present evidence weight / total evidence weight of the model.
    pub coverage: f64,
}

/// Fuse weighted sub-method votes into a single classification.
///
/// The winning label is the one with the most evidence weight behind it
/// (ties resolved toward the earlier-registered, higher-weighted
/// method). Its confidence is the weighted mean confidence of the
/// agreeing methods. With full evidence coverage, strong agreement earns
/// a boost (+0.10 above 80% agreement, +0.05 above 60%); with partial
/// coverage the confidence is instead degraded by
/// `0.7 + 0.3 * coverage`, so a thin evidence base can never be as
/// convincing as a full one. The result is capped at 0.95.
pub(crate) fn fuse_methods(
    methods: &[WeightedMethod],
    total_weight: f64,
) -> Option<FusedClassification> {
    if methods.is_empty() || total_weight <= 0.0 {
        return None;
    }

    let present_weight: f64 = methods.iter().map(|m| m.weight).sum();

    // Tally votes per label, preserving first-seen order for ties.
    let mut votes: Vec<(Condition, f64, f64)> = Vec::new();
    for m in methods {
        match votes.iter_mut().find(|(c, _, _)| *c == m.result.classification) {
            Some((_, weight, weighted_conf)) => {
                *weight += m.weight;
                *weighted_conf += m.weight * m.result.confidence;
            }
            None => votes.push((
                m.result.classification,
                m.weight,
                m.weight * m.result.confidence,
            )),
        }
    }

    let mut winner = &votes[0];
    for vote in &votes[1..] {
        if vote.1 > winner.1 {
            winner = vote;
        }
    }
    let (condition, winner_weight, winner_conf) = *winner;

    let agreement = winner_weight / present_weight;
    let coverage = (present_weight / total_weight).min(1.0);
    let mut confidence = winner_conf / present_weight;

    if coverage >= 1.0 - f64::EPSILON {
        if agreement > 0.8 {
            confidence += 0.10;
        } else if agreement > 0.6 {
            confidence += 0.05;
        }
    } else {
        confidence *= 0.7 + 0.3 * coverage;
    }

    Some(FusedClassification {
        condition,
        confidence: confidence.clamp(0.0, 0.95),
        agreement,
        coverage,
    })
}

/// Confidence for a value inside its normal band: highest at the band
/// midpoint, falling off toward the edges, floored so an in-range value
/// is never reported as doubtful.
pub(crate) fn normal_band_confidence(value: f64, lo: f64, hi: f64) -> f64 {
    let mid = (lo + hi) / 2.0;
    let half_width = (hi - lo) / 2.0;
    if half_width <= 0.0 {
        return 0.7;
    }
    let falloff = ((value - mid).abs() / half_width).min(1.0);
    (0.9 * (1.0 - falloff)).clamp(0.7, 0.95)
}

/// Confidence for a value outside its normal band, growing with the
/// deviation beyond the violated bound relative to `scale`.
pub(crate) fn excess_confidence(deviation: f64, scale: f64) -> f64 {
    if scale <= 0.0 {
        return 0.7;
    }
    0.7 + 0.3 * (deviation.abs() / scale).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(classification: Condition, confidence: f64) -> ClassificationMethodResult {
        ClassificationMethodResult {
            classification,
            confidence,
            value: 0.0,
            normal_range: String::new(),
            method: "test".to_string(),
        }
    }

    #[test]
    fn full_agreement_with_full_coverage_earns_boost() {
        let methods = vec![
            WeightedMethod {
                result: method(Condition::FlatFeet, 0.8),
                weight: 0.6,
            },
            WeightedMethod {
                result: method(Condition::FlatFeet, 0.8),
                weight: 0.4,
            },
        ];
        let fused = fuse_methods(&methods, 1.0).unwrap();
        assert_eq!(fused.condition, Condition::FlatFeet);
        assert!((fused.confidence - 0.9).abs() < 1e-9);
        assert!((fused.agreement - 1.0).abs() < 1e-9);
    }

    #[test]
    fn partial_coverage_degrades_instead_of_boosting() {
        let methods = vec![WeightedMethod {
            result: method(Condition::HighArch, 0.9),
            weight: 0.25,
        }];
        let fused = fuse_methods(&methods, 1.0).unwrap();
        // 0.9 * (0.7 + 0.3 * 0.25)
        assert!((fused.confidence - 0.9 * 0.775).abs() < 1e-9);
        assert!((fused.coverage - 0.25).abs() < 1e-9);
    }

    #[test]
    fn majority_weight_wins_and_dissent_lowers_agreement() {
        let methods = vec![
            WeightedMethod {
                result: method(Condition::FlatFeet, 0.9),
                weight: 0.5,
            },
            WeightedMethod {
                result: method(Condition::NormalArch, 0.8),
                weight: 0.3,
            },
            WeightedMethod {
                result: method(Condition::FlatFeet, 0.7),
                weight: 0.2,
            },
        ];
        let fused = fuse_methods(&methods, 1.0).unwrap();
        assert_eq!(fused.condition, Condition::FlatFeet);
        assert!((fused.agreement - 0.7).abs() < 1e-9);
        // 70% agreement with full coverage: +0.05 boost on the
        // winner-only weighted mean (0.5*0.9 + 0.2*0.7) / 1.0 = 0.59.
        assert!((fused.confidence - 0.64).abs() < 1e-9);
    }

    #[test]
    fn confidence_is_capped() {
        let methods = vec![WeightedMethod {
            result: method(Condition::FlatFeet, 1.0),
            weight: 1.0,
        }];
        let fused = fuse_methods(&methods, 1.0).unwrap();
        assert_eq!(fused.confidence, 0.95);
    }

    #[test]
    fn no_methods_yields_none() {
        assert!(fuse_methods(&[], 1.0).is_none());
    }

    #[test]
    fn band_confidence_peaks_at_midpoint() {
        assert!((normal_band_confidence(140.0, 130.0, 150.0) - 0.9).abs() < 1e-9);
        assert!(normal_band_confidence(149.0, 130.0, 150.0) < 0.9);
        assert_eq!(normal_band_confidence(150.0, 130.0, 150.0), 0.7);
    }

    #[test]
    fn excess_confidence_saturates_at_one_scale() {
        assert!((excess_confidence(10.0, 20.0) - 0.85).abs() < 1e-9);
        assert!((excess_confidence(20.0, 20.0) - 1.0).abs() < 1e-9);
        assert!((excess_confidence(40.0, 20.0) - 1.0).abs() < 1e-9);
    }
}
