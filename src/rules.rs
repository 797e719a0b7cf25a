//! Orthotic prescription rule engine.
//!
//! Turns the merged arch/alignment/pathology picture plus patient
//! context into categorized orthotic recommendations following clinical
//! prescription guidelines. Intrinsic items sit inside the orthotic
//! shell, extrinsic items are visible modifications; independently of
//! category, items at confidence 0.9 or above rank as primary.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::measurements::PatientContext;
use crate::model::{Condition, Severity};

/// Confidence at or above which a recommendation is primary.
pub const PRIMARY_RECOMMENDATION_CONFIDENCE: f64 = 0.9;

/// Frontal-plane alignment of one foot zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Varus,
    #[default]
    Neutral,
    Valgus,
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Alignment::Varus => "varus",
            Alignment::Neutral => "neutral",
            Alignment::Valgus => "valgus",
        };
        f.write_str(s)
    }
}

/// Per-zone alignment of the foot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AlignmentZones {
    pub forefoot: Alignment,
    pub midfoot: Alignment,
    pub hindfoot: Alignment,
}

/// Categorized orthotic recommendations with per-item confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OrthoticRecommendations {
    pub primary: Vec<String>,
    pub secondary: Vec<String>,
    /// Add-ons inside the orthotic shell.
    pub intrinsic: Vec<String>,
    /// Visible modifications outside the shell.
    pub extrinsic: Vec<String>,
    pub confidence_scores: BTreeMap<String, f64>,
    pub flags: BTreeMap<String, bool>,
    pub abbreviation_map: BTreeMap<String, String>,
}

impl OrthoticRecommendations {
    /// Record an item. Duplicate proposals keep the highest confidence
    /// offered for the item.
    fn add(&mut self, name: &str, intrinsic: bool, confidence: f64) {
        let confidence = confidence.clamp(0.0, 0.95);
        if !self.intrinsic.iter().any(|i| i == name)
            && !self.extrinsic.iter().any(|i| i == name)
        {
            let list = if intrinsic {
                &mut self.intrinsic
            } else {
                &mut self.extrinsic
            };
            list.push(name.to_string());
        }
        let entry = self.confidence_scores.entry(name.to_string()).or_insert(0.0);
        if confidence > *entry {
            *entry = confidence;
        }
    }

    /// Split items into primary/secondary by confidence and expand the
    /// abbreviation map. Called once, after all rules have fired.
    fn finalize(&mut self) {
        for name in self.intrinsic.iter().chain(self.extrinsic.iter()) {
            let confidence = self.confidence_scores.get(name).copied().unwrap_or(0.0);
            if confidence >= PRIMARY_RECOMMENDATION_CONFIDENCE {
                self.primary.push(name.clone());
            } else {
                self.secondary.push(name.clone());
            }
        }
        self.abbreviation_map =
            expand_abbreviations(self.intrinsic.iter().chain(self.extrinsic.iter()));
    }
}

/// Abbreviations used in orthotic item names.
pub const ABBREVIATIONS: [(&str, &str); 13] = [
    ("MP", "Metatarsal Pad"),
    ("MPL", "Metatarsal Platform"),
    ("MT Bar", "Metatarsal Bar"),
    ("AS", "Arch Support"),
    ("MAS", "Medial Arch Support"),
    ("NAS", "Navicular Arch Support"),
    ("SAW", "Supinator Anterior Wedge"),
    ("PAW", "Pronator Anterior Wedge"),
    ("SPW", "Supinator Posterior Wedge"),
    ("PPW", "Pronator Posterior Wedge"),
    ("LLD", "Leg Length Discrepancy"),
    ("1MT", "First Metatarsal"),
    ("5MT", "Fifth Metatarsal"),
];

/// Expand the abbreviations appearing in a recommendation list. The
/// abbreviation is the token before any parenthesized expansion.
pub fn expand_abbreviations<'a, I>(items: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut result = BTreeMap::new();
    for item in items {
        let token = item.split('(').next().unwrap_or(item).trim();
        if let Some((abbr, full)) = ABBREVIATIONS.iter().find(|(abbr, _)| *abbr == token) {
            result.insert((*abbr).to_string(), (*full).to_string());
        }
    }
    result
}

/// Apply the prescription rules.
///
/// `arch` is the arch-type condition, `degree` its 0-5 scale (0 =
/// normal), `pathologies` the structural/pressure conditions that
/// survived threshold filtering.
pub fn apply_orthotic_rules(
    arch: Condition,
    arch_severity: Severity,
    degree: u8,
    alignment: &AlignmentZones,
    pathologies: &[Condition],
    patient: Option<&PatientContext>,
) -> OrthoticRecommendations {
    let mut recs = OrthoticRecommendations::default();

    arch_rules(&mut recs, arch, arch_severity, degree, patient);
    alignment_rules(&mut recs, arch, degree, alignment);
    pathology_rules(&mut recs, pathologies);
    patient_rules(&mut recs, patient);

    recs.finalize();
    recs
}

fn arch_rules(
    recs: &mut OrthoticRecommendations,
    arch: Condition,
    severity: Severity,
    degree: u8,
    patient: Option<&PatientContext>,
) {
    match arch {
        Condition::FlatFeet => {
            match degree {
                0 | 1 => recs.add("AS (Arch Support)", true, 0.75),
                2 => {
                    recs.add("AS (Arch Support)", true, 0.85);
                    recs.add("MAS (Medial Arch Support)", true, 0.80);
                }
                3 => {
                    recs.add("MAS (Medial Arch Support)", true, 0.90);
                    recs.add("NAS (Navicular Arch Support)", true, 0.85);
                }
                _ => {
                    recs.add("MAS (Medial Arch Support)", true, 0.95);
                    recs.add("NAS (Navicular Arch Support)", true, 0.95);
                }
            }
            if severity == Severity::Severe {
                recs.flags.insert("severe_pes_planus".to_string(), true);
            }
        }
        Condition::HighArch => {
            if degree >= 2 {
                recs.add("Soft Cushioning", true, 0.80);
            }
            if degree >= 3 {
                recs.add("Heel Cushion Pad", true, 0.85);
                recs.add("MP (Metatarsal Pad)", true, 0.80);
            }
            if severity == Severity::Severe {
                recs.flags.insert("severe_pes_cavus".to_string(), true);
            }
        }
        _ => {
            if patient.is_some_and(|p| p.previous_foot_pain) {
                recs.add("AS (Arch Support)", true, 0.70);
            }
        }
    }
}

fn alignment_rules(
    recs: &mut OrthoticRecommendations,
    arch: Condition,
    degree: u8,
    alignment: &AlignmentZones,
) {
    let graded = 0.75 + 0.05 * f64::from(degree);

    match alignment.forefoot {
        Alignment::Valgus => {
            recs.add("Anterior Medial Wedge", false, graded);
            if degree >= 3 {
                recs.add("SAW (Supinator Anterior Wedge)", false, 0.85);
            }
        }
        Alignment::Varus => {
            recs.add("Anterior Lateral Wedge", false, graded);
            if degree >= 3 {
                recs.add("PAW (Pronator Anterior Wedge)", false, 0.85);
            }
        }
        Alignment::Neutral => {}
    }

    match alignment.midfoot {
        Alignment::Valgus => {
            recs.add("MAS (Medial Arch Support)", true, graded);
            if degree >= 2 {
                recs.add("NAS (Navicular Arch Support)", true, 0.85);
            }
        }
        Alignment::Varus => {
            if arch == Condition::HighArch {
                recs.add("AS (Arch Support)", true, 0.75);
            }
        }
        Alignment::Neutral => {}
    }

    match alignment.hindfoot {
        Alignment::Valgus => {
            recs.add("Posterior Medial Wedge", false, graded);
            if degree >= 3 {
                recs.add("SPW (Supinator Posterior Wedge)", false, 0.85);
            }
        }
        Alignment::Varus => {
            recs.add("Posterior Lateral Wedge", false, graded);
            if degree >= 3 {
                recs.add("PPW (Pronator Posterior Wedge)", false, 0.85);
            }
        }
        Alignment::Neutral => {}
    }
}

fn pathology_rules(recs: &mut OrthoticRecommendations, pathologies: &[Condition]) {
    for pathology in pathologies {
        match pathology {
            Condition::Bunion => {
                recs.add("AS (Arch Support)", true, 0.70);
                recs.add("Anterior Medial Wedge", false, 0.85);
                recs.add("Bunion Shield", true, 0.90);
            }
            Condition::HammerToe => {
                recs.add("Toe Crest", true, 0.85);
                recs.add("Toe Loop", false, 0.75);
            }
            Condition::ClawToe => {
                recs.add("Toe Crest", true, 0.85);
                recs.add("Cushioning", true, 0.80);
            }
            Condition::MalletToe => {
                recs.add("Toe Crest", true, 0.80);
            }
            Condition::ForefootPressure => {
                recs.add("MP (Metatarsal Pad)", true, 0.90);
                recs.add("Pressure Relief Pad", true, 0.90);
            }
            Condition::HeelPressure => {
                recs.add("Heel Cushion Pad", true, 0.90);
                recs.add("Pressure Relief Pad", true, 0.85);
            }
            Condition::MedialPressure | Condition::LateralPressure => {
                recs.add("Soft Cushioning", true, 0.85);
                recs.add("Pressure Relief Pad", true, 0.90);
            }
            Condition::VascularConcern => {
                recs.add("Soft Cushioning", true, 0.90);
                recs.add("Pressure Redistribution", true, 0.90);
            }
            _ => {}
        }
    }
}

fn patient_rules(recs: &mut OrthoticRecommendations, patient: Option<&PatientContext>) {
    let Some(patient) = patient else {
        return;
    };

    if patient.history_contains("diabetes") && patient.history_contains("neuropathy") {
        recs.add("Total Contact Orthotic", true, 0.95);
        recs.add("Soft Cushioning", true, 0.90);
        recs.add("Pressure Redistribution", true, 0.95);
        recs.flags.insert("high_risk_foot".to_string(), true);
    }

    if patient.history_contains("charcot") {
        recs.add("Total Contact Orthotic", true, 0.95);
        recs.add("Rocker Sole", false, 0.90);
        recs.flags.insert("high_risk_foot".to_string(), true);
    }

    if patient.history_contains("amputation") {
        recs.add("Toe Filler", true, 0.95);
        recs.add("Rocker Sole", false, 0.90);
    }

    if patient.ulcer_history || patient.history_contains("ulcer") {
        recs.add("Off-Loading", true, 0.95);
        recs.add("Total Contact Orthotic", true, 0.90);
        recs.add("Ulcer Relief Aperture", true, 0.95);
        recs.flags.insert("high_risk_foot".to_string(), true);
    }

    if patient.leg_length_discrepancy {
        recs.add("Heel Height Pad", false, 0.95);
        recs.add("Full Length Lift", false, 0.90);
    }
}
