//! The diagnosis aggregator: calibration, parallel model fan-out, and
//! deterministic assembly of the aggregate document.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calibration::{CalibratedMeasurements, SkinToneCalibrator};
use crate::document::{
    DetailedResults, DiagnosisAggregate, Finding, MeasurementSummary, MeasurementsDetail,
    ModelEntry, StructuredDiagnosis,
};
use crate::error::Result;
use crate::measurements::{ColorSample, MeasurementSet, PatientContext};
use crate::model::{Condition, ModelId, ModelResult, Severity};
use crate::registry::ModelRegistry;
use crate::rules::{Alignment, AlignmentZones, apply_orthotic_rules};

/// Input to one diagnostic run.
#[derive(Debug, Clone, Default)]
pub struct DiagnosisInput {
    pub measurements: MeasurementSet,
    pub color_sample: Option<ColorSample>,
    pub patient_context: Option<PatientContext>,
    /// Caller-supplied scan id; generated when absent.
    pub scan_id: Option<Uuid>,
}

impl DiagnosisInput {
    pub fn new(measurements: MeasurementSet) -> Self {
        Self {
            measurements,
            ..Default::default()
        }
    }

    pub fn with_color_sample(mut self, sample: ColorSample) -> Self {
        self.color_sample = Some(sample);
        self
    }

    pub fn with_patient_context(mut self, context: PatientContext) -> Self {
        self.patient_context = Some(context);
        self
    }

    pub fn with_scan_id(mut self, scan_id: Uuid) -> Self {
        self.scan_id = Some(scan_id);
        self
    }
}

/// Runs the registered models concurrently against one calibrated scan
/// and assembles their outputs into a [`DiagnosisAggregate`].
///
/// Model failures and timeouts are contained as abstentions; the run
/// itself only fails on serialization problems.
pub struct DiagnosisAggregator {
    registry: Arc<ModelRegistry>,
    timeout: Option<Duration>,
}

impl DiagnosisAggregator {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Per-model wall-clock budget. Models that exceed it abstain.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn run(&self, input: DiagnosisInput) -> Result<DiagnosisAggregate> {
        let scan_id = input.scan_id.unwrap_or_else(Uuid::new_v4);
        info!(%scan_id, model_count = self.registry.len(), "diagnosis run started");

        let calibrated = Arc::new(
            SkinToneCalibrator::new()
                .calibrate(input.measurements, input.color_sample.as_ref()),
        );

        let results = self.fan_out(&calibrated).await;
        let document = self.assemble(
            scan_id,
            &calibrated,
            results,
            input.patient_context.as_ref(),
        );

        info!(
            %scan_id,
            diagnosis = %document.diagnosis,
            confidence = document.confidence,
            "diagnosis run finished"
        );
        Ok(document)
    }

    /// Spawn every model concurrently and join at the barrier. Results
    /// are keyed by model id, so completion order never leaks into the
    /// output.
    async fn fan_out(
        &self,
        calibrated: &Arc<CalibratedMeasurements>,
    ) -> BTreeMap<ModelId, ModelEntry> {
        let mut set = JoinSet::new();
        for model in self.registry.models() {
            let model = Arc::clone(model);
            let input = Arc::clone(calibrated);
            let timeout = self.timeout;
            set.spawn(async move {
                let id = model.id();
                let name = model.name().to_string();
                let description = model.description().to_string();
                let outcome = match timeout {
                    Some(budget) => match tokio::time::timeout(budget, model.analyze(&input)).await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!(model_id = %id, "model timed out");
                            Ok(ModelResult::abstained("model timed out"))
                        }
                    },
                    None => model.analyze(&input).await,
                };
                let result = outcome.unwrap_or_else(|err| {
                    warn!(model_id = %id, error = %err, "model failed");
                    ModelResult::abstained(format!("model failed: {err}"))
                });
                (id, name, description, result)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, name, description, result)) => {
                    if result.is_abstention() {
                        warn!(model_id = %id, reason = ?result.error, "model abstained");
                    }
                    results.insert(
                        id,
                        ModelEntry {
                            name,
                            description,
                            result,
                        },
                    );
                }
                Err(err) => {
                    // The panicking model cannot be identified from the
                    // join error alone; missing ids are backfilled below.
                    warn!(error = %err, "model task panicked");
                }
            }
        }
        for model in self.registry.models() {
            results.entry(model.id()).or_insert_with(|| ModelEntry {
                name: model.name().to_string(),
                description: model.description().to_string(),
                result: ModelResult::abstained("model task panicked"),
            });
        }
        results
    }

    fn assemble(
        &self,
        scan_id: Uuid,
        calibrated: &CalibratedMeasurements,
        results: BTreeMap<ModelId, ModelEntry>,
        patient: Option<&PatientContext>,
    ) -> DiagnosisAggregate {
        let mut notes = Vec::new();

        let mut findings: Vec<Finding> = results
            .iter()
            .filter(|(_, entry)| !entry.result.is_abstention())
            .map(|(id, entry)| Finding::from_result(*id, &entry.result))
            .collect();
        findings.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| a.model.priority().cmp(&b.model.priority()))
        });

        let primary = findings.first().cloned();
        let (diagnosis, confidence) = match &primary {
            Some(finding) => (finding.condition_name.clone(), finding.confidence),
            None => ("insufficient_data".to_string(), 0.0),
        };

        let arch_result = results
            .get(&ModelId::ArchType)
            .map(|e| &e.result)
            .filter(|r| !r.is_abstention());
        let pronation_result = results
            .get(&ModelId::Pronation)
            .map(|e| &e.result)
            .filter(|r| !r.is_abstention());
        let pressure_result = results
            .get(&ModelId::Pressure)
            .map(|e| &e.result)
            .filter(|r| !r.is_abstention());

        let arch_condition = arch_result.map_or(Condition::NormalArch, |r| r.condition);
        let arch_severity = arch_result.map_or(Severity::None, |r| r.severity);
        let arch_degree = arch_result
            .and_then(|r| r.details.get("arch_degree"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u8;
        let arch_type = arch_result
            .and_then(|r| r.details.get("arch_type"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        let alignment = merge_alignment(pronation_result, arch_result, &mut notes);

        // Pathologies the rule engine reacts to: retained abnormal
        // findings that cleared their model's confidence threshold.
        let pathologies: Vec<Condition> = findings
            .iter()
            .filter(|f| {
                f.model != ModelId::ArchType
                    && f.severity >= Severity::Mild
                    && !f.condition.is_normal()
                    && f.confidence >= self.registry.threshold(f.model)
            })
            .map(|f| f.condition)
            .collect();

        let recommendations = apply_orthotic_rules(
            arch_condition,
            arch_severity,
            arch_degree,
            &alignment,
            &pathologies,
            patient,
        );

        let mut high_risk_flags = recommendations.flags.clone();
        if pressure_result.is_some_and(|r| {
            r.condition == Condition::VascularConcern && r.severity >= Severity::Moderate
        }) {
            high_risk_flags.insert("high_vascular_risk".to_string(), true);
        }

        let assessment = assessment(&primary, calibrated, &high_risk_flags);

        let pathologies: Vec<String> = findings
            .iter()
            .filter(|f| f.severity >= Severity::Mild)
            .map(|f| f.condition_name.clone())
            .collect();

        let models = results
            .into_iter()
            .map(|(id, entry)| (id.as_str().to_string(), entry))
            .collect();

        DiagnosisAggregate {
            scan_id,
            diagnosis,
            confidence,
            measurements: MeasurementSummary::from(&calibrated.raw),
            assessment,
            structured_diagnosis: StructuredDiagnosis {
                arch_type,
                arch_degree,
                alignment,
                pathologies,
                primary,
                conditions: findings,
            },
            recommendations,
            detailed_results: DetailedResults {
                measurements: MeasurementsDetail {
                    raw: calibrated.raw.clone(),
                    calibrated: calibrated.calibrated.clone(),
                },
                models,
                notes,
            },
            high_risk_flags,
            patient_context_used: patient.is_some(),
        }
    }
}

/// Merge the pronation and arch views of frontal-plane alignment.
///
/// Pronation speaks for all three zones, the arch for midfoot and
/// hindfoot. Where the two disagree the higher-confidence model wins;
/// an exact tie resolves to neutral and leaves a note.
fn merge_alignment(
    pronation: Option<&ModelResult>,
    arch: Option<&ModelResult>,
    notes: &mut Vec<String>,
) -> AlignmentZones {
    let pronation_vote = pronation.and_then(|r| match r.condition {
        Condition::Overpronation => Some((
            [Alignment::Varus, Alignment::Valgus, Alignment::Valgus],
            r.confidence,
        )),
        Condition::Underpronation => Some((
            [Alignment::Valgus, Alignment::Varus, Alignment::Varus],
            r.confidence,
        )),
        _ => None,
    });
    let arch_vote = arch.and_then(|r| match r.condition {
        Condition::FlatFeet => Some(([Alignment::Valgus, Alignment::Valgus], r.confidence)),
        Condition::HighArch => Some(([Alignment::Varus, Alignment::Varus], r.confidence)),
        _ => None,
    });

    let forefoot = pronation_vote
        .as_ref()
        .map_or(Alignment::Neutral, |(zones, _)| zones[0]);

    let mut resolve = |zone: &str, a: Option<(Alignment, f64)>, b: Option<(Alignment, f64)>| {
        match (a, b) {
            (Some((alignment, _)), None) | (None, Some((alignment, _))) => alignment,
            (Some((left, left_conf)), Some((right, right_conf))) => {
                if left == right {
                    left
                } else if (left_conf - right_conf).abs() < f64::EPSILON {
                    notes.push(format!(
                        "alignment_disagreement: {zone} {left} vs {right} at equal \
                         confidence, resolved to neutral"
                    ));
                    Alignment::Neutral
                } else if left_conf > right_conf {
                    left
                } else {
                    right
                }
            }
            (None, None) => Alignment::Neutral,
        }
    };

    let midfoot = resolve(
        "midfoot",
        pronation_vote.as_ref().map(|(z, c)| (z[1], *c)),
        arch_vote.as_ref().map(|(z, c)| (z[0], *c)),
    );
    let hindfoot = resolve(
        "hindfoot",
        pronation_vote.as_ref().map(|(z, c)| (z[2], *c)),
        arch_vote.as_ref().map(|(z, c)| (z[1], *c)),
    );

    AlignmentZones {
        forefoot,
        midfoot,
        hindfoot,
    }
}

fn assessment(
    primary: &Option<Finding>,
    calibrated: &CalibratedMeasurements,
    high_risk_flags: &BTreeMap<String, bool>,
) -> String {
    let Some(primary) = primary else {
        return "Insufficient measurement data for a diagnostic assessment; \
                every model abstained."
            .to_string();
    };

    let mut text = match primary.severity {
        Severity::None => format!(
            "Primary finding: {} with no clinically significant severity.",
            primary.condition_name
        ),
        severity => format!(
            "Primary finding: {} at {severity} severity (confidence {:.2}).",
            primary.condition_name, primary.confidence
        ),
    };

    if let Some(arch) = calibrated.calibrated.arch.as_ref() {
        let mut cited = Vec::new();
        if let Some(ahi) = arch.arch_height_index {
            cited.push(format!("AHI {ahi:.3}"));
        }
        if let Some(maa) = arch.medial_arch_angle {
            cited.push(format!("MLA angle {maa:.1} deg"));
        }
        if let Some(csi) = arch.chippaux_smirak_index {
            cited.push(format!("CSI {csi:.1}%"));
        }
        if !cited.is_empty() {
            text.push_str(&format!(" Key indices: {}.", cited.join(", ")));
        }
    }

    if high_risk_flags.values().any(|v| *v) {
        let flags: Vec<&str> = high_risk_flags
            .iter()
            .filter(|(_, v)| **v)
            .map(|(k, _)| k.as_str())
            .collect();
        text.push_str(&format!(
            " High-risk flags raised: {}; clinical follow-up advised.",
            flags.join(", ")
        ));
    }
    text
}
