//! Diagnostic aggregation engine for foot-scan biomechanical
//! measurements.
//!
//! A scan's [`MeasurementSet`] is skin-tone calibrated once, fanned out
//! to a registry of independent diagnostic models (arch type,
//! pronation, pressure/perfusion, structural deformity, gait,
//! footwear), and their results are deterministically assembled into a
//! single [`DiagnosisAggregate`] document with orthotic
//! recommendations.
//!
//! ```no_run
//! use std::sync::Arc;
//! use foot_diagnosis::{
//!     DiagnosisAggregator, DiagnosisInput, MeasurementSet, ModelRegistry,
//! };
//!
//! # async fn run() -> foot_diagnosis::Result<()> {
//! let registry = Arc::new(ModelRegistry::standard());
//! let aggregator = DiagnosisAggregator::new(registry);
//!
//! let measurements = MeasurementSet {
//!     length: 25.0,
//!     width: 9.5,
//!     arch_height: 1.8,
//!     instep_height: 2.5,
//!     ..Default::default()
//! };
//! let document = aggregator.run(DiagnosisInput::new(measurements)).await?;
//! println!("{} ({:.2})", document.diagnosis, document.confidence);
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod calibration;
mod document;
mod error;
mod measurements;
mod model;
mod models;
mod registry;
mod rules;

pub use aggregator::{DiagnosisAggregator, DiagnosisInput};
pub use calibration::{CalibratedMeasurements, SkinToneCalibrator, SkinToneProfile, SkinType};
pub use document::{
    DetailedResults, DiagnosisAggregate, Finding, MeasurementSummary, MeasurementsDetail,
    ModelEntry, StructuredDiagnosis,
};
pub use error::{DiagnosisError, Result};
pub use measurements::{
    ArchIndices, ColorSample, DeformityAngles, FootSide, GaitParameters, MeasurementSet,
    PatientContext, PressureSamples, RegionSample,
};
pub use model::{
    ClassificationMethodResult, Classifier, Condition, ModelId, ModelResult, Severity,
    TreatmentRecommendations,
};
pub use models::{
    ArchTypeModel, DeformityModel, FootwearModel, GaitModel, PressureModel, PronationModel,
};
pub use registry::{
    DEFAULT_CONFIDENCE_THRESHOLD, ModelRegistry, RegistryBuilder, RegistryConfig,
};
pub use rules::{
    ABBREVIATIONS, Alignment, AlignmentZones, OrthoticRecommendations,
    PRIMARY_RECOMMENDATION_CONFIDENCE, apply_orthotic_rules, expand_abbreviations,
};
