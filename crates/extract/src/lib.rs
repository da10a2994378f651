#![forbid(unsafe_code)]

//! Fishing report extraction from Spanish chat messages.

pub mod entities;
pub mod fecha;
pub mod fishing_data;
pub mod hora;
pub mod parte;
pub mod story;
pub mod vocab;

pub use entities::{Entity, EntityKind, EntityManager, EntityRecognizer, RuleRecognizer};
pub use fishing_data::{extract_fishing_data, FishingDataExtractor};
pub use hora::TimeExpression;
pub use parte::{
    EspecieCapturada, FinalizeError, FishingData, MissingField, Modalidad, ParteEnProgreso,
    PartePesca,
};
pub use story::{analyze_story, Outcome, StoryAnalysis};
