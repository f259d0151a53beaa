// vigil-core/src/domain/rule/mod.rs

pub mod catalog;
pub mod definition;

pub use catalog::{CatalogEntry, RuleCatalog};
pub use definition::{
    DataLocus, RuleBehavior, RuleDefinition, RuleLevel, RuleRecord, ThresholdType, Thresholds,
};
