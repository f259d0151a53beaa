// vigil-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Malformed rule definition row: {0}")]
    #[diagnostic(
        code(vigil::domain::rule_record),
        help("Check the rule definition table layout (column order and types).")
    )]
    RecordShape(String),
}
