pub mod error;
pub mod health;
pub mod outcome;
pub mod rag;
pub mod rollup;
pub mod rule;

// Convenience re-exports to simplify imports elsewhere
pub use error::DomainError;
pub use rag::RagStatus;
