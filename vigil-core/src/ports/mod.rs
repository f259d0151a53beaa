// vigil-core/src/ports/mod.rs

pub mod notifier;
pub mod query;
pub mod sink;

pub use notifier::Notifier;
pub use query::{QueryService, RowValues};
pub use sink::{AppendSink, RetirePredicate, RetireSink};
