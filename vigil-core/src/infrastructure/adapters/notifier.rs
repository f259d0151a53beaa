// vigil-core/src/infrastructure/adapters/notifier.rs

// Delivery is an external collaborator; the bundled adapter only records the
// summary in the log stream so local runs stay self-contained.

use async_trait::async_trait;
use tracing::info;

use crate::error::VigilError;
use crate::ports::notifier::Notifier;

#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, html_body: &str) -> Result<(), VigilError> {
        info!(
            subject,
            body_bytes = html_body.len(),
            "Execution summary ready (log-only notifier)"
        );
        Ok(())
    }
}
