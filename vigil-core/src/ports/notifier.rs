// vigil-core/src/ports/notifier.rs

use crate::error::VigilError;
use async_trait::async_trait;

/// Delivery channel for batch execution summaries. Delivery itself is an
/// external collaborator; the engine only hands over a rendered document.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, html_body: &str) -> Result<(), VigilError>;
}
