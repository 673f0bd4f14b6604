// src/notify/mod.rs
pub mod email;

use anyhow::Result;
use async_trait::async_trait;

/// Delivery collaborator for the composed digest. The run's overall success
/// criterion is whether this call succeeds.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn send(
        &self,
        subject: &str,
        text_body: &str,
        html_body: &str,
        recipients: &[String],
    ) -> Result<()>;
}
