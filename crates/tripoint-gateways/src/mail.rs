//! Outbound mail gateway
//!
//! Delivery itself is an external collaborator; this module carries the
//! boundary implementation used when no mail provider is wired in, which
//! records the message through tracing and reports success.

use async_trait::async_trait;
use tracing::{info, instrument};
use tripoint_core::traits::{MailGateway, MailMessage};
use tripoint_core::AppResult;

/// Mail gateway that logs instead of delivering
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl LogMailer {
    /// Create a logging mailer
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailGateway for LogMailer {
    #[instrument(skip(self, message))]
    async fn send(&self, message: &MailMessage) -> AppResult<()> {
        info!(
            to = %message.to.join(", "),
            subject = %message.subject,
            "Outbound mail (logging only, no provider configured)"
        );
        Ok(())
    }
}
