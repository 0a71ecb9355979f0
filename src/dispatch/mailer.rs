//! Mail transport seam

use async_trait::async_trait;

/// One email ready for transport
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub sender_name: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub preheader: Option<String>,
}

/// The mail dispatch collaborator; errors are opaque text stored verbatim
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), String>;
}

/// Logs messages instead of sending them
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunMailer;

#[async_trait]
impl Mailer for DryRunMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), String> {
        tracing::info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            body_chars = message.body.chars().count(),
            "Dry run: message not delivered"
        );
        Ok(())
    }
}
