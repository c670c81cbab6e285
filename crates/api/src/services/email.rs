// Email collaborator

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::ServiceError;

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_email(&self, email: &str, message: &str, subject: &str)
        -> Result<(), ServiceError>;
}

/// Pretends to talk to a mail relay by sleeping
pub struct SimulatedEmailService {
    latency: Duration,
}

impl SimulatedEmailService {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl EmailService for SimulatedEmailService {
    async fn send_email(
        &self,
        email: &str,
        message: &str,
        subject: &str,
    ) -> Result<(), ServiceError> {
        if email.trim().is_empty() {
            return Err(ServiceError::InvalidArgument("email is empty".into()));
        }

        info!(%email, %subject, message_len = message.len(), "Sending email to {}", email);
        tokio::time::sleep(self.latency).await;
        info!(%email, "Email sent to {}", email);
        Ok(())
    }
}
