//! Email sender trait abstraction
//!
//! This module defines the core `EmailSender` trait that all email
//! backends implement.

use async_trait::async_trait;
use tracing::warn;

use crate::error::EmailError;
use crate::message::Email;
use crate::status::{BatchOutcome, DeliveryStatus};

/// Trait for sending emails
///
/// Implemented by all email backends (SendGrid, console, test mocks).
///
/// # Examples
///
/// ```rust,no_run
/// use mailbridge::{Email, EmailSender, SendgridBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let sender = SendgridBackend::from_env()?;
///
/// let email = Email::new()
///     .to("user@example.com")
///     .from("noreply@myapp.com")
///     .subject("Hello!")
///     .text("Hello, World!");
///
/// let status = sender.send(email).await?;
/// assert!(status.was_sent());
/// # Ok(())
/// # }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send an email
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the email is invalid, cannot be
    /// represented by the backend's ESP, or the ESP rejects the call.
    async fn send(&self, email: Email) -> Result<DeliveryStatus, EmailError>;

    /// Send an email, swallowing any failure
    ///
    /// Errors are logged and converted into an empty
    /// [`DeliveryStatus`]; the raw ESP response is kept on the status
    /// when one was received. Never returns an error.
    async fn send_silently(&self, email: Email) -> DeliveryStatus {
        match self.send(email).await {
            Ok(status) => status,
            Err(error) => {
                warn!(%error, "email send failed silently");
                DeliveryStatus::from_error(&error)
            }
        }
    }

    /// Send multiple emails sequentially
    ///
    /// With `fail_silently`, a failed message contributes an empty
    /// status and the batch continues; otherwise the first error
    /// stops the batch.
    ///
    /// # Errors
    ///
    /// Returns the first send error unless `fail_silently` is set.
    async fn send_batch(
        &self,
        emails: Vec<Email>,
        fail_silently: bool,
    ) -> Result<BatchOutcome, EmailError> {
        let mut statuses = Vec::with_capacity(emails.len());
        for email in emails {
            if fail_silently {
                statuses.push(self.send_silently(email).await);
            } else {
                statuses.push(self.send(email).await?);
            }
        }
        let sent = statuses.iter().filter(|status| status.was_sent()).count();
        Ok(BatchOutcome { sent, statuses })
    }
}
