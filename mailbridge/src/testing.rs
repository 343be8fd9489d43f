//! Testing utilities for the email system
//!
//! Provides a capture-based mock email sender for application tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::EmailError;
use crate::message::{Address, Email};
use crate::sender::EmailSender;
use crate::status::{DeliveryStatus, RecipientStatus, SendStatus};

/// Mock email sender for testing
///
/// Captures sent emails in memory for assertions.
///
/// # Examples
///
/// ```rust
/// use mailbridge::{Email, EmailSender};
/// use mailbridge::testing::MockEmailSender;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mock = MockEmailSender::new();
///
/// let email = Email::new()
///     .to("user@example.com")
///     .from("noreply@myapp.com")
///     .subject("Test")
///     .text("Hello");
///
/// mock.send(email).await?;
///
/// assert_eq!(mock.sent_count(), 1);
/// assert!(mock.was_sent_to("user@example.com"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockEmailSender {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl MockEmailSender {
    /// Create a new mock email sender
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of emails sent
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Get all sent emails
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    #[must_use]
    pub fn sent_emails(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    /// Check whether any captured email was addressed to `address`
    /// (bare address, compared against to, cc, and bcc)
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    #[must_use]
    pub fn was_sent_to(&self, address: &str) -> bool {
        self.sent.lock().unwrap().iter().any(|email| {
            email
                .to
                .iter()
                .chain(&email.cc)
                .chain(&email.bcc)
                .any(|raw| Address::parse(raw).map_or(raw == address, |a| a.email == address))
        })
    }

    /// Clear all captured emails
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, email: Email) -> Result<DeliveryStatus, EmailError> {
        email.validate()?;

        let mut recipients = HashMap::new();
        for raw in email.to.iter().chain(&email.cc).chain(&email.bcc) {
            let address = Address::parse(raw)?;
            recipients.insert(
                address.email,
                RecipientStatus {
                    status: SendStatus::Queued,
                    message_id: None,
                },
            );
        }

        self.sent.lock().unwrap().push(email);

        Ok(DeliveryStatus {
            status: BTreeSet::from([SendStatus::Queued]),
            message_id: None,
            recipients,
            esp_response: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Email {
        Email::new()
            .to("user@example.com")
            .cc("Manager <manager@example.com>")
            .from("noreply@myapp.com")
            .subject("Test")
            .text("Hello")
    }

    #[tokio::test]
    async fn captures_sent_emails() {
        let mock = MockEmailSender::new();
        mock.send(sample()).await.unwrap();
        mock.send(sample()).await.unwrap();

        assert_eq!(mock.sent_count(), 2);
        assert_eq!(mock.sent_emails()[0].subject.as_deref(), Some("Test"));
        assert!(mock.was_sent_to("user@example.com"));
        assert!(mock.was_sent_to("manager@example.com"));
        assert!(!mock.was_sent_to("stranger@example.com"));

        mock.clear();
        assert_eq!(mock.sent_count(), 0);
    }

    #[tokio::test]
    async fn clones_share_the_capture_buffer() {
        let mock = MockEmailSender::new();
        let handle = mock.clone();
        handle.send(sample()).await.unwrap();
        assert_eq!(mock.sent_count(), 1);
    }

    #[tokio::test]
    async fn rejects_invalid_emails() {
        let mock = MockEmailSender::new();
        let email = Email::new().to("user@example.com").text("no sender");
        assert!(matches!(mock.send(email).await, Err(EmailError::NoSender)));
        assert_eq!(mock.sent_count(), 0);
    }
}
