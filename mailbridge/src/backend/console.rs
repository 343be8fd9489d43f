//! Console backend for development
//!
//! Prints emails to the console instead of sending them.
//! Useful for development and testing without ESP credentials.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::EmailError;
use crate::message::{Address, Email};
use crate::sender::EmailSender;
use crate::status::{DeliveryStatus, RecipientStatus, SendStatus};

/// Console email backend for development
///
/// Logs emails instead of sending them, and reports every recipient as
/// sent.
///
/// # Examples
///
/// ```rust
/// use mailbridge::{ConsoleBackend, Email, EmailSender};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = ConsoleBackend::new();
///
/// let email = Email::new()
///     .to("user@example.com")
///     .from("noreply@myapp.com")
///     .subject("Hello!")
///     .text("Hello, World!");
///
/// let status = backend.send(email).await?; // prints to console
/// assert!(status.was_sent());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConsoleBackend {
    /// Whether to log email content in debug mode
    verbose: bool,
}

impl ConsoleBackend {
    /// Create a new console backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a verbose console backend that logs full email content
    #[must_use]
    pub const fn verbose() -> Self {
        Self { verbose: true }
    }
}

#[async_trait]
impl EmailSender for ConsoleBackend {
    async fn send(&self, email: Email) -> Result<DeliveryStatus, EmailError> {
        email.validate()?;

        let from = email.from.as_ref().ok_or(EmailError::NoSender)?;
        let subject = email.subject.as_deref().unwrap_or("(no subject)");

        info!(
            from = %from,
            to = ?email.to,
            cc = ?email.cc,
            bcc = ?email.bcc,
            subject = %subject,
            "console email sent"
        );

        if self.verbose {
            debug!(
                reply_to = ?email.reply_to,
                has_body = email.body.is_some(),
                alternatives = email.alternatives.len(),
                attachments = email.attachments.len(),
                headers = ?email.headers,
                "email details"
            );

            if let Some(body) = &email.body {
                debug!(body = %body, "email body");
            }
        }

        // Also print to stdout for visibility in development
        println!("----------------------------------------");
        println!("From:    {from}");
        println!("To:      {}", email.to.join(", "));
        if !email.cc.is_empty() {
            println!("CC:      {}", email.cc.join(", "));
        }
        if !email.bcc.is_empty() {
            println!("BCC:     {}", email.bcc.join(", "));
        }
        if !email.reply_to.is_empty() {
            println!("Reply-To: {}", email.reply_to.join(", "));
        }
        println!("Subject: {subject}");
        if let Some(body) = &email.body {
            println!("----------------------------------------");
            println!("{body}");
        }
        println!("----------------------------------------");

        let mut recipients = HashMap::new();
        for raw in email.to.iter().chain(&email.cc).chain(&email.bcc) {
            let address = Address::parse(raw)?;
            recipients.insert(
                address.email,
                RecipientStatus {
                    status: SendStatus::Sent,
                    message_id: None,
                },
            );
        }

        Ok(DeliveryStatus {
            status: BTreeSet::from([SendStatus::Sent]),
            message_id: None,
            recipients,
            esp_response: None,
        })
    }
}
