//! Normalized delivery status reported back to the caller
//!
//! A send attempt produces a [`DeliveryStatus`]: the overall status set,
//! the tracked message id, a per-recipient breakdown, and the raw ESP
//! response kept for diagnostics. Statuses reflect what the ESP reported
//! at send time only; later bounce or complaint events arrive through
//! provider webhooks, outside this crate.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EmailError;

/// Per-recipient send status vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    /// Accepted by the ESP and queued for delivery
    Queued,
    /// Handed off for delivery (no queue involved)
    Sent,
    /// Refused by the ESP for this recipient
    Rejected,
    /// Delivery attempt failed
    Failed,
    /// The ESP reported something this crate does not recognize
    Unknown,
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

/// Status of a single recipient after a send attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientStatus {
    /// What the ESP reported for this recipient
    pub status: SendStatus,
    /// Message id tracking this recipient's copy, when known
    pub message_id: Option<String>,
}

/// Raw HTTP response from the ESP
///
/// Retained on [`DeliveryStatus`] and on API errors so callers can
/// inspect exactly what the provider returned, even when the body
/// could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EspResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Raw response body bytes
    pub body: Vec<u8>,
}

impl EspResponse {
    /// Create a response record from a status code and body bytes
    #[must_use]
    pub fn new(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }

    /// Whether the status code is in the HTTP success range
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// The body as text, lossily decoded
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Parse the body as JSON
    ///
    /// # Errors
    ///
    /// Returns the decoder error when the body is not valid JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Normalized outcome of one send attempt
///
/// All fields start absent/empty and are only populated once the ESP
/// accepts the call. On failure paths the fields stay absent, except
/// `esp_response`, which is kept whenever a response was received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatus {
    /// Set of distinct statuses across all recipients
    pub status: BTreeSet<SendStatus>,
    /// Message id assigned for tracking, when the send was accepted
    pub message_id: Option<String>,
    /// Per-recipient status, keyed by bare email address
    pub recipients: HashMap<String, RecipientStatus>,
    /// The raw ESP response, kept even when parsing failed
    pub esp_response: Option<EspResponse>,
}

impl DeliveryStatus {
    /// Create an empty status (nothing sent)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Status recorded when a send attempt failed
    ///
    /// All fields stay absent; the raw response is salvaged from API
    /// errors so diagnostics survive silent-failure mode.
    #[must_use]
    pub fn from_error(error: &EmailError) -> Self {
        Self {
            esp_response: error.esp_response().cloned(),
            ..Self::default()
        }
    }

    /// Whether the ESP accepted this message for at least one recipient
    #[must_use]
    pub fn was_sent(&self) -> bool {
        self.status
            .iter()
            .any(|s| matches!(s, SendStatus::Queued | SendStatus::Sent))
    }
}

/// Outcome of a batch send
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Number of messages the ESP accepted
    pub sent: usize,
    /// Per-message statuses, in input order
    pub statuses: Vec<DeliveryStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_status_counts_as_unsent() {
        let status = DeliveryStatus::new();
        assert!(!status.was_sent());
        assert!(status.message_id.is_none());
        assert!(status.recipients.is_empty());
    }

    #[test]
    fn queued_status_counts_as_sent() {
        let status = DeliveryStatus {
            status: BTreeSet::from([SendStatus::Queued]),
            ..DeliveryStatus::default()
        };
        assert!(status.was_sent());
    }

    #[test]
    fn from_error_salvages_response() {
        let err = EmailError::api(
            "SendGrid API response 500",
            Some(EspResponse::new(500, b"oops".to_vec())),
        );
        let status = DeliveryStatus::from_error(&err);
        assert!(status.status.is_empty());
        assert_eq!(status.esp_response.as_ref().map(|r| r.status_code), Some(500));

        let status = DeliveryStatus::from_error(&EmailError::NoRecipients);
        assert!(status.esp_response.is_none());
    }

    #[test]
    fn response_helpers() {
        let ok = EspResponse::new(200, br#"{"message": "success"}"#.to_vec());
        assert!(ok.is_success());
        assert_eq!(ok.json().unwrap()["message"], "success");

        let bad = EspResponse::new(502, Vec::new());
        assert!(!bad.is_success());
        assert_eq!(bad.text(), "");
    }
}
