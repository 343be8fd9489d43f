//! Email error types

use thiserror::Error;

use crate::status::EspResponse;

/// Errors that can occur when building or sending emails
#[derive(Debug, Error)]
pub enum EmailError {
    /// Email has no recipients
    #[error("email must have at least one recipient")]
    NoRecipients,

    /// Email has no sender
    #[error("email must have a from address")]
    NoSender,

    /// Invalid email address format
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// Email configuration error (missing API key, bad setting)
    #[error("email configuration error: {0}")]
    Configuration(String),

    /// The message uses a feature the ESP cannot represent
    ///
    /// Raised before any network call: duplicate attachment filenames,
    /// a second unnamed attachment, multiple HTML parts, or a
    /// non-HTML alternative part.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Caller-supplied data could not be JSON-encoded for the ESP
    ///
    /// Raised before any network call. The display output includes both
    /// the added context (naming the offending value) and the encoder's
    /// own message.
    #[error("{context}: {source}")]
    Serialization {
        /// Context naming the value that could not be encoded
        context: String,
        /// The underlying encoder failure
        #[source]
        source: serde_json::Error,
    },

    /// The ESP rejected or garbled the API call
    ///
    /// Covers transport failures, non-success HTTP statuses, and
    /// success statuses with an unparsable body. When a response was
    /// received it is retained for diagnostics.
    #[error("{message}")]
    Api {
        /// Human-readable description, including ESP-supplied detail
        /// when the response body carried any
        message: String,
        /// The raw response, when one was received
        response: Option<EspResponse>,
    },
}

impl EmailError {
    /// Create a configuration error from a string message
    #[must_use]
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an unsupported-feature error from a string message
    #[must_use]
    pub fn unsupported<T: Into<String>>(msg: T) -> Self {
        Self::UnsupportedFeature(msg.into())
    }

    /// Create a serialization error wrapping an encoder failure
    #[must_use]
    pub fn serialization<T: Into<String>>(context: T, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create an API error, optionally retaining the raw response
    #[must_use]
    pub fn api<T: Into<String>>(message: T, response: Option<EspResponse>) -> Self {
        Self::Api {
            message: message.into(),
            response,
        }
    }

    /// The raw ESP response attached to this error, if any
    #[must_use]
    pub fn esp_response(&self) -> Option<&EspResponse> {
        match self {
            Self::Api { response, .. } => response.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_error_shows_context_and_source() {
        let source = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let original = source.to_string();
        let err = EmailError::serialization("metadata value for \"total\"", source);
        let text = err.to_string();
        assert!(text.contains("metadata value for \"total\""));
        assert!(text.contains(&original));
    }

    #[test]
    fn api_error_keeps_response() {
        let response = EspResponse::new(400, b"bad request".to_vec());
        let err = EmailError::api("SendGrid API response 400", Some(response));
        assert_eq!(err.esp_response().map(|r| r.status_code), Some(400));
        assert!(EmailError::NoSender.esp_response().is_none());
    }
}
