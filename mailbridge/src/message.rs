//! Email message model with fluent builder
//!
//! Provides a convenient builder pattern for constructing outgoing
//! messages. Recipient fields accept bare addresses
//! (`user@example.com`) or RFC 2822 name-addr forms
//! (`Jane Doe <jane@example.com>`); backends split them into whatever
//! shape their ESP expects at payload-build time.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EmailError;
use crate::options::{SendAt, SendOptions};

/// A parsed email address with optional display name
///
/// # Examples
///
/// ```rust
/// use mailbridge::message::Address;
///
/// let addr = Address::parse("Jane Doe <jane@example.com>")?;
/// assert_eq!(addr.email, "jane@example.com");
/// assert_eq!(addr.name.as_deref(), Some("Jane Doe"));
/// assert_eq!(addr.domain(), "example.com");
/// # Ok::<(), mailbridge::EmailError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// The bare address (`local@domain`)
    pub email: String,
    /// Display name, when one was given
    pub name: Option<String>,
}

impl Address {
    /// Parse a bare address or an RFC 2822 name-addr form
    ///
    /// # Errors
    ///
    /// Returns `EmailError::InvalidAddress` when the input has no
    /// `local@domain` shape.
    pub fn parse(raw: &str) -> Result<Self, EmailError> {
        let raw = raw.trim();
        let (name, email) = match (raw.rfind('<'), raw.rfind('>')) {
            (Some(open), Some(close)) if open < close && close == raw.len() - 1 => {
                let name = raw[..open].trim().trim_matches('"').trim();
                let email = raw[open + 1..close].trim();
                ((!name.is_empty()).then(|| name.to_string()), email)
            }
            (None, None) => (None, raw),
            _ => return Err(EmailError::InvalidAddress(raw.to_string())),
        };

        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(Self {
                email: email.to_string(),
                name,
            }),
            _ => Err(EmailError::InvalidAddress(raw.to_string())),
        }
    }

    /// The domain part of the address
    #[must_use]
    pub fn domain(&self) -> &str {
        self.email.rsplit_once('@').map_or("", |(_, domain)| domain)
    }

    /// The display name, or the single-space placeholder some ESPs
    /// require in place of an empty one
    #[must_use]
    pub fn name_or_placeholder(&self) -> &str {
        self.name.as_deref().unwrap_or(" ")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.email),
            None => f.write_str(&self.email),
        }
    }
}

/// Kind of the primary message body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    /// `text/plain` body
    #[default]
    Text,
    /// `text/html` body with no plain-text part
    Html,
}

/// An alternative rendering of the message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    /// The alternative content
    pub content: String,
    /// Its mime type, e.g. `text/html`
    pub mime_type: String,
}

/// A file attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Filename presented to the recipient; `None` for unnamed parts
    pub filename: Option<String>,
    /// Raw content bytes
    pub content: Vec<u8>,
    /// Mime type; inferred from the filename when absent
    pub mime_type: Option<String>,
    /// Content-id for inline use from HTML bodies
    pub content_id: Option<String>,
}

impl Attachment {
    /// Create a named attachment; mime type is inferred from the
    /// filename unless set with [`Attachment::mime_type`]
    #[must_use]
    pub fn named(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: Some(filename.into()),
            content: content.into(),
            mime_type: None,
            content_id: None,
        }
    }

    /// Create an unnamed attachment
    #[must_use]
    pub fn unnamed(content: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            filename: None,
            content: content.into(),
            mime_type: Some(mime_type.into()),
            content_id: None,
        }
    }

    /// Set the mime type explicitly
    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// The mime type to send: explicit, else inferred from the
    /// filename, else `application/octet-stream`
    #[must_use]
    pub fn resolved_mime_type(&self) -> String {
        if let Some(mime_type) = &self.mime_type {
            return mime_type.clone();
        }
        self.filename.as_ref().map_or_else(
            || mime_guess::mime::APPLICATION_OCTET_STREAM.essence_str().to_string(),
            |name| {
                mime_guess::from_path(name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            },
        )
    }

    /// Whether this attachment is referenced inline from the HTML body
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        self.content_id.is_some()
    }
}

/// An outgoing email message
///
/// Use the builder pattern to construct messages:
///
/// ```rust
/// use mailbridge::message::Email;
///
/// let email = Email::new()
///     .to("user@example.com")
///     .from("noreply@myapp.com")
///     .subject("Welcome!")
///     .text("Welcome to our app!")
///     .html("<h1>Welcome to our app!</h1>");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Email {
    /// Email sender (From), bare or name-addr form
    pub from: Option<String>,

    /// Email recipients (To)
    pub to: Vec<String>,

    /// CC recipients
    pub cc: Vec<String>,

    /// BCC recipients
    pub bcc: Vec<String>,

    /// Reply-To addresses
    pub reply_to: Vec<String>,

    /// Email subject
    pub subject: Option<String>,

    /// Primary body content
    pub body: Option<String>,

    /// Kind of the primary body
    pub body_kind: BodyKind,

    /// Alternative body renderings (at most one `text/html` part is
    /// representable by the shipped backends)
    pub alternatives: Vec<Alternative>,

    /// Custom headers in insertion order; names are unique
    /// case-insensitively
    pub headers: Vec<(String, String)>,

    /// File attachments
    pub attachments: Vec<Attachment>,

    /// ESP send options for this message
    pub options: SendOptions,
}

impl Email {
    /// Create a new empty email
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipient (To)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mailbridge::message::Email;
    ///
    /// let email = Email::new()
    ///     .to("user@example.com")
    ///     .to("Jane Doe <jane@example.com>");
    /// ```
    #[must_use]
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Add multiple recipients (To)
    #[must_use]
    pub fn to_multiple<I, T>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.to.extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Add a CC recipient
    #[must_use]
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    /// Add a BCC recipient
    #[must_use]
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    /// Set the sender (From)
    #[must_use]
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    /// Add a reply-to address
    #[must_use]
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to.push(address.into());
        self
    }

    /// Set the email subject
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the plain text body
    #[must_use]
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.body_kind = BodyKind::Text;
        self
    }

    /// Set an HTML body with no plain-text part
    ///
    /// For the usual text-plus-HTML pairing, use [`Email::text`]
    /// together with [`Email::html`].
    #[must_use]
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.body_kind = BodyKind::Html;
        self
    }

    /// Attach an HTML alternative to the plain-text body
    #[must_use]
    pub fn html(self, content: impl Into<String>) -> Self {
        self.alternative(content, "text/html")
    }

    /// Attach an alternative body rendering with an explicit mime type
    #[must_use]
    pub fn alternative(mut self, content: impl Into<String>, mime_type: impl Into<String>) -> Self {
        self.alternatives.push(Alternative {
            content: content.into(),
            mime_type: mime_type.into(),
        });
        self
    }

    /// Add a custom header, replacing any existing header of the same
    /// name (compared case-insensitively)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mailbridge::message::Email;
    ///
    /// let email = Email::new()
    ///     .header("X-Priority", "1");
    /// ```
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Look up a custom header value, case-insensitively
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Add an attachment
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Attach content for inline use from the HTML body
    ///
    /// Returns the generated content-id to reference as
    /// `<img src="cid:...">` in the HTML.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mailbridge::message::Email;
    ///
    /// let mut email = Email::new()
    ///     .to("user@example.com")
    ///     .from("noreply@myapp.com")
    ///     .subject("Chart attached")
    ///     .text("See the HTML version.");
    /// let cid = email.attach_inline(vec![0x89, b'P', b'N', b'G'], "image/png");
    /// email = email.html(format!("<img src=\"cid:{cid}\" alt=\"chart\" />"));
    /// ```
    pub fn attach_inline(&mut self, content: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> String {
        let cid = Uuid::new_v4().simple().to_string();
        self.attachments.push(Attachment {
            filename: None,
            content: content.into(),
            mime_type: Some(mime_type.into()),
            content_id: Some(cid.clone()),
        });
        cid
    }

    /// Set all send options at once
    #[must_use]
    pub fn options(mut self, options: SendOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a metadata entry for the ESP
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options = self.options.metadata(key, value);
        self
    }

    /// Add a tag for ESP reporting
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.options = self.options.tag(tag);
        self
    }

    /// Enable or disable click tracking for this message
    #[must_use]
    pub fn track_clicks(mut self, enabled: bool) -> Self {
        self.options = self.options.track_clicks(enabled);
        self
    }

    /// Enable or disable open tracking for this message
    #[must_use]
    pub fn track_opens(mut self, enabled: bool) -> Self {
        self.options = self.options.track_opens(enabled);
        self
    }

    /// Schedule the send
    #[must_use]
    pub fn send_at(mut self, at: impl Into<SendAt>) -> Self {
        self.options = self.options.send_at(at);
        self
    }

    /// Add a raw provider-specific parameter
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options = self.options.extra(key, value);
        self
    }

    /// Validate the email
    ///
    /// # Errors
    ///
    /// Returns errors if the message has no sender, or no recipient in
    /// any of to, cc, or bcc.
    pub fn validate(&self) -> Result<(), EmailError> {
        if self.from.is_none() {
            return Err(EmailError::NoSender);
        }

        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(EmailError::NoRecipients);
        }

        Ok(())
    }
}
