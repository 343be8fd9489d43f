//! SendGrid backend for sending emails
//!
//! Targets SendGrid's legacy v2 `mail.send.json` API: one
//! multipart/form-data POST per message, authenticated with a bearer
//! API key. The interesting work is all payload assembly: recipient
//! lists become parallel `to`/`toname` style fields, custom headers are
//! JSON-encoded into a single `headers` field, attachments become
//! `files[...]` file parts, and the ESP-specific options (tags,
//! metadata, tracking, scheduled send) are folded into the `x-smtpapi`
//! JSON side channel.
//!
//! SendGrid quirks handled here:
//! - empty display names are rejected, so absent names become a single
//!   space in the `*name` arrays;
//! - the native `replyto` parameter drops the display name and breaks
//!   multiple addresses, so reply-to goes through the `headers` block;
//! - a successful call returns no per-recipient ids, so every recipient
//!   is marked queued under one generated message id; rejection shows
//!   up later via webhook events, not at send time.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use reqwest::multipart;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::EmailError;
use crate::message::{Address, BodyKind, Email};
use crate::options::SendOptions;
use crate::sender::EmailSender;
use crate::status::{DeliveryStatus, EspResponse, RecipientStatus, SendStatus};

/// Default endpoint of the v2 mail.send API
pub const DEFAULT_API_URL: &str = "https://api.sendgrid.com/api/mail.send.json";

const API_KEY_ENV: &str = "MAILBRIDGE_SENDGRID_API_KEY";
const API_KEY_ENV_FALLBACK: &str = "SENDGRID_API_KEY";

/// SendGrid email backend
///
/// # Examples
///
/// ```rust,no_run
/// use mailbridge::{Email, EmailSender, SendgridBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = SendgridBackend::from_env()?;
///
/// let email = Email::new()
///     .to("user@example.com")
///     .from("noreply@myapp.com")
///     .subject("Hello!")
///     .text("Hello, World!")
///     .tag("welcome");
///
/// let status = backend.send(email).await?;
/// println!("tracked as {:?}", status.message_id);
/// # Ok(())
/// # }
/// ```
pub struct SendgridBackend {
    api_key: String,
    api_url: String,
    client: reqwest::Client,
    global_defaults: SendOptions,
    provider_defaults: SendOptions,
}

impl SendgridBackend {
    /// Create a backend with the given API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            client: reqwest::Client::new(),
            global_defaults: SendOptions::default(),
            provider_defaults: SendOptions::default(),
        }
    }

    /// Create a backend from environment variables
    ///
    /// Reads `MAILBRIDGE_SENDGRID_API_KEY`, falling back to
    /// `SENDGRID_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Configuration` naming both variables when
    /// neither is set.
    pub fn from_env() -> Result<Self, EmailError> {
        std::env::var(API_KEY_ENV)
            .or_else(|_| std::env::var(API_KEY_ENV_FALLBACK))
            .map(Self::new)
            .map_err(|_| {
                EmailError::config(format!(
                    "SendGrid API key not set: define {API_KEY_ENV} or {API_KEY_ENV_FALLBACK} \
                     in the environment"
                ))
            })
    }

    /// Override the API endpoint (for proxies and tests)
    #[must_use]
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set global send defaults, applied beneath any provider-specific
    /// defaults and per-message options
    #[must_use]
    pub fn send_defaults(mut self, defaults: SendOptions) -> Self {
        self.global_defaults = defaults;
        self
    }

    /// Set SendGrid-specific send defaults
    ///
    /// An option set here replaces the same option from the global
    /// defaults wholesale; per-message options still merge on top.
    #[must_use]
    pub fn sendgrid_defaults(mut self, defaults: SendOptions) -> Self {
        self.provider_defaults = defaults;
        self
    }

    /// Map a message onto the v2 mail.send request shape
    ///
    /// Everything that can go wrong before the network (unsupported
    /// features, unencodable data, malformed addresses) surfaces here.
    fn build_payload(&self, email: &Email) -> Result<MailSendPayload, EmailError> {
        email.validate()?;

        let mut fields: Vec<(String, String)> = Vec::new();
        let mut files: Vec<FilePart> = Vec::new();

        let from_raw = email.from.as_ref().ok_or(EmailError::NoSender)?;
        let sender = Address::parse(from_raw)?;
        fields.push(("from".to_string(), sender.email.clone()));
        if let Some(name) = &sender.name {
            fields.push(("fromname".to_string(), name.clone()));
        }

        // Recipient lists become repeated `to` fields plus a parallel
        // `toname` array when any address carries a display name.
        // Empty lists are omitted entirely, not sent as empty arrays.
        let mut recipients = Vec::new();
        for (field, list) in [("to", &email.to), ("cc", &email.cc), ("bcc", &email.bcc)] {
            if list.is_empty() {
                continue;
            }
            let parsed = list
                .iter()
                .map(|raw| Address::parse(raw))
                .collect::<Result<Vec<_>, _>>()?;
            for address in &parsed {
                fields.push((field.to_string(), address.email.clone()));
                recipients.push(address.email.clone());
            }
            if parsed.iter().any(|address| address.name.is_some()) {
                for address in &parsed {
                    // SendGrid balks on empty display names
                    fields.push((
                        format!("{field}name"),
                        address.name_or_placeholder().to_string(),
                    ));
                }
            }
        }

        fields.push(("subject".to_string(), email.subject.clone().unwrap_or_default()));

        let (text, html) = Self::body_parts(email)?;
        if let Some(text) = text {
            fields.push(("text".to_string(), text.to_string()));
        }
        if let Some(html) = html {
            fields.push(("html".to_string(), html.to_string()));
        }

        let (headers, message_id) = Self::headers_block(email, &sender);
        let headers_json = serde_json::to_string(&Value::Object(headers)).map_err(|e| {
            EmailError::serialization("Don't know how to send this data to SendGrid: headers", e)
        })?;
        fields.push(("headers".to_string(), headers_json));

        Self::file_parts(email, &mut fields, &mut files)?;

        let resolved = SendOptions::resolve(
            &self.global_defaults,
            &self.provider_defaults,
            &email.options,
        );
        Self::extension_fields(&resolved, &mut fields)?;

        Ok(MailSendPayload {
            fields,
            files,
            message_id,
            recipients,
        })
    }

    /// Resolve the text and html slots from the primary body and the
    /// alternative parts
    fn body_parts(email: &Email) -> Result<(Option<&str>, Option<&str>), EmailError> {
        let mut text = None;
        let mut html = None;
        match email.body_kind {
            BodyKind::Text => text = email.body.as_deref(),
            BodyKind::Html => html = email.body.as_deref(),
        }
        for alternative in &email.alternatives {
            if !alternative.mime_type.eq_ignore_ascii_case("text/html") {
                return Err(EmailError::unsupported(format!(
                    "alternative part with type {:?}",
                    alternative.mime_type
                )));
            }
            if html.is_some() {
                return Err(EmailError::unsupported("multiple html parts"));
            }
            html = Some(alternative.content.as_str());
        }
        Ok((text, html))
    }

    /// Assemble the JSON headers block and the tracked message id
    ///
    /// A Message-ID derived from the sender's domain is generated for
    /// event tracking unless the caller supplied one. Reply-to goes in
    /// here too: SendGrid's native replyto parameter is broken.
    fn headers_block(email: &Email, sender: &Address) -> (Map<String, Value>, String) {
        let mut headers = Map::new();
        for (name, value) in &email.headers {
            headers.insert(name.clone(), Value::String(value.clone()));
        }

        if !email.reply_to.is_empty() {
            let folded = email
                .reply_to
                .iter()
                .map(|raw| raw.trim())
                .collect::<Vec<_>>()
                .join(", ");
            let stale: Vec<String> = headers
                .keys()
                .filter(|key| key.eq_ignore_ascii_case("Reply-To"))
                .cloned()
                .collect();
            for key in stale {
                headers.remove(&key);
            }
            headers.insert("Reply-To".to_string(), Value::String(folded));
        }

        let message_id = match email.header_value("Message-ID") {
            Some(id) => id.to_string(),
            None => {
                let id = make_message_id(sender.domain());
                headers.insert("Message-ID".to_string(), Value::String(id.clone()));
                id
            }
        };

        (headers, message_id)
    }

    /// Turn attachments into `files[...]` parts
    ///
    /// Inline attachments also emit a `content[cid]` field mapping the
    /// part back to its content-id for the HTML body.
    fn file_parts(
        email: &Email,
        fields: &mut Vec<(String, String)>,
        files: &mut Vec<FilePart>,
    ) -> Result<(), EmailError> {
        let mut used_names: HashSet<&str> = HashSet::new();
        let mut unnamed_used = false;

        for attachment in &email.attachments {
            let mime_type = attachment.resolved_mime_type();
            if let Some(cid) = attachment.content_id.as_deref() {
                if !used_names.insert(cid) {
                    return Err(EmailError::unsupported(format!(
                        "multiple attachments with the same filename ({cid:?})"
                    )));
                }
                fields.push((format!("content[{cid}]"), cid.to_string()));
                files.push(FilePart {
                    field: format!("files[{cid}]"),
                    filename: cid.to_string(),
                    mime_type,
                    content: attachment.content.clone(),
                });
            } else if let Some(name) = attachment.filename.as_deref().filter(|n| !n.is_empty()) {
                if !used_names.insert(name) {
                    return Err(EmailError::unsupported(format!(
                        "multiple attachments with the same filename ({name:?})"
                    )));
                }
                files.push(FilePart {
                    field: format!("files[{name}]"),
                    filename: name.to_string(),
                    mime_type,
                    content: attachment.content.clone(),
                });
            } else {
                // The API reserves exactly one empty-key file slot
                if unnamed_used {
                    return Err(EmailError::unsupported("multiple unnamed attachments"));
                }
                unnamed_used = true;
                files.push(FilePart {
                    field: "files[]".to_string(),
                    filename: String::new(),
                    mime_type,
                    content: attachment.content.clone(),
                });
            }
        }

        Ok(())
    }

    /// Assemble the x-smtpapi extension block and remaining raw extra
    /// fields from the resolved options
    ///
    /// An empty block is omitted entirely so the SendGrid account
    /// defaults stay in effect.
    fn extension_fields(
        resolved: &SendOptions,
        fields: &mut Vec<(String, String)>,
    ) -> Result<(), EmailError> {
        let mut smtpapi = Map::new();
        if !resolved.tags.is_empty() {
            smtpapi.insert(
                "category".to_string(),
                Value::Array(resolved.tags.iter().cloned().map(Value::String).collect()),
            );
        }
        if !resolved.metadata.is_empty() {
            smtpapi.insert(
                "unique_args".to_string(),
                Value::Object(resolved.metadata.clone()),
            );
        }
        let mut filters = Map::new();
        if let Some(enabled) = resolved.track_clicks {
            filters.insert(
                "clicktrack".to_string(),
                json!({"settings": {"enable": i32::from(enabled)}}),
            );
        }
        if let Some(enabled) = resolved.track_opens {
            filters.insert(
                "opentrack".to_string(),
                json!({"settings": {"enable": i32::from(enabled)}}),
            );
        }
        if !filters.is_empty() {
            smtpapi.insert("filters".to_string(), Value::Object(filters));
        }
        if let Some(send_at) = &resolved.send_at {
            smtpapi.insert("send_at".to_string(), Value::from(send_at.epoch_seconds()));
        }

        let mut extra = resolved.extra.clone();
        if let Some(raw_smtpapi) = extra.remove("x-smtpapi") {
            // Raw caller-supplied entries win on key collisions
            match raw_smtpapi {
                Value::Object(entries) => {
                    for (key, value) in entries {
                        smtpapi.insert(key, value);
                    }
                }
                other => {
                    return Err(EmailError::unsupported(format!(
                        "x-smtpapi extra must be a JSON object, got {other}"
                    )))
                }
            }
        }

        if !smtpapi.is_empty() {
            let encoded = serde_json::to_string(&Value::Object(smtpapi)).map_err(|e| {
                EmailError::serialization(
                    "Don't know how to send this data to SendGrid: x-smtpapi",
                    e,
                )
            })?;
            fields.push(("x-smtpapi".to_string(), encoded));
        }

        for (key, value) in extra {
            let text = match value {
                Value::String(s) => s,
                other => serde_json::to_string(&other).map_err(|e| {
                    EmailError::serialization(
                        format!("Don't know how to send this data to SendGrid: extra field {key:?}"),
                        e,
                    )
                })?,
            };
            fields.push((key, text));
        }

        Ok(())
    }

    /// Normalize the ESP response into a delivery status
    ///
    /// SendGrid's only success body is `{"message": "success"}`, and it
    /// carries no per-recipient ids, so acceptance means every declared
    /// recipient is provisionally queued under the one tracked id.
    fn interpret_response(
        message_id: &str,
        recipients: &[String],
        response: EspResponse,
    ) -> Result<DeliveryStatus, EmailError> {
        if !response.is_success() {
            let message = format!(
                "SendGrid API response {}: {}",
                response.status_code,
                describe_error_body(&response)
            );
            return Err(EmailError::api(message, Some(response)));
        }

        let Ok(body) = response.json() else {
            return Err(EmailError::api(
                "invalid JSON in SendGrid API response",
                Some(response),
            ));
        };

        if body.get("message").and_then(Value::as_str) == Some("success") {
            let recipients = recipients
                .iter()
                .map(|email| {
                    (
                        email.clone(),
                        RecipientStatus {
                            status: SendStatus::Queued,
                            message_id: Some(message_id.to_string()),
                        },
                    )
                })
                .collect::<HashMap<_, _>>();
            Ok(DeliveryStatus {
                status: BTreeSet::from([SendStatus::Queued]),
                message_id: Some(message_id.to_string()),
                recipients,
                esp_response: Some(response),
            })
        } else {
            let message = format!("SendGrid send failed: {}", describe_error_body(&response));
            Err(EmailError::api(message, Some(response)))
        }
    }
}

#[async_trait]
impl EmailSender for SendgridBackend {
    async fn send(&self, email: Email) -> Result<DeliveryStatus, EmailError> {
        let payload = self.build_payload(&email)?;
        let message_id = payload.message_id.clone();
        let recipients = payload.recipients.clone();
        debug!(to = ?email.to, message_id = %message_id, "posting message to SendGrid");

        let form = payload.into_form()?;
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| EmailError::api(format!("error posting to {}: {e}", self.api_url), None))?;

        let status_code = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| EmailError::api(format!("error reading SendGrid API response: {e}"), None))?;

        Self::interpret_response(&message_id, &recipients, EspResponse::new(status_code, body.to_vec()))
    }
}

/// The assembled mail.send request: plain text fields plus file parts
#[derive(Debug)]
struct MailSendPayload {
    fields: Vec<(String, String)>,
    files: Vec<FilePart>,
    message_id: String,
    recipients: Vec<String>,
}

#[derive(Debug)]
struct FilePart {
    field: String,
    filename: String,
    mime_type: String,
    content: Vec<u8>,
}

impl MailSendPayload {
    fn into_form(self) -> Result<multipart::Form, EmailError> {
        let mut form = multipart::Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        for file in self.files {
            let FilePart {
                field,
                filename,
                mime_type,
                content,
            } = file;
            let part = multipart::Part::bytes(content)
                .file_name(filename)
                .mime_str(&mime_type)
                .map_err(|_| {
                    EmailError::unsupported(format!("attachment content-type {mime_type:?}"))
                })?;
            form = form.part(field, part);
        }
        Ok(form)
    }
}

fn make_message_id(domain: &str) -> String {
    let domain = if domain.is_empty() { "localhost" } else { domain };
    format!("<{}@{}>", Uuid::new_v4().simple(), domain)
}

/// Pull whatever error detail the response body offers
fn describe_error_body(response: &EspResponse) -> String {
    if response.body.is_empty() {
        return "(no error details)".to_string();
    }
    match response.json() {
        Ok(Value::Object(body)) => {
            if let Some(Value::Array(errors)) = body.get("errors") {
                let details: Vec<&str> = errors.iter().filter_map(Value::as_str).collect();
                if !details.is_empty() {
                    return details.join(", ");
                }
            }
            if let Some(message) = body.get("message").and_then(Value::as_str) {
                return message.to_string();
            }
            response.text().into_owned()
        }
        _ => response.text().into_owned(),
    }
}
