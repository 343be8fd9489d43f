//! mailbridge: outgoing-email abstraction with pluggable ESP backends
//!
//! This crate separates *what* an application sends from *how* an email
//! service provider wants it delivered:
//! - [`Email`] models the message itself (recipients, subject, bodies,
//!   headers, attachments) plus provider-agnostic [`SendOptions`]
//!   (metadata, tags, tracking flags, scheduled send time)
//! - [`EmailSender`] is the trait every backend implements, with
//!   silent-failure and batch entry points
//! - [`SendgridBackend`] maps messages onto SendGrid's legacy v2
//!   mail.send HTTP API and normalizes the response into a
//!   [`DeliveryStatus`]
//! - [`ConsoleBackend`] and [`testing::MockEmailSender`] cover
//!   development and tests
//!
//! Send options resolve across three layers (global defaults,
//! provider-specific defaults, and the message itself) before a
//! backend builds its payload; see [`options`] for the merge rules.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mailbridge::{Email, EmailSender, SendgridBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads MAILBRIDGE_SENDGRID_API_KEY or SENDGRID_API_KEY
//!     let backend = SendgridBackend::from_env()?;
//!
//!     let email = Email::new()
//!         .to("Jane Doe <jane@example.com>")
//!         .from("noreply@myapp.com")
//!         .subject("Welcome!")
//!         .text("Welcome to our app!")
//!         .html("<h1>Welcome to our app!</h1>")
//!         .tag("welcome")
//!         .metadata("user_id", "12345");
//!
//!     let status = backend.send(email).await?;
//!     println!("queued as {:?}", status.message_id);
//!     Ok(())
//! }
//! ```
//!
//! Sending never retries and keeps no state: each call maps to exactly
//! one API request, and a failure either propagates as an
//! [`EmailError`] or, through [`EmailSender::send_silently`], becomes
//! an empty status the caller can inspect.

pub mod backend;
pub mod error;
pub mod message;
pub mod options;
pub mod sender;
pub mod status;
pub mod testing;

pub use backend::{ConsoleBackend, SendgridBackend};
pub use error::EmailError;
pub use message::{Address, Alternative, Attachment, BodyKind, Email};
pub use options::{SendAt, SendOptions};
pub use sender::EmailSender;
pub use status::{BatchOutcome, DeliveryStatus, EspResponse, RecipientStatus, SendStatus};
