//! Email backend implementations
//!
//! This module provides the backend implementations for sending emails:
//! - **SendGrid**: send via SendGrid's legacy v2 mail.send HTTP API
//!   (production)
//! - **Console**: print emails to the console (development)

pub mod console;
pub mod sendgrid;

pub use console::ConsoleBackend;
pub use sendgrid::SendgridBackend;
