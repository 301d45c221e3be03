//! Plain text email notifications over SMTP.
//!
//! The relay settings are read once from the environment into a
//! [`SmtpConfig`](config::SmtpConfig). A [`BatchSender`](batch::BatchSender)
//! then delivers the same notification to every recipient, each over its own
//! SMTP session, and reports how each delivery went.
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let report = smtp_notify::batch::send_all(
//!     &["ops@example.com", "oncall@example.com"],
//!     "Backup finished",
//!     "The nightly backup completed.",
//! )?;
//!
//! for (recipient, err) in report.failed() {
//!     eprintln!("{recipient}: {err}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Settings are taken from `SMTP_HOST`, `SMTP_PORT`, `SENDER_EMAIL` and
//! `APP_PASSWORD`, after merging a `.env` file when one is found.

#![deny(missing_docs, unsafe_code, unstable_features)]

pub mod address;
pub mod batch;
pub mod config;
pub mod message;
pub mod transport;

pub use crate::{
    address::Envelope,
    batch::{BatchReport, BatchSender},
    config::{ConfigError, SmtpConfig},
    message::build_message,
    transport::{smtp::SmtpTransport, Transport},
};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
