//! The stub transport records envelopes and messages instead of sending them.
//! It is useful for testing code built on [`Transport`], such as the
//! [`BatchSender`](crate::batch::BatchSender).
//!
//! ```rust
//! use smtp_notify::{
//!     config::SmtpConfig,
//!     transport::{stub::StubTransport, Transport},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SmtpConfig::new("smtp.example.com", "587", "from@example.com", "secret")?;
//! let sender = StubTransport::failing_for(["bad@example.com"]);
//!
//! assert!(sender.send(&config, "good@example.com", "Hi", "Hello").is_ok());
//! assert!(sender.send(&config, "bad@example.com", "Hi", "Hello").is_err());
//! assert_eq!(sender.messages().len(), 2);
//! # Ok(())
//! # }
//! ```

use std::{
    error::Error as StdError,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{address::Envelope, config::SmtpConfig, transport::Transport};

/// Error returned for recipients the stub was told to reject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    recipient: String,
}

impl Error {
    /// The rejected recipient
    pub fn recipient(&self) -> &str {
        &self.recipient
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stub transport rejected {}", self.recipient)
    }
}

impl StdError for Error {}

/// Records every message and answers with a fixed outcome per recipient
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct StubTransport {
    failing: Vec<String>,
    messages: Arc<Mutex<Vec<(Envelope, String)>>>,
}

impl StubTransport {
    /// Creates a transport that accepts every message
    pub fn new_positive() -> StubTransport {
        StubTransport::default()
    }

    /// Creates a transport that rejects the given recipients
    pub fn failing_for<I, S>(recipients: I) -> StubTransport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StubTransport {
            failing: recipients.into_iter().map(Into::into).collect(),
            ..StubTransport::default()
        }
    }

    /// Every attempted delivery so far, in order, rejected ones included
    pub fn messages(&self) -> Vec<(Envelope, String)> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for StubTransport {
    type Ok = ();
    type Error = Error;

    fn send_raw(
        &self,
        _config: &SmtpConfig,
        envelope: &Envelope,
        email: &[u8],
    ) -> Result<Self::Ok, Self::Error> {
        tracing::debug!(from = envelope.from(), to = envelope.to(), "stub delivery");
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((envelope.clone(), String::from_utf8_lossy(email).into_owned()));

        if self.failing.iter().any(|recipient| recipient == envelope.to()) {
            Err(Error {
                recipient: envelope.to().to_owned(),
            })
        } else {
            Ok(())
        }
    }
}
