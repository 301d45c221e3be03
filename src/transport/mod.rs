//! ## Transports for sending notifications
//!
//! A transport delivers one message to one recipient. Two are provided:
//!
//! | Module   | Protocol | Description                                                  |
//! | -------- | -------- | ------------------------------------------------------------ |
//! | [`smtp`] | SMTP     | Delivers through a relay, STARTTLS required by default       |
//! | [`stub`] | N/A      | Records what it is given, for tests                          |
//!
//! Both take the [`SmtpConfig`] by reference on every call. The sender
//! address of the config is used for the `From` header, the envelope sender
//! and the login.

use crate::{address::Envelope, config::SmtpConfig, message::build_message};

pub mod smtp;
pub mod stub;

/// Blocking transport for plain text notifications
pub trait Transport {
    /// Response produced by the Transport
    type Ok;
    /// Error produced by the Transport
    type Error;

    /// Builds the message and envelope for `to`, then sends it
    fn send(
        &self,
        config: &SmtpConfig,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<Self::Ok, Self::Error> {
        let message = build_message(config.username(), to, subject, body);
        let envelope = Envelope::new(config.username(), to);
        self.send_raw(config, &envelope, message.as_bytes())
    }

    /// Sends an already formatted message
    fn send_raw(
        &self,
        config: &SmtpConfig,
        envelope: &Envelope,
        email: &[u8],
    ) -> Result<Self::Ok, Self::Error>;
}
