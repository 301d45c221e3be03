//! Sends one notification to many recipients
//!
//! Every recipient gets its own delivery. A failure is logged and recorded,
//! then the batch moves on to the next recipient.

use std::fmt::Display;

use crate::{
    config::{ConfigError, SmtpConfig},
    transport::{
        smtp::{Error, Response, SmtpTransport},
        Transport,
    },
};

/// Outcome of the delivery to one recipient
#[derive(Debug)]
pub struct Delivery<T, E> {
    recipient: String,
    outcome: Result<T, E>,
}

impl<T, E> Delivery<T, E> {
    /// The recipient, as given
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// What the transport returned
    pub fn outcome(&self) -> &Result<T, E> {
        &self.outcome
    }

    /// Whether the message was accepted
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Every delivery of a batch, in recipient order
#[derive(Debug)]
pub struct BatchReport<T, E> {
    deliveries: Vec<Delivery<T, E>>,
}

impl<T, E> BatchReport<T, E> {
    /// All deliveries, in recipient order
    pub fn deliveries(&self) -> &[Delivery<T, E>] {
        &self.deliveries
    }

    /// Recipients whose message was accepted
    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.deliveries
            .iter()
            .filter(|delivery| delivery.is_success())
            .map(Delivery::recipient)
    }

    /// Recipients whose delivery failed, with the reason
    pub fn failed(&self) -> impl Iterator<Item = (&str, &E)> {
        self.deliveries.iter().filter_map(|delivery| {
            delivery
                .outcome
                .as_ref()
                .err()
                .map(|err| (delivery.recipient(), err))
        })
    }

    /// Number of accepted messages
    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    /// Number of failed deliveries
    pub fn failure_count(&self) -> usize {
        self.deliveries.len() - self.success_count()
    }

    /// Number of attempted deliveries
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    /// Whether the batch had no recipient
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    /// True when every recipient got the message, or there were none
    pub fn all_succeeded(&self) -> bool {
        self.deliveries.iter().all(Delivery::is_success)
    }
}

/// Sends the same notification to a list of recipients
///
/// ```rust
/// use smtp_notify::{batch::BatchSender, config::SmtpConfig, transport::stub::StubTransport};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SmtpConfig::new("smtp.example.com", "587", "from@example.com", "secret")?;
/// let sender = BatchSender::new(config, StubTransport::failing_for(["b@example.com"]));
///
/// let report = sender.send_all(&["a@example.com", "b@example.com"], "Hi", "Hello");
/// assert_eq!(report.success_count(), 1);
/// assert_eq!(report.failure_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BatchSender<T> {
    config: SmtpConfig,
    transport: T,
}

impl<T> BatchSender<T>
where
    T: Transport,
    T::Error: Display,
{
    /// Creates a sender using `config` for every delivery
    pub fn new(config: SmtpConfig, transport: T) -> Self {
        BatchSender { config, transport }
    }

    /// The config used for every delivery
    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Attempts every recipient in order, whatever happened to the previous ones
    pub fn send_all<S: AsRef<str>>(
        &self,
        recipients: &[S],
        subject: &str,
        body: &str,
    ) -> BatchReport<T::Ok, T::Error> {
        let mut deliveries = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let recipient = recipient.as_ref();
            let outcome = self.transport.send(&self.config, recipient, subject, body);
            match &outcome {
                Ok(_) => tracing::info!("notification sent to {recipient}"),
                Err(err) => tracing::error!("failed to send notification to {recipient}: {err}"),
            }
            deliveries.push(Delivery {
                recipient: recipient.to_owned(),
                outcome,
            });
        }

        BatchReport { deliveries }
    }
}

/// Loads the config from the environment and notifies every recipient
///
/// Uses the controlled SMTP transport with its default settings. Fails only
/// when the config cannot be loaded, before any connection is made; a
/// returned report may still hold failed deliveries.
pub fn send_all<S: AsRef<str>>(
    recipients: &[S],
    subject: &str,
    body: &str,
) -> Result<BatchReport<Response, Error>, ConfigError> {
    let config = SmtpConfig::from_env()?;
    let sender = BatchSender::new(config, SmtpTransport::controlled());
    Ok(sender.send_all(recipients, subject, body))
}

/// Splits a comma separated list of addresses
///
/// Entries are trimmed and empty ones dropped. Order and duplicates are kept.
///
/// ```
/// use smtp_notify::batch::parse_recipient_list;
///
/// assert_eq!(
///     parse_recipient_list(" a@example.com,,b@example.com ,"),
///     vec!["a@example.com", "b@example.com"]
/// );
/// ```
pub fn parse_recipient_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|recipient| !recipient.is_empty())
        .map(str::to_owned)
        .collect()
}
