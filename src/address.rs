//! SMTP envelope

/// Sender and recipient announced with `MAIL FROM` and `RCPT TO`
///
/// Both addresses are taken verbatim. Syntax checking is left to the relay,
/// which rejects bad addresses at the envelope step.
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct Envelope {
    /// The envelope sender address
    reverse_path: String,
    /// The envelope recipient address
    forward_path: String,
}

impl Envelope {
    /// Creates a new envelope for a single recipient
    ///
    /// ```
    /// use smtp_notify::address::Envelope;
    ///
    /// let envelope = Envelope::new("from@example.com", "to@example.com");
    /// assert_eq!(envelope.from(), "from@example.com");
    /// assert_eq!(envelope.to(), "to@example.com");
    /// ```
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Envelope {
        Envelope {
            reverse_path: from.into(),
            forward_path: to.into(),
        }
    }

    /// Gets the sender of the envelope
    pub fn from(&self) -> &str {
        &self.reverse_path
    }

    /// Gets the destination address of the envelope
    pub fn to(&self) -> &str {
        &self.forward_path
    }

    /// Whether either address needs SMTPUTF8
    pub(crate) fn has_non_ascii_addresses(&self) -> bool {
        !self.reverse_path.is_ascii() || !self.forward_path.is_ascii()
    }
}

#[cfg(test)]
mod test {
    use super::Envelope;

    #[test]
    fn detects_non_ascii_addresses() {
        assert!(!Envelope::new("a@example.com", "b@example.com").has_non_ascii_addresses());
        assert!(Envelope::new("a@example.com", "jürgen@example.com").has_non_ascii_addresses());
        assert!(Envelope::new("тест@example.com", "b@example.com").has_non_ascii_addresses());
    }
}
