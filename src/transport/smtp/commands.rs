//! SMTP commands sent during a delivery

use std::fmt::{self, Display, Formatter};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::transport::smtp::{
    authentication::{Credentials, Mechanism},
    error::{self, Error},
    extension::{ClientId, MailParameter},
    response::Response,
};

/// EHLO command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Ehlo {
    client_id: ClientId,
}

impl Display for Ehlo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EHLO {}\r\n", self.client_id)
    }
}

impl Ehlo {
    /// Creates an EHLO command
    pub fn new(client_id: ClientId) -> Ehlo {
        Ehlo { client_id }
    }
}

/// HELO command, for servers without ESMTP
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Helo {
    client_id: ClientId,
}

impl Display for Helo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "HELO {}\r\n", self.client_id)
    }
}

impl Helo {
    /// Creates a HELO command
    pub fn new(client_id: ClientId) -> Helo {
        Helo { client_id }
    }
}

/// STARTTLS command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Starttls;

impl Display for Starttls {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("STARTTLS\r\n")
    }
}

/// MAIL command
///
/// The sender is written as given, no syntax check is done here.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Mail {
    sender: String,
    parameters: Vec<MailParameter>,
}

impl Display for Mail {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MAIL FROM:<{}>", self.sender)?;
        for parameter in &self.parameters {
            write!(f, " {parameter}")?;
        }
        f.write_str("\r\n")
    }
}

impl Mail {
    /// Creates a MAIL command
    pub fn new(sender: impl Into<String>, parameters: Vec<MailParameter>) -> Mail {
        Mail {
            sender: sender.into(),
            parameters,
        }
    }
}

/// RCPT command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Rcpt {
    recipient: String,
}

impl Display for Rcpt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RCPT TO:<{}>\r\n", self.recipient)
    }
}

impl Rcpt {
    /// Creates a RCPT command
    pub fn new(recipient: impl Into<String>) -> Rcpt {
        Rcpt {
            recipient: recipient.into(),
        }
    }
}

/// DATA command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Data;

impl Display for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("DATA\r\n")
    }
}

/// QUIT command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Quit;

impl Display for Quit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("QUIT\r\n")
    }
}

/// AUTH command, or a bare continuation line answering a 334 challenge
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Auth {
    mechanism: Mechanism,
    /// Base64 encoded client message, if one is due
    response: Option<String>,
    continuation: bool,
}

impl Display for Auth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (self.continuation, self.response.as_ref()) {
            (true, Some(response)) => f.write_str(response)?,
            (true, None) => {}
            (false, Some(response)) => write!(f, "AUTH {} {}", self.mechanism, response)?,
            (false, None) => write!(f, "AUTH {}", self.mechanism)?,
        }
        f.write_str("\r\n")
    }
}

impl Auth {
    /// Creates the opening AUTH command
    pub fn new(mechanism: Mechanism, credentials: &Credentials) -> Result<Auth, Error> {
        let response = if mechanism.supports_initial_response() {
            Some(STANDARD.encode(mechanism.response(credentials, None)?))
        } else {
            None
        };

        Ok(Auth {
            mechanism,
            response,
            continuation: false,
        })
    }

    /// Creates the answer to a 334 challenge
    pub fn new_from_response(
        mechanism: Mechanism,
        credentials: &Credentials,
        response: &Response,
    ) -> Result<Auth, Error> {
        if !response.has_code(334) {
            return Err(error::response("Expecting a challenge"));
        }

        let encoded_challenge = response
            .first_word()
            .ok_or_else(|| error::response("Could not read auth challenge"))?;
        tracing::debug!("auth encoded challenge: {encoded_challenge}");

        let decoded_challenge = STANDARD
            .decode(encoded_challenge)
            .map_err(error::response)
            .and_then(|bytes| String::from_utf8(bytes).map_err(error::response))?;
        tracing::debug!("auth decoded challenge: {decoded_challenge}");

        let answer = mechanism.response(credentials, Some(&decoded_challenge))?;

        Ok(Auth {
            mechanism,
            response: Some(STANDARD.encode(answer)),
            continuation: true,
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::smtp::response::{Category, Code, Detail, Severity};

    #[test]
    fn envelope_commands() {
        assert_eq!(
            Ehlo::new(ClientId::Domain("localhost".to_owned())).to_string(),
            "EHLO localhost\r\n"
        );
        assert_eq!(
            Helo::new(ClientId::Domain("localhost".to_owned())).to_string(),
            "HELO localhost\r\n"
        );
        assert_eq!(
            Mail::new("sender@example.com", vec![]).to_string(),
            "MAIL FROM:<sender@example.com>\r\n"
        );
        assert_eq!(
            Mail::new(
                "sender@example.com",
                vec![MailParameter::EightBitMime, MailParameter::SmtpUtfEight]
            )
            .to_string(),
            "MAIL FROM:<sender@example.com> BODY=8BITMIME SMTPUTF8\r\n"
        );
        assert_eq!(
            Rcpt::new("receiver@example.com").to_string(),
            "RCPT TO:<receiver@example.com>\r\n"
        );
        assert_eq!(Starttls.to_string(), "STARTTLS\r\n");
        assert_eq!(Data.to_string(), "DATA\r\n");
        assert_eq!(Quit.to_string(), "QUIT\r\n");
    }

    #[test]
    fn auth_plain_sends_initial_response() {
        let credentials = Credentials::new("user".to_owned(), "password".to_owned());

        assert_eq!(
            Auth::new(Mechanism::Plain, &credentials).unwrap().to_string(),
            "AUTH PLAIN AHVzZXIAcGFzc3dvcmQ=\r\n"
        );
    }

    #[test]
    fn auth_login_answers_challenges() {
        let credentials = Credentials::new("alice".to_owned(), "wonderland".to_owned());
        let challenge = |text: &str| {
            Response::new(
                Code::new(
                    Severity::PositiveIntermediate,
                    Category::Unspecified3,
                    Detail::Four,
                ),
                vec![text.to_owned()],
            )
        };

        assert_eq!(
            Auth::new(Mechanism::Login, &credentials).unwrap().to_string(),
            "AUTH LOGIN\r\n"
        );
        // "Username:" / "Password:"
        assert_eq!(
            Auth::new_from_response(Mechanism::Login, &credentials, &challenge("VXNlcm5hbWU6"))
                .unwrap()
                .to_string(),
            "YWxpY2U=\r\n"
        );
        assert_eq!(
            Auth::new_from_response(Mechanism::Login, &credentials, &challenge("UGFzc3dvcmQ6"))
                .unwrap()
                .to_string(),
            "d29uZGVybGFuZA==\r\n"
        );
        assert!(
            Auth::new_from_response(Mechanism::Login, &credentials, &challenge("!!notbase64"))
                .is_err()
        );
    }
}
