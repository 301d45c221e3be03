//! SASL mechanisms used to log in to the relay

use std::fmt::{self, Debug, Display, Formatter};

use crate::{
    config::SmtpConfig,
    transport::smtp::error::{self, Error},
};

/// Mechanisms tried, in order, when the relay advertises several
///
/// LOGIN only comes into play for relays that do not offer PLAIN.
pub const DEFAULT_MECHANISMS: &[Mechanism] = &[Mechanism::Plain, Mechanism::Login];

/// Login identity and secret
#[derive(PartialEq, Eq, Clone, Hash)]
pub struct Credentials {
    authentication_identity: String,
    secret: String,
}

impl Credentials {
    /// Create a `Credentials` struct from username and password
    pub fn new(username: String, password: String) -> Credentials {
        Credentials {
            authentication_identity: username,
            secret: password,
        }
    }
}

impl From<&SmtpConfig> for Credentials {
    fn from(config: &SmtpConfig) -> Self {
        Credentials::new(config.username().to_owned(), config.secret().to_owned())
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

/// Supported authentication mechanisms
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum Mechanism {
    /// PLAIN, [RFC 4616](https://tools.ietf.org/html/rfc4616)
    Plain,
    /// LOGIN, [draft-murchison-sasl-login-00](https://www.ietf.org/archive/id/draft-murchison-sasl-login-00.txt)
    Login,
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Mechanism::Plain => "PLAIN",
            Mechanism::Login => "LOGIN",
        })
    }
}

impl Mechanism {
    /// Whether the first client message goes on the `AUTH` line
    pub fn supports_initial_response(self) -> bool {
        match self {
            Mechanism::Plain => true,
            Mechanism::Login => false,
        }
    }

    /// The clear text client message for the given server challenge
    pub fn response(
        self,
        credentials: &Credentials,
        challenge: Option<&str>,
    ) -> Result<String, Error> {
        match self {
            Mechanism::Plain => match challenge {
                Some(_) => Err(error::client("This mechanism does not expect a challenge")),
                None => Ok(format!(
                    "\u{0}{}\u{0}{}",
                    credentials.authentication_identity, credentials.secret
                )),
            },
            Mechanism::Login => {
                let decoded_challenge = challenge
                    .ok_or_else(|| error::client("This mechanism does expect a challenge"))?;

                match decoded_challenge.trim_end_matches(':').to_ascii_lowercase().as_str() {
                    "user name" | "username" => Ok(credentials.authentication_identity.clone()),
                    "password" => Ok(credentials.secret.clone()),
                    _ => Err(error::client("Unrecognized challenge")),
                }
            }
        }
    }
}
