//! ESMTP capabilities announced in the EHLO reply

use std::{
    collections::HashSet,
    fmt::{self, Display, Formatter},
    net::Ipv4Addr,
};

use crate::transport::smtp::{
    authentication::Mechanism,
    error::{self, Error},
    response::Response,
};

/// Client identifier, the parameter to `EHLO`
#[derive(PartialEq, Eq, Clone, Debug)]
#[non_exhaustive]
pub enum ClientId {
    /// A fully-qualified domain name
    Domain(String),
    /// An IPv4 address literal
    Ipv4(Ipv4Addr),
}

const LOCALHOST_CLIENT: ClientId = ClientId::Ipv4(Ipv4Addr::LOCALHOST);

impl Default for ClientId {
    fn default() -> Self {
        // RFC 5321 section 4.1.4: send the primary host name, or an address
        // literal when there is none.
        #[cfg(feature = "hostname")]
        {
            hostname::get()
                .ok()
                .and_then(|s| s.into_string().ok())
                .filter(|name| !name.is_empty())
                .map(Self::Domain)
                .unwrap_or(LOCALHOST_CLIENT)
        }
        #[cfg(not(feature = "hostname"))]
        LOCALHOST_CLIENT
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Domain(ref value) => f.write_str(value),
            Self::Ipv4(ref value) => write!(f, "[{value}]"),
        }
    }
}

/// ESMTP keywords this client acts upon
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum Extension {
    /// 8BITMIME, [RFC 6152](https://tools.ietf.org/html/rfc6152)
    EightBitMime,
    /// SMTPUTF8, [RFC 6531](https://tools.ietf.org/html/rfc6531)
    SmtpUtfEight,
    /// STARTTLS, [RFC 3207](https://tools.ietf.org/html/rfc3207)
    StartTls,
    /// One AUTH mechanism
    Authentication(Mechanism),
}

impl Display for Extension {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Extension::EightBitMime => f.write_str("8BITMIME"),
            Extension::SmtpUtfEight => f.write_str("SMTPUTF8"),
            Extension::StartTls => f.write_str("STARTTLS"),
            Extension::Authentication(ref mechanism) => write!(f, "AUTH {mechanism}"),
        }
    }
}

/// What the server told us about itself in its last EHLO reply
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct ServerInfo {
    /// Name given on the first EHLO line
    name: String,
    /// Known capabilities
    features: HashSet<Extension>,
}

impl Display for ServerInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.features.is_empty() {
            return write!(f, "{} with no supported features", self.name);
        }

        let mut features: Vec<String> = self.features.iter().map(ToString::to_string).collect();
        features.sort();
        write!(f, "{} with {}", self.name, features.join(", "))
    }
}

impl ServerInfo {
    /// Parses an EHLO reply
    pub fn from_response(response: &Response) -> Result<ServerInfo, Error> {
        let name = response
            .first_word()
            .ok_or_else(|| error::response("Could not read server name"))?;

        let mut features = HashSet::new();

        // the first line is the greeting, keywords follow
        for line in response.message().skip(1) {
            let mut split = line.split_whitespace();
            let Some(keyword) = split.next() else {
                continue;
            };

            match keyword.to_ascii_uppercase().as_str() {
                "8BITMIME" => {
                    features.insert(Extension::EightBitMime);
                }
                "SMTPUTF8" => {
                    features.insert(Extension::SmtpUtfEight);
                }
                "STARTTLS" => {
                    features.insert(Extension::StartTls);
                }
                "AUTH" => {
                    for mechanism in split {
                        match mechanism.to_ascii_uppercase().as_str() {
                            "PLAIN" => {
                                features.insert(Extension::Authentication(Mechanism::Plain));
                            }
                            "LOGIN" => {
                                features.insert(Extension::Authentication(Mechanism::Login));
                            }
                            _ => (),
                        }
                    }
                }
                _ => (),
            };
        }

        Ok(ServerInfo {
            name: name.to_owned(),
            features,
        })
    }

    /// Checks if the server supports an ESMTP feature
    pub fn supports_feature(&self, keyword: Extension) -> bool {
        self.features.contains(&keyword)
    }

    /// Checks if the server supports an AUTH mechanism
    pub fn supports_auth_mechanism(&self, mechanism: Mechanism) -> bool {
        self.supports_feature(Extension::Authentication(mechanism))
    }

    /// First mechanism of `mechanisms` the server accepts
    pub fn get_auth_mechanism(&self, mechanisms: &[Mechanism]) -> Option<Mechanism> {
        mechanisms
            .iter()
            .copied()
            .find(|mechanism| self.supports_auth_mechanism(*mechanism))
    }

    /// The name given in the EHLO reply
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A `MAIL FROM` extension parameter
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum MailParameter {
    /// `BODY=8BITMIME`
    EightBitMime,
    /// `SMTPUTF8`
    SmtpUtfEight,
}

impl Display for MailParameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            MailParameter::EightBitMime => f.write_str("BODY=8BITMIME"),
            MailParameter::SmtpUtfEight => f.write_str("SMTPUTF8"),
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn ehlo(raw: &str) -> ServerInfo {
        ServerInfo::from_response(&raw.parse().unwrap()).unwrap()
    }

    #[test]
    fn client_id_display() {
        assert_eq!(ClientId::Domain("mail.local".to_owned()).to_string(), "mail.local");
        assert_eq!(LOCALHOST_CLIENT.to_string(), "[127.0.0.1]");
    }

    #[test]
    fn parses_capabilities() {
        let info = ehlo(
            "250-smtp.example.org greets you\r\n250-starttls\r\n250-AUTH LOGIN PLAIN XOAUTH2\r\n250 8BITMIME\r\n",
        );

        assert_eq!(info.name(), "smtp.example.org");
        assert!(info.supports_feature(Extension::StartTls));
        assert!(info.supports_feature(Extension::EightBitMime));
        assert!(!info.supports_feature(Extension::SmtpUtfEight));
        assert_eq!(
            info.get_auth_mechanism(&[Mechanism::Plain, Mechanism::Login]),
            Some(Mechanism::Plain)
        );
        assert_eq!(
            info.to_string(),
            "smtp.example.org with 8BITMIME, AUTH LOGIN, AUTH PLAIN, STARTTLS"
        );
    }

    #[test]
    fn greeting_line_is_not_a_keyword() {
        let info = ehlo("250 STARTTLS\r\n");

        assert_eq!(info.name(), "STARTTLS");
        assert!(!info.supports_feature(Extension::StartTls));
        assert_eq!(info.to_string(), "STARTTLS with no supported features");
        assert_eq!(info.get_auth_mechanism(&[Mechanism::Plain]), None);
    }

    #[test]
    fn mail_parameter_display() {
        assert_eq!(MailParameter::EightBitMime.to_string(), "BODY=8BITMIME");
        assert_eq!(MailParameter::SmtpUtfEight.to_string(), "SMTPUTF8");
    }
}
