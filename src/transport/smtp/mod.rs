//! The SMTP transport delivers notifications through a relay.
//!
//! This client follows [RFC 5321](https://tools.ietf.org/html/rfc5321) and
//! relies on the relay for address checks. It implements the following
//! extensions:
//!
//! * STARTTLS ([RFC 3207](https://tools.ietf.org/html/rfc3207))
//! * AUTH ([RFC 4954](https://tools.ietf.org/html/rfc4954)) with PLAIN and LOGIN
//! * 8BITMIME ([RFC 6152](https://tools.ietf.org/html/rfc6152))
//! * SMTPUTF8 ([RFC 6531](https://tools.ietf.org/html/rfc6531))
//!
//! Every delivery opens a fresh session, which is released before
//! [`send`](crate::transport::Transport::send) returns.
//!
//! #### Strategies
//!
//! [`Strategy::Controlled`], the default, runs the session step by step. The
//! relay must offer STARTTLS, credentials are never sent in clear. Each
//! failing step is reported with its own error kind, and a failed `QUIT` after
//! the message was accepted is only logged.
//!
//! [`Strategy::Simplified`] is a one shot send: it upgrades with STARTTLS
//! when the relay offers it, and reports any failure, `QUIT` included, as the
//! underlying protocol error. Without STARTTLS it only logs in when the relay
//! is `localhost`, `127.0.0.1` or `::1`.
//!
//! #### Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use smtp_notify::{
//!     config::SmtpConfig,
//!     transport::{smtp::SmtpTransport, Transport},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SmtpConfig::from_env()?;
//! let mailer = SmtpTransport::builder()
//!     .timeout(Some(Duration::from_secs(10)))
//!     .build();
//!
//! match mailer.send(&config, "receiver@example.com", "Deploy finished", "All green.") {
//!     Ok(response) => println!("accepted: {:?}", response.first_line()),
//!     Err(err) if err.is_unsupported() => eprintln!("relay does not offer STARTTLS"),
//!     Err(err) => eprintln!("could not send: {err}"),
//! }
//! # Ok(())
//! # }
//! ```

use std::{marker::PhantomData, time::Duration};

use crate::{
    address::Envelope,
    config::SmtpConfig,
    transport::{
        smtp::{
            authentication::{Credentials, Mechanism, DEFAULT_MECHANISMS},
            client::{
                Certificate, Connector, NetworkStream, SmtpConnection, TlsParameters, TlsVersion,
            },
            extension::ClientId,
            session::Session,
        },
        Transport,
    },
};

pub use self::{error::Error, response::Response};

pub mod authentication;
pub mod client;
pub mod commands;
pub mod error;
pub mod extension;
pub mod response;
mod session;

// Registered port numbers:
// https://www.iana.org/assignments/service-names-port-numbers/service-names-port-numbers.xhtml

/// Default smtp port
pub const SMTP_PORT: u16 = 25;
/// Default submission port
pub const SUBMISSION_PORT: u16 = 587;
/// Default submission over TLS port
///
/// Defined in [RFC8314](https://tools.ietf.org/html/rfc8314)
pub const SUBMISSIONS_PORT: u16 = 465;

/// Default timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How a delivery runs its session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Step by step session, STARTTLS required
    #[default]
    Controlled,
    /// One shot send, clear text login only to localhost
    Simplified,
}

/// Delivers each message over its own SMTP session
///
/// `C` is the stream the session runs over, a TCP connection upgraded with
/// `native-tls` unless another [`Connector`] is given.
pub struct SmtpTransport<C: Connector = NetworkStream> {
    info: SmtpInfo,
    connector: PhantomData<fn() -> C>,
}

impl<C: Connector> Clone for SmtpTransport<C> {
    fn clone(&self) -> Self {
        SmtpTransport {
            info: self.info.clone(),
            connector: PhantomData,
        }
    }
}

impl<C: Connector> std::fmt::Debug for SmtpTransport<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("info", &self.info)
            .finish()
    }
}

/// Session settings shared by every delivery
#[derive(Debug, Clone)]
struct SmtpInfo {
    strategy: Strategy,
    /// Name sent during EHLO
    hello_name: ClientId,
    /// Authentication mechanisms, tried in order
    authentication: Vec<Mechanism>,
    /// Read, write and connect timeout
    timeout: Option<Duration>,
    root_certs: Vec<Certificate>,
    accept_invalid_certs: bool,
    min_tls_version: TlsVersion,
}

impl Default for SmtpInfo {
    fn default() -> Self {
        SmtpInfo {
            strategy: Strategy::default(),
            hello_name: ClientId::default(),
            authentication: DEFAULT_MECHANISMS.into(),
            timeout: Some(DEFAULT_TIMEOUT),
            root_certs: Vec::new(),
            accept_invalid_certs: false,
            min_tls_version: TlsVersion::default(),
        }
    }
}

impl SmtpTransport {
    /// Creates a new builder with the default settings
    ///
    /// Defaults are:
    ///
    /// * The controlled strategy
    /// * PLAIN, then LOGIN authentication
    /// * A 60 seconds timeout for connecting and for every command
    /// * System root certificates, TLS 1.2 or later
    pub fn builder() -> SmtpTransportBuilder {
        SmtpTransportBuilder::new()
    }

    /// Transport with the default settings and the controlled strategy
    pub fn controlled() -> SmtpTransport {
        Self::new(Strategy::Controlled)
    }

    /// Transport with the default settings and the simplified strategy
    pub fn simplified() -> SmtpTransport {
        Self::new(Strategy::Simplified)
    }

    /// Transport with the default settings and the given strategy
    pub fn new(strategy: Strategy) -> SmtpTransport {
        Self::builder().strategy(strategy).build()
    }
}

impl<C: Connector> SmtpTransport<C> {
    /// Creates a new builder for sessions running over `C`
    pub fn builder_with_connector() -> SmtpTransportBuilder<C> {
        SmtpTransportBuilder::new()
    }

    /// The strategy used for every delivery
    pub fn strategy(&self) -> Strategy {
        self.info.strategy
    }

    fn port(config: &SmtpConfig) -> Result<u16, Error> {
        config.port().parse().map_err(error::dial)
    }

    fn tls_parameters(&self, domain: &str) -> Result<TlsParameters, Error> {
        let mut builder = TlsParameters::builder(domain.to_owned())
            .set_min_tls_version(self.info.min_tls_version)
            .dangerous_accept_invalid_certs(self.info.accept_invalid_certs);
        for cert in &self.info.root_certs {
            builder = builder.add_root_certificate(cert.clone());
        }
        builder.build()
    }

    fn send_controlled(
        &self,
        config: &SmtpConfig,
        envelope: &Envelope,
        email: &[u8],
    ) -> Result<Response, Error> {
        let port = Self::port(config)?;
        let mut session = Session::<C>::dial(
            config.host(),
            port,
            self.info.timeout,
            &self.info.hello_name,
        )?;

        session.secure(|| self.tls_parameters(config.host()), &self.info.hello_name)?;
        session.authenticate(&self.info.authentication, &Credentials::from(config))?;
        session.envelope(envelope, email)?;
        let response = session.data(email)?;
        session.quit();

        Ok(response)
    }

    fn send_simplified(
        &self,
        config: &SmtpConfig,
        envelope: &Envelope,
        email: &[u8],
    ) -> Result<Response, Error> {
        let mut conn = SmtpConnection::<C>::connect(
            config.host(),
            Self::port(config)?,
            self.info.timeout,
            &self.info.hello_name,
        )?;

        if conn.can_starttls() {
            conn.starttls(&self.tls_parameters(config.host())?, &self.info.hello_name)?;
        } else if is_localhost(config.host()) {
            tracing::warn!("{} does not offer STARTTLS, sending in clear", config.host());
        } else {
            conn.abort();
            return Err(error::client("unencrypted connection"));
        }
        conn.auth(&self.info.authentication, &Credentials::from(config))?;

        let response = conn.send(envelope, email)?;
        conn.quit()?;

        Ok(response)
    }
}

/// Hosts credentials may be sent to without TLS
fn is_localhost(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

impl<C: Connector> Transport for SmtpTransport<C> {
    type Ok = Response;
    type Error = Error;

    /// Sends an email over a fresh session
    fn send_raw(
        &self,
        config: &SmtpConfig,
        envelope: &Envelope,
        email: &[u8],
    ) -> Result<Self::Ok, Self::Error> {
        match self.info.strategy {
            Strategy::Controlled => self.send_controlled(config, envelope, email),
            Strategy::Simplified => self.send_simplified(config, envelope, email),
        }
    }
}

/// Builder for [`SmtpTransport`]
pub struct SmtpTransportBuilder<C: Connector = NetworkStream> {
    info: SmtpInfo,
    connector: PhantomData<fn() -> C>,
}

impl<C: Connector> std::fmt::Debug for SmtpTransportBuilder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpTransportBuilder")
            .field("info", &self.info)
            .finish()
    }
}

impl<C: Connector> SmtpTransportBuilder<C> {
    fn new() -> Self {
        SmtpTransportBuilder {
            info: SmtpInfo::default(),
            connector: PhantomData,
        }
    }

    /// Set the strategy used for every delivery
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.info.strategy = strategy;
        self
    }

    /// Set the name used during EHLO
    pub fn hello_name(mut self, name: ClientId) -> Self {
        self.info.hello_name = name;
        self
    }

    /// Set the authentication mechanisms, tried in order
    pub fn authentication(mut self, mechanisms: Vec<Mechanism>) -> Self {
        self.info.authentication = mechanisms;
        self
    }

    /// Set the timeout duration
    ///
    /// Applies to connecting and to every command. `None` waits forever.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.info.timeout = timeout;
        self
    }

    /// Trust an extra root certificate during the STARTTLS handshake
    pub fn add_root_certificate(mut self, cert: Certificate) -> Self {
        self.info.root_certs.push(cert);
        self
    }

    /// Set the lowest TLS version accepted
    pub fn min_tls_version(mut self, version: TlsVersion) -> Self {
        self.info.min_tls_version = version;
        self
    }

    /// Accept any certificate presented by the relay
    ///
    /// # Warning
    ///
    /// The session stays encrypted but the relay is no longer authenticated.
    /// Only meant for relays with a self signed certificate on a trusted
    /// network.
    pub fn dangerous_accept_invalid_certs(mut self, accept_invalid_certs: bool) -> Self {
        self.info.accept_invalid_certs = accept_invalid_certs;
        self
    }

    /// Build the transport
    pub fn build(self) -> SmtpTransport<C> {
        SmtpTransport {
            info: self.info,
            connector: PhantomData,
        }
    }
}
