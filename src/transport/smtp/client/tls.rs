use std::fmt::{self, Debug};

use native_tls::{Protocol, TlsConnector};

use crate::transport::smtp::{error, Error};

/// Lowest TLS protocol version accepted during the handshake
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsVersion {
    /// TLS 1.0, only for relays stuck on legacy stacks
    Tlsv10,
    /// TLS 1.1, only for relays stuck on legacy stacks
    Tlsv11,
    /// TLS 1.2
    #[default]
    Tlsv12,
}

impl From<TlsVersion> for Protocol {
    fn from(version: TlsVersion) -> Self {
        match version {
            TlsVersion::Tlsv10 => Protocol::Tlsv10,
            TlsVersion::Tlsv11 => Protocol::Tlsv11,
            TlsVersion::Tlsv12 => Protocol::Tlsv12,
        }
    }
}

/// Everything needed to run the handshake after `STARTTLS`
#[derive(Clone)]
pub struct TlsParameters {
    pub(super) connector: TlsConnector,
    /// The name expected in the server certificate
    domain: String,
}

impl Debug for TlsParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsParameters")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl TlsParameters {
    /// System roots, TLS 1.2 or later, certificate checked against `domain`
    pub fn new(domain: String) -> Result<Self, Error> {
        TlsParametersBuilder::new(domain).build()
    }

    /// Creates a new `TlsParameters` builder
    pub fn builder(domain: String) -> TlsParametersBuilder {
        TlsParametersBuilder::new(domain)
    }

    /// The name expected in the server certificate
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

/// Builder for [`TlsParameters`]
#[derive(Debug, Clone)]
pub struct TlsParametersBuilder {
    domain: String,
    root_certs: Vec<Certificate>,
    accept_invalid_certs: bool,
    min_tls_version: TlsVersion,
}

impl TlsParametersBuilder {
    /// Creates a new builder for `TlsParameters`
    pub fn new(domain: String) -> Self {
        Self {
            domain,
            root_certs: Vec::new(),
            accept_invalid_certs: false,
            min_tls_version: TlsVersion::default(),
        }
    }

    /// Trust an extra root, e.g. the CA of a relay with a private PKI
    pub fn add_root_certificate(mut self, cert: Certificate) -> Self {
        self.root_certs.push(cert);
        self
    }

    /// Controls which minimum TLS version is allowed
    pub fn set_min_tls_version(mut self, min_tls_version: TlsVersion) -> Self {
        self.min_tls_version = min_tls_version;
        self
    }

    /// Controls whether invalid certificates are accepted
    ///
    /// Defaults to `false`.
    ///
    /// # Warning
    ///
    /// Any certificate is then trusted, including self signed, expired, or
    /// issued for another host. The channel is still encrypted but no longer
    /// authenticated.
    pub fn dangerous_accept_invalid_certs(mut self, accept_invalid_certs: bool) -> Self {
        self.accept_invalid_certs = accept_invalid_certs;
        self
    }

    /// Builds the native-tls connector
    pub fn build(self) -> Result<TlsParameters, Error> {
        let mut tls_builder = TlsConnector::builder();

        for cert in self.root_certs {
            tls_builder.add_root_certificate(cert.0);
        }
        tls_builder.danger_accept_invalid_certs(self.accept_invalid_certs);
        tls_builder.min_protocol_version(Some(self.min_tls_version.into()));

        let connector = tls_builder.build().map_err(error::tls)?;
        Ok(TlsParameters {
            connector,
            domain: self.domain,
        })
    }
}

/// A root certificate for [`TlsParametersBuilder::add_root_certificate`]
#[derive(Clone)]
pub struct Certificate(native_tls::Certificate);

impl Certificate {
    /// Parses a DER encoded certificate
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        native_tls::Certificate::from_der(der)
            .map(Self)
            .map_err(error::tls)
    }

    /// Parses a PEM encoded certificate
    pub fn from_pem(pem: &[u8]) -> Result<Self, Error> {
        native_tls::Certificate::from_pem(pem)
            .map(Self)
            .map_err(error::tls)
    }
}

impl Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate").finish_non_exhaustive()
    }
}
