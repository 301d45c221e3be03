use std::{
    fmt::Display,
    io::{BufRead, BufReader},
    time::Duration,
};

use super::{escape_crlf, ClientCodec, Connector, NetworkStream, TlsParameters};
use crate::{
    address::Envelope,
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        commands::{Auth, Data, Ehlo, Helo, Mail, Quit, Rcpt, Starttls},
        error::{self, Error},
        extension::{ClientId, Extension, MailParameter, ServerInfo},
        response::{parse_response, Response},
    },
};

/// Challenges answered before giving up on an AUTH exchange
const MAX_AUTH_CHALLENGES: u8 = 10;

/// One SMTP session with a relay
pub struct SmtpConnection<S: Connector = NetworkStream> {
    stream: BufReader<S>,
    /// Whether QUIT has been sent
    sent_quit: bool,
    /// Set once a reply could not be read or parsed
    broken: bool,
    /// Information about the server, from the last EHLO
    server_info: ServerInfo,
}

impl<S: Connector> SmtpConnection<S> {
    /// Get information about the server
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Connects to the relay
    ///
    /// Reads the greeting, sends EHLO and records the server capabilities.
    pub fn connect(
        server: &str,
        port: u16,
        timeout: Option<Duration>,
        hello_name: &ClientId,
    ) -> Result<SmtpConnection<S>, Error> {
        let mut stream = S::connect(server, port, timeout)?;
        stream.set_timeout(timeout).map_err(error::network)?;

        let mut conn = SmtpConnection {
            stream: BufReader::new(stream),
            sent_quit: false,
            broken: false,
            server_info: ServerInfo::default(),
        };

        let greeting = conn.read_response()?;
        tracing::debug!("greeting {:?}", greeting.first_line());

        conn.ehlo(hello_name)?;

        tracing::debug!("server {}", conn.server_info);
        Ok(conn)
    }

    /// MAIL FROM, RCPT TO for every recipient, then DATA
    ///
    /// Returns the reply to the final `.`.
    pub fn send(&mut self, envelope: &Envelope, email: &[u8]) -> Result<Response, Error> {
        let parameters = self.mail_parameters(envelope, email);
        self.command(Mail::new(envelope.from(), parameters))?;
        self.command(Rcpt::new(envelope.to()))?;
        self.command(Data)?;
        self.message(email)
    }

    /// Extension parameters for MAIL FROM
    ///
    /// Non ASCII content is announced when the server allows it and sent
    /// unannounced otherwise; the relay has the last word.
    pub(crate) fn mail_parameters(&self, envelope: &Envelope, email: &[u8]) -> Vec<MailParameter> {
        let mut parameters = vec![];

        if envelope.has_non_ascii_addresses() {
            if self.server_info.supports_feature(Extension::SmtpUtfEight) {
                parameters.push(MailParameter::SmtpUtfEight);
            } else {
                tracing::warn!("envelope has non-ascii addresses but server lacks SMTPUTF8");
            }
        }

        if !email.is_ascii() && self.server_info.supports_feature(Extension::EightBitMime) {
            parameters.push(MailParameter::EightBitMime);
        }

        parameters
    }

    /// Whether the connection can no longer be used
    pub fn has_broken(&self) -> bool {
        self.sent_quit || self.broken
    }

    /// Whether the server offers STARTTLS on this, still plain, connection
    pub fn can_starttls(&self) -> bool {
        !self.is_encrypted() && self.server_info.supports_feature(Extension::StartTls)
    }

    /// Upgrades the connection and sends EHLO again
    ///
    /// Capabilities learned before the upgrade are discarded.
    pub fn starttls(
        &mut self,
        tls_parameters: &TlsParameters,
        hello_name: &ClientId,
    ) -> Result<(), Error> {
        if !self.server_info.supports_feature(Extension::StartTls) {
            return Err(error::client("STARTTLS is not supported on this server"));
        }

        self.command(Starttls)?;
        if !self.stream.buffer().is_empty() {
            // plaintext injected after the STARTTLS reply
            self.broken = true;
            return Err(error::response("unexpected data after STARTTLS reply"));
        }
        if let Err(err) = self.stream.get_mut().upgrade_tls(tls_parameters) {
            self.broken = true;
            return Err(err);
        }
        tracing::debug!("connection encrypted");

        self.ehlo(hello_name)
    }

    /// Send EHLO and update server info
    ///
    /// A server rejecting EHLO is greeted with HELO instead and is then
    /// assumed to support no extension.
    fn ehlo(&mut self, hello_name: &ClientId) -> Result<(), Error> {
        match self.command(Ehlo::new(hello_name.clone())) {
            Ok(ehlo_response) => {
                self.server_info = ServerInfo::from_response(&ehlo_response)?;
            }
            Err(err) if err.is_permanent() => {
                tracing::debug!("EHLO rejected ({err}), falling back to HELO");
                self.command(Helo::new(hello_name.clone()))?;
                self.server_info = ServerInfo::default();
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Sends QUIT
    pub fn quit(&mut self) -> Result<Response, Error> {
        self.sent_quit = true;
        self.command(Quit)
    }

    /// Best effort QUIT, then closes the socket
    pub fn abort(&mut self) {
        if !self.has_broken() {
            let _ = self.quit();
        }

        if let Err(err) = self.stream.get_mut().shutdown() {
            tracing::debug!("shutdown failed: {err}");
        }
    }

    /// Tells if the underlying stream is currently encrypted
    pub fn is_encrypted(&self) -> bool {
        self.stream.get_ref().is_encrypted()
    }

    /// Authenticates with the first mechanism of `mechanisms` the server offers
    pub fn auth(
        &mut self,
        mechanisms: &[Mechanism],
        credentials: &Credentials,
    ) -> Result<Response, Error> {
        let mechanism = self
            .server_info
            .get_auth_mechanism(mechanisms)
            .ok_or_else(|| error::client("No compatible authentication mechanism was found"))?;

        let mut challenges = MAX_AUTH_CHALLENGES;
        let mut response = self.secret_command(Auth::new(mechanism, credentials)?)?;

        while response.has_code(334) {
            if challenges == 0 {
                return Err(error::response("Unexpected number of challenges"));
            }
            challenges -= 1;
            response = self.secret_command(Auth::new_from_response(
                mechanism,
                credentials,
                &response,
            )?)?;
        }

        Ok(response)
    }

    /// Sends the message content and the terminating `.`
    pub fn message(&mut self, message: &[u8]) -> Result<Response, Error> {
        let mut codec = ClientCodec::new();
        let mut out_buf = Vec::with_capacity(message.len() + 5);
        codec.encode(message, &mut out_buf);
        if codec.at_line_start() {
            out_buf.extend_from_slice(b".\r\n");
        } else {
            out_buf.extend_from_slice(b"\r\n.\r\n");
        }
        self.write(&out_buf)?;

        self.read_response()
    }

    /// Sends an SMTP command and reads the reply
    pub fn command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        self.write(command.to_string().as_bytes())?;
        self.read_response()
    }

    /// Like [`command`](Self::command), without logging what is sent
    fn secret_command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        self.write_raw(command.to_string().as_bytes())?;
        tracing::debug!("Wrote: <credentials>");
        self.read_response()
    }

    /// Writes a string to the server
    fn write(&mut self, string: &[u8]) -> Result<(), Error> {
        self.write_raw(string)?;
        tracing::debug!("Wrote: {}", escape_crlf(&String::from_utf8_lossy(string)));
        Ok(())
    }

    fn write_raw(&mut self, string: &[u8]) -> Result<(), Error> {
        let stream = self.stream.get_mut();
        stream.write_all(string).map_err(error::network)?;
        stream.flush().map_err(error::network)
    }

    /// Reads one complete reply
    ///
    /// Negative replies are turned into transient or permanent errors.
    pub fn read_response(&mut self) -> Result<Response, Error> {
        let mut buffer = String::with_capacity(100);

        loop {
            let read = match self.stream.read_line(&mut buffer) {
                Ok(read) => read,
                Err(err) => {
                    self.broken = true;
                    return Err(error::network(err));
                }
            };
            if read == 0 {
                break;
            }

            tracing::debug!("<< {}", escape_crlf(&buffer));
            match parse_response(&buffer) {
                Ok((_remaining, response)) => {
                    return if response.is_positive() {
                        Ok(response)
                    } else {
                        Err(error::code(
                            response.code(),
                            Some(response.message().collect::<Vec<_>>().join(" ")),
                        ))
                    };
                }
                Err(nom::Err::Incomplete(_)) => { /* read more */ }
                Err(nom::Err::Failure(e)) | Err(nom::Err::Error(e)) => {
                    self.broken = true;
                    return Err(error::response(e.to_string()));
                }
            }
        }

        self.broken = true;
        Err(error::response("incomplete response"))
    }
}
