//! Step by step session used by the controlled strategy

use std::time::Duration;

use crate::{
    address::Envelope,
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        client::{Connector, SmtpConnection, TlsParameters},
        commands::{Data, Mail, Rcpt},
        error::{self, Error},
        extension::{ClientId, Extension},
        response::Response,
    },
};

/// Where a session stands
///
/// A failing step moves straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Connected,
    Secured,
    Authenticated,
    EnvelopeSet,
    DataSent,
    Closed,
}

/// An open connection that is released when dropped
///
/// Dropping a session that was not closed sends a best effort `QUIT` and
/// shuts the socket down, so every early return releases the connection.
pub(super) struct Session<C: Connector> {
    conn: SmtpConnection<C>,
    state: SessionState,
}

impl<C: Connector> Session<C> {
    /// Connects, reads the greeting and sends EHLO
    pub(super) fn dial(
        server: &str,
        port: u16,
        timeout: Option<Duration>,
        hello_name: &ClientId,
    ) -> Result<Self, Error> {
        tracing::debug!("dialing {server}:{port}");
        let conn = SmtpConnection::connect(server, port, timeout, hello_name).map_err(error::dial)?;

        Ok(Session {
            conn,
            state: SessionState::Connected,
        })
    }

    /// Upgrades with STARTTLS, which the relay must offer
    ///
    /// `tls_parameters` is only called once the relay has offered STARTTLS.
    pub(super) fn secure<F>(&mut self, tls_parameters: F, hello_name: &ClientId) -> Result<(), Error>
    where
        F: FnOnce() -> Result<TlsParameters, Error>,
    {
        self.assert_state(SessionState::Connected);
        if !self.conn.server_info().supports_feature(Extension::StartTls) {
            return Err(self.fail(error::unsupported("server does not support STARTTLS")));
        }

        let result = tls_parameters().and_then(|tls| self.conn.starttls(&tls, hello_name));
        self.advance(result.map_err(error::tls), SessionState::Secured)
    }

    /// Logs in with the first of `mechanisms` the relay offers
    pub(super) fn authenticate(
        &mut self,
        mechanisms: &[Mechanism],
        credentials: &Credentials,
    ) -> Result<(), Error> {
        self.assert_state(SessionState::Secured);
        let result = self.conn.auth(mechanisms, credentials).map(drop);
        self.advance(result.map_err(error::auth), SessionState::Authenticated)
    }

    /// MAIL FROM then RCPT TO
    pub(super) fn envelope(&mut self, envelope: &Envelope, email: &[u8]) -> Result<(), Error> {
        self.assert_state(SessionState::Authenticated);
        let parameters = self.conn.mail_parameters(envelope, email);
        let result = self
            .conn
            .command(Mail::new(envelope.from(), parameters))
            .and_then(|_| self.conn.command(Rcpt::new(envelope.to())))
            .map(drop);
        self.advance(result.map_err(error::envelope), SessionState::EnvelopeSet)
    }

    /// DATA, the message and its terminator
    ///
    /// Returns the reply accepting the message.
    pub(super) fn data(&mut self, email: &[u8]) -> Result<Response, Error> {
        self.assert_state(SessionState::EnvelopeSet);
        let result = self
            .conn
            .command(Data)
            .and_then(|_| self.conn.message(email))
            .map_err(error::write);

        match result {
            Ok(response) => {
                self.state = SessionState::DataSent;
                tracing::debug!("message accepted: {:?}", response.first_line());
                Ok(response)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Sends QUIT and closes the connection
    ///
    /// The message has already been accepted at this point, a failure is
    /// only logged.
    pub(super) fn quit(mut self) {
        if let Err(err) = self.conn.quit() {
            tracing::warn!("QUIT failed after the message was accepted: {err}");
        }
        self.close();
    }

    fn advance(&mut self, result: Result<(), Error>, next: SessionState) -> Result<(), Error> {
        match result {
            Ok(()) => {
                tracing::trace!("session {:?} -> {next:?}", self.state);
                self.state = next;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        tracing::debug!("session failed while {:?}: {err}", self.state);
        self.close();
        err
    }

    fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.conn.abort();
            self.state = SessionState::Closed;
        }
    }

    fn assert_state(&self, state: SessionState) {
        debug_assert_eq!(self.state, state, "session steps out of order");
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        self.close();
    }
}
