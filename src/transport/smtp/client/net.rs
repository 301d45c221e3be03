//! Byte streams an SMTP session can run over

use std::{
    fmt,
    io::{self, Read, Write},
    mem,
    net::{Shutdown, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::TlsStream;

use super::TlsParameters;
use crate::transport::smtp::{error, Error};

/// A stream that can be opened to a relay and later upgraded to TLS
///
/// [`NetworkStream`] is the real implementation. The session logic only talks
/// to this trait, so it can be driven over any transport that knows how to
/// "upgrade" itself.
pub trait Connector: Read + Write + Sized {
    /// Opens a plain connection to `server:port`
    fn connect(server: &str, port: u16, timeout: Option<Duration>) -> Result<Self, Error>;

    /// Runs the TLS handshake over the current connection
    fn upgrade_tls(&mut self, tls_parameters: &TlsParameters) -> Result<(), Error>;

    /// Tells if the stream is currently encrypted
    fn is_encrypted(&self) -> bool;

    /// Sets both read and write timeouts
    fn set_timeout(&mut self, duration: Option<Duration>) -> io::Result<()>;

    /// Closes both halves of the connection
    fn shutdown(&mut self) -> io::Result<()>;
}

/// A TCP connection, possibly wrapped in TLS
pub struct NetworkStream {
    inner: InnerNetworkStream,
}

enum InnerNetworkStream {
    /// Plain TCP stream
    Tcp(TcpStream),
    /// TLS over TCP
    Tls(TlsStream<TcpStream>),
    /// Left behind by a failed upgrade
    None,
}

impl fmt::Debug for NetworkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner {
            InnerNetworkStream::Tcp(_) => "Tcp",
            InnerNetworkStream::Tls(_) => "Tls",
            InnerNetworkStream::None => "None",
        };
        f.debug_tuple("NetworkStream").field(&state).finish()
    }
}

impl NetworkStream {
    fn tcp(&self) -> io::Result<&TcpStream> {
        match self.inner {
            InnerNetworkStream::Tcp(ref s) => Ok(s),
            InnerNetworkStream::Tls(ref s) => Ok(s.get_ref()),
            InnerNetworkStream::None => Err(broken()),
        }
    }
}

fn broken() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream is unusable after a failed TLS upgrade")
}

fn tcp_connect(server: &str, port: u16, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let Some(timeout) = timeout else {
        return TcpStream::connect((server, port));
    };

    let mut last_err = None;
    for addr in (server, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "could not resolve to any address",
        )
    }))
}

impl Connector for NetworkStream {
    fn connect(server: &str, port: u16, timeout: Option<Duration>) -> Result<Self, Error> {
        let tcp = tcp_connect(server, port, timeout).map_err(error::connection)?;
        Ok(NetworkStream {
            inner: InnerNetworkStream::Tcp(tcp),
        })
    }

    fn upgrade_tls(&mut self, tls_parameters: &TlsParameters) -> Result<(), Error> {
        match mem::replace(&mut self.inner, InnerNetworkStream::None) {
            InnerNetworkStream::Tcp(tcp) => {
                let stream = tls_parameters
                    .connector
                    .connect(tls_parameters.domain(), tcp)
                    .map_err(error::tls)?;
                self.inner = InnerNetworkStream::Tls(stream);
                Ok(())
            }
            already @ InnerNetworkStream::Tls(_) => {
                self.inner = already;
                Ok(())
            }
            InnerNetworkStream::None => Err(error::network(broken())),
        }
    }

    fn is_encrypted(&self) -> bool {
        matches!(self.inner, InnerNetworkStream::Tls(_))
    }

    fn set_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        let tcp = self.tcp()?;
        tcp.set_read_timeout(duration)?;
        tcp.set_write_timeout(duration)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tls(ref mut s) => {
                // best effort close_notify before tearing down the socket
                let _ = s.shutdown();
                s.get_ref().shutdown(Shutdown::Both)
            }
            InnerNetworkStream::Tcp(ref s) => s.shutdown(Shutdown::Both),
            InnerNetworkStream::None => Ok(()),
        }
    }
}

impl Read for NetworkStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.read(buf),
            InnerNetworkStream::Tls(ref mut s) => s.read(buf),
            InnerNetworkStream::None => Err(broken()),
        }
    }
}

impl Write for NetworkStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.write(buf),
            InnerNetworkStream::Tls(ref mut s) => s.write(buf),
            InnerNetworkStream::None => Err(broken()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.flush(),
            InnerNetworkStream::Tls(ref mut s) => s.flush(),
            InnerNetworkStream::None => Err(broken()),
        }
    }
}
