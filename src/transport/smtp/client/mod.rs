//! SMTP client
//!
//! `SmtpConnection` allows manually sending SMTP commands over any
//! [`Connector`].
//!
//! ```rust,no_run
//! use smtp_notify::transport::smtp::{
//!     client::{NetworkStream, SmtpConnection},
//!     commands::*,
//!     extension::ClientId,
//!     SUBMISSION_PORT,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let hello = ClientId::Domain("my_hostname".to_owned());
//! let mut client =
//!     SmtpConnection::<NetworkStream>::connect("localhost", SUBMISSION_PORT, None, &hello)?;
//! client.command(Mail::new("user@example.com", vec![]))?;
//! client.command(Rcpt::new("user@example.org"))?;
//! client.command(Data)?;
//! client.message(b"Test email\r\n")?;
//! client.command(Quit)?;
//! # Ok(())
//! # }
//! ```

use std::io::Write;

pub use self::{
    connection::SmtpConnection,
    net::{Connector, NetworkStream},
    tls::{Certificate, TlsParameters, TlsParametersBuilder, TlsVersion},
};

mod connection;
mod net;
mod tls;

/// Dot-stuffing for the DATA phase
///
/// Keeps its state between calls, so a message can be encoded in chunks.
#[derive(Default, Clone, Copy, Debug)]
pub struct ClientCodec {
    /// 0: mid line, 1: after CR, 2: at line start
    state: u8,
}

impl ClientCodec {
    /// Creates a codec positioned at the start of a line
    pub fn new() -> Self {
        ClientCodec { state: 2 }
    }

    /// Appends `frame` to `buf`, doubling any `.` that starts a line
    pub fn encode(&mut self, frame: &[u8], buf: &mut Vec<u8>) {
        let mut start = 0;
        for (idx, byte) in frame.iter().enumerate() {
            if self.state == 2 && *byte == b'.' {
                buf.extend_from_slice(&frame[start..idx]);
                buf.push(b'.');
                start = idx;
            }
            self.state = match (self.state, *byte) {
                (_, b'\r') => 1,
                (1, b'\n') => 2,
                _ => 0,
            };
        }
        // Vec writes cannot fail
        let _ = buf.write_all(&frame[start..]);
    }

    /// Whether the bytes encoded so far end with CRLF
    pub fn at_line_start(&self) -> bool {
        self.state == 2
    }
}

/// Returns the string replacing all the CRLF with "\<CRLF\>"
/// Used for debug displays
pub(super) fn escape_crlf(string: &str) -> String {
    string.replace("\r\n", "<CRLF>")
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn codec_stuffs_leading_dots() {
        let mut codec = ClientCodec::new();
        let mut buf: Vec<u8> = vec![];

        codec.encode(b".hidden\r\n", &mut buf);
        codec.encode(b"test\r\n", &mut buf);
        codec.encode(b".\r\n", &mut buf);
        codec.encode(b"te\r\n.\r\nst", &mut buf);
        codec.encode(b"test.", &mut buf);
        codec.encode(b"test\n.test\r", &mut buf);
        codec.encode(b"\n.split", &mut buf);

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "..hidden\r\ntest\r\n..\r\nte\r\n..\r\nsttest.test\n.test\r\n..split"
        );
        assert!(!codec.at_line_start());
    }

    #[test]
    fn codec_tracks_line_end() {
        let mut codec = ClientCodec::new();
        let mut buf = vec![];
        codec.encode(b"Hello world!\r\n", &mut buf);
        assert!(codec.at_line_start());
    }

    #[test]
    fn escapes_crlf() {
        assert_eq!(escape_crlf("\r\n"), "<CRLF>");
        assert_eq!(escape_crlf("EHLO my_name\r\n"), "EHLO my_name<CRLF>");
        assert_eq!(
            escape_crlf("EHLO my_name\r\nSIZE 42\r\n"),
            "EHLO my_name<CRLF>SIZE 42<CRLF>"
        );
    }
}
