#![allow(dead_code)]

use std::{
    io::{self, BufRead, BufReader, Read, Write},
    net::{TcpListener, TcpStream},
    thread::{self, JoinHandle},
    time::Duration,
};

use smtp_notify::{
    config::SmtpConfig,
    transport::smtp::{
        client::{Connector, NetworkStream, TlsParameters},
        Error,
    },
};

pub const SENDER: &str = "sender@example.com";
pub const SECRET: &str = "app-secret";

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn config(port: u16) -> SmtpConfig {
    config_for("127.0.0.1", port)
}

/// Config naming `host`, for connectors that always dial the local relay
pub fn config_for(host: &str, port: u16) -> SmtpConfig {
    SmtpConfig::new(host, port.to_string(), SENDER, SECRET).unwrap()
}

/// A port nothing listens on
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Plain TCP stream whose TLS upgrade only flips a flag
///
/// Lets the scripted server below play a relay with STARTTLS. It always dials
/// 127.0.0.1, whatever host the config names.
#[derive(Debug)]
pub struct PretendTls {
    inner: NetworkStream,
    encrypted: bool,
}

impl Connector for PretendTls {
    fn connect(_server: &str, port: u16, timeout: Option<Duration>) -> Result<Self, Error> {
        Ok(PretendTls {
            inner: NetworkStream::connect("127.0.0.1", port, timeout)?,
            encrypted: false,
        })
    }

    fn upgrade_tls(&mut self, _tls_parameters: &TlsParameters) -> Result<(), Error> {
        self.encrypted = true;
        Ok(())
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn set_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        self.inner.set_timeout(duration)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown()
    }
}

impl Read for PretendTls {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for PretendTls {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// How the scripted relay behaves
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Advertise STARTTLS before it was used
    pub starttls: bool,
    /// Hang up right after accepting STARTTLS, so a real handshake fails
    pub hang_up_after_starttls: bool,
    /// Answer AUTH with 535
    pub reject_auth: bool,
    /// Recipients answered with 550 at RCPT TO
    pub reject_recipients: Vec<String>,
    /// Answer QUIT with 421
    pub fail_quit: bool,
    /// Answer EHLO with 502, HELO is still accepted
    pub reject_ehlo: bool,
    /// Answer DATA with 554
    pub reject_data: bool,
    /// Answer the final `.` with 554
    pub reject_message: bool,
}

impl Script {
    pub fn with_starttls() -> Script {
        Script {
            starttls: true,
            ..Script::default()
        }
    }
}

/// What the relay saw during one session
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    /// Command lines, without CRLF
    pub commands: Vec<String>,
    /// Raw DATA content, still dot-stuffed, without the terminator
    pub message: Option<String>,
}

impl Recorded {
    pub fn verbs(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|command| {
                command
                    .split([' ', ':'])
                    .next()
                    .unwrap_or_default()
                    .to_ascii_uppercase()
            })
            .collect()
    }

    pub fn saw(&self, verb: &str) -> bool {
        self.verbs().iter().any(|seen| seen == verb)
    }
}

/// Scripted relay on 127.0.0.1 serving a fixed number of sessions
pub struct MockServer {
    port: u16,
    handle: JoinHandle<Vec<Recorded>>,
}

impl MockServer {
    pub fn start(script: Script, sessions: usize) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            (0..sessions)
                .map(|_| {
                    let (stream, _) = listener.accept().unwrap();
                    stream
                        .set_read_timeout(Some(Duration::from_secs(10)))
                        .unwrap();
                    serve(stream, &script)
                })
                .collect()
        });

        MockServer { port, handle }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Waits for every session to end
    pub fn finish(self) -> Vec<Recorded> {
        self.handle.join().unwrap()
    }
}

fn read_line(reader: &mut BufReader<TcpStream>) -> Option<String> {
    let mut line = Vec::new();
    match reader.read_until(b'\n', &mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(String::from_utf8_lossy(&line).into_owned()),
    }
}

fn serve(stream: TcpStream, script: &Script) -> Recorded {
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    let mut recorded = Recorded::default();
    let mut secured = false;

    let mut reply = |text: &str| {
        let _ = writer.write_all(text.as_bytes());
        let _ = writer.flush();
    };

    reply("220 mock.example.com ESMTP ready\r\n");

    while let Some(line) = read_line(&mut reader) {
        let command = line.trim_end_matches(['\r', '\n']).to_owned();
        recorded.commands.push(command.clone());
        let upper = command.to_ascii_uppercase();

        if upper.starts_with("EHLO") && script.reject_ehlo {
            reply("502 5.5.1 EHLO not implemented\r\n");
        } else if upper.starts_with("HELO") {
            reply("250 mock.example.com\r\n");
        } else if upper.starts_with("EHLO") {
            let mut ehlo = String::from("250-mock.example.com\r\n250-AUTH PLAIN LOGIN\r\n");
            if script.starttls && !secured {
                ehlo.push_str("250-STARTTLS\r\n");
            }
            ehlo.push_str("250 8BITMIME\r\n");
            reply(&ehlo);
        } else if upper == "STARTTLS" {
            reply("220 2.0.0 ready to start TLS\r\n");
            if script.hang_up_after_starttls {
                break;
            }
            secured = true;
        } else if upper.starts_with("AUTH") {
            if script.reject_auth {
                reply("535 5.7.8 authentication credentials invalid\r\n");
            } else {
                reply("235 2.7.0 accepted\r\n");
            }
        } else if upper.starts_with("MAIL FROM") {
            reply("250 2.1.0 ok\r\n");
        } else if upper.starts_with("RCPT TO") {
            let address = command
                .split_once('<')
                .and_then(|(_, rest)| rest.split_once('>'))
                .map(|(address, _)| address)
                .unwrap_or_default();
            if script.reject_recipients.iter().any(|r| r == address) {
                reply("550 5.1.1 no such user\r\n");
            } else {
                reply("250 2.1.5 ok\r\n");
            }
        } else if upper == "DATA" && script.reject_data {
            reply("554 5.3.4 message too big\r\n");
        } else if upper == "DATA" {
            reply("354 end data with <CR><LF>.<CR><LF>\r\n");
            let mut message = String::new();
            while let Some(line) = read_line(&mut reader) {
                if line == ".\r\n" {
                    break;
                }
                message.push_str(&line);
            }
            recorded.message = Some(message);
            if script.reject_message {
                reply("554 5.7.1 message refused\r\n");
            } else {
                reply("250 2.0.0 queued as 1234\r\n");
            }
        } else if upper == "QUIT" {
            if script.fail_quit {
                reply("421 4.4.2 closing on error\r\n");
            } else {
                reply("221 2.0.0 bye\r\n");
            }
            break;
        } else {
            reply("500 5.5.2 unrecognized command\r\n");
        }
    }

    recorded
}
