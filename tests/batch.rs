mod common;

use std::{env, time::Duration};

use pretty_assertions::assert_eq;
use smtp_notify::{
    batch::{self, BatchSender},
    config::{ConfigError, APP_PASSWORD, SENDER_EMAIL, SMTP_HOST, SMTP_PORT},
    transport::smtp::SmtpTransport,
};

use crate::common::{config, init_logging, MockServer, PretendTls, Script};

fn sender(port: u16) -> BatchSender<SmtpTransport<PretendTls>> {
    let transport = SmtpTransport::<PretendTls>::builder_with_connector()
        .timeout(Some(Duration::from_secs(5)))
        .build();
    BatchSender::new(config(port), transport)
}

#[test]
fn rejected_recipient_does_not_stop_the_batch() {
    init_logging();
    let server = MockServer::start(
        Script {
            reject_recipients: vec!["second@example.com".to_owned()],
            ..Script::with_starttls()
        },
        3,
    );

    let report = sender(server.port()).send_all(
        &["first@example.com", "second@example.com", "third@example.com"],
        "Status",
        "All systems nominal.",
    );

    assert_eq!(
        report.succeeded().collect::<Vec<_>>(),
        ["first@example.com", "third@example.com"]
    );
    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "second@example.com");
    assert!(failed[0].1.is_envelope());

    let sessions = server.finish();
    let recipients: Vec<&str> = sessions
        .iter()
        .map(|session| {
            session
                .commands
                .iter()
                .find(|command| command.starts_with("RCPT TO"))
                .map(String::as_str)
                .unwrap_or_default()
        })
        .collect();
    assert_eq!(
        recipients,
        [
            "RCPT TO:<first@example.com>",
            "RCPT TO:<second@example.com>",
            "RCPT TO:<third@example.com>"
        ]
    );
    assert!(sessions[1].message.is_none());
}

#[test]
fn every_batch_runs_its_own_sessions() {
    init_logging();
    let server = MockServer::start(Script::with_starttls(), 2);
    let sender = sender(server.port());

    let first = sender.send_all(&["a@example.com"], "s", "b");
    let second = sender.send_all(&["a@example.com"], "s", "b");

    assert!(first.all_succeeded());
    assert!(second.all_succeeded());
    let sessions = server.finish();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|session| session.message.is_some()));
}

// The only test of this binary touching the process environment.
#[test]
fn missing_config_stops_before_any_delivery() {
    for key in [SMTP_HOST, SMTP_PORT, SENDER_EMAIL, APP_PASSWORD] {
        env::remove_var(key);
    }

    let err = batch::send_all(&["a@example.com"], "s", "b").unwrap_err();
    assert!(matches!(err, ConfigError::Missing(ref keys) if keys.len() == 4));
    assert!(err.to_string().starts_with("missing SMTP configuration"));
}
