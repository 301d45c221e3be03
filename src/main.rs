use std::{env, process::ExitCode, time::Duration};

use clap::{Parser, ValueEnum};
use smtp_notify::{
    batch::{parse_recipient_list, BatchSender},
    config::SmtpConfig,
    transport::smtp::{SmtpTransport, Strategy},
};

/// Send a plain text notification to every recipient
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Recipients, replaced by TEST_RECIPIENTS when it is set
    recipients: Vec<String>,
    #[arg(default_value_t = String::from("Sample Subject"), long, short)]
    subject: String,
    #[arg(default_value_t = String::from("Sample Email Body"), long, short)]
    body: String,
    #[arg(value_enum, default_value_t = StrategyArg::Controlled, long)]
    strategy: StrategyArg,
    /// Connect and command timeout, in seconds
    #[arg(default_value_t = 60, long)]
    timeout: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    /// STARTTLS required, step by step errors
    Controlled,
    /// One shot send, STARTTLS when offered
    Simplified,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Controlled => Strategy::Controlled,
            StrategyArg::Simplified => Strategy::Simplified,
        }
    }
}

/// A non-empty `TEST_RECIPIENTS` wins, even when it lists nobody
///
/// `None` when neither source names anyone to notify.
fn select_recipients(test_recipients: Option<String>, cli: Vec<String>) -> Option<Vec<String>> {
    match test_recipients {
        Some(list) if !list.is_empty() => Some(parse_recipient_list(&list)),
        _ if cli.is_empty() => None,
        _ => Some(cli),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    // also merges .env, which may set TEST_RECIPIENTS
    let config = match SmtpConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let Some(recipients) = select_recipients(env::var("TEST_RECIPIENTS").ok(), cli.recipients)
    else {
        tracing::error!("no recipients given");
        return ExitCode::FAILURE;
    };

    let transport = SmtpTransport::builder()
        .strategy(cli.strategy.into())
        .timeout(Some(Duration::from_secs(cli.timeout)))
        .build();
    let sender = BatchSender::new(config, transport);

    tracing::info!("sending notification to {} recipients", recipients.len());
    let report = sender.send_all(&recipients, &cli.subject, &cli.body);
    tracing::info!(
        "all notifications processed: {} sent, {} failed",
        report.success_count(),
        report.failure_count()
    );

    ExitCode::SUCCESS
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::select_recipients;

    fn cli() -> Vec<String> {
        vec!["cli@example.com".to_owned()]
    }

    #[test]
    fn test_recipients_override_the_command_line() {
        assert_eq!(
            select_recipients(Some("a@example.com, b@example.com".to_owned()), cli()),
            Some(vec!["a@example.com".to_owned(), "b@example.com".to_owned()])
        );
    }

    #[test]
    fn blank_test_recipients_list_nobody() {
        assert_eq!(select_recipients(Some(",".to_owned()), cli()), Some(vec![]));
        assert_eq!(select_recipients(Some(" ".to_owned()), vec![]), Some(vec![]));
    }

    #[test]
    fn command_line_is_used_otherwise() {
        assert_eq!(select_recipients(Some(String::new()), cli()), Some(cli()));
        assert_eq!(select_recipients(None, cli()), Some(cli()));
        assert_eq!(select_recipients(None, vec![]), None);
    }
}
