use clap::Parser;
use composer_dev_core::errors::{ComposerError, ErrorKind};
use console::style;

mod cli;
mod commands;
mod ui;

const DEBUG_HINT: &str = "\n\nTo print debug messages please add --debug flag.";

const FATAL_ERROR_MESSAGE: &str = "Fatal exception occurred. Please report at https://github.com/GoogleCloudPlatform/composer-local-dev/issues";

#[tokio::main]
async fn main() {
    let parsed = cli::Cli::parse();
    let debug = parsed.debug;

    if let Err(err) = parsed.dispatch().await {
        std::process::exit(report_error(&err, debug));
    }
}

/// Print `err` for the user and pick the process exit code
fn report_error(err: &anyhow::Error, debug: bool) -> i32 {
    if let Some(usage) = err.downcast_ref::<commands::shared::UsageError>() {
        eprintln!("{} {}", style("Error:").red().bold(), usage);
        return 2;
    }
    if err.downcast_ref::<commands::shared::Aborted>().is_some() {
        eprintln!("Aborted!");
        return 1;
    }

    match err.downcast_ref::<ComposerError>() {
        Some(composer_error) => {
            let hint = if debug { "" } else { DEBUG_HINT };
            eprintln!("{} {}{}", style("Error:").red().bold(), composer_error, hint);
            exit_code(composer_error.kind())
        }
        None => {
            tracing::debug!("Unclassified failure: {:?}", err);
            eprintln!("{} {}", style("Error:").red().bold(), FATAL_ERROR_MESSAGE);
            if debug {
                eprintln!("{:#}", err);
            }
            1
        }
    }
}

fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::InvalidConfiguration => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::AlreadyRunning | ErrorKind::NotRunning => 4,
        ErrorKind::StartFailed | ErrorKind::StartTimeout | ErrorKind::PortInUse => 5,
        ErrorKind::ImageNotFound | ErrorKind::AuthInvalid | ErrorKind::RemoteApi => 6,
        ErrorKind::DockerUnavailable | ErrorKind::Runtime => 7,
        ErrorKind::Io | ErrorKind::Internal => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use composer_dev_core::errors::ConfigError;

    #[test]
    fn test_exit_codes_distinguish_categories() {
        assert_eq!(exit_code(ErrorKind::NotFound), 3);
        assert_eq!(exit_code(ErrorKind::PortInUse), 5);
        assert_ne!(exit_code(ErrorKind::AlreadyRunning), exit_code(ErrorKind::StartTimeout));
        assert_ne!(exit_code(ErrorKind::AuthInvalid), exit_code(ErrorKind::DockerUnavailable));
    }

    #[test]
    fn test_report_classified_error() {
        let err = anyhow::Error::from(ComposerError::Config(ConfigError::MissingRequiredParameter {
            param: "port".to_string(),
        }));
        assert_eq!(report_error(&err, false), 2);
    }

    #[test]
    fn test_report_unclassified_error() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(report_error(&err, false), 1);
    }

    #[test]
    fn test_report_usage_error() {
        let err = anyhow::Error::from(commands::shared::UsageError("bad".to_string()));
        assert_eq!(report_error(&err, true), 2);
    }
}
