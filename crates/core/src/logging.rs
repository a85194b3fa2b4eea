//! Logging setup
//!
//! Structured logging through `tracing-subscriber`, text or JSON, always on
//! stderr so stdout stays reserved for command output. Only the binary calls
//! [`init`]; the library never installs a global subscriber on its own.

use anyhow::Result;
use std::{io, sync::Once};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directives, e.g. `composer_dev_core=debug`
pub const LOG_ENV: &str = "COMPOSER_DEV_LOG";

/// `json` for JSON lines, anything else for text
pub const LOG_FORMAT_ENV: &str = "COMPOSER_DEV_LOG_FORMAT";

/// Comma or pipe separated span events: `new`, `close`, `enter`, `exit`, `active`, `full`
pub const LOG_SPAN_EVENTS_ENV: &str = "COMPOSER_DEV_LOG_SPAN_EVENTS";

static INIT: Once = Once::new();

/// How chatty the tool is when no filter is set in the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only
    #[default]
    Quiet,
    /// Info from this tool, warnings from dependencies
    Verbose,
    /// Debug everywhere, including the HTTP stack
    Debug,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            Verbosity::Debug
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Quiet
        }
    }

    fn default_directives(self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Verbose => "warn,composer_dev=info,composer_dev_core=info",
            Verbosity::Debug => "debug",
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
///
/// `format` wins over `COMPOSER_DEV_LOG_FORMAT`. The filter comes from
/// `COMPOSER_DEV_LOG`, then `RUST_LOG`, then `verbosity`; `--debug` always
/// wins so a stray `RUST_LOG` cannot hide debug output.
pub fn init(format: Option<&str>, verbosity: Verbosity) -> Result<()> {
    INIT.call_once(|| {
        let filter = create_env_filter(verbosity);

        let env_format = std::env::var(LOG_FORMAT_ENV).ok();
        let effective_format = format.or(env_format.as_deref()).unwrap_or("text");
        let span_events = span_events_for_format(effective_format);

        match effective_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .with_target(verbosity == Verbosity::Debug)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
        }

        tracing::debug!("Logging initialized with format: {}", effective_format);
    });

    Ok(())
}

fn create_env_filter(verbosity: Verbosity) -> EnvFilter {
    let fallback = verbosity.default_directives();
    if verbosity == Verbosity::Debug {
        return EnvFilter::new(fallback);
    }

    if let Ok(spec) = std::env::var(LOG_ENV) {
        EnvFilter::try_new(&spec).unwrap_or_else(|_| {
            eprintln!("Invalid {} specification '{}', using '{}'", LOG_ENV, spec, fallback);
            EnvFilter::new(fallback)
        })
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    }
}

fn span_events_for_format(format: &str) -> fmt::format::FmtSpan {
    use fmt::format::FmtSpan;

    if let Ok(raw) = std::env::var(LOG_SPAN_EVENTS_ENV) {
        return parse_span_events(&raw);
    }

    match format {
        "json" => FmtSpan::NEW | FmtSpan::CLOSE,
        _ => FmtSpan::NONE,
    }
}

fn parse_span_events(raw: &str) -> fmt::format::FmtSpan {
    use fmt::format::FmtSpan;

    let mut acc = FmtSpan::NONE;
    for token in raw.split(&[',', '|'][..]).map(|t| t.trim().to_lowercase()) {
        acc |= match token.as_str() {
            "new" => FmtSpan::NEW,
            "close" => FmtSpan::CLOSE,
            "enter" => FmtSpan::ENTER,
            "exit" => FmtSpan::EXIT,
            "active" => FmtSpan::ACTIVE,
            "full" => FmtSpan::FULL,
            _ => FmtSpan::NONE,
        };
    }
    acc
}

pub fn is_initialized() -> bool {
    INIT.is_completed()
}
