use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding tracing directives for Rig.
pub const LOG_ENV: &str = "RIG_LOG";

/// Directives used when [`LOG_ENV`] is unset. Rig's own crates log at `info`,
/// the level `print_config_variables` traces are emitted at; everything else
/// only warns.
pub const DEFAULT_DIRECTIVES: &str = "warn,rig_vars=info,rig_servers=info,rig_config=info";

/// Install the process-wide tracing subscriber.
///
/// Events are printed in compact form to stdout. Fails if a subscriber is
/// already installed or [`LOG_ENV`] holds invalid directives.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter()?)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn env_filter() -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    match std::env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(DEFAULT_DIRECTIVES),
    }
}
