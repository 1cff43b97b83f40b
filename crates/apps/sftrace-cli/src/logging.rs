use env_logger::Env;
use log::SetLoggerError;

/// Default level for the `log` facade; `RUST_LOG` still overrides it.
pub fn default_filter(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

/// Install the process-wide logger. Fails if one is already installed.
pub fn init(verbose: bool, quiet: bool) -> Result<(), SetLoggerError> {
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter(verbose, quiet)))
        .format_timestamp(None)
        .try_init()
}
