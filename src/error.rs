use thiserror::Error;

/// Errors that stop the program before the UI loop starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0:#}")]
    Config(anyhow::Error),

    #[error("no sensor probes could be registered")]
    NoProbes,

    #[error("failed to initialize the terminal: {0}")]
    Terminal(#[source] std::io::Error),

    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
