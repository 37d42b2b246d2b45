use std::{io, path::PathBuf};

use status_stream::RelayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WrapperError {
    #[error("failed to read config `{path}`: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config `{path}`: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("interceptor #{index} is invalid: {reason}")]
    InvalidInterceptor { index: usize, reason: String },
    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("failed to resolve the running executable: {0}")]
    CurrentExe(#[source] io::Error),
    #[error("status producer `{binary}` could not be spawned: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("internal error: missing stdout pipe")]
    MissingStdout,
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] io::Error),
    #[error("status producer exited ({status})")]
    ProducerExited { status: String },
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error("failed to re-execute for restart: {0}")]
    Restart(#[source] io::Error),
}
