#![forbid(unsafe_code)]
//! Wraps an i3status-style producer, rewrites selected fields, and passes
//! the stream on to the bar.

mod config;
mod error;
mod interceptors;
mod logging;
mod process;
mod restart;
mod signals;

use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use status_stream::{Relay, RelayError, RelayExit, RelayOptions};
use tracing::{debug, error, info};

use crate::config::WrapperConfig;
use crate::error::WrapperError;

const PRODUCER_EXIT_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(name = "status-wrapper")]
#[command(about = "Rewrite fields of an i3bar status stream on the fly")]
struct Cli {
    /// Append per-field timing to every intercepted field.
    #[arg(long)]
    profile_interceptors: bool,
    /// Append a field counting records dropped because we fell behind.
    #[arg(long)]
    profile_skipped_statuses: bool,
    /// TOML file describing the producer and the interceptors.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Increase log verbosity on stderr (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    debug!(?cli, "starting");

    match block_on_run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("fatal error: {err}");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn block_on_run(cli: Cli) -> Result<(), WrapperError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(WrapperError::Runtime)?;
    let result = runtime.block_on(run(cli));
    // A transformer cut short by shutdown may still occupy the blocking pool.
    runtime.shutdown_background();
    result
}

impl Cli {
    fn profiling_enabled(&self, config: &WrapperConfig) -> bool {
        self.profile_interceptors || config.options.profile_interceptors
    }

    fn relay_options(&self, config: &WrapperConfig, restarted: bool) -> RelayOptions {
        RelayOptions {
            restarted,
            profile_skipped_statuses: self.profile_skipped_statuses
                || config.options.profile_skipped_statuses,
        }
    }
}

async fn run(cli: Cli) -> Result<(), WrapperError> {
    let config = match &cli.config {
        Some(path) => WrapperConfig::load(path)?,
        None => WrapperConfig::default(),
    };

    let mut registry = interceptors::build_registry(&config.interceptors)?;
    if cli.profiling_enabled(&config) {
        registry = registry.profiled(config.options.profile_threshold());
    }
    let options = cli.relay_options(&config, restart::is_restart_continuation());
    info!(?registry, ?options, "relay configured");

    let exe = std::env::current_exe().map_err(WrapperError::CurrentExe)?;
    let exe_dir = exe.parent().map(PathBuf::from).unwrap_or_default();
    let (program, args) = config.child.resolve(&exe_dir);
    let mut child = process::spawn_producer(&program, &args)?;
    let stdout = child.stdout.take().ok_or(WrapperError::MissingStdout)?;

    let relay = Relay::new(tokio::io::stdout(), registry, options);
    let signal_task = signals::install(relay.handles())?;
    let outcome = relay.run(stdout, config.limits.reader_limits()).await;
    signal_task.abort();

    match outcome {
        Ok(RelayExit::Shutdown) => {
            process::reap(&mut child, Duration::ZERO).await;
            Ok(())
        }
        Ok(RelayExit::Restart) => {
            process::reap(&mut child, Duration::ZERO).await;
            Err(restart::reexec())
        }
        Err(RelayError::UpstreamClosed) => {
            let status = process::reap(&mut child, PRODUCER_EXIT_GRACE)
                .await
                .map_or_else(|| "unknown status".to_string(), |status| status.to_string());
            Err(WrapperError::ProducerExited { status })
        }
        Err(err) => {
            process::reap(&mut child, Duration::ZERO).await;
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(options: &str) -> WrapperConfig {
        toml::from_str(&format!("[options]\n{options}")).unwrap()
    }

    #[test]
    fn flags_and_config_toggles_are_combined() {
        let bare = Cli::parse_from(["status-wrapper"]);
        let flagged = Cli::parse_from([
            "status-wrapper",
            "--profile-interceptors",
            "--profile-skipped-statuses",
        ]);
        let off = WrapperConfig::default();
        let on = config_with("profile_interceptors = true\nprofile_skipped_statuses = true");

        assert!(!bare.profiling_enabled(&off));
        assert!(bare.profiling_enabled(&on));
        assert!(flagged.profiling_enabled(&off));

        assert_eq!(bare.relay_options(&off, false), RelayOptions::default());
        assert!(bare.relay_options(&on, false).profile_skipped_statuses);
        assert!(flagged.relay_options(&off, true).profile_skipped_statuses);
        assert!(flagged.relay_options(&off, true).restarted);
    }
}
