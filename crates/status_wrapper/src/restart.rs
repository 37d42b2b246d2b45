use std::ffi::OsStr;
use std::os::unix::process::CommandExt;
use std::process::Command;

use tracing::info;

use crate::error::WrapperError;

/// Set to `1` in the environment of a process that replaced itself.
pub const RESTART_ENV: &str = "RESTARTED";

pub fn is_restart_continuation() -> bool {
    is_restart_marker(std::env::var_os(RESTART_ENV).as_deref())
}

fn is_restart_marker(value: Option<&OsStr>) -> bool {
    value.is_some_and(|value| value == "1")
}

/// Replaces the current process image with a fresh copy of itself, passing
/// the same arguments and [`RESTART_ENV`]. Only returns on failure.
pub fn reexec() -> WrapperError {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(err) => return WrapperError::CurrentExe(err),
    };
    info!(exe = %exe.display(), "re-executing");
    let err = Command::new(exe)
        .args(std::env::args_os().skip(1))
        .env(RESTART_ENV, "1")
        .exec();
    WrapperError::Restart(err)
}
