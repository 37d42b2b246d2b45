use std::{
    path::Path,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::WrapperError;

/// Spawns the status producer with stdout piped and stderr inherited, so its
/// diagnostics reach the same place as ours.
pub(crate) fn spawn_producer(program: &Path, args: &[String]) -> Result<Child, WrapperError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    debug!(program = %program.display(), ?args, "spawning status producer");
    spawn_with_retry(&mut command, program)
}

fn spawn_with_retry(command: &mut Command, binary: &Path) -> Result<Child, WrapperError> {
    let mut backoff = Duration::from_millis(2);
    let mut attempt = 0;
    loop {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    attempt += 1;
                    std::thread::sleep(backoff);
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(WrapperError::Spawn {
                    binary: binary.to_path_buf(),
                    source,
                });
            }
        }
    }
}

/// Waits up to `grace` for the producer to exit on its own, then kills it.
pub(crate) async fn reap(child: &mut Child, grace: Duration) -> Option<ExitStatus> {
    if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
        return status.ok();
    }
    if let Err(err) = child.start_kill() {
        warn!(error = %err, "failed to kill status producer");
    }
    child.wait().await.ok()
}
