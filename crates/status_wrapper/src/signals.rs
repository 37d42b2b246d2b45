use status_stream::RelayHandles;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::WrapperError;

/// SIGTERM/SIGINT stop the relay; SIGUSR1 schedules a restart after the
/// next emitted record.
///
/// The listener keeps running until aborted, so repeated signals keep
/// reaching the relay.
pub fn install(handles: RelayHandles) -> Result<JoinHandle<()>, WrapperError> {
    let mut sigterm = signal(SignalKind::terminate()).map_err(WrapperError::Signal)?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(WrapperError::Signal)?;
    let mut sigusr1 = signal(SignalKind::user_defined1()).map_err(WrapperError::Signal)?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("received SIGTERM");
                    handles.request_shutdown();
                }
                _ = sigint.recv() => {
                    info!("received SIGINT");
                    handles.request_shutdown();
                }
                _ = sigusr1.recv() => {
                    info!("received SIGUSR1, restart scheduled");
                    handles.request_restart();
                }
            }
        }
    }))
}
