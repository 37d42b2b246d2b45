use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::config::{ReaderLimits, RelayOptions};
use crate::emitter::Emitter;
use crate::error::RelayError;
use crate::field::{Field, Record};
use crate::reader::{ProtocolReader, StreamItem};
use crate::transform::TransformerRegistry;
use crate::RecordMailbox;

const CHUNK_SIZE_BYTES: usize = 4096;

/// Why [`Relay::run`] returned without an error.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RelayExit {
    Shutdown,
    /// The restart marker has been written; the caller should replace the process.
    Restart,
}

/// Cloneable handles used by signal handlers to steer a running relay.
#[derive(Debug, Clone, Default)]
pub struct RelayHandles {
    shutdown: Arc<Notify>,
    restart: Arc<AtomicBool>,
}

impl RelayHandles {
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Takes effect after the next emitted record.
    pub fn request_restart(&self) {
        self.restart.store(true, Ordering::SeqCst);
    }

    pub fn restart_requested(&self) -> bool {
        self.restart.load(Ordering::SeqCst)
    }
}

/// Reads raw chunks from `source` until EOF, forwarding header lines to the
/// emitter and records to the mailbox. The mailbox is closed on return,
/// whether the stream ended or failed.
pub async fn pump<R, W>(
    source: R,
    reader: ProtocolReader,
    mailbox: Arc<RecordMailbox>,
    emitter: Arc<Mutex<Emitter<W>>>,
) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = pump_chunks(source, reader, &mailbox, &emitter).await;
    mailbox.close();
    result
}

async fn pump_chunks<R, W>(
    mut source: R,
    mut reader: ProtocolReader,
    mailbox: &RecordMailbox,
    emitter: &Mutex<Emitter<W>>,
) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut chunk = [0u8; CHUNK_SIZE_BYTES];
    let mut items = Vec::new();
    loop {
        let n = source.read(&mut chunk).await.map_err(RelayError::Read)?;
        if n == 0 {
            debug!(
                pending_bytes = reader.pending_bytes(),
                "status producer reached EOF"
            );
            return Ok(());
        }

        // Lines completed ahead of a bad one are forwarded before the error.
        let fed = reader.feed(&chunk[..n], |item| items.push(item));
        for item in items.drain(..) {
            match item {
                StreamItem::Header(line) => emitter.lock().await.header(&line).await?,
                StreamItem::Record(record) => {
                    if mailbox.write(record) {
                        debug!(skipped = mailbox.skipped(), "consumer fell behind");
                    }
                }
            }
        }
        fed?;
    }
}

/// Consumption side: takes the latest record, transforms it and emits it.
pub struct Relay<W> {
    registry: TransformerRegistry,
    mailbox: Arc<RecordMailbox>,
    emitter: Arc<Mutex<Emitter<W>>>,
    options: RelayOptions,
    handles: RelayHandles,
}

impl<W> Relay<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(output: W, registry: TransformerRegistry, options: RelayOptions) -> Self {
        let emitter = Emitter::new(output).suppress_headers(options.restarted);
        Self {
            registry,
            mailbox: Arc::new(RecordMailbox::new()),
            emitter: Arc::new(Mutex::new(emitter)),
            options,
            handles: RelayHandles::default(),
        }
    }

    pub fn handles(&self) -> RelayHandles {
        self.handles.clone()
    }

    /// Runs until shutdown, restart, or failure.
    ///
    /// The producer closing its output is reported as
    /// [`RelayError::UpstreamClosed`]; a protocol failure in the pump takes
    /// precedence over it.
    pub async fn run<R>(mut self, source: R, limits: ReaderLimits) -> Result<RelayExit, RelayError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let pump_task = tokio::spawn(pump(
            source,
            ProtocolReader::new(limits),
            Arc::clone(&self.mailbox),
            Arc::clone(&self.emitter),
        ));

        let outcome = match self.consume().await {
            Ok(Some(exit)) => {
                pump_task.abort();
                let _ = pump_task.await;
                Ok(exit)
            }
            Ok(None) => match pump_task.await {
                Ok(Ok(())) => Err(RelayError::UpstreamClosed),
                Ok(Err(err)) => Err(err),
                Err(err) => Err(RelayError::Join(err.to_string())),
            },
            Err(err) => {
                pump_task.abort();
                let _ = pump_task.await;
                Err(err)
            }
        };

        // The separator after the last record is still unflushed.
        if let Err(err) = self.emitter.lock().await.flush().await {
            warn!(error = %err, "final flush of status output failed");
        }
        outcome
    }

    async fn consume(&mut self) -> Result<Option<RelayExit>, RelayError> {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.handles.shutdown.notified() => None,
                record = self.mailbox.next() => Some(record),
            };
            let Some(next) = next else {
                info!("shutdown requested");
                return Ok(Some(RelayExit::Shutdown));
            };
            let Some(record) = next else {
                warn!("record mailbox closed");
                return Ok(None);
            };

            let Some(mut record) = self.transform(record).await? else {
                info!("shutdown requested while transforming, record dropped");
                return Ok(Some(RelayExit::Shutdown));
            };
            if self.options.profile_skipped_statuses {
                let skipped = self.mailbox.skipped();
                if skipped != 0 {
                    record.push(Field::text(format!("Skipped statuses: {skipped}")));
                }
            }

            let mut emitter = self.emitter.lock().await;
            emitter.emit(&record).await?;
            if self.handles.restart_requested() {
                info!("restart requested, emitting marker");
                emitter.restart_marker().await?;
                return Ok(Some(RelayExit::Restart));
            }
        }
    }

    /// Applies the registry on the blocking pool; transformers may sleep or
    /// shell out.
    ///
    /// Returns `Ok(None)` when shutdown is requested first. The blocking task
    /// is then left to finish on its own and its result is discarded.
    async fn transform(&mut self, record: Record) -> Result<Option<Record>, RelayError> {
        if self.registry.is_empty() {
            return Ok(Some(record));
        }
        let mut registry = std::mem::take(&mut self.registry);
        let task = tokio::task::spawn_blocking(move || {
            let result = registry.apply(record);
            (registry, result)
        });
        let joined = tokio::select! {
            biased;
            _ = self.handles.shutdown.notified() => return Ok(None),
            joined = task => joined,
        };
        let (registry, result) = joined.map_err(|err| RelayError::Join(err.to_string()))?;
        self.registry = registry;
        Ok(Some(result?))
    }
}
