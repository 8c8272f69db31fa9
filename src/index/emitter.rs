//! Single-writer channel in front of the index backend
//!
//! The emitter owns the backend on a blocking thread. Callers hand over
//! documents through a bounded channel and wait for the write to be
//! acknowledged, so an index failure surfaces on the `emit` that caused it.

use crate::index::traits::{IndexBackend, IndexError, IndexResult};
use crate::index::IndexDocument;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Queue depth between the crawl and the index writer
const EMIT_QUEUE_CAPACITY: usize = 64;

/// What happens to the genesis generation when the run ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenesisOutcome {
    /// Run completed: seal the generation for promotion
    Finalize,
    /// Run aborted: drop the generation and its documents
    Discard,
}

enum EmitCommand {
    Append(IndexDocument, oneshot::Sender<IndexResult<()>>),
    Finish(GenesisOutcome),
}

/// Handle to the index writer task
pub struct DocumentEmitter {
    tx: mpsc::Sender<EmitCommand>,
    writer: JoinHandle<IndexResult<u64>>,
    generation: i64,
}

impl DocumentEmitter {
    /// Starts the writer for `generation`, taking ownership of the backend
    pub fn start(backend: Box<dyn IndexBackend>, generation: i64) -> Self {
        let (tx, rx) = mpsc::channel(EMIT_QUEUE_CAPACITY);
        let writer = tokio::task::spawn_blocking(move || run_writer(backend, generation, rx));

        Self {
            tx,
            writer,
            generation,
        }
    }

    pub fn generation(&self) -> i64 {
        self.generation
    }

    /// Appends a document to the genesis generation
    ///
    /// # Errors
    ///
    /// The backend's error if the write failed, or `WriterClosed` if an
    /// earlier failure already stopped the writer.
    pub async fn emit(&self, document: IndexDocument) -> IndexResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(EmitCommand::Append(document, ack_tx))
            .await
            .map_err(|_| IndexError::WriterClosed)?;
        ack_rx.await.map_err(|_| IndexError::WriterClosed)?
    }

    /// Stops the writer and settles the genesis generation
    ///
    /// # Returns
    ///
    /// The number of documents written during this session
    pub async fn finish(self, outcome: GenesisOutcome) -> IndexResult<u64> {
        // a closed channel means the writer already stopped on an error
        let _ = self.tx.send(EmitCommand::Finish(outcome)).await;
        drop(self.tx);

        self.writer
            .await
            .map_err(|e| IndexError::Database(format!("Index writer panicked: {}", e)))?
    }
}

fn run_writer(
    mut backend: Box<dyn IndexBackend>,
    generation: i64,
    mut rx: mpsc::Receiver<EmitCommand>,
) -> IndexResult<u64> {
    let mut written = 0u64;

    while let Some(command) = rx.blocking_recv() {
        match command {
            EmitCommand::Append(document, ack) => match backend.append(generation, &document) {
                Ok(()) => {
                    written += 1;
                    let _ = ack.send(Ok(()));
                }
                Err(e) => {
                    tracing::error!("Index write failed for {}: {}", document.url, e);
                    let _ = ack.send(Err(e));
                    rx.close();
                    return discard_after_failure(backend.as_mut(), generation, written);
                }
            },
            EmitCommand::Finish(outcome) => {
                match outcome {
                    GenesisOutcome::Finalize => backend.finalize(generation)?,
                    GenesisOutcome::Discard => backend.discard(generation)?,
                }
                return Ok(written);
            }
        }
    }

    Ok(written)
}

fn discard_after_failure(
    backend: &mut dyn IndexBackend,
    generation: i64,
    written: u64,
) -> IndexResult<u64> {
    if let Err(e) = backend.discard(generation) {
        tracing::error!("Failed to discard generation {}: {}", generation, e);
    }
    Ok(written)
}
