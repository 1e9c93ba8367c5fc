use crate::constants::PREFIX_SEPARATOR;
use crate::error::SlimmingError;
use crate::fileset;
use crate::model::{
    BatchOutcome, BatchRequest, BatchResult, Credential, FailureKind, FileFailure, FileOutcome,
    FileProgress,
};
use crate::service::CompressionService;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared cancellation flag, checked by the runner before each file.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Receives progress from a running batch.
pub trait BatchProgress: Send {
    fn started(&mut self, _total: usize) {}
    fn file_processed(&mut self, _progress: &FileProgress) {}
}

impl BatchProgress for () {}

/// Where the compressed copy of `source` is written.
///
/// `output_dir/name` without a prefix, `output_dir/{prefix}_name` with one.
pub fn destination_path(request: &BatchRequest, source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match request.effective_prefix() {
        Some(prefix) => request
            .output_dir
            .join(format!("{}{}{}", prefix, PREFIX_SEPARATOR, name)),
        None => request.output_dir.join(name),
    }
}

/// Compresses every file of `request` through `service`, one at a time.
///
/// The first authorization failure stops the batch: the remaining files would
/// be sent with the same rejected key. Other failures are recorded and the
/// batch carries on. Cancellation is honoured between files.
pub async fn run<S, P>(
    service: &mut S,
    credential: &Credential,
    request: &BatchRequest,
    cancel: &CancelHandle,
    progress: &mut P,
) -> BatchResult
where
    S: CompressionService,
    P: BatchProgress,
{
    let start_time = Instant::now();
    service.set_credential(credential.clone());

    let files = fileset::resolve(&request.input_spec);
    let total = files.len();
    crate::verbose!("Resolved {} image files from '{}'", total, request.input_spec);
    progress.started(total);

    if total > 0 {
        if let Err(e) = tokio::fs::create_dir_all(&request.output_dir).await {
            crate::warn!(
                "Failed to create output directory {:?}: {}",
                request.output_dir,
                e
            );
        }
    }

    let mut succeeded = 0;
    let mut failures: Vec<FileFailure> = Vec::new();

    for (index, source) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            crate::verbose!("Batch cancelled after {} files", index);
            return finish(start_time, total, succeeded, index, failures, BatchOutcome::Cancelled);
        }

        let destination = destination_path(request, source);
        crate::verbose!("Compressing {:?} -> {:?}", source, destination);

        let outcome = match service.compress_to_file(source, &destination).await {
            Ok(()) => {
                succeeded += 1;
                FileOutcome::Success
            }
            Err(SlimmingError::Auth(message)) => {
                crate::warn!("API key rejected while compressing {:?}: {}", source, message);
                let message = format!("{} ({})", message, source.display());
                return finish(
                    start_time,
                    total,
                    succeeded,
                    index + 1,
                    failures,
                    BatchOutcome::AuthFailure { message },
                );
            }
            Err(e) => {
                let kind = match e {
                    SlimmingError::Io(_) => FailureKind::Io,
                    _ => FailureKind::Transport,
                };
                crate::warn!("Failed to compress {:?}: {}", source, e);
                failures.push(FileFailure {
                    source: source.clone(),
                    kind,
                    message: e.to_string(),
                });
                FileOutcome::Failure(kind)
            }
        };

        progress.file_processed(&FileProgress {
            index: index + 1,
            total,
            source: source.clone(),
            destination,
            outcome,
        });
    }

    let outcome = match failures.first() {
        None => BatchOutcome::Success,
        Some(first) => BatchOutcome::PartialFailure {
            failed: failures.len(),
            cause: first.message.clone(),
        },
    };
    finish(start_time, total, succeeded, total, failures, outcome)
}

fn finish(
    start_time: Instant,
    total: usize,
    succeeded: usize,
    attempted: usize,
    failures: Vec<FileFailure>,
    outcome: BatchOutcome,
) -> BatchResult {
    BatchResult {
        total_count: total,
        succeeded_count: succeeded,
        attempted_count: attempted,
        elapsed_millis: u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX),
        failures,
        outcome,
    }
}
