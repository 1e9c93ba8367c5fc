#![allow(dead_code)]

use img_slimming::{
    BatchProgress, BatchResult, CancelHandle, CompressionService, Credential, FileOutcome, FileProgress,
    LifecycleObserver, Result, SlimmingError,
};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// What the mock service has been asked to do.
#[derive(Debug, Default)]
pub struct MockLog {
    pub credential: Option<String>,
    pub validate_calls: usize,
    pub compressed: Vec<(PathBuf, PathBuf)>,
}

/// Scripted [`CompressionService`] that writes fake output files.
#[derive(Clone, Default)]
pub struct MockService {
    pub log: Arc<Mutex<MockLog>>,
    /// Keys the service accepts.
    pub valid_keys: Vec<String>,
    /// Validation fails with a transport error while set.
    pub offline: bool,
    /// The n-th compression (1-based) is rejected with an auth error.
    pub reject_at: Option<usize>,
    /// File names that fail with a transport error.
    pub failing_names: Vec<String>,
    /// Cancel this handle after the n-th compression.
    pub cancel_after: Option<(usize, CancelHandle)>,
}

impl MockService {
    pub fn accepting(keys: &[&str]) -> Self {
        Self {
            valid_keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn validate_calls(&self) -> usize {
        self.log.lock().unwrap().validate_calls
    }

    pub fn compressed(&self) -> Vec<(PathBuf, PathBuf)> {
        self.log.lock().unwrap().compressed.clone()
    }

    pub fn credential(&self) -> Option<String> {
        self.log.lock().unwrap().credential.clone()
    }
}

impl CompressionService for MockService {
    fn set_credential(&mut self, credential: Credential) {
        self.log.lock().unwrap().credential = Some(credential.as_str().to_string());
    }

    async fn validate(&mut self) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.validate_calls += 1;
        if self.offline {
            return Err(SlimmingError::Transport("connection refused".into()));
        }
        match &log.credential {
            Some(key) if self.valid_keys.contains(key) => Ok(()),
            _ => Err(SlimmingError::Auth("HTTP 401/Unauthorized".into())),
        }
    }

    async fn compress_to_file(&mut self, source: &Path, destination: &Path) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.compressed
            .push((source.to_path_buf(), destination.to_path_buf()));
        let attempt = log.compressed.len();

        if let Some((after, handle)) = &self.cancel_after {
            if attempt == *after {
                handle.cancel();
            }
        }

        let key_ok = matches!(&log.credential, Some(key) if self.valid_keys.contains(key));
        if !key_ok || self.reject_at == Some(attempt) {
            return Err(SlimmingError::Auth("HTTP 401/Unauthorized".into()));
        }

        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing_names.contains(&name) {
            return Err(SlimmingError::Transport("HTTP 503/Service Unavailable".into()));
        }

        let data = fs::read(source)?;
        fs::write(destination, data)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    NeedKey(String),
    Validating,
    BatchStarted(usize),
    FileProcessed(usize, FileOutcome),
    BatchCompleted,
    Warning(String),
}

#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<Event>>,
    pub results: Mutex<Vec<BatchResult>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn need_key_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::NeedKey(_)))
            .count()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Warning(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl LifecycleObserver for RecordingObserver {
    fn on_need_key(&self, reason: &str) {
        self.events.lock().unwrap().push(Event::NeedKey(reason.to_string()));
    }

    fn on_validating(&self) {
        self.events.lock().unwrap().push(Event::Validating);
    }

    fn on_batch_started(&self, total: usize) {
        self.events.lock().unwrap().push(Event::BatchStarted(total));
    }

    fn on_file_processed(&self, progress: &FileProgress) {
        self.events
            .lock()
            .unwrap()
            .push(Event::FileProcessed(progress.index, progress.outcome.clone()));
    }

    fn on_batch_completed(&self, result: &BatchResult) {
        self.events.lock().unwrap().push(Event::BatchCompleted);
        self.results.lock().unwrap().push(result.clone());
    }

    fn on_warning(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Warning(message.to_string()));
    }
}

/// [`BatchProgress`] that keeps every report.
#[derive(Default)]
pub struct ProgressLog {
    pub total: Option<usize>,
    pub files: Vec<FileProgress>,
}

impl BatchProgress for ProgressLog {
    fn started(&mut self, total: usize) {
        self.total = Some(total);
    }

    fn file_processed(&mut self, progress: &FileProgress) {
        self.files.push(progress.clone());
    }
}

/// Creates `names` with a few bytes each inside `dir`.
pub fn create_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            fs::write(&path, format!("fake data for {}", name)).unwrap();
            path
        })
        .collect()
}

pub fn touch(path: &Path) {
    File::create(path).unwrap();
}
