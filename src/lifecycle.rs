use crate::constants::{
    REASON_FIRST_KEY, REASON_KEY_INVALID, REASON_KEY_REJECTED_MID_BATCH, REASON_VALIDATION_FAILED,
};
use crate::error::{Result, SlimmingError};
use crate::model::{BatchRequest, BatchResult, Credential, FileProgress, UsageHistory};
use crate::runner::{self, BatchProgress, CancelHandle};
use crate::service::CompressionService;
use crate::store::CredentialStore;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No usable key; the caller has to supply one.
    NeedKey,
    Validating,
    /// A key is active and batches may be submitted.
    Ready,
    Running,
}

impl LifecycleState {
    fn describe(self) -> &'static str {
        match self {
            LifecycleState::NeedKey => "waiting for an API key",
            LifecycleState::Validating => "validating the API key",
            LifecycleState::Ready => "ready",
            LifecycleState::Running => "a batch is running",
        }
    }
}

/// Events the lifecycle reports back to its caller.
pub trait LifecycleObserver: Send + Sync + 'static {
    fn on_need_key(&self, reason: &str);
    fn on_validating(&self);
    fn on_batch_started(&self, total: usize);
    fn on_file_processed(&self, _progress: &FileProgress) {}
    fn on_batch_completed(&self, result: &BatchResult);
    /// Non-fatal problems, such as failing to persist the key or history.
    fn on_warning(&self, message: &str);
}

struct ObserverProgress<O>(Arc<O>);

impl<O: LifecycleObserver> BatchProgress for ObserverProgress<O> {
    fn started(&mut self, total: usize) {
        self.0.on_batch_started(total);
    }

    fn file_processed(&mut self, progress: &FileProgress) {
        self.0.on_file_processed(progress);
    }
}

/// Coordinates the cached key, the compression service and batch runs.
///
/// A cached key is trusted without a network check; a stale key is only
/// discovered when a batch fails authorization, which sends the lifecycle
/// back to [`LifecycleState::NeedKey`]. Validation and batches run on a
/// spawned tokio task and the caller awaits their completion.
pub struct CredentialLifecycle<S, O> {
    service: Arc<Mutex<S>>,
    store: CredentialStore,
    observer: Arc<O>,
    state: LifecycleState,
    active: Option<Credential>,
    /// Last key the service rejected; a cached copy of it is not reused.
    rejected: Option<Credential>,
    cancel: CancelHandle,
}

impl<S, O> CredentialLifecycle<S, O>
where
    S: CompressionService + 'static,
    O: LifecycleObserver,
{
    pub fn new(service: S, store: CredentialStore, observer: Arc<O>) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
            store,
            observer,
            state: LifecycleState::NeedKey,
            active: None,
            rejected: None,
            cancel: CancelHandle::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn usage_history(&self) -> UsageHistory {
        self.store.load_usage_history()
    }

    /// A handle that cancels the running batch from another task or thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Entry point for a compression request: picks up the cached key if there
    /// is one, otherwise asks the caller for a key.
    pub fn request_compression(&mut self) -> LifecycleState {
        if self.state == LifecycleState::Ready && self.active.is_some() {
            return self.state;
        }

        match self.store.load_key() {
            Some(key) if self.rejected.as_ref() == Some(&key) => {
                self.enter_need_key(REASON_KEY_REJECTED_MID_BATCH)
            }
            Some(key) => {
                crate::verbose!("Using cached API key from {:?}", self.store.base_dir());
                self.active = Some(key);
                self.state = LifecycleState::Ready;
            }
            None => self.enter_need_key(REASON_FIRST_KEY),
        }
        self.state
    }

    /// Validates a key supplied by the caller.
    ///
    /// # Returns
    /// * `Ok(Ready)` if the service accepted the key; it is persisted as well
    /// * `Ok(NeedKey)` if the key was blank or rejected
    /// * `Err(SlimmingError::Transport)` if the service could not be reached;
    ///   the caller may retry with the same key
    pub async fn supply_key(&mut self, candidate: &str) -> Result<LifecycleState> {
        let key = match Credential::parse(candidate) {
            Ok(key) => key,
            Err(_) => {
                self.enter_need_key(REASON_VALIDATION_FAILED);
                return Ok(self.state);
            }
        };

        self.state = LifecycleState::Validating;
        self.active = None;
        self.observer.on_validating();

        let service = Arc::clone(&self.service);
        let task_key = key.clone();
        let joined = tokio::spawn(async move {
            let mut service = service.lock().await;
            service.set_credential(task_key);
            service.validate().await
        })
        .await;

        match joined {
            Ok(Ok(())) => {
                self.rejected = None;
                self.persist_key(&key);
                self.active = Some(key);
                self.state = LifecycleState::Ready;
                Ok(self.state)
            }
            Ok(Err(SlimmingError::Auth(message))) => {
                crate::verbose!("Key validation rejected: {}", message);
                self.rejected = Some(key);
                self.enter_need_key(REASON_KEY_INVALID);
                Ok(self.state)
            }
            Ok(Err(e)) => {
                self.state = LifecycleState::NeedKey;
                Err(e)
            }
            Err(e) => {
                self.state = LifecycleState::NeedKey;
                Err(SlimmingError::Worker(e.to_string()))
            }
        }
    }

    /// Runs a batch with the active key.
    ///
    /// The request is added to the usage history before the batch starts. An
    /// authorization failure moves the lifecycle to `NeedKey`; every other
    /// outcome returns it to `Ready`. The cached key stays on disk either way.
    pub async fn submit_batch(&mut self, request: BatchRequest) -> Result<BatchResult> {
        let credential = match (&self.state, &self.active) {
            (LifecycleState::Ready, Some(key)) => key.clone(),
            _ => {
                return Err(SlimmingError::InvalidState {
                    action: "submit a batch",
                    state: self.state.describe(),
                })
            }
        };

        self.record_usage(&request);
        self.state = LifecycleState::Running;

        let service = Arc::clone(&self.service);
        let cancel = self.cancel.clone();
        let mut progress = ObserverProgress(Arc::clone(&self.observer));
        let joined = tokio::spawn(async move {
            let mut service = service.lock().await;
            runner::run(&mut *service, &credential, &request, &cancel, &mut progress).await
        })
        .await;
        self.cancel.reset();

        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                self.state = LifecycleState::Ready;
                return Err(SlimmingError::Worker(e.to_string()));
            }
        };

        if result.is_auth_failure() {
            self.rejected = self.active.take();
            self.enter_need_key(REASON_KEY_REJECTED_MID_BATCH);
        } else {
            self.state = LifecycleState::Ready;
            self.observer.on_batch_completed(&result);
        }
        Ok(result)
    }

    fn enter_need_key(&mut self, reason: &str) {
        self.state = LifecycleState::NeedKey;
        self.observer.on_need_key(reason);
    }

    fn persist_key(&self, key: &Credential) {
        match self.store.save_key(key) {
            Ok(true) => crate::verbose!("Saved API key to {:?}", self.store.base_dir()),
            Ok(false) => {}
            Err(e) => self
                .observer
                .on_warning(&format!("Failed to save the API key: {}", e)),
        }
    }

    fn record_usage(&self, request: &BatchRequest) {
        let output_dir = request.output_dir.to_string_lossy();
        if let Err(e) = self.store.record_dirs(&request.input_spec, &output_dir) {
            self.observer
                .on_warning(&format!("Failed to remember the used directories: {}", e));
        }
        if let Some(prefix) = &request.file_prefix {
            if let Err(e) = self.store.record_prefix(prefix) {
                self.observer
                    .on_warning(&format!("Failed to remember the file prefix: {}", e));
            }
        }
    }
}
