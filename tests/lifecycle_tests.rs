mod common;

use common::{create_files, Event, MockService, RecordingObserver};
use img_slimming::constants::{API_KEY_FILE, REASON_KEY_INVALID, REASON_VALIDATION_FAILED};
use img_slimming::{
    BatchOutcome, BatchRequest, Credential, CredentialLifecycle, CredentialStore, FailureKind,
    FileOutcome, LifecycleState, SlimmingError,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    service: MockService,
    observer: Arc<RecordingObserver>,
}

impl Fixture {
    fn new(service: MockService) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            service,
            observer: Arc::new(RecordingObserver::default()),
        }
    }

    fn store(&self) -> CredentialStore {
        CredentialStore::new(self.dir.path().join("cache"))
    }

    fn lifecycle(&self) -> CredentialLifecycle<MockService, RecordingObserver> {
        CredentialLifecycle::new(self.service.clone(), self.store(), Arc::clone(&self.observer))
    }

    fn images(&self) -> String {
        let input = self.dir.path().join("in");
        fs::create_dir_all(&input).unwrap();
        create_files(&input, &["x.png", "y.txt", "z.jpg"]);
        input.to_string_lossy().into_owned()
    }

    fn request(&self) -> BatchRequest {
        BatchRequest::new(self.images(), self.dir.path().join("out"), Some("min".into()))
    }

    fn cache_key(&self, key: &str) {
        self.store()
            .save_key(&Credential::parse(key).unwrap())
            .unwrap();
    }
}

#[tokio::test]
async fn test_first_run_needs_key() {
    let fixture = Fixture::new(MockService::accepting(&["good"]));
    let mut lifecycle = fixture.lifecycle();

    assert_eq!(lifecycle.request_compression(), LifecycleState::NeedKey);
    assert_eq!(fixture.observer.need_key_count(), 1);
}

#[tokio::test]
async fn test_blank_key_skips_network() {
    let fixture = Fixture::new(MockService::accepting(&["good"]));
    let mut lifecycle = fixture.lifecycle();

    for blank in ["", "   ", "\t\n"] {
        let state = lifecycle.supply_key(blank).await.unwrap();
        assert_eq!(state, LifecycleState::NeedKey);
    }

    assert_eq!(fixture.service.validate_calls(), 0);
    assert!(!fixture.observer.events().contains(&Event::Validating));
    assert!(fixture
        .observer
        .events()
        .contains(&Event::NeedKey(REASON_VALIDATION_FAILED.to_string())));
}

#[tokio::test]
async fn test_valid_key_is_persisted() {
    let fixture = Fixture::new(MockService::accepting(&["good"]));
    let mut lifecycle = fixture.lifecycle();

    let state = lifecycle.supply_key("good").await.unwrap();

    assert_eq!(state, LifecycleState::Ready);
    assert_eq!(fixture.service.validate_calls(), 1);
    assert_eq!(fixture.store().load_key().unwrap().as_str(), "good");
    assert_eq!(fixture.observer.events(), vec![Event::Validating]);
}

#[tokio::test]
async fn test_invalid_key_returns_to_need_key() {
    let fixture = Fixture::new(MockService::accepting(&["good"]));
    fixture.cache_key("old");
    let mut lifecycle = fixture.lifecycle();

    let state = lifecycle.supply_key("bad").await.unwrap();

    assert_eq!(state, LifecycleState::NeedKey);
    assert!(fixture
        .observer
        .events()
        .contains(&Event::NeedKey(REASON_KEY_INVALID.to_string())));
    // the rejected key never replaces the cached one
    assert_eq!(fixture.store().load_key().unwrap().as_str(), "old");
}

#[tokio::test]
async fn test_transport_error_is_retryable() {
    let fixture = Fixture::new(MockService {
        offline: true,
        ..MockService::accepting(&["good"])
    });
    let mut lifecycle = fixture.lifecycle();

    let err = lifecycle.supply_key("good").await.unwrap_err();

    assert!(matches!(err, SlimmingError::Transport(_)));
    assert!(err.is_retryable());
    assert_eq!(lifecycle.state(), LifecycleState::NeedKey);
    assert!(fixture.store().load_key().is_none());
}

#[tokio::test]
async fn test_cached_key_skips_validation() {
    let fixture = Fixture::new(MockService::accepting(&["good"]));
    fixture.cache_key("good");
    let mut lifecycle = fixture.lifecycle();

    assert_eq!(lifecycle.request_compression(), LifecycleState::Ready);
    let result = lifecycle.submit_batch(fixture.request()).await.unwrap();

    assert_eq!(fixture.service.validate_calls(), 0);
    assert_eq!(result.outcome, BatchOutcome::Success);
    assert_eq!(result.total_count, 2);
    assert_eq!(result.succeeded_count, 2);
    assert_eq!(lifecycle.state(), LifecycleState::Ready);
    assert!(fixture.dir.path().join("out/min_x.png").exists());
    assert!(fixture.dir.path().join("out/min_z.jpg").exists());

    let events = fixture.observer.events();
    assert_eq!(events.first(), Some(&Event::BatchStarted(2)));
    assert_eq!(events.last(), Some(&Event::BatchCompleted));
}

#[tokio::test]
async fn test_second_request_reuses_ready_state() {
    let fixture = Fixture::new(MockService::accepting(&["good"]));
    fixture.cache_key("good");
    let mut lifecycle = fixture.lifecycle();

    lifecycle.request_compression();
    lifecycle.submit_batch(fixture.request()).await.unwrap();
    assert_eq!(lifecycle.request_compression(), LifecycleState::Ready);
    lifecycle.submit_batch(fixture.request()).await.unwrap();

    assert_eq!(fixture.service.validate_calls(), 0);
    assert_eq!(fixture.observer.results.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_stale_cached_key_recovers_through_new_key() {
    let fixture = Fixture::new(MockService::accepting(&["fresh"]));
    fixture.cache_key("stale");
    let mut lifecycle = fixture.lifecycle();

    assert_eq!(lifecycle.request_compression(), LifecycleState::Ready);
    let result = lifecycle.submit_batch(fixture.request()).await.unwrap();

    assert!(result.is_auth_failure());
    assert_eq!(result.attempted_count, 1);
    assert_eq!(lifecycle.state(), LifecycleState::NeedKey);
    assert!(!fixture.observer.events().contains(&Event::BatchCompleted));
    // kept until a replacement validates
    assert_eq!(fixture.store().load_key().unwrap().as_str(), "stale");

    assert_eq!(lifecycle.supply_key("fresh").await.unwrap(), LifecycleState::Ready);
    assert_eq!(fixture.store().load_key().unwrap().as_str(), "fresh");

    let retry = lifecycle.submit_batch(fixture.request()).await.unwrap();
    assert!(retry.is_success());
}

#[tokio::test]
async fn test_submit_requires_ready_state() {
    let fixture = Fixture::new(MockService::accepting(&["good"]));
    let mut lifecycle = fixture.lifecycle();
    lifecycle.request_compression();

    let err = lifecycle.submit_batch(fixture.request()).await.unwrap_err();

    assert!(matches!(err, SlimmingError::InvalidState { .. }));
    assert!(fixture.service.compressed().is_empty());
    assert!(lifecycle.usage_history().is_empty());
}

#[tokio::test]
async fn test_usage_history_recorded_even_when_batch_fails() {
    let fixture = Fixture::new(MockService::accepting(&["fresh"]));
    fixture.cache_key("stale");
    let mut lifecycle = fixture.lifecycle();
    lifecycle.request_compression();

    let request = fixture.request();
    lifecycle.submit_batch(request.clone()).await.unwrap();

    let history = lifecycle.usage_history();
    assert_eq!(history.input_specs, vec![request.input_spec.clone()]);
    assert_eq!(
        history.output_dirs,
        vec![request.output_dir.to_string_lossy().into_owned()]
    );
    assert_eq!(history.prefixes, vec!["min".to_string()]);
}

#[tokio::test]
async fn test_cancel_before_start_reports_cancelled() {
    let fixture = Fixture::new(MockService::accepting(&["good"]));
    fixture.cache_key("good");
    let mut lifecycle = fixture.lifecycle();
    lifecycle.request_compression();

    lifecycle.cancel();
    let result = lifecycle.submit_batch(fixture.request()).await.unwrap();

    assert_eq!(result.outcome, BatchOutcome::Cancelled);
    assert_eq!(result.attempted_count, 0);
    assert_eq!(lifecycle.state(), LifecycleState::Ready);
    assert!(fixture.service.compressed().is_empty());

    // the flag is cleared once the batch has finished
    let next = lifecycle.submit_batch(fixture.request()).await.unwrap();
    assert!(next.is_success());
}

#[tokio::test]
async fn test_persistence_failure_is_a_warning() {
    let fixture = Fixture::new(MockService::accepting(&["good"]));
    let blocker = fixture.dir.path().join("blocked");
    fs::write(&blocker, "not a directory").unwrap();
    let store = CredentialStore::new(Path::new(&blocker));
    let mut lifecycle = CredentialLifecycle::new(
        fixture.service.clone(),
        store,
        Arc::clone(&fixture.observer),
    );

    assert_eq!(lifecycle.supply_key("good").await.unwrap(), LifecycleState::Ready);
    let result = lifecycle.submit_batch(fixture.request()).await.unwrap();

    assert!(result.is_success());
    let warnings = fixture.observer.warnings();
    assert!(warnings.iter().any(|w| w.contains("API key")));
    assert!(warnings.iter().any(|w| w.contains("directories")));
    assert!(warnings.iter().any(|w| w.contains("prefix")));
    assert!(!blocker.join(API_KEY_FILE).exists());
}

#[tokio::test]
async fn test_rejected_cached_key_is_not_reused() {
    let fixture = Fixture::new(MockService::accepting(&["fresh"]));
    fixture.cache_key("stale");
    let mut lifecycle = fixture.lifecycle();

    lifecycle.request_compression();
    let result = lifecycle.submit_batch(fixture.request()).await.unwrap();
    assert!(result.is_auth_failure());

    assert_eq!(lifecycle.request_compression(), LifecycleState::NeedKey);
    assert_eq!(fixture.service.compressed().len(), 1);
}

#[tokio::test]
async fn test_observer_sees_each_file_outcome() {
    let fixture = Fixture::new(MockService {
        failing_names: vec!["x.png".into()],
        ..MockService::accepting(&["good"])
    });
    fixture.cache_key("good");
    let mut lifecycle = fixture.lifecycle();
    lifecycle.request_compression();

    let result = lifecycle.submit_batch(fixture.request()).await.unwrap();

    assert!(matches!(result.outcome, BatchOutcome::PartialFailure { failed: 1, .. }));
    assert_eq!(
        fixture.observer.events(),
        vec![
            Event::BatchStarted(2),
            Event::FileProcessed(1, FileOutcome::Failure(FailureKind::Transport)),
            Event::FileProcessed(2, FileOutcome::Success),
            Event::BatchCompleted,
        ]
    );
}
