pub mod cli;
pub mod config;
pub mod console;
pub mod constants;
pub mod error;
pub mod fileset;
pub mod lifecycle;
pub mod logger;
pub mod model;
pub mod runner;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{Result, SlimmingError};
pub use fileset::{is_image_file, resolve};
pub use lifecycle::{CredentialLifecycle, LifecycleObserver, LifecycleState};
pub use model::{
    BatchOutcome, BatchRequest, BatchResult, Credential, FailureKind, FileFailure, FileOutcome,
    FileProgress, UsageHistory,
};
pub use runner::{destination_path, BatchProgress, CancelHandle};
pub use service::{CompressionService, TinifyClient};
pub use store::CredentialStore;
