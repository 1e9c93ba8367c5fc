use anyhow::Context;
use clap::Parser;
use dialoguer::{Input, Password, Select};
use img_slimming::cli::{Args, Commands};
use img_slimming::console::{
    chosen_value, format_history, history_choices, interrupt_action, summarize, ConsoleObserver,
    InterruptAction,
};
use img_slimming::constants::{KEY_PREFIX, REASON_FIRST_KEY};
use img_slimming::{
    logger, BatchOutcome, BatchRequest, CancelHandle, CompressionService, Config,
    CredentialLifecycle, CredentialStore, LifecycleState, TinifyClient,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const REASON_SERVICE_UNREACHABLE: &str =
    "Could not reach the compression service, enter the key again to retry";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    logger::configure(args.quiet, args.verbose);

    let config = Config::new(args.storage_dir, args.endpoint, args.timeout)
        .context("Invalid configuration")?;
    let store = CredentialStore::new(&config.storage_dir);

    match args.command {
        Commands::Compress {
            input,
            output,
            prefix,
            key,
        } => run_compress(&config, store, input, output, prefix, key).await,
        Commands::Key { key } => store_key(&config, store, key).await,
        Commands::History => {
            print!("{}", format_history(&store.load_usage_history()));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_compress(
    config: &Config,
    store: CredentialStore,
    input: Option<String>,
    output: Option<PathBuf>,
    prefix: Option<String>,
    key: Option<String>,
) -> anyhow::Result<ExitCode> {
    let request = complete_request(&store, input, output, prefix).await?;
    let observer = Arc::new(ConsoleObserver::new());
    let service = TinifyClient::new(config).context("Failed to set up the compression client")?;
    let mut lifecycle = CredentialLifecycle::new(service, store, Arc::clone(&observer));

    // An explicit key is always validated; otherwise the cached one is trusted
    if key.is_none() {
        lifecycle.request_compression();
    }

    let batch_running = Arc::new(AtomicBool::new(false));
    watch_interrupts(lifecycle.cancel_handle(), Arc::clone(&batch_running));

    let mut supplied = key;
    loop {
        if !ensure_ready(&mut lifecycle, &observer, supplied.take()).await? {
            img_slimming::warn!("No API key entered, nothing was compressed");
            return Ok(ExitCode::FAILURE);
        }

        batch_running.store(true, Ordering::SeqCst);
        let result = lifecycle.submit_batch(request.clone()).await;
        batch_running.store(false, Ordering::SeqCst);
        let result = result.context("Batch compression failed")?;

        let code = match result.outcome {
            BatchOutcome::Success => ExitCode::SUCCESS,
            BatchOutcome::PartialFailure { .. } => ExitCode::FAILURE,
            BatchOutcome::Cancelled => ExitCode::from(130),
            // back in NeedKey: prompt for a new key and rerun the whole batch
            BatchOutcome::AuthFailure { .. } => {
                img_slimming::error!("{}", summarize(&result));
                continue;
            }
        };
        return Ok(code);
    }
}

/// Handles Ctrl-C for the rest of the process once installed.
fn watch_interrupts(cancel: CancelHandle, batch_running: Arc<AtomicBool>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match interrupt_action(batch_running.load(Ordering::SeqCst), cancel.is_cancelled()) {
                InterruptAction::CancelBatch => {
                    img_slimming::warn!(
                        "Cancelling after the current image... (Ctrl-C again to quit now)"
                    );
                    cancel.cancel();
                }
                InterruptAction::Exit => std::process::exit(130),
            }
        }
    });
}

/// Fills in arguments left off the command line from the usage history.
async fn complete_request(
    store: &CredentialStore,
    input: Option<String>,
    output: Option<PathBuf>,
    prefix: Option<String>,
) -> anyhow::Result<BatchRequest> {
    if let (Some(input), Some(output)) = (&input, &output) {
        return Ok(BatchRequest::new(input.clone(), output.clone(), prefix));
    }
    if !std::io::stdin().is_terminal() {
        anyhow::bail!("INPUT and OUTPUT are required when no terminal is attached");
    }

    let history = store.load_usage_history();
    let input = match input {
        Some(input) => input,
        None => {
            ask_with_history(
                "Input file, directory or comma-separated list",
                history.input_specs,
                false,
            )
            .await?
        }
    };
    let output = match output {
        Some(output) => output,
        None => PathBuf::from(ask_with_history("Output directory", history.output_dirs, false).await?),
    };
    let prefix = match prefix {
        Some(prefix) => prefix,
        None => ask_with_history("File prefix (empty for none)", history.prefixes, true).await?,
    };
    Ok(BatchRequest::new(input, output, Some(prefix)))
}

/// Offers the cached values first; typing a new value is always possible.
async fn ask_with_history(
    prompt: &'static str,
    history: Vec<String>,
    allow_empty: bool,
) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
        if !history.is_empty() {
            let selection = Select::new()
                .with_prompt(prompt)
                .items(&history_choices(&history))
                .default(0)
                .interact()?;
            if let Some(value) = chosen_value(&history, selection) {
                return Ok(value);
            }
        }
        let value: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(allow_empty)
            .interact_text()?;
        Ok(value.trim().to_string())
    })
    .await
    .context("Prompt task failed")?
}

async fn store_key(
    config: &Config,
    store: CredentialStore,
    key: Option<String>,
) -> anyhow::Result<ExitCode> {
    let observer = Arc::new(ConsoleObserver::new());
    let service = TinifyClient::new(config).context("Failed to set up the compression client")?;
    let mut lifecycle = CredentialLifecycle::new(service, store, Arc::clone(&observer));

    if ensure_ready(&mut lifecycle, &observer, key).await? {
        img_slimming::info!("{} API key saved to {:?}", KEY_PREFIX, config.storage_dir);
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Drives the lifecycle until a key is active.
///
/// Returns `Ok(false)` when the user leaves the key prompt empty.
async fn ensure_ready<S: CompressionService + 'static>(
    lifecycle: &mut CredentialLifecycle<S, ConsoleObserver>,
    observer: &ConsoleObserver,
    mut supplied: Option<String>,
) -> anyhow::Result<bool> {
    loop {
        let candidate = match supplied.take() {
            Some(key) => key,
            None if lifecycle.state() == LifecycleState::Ready => return Ok(true),
            None => {
                let reason = observer
                    .take_need_key_reason()
                    .unwrap_or_else(|| REASON_FIRST_KEY.to_string());
                match prompt_for_key(reason).await? {
                    Some(key) => key,
                    None => return Ok(false),
                }
            }
        };

        match lifecycle.supply_key(&candidate).await {
            Ok(LifecycleState::Ready) => {
                img_slimming::info!("{} API key accepted", KEY_PREFIX);
                return Ok(true);
            }
            Ok(_) => img_slimming::error!("The API key was not accepted"),
            Err(e) if e.is_retryable() => {
                img_slimming::error!("{}", e);
                observer.set_need_key_reason(REASON_SERVICE_UNREACHABLE);
            }
            Err(e) => return Err(e).context("Key validation failed"),
        }
    }
}

async fn prompt_for_key(reason: String) -> anyhow::Result<Option<String>> {
    let answer = tokio::task::spawn_blocking(move || {
        Password::new()
            .with_prompt(reason)
            .allow_empty_password(true)
            .interact()
    })
    .await
    .context("Key prompt task failed")?
    .context("Failed to read the API key")?;

    let answer = answer.trim();
    Ok((!answer.is_empty()).then(|| answer.to_string()))
}
