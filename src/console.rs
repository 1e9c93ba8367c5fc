use crate::constants::{INFO_PREFIX, KEY_PREFIX, PROGRESS_BAR_TEMPLATE, SUCCESS_PREFIX};
use crate::lifecycle::LifecycleObserver;
use crate::model::{BatchOutcome, BatchResult, FileOutcome, FileProgress, UsageHistory};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Terminal implementation of [`LifecycleObserver`].
///
/// Shows an indicatif progress bar while a batch runs and keeps the latest
/// key prompt reason for the front end to display.
#[derive(Default)]
pub struct ConsoleObserver {
    progress: Mutex<Option<ProgressBar>>,
    need_key_reason: Mutex<Option<String>>,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the reason from the last `on_need_key`, if it was not consumed yet.
    pub fn take_need_key_reason(&self) -> Option<String> {
        self.need_key_reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    pub fn set_need_key_reason(&self, reason: &str) {
        *self
            .need_key_reason
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(reason.to_string());
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let guard = self.progress.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = guard.as_ref() {
            f(bar);
        }
    }

    fn finish_bar(&self, message: &str) {
        let bar = self
            .progress
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(bar) = bar {
            bar.finish_with_message(message.to_string());
        }
    }
}

impl LifecycleObserver for ConsoleObserver {
    fn on_need_key(&self, reason: &str) {
        self.finish_bar("stopped");
        self.set_need_key_reason(reason);
    }

    fn on_validating(&self) {
        crate::info!("{} Validating API key...", KEY_PREFIX);
    }

    fn on_batch_started(&self, total: usize) {
        crate::info!("🚀 Starting batch compression of {} image files", total);
        if total == 0 || crate::logger::is_quiet() {
            return;
        }

        let bar = ProgressBar::new(total as u64);
        // the template is a constant, so this only falls back if it is edited badly
        let style = ProgressStyle::with_template(PROGRESS_BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style.progress_chars("#>-"));
        *self.progress.lock().unwrap_or_else(|e| e.into_inner()) = Some(bar);
    }

    fn on_file_processed(&self, progress: &FileProgress) {
        let name = progress
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.with_bar(|bar| {
            let message = match progress.outcome {
                FileOutcome::Success => name,
                FileOutcome::Failure(_) => format!("{} (failed)", name),
            };
            bar.set_message(message);
            bar.inc(1);
        });
    }

    fn on_batch_completed(&self, result: &BatchResult) {
        self.finish_bar("done");
        crate::info!("{}", summarize(result));
    }

    fn on_warning(&self, message: &str) {
        crate::warn!("{}", message);
    }
}

/// One-line report for a finished batch.
pub fn summarize(result: &BatchResult) -> String {
    let seconds = result.elapsed_millis as f64 / 1000.0;
    match &result.outcome {
        BatchOutcome::Success => format!(
            "{} Compression complete: {} images compressed in {:.1}s",
            SUCCESS_PREFIX, result.succeeded_count, seconds
        ),
        BatchOutcome::PartialFailure { failed, cause } => format!(
            "{}  Compressed {} of {} images in {:.1}s, {} failed (first error: {})",
            crate::constants::WARNING_PREFIX,
            result.succeeded_count,
            result.total_count,
            seconds,
            failed,
            cause
        ),
        BatchOutcome::AuthFailure { message } => format!(
            "{} API key rejected after {} of {} images: {}",
            crate::constants::ERROR_PREFIX,
            result.attempted_count,
            result.total_count,
            message
        ),
        BatchOutcome::Cancelled => format!(
            "{}  Cancelled after {} of {} images ({} compressed)",
            crate::constants::WARNING_PREFIX,
            result.attempted_count,
            result.total_count,
            result.succeeded_count
        ),
    }
}

/// Label of the entry that asks for a value not in the history.
pub const NEW_VALUE_CHOICE: &str = "Enter a new value...";

/// Items for a history prompt: cached values most recent first, then
/// [`NEW_VALUE_CHOICE`].
pub fn history_choices(values: &[String]) -> Vec<String> {
    values
        .iter()
        .rev()
        .cloned()
        .chain(std::iter::once(NEW_VALUE_CHOICE.to_string()))
        .collect()
}

/// The cached value behind `selection` in [`history_choices`], or `None` for
/// the new-value entry.
pub fn chosen_value(values: &[String], selection: usize) -> Option<String> {
    values
        .len()
        .checked_sub(selection + 1)
        .map(|index| values[index].clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    CancelBatch,
    Exit,
}

/// The first Ctrl-C during a batch cancels it; any other one exits.
pub fn interrupt_action(batch_running: bool, already_cancelled: bool) -> InterruptAction {
    if batch_running && !already_cancelled {
        InterruptAction::CancelBatch
    } else {
        InterruptAction::Exit
    }
}

/// Renders the cached history for the `history` command.
pub fn format_history(history: &UsageHistory) -> String {
    if history.is_empty() {
        return format!("{} No usage history yet", INFO_PREFIX);
    }

    let mut out = String::new();
    for (title, values) in [
        ("Input directories", &history.input_specs),
        ("Output directories", &history.output_dirs),
        ("File prefixes", &history.prefixes),
    ] {
        out.push_str(&format!("{} {}:\n", INFO_PREFIX, title));
        if values.is_empty() {
            out.push_str("  (none)\n");
        }
        for value in values {
            out.push_str(&format!("  {}\n", value));
        }
    }
    out
}
