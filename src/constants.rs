use std::time::Duration;

/// Extensions accepted by the file-set resolver. Matching is case-sensitive.
pub const SUPPORTED_IMAGE_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg"];

pub const INPUT_SPEC_SEPARATOR: char = ',';
pub const PREFIX_SEPARATOR: &str = "_";

// Storage layout, relative to the configured storage directory
pub const APP_DIR_NAME: &str = "img-slimming";
pub const API_KEY_FILE: &str = "api_key.txt";
pub const INPUT_DIRS_FILE: &str = "input_dirs.txt";
pub const OUTPUT_DIRS_FILE: &str = "output_dirs.txt";
pub const PREFIXES_FILE: &str = "prefixes.txt";

pub const DEFAULT_ENDPOINT: &str = "https://api.tinify.com";
pub const SHRINK_PATH: &str = "/shrink";
pub const API_USER: &str = "api";
pub const COMPRESSION_COUNT_HEADER: &str = "Compression-Count";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// Messages passed to the key prompt
pub const REASON_FIRST_KEY: &str = "Enter your TinyPNG API key (get one at https://tinypng.com/developers)";
pub const REASON_VALIDATION_FAILED: &str = "API key validation failed, please enter it again";
pub const REASON_KEY_INVALID: &str = "The API key was rejected, please enter a valid key";
pub const REASON_KEY_REJECTED_MID_BATCH: &str = "The cached API key is no longer accepted, please enter a new key";

pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

// Common output message prefixes
pub const SUCCESS_PREFIX: &str = "✅";
pub const WARNING_PREFIX: &str = "⚠️";
pub const ERROR_PREFIX: &str = "❌";
pub const INFO_PREFIX: &str = "📋";
pub const KEY_PREFIX: &str = "🔑";
