use crate::constants::{INPUT_SPEC_SEPARATOR, SUPPORTED_IMAGE_SUFFIXES};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expands an input string into the image files a batch will process.
///
/// The input is a comma-separated list. A single token naming a file yields
/// that file; a single token naming a directory yields its immediate children
/// (sorted by name, not recursive). Anything else is treated as a list of file
/// paths. Every candidate is filtered with [`is_image_file`]; entries that do
/// not match are dropped silently.
///
/// # Example
/// ```
/// use img_slimming::fileset::resolve;
/// use std::path::PathBuf;
///
/// let files = resolve("/tmp/a.png, /tmp/b.txt, /tmp/c.JPEG");
/// assert_eq!(files, vec![PathBuf::from("/tmp/a.png")]);
/// ```
pub fn resolve(input_spec: &str) -> Vec<PathBuf> {
    let tokens: Vec<&str> = input_spec
        .split(INPUT_SPEC_SEPARATOR)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect();

    if tokens.is_empty() {
        return Vec::new();
    }

    if let [single] = tokens.as_slice() {
        let path = Path::new(single);
        if path.is_file() {
            return filter_images(vec![path.to_path_buf()]);
        }
        if path.is_dir() {
            return directory_images(path);
        }
    }

    filter_images(tokens.into_iter().map(PathBuf::from).collect())
}

/// True when the file name ends with `.png`, `.jpg` or `.jpeg` (case-sensitive).
pub fn is_image_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| {
            SUPPORTED_IMAGE_SUFFIXES
                .iter()
                .any(|suffix| name.ends_with(suffix))
        })
        .unwrap_or(false)
}

fn filter_images(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.into_iter().filter(|p| is_image_file(p)).collect()
}

fn directory_images(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        // unreadable entries are skipped like any other non-image
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        // follows symlinks, like the single-file branch
        .filter(|path| path.is_file())
        .filter(|path| is_image_file(path))
        .collect()
}
