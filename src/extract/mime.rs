//! Best-effort MIME type detection for files handed to the indexer.

use std::io::Read;
use std::path::Path;

use crate::utils::{is_binary_content, SNIFF_LEN};

/// Guess the MIME type of `path`.
///
/// The extension decides when it is known. Otherwise the first few KB are
/// sniffed and anything that looks like text is reported as `text/plain`.
pub fn detect(path: &Path) -> Option<String> {
    if let Some(mime) = mime_guess::from_path(path).first() {
        return Some(mime.essence_str().to_string());
    }

    let mut file = std::fs::File::open(path).ok()?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.by_ref()
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .ok()?;

    if head.is_empty() || is_binary_content(&head) {
        None
    } else {
        Some("text/plain".to_string())
    }
}
