//! Utility functions shared across modules

/// How much of a file is inspected when sniffing for binary content
pub const SNIFF_LEN: usize = 8192;

/// Check if content appears to be binary (contains null bytes or high ratio of non-printable chars).
///
/// This checks the first 8KB of content for binary indicators:
/// - Null bytes are a strong indicator of binary content
/// - More than 10% non-printable characters suggests binary content
///
/// UTF-16 text carries null bytes too; callers that transcode should check for a
/// byte order mark first.
pub fn is_binary_content(content: &[u8]) -> bool {
    let check_len = content.len().min(SNIFF_LEN);
    let sample = &content[..check_len];

    let mut non_text_count = 0;
    for &byte in sample {
        if byte == 0 {
            return true;
        }
        if byte < 32 && !matches!(byte, b'\t' | b'\n' | b'\r' | 0x0c) {
            non_text_count += 1;
        }
    }

    non_text_count > check_len / 10
}

/// Whether the content starts with a UTF-8/UTF-16 byte order mark
pub fn has_bom(content: &[u8]) -> bool {
    content.starts_with(&[0xEF, 0xBB, 0xBF])
        || content.starts_with(&[0xFF, 0xFE])
        || content.starts_with(&[0xFE, 0xFF])
}

/// Format bytes for human readability (e.g., 1048576 -> "1.00 MB")
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.2} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.2} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}
