//! Content extraction: turning a file's bytes into indexable text.
//!
//! Extractors live in a process-wide registry that has to be loaded once with
//! [`ensure_loaded`] before any file can be added. Registration order is
//! priority order; later [`register`] calls win over the built-ins.

pub mod mime;

use parking_lot::RwLock;
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::utils::{has_bom, is_binary_content};

/// Converts raw file content of some MIME types into plain text
pub trait ContentExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// `mime` is lowercased with parameters stripped
    fn supports(&self, mime: &str) -> bool;

    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

type Registry = RwLock<Vec<Arc<dyn ContentExtractor>>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn builtin_extractors() -> Vec<Arc<dyn ContentExtractor>> {
    let mut extractors: Vec<Arc<dyn ContentExtractor>> = Vec::with_capacity(2);
    match HtmlExtractor::new() {
        Ok(html) => extractors.push(Arc::new(html)),
        Err(e) => warn!(error = %e, "HTML extractor unavailable"),
    }
    extractors.push(Arc::new(PlainTextExtractor));
    extractors
}

/// Load the built-in extractors. Safe to call any number of times.
pub fn ensure_loaded() {
    registry();
}

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        let extractors = builtin_extractors();
        info!(count = extractors.len(), "Content extractors loaded");
        RwLock::new(extractors)
    })
}

pub fn is_loaded() -> bool {
    REGISTRY.get().is_some()
}

/// Add an extractor ahead of every one registered so far, replacing any
/// extractor with the same name. Loads the built-ins first if needed.
pub fn register(extractor: Arc<dyn ContentExtractor>) {
    debug!(name = extractor.name(), "Registering content extractor");
    let mut extractors = registry().write();
    extractors.retain(|existing| existing.name() != extractor.name());
    extractors.insert(0, extractor);
}

/// Names of the loaded extractors in lookup order
pub fn registered_names() -> Vec<String> {
    REGISTRY.get().map_or_else(Vec::new, |registry| {
        registry
            .read()
            .iter()
            .map(|extractor| extractor.name().to_string())
            .collect()
    })
}

fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Find the extractor for `mime`. `None` selects the plain-text default.
fn extractor_for(mime: Option<&str>) -> Result<Arc<dyn ContentExtractor>> {
    let registry = REGISTRY.get().ok_or(EngineError::ExtractorsNotLoaded)?;
    let mime = normalize_mime(mime.unwrap_or("text/plain"));
    registry
        .read()
        .iter()
        .find(|extractor| extractor.supports(&mime))
        .cloned()
        .ok_or(EngineError::UnsupportedMime(mime))
}

/// Extract text from in-memory content
pub fn extract_bytes(bytes: &[u8], mime: Option<&str>) -> Result<String> {
    extractor_for(mime)?.extract(bytes)
}

/// Read `path` and extract its text.
pub fn extract_file(path: &Path, mime: Option<&str>) -> Result<String> {
    // Fail before touching the filesystem
    let extractor = extractor_for(mime)?;
    let bytes = std::fs::read(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = extractor.extract(&bytes)?;
    debug!(
        path = %path.display(),
        extractor = extractor.name(),
        chars = text.len(),
        "Extracted file content"
    );
    Ok(text)
}

/// Decode text in whatever encoding it appears to be in.
///
/// A byte order mark wins, then UTF-8, then chardetng's guess.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    debug!(encoding = encoding.name(), "Transcoded non-UTF-8 content");
    text.into_owned()
}

/// `text/*` and the common structured-text application types
pub struct PlainTextExtractor;

impl ContentExtractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "plain-text"
    }

    fn supports(&self, mime: &str) -> bool {
        mime.starts_with("text/")
            || matches!(
                mime,
                "application/json"
                    | "application/xml"
                    | "application/toml"
                    | "application/x-toml"
                    | "application/yaml"
                    | "application/x-yaml"
                    | "application/javascript"
                    | "application/x-sh"
                    | "application/x-shellscript"
            )
    }

    fn extract(&self, bytes: &[u8]) -> Result<String> {
        if !has_bom(bytes) && is_binary_content(bytes) {
            return Err(EngineError::Extraction("content is binary".into()));
        }
        Ok(decode_text(bytes))
    }
}

/// Strips markup from HTML, dropping script and style bodies
pub struct HtmlExtractor {
    hidden: Regex,
    tags: Regex,
    whitespace: Regex,
}

impl HtmlExtractor {
    pub fn new() -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            hidden: Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>|<!--.*?-->")?,
            tags: Regex::new(r"(?s)<[^>]*>")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    fn decode_entities(text: &str) -> String {
        text.replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            .replace("&amp;", "&")
    }
}

impl ContentExtractor for HtmlExtractor {
    fn name(&self) -> &str {
        "html"
    }

    fn supports(&self, mime: &str) -> bool {
        matches!(mime, "text/html" | "application/xhtml+xml")
    }

    fn extract(&self, bytes: &[u8]) -> Result<String> {
        let html = decode_text(bytes);
        let visible = self.hidden.replace_all(&html, " ");
        let stripped = self.tags.replace_all(&visible, " ");
        let text = Self::decode_entities(&stripped);
        Ok(self.whitespace.replace_all(text.trim(), " ").into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct ShoutExtractor;

    impl ContentExtractor for ShoutExtractor {
        fn name(&self) -> &str {
            "shout"
        }

        fn supports(&self, mime: &str) -> bool {
            mime == "application/x-shout"
        }

        fn extract(&self, bytes: &[u8]) -> Result<String> {
            Ok(String::from_utf8_lossy(bytes).to_uppercase())
        }
    }

    #[test]
    fn test_ensure_loaded_is_idempotent() {
        ensure_loaded();
        ensure_loaded();
        assert!(is_loaded());
        assert_eq!(extract_bytes(b"hello", None).unwrap(), "hello");
    }

    #[test]
    fn test_register_takes_priority() {
        register(Arc::new(ShoutExtractor));
        assert!(is_loaded());
        assert_eq!(
            extract_bytes(b"quiet", Some("application/x-shout; charset=utf-8")).unwrap(),
            "QUIET"
        );
    }

    #[test]
    fn test_register_replaces_same_name() {
        register(Arc::new(ShoutExtractor));
        register(Arc::new(ShoutExtractor));
        let names = registered_names();
        assert_eq!(names.iter().filter(|name| *name == "shout").count(), 1);
        assert!(names.iter().any(|name| name == "plain-text"));
    }

    #[test]
    fn test_unsupported_mime() {
        ensure_loaded();
        let err = extract_bytes(b"\x89PNG", Some("image/png")).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedMime(m) if m == "image/png"));
    }

    #[test]
    fn test_plain_text_rejects_binary() {
        assert!(PlainTextExtractor.extract(b"abc\0def").is_err());
        assert!(PlainTextExtractor.supports("application/json"));
        assert!(!PlainTextExtractor.supports("application/pdf"));
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Hello World".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(PlainTextExtractor.extract(&bytes).unwrap(), "Hello World");
    }

    #[test]
    fn test_decode_shift_jis() {
        let text = "日本語のテストです。これは日本語のテキストです。";
        let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode(text);
        assert_eq!(decode_text(&encoded), text);
    }

    #[test]
    fn test_html_extraction() {
        let html = HtmlExtractor::new().unwrap();
        let text = html
            .extract(
                b"<html><head><style>p { color: red }</style><script>var x = 1;</script></head>\
                  <body><h1>Apache&nbsp;License</h1><!-- hidden --><p>Tom &amp; Jerry</p></body></html>",
            )
            .unwrap();
        assert_eq!(text, "Apache License Tom & Jerry");
    }

    #[test]
    fn test_extract_file_missing() {
        ensure_loaded();
        let temp_dir = TempDir::new().unwrap();
        let err = extract_file(&temp_dir.path().join("missing.txt"), None).unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));

        let path = temp_dir.path().join("notes.txt");
        fs::write(&path, "apache license").unwrap();
        assert_eq!(extract_file(&path, Some("text/plain")).unwrap(), "apache license");
    }
}
