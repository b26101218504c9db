//! Configuration management for progressive_search
//!
//! Two layers: [`IndexConfig`], the immutable value consumed once when an index
//! is created, and [`Config`], the TOML file that carries it alongside storage,
//! search, discovery and logging settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::index::SearchOptions;
use crate::search::FileDiscoveryConfig;

/// Kind of index structure to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexVariant {
    /// Unspecified; analysed like `Inverted`
    Unknown,
    /// Maps terms to documents
    #[default]
    Inverted,
    /// Maps documents to term vectors, for similarity searches
    Vector,
    /// Both capabilities
    InvertedAndVector,
}

impl IndexVariant {
    /// Whether similarity (vector) ranking is available
    pub fn has_vector(&self) -> bool {
        matches!(self, IndexVariant::Vector | IndexVariant::InvertedAndVector)
    }

    /// Whether every query is answered by similarity ranking
    pub fn is_vector_only(&self) -> bool {
        matches!(self, IndexVariant::Vector)
    }
}

/// Case-insensitive set of words that are never indexed or matched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopWordSet(BTreeSet<String>);

impl StopWordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, word: &str) -> bool {
        if word.chars().any(char::is_uppercase) {
            self.0.contains(&word.to_lowercase())
        } else {
            self.0.contains(word)
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Words in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for StopWordSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        )
    }
}

/// Immutable creation parameters for an index.
///
/// Built once and consumed when the engine is created; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IndexSettings", into = "IndexSettings")]
pub struct IndexConfig {
    variant: IndexVariant,
    proximity_indexing: bool,
    stop_words: StopWordSet,
    min_term_length: usize,
}

impl IndexConfig {
    /// `min_term_length` is clamped to at least 1.
    pub fn new(
        variant: IndexVariant,
        proximity_indexing: bool,
        stop_words: StopWordSet,
        min_term_length: usize,
    ) -> Self {
        Self {
            variant,
            proximity_indexing,
            stop_words,
            min_term_length: min_term_length.max(1),
        }
    }

    pub fn variant(&self) -> IndexVariant {
        self.variant
    }

    pub fn proximity_indexing(&self) -> bool {
        self.proximity_indexing
    }

    pub fn stop_words(&self) -> &StopWordSet {
        &self.stop_words
    }

    pub fn min_term_length(&self) -> usize {
        self.min_term_length
    }

    /// Digest of the analysis-relevant settings.
    /// Stored with persisted indexes to detect that they were built differently.
    pub fn fingerprint(&self) -> String {
        let stop_words: Vec<&str> = self.stop_words.iter().collect();
        let config_str = format!(
            "variant:{:?}|proximity:{}|stop_words:{:?}|min_term_length:{}",
            self.variant, self.proximity_indexing, stop_words, self.min_term_length
        );
        format!("{:x}", md5::compute(config_str.as_bytes()))
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(IndexVariant::Inverted, false, StopWordSet::new(), 1)
    }
}

/// `[index]` section; also the serialized form of [`IndexConfig`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Index structure to build (default: inverted)
    #[serde(default)]
    pub variant: IndexVariant,

    /// Record word positions so phrase queries require adjacency
    #[serde(default)]
    pub proximity_indexing: bool,

    /// Words that are never indexed
    #[serde(default)]
    pub stop_words: Vec<String>,

    /// Shortest word (in characters) that gets indexed
    #[serde(default = "default_min_term_length")]
    pub min_term_length: usize,
}

fn default_min_term_length() -> usize {
    1
}

impl Default for IndexSettings {
    fn default() -> Self {
        IndexConfig::default().into()
    }
}

impl From<IndexSettings> for IndexConfig {
    fn from(settings: IndexSettings) -> Self {
        IndexConfig::new(
            settings.variant,
            settings.proximity_indexing,
            settings.stop_words.into_iter().collect(),
            settings.min_term_length,
        )
    }
}

impl From<IndexConfig> for IndexSettings {
    fn from(config: IndexConfig) -> Self {
        Self {
            variant: config.variant,
            proximity_indexing: config.proximity_indexing,
            stop_words: config.stop_words.iter().map(str::to_string).collect(),
            min_term_length: config.min_term_length,
        }
    }
}

/// Where the index lives
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Index file location; absent means an in-memory index
    #[serde(default)]
    pub path: Option<String>,
}

/// Defaults applied to progressive searches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Results requested per `next` call
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Time budget per `next` call, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Treat whitespace between query terms as OR instead of AND
    #[serde(default)]
    pub space_means_or: bool,

    /// Skip relevance scoring; results come back in document order
    #[serde(default)]
    pub no_relevance_scores: bool,
}

fn default_limit() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    1000
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_timeout_ms: default_timeout_ms(),
            space_means_or: false,
            no_relevance_scores: false,
        }
    }
}

impl SearchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn options(&self) -> SearchOptions {
        SearchOptions {
            space_means_or: self.space_means_or,
            no_relevance_scores: self.no_relevance_scores,
            find_similar: false,
        }
    }
}

/// Folder-indexing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Path substrings to skip while walking folders
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Files larger than this are skipped (default 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: Option<u64>,

    /// Follow symbolic links while walking
    #[serde(default = "default_true")]
    pub follow_links: bool,
}

fn default_max_file_size() -> Option<u64> {
    Some(10 * 1024 * 1024) // 10MB
}

fn default_true() -> bool {
    true
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            exclude_patterns: Vec::new(),
            max_file_size: default_max_file_size(),
            follow_links: true,
        }
    }
}

impl DiscoverySettings {
    pub fn to_discovery_config(&self) -> FileDiscoveryConfig {
        FileDiscoveryConfig {
            exclude_patterns: self.exclude_patterns.clone(),
            max_file_size: self.max_file_size,
            follow_links: self.follow_links,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level for console output (RUST_LOG takes precedence)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Apply environment variable overrides.
    /// PROGRESSIVE_SEARCH_LOG takes precedence over the TOML value.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("PROGRESSIVE_SEARCH_LOG") {
            if !val.is_empty() {
                self.level = val;
            }
        }
        self
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub discovery: DiscoverySettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from default locations
    ///
    /// Search order:
    /// 1. PROGRESSIVE_SEARCH_CONFIG environment variable
    /// 2. ./progressive_search.toml (current directory)
    /// 3. ~/.config/progressive_search/config.toml (user config)
    pub fn from_default_locations() -> Result<Option<(Self, PathBuf)>> {
        if let Ok(env_path) = std::env::var("PROGRESSIVE_SEARCH_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                let config = Self::from_file(&path)?;
                return Ok(Some((config, path)));
            }
        }

        let local_path = PathBuf::from("progressive_search.toml");
        if local_path.exists() {
            let config = Self::from_file(&local_path)?;
            return Ok(Some((config, local_path)));
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_path = config_dir.join("progressive_search").join("config.toml");
            if user_path.exists() {
                let config = Self::from_file(&user_path)?;
                return Ok(Some((config, user_path)));
            }
        }

        Ok(None)
    }

    /// The immutable index creation parameters described by `[index]`
    pub fn index_config(&self) -> IndexConfig {
        self.index.clone().into()
    }

    /// Generate a template configuration file
    pub fn generate_template() -> String {
        r#"# progressive_search configuration
# Generated template - customize as needed

[index]
# Index structure: "inverted", "vector" or "inverted_and_vector"
variant = "inverted"

# Record word positions so quoted phrases must appear adjacently
proximity_indexing = false

# Words that are never indexed or matched
stop_words = []

# Shortest word (in characters) that gets indexed
min_term_length = 1

[storage]
# Index file location. Leave unset for an in-memory index.
# path = "/var/lib/progressive_search/index.bin"

[search]
# Results requested per progressive batch
default_limit = 10

# Time budget per batch in milliseconds
default_timeout_ms = 1000

# Treat whitespace between terms as OR instead of AND
space_means_or = false

# Skip relevance scoring (results in document order, score 0)
no_relevance_scores = false

[discovery]
# Path substrings skipped while indexing folders
exclude_patterns = []

# Maximum file size to index in bytes (default: 10MB)
max_file_size = 10485760

# Follow symbolic links while walking folders
follow_links = true

[logging]
# Console log level; RUST_LOG and PROGRESSIVE_SEARCH_LOG override it
level = "info"
"#
        .to_string()
    }

    /// Write template config to the specified path
    pub fn write_template(path: &Path) -> Result<()> {
        let template = Self::generate_template();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, template)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.search.timeout(), Duration::from_secs(1));
        assert!(config.storage.path.is_none());
        assert_eq!(config.index_config(), IndexConfig::default());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[index]
variant = "inverted_and_vector"
stop_words = ["The", "a"]
min_term_length = 0

[storage]
path = "/tmp/idx.bin"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let index = config.index_config();
        assert_eq!(index.variant(), IndexVariant::InvertedAndVector);
        assert!(index.stop_words().contains("the"));
        assert!(index.stop_words().contains("THE"));
        assert_eq!(index.min_term_length(), 1);
        assert_eq!(config.storage.path.as_deref(), Some("/tmp/idx.bin"));
    }

    #[test]
    fn test_generate_template_parses() {
        let template = Config::generate_template();
        assert!(template.contains("[index]"));
        let config: Config = toml::from_str(&template).unwrap();
        assert_eq!(config.index.variant, IndexVariant::Inverted);
        assert_eq!(config.discovery.max_file_size, Some(10 * 1024 * 1024));
    }

    #[test]
    fn test_write_template_then_load_from_env() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/progressive_search.toml");
        Config::write_template(&path).unwrap();

        let written = Config::from_file(&path).unwrap();
        assert_eq!(written.index_config(), IndexConfig::default());
        assert_eq!(written.search.default_limit, 10);

        let edited = std::fs::read_to_string(&path)
            .unwrap()
            .replace("default_limit = 10", "default_limit = 25");
        std::fs::write(&path, edited).unwrap();

        std::env::set_var("PROGRESSIVE_SEARCH_CONFIG", &path);
        let loaded = Config::from_default_locations();
        std::env::remove_var("PROGRESSIVE_SEARCH_CONFIG");

        let (config, found) = loaded.unwrap().unwrap();
        assert_eq!(found, path);
        assert_eq!(config.search.default_limit, 25);
    }

    #[test]
    fn test_fingerprint_ignores_stop_word_order_and_case() {
        let a = IndexConfig::new(
            IndexVariant::Inverted,
            false,
            ["the", "and"].into_iter().collect(),
            2,
        );
        let b = IndexConfig::new(
            IndexVariant::Inverted,
            false,
            ["AND", "the"].into_iter().collect(),
            2,
        );
        let c = IndexConfig::new(IndexVariant::Inverted, true, StopWordSet::new(), 2);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_discovery_settings_defaults() {
        let discovery = DiscoverySettings::default().to_discovery_config();
        assert_eq!(discovery, FileDiscoveryConfig::default());
        assert!(Config::default().search.options() == SearchOptions::default());
    }

    #[test]
    fn test_variant_capabilities() {
        assert!(!IndexVariant::Inverted.has_vector());
        assert!(IndexVariant::InvertedAndVector.has_vector());
        assert!(IndexVariant::Vector.is_vector_only());
        assert!(!IndexVariant::Unknown.has_vector());
    }
}
