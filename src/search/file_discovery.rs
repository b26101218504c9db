//! Recursive file enumeration for folder indexing.
//!
//! Walks a directory tree and yields regular files, honouring exclude
//! patterns and a size limit.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Configuration for file discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiscoveryConfig {
    /// Patterns to exclude (matched as substrings of the path).
    /// Common patterns: "**/node_modules/**", "**/target/**", "**/.git/**"
    pub exclude_patterns: Vec<String>,

    /// Maximum file size to include (in bytes). Files larger than this are skipped.
    pub max_file_size: Option<u64>,

    /// Follow symbolic links while walking.
    pub follow_links: bool,
}

impl Default for FileDiscoveryConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: Vec::new(),
            max_file_size: Some(10 * 1024 * 1024), // 10MB
            follow_links: true,
        }
    }
}

impl FileDiscoveryConfig {
    /// Every regular file, whatever its size
    pub fn unlimited() -> Self {
        Self {
            max_file_size: None,
            ..Default::default()
        }
    }

    pub fn with_excludes(exclude_patterns: Vec<String>) -> Self {
        Self {
            exclude_patterns,
            ..Default::default()
        }
    }

    /// Strips leading/trailing wildcards and slashes for substring matching.
    fn compile_exclude_patterns(&self) -> Vec<String> {
        self.exclude_patterns
            .iter()
            .map(|p| p.trim_matches('*').trim_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

/// Iterator over discovered files matching the configuration criteria.
pub struct FileDiscoveryIterator {
    walker: Option<walkdir::IntoIter>,
    exclude_patterns: Vec<String>,
    max_file_size: Option<u64>,
}

impl FileDiscoveryIterator {
    pub fn new(root: &Path, config: &FileDiscoveryConfig) -> Self {
        let walker = if root.is_dir() {
            Some(WalkDir::new(root).follow_links(config.follow_links).into_iter())
        } else {
            tracing::debug!(path = %root.display(), "Not a directory, nothing to enumerate");
            None
        };

        Self {
            walker,
            exclude_patterns: config.compile_exclude_patterns(),
            max_file_size: config.max_file_size,
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.exclude_patterns
            .iter()
            .any(|pattern| path_str.contains(pattern.as_str()))
    }

    fn exceeds_size_limit(&self, entry: &walkdir::DirEntry) -> bool {
        match (self.max_file_size, entry.metadata()) {
            (Some(max_size), Ok(metadata)) => metadata.len() > max_size,
            _ => false,
        }
    }
}

impl Iterator for FileDiscoveryIterator {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.walker.as_mut()?.next()? {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if self.is_excluded(path) {
                        continue;
                    }

                    if self.exceeds_size_limit(&entry) {
                        tracing::debug!(
                            path = %path.display(),
                            "Skipping file exceeding size limit"
                        );
                        continue;
                    }

                    return Some(entry.into_path());
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Error walking directory");
                }
            }
        }
    }
}

/// Every regular file under `dir`, recursively. Empty when `dir` is not a
/// directory.
pub fn list_all_files(dir: &Path, config: &FileDiscoveryConfig) -> FileDiscoveryIterator {
    FileDiscoveryIterator::new(dir, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_files(dir: &TempDir) -> Vec<PathBuf> {
        let files = vec![
            dir.path().join("docs/guide.txt"),
            dir.path().join("docs/api/index.html"),
            dir.path().join("notes/todo.md"),
            dir.path().join("node_modules/pkg/index.js"),
            dir.path().join("target/debug/binary"),
            dir.path().join("image.png"),
            dir.path().join("README.md"),
        ];

        for file in &files {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(file, "test content").unwrap();
        }

        files
    }

    fn names(discovered: &[PathBuf]) -> Vec<String> {
        let mut names: Vec<_> = discovered
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_file_discovery_basic() {
        let temp_dir = TempDir::new().unwrap();
        create_test_files(&temp_dir);

        let config = FileDiscoveryConfig::with_excludes(vec![
            "**/node_modules/**".to_string(),
            "**/target/**".to_string(),
        ]);
        let discovered: Vec<PathBuf> = list_all_files(temp_dir.path(), &config).collect();

        assert_eq!(
            names(&discovered),
            vec!["README.md", "guide.txt", "image.png", "index.html", "todo.md"]
        );
    }

    #[test]
    fn test_file_discovery_files_only() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("empty/nested")).unwrap();
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();

        let discovered: Vec<PathBuf> =
            list_all_files(temp_dir.path(), &FileDiscoveryConfig::default()).collect();
        assert_eq!(names(&discovered), vec!["a.txt"]);
    }

    #[test]
    fn test_file_discovery_size_limit() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("small.txt"), "tiny").unwrap();
        fs::write(temp_dir.path().join("large.txt"), "x".repeat(2048)).unwrap();

        let config = FileDiscoveryConfig {
            max_file_size: Some(1024),
            ..Default::default()
        };
        let discovered: Vec<PathBuf> = list_all_files(temp_dir.path(), &config).collect();
        assert_eq!(names(&discovered), vec!["small.txt"]);
    }

    #[test]
    fn test_file_discovery_unlimited_keeps_large_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("large.txt"), "x".repeat(2048)).unwrap();

        let config = FileDiscoveryConfig::unlimited();
        assert_eq!(config.max_file_size, None);
        assert!(config.follow_links);
        let discovered: Vec<PathBuf> = list_all_files(temp_dir.path(), &config).collect();
        assert_eq!(names(&discovered), vec!["large.txt"]);
    }

    #[test]
    fn test_file_discovery_not_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain.txt");
        fs::write(&file, "content").unwrap();

        assert_eq!(list_all_files(&file, &FileDiscoveryConfig::default()).count(), 0);
        let missing = Path::new("/nonexistent/path/that/does/not/exist");
        assert_eq!(list_all_files(missing, &FileDiscoveryConfig::default()).count(), 0);
    }
}
