use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Extensions indexed by a directory walk unless the request overrides them
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "md", "txt", "py", "go", "js", "ts", "json", "yaml", "yml", "rs", "toml",
];

/// Dependency and build caches that never hold user content
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "__pycache__",
    "target",
    "venv",
    "dist",
    "build",
];

/// Directory-walk filter settings, the `[index]` table of the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub extensions: Vec<String>,
    pub excluded_dirs: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Decides which directory entries a walk visits.
///
/// Dot-prefixed names are hidden and always skipped. Directories named in the
/// exclusion list are skipped without descending. Files must carry an
/// allow-listed extension (case-insensitive).
#[derive(Debug, Clone)]
pub struct FileFilter {
    extensions: HashSet<String>,
    excluded_dirs: HashSet<String>,
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

impl FileFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            extensions: config
                .extensions
                .iter()
                .map(|e| normalize_extension(e))
                .filter(|e| !e.is_empty())
                .collect(),
            excluded_dirs: config.excluded_dirs.iter().cloned().collect(),
        }
    }

    /// Same exclusions, different extension allow-list. Leading dots are optional.
    pub fn with_extensions<S: AsRef<str>>(&self, extensions: &[S]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
            excluded_dirs: self.excluded_dirs.clone(),
        }
    }

    pub fn is_hidden(name: &str) -> bool {
        name.starts_with('.')
    }

    /// Whether a walk should descend into a directory called `name`
    pub fn allows_dir(&self, name: &str) -> bool {
        !Self::is_hidden(name) && !self.excluded_dirs.contains(name)
    }

    /// Whether a walk should index the file at `path`
    pub fn allows_file(&self, path: &Path) -> bool {
        let visible = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| !Self::is_hidden(n));

        visible
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| self.extensions.contains(&e.to_lowercase()))
    }
}
