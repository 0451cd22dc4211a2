//! File discovery for seeding a local deployment from a directory.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::DeploymentConfig;

/// Discovers image files in directories.
pub struct FileDiscovery {
    supported_formats: Vec<String>,
}

/// Information about a discovered file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// Object key: the path relative to the discovery root, `/`-separated
    pub key: String,
    /// File size in bytes
    pub size: u64,
}

impl FileDiscovery {
    pub fn new(config: &DeploymentConfig) -> Self {
        Self {
            supported_formats: config.supported_formats.clone(),
        }
    }

    /// Discover all supported image files at a path.
    ///
    /// If path is a file, returns it if supported, keyed by its file name.
    /// If path is a directory, recursively finds all supported files.
    pub fn discover(&self, path: &Path) -> Vec<DiscoveredFile> {
        if path.is_file() {
            if self.is_supported(path) {
                if let (Ok(meta), Some(name)) = (std::fs::metadata(path), path.file_name()) {
                    return vec![DiscoveredFile {
                        path: path.to_path_buf(),
                        key: name.to_string_lossy().into_owned(),
                        size: meta.len(),
                    }];
                }
            }
            return vec![];
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let entry_path = entry.path();
            if !entry_path.is_file() || !self.is_supported(entry_path) {
                continue;
            }
            let Some(key) = object_key(path, entry_path) else {
                continue;
            };
            if let Ok(meta) = entry.metadata() {
                files.push(DiscoveredFile {
                    path: entry_path.to_path_buf(),
                    key,
                    size: meta.len(),
                });
            }
        }

        // Sort by key for deterministic upload order
        files.sort_by(|a, b| a.key.cmp(&b.key));
        files
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext_lower = ext.to_lowercase();
                self.supported_formats
                    .iter()
                    .any(|fmt| fmt.to_lowercase() == ext_lower)
            })
            .unwrap_or(false)
    }

    pub fn total_size(files: &[DiscoveredFile]) -> u64 {
        files.iter().map(|f| f.size).sum()
    }
}

fn object_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery() -> FileDiscovery {
        FileDiscovery::new(&DeploymentConfig::default())
    }

    #[test]
    fn test_is_supported() {
        let discovery = discovery();

        assert!(discovery.is_supported(Path::new("test.jpg")));
        assert!(discovery.is_supported(Path::new("test.JPG")));
        assert!(discovery.is_supported(Path::new("test.png")));
        assert!(discovery.is_supported(Path::new("test.webp")));
        assert!(!discovery.is_supported(Path::new("test.txt")));
        assert!(!discovery.is_supported(Path::new("README")));
    }

    #[test]
    fn test_discover_keys_are_relative() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("trips/2024")).unwrap();
        std::fs::write(dir.path().join("b.png"), [0u8; 4]).unwrap();
        std::fs::write(dir.path().join("trips/2024/a.jpg"), [0u8; 6]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();

        let files = discovery().discover(dir.path());
        let keys: Vec<_> = files.iter().map(|f| f.key.as_str()).collect();

        assert_eq!(keys, vec!["b.png", "trips/2024/a.jpg"]);
        assert_eq!(FileDiscovery::total_size(&files), 10);
    }

    #[test]
    fn test_discover_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, [0u8; 3]).unwrap();

        let files = discovery().discover(&path);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].key, "photo.jpg");
    }
}
