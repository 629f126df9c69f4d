use std::fs::FileType;
use std::path::Path;

pub const ARCHIVE_EXTENSIONS: [&str; 6] = ["jar", "ear", "war", "sar", "rar", "par"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Archive,
}

/// Decides which filesystem entries the walker looks at: directories are
/// always descended into, regular files only when their extension names a
/// Java archive.
#[derive(Debug, Clone)]
pub struct PathFilter {
    extensions: Vec<String>,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new(ARCHIVE_EXTENSIONS)
    }
}

impl PathFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Stats `path` (following symlinks) and accepts directories and archives.
    /// Entries that cannot be stat'ed are rejected.
    pub fn accept(&self, path: &Path) -> bool {
        match std::fs::metadata(path) {
            Ok(meta) => self.classify(path, meta.file_type()).is_some(),
            Err(_) => false,
        }
    }

    pub fn classify(&self, path: &Path, file_type: FileType) -> Option<EntryKind> {
        if file_type.is_dir() {
            return Some(EntryKind::Directory);
        }
        if file_type.is_file() && self.is_archive_name(path) {
            return Some(EntryKind::Archive);
        }
        None
    }

    pub fn is_archive_name(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}
