use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Class name to the archives containing it, in discovery order.
///
/// Every key owns at least one archive path and no path appears twice under
/// the same key. A scan fills a fresh index and hands it over whole; callers
/// only ever see a finished one.
#[derive(Debug, Clone, Default)]
pub struct ClassIndex {
    classes: HashMap<String, Vec<PathBuf>>,
}

impl ClassIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `archive` contains `class_name`. Returns `false` when the
    /// pair was already known.
    pub fn put(&mut self, class_name: &str, archive: &Path) -> bool {
        if let Some(paths) = self.classes.get_mut(class_name) {
            if paths.iter().any(|p| p == archive) {
                return false;
            }
            paths.push(archive.to_path_buf());
            return true;
        }

        self.classes
            .insert(class_name.to_string(), vec![archive.to_path_buf()]);
        true
    }

    /// Adds every class of one archive. Returns how many new pairs were recorded.
    pub fn extend_from_archive<I, S>(&mut self, archive: &Path, class_names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        class_names
            .into_iter()
            .filter(|name| self.put(name.as_ref(), archive))
            .count()
    }

    pub fn lookup(&self, class_name: &str) -> &[PathBuf] {
        self.classes
            .get(class_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    /// Classes found in more than one archive, sorted by name.
    pub fn duplicates(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .classes
            .iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn clear(&mut self) {
        self.classes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn put_appends_in_discovery_order_and_dedupes() {
        let mut index = ClassIndex::new();
        assert!(index.put("com.x.Foo", &p("/r/b.jar")));
        assert!(index.put("com.x.Foo", &p("/r/a.jar")));
        assert!(!index.put("com.x.Foo", &p("/r/b.jar")));

        assert_eq!(index.lookup("com.x.Foo"), &[p("/r/b.jar"), p("/r/a.jar")]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn lookup_of_unknown_class_is_empty() {
        let index = ClassIndex::new();
        assert!(index.lookup("com.x.Missing").is_empty());
        assert!(!index.contains("com.x.Missing"));
    }

    #[test]
    fn duplicates_requires_two_archives() {
        let mut index = ClassIndex::new();
        index.extend_from_archive(&p("/r/a.jar"), ["com.x.Foo", "com.x.Bar", "com.x.Baz"]);
        index.extend_from_archive(&p("/r/b.jar"), ["com.x.Foo", "com.x.Baz"]);
        index.extend_from_archive(&p("/r/c.jar"), ["com.x.Qux", "com.x.Qux"]);

        assert_eq!(index.duplicates(), vec!["com.x.Baz", "com.x.Foo"]);
        assert_eq!(index.lookup("com.x.Qux"), &[p("/r/c.jar")]);
    }

    #[test]
    fn empty_index_has_no_duplicates() {
        assert!(ClassIndex::new().duplicates().is_empty());
    }

    #[test]
    fn extend_counts_only_new_pairs() {
        let mut index = ClassIndex::new();
        let added = index.extend_from_archive(&p("/r/a.jar"), ["a.A", "a.B", "a.A"]);
        assert_eq!(added, 2);
    }

    #[test]
    fn clear_discards_everything() {
        let mut index = ClassIndex::new();
        index.put("a.A", &p("/r/a.jar"));
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.class_names().count(), 0);
    }
}
