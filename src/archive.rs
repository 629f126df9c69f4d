use memmap2::Mmap;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::error::{Result, ScanError};

pub const CLASS_SUFFIX: &str = ".class";

/// Lazily yields the fully-qualified class names stored in one archive.
///
/// The archive mapping is dropped as soon as the entries are exhausted or an
/// entry fails to read; iterating again needs a fresh [`ClassNames::open`].
pub struct ClassNames {
    path: PathBuf,
    archive: Option<ZipArchive<Cursor<Mmap>>>,
    next: usize,
    include_inner: bool,
}

impl ClassNames {
    pub fn open(path: &Path, include_inner: bool) -> Result<Self> {
        let file = File::open(path).map_err(|e| ScanError::archive(path, e))?;
        // SAFETY: The file is opened read-only and the mapping is owned by the
        // archive cursor, which never outlives this iterator.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ScanError::archive(path, e))?;
        let archive =
            ZipArchive::new(Cursor::new(mmap)).map_err(|e| ScanError::archive(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            archive: Some(archive),
            next: 0,
            include_inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_count(&self) -> usize {
        self.archive.as_ref().map_or(0, ZipArchive::len)
    }
}

impl Iterator for ClassNames {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let archive = self.archive.as_mut()?;
            if self.next >= archive.len() {
                self.archive = None;
                return None;
            }

            let index = self.next;
            self.next += 1;

            let include_inner = self.include_inner;
            let read = archive
                .by_index(index)
                .map(|entry| class_name_from_entry(entry.name(), include_inner));

            match read {
                Ok(Some(class_name)) => return Some(Ok(class_name)),
                Ok(None) => {}
                Err(e) => {
                    self.archive = None;
                    return Some(Err(ScanError::archive(&self.path, e)));
                }
            }
        }
    }
}

/// Reads every class name of an archive, or nothing at all if any part of it
/// is unreadable.
pub fn read_class_names(path: &Path, include_inner: bool) -> Result<Vec<String>> {
    ClassNames::open(path, include_inner)?.collect()
}

/// `com/x/Foo.class` becomes `com.x.Foo`; anything that is not a class file,
/// or a bare `.class` with no name, yields `None`.
pub fn class_name_from_entry(entry_name: &str, include_inner: bool) -> Option<String> {
    let stem = entry_name.strip_suffix(CLASS_SUFFIX)?;
    if stem.is_empty() || stem.ends_with(['/', '\\']) {
        return None;
    }
    if !include_inner && stem.contains('$') {
        return None;
    }
    Some(stem.replace(['/', '\\'], "."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};
    use zip::write::{FileOptions, ZipWriter};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_jar_path() -> PathBuf {
        let mut p = std::env::temp_dir();
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        p.push(format!(
            "classist-archive-{}-{}-{}.jar",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_millis(),
            n
        ));
        p
    }

    fn write_jar(path: &Path, entries: &[&str]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        for name in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, FileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, FileOptions::default()).unwrap();
                zip.write_all(b"dummy").unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn class_name_from_entry_strips_suffix_once() {
        assert_eq!(
            class_name_from_entry("com/x/Foo.class", true).as_deref(),
            Some("com.x.Foo")
        );
        assert_eq!(
            class_name_from_entry("com/x/class/Foo.class", true).as_deref(),
            Some("com.x.class.Foo")
        );
        assert_eq!(
            class_name_from_entry("Top.class", true).as_deref(),
            Some("Top")
        );
        assert_eq!(class_name_from_entry("META-INF/MANIFEST.MF", true), None);
        assert_eq!(class_name_from_entry("com/x/", true), None);
        assert_eq!(class_name_from_entry(".class", true), None);
        assert_eq!(class_name_from_entry("com/x/.class", true), None);
    }

    #[test]
    fn inner_classes_are_optional() {
        assert_eq!(
            class_name_from_entry("a/Outer$Inner.class", true).as_deref(),
            Some("a.Outer$Inner")
        );
        assert_eq!(class_name_from_entry("a/Outer$Inner.class", false), None);
    }

    #[test]
    fn reads_only_class_entries_in_archive_order() {
        let jar = temp_jar_path();
        write_jar(
            &jar,
            &[
                "META-INF/",
                "META-INF/MANIFEST.MF",
                "com/",
                "com/x/Foo.class",
                "com/x/logback.xml",
                "com/x/Bar.class",
            ],
        );

        let names = read_class_names(&jar, true).unwrap();
        assert_eq!(names, vec!["com.x.Foo", "com.x.Bar"]);

        let _ = fs::remove_file(&jar);
    }

    #[test]
    fn iterator_releases_archive_when_exhausted() {
        let jar = temp_jar_path();
        write_jar(&jar, &["a/A.class"]);

        let mut names = ClassNames::open(&jar, true).unwrap();
        assert_eq!(names.entry_count(), 1);
        assert_eq!(names.next().unwrap().unwrap(), "a.A");
        assert!(names.next().is_none());
        assert_eq!(names.entry_count(), 0);
        assert!(names.next().is_none());

        let _ = fs::remove_file(&jar);
    }

    #[test]
    fn corrupt_archive_is_an_open_error() {
        let jar = temp_jar_path();
        fs::write(&jar, b"this is not a zip file").unwrap();

        let err = read_class_names(&jar, true).unwrap_err();
        match err {
            ScanError::ArchiveOpen { path, .. } => assert_eq!(path, jar),
            other => panic!("unexpected error: {other:?}"),
        }

        let _ = fs::remove_file(&jar);
    }

    #[test]
    fn empty_file_is_an_open_error() {
        let jar = temp_jar_path();
        fs::write(&jar, b"").unwrap();

        assert!(matches!(
            ClassNames::open(&jar, true),
            Err(ScanError::ArchiveOpen { .. })
        ));

        let _ = fs::remove_file(&jar);
    }

    /// Breaks the local header signature of the `nth` entry while leaving the
    /// central directory intact, so the archive opens but that entry cannot be read.
    fn corrupt_local_header(path: &Path, nth: usize) {
        let mut bytes = fs::read(path).unwrap();
        let offset = bytes
            .windows(4)
            .enumerate()
            .filter(|(_, w)| *w == b"PK\x03\x04")
            .map(|(i, _)| i)
            .nth(nth)
            .unwrap();
        bytes[offset + 2] = 0;
        bytes[offset + 3] = 0;
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn unreadable_entry_ends_iteration_with_error() {
        let jar = temp_jar_path();
        write_jar(&jar, &["a/A.class", "a/B.class", "a/C.class"]);
        corrupt_local_header(&jar, 1);

        let mut names = ClassNames::open(&jar, true).unwrap();
        assert_eq!(names.next().unwrap().unwrap(), "a.A");
        match names.next() {
            Some(Err(ScanError::ArchiveOpen { path, .. })) => assert_eq!(path, jar),
            other => panic!("unexpected item: {other:?}"),
        }
        assert!(names.next().is_none());
        assert_eq!(names.entry_count(), 0);

        assert!(matches!(
            read_class_names(&jar, true),
            Err(ScanError::ArchiveOpen { .. })
        ));

        let _ = fs::remove_file(&jar);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let jar = temp_jar_path();
        assert!(matches!(
            read_class_names(&jar, true),
            Err(ScanError::ArchiveOpen { .. })
        ));
    }
}
