use regex::RegexBuilder;

use crate::error::{Result, ScanError};
use crate::index::ClassIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    /// Case-insensitive regex searched anywhere in the class name.
    Pattern(String),
    DuplicatesOnly,
}

/// Sorted class names containing a match for `pattern`. An empty pattern
/// matches every class.
pub fn matching(index: &ClassIndex, pattern: &str) -> Result<Vec<String>> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ScanError::PatternSyntax {
            pattern: pattern.to_string(),
            source,
        })?;

    let mut names: Vec<String> = index
        .class_names()
        .filter(|name| regex.is_match(name))
        .map(str::to_string)
        .collect();
    names.sort_unstable();
    Ok(names)
}

pub fn duplicates_only(index: &ClassIndex) -> Vec<String> {
    index.duplicates().into_iter().map(str::to_string).collect()
}

/// Runs queries against a finished index and remembers the last good result,
/// so a bad pattern leaves the previous answer in place.
#[derive(Debug, Default)]
pub struct QueryEngine {
    last: Vec<String>,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&mut self, index: &ClassIndex, mode: &QueryMode) -> Result<&[String]> {
        self.last = match mode {
            QueryMode::Pattern(pattern) => matching(index, pattern)?,
            QueryMode::DuplicatesOnly => duplicates_only(index),
        };
        Ok(&self.last)
    }

    pub fn results(&self) -> &[String] {
        &self.last
    }

    pub fn reset(&mut self) {
        self.last.clear();
    }
}
