use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::filter::{ARCHIVE_EXTENSIONS, PathFilter};

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub extensions: Vec<String>,
    pub follow_links: bool,
    /// Visit directory children by file name rather than in enumeration order.
    pub sort_entries: bool,
    pub include_inner_classes: bool,
    /// Archives read concurrently. 1 keeps the whole scan on the worker thread.
    pub threads: usize,
    pub max_depth: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: ARCHIVE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            follow_links: true,
            sort_entries: true,
            include_inner_classes: true,
            threads: 1,
            max_depth: None,
        }
    }
}

impl ScanConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            follow_links: !cli.no_follow_links,
            sort_entries: !cli.no_sort,
            include_inner_classes: !cli.top_level_only,
            threads: cli.threads.max(1),
            ..Self::default()
        }
    }

    pub fn path_filter(&self) -> PathFilter {
        PathFilter::new(&self.extensions)
    }
}

/// Settings remembered between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub last_root: Option<PathBuf>,
}

impl Preferences {
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read preferences: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse preferences: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        std::fs::write(path, payload)
            .with_context(|| format!("Failed to write preferences: {}", path.display()))
    }
}

pub fn resolve_prefs_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.prefs.clone() {
        return Ok(p);
    }
    Ok(classist_home()?.join("preferences.json"))
}

/// `--root`, else the last scanned directory, else the home directory.
pub fn resolve_root(cli: &Cli, prefs: &Preferences) -> Result<PathBuf> {
    if let Some(p) = cli.root.clone() {
        return Ok(p);
    }
    if let Some(p) = prefs.last_root.clone() {
        return Ok(p);
    }
    dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Failed to resolve home directory"))
}

fn classist_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::config_dir)
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve data directory"))?;
    Ok(base.join("classist"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "classist_config_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ))
    }

    #[test]
    fn preferences_round_trip_through_nested_directory() -> Result<()> {
        let base = temp_path("prefs");
        let path = base.join("nested").join("preferences.json");

        assert_eq!(Preferences::load(&path)?, Preferences::default());

        let prefs = Preferences {
            last_root: Some(PathBuf::from("/opt/app/lib")),
        };
        prefs.save(&path)?;
        assert_eq!(Preferences::load(&path)?, prefs);

        std::fs::remove_dir_all(base)?;
        Ok(())
    }

    #[test]
    fn corrupt_preferences_are_an_error() -> Result<()> {
        let path = temp_path("corrupt.json");
        std::fs::write(&path, "{ not json")?;
        assert!(Preferences::load(&path).is_err());
        std::fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn root_prefers_flag_then_last_used() -> Result<()> {
        let prefs = Preferences {
            last_root: Some(PathBuf::from("/last")),
        };

        let cli = Cli::parse_from(["classist", "--root", "/flag", "stats"]);
        assert_eq!(resolve_root(&cli, &prefs)?, PathBuf::from("/flag"));

        let cli = Cli::parse_from(["classist", "stats"]);
        assert_eq!(resolve_root(&cli, &prefs)?, PathBuf::from("/last"));
        Ok(())
    }

    #[test]
    fn scan_config_follows_cli_flags() {
        let cli = Cli::parse_from([
            "classist",
            "--threads",
            "0",
            "--no-sort",
            "--top-level-only",
            "--no-follow-links",
            "duplicates",
        ]);
        let config = ScanConfig::from_cli(&cli);
        assert_eq!(config.threads, 1);
        assert!(!config.sort_entries);
        assert!(!config.include_inner_classes);
        assert!(!config.follow_links);
        assert_eq!(config.extensions.len(), ARCHIVE_EXTENSIONS.len());
    }
}
