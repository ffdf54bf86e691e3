use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use directories::BaseDirs;

pub mod resolve;

pub use resolve::{EnvProvider, FileProvider, FlagProvider, Resolver, Setting, SettingProvider};

/// Settings read from a `.dbtestrc` file.
///
/// One `key = value` per line. Blank lines, `#`/`;` comments and `[section]`
/// headers are skipped, so a plain ini file with a single section works too.
#[derive(Debug, Clone, Default)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: Option<PathBuf>,
}

impl Config {
    /// Load the default rc file, or an empty config if there is none.
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file: {}", path.display()))?;
        let mut cfg = Self::parse(&text);
        cfg.config_path = Some(path.to_path_buf());
        Ok(cfg)
    }

    pub fn parse(text: &str) -> Self {
        let mut map = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') || line.starts_with('[') {
                continue;
            }
            if let Some((k, v)) = line.split_once('=') {
                map.insert(k.trim().to_string(), v.trim().to_string());
            }
        }
        Self { inner: map, config_path: None }
    }

    /// Value for `key`; empty values count as unset.
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).filter(|v| !v.is_empty()).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| {
            let v = v.to_ascii_lowercase();
            matches!(v.as_str(), "true" | "1" | "yes" | "on")
        })
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    pub fn get_secs(&self, key: &str) -> Option<Duration> {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|b| b.config_dir().join("dbtest").join(".dbtestrc"))
}
