//! Layered lookup of connection settings.
//!
//! Providers are queried in order and the first non-empty value wins:
//! command-line flag, then config file, then an environment variable whose
//! name is itself resolved from flag, then config file, then a default.

use std::collections::HashMap;

use tracing::debug;

use super::Config;
use crate::databricks::ConnectionSettings;

/// Connection settings that can be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    Token,
    Url,
    ClusterId,
}

impl Setting {
    pub const ALL: [Setting; 3] = [Setting::Token, Setting::Url, Setting::ClusterId];

    /// Flag and config-file key holding the value.
    pub fn key(self) -> &'static str {
        match self {
            Setting::Token => "databricks-token",
            Setting::Url => "databricks-url",
            Setting::ClusterId => "databricks-cluster-id",
        }
    }

    /// Flag and config-file key naming the environment variable to read.
    pub fn env_key(self) -> &'static str {
        match self {
            Setting::Token => "env-databricks-token",
            Setting::Url => "env-databricks-url",
            Setting::ClusterId => "env-databricks-cluster-id",
        }
    }

    /// Variables read when no name is configured, in order.
    pub fn default_env_vars(self) -> &'static [&'static str] {
        match self {
            Setting::Token => &["DATABRICKS_BEARER_TOKEN"],
            Setting::Url => &["DATABRICKS_URL"],
            // second name is the legacy plugin spelling
            Setting::ClusterId => &["DATABRICKS_CLUSTER_ID", "DATABRICkS_CLUSTER_ID"],
        }
    }
}

/// A source of setting values keyed by flag/config-file key.
pub trait SettingProvider {
    fn name(&self) -> &'static str;
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct FlagProvider {
    values: HashMap<String, String>,
}

impl FlagProvider {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<String>)>,
    {
        let values = pairs
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
            .collect();
        Self { values }
    }
}

impl SettingProvider for FlagProvider {
    fn name(&self) -> &'static str {
        "flag"
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Values from the rc/ini file.
#[derive(Debug, Clone, Default)]
pub struct FileProvider {
    config: Config,
}

impl FileProvider {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl SettingProvider for FileProvider {
    fn name(&self) -> &'static str {
        "config"
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.config.get(key)
    }
}

/// Values from environment variables; each setting key maps to the
/// variable names tried in order.
#[derive(Debug, Clone, Default)]
pub struct EnvProvider {
    names: HashMap<String, Vec<String>>,
    vars: HashMap<String, String>,
}

impl EnvProvider {
    pub fn from_vars(names: HashMap<String, Vec<String>>, vars: HashMap<String, String>) -> Self {
        Self { names, vars }
    }

    pub fn from_process(names: HashMap<String, Vec<String>>) -> Self {
        Self::from_vars(names, std::env::vars().collect())
    }

    /// Environment variables consulted for `key`.
    pub fn var_names(&self, key: &str) -> &[String] {
        self.names.get(key).map(Vec::as_slice).unwrap_or_default()
    }
}

impl SettingProvider for EnvProvider {
    fn name(&self) -> &'static str {
        "env"
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.var_names(key)
            .iter()
            .filter_map(|var| self.vars.get(var))
            .find(|v| !v.is_empty())
            .cloned()
    }
}

/// Ordered chain of providers.
#[derive(Default)]
pub struct Resolver {
    providers: Vec<Box<dyn SettingProvider>>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl SettingProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Flag > config file > environment, using the given variables.
    pub fn layered(flags: FlagProvider, file: FileProvider, vars: HashMap<String, String>) -> Self {
        let names = env_var_names(&flags, &file);
        Self::new()
            .with(flags)
            .with(file)
            .with(EnvProvider::from_vars(names, vars))
    }

    /// Flag > config file > process environment.
    pub fn from_process(flags: FlagProvider, file: FileProvider) -> Self {
        let names = env_var_names(&flags, &file);
        Self::new()
            .with(flags)
            .with(file)
            .with(EnvProvider::from_process(names))
    }

    /// First non-empty value for `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.providers.iter().find_map(|p| {
            let value = p.lookup(key).filter(|v| !v.is_empty())?;
            debug!(key, source = p.name(), "resolved setting");
            Some(value)
        })
    }

    pub fn resolve(&self, setting: Setting) -> Option<String> {
        self.get(setting.key())
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            token: self.resolve(Setting::Token),
            url: self.resolve(Setting::Url),
            cluster_id: self.resolve(Setting::ClusterId),
        }
    }
}

fn env_var_names(flags: &FlagProvider, file: &FileProvider) -> HashMap<String, Vec<String>> {
    Setting::ALL
        .iter()
        .map(|s| {
            let names = [flags.lookup(s.env_key()), file.lookup(s.env_key())]
                .into_iter()
                .flatten()
                .find(|v| !v.is_empty())
                .map(|name| vec![name])
                .unwrap_or_else(|| s.default_env_vars().iter().map(|v| v.to_string()).collect());
            (s.key().to_string(), names)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn flags(pairs: &[(&'static str, &str)]) -> FlagProvider {
        FlagProvider::from_pairs(pairs.iter().map(|(k, v)| (*k, Some(v.to_string()))))
    }

    fn file(text: &str) -> FileProvider {
        FileProvider::new(Config::parse(text))
    }

    #[test]
    fn flag_beats_config_and_env() {
        let r = Resolver::layered(
            flags(&[("databricks-url", "A")]),
            file("databricks-url = B"),
            vars(&[("DATABRICKS_URL", "C")]),
        );
        assert_eq!(r.resolve(Setting::Url).as_deref(), Some("A"));
    }

    #[test]
    fn config_beats_env() {
        let r = Resolver::layered(
            FlagProvider::default(),
            file("databricks-url = B"),
            vars(&[("DATABRICKS_URL", "C")]),
        );
        assert_eq!(r.resolve(Setting::Url).as_deref(), Some("B"));
    }

    #[test]
    fn env_used_when_nothing_else() {
        let r = Resolver::layered(FlagProvider::default(), file(""), vars(&[("DATABRICKS_URL", "C")]));
        assert_eq!(r.resolve(Setting::Url).as_deref(), Some("C"));
    }

    #[test]
    fn absent_when_unset() {
        let r = Resolver::layered(FlagProvider::default(), file(""), vars(&[]));
        assert_eq!(r.connection_settings(), ConnectionSettings::default());
    }

    #[test]
    fn empty_values_fall_through() {
        let r = Resolver::layered(
            flags(&[("databricks-token", "")]),
            file("databricks-token ="),
            vars(&[("DATABRICKS_BEARER_TOKEN", "secret")]),
        );
        assert_eq!(r.resolve(Setting::Token).as_deref(), Some("secret"));
    }

    #[test]
    fn env_var_name_from_flag_then_config() {
        let env = vars(&[("MY_TOKEN", "from-flag-var"), ("CFG_TOKEN", "from-cfg-var"), ("DATABRICKS_BEARER_TOKEN", "default")]);

        let r = Resolver::layered(
            flags(&[("env-databricks-token", "MY_TOKEN")]),
            file("env-databricks-token = CFG_TOKEN"),
            env.clone(),
        );
        assert_eq!(r.resolve(Setting::Token).as_deref(), Some("from-flag-var"));

        let r = Resolver::layered(FlagProvider::default(), file("env-databricks-token = CFG_TOKEN"), env.clone());
        assert_eq!(r.resolve(Setting::Token).as_deref(), Some("from-cfg-var"));

        let r = Resolver::layered(FlagProvider::default(), file(""), env);
        assert_eq!(r.resolve(Setting::Token).as_deref(), Some("default"));
    }

    #[test]
    fn renamed_variable_does_not_fall_back_to_default_name() {
        let r = Resolver::layered(
            flags(&[("env-databricks-cluster-id", "OTHER")]),
            file(""),
            vars(&[("DATABRICKS_CLUSTER_ID", "ignored")]),
        );
        assert_eq!(r.resolve(Setting::ClusterId), None);
    }

    #[test]
    fn legacy_cluster_id_variable_is_fallback() {
        let legacy = vars(&[("DATABRICkS_CLUSTER_ID", "legacy")]);
        let r = Resolver::layered(FlagProvider::default(), file(""), legacy);
        assert_eq!(r.resolve(Setting::ClusterId).as_deref(), Some("legacy"));

        let both = vars(&[("DATABRICKS_CLUSTER_ID", "current"), ("DATABRICkS_CLUSTER_ID", "legacy")]);
        let r = Resolver::layered(FlagProvider::default(), file(""), both);
        assert_eq!(r.resolve(Setting::ClusterId).as_deref(), Some("current"));
    }

    #[test]
    fn all_three_settings() {
        let r = Resolver::layered(
            flags(&[("databricks-cluster-id", "0101-abc")]),
            file("databricks-url = https://x"),
            vars(&[("DATABRICKS_BEARER_TOKEN", "t")]),
        );
        assert_eq!(
            r.connection_settings(),
            ConnectionSettings {
                token: Some("t".into()),
                url: Some("https://x".into()),
                cluster_id: Some("0101-abc".into()),
            }
        );
    }
}
