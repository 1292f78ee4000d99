use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::trace;

use crate::error::ConfigError;
use crate::pipeline::RunOptions;
use crate::target::Target;

/// Default config filename
pub const CONFIG: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: Storage,
    #[serde(default)]
    pub alerts: Alerts,
    #[serde(default)]
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    pub csv_path: PathBuf,
    #[serde(default = "default_unique_key")]
    pub unique_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Alerts {
    #[serde(default)]
    pub enabled: bool,
}

fn default_unique_key() -> String {
    "link".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        trace!("Loading from {:?}", path);
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::parse(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if cfg.targets.is_empty() {
            return Err(ConfigError::NoTargets(path.to_path_buf()));
        }
        Ok(cfg)
    }

    pub fn parse(data: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(data)
    }

    pub fn run_options(&self, alerts_enabled: bool) -> RunOptions {
        RunOptions {
            csv_path: self.storage.csv_path.clone(),
            unique_key: self.storage.unique_key.clone(),
            alerts_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    const SAMPLE: &str = r#"
[storage]
csv_path = "data/items.csv"

[alerts]
enabled = true

[[targets]]
name = "jobs"
url = "https://example.com/jobs"
item = ".job"
csv_path = "data/jobs.csv"

[targets.fields]
title = ".title::text"
link = "a::attr(href)"

[[targets]]
name = "news"
url = "https://example.org/"
item_selector = "article"
fields = { title = "h2", url = "a::attr(href)" }
"#;

    #[test]
    fn test_parse() {
        let cfg = Config::parse(SAMPLE).unwrap();

        assert_eq!(PathBuf::from("data/items.csv"), cfg.storage.csv_path);
        assert_eq!("link", cfg.storage.unique_key);
        assert!(cfg.alerts.enabled);
        assert_eq!(2, cfg.targets.len());

        let jobs = &cfg.targets[0];
        assert_eq!("jobs", jobs.name);
        assert_eq!(".job", jobs.item_selector);
        assert_eq!(Some(PathBuf::from("data/jobs.csv")), jobs.csv_path);
        assert_eq!("a::attr(href)", jobs.fields["link"]);

        let news = &cfg.targets[1];
        assert_eq!("news", news.name);
        assert_eq!("article", news.item_selector);
        assert!(news.csv_path.is_none());
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::parse("[storage]\ncsv_path = \"x.csv\"\nunique_key = \"url\"\n").unwrap();
        assert!(!cfg.alerts.enabled);
        assert!(cfg.targets.is_empty());

        let opts = cfg.run_options(true);
        assert_eq!("url", opts.unique_key);
        assert!(opts.alerts_enabled);
    }

    #[test]
    fn test_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG);

        assert!(matches!(Config::load(&path), Err(ConfigError::Read { .. })));

        fs::write(&path, "[storage]\ncsv_path = \"x.csv\"\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::NoTargets(_))));

        fs::write(&path, "storage = 1").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));

        fs::write(&path, SAMPLE).unwrap();
        assert_eq!(2, Config::load(&path).unwrap().targets.len());
    }
}
