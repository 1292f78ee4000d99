use std::path::PathBuf;

use thiserror::Error;

/// Network or HTTP failure once every attempt has been used up.
#[derive(Debug, Error)]
#[error("failed to fetch {url} after {attempts} attempt(s): {source}")]
pub struct FetchError {
    pub url: String,
    pub attempts: u32,
    #[source]
    pub source: reqwest::Error,
}

#[derive(Debug, Clone, Error)]
pub enum SelectorError {
    #[error("invalid CSS selector `{css}`: {reason}")]
    Css { css: String, reason: String },
    #[error("malformed selector expression `{0}`")]
    Expression(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("no targets configured in {0}")]
    NoTargets(PathBuf),
}

/// Everything that can abort a single target's run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, Error>;
