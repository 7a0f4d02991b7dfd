use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::StatusCode;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::candidates::Candidate;

const USER_AGENT: &str = concat!("drawstat/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Text of one retrieved draw file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDraw {
    pub date: NaiveDate,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no draw file at {0}")]
    NotFound(String),

    #[error("status {status} for {locator}")]
    Status { status: u16, locator: String },

    #[error("transport failure for {locator}: {message}")]
    Transport { locator: String, message: String },

    #[error("unreadable draw file {locator}: {message}")]
    Unreadable { locator: String, message: String },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::NotFound(_) | FetchError::Unreadable { .. } => false,
            FetchError::Status { status, .. } => *status >= 500,
            FetchError::Transport { .. } => true,
        }
    }
}

/// Anything that can hand over the text of a candidate's draw file.
pub trait DrawSource: Send + Sync {
    fn retrieve(&self, candidate: &Candidate) -> Result<String, FetchError>;

    fn describe(&self) -> String;
}

/// Draw files served over HTTP under a common base URL.
pub struct HttpSource {
    client: reqwest::blocking::Client,
    base: Url,
}

impl HttpSource {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base).with_context(|| format!("Invalid source URL '{}'", base))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        info!(action = "configure", component = "http_source", base = %base, "HTTP draw source ready");
        Ok(Self { client, base })
    }

    pub fn url_for(&self, candidate: &Candidate) -> Result<Url, url::ParseError> {
        self.base.join(&candidate.locator)
    }
}

impl DrawSource for HttpSource {
    fn retrieve(&self, candidate: &Candidate) -> Result<String, FetchError> {
        let transport = |message: String| FetchError::Transport {
            locator: candidate.locator.clone(),
            message,
        };

        let url = self.url_for(candidate).map_err(|e| transport(e.to_string()))?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(FetchError::NotFound(candidate.locator.clone())),
            status if !status.is_success() => Err(FetchError::Status {
                status: status.as_u16(),
                locator: candidate.locator.clone(),
            }),
            _ => response.text().map_err(|e| transport(e.to_string())),
        }
    }

    fn describe(&self) -> String {
        self.base.to_string()
    }
}

/// Draw files stored in a local directory.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            anyhow::bail!("Source directory not found: {:?}", root);
        }
        info!(action = "configure", component = "dir_source", root = ?root, "Directory draw source ready");
        Ok(Self { root })
    }
}

impl DrawSource for DirSource {
    fn retrieve(&self, candidate: &Candidate) -> Result<String, FetchError> {
        let path = self.root.join(&candidate.locator);
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound(candidate.locator.clone()),
            io::ErrorKind::Interrupted | io::ErrorKind::TimedOut => FetchError::Transport {
                locator: candidate.locator.clone(),
                message: e.to_string(),
            },
            // Bad encoding or permissions will not change on a retry
            _ => FetchError::Unreadable {
                locator: candidate.locator.clone(),
                message: e.to_string(),
            },
        })
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
