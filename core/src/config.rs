//! Client configuration read from the environment.

use std::path::PathBuf;

use serde::Deserialize;

use crate::adapter::RemoteAdapter;
use crate::credentials::{CredentialProvider, FileCredentials, MemoryCredentials};
use crate::transport::ReqwestTransport;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,
    /// Where to persist the bearer token. `None` keeps it in memory only.
    #[serde(default)]
    pub token_path: Option<PathBuf>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            token_path: None,
        }
    }
}

impl ClientConfig {
    /// `TASKFLOW_API_URL` and `TASKFLOW_TOKEN_PATH`; empty values count as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            base_url: var("TASKFLOW_API_URL").unwrap_or_else(default_api_url),
            token_path: var("TASKFLOW_TOKEN_PATH").map(PathBuf::from),
        }
    }

    pub fn credentials(&self) -> Box<dyn CredentialProvider> {
        match &self.token_path {
            Some(path) => Box::new(FileCredentials::new(path)),
            None => Box::new(MemoryCredentials::new()),
        }
    }

    pub fn connect(&self) -> RemoteAdapter<ReqwestTransport> {
        RemoteAdapter::over_http(&self.base_url, self.credentials())
    }
}
