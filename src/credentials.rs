//! Auth token persistence.
//!
//! # Responsibilities
//! - Write the configured auth token to `srv_auth.txt` exactly once per run
//! - Report create and write failures with the offending path
//!
//! # Design Decisions
//! - Synchronous write, performed before the listener binds
//! - Truncates any file left by a previous run
//! - No retry: a failed write must keep the server from serving

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the file that receives the token.
pub const AUTH_FILE_NAME: &str = "srv_auth.txt";

/// Errors raised while persisting the token.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("cannot create auth file {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write auth file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A token and the location it was persisted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub token: String,
    pub path: PathBuf,
}

/// Destination for the auth token.
pub trait CredentialSink: Send + Sync {
    fn save(&self, token: &str) -> Result<CredentialRecord, CredentialError>;
}

/// Writes the token to `<directory>/srv_auth.txt`.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            path: directory.as_ref().join(AUTH_FILE_NAME),
        }
    }

    /// Store targeting the process working directory.
    pub fn in_working_dir() -> Self {
        Self::new(".")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialSink for CredentialStore {
    fn save(&self, token: &str) -> Result<CredentialRecord, CredentialError> {
        let mut file = File::create(&self.path).map_err(|source| CredentialError::Create {
            path: self.path.clone(),
            source,
        })?;

        // The handle is closed on every path when `file` drops.
        file.write_all(token.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| CredentialError::Write {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!(path = %self.path.display(), "Auth token persisted");

        Ok(CredentialRecord {
            token: token.to_string(),
            path: self.path.clone(),
        })
    }
}
