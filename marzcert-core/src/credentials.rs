//! DNS provider credential file for certbot's DNS plugin.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{CertError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub provider_token_path: PathBuf,
    pub token: String,
}

/// Owns the single-line `dns_<provider>_api_token = <token>` file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    provider: String,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>, provider: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            provider: provider.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn token_key(&self) -> String {
        format!("dns_{}_api_token", self.provider)
    }

    pub fn render_line(&self, token: &str) -> String {
        format!("{} = {}\n", self.token_key(), token.trim())
    }

    /// Write the token, replacing any existing one. The file is owner-only.
    pub fn ensure(&self, token: &str) -> Result<CredentialRecord> {
        let write_err = |path: &Path, source: std::io::Error| CertError::CredentialWrite {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(parent, e))?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .map_err(|e| write_err(self.path.as_path(), e))?;
        file.write_all(self.render_line(token).as_bytes())
            .map_err(|e| write_err(self.path.as_path(), e))?;

        // `mode` only applies on creation; tighten pre-existing files too.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(|e| write_err(self.path.as_path(), e))?;
        }

        debug!(path = %self.path.display(), "Wrote DNS credentials");
        Ok(CredentialRecord {
            provider_token_path: self.path.clone(),
            token: token.trim().to_string(),
        })
    }

    /// Read the stored token back, if the file exists and has the expected key.
    pub fn load(&self) -> Option<CredentialRecord> {
        let content = fs::read_to_string(&self.path).ok()?;
        let key = self.token_key();
        let token = content.lines().find_map(|line| {
            let (k, v) = line.split_once('=')?;
            (k.trim() == key).then(|| v.trim().to_string())
        });
        if token.is_none() {
            warn!(path = %self.path.display(), key = %key, "Credentials file has no token line");
        }
        token
            .filter(|t| !t.is_empty())
            .map(|token| CredentialRecord {
                provider_token_path: self.path.clone(),
                token,
            })
    }
}
