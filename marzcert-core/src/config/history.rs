use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::error::{ConfigError, Result};
use crate::domains::DomainEntry;

pub const HISTORY_FILENAME: &str = "history.toml";

const WILDCARD_PREFIX: &str = "*.";

/// Choices from the last successful run, reused by the update flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunHistory {
    #[serde(default)]
    pub last: Option<LastRun>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastRun {
    #[serde(
        serialize_with = "serialize_domain_entries",
        deserialize_with = "deserialize_domain_entries"
    )]
    pub domains: Vec<DomainEntry>,
    pub cert_filename: String,
    pub key_filename: String,
    pub directories: Vec<PathBuf>,
}

// Domains are stored compactly: "example.com" or "*.example.com" when the
// wildcard form was requested alongside the bare name.
fn serialize_domain_entries<S>(
    entries: &[DomainEntry],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let compact: Vec<String> = entries
        .iter()
        .map(|entry| {
            if entry.include_wildcard {
                format!("{WILDCARD_PREFIX}{}", entry.name)
            } else {
                entry.name.clone()
            }
        })
        .collect();
    compact.serialize(serializer)
}

fn deserialize_domain_entries<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<DomainEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let compact = Vec::<String>::deserialize(deserializer)?;
    Ok(compact
        .into_iter()
        .map(|value| match value.strip_prefix(WILDCARD_PREFIX) {
            Some(name) => DomainEntry::new(name, true),
            None => DomainEntry::new(value, false),
        })
        .collect())
}

impl RunHistory {
    pub fn path_in(home: &Path) -> PathBuf {
        home.join(HISTORY_FILENAME)
    }

    pub fn load_from_home(home: &Path) -> Result<Self> {
        let path = Self::path_in(home);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(&path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(path.as_ref().to_path_buf(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let parsed: Self = toml::from_str(content)?;
        Ok(parsed)
    }

    pub fn save_to_home(&self, home: &Path) -> Result<()> {
        self.save_to_file(Self::path_in(home))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::FileWrite(parent.to_path_buf(), e))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::FileWrite(path.to_path_buf(), e))?;
        Ok(())
    }

    pub fn record(
        &mut self,
        domains: &[DomainEntry],
        cert_filename: &str,
        key_filename: &str,
        directories: &[PathBuf],
    ) {
        if domains.is_empty() || directories.is_empty() {
            return;
        }
        self.last = Some(LastRun {
            domains: domains.to_vec(),
            cert_filename: cert_filename.to_string(),
            key_filename: key_filename.to_string(),
            directories: directories.to_vec(),
        });
    }
}
