use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::error::{ConfigError, Result};
use crate::credentials::CredentialStore;
use crate::planner::checked_filename;
use crate::request::IssueOptions;

pub const SETTINGS_FILENAME: &str = "config.toml";

/// Installer settings, read from `config.toml` in the marzcert home directory.
///
/// Every field has a default matching a stock Marzneshin + certbot host, so
/// the file is optional and may override any subset of keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// DNS provider name used for the certbot plugin and credential key
    pub dns_provider: String,
    pub credentials_path: PathBuf,
    pub certbot_bin: String,
    /// certbot's live-certificate root (`<live_dir>/<primary domain>/...`)
    pub live_dir: PathBuf,
    pub email: Option<String>,
    pub propagation_seconds: Option<u32>,
    pub default_cert_filename: String,
    pub default_key_filename: String,
    pub default_directories: Vec<PathBuf>,
    /// Path fragment identifying the panel's own certificate directory
    pub primary_service_fragment: String,
    pub panel_env_path: PathBuf,
    pub panel_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dns_provider: "cloudflare".to_string(),
            credentials_path: PathBuf::from("/root/.secrets/certbot/cloudflare.ini"),
            certbot_bin: "certbot".to_string(),
            live_dir: PathBuf::from("/etc/letsencrypt/live"),
            email: None,
            propagation_seconds: None,
            default_cert_filename: "cert.pem".to_string(),
            default_key_filename: "key.pem".to_string(),
            default_directories: vec![
                PathBuf::from("/var/lib/marzneshin/certs"),
                PathBuf::from("/var/lib/marznode/certs"),
            ],
            primary_service_fragment: "marzneshin".to_string(),
            panel_env_path: PathBuf::from("/etc/opt/marzneshin/.env"),
            panel_command: "marzneshin".to_string(),
        }
    }
}

impl Settings {
    pub fn path_in(home: &Path) -> PathBuf {
        home.join(SETTINGS_FILENAME)
    }

    /// Load settings from `home`, falling back to defaults when the file is absent.
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
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn issue_options(&self) -> IssueOptions {
        IssueOptions {
            dns_provider: self.dns_provider.clone(),
            email: self.email.clone(),
            propagation_seconds: self.propagation_seconds,
        }
    }

    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(self.credentials_path.clone(), self.dns_provider.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_directories.len() != 2 {
            return Err(ConfigError::Validation(format!(
                "default_directories must list exactly 2 directories, found {}",
                self.default_directories.len()
            )));
        }
        if self.default_cert_filename.trim().is_empty()
            || self.default_key_filename.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "default certificate and key filenames cannot be empty".to_string(),
            ));
        }
        for name in [&self.default_cert_filename, &self.default_key_filename] {
            if checked_filename(name).is_none() {
                return Err(ConfigError::Validation(format!(
                    "default filename {name:?} must be a plain file name"
                )));
            }
        }
        if self.default_cert_filename.trim() == self.default_key_filename.trim() {
            return Err(ConfigError::Validation(
                "default certificate and key filenames must differ".to_string(),
            ));
        }
        if self.primary_service_fragment.trim().is_empty() {
            return Err(ConfigError::Validation(
                "primary_service_fragment cannot be empty".to_string(),
            ));
        }
        if self.dns_provider.trim().is_empty() {
            return Err(ConfigError::Validation(
                "dns_provider cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_empty_uses_defaults() {
        let parsed = Settings::parse("").unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn parse_overrides_subset_of_keys() {
        let parsed = Settings::parse(
            r#"
email = "ops@example.com"
live_dir = "/srv/le/live"
propagation_seconds = 60
"#,
        )
        .unwrap();
        assert_eq!(parsed.email.as_deref(), Some("ops@example.com"));
        assert_eq!(parsed.live_dir, PathBuf::from("/srv/le/live"));
        assert_eq!(parsed.propagation_seconds, Some(60));
        assert_eq!(parsed.default_cert_filename, "cert.pem");
        assert_eq!(parsed.dns_provider, "cloudflare");
    }

    #[test]
    fn parse_rejects_wrong_default_directory_count() {
        let err = Settings::parse(r#"default_directories = ["/only/one"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("exactly 2"));
    }

    #[test]
    fn parse_rejects_default_filenames_outside_directory() {
        let err = Settings::parse(r#"default_cert_filename = "../cert.pem""#).unwrap_err();
        assert!(err.to_string().contains("plain file name"));
    }

    #[test]
    fn parse_rejects_identical_default_filenames() {
        let err = Settings::parse(
            r#"
default_cert_filename = "tls.pem"
default_key_filename = "tls.pem"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn parse_rejects_empty_fragment() {
        let err = Settings::parse(r#"primary_service_fragment = " ""#).unwrap_err();
        assert!(err.to_string().contains("primary_service_fragment"));
    }

    #[test]
    fn load_from_home_without_file_returns_defaults() {
        let temp = TempDir::new().unwrap();
        let loaded = Settings::load_from_home(temp.path()).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn load_from_home_reads_config_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            Settings::path_in(temp.path()),
            "panel_command = \"/usr/local/bin/marzneshin\"\n",
        )
        .unwrap();
        let loaded = Settings::load_from_home(temp.path()).unwrap();
        assert_eq!(loaded.panel_command, "/usr/local/bin/marzneshin");
    }

    #[test]
    fn issue_options_follow_settings() {
        let settings = Settings::parse(
            r#"
email = "a@b.c"
dns_provider = "digitalocean"
"#,
        )
        .unwrap();
        let options = settings.issue_options();
        assert_eq!(options.dns_provider, "digitalocean");
        assert_eq!(options.email.as_deref(), Some("a@b.c"));
        assert_eq!(
            settings.credential_store().token_key(),
            "dns_digitalocean_api_token"
        );
    }

    #[test]
    fn default_directories_include_panel_fragment_once() {
        let settings = Settings::default();
        let matching = settings
            .default_directories
            .iter()
            .filter(|dir| {
                dir.to_string_lossy()
                    .contains(&settings.primary_service_fragment)
            })
            .count();
        assert_eq!(matching, 1);
    }
}
