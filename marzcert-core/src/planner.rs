//! Destination planning: filenames and directories for the certificate pair.

use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::Settings;
use crate::domains::collect_until;
use crate::prompt::Prompter;

/// Extensions accepted as-is on operator-supplied filenames
pub const CERT_EXTENSIONS: &[&str] = &[".pem", ".crt", ".cer", ".key"];

/// Appended when a filename has none of [`CERT_EXTENSIONS`]
pub const DEFAULT_EXTENSION: &str = ".pem";

/// Append [`DEFAULT_EXTENSION`] unless the name already ends in a known extension.
pub fn normalize_filename(name: &str) -> String {
    let name = name.trim();
    let lower = name.to_ascii_lowercase();
    if CERT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        name.to_string()
    } else {
        format!("{name}{DEFAULT_EXTENSION}")
    }
}

/// Normalized filename, or `None` when the name would not stay inside a
/// destination directory or has no stem (`.pem`).
pub fn checked_filename(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return None;
    }
    let lower = name.to_ascii_lowercase();
    if CERT_EXTENSIONS.contains(&lower.as_str()) {
        return None;
    }
    Some(normalize_filename(name))
}

/// Strip trailing separators; `/` itself is kept.
pub fn normalize_directory(dir: &str) -> PathBuf {
    let dir = dir.trim();
    let stripped = dir.trim_end_matches('/');
    if stripped.is_empty() && dir.starts_with('/') {
        PathBuf::from("/")
    } else {
        PathBuf::from(stripped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionTarget {
    pub directory: PathBuf,
    pub cert_filename: String,
    pub key_filename: String,
}

impl DistributionTarget {
    pub fn cert_path(&self) -> PathBuf {
        self.directory.join(&self.cert_filename)
    }

    pub fn key_path(&self) -> PathBuf {
        self.directory.join(&self.key_filename)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionPlan {
    pub cert_filename: String,
    pub key_filename: String,
    pub directories: Vec<PathBuf>,
    /// Custom directories were requested but none were given
    pub fell_back_to_defaults: bool,
}

impl DistributionPlan {
    pub fn targets(&self) -> Vec<DistributionTarget> {
        self.directories
            .iter()
            .map(|directory| DistributionTarget {
                directory: directory.clone(),
                cert_filename: self.cert_filename.clone(),
                key_filename: self.key_filename.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct DistributionPlanner {
    default_cert_filename: String,
    default_key_filename: String,
    default_directories: Vec<PathBuf>,
}

impl DistributionPlanner {
    pub fn new(
        default_cert_filename: impl Into<String>,
        default_key_filename: impl Into<String>,
        default_directories: Vec<PathBuf>,
    ) -> Self {
        Self {
            default_cert_filename: default_cert_filename.into(),
            default_key_filename: default_key_filename.into(),
            default_directories,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.default_cert_filename.clone(),
            settings.default_key_filename.clone(),
            settings.default_directories.clone(),
        )
    }

    pub fn default_directories(&self) -> &[PathBuf] {
        &self.default_directories
    }

    pub fn plan(
        &self,
        use_defaults: bool,
        custom_filenames: Option<(&str, &str)>,
        custom_directories: Option<&[String]>,
    ) -> DistributionPlan {
        let (cert_filename, key_filename) = self.plan_filenames(use_defaults, custom_filenames);
        let (directories, fell_back_to_defaults) =
            self.plan_directories(use_defaults, custom_directories);
        DistributionPlan {
            cert_filename,
            key_filename,
            directories,
            fell_back_to_defaults,
        }
    }

    fn plan_filenames(
        &self,
        use_defaults: bool,
        custom_filenames: Option<(&str, &str)>,
    ) -> (String, String) {
        let defaults = (
            self.default_cert_filename.clone(),
            self.default_key_filename.clone(),
        );
        let (false, Some((cert, key))) = (use_defaults, custom_filenames) else {
            return defaults;
        };
        let cert = self.custom_or_default(cert, &self.default_cert_filename);
        let key = self.custom_or_default(key, &self.default_key_filename);
        if cert == key {
            warn!(filename = %cert, "Certificate and key filenames collide, using defaults");
            return defaults;
        }
        (cert, key)
    }

    /// Returns the directories and whether the defaults were a fallback.
    fn plan_directories(
        &self,
        use_defaults: bool,
        custom_directories: Option<&[String]>,
    ) -> (Vec<PathBuf>, bool) {
        if use_defaults {
            return (self.default_directories.clone(), false);
        }

        let directories: Vec<PathBuf> = custom_directories
            .unwrap_or_default()
            .iter()
            .filter(|dir| !dir.trim().is_empty())
            .map(|dir| normalize_directory(dir))
            .collect();

        if directories.is_empty() {
            warn!("No destination directories given, using defaults");
            return (self.default_directories.clone(), true);
        }
        (directories, false)
    }

    fn custom_or_default(&self, value: &str, default: &str) -> String {
        if value.trim().is_empty() {
            return default.to_string();
        }
        checked_filename(value).unwrap_or_else(|| {
            warn!(filename = value.trim(), "Unusable filename, using {}", default);
            default.to_string()
        })
    }

    /// Ask until a usable filename is given. Blank keeps `default`.
    fn ask_filename<P: Prompter + ?Sized>(
        prompter: &mut P,
        prompt: &str,
        default: &str,
        taken: Option<&str>,
    ) -> io::Result<String> {
        loop {
            let answer = prompter.input(prompt)?;
            let name = if answer.trim().is_empty() {
                Some(default.to_string())
            } else {
                checked_filename(&answer)
            };
            match name {
                None => prompter.warn(
                    "Enter a plain filename without '/' and with a name before the extension",
                ),
                Some(name) if taken == Some(name.as_str()) => {
                    prompter.warn("The key filename must differ from the certificate filename")
                }
                Some(name) => return Ok(name),
            }
        }
    }

    /// Ask the operator for filenames and directories.
    pub fn plan_interactive<P: Prompter + ?Sized>(
        &self,
        prompter: &mut P,
    ) -> io::Result<DistributionPlan> {
        let default_names = prompter.confirm(
            &format!(
                "Use default filenames ({} / {})?",
                self.default_cert_filename, self.default_key_filename
            ),
            true,
        )?;
        let (cert_filename, key_filename) = if default_names {
            (
                self.default_cert_filename.clone(),
                self.default_key_filename.clone(),
            )
        } else {
            let cert = Self::ask_filename(
                prompter,
                "Certificate filename",
                &self.default_cert_filename,
                None,
            )?;
            let key = Self::ask_filename(
                prompter,
                "Key filename",
                &self.default_key_filename,
                Some(cert.as_str()),
            )?;
            (cert, key)
        };

        let default_dirs = prompter.confirm(
            &format!(
                "Copy to the default directories ({})?",
                display_paths(&self.default_directories)
            ),
            true,
        )?;
        let custom_dirs = if default_dirs {
            None
        } else {
            Some(collect_until(
                prompter,
                "Destination directory",
                "Another directory (empty or 'done' to finish)",
                0,
                |_, dir| Ok(dir),
            )?)
        };

        let (directories, fell_back_to_defaults) =
            self.plan_directories(default_dirs, custom_dirs.as_deref());
        if fell_back_to_defaults {
            prompter.warn(&format!(
                "No directories entered, using defaults: {}",
                display_paths(&self.default_directories)
            ));
        }
        Ok(DistributionPlan {
            cert_filename,
            key_filename,
            directories,
            fell_back_to_defaults,
        })
    }
}

pub fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// First target whose directory contains `fragment`.
pub fn find_primary_service_target<'a>(
    targets: impl IntoIterator<Item = &'a DistributionTarget>,
    fragment: &str,
) -> Option<&'a DistributionTarget> {
    targets
        .into_iter()
        .find(|target| path_contains(&target.directory, fragment))
}

fn path_contains(path: &Path, fragment: &str) -> bool {
    path.to_string_lossy().contains(fragment)
}
