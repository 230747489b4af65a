//! The panel's key-value environment file.
//!
//! Lines are kept verbatim so comments and unrelated keys survive a rewrite.
//! Setting a key that only exists commented out (`# KEY = ...`) activates
//! that line in place.

use std::fs;
use std::path::Path;

use crate::config::{ConfigError, Result};
use crate::planner::DistributionTarget;

pub const PORT_KEY: &str = "PORT";
pub const DASHBOARD_PATH_KEY: &str = "DASHBOARD_PATH";
pub const SSL_CERTFILE_KEY: &str = "SSL_CERTFILE";
pub const SSL_KEYFILE_KEY: &str = "SSL_KEYFILE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelEnv {
    lines: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedLine<'a> {
    commented: bool,
    key: &'a str,
    value: &'a str,
}

fn parse_line(line: &str) -> Option<ParsedLine<'_>> {
    let trimmed = line.trim_start();
    let (commented, rest) = match trimmed.strip_prefix('#') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    let (key, value) = rest.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some(ParsedLine {
        commented,
        key,
        value: value.trim(),
    })
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

impl PanelEnv {
    pub fn parse(content: &str) -> Self {
        Self {
            lines: content.lines().map(str::to_string).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        Ok(Self::parse(&content))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::FileWrite(parent.to_path_buf(), e))?;
        }
        fs::write(path, self.render()).map_err(|e| ConfigError::FileWrite(path.to_path_buf(), e))
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// Value of an active (uncommented) key, without surrounding quotes.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .filter_map(|line| parse_line(line))
            .find(|parsed| !parsed.commented && parsed.key == key)
            .map(|parsed| unquote(parsed.value))
    }

    /// Set `key`, preferring an active line, then a commented-out one, then appending.
    pub fn set(&mut self, key: &str, value: &str) {
        let rendered = format!("{key} = \"{value}\"");
        let position = |commented: bool| {
            self.lines.iter().position(|line| {
                parse_line(line).is_some_and(|p| p.key == key && p.commented == commented)
            })
        };
        match position(false).or_else(|| position(true)) {
            Some(idx) => self.lines[idx] = rendered,
            None => self.lines.push(rendered),
        }
    }

    pub fn set_port(&mut self, port: u16) {
        self.set(PORT_KEY, &port.to_string());
    }

    pub fn set_dashboard_path(&mut self, path: &str) {
        let path = format!("/{}", path.trim().trim_matches('/'));
        self.set(DASHBOARD_PATH_KEY, &path);
    }

    pub fn enable_tls(&mut self, target: &DistributionTarget) {
        self.set(SSL_CERTFILE_KEY, &target.cert_path().display().to_string());
        self.set(SSL_KEYFILE_KEY, &target.key_path().display().to_string());
    }
}
