//! Domain collection.
//!
//! Gathers the ordered `(domain, include wildcard)` list for a certificate
//! request. The first entry is the primary domain.

use serde::{Deserialize, Serialize};
use std::io;
use tracing::debug;

use crate::error::{CertError, Result};
use crate::prompt::Prompter;

/// Literal answer that ends an open-ended list prompt
pub const DONE_SENTINEL: &str = "done";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEntry {
    pub name: String,
    pub include_wildcard: bool,
}

impl DomainEntry {
    pub fn new(name: impl Into<String>, include_wildcard: bool) -> Self {
        Self {
            name: name.into(),
            include_wildcard,
        }
    }

    pub fn wildcard_name(&self) -> String {
        format!("*.{}", self.name)
    }
}

/// An empty answer or the `done` sentinel ends a list prompt.
pub fn is_terminator(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == DONE_SENTINEL
}

/// Read values until the operator enters a terminator.
///
/// `first_prompt` is used for the first value and `next_prompt` afterwards.
/// Terminators are rejected with a warning until `min_items` values exist.
/// `follow_up` turns each accepted value into an item and may ask further
/// questions about it.
pub fn collect_until<P, T, F>(
    prompter: &mut P,
    first_prompt: &str,
    next_prompt: &str,
    min_items: usize,
    mut follow_up: F,
) -> io::Result<Vec<T>>
where
    P: Prompter + ?Sized,
    F: FnMut(&mut P, String) -> io::Result<T>,
{
    let mut items = Vec::new();
    loop {
        let prompt = if items.is_empty() {
            first_prompt
        } else {
            next_prompt
        };
        let value = prompter.input(prompt)?;
        if is_terminator(&value) {
            if items.len() >= min_items {
                return Ok(items);
            }
            prompter.warn("A value is required here");
            continue;
        }
        items.push(follow_up(prompter, value.trim().to_string())?);
    }
}

pub struct DomainCollector;

impl DomainCollector {
    /// Interactively collect at least one domain.
    ///
    /// Duplicates are accepted as entered.
    pub fn collect<P: Prompter + ?Sized>(prompter: &mut P) -> io::Result<Vec<DomainEntry>> {
        collect_until(
            prompter,
            "Domain (e.g. example.com)",
            "Another domain (empty or 'done' to finish)",
            1,
            |prompter, name| {
                let include_wildcard =
                    prompter.confirm(&format!("Also issue for *.{name}?"), true)?;
                debug!(domain = %name, include_wildcard, "Collected domain");
                Ok(DomainEntry::new(name, include_wildcard))
            },
        )
    }

    /// Build a domain list from already-known entries.
    pub fn from_entries(entries: Vec<DomainEntry>) -> Result<Vec<DomainEntry>> {
        if entries.is_empty() {
            return Err(CertError::Environment(
                "At least one domain is required".to_string(),
            ));
        }
        entries
            .into_iter()
            .map(|entry| {
                let name = entry.name.trim().to_string();
                if name.is_empty() {
                    return Err(CertError::Environment(
                        "Domain names cannot be empty".to_string(),
                    ));
                }
                Ok(DomainEntry::new(name, entry.include_wildcard))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;

    #[test]
    fn collects_single_domain_with_wildcard() {
        let mut prompter = ScriptedPrompter::new(["example.com", "y", ""]);
        let domains = DomainCollector::collect(&mut prompter).unwrap();
        assert_eq!(domains, vec![DomainEntry::new("example.com", true)]);
        assert_eq!(prompter.remaining(), 0);
    }

    #[test]
    fn stops_on_done_sentinel() {
        let mut prompter = ScriptedPrompter::new(["a.com", "n", "b.com", "y", "done"]);
        let domains = DomainCollector::collect(&mut prompter).unwrap();
        assert_eq!(
            domains,
            vec![DomainEntry::new("a.com", false), DomainEntry::new("b.com", true)]
        );
    }

    #[test]
    fn first_domain_cannot_be_skipped() {
        let mut prompter = ScriptedPrompter::new(["", "done", "example.com", "n", ""]);
        let domains = DomainCollector::collect(&mut prompter).unwrap();
        assert_eq!(domains, vec![DomainEntry::new("example.com", false)]);
        assert_eq!(prompter.warnings().len(), 2);
    }

    #[test]
    fn wildcard_question_is_asked_for_every_domain() {
        let mut prompter = ScriptedPrompter::new(["a.com", "y", "b.com", "y", "c.com", "n", ""]);
        DomainCollector::collect(&mut prompter).unwrap();
        let wildcard_questions = prompter
            .asked()
            .iter()
            .filter(|prompt| prompt.starts_with("Also issue for"))
            .count();
        assert_eq!(wildcard_questions, 3);
    }

    #[test]
    fn duplicates_are_kept() {
        let mut prompter = ScriptedPrompter::new(["a.com", "n", "a.com", "n", "done"]);
        let domains = DomainCollector::collect(&mut prompter).unwrap();
        assert_eq!(domains.len(), 2);
        assert_eq!(domains[0], domains[1]);
    }

    #[test]
    fn trims_entered_values() {
        let mut prompter = ScriptedPrompter::new(["  example.com  ", "", "  "]);
        let domains = DomainCollector::collect(&mut prompter).unwrap();
        assert_eq!(domains[0].name, "example.com");
        assert!(domains[0].include_wildcard);
    }

    #[test]
    fn from_entries_requires_a_domain() {
        assert!(DomainCollector::from_entries(Vec::new()).is_err());
        assert!(DomainCollector::from_entries(vec![DomainEntry::new(" ", false)]).is_err());
        let domains =
            DomainCollector::from_entries(vec![DomainEntry::new(" a.com ", true)]).unwrap();
        assert_eq!(domains, vec![DomainEntry::new("a.com", true)]);
    }

    #[test]
    fn terminator_matches_blank_and_done_only() {
        assert!(is_terminator(""));
        assert!(is_terminator("   "));
        assert!(is_terminator("done"));
        assert!(!is_terminator("Done.com"));
        assert!(!is_terminator("example.com"));
    }
}
