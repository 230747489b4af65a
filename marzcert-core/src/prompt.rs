//! Operator prompting seam.
//!
//! The workflow asks questions through [`Prompter`] so the same collection
//! logic drives the terminal UI and scripted runs.

use std::collections::VecDeque;
use std::io;

pub trait Prompter {
    /// Ask for a free-form line. Implementations return the raw answer.
    fn input(&mut self, prompt: &str) -> io::Result<String>;

    /// Ask for a value that must not be echoed.
    fn secret(&mut self, prompt: &str) -> io::Result<String>;

    /// Ask a yes/no question.
    fn confirm(&mut self, prompt: &str, default: bool) -> io::Result<bool>;

    /// Show a warning without asking anything.
    fn warn(&mut self, message: &str);
}

/// Parse a yes/no answer typed as plain text. Blank input yields `default`.
pub fn parse_yes_no(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Prompter that replays a fixed list of answers.
///
/// Used for programmatic runs and tests. Running out of answers is reported
/// as `UnexpectedEof` so collection loops cannot spin forever.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<String>,
    warnings: Vec<String>,
    secret_prompts: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
            warnings: Vec::new(),
            secret_prompts: Vec::new(),
        }
    }

    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Prompts that were asked as secrets.
    pub fn secret_prompts(&self) -> &[String] {
        &self.secret_prompts
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next_answer(&mut self, prompt: &str) -> io::Result<String> {
        self.asked.push(prompt.to_string());
        self.answers.pop_front().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("No scripted answer for prompt '{prompt}'"),
            )
        })
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&mut self, prompt: &str) -> io::Result<String> {
        self.next_answer(prompt)
    }

    fn secret(&mut self, prompt: &str) -> io::Result<String> {
        self.secret_prompts.push(prompt.to_string());
        self.next_answer(prompt)
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> io::Result<bool> {
        let answer = self.next_answer(prompt)?;
        parse_yes_no(&answer, default).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Expected yes or no, got '{answer}'"),
            )
        })
    }

    fn warn(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}
