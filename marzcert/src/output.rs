use std::fmt::Display;
use std::io::{BufRead, IsTerminal, Write};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use console::{colors_enabled, style};
use demand::{
    Confirm as DemandConfirm, DemandOption, Input as DemandInput, Select as DemandSelect,
    Spinner as DemandSpinner, Theme as DemandTheme,
};
use marzcert_core::Prompter;
use marzcert_core::prompt::parse_yes_no;
use termcolor::{Color, ColorSpec};

static VERBOSE: AtomicBool = AtomicBool::new(false);
static DEMAND_THEME: LazyLock<DemandTheme> = LazyLock::new(marzcert_demand_theme);

pub fn brand_accent<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).cyan()
}

pub fn brand_fg<D: Display>(value: D) -> console::StyledObject<D> {
    style(value)
}

pub fn brand_muted<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).dim()
}

pub fn brand_success<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).green()
}

pub fn brand_warning<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).yellow()
}

pub fn brand_error<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).red()
}

fn fg(color: Color) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(color));
    spec
}

fn marzcert_demand_theme() -> DemandTheme {
    let fg_color = Color::White;
    let accent = Color::Cyan;
    let muted = Color::Blue;
    let error = Color::Red;

    let mut title = fg(accent);
    title.set_bold(true);

    let mut theme = DemandTheme::new();
    theme.title = title;
    theme.description = fg(accent);
    theme.cursor = fg(accent);
    theme.cursor_str = String::from("❯");
    theme.selected_prefix = String::from(" •");
    theme.selected_prefix_fg = fg(accent);
    theme.selected_option = fg(fg_color);
    theme.unselected_prefix = String::from(" •");
    theme.unselected_prefix_fg = fg(fg_color);
    theme.unselected_option = fg(fg_color);
    theme.input_cursor = fg(accent);
    theme.input_placeholder = fg(fg_color);
    theme.input_prompt = fg(accent);
    theme.help_key = fg(muted);
    theme.help_desc = fg(muted);
    theme.help_sep = fg(muted);
    theme.focused_button = fg(accent);
    theme.blurred_button = fg(fg_color);
    theme.error_indicator = fg(error);
    theme.force_style = true;
    theme
}

pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

pub fn section(title: &str) {
    println!();
    println!("{}", brand_accent(title).bold());
}

pub fn step(message: &str) {
    println!("{} {}", brand_accent("•").bold(), brand_fg(message));
}

pub fn success(message: &str) {
    println!("{} {}", brand_success("✓").bold(), brand_fg(message));
}

pub fn warning(message: &str) {
    println!("{} {}", brand_warning("!").bold(), brand_fg(message));
}

pub fn error(message: &str) {
    println!("{} {}", brand_error("✗").bold(), brand_fg(message));
}

pub fn error_stderr(message: &str) {
    eprintln!("{} {}", brand_error("✗").bold(), brand_fg(message));
}

pub fn muted(message: &str) {
    println!("{}", brand_muted(message));
}

pub fn emphasized(value: &str) -> String {
    if std::io::stdout().is_terminal() && colors_enabled() {
        format!("\x1b[3m{}\x1b[23m", value)
    } else {
        format!("'{}'", value)
    }
}

/// Print `prompt` and read one line from stdin without the trailing newline.
///
/// Used when stdin is not a terminal so flows can be scripted.
pub fn read_line(prompt: &str) -> std::io::Result<String> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{prompt}: ")?;
    stdout.flush()?;
    read_line_from(&mut std::io::stdin().lock())
}

fn read_line_from<R: BufRead>(reader: &mut R) -> std::io::Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "Input ended before all questions were answered",
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn yes_no_hint(default: bool) -> &'static str {
    if default { "[Y/n]" } else { "[y/N]" }
}

pub fn confirm(prompt: &str, default: bool) -> std::io::Result<bool> {
    if !is_interactive() {
        loop {
            let answer = read_line(&format!("{prompt} {}", yes_no_hint(default)))?;
            match parse_yes_no(&answer, default) {
                Some(value) => return Ok(value),
                None => warning("Please answer yes or no"),
            }
        }
    }

    DemandConfirm::new(prompt)
        .theme(&DEMAND_THEME)
        .selected(default)
        .run()
}

pub fn prompt_input(prompt: &str, default: Option<&str>) -> std::io::Result<String> {
    if !is_interactive() {
        let value = read_line(prompt)?;
        return Ok(match default {
            Some(default) if value.trim().is_empty() => default.to_string(),
            _ => value,
        });
    }

    let mut input = DemandInput::new(prompt).theme(&DEMAND_THEME);
    if let Some(default_value) = default {
        input = input.default_value(default_value);
    }
    input.run()
}

pub fn prompt_password(prompt: &str) -> std::io::Result<String> {
    if !is_interactive() {
        return read_line(prompt);
    }

    DemandInput::new(prompt)
        .theme(&DEMAND_THEME)
        .password(true)
        .run()
}

/// Pick one of `options`. Each option carries the key an operator types
/// when stdin is not a terminal.
pub fn select<T>(
    title: &str,
    description: Option<&str>,
    options: Vec<(String, String, T)>,
) -> std::io::Result<T> {
    if options.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "No options available for selection",
        ));
    }

    if !is_interactive() {
        section(title);
        for (key, label, _) in &options {
            println!("  {}) {}", brand_accent(key), label);
        }
        let mut options = options;
        loop {
            let answer = read_line("Choose an option")?;
            let answer = answer.trim();
            if let Some(idx) = options.iter().position(|(key, _, _)| key == answer) {
                return Ok(options.swap_remove(idx).2);
            }
            warning(&format!("Unknown option {}", emphasized(answer)));
        }
    }

    let mut select = DemandSelect::new(title).theme(&DEMAND_THEME);
    if let Some(description) = description {
        select = select.description(description);
    }

    let demand_options: Vec<DemandOption<T>> = options
        .into_iter()
        .map(|(key, label, value)| DemandOption::with_label(format!("{key}) {label}"), value))
        .collect();

    select.options(demand_options).run()
}

pub fn with_spinner<T, F, S>(message: S, work: F) -> std::io::Result<T>
where
    F: FnOnce() -> T + Send,
    T: Send,
    S: Into<String>,
{
    if !(std::io::stdout().is_terminal() && std::io::stderr().is_terminal()) {
        let message = message.into();
        step(&message);
        return Ok(work());
    }

    DemandSpinner::new(message)
        .theme(&DEMAND_THEME)
        .run(|_| work())
}

/// [`Prompter`] backed by the terminal prompts above.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn input(&mut self, prompt: &str) -> std::io::Result<String> {
        prompt_input(prompt, None)
    }

    fn secret(&mut self, prompt: &str) -> std::io::Result<String> {
        prompt_password(prompt)
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> std::io::Result<bool> {
        confirm(prompt, default)
    }

    fn warn(&mut self, message: &str) {
        warning(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn verbose_round_trip() {
        set_verbose(false);
        assert!(!is_verbose());

        set_verbose(true);
        assert!(is_verbose());
    }

    #[test]
    fn read_line_strips_line_endings() {
        let mut input = Cursor::new("example.com\r\nnext\n");
        assert_eq!(read_line_from(&mut input).unwrap(), "example.com");
        assert_eq!(read_line_from(&mut input).unwrap(), "next");
    }

    #[test]
    fn read_line_keeps_blank_lines() {
        let mut input = Cursor::new("\n");
        assert_eq!(read_line_from(&mut input).unwrap(), "");
    }

    #[test]
    fn read_line_reports_end_of_input() {
        let mut input = Cursor::new("");
        let err = read_line_from(&mut input).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn yes_no_hint_marks_default() {
        assert_eq!(yes_no_hint(true), "[Y/n]");
        assert_eq!(yes_no_hint(false), "[y/N]");
    }

    #[test]
    fn select_rejects_empty_options() {
        let err = select::<u8>("Pick one", None, Vec::new()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn emphasized_falls_back_to_quoted_text_in_non_tty_context() {
        assert_eq!(emphasized("example.com"), "'example.com'");
    }

    #[test]
    fn demand_theme_uses_terminal_color_semantics() {
        assert_eq!(DEMAND_THEME.title.fg(), Some(&Color::Cyan));
        assert_eq!(DEMAND_THEME.input_prompt.fg(), Some(&Color::Cyan));
        assert_eq!(DEMAND_THEME.error_indicator.fg(), Some(&Color::Red));
    }
}
