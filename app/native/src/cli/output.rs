//! CLI output formatting utilities.
//!
//! Human-readable status blocks and JSON syntax highlighting.

use std::fmt::Write;

use colored::Colorize;
use serde_json::Value;

use crate::controller::ControllerStatus;
use crate::license::AppState;
use crate::store::Settings;

/// Prints JSON with syntax highlighting.
///
/// Keys are cyan, strings green, numbers yellow, booleans and null magenta.
pub fn print_highlighted_json(value: &Value) {
    println!("{}", render_json(value));
}

/// Renders `value` like `serde_json::to_string_pretty`, with colors.
fn render_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    let _ = match value {
        Value::Null => write!(out, "{}", "null".magenta()),
        Value::Bool(flag) => write!(out, "{}", flag.to_string().magenta()),
        Value::Number(number) => write!(out, "{}", number.to_string().yellow()),
        Value::String(text) => write!(out, "{}", quoted(text).green()),
        Value::Array(items) => {
            write_container(out, ('[', ']'), depth, items.iter().map(|item| (None, item)));
            Ok(())
        }
        Value::Object(map) => {
            write_container(out, ('{', '}'), depth, map.iter().map(|(key, item)| (Some(key.as_str()), item)));
            Ok(())
        }
    };
}

fn write_container<'a>(
    out: &mut String,
    (open, close): (char, char),
    depth: usize,
    entries: impl ExactSizeIterator<Item = (Option<&'a str>, &'a Value)>,
) {
    let count = entries.len();
    let _ = write!(out, "{}", open.to_string().white().bold());
    if count > 0 {
        out.push('\n');
        for (index, (key, item)) in entries.enumerate() {
            indent(out, depth + 1);
            if let Some(key) = key {
                let _ = write!(out, "{}{} ", quoted(key).cyan(), ":".white());
            }
            write_value(out, item, depth + 1);
            if index + 1 < count {
                let _ = write!(out, "{}", ",".white());
            }
            out.push('\n');
        }
        indent(out, depth);
    }
    let _ = write!(out, "{}", close.to_string().white().bold());
}

fn indent(out: &mut String, depth: usize) {
    out.extend(std::iter::repeat_n(' ', depth * 2));
}

fn quoted(text: &str) -> String { serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\"")) }

/// Formats a boolean as a colored string.
#[must_use]
pub fn format_bool(value: bool) -> String {
    if value {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

/// Formats a license state, colored by how usable the app is.
#[must_use]
pub fn format_state(state: AppState) -> String {
    let label = state.to_string();
    match state {
        AppState::Pro => label.green().bold().to_string(),
        AppState::Trial => label.yellow().to_string(),
        AppState::Blocked => label.red().bold().to_string(),
    }
}

/// Prints the persisted settings.
pub fn print_settings(settings: &Settings) {
    println!("{:<10} {}", "Enabled".bold(), format_bool(settings.enabled));
    println!("{:<10} {}", "Window".bold(), settings.window_size);
    println!("{:<10} {}", "Ultra".bold(), format_bool(settings.ultra_mode));
}

/// Prints a controller snapshot.
pub fn print_status(status: &ControllerStatus) {
    let enabled = if status.enabled == status.effective_enabled {
        format_bool(status.enabled)
    } else {
        format!("{} (suspended)", format_bool(status.enabled))
    };

    println!("{:<10} {}", "State".bold(), format_state(status.app_state));
    if let Some(days) = status.remaining_trial_days {
        println!("{:<10} {days} day(s) left", "Trial".bold());
    }
    println!("{:<10} {enabled}", "Enabled".bold());
    println!("{:<10} {}", "Window".bold(), status.window_size);
    println!("{:<10} {}", "Ultra".bold(), format_bool(status.ultra_mode));
    println!(
        "{:<10} {} total, {} visible, {} hidden",
        "Messages".bold(),
        status.total,
        status.total.saturating_sub(status.hidden),
        status.hidden
    );
    println!("{:<10} {}", "Purged".bold(), status.purged);
    if status.pending_writes > 0 {
        println!("{:<10} {} unsaved value(s)", "Pending".bold().yellow(), status.pending_writes);
    }
}
