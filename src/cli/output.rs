//! Terminal output for the fixtree commands
//!
//! `colored` honors NO_COLOR, CLICOLOR and CLICOLOR_FORCE.

use std::fmt::Display;

use colored::Colorize;
use serde_json::Value;

/// `error: msg` on stderr
pub fn error(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

pub fn warning(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "Warning".yellow(), msg);
}

/// `label: msg` with a green label, for config paths and expression segments
pub fn action(label: &str, msg: &(impl Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

pub fn header(msg: &(impl Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Indented listing line, one per manipulator
pub fn detail(msg: &(impl Display + ?Sized)) {
    println!("  {}", msg);
}

/// Uncolored text: rendered trees, config files
pub fn info(msg: &(impl Display + ?Sized)) {
    println!("{}", msg);
}

/// One sample per line, so `sample -n N` prints JSON Lines.
pub fn sample(value: &Value) {
    println!("{value}");
}
