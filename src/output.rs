//! # Output Configuration
//!
//! This module provides utilities for controlling CLI output appearance,
//! including color support based on terminal capabilities and user
//! preferences, and the per-repository banners every command prints.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Banners
//!
//! Results are reported per repository with a bracketed banner: red for a
//! failure, green for success, yellow while a retry is pending.

use std::env;
use std::fmt::Display;
use std::path::Path;

use console::style;

/// Output configuration for controlling colors.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Make every styled string printed from now on follow this
    /// configuration.
    pub fn apply(&self) {
        console::set_colors_enabled(self.use_color);
        console::set_colors_enabled_stderr(self.use_color);
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

pub fn bold(text: impl Display) -> String {
    style(text).bold().to_string()
}

pub fn green(text: impl Display) -> String {
    style(text).green().to_string()
}

pub fn red(text: impl Display) -> String {
    style(text).red().to_string()
}

pub fn yellow(text: impl Display) -> String {
    style(text).yellow().to_string()
}

/// `[name]` in bold.
pub fn repo_banner(name: &str) -> String {
    bold(format!("[{}]", name))
}

/// `[name]` in bold red.
pub fn failure_banner(name: &str) -> String {
    style(format!("[{}]", name)).red().bold().to_string()
}

/// `[name]` in bold green.
pub fn success_banner(name: &str) -> String {
    style(format!("[{}]", name)).green().bold().to_string()
}

/// `[name] (N)` in bold yellow, N being the retries left.
pub fn retry_banner(name: &str, retries_left: u32) -> String {
    style(format!("[{}] ({})", name, retries_left))
        .yellow()
        .bold()
        .to_string()
}

/// `= name =` heading used before raw command output.
pub fn section_header(name: &str) -> String {
    bold(format!("= {} =", name))
}

pub fn missing_repository(path: &Path) -> String {
    format!("{}{}", red("Missing repository: "), bold(path.display()))
}

pub fn missing_module_config(path: &Path) -> String {
    format!("{}{}", red("Missing tryton.cfg file: "), bold(path.display()))
}
