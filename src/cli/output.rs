//! Terminal output helpers
//!
//! Consistent styled messages plus a byte-denominated progress bar for
//! streaming sessions. All human-facing output goes through here so quiet
//! mode has a single switch.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output handler for consistent CLI formatting
pub struct Output {
    verbose: bool,
    quiet: bool,
}

impl Output {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("✔").green(), message);
        }
    }

    /// Errors are always shown, even in quiet mode.
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✖").red(), message);
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("⚠").yellow(), message);
        }
    }

    pub fn verbose(&self, message: &str) {
        if self.verbose {
            println!("{} {}", style("ℹ").dim(), style(message).dim());
        }
    }

    pub fn header(&self, title: &str) {
        if !self.quiet {
            println!("\n{}", style(title).bold().underlined());
        }
    }

    pub fn table_row(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {:<24} {}", style(key).dim(), value);
        }
    }

    /// Byte-denominated progress bar for a streaming session.
    pub fn byte_progress(&self, total_bytes: u64, message: &str) -> Option<ProgressBar> {
        if self.quiet {
            return None;
        }
        let bar = ProgressBar::new(total_bytes);
        if let Ok(bar_style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
        ) {
            bar.set_style(bar_style.progress_chars("#>-"));
        }
        bar.set_message(message.to_string());
        Some(bar)
    }
}
