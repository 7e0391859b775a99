use anyhow::Result;
use clap::ValueEnum;
use colored::{Color, Colorize};
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;
use std::io::Write;

use crate::theme::{ICONS, THEME};

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
    /// Compact single-line output
    Compact,
}

/// Global CLI options that affect output
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Data that can be rendered as a table or a single line
pub trait TableDisplay {
    fn to_table(&self, output: &OutputManager) -> Table;
    fn to_compact(&self) -> String;
}

/// Output manager handles formatting and display
pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
            OutputFormat::Table => println!("{}", data.to_table(self)),
            OutputFormat::Compact => println!("{}", data.to_compact()),
        }
        Ok(())
    }

    /// Whether decorative lines should be printed at all
    fn chatty(&self) -> bool {
        !self.options.quiet && self.options.output_format != OutputFormat::Json
    }

    fn line(&self, icon: &str, color: Color, message: &str) -> String {
        if self.options.no_color {
            format!("{icon} {message}")
        } else {
            format!("{} {}", icon.color(color), message.color(color))
        }
    }

    pub fn success(&self, message: &str) {
        if self.chatty() {
            println!("{}", self.line(ICONS.success, THEME.success, message));
        }
    }

    /// Errors are printed even in quiet mode
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.line(ICONS.error, THEME.error, message));
    }

    pub fn warning(&self, message: &str) {
        if !self.options.quiet {
            eprintln!("{}", self.line(ICONS.warning, THEME.warning, message));
        }
    }

    pub fn info(&self, message: &str) {
        if self.chatty() {
            println!("{}", self.line(ICONS.info, THEME.info, message));
        }
    }

    /// Only shown with --verbose
    pub fn verbose(&self, message: &str) {
        if self.options.verbose && !self.options.quiet {
            eprintln!("{}", self.line(ICONS.arrow, THEME.muted, message));
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.chatty() {
            return;
        }
        if self.options.no_color {
            println!("\n{text}\n{}", "=".repeat(text.chars().count()));
        } else {
            println!("\n{}", text.color(THEME.primary).bold());
        }
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if !self.chatty() {
            return;
        }
        if self.options.no_color {
            println!("  {key}: {value}");
        } else {
            println!("  {}: {}", key.color(THEME.key).bold(), value.color(THEME.value));
        }
    }

    pub fn bullet(&self, text: &str) {
        if !self.chatty() {
            return;
        }
        if self.options.no_color {
            println!("  {} {text}", ICONS.bullet);
        } else {
            println!("  {} {text}", ICONS.bullet.color(THEME.muted));
        }
    }

    /// Per-version line of a migration run, e.g. `0003 → done`
    pub fn version_line(&self, version: &str, icon: &str, color: Color, status: &str) {
        if !self.chatty() {
            return;
        }
        if self.options.no_color {
            println!("  {icon} version {version} {} {status}", ICONS.arrow);
        } else {
            println!(
                "  {} version {} {} {}",
                icon.color(color),
                version.color(THEME.secondary),
                ICONS.arrow.color(THEME.muted),
                status.color(color)
            );
        }
    }

    /// Create a themed table with a bold header row
    pub fn table(&self, headers: &[&str]) -> Table {
        let mut table = Table::new();
        if self.options.no_color {
            table.load_preset(comfy_table::presets::ASCII_FULL);
        } else {
            table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
        }

        let header_cells: Vec<Cell> = headers
            .iter()
            .map(|h| {
                let cell = Cell::new(h).add_attribute(Attribute::Bold);
                if self.options.no_color { cell } else { cell.fg(TableColor::Cyan) }
            })
            .collect();
        table.set_header(header_cells);
        table
    }

    /// Display progress indicator
    pub fn progress(&self, message: &str) {
        if !self.chatty() {
            return;
        }

        let output = if self.options.no_color {
            format!("{} {message}...", ICONS.loading)
        } else {
            format!(
                "{} {}...",
                ICONS.loading.color(THEME.highlight).bold(),
                message.color(THEME.highlight)
            )
        };

        print!("\r{output}");
        std::io::stdout().flush().ok();
    }

    /// Clear the current line (useful after progress indicators)
    pub fn clear_line(&self) {
        if !self.chatty() {
            return;
        }

        print!("\r{}\r", " ".repeat(80));
        std::io::stdout().flush().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    impl TableDisplay for TestData {
        fn to_table(&self, output: &OutputManager) -> Table {
            let mut table = output.table(&["Name", "Value"]);
            table.add_row(vec![Cell::new(&self.name), Cell::new(self.value.to_string())]);
            table
        }

        fn to_compact(&self) -> String {
            format!("{}={}", self.name, self.value)
        }
    }

    fn sample() -> TestData {
        TestData {
            name: "test".to_string(),
            value: 42,
        }
    }

    #[test]
    fn displays_json() {
        let manager = OutputManager::new(GlobalOptions {
            output_format: OutputFormat::Json,
            ..Default::default()
        });
        assert!(manager.display(&sample()).is_ok());
        assert!(!manager.chatty());
    }

    #[test]
    fn quiet_suppresses_display() {
        let manager = OutputManager::new(GlobalOptions {
            quiet: true,
            ..Default::default()
        });
        assert!(manager.display(&sample()).is_ok());
        assert!(!manager.chatty());
    }

    #[test]
    fn plain_lines_without_color() {
        let manager = OutputManager::new(GlobalOptions {
            no_color: true,
            ..Default::default()
        });
        assert_eq!(manager.line(ICONS.success, THEME.success, "done"), "✓ done");
    }

    #[test]
    fn table_has_header() {
        let manager = OutputManager::new(GlobalOptions {
            no_color: true,
            ..Default::default()
        });
        let rendered = sample().to_table(&manager).to_string();
        assert!(rendered.contains("Name"));
        assert!(rendered.contains("42"));
        assert_eq!(sample().to_compact(), "test=42");
    }
}
