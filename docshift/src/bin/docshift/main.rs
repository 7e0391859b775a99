mod commands;
mod config;
mod examples;
mod output;
mod theme;

use anyhow::Result;
use clap::{
    ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Color as ClapColor, Style},
    },
};
use colored::{Color as ThemeColor, Colorize, control::ShouldColorize};
use std::fmt::Write;
use std::path::PathBuf;

use commands::{
    demo::{DemoArgs, handle_demo},
    resolve::{ResolveArgs, handle_resolve},
    status::handle_status,
};
use config::{Overrides, Settings};
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{ICONS, THEME};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("REDIS_URL", "Redis connection URL"),
    ("DOCSHIFT_PREFIX", "Key namespace for documents and the checkpoint"),
    ("RUST_LOG", "Log filter, e.g. docshift=debug"),
];

#[derive(Parser)]
#[command(name = "docshift")]
#[command(version)]
#[command(
    about = "Versioned, checkpointed migrations for Redis document stores",
    long_about = r#"Migration runner for Redis document stores that provides:

• Exactly-once steps applied in ascending version order
• A single checkpoint record with a dirty flag for interrupted runs
• Per-step MULTI/EXEC transactions for steps that ask for one

Commands:
  status    Show the current checkpoint
  resolve   Clear a dirty checkpoint after manual recovery
  demo      Apply the bundled example migrations
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Enable verbose output and debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Path to a config file (default: ./docshift.toml when present)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", global = true)]
    redis_url: Option<String>,

    /// Key namespace
    #[arg(long, env = "DOCSHIFT_PREFIX", global = true)]
    prefix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current migration checkpoint
    Status,

    /// Clear a dirty checkpoint after manual recovery
    Resolve(ResolveArgs),

    /// Apply the bundled example migrations
    Demo(DemoArgs),
}

fn build_cli_command() -> Command {
    let use_color = ShouldColorize::from_env().should_colorize();
    let mut command = Cli::command()
        .after_long_help(render_top_level_appendix(use_color))
        .styles(help_styles())
        .color(if use_color { ColorChoice::Auto } else { ColorChoice::Never });

    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            let updated = subcommand.clone().after_long_help(render_examples(example.groups, use_color));
            *subcommand = updated;
        }
    }
    command
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let mut buffer = String::new();
    let _ = writeln!(buffer, "{}", stylize("Examples:", THEME.highlight, true, use_color));

    for (index, group) in groups.iter().enumerate() {
        let _ = writeln!(buffer, "  {}", stylize(group.title, THEME.primary, true, use_color));
        for command in group.commands {
            let arrow = stylize(ICONS.arrow, THEME.secondary, false, use_color);
            let _ = writeln!(buffer, "    {arrow} {}", stylize(command, THEME.secondary, false, use_color));
        }
        if index + 1 < groups.len() {
            buffer.push('\n');
        }
    }
    buffer
}

fn render_top_level_appendix(use_color: bool) -> String {
    let mut buffer = String::new();

    let _ = writeln!(buffer, "{}", stylize("Environment Variables:", THEME.highlight, true, use_color));
    for (key, description) in ENVIRONMENT_VARIABLES {
        let key_text = stylize(key, THEME.key, true, use_color);
        let value_text = stylize(description, THEME.value, false, use_color);
        let _ = writeln!(buffer, "  {key_text}  {value_text}");
    }

    buffer.push('\n');
    let tip_heading = stylize("Tip:", THEME.highlight, true, use_color);
    let tip_text = stylize(
        "Use 'docshift <command> --help' to view examples for each command.",
        THEME.secondary,
        false,
        use_color,
    );
    let _ = writeln!(buffer, "{tip_heading} {tip_text}");
    buffer
}

fn stylize(text: &str, color: ThemeColor, bold: bool, use_color: bool) -> String {
    match (use_color, bold) {
        (false, _) => text.to_string(),
        (true, true) => text.color(color).bold().to_string(),
        (true, false) => text.color(color).to_string(),
    }
}

fn help_styles() -> Styles {
    Styles::styled()
        .usage(style_from_color(THEME.primary).bold())
        .header(style_from_color(THEME.highlight).bold())
        .literal(style_from_color(THEME.secondary))
        .placeholder(style_from_color(THEME.muted))
        .valid(style_from_color(THEME.success))
        .invalid(style_from_color(THEME.warning))
        .error(style_from_color(THEME.error).bold())
}

fn style_from_color(color: ThemeColor) -> Style {
    let ansi = match color {
        ThemeColor::Red => AnsiColor::Red,
        ThemeColor::Green => AnsiColor::Green,
        ThemeColor::Yellow => AnsiColor::Yellow,
        ThemeColor::Blue => AnsiColor::Blue,
        ThemeColor::Magenta => AnsiColor::Magenta,
        ThemeColor::Cyan => AnsiColor::Cyan,
        ThemeColor::BrightBlack => AnsiColor::BrightBlack,
        ThemeColor::BrightBlue => AnsiColor::BrightBlue,
        ThemeColor::BrightCyan => AnsiColor::BrightCyan,
        _ => AnsiColor::White,
    };
    Style::new().fg_color(Some(ClapColor::Ansi(ansi)))
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "docshift=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

#[tokio::main]
async fn main() {
    let matches = build_cli_command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    init_logging(cli.verbose);

    if let Err(err) = execute(cli).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    });

    let overrides = Overrides {
        config_path: cli.config,
        redis_url: cli.redis_url,
        prefix: cli.prefix,
    };
    let working_dir = std::env::current_dir()?;
    let settings = Settings::load(overrides, &working_dir)?;

    match cli.command {
        Commands::Status => handle_status(&settings, &output).await,
        Commands::Resolve(args) => handle_resolve(args, &settings, &output).await,
        Commands::Demo(args) => handle_demo(args, &settings, &output).await,
    }
}
