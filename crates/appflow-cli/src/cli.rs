//! CLI argument definitions for the app runner.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "appflow",
    version,
    about = "Run app instances from the command line",
    long_about = "Load an app instance, edit its form data, validate it and move it\n\
                  through its process.\n\n\
                  Settings come from an optional JSON config file; flags override it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow form values in trace logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load the current task and print what was loaded.
    Run(ConnectArgs),

    /// Run client-side validation on the current form data.
    Validate(ValidateArgs),

    /// Apply field updates and save the form data.
    Save(EditArgs),

    /// Apply field updates, validate and advance the process.
    Submit(SubmitArgs),

    /// Wait for the process to move to another task.
    Poll(ConnectArgs),
}

/// Where the app and instance live.
#[derive(Args, Clone)]
pub struct ConnectArgs {
    /// JSON config file.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// App root URL (e.g. https://ttd.apps.altinn.no/ttd/my-app).
    #[arg(long = "base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Instance as PARTY_ID/INSTANCE_GUID. Omit for stateless apps.
    #[arg(long = "instance", value_name = "ID")]
    pub instance: Option<String>,

    /// Language of the text resources.
    #[arg(long = "language", value_name = "LANG")]
    pub language: Option<String>,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Check required fields as a submission would.
    #[arg(long = "complete")]
    pub complete: bool,
}

#[derive(Args)]
pub struct EditArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Field update as PATH=VALUE (repeatable).
    #[arg(long = "set", value_name = "PATH=VALUE")]
    pub set: Vec<String>,
}

#[derive(Args)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub edit: EditArgs,

    /// Block submission when validation reports warnings.
    #[arg(long = "stop-on-warnings")]
    pub stop_on_warnings: bool,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_submit_collects_updates() {
        let cli = Cli::parse_from([
            "appflow",
            "submit",
            "--base-url",
            "https://app.test/org/app",
            "--set",
            "Person.Name=Kari",
            "--set",
            "Person.Age=30",
            "--stop-on-warnings",
        ]);
        let Command::Submit(args) = cli.command else {
            panic!("expected submit");
        };
        assert_eq!(args.edit.set, vec!["Person.Name=Kari", "Person.Age=30"]);
        assert!(args.stop_on_warnings);
        assert_eq!(args.edit.connect.instance, None);
    }
}
