//! tfscan cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;
use tfscan::rule::Severity;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; tfscan ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan a terraform directory
    ///
    /// Exits with status 1 when there are findings
    Scan(ScanCommand),

    /// List the bundled rules and their documentation
    Rules(RulesCommand),
}

#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Directory to scan (defaults to the work directory)
    pub path: Option<PathBuf>,

    /// Load root variable values from a .tfvars file
    ///
    /// Can be specified multiple times, later files win.
    #[clap(long = "tfvars-file")]
    pub tfvars_files: Vec<PathBuf>,

    /// Set a root variable: --var name=value (values are strings)
    #[clap(long = "var", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Skip a rule by its code, e.g. aws-mq-no-public-access
    #[clap(short = 'e', long = "exclude")]
    pub excluded_codes: Vec<String>,

    /// Skip rules below this severity
    #[clap(short = 's', long = "minimum-severity")]
    pub minimum_severity: Option<Severity>,

    #[clap(flatten)]
    pub output: OutputArgs,
}

fn parse_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{s}'")),
    }
}

#[derive(Parser, Debug)]
pub struct RulesCommand {
    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => f.write_str("text"),
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_arguments() {
        let cli = Cli::parse_from([
            "tfscan",
            "scan",
            "infra",
            "--var",
            "env=prod",
            "--exclude",
            "aws-mq-no-public-access",
            "--minimum-severity",
            "high",
            "-F",
            "json",
        ]);
        let Command::Scan(scan) = cli.command else {
            panic!("expected scan command");
        };
        assert_eq!(scan.path, Some(PathBuf::from("infra")));
        assert_eq!(scan.vars, vec![("env".to_string(), "prod".to_string())]);
        assert_eq!(scan.excluded_codes, vec!["aws-mq-no-public-access"]);
        assert_eq!(scan.minimum_severity, Some(Severity::High));
        assert!(matches!(scan.output.format, OutputFormat::Json));
    }

    #[test]
    fn malformed_var() {
        assert!(Cli::try_parse_from(["tfscan", "scan", "--var", "novalue"]).is_err());
    }
}
