mod cli;

use anyhow::Context;
use std::io::Write;
use tfscan::registry::{Registry, RegistryBuilder};
use tfscan::result::Report;
use tfscan::scanner::{ScanOptions, Scanner};
use tfscan::value::Value;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("TFSCAN_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(2);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(2);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Scan(scan_cli) => scan(scan_cli),
        cli::Command::Rules(rules_cli) => rules(rules_cli).map(|()| false),
    };

    match command_result {
        Ok(false) => {}
        Ok(true) => std::process::exit(1),
        Err(e) => {
            for error in e.chain() {
                eprintln!("{error}")
            }
            std::process::exit(2);
        }
    }
}

fn registry() -> anyhow::Result<Registry> {
    let mut registry = RegistryBuilder::new();
    tfscan::rules::register_all(&mut registry)?;
    Ok(registry.finalize())
}

/// Returns whether there were findings
pub fn scan(cli: cli::ScanCommand) -> anyhow::Result<bool> {
    let dir = match cli.path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let mut inputs = indexmap::IndexMap::new();
    for tfvars_file in &cli.tfvars_files {
        let values = tfscan::loader::load_tfvars(tfvars_file)
            .with_context(|| format!("Failed to load {}", tfvars_file.display()))?;
        inputs.extend(values);
    }
    for (name, value) in cli.vars {
        inputs.insert(name, Value::from(value));
    }

    let graph = tfscan::loader::load_module_graph(&dir, inputs)
        .with_context(|| format!("Failed to load {}", dir.display()))?;

    let registry = registry()?;
    let options = ScanOptions::new(cli.excluded_codes, cli.minimum_severity);
    let report = Scanner::new(&registry, &options).scan(&graph);

    output_report(&cli.output, &report)?;
    Ok(report.has_findings())
}

fn output_report(output: &cli::OutputArgs, report: &Report) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Text => {
            let mut stdout = std::io::stdout().lock();
            for result in report.results() {
                writeln!(stdout, "{result}")?;
            }
            writeln!(
                stdout,
                "{} finding(s), {} diagnostic(s)",
                report.findings().count(),
                report.diagnostics().count()
            )?;
        }
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), report)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), report)?,
    };

    Ok(())
}

#[derive(serde::Serialize)]
struct RuleListing<'a> {
    code: String,
    provider: tfscan::rule::Provider,
    service: &'static str,
    severity: tfscan::rule::Severity,
    required_types: &'a [String],
    required_labels: &'a [String],
    documentation: &'a tfscan::rule::Documentation,
}

pub fn rules(cli: cli::RulesCommand) -> anyhow::Result<()> {
    let registry = registry()?;
    let listing: Vec<_> = registry
        .rules()
        .map(|rule| RuleListing {
            code: rule.code(),
            provider: rule.provider(),
            service: rule.service(),
            severity: rule.severity(),
            required_types: rule.required_types(),
            required_labels: rule.required_labels(),
            documentation: rule.documentation(),
        })
        .collect();

    match cli.output.format {
        cli::OutputFormat::Text => {
            let mut stdout = std::io::stdout().lock();
            for rule in &listing {
                writeln!(
                    stdout,
                    "{} [{}] {}",
                    rule.code, rule.severity, rule.documentation.summary
                )?;
            }
        }
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), &listing)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), &listing)?,
    };

    Ok(())
}
