//! running rules over a module graph
//!
//! For every module, every top-level block is offered to every enabled rule whose predicate
//! accepts it. Nested blocks are only visited when a rule asks for a nested type.
//!
//! A check that panics is isolated: the panic is caught, logged and turned into a diagnostic for
//! that block, and the scan carries on with the next rule.
use crate::block::Block;
use crate::module::{Module, ModuleGraph};
use crate::registry::Registry;
use crate::result::{Report, ResultKind, ScanResult};
use crate::rule::{Rule, Severity};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Which rules take part in a scan
#[derive(Debug, Clone, Default, derive_new::new)]
pub struct ScanOptions {
    /// Qualified rule codes that are skipped
    pub excluded_codes: Vec<String>,
    /// Rules below this severity are skipped
    pub minimum_severity: Option<Severity>,
}

impl ScanOptions {
    fn enabled(&self, rule: &Rule) -> bool {
        let code = rule.code();
        if self.excluded_codes.iter().any(|excluded| *excluded == code) {
            return false;
        }
        self.minimum_severity
            .map_or(true, |minimum| rule.severity() >= minimum)
    }
}

pub struct Scanner<'r> {
    rules: Vec<&'r Rule>,
    nested: bool,
}

impl<'r> Scanner<'r> {
    pub fn new(registry: &'r Registry, options: &ScanOptions) -> Self {
        let rules: Vec<_> = registry.rules().filter(|rule| options.enabled(rule)).collect();
        tracing::debug!(
            enabled = rules.len(),
            registered = registry.len(),
            "scanner configured"
        );
        Self {
            nested: registry.has_nested_rules()
                && rules.iter().any(|rule| rule.nested_types().next().is_some()),
            rules,
        }
    }

    /// Run every enabled rule. Never fails; problems become diagnostics in the report.
    #[tracing::instrument(level = "info", skip_all, fields(modules = graph.modules().len()))]
    pub fn scan(&self, graph: &ModuleGraph) -> Report {
        let mut results = graph.diagnostics().to_vec();

        for module in graph.modules() {
            for block in module.blocks() {
                for rule in &self.rules {
                    if rule.matches(block) {
                        results.extend(run(rule, block, module));
                    }
                }

                if self.nested {
                    self.scan_nested(block, module, &mut results);
                }
            }
        }

        let report = Report::new(results);
        tracing::info!(
            findings = report.findings().count(),
            diagnostics = report.diagnostics().count(),
            "scan complete"
        );
        report
    }

    fn scan_nested(&self, parent: &Block, module: &Module, results: &mut Vec<ScanResult>) {
        for block in parent.blocks() {
            for rule in &self.rules {
                if rule.matches_nested(block) {
                    results.extend(run(rule, block, module));
                }
            }
            self.scan_nested(block, module, results);
        }
    }
}

fn run(rule: &Rule, block: &Block, module: &Module) -> Vec<ScanResult> {
    match catch_unwind(AssertUnwindSafe(|| rule.check(block, module))) {
        Ok(results) => results.into_results(rule, block),
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            let code = rule.code();
            tracing::error!(%code, block = %block.full_name(), %reason, "rule failed");
            vec![ScanResult::new(
                code,
                Severity::Info,
                format!("Rule failed on {}: {reason}", block.full_name()),
                ResultKind::Diagnostic,
                block.range().clone(),
            )]
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown cause"
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hcl_documents;
    use crate::registry::RegistryBuilder;
    use crate::result::ResultSet;
    use crate::rule::Provider;
    use pretty_assertions::assert_eq;

    fn flag_every_block(block: &Block, _: &Module) -> ResultSet {
        let mut results = ResultSet::new();
        results.add(format!("saw {}", block.full_name()), block);
        results
    }

    fn explode(block: &Block, _: &Module) -> ResultSet {
        if block.name_label() == "bad" {
            panic!("assumed a label that is not there");
        }
        ResultSet::new()
    }

    fn graph() -> ModuleGraph {
        let docs = hcl_documents! {"main.tf" => r#"
resource "aws_mq_broker" "good" {
  logs {
    general = true
  }
}

resource "aws_mq_broker" "bad" {}

resource "aws_s3_bucket" "other" {}
"#};
        let mut builder = ModuleGraph::builder();
        builder.add_module(".", &docs);
        builder.build()
    }

    fn registry() -> Registry {
        let mut builder = RegistryBuilder::new();
        builder
            .register(
                Rule::new(Provider::Aws, "mq", "flagged", Severity::Low, flag_every_block)
                    .with_required_types(["resource"])
                    .with_required_labels(["aws_mq_broker"]),
            )
            .expect("valid");
        builder
            .register(
                Rule::new(Provider::Aws, "mq", "explodes", Severity::High, explode)
                    .with_required_types(["resource"]),
            )
            .expect("valid");
        builder
            .register(
                Rule::new(Provider::Aws, "mq", "logs", Severity::Medium, flag_every_block)
                    .with_required_types(["logs"]),
            )
            .expect("valid");
        builder.finalize()
    }

    fn render(report: &Report) -> Vec<String> {
        report
            .results()
            .iter()
            .map(|result| format!("{} {}", result.code, result.message))
            .collect()
    }

    #[test]
    fn rules_see_matching_blocks_only() {
        let registry = registry();
        let report = Scanner::new(&registry, &ScanOptions::default()).scan(&graph());

        assert_eq!(
            render(&report),
            vec![
                "aws-mq-flagged saw resource.aws_mq_broker.good",
                "aws-mq-logs saw logs",
                "aws-mq-explodes Rule failed on resource.aws_mq_broker.bad: assumed a label that is not there",
                "aws-mq-flagged saw resource.aws_mq_broker.bad",
            ]
        );
    }

    #[test]
    fn a_failing_rule_does_not_stop_the_scan() {
        let registry = registry();
        let report = Scanner::new(&registry, &ScanOptions::default()).scan(&graph());

        let diagnostics: Vec<_> = report.diagnostics().collect();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "aws-mq-explodes");
        assert_eq!(diagnostics[0].range.start_line, 8);
        assert_eq!(report.findings().count(), 3);
    }

    #[test]
    fn options_filter_rules() {
        let registry = registry();

        let options = ScanOptions::new(vec!["aws-mq-explodes".into()], None);
        let report = Scanner::new(&registry, &options).scan(&graph());
        assert_eq!(report.diagnostics().count(), 0);
        assert_eq!(report.findings().count(), 3);

        let options = ScanOptions::new(vec![], Some(Severity::Medium));
        let report = Scanner::new(&registry, &options).scan(&graph());
        assert_eq!(
            render(&report),
            vec![
                "aws-mq-logs saw logs",
                "aws-mq-explodes Rule failed on resource.aws_mq_broker.bad: assumed a label that is not there",
            ]
        );
    }

    #[test]
    fn graph_diagnostics_are_reported() {
        let docs = hcl_documents! {r#"module "vpc" { source = "git::https://example.com/vpc.git" }"#};
        let mut builder = ModuleGraph::builder();
        builder.add_module(".", &docs);
        let graph = builder.build();

        let registry = RegistryBuilder::new().finalize();
        let report = Scanner::new(&registry, &ScanOptions::default()).scan(&graph);
        assert_eq!(report.diagnostics().count(), 1);
        assert!(!report.has_findings());
    }
}
