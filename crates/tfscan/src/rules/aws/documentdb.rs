use crate::block::Block;
use crate::module::Module;
use crate::result::ResultSet;
use crate::rule::{Documentation, Provider, Rule, Severity};

const LOG_EXPORTS: [&str; 2] = ["audit", "profiler"];

pub(super) fn enable_log_export() -> Rule {
    Rule::new(
        Provider::Aws,
        "documentdb",
        "enable-log-export",
        Severity::Medium,
        check_enable_log_export,
    )
    .with_required_types(["resource"])
    .with_required_labels(["aws_docdb_cluster"])
    .with_documentation(Documentation {
        summary: "DocumentDB logs export should be enabled",
        explanation: "Document DB does not have auditing by default. To ensure that you are able \
                      to accurately audit the usage of your DocumentDB cluster you should enable \
                      export logs.",
        impact: "Limited visibility of audit trail for changes to the DocumentDB",
        resolution: "Enable export logs",
        links: vec![
            "https://registry.terraform.io/providers/hashicorp/aws/latest/docs/resources/docdb_cluster#enabled_cloudwatch_logs_exports",
        ],
        good_examples: vec![
            r#"
resource "aws_docdb_cluster" "good_example" {
  cluster_identifier      = "my-docdb-cluster"
  engine                  = "docdb"
  master_username         = "foo"
  master_password         = "mustbeeightchars"
  backup_retention_period = 5
  preferred_backup_window = "07:00-09:00"
  skip_final_snapshot     = true
  enabled_cloudwatch_logs_exports = "audit"
}
"#,
        ],
        bad_examples: vec![
            r#"
resource "aws_docdb_cluster" "bad_example" {
  cluster_identifier      = "my-docdb-cluster"
  engine                  = "docdb"
  master_username         = "foo"
  master_password         = "mustbeeightchars"
  backup_retention_period = 5
  preferred_backup_window = "07:00-09:00"
  skip_final_snapshot     = true
  enabled_cloudwatch_logs_exports = "something"
}
"#,
        ],
    })
}

fn check_enable_log_export(block: &Block, _: &Module) -> ResultSet {
    let mut results = ResultSet::new();

    let exports = block.get_attribute("enabled_cloudwatch_logs_exports");
    if exports.is_nil() {
        results.add(
            "Resource uses default value for enabled_cloudwatch_logs_exports",
            block,
        );
    } else if exports.is_not_any(LOG_EXPORTS) {
        results.add(
            "Resource does not have enabled_cloudwatch_logs_exports set to one of [audit profiler]",
            exports,
        );
    }

    results
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rules::test::scan_with;
    use pretty_assertions::assert_eq;

    #[test]
    fn log_exports() {
        let source = r#"
resource "aws_docdb_cluster" "missing" {}

resource "aws_docdb_cluster" "wrong" {
  enabled_cloudwatch_logs_exports = ["slowquery"]
}

resource "aws_docdb_cluster" "list" {
  enabled_cloudwatch_logs_exports = ["slowquery", "profiler"]
}

resource "aws_docdb_cluster" "unknown" {
  enabled_cloudwatch_logs_exports = var.undeclared
}
"#;
        assert_eq!(
            scan_with(enable_log_export(), source),
            vec![
                "aws-documentdb-enable-log-export medium:2 Resource uses default value for enabled_cloudwatch_logs_exports",
                "aws-documentdb-enable-log-export medium:5 Resource does not have enabled_cloudwatch_logs_exports set to one of [audit profiler]",
            ]
        );
    }
}
