use crate::block::Block;
use crate::module::Module;
use crate::result::ResultSet;
use crate::rule::{Documentation, Provider, Rule, Severity};

pub(super) fn no_public_access() -> Rule {
    Rule::new(
        Provider::Aws,
        "mq",
        "no-public-access",
        Severity::High,
        check_no_public_access,
    )
    .with_required_types(["resource"])
    .with_required_labels(["aws_mq_broker"])
    .with_documentation(Documentation {
        summary: "Ensure MQ Broker is not publicly exposed",
        explanation: "Public access of the MQ broker should be disabled and only allow routes to \
                      the applications that require access.",
        impact: "Publicly accessible MQ Broker may be vulnerable to compromise",
        resolution: "Disable public access when not required",
        links: vec![
            "https://registry.terraform.io/providers/hashicorp/aws/latest/docs/resources/mq_broker#publicly_accessible",
        ],
        good_examples: vec![
            r#"
resource "aws_mq_broker" "good_example" {
  broker_name = "example"

  configuration {
    id       = aws_mq_configuration.test.id
    revision = aws_mq_configuration.test.latest_revision
  }

  engine_type        = "ActiveMQ"
  engine_version     = "5.15.0"
  host_instance_type = "mq.t2.micro"
  security_groups    = [aws_security_group.test.id]

  user {
    username = "ExampleUser"
    password = "MindTheGap"
  }
  publicly_accessible = false
}
"#,
        ],
        bad_examples: vec![
            r#"
resource "aws_mq_broker" "bad_example" {
  broker_name = "example"

  configuration {
    id       = aws_mq_configuration.test.id
    revision = aws_mq_configuration.test.latest_revision
  }

  engine_type        = "ActiveMQ"
  engine_version     = "5.15.0"
  host_instance_type = "mq.t2.micro"
  security_groups    = [aws_security_group.test.id]

  user {
    username = "ExampleUser"
    password = "MindTheGap"
  }
  publicly_accessible = true
}
"#,
        ],
    })
}

fn check_no_public_access(block: &Block, _: &Module) -> ResultSet {
    let mut results = ResultSet::new();

    let publicly_accessible = block.get_attribute("publicly_accessible");
    if publicly_accessible.is_nil() {
        // the provider default is public
        results.add("Resource uses default value for publicly_accessible", block);
    } else if publicly_accessible.is_true() {
        results.add(
            "Resource does not have publicly_accessible set to false",
            publicly_accessible,
        );
    }

    results
}
