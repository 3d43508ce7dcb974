use crate::block::Block;
use crate::module::Module;
use crate::result::ResultSet;
use crate::rule::{Documentation, Provider, Rule, Severity};

pub(super) fn disk_encryption_customer_key() -> Rule {
    Rule::new(
        Provider::Google,
        "compute",
        "disk-encryption-customer-key",
        Severity::Low,
        check_disk_encryption_customer_key,
    )
    .with_required_types(["resource"])
    .with_required_labels(["google_compute_disk"])
    .with_documentation(Documentation {
        summary: "Disks should be encrypted with Customer Supplied Encryption Keys",
        explanation: "Using unmanaged keys makes rotation and general management difficult.",
        impact: "Using unmanaged keys does not allow for proper management",
        resolution: "Use managed keys to encrypt disks.",
        links: vec![
            "https://registry.terraform.io/providers/hashicorp/google/latest/docs/resources/compute_disk#kms_key_self_link",
        ],
        good_examples: vec![
            r#"
resource "google_compute_disk" "good_example" {
  name  = "test-disk"
  type  = "pd-ssd"
  zone  = "us-central1-a"
  image = "debian-9-stretch-v20200805"
  labels = {
    environment = "dev"
  }
  physical_block_size_bytes = 4096
  disk_encryption_key {
    kms_key_self_link = "something"
  }
}
"#,
        ],
        bad_examples: vec![
            r#"
resource "google_compute_disk" "bad_example" {
  name  = "test-disk"
  type  = "pd-ssd"
  zone  = "us-central1-a"
  image = "debian-9-stretch-v20200805"
  labels = {
    environment = "dev"
  }
  physical_block_size_bytes = 4096
}
"#,
        ],
    })
}

fn check_disk_encryption_customer_key(block: &Block, _: &Module) -> ResultSet {
    let mut results = ResultSet::new();

    let key = block
        .get_block("disk_encryption_key")
        .get_attribute("kms_key_self_link");
    if key.is_nil() {
        results.add(
            "Resource uses default value for disk_encryption_key.kms_key_self_link",
            block,
        );
    } else if key.is_empty() {
        results.add(
            "Resource does not set disk_encryption_key.kms_key_self_link",
            key,
        );
    }

    results
}

pub(super) fn no_plaintext_vm_disk_keys() -> Rule {
    Rule::new(
        Provider::Google,
        "compute",
        "no-plaintext-vm-disk-keys",
        Severity::High,
        check_no_plaintext_vm_disk_keys,
    )
    .with_required_types(["resource"])
    .with_required_labels(["google_compute_instance"])
    .with_documentation(Documentation {
        summary: "VM disk encryption keys should not be provided in plaintext",
        explanation: "Providing your encryption key in plaintext format means anyone with access \
                      to the source code also has access to the key.",
        impact: "Compromise of encryption keys",
        resolution: "Use managed keys or provide the raw key via a secrets manager",
        links: vec![
            "https://registry.terraform.io/providers/hashicorp/google/latest/docs/resources/compute_instance#disk_encryption_key_raw",
        ],
        good_examples: vec![
            r#"
resource "google_compute_instance" "good_example" {
  name         = "test"
  machine_type = "e2-medium"
  zone         = "us-central1-a"

  boot_disk {
    initialize_params {
      image = "debian-cloud/debian-9"
    }
  }

  network_interface {
    network = "default"
  }
}
"#,
        ],
        bad_examples: vec![
            r#"
resource "google_compute_instance" "bad_example" {
  name         = "test"
  machine_type = "e2-medium"
  zone         = "us-central1-a"

  boot_disk {
    initialize_params {
      image = "debian-cloud/debian-9"
    }
    disk_encryption_key_raw = "something"
  }

  network_interface {
    network = "default"
  }
}
"#,
        ],
    })
}

fn check_no_plaintext_vm_disk_keys(block: &Block, _: &Module) -> ResultSet {
    let mut results = ResultSet::new();

    // only a key with a concrete value is exposed; unknown keys are not flagged
    let raw_key = block.get_nested_attribute("boot_disk.disk_encryption_key_raw");
    if raw_key.is_resolvable() {
        results.add(
            format!(
                "Resource '{}' sets boot_disk.disk_encryption_key_raw",
                block.full_name()
            ),
            raw_key,
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
    fn customer_key() {
        let source = r#"
resource "google_compute_disk" "default" {
  name = "default"
}

resource "google_compute_disk" "empty" {
  disk_encryption_key {
    kms_key_self_link = ""
  }
}

resource "google_compute_disk" "keyed" {
  disk_encryption_key {
    kms_key_self_link = google_kms_crypto_key.disk.id
  }
}
"#;
        assert_eq!(
            scan_with(disk_encryption_customer_key(), source),
            vec![
                "google-compute-disk-encryption-customer-key low:2 Resource uses default value for disk_encryption_key.kms_key_self_link",
                "google-compute-disk-encryption-customer-key low:8 Resource does not set disk_encryption_key.kms_key_self_link",
            ]
        );
    }

    #[test]
    fn plaintext_keys_need_a_concrete_value() {
        let source = r#"
variable "disk_key" {}

variable "default_key" {
  default = "c2VjcmV0"
}

resource "google_compute_instance" "unknown" {
  boot_disk {
    disk_encryption_key_raw = var.disk_key
  }
}

resource "google_compute_instance" "literal" {
  boot_disk {
    disk_encryption_key_raw = var.default_key
  }
}

resource "google_compute_instance" "none" {
  boot_disk {}
}
"#;
        assert_eq!(
            scan_with(no_plaintext_vm_disk_keys(), source),
            vec![
                "google-compute-no-plaintext-vm-disk-keys high:16 Resource 'resource.google_compute_instance.literal' sets boot_disk.disk_encryption_key_raw",
            ]
        );
    }
}
