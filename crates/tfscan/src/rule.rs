//! rule definition
//!
//! A [Rule] is metadata plus a [Check]. The scanner calls the check for every block the rule's
//! predicate ([Rule::matches]) accepts.
//!
//! ```
//! use tfscan::block::Block;
//! use tfscan::module::Module;
//! use tfscan::result::ResultSet;
//! use tfscan::rule::{Provider, Rule, Severity};
//!
//! fn check(block: &Block, _: &Module) -> ResultSet {
//!     let mut results = ResultSet::new();
//!     let versioning = block.get_block("versioning").get_attribute("enabled");
//!     if versioning.is_false() {
//!         results.add("Bucket versioning is disabled", versioning);
//!     }
//!     results
//! }
//!
//! let rule = Rule::new(Provider::Aws, "s3", "enable-versioning", Severity::Medium, check)
//!     .with_required_types(["resource"])
//!     .with_required_labels(["aws_s3_bucket"]);
//! assert_eq!(rule.code(), "aws-s3-enable-versioning");
//! ```
use crate::block::Block;
use crate::module::{Module, TOP_LEVEL_TYPES};
use crate::result::ResultSet;

/// Inspects one block. Must not rely on evaluation order or mutate anything.
pub trait Check: Send + Sync {
    fn check(&self, block: &Block, module: &Module) -> ResultSet;
}

impl<F> Check for F
where
    F: Fn(&Block, &Module) -> ResultSet + Send + Sync,
{
    fn check(&self, block: &Block, module: &Module) -> ResultSet {
        self(block, module)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Low => f.write_str("low"),
            Severity::Medium => f.write_str("medium"),
            Severity::High => f.write_str("high"),
            Severity::Critical => f.write_str("critical"),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("unknown severity '{0}', expected one of critical, high, medium, low, info")]
pub struct SeverityParseError(String);

impl std::str::FromStr for Severity {
    type Err = SeverityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(SeverityParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Azure,
    Google,
    General,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Aws => f.write_str("aws"),
            Provider::Azure => f.write_str("azure"),
            Provider::Google => f.write_str("google"),
            Provider::General => f.write_str("general"),
        }
    }
}

/// Text for reports and generated documentation. Not used by the scanner.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Documentation {
    pub summary: &'static str,
    pub explanation: &'static str,
    pub impact: &'static str,
    pub resolution: &'static str,
    pub links: Vec<&'static str>,
    pub good_examples: Vec<&'static str>,
    pub bad_examples: Vec<&'static str>,
}

pub struct Rule {
    provider: Provider,
    service: &'static str,
    short_code: &'static str,
    severity: Severity,
    documentation: Documentation,
    required_types: Vec<String>,
    required_labels: Vec<String>,
    predicate: Option<fn(&Block) -> bool>,
    check: Box<dyn Check>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("code", &self.code())
            .field("severity", &self.severity)
            .field("required_types", &self.required_types)
            .field("required_labels", &self.required_labels)
            .finish_non_exhaustive()
    }
}

impl Rule {
    pub fn new(
        provider: Provider,
        service: &'static str,
        short_code: &'static str,
        severity: Severity,
        check: impl Check + 'static,
    ) -> Self {
        Self {
            provider,
            service,
            short_code,
            severity,
            documentation: Default::default(),
            required_types: vec![],
            required_labels: vec![],
            predicate: None,
            check: Box::new(check),
        }
    }

    /// Block types the rule applies to. Empty means any type.
    pub fn with_required_types<S: Into<String>>(mut self, types: impl IntoIterator<Item = S>) -> Self {
        self.required_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// First labels of `resource`/`data` blocks the rule applies to. Empty means any.
    ///
    /// A trailing `*` matches by prefix: `aws_*`.
    pub fn with_required_labels<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
        self.required_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Additional predicate a block has to satisfy
    pub fn with_predicate(mut self, predicate: fn(&Block) -> bool) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_documentation(mut self, documentation: Documentation) -> Self {
        self.documentation = documentation;
        self
    }

    /// `provider-service-short_code`, unique within a registry
    pub fn code(&self) -> String {
        format!("{}-{}-{}", self.provider, self.service, self.short_code)
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn short_code(&self) -> &'static str {
        self.short_code
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn documentation(&self) -> &Documentation {
        &self.documentation
    }

    pub fn required_types(&self) -> &[String] {
        &self.required_types
    }

    pub fn required_labels(&self) -> &[String] {
        &self.required_labels
    }

    /// Required types that only exist as nested blocks (`versioning`, `boot_disk`)
    pub fn nested_types(&self) -> impl Iterator<Item = &str> {
        self.required_types
            .iter()
            .map(String::as_str)
            .filter(|kind| !TOP_LEVEL_TYPES.contains(kind))
    }

    /// Does the rule apply to a top-level block
    pub fn matches(&self, block: &Block) -> bool {
        if !self.required_types.is_empty()
            && !self.required_types.iter().any(|kind| kind == block.kind())
        {
            return false;
        }

        if block.is_resource_or_data()
            && !self.required_labels.is_empty()
            && !self
                .required_labels
                .iter()
                .any(|pattern| label_matches(pattern, block.type_label()))
        {
            return false;
        }

        self.predicate.map_or(true, |predicate| predicate(block))
    }

    /// Does the rule apply to a nested block. Only rules naming the nested type explicitly do.
    pub fn matches_nested(&self, block: &Block) -> bool {
        self.nested_types().any(|kind| kind == block.kind())
            && self.predicate.map_or(true, |predicate| predicate(block))
    }

    pub fn check(&self, block: &Block, module: &Module) -> ResultSet {
        self.check.check(block, module)
    }
}

fn label_matches(pattern: &str, label: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => label.starts_with(prefix),
        None => pattern == label,
    }
}
