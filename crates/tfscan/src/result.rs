//! findings
//!
//! A check returns a [ResultSet]: messages anchored to the block or attribute they are about. The
//! scanner stamps them with the rule's code and severity ([ScanResult]) and collects everything
//! into a [Report].
use crate::block::{Attribute, AttributeRef, Block, BlockRef, SourceRange};
use crate::rule::{Rule, Severity};

/// Where a finding points. Nil blocks/attributes have no location.
#[derive(Debug, Clone, Default)]
pub struct Anchor(Option<SourceRange>);

impl From<&Block> for Anchor {
    fn from(value: &Block) -> Self {
        Anchor(Some(value.range().clone()))
    }
}

impl From<BlockRef<'_>> for Anchor {
    fn from(value: BlockRef<'_>) -> Self {
        Anchor(value.range().cloned())
    }
}

impl From<&Attribute> for Anchor {
    fn from(value: &Attribute) -> Self {
        Anchor(Some(value.range().clone()))
    }
}

impl From<AttributeRef<'_>> for Anchor {
    fn from(value: AttributeRef<'_>) -> Self {
        Anchor(value.range().cloned())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    message: String,
    anchor: Anchor,
    severity: Option<Severity>,
}

/// Findings of one check invocation, in the order they were added
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    entries: Vec<Entry>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: impl Into<String>, anchor: impl Into<Anchor>) {
        self.entries.push(Entry {
            message: message.into(),
            anchor: anchor.into(),
            severity: None,
        });
    }

    /// Like [ResultSet::add], overriding the rule's severity
    pub fn add_with_severity(
        &mut self,
        message: impl Into<String>,
        anchor: impl Into<Anchor>,
        severity: Severity,
    ) {
        self.entries.push(Entry {
            message: message.into(),
            anchor: anchor.into(),
            severity: Some(severity),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, other: ResultSet) {
        self.entries.extend(other.entries);
    }

    /// Stamp every entry with the rule; unanchored entries point at `block`
    pub(crate) fn into_results(self, rule: &Rule, block: &Block) -> Vec<ScanResult> {
        let code = rule.code();
        self.entries
            .into_iter()
            .map(|entry| {
                ScanResult::new(
                    code.clone(),
                    entry.severity.unwrap_or(rule.severity()),
                    entry.message,
                    ResultKind::Finding,
                    entry.anchor.0.unwrap_or_else(|| block.range().clone()),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// A misconfiguration reported by a rule
    Finding,
    /// Something went wrong while scanning (a failing rule, a dangling module)
    Diagnostic,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ScanResult {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub kind: ResultKind,
    pub range: SourceRange,
}

impl ScanResult {
    pub fn new(
        code: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        kind: ResultKind,
        range: SourceRange,
    ) -> Self {
        Self {
            code: code.into(),
            severity,
            message: message.into(),
            kind,
            range,
        }
    }

    fn sort_key(&self) -> (&Option<std::path::PathBuf>, usize, &str) {
        (&self.range.source, self.range.start_line, &self.code)
    }
}

impl std::fmt::Display for ScanResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.severity, self.code, self.range, self.message
        )
    }
}

/// Everything a scan produced, ordered by file, line and code
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(transparent)]
pub struct Report {
    results: Vec<ScanResult>,
}

impl Report {
    pub fn new(mut results: Vec<ScanResult>) -> Self {
        // stable: results on the same line keep check order
        results.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Self { results }
    }

    pub fn results(&self) -> &[ScanResult] {
        &self.results
    }

    pub fn findings(&self) -> impl Iterator<Item = &ScanResult> {
        self.results
            .iter()
            .filter(|result| result.kind == ResultKind::Finding)
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &ScanResult> {
        self.results
            .iter()
            .filter(|result| result.kind == ResultKind::Diagnostic)
    }

    pub fn has_findings(&self) -> bool {
        self.findings().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::module::Module;
    use crate::rule::Provider;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn noop(_: &Block, _: &Module) -> ResultSet {
        ResultSet::new()
    }

    fn range(file: &str, line: usize) -> SourceRange {
        SourceRange {
            source: Some(PathBuf::from(file)),
            start_line: line,
            end_line: line,
        }
    }

    #[test]
    fn unanchored_entries_fall_back_to_the_block() {
        let rule = Rule::new(Provider::Aws, "mq", "no-public-access", Severity::High, noop);
        let block = Block::new("resource", ["aws_mq_broker", "x"]).with_range(range("main.tf", 3));

        let mut results = ResultSet::new();
        results.add("absent", block.get_attribute("missing"));
        results.add_with_severity("critical", &block, Severity::Critical);

        let results = results.into_results(&rule, &block);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].range, range("main.tf", 3));
        assert_eq!(results[0].severity, Severity::High);
        assert_eq!(results[0].code, "aws-mq-no-public-access");
        assert_eq!(results[1].severity, Severity::Critical);
    }

    #[test]
    fn report_is_ordered_by_file_line_and_code() {
        let result = |code: &str, file: &str, line: usize| {
            ScanResult::new(code, Severity::Low, code, ResultKind::Finding, range(file, line))
        };
        let report = Report::new(vec![
            result("b", "b.tf", 1),
            result("z", "a.tf", 9),
            result("y", "a.tf", 2),
            result("x", "a.tf", 2),
        ]);

        let order: Vec<_> = report.results().iter().map(|r| r.code.as_str()).collect();
        assert_eq!(order, vec!["x", "y", "z", "b"]);
        assert!(report.has_findings());
        assert_eq!(report.diagnostics().count(), 0);
    }
}
