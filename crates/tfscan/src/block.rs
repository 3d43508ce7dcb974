//! configuration tree: [Block]s holding [Attribute]s and nested [Block]s
//!
//! Rule checks navigate the tree through [BlockRef] and [AttributeRef]. Both have a `Nil` variant
//! that stands in for anything absent, so lookups chain without checks:
//!
//! ```
//! # use tfscan::block::Block;
//! let instance = Block::new("resource", ["google_compute_instance", "x"]);
//! let key = instance.get_block("boot_disk").get_attribute("disk_encryption_key_raw");
//! assert!(key.is_nil());
//! assert!(!key.is_true());
//! ```
use crate::hcl_documents::{Source, SourceFile};
use crate::util::Reference;
use crate::value::Value;
use crate::visit::VisitTraversalsMut;
use hcl_edit::Span;
use std::sync::OnceLock;

static UNKNOWN: Value = Value::Unknown;

/// Where a block or attribute is written: file and 1-based inclusive lines
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct SourceRange {
    pub source: Source,
    pub start_line: usize,
    pub end_line: usize,
}

impl SourceRange {
    fn from_span(source: &SourceFile, span: Option<std::ops::Range<usize>>) -> Self {
        let (start_line, end_line) = source.lines_of(span);
        Self {
            source: source.path().clone(),
            start_line,
            end_line,
        }
    }
}

impl std::fmt::Display for SourceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(path) => write!(f, "{}:{}", path.display(), self.start_line)?,
            None => write!(f, "<input>:{}", self.start_line)?,
        }
        if self.end_line > self.start_line {
            write!(f, "-{}", self.end_line)?;
        }
        Ok(())
    }
}

/// A named expression inside a block
///
/// The resolved value is computed once (see [crate::resolve]) and kept for the lifetime of the
/// module graph, together with the length of the longest reference chain it was resolved through.
#[derive(Debug)]
pub struct Attribute {
    name: String,
    expression: hcl::Expression,
    range: SourceRange,
    value: OnceLock<(Value, usize)>,
}

impl Attribute {
    pub fn new(
        name: impl Into<String>,
        expression: impl Into<hcl::Expression>,
        range: SourceRange,
    ) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            range,
            value: OnceLock::new(),
        }
    }

    fn from_hcl(attribute: &hcl_edit::structure::Attribute, source: &SourceFile) -> Self {
        Self::new(
            attribute.key.value().as_str(),
            hcl::Expression::from(attribute.value.clone()),
            SourceRange::from_span(source, attribute.span()),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> &hcl::Expression {
        &self.expression
    }

    pub fn range(&self) -> &SourceRange {
        &self.range
    }

    /// Resolved value, [Value::Unknown] if it has not been resolved
    pub fn value(&self) -> &Value {
        self.value.get().map_or(&UNKNOWN, |(value, _)| value)
    }

    /// Resolved value and its chain height
    pub(crate) fn cached(&self) -> Option<(&Value, usize)> {
        self.value.get().map(|(value, height)| (value, *height))
    }

    /// Store the resolved value unless another resolution got there first
    pub(crate) fn memoize(&self, value: Value, height: usize) -> &Value {
        &self.value.get_or_init(|| (value, height)).0
    }

    /// All references in the expression, in source order
    pub fn references(&self) -> Vec<Reference> {
        let mut references = vec![];
        let mut expression = self.expression.clone();
        let mut collect = |traversal: &mut hcl::Traversal| {
            if let Some((reference, _)) = Reference::parse(traversal) {
                references.push(reference);
            }
        };
        expression.visit_traversals_mut(&mut collect);
        references
    }
}

/// A typed, labeled node: `resource "aws_mq_broker" "main" { ... }`
#[derive(Debug)]
pub struct Block {
    kind: String,
    labels: Vec<String>,
    attributes: indexmap::IndexMap<String, Attribute>,
    blocks: Vec<Block>,
    range: SourceRange,
}

impl Block {
    pub fn new<L: Into<String>>(kind: impl Into<String>, labels: impl IntoIterator<Item = L>) -> Self {
        Self {
            kind: kind.into(),
            labels: labels.into_iter().map(Into::into).collect(),
            attributes: Default::default(),
            blocks: Default::default(),
            range: Default::default(),
        }
    }

    pub(crate) fn from_hcl(block: &hcl_edit::structure::Block, source: &SourceFile) -> Self {
        let mut this = Self::new(
            block.ident.value().as_str(),
            block.labels.iter().map(|label| label.as_str()),
        );
        this.range = SourceRange::from_span(source, block.span());

        for attribute in block.body.attributes() {
            this.push_attribute(Attribute::from_hcl(attribute, source));
        }
        for child in block.body.blocks() {
            this.push_block(Block::from_hcl(child, source));
        }

        this
    }

    pub fn with_range(mut self, range: SourceRange) -> Self {
        self.range = range;
        self
    }

    /// Adds an attribute. An existing attribute of the same name is kept.
    pub fn push_attribute(&mut self, attribute: Attribute) {
        if self.attributes.contains_key(attribute.name()) {
            tracing::debug!(block = %self.full_name(), attribute = attribute.name(), "duplicate attribute ignored");
            return;
        }
        self.attributes.insert(attribute.name.clone(), attribute);
    }

    pub fn push_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Block type: `resource`, `variable`, or the name of a nested block
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn range(&self) -> &SourceRange {
        &self.range
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn is_resource_or_data(&self) -> bool {
        matches!(self.kind.as_str(), "resource" | "data")
    }

    /// First label of a `resource`/`data` block (`aws_mq_broker`), empty otherwise
    pub fn type_label(&self) -> &str {
        match self.label(0) {
            Some(label) if self.is_resource_or_data() => label,
            _ => "",
        }
    }

    /// Last label: the local name of a resource, the name of a variable
    pub fn name_label(&self) -> &str {
        self.labels.last().map(String::as_str).unwrap_or_default()
    }

    /// `type.label0.label1...`
    pub fn full_name(&self) -> String {
        std::iter::once(self.kind.as_str())
            .chain(self.labels.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn get_attribute(&self, name: &str) -> AttributeRef<'_> {
        self.attributes.get(name).into()
    }

    /// First nested block of the given type
    pub fn get_block(&self, name: &str) -> BlockRef<'_> {
        self.blocks.iter().find(|b| b.kind == name).into()
    }

    /// All nested blocks of the given type
    pub fn get_blocks(&self, name: &str) -> Vec<&Block> {
        self.blocks.iter().filter(|b| b.kind == name).collect()
    }

    /// Attribute behind a dotted path of nested blocks: `boot_disk.disk_encryption_key_raw`
    pub fn get_nested_attribute(&self, path: &str) -> AttributeRef<'_> {
        BlockRef::Present(self).get_nested_attribute(path)
    }

    pub fn has_child(&self, name: &str) -> bool {
        !self.get_block(name).is_nil()
    }

    pub fn missing_child(&self, name: &str) -> bool {
        !self.has_child(name)
    }
}

/// A block, or the absence of one
#[derive(Debug, Clone, Copy)]
pub enum BlockRef<'a> {
    Present(&'a Block),
    Nil,
}

impl<'a> From<Option<&'a Block>> for BlockRef<'a> {
    fn from(value: Option<&'a Block>) -> Self {
        value.map_or(BlockRef::Nil, BlockRef::Present)
    }
}

impl<'a> From<&'a Block> for BlockRef<'a> {
    fn from(value: &'a Block) -> Self {
        BlockRef::Present(value)
    }
}

impl<'a> BlockRef<'a> {
    pub fn is_nil(&self) -> bool {
        matches!(self, BlockRef::Nil)
    }

    pub fn get(&self) -> Option<&'a Block> {
        match self {
            BlockRef::Present(block) => Some(block),
            BlockRef::Nil => None,
        }
    }

    pub fn kind(&self) -> &'a str {
        self.get().map(Block::kind).unwrap_or_default()
    }

    pub fn type_label(&self) -> &'a str {
        self.get().map(Block::type_label).unwrap_or_default()
    }

    pub fn name_label(&self) -> &'a str {
        self.get().map(Block::name_label).unwrap_or_default()
    }

    pub fn full_name(&self) -> String {
        self.get().map(Block::full_name).unwrap_or_default()
    }

    pub fn range(&self) -> Option<&'a SourceRange> {
        self.get().map(Block::range)
    }

    pub fn get_attribute(&self, name: &str) -> AttributeRef<'a> {
        match self {
            BlockRef::Present(block) => block.get_attribute(name),
            BlockRef::Nil => AttributeRef::Nil,
        }
    }

    pub fn get_block(&self, name: &str) -> BlockRef<'a> {
        match self {
            BlockRef::Present(block) => block.get_block(name),
            BlockRef::Nil => BlockRef::Nil,
        }
    }

    pub fn get_blocks(&self, name: &str) -> Vec<&'a Block> {
        match self {
            BlockRef::Present(block) => block.get_blocks(name),
            BlockRef::Nil => vec![],
        }
    }

    pub fn get_nested_attribute(&self, path: &str) -> AttributeRef<'a> {
        let Some((blocks, attribute)) = path.rsplit_once('.') else {
            return self.get_attribute(path);
        };

        blocks
            .split('.')
            .fold(*self, |block, name| block.get_block(name))
            .get_attribute(attribute)
    }

    pub fn has_child(&self, name: &str) -> bool {
        !self.get_block(name).is_nil()
    }

    pub fn missing_child(&self, name: &str) -> bool {
        !self.has_child(name)
    }
}

/// An attribute, or the absence of one
///
/// Every query on `Nil` or on an attribute that resolved to [Value::Unknown] answers "no match".
/// [AttributeRef::is_nil] and [AttributeRef::is_resolvable] tell the two apart.
#[derive(Debug, Clone, Copy)]
pub enum AttributeRef<'a> {
    Present(&'a Attribute),
    Nil,
}

impl<'a> From<Option<&'a Attribute>> for AttributeRef<'a> {
    fn from(value: Option<&'a Attribute>) -> Self {
        value.map_or(AttributeRef::Nil, AttributeRef::Present)
    }
}

impl<'a> From<&'a Attribute> for AttributeRef<'a> {
    fn from(value: &'a Attribute) -> Self {
        AttributeRef::Present(value)
    }
}

impl<'a> AttributeRef<'a> {
    pub fn get(&self) -> Option<&'a Attribute> {
        match self {
            AttributeRef::Present(attribute) => Some(attribute),
            AttributeRef::Nil => None,
        }
    }

    /// The attribute is absent
    pub fn is_nil(&self) -> bool {
        matches!(self, AttributeRef::Nil)
    }

    /// The attribute is present and its value is known
    pub fn is_resolvable(&self) -> bool {
        !self.value().is_unknown()
    }

    pub fn name(&self) -> &'a str {
        self.get().map(Attribute::name).unwrap_or_default()
    }

    pub fn range(&self) -> Option<&'a SourceRange> {
        self.get().map(Attribute::range)
    }

    pub fn value(&self) -> &'a Value {
        self.get().map_or(&UNKNOWN, Attribute::value)
    }

    pub fn references(&self) -> Vec<Reference> {
        self.get().map(Attribute::references).unwrap_or_default()
    }

    pub fn is_true(&self) -> bool {
        self.value().is_true()
    }

    pub fn is_false(&self) -> bool {
        self.value().is_false()
    }

    pub fn is_any<I>(&self, candidates: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.value().is_any(candidates)
    }

    pub fn is_not_any<I>(&self, candidates: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.value().is_not_any(candidates)
    }

    pub fn is_empty(&self) -> bool {
        self.value().is_empty()
    }

    pub fn equals(&self, other: impl Into<Value>) -> bool {
        self.value().equals(&other.into())
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.value().starts_with(prefix)
    }

    pub fn ends_with(&self, suffix: &str) -> bool {
        self.value().ends_with(suffix)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.value().contains(needle)
    }

    pub fn greater_than(&self, bound: f64) -> bool {
        self.value().greater_than(bound)
    }

    pub fn less_than(&self, bound: f64) -> bool {
        self.value().less_than(bound)
    }

    pub fn is_string(&self) -> bool {
        self.value().is_string()
    }

    pub fn is_number(&self) -> bool {
        self.value().is_number()
    }

    pub fn is_bool(&self) -> bool {
        self.value().is_bool()
    }

    pub fn as_str(&self) -> Option<&'a str> {
        self.value().as_str()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hcl_documents;
    use pretty_assertions::assert_eq;

    fn first_block(docs: &hcl_documents::HclDocuments) -> Block {
        let (_, source, block) = docs.get_block(0);
        Block::from_hcl(block, source)
    }

    #[test]
    fn nil_attribute_never_matches() {
        let block = Block::new("resource", ["aws_mq_broker", "x"]);
        let attribute = block.get_attribute("publicly_accessible");

        assert!(attribute.is_nil());
        assert!(!attribute.is_resolvable());
        assert!(!attribute.is_true());
        assert!(!attribute.is_false());
        assert!(!attribute.is_not_any(["a", "b"]));
        assert!(!attribute.is_empty());
        assert!(!attribute.equals(""));
        assert_eq!(attribute.name(), "");
    }

    #[test]
    fn nil_block_chains() {
        let block = Block::new("resource", ["google_compute_disk", "x"]);
        let nested = block.get_block("disk_encryption_key").get_block("deeper");

        assert!(nested.is_nil());
        assert!(nested.get_attribute("kms_key_self_link").is_nil());
        assert!(nested.get_blocks("anything").is_empty());
        assert_eq!(nested.full_name(), "");
        assert!(block
            .get_nested_attribute("disk_encryption_key.kms_key_self_link")
            .is_nil());
    }

    #[test]
    fn built_from_hcl() {
        let docs = hcl_documents! {"main.tf" => r#"
resource "google_compute_instance" "x" {
  name = "test"

  boot_disk {
    disk_encryption_key_raw = "something"
  }
}
"#};
        let block = first_block(&docs);

        assert_eq!(block.kind(), "resource");
        assert_eq!(block.type_label(), "google_compute_instance");
        assert_eq!(block.name_label(), "x");
        assert_eq!(block.full_name(), "resource.google_compute_instance.x");
        assert_eq!(block.range().start_line, 2);
        assert_eq!(block.range().end_line, 8);

        let raw_key = block.get_nested_attribute("boot_disk.disk_encryption_key_raw");
        assert!(!raw_key.is_nil());
        assert_eq!(raw_key.range().map(|r| r.start_line), Some(6));
        assert!(block.has_child("boot_disk"));
        assert!(block.missing_child("scratch_disk"));
    }

    #[test]
    fn collects_references() {
        let docs = hcl_documents! {r#"
resource "aws_s3_bucket_policy" "x" {
  bucket = "${aws_s3_bucket.logs.id}-${var.suffix}"
}
"#};
        let block = first_block(&docs);

        assert_eq!(
            block.get_attribute("bucket").references(),
            vec![
                Reference::Resource {
                    kind: "aws_s3_bucket".into(),
                    name: "logs".into(),
                    attribute: "id".into()
                },
                Reference::Variable("suffix".into()),
            ]
        );
    }

    #[test]
    fn type_label_only_for_resources_and_data() {
        assert_eq!(Block::new("provider", ["aws"]).type_label(), "");
        assert_eq!(Block::new("data", ["aws_iam_policy", "p"]).type_label(), "aws_iam_policy");
    }
}
