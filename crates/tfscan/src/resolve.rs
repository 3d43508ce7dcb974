//! reference resolution
//!
//! Resolving an attribute means evaluating its expression with [hcl::eval]. Expressions refer to
//! other parts of the configuration (`var.x`, `local.y`, `module.m.out`, `aws_s3_bucket.b.arn`)
//! which [hcl::eval::Context] knows nothing about, so before evaluating we walk the expression's
//! traversals ([crate::visit]) and replace each reference with a fresh variable:
//!
//! `"${var.prefix}-logs"` becomes `"${tfscan__ref0}-logs"` with `tfscan__ref0` declared in the
//! context as the resolved value of the variable's default (or supplied value).
//!
//! Resolving a reference resolves the attribute behind it first, recursively. Attributes on the
//! current resolution path are tracked; meeting one again is a cycle and that link resolves to
//! [Value::Unknown]. Unknown references are not declared, so evaluation fails and the whole
//! expression becomes [Value::Unknown] too.
//!
//! Every resolved value is memoized in its [Attribute] along with its height: the number of
//! attributes on the longest reference chain starting at it. An attribute whose height exceeds
//! [MAX_DEPTH] is [Value::Unknown] no matter where resolution started. A value computed while the
//! path from the starting attribute was cut off at [MAX_DEPTH] is not memoized; it is resolved
//! again when resolution starts closer to it.
use crate::block::Attribute;
use crate::module::{Module, ModuleGraph, ModuleId};
use crate::util::{Reference, TraversalExt};
use crate::value::Value;
use crate::visit::{VisitMut, VisitTraversalsMut};
use hcl::eval::Evaluate;
use hcl::{Expression, Traversal};

/// Longest reference chain an attribute may resolve through
const MAX_DEPTH: usize = 64;

const BINDING_PREFIX: &str = "tfscan__ref";

/// Resolve every attribute of every module, nested blocks included
#[tracing::instrument(level = "debug", skip_all, fields(modules = graph.modules().len()))]
pub(crate) fn resolve_all(graph: &ModuleGraph) {
    let mut resolver = Resolver::new(graph);
    for module in graph.modules() {
        let mut pending: Vec<&crate::block::Block> = module.blocks().iter().collect();
        while let Some(block) = pending.pop() {
            for attribute in block.attributes() {
                resolver.resolve(module.id(), attribute);
            }
            pending.extend(block.blocks());
        }
    }
}

pub(crate) struct Resolver<'g> {
    graph: &'g ModuleGraph,
    frames: Vec<Frame<'g>>,
    bindings: usize,
}

/// An attribute on the current resolution path
struct Frame<'g> {
    attribute: &'g Attribute,
    /// Highest height among the references resolved so far
    height: usize,
    /// A reference below was cut off by the depth limit
    truncated: bool,
}

impl<'g> Resolver<'g> {
    pub(crate) fn new(graph: &'g ModuleGraph) -> Self {
        Self {
            graph,
            frames: vec![],
            bindings: 0,
        }
    }

    /// Value of an attribute that belongs to `module`
    pub(crate) fn resolve(&mut self, module: ModuleId, attribute: &'g Attribute) -> Value {
        if let Some((value, height)) = attribute.cached() {
            self.link(height, false);
            return value.clone();
        }

        if self.frames.iter().any(|frame| std::ptr::eq(frame.attribute, attribute)) {
            tracing::debug!(
                attribute = attribute.name(),
                range = %attribute.range(),
                "reference cycle, resolving to unknown"
            );
            self.link(0, false);
            return Value::Unknown;
        }

        if self.frames.len() >= MAX_DEPTH {
            tracing::trace!(
                attribute = attribute.name(),
                range = %attribute.range(),
                "depth limit reached"
            );
            self.link(0, true);
            return Value::Unknown;
        }

        self.frames.push(Frame {
            attribute,
            height: 0,
            truncated: false,
        });
        let value = self.evaluate(module, attribute.expression());
        let (height, truncated) = self
            .frames
            .pop()
            .map_or((1, false), |frame| (frame.height + 1, frame.truncated));

        if truncated && !self.frames.is_empty() {
            // only valid for the path it was reached by
            self.link(height, true);
            return value;
        }

        // cut off while resolving from here: the chain below is longer than the limit
        let height = if truncated { height.max(MAX_DEPTH + 1) } else { height };
        let value = if height > MAX_DEPTH {
            tracing::warn!(
                attribute = attribute.name(),
                range = %attribute.range(),
                "reference chain too deep, resolving to unknown"
            );
            Value::Unknown
        } else {
            value
        };

        tracing::trace!(attribute = attribute.name(), ?value, height, "resolved");
        let value = attribute.memoize(value, height).clone();
        self.link(height, false);
        value
    }

    /// Record a resolved reference on the attribute being resolved
    fn link(&mut self, height: usize, truncated: bool) {
        if let Some(frame) = self.frames.last_mut() {
            frame.height = frame.height.max(height);
            frame.truncated |= truncated;
        }
    }

    fn evaluate(&mut self, module: ModuleId, expression: &Expression) -> Value {
        let mut expression = expression.clone();

        let mut rewriter = ReferenceRewriter {
            resolver: self,
            module,
            bindings: vec![],
        };
        expression.visit_traversals_mut(&mut rewriter);
        let bindings = rewriter.bindings;

        let mut context = hcl::eval::Context::new();
        crate::functions::declare(&mut context);
        for (name, value) in bindings {
            context.declare_var(hcl::Identifier::unchecked(name), value);
        }

        match expression.evaluate(&context) {
            Ok(value) => value.into(),
            Err(errors) => {
                tracing::trace!(%errors, "expression not resolvable");
                Value::Unknown
            }
        }
    }

    fn resolve_reference(&mut self, module: ModuleId, reference: &Reference) -> Value {
        let graph = self.graph;
        let current = graph.module(module);

        match reference {
            Reference::Variable(name) => self.resolve_variable(current, name),
            Reference::Local(name) => match current.local(name).get() {
                Some(attribute) => self.resolve(module, attribute),
                None => Value::Unknown,
            },
            Reference::ModuleOutput { call, output } => {
                let Some(child) = current.child(call) else {
                    return Value::Unknown;
                };
                match graph.module(child).output(output).get_attribute("value").get() {
                    Some(attribute) => self.resolve(child, attribute),
                    None => Value::Unknown,
                }
            }
            Reference::Resource {
                kind,
                name,
                attribute,
            } => self.resolve_block_attribute(current, "resource", kind, name, attribute),
            Reference::Data {
                kind,
                name,
                attribute,
            } => self.resolve_block_attribute(current, "data", kind, name, attribute),
            Reference::Block { .. } => Value::Unknown,
        }
    }

    /// Supplied value (root inputs or the caller's module block), then default, then unknown
    fn resolve_variable(&mut self, module: &'g Module, name: &str) -> Value {
        let graph = self.graph;
        let declaration = module.variable(name);
        if declaration.is_nil() {
            tracing::debug!(module = module.path(), variable = name, "undeclared variable");
            return Value::Unknown;
        }

        match module.caller() {
            Some(call) => {
                let caller = graph.module(call.parent);
                if let Some(input) = caller.block(call.block).get_attribute(name).get() {
                    return self.resolve(call.parent, input);
                }
            }
            None => {
                if let Some(value) = graph.inputs().get(name) {
                    return value.clone();
                }
            }
        }

        match declaration.get_attribute("default").get() {
            Some(default) => self.resolve(module.id(), default),
            None => Value::Unknown,
        }
    }

    fn resolve_block_attribute(
        &mut self,
        module: &'g Module,
        block_kind: &str,
        kind: &str,
        name: &str,
        attribute: &str,
    ) -> Value {
        match module
            .find_block(block_kind, &[kind, name])
            .get_attribute(attribute)
            .get()
        {
            Some(target) => self.resolve(module.id(), target),
            None => Value::Unknown,
        }
    }

    fn next_binding(&mut self) -> String {
        let name = format!("{BINDING_PREFIX}{}", self.bindings);
        self.bindings += 1;
        name
    }
}

/// Replaces resolvable references with bindings that are declared in the evaluation context
struct ReferenceRewriter<'r, 'g> {
    resolver: &'r mut Resolver<'g>,
    module: ModuleId,
    bindings: Vec<(String, hcl::Value)>,
}

impl<'r, 'g> VisitMut<Traversal> for ReferenceRewriter<'r, 'g> {
    fn visit_mut(&mut self, traversal: &mut Traversal) {
        // was already rewritten
        if let Expression::Variable(var) = &traversal.expr {
            if var.starts_with(BINDING_PREFIX) {
                return;
            }
        }

        let Some((reference, len)) = Reference::parse(traversal) else {
            return;
        };

        let value = self.resolver.resolve_reference(self.module, &reference);
        let Some(value) = value.to_hcl() else {
            tracing::trace!(?reference, "reference is unknown");
            return;
        };

        let binding = self.resolver.next_binding();
        traversal.apply_substitution(
            Expression::Variable(hcl::Variable::unchecked(binding.clone())),
            len,
        );
        self.bindings.push((binding, value));
    }
}

#[cfg(test)]
mod test {
    use crate::hcl_documents;
    use crate::module::ModuleGraph;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn local(graph: &ModuleGraph, name: &str) -> Value {
        graph.root().local(name).value().clone()
    }

    #[test]
    fn literals_and_locals() {
        let docs = hcl_documents! {r#"
locals {
  name    = "logs"
  bucket  = "${local.name}-bucket"
  tags    = { env = "prod", name = local.name }
  enabled = !false
  count   = 2 + 3
}
"#};
        let mut builder = ModuleGraph::builder();
        builder.add_module(".", &docs);
        let graph = builder.build();

        assert_eq!(local(&graph, "bucket"), Value::from("logs-bucket"));
        assert_eq!(
            local(&graph, "tags"),
            Value::Map([("env".to_string(), "prod".into()), ("name".to_string(), "logs".into())].into_iter().collect())
        );
        assert_eq!(local(&graph, "enabled"), Value::Boolean(true));
        assert_eq!(local(&graph, "count"), Value::Integer(5));
    }

    #[test]
    fn variables_prefer_inputs_over_defaults() {
        let docs = hcl_documents! {r#"
variable "supplied" { default = "default" }
variable "defaulted" { default = "default" }
variable "missing" {}
locals {
  supplied  = var.supplied
  defaulted = var.defaulted
  missing   = var.missing
  undeclared = var.nope
}
"#};
        let mut builder = ModuleGraph::builder();
        builder.add_module(".", &docs);
        builder.input("supplied", "from input");
        let graph = builder.build();

        assert_eq!(local(&graph, "supplied"), Value::from("from input"));
        assert_eq!(local(&graph, "defaulted"), Value::from("default"));
        assert_eq!(local(&graph, "missing"), Value::Unknown);
        assert_eq!(local(&graph, "undeclared"), Value::Unknown);
    }

    #[test]
    fn resource_attributes_and_remaining_operators() {
        let docs = hcl_documents! {r#"
variable "zones" { default = ["a", "b"] }
resource "aws_s3_bucket" "logs" {
  bucket = "logs"
}
data "aws_kms_key" "main" {
  key_id = "alias/main"
}
locals {
  bucket   = aws_s3_bucket.logs.bucket
  computed = aws_s3_bucket.logs.arn
  key      = data.aws_kms_key.main.key_id
  zone     = var.zones[1]
  upper    = upper(aws_s3_bucket.logs.bucket)
}
"#};
        let mut builder = ModuleGraph::builder();
        builder.add_module(".", &docs);
        let graph = builder.build();

        assert_eq!(local(&graph, "bucket"), Value::from("logs"));
        assert_eq!(local(&graph, "computed"), Value::Unknown);
        assert_eq!(local(&graph, "key"), Value::from("alias/main"));
        assert_eq!(local(&graph, "zone"), Value::from("b"));
        assert_eq!(local(&graph, "upper"), Value::from("LOGS"));
    }

    #[test]
    fn self_reference_terminates() {
        let docs = hcl_documents! {r#"
locals {
  a = local.b
  b = local.a
  c = "${local.c}x"
}
"#};
        let mut builder = ModuleGraph::builder();
        builder.add_module(".", &docs);
        let graph = builder.build();

        assert_eq!(local(&graph, "a"), Value::Unknown);
        assert_eq!(local(&graph, "b"), Value::Unknown);
        assert_eq!(local(&graph, "c"), Value::Unknown);
    }

    #[test]
    fn cycle_across_modules_terminates() {
        let parent = hcl_documents! {r#"
module "child" {
  source = "./child"
  input  = local.from_child
}
locals {
  from_child = module.child.echo
}
"#};
        let child = hcl_documents! {r#"
variable "input" {}
output "echo" {
  value = var.input
}
"#};

        let mut builder = ModuleGraph::builder();
        let root = builder.add_module(".", &parent);
        let child = builder.add_module("child", &child);
        builder.add_call(root, "child", child);
        let graph = builder.build();

        assert_eq!(local(&graph, "from_child"), Value::Unknown);
        assert_eq!(
            graph.module(child).output("echo").get_attribute("value").value(),
            &Value::Unknown
        );
        assert!(graph.diagnostics().is_empty());
    }

    #[test]
    fn module_inputs_and_outputs() {
        let parent = hcl_documents! {r#"
module "storage" {
  source     = "./storage"
  encryption = "aws:kms"
}
locals {
  algorithm = module.storage.algorithm
}
"#};
        let child = hcl_documents! {r#"
variable "encryption" { default = "AES256" }
variable "versioning" { default = true }
resource "aws_s3_bucket" "b" {
  sse        = var.encryption
  versioning = var.versioning
}
output "algorithm" {
  value = aws_s3_bucket.b.sse
}
"#};

        let mut builder = ModuleGraph::builder();
        let root = builder.add_module(".", &parent);
        let child = builder.add_module("storage", &child);
        builder.add_call(root, "storage", child);
        let graph = builder.build();

        assert_eq!(local(&graph, "algorithm"), Value::from("aws:kms"));
        let bucket = graph.module(child).find_block("resource", &["aws_s3_bucket", "b"]);
        assert_eq!(bucket.get_attribute("versioning").value(), &Value::Boolean(true));
    }

    #[test]
    fn negation_and_comparison_in_conditions() {
        let docs = hcl_documents! {r#"
variable "private" { default = false }
variable "env" { default = "prod" }
locals {
  public   = !var.private
  size     = var.env == "prod" ? "large" : "small"
  combined = !var.private && var.env != "dev" ? 1 : 0
}
"#};
        let mut builder = ModuleGraph::builder();
        builder.add_module(".", &docs);
        let graph = builder.build();

        assert_eq!(local(&graph, "public"), Value::Boolean(true));
        assert_eq!(local(&graph, "size"), Value::from("large"));
        assert_eq!(local(&graph, "combined"), Value::Integer(1));
    }

    /// `l0 = local.l1`, ..., `l69 = local.l70`, `l70 = "end"`
    fn chain(reversed: bool) -> String {
        let mut lines: Vec<String> = (0..70)
            .map(|i| format!("  l{i} = local.l{}", i + 1))
            .chain(std::iter::once("  l70 = \"end\"".to_string()))
            .collect();
        if reversed {
            lines.reverse();
        }
        format!("locals {{\n{}\n}}\n", lines.join("\n"))
    }

    #[test]
    fn long_chains_do_not_depend_on_declaration_order() {
        for reversed in [false, true] {
            let docs = hcl_documents! { &chain(reversed) };
            let mut builder = ModuleGraph::builder();
            builder.add_module(".", &docs);
            let graph = builder.build();

            assert_eq!(local(&graph, "l70"), Value::from("end"), "reversed: {reversed}");
            assert_eq!(local(&graph, "l7"), Value::from("end"), "reversed: {reversed}");
            assert_eq!(local(&graph, "l6"), Value::Unknown, "reversed: {reversed}");
            assert_eq!(local(&graph, "l0"), Value::Unknown, "reversed: {reversed}");
        }
    }

    #[test]
    fn resolution_is_memoized() {
        let docs = hcl_documents! {r#"
locals {
  a = "x"
  b = [local.a, local.a]
}
"#};
        let mut builder = ModuleGraph::builder();
        builder.add_module(".", &docs);
        let graph = builder.build();

        let attribute = graph.root().local("b").get().expect("local b");
        let first = attribute.value() as *const Value;
        let mut resolver = super::Resolver::new(&graph);
        let again = resolver.resolve(graph.root().id(), attribute);

        assert_eq!(&again, attribute.value());
        assert_eq!(first, attribute.value() as *const Value);
    }
}
