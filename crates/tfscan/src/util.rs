use hcl::expr::{BinaryOp, BinaryOperator, Conditional, Operation, UnaryOp, UnaryOperator};
use hcl::{Expression, Identifier, Traversal, TraversalOperator};

/// What a traversal such as `var.name` or `aws_s3_bucket.logs.arn` points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `var.<name>`
    Variable(String),
    /// `local.<name>`
    Local(String),
    /// `module.<call>.<output>`
    ModuleOutput { call: String, output: String },
    /// `<type>.<name>.<attribute>`
    Resource {
        kind: String,
        name: String,
        attribute: String,
    },
    /// `data.<type>.<name>.<attribute>`
    Data {
        kind: String,
        name: String,
        attribute: String,
    },
    /// `<type>.<name>` or `data.<type>.<name>` without an attribute
    Block { data: bool, kind: String, name: String },
}

/// Roots that are never backed by a block
const CONTEXT_ROOTS: &[&str] = &["count", "each", "path", "self", "terraform"];

impl Reference {
    /// Parse the reference at the start of a traversal
    ///
    /// Returns the reference and the number of path elements (root included) it consumed.
    pub fn parse(traversal: &Traversal) -> Option<(Reference, usize)> {
        let path = traversal.get_longest_path();
        let path: Vec<&str> = path.iter().map(|ident| ident.as_str()).collect();

        let reference = match path.as_slice() {
            ["var", name, ..] => (Reference::Variable(name.to_string()), 2),
            ["local", name, ..] => (Reference::Local(name.to_string()), 2),
            ["module", call, output, ..] => (
                Reference::ModuleOutput {
                    call: call.to_string(),
                    output: output.to_string(),
                },
                3,
            ),
            ["module", ..] | ["var"] | ["local"] => return None,
            ["data", kind, name, attribute, ..] => (
                Reference::Data {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    attribute: attribute.to_string(),
                },
                4,
            ),
            ["data", kind, name] => (
                Reference::Block {
                    data: true,
                    kind: kind.to_string(),
                    name: name.to_string(),
                },
                3,
            ),
            ["data", ..] => return None,
            [root, ..] if CONTEXT_ROOTS.contains(root) => return None,
            [kind, name, attribute, ..] => (
                Reference::Resource {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    attribute: attribute.to_string(),
                },
                3,
            ),
            [kind, name] => (
                Reference::Block {
                    data: false,
                    kind: kind.to_string(),
                    name: name.to_string(),
                },
                2,
            ),
            _ => return None,
        };

        Some(reference)
    }

    /// `(block type, labels)` of the block this reference lives in
    pub fn target(&self) -> Option<(&str, Vec<&str>)> {
        match self {
            Reference::Variable(name) => Some(("variable", vec![name.as_str()])),
            Reference::Local(_) => None,
            Reference::ModuleOutput { call, .. } => Some(("module", vec![call.as_str()])),
            Reference::Resource { kind, name, .. } | Reference::Block { data: false, kind, name } => {
                Some(("resource", vec![kind.as_str(), name.as_str()]))
            }
            Reference::Data { kind, name, .. } | Reference::Block { data: true, kind, name } => {
                Some(("data", vec![kind.as_str(), name.as_str()]))
            }
        }
    }
}

pub(crate) trait TraversalExt {
    fn apply_substitution(&mut self, expr: Expression, path_len: usize);
    fn get_longest_path(&self) -> Vec<Identifier>;
    fn squash(&mut self);
}

impl TraversalExt for Traversal {
    /// Replace the first `path_len` path elements (root included) with `expr`
    #[tracing::instrument(level = "trace")]
    fn apply_substitution(&mut self, expr: Expression, path_len: usize) {
        let remove = path_len.saturating_sub(1);

        self.expr = expr;

        if remove >= self.operators.len() {
            self.operators.clear();
        } else {
            self.operators.drain(..remove);
        }

        self.squash();

        tracing::trace!(traversal=?self, "after substitution");
    }

    fn get_longest_path(&self) -> Vec<Identifier> {
        let Expression::Variable(var) = &self.expr else {
            return vec![];
        };

        let mut path = vec![Identifier::unchecked(var.as_str())];
        for operator in &self.operators {
            let TraversalOperator::GetAttr(ident) = operator else {
                break;
            };

            path.push(ident.clone());
        }

        path
    }

    /// Squash nested Traversals
    ///
    /// If a [Traversal]'s Expression is a [hcl::Expression::Traversal]
    /// merge them as if they are one traversal.
    ///
    /// Turns `<foo.bar>.baz` into `foo.bar.baz`.
    fn squash(&mut self) {
        let Traversal {
            expr: Expression::Traversal(inner),
            operators,
            ..
        } = self
        else {
            return;
        };

        inner.operators.append(operators);
        std::mem::swap(&mut self.operators, &mut inner.operators);

        self.expr = std::mem::replace(&mut inner.expr, Expression::Null);
        tracing::trace!(traversal=?self, "traversal squashed")
    }
}

/// Repair operator nesting the parser gets wrong
///
/// - `!var.flag` arrives as `(!var).flag` and becomes `!(var.flag)`
/// - `a == b ? c : d` arrives as `a == (b ? c : d)` and becomes `(a == b) ? c : d`
///
/// Only the node itself and the right-hand operand chain below it are rewritten. Walk the tree and
/// apply it to every node to repair a whole expression.
pub(crate) fn reassociate(expr: &mut Expression) {
    match expr {
        Expression::Traversal(traversal) if is_unary(&traversal.expr) => {}
        Expression::Operation(operation) => match operation.as_mut() {
            Operation::Unary(unary) => reassociate(&mut unary.expr),
            Operation::Binary(binary) => reassociate(&mut binary.rhs_expr),
        },
        _ => return,
    }

    *expr = match std::mem::replace(expr, Expression::Null) {
        Expression::Traversal(traversal) => hoist_unary(*traversal),
        Expression::Operation(operation) => lift_conditional(*operation),
        other => other,
    };
}

fn is_unary(expr: &Expression) -> bool {
    matches!(expr, Expression::Operation(operation) if matches!(operation.as_ref(), Operation::Unary(_)))
}

fn unary(operator: UnaryOperator, expr: Expression) -> Expression {
    Expression::Operation(Box::new(Operation::Unary(UnaryOp::new(operator, expr))))
}

fn binary(lhs: Expression, operator: BinaryOperator, rhs: Expression) -> Expression {
    Expression::Operation(Box::new(Operation::Binary(BinaryOp::new(lhs, operator, rhs))))
}

/// `(!x).a.b` to `!(x.a.b)`
fn hoist_unary(traversal: Traversal) -> Expression {
    let operators = traversal.operators;
    match traversal.expr {
        Expression::Operation(operation) => match *operation {
            Operation::Unary(op) => {
                let mut inner = Traversal::new(op.expr, operators);
                inner.squash();
                let mut operand = Expression::Traversal(Box::new(inner));
                reassociate(&mut operand);
                unary(op.operator, operand)
            }
            operation => Expression::Traversal(Box::new(Traversal::new(
                Expression::Operation(Box::new(operation)),
                operators,
            ))),
        },
        expr => Expression::Traversal(Box::new(Traversal::new(expr, operators))),
    }
}

/// `a == (b ? c : d)` to `(a == b) ? c : d`, `!(a ? b : c)` to `(!a) ? b : c`
fn lift_conditional(operation: Operation) -> Expression {
    match operation {
        Operation::Binary(op) => match op.rhs_expr {
            Expression::Conditional(conditional) => {
                let conditional = *conditional;
                Expression::Conditional(Box::new(Conditional::new(
                    binary(op.lhs_expr, op.operator, conditional.cond_expr),
                    conditional.true_expr,
                    conditional.false_expr,
                )))
            }
            rhs => binary(op.lhs_expr, op.operator, rhs),
        },
        Operation::Unary(op) => match op.expr {
            Expression::Conditional(conditional) => {
                let conditional = *conditional;
                Expression::Conditional(Box::new(Conditional::new(
                    unary(op.operator, conditional.cond_expr),
                    conditional.true_expr,
                    conditional.false_expr,
                )))
            }
            expr => unary(op.operator, expr),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn traversal(source: &str) -> Traversal {
        let expr: Expression = source
            .parse::<hcl_edit::expr::Expression>()
            .expect("valid expression")
            .into();
        match expr {
            Expression::Traversal(traversal) => *traversal,
            other => panic!("not a traversal: {other:?}"),
        }
    }

    #[test]
    fn apply_substitution() {
        let mut traversal = Traversal::builder(hcl::Variable::unchecked("one"))
            .attr("two")
            .attr("three")
            .attr("four")
            .build();

        traversal.apply_substitution(hcl::Variable::unchecked("substitution").into(), 3);

        let expected = Traversal::builder(hcl::Variable::unchecked("substitution"))
            .attr("four")
            .build();

        assert_eq!(traversal, expected);
    }

    #[test]
    fn parse_references() {
        assert_eq!(
            Reference::parse(&traversal("var.flag")),
            Some((Reference::Variable("flag".into()), 2))
        );
        assert_eq!(
            Reference::parse(&traversal("local.tags.owner")),
            Some((Reference::Local("tags".into()), 2))
        );
        assert_eq!(
            Reference::parse(&traversal("module.network.vpc_id")),
            Some((
                Reference::ModuleOutput {
                    call: "network".into(),
                    output: "vpc_id".into()
                },
                3
            ))
        );
        assert_eq!(
            Reference::parse(&traversal("data.aws_kms_key.main.arn")),
            Some((
                Reference::Data {
                    kind: "aws_kms_key".into(),
                    name: "main".into(),
                    attribute: "arn".into()
                },
                4
            ))
        );
        assert_eq!(
            Reference::parse(&traversal("aws_s3_bucket.logs.id")),
            Some((
                Reference::Resource {
                    kind: "aws_s3_bucket".into(),
                    name: "logs".into(),
                    attribute: "id".into()
                },
                3
            ))
        );
    }

    #[test]
    fn context_roots_are_not_references() {
        assert_eq!(Reference::parse(&traversal("each.key")), None);
        assert_eq!(Reference::parse(&traversal("path.module")), None);
        assert_eq!(Reference::parse(&traversal("count.index")), None);
    }

    #[test]
    fn index_stops_the_path() {
        let (reference, len) = Reference::parse(&traversal("var.list[0]")).expect("reference");
        assert_eq!(reference, Reference::Variable("list".into()));
        assert_eq!(len, 2);
    }

    fn parse(source: &str) -> Expression {
        source
            .parse::<hcl_edit::expr::Expression>()
            .expect("valid expression")
            .into()
    }

    fn reassociated(source: &str) -> Expression {
        let mut expr = parse(source);
        reassociate(&mut expr);
        expr
    }

    #[test]
    fn negated_traversal_keeps_its_path() {
        let expected = unary(
            UnaryOperator::Not,
            Traversal::builder(hcl::Variable::unchecked("var"))
                .attr("private")
                .build()
                .into(),
        );
        assert_eq!(reassociated("!var.private"), expected);
    }

    #[test]
    fn comparison_binds_tighter_than_conditional() {
        let Expression::Conditional(conditional) = reassociated(r#"var.env == "prod" ? 1 : 2"#)
        else {
            panic!("expected a conditional");
        };
        let Expression::Parenthesis(comparison) = parse(r#"(var.env == "prod")"#) else {
            panic!("expected parentheses");
        };
        assert_eq!(conditional.cond_expr, *comparison);
        assert_eq!(conditional.true_expr, Expression::from(1u64));
    }

    #[test]
    fn chained_operators_lift_the_conditional_to_the_top() {
        let Expression::Conditional(conditional) =
            reassociated(r#"var.a && var.env == "prod" ? "x" : "y""#)
        else {
            panic!("expected a conditional");
        };
        assert_eq!(conditional.false_expr, Expression::from("y"));
    }

    #[test]
    fn parenthesized_conditionals_are_left_alone() {
        let source = r#"var.env == (var.a ? "prod" : "dev")"#;
        assert_eq!(reassociated(source), parse(source));
    }
}
