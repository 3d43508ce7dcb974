use super::VisitMut;
use hcl::{
    template::{Directive, Element},
    Expression, Operation, Template, TemplateExpr, Traversal, TraversalOperator,
};

/// Recursively visit all [hcl::Traversal]s of an expression mutably
///
/// A bare variable (`foo`) is presented as a traversal without operators. Anything the visitor
/// does to it other than renaming the variable is discarded.
///
/// Every expression node is re-associated ([crate::util::reassociate]) before it is visited, so
/// `!var.flag` is seen as the traversal `var.flag`.
pub trait VisitTraversalsMut {
    fn visit_traversals_mut(&mut self, visitor: &mut dyn VisitMut<Traversal>);
}

impl VisitTraversalsMut for Expression {
    fn visit_traversals_mut(&mut self, visitor: &mut dyn VisitMut<Traversal>) {
        crate::util::reassociate(self);

        match self {
            Expression::Variable(variable) => {
                let mut traversal = Traversal::new(
                    Expression::Variable(variable.clone()),
                    Vec::<TraversalOperator>::new(),
                );
                visitor.visit_mut(&mut traversal);
                if let Expression::Variable(new_variable) = traversal.expr {
                    *variable = new_variable
                }
            }
            Expression::Traversal(traversal) => {
                visitor.visit_mut(traversal);
                if !matches!(traversal.expr, Expression::Variable(_)) {
                    traversal.expr.visit_traversals_mut(visitor);
                }
                for operator in traversal.operators.iter_mut() {
                    if let TraversalOperator::Index(index) = operator {
                        index.visit_traversals_mut(visitor);
                    }
                }
            }
            Expression::Array(array) => {
                for expr in array {
                    expr.visit_traversals_mut(visitor);
                }
            }
            Expression::Object(object) => {
                for value in object.values_mut() {
                    value.visit_traversals_mut(visitor);
                }
            }
            Expression::TemplateExpr(template_expr) => {
                let Ok(mut template) = Template::from_expr(template_expr) else {
                    tracing::debug!("template expression could not be parsed");
                    return;
                };
                template.visit_traversals_mut(visitor);
                *template_expr = Box::new(TemplateExpr::QuotedString(template.to_string()));
            }
            Expression::FuncCall(func_call) => {
                for arg in func_call.args.iter_mut() {
                    arg.visit_traversals_mut(visitor);
                }
            }
            Expression::Parenthesis(expr) => {
                expr.visit_traversals_mut(visitor);
            }
            Expression::Conditional(cond) => {
                cond.cond_expr.visit_traversals_mut(visitor);
                cond.true_expr.visit_traversals_mut(visitor);
                cond.false_expr.visit_traversals_mut(visitor);
            }
            Expression::Operation(operation) => match operation.as_mut() {
                Operation::Binary(binop) => {
                    binop.lhs_expr.visit_traversals_mut(visitor);
                    binop.rhs_expr.visit_traversals_mut(visitor);
                }
                Operation::Unary(unop) => {
                    unop.expr.visit_traversals_mut(visitor);
                }
            },
            Expression::ForExpr(forexpr) => {
                forexpr.collection_expr.visit_traversals_mut(visitor);
                forexpr
                    .key_expr
                    .iter_mut()
                    .for_each(|e| e.visit_traversals_mut(visitor));
                forexpr.value_expr.visit_traversals_mut(visitor);
                forexpr
                    .cond_expr
                    .iter_mut()
                    .for_each(|e| e.visit_traversals_mut(visitor));
            }
            _ => {}
        }
    }
}

impl VisitTraversalsMut for Template {
    fn visit_traversals_mut(&mut self, visitor: &mut dyn VisitMut<Traversal>) {
        for element in self.elements_mut() {
            match element {
                Element::Interpolation(interpolation) => {
                    interpolation.expr.visit_traversals_mut(visitor);
                }
                Element::Directive(directive) => match directive {
                    Directive::If(ifdir) => {
                        ifdir.cond_expr.visit_traversals_mut(visitor);
                        ifdir.true_template.visit_traversals_mut(visitor);
                        ifdir
                            .false_template
                            .iter_mut()
                            .for_each(|t| t.visit_traversals_mut(visitor));
                    }
                    Directive::For(fordir) => {
                        fordir.collection_expr.visit_traversals_mut(visitor);
                        fordir.template.visit_traversals_mut(visitor);
                    }
                },
                Element::Literal(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn collect_roots(expr: &mut Expression) -> Vec<String> {
        let mut roots = vec![];
        let mut collect = |traversal: &mut Traversal| {
            if let Expression::Variable(var) = &traversal.expr {
                roots.push(var.as_str().to_owned());
            }
        };
        expr.visit_traversals_mut(&mut collect);
        roots
    }

    #[test]
    fn visits_function_arguments_and_conditionals() {
        let mut expr: Expression = "lower(var.a) == \"x\" ? local.b : module.c.d"
            .parse::<hcl_edit::expr::Expression>()
            .expect("valid expression")
            .into();

        assert_eq!(collect_roots(&mut expr), vec!["var", "local", "module"]);
    }

    #[test]
    fn visits_index_expressions() {
        let mut expr: Expression = "local.list[var.index]"
            .parse::<hcl_edit::expr::Expression>()
            .expect("valid expression")
            .into();

        assert_eq!(collect_roots(&mut expr), vec!["local", "var"]);
    }

    #[test]
    fn negation_does_not_hide_the_path() {
        let mut expr: Expression = "!var.private"
            .parse::<hcl_edit::expr::Expression>()
            .expect("valid expression")
            .into();

        let mut paths = vec![];
        let mut collect = |traversal: &mut Traversal| paths.push(traversal.operators.len());
        expr.visit_traversals_mut(&mut collect);
        assert_eq!(paths, vec![1]);
    }
}
