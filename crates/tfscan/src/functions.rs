//! functions available to expressions during resolution
//!
//! Only a handful of pure string/collection helpers. Calls to anything else fail evaluation and
//! the expression resolves to unknown.
use hcl::eval::{Context, FuncArgs, FuncDef, ParamType};
use hcl::Value;

pub(crate) fn declare(context: &mut Context) {
    context.declare_func("lower", FuncDef::builder().param(ParamType::String).build(lower));
    context.declare_func("upper", FuncDef::builder().param(ParamType::String).build(upper));
    context.declare_func(
        "trimspace",
        FuncDef::builder().param(ParamType::String).build(trimspace),
    );
    context.declare_func("length", FuncDef::builder().param(ParamType::Any).build(length));
    context.declare_func("tostring", FuncDef::builder().param(ParamType::Any).build(tostring));
}

fn string_arg(args: &FuncArgs) -> Result<&str, String> {
    args.first()
        .and_then(Value::as_str)
        .ok_or_else(|| "expected a string argument".to_string())
}

fn lower(args: FuncArgs) -> Result<Value, String> {
    string_arg(&args).map(|s| Value::from(s.to_lowercase()))
}

fn upper(args: FuncArgs) -> Result<Value, String> {
    string_arg(&args).map(|s| Value::from(s.to_uppercase()))
}

fn trimspace(args: FuncArgs) -> Result<Value, String> {
    string_arg(&args).map(|s| Value::from(s.trim()))
}

fn length(args: FuncArgs) -> Result<Value, String> {
    let len = match args.first() {
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::Array(a)) => a.len(),
        Some(Value::Object(o)) => o.len(),
        _ => return Err("length requires a string, list or map".to_string()),
    };
    Ok(Value::from(len))
}

fn tostring(args: FuncArgs) -> Result<Value, String> {
    match args.first() {
        Some(Value::String(s)) => Ok(Value::from(s.as_str())),
        Some(Value::Number(n)) => Ok(Value::from(n.to_string())),
        Some(Value::Bool(b)) => Ok(Value::from(b.to_string())),
        _ => Err("tostring requires a primitive value".to_string()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hcl::eval::Evaluate;
    use pretty_assertions::assert_eq;

    fn eval(source: &str) -> Result<Value, hcl::eval::Error> {
        let expr: hcl::Expression = source
            .parse::<hcl_edit::expr::Expression>()
            .expect("valid expression")
            .into();
        let mut context = Context::new();
        declare(&mut context);
        expr.evaluate(&context)
    }

    #[test]
    fn string_functions() {
        assert_eq!(eval(r#"lower("AbC")"#).ok(), Some(Value::from("abc")));
        assert_eq!(eval(r#"upper("AbC")"#).ok(), Some(Value::from("ABC")));
        assert_eq!(eval(r#"trimspace("  x ")"#).ok(), Some(Value::from("x")));
        assert_eq!(eval("tostring(5)").ok(), Some(Value::from("5")));
    }

    #[test]
    fn length_of_collections() {
        assert_eq!(eval(r#"length(["a", "b"])"#).ok(), Some(Value::from(2u64)));
        assert_eq!(eval(r#"length("héllo")"#).ok(), Some(Value::from(5u64)));
    }

    #[test]
    fn unknown_functions_fail() {
        assert!(eval(r#"jsonencode({})"#).is_err());
    }
}
