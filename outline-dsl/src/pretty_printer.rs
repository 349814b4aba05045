//! Pretty printer for bullet ASTs

use crate::parser::*;
use std::fmt::Write;

// ============================================================================
// PRETTY PRINTER
// ============================================================================

/// Render a bullet back to source text in canonical form.
///
/// Literal parts are emitted verbatim; expressions are normalized
/// (single spaces around operators, `name: value` arguments).
pub fn pretty_print(bullet: &Bullet) -> String {
    let mut output = String::new();

    if let Some(key) = &bullet.key {
        let _ = write!(output, "{}: ", key.name);
    }

    for part in &bullet.parts {
        match &part.kind {
            ExprKind::StringLiteral(text) => output.push_str(text),
            ExprKind::InlineExpr(_) => write_expr(&mut output, part),
            _ => {
                output.push('{');
                write_expr(&mut output, part);
                output.push('}');
            }
        }
    }

    output
}

/// Render one expression without surrounding braces.
pub fn pretty_print_expr(expr: &Expr) -> String {
    let mut output = String::new();
    write_expr(&mut output, expr);
    output
}

fn write_expr(output: &mut String, expr: &Expr) {
    match &expr.kind {
        ExprKind::StringLiteral(s) => {
            let _ = write!(output, "\"{}\"", escape_string(s));
        }
        ExprKind::NumberLiteral(n) => output.push_str(&format_number(*n)),
        ExprKind::Undefined => {}
        ExprKind::IdentifierRef(id) => {
            let _ = write!(output, "#[{}]", id);
        }
        ExprKind::NameRef(name) => output.push_str(name),
        ExprKind::FieldAccess { object, field } => {
            write_operand(output, object, matches!(object.kind, ExprKind::Binary { .. }));
            output.push('.');
            match &field.kind {
                ExprKind::StringLiteral(name) => output.push_str(name),
                _ => write_expr(output, field),
            }
        }
        ExprKind::FunctionCall { name, args } => {
            output.push_str(name);
            output.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    output.push_str(", ");
                }
                write_argument(output, arg);
            }
            output.push(')');
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let prec = op.precedence();
            write_operand(output, lhs, precedence_of(lhs).is_some_and(|p| p < prec));
            let _ = write!(output, " {} ", op.symbol());
            write_operand(output, rhs, precedence_of(rhs).is_some_and(|p| p <= prec));
        }
        ExprKind::InlineExpr(inner) => {
            output.push('{');
            write_expr(output, inner);
            output.push('}');
        }
    }
}

fn write_operand(output: &mut String, expr: &Expr, parenthesize: bool) {
    if parenthesize {
        output.push('(');
        write_expr(output, expr);
        output.push(')');
    } else {
        write_expr(output, expr);
    }
}

fn write_argument(output: &mut String, arg: &Argument) {
    match (&arg.name, &arg.value.kind) {
        (Some(name), ExprKind::Undefined) => {
            let _ = write!(output, "{}:", name);
        }
        (Some(name), _) => {
            let _ = write!(output, "{}: ", name);
            write_expr(output, &arg.value);
        }
        (None, _) => write_expr(output, &arg.value),
    }
}

fn precedence_of(expr: &Expr) -> Option<u8> {
    match &expr.kind {
        ExprKind::Binary { op, .. } => Some(op.precedence()),
        _ => None,
    }
}

/// Integral values print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Escape special characters in strings.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
}
