//! Call-site matching: hooks whose arguments are compiled as worklets.

use oxc_ast::ast::{CallExpression, Expression, ObjectPropertyKind, PropertyKind};

use crate::config::{CallSiteSpec, WorkletConfig};

/// Name a call is looked up by: `useHook(...)` and `Lib.useHook(...)` both match `useHook`.
pub fn callee_name<'b>(call: &'b CallExpression) -> Option<&'b str> {
    match &call.callee {
        Expression::Identifier(ident) => Some(ident.name.as_str()),
        Expression::StaticMemberExpression(member) => Some(member.property.name.as_str()),
        _ => None,
    }
}

/// Returns the argument nodes of `call` that must be compiled as worklets, with wrapping
/// parentheses removed.
///
/// Missing positions are skipped. An object hook whose first argument is an empty object
/// literal selects nothing. Method, getter and setter properties of an object hook are
/// never targets.
pub fn match_call_site<'b, 'a>(
    call: &'b CallExpression<'a>,
    config: &WorkletConfig,
) -> Vec<&'b Expression<'a>> {
    let Some(spec) = callee_name(call).and_then(|name| config.call_site(name)) else {
        return vec![];
    };

    let indexed = |indices: &[usize]| -> Vec<&'b Expression<'a>> {
        indices
            .iter()
            .filter_map(|i| call.arguments.get(*i))
            .filter_map(|arg| arg.as_expression())
            .map(|expr| expr.without_parentheses())
            .collect()
    };

    match spec {
        CallSiteSpec::Arguments(indices) => indexed(indices),
        CallSiteSpec::ObjectHook(fallback) => {
            let first = call
                .arguments
                .first()
                .and_then(|arg| arg.as_expression())
                .map(|expr| expr.without_parentheses());
            let Some(Expression::ObjectExpression(object)) = first else {
                return indexed(fallback);
            };
            let mut targets = Vec::new();
            for property in &object.properties {
                if let ObjectPropertyKind::ObjectProperty(prop) = property {
                    if prop.method || !matches!(prop.kind, PropertyKind::Init) {
                        tracing::debug!(
                            "skipping method-shaped object hook handler at {}",
                            prop.span.start
                        );
                        continue;
                    }
                    targets.push(prop.value.without_parentheses());
                }
            }
            targets
        }
    }
}

/// Only function and arrow nodes among the targets are compiled.
pub fn is_function_node(expr: &Expression) -> bool {
    matches!(
        expr,
        Expression::FunctionExpression(_) | Expression::ArrowFunctionExpression(_)
    )
}
