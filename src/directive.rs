//! Worklet directive detection.

use oxc_ast::ast::{
    ArrowFunctionExpression, Directive, Expression, FormalParameters, Function, FunctionBody,
    Program, Statement,
};
use oxc_span::Span;

/// A function node that may be compiled: a declaration, a function expression or an arrow.
#[derive(Clone, Copy)]
pub enum WorkletFunction<'b, 'a> {
    Function(&'b Function<'a>),
    Arrow(&'b ArrowFunctionExpression<'a>),
}

impl<'b, 'a> WorkletFunction<'b, 'a> {
    pub fn span(&self) -> Span {
        match self {
            WorkletFunction::Function(func) => func.span,
            WorkletFunction::Arrow(arrow) => arrow.span,
        }
    }

    pub fn name(&self) -> Option<&'b str> {
        match self {
            WorkletFunction::Function(func) => func.id.as_ref().map(|id| id.name.as_str()),
            WorkletFunction::Arrow(_) => None,
        }
    }

    pub fn params(&self) -> &'b FormalParameters<'a> {
        match self {
            WorkletFunction::Function(func) => &func.params,
            WorkletFunction::Arrow(arrow) => &arrow.params,
        }
    }

    pub fn body(&self) -> Option<&'b FunctionBody<'a>> {
        match self {
            WorkletFunction::Function(func) => func.body.as_deref(),
            WorkletFunction::Arrow(arrow) => {
                let body: &'b FunctionBody<'a> = &arrow.body;
                Some(body)
            }
        }
    }

    /// `x => x + 1` style arrow whose body is a single expression.
    pub fn has_expression_body(&self) -> bool {
        matches!(self, WorkletFunction::Arrow(arrow) if arrow.expression)
    }

    /// Finds the function in a program produced by parsing `(<function source>)`.
    pub fn from_program(program: &'b Program<'a>) -> Option<Self> {
        let Some(Statement::ExpressionStatement(stmt)) = program.body.first() else {
            return None;
        };
        Self::from_expression(&stmt.expression)
    }

    pub fn from_expression(expr: &'b Expression<'a>) -> Option<Self> {
        match expr {
            Expression::ParenthesizedExpression(paren) => Self::from_expression(&paren.expression),
            Expression::FunctionExpression(func) => Some(WorkletFunction::Function(func)),
            Expression::ArrowFunctionExpression(arrow) => Some(WorkletFunction::Arrow(arrow)),
            _ => None,
        }
    }
}

pub fn is_directive(directive: &Directive, marker: &str) -> bool {
    directive.expression.value.as_str() == marker
}

/// True if the function's own body (not a nested one) carries the marker directive.
pub fn has_worklet_directive(body: Option<&FunctionBody>, marker: &str) -> bool {
    body.is_some_and(|body| body.directives.iter().any(|d| is_directive(d, marker)))
}

/// `isWorklet`: explicitly marked, or selected by a call site.
pub fn is_worklet(function: &WorkletFunction, marker: &str, selected_by_call_site: bool) -> bool {
    selected_by_call_site || has_worklet_directive(function.body(), marker)
}

/// `stripDirective`: the body's directives without the marker.
pub fn strip_directive<'b, 'a>(
    body: &'b FunctionBody<'a>,
    marker: &'b str,
) -> impl Iterator<Item = &'b Directive<'a>> + 'b {
    body.directives.iter().filter(move |d| !is_directive(d, marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn check(source: &str, expect_function: bool, expect_directive: bool) {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::default().with_module(true)).parse();
        assert!(ret.errors.is_empty(), "parse errors in {}", source);
        let function = WorkletFunction::from_program(&ret.program);
        assert_eq!(function.is_some(), expect_function, "{}", source);
        if let Some(function) = function {
            assert_eq!(is_worklet(&function, "worklet", false), expect_directive, "{}", source);
            assert!(is_worklet(&function, "worklet", true));
        }
    }

    #[test]
    fn test_directive_detection() {
        check("(function f() { 'worklet'; return 1; })", true, true);
        check("((a) => { 'worklet'; return a; })", true, true);
        check("(function f() { return 1; })", true, false);
        check("(a => a + 1)", true, false);
        check("(1 + 2)", false, false);
    }

    #[test]
    fn test_nested_directive_does_not_mark_outer() {
        check(
            "(function outer() { function inner() { 'worklet'; } return inner; })",
            true,
            false,
        );
    }

    #[test]
    fn test_strip_directive_keeps_other_directives() {
        let allocator = Allocator::default();
        let source = "(function f() { 'use strict'; 'worklet'; return 1; })";
        let ret = Parser::new(&allocator, source, SourceType::default().with_module(true)).parse();
        let function = WorkletFunction::from_program(&ret.program).unwrap();
        let body = function.body().unwrap();
        let kept: Vec<&str> = strip_directive(body, "worklet")
            .map(|d| d.expression.value.as_str())
            .collect();
        assert_eq!(kept, vec!["use strict"]);
        assert!(!has_worklet_directive(Some(body), "something-else"));
    }
}
