//! Type erasure for worklet snippets written in TypeScript. The serialized source runs on a
//! plain JS runtime, so annotations, assertions and type-only statements are dropped before
//! the function is analyzed.

use oxc_allocator::{Allocator, TakeIn, Vec};
use oxc_ast::ast::*;
use oxc_ast_visit::{walk_mut, VisitMut};
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_syntax::scope::ScopeFlags;

use crate::rewrite::RewriteFailure;

pub struct TypeEraser<'a> {
    allocator: &'a Allocator,
}

impl<'a> TypeEraser<'a> {
    pub fn new(allocator: &'a Allocator) -> Self {
        TypeEraser { allocator }
    }
}

fn is_type_only(stmt: &Statement) -> bool {
    match stmt {
        Statement::TSTypeAliasDeclaration(_) | Statement::TSInterfaceDeclaration(_) => true,
        Statement::VariableDeclaration(decl) => decl.declare,
        Statement::FunctionDeclaration(func) => func.declare || func.body.is_none(),
        Statement::ClassDeclaration(class) => class.declare,
        _ => false,
    }
}

impl<'a> VisitMut<'a> for TypeEraser<'a> {
    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        loop {
            let inner = match expr {
                Expression::TSAsExpression(e) => e.expression.take_in(self.allocator),
                Expression::TSSatisfiesExpression(e) => e.expression.take_in(self.allocator),
                Expression::TSTypeAssertion(e) => e.expression.take_in(self.allocator),
                Expression::TSNonNullExpression(e) => e.expression.take_in(self.allocator),
                Expression::TSInstantiationExpression(e) => e.expression.take_in(self.allocator),
                _ => break,
            };
            *expr = inner;
        }
        walk_mut::walk_expression(self, expr);
    }

    fn visit_statements(&mut self, stmts: &mut Vec<'a, Statement<'a>>) {
        stmts.retain(|stmt| !is_type_only(stmt));
        walk_mut::walk_statements(self, stmts);
    }

    fn visit_formal_parameter(&mut self, param: &mut FormalParameter<'a>) {
        param.type_annotation = None;
        param.accessibility = None;
        param.readonly = false;
        param.r#override = false;
        param.optional = false;
        walk_mut::walk_formal_parameter(self, param);
    }

    fn visit_variable_declarator(&mut self, decl: &mut VariableDeclarator<'a>) {
        decl.type_annotation = None;
        decl.definite = false;
        walk_mut::walk_variable_declarator(self, decl);
    }

    fn visit_catch_parameter(&mut self, param: &mut CatchParameter<'a>) {
        param.type_annotation = None;
        walk_mut::walk_catch_parameter(self, param);
    }

    fn visit_function(&mut self, func: &mut Function<'a>, flags: ScopeFlags) {
        func.type_parameters = None;
        func.this_param = None;
        func.return_type = None;
        walk_mut::walk_function(self, func, flags);
    }

    fn visit_arrow_function_expression(&mut self, func: &mut ArrowFunctionExpression<'a>) {
        func.type_parameters = None;
        func.return_type = None;
        walk_mut::walk_arrow_function_expression(self, func);
    }

    fn visit_call_expression(&mut self, call: &mut CallExpression<'a>) {
        call.type_arguments = None;
        walk_mut::walk_call_expression(self, call);
    }

    fn visit_new_expression(&mut self, new: &mut NewExpression<'a>) {
        new.type_arguments = None;
        walk_mut::walk_new_expression(self, new);
    }

    fn visit_class(&mut self, class: &mut Class<'a>) {
        class.type_parameters = None;
        class.super_type_arguments = None;
        class.implements.clear();
        walk_mut::walk_class(self, class);
    }

    fn visit_property_definition(&mut self, prop: &mut PropertyDefinition<'a>) {
        prop.type_annotation = None;
        prop.definite = false;
        prop.optional = false;
        prop.accessibility = None;
        prop.readonly = false;
        walk_mut::walk_property_definition(self, prop);
    }
}

/// Reprints `code` as plain JS. Constructs with runtime meaning (`enum`, `namespace`) are
/// kept, and the scope walker rejects them afterwards.
pub fn erase_types(code: &str, source_type: SourceType) -> Result<String, RewriteFailure> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, source_type).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return Err(RewriteFailure::Syntax(
            ret.errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Worklet function does not parse.".to_string()),
        ));
    }
    let mut program = ret.program;
    TypeEraser::new(&allocator).visit_program(&mut program);
    Ok(Codegen::new().build(&program).code)
}
