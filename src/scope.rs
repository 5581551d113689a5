//! Scope analysis for worklet functions.
//!
//! ## Capture rules
//!
//! 1. **Resolution**: an identifier reference is local if any scope on the stack binds it.
//!    Function scopes bind parameters, hoisted `var`s and top-level declarations of the body;
//!    block, loop-head, catch, switch and class scopes bind their own names.
//! 2. **Exclusions**: allowlisted globals and the function's own name are never captured.
//!    Member properties and non-shorthand object keys are names, not references.
//! 3. **Paths**: a free identifier is recorded with the longest run of `.name` accesses
//!    rooted at it, stopping before `value`, a blacklisted property, an optional or
//!    computed link, or a member that is itself being assigned.
//! 4. **Writes**: assigning a bare free name records nothing. `x.value = ...` marks `x` as
//!    an output and captures `x` whole.
//! 5. **Unresolvable** names are captured, never reported.

use oxc_ast::ast::*;
use oxc_ast_visit::walk::{
    walk_block_statement, walk_catch_clause, walk_class, walk_for_in_statement,
    walk_for_of_statement, walk_for_statement, walk_simple_assignment_target,
    walk_static_member_expression, walk_switch_statement,
};
use oxc_ast_visit::Visit;
use oxc_span::Span;
use oxc_syntax::scope::ScopeFlags;
use std::collections::HashMap;

use crate::config::WorkletConfig;
use crate::directive::WorkletFunction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Parameter,
    Var,
    Lexical,
    Function,
    Class,
    CatchParameter,
    /// Name of a function expression or class, visible inside itself.
    SelfName,
}

pub type Scope = HashMap<String, BindingKind>;

/// Explicit scope chain threaded through the walk; innermost scope last.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    pub fn resolve(&self, name: &str) -> Option<BindingKind> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }
}

/// A read of a variable from outside the worklet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeVariableRef {
    pub root: String,
    /// Member names read from `root`, outermost last. Empty when `root` is used as a value.
    pub path: Vec<String>,
}

impl FreeVariableRef {
    pub fn new(root: &str, path: &[&str]) -> Self {
        Self {
            root: root.to_string(),
            path: path.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// `root.a.b`, the expression that reads this value on the JS thread.
    pub fn access_expression(&self) -> String {
        let mut expr = self.root.clone();
        for segment in &self.path {
            expr.push('.');
            expr.push_str(segment);
        }
        expr
    }
}

/// A construct the UI runtime cannot execute, with its offset in the analyzed source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedConstruct {
    pub construct: String,
    pub offset: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeVariables {
    /// Every capturing reference, in source order.
    pub references: Vec<FreeVariableRef>,
    /// Free names written through `x.value = ...`.
    pub outputs: Vec<String>,
}

impl FreeVariables {
    /// Distinct roots in order of first reference.
    pub fn roots(&self) -> Vec<&str> {
        let mut roots: Vec<&str> = Vec::new();
        for reference in &self.references {
            if !roots.contains(&reference.root.as_str()) {
                roots.push(&reference.root);
            }
        }
        roots
    }
}

/// `freeVariables(fn)`: walks `function` with a fresh scope stack.
pub fn free_variables(
    function: WorkletFunction,
    config: &WorkletConfig,
) -> Result<FreeVariables, UnsupportedConstruct> {
    let mut walker = ScopeWalker::new(config, function.name());
    match function {
        WorkletFunction::Function(func) => walker.visit_function(func, ScopeFlags::Function),
        WorkletFunction::Arrow(arrow) => walker.visit_arrow_function_expression(arrow),
    }
    walker.finish()
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINDING COLLECTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Collects binding names of patterns and parameter lists, without entering nested
/// functions or classes (e.g. inside default values).
#[derive(Default)]
pub struct BindingCollector {
    pub names: Vec<String>,
}

impl<'a> Visit<'a> for BindingCollector {
    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.names.push(ident.name.to_string());
    }

    fn visit_function(&mut self, _func: &Function<'a>, _flags: ScopeFlags) {}

    fn visit_arrow_function_expression(&mut self, _func: &ArrowFunctionExpression<'a>) {}

    fn visit_class(&mut self, _class: &Class<'a>) {}
}

pub fn pattern_names(pattern: &BindingPattern) -> Vec<String> {
    let mut collector = BindingCollector::default();
    collector.visit_binding_pattern(pattern);
    collector.names
}

pub fn parameter_names(params: &FormalParameters) -> Vec<String> {
    let mut collector = BindingCollector::default();
    collector.visit_formal_parameters(params);
    collector.names
}

/// `var` names declared anywhere in a function body outside nested functions.
#[derive(Default)]
struct VarCollector {
    names: Vec<String>,
}

impl<'a> Visit<'a> for VarCollector {
    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        if decl.kind == VariableDeclarationKind::Var {
            for declarator in &decl.declarations {
                self.names.extend(pattern_names(&declarator.id));
            }
        }
    }

    fn visit_function(&mut self, _func: &Function<'a>, _flags: ScopeFlags) {}

    fn visit_arrow_function_expression(&mut self, _func: &ArrowFunctionExpression<'a>) {}

    fn visit_class(&mut self, _class: &Class<'a>) {}
}

/// Names a statement list declares for its own block.
pub fn lexical_names(statements: &[Statement]) -> Scope {
    let mut scope = Scope::new();
    for stmt in statements {
        match stmt {
            Statement::VariableDeclaration(decl) if decl.kind != VariableDeclarationKind::Var => {
                for declarator in &decl.declarations {
                    for name in pattern_names(&declarator.id) {
                        scope.insert(name, BindingKind::Lexical);
                    }
                }
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    scope.insert(id.name.to_string(), BindingKind::Function);
                }
            }
            Statement::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    scope.insert(id.name.to_string(), BindingKind::Class);
                }
            }
            _ => {}
        }
    }
    scope
}

/// Scope of a function: its parameters plus everything its body hoists.
fn function_scope(params: &FormalParameters, body: Option<&FunctionBody>) -> Scope {
    let mut scope = Scope::new();
    for name in parameter_names(params) {
        scope.insert(name, BindingKind::Parameter);
    }
    if let Some(body) = body {
        let mut vars = VarCollector::default();
        for stmt in &body.statements {
            vars.visit_statement(stmt);
        }
        for name in vars.names {
            scope.entry(name).or_insert(BindingKind::Var);
        }
        for (name, kind) in lexical_names(&body.statements) {
            scope.insert(name, kind);
        }
    }
    scope
}

fn declaration_scope(decl: &VariableDeclaration) -> Scope {
    let mut scope = Scope::new();
    if decl.kind != VariableDeclarationKind::Var {
        for declarator in &decl.declarations {
            for name in pattern_names(&declarator.id) {
                scope.insert(name, BindingKind::Lexical);
            }
        }
    }
    scope
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPE WALKER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ScopeWalker<'c> {
    config: &'c WorkletConfig,
    own_name: Option<String>,
    scopes: ScopeStack,
    result: FreeVariables,
    unsupported: Option<UnsupportedConstruct>,
}

impl<'c> ScopeWalker<'c> {
    pub fn new(config: &'c WorkletConfig, own_name: Option<&str>) -> Self {
        Self {
            config,
            own_name: own_name.map(|s| s.to_string()),
            scopes: ScopeStack::new(),
            result: FreeVariables::default(),
            unsupported: None,
        }
    }

    pub fn finish(self) -> Result<FreeVariables, UnsupportedConstruct> {
        match self.unsupported {
            Some(construct) => Err(construct),
            None => Ok(self.result),
        }
    }

    fn unsupported(&mut self, construct: &str, span: Span) {
        if self.unsupported.is_none() {
            self.unsupported = Some(UnsupportedConstruct {
                construct: construct.to_string(),
                offset: span.start,
            });
        }
    }

    fn is_free(&self, name: &str) -> bool {
        !self.config.is_global(name)
            && self.own_name.as_deref() != Some(name)
            && self.scopes.resolve(name).is_none()
    }

    fn record_reference(&mut self, ident: &IdentifierReference, path: Vec<String>) -> bool {
        let name = ident.name.as_str();
        if !self.is_free(name) {
            return false;
        }
        self.result.references.push(FreeVariableRef {
            root: name.to_string(),
            path,
        });
        true
    }

    /// Handles a whole `a.b.c` chain at its outermost member.
    fn visit_member_chain(&mut self, member: &StaticMemberExpression<'_>, assignment_target: bool) {
        let mut links: Vec<(&str, bool)> = vec![(member.property.name.as_str(), member.optional)];
        let mut object = &member.object;
        let root = loop {
            match object {
                Expression::StaticMemberExpression(inner) => {
                    links.push((inner.property.name.as_str(), inner.optional));
                    object = &inner.object;
                }
                Expression::Identifier(ident) => break Some(ident),
                _ => break None,
            }
        };
        let Some(root) = root else {
            walk_static_member_expression(self, member);
            return;
        };
        links.reverse();

        let mut depth = links
            .iter()
            .take_while(|(name, optional)| {
                !optional && *name != "value" && !self.config.is_blacklisted(name)
            })
            .count();
        if assignment_target {
            // `captured.prop = v` writes the member, it reads `captured`
            depth = depth.min(links.len() - 1);
        }
        let path = links[..depth].iter().map(|(name, _)| name.to_string()).collect();

        let is_free = self.record_reference(root, path);
        let is_value_write = assignment_target && links.len() == 1 && links[0].0 == "value";
        let already_output = self.result.outputs.iter().any(|o| o.as_str() == root.name.as_str());
        if is_free && is_value_write && !already_output {
            self.result.outputs.push(root.name.to_string());
        }
    }
}

impl<'a, 'c> Visit<'a> for ScopeWalker<'c> {
    fn visit_function(&mut self, func: &Function<'a>, _flags: ScopeFlags) {
        if func.r#async {
            self.unsupported("async function", func.span);
        }
        if func.generator {
            self.unsupported("generator function", func.span);
        }
        if func.type_parameters.is_some() || func.return_type.is_some() {
            self.unsupported("type annotation", func.span);
        }

        let mut scope = function_scope(&func.params, func.body.as_deref());
        if let Some(id) = &func.id {
            scope.entry(id.name.to_string()).or_insert(BindingKind::SelfName);
        }
        self.scopes.push(scope);
        self.visit_formal_parameters(&func.params);
        if let Some(body) = &func.body {
            self.visit_function_body(body);
        }
        self.scopes.pop();
    }

    fn visit_arrow_function_expression(&mut self, arrow: &ArrowFunctionExpression<'a>) {
        if arrow.r#async {
            self.unsupported("async arrow function", arrow.span);
        }
        if arrow.type_parameters.is_some() || arrow.return_type.is_some() {
            self.unsupported("type annotation", arrow.span);
        }

        let body: &FunctionBody<'a> = &arrow.body;
        self.scopes.push(function_scope(&arrow.params, Some(body)));
        self.visit_formal_parameters(&arrow.params);
        self.visit_function_body(&arrow.body);
        self.scopes.pop();
    }

    fn visit_block_statement(&mut self, block: &BlockStatement<'a>) {
        self.scopes.push(lexical_names(&block.body));
        walk_block_statement(self, block);
        self.scopes.pop();
    }

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        let scope = match &stmt.init {
            Some(ForStatementInit::VariableDeclaration(decl)) => declaration_scope(decl),
            _ => Scope::new(),
        };
        self.scopes.push(scope);
        walk_for_statement(self, stmt);
        self.scopes.pop();
    }

    fn visit_for_in_statement(&mut self, stmt: &ForInStatement<'a>) {
        let scope = match &stmt.left {
            ForStatementLeft::VariableDeclaration(decl) => declaration_scope(decl),
            _ => Scope::new(),
        };
        self.scopes.push(scope);
        walk_for_in_statement(self, stmt);
        self.scopes.pop();
    }

    fn visit_for_of_statement(&mut self, stmt: &ForOfStatement<'a>) {
        let scope = match &stmt.left {
            ForStatementLeft::VariableDeclaration(decl) => declaration_scope(decl),
            _ => Scope::new(),
        };
        self.scopes.push(scope);
        walk_for_of_statement(self, stmt);
        self.scopes.pop();
    }

    fn visit_switch_statement(&mut self, stmt: &SwitchStatement<'a>) {
        let mut scope = Scope::new();
        for case in &stmt.cases {
            scope.extend(lexical_names(&case.consequent));
        }
        self.scopes.push(scope);
        walk_switch_statement(self, stmt);
        self.scopes.pop();
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause<'a>) {
        let mut scope = Scope::new();
        if let Some(param) = &clause.param {
            for name in pattern_names(&param.pattern) {
                scope.insert(name, BindingKind::CatchParameter);
            }
        }
        self.scopes.push(scope);
        walk_catch_clause(self, clause);
        self.scopes.pop();
    }

    fn visit_class(&mut self, class: &Class<'a>) {
        let mut scope = Scope::new();
        if let Some(id) = &class.id {
            scope.insert(id.name.to_string(), BindingKind::SelfName);
        }
        self.scopes.push(scope);
        walk_class(self, class);
        self.scopes.pop();
    }

    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.record_reference(ident, vec![]);
    }

    fn visit_static_member_expression(&mut self, member: &StaticMemberExpression<'a>) {
        self.visit_member_chain(member, false);
    }

    fn visit_simple_assignment_target(&mut self, target: &SimpleAssignmentTarget<'a>) {
        match target {
            // captured values are read-only snapshots
            SimpleAssignmentTarget::AssignmentTargetIdentifier(_) => {}
            SimpleAssignmentTarget::StaticMemberExpression(member) => {
                self.visit_member_chain(member, true);
            }
            _ => walk_simple_assignment_target(self, target),
        }
    }

    fn visit_assignment_target_property_identifier(
        &mut self,
        property: &AssignmentTargetPropertyIdentifier<'a>,
    ) {
        if let Some(init) = &property.init {
            self.visit_expression(init);
        }
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        self.unsupported("dynamic import()", expr.span);
    }

    fn visit_meta_property(&mut self, meta: &MetaProperty<'a>) {
        if meta.meta.name == "import" {
            self.unsupported("import.meta", meta.span);
        }
    }

    fn visit_ts_enum_declaration(&mut self, decl: &TSEnumDeclaration<'a>) {
        self.unsupported("enum", decl.span);
    }

    fn visit_ts_module_declaration(&mut self, decl: &TSModuleDeclaration<'a>) {
        self.unsupported("namespace", decl.span);
    }

    // Types are erased before analysis; these only survive in positions erasure leaves alone.
    fn visit_ts_type_annotation(&mut self, annotation: &TSTypeAnnotation<'a>) {
        self.unsupported("type annotation", annotation.span);
    }

    fn visit_ts_as_expression(&mut self, expr: &TSAsExpression<'a>) {
        self.unsupported("`as` type assertion", expr.span);
    }

    fn visit_ts_satisfies_expression(&mut self, expr: &TSSatisfiesExpression<'a>) {
        self.unsupported("`satisfies` type assertion", expr.span);
    }

    fn visit_ts_non_null_expression(&mut self, expr: &TSNonNullExpression<'a>) {
        self.unsupported("non-null assertion", expr.span);
    }

    fn visit_ts_type_parameter_instantiation(
        &mut self,
        params: &TSTypeParameterInstantiation<'a>,
    ) {
        self.unsupported("type arguments", params.span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn analyze(source: &str) -> Result<FreeVariables, UnsupportedConstruct> {
        analyze_with(source, SourceType::default().with_module(true))
    }

    fn analyze_with(
        source: &str,
        source_type: SourceType,
    ) -> Result<FreeVariables, UnsupportedConstruct> {
        let allocator = Allocator::default();
        let wrapped = format!("({})", source);
        let ret = Parser::new(&allocator, &wrapped, source_type).parse();
        assert!(ret.errors.is_empty(), "parse errors: {:?}", ret.errors);
        let function = WorkletFunction::from_program(&ret.program).expect("function");
        free_variables(function, &WorkletConfig::default())
    }

    fn refs(source: &str) -> Vec<String> {
        analyze(source)
            .expect("analysis")
            .references
            .iter()
            .map(|r| r.access_expression())
            .collect()
    }

    #[test]
    fn test_params_and_locals_are_not_captured() {
        let found = refs(
            "function f(a, { b }, [c], ...rest) { const d = 1; let e; return a + b + c + d + e + rest + outer; }",
        );
        assert_eq!(found, vec!["outer"]);
    }

    #[test]
    fn test_member_paths_are_recorded() {
        let found = refs("function f() { return ctx.a.b + ctx.a.c; }");
        assert_eq!(found, vec!["ctx.a.b", "ctx.a.c"]);
    }

    #[test]
    fn test_globals_and_own_name_are_excluded() {
        let found = refs(
            "function tick(n) { console.log(Math.max(n, limit)); return n > 0 ? tick(n - 1) : undefined; }",
        );
        assert_eq!(found, vec!["limit"]);
    }

    #[test]
    fn test_value_and_blacklisted_properties_stop_the_path() {
        let found = refs("() => sv.value + items.map((i) => i * 2).length + cfg.list.filter(Boolean)");
        assert_eq!(found, vec!["sv", "items", "cfg.list"]);
    }

    #[test]
    fn test_computed_and_optional_links_stop_the_path() {
        let found = refs("(i) => ctx.a[i].b + opt?.x.y + deep.k?.z");
        assert_eq!(found, vec!["ctx.a", "opt", "deep.k"]);
    }

    #[test]
    fn test_object_keys_are_not_references() {
        let found = refs("() => ({ key: val, shorthand, nested: { other: x.y } })");
        assert_eq!(found, vec!["val", "shorthand", "x.y"]);
    }

    #[test]
    fn test_hoisting_and_block_scopes() {
        let found = refs(
            "function f() { helper(); if (ok) { let inner = 1; use(inner); } for (var i = 0; i < n; i++) {} return i + inner; function helper() {} }",
        );
        assert_eq!(found, vec!["ok", "use", "n", "inner"]);
    }

    #[test]
    fn test_nested_function_scopes() {
        let found = refs(
            "function f(a) { const g = (b) => a + b + c; try { g(1); } catch (err) { report(err); } return g; }",
        );
        assert_eq!(found, vec!["c", "report"]);
    }

    #[test]
    fn test_bare_assignment_is_not_a_capture() {
        let found = refs("function f() { counter = 5; counter2 += 1; x++; }");
        assert!(found.is_empty(), "got {:?}", found);
    }

    #[test]
    fn test_value_write_is_an_output() {
        let result = analyze("(e) => { offset.value = e.translationX; state.prop = 1; }").unwrap();
        let found: Vec<String> = result.references.iter().map(|r| r.access_expression()).collect();
        assert_eq!(found, vec!["offset", "state"]);
        assert_eq!(result.outputs, vec!["offset".to_string()]);
    }

    #[test]
    fn test_roots_keep_first_reference_order() {
        let result = analyze("() => b.x + a + b.y + a.z").unwrap();
        assert_eq!(result.roots(), vec!["b", "a"]);
    }

    #[test]
    fn test_async_and_generators_are_unsupported() {
        let err = analyze("async function f() { await g(); }").unwrap_err();
        assert_eq!(err.construct, "async function");
        let err = analyze("function f() { const g = function* () {}; }").unwrap_err();
        assert_eq!(err.construct, "generator function");
        let err = analyze("() => import('./module')").unwrap_err();
        assert_eq!(err.construct, "dynamic import()");
    }

    #[test]
    fn test_switch_cases_share_one_scope() {
        let found = refs(
            "function f(k) { switch (k) { case 1: let y = 1; break; case 2: return y + z; } return y; }",
        );
        assert_eq!(found, vec!["z", "y"]);
    }

    #[test]
    fn test_class_name_is_bound_inside_its_body() {
        let found = refs(
            "function f() { return class Foo extends Base { m() { return Foo.count; } }; }",
        );
        assert_eq!(found, vec!["Base"]);
    }

    #[test]
    fn test_runtime_type_constructs_are_unsupported() {
        let ts = SourceType::default().with_module(true).with_typescript(true);
        let err = analyze_with("() => { enum E { A } return E.A; }", ts).unwrap_err();
        assert_eq!(err.construct, "enum");
        assert!(analyze_with("(a) => a + 1", ts).is_ok());
    }
}
