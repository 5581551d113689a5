//! Candidate collection over a whole source file.
//!
//! Discovery is outside-in; the result is a forest ordered by position so the compiler can
//! compile children before their parents.

use oxc_ast::ast::*;
use oxc_ast_visit::walk::{
    walk_arrow_function_expression, walk_call_expression, walk_export_default_declaration,
    walk_function, walk_method_definition, walk_object_property,
};
use oxc_ast_visit::Visit;
use oxc_span::{GetSpan, Span};
use oxc_syntax::scope::ScopeFlags;
use std::collections::HashSet;

use crate::call_site::{is_function_node, match_call_site};
use crate::config::WorkletConfig;
use crate::directive::{is_worklet, WorkletFunction};
use crate::rewrite::ReplacementForm;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub span: Span,
    pub form: ReplacementForm,
    pub selected_by_call_site: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateNode {
    pub candidate: Candidate,
    /// Worklets nested inside this one, in source order.
    pub children: Vec<CandidateNode>,
}

pub struct CandidateCollector<'c> {
    config: &'c WorkletConfig,
    selected: HashSet<Span>,
    methods: HashSet<Span>,
    default_exports: HashSet<Span>,
    pub candidates: Vec<Candidate>,
}

impl<'c> CandidateCollector<'c> {
    pub fn new(config: &'c WorkletConfig) -> Self {
        Self {
            config,
            selected: HashSet::new(),
            methods: HashSet::new(),
            default_exports: HashSet::new(),
            candidates: Vec::new(),
        }
    }

    fn consider(&mut self, function: WorkletFunction, is_declaration: bool) {
        let span = function.span();
        if self.methods.contains(&span) {
            if is_worklet(&function, &self.config.directive, false) {
                tracing::debug!("skipping worklet directive on method at {}", span.start);
            }
            return;
        }
        let selected = self.selected.contains(&span);
        if !is_worklet(&function, &self.config.directive, selected) {
            return;
        }
        let form = match function.name() {
            Some(name) if is_declaration && !self.default_exports.contains(&span) => {
                ReplacementForm::Declaration(name.to_string())
            }
            _ => ReplacementForm::Expression,
        };
        self.candidates.push(Candidate {
            span,
            form,
            selected_by_call_site: selected,
        });
    }
}

impl<'a, 'c> Visit<'a> for CandidateCollector<'c> {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        for target in match_call_site(call, self.config) {
            if is_function_node(target) {
                self.selected.insert(target.span());
            }
        }
        walk_call_expression(self, call);
    }

    fn visit_method_definition(&mut self, def: &MethodDefinition<'a>) {
        self.methods.insert(def.value.span);
        walk_method_definition(self, def);
    }

    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        if prop.method || !matches!(prop.kind, PropertyKind::Init) {
            self.methods.insert(prop.value.span());
        }
        walk_object_property(self, prop);
    }

    fn visit_export_default_declaration(&mut self, decl: &ExportDefaultDeclaration<'a>) {
        if let ExportDefaultDeclarationKind::FunctionDeclaration(func) = &decl.declaration {
            self.default_exports.insert(func.span);
        }
        walk_export_default_declaration(self, decl);
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        self.consider(WorkletFunction::Function(func), func.is_declaration());
        walk_function(self, func, flags);
    }

    fn visit_arrow_function_expression(&mut self, arrow: &ArrowFunctionExpression<'a>) {
        self.consider(WorkletFunction::Arrow(arrow), false);
        walk_arrow_function_expression(self, arrow);
    }
}

/// Every worklet in `program`, outermost first.
pub fn collect_candidates(program: &Program, config: &WorkletConfig) -> Vec<Candidate> {
    let mut collector = CandidateCollector::new(config);
    collector.visit_program(program);
    collector.candidates
}

fn contains(outer: Span, inner: Span) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

/// Nests candidates by span containment. Function spans never partially overlap.
pub fn build_forest(mut candidates: Vec<Candidate>) -> Vec<CandidateNode> {
    candidates.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then(b.span.end.cmp(&a.span.end))
    });

    let mut roots: Vec<CandidateNode> = Vec::new();
    let mut open: Vec<CandidateNode> = Vec::new();
    for candidate in candidates {
        while let Some(top) = open.last() {
            if contains(top.candidate.span, candidate.span) {
                break;
            }
            close_node(&mut open, &mut roots);
        }
        open.push(CandidateNode {
            candidate,
            children: Vec::new(),
        });
    }
    while !open.is_empty() {
        close_node(&mut open, &mut roots);
    }
    roots
}

fn close_node(open: &mut Vec<CandidateNode>, roots: &mut Vec<CandidateNode>) {
    if let Some(node) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn collect(source: &str) -> Vec<(String, ReplacementForm, bool)> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::default().with_module(true)).parse();
        assert!(ret.errors.is_empty(), "parse errors in {}", source);
        collect_candidates(&ret.program, &WorkletConfig::default())
            .into_iter()
            .map(|c| {
                (
                    source[c.span.start as usize..c.span.end as usize].to_string(),
                    c.form,
                    c.selected_by_call_site,
                )
            })
            .collect()
    }

    #[test]
    fn test_directive_and_call_site_candidates() {
        let found = collect(
            "function f() { 'worklet'; }\nconst g = () => 1;\nuseDerivedValue(() => 2);",
        );
        assert_eq!(
            found,
            vec![
                (
                    "function f() { 'worklet'; }".to_string(),
                    ReplacementForm::Declaration("f".to_string()),
                    false
                ),
                ("() => 2".to_string(), ReplacementForm::Expression, true),
            ]
        );
    }

    #[test]
    fn test_default_export_and_named_expression_are_expressions() {
        let found = collect(
            "export default function main() { 'worklet'; }\nconst h = function named() { 'worklet'; };",
        );
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|(_, form, _)| *form == ReplacementForm::Expression));
    }

    #[test]
    fn test_methods_are_never_candidates() {
        let found = collect(
            "const o = { m() { 'worklet'; }, get g() { 'worklet'; return 1; } };\nclass C { run() { 'worklet'; } }",
        );
        assert!(found.is_empty());
        let found = collect("useAnimatedGestureHandler({ onStart(e) {}, onEnd: (e) => {} });");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "(e) => {}");
    }

    #[test]
    fn test_forest_nests_by_containment() {
        let candidate = |start, end| Candidate {
            span: Span::new(start, end),
            form: ReplacementForm::Expression,
            selected_by_call_site: false,
        };
        let forest = build_forest(vec![
            candidate(0, 100),
            candidate(10, 40),
            candidate(20, 30),
            candidate(50, 60),
            candidate(120, 130),
        ]);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].children.len(), 2);
        assert_eq!(forest[0].children[0].children.len(), 1);
        assert_eq!(forest[0].children[1].candidate.span, Span::new(50, 60));
        assert!(forest[1].children.is_empty());
    }
}
