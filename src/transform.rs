use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::{SourceType, Span};
use serde::{Deserialize, Serialize};

use crate::candidates::{build_forest, collect_candidates, CandidateNode};
use crate::config::WorkletConfig;
use crate::error::{WorkletError, ERR_SYNTAX, ERR_UNSUPPORTED_CONSTRUCT};
use crate::host::CompilerHost;
use crate::rewrite::{rewrite_function, CompiledWorklet, RewriteFailure};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    pub code: String,
    /// Compiled worklets, innermost first.
    pub worklets: Vec<CompiledWorklet>,
}

/// `(start, end, replacement)` edit relative to the text it applies to.
type Edit = (u32, u32, String);

fn apply_edits(text: &str, mut edits: Vec<Edit>) -> String {
    // back to front so earlier offsets stay valid
    edits.sort_by(|a, b| b.0.cmp(&a.0));
    let mut result = text.to_string();
    for (start, end, replacement) in edits {
        result.replace_range((start as usize)..(end as usize), &replacement);
    }
    result
}

/// Parse type for a file, falling back to JSX modules for unknown extensions.
pub fn source_type_for(file_path: &str) -> SourceType {
    SourceType::from_path(file_path)
        .unwrap_or_else(|_| SourceType::default().with_module(true).with_jsx(true))
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct WorkletCompiler {
    config: WorkletConfig,
}

impl WorkletCompiler {
    pub fn new(config: WorkletConfig) -> Self {
        WorkletCompiler { config }
    }

    pub fn config(&self) -> &WorkletConfig {
        &self.config
    }

    /// Compiles every worklet in `source`.
    ///
    /// Nothing is registered with `host` and no code is returned unless the whole file
    /// compiles.
    pub fn transform(
        &self,
        source: &str,
        file_path: &str,
        host: &mut dyn CompilerHost,
    ) -> Result<TransformOutput, WorkletError> {
        let allocator = Allocator::default();
        let source_type = source_type_for(file_path);
        let ret = Parser::new(&allocator, source, source_type).parse();
        if let Some(error) = ret.errors.first() {
            let offset = error
                .labels
                .as_ref()
                .and_then(|labels| labels.first())
                .map(|label| label.offset() as u32)
                .unwrap_or(0);
            return Err(WorkletError::at_offset(
                ERR_SYNTAX,
                &error.to_string(),
                file_path,
                source,
                offset,
            ));
        }
        if ret.panicked {
            return Err(WorkletError::new(
                ERR_SYNTAX,
                "Parser could not recover from the source.",
                file_path,
                1,
                1,
            ));
        }

        let forest = build_forest(collect_candidates(&ret.program, &self.config));
        if forest.is_empty() {
            return Ok(TransformOutput {
                code: source.to_string(),
                worklets: vec![],
            });
        }

        let mut worklets = Vec::new();
        let mut edits = Vec::new();
        for node in &forest {
            let replacement =
                self.compile_node(source, file_path, source_type, node, &mut worklets)?;
            let span = node.candidate.span;
            edits.push((span.start, span.end, replacement));
        }

        for unit in &worklets {
            host.register_compiled_unit(unit);
        }
        tracing::debug!("compiled {} worklets in {}", worklets.len(), file_path);

        Ok(TransformOutput {
            code: apply_edits(source, edits),
            worklets,
        })
    }

    /// Compiles `node` after its children and returns its replacement text.
    fn compile_node(
        &self,
        source: &str,
        file_path: &str,
        source_type: SourceType,
        node: &CandidateNode,
        worklets: &mut Vec<CompiledWorklet>,
    ) -> Result<String, WorkletError> {
        let span = node.candidate.span;
        let mut edits = Vec::new();
        for child in &node.children {
            let replacement =
                self.compile_node(source, file_path, source_type, child, worklets)?;
            let child_span = child.candidate.span;
            edits.push((
                child_span.start - span.start,
                child_span.end - span.start,
                replacement,
            ));
        }
        let text = apply_edits(&source[span.start as usize..span.end as usize], edits);

        let unit = rewrite_function(
            &text,
            span,
            &node.candidate.form,
            source_type,
            &self.config,
        )
        .map_err(|failure| rewrite_error(failure, file_path, source, span))?;
        let replacement = unit.replacement.clone();
        worklets.push(unit);
        Ok(replacement)
    }
}

fn rewrite_error(failure: RewriteFailure, file_path: &str, source: &str, span: Span) -> WorkletError {
    let (line, column) = crate::error::line_column(source, span.start);
    match failure {
        RewriteFailure::Unsupported(construct) => WorkletError::with_hints(
            ERR_UNSUPPORTED_CONSTRUCT,
            &format!(
                "{} is not supported inside a worklet.",
                construct.construct
            ),
            file_path,
            line,
            column,
            vec!["Worklets run synchronously on the UI runtime; keep async, generator, module and enum syntax outside them.".to_string()],
        ),
        RewriteFailure::Syntax(message) => {
            WorkletError::new(ERR_SYNTAX, &message, file_path, line, column)
        }
    }
}
