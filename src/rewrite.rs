//! Function rewriter: turns one worklet function into its closure-free serialized form
//! plus the JS-thread replacement that carries the closure and registers the worklet.

use oxc_allocator::Allocator;
use oxc_ast::ast::Statement;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::closure::ClosurePlan;
use crate::config::WorkletConfig;
use crate::directive::{strip_directive, WorkletFunction};
use crate::erase::erase_types;
use crate::scope::UnsupportedConstruct;

/// Name of the serialized function when the source function has none.
pub const ANONYMOUS_WORKLET_NAME: &str = "_f";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledWorklet {
    pub name: Option<String>,
    pub hash: u64,
    /// Canonical closure-free source, the string the UI runtime evaluates.
    pub source: String,
    /// Closure object expression, evaluated on the JS thread.
    pub closure: String,
    /// Parenthesized parameter list.
    pub params: String,
    pub body: String,
    pub closure_variables: Vec<String>,
    pub outputs: Vec<String>,
    pub start: u32,
    pub end: u32,
    /// Text that replaces `start..end` in the source file.
    pub replacement: String,
}

/// How the compiled worklet takes the place of the original node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacementForm {
    /// `function name() {}` statement; becomes `const name = ...;`.
    Declaration(String),
    /// Anything in expression position, and `export default function`.
    Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteFailure {
    /// The function text, or its serialized form, does not parse.
    Syntax(String),
    Unsupported(UnsupportedConstruct),
}

impl From<UnsupportedConstruct> for RewriteFailure {
    fn from(construct: UnsupportedConstruct) -> Self {
        RewriteFailure::Unsupported(construct)
    }
}

/// Source type for snippets. TypeScript is accepted by the parser so leftover runtime TS
/// constructs reach the scope walker and are reported as unsupported.
fn snippet_source_type() -> SourceType {
    SourceType::default()
        .with_module(true)
        .with_typescript(true)
        .with_jsx(true)
}

/// 53-bit prefix of the SHA-256 digest, exact as a JS number.
pub fn worklet_hash(source: &str) -> u64 {
    let digest = Sha256::digest(source.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) >> 11
}

fn slice(source: &str, span: Span) -> &str {
    &source[span.start as usize..span.end as usize]
}

fn params_text(source: &str, function: &WorkletFunction) -> String {
    let text = slice(source, function.params().span).trim();
    if text.starts_with('(') {
        text.to_string()
    } else {
        format!("({})", text)
    }
}

/// Directives other than the marker, each re-emitted as a terminated statement so they stay
/// in directive position ahead of the closure prologue.
fn directive_text(function: &WorkletFunction, marker: &str) -> String {
    let Some(body) = function.body() else {
        return String::new();
    };
    if function.has_expression_body() {
        return String::new();
    }
    strip_directive(body, marker)
        .map(|d| {
            format!(
                "{};\n",
                serde_json::Value::String(d.expression.value.to_string())
            )
        })
        .collect()
}

/// Body statements without comments or directives.
fn body_text(source: &str, function: &WorkletFunction) -> String {
    let Some(body) = function.body() else {
        return String::new();
    };
    if function.has_expression_body() {
        if let Some(Statement::ExpressionStatement(stmt)) = body.statements.first() {
            return format!("return {};", slice(source, stmt.expression.span()));
        }
    }
    body.statements
        .iter()
        .map(|s| slice(source, s.span()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prints `code` through `oxc_codegen` so equivalent functions serialize identically.
pub fn canonicalize(code: &str) -> Result<String, RewriteFailure> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, snippet_source_type()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return Err(RewriteFailure::Syntax(format!(
            "Serialized worklet does not parse: {}",
            code
        )));
    }
    let printed = Codegen::new()
        .with_options(CodegenOptions::minify())
        .build(&ret.program)
        .code;
    Ok(printed.trim().to_string())
}

/// Compiles the source text of one function. `text` is the function as it currently reads,
/// with nested worklets already replaced; it is parsed into its own allocator so analysis
/// never sees another function's rewrite. `source_type` is the enclosing file's; TypeScript
/// functions have their types erased first.
pub fn rewrite_function(
    text: &str,
    span: Span,
    form: &ReplacementForm,
    source_type: SourceType,
    config: &WorkletConfig,
) -> Result<CompiledWorklet, RewriteFailure> {
    let mut wrapped = format!("({})", text);
    if source_type.is_typescript() {
        wrapped = erase_types(&wrapped, source_type)?;
    }
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, &wrapped, snippet_source_type()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return Err(RewriteFailure::Syntax(
            ret.errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Worklet function does not parse.".to_string()),
        ));
    }
    let Some(function) = WorkletFunction::from_program(&ret.program) else {
        return Err(RewriteFailure::Syntax(
            "Worklet source is not a function.".to_string(),
        ));
    };

    let plan = ClosurePlan::analyze(function, config)?;

    let params = params_text(&wrapped, &function);
    let directives = directive_text(&function, &config.directive);
    let body = body_text(&wrapped, &function);
    let variables = plan.variables();
    let prologue = if variables.is_empty() {
        String::new()
    } else {
        format!(
            "const {{ {} }} = {}._closure;\n",
            variables.join(", "),
            config.closure_carrier
        )
    };
    let name = function.name().map(|s| s.to_string());
    let serialized = format!(
        "function {}{} {{\n{}{}{}\n}}",
        name.as_deref().unwrap_or(ANONYMOUS_WORKLET_NAME),
        params,
        directives,
        prologue,
        body
    );
    let source = canonicalize(&serialized)?;
    let hash = worklet_hash(&source);
    let closure = plan.closure_object();

    let invocation = format!(
        "(function () {{ const _f = function {} {{ {}{} }}; _f._closure = {}; _f.asString = {}; _f.__workletHash = {}; {}(_f); return _f; }})()",
        params,
        directives,
        body,
        closure,
        serde_json::Value::String(source.clone()),
        hash,
        config.registration_hook
    );
    let replacement = match form {
        ReplacementForm::Declaration(binding) => format!("const {} = {};", binding, invocation),
        ReplacementForm::Expression => invocation,
    };

    tracing::debug!(
        "compiled worklet {} (hash {})",
        name.as_deref().unwrap_or(ANONYMOUS_WORKLET_NAME),
        hash
    );

    Ok(CompiledWorklet {
        name,
        hash,
        source,
        closure,
        params,
        body,
        closure_variables: variables.iter().map(|s| s.to_string()).collect(),
        outputs: plan.free_variables.outputs.clone(),
        start: span.start,
        end: span.end,
        replacement,
    })
}
