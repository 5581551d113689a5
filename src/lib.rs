//! # Worklet Compiler
//!
//! Extracts worklets from JavaScript sources so they can run on a separate UI runtime.
//!
//! ## Pipeline
//!
//! 1. **Discovery**: a function is a worklet if its own body starts with the `'worklet'`
//!    directive, or if it is passed at a configured argument position of a known hook
//!    (`useAnimatedStyle(fn)`, `withTiming(v, cfg, fn)`, every value of
//!    `useAnimatedGestureHandler({ ... })`).
//! 2. **Analysis**: each worklet is re-parsed on its own and walked with an explicit scope
//!    stack. Every identifier it reads from outside is recorded with the member path it is
//!    read through.
//! 3. **Closure**: paths of the same root are merged into a trie so the closure carries only
//!    the leaves that are read (`ctx.a.b` and `ctx.a.c` carry `{ ctx: { a: { b, c } } }`).
//! 4. **Rewrite**: the function is serialized without its closure, hashed, and replaced by
//!    an expression that attaches `_closure`, `asString` and `__workletHash` and registers
//!    the result with the runtime.
//!
//! Nested worklets are compiled first, so an outer worklet serializes the already compiled
//! inner one.
//!
//! ## Guarantees
//!
//! - Identical input yields byte-identical output and hashes.
//! - Output contains no `'worklet'` directive, so running the pass twice changes nothing.
//! - A file with an unsupported construct in any worklet produces an error and no output.

mod batch;
mod call_site;
mod candidates;
mod closure;
mod config;
mod directive;
mod erase;
mod error;
mod host;
#[cfg(feature = "napi")]
mod native;
mod plugins;
mod rewrite;
mod scope;
mod transform;


pub use batch::{compile_directory, find_source_files, FileReport};
pub use call_site::{callee_name, is_function_node, match_call_site};
pub use candidates::{build_forest, collect_candidates, Candidate, CandidateNode};
pub use closure::{ClosurePlan, ClosureTrie, PathTrieNode};
pub use config::{CallSiteSpec, WorkletConfig};
pub use directive::{has_worklet_directive, is_worklet, strip_directive, WorkletFunction};
pub use erase::{erase_types, TypeEraser};
pub use error::*;
pub use host::CompilerHost;
#[cfg(feature = "napi")]
pub use native::{
    default_worklet_config_native, remove_conflicting_passes_native, transform_worklets_native,
    NativeTransformResult,
};
pub use plugins::{
    remove_conflicting_passes, ConflictReport, PassDescriptor, PassHandler, PassPipeline,
};
pub use rewrite::{
    canonicalize, rewrite_function, worklet_hash, CompiledWorklet, ReplacementForm,
    RewriteFailure,
};
pub use scope::{
    free_variables, BindingKind, FreeVariableRef, FreeVariables, ScopeStack, UnsupportedConstruct,
};
pub use transform::{source_type_for, TransformOutput, WorkletCompiler};

/// Transforms one file with `config`, collecting the compiled worklets.
pub fn transform_worklets(
    source: &str,
    file_path: &str,
    config: &WorkletConfig,
) -> Result<TransformOutput, WorkletError> {
    let compiler = WorkletCompiler::new(config.clone());
    let mut worklets: Vec<CompiledWorklet> = Vec::new();
    compiler.transform(source, file_path, &mut worklets)
}
