//! Compiles every source file under a directory, one file per rayon task.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{WorkletError, ERR_IO};
use crate::rewrite::CompiledWorklet;
use crate::transform::{TransformOutput, WorkletCompiler};

const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: PathBuf,
    pub result: Result<TransformOutput, WorkletError>,
}

/// Recursively find all script files, skipping `node_modules`. Sorted for stable reports.
pub fn find_source_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let walker = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != "node_modules");
    for entry in walker.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_source = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext));
        if is_source {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files
}

fn compile_file(path: &Path, compiler: &WorkletCompiler) -> Result<TransformOutput, WorkletError> {
    let file = path.to_string_lossy();
    let source = fs::read_to_string(path).map_err(|e| {
        tracing::warn!("failed to read {}: {}", file, e);
        WorkletError::new(ERR_IO, &format!("Failed to read file: {}", e), &file, 0, 0)
    })?;
    let mut worklets: Vec<CompiledWorklet> = Vec::new();
    compiler.transform(&source, &file, &mut worklets)
}

/// One report per discovered file, in path order. A failing file never stops the others.
pub fn compile_directory(root: &Path, compiler: &WorkletCompiler) -> Vec<FileReport> {
    find_source_files(root)
        .into_par_iter()
        .map(|path| {
            let result = compile_file(&path, compiler);
            FileReport { path, result }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkletConfig;
    use crate::error::ERR_UNSUPPORTED_CONSTRUCT;
    use tempfile::{tempdir, TempDir};

    /// Project skeleton in a fresh directory, removed when the guard drops.
    fn temp_project() -> TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/lib")).unwrap();
        dir
    }

    #[test]
    fn test_discovery_filters_extensions_and_node_modules() {
        let project = temp_project();
        let dir = project.path();
        fs::write(dir.join("src/a.js"), "").unwrap();
        fs::write(dir.join("src/nested/b.tsx"), "").unwrap();
        fs::write(dir.join("src/readme.md"), "").unwrap();
        fs::write(dir.join("node_modules/lib/c.js"), "").unwrap();

        let files = find_source_files(dir);
        assert_eq!(
            files,
            vec![dir.join("src/a.js"), dir.join("src/nested/b.tsx")]
        );
    }

    #[test]
    fn test_reports_per_file_in_path_order() {
        let project = temp_project();
        let dir = project.path();
        fs::write(
            dir.join("src/a.js"),
            "function f(a) { 'worklet'; return a + ctx.threshold; }\n",
        )
        .unwrap();
        fs::write(
            dir.join("src/b.js"),
            "const g = async () => { 'worklet'; };\n",
        )
        .unwrap();
        fs::write(dir.join("src/c.js"), "const plain = 1;\n").unwrap();

        let compiler = WorkletCompiler::new(WorkletConfig::default());
        let reports = compile_directory(dir, &compiler);
        assert_eq!(reports.len(), 3);

        let a = reports[0].result.as_ref().expect("a.js compiles");
        assert_eq!(a.worklets.len(), 1);
        assert!(a.code.starts_with("const f = "));

        let b = reports[1].result.as_ref().unwrap_err();
        assert_eq!(b.code, ERR_UNSUPPORTED_CONSTRUCT);
        assert!(b.file.ends_with("b.js"));

        let c = reports[2].result.as_ref().expect("c.js compiles");
        assert_eq!(c.code, "const plain = 1;\n");
        assert!(c.worklets.is_empty());
    }
}
