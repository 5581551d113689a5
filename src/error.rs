#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_UNSUPPORTED_CONSTRUCT: &str = "W-ERR-UNSUPPORTED-001";
pub const ERR_SYNTAX: &str = "W-ERR-SYNTAX-001";
pub const ERR_CONFIG: &str = "W-ERR-CONFIG-001";
pub const ERR_IO: &str = "W-ERR-IO-001";
pub const WARN_CONFLICTING_PASS_MISSING: &str = "W-WARN-PASS-MISSING";

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_UNSUPPORTED_CONSTRUCT => {
            "Worklets only contain constructs the UI runtime can execute. No partial output is emitted."
        }
        ERR_SYNTAX => "Only syntactically valid sources are transformed.",
        ERR_CONFIG => "Hook, global and carrier names in the configuration are valid identifiers.",
        ERR_IO => "Every discovered source file is read before it is compiled.",
        WARN_CONFLICTING_PASS_MISSING => {
            "Conflicting passes that cannot be resolved are left in place; compilation proceeds."
        }
        _ => "Unknown invariant.",
    }
}

fn get_error_type(code: &str) -> &'static str {
    match code {
        ERR_UNSUPPORTED_CONSTRUCT => "UNSUPPORTED_CONSTRUCT",
        ERR_SYNTAX => "SYNTAX_ERROR",
        ERR_CONFIG => "INVALID_CONFIGURATION",
        ERR_IO => "IO_ERROR",
        WARN_CONFLICTING_PASS_MISSING => "CONFLICTING_PLUGIN_MISSING",
        _ => "COMPILER_INVARIANT_VIOLATION",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WORKLET ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {message} ({file}:{line}:{column})")]
pub struct WorkletError {
    pub code: String,
    pub error_type: String,
    pub message: String,
    pub guarantee: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub hints: Vec<String>,
}

impl WorkletError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        Self::with_hints(code, message, file, line, column, vec![])
    }

    pub fn with_hints(
        code: &str,
        message: &str,
        file: &str,
        line: u32,
        column: u32,
        hints: Vec<String>,
    ) -> Self {
        WorkletError {
            code: code.to_string(),
            error_type: get_error_type(code).to_string(),
            message: message.to_string(),
            guarantee: get_guarantee(code).to_string(),
            file: file.to_string(),
            line,
            column,
            hints,
        }
    }

    /// Error anchored at a byte offset of `source`.
    pub fn at_offset(code: &str, message: &str, file: &str, source: &str, offset: u32) -> Self {
        let (line, column) = line_column(source, offset);
        Self::new(code, message, file, line, column)
    }

    pub fn config(message: &str) -> Self {
        Self::new(ERR_CONFIG, message, "<config>", 0, 0)
    }

    pub fn is_warning(&self) -> bool {
        self.code.starts_with("W-WARN-")
    }
}

/// 1-based line and column of a byte offset.
pub fn line_column(source: &str, offset: u32) -> (u32, u32) {
    let offset = (offset as usize).min(source.len());
    let before = &source.as_bytes()[..offset];
    let line = before.iter().filter(|b| **b == b'\n').count() as u32 + 1;
    let line_start = before
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let column = source
        .get(line_start..offset)
        .map(|s| s.chars().count())
        .unwrap_or(offset - line_start) as u32
        + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column_counts_from_one() {
        let source = "const a = 1;\nfunction f() {\n  'worklet';\n}";
        assert_eq!(line_column(source, 0), (1, 1));
        let offset = source.find("'worklet'").unwrap() as u32;
        assert_eq!(line_column(source, offset), (3, 3));
    }

    #[test]
    fn test_error_carries_type_and_guarantee() {
        let err = WorkletError::new(ERR_UNSUPPORTED_CONSTRUCT, "async worklet", "a.js", 2, 5);
        assert_eq!(err.error_type, "UNSUPPORTED_CONSTRUCT");
        assert!(err.guarantee.contains("UI runtime"));
        assert!(!err.is_warning());
        assert_eq!(
            err.to_string(),
            "[W-ERR-UNSUPPORTED-001] async worklet (a.js:2:5)"
        );
    }

    #[test]
    fn test_missing_pass_is_a_warning() {
        let warn = WorkletError::new(WARN_CONFLICTING_PASS_MISSING, "missing", "<pipeline>", 0, 0);
        assert!(warn.is_warning());
        assert_eq!(warn.error_type, "CONFLICTING_PLUGIN_MISSING");
    }
}
