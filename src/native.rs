//! Node bindings.

use napi_derive::napi;
use std::collections::HashMap;

use crate::config::WorkletConfig;
use crate::error::WorkletError;
use crate::plugins::{remove_conflicting_passes, PassDescriptor, PassPipeline};
use crate::rewrite::CompiledWorklet;
use crate::transform::WorkletCompiler;

#[napi(object)]
pub struct NativeTransformResult {
    /// Transformed source, absent when the file failed to compile.
    pub code: Option<String>,
    /// JSON array of compiled worklets, innermost first.
    pub worklets: String,
    pub errors: Vec<WorkletError>,
}

impl NativeTransformResult {
    fn failed(error: WorkletError) -> Self {
        NativeTransformResult {
            code: None,
            worklets: "[]".to_string(),
            errors: vec![error],
        }
    }
}

#[napi]
pub fn transform_worklets_native(
    source: String,
    file_path: String,
    config_json: Option<String>,
) -> napi::Result<NativeTransformResult> {
    let config = match config_json {
        Some(json) => match WorkletConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => return Ok(NativeTransformResult::failed(e)),
        },
        None => WorkletConfig::default(),
    };

    let compiler = WorkletCompiler::new(config);
    let mut worklets: Vec<CompiledWorklet> = Vec::new();
    match compiler.transform(&source, &file_path, &mut worklets) {
        Ok(output) => Ok(NativeTransformResult {
            code: Some(output.code),
            worklets: serde_json::to_string(&worklets)
                .map_err(|e| napi::Error::from_reason(e.to_string()))?,
            errors: vec![],
        }),
        Err(e) => Ok(NativeTransformResult::failed(e)),
    }
}

#[napi]
pub fn default_worklet_config_native() -> napi::Result<serde_json::Value> {
    serde_json::to_value(WorkletConfig::default()).map_err(|e| napi::Error::from_reason(e.to_string()))
}

/// Pass list decoded from the host's JSON.
struct JsonPipeline {
    passes: Vec<PassDescriptor>,
    installed: HashMap<String, PassDescriptor>,
}

impl PassPipeline for JsonPipeline {
    fn list_active_passes(&self) -> Vec<PassDescriptor> {
        self.passes.clone()
    }

    fn remove_pass(&mut self, index: usize) {
        if index < self.passes.len() {
            self.passes.remove(index);
        }
    }

    fn resolve_pass(&self, package: &str) -> Option<PassDescriptor> {
        self.installed.get(package).cloned()
    }
}

/// `active_passes`: JSON array of passes; `installed_passes`: JSON object from package name to
/// pass. Returns `{ passes, report }` with the surviving passes in order.
#[napi]
pub fn remove_conflicting_passes_native(
    active_passes: String,
    installed_passes: String,
    deny_list: Option<Vec<String>>,
) -> napi::Result<serde_json::Value> {
    let passes: Vec<PassDescriptor> = serde_json::from_str(&active_passes)
        .map_err(|e| napi::Error::from_reason(format!("Invalid pass list: {}", e)))?;
    let installed: HashMap<String, PassDescriptor> = serde_json::from_str(&installed_passes)
        .map_err(|e| napi::Error::from_reason(format!("Invalid installed passes: {}", e)))?;
    let deny_list = deny_list.unwrap_or_else(|| WorkletConfig::default().conflicting_passes);

    let mut pipeline = JsonPipeline { passes, installed };
    let report = remove_conflicting_passes(&mut pipeline, &deny_list);
    Ok(serde_json::json!({
        "passes": pipeline.passes,
        "report": report,
    }))
}
