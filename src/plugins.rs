//! Removal of host pipeline passes that break worklet compilation.
//!
//! A pass is removed only when its handler names, in order, and the source of every handler
//! match a deny-listed pass exactly. Equivalent but differently printed passes survive.

use serde::{Deserialize, Serialize};

use crate::error::{WorkletError, WARN_CONFLICTING_PASS_MISSING};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PassHandler {
    pub name: String,
    /// Serialized handler source as the host prints it.
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PassDescriptor {
    pub name: String,
    pub handlers: Vec<PassHandler>,
}

impl PassDescriptor {
    pub fn same_signature(&self, other: &PassDescriptor) -> bool {
        self.handlers.len() == other.handlers.len()
            && self
                .handlers
                .iter()
                .zip(&other.handlers)
                .all(|(a, b)| a.name == b.name && a.source == b.source)
    }
}

/// The host's pass list, as seen by the conflict filter.
pub trait PassPipeline {
    fn list_active_passes(&self) -> Vec<PassDescriptor>;
    fn remove_pass(&mut self, index: usize);
    /// Signature of an installed package, or `None` when it cannot be loaded.
    fn resolve_pass(&self, package: &str) -> Option<PassDescriptor>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    /// Names of removed passes, in pipeline order.
    pub removed: Vec<String>,
    /// Deny-listed packages that could not be resolved.
    pub missing: Vec<String>,
    pub warnings: Vec<WorkletError>,
}

pub fn remove_conflicting_passes(
    pipeline: &mut dyn PassPipeline,
    deny_list: &[String],
) -> ConflictReport {
    let mut report = ConflictReport::default();
    let active = pipeline.list_active_passes();
    let mut matched: Vec<usize> = Vec::new();

    for package in deny_list {
        let Some(signature) = pipeline.resolve_pass(package) else {
            tracing::warn!("conflicting pass {} could not be resolved, leaving it in place", package);
            report.missing.push(package.clone());
            report.warnings.push(WorkletError::new(
                WARN_CONFLICTING_PASS_MISSING,
                &format!("Conflicting pass '{}' could not be resolved.", package),
                package,
                0,
                0,
            ));
            continue;
        };
        for (index, pass) in active.iter().enumerate() {
            if pass.same_signature(&signature) && !matched.contains(&index) {
                matched.push(index);
            }
        }
    }

    matched.sort_unstable();
    report.removed = matched.iter().map(|i| active[*i].name.clone()).collect();
    for index in matched.into_iter().rev() {
        pipeline.remove_pass(index);
    }
    report
}
