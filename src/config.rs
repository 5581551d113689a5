//! Worklet compiler configuration.
//!
//! Every table the pass consults is immutable once a [`WorkletConfig`] is built, so one
//! config can be shared by all files of a build (see `batch.rs`).

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::WorkletError;

pub const DEFAULT_DIRECTIVE: &str = "worklet";
pub const DEFAULT_CLOSURE_CARRIER: &str = "jsThis";
pub const DEFAULT_REGISTRATION_HOOK: &str = "global.__reanimatedWorkletInit";

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
    static ref MEMBER_PATH_RE: Regex =
        Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$").unwrap();

    /// Identifiers that exist on the UI runtime and are never captured.
    pub static ref WORKLET_GLOBALS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("this");
        s.insert("console");
        s.insert("_globalSetter");
        s.insert("Date");
        s.insert("Array");
        s.insert("ArrayBuffer");
        s.insert("HermesInternal");
        s.insert("JSON");
        s.insert("Math");
        s.insert("Number");
        s.insert("Object");
        s.insert("String");
        s.insert("undefined");
        s.insert("null");
        s.insert("UIManager");
        s.insert("requestAnimationFrame");
        s.insert("_WORKLET");
        s.insert("arguments");
        s.insert("Boolean");
        s.insert("parseInt");
        s.insert("parseFloat");
        s.insert("Map");
        s.insert("Set");
        s.insert("_log");
        s.insert("_updateProps");
        s.insert("RegExp");
        s.insert("Error");
        s.insert("global");
        s.insert("_measure");
        s.insert("_scrollTo");
        s.insert("isNaN");
        s
    };

    /// Property names that end a captured member path. `stopCapturing` is the escape hatch
    /// for deliberately shallow captures.
    pub static ref BLACKLISTED_PROPERTIES: HashSet<&'static str> = {
        [
            "stopCapturing", "toString", "map", "filter", "forEach", "valueOf",
            "toPrecision", "toExponential", "constructor", "toFixed", "toLocaleString",
            "toSource", "charAt", "charCodeAt", "concat", "indexOf", "lastIndexOf",
            "localeCompare", "length", "match", "replace", "search", "slice", "split",
            "substr", "substring", "toLocaleLowerCase", "toLocaleUpperCase", "toLowerCase",
            "toUpperCase", "every", "join", "pop", "push", "reduce", "reduceRight",
            "reverse", "shift", "some", "sort", "splice", "unshift", "hasOwnProperty",
            "isPrototypeOf", "propertyIsEnumerable", "bind", "apply", "call", "__callAsync",
        ]
        .into_iter()
        .collect()
    };

    static ref DEFAULT_CALL_SITES: Vec<(&'static str, CallSiteSpec)> = vec![
        ("useAnimatedStyle", CallSiteSpec::Arguments(vec![0])),
        ("useAnimatedProps", CallSiteSpec::Arguments(vec![0])),
        ("useDerivedValue", CallSiteSpec::Arguments(vec![0])),
        ("useAnimatedScrollHandler", CallSiteSpec::ObjectHook(vec![0])),
        ("useAnimatedReaction", CallSiteSpec::Arguments(vec![0, 1])),
        ("useWorkletCallback", CallSiteSpec::Arguments(vec![0])),
        ("createWorklet", CallSiteSpec::Arguments(vec![0])),
        // animation callbacks
        ("withTiming", CallSiteSpec::Arguments(vec![2])),
        ("withSpring", CallSiteSpec::Arguments(vec![2])),
        ("withDecay", CallSiteSpec::Arguments(vec![1])),
        ("withRepeat", CallSiteSpec::Arguments(vec![3])),
        ("useAnimatedGestureHandler", CallSiteSpec::ObjectHook(vec![])),
    ];
}

/// Which arguments of a named call are compiled as worklets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "arguments", rename_all = "camelCase")]
pub enum CallSiteSpec {
    /// Explicit argument positions, starting from 0.
    Arguments(Vec<usize>),
    /// Every value of the first object-literal argument. The positions are used instead
    /// when the first argument is not an object literal.
    ObjectHook(Vec<usize>),
}

/// Tables are ordered so the serialized config is byte-stable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkletConfig {
    pub call_sites: BTreeMap<String, CallSiteSpec>,
    pub globals: BTreeSet<String>,
    pub blacklisted_properties: BTreeSet<String>,
    /// Directive marking a function for compilation, without quotes.
    pub directive: String,
    /// Identifier the serialized worklet reads its closure from.
    pub closure_carrier: String,
    /// Runtime function each compiled worklet is passed to.
    pub registration_hook: String,
    /// Host pipeline passes to remove before transforming.
    pub conflicting_passes: Vec<String>,
}

impl Default for WorkletConfig {
    fn default() -> Self {
        WorkletConfig {
            call_sites: DEFAULT_CALL_SITES
                .iter()
                .map(|(name, spec)| (name.to_string(), spec.clone()))
                .collect(),
            globals: WORKLET_GLOBALS.iter().map(|s| s.to_string()).collect(),
            blacklisted_properties: BLACKLISTED_PROPERTIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            directive: DEFAULT_DIRECTIVE.to_string(),
            closure_carrier: DEFAULT_CLOSURE_CARRIER.to_string(),
            registration_hook: DEFAULT_REGISTRATION_HOOK.to_string(),
            conflicting_passes: vec!["@babel/plugin-transform-object-assign".to_string()],
        }
    }
}

impl WorkletConfig {
    /// Parses a (possibly partial) JSON config; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, WorkletError> {
        let config: WorkletConfig = serde_json::from_str(json)
            .map_err(|e| WorkletError::config(&format!("Invalid worklet config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WorkletError> {
        for name in self.call_sites.keys() {
            if !IDENTIFIER_RE.is_match(name) {
                return Err(WorkletError::config(&format!(
                    "Call site '{}' is not a valid identifier.",
                    name
                )));
            }
        }
        for name in &self.globals {
            if !IDENTIFIER_RE.is_match(name) {
                return Err(WorkletError::config(&format!(
                    "Global '{}' is not a valid identifier.",
                    name
                )));
            }
        }
        if !IDENTIFIER_RE.is_match(&self.closure_carrier) {
            return Err(WorkletError::config(&format!(
                "Closure carrier '{}' is not a valid identifier.",
                self.closure_carrier
            )));
        }
        if !MEMBER_PATH_RE.is_match(&self.registration_hook) {
            return Err(WorkletError::config(&format!(
                "Registration hook '{}' must be an identifier or member path.",
                self.registration_hook
            )));
        }
        if self.directive.is_empty() || self.directive.contains(['\'', '"', '\n']) {
            return Err(WorkletError::config("Directive must be a non-empty plain string."));
        }
        Ok(())
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    pub fn is_blacklisted(&self, property: &str) -> bool {
        self.blacklisted_properties.contains(property)
    }

    pub fn call_site(&self, name: &str) -> Option<&CallSiteSpec> {
        self.call_sites.get(name)
    }
}
