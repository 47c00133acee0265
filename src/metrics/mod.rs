//! Typed snapshot of measurable codebase properties.
//!
//! `Metrics` is pure data. Gates address its fields by dot-notation paths:
//! top-level names such as `coverage_percent`, or `extra.<key>[.<key>...]`
//! for language-specific facts stored in the free-form `extra` map.

pub mod collector;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub use collector::{CommandCollector, MetricsCollector, StaticCollector};

/// Metric paths produced by the external analysis tools (everything except git).
pub const TOOL_METRIC_PATHS: &[&str] = &[
    "coverage_percent",
    "avg_complexity",
    "max_complexity",
    "functions_over_threshold",
    "critical_vulnerabilities",
    "high_vulnerabilities",
    "structure_conforms",
    "build_passes",
    "docs_present",
];

/// Metric path filled from the repository status rather than a tool.
pub const GIT_METRIC_PATH: &str = "git_clean";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    /// Line coverage, 0-100
    pub coverage_percent: f64,
    /// Mean cyclomatic complexity across functions
    pub avg_complexity: f64,
    /// Highest cyclomatic complexity of any function
    pub max_complexity: f64,
    /// Functions above the analyzer's complexity threshold
    pub functions_over_threshold: u64,
    pub critical_vulnerabilities: u64,
    pub high_vulnerabilities: u64,
    /// Whether the tree follows the ecosystem's conventional layout
    pub structure_conforms: bool,
    pub build_passes: bool,
    pub docs_present: bool,
    /// Working tree has no uncommitted changes
    pub git_clean: bool,
    /// Language-specific facts, addressed as `extra.<key>`
    pub extra: BTreeMap<String, serde_json::Value>,
    /// Paths whose producing tool could not run for this snapshot
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub unavailable: BTreeSet<String>,
}

/// A resolved metric value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Bool(bool),
    Number(f64),
}

impl MetricValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            MetricValue::Bool(_) => "bool",
            MetricValue::Number(_) => "number",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Bool(_) => None,
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Bool(b) => write!(f, "{}", b),
            MetricValue::Number(n) => write!(f, "{}", format_number(*n)),
        }
    }
}

/// Format a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Outcome of resolving a dot-notation path.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Value(MetricValue),
    /// Path exists but holds something other than a number or bool
    Unsupported(&'static str),
    Missing,
}

impl Metrics {
    /// Resolve a dot-notation metric path.
    pub fn lookup(&self, path: &str) -> Lookup {
        let value = match path {
            "coverage_percent" => MetricValue::Number(self.coverage_percent),
            "avg_complexity" => MetricValue::Number(self.avg_complexity),
            "max_complexity" => MetricValue::Number(self.max_complexity),
            "functions_over_threshold" => MetricValue::Number(self.functions_over_threshold as f64),
            "critical_vulnerabilities" => MetricValue::Number(self.critical_vulnerabilities as f64),
            "high_vulnerabilities" => MetricValue::Number(self.high_vulnerabilities as f64),
            "structure_conforms" => MetricValue::Bool(self.structure_conforms),
            "build_passes" => MetricValue::Bool(self.build_passes),
            "docs_present" => MetricValue::Bool(self.docs_present),
            "git_clean" => MetricValue::Bool(self.git_clean),
            other => return self.lookup_extra(other),
        };
        Lookup::Value(value)
    }

    fn lookup_extra(&self, path: &str) -> Lookup {
        let Some(rest) = path.strip_prefix("extra.") else {
            return Lookup::Missing;
        };
        let mut segments = rest.split('.');
        let Some(first) = segments.next() else {
            return Lookup::Missing;
        };
        let Some(mut current) = self.extra.get(first) else {
            return Lookup::Missing;
        };
        for segment in segments {
            match current.get(segment) {
                Some(next) => current = next,
                None => return Lookup::Missing,
            }
        }
        match current {
            serde_json::Value::Bool(b) => Lookup::Value(MetricValue::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => Lookup::Value(MetricValue::Number(f)),
                None => Lookup::Unsupported("number"),
            },
            serde_json::Value::String(_) => Lookup::Unsupported("string"),
            serde_json::Value::Array(_) => Lookup::Unsupported("array"),
            serde_json::Value::Object(_) => Lookup::Unsupported("object"),
            serde_json::Value::Null => Lookup::Unsupported("null"),
        }
    }

    /// Whether the producing tool for `path` was unavailable.
    pub fn is_unavailable(&self, path: &str) -> bool {
        self.unavailable.contains(path)
    }

    /// Range checks on values reported by external tools.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.coverage_percent) {
            return Err(format!(
                "coverage_percent must be within 0-100, got {}",
                self.coverage_percent
            ));
        }
        for (name, value) in [
            ("avg_complexity", self.avg_complexity),
            ("max_complexity", self.max_complexity),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{name} must be a finite value >= 0, got {value}"));
            }
        }
        Ok(())
    }
}
