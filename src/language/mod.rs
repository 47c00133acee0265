//! Language handler registry.
//!
//! Each ecosystem is a `LanguageHandler` registered under a key. The
//! orchestrator only ever talks to handlers through `HandlerRegistry`, so new
//! ecosystems are added by registering a handler (or a `[[languages]]`
//! profile), never by touching the orchestrator.

pub mod profile;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::errors::{BrownfieldError, Result};
use crate::tools::ToolRunner;

pub use profile::{LanguageProfile, MarkerRule, ProfileHandler, builtin_profiles};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub language: String,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSetupResult {
    #[serde(default)]
    pub framework: String,
    #[serde(default)]
    pub coverage: Option<f64>,
    #[serde(default)]
    pub tests_generated: u32,
}

/// Tools a linter/formatter installation step ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallResult {
    pub installed: Vec<String>,
}

/// Capability set every ecosystem implements.
///
/// Handlers must only touch files under `root` and must report failures as
/// `BrownfieldError` values, never as raw exit codes.
#[async_trait]
pub trait LanguageHandler: Send + Sync {
    fn key(&self) -> &str;

    async fn detect(&self, root: &Path) -> Result<Option<DetectionResult>>;

    async fn bootstrap_tests(
        &self,
        root: &Path,
        core_modules: &[String],
        coverage_target: f64,
    ) -> Result<TestSetupResult>;

    async fn install_linters(&self, root: &Path) -> Result<InstallResult>;

    async fn install_formatters(&self, root: &Path) -> Result<InstallResult>;
}

/// Handlers keyed by language, in registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<(String, Box<dyn LanguageHandler>)>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in profiles, replaced or extended by `extra`.
    pub fn with_profiles(extra: &[LanguageProfile], runner: &ToolRunner) -> Result<Self> {
        let mut profiles = builtin_profiles();
        for profile in extra {
            match profiles.iter_mut().find(|p| p.key == profile.key) {
                Some(existing) => *existing = profile.clone(),
                None => profiles.push(profile.clone()),
            }
        }

        let mut registry = Self::new();
        for profile in profiles {
            let key = profile.key.clone();
            registry.register(key, Box::new(ProfileHandler::new(profile, runner.clone())))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, key: impl Into<String>, handler: Box<dyn LanguageHandler>) -> Result<()> {
        let key = key.into();
        if self.handlers.iter().any(|(k, _)| *k == key) {
            return Err(BrownfieldError::DuplicateHandler { key });
        }
        debug!(%key, "registered language handler");
        self.handlers.push((key, handler));
        Ok(())
    }

    pub fn resolve(&self, key: &str) -> Result<&dyn LanguageHandler> {
        self.handlers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, h)| h.as_ref())
            .ok_or_else(|| BrownfieldError::UnsupportedLanguage {
                key: key.to_string(),
                known: self.keys(),
            })
    }

    pub fn keys(&self) -> Vec<String> {
        self.handlers.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Ask every handler in registration order. The highest confidence wins;
    /// among equals the earliest registered handler wins.
    pub async fn detect(&self, root: &Path) -> Result<Option<DetectionResult>> {
        let mut best: Option<DetectionResult> = None;
        for (key, handler) in &self.handlers {
            let Some(mut found) = handler.detect(root).await? else {
                continue;
            };
            found.language = key.clone();
            debug!(language = %key, confidence = ?found.confidence, "language candidate");
            if best.as_ref().is_none_or(|b| found.confidence > b.confidence) {
                best = Some(found);
            }
        }
        Ok(best)
    }
}
