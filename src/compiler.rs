//! Bundler engine: the public compile surface.
//!
//! DESIGN
//! ======
//! `Compiler` owns one toolchain handle, one module loader and a one-shot
//! initialization guard. Concurrent compiles share the guard, so the
//! toolchain is initialized once no matter how many builds start together;
//! an `AlreadyInitialized` answer counts as success. After that, builds run
//! independently with no queue or cancellation.
//!
//! Every failure, from policy rejections to network errors, is flattened
//! here and only here into the string error of [`CompileResult`].
//!
//! TRADE-OFFS
//! ==========
//! The handle is injected rather than global: share one `Compiler` (behind
//! an `Arc`) per process to get a single toolchain and module cache.

use std::sync::Arc;

use serde::{Serialize, Serializer};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::artifact::{ArtifactLanguage, ReactArtifact};
use crate::config::{CompilerConfig, ConfigError};
use crate::error::ErrorCode;
use crate::loader::{LoaderError, ModuleLoader};
use crate::plugin::{ProjectPlugin, SnippetPlugin};
use crate::policy::{ImportPolicy, PROJECT_ENTRY_SPECIFIER, PolicyMode};
use crate::toolchain::{
    BuildOptions, BuildOutput, BuildPlugin, Diagnostic, EntryPoint, Loader, NativeToolchain, Toolchain, ToolchainError,
};
use crate::vfs::{self, VirtualFileMap};
use crate::wrapper::{BOOTSTRAP_SOURCE_NAME, bootstrap_source};

/// Error text when a failure carries no usable message.
pub const GENERIC_COMPILE_ERROR: &str = "Failed to compile React artifact.";

// =============================================================================
// RESULT
// =============================================================================

/// Outcome of one compile. There is no partial success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileResult {
    Success {
        /// Directly executable script.
        output: String,
        /// Aggregated stylesheet text, when any CSS was bundled.
        css: Option<String>,
    },
    Failure {
        error: String,
    },
}

impl CompileResult {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Success { output, .. } => Some(output),
            Self::Failure { .. } => None,
        }
    }

    #[must_use]
    pub fn css(&self) -> Option<&str> {
        match self {
            Self::Success { css, .. } => css.as_deref(),
            Self::Failure { .. } => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failure { error } => Some(error),
            Self::Success { .. } => None,
        }
    }
}

#[derive(Serialize)]
struct CompileResultWire<'a> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    css: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Serialized as `{ "ok": true, "output": .., "css"?: .. }` or
/// `{ "ok": false, "error": .. }`.
impl Serialize for CompileResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CompileResultWire { ok: self.is_ok(), output: self.output(), css: self.css(), error: self.error() }
            .serialize(serializer)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Entry file not found: {0}")]
    EntryNotFound(String),

    #[error("Build produced no output.")]
    NoOutput,

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Loader(#[from] LoaderError),
}

impl ErrorCode for CompileError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EntryNotFound(_) => "E_ENTRY_NOT_FOUND",
            Self::NoOutput => "E_NO_OUTPUT",
            Self::Toolchain(e) => e.error_code(),
            Self::Config(e) => e.error_code(),
            Self::Loader(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Loader(e) => e.retryable(),
            _ => false,
        }
    }
}

impl CompileError {
    /// Flatten into the public error string: the first diagnostic with a
    /// `(line L:C)` suffix when it has a location.
    #[must_use]
    pub fn normalized(&self) -> String {
        match self {
            Self::Toolchain(ToolchainError::Build(failure)) => {
                failure.errors.first().map_or_else(|| GENERIC_COMPILE_ERROR.to_owned(), describe)
            }
            other => {
                let text = other.to_string();
                if text.trim().is_empty() { GENERIC_COMPILE_ERROR.to_owned() } else { text }
            }
        }
    }
}

fn describe(diagnostic: &Diagnostic) -> String {
    match &diagnostic.location {
        Some(location) => format!("{} (line {}:{})", diagnostic.text, location.line, location.column),
        None => diagnostic.text.clone(),
    }
}

// =============================================================================
// COMPILER
// =============================================================================

pub struct Compiler {
    config: CompilerConfig,
    toolchain: Arc<dyn Toolchain>,
    loader: Arc<ModuleLoader>,
    ready: OnceCell<()>,
}

impl Compiler {
    #[must_use]
    pub fn new(config: CompilerConfig, toolchain: Arc<dyn Toolchain>, loader: Arc<ModuleLoader>) -> Self {
        Self { config, toolchain, loader, ready: OnceCell::new() }
    }

    /// Native toolchain plus an HTTP-backed loader.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: CompilerConfig) -> Result<Self, CompileError> {
        let loader = Arc::new(ModuleLoader::from_config(&config)?);
        let toolchain = Arc::new(NativeToolchain::new(config.toolchain_worker));
        Ok(Self::new(config, toolchain, loader))
    }

    /// # Errors
    ///
    /// Returns an error if the environment holds invalid settings or the
    /// HTTP client cannot be built.
    pub fn from_env() -> Result<Self, CompileError> {
        Self::from_config(CompilerConfig::from_env()?)
    }

    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    #[must_use]
    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// Bundle one snippet behind the mounting bootstrap.
    pub async fn compile_snippet(&self, code: &str, language: ArtifactLanguage) -> CompileResult {
        let policy = ImportPolicy::new(&self.config, PolicyMode::Snippet);
        let plugin = SnippetPlugin::new(policy, Arc::clone(&self.loader), code, language);
        let entry = EntryPoint::Inline {
            contents: bootstrap_source(),
            loader: Loader::Js,
            source_name: BOOTSTRAP_SOURCE_NAME.to_owned(),
        };
        let result = self.build(BuildOptions::new(entry), Arc::new(plugin)).await;
        finish("snippet", result)
    }

    pub async fn compile_artifact(&self, artifact: &ReactArtifact) -> CompileResult {
        self.compile_snippet(&artifact.code, artifact.language).await
    }

    /// Bundle a multi-file project starting at `entry`.
    pub async fn compile_project(&self, files: VirtualFileMap, entry: &str) -> CompileResult {
        if !files.contains(&vfs::normalize(entry)) {
            return finish("project", Err(CompileError::EntryNotFound(entry.to_owned())));
        }
        let policy = ImportPolicy::new(&self.config, PolicyMode::Project);
        let plugin = ProjectPlugin::new(policy, Arc::clone(&self.loader), files, entry);
        let options = BuildOptions::new(EntryPoint::Specifier(PROJECT_ENTRY_SPECIFIER.to_owned()));
        let result = self.build(options, Arc::new(plugin)).await;
        finish("project", result)
    }

    async fn ensure_initialized(&self) -> Result<(), ToolchainError> {
        self.ready
            .get_or_try_init(|| async {
                match self.toolchain.initialize().await {
                    Ok(()) => Ok(()),
                    Err(ToolchainError::AlreadyInitialized) => {
                        debug!("toolchain was already initialized");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            })
            .await?;
        Ok(())
    }

    async fn build(&self, options: BuildOptions, plugin: Arc<dyn BuildPlugin>) -> Result<(String, Option<String>), CompileError> {
        self.ensure_initialized().await?;
        let output = self.toolchain.build(options, plugin).await?;
        collect_output(&output)
    }
}

/// First script plus every stylesheet, concatenated in emit order.
fn collect_output(output: &BuildOutput) -> Result<(String, Option<String>), CompileError> {
    let script = output
        .files
        .iter()
        .find(|f| f.path.ends_with(".js"))
        .filter(|f| !f.text.trim().is_empty())
        .ok_or(CompileError::NoOutput)?;
    let styles: Vec<&str> = output.files.iter().filter(|f| f.path.ends_with(".css")).map(|f| f.text.as_str()).collect();
    let css = if styles.is_empty() { None } else { Some(styles.concat()) };
    Ok((script.text.clone(), css))
}

fn finish(mode: &'static str, result: Result<(String, Option<String>), CompileError>) -> CompileResult {
    match result {
        Ok((output, css)) => {
            debug!(mode, bytes = output.len(), css = css.is_some(), "compile succeeded");
            CompileResult::Success { output, css }
        }
        Err(e) => {
            let error = e.normalized();
            warn!(mode, code = e.error_code(), retryable = e.retryable(), %error, "compile failed");
            CompileResult::Failure { error }
        }
    }
}

#[cfg(test)]
#[path = "compiler_test.rs"]
mod tests;
