//! Bundler toolchain.
//!
//! DESIGN
//! ======
//! `Toolchain` is the build seam the compiler drives; `BuildPlugin` is the
//! seam a build uses to resolve and load modules. `NativeToolchain` is the
//! in-process implementation: it walks the module graph in waves. Every
//! module discovered in one wave is loaded concurrently, transformed
//! (optionally on the blocking pool), and its imports resolved
//! concurrently. The next wave is whatever those resolutions added.
//!
//! Per module the pipeline is JSX lowering, then TypeScript erasure, then
//! ES module linking. Each pass keeps line breaks, so diagnostics carry
//! the line the user wrote. The linked modules are wrapped by `bundle`
//! into one self-executing script; CSS modules contribute to `out.css`.
//!
//! TRADE-OFFS
//! ==========
//! No syntax is downleveled; `target` is recorded in the bundle header
//! only. The first wave with errors ends the build, so errors in deeper
//! modules surface on a later attempt.

pub mod bundle;
pub mod esm;
pub mod jsx;
pub mod lexer;
pub mod typescript;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info};

use crate::error::ErrorCode;

use self::bundle::LinkedModule;
use self::esm::EsModule;
use self::lexer::SyntaxError;

pub const JS_OUTPUT_PATH: &str = "out.js";
pub const CSS_OUTPUT_PATH: &str = "out.css";

/// Namespace of an inline entry module.
pub const ENTRY_NAMESPACE: &str = "entry";

pub const DEFAULT_JSX_IMPORT_SOURCE: &str = "react";
pub const DEFAULT_TARGET: &str = "es2018";

// =============================================================================
// TYPES
// =============================================================================

/// How a module's contents are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    Tsx,
    Ts,
    Jsx,
    Js,
    Css,
    Json,
}

impl Loader {
    /// Loader for a file extension (without the dot).
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "tsx" => Some(Self::Tsx),
            "ts" | "mts" | "cts" => Some(Self::Ts),
            "jsx" => Some(Self::Jsx),
            "js" | "mjs" | "cjs" => Some(Self::Js),
            "css" => Some(Self::Css),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    fn has_jsx(self) -> bool {
        matches!(self, Self::Tsx | Self::Jsx)
    }

    fn has_types(self) -> bool {
        matches!(self, Self::Tsx | Self::Ts)
    }
}

/// Source position of a diagnostic. Lines are 1-based, columns 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub line_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub text: String,
    pub location: Option<Location>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(text: impl Into<String>, location: Option<Location>) -> Self {
        Self { text: text.into(), location }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}:{}:{}: ERROR: {}", loc.file, loc.line, loc.column, self.text),
            None => write!(f, "ERROR: {}", self.text),
        }
    }
}

/// Every error a failed build reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub errors: Vec<Diagnostic>,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.errors.len();
        write!(f, "Build failed with {n} error{}:", if n == 1 { "" } else { "s" })?;
        for error in &self.errors {
            write!(f, "\n{error}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    /// Contents supplied directly, named `source_name` in diagnostics.
    Inline { contents: String, loader: Loader, source_name: String },
    /// A specifier handed to the plugin's resolver.
    Specifier(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub entry: EntryPoint,
    pub jsx_import_source: String,
    pub target: String,
}

impl BuildOptions {
    #[must_use]
    pub fn new(entry: EntryPoint) -> Self {
        Self { entry, jsx_import_source: DEFAULT_JSX_IMPORT_SOURCE.into(), target: DEFAULT_TARGET.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub files: Vec<OutputFile>,
}

impl BuildOutput {
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&OutputFile> {
        self.files.iter().find(|f| f.path == path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    EntryPoint,
    ImportStatement,
    DynamicImport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveArgs {
    pub path: String,
    /// Path of the importing module; empty for the entry.
    pub importer: String,
    /// Namespace of the importing module; empty for the entry.
    pub namespace: String,
    pub resolve_dir: Option<String>,
    pub kind: ImportKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadArgs {
    pub path: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub contents: String,
    pub loader: Loader,
    /// Base for the module's own relative imports.
    pub resolve_dir: Option<String>,
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolchainError {
    #[error("toolchain is already initialized")]
    AlreadyInitialized,

    #[error("toolchain is not initialized")]
    NotInitialized,

    #[error("{0}")]
    Build(BuildFailure),

    #[error("toolchain worker failed: {0}")]
    Worker(String),
}

impl ErrorCode for ToolchainError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyInitialized => "E_TOOLCHAIN_ALREADY_INITIALIZED",
            Self::NotInitialized => "E_TOOLCHAIN_NOT_INITIALIZED",
            Self::Build(_) => "E_BUILD_FAILED",
            Self::Worker(_) => "E_TOOLCHAIN_WORKER",
        }
    }
}

fn failure(errors: Vec<Diagnostic>) -> ToolchainError {
    ToolchainError::Build(BuildFailure { errors })
}

// =============================================================================
// TRAITS
// =============================================================================

/// Module resolution and loading for one build.
#[async_trait]
pub trait BuildPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Map an import to a namespaced path. `Err` carries the diagnostic text.
    async fn on_resolve(&self, args: &ResolveArgs) -> Result<ResolvedPath, String>;

    /// Produce the contents of a resolved module.
    async fn on_load(&self, args: &LoadArgs) -> Result<LoadedSource, String>;
}

#[async_trait]
pub trait Toolchain: Send + Sync {
    /// One-time setup. A second call fails with `AlreadyInitialized`.
    async fn initialize(&self) -> Result<(), ToolchainError>;

    async fn build(&self, options: BuildOptions, plugin: Arc<dyn BuildPlugin>) -> Result<BuildOutput, ToolchainError>;
}

// =============================================================================
// NATIVE TOOLCHAIN
// =============================================================================

pub struct NativeToolchain {
    worker: bool,
    initialized: AtomicBool,
}

impl NativeToolchain {
    /// `worker` moves per-module transforms onto the blocking thread pool.
    #[must_use]
    pub fn new(worker: bool) -> Self {
        Self { worker, initialized: AtomicBool::new(false) }
    }
}

#[async_trait]
impl Toolchain for NativeToolchain {
    async fn initialize(&self) -> Result<(), ToolchainError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(ToolchainError::AlreadyInitialized);
        }
        info!(worker = self.worker, "native toolchain initialized");
        Ok(())
    }

    async fn build(&self, options: BuildOptions, plugin: Arc<dyn BuildPlugin>) -> Result<BuildOutput, ToolchainError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(ToolchainError::NotInitialized);
        }
        let mut build = Build { worker: self.worker, options, plugin, nodes: Vec::new(), index: HashMap::new() };
        build.run().await
    }
}

enum Output {
    Script { module: EsModule, ids: Vec<usize> },
    Style(String),
}

struct Node {
    namespace: String,
    path: String,
    /// The import that first requested this module; load failures point here.
    imported_at: Option<Location>,
    resolve_dir: Option<String>,
    contents: String,
    output: Option<Output>,
}

impl Node {
    fn display_name(&self) -> String {
        display_name(&self.namespace, &self.path)
    }
}

fn display_name(namespace: &str, path: &str) -> String {
    if namespace == ENTRY_NAMESPACE { path.to_string() } else { format!("{namespace}:{path}") }
}

struct Build {
    worker: bool,
    options: BuildOptions,
    plugin: Arc<dyn BuildPlugin>,
    nodes: Vec<Node>,
    index: HashMap<(String, String), usize>,
}

/// One import awaiting resolution.
struct PendingResolve {
    node: usize,
    record: usize,
    args: ResolveArgs,
    location: Location,
}

impl Build {
    /// Node id for `namespace:path`, and whether it was newly added.
    fn intern(&mut self, namespace: String, path: String, imported_at: Option<Location>) -> (usize, bool) {
        let key = (namespace, path);
        if let Some(&id) = self.index.get(&key) {
            return (id, false);
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            namespace: key.0.clone(),
            path: key.1.clone(),
            imported_at,
            resolve_dir: None,
            contents: String::new(),
            output: None,
        });
        self.index.insert(key, id);
        (id, true)
    }

    async fn run(&mut self) -> Result<BuildOutput, ToolchainError> {
        let mut preloaded = None;
        let entry = match self.options.entry.clone() {
            EntryPoint::Inline { contents, loader, source_name } => {
                preloaded = Some(LoadedSource { contents, loader, resolve_dir: None });
                self.intern(ENTRY_NAMESPACE.to_string(), source_name, None).0
            }
            EntryPoint::Specifier(specifier) => {
                let args = ResolveArgs {
                    path: specifier,
                    importer: String::new(),
                    namespace: String::new(),
                    resolve_dir: None,
                    kind: ImportKind::EntryPoint,
                };
                let resolved = self.plugin.on_resolve(&args).await.map_err(|text| failure(vec![Diagnostic::new(text, None)]))?;
                self.intern(resolved.namespace, resolved.path, None).0
            }
        };

        let mut wave = vec![entry];
        let mut depth = 0usize;
        while !wave.is_empty() {
            depth += 1;
            debug!(plugin = self.plugin.name(), depth, modules = wave.len(), "module wave");
            let loaded = self.load_wave(&wave, preloaded.take()).await?;
            self.transform_wave(loaded).await?;
            wave = self.resolve_wave(&wave).await?;
        }

        Ok(self.emit())
    }

    async fn load_wave(&self, wave: &[usize], preloaded: Option<LoadedSource>) -> Result<Vec<(usize, LoadedSource)>, ToolchainError> {
        let mut loaded = Vec::with_capacity(wave.len());
        let mut requests = Vec::new();
        let mut preloaded = preloaded;
        for &id in wave {
            if id == 0 {
                if let Some(source) = preloaded.take() {
                    loaded.push((id, source));
                    continue;
                }
            }
            let node = &self.nodes[id];
            requests.push((id, LoadArgs { path: node.path.clone(), namespace: node.namespace.clone() }));
        }

        let plugin = &self.plugin;
        let results = join_all(requests.iter().map(|(_, args)| plugin.on_load(args))).await;
        let mut errors = Vec::new();
        for ((id, _), result) in requests.iter().zip(results) {
            match result {
                Ok(source) => loaded.push((*id, source)),
                Err(text) => errors.push(Diagnostic::new(text, self.nodes[*id].imported_at.clone())),
            }
        }
        if errors.is_empty() { Ok(loaded) } else { Err(failure(errors)) }
    }

    async fn transform_wave(&mut self, loaded: Vec<(usize, LoadedSource)>) -> Result<(), ToolchainError> {
        let jobs: Vec<Job> = loaded
            .iter()
            .map(|(id, source)| {
                let node = &self.nodes[*id];
                Job {
                    display: node.display_name(),
                    url: node.path.clone(),
                    contents: source.contents.clone(),
                    loader: source.loader,
                    jsx_import_source: self.options.jsx_import_source.clone(),
                }
            })
            .collect();

        let results = if self.worker {
            let handles = jobs.into_iter().map(|job| tokio::task::spawn_blocking(move || job.run()));
            let mut results = Vec::with_capacity(loaded.len());
            for joined in join_all(handles).await {
                results.push(joined.map_err(|e| ToolchainError::Worker(e.to_string()))?);
            }
            results
        } else {
            jobs.iter().map(Job::run).collect()
        };

        let mut errors = Vec::new();
        for ((id, source), result) in loaded.into_iter().zip(results) {
            let node = &mut self.nodes[id];
            node.resolve_dir = source.resolve_dir;
            node.contents = source.contents;
            match result {
                Ok(output) => node.output = Some(output),
                Err(diagnostic) => errors.push(diagnostic),
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(failure(errors)) }
    }

    /// Resolve every import of `wave`; returns the modules first seen.
    async fn resolve_wave(&mut self, wave: &[usize]) -> Result<Vec<usize>, ToolchainError> {
        let mut pending = Vec::new();
        for &id in wave {
            let node = &self.nodes[id];
            let Some(Output::Script { module, .. }) = &node.output else {
                continue;
            };
            let display = node.display_name();
            for (n, record) in module.records().iter().enumerate() {
                pending.push(PendingResolve {
                    node: id,
                    record: n,
                    args: ResolveArgs {
                        path: record.specifier.clone(),
                        importer: node.path.clone(),
                        namespace: node.namespace.clone(),
                        resolve_dir: node.resolve_dir.clone(),
                        kind: record.kind,
                    },
                    location: locate(&display, module.source(), record.offset, &node.contents),
                });
            }
        }

        let plugin = Arc::clone(&self.plugin);
        let results = join_all(pending.iter().map(|p| plugin.on_resolve(&p.args))).await;

        let mut next = Vec::new();
        let mut errors = Vec::new();
        for (p, result) in pending.into_iter().zip(results) {
            match result {
                Ok(resolved) => {
                    let (target, added) = self.intern(resolved.namespace, resolved.path, Some(p.location));
                    if added {
                        next.push(target);
                    }
                    if let Some(Output::Script { ids, .. }) = &mut self.nodes[p.node].output {
                        ids[p.record] = target;
                    }
                }
                Err(text) => errors.push(Diagnostic::new(text, Some(p.location))),
            }
        }
        if errors.is_empty() { Ok(next) } else { Err(failure(errors)) }
    }

    fn emit(&self) -> BuildOutput {
        let mut modules = Vec::with_capacity(self.nodes.len());
        let mut styles = Vec::new();
        for node in &self.nodes {
            let name = node.display_name();
            let body = match &node.output {
                Some(Output::Script { module, ids }) => module.render(ids),
                Some(Output::Style(css)) => {
                    styles.push(format!("/* {name} */\n{}", css.trim_end()));
                    String::new()
                }
                None => String::new(),
            };
            modules.push(LinkedModule { name, body });
        }

        let js = bundle::render_bundle(&modules, &self.options.target);
        info!(plugin = self.plugin.name(), modules = modules.len(), bytes = js.len(), css = !styles.is_empty(), "bundle built");
        let mut files = vec![OutputFile { path: JS_OUTPUT_PATH.into(), text: js }];
        if !styles.is_empty() {
            files.push(OutputFile { path: CSS_OUTPUT_PATH.into(), text: styles.join("\n") + "\n" });
        }
        BuildOutput { files }
    }
}

/// Everything needed to transform one module off the async runtime.
struct Job {
    display: String,
    url: String,
    contents: String,
    loader: Loader,
    jsx_import_source: String,
}

impl Job {
    fn run(&self) -> Result<Output, Diagnostic> {
        let fail = |text: &str, err: SyntaxError| {
            Diagnostic::new(err.message, Some(locate(&self.display, text, err.offset, &self.contents)))
        };

        let mut code = match self.loader {
            Loader::Css => return Ok(Output::Style(self.contents.clone())),
            Loader::Json => {
                if let Err(e) = serde_json::from_str::<serde_json::Value>(&self.contents) {
                    let line = e.line().max(1);
                    let location = Location {
                        file: self.display.clone(),
                        line,
                        column: e.column().saturating_sub(1),
                        line_text: self.contents.lines().nth(line - 1).unwrap_or_default().to_string(),
                    };
                    return Err(Diagnostic::new(format!("Invalid JSON: {e}"), Some(location)));
                }
                format!("export default {};", self.contents.trim_end())
            }
            _ => self.contents.clone(),
        };

        if self.loader.has_jsx() {
            code = jsx::transform_jsx(&code, &self.jsx_import_source).map_err(|e| fail(&code, e))?;
        }
        if self.loader.has_types() {
            code = typescript::strip_types(&code).map_err(|e| fail(&code, e))?;
        }
        let module = esm::analyze(code.clone(), &self.url).map_err(|e| fail(&code, e))?;
        let ids = vec![0; module.records().len()];
        Ok(Output::Script { module, ids })
    }
}

/// Location of `offset` in `text`. Passes keep lines, so the displayed
/// line comes from the untransformed `original` when it has one.
fn locate(file: &str, text: &str, offset: usize, original: &str) -> Location {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &text[..offset];
    let line_start = before.rfind('\n').map_or(0, |n| n + 1);
    let line = before.matches('\n').count() + 1;
    let line_end = text[offset..].find('\n').map_or(text.len(), |n| offset + n);
    let line_text = original
        .lines()
        .nth(line - 1)
        .unwrap_or(&text[line_start..line_end])
        .trim_end_matches('\r')
        .to_string();
    Location { file: file.to_string(), line, column: text[line_start..offset].chars().count(), line_text }
}

/// Double-quoted JavaScript string literal for `value`.
pub(crate) fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if c < ' ' || c == '\u{7f}' => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
