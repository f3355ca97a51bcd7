//! Build plugins: the import policy, module loader and project files wired
//! into the toolchain's resolve/load hooks.
//!
//! DESIGN
//! ======
//! A build sees five namespaces. `entry` is the inline bootstrap (or the
//! project entry request), `sandbox` the user's snippet, `project-entry` the
//! synthetic shim that imports the real project entry, `project` user
//! project files, and `cdn` remote modules by URL. The importing module's
//! namespace tells the policy who is asking; every decision is the policy's.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::artifact::ArtifactLanguage;
use crate::error::ErrorCode;
use crate::loader::ModuleLoader;
use crate::policy::{
    ImportPolicy, ImportRequest, Importer, PROJECT_ENTRY_SPECIFIER, PROJECT_FILE_PREFIX, PolicyMode, PolicyViolation,
    Resolution, SNIPPET_ENTRY_SPECIFIER,
};
use crate::toolchain::{BuildPlugin, LoadArgs, LoadedSource, Loader, ResolveArgs, ResolvedPath, js_string};
use crate::vfs::{self, VirtualFileMap};

pub const SANDBOX_NAMESPACE: &str = "sandbox";
pub const PROJECT_ENTRY_NAMESPACE: &str = "project-entry";
pub const PROJECT_NAMESPACE: &str = "project";
pub const CDN_NAMESPACE: &str = "cdn";

// =============================================================================
// SHARED
// =============================================================================

fn importer_of(args: &ResolveArgs) -> Importer<'_> {
    match args.namespace.as_str() {
        SANDBOX_NAMESPACE => Importer::Sandbox,
        PROJECT_ENTRY_NAMESPACE => Importer::ProjectShim,
        PROJECT_NAMESPACE => Importer::ProjectFile(&args.importer),
        CDN_NAMESPACE => Importer::Remote(&args.importer),
        _ => Importer::EntryPoint,
    }
}

fn resolve(policy: &ImportPolicy, args: &ResolveArgs, files: Option<&VirtualFileMap>) -> Result<ResolvedPath, String> {
    let request = ImportRequest { specifier: &args.path, importer: importer_of(args), files };
    let (namespace, path) = match policy.classify(&request) {
        Resolution::VirtualEntry => match policy.mode() {
            PolicyMode::Snippet => (SANDBOX_NAMESPACE, SNIPPET_ENTRY_SPECIFIER.to_owned()),
            PolicyMode::Project => (PROJECT_ENTRY_NAMESPACE, PROJECT_ENTRY_SPECIFIER.to_owned()),
        },
        Resolution::Redirect(url) | Resolution::Remote(url) => (CDN_NAMESPACE, url),
        Resolution::Local(path) => (PROJECT_NAMESPACE, path),
        Resolution::Reject(violation) => return Err(rejected(args, &violation)),
        Resolution::PassThrough => {
            return Err(rejected(args, &PolicyViolation::UnsupportedImport(args.path.clone())));
        }
    };
    Ok(ResolvedPath { path, namespace: namespace.to_owned() })
}

fn rejected(args: &ResolveArgs, violation: &PolicyViolation) -> String {
    debug!(
        specifier = %args.path,
        importer = %args.importer,
        code = violation.error_code(),
        "import rejected"
    );
    violation.to_string()
}

async fn load_remote(loader: &ModuleLoader, url: &str) -> Result<LoadedSource, String> {
    let module = loader.load(url).await.map_err(|e| e.to_string())?;
    Ok(LoadedSource { contents: module.contents.clone(), loader: Loader::Js, resolve_dir: Some(module.resolve_dir.clone()) })
}

fn unknown_namespace(args: &LoadArgs) -> String {
    format!("No loader for \"{}\" in namespace \"{}\"", args.path, args.namespace)
}

// =============================================================================
// SNIPPET
// =============================================================================

/// Serves one user snippet behind [`SNIPPET_ENTRY_SPECIFIER`].
pub struct SnippetPlugin {
    policy: ImportPolicy,
    loader: Arc<ModuleLoader>,
    code: String,
    language: ArtifactLanguage,
}

impl SnippetPlugin {
    #[must_use]
    pub fn new(policy: ImportPolicy, loader: Arc<ModuleLoader>, code: impl Into<String>, language: ArtifactLanguage) -> Self {
        Self { policy, loader, code: code.into(), language }
    }
}

#[async_trait]
impl BuildPlugin for SnippetPlugin {
    fn name(&self) -> &'static str {
        "react-artifact"
    }

    async fn on_resolve(&self, args: &ResolveArgs) -> Result<ResolvedPath, String> {
        resolve(&self.policy, args, None)
    }

    async fn on_load(&self, args: &LoadArgs) -> Result<LoadedSource, String> {
        match args.namespace.as_str() {
            SANDBOX_NAMESPACE => {
                let loader = match self.language {
                    ArtifactLanguage::Tsx => Loader::Tsx,
                    ArtifactLanguage::Jsx => Loader::Jsx,
                };
                Ok(LoadedSource { contents: self.code.clone(), loader, resolve_dir: None })
            }
            CDN_NAMESPACE => load_remote(&self.loader, &args.path).await,
            _ => Err(unknown_namespace(args)),
        }
    }
}

// =============================================================================
// PROJECT
// =============================================================================

/// Serves a multi-file project whose entry is reached through a shim.
pub struct ProjectPlugin {
    policy: ImportPolicy,
    loader: Arc<ModuleLoader>,
    files: VirtualFileMap,
    entry: String,
}

impl ProjectPlugin {
    /// `entry` is normalized; it is not checked against `files` here.
    #[must_use]
    pub fn new(policy: ImportPolicy, loader: Arc<ModuleLoader>, files: VirtualFileMap, entry: &str) -> Self {
        Self { policy, loader, files, entry: vfs::normalize(entry) }
    }

    /// Source of the synthetic entry module.
    #[must_use]
    pub fn shim_source(&self) -> String {
        format!("import {};\n", js_string(&format!("{PROJECT_FILE_PREFIX}{}", self.entry)))
    }
}

#[async_trait]
impl BuildPlugin for ProjectPlugin {
    fn name(&self) -> &'static str {
        "react-project"
    }

    async fn on_resolve(&self, args: &ResolveArgs) -> Result<ResolvedPath, String> {
        resolve(&self.policy, args, Some(&self.files))
    }

    async fn on_load(&self, args: &LoadArgs) -> Result<LoadedSource, String> {
        match args.namespace.as_str() {
            PROJECT_ENTRY_NAMESPACE => Ok(LoadedSource { contents: self.shim_source(), loader: Loader::Js, resolve_dir: None }),
            PROJECT_NAMESPACE => {
                let contents = self.files.get(&args.path).ok_or_else(|| format!("Missing source file: {}", args.path))?;
                let loader = vfs::extension(&args.path)
                    .and_then(Loader::from_extension)
                    .ok_or_else(|| format!("No loader is configured for \"{}\"", args.path))?;
                Ok(LoadedSource { contents: contents.to_owned(), loader, resolve_dir: Some(vfs::dirname(&args.path)) })
            }
            CDN_NAMESPACE => load_remote(&self.loader, &args.path).await,
            _ => Err(unknown_namespace(args)),
        }
    }
}

#[cfg(test)]
#[path = "plugin_test.rs"]
mod tests;
