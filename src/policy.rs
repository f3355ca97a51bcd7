//! Import policy gate: graduated trust for every import specifier.
//!
//! DESIGN
//! ======
//! Each rule is a plain classifier function returning a tagged
//! [`Resolution`]. Rules run in a fixed order and the first one that does
//! not pass decides. User-authored code only ever reaches the pinned
//! framework modules (and, in project mode, its own files); modules served
//! by the CDN may pull their own sub-dependencies from the same origin.
//!
//! TRADE-OFFS
//! ==========
//! Trust in a pinned CDN module is total once its URL is fetched, unless an
//! integrity digest is configured for it (see `loader`).

use std::collections::BTreeMap;

use crate::config::CompilerConfig;
use crate::error::ErrorCode;
use crate::vfs::{self, VirtualFileMap};

/// Specifier the snippet bootstrap uses to import the user's module.
pub const SNIPPET_ENTRY_SPECIFIER: &str = "__artifact_app__";

/// Entry specifier of a project build; served as a synthetic shim.
pub const PROJECT_ENTRY_SPECIFIER: &str = "__project_entry__";

/// Prefix the project shim uses to name the real entry file.
pub const PROJECT_FILE_PREFIX: &str = "project:";

// =============================================================================
// TYPES
// =============================================================================

/// Which plugin the policy is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    /// A single inline snippet.
    Snippet,
    /// A whole multi-file project.
    Project,
}

/// The module that contains the import being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importer<'a> {
    /// The build entry (snippet bootstrap or the project entry request).
    EntryPoint,
    /// The user's snippet module.
    Sandbox,
    /// The synthetic project entry shim.
    ProjectShim,
    /// A user project file, by normalized path.
    ProjectFile(&'a str),
    /// A module served by the CDN, by absolute URL.
    Remote(&'a str),
}

/// One import to classify.
#[derive(Debug, Clone, Copy)]
pub struct ImportRequest<'a> {
    pub specifier: &'a str,
    pub importer: Importer<'a>,
    /// Project files, present in project mode only.
    pub files: Option<&'a VirtualFileMap>,
}

/// Outcome of classifying an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The synthetic entry module (snippet source or project shim).
    VirtualEntry,
    /// Pinned framework module or CDN package URL.
    Redirect(String),
    /// A CDN-origin URL reached transitively from another CDN module.
    Remote(String),
    /// A project file, by normalized path.
    Local(String),
    /// Outside policy.
    Reject(PolicyViolation),
    /// The rule does not apply; try the next one.
    PassThrough,
}

/// Why an import was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("Network imports are not allowed in React artifacts: {0}")]
    NetworkImport(String),

    #[error("Absolute imports are not allowed in React artifacts: {0}")]
    AbsoluteImport(String),

    #[error("Relative imports are not allowed in React artifacts.")]
    RelativeImport,

    #[error("Relative imports are not allowed from the project entry: {0}")]
    EntryRelativeImport(String),

    #[error("Could not resolve local import: {0}")]
    UnresolvedLocal(String),

    #[error("Unsupported import \"{0}\". Only React imports are allowed.")]
    UnsupportedImport(String),

    #[error("Could not resolve {specifier} from {importer}")]
    InvalidRemote { specifier: String, importer: String },
}

impl ErrorCode for PolicyViolation {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NetworkImport(_) => "E_POLICY_NETWORK",
            Self::AbsoluteImport(_) => "E_POLICY_ABSOLUTE",
            Self::RelativeImport | Self::EntryRelativeImport(_) => "E_POLICY_RELATIVE",
            Self::UnresolvedLocal(_) => "E_UNRESOLVED_LOCAL",
            Self::UnsupportedImport(_) => "E_POLICY_UNSUPPORTED",
            Self::InvalidRemote { .. } => "E_INVALID_REMOTE",
        }
    }
}

// =============================================================================
// POLICY
// =============================================================================

type Rule = fn(&ImportPolicy, &ImportRequest<'_>) -> Resolution;

/// Evaluation order. The first rule that does not pass decides.
const RULES: &[Rule] = &[virtual_entry, pinned_framework, network_url, absolute_path, relative_path, bare_package];

/// The configured gate for one plugin mode.
#[derive(Debug, Clone)]
pub struct ImportPolicy {
    mode: PolicyMode,
    cdn_origin: String,
    pinned: BTreeMap<&'static str, String>,
}

impl ImportPolicy {
    #[must_use]
    pub fn new(config: &CompilerConfig, mode: PolicyMode) -> Self {
        Self { mode, cdn_origin: config.cdn_origin.clone(), pinned: pinned_modules(config) }
    }

    #[must_use]
    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    /// Pinned URL for an allowlisted framework specifier.
    #[must_use]
    pub fn pinned_url(&self, specifier: &str) -> Option<&str> {
        self.pinned.get(specifier).map(String::as_str)
    }

    /// Classify one import. Never returns [`Resolution::PassThrough`].
    #[must_use]
    pub fn classify(&self, request: &ImportRequest<'_>) -> Resolution {
        for rule in RULES {
            match rule(self, request) {
                Resolution::PassThrough => {}
                decided => return decided,
            }
        }
        Resolution::Reject(PolicyViolation::UnsupportedImport(request.specifier.to_owned()))
    }

    fn package_url(&self, specifier: &str) -> String {
        format!("{}/{}", self.cdn_origin, specifier)
    }
}

/// Framework specifiers and their version-pinned CDN URLs.
fn pinned_modules(config: &CompilerConfig) -> BTreeMap<&'static str, String> {
    let origin = &config.cdn_origin;
    let version = &config.react_version;
    BTreeMap::from([
        ("react", format!("{origin}/react@{version}")),
        ("react/jsx-runtime", format!("{origin}/react@{version}/jsx-runtime")),
        ("react/jsx-dev-runtime", format!("{origin}/react@{version}/jsx-dev-runtime")),
        ("react-dom/client", format!("{origin}/react-dom@{version}/client?deps=react@{version}")),
    ])
}

// =============================================================================
// RULES
// =============================================================================

/// Synthetic entry specifiers, and the project shim's reference to the real
/// entry file.
fn virtual_entry(policy: &ImportPolicy, request: &ImportRequest<'_>) -> Resolution {
    let entry_specifier = match policy.mode {
        PolicyMode::Snippet => SNIPPET_ENTRY_SPECIFIER,
        PolicyMode::Project => PROJECT_ENTRY_SPECIFIER,
    };
    if request.specifier == entry_specifier && request.importer == Importer::EntryPoint {
        return Resolution::VirtualEntry;
    }

    if request.importer == Importer::ProjectShim {
        if let Some(path) = request.specifier.strip_prefix(PROJECT_FILE_PREFIX) {
            let path = vfs::normalize(path);
            return if request.files.is_some_and(|files| files.contains(&path)) {
                Resolution::Local(path)
            } else {
                Resolution::Reject(PolicyViolation::UnresolvedLocal(path))
            };
        }
    }

    Resolution::PassThrough
}

/// The only way framework code enters the bundle.
fn pinned_framework(policy: &ImportPolicy, request: &ImportRequest<'_>) -> Resolution {
    match policy.pinned_url(request.specifier) {
        Some(url) => Resolution::Redirect(url.to_owned()),
        None => Resolution::PassThrough,
    }
}

/// Full URLs: only CDN modules may import them.
fn network_url(_policy: &ImportPolicy, request: &ImportRequest<'_>) -> Resolution {
    let spec = request.specifier;
    if !(starts_with_ignore_case(spec, "http://") || starts_with_ignore_case(spec, "https://")) {
        return Resolution::PassThrough;
    }
    match request.importer {
        Importer::Remote(_) => Resolution::Remote(spec.to_owned()),
        _ => Resolution::Reject(PolicyViolation::NetworkImport(spec.to_owned())),
    }
}

/// Root-relative paths: rebased onto the importing CDN module's origin.
fn absolute_path(_policy: &ImportPolicy, request: &ImportRequest<'_>) -> Resolution {
    let spec = request.specifier;
    if !spec.starts_with('/') {
        return Resolution::PassThrough;
    }
    match request.importer {
        Importer::Remote(importer) => join_remote(importer, spec),
        _ => Resolution::Reject(PolicyViolation::AbsoluteImport(spec.to_owned())),
    }
}

/// Dot-relative paths: project files or the importing CDN module's URL.
fn relative_path(_policy: &ImportPolicy, request: &ImportRequest<'_>) -> Resolution {
    let spec = request.specifier;
    if !spec.starts_with('.') {
        return Resolution::PassThrough;
    }
    match request.importer {
        Importer::EntryPoint | Importer::Sandbox => Resolution::Reject(PolicyViolation::RelativeImport),
        Importer::ProjectShim => Resolution::Reject(PolicyViolation::EntryRelativeImport(spec.to_owned())),
        Importer::ProjectFile(importer) => match request.files.and_then(|files| vfs::resolve_local(spec, importer, files)) {
            Some(path) => Resolution::Local(path),
            None => Resolution::Reject(PolicyViolation::UnresolvedLocal(spec.to_owned())),
        },
        Importer::Remote(importer) => join_remote(importer, spec),
    }
}

/// Bare package names: CDN dependencies resolve them in project mode, user
/// code never does.
fn bare_package(policy: &ImportPolicy, request: &ImportRequest<'_>) -> Resolution {
    match (policy.mode, request.importer) {
        (PolicyMode::Project, Importer::Remote(_)) => Resolution::Redirect(policy.package_url(request.specifier)),
        _ => Resolution::Reject(PolicyViolation::UnsupportedImport(request.specifier.to_owned())),
    }
}

fn join_remote(importer: &str, specifier: &str) -> Resolution {
    match url::Url::parse(importer).and_then(|base| base.join(specifier)) {
        Ok(url) => Resolution::Remote(url.to_string()),
        Err(_) => Resolution::Reject(PolicyViolation::InvalidRemote {
            specifier: specifier.to_owned(),
            importer: importer.to_owned(),
        }),
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value.get(..prefix.len()).is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
#[path = "policy_test.rs"]
mod tests;
