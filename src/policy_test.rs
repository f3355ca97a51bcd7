use super::*;

fn snippet_policy() -> ImportPolicy {
    ImportPolicy::new(&CompilerConfig::default(), PolicyMode::Snippet)
}

fn project_policy() -> ImportPolicy {
    ImportPolicy::new(&CompilerConfig::default(), PolicyMode::Project)
}

fn classify(policy: &ImportPolicy, specifier: &str, importer: Importer<'_>) -> Resolution {
    policy.classify(&ImportRequest { specifier, importer, files: None })
}

fn rejection(resolution: Resolution) -> String {
    match resolution {
        Resolution::Reject(violation) => violation.to_string(),
        other => panic!("expected rejection, got {other:?}"),
    }
}

// =============================================================================
// SNIPPET MODE
// =============================================================================

#[test]
fn pinned_framework_modules_redirect_to_versioned_urls() {
    let policy = snippet_policy();
    assert_eq!(classify(&policy, "react", Importer::Sandbox), Resolution::Redirect("https://esm.sh/react@18.2.0".into()));
    assert_eq!(
        classify(&policy, "react/jsx-runtime", Importer::Sandbox),
        Resolution::Redirect("https://esm.sh/react@18.2.0/jsx-runtime".into())
    );
    assert_eq!(
        classify(&policy, "react/jsx-dev-runtime", Importer::Sandbox),
        Resolution::Redirect("https://esm.sh/react@18.2.0/jsx-dev-runtime".into())
    );
    assert_eq!(
        classify(&policy, "react-dom/client", Importer::EntryPoint),
        Resolution::Redirect("https://esm.sh/react-dom@18.2.0/client?deps=react@18.2.0".into())
    );
}

#[test]
fn pins_follow_configured_origin_and_version() {
    let config = CompilerConfig {
        cdn_origin: "https://cdn.example.test".into(),
        react_version: "18.3.1".into(),
        ..CompilerConfig::default()
    };
    let policy = ImportPolicy::new(&config, PolicyMode::Snippet);
    assert_eq!(policy.pinned_url("react"), Some("https://cdn.example.test/react@18.3.1"));
}

#[test]
fn app_specifier_is_virtual_only_from_the_entry() {
    let policy = snippet_policy();
    assert_eq!(classify(&policy, SNIPPET_ENTRY_SPECIFIER, Importer::EntryPoint), Resolution::VirtualEntry);
    assert!(matches!(classify(&policy, SNIPPET_ENTRY_SPECIFIER, Importer::Sandbox), Resolution::Reject(_)));
}

#[test]
fn bare_packages_are_rejected_from_user_code() {
    let policy = snippet_policy();
    assert_eq!(
        rejection(classify(&policy, "lodash", Importer::Sandbox)),
        "Unsupported import \"lodash\". Only React imports are allowed."
    );
    assert!(matches!(classify(&policy, "react-dom", Importer::Sandbox), Resolution::Reject(_)));
}

#[test]
fn relative_imports_are_rejected_from_snippets() {
    let policy = snippet_policy();
    assert_eq!(
        rejection(classify(&policy, "./util", Importer::Sandbox)),
        "Relative imports are not allowed in React artifacts."
    );
    assert!(matches!(classify(&policy, "../x", Importer::Sandbox), Resolution::Reject(_)));
}

#[test]
fn network_and_absolute_imports_are_rejected_from_user_code() {
    let policy = snippet_policy();
    assert!(matches!(
        classify(&policy, "https://evil.test/x.js", Importer::Sandbox),
        Resolution::Reject(PolicyViolation::NetworkImport(_))
    ));
    assert!(matches!(
        classify(&policy, "HTTP://evil.test/x.js", Importer::Sandbox),
        Resolution::Reject(PolicyViolation::NetworkImport(_))
    ));
    assert!(matches!(
        classify(&policy, "/etc/passwd", Importer::Sandbox),
        Resolution::Reject(PolicyViolation::AbsoluteImport(_))
    ));
}

// =============================================================================
// CDN MODULES
// =============================================================================

#[test]
fn remote_modules_resolve_root_relative_paths_against_their_origin() {
    let policy = snippet_policy();
    let importer = Importer::Remote("https://esm.sh/react@18.2.0");
    assert_eq!(
        classify(&policy, "/stable/react@18.2.0/es2022/react.mjs", importer),
        Resolution::Remote("https://esm.sh/stable/react@18.2.0/es2022/react.mjs".into())
    );
}

#[test]
fn remote_modules_resolve_dot_relative_paths_against_their_url() {
    let policy = snippet_policy();
    let importer = Importer::Remote("https://esm.sh/react-dom@18.2.0/es2022/client.mjs");
    assert_eq!(
        classify(&policy, "./react-dom.mjs", importer),
        Resolution::Remote("https://esm.sh/react-dom@18.2.0/es2022/react-dom.mjs".into())
    );
    assert_eq!(
        classify(&policy, "../shared.mjs", importer),
        Resolution::Remote("https://esm.sh/react-dom@18.2.0/shared.mjs".into())
    );
}

#[test]
fn remote_modules_may_import_full_urls() {
    let policy = snippet_policy();
    let importer = Importer::Remote("https://esm.sh/react@18.2.0");
    assert_eq!(
        classify(&policy, "https://esm.sh/scheduler@0.23.0", importer),
        Resolution::Remote("https://esm.sh/scheduler@0.23.0".into())
    );
}

#[test]
fn remote_modules_may_not_import_bare_packages_in_snippet_mode() {
    let policy = snippet_policy();
    let importer = Importer::Remote("https://esm.sh/react@18.2.0");
    assert!(matches!(classify(&policy, "scheduler", importer), Resolution::Reject(_)));
    assert_eq!(classify(&policy, "react", importer), Resolution::Redirect("https://esm.sh/react@18.2.0".into()));
}

// =============================================================================
// PROJECT MODE
// =============================================================================

fn project_files() -> VirtualFileMap {
    [("index.tsx", "import './App'"), ("App.tsx", "export default 1"), ("lib/math.ts", "export {}")]
        .into_iter()
        .collect()
}

#[test]
fn project_entry_shim_resolves_the_real_entry() {
    let policy = project_policy();
    let files = project_files();
    assert_eq!(classify(&policy, PROJECT_ENTRY_SPECIFIER, Importer::EntryPoint), Resolution::VirtualEntry);
    let shim = ImportRequest { specifier: "project:/index.tsx", importer: Importer::ProjectShim, files: Some(&files) };
    assert_eq!(policy.classify(&shim), Resolution::Local("index.tsx".into()));

    let missing = ImportRequest { specifier: "project:main.tsx", importer: Importer::ProjectShim, files: Some(&files) };
    assert!(matches!(policy.classify(&missing), Resolution::Reject(PolicyViolation::UnresolvedLocal(_))));
}

#[test]
fn snippet_entry_specifier_is_not_virtual_in_project_mode() {
    let policy = project_policy();
    assert!(matches!(classify(&policy, SNIPPET_ENTRY_SPECIFIER, Importer::EntryPoint), Resolution::Reject(_)));
}

#[test]
fn project_files_resolve_relative_imports() {
    let policy = project_policy();
    let files = project_files();
    let request = ImportRequest { specifier: "./lib/math", importer: Importer::ProjectFile("App.tsx"), files: Some(&files) };
    assert_eq!(policy.classify(&request), Resolution::Local("lib/math.ts".into()));

    let missing = ImportRequest { specifier: "./nope", importer: Importer::ProjectFile("App.tsx"), files: Some(&files) };
    assert_eq!(rejection(policy.classify(&missing)), "Could not resolve local import: ./nope");
}

#[test]
fn project_shim_rejects_relative_imports() {
    let policy = project_policy();
    assert!(matches!(
        classify(&policy, "./index", Importer::ProjectShim),
        Resolution::Reject(PolicyViolation::EntryRelativeImport(_))
    ));
}

#[test]
fn project_user_code_gets_only_pinned_packages() {
    let policy = project_policy();
    assert!(matches!(classify(&policy, "react", Importer::ProjectFile("App.tsx")), Resolution::Redirect(_)));
    assert!(matches!(
        classify(&policy, "lodash", Importer::ProjectFile("App.tsx")),
        Resolution::Reject(PolicyViolation::UnsupportedImport(_))
    ));
}

#[test]
fn project_cdn_modules_resolve_bare_packages_on_the_cdn() {
    let policy = project_policy();
    let importer = Importer::Remote("https://esm.sh/react-dom@18.2.0/client");
    assert_eq!(classify(&policy, "scheduler", importer), Resolution::Redirect("https://esm.sh/scheduler".into()));
}

#[test]
fn violations_carry_error_codes() {
    assert_eq!(PolicyViolation::RelativeImport.error_code(), "E_POLICY_RELATIVE");
    assert_eq!(PolicyViolation::UnsupportedImport("x".into()).error_code(), "E_POLICY_UNSUPPORTED");
    assert!(!PolicyViolation::NetworkImport("x".into()).retryable());
}
