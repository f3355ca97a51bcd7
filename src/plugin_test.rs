use super::*;
use crate::config::CompilerConfig;
use crate::loader::{FetchedModule, LoaderError, ModuleFetcher};
use crate::toolchain::ImportKind;

struct StaticFetcher;

#[async_trait]
impl ModuleFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedModule, LoaderError> {
        if url.ends_with("/missing.mjs") {
            return Ok(FetchedModule { status: 404, body: String::new() });
        }
        Ok(FetchedModule { status: 200, body: format!("export const from = \"{url}\";") })
    }
}

fn loader() -> Arc<ModuleLoader> {
    Arc::new(ModuleLoader::new(Arc::new(StaticFetcher), &CompilerConfig::default()))
}

fn snippet(code: &str) -> SnippetPlugin {
    let policy = ImportPolicy::new(&CompilerConfig::default(), PolicyMode::Snippet);
    SnippetPlugin::new(policy, loader(), code, ArtifactLanguage::Tsx)
}

fn project(files: &[(&str, &str)], entry: &str) -> ProjectPlugin {
    let policy = ImportPolicy::new(&CompilerConfig::default(), PolicyMode::Project);
    let files = files.iter().map(|(path, src)| ((*path).to_owned(), (*src).to_owned())).collect();
    ProjectPlugin::new(policy, loader(), files, entry)
}

fn args(path: &str, namespace: &str, importer: &str) -> ResolveArgs {
    ResolveArgs {
        path: path.into(),
        importer: importer.into(),
        namespace: namespace.into(),
        resolve_dir: None,
        kind: if namespace.is_empty() { ImportKind::EntryPoint } else { ImportKind::ImportStatement },
    }
}

fn resolved(namespace: &str, path: &str) -> ResolvedPath {
    ResolvedPath { path: path.into(), namespace: namespace.into() }
}

fn load(namespace: &str, path: &str) -> LoadArgs {
    LoadArgs { path: path.into(), namespace: namespace.into() }
}

#[tokio::test]
async fn snippet_entry_resolves_into_the_sandbox() {
    let plugin = snippet("export default function App() {}");
    let result = plugin.on_resolve(&args(SNIPPET_ENTRY_SPECIFIER, "entry", "bootstrap.jsx")).await;
    assert_eq!(result, Ok(resolved(SANDBOX_NAMESPACE, SNIPPET_ENTRY_SPECIFIER)));

    let source = plugin.on_load(&load(SANDBOX_NAMESPACE, SNIPPET_ENTRY_SPECIFIER)).await.unwrap();
    assert_eq!(source.contents, "export default function App() {}");
    assert_eq!(source.loader, Loader::Tsx);
}

#[tokio::test]
async fn snippet_imports_follow_the_policy() {
    let plugin = snippet("");
    assert_eq!(
        plugin.on_resolve(&args("react", SANDBOX_NAMESPACE, SNIPPET_ENTRY_SPECIFIER)).await,
        Ok(resolved(CDN_NAMESPACE, "https://esm.sh/react@18.2.0"))
    );
    assert_eq!(
        plugin.on_resolve(&args("lodash", SANDBOX_NAMESPACE, SNIPPET_ENTRY_SPECIFIER)).await,
        Err("Unsupported import \"lodash\". Only React imports are allowed.".into())
    );
    assert_eq!(
        plugin.on_resolve(&args("./x", SANDBOX_NAMESPACE, SNIPPET_ENTRY_SPECIFIER)).await,
        Err("Relative imports are not allowed in React artifacts.".into())
    );
}

#[tokio::test]
async fn cdn_modules_resolve_their_own_imports() {
    let plugin = snippet("");
    let importer = "https://esm.sh/react@18.2.0";
    assert_eq!(
        plugin.on_resolve(&args("/stable/react@18.2.0/es2022/react.mjs", CDN_NAMESPACE, importer)).await,
        Ok(resolved(CDN_NAMESPACE, "https://esm.sh/stable/react@18.2.0/es2022/react.mjs"))
    );
    assert_eq!(
        plugin.on_resolve(&args("https://esm.sh/scheduler", CDN_NAMESPACE, importer)).await,
        Ok(resolved(CDN_NAMESPACE, "https://esm.sh/scheduler"))
    );
}

#[tokio::test]
async fn cdn_loads_carry_a_resolve_dir() {
    let plugin = snippet("");
    let source = plugin.on_load(&load(CDN_NAMESPACE, "https://esm.sh/a/b.mjs")).await.unwrap();
    assert_eq!(source.loader, Loader::Js);
    assert_eq!(source.resolve_dir.as_deref(), Some("https://esm.sh/a/"));

    let err = plugin.on_load(&load(CDN_NAMESPACE, "https://esm.sh/missing.mjs")).await.unwrap_err();
    assert_eq!(err, "Failed to load dependency: https://esm.sh/missing.mjs");
}

#[tokio::test]
async fn unknown_namespaces_fail_to_load() {
    let err = snippet("").on_load(&load("elsewhere", "x")).await.unwrap_err();
    assert_eq!(err, "No loader for \"x\" in namespace \"elsewhere\"");
}

#[tokio::test]
async fn project_shim_imports_the_entry() {
    let plugin = project(&[("src/index.tsx", "import './util';"), ("src/util.ts", "export const x = 1;")], "./src/index.tsx");
    assert_eq!(
        plugin.on_resolve(&args(PROJECT_ENTRY_SPECIFIER, "", "")).await,
        Ok(resolved(PROJECT_ENTRY_NAMESPACE, PROJECT_ENTRY_SPECIFIER))
    );

    let shim = plugin.on_load(&load(PROJECT_ENTRY_NAMESPACE, PROJECT_ENTRY_SPECIFIER)).await.unwrap();
    assert_eq!(shim.contents, "import \"project:src/index.tsx\";\n");

    assert_eq!(
        plugin.on_resolve(&args("project:src/index.tsx", PROJECT_ENTRY_NAMESPACE, PROJECT_ENTRY_SPECIFIER)).await,
        Ok(resolved(PROJECT_NAMESPACE, "src/index.tsx"))
    );
}

#[tokio::test]
async fn project_files_resolve_without_extensions() {
    let plugin = project(&[("src/index.tsx", ""), ("src/util.ts", "export const x = 1;")], "src/index.tsx");
    assert_eq!(
        plugin.on_resolve(&args("./util", PROJECT_NAMESPACE, "src/index.tsx")).await,
        Ok(resolved(PROJECT_NAMESPACE, "src/util.ts"))
    );
    assert_eq!(
        plugin.on_resolve(&args("./gone", PROJECT_NAMESPACE, "src/index.tsx")).await,
        Err("Could not resolve local import: ./gone".into())
    );

    let source = plugin.on_load(&load(PROJECT_NAMESPACE, "src/util.ts")).await.unwrap();
    assert_eq!(source.loader, Loader::Ts);
    assert_eq!(source.resolve_dir.as_deref(), Some("src"));
}

#[tokio::test]
async fn project_loads_report_missing_and_unloadable_files() {
    let plugin = project(&[("logo.png", "")], "index.tsx");
    assert_eq!(
        plugin.on_load(&load(PROJECT_NAMESPACE, "index.tsx")).await.unwrap_err(),
        "Missing source file: index.tsx"
    );
    assert_eq!(
        plugin.on_load(&load(PROJECT_NAMESPACE, "logo.png")).await.unwrap_err(),
        "No loader is configured for \"logo.png\""
    );
}

#[tokio::test]
async fn project_user_code_only_gets_pinned_packages() {
    let plugin = project(&[("index.tsx", "")], "index.tsx");
    assert!(plugin.on_resolve(&args("lodash", PROJECT_NAMESPACE, "index.tsx")).await.is_err());
    assert_eq!(
        plugin.on_resolve(&args("scheduler", CDN_NAMESPACE, "https://esm.sh/react-dom@18.2.0/client")).await,
        Ok(resolved(CDN_NAMESPACE, "https://esm.sh/scheduler"))
    );
}
