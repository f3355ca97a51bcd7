use super::*;
use crate::toolchain::esm;

#[test]
fn imports_framework_and_the_virtual_entry() {
    let source = bootstrap_source();
    let module = esm::analyze(source, BOOTSTRAP_SOURCE_NAME).unwrap();
    let specifiers: Vec<&str> = module.records().iter().map(|r| r.specifier.as_str()).collect();
    assert_eq!(specifiers, ["react", "react-dom/client", SNIPPET_ENTRY_SPECIFIER]);
}

#[test]
fn export_selection_prefers_default_then_app() {
    let source = bootstrap_source();
    let default_at = source.find("artifactModule.default != null").unwrap();
    let app_at = source.find("artifactModule.App != null").unwrap();
    assert!(default_at < app_at);
    assert!(source.contains(": artifactModule;"));
}

#[test]
fn mount_checks_throw_descriptive_errors() {
    let source = bootstrap_source();
    assert!(source.contains("document.getElementById(\"root\")"));
    assert!(source.contains("throw new Error(\"Preview root element not found.\");"));
    assert!(source.contains(&format!("throw new Error(\"{NO_COMPONENT_MESSAGE}\");")));

    let root_check = source.find(ROOT_NOT_FOUND_MESSAGE).unwrap();
    let render = source.find("createRoot(container).render").unwrap();
    assert!(root_check < render);
}
