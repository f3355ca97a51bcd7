use super::*;

fn message(tag: &str, code: &str) -> String {
    format!("Here is your component:\n\n```{tag}\n{code}\n```\n\nLet me know if you want changes.")
}

// =============================================================================
// FENCE SELECTION
// =============================================================================

#[test]
fn selects_tsx_jsx_and_react_tags_case_insensitively() {
    for (tag, language) in [
        ("tsx", ArtifactLanguage::Tsx),
        ("TSX", ArtifactLanguage::Tsx),
        ("jsx", ArtifactLanguage::Jsx),
        ("Jsx title=\"demo\"", ArtifactLanguage::Jsx),
        ("React", ArtifactLanguage::Tsx),
    ] {
        let candidate = parse_react_artifact(&message(tag, "export default function App() { return null; }"))
            .unwrap_or_else(|| panic!("tag {tag} should be accepted"));
        assert_eq!(candidate.language, language, "tag {tag}");
    }
}

#[test]
fn skips_python_and_untagged_blocks() {
    assert!(parse_react_artifact(&message("python", "def app():\n    pass")).is_none());
    assert!(parse_react_artifact(&message("", "function App() {}")).is_none());
}

#[test]
fn picks_first_supported_block_after_unsupported_ones() {
    let text = "```python\nprint('hi')\n```\nthen\n```jsx\nfunction First() {}\n```\n```tsx\nfunction Second() {}\n```";
    let candidate = parse_react_artifact(text).unwrap();
    assert_eq!(candidate.code, "function First() {}");
    assert_eq!(candidate.language, ArtifactLanguage::Jsx);
}

#[test]
fn returns_none_without_content_or_fence() {
    assert!(parse_react_artifact("").is_none());
    assert!(parse_react_artifact("   \n\t").is_none());
    assert!(parse_react_artifact("no code here, just prose").is_none());
    assert!(parse_react_artifact("```tsx\nfunction Unclosed() {}").is_none());
}

#[test]
fn empty_block_is_not_an_artifact() {
    assert!(parse_react_artifact(&message("tsx", "   \n  ")).is_none());
}

#[test]
fn code_is_trimmed() {
    let candidate = parse_react_artifact("```tsx\n\n   const x = 1;\n\n```").unwrap();
    assert_eq!(candidate.code, "const x = 1;");
}

#[test]
fn parsing_is_idempotent() {
    let text = message("tsx", "export default function Counter() { return <div />; }");
    let first = parse_react_artifact(&text).unwrap();
    let second = parse_react_artifact(&text).unwrap();
    assert_eq!(first, second);

    let a = build_artifact("msg-1", first);
    let b = build_artifact("msg-1", second.clone());
    assert_eq!(a.id, b.id);
    assert_eq!(a.code, b.code);
    assert_eq!(a.title, b.title);
    assert_eq!(a.language, b.language);

    let c = build_artifact("msg-2", second);
    assert_ne!(a.id, c.id);
}

// =============================================================================
// TITLE INFERENCE
// =============================================================================

#[test]
fn title_prefers_export_default_function() {
    let code = "function Bar() { return null; }\nexport default function Foo() { return <Bar />; }";
    assert_eq!(infer_title(code), "Foo");
}

#[test]
fn title_accepts_async_default_export() {
    assert_eq!(infer_title("export default async function Loader() {}"), "Loader");
}

#[test]
fn title_falls_back_to_named_function() {
    assert_eq!(infer_title("function Bar(){}"), "Bar");
    assert_eq!(infer_title("export default function () {}\nfunction Helper() {}"), "Helper");
}

#[test]
fn title_falls_back_to_generic() {
    assert_eq!(infer_title("const App = () => <div />;\nexport default App;"), FALLBACK_TITLE);
}

#[test]
fn candidate_carries_inferred_title() {
    let candidate = parse_react_artifact(&message("jsx", "export default function TodoList() {}")).unwrap();
    assert_eq!(candidate.title.as_deref(), Some("TodoList"));
}

// =============================================================================
// BUILD
// =============================================================================

#[test]
fn build_artifact_derives_identity_from_message() {
    let candidate =
        ReactArtifactCandidate { code: "function A() {}".into(), language: ArtifactLanguage::Tsx, title: None };
    let artifact = build_artifact("abc", candidate);
    assert_eq!(artifact.id, artifact_id_for("abc"));
    assert_eq!(artifact.source_message_id, "abc");
    assert_eq!(artifact.title, FALLBACK_TITLE);
    assert!(!artifact.updated_at.is_empty());
}

#[test]
fn artifact_serializes_camel_case() {
    let candidate =
        ReactArtifactCandidate { code: "function A() {}".into(), language: ArtifactLanguage::Jsx, title: None };
    let json = serde_json::to_value(build_artifact("m1", candidate)).unwrap();
    assert_eq!(json["sourceMessageId"], "m1");
    assert_eq!(json["language"], "jsx");
    assert!(json.get("updatedAt").is_some());
}
