use super::*;

const PRELUDE: &str =
    "import { jsx as __jsx, jsxs as __jsxs, Fragment as __Fragment } from \"react/jsx-runtime\"; ";

fn lower(src: &str) -> String {
    let out = transform_jsx(src, "react").unwrap();
    out.strip_prefix(PRELUDE).unwrap_or_else(|| panic!("missing runtime import in {out}")).to_owned()
}

#[test]
fn source_without_jsx_is_untouched() {
    let src = "const a = b < c && d > e;\nfunction f<T>(x: T) { return x; }";
    assert_eq!(transform_jsx(src, "react").unwrap(), src);
}

#[test]
fn intrinsic_element_with_attributes_and_text() {
    assert_eq!(
        lower(r#"const a = <div className="x" id='y'>hi</div>;"#),
        r#"const a = __jsx("div", { className: "x", id: "y", children: "hi" });"#
    );
}

#[test]
fn components_and_member_tags_stay_identifiers() {
    assert_eq!(lower("x = <Button />"), "x = __jsx(Button, {})");
    assert_eq!(lower("x = <UI.Card />"), "x = __jsx(UI.Card, {})");
    assert_eq!(lower("x = <my-widget />"), r#"x = __jsx("my-widget", {})"#);
}

#[test]
fn expression_children_and_multiple_children_use_jsxs() {
    assert_eq!(
        lower("x = <p>Count: {count}</p>"),
        r#"x = __jsxs("p", { children: ["Count: ", count] })"#
    );
}

#[test]
fn nested_jsx_inside_expressions() {
    assert_eq!(
        lower("x = <ul>{items.map(i => <li key={i.id}>{i.name}</li>)}</ul>"),
        r#"x = __jsx("ul", { children: items.map(i => __jsx("li", { children: i.name }, i.id)) })"#
    );
}

#[test]
fn boolean_spread_and_object_attributes() {
    assert_eq!(
        lower("x = <input disabled {...rest} style={{ color: \"red\" }} data-id=\"7\" />"),
        r#"x = __jsx("input", { disabled: true, ...rest, style: { color: "red" }, "data-id": "7" })"#
    );
}

#[test]
fn fragments_lower_to_fragment_component() {
    assert_eq!(lower("x = <><A /><B /></>"), "x = __jsxs(__Fragment, { children: [__jsx(A, {}), __jsx(B, {})] })");
}

#[test]
fn whitespace_lines_collapse_and_line_count_is_kept() {
    let src = "return (\n  <div>\n    <h1>Title</h1>\n    <p>\n      two\n      lines\n    </p>\n  </div>\n);";
    let out = lower(src);
    assert_eq!(out.matches('\n').count(), src.matches('\n').count());
    assert!(out.contains(r#"__jsx("h1", { children: "Title" })"#));
    assert!(out.contains(r#"__jsx("p", { children: "two lines" }"#));
}

#[test]
fn comments_in_containers_are_dropped() {
    assert_eq!(lower("x = <div>{/* note */}</div>"), r#"x = __jsx("div", {})"#);
}

#[test]
fn entities_are_decoded() {
    assert_eq!(lower("x = <p>a &amp; b &#169; &nbsp;</p>"), "x = __jsx(\"p\", { children: \"a & b \u{a9} \u{a0}\" })");
}

#[test]
fn generic_arrow_heads_are_not_elements() {
    let src = "const id = <T,>(x: T) => x;";
    assert_eq!(transform_jsx(src, "react").unwrap(), src);
}

#[test]
fn mismatched_closing_tag_is_an_error() {
    let err = transform_jsx("x = <div></span>", "react").unwrap_err();
    assert_eq!(err.message, "Expected closing tag \"</div>\" but found \"</span>\"");
    assert_eq!(err.offset, 9);
}

#[test]
fn unclosed_element_is_an_error() {
    let err = transform_jsx("x = <div>text", "react").unwrap_err();
    assert_eq!(err.message, "Unexpected end of file before a closing \"div\" tag");
}

#[test]
fn empty_attribute_expression_is_an_error() {
    let err = transform_jsx("x = <a href={} />", "react").unwrap_err();
    assert_eq!(err.message, "JSX attributes must only be assigned a non-empty expression");
}

#[test]
fn import_source_is_configurable() {
    let out = transform_jsx("x = <a />", "preact").unwrap();
    assert!(out.starts_with("import { jsx as __jsx, jsxs as __jsxs, Fragment as __Fragment } from \"preact/jsx-runtime\";"));
}
