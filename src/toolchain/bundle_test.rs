use super::*;

#[test]
fn modules_are_listed_in_order_and_entry_runs() {
    let out = render_bundle(
        &[
            LinkedModule { name: "entry:App.tsx".into(), body: "var __dep0 = __require(1); ".into() },
            LinkedModule { name: "cdn:https://esm.sh/react@18.2.0".into(), body: "".into() },
        ],
        "es2018",
    );
    assert!(out.starts_with("// target: es2018\n(function () {\n  \"use strict\";\n"));
    let entry = out.find("// entry:App.tsx").unwrap();
    let react = out.find("// cdn:https://esm.sh/react@18.2.0").unwrap();
    assert!(entry < react);
    assert!(out.contains("function (__exports, __require, __import) { var __dep0 = __require(1); \n  },"));
    assert!(out.trim_end().ends_with("__require(0);\n})();"));
}

#[test]
fn module_body_keeps_its_lines() {
    let body = "a();\nb();\nc();";
    let out = render_bundle(&[LinkedModule { name: "entry".into(), body: body.into() }], "es2018");
    assert!(out.contains("{ a();\nb();\nc();\n  },"));
}

#[test]
fn names_cannot_break_out_of_the_comment() {
    let out = render_bundle(&[LinkedModule { name: "a\nb".into(), body: String::new() }], "es2018");
    assert!(out.contains("  // a b\n"));
}
