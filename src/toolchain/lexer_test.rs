use super::*;

fn texts(src: &str) -> Vec<&str> {
    tokenize(src).unwrap().iter().map(|t| t.text(src)).collect()
}

#[test]
fn splits_identifiers_punctuators_and_literals() {
    assert_eq!(texts("const x = a?.b ?? 10n;"), ["const", "x", "=", "a", "?.", "b", "??", "10n", ";"]);
    assert_eq!(texts("a >>>= 2"), ["a", ">>>=", "2"]);
    assert_eq!(texts("f(...args)"), ["f", "(", "...", "args", ")"]);
}

#[test]
fn skips_comments_and_flags_newlines() {
    let src = "a // trailing\n/* block\n */ b /* inline */ c";
    let tokens = tokenize(src).unwrap();
    let words: Vec<_> = tokens.iter().map(|t| (t.text(src), t.newline_before)).collect();
    assert_eq!(words, [("a", false), ("b", true), ("c", false)]);
}

#[test]
fn distinguishes_regex_from_division() {
    let src = "x = a / b / c; y = /ab+c/gi.test(s); return /x/";
    let tokens = tokenize(src).unwrap();
    let regexes: Vec<_> = tokens.iter().filter(|t| t.kind == TokenKind::Regex).map(|t| t.text(src)).collect();
    assert_eq!(regexes, ["/ab+c/gi", "/x/"]);
}

#[test]
fn regex_with_slash_in_class() {
    let src = "s.split(/[/\\\\]/)";
    let tokens = tokenize(src).unwrap();
    assert_eq!(tokens[4].kind, TokenKind::Regex);
    assert_eq!(tokens[4].text(src), "/[/\\\\]/");
}

#[test]
fn template_literals_include_nested_substitutions() {
    let src = "`a ${ b ? `c ${d}` : {e: 1}.e } f` + g";
    assert_eq!(texts(src), ["`a ${ b ? `c ${d}` : {e: 1}.e } f`", "+", "g"]);
}

#[test]
fn strings_with_escapes() {
    let src = r#"'it\'s' + "say \"hi\"""#;
    assert_eq!(texts(src), [r"'it\'s'", "+", r#""say \"hi\"""#]);
}

#[test]
fn private_names_and_numbers() {
    assert_eq!(texts("this.#count = 1_000 + .5 + 0xFF + 1e-3"), [
        "this", ".", "#count", "=", "1_000", "+", ".5", "+", "0xFF", "+", "1e-3"
    ]);
}

#[test]
fn unterminated_literals_are_errors() {
    assert_eq!(tokenize("'abc").unwrap_err().message, "Unterminated string literal");
    assert_eq!(tokenize("`abc ${x").unwrap_err().message, "Unterminated template literal");
    assert_eq!(tokenize("x = /abc\n").unwrap_err().message, "Unterminated regular expression");
    let err = tokenize("a /* never closed").unwrap_err();
    assert_eq!(err.offset, 2);
}

#[test]
fn hashbang_is_skipped() {
    assert_eq!(texts("#!/usr/bin/env node\nrun()"), ["run", "(", ")"]);
}

#[test]
fn brackets_are_paired() {
    let src = "f(a[0], { b })";
    let tokens = tokenize(src).unwrap();
    let partners = match_brackets(src, &tokens).unwrap();
    assert_eq!(partners[1], Some(tokens.len() - 1));
    assert_eq!(partners[3], Some(5));
}

#[test]
fn unbalanced_brackets_are_located() {
    let src = "function f() { return (1; }";
    let tokens = tokenize(src).unwrap();
    let err = match_brackets(src, &tokens).unwrap_err();
    assert_eq!(err.message, "Expected \")\" but found \"}\"");
    assert_eq!(err.offset, src.len() - 1);

    let src = "if (x) {";
    let err = match_brackets(src, &tokenize(src).unwrap()).unwrap_err();
    assert_eq!(err.message, "Expected \"}\" but found end of file");
}
