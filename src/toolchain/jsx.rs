//! JSX lowering to the automatic runtime.
//!
//! `<div className="x">{n}</div>` becomes
//! `__jsx("div", { className: "x", children: n })`; elements with several
//! children use `__jsxs`, fragments pass `__Fragment`, and a `key`
//! attribute moves to the third argument. When anything was lowered, one
//! import of the runtime helpers is prepended on the first line.
//!
//! Line numbers are kept stable: each generated call carries as many line
//! breaks as the markup it replaced, placed before its closing paren.

use super::js_string;
use super::lexer::{Scanner, SyntaxError, TokenKind, is_ident_part, is_ident_start};

/// Lower all JSX in `src`. Returns the source unchanged when it has none.
///
/// # Errors
///
/// Malformed markup or an unterminated literal inside an expression.
pub fn transform_jsx(src: &str, import_source: &str) -> Result<String, SyntaxError> {
    let mut lowering = Lowering { src, bytes: src.as_bytes(), used: false };
    let (code, _) = lowering.script(0, false)?;
    if !lowering.used {
        return Ok(code);
    }
    Ok(format!(
        "import {{ jsx as __jsx, jsxs as __jsxs, Fragment as __Fragment }} from {}; {code}",
        js_string(&format!("{import_source}/jsx-runtime"))
    ))
}

enum Attr {
    Named(String, String),
    Spread(String),
}

struct Lowering<'a> {
    src: &'a str,
    bytes: &'a [u8],
    used: bool,
}

impl Lowering<'_> {
    /// Copy script from `start`, lowering any element met in expression
    /// position. With `in_braces`, stops at the `}` closing the enclosing
    /// container and returns its offset.
    fn script(&mut self, start: usize, in_braces: bool) -> Result<(String, usize), SyntaxError> {
        let src = self.src;
        let mut out = String::new();
        let mut copied = start;
        let mut depth = 0usize;
        let mut scanner = Scanner::at(src, start, true);

        loop {
            let expecting = scanner.expression_expected();
            let Some(token) = scanner.next_token()? else {
                if in_braces {
                    return Err(SyntaxError::new("Expected \"}\" but found end of file", src.len()));
                }
                out.push_str(&src[copied..]);
                return Ok((out, src.len()));
            };
            if token.kind != TokenKind::Punct {
                continue;
            }
            match token.text(src) {
                "{" => depth += 1,
                "}" if depth == 0 && in_braces => {
                    out.push_str(&src[copied..token.start]);
                    return Ok((out, token.start));
                }
                "}" => depth = depth.saturating_sub(1),
                "<" if expecting && self.starts_element(token.start) => {
                    out.push_str(&src[copied..token.start]);
                    let (call, end) = self.element(token.start)?;
                    out.push_str(&call);
                    copied = end;
                    scanner.seek(end, false);
                }
                _ => {}
            }
        }
    }

    /// `<` followed by a tag name or `>`, excluding generic arrow heads
    /// like `<T,>` and `<T extends U>`.
    fn starts_element(&self, lt: usize) -> bool {
        let next = lt + 1;
        match self.bytes.get(next) {
            Some(b'>') => true,
            Some(&b) if is_ident_start(b) => {
                let end = self.name_end(next);
                let after = self.skip_space(end);
                let rest = &self.src[after..];
                !(rest.starts_with(',') || (rest.starts_with("extends") && !rest[7..].starts_with(['=', '>', '/'])))
            }
            _ => false,
        }
    }

    fn element(&mut self, lt: usize) -> Result<(String, usize), SyntaxError> {
        self.used = true;
        let mut pos = self.skip_space(lt + 1);

        if self.bytes.get(pos) == Some(&b'>') {
            let (children, end) = self.children(pos + 1, None)?;
            return Ok((self.finish(lt, end, "__Fragment".to_owned(), Vec::new(), children), end));
        }

        let name_end = self.tag_name_end(pos);
        let name = self.src[pos..name_end].to_owned();
        pos = name_end;

        let mut attrs = Vec::new();
        loop {
            pos = self.skip_space(pos);
            match self.bytes.get(pos) {
                None => return Err(SyntaxError::new("Expected \">\" but found end of file", pos)),
                Some(b'/') => {
                    let close = self.skip_space(pos + 1);
                    if self.bytes.get(close) != Some(&b'>') {
                        return Err(self.unexpected(close, ">"));
                    }
                    let end = close + 1;
                    return Ok((self.finish(lt, end, tag_expression(&name), attrs, Vec::new()), end));
                }
                Some(b'>') => {
                    let (children, end) = self.children(pos + 1, Some(&name))?;
                    return Ok((self.finish(lt, end, tag_expression(&name), attrs, children), end));
                }
                Some(b'{') => {
                    let inner = self.skip_space(pos + 1);
                    if !self.src[inner..].starts_with("...") {
                        return Err(self.unexpected(inner, "..."));
                    }
                    let (expr, close) = self.script(inner + 3, true)?;
                    attrs.push(Attr::Spread(expr.trim().to_owned()));
                    pos = close + 1;
                }
                Some(&b) if is_ident_start(b) => {
                    let attr_end = self.name_end(pos);
                    let attr_name = self.src[pos..attr_end].to_owned();
                    pos = self.skip_space(attr_end);
                    if self.bytes.get(pos) != Some(&b'=') {
                        attrs.push(Attr::Named(attr_name, "true".to_owned()));
                        continue;
                    }
                    pos = self.skip_space(pos + 1);
                    let (value, end) = self.attribute_value(pos)?;
                    attrs.push(Attr::Named(attr_name, value));
                    pos = end;
                }
                Some(_) => return Err(self.unexpected(pos, ">")),
            }
        }
    }

    fn attribute_value(&mut self, pos: usize) -> Result<(String, usize), SyntaxError> {
        match self.bytes.get(pos) {
            Some(&quote @ (b'"' | b'\'')) => {
                let Some(len) = self.src[pos + 1..].find(char::from(quote)) else {
                    return Err(SyntaxError::new("Unterminated string literal", pos));
                };
                let raw = &self.src[pos + 1..pos + 1 + len];
                Ok((js_string(&decode_entities(raw)), pos + len + 2))
            }
            Some(b'{') => {
                if self.container_is_empty(pos) {
                    return Err(SyntaxError::new(
                        "JSX attributes must only be assigned a non-empty expression",
                        pos,
                    ));
                }
                let (expr, close) = self.script(pos + 1, true)?;
                Ok((expr.trim().to_owned(), close + 1))
            }
            Some(b'<') => self.element(pos),
            _ => Err(self.unexpected(pos, "{")),
        }
    }

    /// Children up to and including the closing tag. `name` is `None` for
    /// fragments.
    fn children(&mut self, mut pos: usize, name: Option<&str>) -> Result<(Vec<String>, usize), SyntaxError> {
        let mut children = Vec::new();
        loop {
            match self.bytes.get(pos) {
                None => {
                    let what = name.map_or_else(|| "fragment".to_owned(), |n| format!("\"{n}\" tag"));
                    return Err(SyntaxError::new(format!("Unexpected end of file before a closing {what}"), pos));
                }
                Some(b'<') => {
                    let after = self.skip_space(pos + 1);
                    if self.bytes.get(after) == Some(&b'/') {
                        let close_start = self.skip_space(after + 1);
                        let close_end = self.tag_name_end(close_start);
                        let found = &self.src[close_start..close_end];
                        let expected = name.unwrap_or("");
                        if found != expected {
                            return Err(SyntaxError::new(
                                format!("Expected closing tag \"</{expected}>\" but found \"</{found}>\""),
                                pos,
                            ));
                        }
                        let gt = self.skip_space(close_end);
                        if self.bytes.get(gt) != Some(&b'>') {
                            return Err(self.unexpected(gt, ">"));
                        }
                        return Ok((children, gt + 1));
                    }
                    let (call, end) = self.element(pos)?;
                    children.push(call);
                    pos = end;
                }
                Some(b'{') => {
                    let empty = self.container_is_empty(pos);
                    let (expr, close) = self.script(pos + 1, true)?;
                    if !empty {
                        children.push(expr.trim().to_owned());
                    }
                    pos = close + 1;
                }
                Some(&b @ (b'>' | b'}')) => {
                    return Err(SyntaxError::new(
                        format!("The character \"{}\" is not valid inside a JSX element", char::from(b)),
                        pos,
                    ));
                }
                Some(_) => {
                    let end = self.src[pos..].find(['<', '{', '>', '}']).map_or(self.src.len(), |n| pos + n);
                    if let Some(text) = clean_text(&decode_entities(&self.src[pos..end])) {
                        children.push(js_string(&text));
                    }
                    pos = end;
                }
            }
        }
    }

    /// `{}` or `{/* comment */}`.
    fn container_is_empty(&self, open: usize) -> bool {
        let mut scanner = Scanner::at(self.src, open + 1, true);
        matches!(scanner.next_token(), Ok(Some(token)) if token.is_punct(self.src, "}"))
    }

    fn finish(&self, start: usize, end: usize, tag: String, attrs: Vec<Attr>, children: Vec<String>) -> String {
        let mut key = None;
        let mut props = Vec::new();
        for attr in attrs {
            match attr {
                Attr::Named(name, value) if name == "key" => key = Some(value),
                Attr::Named(name, value) => props.push(format!("{}: {value}", property_key(&name))),
                Attr::Spread(expr) => props.push(format!("...{expr}")),
            }
        }
        let callee = if children.len() > 1 { "__jsxs" } else { "__jsx" };
        match children.len() {
            0 => {}
            1 => props.push(format!("children: {}", children[0])),
            _ => props.push(format!("children: [{}]", children.join(", "))),
        }

        let props = if props.is_empty() { "{}".to_owned() } else { format!("{{ {} }}", props.join(", ")) };
        let mut call = match key {
            Some(key) => format!("{callee}({tag}, {props}, {key}"),
            None => format!("{callee}({tag}, {props}"),
        };
        let source_lines = self.src[start..end].matches('\n').count();
        let emitted_lines = call.matches('\n').count();
        for _ in emitted_lines..source_lines {
            call.push('\n');
        }
        call.push(')');
        call
    }

    fn unexpected(&self, pos: usize, expected: &str) -> SyntaxError {
        let found = self.src[pos..].chars().next().map_or_else(|| "end of file".to_owned(), |c| format!("\"{c}\""));
        SyntaxError::new(format!("Expected \"{expected}\" but found {found}"), pos)
    }

    /// Whitespace and comments inside a tag.
    fn skip_space(&self, mut pos: usize) -> usize {
        loop {
            while self.bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
                pos += 1;
            }
            let rest = &self.src[pos..];
            if rest.starts_with("//") {
                pos = rest.find('\n').map_or(self.src.len(), |n| pos + n);
            } else if rest.starts_with("/*") {
                pos = rest.find("*/").map_or(self.src.len(), |n| pos + n + 2);
            } else {
                return pos;
            }
        }
    }

    /// Attribute or tag segment: identifier characters plus `-`.
    fn name_end(&self, mut pos: usize) -> usize {
        while self.bytes.get(pos).is_some_and(|b| is_ident_part(*b) || *b == b'-') {
            pos += 1;
        }
        if self.bytes.get(pos) == Some(&b':') && self.bytes.get(pos + 1).is_some_and(|b| is_ident_start(*b)) {
            return self.name_end(pos + 1);
        }
        pos
    }

    /// Tag name, including member access like `Foo.Bar`.
    fn tag_name_end(&self, pos: usize) -> usize {
        let mut end = self.name_end(pos);
        while self.bytes.get(end) == Some(&b'.') && self.bytes.get(end + 1).is_some_and(|b| is_ident_start(*b)) {
            end = self.name_end(end + 1);
        }
        end
    }
}

/// Intrinsic elements become strings; components stay identifiers.
fn tag_expression(name: &str) -> String {
    if name.contains('.') {
        return name.to_owned();
    }
    let intrinsic = name.starts_with(|c: char| c.is_ascii_lowercase()) || name.contains(['-', ':']);
    if intrinsic { js_string(name) } else { name.to_owned() }
}

fn property_key(name: &str) -> String {
    let plain = name.bytes().next().is_some_and(is_ident_start) && name.bytes().all(is_ident_part);
    if plain { name.to_owned() } else { js_string(name) }
}

/// Collapse JSX text whitespace: lines are trimmed where they meet a line
/// break, blank lines vanish, and the remaining lines join with one space.
fn clean_text(raw: &str) -> Option<String> {
    let lines: Vec<&str> = raw.split("\r\n").flat_map(|l| l.split(['\n', '\r'])).collect();
    let last_non_empty = lines.iter().rposition(|l| l.contains(|c: char| c != ' ' && c != '\t'));
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let mut trimmed = line.replace('\t', " ");
        if i != 0 {
            trimmed = trimmed.trim_start_matches(' ').to_owned();
        }
        if i != lines.len() - 1 {
            trimmed = trimmed.trim_end_matches(' ').to_owned();
        }
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(&trimmed);
        if Some(i) != last_non_empty {
            out.push(' ');
        }
    }
    (!out.is_empty()).then_some(out)
}

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
    ("copy", '\u{a9}'),
    ("reg", '\u{ae}'),
    ("trade", '\u{2122}'),
    ("hellip", '\u{2026}'),
    ("mdash", '\u{2014}'),
    ("ndash", '\u{2013}'),
    ("middot", '\u{b7}'),
    ("bull", '\u{2022}'),
    ("times", '\u{d7}'),
    ("divide", '\u{f7}'),
    ("deg", '\u{b0}'),
    ("plusmn", '\u{b1}'),
    ("laquo", '\u{ab}'),
    ("raquo", '\u{bb}'),
    ("larr", '\u{2190}'),
    ("uarr", '\u{2191}'),
    ("rarr", '\u{2192}'),
    ("darr", '\u{2193}'),
    ("euro", '\u{20ac}'),
    ("pound", '\u{a3}'),
    ("yen", '\u{a5}'),
    ("cent", '\u{a2}'),
];

/// Decode HTML character references. Unknown references are kept verbatim.
fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest[1..].find(';').filter(|semi| *semi <= 10).and_then(|semi| {
            let name = &rest[1..=semi];
            decode_reference(name).map(|ch| (ch, semi + 2))
        });
        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    NAMED_ENTITIES.iter().find(|(entity, _)| *entity == name).map(|(_, ch)| *ch)
}

#[cfg(test)]
#[path = "jsx_test.rs"]
mod tests;
