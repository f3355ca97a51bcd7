//! TypeScript erasure.
//!
//! Works on the token stream and records byte-range edits: type-only
//! declarations, annotations, generic arguments, assertions and TS-only
//! modifiers are removed; enums are lowered to the usual `var` + IIFE form;
//! constructor parameter properties become assignments. Removed ranges keep
//! their line breaks so later diagnostics still point at the source line.
//!
//! This is erasure, not type checking. Namespaces, decorators and
//! `import x = require()` are left untouched.

use std::collections::{HashMap, HashSet};

use super::js_string;
use super::lexer::{self, RESERVED_WORDS, SyntaxError, Token, TokenKind};

const TS_MEMBER_MODIFIERS: &[&str] = &["public", "private", "protected", "readonly", "abstract", "override", "declare"];
const MEMBER_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "readonly", "abstract", "override", "declare", "static", "async", "accessor", "get",
    "set",
];
const PARAM_MODIFIERS: &[&str] = &["public", "private", "protected", "readonly", "override"];
const DECLARABLE: &[&str] = &[
    "const", "let", "var", "function", "class", "module", "global", "namespace", "enum", "type", "interface", "abstract",
];
/// Punctuators that may appear inside generic call arguments.
const TYPE_ARG_PUNCT: &[&str] = &[",", ".", "|", "&", "?", ":", "=>", "...", "-"];

/// Erase TypeScript syntax from `src`.
///
/// # Errors
///
/// Lexer failures, unbalanced brackets, and enum members that follow a
/// string member without an initializer.
pub fn strip_types(src: &str) -> Result<String, SyntaxError> {
    let toks = split_angle_closers(src, lexer::tokenize(src)?);
    let partners = lexer::match_brackets(src, &toks)?;
    let mut eraser = Eraser {
        src,
        toks,
        partners,
        edits: Vec::new(),
        params: HashMap::new(),
        class_bodies: HashSet::new(),
        declaring: None,
    };
    let mut stack = Vec::new();
    let mut i = 0;
    while i < eraser.toks.len() {
        i = eraser.step(i, &mut stack)?;
    }
    Ok(eraser.apply())
}

/// `>>`, `>=` and friends become one token per character so generic
/// closers can be matched one at a time.
fn split_angle_closers(src: &str, toks: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(toks.len());
    for tok in toks {
        let text = tok.text(src);
        if tok.kind == TokenKind::Punct && text.len() > 1 && text.starts_with('>') {
            for (n, _) in text.char_indices() {
                out.push(Token {
                    kind: TokenKind::Punct,
                    start: tok.start + n,
                    end: tok.start + n + 1,
                    newline_before: n == 0 && tok.newline_before,
                });
            }
        } else {
            out.push(tok);
        }
    }
    out
}

struct Edit {
    start: usize,
    end: usize,
    text: String,
}

enum Frame {
    Params { open: usize, default_value: bool, properties: Vec<String> },
    Class { member_start: bool },
    Other,
}

/// Where a skipped type ends: the next token index and the byte offset.
#[derive(Clone, Copy)]
struct TypeEnd {
    next: usize,
    offset: usize,
}

struct Eraser<'a> {
    src: &'a str,
    toks: Vec<Token>,
    partners: Vec<Option<usize>>,
    edits: Vec<Edit>,
    /// `(` tokens that open a parameter list, with the start of the
    /// declaration to drop if no body follows.
    params: HashMap<usize, Option<usize>>,
    class_bodies: HashSet<usize>,
    /// Stack depth of an open `let`/`const`/`var` declarator list.
    declaring: Option<usize>,
}

impl Eraser<'_> {
    // =========================================================================
    // TOKEN HELPERS
    // =========================================================================

    fn text(&self, i: usize) -> &str {
        self.toks.get(i).map_or("", |t| t.text(self.src))
    }

    fn is(&self, i: usize, text: &str) -> bool {
        self.toks.get(i).is_some_and(|t| matches!(t.kind, TokenKind::Punct | TokenKind::Ident) && t.text(self.src) == text)
    }

    fn kind(&self, i: usize) -> Option<TokenKind> {
        self.toks.get(i).map(|t| t.kind)
    }

    fn start(&self, i: usize) -> usize {
        self.toks.get(i).map_or(self.src.len(), |t| t.start)
    }

    fn end(&self, i: usize) -> usize {
        self.toks.get(i).map_or(self.src.len(), |t| t.end)
    }

    fn partner(&self, i: usize) -> usize {
        self.partners.get(i).copied().flatten().unwrap_or(i)
    }

    fn prev_is(&self, i: usize, text: &str) -> bool {
        i > 0 && self.is(i - 1, text)
    }

    fn is_plain_ident(&self, i: usize) -> bool {
        self.kind(i) == Some(TokenKind::Ident) && !RESERVED_WORDS.contains(&self.text(i))
    }

    fn is_expression_end(&self, i: usize) -> bool {
        match self.kind(i) {
            Some(TokenKind::Ident) => self.is_plain_ident(i),
            Some(TokenKind::Punct) => matches!(self.text(i), ")" | "]" | "}"),
            Some(_) => true,
            None => false,
        }
    }

    fn at_statement_start(&self, i: usize) -> bool {
        i == 0 || self.toks[i].newline_before || matches!(self.text(i - 1), ";" | "{" | "}")
    }

    /// Statement start, possibly behind `export` or `export default`.
    fn at_declaration(&self, i: usize) -> bool {
        self.at_statement_start(i) || self.prev_is(i, "export") || (self.prev_is(i, "default") && i > 1 && self.is(i - 2, "export"))
    }

    /// Offset where the declaration at `i` begins, including any
    /// `export`, `default`, `async` or `declare` prefix.
    fn declaration_start(&self, i: usize) -> usize {
        let mut first = i;
        while first > 0 && matches!(self.text(first - 1), "export" | "default" | "async" | "declare") {
            first -= 1;
        }
        self.start(first)
    }

    fn remove(&mut self, start: usize, end: usize) {
        if start < end {
            self.edits.push(Edit { start, end, text: String::new() });
        }
    }

    fn replace(&mut self, start: usize, end: usize, text: String) {
        self.edits.push(Edit { start, end, text });
    }

    /// Remove tokens `first..=last` plus a trailing `;`. Returns the next index.
    fn remove_statement(&mut self, first_offset: usize, last: usize) -> usize {
        let next = if self.is(last + 1, ";") { last + 2 } else { last + 1 };
        self.remove(first_offset, self.end(next - 1));
        next
    }

    // =========================================================================
    // MAIN LOOP
    // =========================================================================

    fn step(&mut self, i: usize, stack: &mut Vec<Frame>) -> Result<usize, SyntaxError> {
        let tok = self.toks[i];

        if self.declaring == Some(stack.len()) && tok.newline_before && i > 0 && self.is_expression_end(i - 1) && !self.is(i, ",") {
            self.declaring = None;
        }

        if let Some(Frame::Class { member_start }) = stack.last_mut() {
            let at_member = *member_start || tok.newline_before;
            *member_start = false;
            if at_member && !self.is(i, "}") && !self.is(i, ";") {
                if let Some(next) = self.class_member(i) {
                    *member_start = next > i && self.is(next - 1, ";");
                    return Ok(next);
                }
            }
        }

        match tok.kind {
            TokenKind::Punct => Ok(self.punct(i, stack)),
            TokenKind::Ident => self.word(i, stack),
            _ => Ok(i + 1),
        }
    }

    fn punct(&mut self, i: usize, stack: &mut Vec<Frame>) -> usize {
        let text = self.text(i).to_owned();
        let in_params = matches!(stack.last(), Some(Frame::Params { default_value: false, .. }));

        match text.as_str() {
            "(" => {
                let frame = if self.params.contains_key(&i) || self.is_arrow_params(i) || self.is_method_params(i) {
                    self.params.entry(i).or_insert(None);
                    Frame::Params { open: i, default_value: false, properties: Vec::new() }
                } else {
                    Frame::Other
                };
                stack.push(frame);
                i + 1
            }
            "[" => {
                stack.push(Frame::Other);
                i + 1
            }
            "{" => {
                let frame = if self.class_bodies.contains(&i) { Frame::Class { member_start: true } } else { Frame::Other };
                stack.push(frame);
                i + 1
            }
            ")" | "]" | "}" => {
                let frame = stack.pop();
                if self.declaring.is_some_and(|d| d > stack.len()) {
                    self.declaring = None;
                }
                if text == "}" {
                    if let Some(Frame::Class { member_start }) = stack.last_mut() {
                        *member_start = true;
                    }
                }
                let Some(Frame::Params { open, properties, .. }) = frame else {
                    return i + 1;
                };
                let next = self.after_params(open, i, &properties);
                // a dropped bodiless signature swallows its `;`
                if next > i + 1 && self.is(next - 1, ";") {
                    if let Some(Frame::Class { member_start }) = stack.last_mut() {
                        *member_start = true;
                    }
                }
                next
            }
            ";" => {
                if let Some(Frame::Class { member_start }) = stack.last_mut() {
                    *member_start = true;
                }
                if self.declaring == Some(stack.len()) {
                    self.declaring = None;
                }
                i + 1
            }
            ":" if in_params => {
                let ty = self.skip_type(i + 1);
                self.remove(self.start(i), ty.offset);
                ty.next
            }
            "?" if in_params && matches!(self.text(i + 1), ":" | "," | ")" | "=") => {
                self.remove(self.start(i), self.end(i));
                i + 1
            }
            "=" | "," => {
                if let Some(Frame::Params { default_value, .. }) = stack.last_mut() {
                    *default_value = text == "=";
                }
                if text == "," && self.declaring == Some(stack.len()) {
                    return self.declarator(i + 1);
                }
                i + 1
            }
            "!" => {
                if self.is_non_null_assertion(i) {
                    self.remove(self.start(i), self.end(i));
                }
                i + 1
            }
            "<" => self.angle(i),
            _ => i + 1,
        }
    }

    fn word(&mut self, i: usize, stack: &mut [Frame]) -> Result<usize, SyntaxError> {
        let text = self.text(i).to_owned();
        let next_is_ident = self.kind(i + 1) == Some(TokenKind::Ident);

        if let Some(Frame::Params { default_value: false, properties, .. }) = stack.last_mut() {
            let after_separator = matches!(self.text(i.wrapping_sub(1)), "(" | ",") || PARAM_MODIFIERS.contains(&self.text(i.wrapping_sub(1)));
            if PARAM_MODIFIERS.contains(&text.as_str()) && after_separator && (next_is_ident || self.is(i + 1, "{") || self.is(i + 1, "[")) {
                self.remove(self.start(i), self.start(i + 1));
                if !PARAM_MODIFIERS.contains(&self.text(i + 1)) && self.is_plain_ident(i + 1) {
                    properties.push(self.text(i + 1).to_owned());
                }
                return Ok(i + 1);
            }
        }

        let next = match text.as_str() {
            "import" if self.at_statement_start(i) && !self.is(i + 1, "(") && !self.is(i + 1, ".") => self.import_declaration(i),
            "export" if self.at_statement_start(i) => self.export_declaration(i),
            "interface" if self.at_declaration(i) && next_is_ident && matches!(self.text(i + 2), "{" | "extends" | "<") => {
                self.interface(i)
            }
            "type" if self.at_declaration(i) && next_is_ident && matches!(self.text(i + 2), "=" | "<") => self.type_alias(i),
            "declare" if self.at_declaration(i) && DECLARABLE.contains(&self.text(i + 1)) => self.ambient(i),
            "enum" if (self.at_declaration(i) || self.prev_is(i, "const")) && next_is_ident && self.is(i + 2, "{") => {
                self.enumeration(i)?
            }
            "abstract" if self.is(i + 1, "class") => {
                self.remove(self.start(i), self.start(i + 1));
                i + 1
            }
            "class" if next_is_ident || self.is(i + 1, "{") => self.class_head(i),
            "function" => self.function_head(i),
            "let" | "const" | "var" if !self.is(i + 1, "enum") => {
                self.declaring = Some(stack.len());
                self.declarator(i + 1)
            }
            "as" | "satisfies" if (i > 0 && self.is_expression_end(i - 1)) || self.is_const_assertion(i) => {
                self.assertion(i)
            }
            _ => i + 1,
        };
        Ok(next)
    }

    // =========================================================================
    // DECLARATIONS
    // =========================================================================

    fn import_declaration(&mut self, i: usize) -> usize {
        let type_only = self.is(i + 1, "type")
            && (self.is(i + 2, "{") || self.is(i + 2, "*") || (self.kind(i + 2) == Some(TokenKind::Ident) && !self.is(i + 2, "from")));
        let end = self.module_clause_end(i);
        if type_only {
            return self.remove_statement(self.start(i), end);
        }
        for j in i + 1..end {
            if self.is(j, "{") {
                self.strip_type_specifiers(j);
            }
        }
        end + 1
    }

    fn export_declaration(&mut self, i: usize) -> usize {
        if self.is(i + 1, "type") && (self.is(i + 2, "{") || self.is(i + 2, "*")) {
            let end = self.module_clause_end(i);
            return self.remove_statement(self.start(i), end);
        }
        if self.is(i + 1, "{") {
            self.strip_type_specifiers(i + 1);
            let close = self.partner(i + 1);
            return if self.is(close + 1, "from") { close + 3 } else { close + 1 };
        }
        if self.is(i + 1, "*") {
            return self.module_clause_end(i) + 1;
        }
        i + 1
    }

    /// Index of the last token of an import/export clause: the module
    /// string, or the closing brace of a local export list.
    fn module_clause_end(&self, i: usize) -> usize {
        let mut j = i + 1;
        while j < self.toks.len() {
            if self.kind(j) == Some(TokenKind::String) && (self.prev_is(j, "from") || self.prev_is(j, "import")) {
                return j;
            }
            if self.is(j, ";") {
                return j - 1;
            }
            if self.is(j, "{") {
                let close = self.partner(j);
                if !self.is(close + 1, "from") {
                    return close;
                }
                j = close;
            }
            j += 1;
        }
        self.toks.len().saturating_sub(1)
    }

    /// Drop `type X` entries from an import/export brace list.
    fn strip_type_specifiers(&mut self, open: usize) {
        let close = self.partner(open);
        let mut j = open + 1;
        while j < close {
            if self.is(j, "type") && self.kind(j + 1) == Some(TokenKind::Ident) && !matches!(self.text(j + 1), "as") {
                let mut last = j + 1;
                if self.is(last + 1, "as") {
                    last += 2;
                }
                if self.is(last + 1, ",") {
                    last += 1;
                }
                self.remove(self.start(j), self.end(last));
                j = last + 1;
            } else {
                j += 1;
            }
        }
    }

    fn interface(&mut self, i: usize) -> usize {
        let start = self.declaration_start(i);
        let mut j = i + 2;
        while j < self.toks.len() && !self.is(j, "{") {
            j = if self.is(j, "<") { self.skip_angle(j) } else { j + 1 };
        }
        let close = self.partner(j);
        self.remove(start, self.end(close));
        close + 1
    }

    fn type_alias(&mut self, i: usize) -> usize {
        let start = self.declaration_start(i);
        let mut j = i + 2;
        if self.is(j, "<") {
            j = self.skip_angle(j);
        }
        let ty = self.skip_type(j + 1);
        let last = ty.next.saturating_sub(1);
        self.remove_statement(start, last)
    }

    /// `declare ...` through the end of its statement or block.
    fn ambient(&mut self, i: usize) -> usize {
        let start = self.declaration_start(i);
        let mut j = i + 1;
        while j < self.toks.len() {
            if self.is(j, ";") {
                self.remove(start, self.end(j));
                return j + 1;
            }
            if self.is(j, "{") && !self.is(j - 1, ":") {
                let close = self.partner(j);
                self.remove(start, self.end(close));
                return close + 1;
            }
            if j > i + 2 && self.toks[j].newline_before && self.is_expression_end(j - 1) {
                self.remove(start, self.end(j - 1));
                return j;
            }
            j = if matches!(self.text(j), "(" | "[" | "{") { self.partner(j) + 1 } else { j + 1 };
        }
        self.remove(start, self.src.len());
        j
    }

    /// `enum E { A, B = 5, C = "c" }` to `var E; (function (E) { ... })(E || (E = {}));`.
    fn enumeration(&mut self, i: usize) -> Result<usize, SyntaxError> {
        let start = if self.prev_is(i, "const") { self.start(i - 1) } else { self.start(i) };
        let name = self.text(i + 1).to_owned();
        let open = i + 2;
        let close = self.partner(open);

        let mut members: Vec<String> = Vec::new();
        let mut body = String::new();
        let mut previous: Option<EnumValue> = None;
        let mut j = open + 1;
        while j < close {
            let key = match self.kind(j) {
                Some(TokenKind::String) => self.text(j).to_owned(),
                Some(TokenKind::Ident) => js_string(self.text(j)),
                _ => return Err(SyntaxError::new("Expected identifier in enum body", self.start(j))),
            };
            let member = key.trim_matches(['"', '\'']).to_owned();
            j += 1;

            let value = if self.is(j, "=") {
                let init_start = j + 1;
                let mut k = init_start;
                while k < close && !self.is(k, ",") {
                    k = if matches!(self.text(k), "(" | "[" | "{") { self.partner(k) + 1 } else { k + 1 };
                }
                let value = self.enum_initializer(&name, &members, init_start, k);
                j = k;
                value
            } else {
                match &previous {
                    None => EnumValue::Number(0),
                    Some(EnumValue::Number(n)) => EnumValue::Number(n + 1),
                    Some(EnumValue::Expr(prev_key)) => EnumValue::Expr(format!("{name}[{prev_key}] + 1")),
                    Some(EnumValue::Str(_)) => {
                        return Err(SyntaxError::new("Enum member must have initializer", self.start(j - 1)));
                    }
                }
            };

            match &value {
                EnumValue::Str(literal) => body.push_str(&format!("{name}[{key}] = {literal}; ")),
                EnumValue::Number(n) => body.push_str(&format!("{name}[{name}[{key}] = {n}] = {key}; ")),
                EnumValue::Expr(expr) => body.push_str(&format!("{name}[{name}[{key}] = {expr}] = {key}; ")),
            }
            previous = Some(match value {
                EnumValue::Expr(_) => EnumValue::Expr(key),
                other => other,
            });
            members.push(member);
            if self.is(j, ",") {
                j += 1;
            }
        }

        let code = format!("var {name}; (function ({name}) {{ {body}}})({name} || ({name} = {{}}));");
        self.replace(start, self.end(close), code);
        Ok(close + 1)
    }

    fn enum_initializer(&self, name: &str, members: &[String], from: usize, to: usize) -> EnumValue {
        if to == from + 1 {
            match self.kind(from) {
                Some(TokenKind::String) => return EnumValue::Str(self.text(from).to_owned()),
                Some(TokenKind::Number) => {
                    if let Some(n) = parse_integer(self.text(from)) {
                        return EnumValue::Number(n);
                    }
                }
                _ => {}
            }
        }
        let mut expr = String::new();
        let mut cursor = self.start(from);
        for k in from..to {
            if self.kind(k) == Some(TokenKind::Ident) && !self.prev_is(k, ".") && members.iter().any(|m| m == self.text(k)) {
                expr.push_str(&self.src[cursor..self.start(k)]);
                expr.push_str(&format!("{name}.{}", self.text(k)));
                cursor = self.end(k);
            }
        }
        expr.push_str(&self.src[cursor..self.end(to - 1)]);
        EnumValue::Expr(format!("({})", expr.trim()))
    }

    /// Class header: generic parameters, heritage type arguments and
    /// `implements` go; the body is marked for member handling.
    fn class_head(&mut self, i: usize) -> usize {
        let mut j = i + 1;
        if self.kind(j) == Some(TokenKind::Ident) && !matches!(self.text(j), "extends" | "implements") {
            j += 1;
        }
        while j < self.toks.len() && !self.is(j, "{") {
            if self.is(j, "<") {
                let end = self.skip_angle(j);
                self.remove(self.start(j), self.end(end - 1));
                j = end;
            } else if self.is(j, "implements") {
                let mut body = j + 1;
                while body < self.toks.len() && !self.is(body, "{") {
                    body = if self.is(body, "<") { self.skip_angle(body) } else { body + 1 };
                }
                self.remove(self.start(j), self.start(body));
                j = body;
            } else if matches!(self.text(j), "(" | "[") {
                j = self.partner(j) + 1;
            } else {
                j += 1;
            }
        }
        self.class_bodies.insert(j);
        j
    }

    fn function_head(&mut self, i: usize) -> usize {
        let declaration = self.at_declaration(i) || self.prev_is(i, "async") || self.prev_is(i, "declare");
        let mut j = i + 1;
        if self.is(j, "*") {
            j += 1;
        }
        if self.kind(j) == Some(TokenKind::Ident) {
            j += 1;
        }
        if self.is(j, "<") {
            let end = self.skip_angle(j);
            self.remove(self.start(j), self.end(end - 1));
            j = end;
        }
        if self.is(j, "(") {
            let start = declaration.then(|| self.declaration_start(i));
            self.params.insert(j, start);
        }
        j
    }

    /// One `let`/`const`/`var` binding: drops `!` and the annotation.
    fn declarator(&mut self, i: usize) -> usize {
        let mut j = match self.kind(i) {
            Some(TokenKind::Ident) => i + 1,
            Some(TokenKind::Punct) if matches!(self.text(i), "{" | "[") => self.partner(i) + 1,
            _ => return i,
        };
        if self.is(j, "!") {
            self.remove(self.start(j), self.end(j));
            j += 1;
        }
        if self.is(j, ":") {
            let ty = self.skip_type(j + 1);
            self.remove(self.start(j), ty.offset);
            return ty.next;
        }
        j
    }

    /// A class member at `i`. `None` when `i` does not start one.
    fn class_member(&mut self, i: usize) -> Option<usize> {
        let member_start = self.start(i);
        let mut j = i;
        let mut ambient = false;

        while MEMBER_MODIFIERS.contains(&self.text(j)) && self.kind(j) == Some(TokenKind::Ident) && self.starts_member_name(j + 1) {
            let word = self.text(j);
            ambient |= matches!(word, "declare" | "abstract");
            if TS_MEMBER_MODIFIERS.contains(&word) {
                self.remove(self.start(j), self.start(j + 1));
            }
            j += 1;
        }
        if self.is(j, "*") {
            j += 1;
        }

        match self.kind(j) {
            Some(TokenKind::Ident | TokenKind::String | TokenKind::Number | TokenKind::PrivateName) => j += 1,
            Some(TokenKind::Punct) if self.is(j, "[") => {
                let close = self.partner(j);
                if self.kind(j + 1) == Some(TokenKind::Ident) && self.is(j + 2, ":") && self.is(close + 1, ":") {
                    let ty = self.skip_type(close + 2);
                    return Some(self.remove_statement(member_start, ty.next.saturating_sub(1)));
                }
                j = close + 1;
            }
            _ => return (j > i).then_some(j),
        }

        if self.is(j, "?") || self.is(j, "!") {
            self.remove(self.start(j), self.end(j));
            j += 1;
        }
        if self.is(j, "<") {
            let end = self.skip_angle(j);
            self.remove(self.start(j), self.end(end - 1));
            j = end;
        }
        if self.is(j, "(") {
            self.params.insert(j, Some(member_start));
            return Some(j);
        }
        if ambient {
            let mut end = j;
            while end < self.toks.len() && !self.is(end, ";") && !(end > j && self.toks[end].newline_before) {
                end = if matches!(self.text(end), "(" | "[" | "{") { self.partner(end) + 1 } else { end + 1 };
            }
            return Some(self.remove_statement(member_start, end.saturating_sub(1).max(j - 1)));
        }
        if self.is(j, ":") {
            let ty = self.skip_type(j + 1);
            self.remove(self.start(j), ty.offset);
            return Some(ty.next);
        }
        Some(j)
    }

    fn starts_member_name(&self, i: usize) -> bool {
        match self.kind(i) {
            Some(TokenKind::Ident | TokenKind::String | TokenKind::Number | TokenKind::PrivateName) => true,
            Some(TokenKind::Punct) => matches!(self.text(i), "[" | "*"),
            _ => false,
        }
    }

    /// Return type, bodiless signatures and parameter properties.
    fn after_params(&mut self, open: usize, close: usize, properties: &[String]) -> usize {
        let declaration = self.params.get(&open).copied().flatten();
        let mut next = close + 1;
        let mut end_offset = self.end(close);
        if self.is(next, ":") {
            let ty = self.skip_type(next + 1);
            self.remove(self.start(next), ty.offset);
            next = ty.next;
            end_offset = ty.offset;
        }

        if let Some(start) = declaration {
            let bodiless = match self.toks.get(next) {
                None => true,
                Some(tok) => self.is(next, ";") || (!self.is(next, "{") && tok.newline_before),
            };
            if bodiless {
                if self.is(next, ";") {
                    self.remove(start, self.end(next));
                    return next + 1;
                }
                self.remove(start, end_offset);
                return next;
            }
        }

        if !properties.is_empty() && self.is(next, "{") {
            self.assign_parameter_properties(next, properties);
        }
        next
    }

    /// `constructor(private x)` assigns `this.x`, after `super(...)` when
    /// the class extends another.
    fn assign_parameter_properties(&mut self, body_open: usize, properties: &[String]) {
        let body_close = self.partner(body_open);
        let mut at = self.end(body_open);
        for k in body_open + 1..body_close {
            if self.is(k, "super") && self.is(k + 1, "(") {
                let call_close = self.partner(k + 1);
                at = if self.is(call_close + 1, ";") { self.end(call_close + 1) } else { self.end(call_close) };
                break;
            }
        }
        let assignments: String = properties.iter().map(|p| format!(" this.{p} = {p};")).collect();
        self.replace(at, at, assignments);
    }

    // =========================================================================
    // EXPRESSIONS
    // =========================================================================

    fn is_arrow_params(&self, open: usize) -> bool {
        let close = self.partner(open);
        if self.is(close + 1, "=>") {
            return true;
        }
        self.is(close + 1, ":") && self.is(self.skip_type(close + 2).next, "=>")
    }

    /// `name(...) {` in a class body or object literal, or a `catch` clause.
    fn is_method_params(&self, open: usize) -> bool {
        if open == 0 {
            return false;
        }
        let prev = open - 1;
        if self.is(prev, "catch") {
            return true;
        }
        let named = match self.kind(prev) {
            Some(TokenKind::Ident) => self.is_plain_ident(prev),
            Some(TokenKind::String | TokenKind::Number | TokenKind::PrivateName) => true,
            Some(TokenKind::Punct) => self.is(prev, "]"),
            _ => false,
        };
        if !named {
            return false;
        }
        let close = self.partner(open);
        self.is(close + 1, "{") || (self.is(close + 1, ":") && self.is(self.skip_type(close + 2).next, "{"))
    }

    /// A `!` on the same line as a preceding operand is postfix: a prefix
    /// `!` there would need a line break to parse.
    fn is_non_null_assertion(&self, i: usize) -> bool {
        if i == 0 || self.toks[i].newline_before {
            return false;
        }
        match self.kind(i - 1) {
            Some(TokenKind::Ident) => self.is_plain_ident(i - 1),
            Some(TokenKind::PrivateName) => true,
            Some(TokenKind::Punct) => self.is(i - 1, "]") || (self.is(i - 1, ")") && !self.closes_statement_head(i - 1)),
            _ => false,
        }
    }

    /// `)` of an `if`/`while`/`for`/`with` head, after which a statement starts.
    fn closes_statement_head(&self, close: usize) -> bool {
        let open = self.partner(close);
        open > 0 && open != close && matches!(self.text(open - 1), "if" | "while" | "for" | "with")
    }

    fn is_const_assertion(&self, i: usize) -> bool {
        self.is(i, "as") && self.is(i + 1, "const") && i > 0 && self.is_expression_end(i - 1)
    }

    fn assertion(&mut self, i: usize) -> usize {
        let starts_type = match self.kind(i + 1) {
            Some(TokenKind::Ident | TokenKind::String | TokenKind::Number | TokenKind::Template) => true,
            Some(TokenKind::Punct) => matches!(self.text(i + 1), "{" | "[" | "(" | "-" | "<"),
            _ => false,
        };
        if !starts_type || self.toks[i].newline_before {
            return i + 1;
        }
        let ty = self.skip_type(i + 1);
        self.remove(self.start(i), ty.offset);
        ty.next
    }

    /// Generic call arguments (`useState<T>(...)`) and generic arrow heads
    /// (`<T,>(x: T) => x`).
    fn angle(&mut self, i: usize) -> usize {
        if i > 0 && self.is_plain_ident(i - 1) {
            if let Some(end) = self.type_arguments_end(i) {
                if self.is(end, "(") || self.kind(end) == Some(TokenKind::Template) {
                    self.remove(self.start(i), self.end(end - 1));
                    return end;
                }
            }
            return i + 1;
        }
        if i == 0 || !self.is_expression_end(i - 1) {
            let end = self.skip_angle(i);
            if self.is(end, "(") && self.is_arrow_params(end) {
                self.remove(self.start(i), self.end(end - 1));
                self.params.insert(end, None);
                return end;
            }
        }
        i + 1
    }

    /// End of `<...>` when every token inside could belong to a type.
    fn type_arguments_end(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut j = open;
        while j < self.toks.len() {
            match self.kind(j) {
                Some(TokenKind::Punct) => match self.text(j) {
                    "<" => depth += 1,
                    ">" => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(j + 1);
                        }
                    }
                    "(" | "[" | "{" => {
                        j = self.partner(j);
                    }
                    p if TYPE_ARG_PUNCT.contains(&p) => {}
                    _ => return None,
                },
                Some(TokenKind::Regex | TokenKind::Template | TokenKind::PrivateName) | None => return None,
                Some(_) => {}
            }
            j += 1;
        }
        None
    }

    // =========================================================================
    // TYPES
    // =========================================================================

    /// Index just past the `>` matching the `<` at `open`.
    fn skip_angle(&self, open: usize) -> usize {
        let mut depth = 0usize;
        let mut j = open;
        while j < self.toks.len() {
            match self.text(j) {
                "<" => depth += 1,
                ">" => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return j + 1;
                    }
                }
                "(" | "[" | "{" => j = self.partner(j),
                _ => {}
            }
            j += 1;
        }
        self.toks.len()
    }

    fn skip_type(&self, i: usize) -> TypeEnd {
        let mut j = i;
        if matches!(self.text(j), "|" | "&") {
            j += 1;
        }
        loop {
            j = self.skip_type_operand(j);
            if matches!(self.text(j), "|" | "&") && self.kind(j) == Some(TokenKind::Punct) {
                j += 1;
                continue;
            }
            if self.is(j, "extends") && j > i {
                // conditional type
                j = self.skip_type_operand(j + 1);
                if self.is(j, "?") {
                    j = self.skip_type(j + 1).next;
                    if self.is(j, ":") {
                        j = self.skip_type(j + 1).next;
                    }
                }
            }
            break;
        }
        let offset = if j > i { self.end(j - 1) } else { self.start(i) };
        TypeEnd { next: j, offset }
    }

    fn skip_type_operand(&self, i: usize) -> usize {
        let Some(tok) = self.toks.get(i) else {
            return i;
        };
        let mut j = match tok.kind {
            TokenKind::Punct => match self.text(i) {
                "(" => {
                    let close = self.partner(i);
                    if self.is(close + 1, "=>") {
                        return self.skip_type(close + 2).next;
                    }
                    close + 1
                }
                "<" => {
                    let params = self.skip_angle(i);
                    if self.is(params, "(") {
                        let close = self.partner(params);
                        if self.is(close + 1, "=>") {
                            return self.skip_type(close + 2).next;
                        }
                    }
                    return params;
                }
                "{" | "[" => self.partner(i) + 1,
                "-" if self.kind(i + 1) == Some(TokenKind::Number) => i + 2,
                _ => return i,
            },
            TokenKind::Ident => match self.text(i) {
                "new" | "abstract" => return self.skip_type_operand(i + 1),
                "keyof" | "readonly" | "unique" | "infer" => return self.skip_type_operand(i + 1),
                "typeof" => {
                    let mut k = i + 1;
                    if self.is(k, "import") && self.is(k + 1, "(") {
                        k = self.partner(k + 1) + 1;
                    } else {
                        k += 1;
                    }
                    while self.is(k, ".") {
                        k += 2;
                    }
                    k
                }
                "asserts" if self.kind(i + 1) == Some(TokenKind::Ident) && !self.is(i + 1, "is") => {
                    let k = i + 2;
                    if self.is(k, "is") { self.skip_type(k + 1).next } else { k }
                }
                "import" if self.is(i + 1, "(") => {
                    let mut k = self.partner(i + 1) + 1;
                    while self.is(k, ".") {
                        k += 2;
                    }
                    k
                }
                _ => {
                    let mut k = i + 1;
                    while self.is(k, ".") && self.kind(k + 1) == Some(TokenKind::Ident) {
                        k += 2;
                    }
                    if self.is(k, "<") && !self.toks[k].newline_before {
                        k = self.skip_angle(k);
                    }
                    if self.is(k, "is") && !self.toks[k].newline_before {
                        return self.skip_type(k + 1).next;
                    }
                    k
                }
            },
            TokenKind::String | TokenKind::Number | TokenKind::Template => i + 1,
            TokenKind::Regex | TokenKind::PrivateName => return i,
        };
        // array and indexed access types
        while self.is(j, "[") && !self.toks[j].newline_before {
            j = self.partner(j) + 1;
        }
        j
    }

    // =========================================================================
    // OUTPUT
    // =========================================================================

    fn apply(mut self) -> String {
        self.edits.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        let mut out = String::with_capacity(self.src.len());
        let mut cursor = 0;
        for edit in &self.edits {
            if edit.start < cursor {
                continue;
            }
            out.push_str(&self.src[cursor..edit.start]);
            out.push_str(&edit.text);
            let removed = self.src[edit.start..edit.end].matches('\n').count();
            for _ in edit.text.matches('\n').count()..removed {
                out.push('\n');
            }
            cursor = edit.end;
        }
        out.push_str(&self.src[cursor..]);
        out
    }
}

enum EnumValue {
    Number(i64),
    Str(String),
    /// A computed value, or for the previous member, its quoted key.
    Expr(String),
}

fn parse_integer(literal: &str) -> Option<i64> {
    let digits = literal.replace('_', "");
    match digits.get(..2) {
        Some("0x" | "0X") => i64::from_str_radix(&digits[2..], 16).ok(),
        Some("0b" | "0B") => i64::from_str_radix(&digits[2..], 2).ok(),
        Some("0o" | "0O") => i64::from_str_radix(&digits[2..], 8).ok(),
        _ => digits.parse().ok(),
    }
}

#[cfg(test)]
#[path = "typescript_test.rs"]
mod tests;
