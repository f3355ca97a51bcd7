//! ES module linking.
//!
//! [`analyze`] collects a module's import records and the edits that turn
//! `import`/`export` syntax into calls against the bundle runtime. Once the
//! toolchain has resolved every record to a module id, [`EsModule::render`]
//! produces the body of the module function:
//!
//! ```text
//! function (__exports, __require, __import) { <header> <body> }
//! ```
//!
//! The header defines export getters first, then requires dependencies,
//! then copies re-exported names and binds imports. Import bindings are
//! snapshots taken after the dependency has run.

use super::lexer::{self, RESERVED_WORDS, SyntaxError, Token, TokenKind};
use super::{ImportKind, js_string};

/// One module request found in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub specifier: String,
    /// Byte offset of the specifier literal.
    pub offset: usize,
    pub kind: ImportKind,
}

#[derive(Debug)]
enum Binding {
    Namespace(String),
    Named { imported: String, local: String },
}

#[derive(Debug)]
struct StaticImport {
    record: usize,
    bindings: Vec<Binding>,
}

#[derive(Debug)]
enum ExportValue {
    Local(String),
    Reexport { record: usize, name: Option<String> },
}

#[derive(Debug)]
enum Replacement {
    Text(String),
    DynamicImport(usize),
}

#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    with: Replacement,
}

/// Analyzed module, ready to render once its imports are resolved.
#[derive(Debug)]
pub struct EsModule {
    source: String,
    records: Vec<ImportRecord>,
    imports: Vec<StaticImport>,
    exports: Vec<(String, ExportValue)>,
    stars: Vec<usize>,
    edits: Vec<Edit>,
}

/// Parse `source` for module syntax. `url` backs `import.meta.url`.
///
/// # Errors
///
/// Lexer failures, unbalanced brackets, and malformed import or export
/// statements.
pub fn analyze(source: String, url: &str) -> Result<EsModule, SyntaxError> {
    let toks = lexer::tokenize(&source)?;
    let partners = lexer::match_brackets(&source, &toks)?;
    let mut linker = Linker {
        src: &source,
        toks: &toks,
        partners: &partners,
        url,
        records: Vec::new(),
        imports: Vec::new(),
        exports: Vec::new(),
        stars: Vec::new(),
        edits: Vec::new(),
    };
    linker.strip_preamble();
    linker.run()?;

    let Linker { records, imports, exports, stars, edits, .. } = linker;
    Ok(EsModule { source, records, imports, exports, stars, edits })
}

impl EsModule {
    #[must_use]
    pub fn records(&self) -> &[ImportRecord] {
        &self.records
    }

    /// The source the records' offsets refer to.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Module function body. `ids[n]` is the module id that record `n`
    /// resolved to.
    #[must_use]
    pub fn render(&self, ids: &[usize]) -> String {
        let mut out = String::with_capacity(self.source.len() + 128);

        if !self.exports.is_empty() {
            let getters: Vec<String> = self
                .exports
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        ExportValue::Local(local) => local.clone(),
                        ExportValue::Reexport { record, name: Some(imported) } => member(&dep(*record), imported),
                        ExportValue::Reexport { record, name: None } => dep(*record),
                    };
                    format!("{}: function () {{ return {value}; }}", property_key(name))
                })
                .collect();
            out.push_str(&format!("__export(__exports, {{ {} }}); ", getters.join(", ")));
        }
        for (n, record) in self.records.iter().enumerate() {
            if record.kind == ImportKind::ImportStatement {
                out.push_str(&format!("var {} = __require({}); ", dep(n), ids[n]));
            }
        }
        for star in &self.stars {
            out.push_str(&format!("__reexport(__exports, {}); ", dep(*star)));
        }
        for import in &self.imports {
            for binding in &import.bindings {
                match binding {
                    Binding::Namespace(local) => out.push_str(&format!("var {local} = {}; ", dep(import.record))),
                    Binding::Named { imported, local } => {
                        out.push_str(&format!("var {local} = {}; ", member(&dep(import.record), imported)));
                    }
                }
            }
        }

        let mut edits: Vec<&Edit> = self.edits.iter().collect();
        edits.sort_by_key(|e| e.start);
        let mut cursor = 0;
        for edit in edits {
            if edit.start < cursor {
                continue;
            }
            out.push_str(&self.source[cursor..edit.start]);
            let text = match &edit.with {
                Replacement::Text(text) => text.clone(),
                Replacement::DynamicImport(record) => format!("__import({}", ids[*record]),
            };
            out.push_str(&text);
            let removed = self.source[edit.start..edit.end].matches('\n').count();
            for _ in text.matches('\n').count()..removed {
                out.push('\n');
            }
            cursor = edit.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }
}

fn dep(record: usize) -> String {
    format!("__dep{record}")
}

fn is_identifier(name: &str) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty() && lexer::is_ident_start(bytes[0]) && bytes.iter().all(|b| lexer::is_ident_part(*b))
}

fn member(object: &str, name: &str) -> String {
    if is_identifier(name) { format!("{object}.{name}") } else { format!("{object}[{}]", js_string(name)) }
}

fn property_key(name: &str) -> String {
    if is_identifier(name) { name.to_string() } else { js_string(name) }
}

/// Value of a JS string literal token.
fn string_value(literal: &str) -> String {
    let inner = literal.get(1..literal.len().saturating_sub(1)).unwrap_or("");
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\n') | None => {}
            Some(other) => out.push(other),
        }
    }
    out
}

struct Linker<'a> {
    src: &'a str,
    toks: &'a [Token],
    partners: &'a [Option<usize>],
    url: &'a str,
    records: Vec<ImportRecord>,
    imports: Vec<StaticImport>,
    exports: Vec<(String, ExportValue)>,
    stars: Vec<usize>,
    edits: Vec<Edit>,
}

impl Linker<'_> {
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

    fn unexpected(&self, i: usize) -> SyntaxError {
        match self.toks.get(i) {
            Some(tok) => SyntaxError::new(format!("Unexpected \"{}\"", tok.text(self.src)), tok.start),
            None => SyntaxError::new("Unexpected end of file", self.src.len()),
        }
    }

    fn expected(&self, i: usize, text: &str) -> SyntaxError {
        let found = self.toks.get(i).map_or("end of file", |t| t.text(self.src));
        SyntaxError::new(format!("Expected \"{text}\" but found \"{found}\""), self.start(i))
    }

    fn require_token(&self, i: usize, text: &str) -> Result<(), SyntaxError> {
        if self.is(i, text) { Ok(()) } else { Err(self.expected(i, text)) }
    }

    fn replace(&mut self, start: usize, end: usize, text: impl Into<String>) {
        self.edits.push(Edit { start, end, with: Replacement::Text(text.into()) });
    }

    fn remove(&mut self, start: usize, end: usize) {
        self.replace(start, end, "");
    }

    fn record(&mut self, literal: usize, kind: ImportKind) -> usize {
        let specifier = string_value(self.text(literal));
        if let Some(n) = self.records.iter().position(|r| r.specifier == specifier && r.kind == kind) {
            return n;
        }
        let offset = self.start(literal);
        self.records.push(ImportRecord { specifier, offset, kind });
        self.records.len() - 1
    }

    /// A byte order mark or hashbang line cannot sit inside a function body.
    fn strip_preamble(&mut self) {
        let mut at = 0;
        if self.src.starts_with('\u{feff}') {
            at = '\u{feff}'.len_utf8();
        }
        if self.src[at..].starts_with("#!") {
            let line_end = self.src[at..].find('\n').map_or(self.src.len(), |n| at + n);
            self.remove(0, line_end);
        } else if at > 0 {
            self.remove(0, at);
        }
    }

    fn run(&mut self) -> Result<(), SyntaxError> {
        let mut depth = 0usize;
        let mut i = 0;
        while i < self.toks.len() {
            let after_dot = i > 0 && self.is(i - 1, ".");
            match (self.toks[i].kind, self.text(i)) {
                (TokenKind::Punct, "(" | "[" | "{") => {
                    depth += 1;
                    i += 1;
                }
                (TokenKind::Punct, ")" | "]" | "}") => {
                    depth = depth.saturating_sub(1);
                    i += 1;
                }
                (TokenKind::Ident, "import") if !after_dot => {
                    if self.is(i + 1, "(") {
                        self.dynamic_import(i);
                        i += 1;
                    } else if self.is(i + 1, ".") && self.is(i + 2, "meta") {
                        let meta = format!("({{ url: {} }})", js_string(self.url));
                        self.replace(self.start(i), self.end(i + 2), meta);
                        i += 3;
                    } else if depth == 0 {
                        i = self.import_statement(i)?;
                    } else {
                        i += 1;
                    }
                }
                (TokenKind::Ident, "export") if !after_dot && depth == 0 && !self.is(i + 1, ":") => {
                    i = self.export_statement(i)?;
                }
                _ => i += 1,
            }
        }
        Ok(())
    }

    /// `import("x")` with a literal specifier becomes `__import(id)`.
    /// Computed specifiers are left to the host.
    fn dynamic_import(&mut self, i: usize) {
        let arg = i + 2;
        if self.kind(arg) == Some(TokenKind::String) && (self.is(arg + 1, ")") || self.is(arg + 1, ",")) {
            let record = self.record(arg, ImportKind::DynamicImport);
            let (start, end) = (self.start(i), self.end(arg));
            self.edits.push(Edit { start, end, with: Replacement::DynamicImport(record) });
        }
    }

    /// Index of the last token of a statement ending at `last`, taking an
    /// import attributes clause and a trailing `;` along.
    fn statement_tail(&self, mut last: usize) -> usize {
        let attributes = (self.is(last + 1, "with") || self.is(last + 1, "assert")) && self.is(last + 2, "{");
        if attributes && !self.toks[last + 1].newline_before {
            last = self.partner(last + 2);
        }
        if self.is(last + 1, ";") {
            last += 1;
        }
        last
    }

    fn import_statement(&mut self, i: usize) -> Result<usize, SyntaxError> {
        let mut j = i + 1;
        let mut bindings = Vec::new();

        if self.kind(j) != Some(TokenKind::String) {
            if self.kind(j) == Some(TokenKind::Ident) {
                bindings.push(Binding::Named { imported: "default".into(), local: self.text(j).to_string() });
                j += 1;
                if self.is(j, ",") {
                    j += 1;
                }
            }
            if self.is(j, "*") {
                self.require_token(j + 1, "as")?;
                if self.kind(j + 2) != Some(TokenKind::Ident) {
                    return Err(self.unexpected(j + 2));
                }
                bindings.push(Binding::Namespace(self.text(j + 2).to_string()));
                j += 3;
            } else if self.is(j, "{") {
                let close = self.partner(j);
                self.named_imports(j + 1, close, &mut bindings)?;
                j = close + 1;
            }
            self.require_token(j, "from")?;
            j += 1;
            if self.kind(j) != Some(TokenKind::String) {
                return Err(self.unexpected(j));
            }
        }

        let record = self.record(j, ImportKind::ImportStatement);
        self.imports.push(StaticImport { record, bindings });
        let last = self.statement_tail(j);
        self.remove(self.start(i), self.end(last));
        Ok(last + 1)
    }

    fn named_imports(&self, mut j: usize, close: usize, bindings: &mut Vec<Binding>) -> Result<(), SyntaxError> {
        while j < close {
            let imported = match self.kind(j) {
                Some(TokenKind::Ident) => self.text(j).to_string(),
                Some(TokenKind::String) => string_value(self.text(j)),
                _ => return Err(self.unexpected(j)),
            };
            let local = if self.is(j + 1, "as") {
                if self.kind(j + 2) != Some(TokenKind::Ident) {
                    return Err(self.unexpected(j + 2));
                }
                j += 3;
                self.text(j - 1).to_string()
            } else {
                if self.kind(j) != Some(TokenKind::Ident) {
                    return Err(self.expected(j + 1, "as"));
                }
                j += 1;
                imported.clone()
            };
            bindings.push(Binding::Named { imported, local });
            if self.is(j, ",") {
                j += 1;
            } else if j < close {
                return Err(self.unexpected(j));
            }
        }
        Ok(())
    }

    fn export_statement(&mut self, i: usize) -> Result<usize, SyntaxError> {
        let next = i + 1;
        match self.text(next) {
            "default" => self.export_default(i),
            "{" => self.export_list(i),
            "*" => self.export_star(i),
            "function" | "class" => {
                let mut name = next + 1;
                if self.is(name, "*") {
                    name += 1;
                }
                self.export_declaration(i, name)
            }
            "async" if self.is(next + 1, "function") => {
                let mut name = next + 2;
                if self.is(name, "*") {
                    name += 1;
                }
                self.export_declaration(i, name)
            }
            "const" | "let" | "var" => {
                let mut names = Vec::new();
                self.declared_names(next + 1, &mut names)?;
                for name in names {
                    self.exports.push((name.clone(), ExportValue::Local(name)));
                }
                self.remove(self.start(i), self.start(next));
                Ok(next)
            }
            _ => Err(self.unexpected(next)),
        }
    }

    fn export_declaration(&mut self, i: usize, name: usize) -> Result<usize, SyntaxError> {
        if self.kind(name) != Some(TokenKind::Ident) || RESERVED_WORDS.contains(&self.text(name)) {
            return Err(self.unexpected(name));
        }
        let local = self.text(name).to_string();
        self.exports.push((local.clone(), ExportValue::Local(local)));
        self.remove(self.start(i), self.start(i + 1));
        Ok(i + 1)
    }

    fn export_default(&mut self, i: usize) -> Result<usize, SyntaxError> {
        let value = i + 2;
        let is_async = self.is(value, "async") && self.is(value + 1, "function") && !self.toks[value + 1].newline_before;
        if self.is(value, "function") || is_async {
            let keyword = if is_async { value + 1 } else { value };
            let star = self.is(keyword + 1, "*");
            let name = if star { keyword + 2 } else { keyword + 1 };
            if self.kind(name) == Some(TokenKind::Ident) {
                let local = self.text(name).to_string();
                self.exports.push(("default".into(), ExportValue::Local(local)));
                self.remove(self.start(i), self.start(value));
            } else {
                let head = format!("{}function{} __default", if is_async { "async " } else { "" }, if star { "*" } else { "" });
                self.replace(self.start(i), self.end(name - 1), head);
                self.exports.push(("default".into(), ExportValue::Local("__default".into())));
            }
            return Ok(value);
        }

        if self.is(value, "class") {
            if self.kind(value + 1) == Some(TokenKind::Ident) && !self.is(value + 1, "extends") {
                let local = self.text(value + 1).to_string();
                self.exports.push(("default".into(), ExportValue::Local(local)));
                self.remove(self.start(i), self.start(value));
                return Ok(value);
            }
            let mut body = value + 1;
            while body < self.toks.len() && !self.is(body, "{") {
                body = if matches!(self.text(body), "(" | "[") { self.partner(body) + 1 } else { body + 1 };
            }
            let close = self.partner(body);
            self.replace(self.start(i), self.end(i + 1), "var __default =");
            self.replace(self.end(close), self.end(close), ";");
            self.exports.push(("default".into(), ExportValue::Local("__default".into())));
            return Ok(value);
        }

        if value >= self.toks.len() {
            return Err(self.unexpected(value));
        }
        self.replace(self.start(i), self.start(value), "var __default = ");
        self.exports.push(("default".into(), ExportValue::Local("__default".into())));
        Ok(value)
    }

    /// `export { a, b as c }` and `export { a } from "m"`.
    fn export_list(&mut self, i: usize) -> Result<usize, SyntaxError> {
        let open = i + 1;
        let close = self.partner(open);
        let mut entries = Vec::new();
        let mut j = open + 1;
        while j < close {
            let local = match self.kind(j) {
                Some(TokenKind::Ident) => self.text(j).to_string(),
                Some(TokenKind::String) => string_value(self.text(j)),
                _ => return Err(self.unexpected(j)),
            };
            let exported = if self.is(j + 1, "as") {
                let alias = match self.kind(j + 2) {
                    Some(TokenKind::Ident) => self.text(j + 2).to_string(),
                    Some(TokenKind::String) => string_value(self.text(j + 2)),
                    _ => return Err(self.unexpected(j + 2)),
                };
                j += 3;
                alias
            } else {
                j += 1;
                local.clone()
            };
            entries.push((local, exported));
            if self.is(j, ",") {
                j += 1;
            } else if j < close {
                return Err(self.unexpected(j));
            }
        }

        let last = if self.is(close + 1, "from") {
            if self.kind(close + 2) != Some(TokenKind::String) {
                return Err(self.unexpected(close + 2));
            }
            let record = self.record(close + 2, ImportKind::ImportStatement);
            for (local, exported) in entries {
                self.exports.push((exported, ExportValue::Reexport { record, name: Some(local) }));
            }
            self.statement_tail(close + 2)
        } else {
            for (local, exported) in entries {
                self.exports.push((exported, ExportValue::Local(local)));
            }
            self.statement_tail(close)
        };
        self.remove(self.start(i), self.end(last));
        Ok(last + 1)
    }

    /// `export * from "m"` and `export * as ns from "m"`.
    fn export_star(&mut self, i: usize) -> Result<usize, SyntaxError> {
        let mut j = i + 2;
        let alias = if self.is(j, "as") {
            let alias = match self.kind(j + 1) {
                Some(TokenKind::Ident) => self.text(j + 1).to_string(),
                Some(TokenKind::String) => string_value(self.text(j + 1)),
                _ => return Err(self.unexpected(j + 1)),
            };
            j += 2;
            Some(alias)
        } else {
            None
        };
        self.require_token(j, "from")?;
        if self.kind(j + 1) != Some(TokenKind::String) {
            return Err(self.unexpected(j + 1));
        }
        let record = self.record(j + 1, ImportKind::ImportStatement);
        match alias {
            Some(alias) => self.exports.push((alias, ExportValue::Reexport { record, name: None })),
            None => self.stars.push(record),
        }
        let last = self.statement_tail(j + 1);
        self.remove(self.start(i), self.end(last));
        Ok(last + 1)
    }

    /// Names bound by an exported `const`/`let`/`var` declaration list.
    fn declared_names(&self, mut j: usize, names: &mut Vec<String>) -> Result<(), SyntaxError> {
        loop {
            let first = j;
            j = self.pattern_names(j, names)?;
            loop {
                if j >= self.toks.len() || self.is(j, ";") {
                    return Ok(());
                }
                if self.is(j, ",") {
                    j += 1;
                    break;
                }
                let tok = self.toks[j];
                if j > first && tok.newline_before && tok.kind == TokenKind::Ident && !matches!(self.text(j), "instanceof" | "in") {
                    let prev = self.toks[j - 1];
                    let ends_expression = match prev.kind {
                        TokenKind::Punct => matches!(prev.text(self.src), ")" | "]" | "}" | "++" | "--"),
                        _ => true,
                    };
                    if ends_expression {
                        return Ok(());
                    }
                }
                j = if matches!(self.text(j), "(" | "[" | "{") { self.partner(j) + 1 } else { j + 1 };
            }
        }
    }

    fn pattern_names(&self, j: usize, names: &mut Vec<String>) -> Result<usize, SyntaxError> {
        match self.kind(j) {
            Some(TokenKind::Ident) => {
                names.push(self.text(j).to_string());
                Ok(j + 1)
            }
            Some(TokenKind::Punct) if self.is(j, "{") => {
                let close = self.partner(j);
                let mut k = j + 1;
                while k < close {
                    if self.is(k, "...") {
                        k = self.pattern_names(k + 1, names)?;
                    } else {
                        let key = k;
                        k = if self.is(k, "[") { self.partner(k) + 1 } else { k + 1 };
                        if self.is(k, ":") {
                            k = self.pattern_names(k + 1, names)?;
                        } else if self.kind(key) == Some(TokenKind::Ident) {
                            names.push(self.text(key).to_string());
                        }
                        k = self.skip_default(k, close);
                    }
                    if self.is(k, ",") {
                        k += 1;
                    }
                }
                Ok(close + 1)
            }
            Some(TokenKind::Punct) if self.is(j, "[") => {
                let close = self.partner(j);
                let mut k = j + 1;
                while k < close {
                    if self.is(k, ",") {
                        k += 1;
                        continue;
                    }
                    if self.is(k, "...") {
                        k += 1;
                    }
                    k = self.pattern_names(k, names)?;
                    k = self.skip_default(k, close);
                    if self.is(k, ",") {
                        k += 1;
                    }
                }
                Ok(close + 1)
            }
            _ => Err(self.unexpected(j)),
        }
    }

    fn skip_default(&self, mut k: usize, close: usize) -> usize {
        if !self.is(k, "=") {
            return k;
        }
        while k < close && !self.is(k, ",") {
            k = if matches!(self.text(k), "(" | "[" | "{") { self.partner(k) + 1 } else { k + 1 };
        }
        k
    }
}

#[cfg(test)]
#[path = "esm_test.rs"]
mod tests;
