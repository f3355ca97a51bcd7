//! JavaScript/TypeScript tokenizer shared by every per-module pass.
//!
//! The scanner only needs enough grammar to find token boundaries: comments
//! and whitespace are skipped (with a newline flag kept on the next token),
//! template literals are scanned whole including nested `${}` expressions,
//! and `/` is read as a regex or a division depending on the previous token.
//! JSX text is not tokenizable; the JSX pass drives the scanner from
//! explicit offsets instead.

/// Syntax failure at a byte offset of the pass input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl SyntaxError {
    #[must_use]
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self { message: message.into(), offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifiers and keywords alike.
    Ident,
    /// `#name` class member.
    PrivateName,
    Number,
    String,
    /// A complete template literal, substitutions included.
    Template,
    Regex,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// A line terminator appeared between the previous token and this one.
    pub newline_before: bool,
}

impl Token {
    #[must_use]
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    #[must_use]
    pub fn is_punct(&self, src: &str, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text(src) == punct
    }

    #[must_use]
    pub fn is_ident(&self, src: &str, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text(src) == word
    }
}

/// Keywords after which an expression (and so a regex) may start.
const EXPRESSION_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do", "else", "yield",
    "await", "extends",
];

/// Reserved words that never end an expression.
pub const RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do", "else", "export",
    "extends", "finally", "for", "function", "if", "import", "in", "instanceof", "let", "new", "return", "switch",
    "throw", "try", "typeof", "var", "void", "while", "with", "yield", "await", "of",
];

/// Punctuators, longest first within each length.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==", "!=", "<=", ">=", "&&",
    "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "**", "<<", ">>", "{", "}", "(",
    ")", "[", "]", ";", ",", "<", ">", "+", "-", "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".", "@",
];

#[must_use]
pub fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

#[must_use]
pub fn is_ident_part(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

/// On-demand tokenizer over a source string.
pub struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    regex_allowed: bool,
}

impl<'a> Scanner<'a> {
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        let mut scanner = Self { src, bytes: src.as_bytes(), pos: 0, regex_allowed: true };
        if src.starts_with('\u{feff}') {
            scanner.pos = 3;
        }
        if src[scanner.pos..].starts_with("#!") {
            scanner.pos = src[scanner.pos..].find('\n').map_or(src.len(), |n| scanner.pos + n);
        }
        scanner
    }

    /// Resume at `pos`. `expression_expected` decides how a leading `/` reads.
    #[must_use]
    pub fn at(src: &'a str, pos: usize, expression_expected: bool) -> Self {
        Self { src, bytes: src.as_bytes(), pos, regex_allowed: expression_expected }
    }

    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Whether the next token sits in expression-start position.
    #[must_use]
    pub fn expression_expected(&self) -> bool {
        self.regex_allowed
    }

    pub fn seek(&mut self, pos: usize, expression_expected: bool) {
        self.pos = pos;
        self.regex_allowed = expression_expected;
    }

    /// Next token, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Unterminated strings, templates, regexes and block comments.
    pub fn next_token(&mut self) -> Result<Option<Token>, SyntaxError> {
        let newline_before = self.skip_trivia()?;
        let Some(&b) = self.bytes.get(self.pos) else {
            return Ok(None);
        };
        let start = self.pos;

        let kind = match b {
            b'"' | b'\'' => {
                self.scan_string(b)?;
                TokenKind::String
            }
            b'`' => {
                self.scan_template()?;
                TokenKind::Template
            }
            b'#' if self.bytes.get(start + 1).is_some_and(|c| is_ident_start(*c)) => {
                self.pos += 1;
                self.scan_ident();
                TokenKind::PrivateName
            }
            b'0'..=b'9' => {
                self.scan_number();
                TokenKind::Number
            }
            b'.' if self.bytes.get(start + 1).is_some_and(u8::is_ascii_digit) => {
                self.scan_number();
                TokenKind::Number
            }
            b'/' if self.regex_allowed => {
                self.scan_regex()?;
                TokenKind::Regex
            }
            b'\\' => {
                self.scan_ident();
                TokenKind::Ident
            }
            c if is_ident_start(c) => {
                self.scan_ident();
                TokenKind::Ident
            }
            _ => {
                self.scan_punct()?;
                TokenKind::Punct
            }
        };

        let token = Token { kind, start, end: self.pos, newline_before };
        self.regex_allowed = self.regex_allowed_after(&token);
        Ok(Some(token))
    }

    fn regex_allowed_after(&self, token: &Token) -> bool {
        let text = token.text(self.src);
        match token.kind {
            TokenKind::Ident => EXPRESSION_KEYWORDS.contains(&text),
            TokenKind::Punct => !matches!(text, ")" | "]" | "++" | "--"),
            _ => false,
        }
    }

    /// Skip whitespace and comments. Returns whether a newline was crossed.
    fn skip_trivia(&mut self) -> Result<bool, SyntaxError> {
        let mut newline = false;
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b'\n' | b'\r' => {
                    newline = true;
                    self.pos += 1;
                }
                b' ' | b'\t' | 0x0b | 0x0c => self.pos += 1,
                b'/' if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    self.pos = self.src[self.pos..].find(['\n', '\r']).map_or(self.src.len(), |n| self.pos + n);
                }
                b'/' if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    let open = self.pos;
                    let Some(close) = self.src[open + 2..].find("*/") else {
                        return Err(SyntaxError::new("Expected \"*/\" to terminate multi-line comment", open));
                    };
                    let body = &self.src[open + 2..open + 2 + close];
                    newline |= body.contains(['\n', '\r']);
                    self.pos = open + 2 + close + 2;
                }
                _ if self.src[self.pos..].starts_with(['\u{a0}', '\u{2028}', '\u{2029}', '\u{feff}']) => {
                    let ch = self.src[self.pos..].chars().next().map_or('\0', |c| c);
                    newline |= matches!(ch, '\u{2028}' | '\u{2029}');
                    self.pos += ch.len_utf8();
                }
                _ => break,
            }
        }
        Ok(newline)
    }

    fn scan_ident(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b'\\' {
                // \uXXXX or \u{...} escape
                self.pos += 2;
                if self.bytes.get(self.pos - 1) == Some(&b'u') && self.bytes.get(self.pos) == Some(&b'{') {
                    self.pos = self.src[self.pos..].find('}').map_or(self.src.len(), |n| self.pos + n + 1);
                } else {
                    self.pos = (self.pos + 4).min(self.src.len());
                }
            } else if is_ident_part(b) && !self.at_unicode_space() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn at_unicode_space(&self) -> bool {
        self.src.is_char_boundary(self.pos) && self.src[self.pos..].starts_with(['\u{a0}', '\u{2028}', '\u{2029}', '\u{feff}'])
    }

    fn scan_number(&mut self) {
        let hex = self.src[self.pos..].len() > 1 && matches!(&self.src[self.pos..self.pos + 2], "0x" | "0X");
        let mut prev = 0u8;
        while let Some(&b) = self.bytes.get(self.pos) {
            let exponent_sign = !hex && matches!(b, b'+' | b'-') && matches!(prev, b'e' | b'E');
            if b.is_ascii_alphanumeric() || b == b'_' || exponent_sign || (b == b'.' && !hex) {
                if b == b'.' && self.bytes.get(self.pos + 1) == Some(&b'.') {
                    break;
                }
                prev = b;
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn scan_string(&mut self, quote: u8) -> Result<(), SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b'\\' => self.pos += 2,
                b'\n' | b'\r' => break,
                _ if b == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => self.pos += 1,
            }
        }
        Err(SyntaxError::new("Unterminated string literal", start))
    }

    fn scan_template(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b'\\' => self.pos += 2,
                b'`' => {
                    self.pos += 1;
                    return Ok(());
                }
                b'$' if self.bytes.get(self.pos + 1) == Some(&b'{') => {
                    self.pos += 2;
                    self.skip_substitution(start)?;
                }
                _ => self.pos += 1,
            }
        }
        Err(SyntaxError::new("Unterminated template literal", start))
    }

    /// Consume tokens through the `}` closing a template substitution.
    fn skip_substitution(&mut self, template_start: usize) -> Result<(), SyntaxError> {
        self.regex_allowed = true;
        let mut depth = 0usize;
        loop {
            let Some(token) = self.next_token()? else {
                return Err(SyntaxError::new("Unterminated template literal", template_start));
            };
            if token.kind != TokenKind::Punct {
                continue;
            }
            match token.text(self.src) {
                "{" => depth += 1,
                "}" if depth == 0 => return Ok(()),
                "}" => depth -= 1,
                _ => {}
            }
        }
    }

    fn scan_regex(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        let mut in_class = false;
        loop {
            let Some(&b) = self.bytes.get(self.pos) else {
                return Err(SyntaxError::new("Unterminated regular expression", start));
            };
            match b {
                b'\\' => self.pos += 2,
                b'\n' | b'\r' => return Err(SyntaxError::new("Unterminated regular expression", start)),
                b'[' => {
                    in_class = true;
                    self.pos += 1;
                }
                b']' => {
                    in_class = false;
                    self.pos += 1;
                }
                b'/' if !in_class => {
                    self.pos += 1;
                    break;
                }
                _ => self.pos += 1,
            }
        }
        while self.bytes.get(self.pos).is_some_and(|b| b.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        Ok(())
    }

    fn scan_punct(&mut self) -> Result<(), SyntaxError> {
        let rest = &self.src[self.pos..];
        for punct in PUNCTUATORS {
            if rest.starts_with(punct) {
                // `a?.5:b` is a conditional, not optional chaining
                if *punct == "?." && rest.as_bytes().get(2).is_some_and(u8::is_ascii_digit) {
                    continue;
                }
                self.pos += punct.len();
                return Ok(());
            }
        }
        let ch = rest.chars().next().map_or('\0', |c| c);
        Err(SyntaxError::new(format!("Unexpected \"{ch}\""), self.pos))
    }
}

/// Tokenize a whole source.
///
/// # Errors
///
/// The first [`SyntaxError`] encountered.
pub fn tokenize(src: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut scanner = Scanner::new(src);
    let mut tokens = Vec::new();
    while let Some(token) = scanner.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

/// For each bracket token, the index of its partner.
///
/// # Errors
///
/// An unbalanced or mismatched bracket, located at the offending token.
pub fn match_brackets(src: &str, tokens: &[Token]) -> Result<Vec<Option<usize>>, SyntaxError> {
    let mut partners = vec![None; tokens.len()];
    let mut stack: Vec<(usize, &str)> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Punct {
            continue;
        }
        let text = token.text(src);
        match text {
            "(" | "[" | "{" => stack.push((i, text)),
            ")" | "]" | "}" => {
                let expected = match text {
                    ")" => "(",
                    "]" => "[",
                    _ => "{",
                };
                match stack.pop() {
                    Some((open, open_text)) if open_text == expected => {
                        partners[open] = Some(i);
                        partners[i] = Some(open);
                    }
                    Some((_, open_text)) => {
                        let want = closing_for(open_text);
                        return Err(SyntaxError::new(format!("Expected \"{want}\" but found \"{text}\""), token.start));
                    }
                    None => return Err(SyntaxError::new(format!("Unexpected \"{text}\""), token.start)),
                }
            }
            _ => {}
        }
    }
    if let Some((_, open_text)) = stack.pop() {
        let want = closing_for(open_text);
        return Err(SyntaxError::new(format!("Expected \"{want}\" but found end of file"), src.len()));
    }
    Ok(partners)
}

fn closing_for(open: &str) -> &'static str {
    match open {
        "(" => ")",
        "[" => "]",
        _ => "}",
    }
}

#[cfg(test)]
#[path = "lexer_test.rs"]
mod tests;
