//! Import and export extraction for JS/JSX/TS sources.
//!
//! This is not a parser. A tolerant lexer skips comments and literals, then a
//! statement-level pass picks out the module syntax. JSX text never aborts a
//! scan: an apostrophe in text starts a string that ends at the line break.
//! Module declarations count only outside any bracket, so JSX text that looks
//! like `import`/`export` inside a component body is ignored.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::fs::path;
use crate::span::Span;
use serde::{Deserialize, Serialize};

/// Extensions whose content is scanned for imports; everything else is a leaf
pub const SOURCE_EXTENSIONS: &[&str] = &["jsx", "js", "tsx", "ts", "mjs", "cjs", "mts", "cts"];

pub fn is_source_file(file_path: &str) -> bool {
    path::extension(file_path).is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportKind {
    /// `import x from 'm'`
    Static,
    /// `import 'm'`
    SideEffect,
    /// `export ... from 'm'`
    ReExport,
    /// `require('m')`
    Require,
    /// `import('m')`
    Dynamic,
    /// `import type ... from 'm'`
    TypeOnly,
}

impl ImportKind {
    /// Eager imports run before the importing module; only these form cycles
    pub fn is_eager(&self) -> bool {
        !matches!(self, ImportKind::Dynamic | ImportKind::TypeOnly)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub specifier: String,
    pub kind: ImportKind,
    /// Span of the specifier literal
    pub span: Span,
    /// Position among the file's imports, in source order
    pub order: usize,
}

/// Module-level facts extracted from one file version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    pub path: String,
    pub version: u64,
    pub imports: Vec<ImportRecord>,
    /// Named exports in declaration order, without `default`
    pub exports: Vec<String>,
    pub default_export_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl ModuleRecord {
    pub fn has_default_export(&self) -> bool {
        self.default_export_count > 0
    }

    pub fn eager_imports(&self) -> impl Iterator<Item = &ImportRecord> {
        self.imports.iter().filter(|i| i.kind.is_eager())
    }
}

/// Scan one file. Non-source files produce an empty record.
pub fn scan(file_path: &str, version: u64, content: &str) -> ModuleRecord {
    let mut record = ModuleRecord {
        path: file_path.to_string(),
        version,
        imports: Vec::new(),
        exports: Vec::new(),
        default_export_count: 0,
        diagnostics: Vec::new(),
    };
    if !is_source_file(file_path) {
        return record;
    }

    let mut lexer = Lexer::new(content);
    lexer.run();
    if let Some((message, span)) = lexer.error.take() {
        record.diagnostics.push(
            Diagnostic::error(DiagnosticKind::ParseError, file_path, message).with_span(span),
        );
    }

    StatementPass {
        tokens: &lexer.tokens,
        record: &mut record,
    }
    .run();
    record
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str { value: String, closed: bool },
    /// `simple` is false once the literal contains a substitution
    Template { value: String, simple: bool },
    Punct(char),
    Number,
    Regex,
}

/// Keywords after which `/` starts a regular expression
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case",
    "do", "else", "yield", "await",
];

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    span: Span,
    newline_before: bool,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    newline_pending: bool,
    /// Brace depth inside each open `${`
    templates: Vec<usize>,
    tokens: Vec<Token>,
    error: Option<(String, Span)>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
            newline_pending: false,
            templates: Vec::new(),
            tokens: Vec::new(),
            error: None,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn mark(&self) -> Span {
        Span::new(self.pos, self.pos, self.line, self.column)
    }

    fn push(&mut self, tok: Tok, start: Span) {
        let span = Span::new(start.start, self.pos, start.line, start.column);
        self.tokens.push(Token {
            tok,
            span,
            newline_before: std::mem::take(&mut self.newline_pending),
        });
    }

    fn fail(&mut self, message: &str, at: Span) {
        if self.error.is_none() {
            self.error = Some((message.to_string(), at));
        }
    }

    fn run(&mut self) {
        while let Some(c) = self.peek() {
            if self.error.is_some() {
                return;
            }
            let start = self.mark();
            match c {
                '\n' => {
                    self.bump();
                    self.newline_pending = true;
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_second() == Some('/') => self.line_comment(),
                '/' if self.peek_second() == Some('*') => self.block_comment(start),
                '/' if self.regex_allowed() && self.regex(start) => {}
                '\'' | '"' => self.string(c, start),
                '`' => {
                    self.bump();
                    self.template_chunk(start, true);
                }
                '{' => {
                    self.bump();
                    if let Some(depth) = self.templates.last_mut() {
                        *depth += 1;
                    }
                    self.push(Tok::Punct('{'), start);
                }
                '}' => {
                    self.bump();
                    match self.templates.last_mut() {
                        Some(0) => {
                            self.templates.pop();
                            self.template_chunk(start, false);
                        }
                        Some(depth) => {
                            *depth -= 1;
                            self.push(Tok::Punct('}'), start);
                        }
                        None => self.push(Tok::Punct('}'), start),
                    }
                }
                c if c == '_' || c == '$' || c.is_alphabetic() => self.ident(start),
                c if c.is_ascii_digit() => {
                    while self
                        .peek()
                        .is_some_and(|c| c.is_alphanumeric() || c == '.' || c == '_')
                    {
                        self.bump();
                    }
                    self.push(Tok::Number, start);
                }
                other => {
                    self.bump();
                    self.push(Tok::Punct(other), start);
                }
            }
        }

        if !self.templates.is_empty() && self.error.is_none() {
            let at = self.mark();
            self.fail("unterminated template literal", at);
        }
    }

    fn line_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.bump();
        }
    }

    fn block_comment(&mut self, start: Span) {
        self.bump();
        self.bump();
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return;
                }
                Some('\n') => self.newline_pending = true,
                Some(_) => {}
                None => {
                    self.fail("unterminated block comment", start);
                    return;
                }
            }
        }
    }

    fn string(&mut self, quote: char, start: Span) {
        self.bump();
        let mut value = String::new();
        let closed = loop {
            match self.peek() {
                None | Some('\n') => break false,
                Some(c) if c == quote => {
                    self.bump();
                    break true;
                }
                Some('\\') => {
                    self.bump();
                    if let Some(escaped) = self.bump() {
                        value.push(escaped);
                    }
                }
                Some(c) => {
                    self.bump();
                    value.push(c);
                }
            }
        };
        self.push(Tok::Str { value, closed }, start);
    }

    /// Consume template text up to the closing backtick or the next `${`.
    /// `head` is true for the chunk right after the opening backtick.
    fn template_chunk(&mut self, start: Span, head: bool) {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => {
                    self.fail("unterminated template literal", start);
                    return;
                }
                Some('`') => {
                    if head {
                        self.push(Tok::Template { value, simple: true }, start);
                    }
                    return;
                }
                Some('\\') => {
                    if let Some(escaped) = self.bump() {
                        value.push(escaped);
                    }
                }
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    self.templates.push(0);
                    if head {
                        self.push(
                            Tok::Template {
                                value,
                                simple: false,
                            },
                            start,
                        );
                    }
                    return;
                }
                Some(c) => value.push(c),
            }
        }
    }

    /// Whether a `/` here begins a regex rather than a division, judged by the
    /// previous token
    fn regex_allowed(&self) -> bool {
        let Some(last) = self.tokens.last() else {
            return true;
        };
        match &last.tok {
            Tok::Ident(word) => REGEX_PREFIX_KEYWORDS.contains(&word.as_str()),
            // `</` closes a JSX tag
            Tok::Punct(')' | ']' | '}' | '<') => false,
            // only `=>` among the `>` forms; a lone `>` ends a JSX tag
            Tok::Punct('>') => self.tokens.len() >= 2 && {
                let before = &self.tokens[self.tokens.len() - 2];
                before.tok == Tok::Punct('=') && before.span.end == last.span.start
            },
            Tok::Punct(_) => true,
            Tok::Str { .. } | Tok::Template { .. } | Tok::Number | Tok::Regex => false,
        }
    }

    /// Lex `/body/flags` starting at the slash. Returns false, consuming
    /// nothing, when the line ends before the closing slash or the closing
    /// slash belongs to a JSX `</tag`.
    fn regex(&mut self, start: Span) -> bool {
        let mut in_class = false;
        let mut escaped = false;
        let mut previous = '/';
        let mut end = None;
        for (offset, c) in self.src[self.pos + 1..].char_indices() {
            match c {
                '\n' => break,
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => {
                    if previous != '<' {
                        end = Some(self.pos + 1 + offset + 1);
                    }
                    break;
                }
                _ => {}
            }
            previous = c;
        }
        let Some(end) = end else {
            return false;
        };

        while self.pos < end {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$') {
            self.bump();
        }
        self.push(Tok::Regex, start);
        true
    }

    fn ident(&mut self, start: Span) {
        let begin = self.pos;
        while self
            .peek()
            .is_some_and(|c| c == '_' || c == '$' || c.is_alphanumeric())
        {
            self.bump();
        }
        let name = self.src[begin..self.pos].to_string();
        self.push(Tok::Ident(name), start);
    }
}

struct StatementPass<'t, 'r> {
    tokens: &'t [Token],
    record: &'r mut ModuleRecord,
}

impl StatementPass<'_, '_> {
    fn ident(&self, i: usize) -> Option<&str> {
        match self.tokens.get(i).map(|t| &t.tok) {
            Some(Tok::Ident(name)) => Some(name),
            _ => None,
        }
    }

    fn is_ident(&self, i: usize, name: &str) -> bool {
        self.ident(i) == Some(name)
    }

    fn punct(&self, i: usize) -> Option<char> {
        match self.tokens.get(i).map(|t| &t.tok) {
            Some(Tok::Punct(c)) => Some(*c),
            _ => None,
        }
    }

    /// A complete string literal, or a template without substitutions
    fn literal(&self, i: usize) -> Option<(&str, Span)> {
        let token = self.tokens.get(i)?;
        match &token.tok {
            Tok::Str {
                value,
                closed: true,
            } => Some((value, token.span)),
            Tok::Template {
                value,
                simple: true,
            } => Some((value, token.span)),
            _ => None,
        }
    }

    fn at_statement_start(&self, i: usize) -> bool {
        i == 0 || self.tokens[i].newline_before || matches!(self.punct(i - 1), Some(';' | '}'))
    }

    fn add_import(&mut self, at: usize, kind: ImportKind) {
        let Some((specifier, span)) = self.literal(at).map(|(s, span)| (s.to_string(), span))
        else {
            return;
        };
        let order = self.record.imports.len();
        self.record.imports.push(ImportRecord {
            specifier,
            kind,
            span,
            order,
        });
    }

    fn add_export(&mut self, name: &str) {
        if name == "default" {
            self.record.default_export_count += 1;
        } else if !self.record.exports.iter().any(|e| e == name) {
            self.record.exports.push(name.to_string());
        }
    }

    fn run(&mut self) {
        let mut i = 0;
        // Open `{`, `(` and `[`; declarations only count at zero
        let mut depth = 0usize;
        while i < self.tokens.len() {
            let statement_start = depth == 0 && self.at_statement_start(i);
            let next = match self.ident(i) {
                Some("import") if statement_start => self.import_statement(i),
                Some("export") if statement_start => self.export_statement(i),
                _ => None,
            };
            if let Some(next) = next {
                i = next;
                continue;
            }

            let after_dot = i > 0 && self.punct(i - 1) == Some('.');
            match self.ident(i) {
                Some("import") if !after_dot && self.punct(i + 1) == Some('(') => {
                    self.dynamic_import(i)
                }
                Some("require")
                    if !after_dot
                        && !(i > 0 && self.is_ident(i - 1, "function"))
                        && self.punct(i + 1) == Some('(')
                        && self.literal(i + 2).is_some()
                        && self.punct(i + 3) == Some(')') =>
                {
                    self.add_import(i + 2, ImportKind::Require)
                }
                _ => {}
            }
            match self.punct(i) {
                Some('{' | '(' | '[') => depth += 1,
                Some('}' | ')' | ']') => depth = depth.saturating_sub(1),
                _ => {}
            }
            i += 1;
        }
    }

    fn dynamic_import(&mut self, i: usize) {
        if self.literal(i + 2).is_some() && matches!(self.punct(i + 3), Some(')' | ',')) {
            self.add_import(i + 2, ImportKind::Dynamic);
        } else {
            let span = self.tokens[i].span;
            let path = self.record.path.clone();
            self.record.diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::UnanalyzableImport,
                    path,
                    "dynamic import with a non-literal specifier cannot be resolved",
                )
                .with_span(span),
            );
        }
    }

    fn import_statement(&mut self, i: usize) -> Option<usize> {
        let first = i + 1;
        if self.literal(first).is_some() {
            self.add_import(first, ImportKind::SideEffect);
            return Some(first + 1);
        }

        let mut kind = ImportKind::Static;
        let mut k = first;
        let default_named_type = self.is_ident(first + 1, "from") && self.literal(first + 2).is_some();
        if self.is_ident(first, "type")
            && !default_named_type
            && (self.ident(first + 1).is_some() || matches!(self.punct(first + 1), Some('{' | '*')))
        {
            kind = ImportKind::TypeOnly;
            k += 1;
        }

        let limit = (k + 256).min(self.tokens.len());
        while k < limit {
            match &self.tokens[k].tok {
                Tok::Ident(name) if name == "from" && k > first && self.literal(k + 1).is_some() => {
                    self.add_import(k + 1, kind);
                    return Some(k + 2);
                }
                Tok::Ident(_) | Tok::Punct(',' | '{' | '}' | '*') => k += 1,
                _ => return None,
            }
        }
        None
    }

    fn export_statement(&mut self, i: usize) -> Option<usize> {
        let k = i + 1;
        match (self.ident(k), self.punct(k)) {
            (Some("default"), _) => {
                self.record.default_export_count += 1;
                Some(k + 1)
            }
            (_, Some('*')) => {
                let mut k = k + 1;
                if self.is_ident(k, "as") {
                    if let Some(name) = self.ident(k + 1).map(str::to_string) {
                        self.add_export(&name);
                    }
                    k += 2;
                }
                if self.is_ident(k, "from") && self.literal(k + 1).is_some() {
                    self.add_import(k + 1, ImportKind::ReExport);
                    return Some(k + 2);
                }
                Some(k)
            }
            (_, Some('{')) => self.export_list(k, ImportKind::ReExport),
            (Some("type"), _) if self.punct(k + 1) == Some('{') => {
                self.export_list(k + 1, ImportKind::TypeOnly)
            }
            (Some("const" | "let" | "var"), _) => self.declarator(k + 1),
            (Some("function"), _) => {
                let name_at = if self.punct(k + 1) == Some('*') { k + 2 } else { k + 1 };
                self.named_declaration(name_at)
            }
            (Some("async"), _) if self.is_ident(k + 1, "function") => {
                let name_at = if self.punct(k + 2) == Some('*') { k + 3 } else { k + 2 };
                self.named_declaration(name_at)
            }
            (Some("abstract"), _) if self.is_ident(k + 1, "class") => self.named_declaration(k + 2),
            (Some("class" | "type" | "interface" | "enum"), _) => self.named_declaration(k + 1),
            (Some("declare"), _) => self.export_statement(k),
            _ => None,
        }
    }

    fn named_declaration(&mut self, at: usize) -> Option<usize> {
        let name = self.ident(at)?.to_string();
        self.add_export(&name);
        Some(at + 1)
    }

    /// `{ a, b as c, x as default } [from 'm']`, starting at the brace
    fn export_list(&mut self, open: usize, from_kind: ImportKind) -> Option<usize> {
        let mut k = open + 1;
        let mut names = Vec::new();
        loop {
            match self.tokens.get(k).map(|t| &t.tok) {
                Some(Tok::Punct('}')) => break,
                Some(Tok::Punct(',')) => k += 1,
                Some(Tok::Ident(local)) => {
                    let mut local = local.clone();
                    if local == "type" && self.ident(k + 1).is_some() && !self.is_ident(k + 1, "as") {
                        k += 1;
                        local = self.ident(k)?.to_string();
                    }
                    if self.is_ident(k + 1, "as") {
                        let exported = match self.tokens.get(k + 2).map(|t| &t.tok) {
                            Some(Tok::Ident(name)) => name.clone(),
                            Some(Tok::Str { value, .. }) => value.clone(),
                            _ => return None,
                        };
                        names.push(exported);
                        k += 3;
                    } else {
                        names.push(local);
                        k += 1;
                    }
                }
                _ => return None,
            }
        }
        for name in names {
            self.add_export(&name);
        }

        let after = k + 1;
        if self.is_ident(after, "from") && self.literal(after + 1).is_some() {
            self.add_import(after + 1, from_kind);
            return Some(after + 2);
        }
        Some(after)
    }

    /// Binding names of the first declarator, including simple destructuring
    fn declarator(&mut self, at: usize) -> Option<usize> {
        match self.tokens.get(at).map(|t| &t.tok) {
            Some(Tok::Ident(_)) => self.named_declaration(at),
            Some(Tok::Punct(open @ ('{' | '['))) => {
                let close = if *open == '{' { '}' } else { ']' };
                let mut depth = 0usize;
                let mut in_default = false;
                let mut k = at;
                let mut names = Vec::new();
                while let Some(token) = self.tokens.get(k) {
                    match &token.tok {
                        Tok::Punct('{' | '[') => depth += 1,
                        Tok::Punct('}' | ']') => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                break;
                            }
                        }
                        Tok::Punct(',') => in_default = false,
                        Tok::Punct('=') => in_default = true,
                        Tok::Ident(name) if !in_default && self.punct(k + 1) != Some(':') => {
                            names.push(name.clone());
                        }
                        _ => {}
                    }
                    k += 1;
                }
                if self.punct(k) != Some(close) {
                    return None;
                }
                for name in names {
                    self.add_export(&name);
                }
                Some(k + 1)
            }
            _ => None,
        }
    }
}
