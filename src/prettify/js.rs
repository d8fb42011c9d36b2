//! A small JavaScript pretty-printer.
//!
//! Re-indents code by brace depth and puts statements on their own lines.
//! String, template and regex literals and comments are copied verbatim. It
//! does not parse JavaScript, so odd inputs come out oddly formatted but
//! never lose characters other than whitespace.

use super::Beautifier;

#[derive(Debug, Clone)]
pub struct JsBeautifier {
    indent: String,
}

impl JsBeautifier {
    pub fn new(indent_width: usize) -> Self {
        Self {
            indent: " ".repeat(indent_width),
        }
    }
}

impl Default for JsBeautifier {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Beautifier for JsBeautifier {
    fn beautify(&self, source: &str) -> String {
        let chars: Vec<char> = source.chars().collect();
        let mut out = Output::new(&self.indent);

        let mut i = 0;
        let mut parens = 0usize;
        // paren depth of each enclosing block, restored when it closes
        let mut enclosing = Vec::new();
        let mut pending_space = false;
        let mut pending_newline = false;
        let mut after_block = false;

        while i < chars.len() {
            let c = chars[i];

            if c.is_whitespace() {
                pending_space = true;
                pending_newline |= c == '\n';
                i += 1;
                continue;
            }

            if after_block {
                after_block = false;
                if matches!(c, ';' | ',' | ')' | ']' | '.') {
                    // glued to the closing brace
                } else if starts_with_word(&chars, i, &["else", "catch", "finally", "while"]) {
                    out.space();
                } else {
                    out.newline();
                }
            } else if pending_newline && parens == 0 {
                out.newline();
            } else if pending_space {
                out.space();
            }
            pending_space = false;
            pending_newline = false;

            let next = chars.get(i + 1).copied();
            match c {
                '"' | '\'' | '`' => {
                    let end = scan_quoted(&chars, i);
                    out.push_chars(&chars[i..end]);
                    i = end;
                    continue;
                }
                '/' if next == Some('/') => {
                    let end = chars[i..]
                        .iter()
                        .position(|&ch| ch == '\n')
                        .map_or(chars.len(), |offset| i + offset);
                    out.push_chars(&chars[i..end]);
                    pending_newline = true;
                    i = end;
                    continue;
                }
                '/' if next == Some('*') => {
                    let end = find_block_comment_end(&chars, i + 2);
                    out.push_chars(&chars[i..end]);
                    i = end;
                    continue;
                }
                '/' if regex_allowed(out.last_significant(), out.last_word()) => {
                    let end = scan_regex(&chars, i);
                    out.push_chars(&chars[i..end]);
                    i = end;
                    continue;
                }
                '{' => {
                    out.space_before_brace();
                    out.push('{');
                    out.depth += 1;
                    enclosing.push(parens);
                    parens = 0;
                    out.newline();
                }
                '}' => {
                    out.depth = out.depth.saturating_sub(1);
                    parens = enclosing.pop().unwrap_or(0);
                    out.newline();
                    out.push('}');
                    after_block = true;
                }
                ';' => {
                    out.push(';');
                    if parens == 0 {
                        out.newline();
                    }
                }
                '(' => {
                    parens += 1;
                    out.push('(');
                }
                ')' => {
                    parens = parens.saturating_sub(1);
                    out.push(')');
                }
                _ => out.push(c),
            }
            i += 1;
        }

        out.finish()
    }
}

struct Output<'a> {
    buf: String,
    unit: &'a str,
    depth: usize,
    line_start: bool,
}

impl<'a> Output<'a> {
    fn new(unit: &'a str) -> Self {
        Self {
            buf: String::new(),
            unit,
            depth: 0,
            line_start: true,
        }
    }

    fn indent_if_needed(&mut self) {
        if self.line_start {
            for _ in 0..self.depth {
                self.buf.push_str(self.unit);
            }
            self.line_start = false;
        }
    }

    fn push(&mut self, c: char) {
        self.indent_if_needed();
        self.buf.push(c);
    }

    fn push_chars(&mut self, chars: &[char]) {
        self.indent_if_needed();
        self.buf.extend(chars.iter());
    }

    fn space(&mut self) {
        if !self.line_start && !self.buf.ends_with(' ') {
            self.buf.push(' ');
        }
    }

    fn space_before_brace(&mut self) {
        if !self.line_start && !self.buf.ends_with(&[' ', '(', '['][..]) {
            self.buf.push(' ');
        }
    }

    fn newline(&mut self) {
        if self.line_start {
            return;
        }
        let trimmed = self.buf.trim_end_matches(' ').len();
        self.buf.truncate(trimmed);
        self.buf.push('\n');
        self.line_start = true;
    }

    fn last_significant(&self) -> Option<char> {
        self.buf.chars().rev().find(|c| !c.is_whitespace())
    }

    /// The identifier or keyword ending the output, ignoring trailing whitespace.
    fn last_word(&self) -> &str {
        let trimmed = self.buf.trim_end();
        let start = trimmed
            .char_indices()
            .rev()
            .find(|&(_, c)| !is_ident_char(c))
            .map_or(0, |(at, c)| at + c.len_utf8());
        &trimmed[start..]
    }

    fn finish(self) -> String {
        self.buf.trim_end().to_string()
    }
}

fn starts_with_word(chars: &[char], at: usize, words: &[&str]) -> bool {
    words.iter().any(|word| {
        let len = word.chars().count();
        chars.len() >= at + len
            && chars[at..at + len].iter().copied().eq(word.chars())
            && !chars
                .get(at + len)
                .is_some_and(|&c| is_ident_char(c))
    })
}

/// Index just past the closing quote, or the end of input.
fn scan_quoted(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    chars.len()
}

fn find_block_comment_end(chars: &[char], from: usize) -> usize {
    let mut j = from;
    while j + 1 < chars.len() {
        if chars[j] == '*' && chars[j + 1] == '/' {
            return j + 2;
        }
        j += 1;
    }
    chars.len()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Keywords after which a `/` begins an expression.
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// A `/` starts a regex literal when it cannot be a division.
fn regex_allowed(previous: Option<char>, previous_word: &str) -> bool {
    match previous {
        None => true,
        Some(c) if is_ident_char(c) => REGEX_KEYWORDS.contains(&previous_word),
        Some(c) => "(,=:[!&|?{};+-*%<>~^".contains(c),
    }
}

fn scan_regex(chars: &[char], start: usize) -> usize {
    let mut j = start + 1;
    let mut in_class = false;

    while j < chars.len() {
        match chars[j] {
            '\\' => {
                j += 2;
                continue;
            }
            '\n' => return j,
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => {
                j += 1;
                while j < chars.len() && chars[j].is_ascii_alphabetic() {
                    j += 1;
                }
                return j;
            }
            _ => {}
        }
        j += 1;
    }

    chars.len()
}
