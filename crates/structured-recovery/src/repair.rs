//! Repair capability for structurally malformed JSON.
//!
//! [`LenientRepair`] is a single-pass rewriter. It does not validate; it only
//! produces text that has a good chance of parsing. The pipeline reparses the
//! output and treats a parse failure as "repair unavailable for this input".

use crate::error::RepairError;

/// Pluggable repair capability consulted after the structural tiers fail.
pub trait Repair: Send + Sync {
    /// Rewrite `text` into something that should parse as JSON.
    fn repair(&self, text: &str) -> Result<String, RepairError>;
}

/// Built-in repairer for common LLM output defects.
///
/// Handles:
/// - trailing and duplicated commas
/// - missing commas between adjacent values or members
/// - raw control characters inside strings
/// - unterminated strings and unclosed containers
/// - single-quoted strings and unquoted keys
/// - `True` / `False` / `None` literals
/// - triple-quoted (`"""`) string blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct LenientRepair;

impl LenientRepair {
    pub fn new() -> Self {
        Self
    }
}

impl Repair for LenientRepair {
    fn repair(&self, text: &str) -> Result<String, RepairError> {
        let start = text
            .find(['{', '['])
            .ok_or(RepairError::NoStructure(text.len()))?;
        Ok(Rewriter::new(&text[start..]).run())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Double,
    Single,
    Triple,
}

struct Rewriter {
    chars: Vec<char>,
    pos: usize,
    out: String,
    stack: Vec<char>,
}

impl Rewriter {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            out: String::with_capacity(text.len() + 16),
            stack: Vec::new(),
        }
    }

    fn run(mut self) -> String {
        while self.pos < self.chars.len() {
            let ch = self.chars[self.pos];
            match ch {
                '{' | '[' => {
                    self.separate();
                    self.stack.push(ch);
                    self.out.push(ch);
                    self.pos += 1;
                }
                '}' | ']' => {
                    self.pos += 1;
                    if self.close(ch) && self.stack.is_empty() {
                        break;
                    }
                }
                ',' => {
                    if !matches!(self.last_significant(), None | Some('{' | '[' | ',' | ':')) {
                        self.out.push(',');
                    }
                    self.pos += 1;
                }
                ':' => {
                    if self.stack.last() == Some(&'{') {
                        self.out.push(':');
                    }
                    self.pos += 1;
                }
                '"' if self.peek(1) == Some('"') && self.peek(2) == Some('"') => {
                    self.separate();
                    self.pos += 3;
                    self.string(Quote::Triple);
                }
                '"' => {
                    self.separate();
                    self.pos += 1;
                    self.string(Quote::Double);
                }
                '\'' => {
                    self.separate();
                    self.pos += 1;
                    self.string(Quote::Single);
                }
                c if is_word_char(c) => self.word(),
                c if c.is_whitespace() => {
                    self.out.push(c);
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
        self.finish()
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn last_significant(&self) -> Option<char> {
        self.out.trim_end().chars().last()
    }

    /// Insert a comma when a new value directly follows a completed one.
    fn separate(&mut self) {
        if self.stack.is_empty() {
            return;
        }
        if !matches!(self.last_significant(), None | Some('{' | '[' | ',' | ':')) {
            self.trim_trailing_whitespace();
            self.out.push(',');
        }
    }

    fn expecting_key(&self) -> bool {
        self.stack.last() == Some(&'{') && matches!(self.last_significant(), Some('{' | ','))
    }

    fn trim_trailing_whitespace(&mut self) {
        let len = self.out.trim_end().len();
        self.out.truncate(len);
    }

    fn drop_trailing_comma(&mut self) {
        self.trim_trailing_whitespace();
        if self.out.ends_with(',') {
            self.out.pop();
        }
    }

    /// Close the container matching `ch`, closing any unclosed inner ones.
    /// Returns false when no matching opener exists (the char is dropped).
    fn close(&mut self, ch: char) -> bool {
        let opener = if ch == '}' { '{' } else { '[' };
        if !self.stack.contains(&opener) {
            return false;
        }
        while let Some(top) = self.stack.pop() {
            self.drop_trailing_comma();
            if top == '{' && self.last_significant() == Some(':') {
                self.out.push_str("null");
            }
            self.out.push(if top == '{' { '}' } else { ']' });
            if top == opener {
                break;
            }
        }
        true
    }

    /// True when the quote at `self.pos` really ends the string: the next
    /// significant char is a delimiter, the input ends, or a newline follows.
    fn is_closing_quote(&self) -> bool {
        let mut i = self.pos + 1;
        while let Some(&c) = self.chars.get(i) {
            if c == '\n' {
                return true;
            }
            if !c.is_whitespace() {
                return matches!(c, ',' | ':' | '}' | ']');
            }
            i += 1;
        }
        true
    }

    fn string(&mut self, quote: Quote) {
        self.out.push('"');
        while self.pos < self.chars.len() {
            let ch = self.chars[self.pos];
            match (quote, ch) {
                (Quote::Triple, '"') if self.peek(1) == Some('"') && self.peek(2) == Some('"') => {
                    self.pos += 3;
                    self.out.push('"');
                    return;
                }
                (Quote::Double, '"') | (Quote::Single, '\'') => {
                    if self.is_closing_quote() {
                        self.pos += 1;
                        self.out.push('"');
                        return;
                    }
                    if ch == '"' {
                        self.out.push_str("\\\"");
                    } else {
                        self.out.push('\'');
                    }
                    self.pos += 1;
                }
                (Quote::Double, '\\') => {
                    self.escape();
                }
                (Quote::Single | Quote::Triple, '\\') => {
                    if self.peek(1) == Some('\'') {
                        self.out.push('\'');
                        self.pos += 2;
                    } else {
                        self.escape();
                    }
                }
                (_, '"') => {
                    self.out.push_str("\\\"");
                    self.pos += 1;
                }
                (_, c) => {
                    push_escaped(&mut self.out, c);
                    self.pos += 1;
                }
            }
        }
        // Unterminated at end of input.
        self.out.push('"');
    }

    /// Copy a backslash escape, doubling the backslash when the escape is invalid.
    fn escape(&mut self) {
        match self.peek(1) {
            Some(next @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')) => {
                self.out.push('\\');
                self.out.push(next);
                self.pos += 2;
            }
            _ => {
                self.out.push_str("\\\\");
                self.pos += 1;
            }
        }
    }

    fn word(&mut self) {
        let begin = self.pos;
        while self.pos < self.chars.len() && is_word_char(self.chars[self.pos]) {
            self.pos += 1;
        }
        let word: String = self.chars[begin..self.pos].iter().collect();
        let as_key = self.expecting_key();
        self.separate();

        if as_key {
            self.out.push('"');
            self.out.push_str(&word);
            self.out.push('"');
            return;
        }
        match word.as_str() {
            "true" | "True" => self.out.push_str("true"),
            "false" | "False" => self.out.push_str("false"),
            "null" | "None" | "NaN" | "Infinity" | "undefined" => self.out.push_str("null"),
            w if serde_json::from_str::<f64>(w).is_ok() => self.out.push_str(w),
            w => {
                self.out.push('"');
                for c in w.chars() {
                    push_escaped(&mut self.out, c);
                }
                self.out.push('"');
            }
        }
    }

    fn finish(mut self) -> String {
        while let Some(top) = self.stack.pop() {
            self.drop_trailing_comma();
            if top == '{' {
                if self.last_significant() == Some(':') {
                    self.out.push_str("null");
                } else if self.dangling_key() {
                    self.out.push_str(":null");
                }
            }
            self.out.push(if top == '{' { '}' } else { ']' });
        }
        self.out
    }

    /// An object member ended with a key and no `:`.
    fn dangling_key(&self) -> bool {
        let trimmed = self.out.trim_end();
        let Some(body) = trimmed.strip_suffix('"') else {
            return false;
        };
        let bytes = body.as_bytes();
        let mut end = body.len();
        while let Some(found) = body[..end].rfind('"') {
            let backslashes = bytes[..found]
                .iter()
                .rev()
                .take_while(|&&b| b == b'\\')
                .count();
            if backslashes % 2 == 0 {
                return matches!(body[..found].trim_end().chars().last(), Some('{' | ','));
            }
            end = found;
        }
        false
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '.')
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\u{08}' => out.push_str("\\b"),
        '\u{0c}' => out.push_str("\\f"),
        c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
        c => out.push(c),
    }
}
