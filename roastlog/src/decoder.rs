//! Literal decoder for the `.alog` format
//!
//! The recorder writes its state as a Python dictionary literal. This module
//! accepts exactly the literal subset that appears in those files and nothing
//! else: no names, calls, operators or imports are ever resolved.
//!
//! Grammar (informal):
//!
//! ```text
//! value    := mapping | list | tuple | string+ | number | True | False | None
//! mapping  := '{' [ string ':' value { ',' string ':' value } [','] ] '}'
//! list     := '[' [ value { ',' value } [','] ] ']'
//! tuple    := '(' [ value { ',' value } [','] ] ')'
//! number   := ['+' | '-'] digits ['.' digits] [exponent]
//! string   := ['u' | 'U'] quoted
//! ```
//!
//! A parenthesised single value without a trailing comma is the value itself,
//! matching the host language's literal rules. `#` starts a comment.

use crate::error::{IngestError, IngestResult};
use crate::value::{Mapping, Value};

/// Default bound on container nesting
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Decode log-format text into a value tree
pub fn decode(text: &str) -> IngestResult<Value> {
    decode_with_depth(text, DEFAULT_MAX_DEPTH)
}

/// Decode raw bytes, rejecting invalid UTF-8 at the offending offset
pub fn decode_bytes(bytes: &[u8], max_depth: usize) -> IngestResult<Value> {
    match std::str::from_utf8(bytes) {
        Ok(text) => decode_with_depth(text, max_depth),
        Err(e) => {
            let valid = &bytes[..e.valid_up_to()];
            // The prefix is valid UTF-8 by construction.
            let prefix = std::str::from_utf8(valid).unwrap_or_default();
            let (line, column) = line_and_column(prefix, prefix.len());
            Err(IngestError::MalformedDocument {
                offset: e.valid_up_to(),
                line,
                column,
                message: "invalid UTF-8 sequence".to_string(),
            })
        }
    }
}

/// Decode with an explicit nesting bound
pub fn decode_with_depth(text: &str, max_depth: usize) -> IngestResult<Value> {
    let mut parser = Parser {
        src: text,
        pos: 0,
        depth: 0,
        max_depth,
    };
    parser.skip_trivia();
    let value = parser.parse_value()?;
    parser.skip_trivia();
    if parser.pos < text.len() {
        return Err(parser.error_at(parser.pos, "unexpected trailing content"));
    }
    Ok(value)
}

fn line_and_column(src: &str, offset: usize) -> (usize, usize) {
    let before = &src[..offset.min(src.len())];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn error_at(&self, offset: usize, message: impl Into<String>) -> IngestError {
        let (line, column) = line_and_column(self.src, offset);
        IngestError::MalformedDocument {
            offset,
            line,
            column,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, skip: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(skip)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Skip whitespace, comments and a leading byte-order mark
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\n' | '\r' | '\x0c') => {
                    self.pos += 1;
                }
                Some('\u{feff}') if self.pos == 0 => {
                    self.pos += '\u{feff}'.len_utf8();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('\\') if self.rest().starts_with("\\\n") => self.pos += 2,
                Some('\\') if self.rest().starts_with("\\\r\n") => self.pos += 3,
                _ => return,
            }
        }
    }

    fn parse_value(&mut self) -> IngestResult<Value> {
        let start = self.pos;
        match self.peek() {
            None => Err(self.error_at(start, "unexpected end of input")),
            Some('{') => self.parse_mapping(),
            Some('[') => self.parse_list(),
            Some('(') => self.parse_tuple(),
            Some('\'' | '"') => self.parse_strings(),
            Some('u' | 'U') if matches!(self.peek_at(1), Some('\'' | '"')) => self.parse_strings(),
            Some(c) if c.is_ascii_digit() || c == '.' || c == '+' || c == '-' => {
                self.parse_number()
            }
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_keyword(),
            Some(c) => Err(self.error_at(start, format!("unexpected character `{}`", c))),
        }
    }

    fn enter(&mut self, start: usize) -> IngestResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.error_at(
                start,
                format!("nesting deeper than {} levels", self.max_depth),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_mapping(&mut self) -> IngestResult<Value> {
        let start = self.pos;
        self.enter(start)?;
        self.bump(); // '{'
        let mut map = Mapping::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some('}') => {
                    self.bump();
                    break;
                }
                None => return Err(self.error_at(start, "unterminated mapping")),
                _ => {}
            }

            let key_pos = self.pos;
            let key = match self.parse_value()? {
                Value::Text(key) => key,
                other => {
                    return Err(self.error_at(
                        key_pos,
                        format!("mapping keys must be text, found {}", other.kind()),
                    ))
                }
            };

            self.skip_trivia();
            if self.peek() != Some(':') {
                return Err(self.error_at(self.pos, "expected `:` after mapping key"));
            }
            self.bump();
            self.skip_trivia();
            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_trivia();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {
                    self.bump();
                    break;
                }
                None => return Err(self.error_at(start, "unterminated mapping")),
                Some(_) => return Err(self.error_at(self.pos, "expected `,` or `}` in mapping")),
            }
        }
        self.leave();
        Ok(Value::Mapping(map))
    }

    /// Parse comma-separated items up to `close`; reports whether any comma
    /// was seen
    fn parse_items(&mut self, close: char, what: &str) -> IngestResult<(Vec<Value>, bool)> {
        let start = self.pos;
        self.enter(start)?;
        self.bump(); // opener
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(c) if c == close => {
                    self.bump();
                    break;
                }
                None => return Err(self.error_at(start, format!("unterminated {}", what))),
                _ => {}
            }

            items.push(self.parse_value()?);

            self.skip_trivia();
            match self.peek() {
                Some(',') => {
                    saw_comma = true;
                    self.bump();
                }
                Some(c) if c == close => {
                    self.bump();
                    break;
                }
                None => return Err(self.error_at(start, format!("unterminated {}", what))),
                Some(_) => {
                    return Err(self.error_at(
                        self.pos,
                        format!("expected `,` or `{}` in {}", close, what),
                    ))
                }
            }
        }
        self.leave();
        Ok((items, saw_comma))
    }

    fn parse_list(&mut self) -> IngestResult<Value> {
        let (items, _) = self.parse_items(']', "list")?;
        Ok(Value::Sequence(items))
    }

    fn parse_tuple(&mut self) -> IngestResult<Value> {
        let (mut items, saw_comma) = self.parse_items(')', "tuple")?;
        if items.len() == 1 && !saw_comma {
            // `(x)` is just a parenthesised `x`.
            return Ok(items.remove(0));
        }
        Ok(Value::Sequence(items))
    }

    fn parse_keyword(&mut self) -> IngestResult<Value> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        match &self.src[start..self.pos] {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            word => Err(self.error_at(
                start,
                format!("unsupported literal construct `{}`", word),
            )),
        }
    }

    fn parse_number(&mut self) -> IngestResult<Value> {
        let start = self.pos;
        let negative = match self.peek() {
            Some('-') => {
                self.bump();
                true
            }
            Some('+') => {
                self.bump();
                false
            }
            _ => false,
        };
        if self.pos > start {
            self.skip_trivia();
            if !matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
                return Err(self.error_at(start, "expected a number after sign"));
            }
        }

        let int_part = self.take_digits();
        let mut frac_part = None;
        if self.peek() == Some('.') {
            self.bump();
            frac_part = Some(self.take_digits());
        }
        if int_part.is_empty() && frac_part.map_or(true, str::is_empty) {
            return Err(self.error_at(start, "invalid numeric literal"));
        }

        let mut exponent = None;
        if matches!(self.peek(), Some('e' | 'E')) {
            let exp_start = self.pos;
            self.bump();
            let sign = match self.peek() {
                Some('-') => {
                    self.bump();
                    "-"
                }
                Some('+') => {
                    self.bump();
                    ""
                }
                _ => "",
            };
            let digits = self.take_digits();
            if digits.is_empty() {
                return Err(self.error_at(exp_start, "invalid exponent in numeric literal"));
            }
            exponent = Some(format!("e{}{}", sign, digits));
        }

        if matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '.') {
            return Err(self.error_at(start, "invalid numeric literal"));
        }

        let sign = if negative { "-" } else { "" };
        if frac_part.is_none() && exponent.is_none() {
            if int_part.len() > 1 && int_part.starts_with('0') && int_part.bytes().any(|b| b != b'0')
            {
                return Err(self.error_at(start, "leading zeros in integer literal"));
            }
            return format!("{}{}", sign, int_part)
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| self.error_at(start, "integer literal out of range"));
        }

        let text = format!(
            "{}{}.{}{}",
            sign,
            if int_part.is_empty() { "0" } else { int_part },
            match frac_part {
                Some(f) if !f.is_empty() => f,
                _ => "0",
            },
            exponent.unwrap_or_default()
        );
        text.parse::<f64>()
            .map(Value::Float)
            .map_err(|_| self.error_at(start, "invalid float literal"))
    }

    fn take_digits(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    /// One or more adjacent string literals, concatenated
    fn parse_strings(&mut self) -> IngestResult<Value> {
        let mut text = self.parse_string()?;
        loop {
            let save = self.pos;
            self.skip_trivia();
            let next_is_string = match self.peek() {
                Some('\'' | '"') => true,
                Some('u' | 'U') => matches!(self.peek_at(1), Some('\'' | '"')),
                _ => false,
            };
            if !next_is_string {
                self.pos = save;
                break;
            }
            text.push_str(&self.parse_string()?);
        }
        Ok(Value::Text(text))
    }

    fn parse_string(&mut self) -> IngestResult<String> {
        let start = self.pos;
        if matches!(self.peek(), Some('u' | 'U')) {
            self.bump();
        }
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error_at(start, "expected a quoted string")),
        };
        let triple: String = std::iter::repeat(quote).take(3).collect();
        let is_triple = self.rest().starts_with(&triple[..2]);
        if is_triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            if is_triple && self.rest().starts_with(&triple) {
                self.pos += 3;
                return Ok(out);
            }
            let c = match self.bump() {
                None => return Err(self.error_at(start, "unterminated string")),
                Some(c) => c,
            };
            match c {
                c if c == quote && !is_triple => return Ok(out),
                '\n' if !is_triple => return Err(self.error_at(start, "unterminated string")),
                '\\' => self.parse_escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> IngestResult<()> {
        let esc_pos = self.pos - 1;
        let c = match self.bump() {
            None => return Err(self.error_at(esc_pos, "unterminated escape sequence")),
            Some(c) => c,
        };
        match c {
            '\n' => {}
            '\r' => {
                if self.peek() == Some('\n') {
                    self.bump();
                }
            }
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.bump();
                        }
                        None => break,
                    }
                }
                out.push(self.code_point(esc_pos, code)?);
            }
            'x' => {
                let code = self.hex_digits(esc_pos, 2)?;
                out.push(self.code_point(esc_pos, code)?);
            }
            'u' => {
                let code = self.hex_digits(esc_pos, 4)?;
                out.push(self.code_point(esc_pos, code)?);
            }
            'U' => {
                let code = self.hex_digits(esc_pos, 8)?;
                out.push(self.code_point(esc_pos, code)?);
            }
            'N' => return Err(self.error_at(esc_pos, "named unicode escapes are not supported")),
            other => {
                // Unknown escapes keep their backslash.
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_digits(&mut self, esc_pos: usize, count: usize) -> IngestResult<u32> {
        let mut code = 0u32;
        for _ in 0..count {
            match self.peek().and_then(|d| d.to_digit(16)) {
                Some(d) => {
                    code = code * 16 + d;
                    self.bump();
                }
                None => return Err(self.error_at(esc_pos, "truncated hex escape")),
            }
        }
        Ok(code)
    }

    fn code_point(&self, esc_pos: usize, code: u32) -> IngestResult<char> {
        char::from_u32(code)
            .ok_or_else(|| self.error_at(esc_pos, format!("invalid code point {:#x}", code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn malformed_message(text: &str) -> String {
        match decode(text) {
            Err(IngestError::MalformedDocument { message, .. }) => message,
            other => panic!("expected MalformedDocument, got {:?}", other),
        }
    }

    #[test]
    fn test_decodes_nested_document() {
        let value = decode(
            "{'title': 'Ethiopia', 'timex': [0.0, 1.5, 3], 'computed': {'DROP_BT': 208.4}, \
             'flag': True, 'gone': None}",
        )
        .unwrap();

        assert_eq!(value.get("title"), Some(&Value::Text("Ethiopia".into())));
        assert_eq!(
            value.get("timex"),
            Some(&Value::Sequence(vec![
                Value::Float(0.0),
                Value::Float(1.5),
                Value::Int(3)
            ]))
        );
        assert_eq!(
            value.get("computed").and_then(|c| c.get("DROP_BT")),
            Some(&Value::Float(208.4))
        );
        assert_eq!(value.get("flag"), Some(&Value::Bool(true)));
        assert_eq!(value.get("gone"), Some(&Value::Null));
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(decode("-1").unwrap(), Value::Int(-1));
        assert_eq!(decode("- 1").unwrap(), Value::Int(-1));
        assert_eq!(decode("+7").unwrap(), Value::Int(7));
        assert_eq!(decode("-1.5e2").unwrap(), Value::Float(-150.0));
        assert_eq!(decode(".5").unwrap(), Value::Float(0.5));
        assert_eq!(decode("5.").unwrap(), Value::Float(5.0));
        assert_eq!(decode("1E-3").unwrap(), Value::Float(0.001));
        assert_eq!(decode("0").unwrap(), Value::Int(0));
    }

    #[test]
    fn test_rejects_bad_numbers() {
        assert_eq!(malformed_message("012"), "leading zeros in integer literal");
        assert_eq!(malformed_message("0x1f"), "invalid numeric literal");
        assert_eq!(malformed_message("1.2.3"), "invalid numeric literal");
        assert_eq!(malformed_message("1e"), "invalid exponent in numeric literal");
        assert_eq!(
            malformed_message("99999999999999999999"),
            "integer literal out of range"
        );
        assert_eq!(malformed_message("-"), "expected a number after sign");
    }

    #[test]
    fn test_string_escapes_and_prefixes() {
        assert_eq!(
            decode(r#"'a\'b\n\t\\\x41é'"#).unwrap(),
            Value::Text("a'b\n\t\\Aé".into())
        );
        assert_eq!(decode(r#""it's""#).unwrap(), Value::Text("it's".into()));
        assert_eq!(decode("u'caf\\xe9'").unwrap(), Value::Text("café".into()));
        assert_eq!(decode("'ab' \"cd\"").unwrap(), Value::Text("abcd".into()));
        assert_eq!(decode("'''multi\nline'''").unwrap(), Value::Text("multi\nline".into()));
        assert_eq!(decode(r"'\q'").unwrap(), Value::Text("\\q".into()));
        assert_eq!(decode("'日本'").unwrap(), Value::Text("日本".into()));
    }

    #[test]
    fn test_tuples() {
        assert_eq!(
            decode("(1, 2)").unwrap(),
            Value::Sequence(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(decode("(1,)").unwrap(), Value::Sequence(vec![Value::Int(1)]));
        assert_eq!(decode("(1)").unwrap(), Value::Int(1));
        assert_eq!(decode("()").unwrap(), Value::Sequence(vec![]));
    }

    #[test]
    fn test_trailing_commas_and_comments() {
        let value = decode("{\n  'a': [1, 2,], # note\n  'b': 3,\n}\n").unwrap();
        assert_eq!(value.get("b"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_repeated_key_last_wins() {
        let value = decode("{'a': 1, 'b': 2, 'a': 3}").unwrap();
        let map = value.as_mapping().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_rejects_code() {
        assert_eq!(
            malformed_message("__import__('os').system('ls')"),
            "unsupported literal construct `__import__`"
        );
        assert_eq!(
            malformed_message("{'a': open('x')}"),
            "unsupported literal construct `open`"
        );
        assert_eq!(malformed_message("{'a': 1 + 2}"), "expected `,` or `}` in mapping");
        assert_eq!(malformed_message("[x for x in y]"), "unsupported literal construct `x`");
        assert_eq!(malformed_message("b'bytes'"), "unsupported literal construct `b`");
    }

    #[test]
    fn test_rejects_unterminated_structures() {
        assert_eq!(malformed_message("{'a': [1, 2"), "unterminated list");
        assert_eq!(malformed_message("{'a': 1"), "unterminated mapping");
        assert_eq!(malformed_message("'abc"), "unterminated string");
        assert_eq!(malformed_message(""), "unexpected end of input");
        assert_eq!(malformed_message("{} {}"), "unexpected trailing content");
    }

    #[test]
    fn test_rejects_non_text_keys() {
        assert_eq!(
            malformed_message("{1: 'a'}"),
            "mapping keys must be text, found integer"
        );
    }

    #[test]
    fn test_error_position() {
        let err = decode("{'a': 1,\n 'b': oops}").unwrap_err();
        assert_eq!(
            err,
            IngestError::MalformedDocument {
                offset: 15,
                line: 2,
                column: 7,
                message: "unsupported literal construct `oops`".into(),
            }
        );
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}{}", "[".repeat(10), "]".repeat(10));
        assert!(decode_with_depth(&deep, 10).is_ok());
        assert!(decode_with_depth(&deep, 9).is_err());
    }

    #[test]
    fn test_invalid_utf8() {
        let bytes = b"{'a': '\xff'}";
        match decode_bytes(bytes, DEFAULT_MAX_DEPTH) {
            Err(IngestError::MalformedDocument { offset, .. }) => assert_eq!(offset, 7),
            other => panic!("expected MalformedDocument, got {:?}", other),
        }
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let text = "{'timex': [0.0, 2.0], 'temp2': [-1, 150.25]}";
        assert_eq!(decode(text).unwrap(), decode(text).unwrap());
    }

    #[test]
    fn test_encoded_literal_decodes_back() {
        let original = decode(
            "{'t': 'x\\'y', 'n': [1, -2.5, 1e300, None, True], 'm': {'k': (1,)}}",
        )
        .unwrap();
        assert_eq!(decode(&original.to_literal()).unwrap(), original);
    }
}
