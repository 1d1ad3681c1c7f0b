//! Best-effort literal decoding of raw tokens.
//!
//! Source systems frequently write composite cells as stringified literals
//! (`"['a', 'b']"`, `"{'k': 1}"`) rather than JSON. [`parse_token`] runs a
//! recursive-descent parser over the constant-literal grammar and returns the
//! decoded [`Value`]. Anything it cannot decode comes back unchanged as
//! [`Value::String`], so decoding never fails.
//!
//! ## Grammar
//!
//! - `None`, `True`, `False` (case-sensitive)
//! - integers: decimal, `0x`/`0o`/`0b`, `_` digit separators, one optional sign
//! - floats: fraction and/or exponent (`1.5`, `.5`, `2.`, `1e-3`)
//! - strings: single or double quotes, triple quotes, backslash escapes,
//!   `r`/`b`/`u` prefixes, implicit concatenation of adjacent literals
//! - lists `[..]`, tuples `(..)` (decoded as lists), mappings `{..}` with
//!   string keys; trailing commas allowed

use log::debug;
use thiserror::Error;

use crate::data::Value;

const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} at offset {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub reason: &'static str,
}

/// Decodes every field of a raw row. Already-typed fields pass through.
pub fn parse_row(raw: &[Value]) -> Vec<Value> {
    raw.iter().map(parse_field).collect()
}

pub fn parse_text_row<S: AsRef<str>>(raw: &[S]) -> Vec<Value> {
    raw.iter().map(|token| parse_token(token.as_ref())).collect()
}

pub fn parse_field(value: &Value) -> Value {
    match value {
        Value::String(token) => parse_token(token),
        other => other.clone(),
    }
}

pub fn parse_token(token: &str) -> Value {
    match decode_literal(token) {
        Ok(value) => value,
        Err(err) => {
            debug!("Keeping {token:?} as text: {err}");
            Value::String(token.to_string())
        }
    }
}

/// Strict form of [`parse_token`] that reports why a token is not a literal.
pub fn decode_literal(input: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser::new(input);
    parser.skip_trivia();
    let value = parser.expression()?;
    parser.skip_trivia();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0, depth: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn error(&self, reason: &'static str) -> LiteralError {
        LiteralError {
            offset: self.pos,
            reason,
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\n' | '\r' | '\x0c' => self.pos += 1,
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.pos += c.len_utf8();
                    }
                }
                _ => break,
            }
        }
    }

    fn expression(&mut self) -> Result<Value, LiteralError> {
        match self.peek() {
            None => Err(self.error("expected a literal")),
            Some('[') => self.list(),
            Some('(') => self.tuple(),
            Some('{') => self.mapping(),
            Some('\'' | '"') => self.strings(),
            Some('-' | '+') => self.signed_number(),
            Some(c) if c.is_ascii_digit() => self.number(false),
            Some('.') if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.number(false)
            }
            Some(c) if c.is_alphabetic() || c == '_' => self.word(),
            Some(_) => Err(self.error("unexpected character")),
        }
    }

    fn enter(&mut self) -> Result<(), LiteralError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn list(&mut self) -> Result<Value, LiteralError> {
        self.enter()?;
        self.bump();
        let (items, _) = self.elements(']')?;
        self.leave();
        Ok(Value::List(items))
    }

    fn tuple(&mut self) -> Result<Value, LiteralError> {
        self.enter()?;
        self.bump();
        let (mut items, saw_comma) = self.elements(')')?;
        self.leave();
        // `(x)` is grouping, `(x,)` is a one-element tuple
        if items.len() == 1 && !saw_comma {
            Ok(items.remove(0))
        } else {
            Ok(Value::List(items))
        }
    }

    fn elements(&mut self, close: char) -> Result<(Vec<Value>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_trivia();
            if self.eat(close) {
                return Ok((items, saw_comma));
            }
            items.push(self.expression()?);
            self.skip_trivia();
            if self.eat(',') {
                saw_comma = true;
                continue;
            }
            if self.eat(close) {
                return Ok((items, saw_comma));
            }
            return Err(self.error("expected ',' or closing bracket"));
        }
    }

    fn mapping(&mut self) -> Result<Value, LiteralError> {
        self.enter()?;
        self.bump();
        let mut entries: Vec<(String, Value)> = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat('}') {
                break;
            }
            let key_offset = self.pos;
            let key = self.expression()?;
            self.skip_trivia();
            if !self.eat(':') {
                return Err(if entries.is_empty() {
                    self.error("set literals are not supported")
                } else {
                    self.error("expected ':' after mapping key")
                });
            }
            let Value::String(key) = key else {
                return Err(LiteralError {
                    offset: key_offset,
                    reason: "mapping keys must be strings",
                });
            };
            self.skip_trivia();
            let value = self.expression()?;
            match entries.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
            self.skip_trivia();
            if self.eat(',') {
                continue;
            }
            if self.eat('}') {
                break;
            }
            return Err(self.error("expected ',' or '}'"));
        }
        self.leave();
        Ok(Value::Map(entries))
    }

    fn word(&mut self) -> Result<Value, LiteralError> {
        if self.starts_string_literal() {
            return self.strings();
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        match &self.src[start..self.pos] {
            "None" => Ok(Value::Null),
            "True" => Ok(Value::Boolean(true)),
            "False" => Ok(Value::Boolean(false)),
            _ => Err(LiteralError {
                offset: start,
                reason: "names are not literals",
            }),
        }
    }

    fn starts_string_literal(&self) -> bool {
        let mut chars = self.rest().chars();
        for _ in 0..3 {
            match chars.next() {
                Some('\'' | '"') => return true,
                Some(c) if c.is_ascii_alphabetic() => continue,
                _ => return false,
            }
        }
        false
    }

    fn followed_by_pair(&self, quote: char) -> bool {
        let mut chars = self.rest().chars();
        chars.next() == Some(quote) && chars.next() == Some(quote)
    }

    fn strings(&mut self) -> Result<Value, LiteralError> {
        let (mut text, bytes) = self.string_literal()?;
        loop {
            let checkpoint = self.pos;
            self.skip_trivia();
            if !self.starts_string_literal() {
                self.pos = checkpoint;
                break;
            }
            let (next, next_bytes) = self.string_literal()?;
            if next_bytes != bytes {
                return Err(self.error("cannot mix bytes and text literals"));
            }
            text.push_str(&next);
        }
        Ok(Value::String(text))
    }

    fn string_literal(&mut self) -> Result<(String, bool), LiteralError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let prefix = self.src[start..self.pos].to_ascii_lowercase();
        let (raw, bytes) = match prefix.as_str() {
            "" | "u" => (false, false),
            "r" => (true, false),
            "b" => (false, true),
            "br" | "rb" => (true, true),
            "f" | "fr" | "rf" => return Err(self.error("formatted strings are not literals")),
            _ => return Err(self.error("unknown string prefix")),
        };
        let Some(quote) = self.bump() else {
            return Err(self.error("unterminated string"));
        };
        let triple = self.followed_by_pair(quote);
        if triple {
            self.pos += 2 * quote.len_utf8();
        }

        let mut out = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(self.error("unterminated string"));
            };
            if ch == quote {
                if !triple {
                    break;
                }
                if self.followed_by_pair(quote) {
                    self.pos += 2 * quote.len_utf8();
                    break;
                }
                out.push(ch);
                continue;
            }
            match ch {
                '\n' if !triple => return Err(self.error("newline in single-quoted string")),
                '\\' => {
                    let Some(next) = self.bump() else {
                        return Err(self.error("unterminated string"));
                    };
                    if raw {
                        out.push('\\');
                        out.push(next);
                    } else {
                        self.escape(next, bytes, &mut out)?;
                    }
                }
                c if bytes && !c.is_ascii() => {
                    return Err(self.error("bytes literals may only contain ASCII"));
                }
                c => out.push(c),
            }
        }
        Ok((out, bytes))
    }

    fn escape(&mut self, next: char, bytes: bool, out: &mut String) -> Result<(), LiteralError> {
        match next {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(next),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut code = next.to_digit(8).unwrap_or_default();
                for _ in 0..2 {
                    match self.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            self.pos += 1;
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).ok_or_else(|| self.error("invalid octal escape"))?);
            }
            'x' => out.push(self.hex_escape(2)?),
            'u' if !bytes => out.push(self.hex_escape(4)?),
            'U' if !bytes => out.push(self.hex_escape(8)?),
            'N' if !bytes => return Err(self.error("named unicode escapes are not supported")),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, width: usize) -> Result<char, LiteralError> {
        let digits = self
            .rest()
            .get(..width)
            .filter(|digits| digits.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("truncated hex escape"))?;
        let code =
            u32::from_str_radix(digits, 16).map_err(|_| self.error("truncated hex escape"))?;
        let ch = char::from_u32(code).ok_or_else(|| self.error("escape is not a valid character"))?;
        self.pos += width;
        Ok(ch)
    }

    fn signed_number(&mut self) -> Result<Value, LiteralError> {
        let negative = self.bump() == Some('-');
        self.skip_trivia();
        match self.peek() {
            Some(c) if c.is_ascii_digit() => self.number(negative),
            Some('.') if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.number(negative)
            }
            _ => Err(self.error("sign must be followed by a number")),
        }
    }

    fn number(&mut self, negative: bool) -> Result<Value, LiteralError> {
        let start = self.pos;
        let head = self.rest().as_bytes();
        let prefixed = head.len() >= 2
            && head[0] == b'0'
            && matches!(head[1], b'x' | b'X' | b'o' | b'O' | b'b' | b'B');

        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let exponent_sign = !prefixed && matches!(c, '+' | '-') && matches!(prev, 'e' | 'E');
            if !(c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign) {
                break;
            }
            prev = c;
            self.pos += 1;
        }
        let lexeme = &self.src[start..self.pos];
        let fail = |reason| LiteralError {
            offset: start,
            reason,
        };

        if prefixed {
            let radix = match lexeme.as_bytes()[1] {
                b'x' | b'X' => 16,
                b'o' | b'O' => 8,
                _ => 2,
            };
            let digits = strip_separators(&lexeme[2..], true, |c| c.is_digit(radix))
                .ok_or_else(|| fail("malformed integer literal"))?;
            let magnitude = u128::from_str_radix(&digits, radix)
                .map_err(|_| fail("integer literal out of range"))?;
            return signed_integer(magnitude, negative)
                .ok_or_else(|| fail("integer literal out of range"));
        }

        if lexeme.ends_with(['j', 'J']) {
            return Err(fail("complex literals are not supported"));
        }

        if lexeme.contains(['.', 'e', 'E']) {
            let value = parse_float_lexeme(lexeme).ok_or_else(|| fail("malformed float literal"))?;
            return Ok(Value::Float(if negative { -value } else { value }));
        }

        let digits = strip_separators(lexeme, false, |c| c.is_ascii_digit())
            .ok_or_else(|| fail("malformed number"))?;
        if digits.len() > 1 && digits.starts_with('0') && digits.bytes().any(|b| b != b'0') {
            return Err(fail("leading zeros in integer literal"));
        }
        let magnitude: u128 = digits
            .parse()
            .map_err(|_| fail("integer literal out of range"))?;
        signed_integer(magnitude, negative).ok_or_else(|| fail("integer literal out of range"))
    }
}

fn parse_float_lexeme(lexeme: &str) -> Option<f64> {
    let (mantissa, exponent) = match lexeme.find(['e', 'E']) {
        Some(idx) => (&lexeme[..idx], Some(&lexeme[idx + 1..])),
        None => (lexeme, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (mantissa, None),
    };
    let is_digit = |c: char| c.is_ascii_digit();
    let int_digits = if int_part.is_empty() {
        None
    } else {
        Some(strip_separators(int_part, false, is_digit)?)
    };
    let frac_digits = match frac_part {
        None | Some("") => None,
        Some(frac) => Some(strip_separators(frac, false, is_digit)?),
    };
    if int_digits.is_none() && frac_digits.is_none() {
        return None;
    }
    let (sign, exp_digits) = match exponent {
        None => ("", "0".to_string()),
        Some(exp) => {
            let (sign, body) = match exp.strip_prefix('-') {
                Some(body) => ("-", body),
                None => ("", exp.strip_prefix('+').unwrap_or(exp)),
            };
            (sign, strip_separators(body, false, is_digit)?)
        }
    };
    let normalized = format!(
        "{}.{}e{}{}",
        int_digits.as_deref().unwrap_or("0"),
        frac_digits.as_deref().unwrap_or("0"),
        sign,
        exp_digits
    );
    normalized.parse().ok()
}

pub(crate) fn strip_separators(
    text: &str,
    leading_underscore: bool,
    is_digit: impl Fn(char) -> bool,
) -> Option<String> {
    if text.is_empty() || text.ends_with('_') || text.contains("__") {
        return None;
    }
    if text.starts_with('_') && !leading_underscore {
        return None;
    }
    let mut digits = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '_' {
            continue;
        }
        if !is_digit(c) {
            return None;
        }
        digits.push(c);
    }
    (!digits.is_empty()).then_some(digits)
}

fn signed_integer(magnitude: u128, negative: bool) -> Option<Value> {
    let magnitude = i128::try_from(magnitude).ok()?;
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).ok().map(Value::Integer)
}
